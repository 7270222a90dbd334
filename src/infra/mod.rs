//! Infrastructure layer implementations.

pub mod database;
pub mod observability;
pub mod storage;

pub use database::{PostgresClient, PostgresConfig};
pub use storage::LocalFileStore;
