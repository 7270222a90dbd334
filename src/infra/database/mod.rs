//! Concrete database implementations.
//!
//! This module contains the production Postgres adapter implementing the
//! repository traits defined in the domain layer.

pub mod postgres;

pub use postgres::{PostgresClient, PostgresConfig};
