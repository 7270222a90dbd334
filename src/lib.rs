//! Bugtrack
//!
//! A bug-tracking REST service: projects, project membership, bugs,
//! comments, change history and file attachments behind a uniform
//! JSON envelope.
//!
//! # Architecture Overview
//!
//! This crate is organized into four main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   HTTP handlers, routing, CORS, rate limits  │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │    Business logic, service orchestration     │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no dependencies)    │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │   Postgres repositories, file storage, etc.  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Trait-based abstraction**: All external dependencies are abstracted behind traits
//! - **Dependency injection**: Components receive their dependencies through constructors
//! - **Testability**: Mock implementations enable fast, isolated unit tests
//! - **Rate limiting**: Per-client sliding-window limiter with test-friendly reset
//! - **Error handling**: Stable error codes in a uniform `{error, code}` envelope
//! - **Validation**: Input validation using the `validator` crate
//! - **Logging**: Structured logging with `tracing`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bugtrack::api::create_router;
//! use bugtrack::app::{AppState, Repositories};
//! use bugtrack::infra::{LocalFileStore, PostgresClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // One pooled client implements every repository trait
//!     let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
//!     db.run_migrations().await?;
//!     let files = Arc::new(LocalFileStore::new(upload_dir));
//!
//!     let repos = Repositories {
//!         users: db.clone(),
//!         projects: db.clone(),
//!         members: db.clone(),
//!         bugs: db.clone(),
//!         comments: db.clone(),
//!         history: db.clone(),
//!         attachments: db.clone(),
//!     };
//!     let state = AppState::new(repos, files);
//!
//!     // Create and serve the router
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
