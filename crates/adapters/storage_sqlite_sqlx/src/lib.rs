//! # homelink-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement [`ConfigEntryRepository`](homelink_app::ports::ConfigEntryRepository)
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `homelink-app` (for port traits) and `homelink-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod config_entry_repo;
pub mod error;
pub mod pool;

pub use config_entry_repo::SqliteConfigEntryRepository;
pub use pool::{Config, Database};
