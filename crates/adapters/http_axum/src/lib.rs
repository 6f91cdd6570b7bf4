//! # homelink-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** for config entries, config flows and entity states
//!   (`/api/config_entries`, `/api/flows`, `/api/states`, …)
//! - Stream domain events to clients over SSE (`/api/events/stream`)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `homelink-app` (for port traits and services) and
//! `homelink-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
