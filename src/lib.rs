//! # gestures
//!
//! A small async HTTP/1.1 service that keeps "gestures" (string values keyed
//! by gesture type) in memory and exposes them as REST resources.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gestures::{api, server::Server, store::GestureStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(GestureStore::new());
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server
//!         .serve(api::router(store), async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

// ── Service ──────────────────────────────────────────────────────────────────
pub mod api;
pub mod error;
pub mod store;

// ── HTTP plumbing ────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Binary support ───────────────────────────────────────────────────────────
pub mod config;
pub mod logging;

// ── Convenience re-exports ───────────────────────────────────────────────────
pub use error::{ApiError, ApiResult};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
pub use store::{GestureStore, StoreError, UpsertResult};
