//! pdfpress worker HTTP server library.
//!
//! Exposes the building blocks (config, state, error handling, routes and
//! the router factory) so integration tests and the binary entrypoint can
//! both use them.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
