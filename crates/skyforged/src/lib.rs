//! skyforge daemon library
//!
//! The HTTP surface: one endpoint per provisioning/bootstrap operation,
//! stateless between calls. An external operator drives the sequence
//! (provision → bootstrap primary → join secondaries → install helm →
//! install charts); the daemon itself records nothing.

pub mod api;
pub mod error;
pub mod state;

pub use error::ApiError;
pub use state::AppState;
