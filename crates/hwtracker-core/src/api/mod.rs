//! REST API client module for the homework backend.
//!
//! This module provides the `HomeworkClient` for listing, adding and
//! completing homework items. Every request carries the bearer token from
//! the `SessionManager`.

pub mod client;
pub mod error;

pub use client::HomeworkClient;
pub use error::ApiError;
