//! REST client for the task-distribution backend.
//!
//! [`client::TaskboardApi`] wraps the read endpoints used by the poll
//! fallback and the mutating endpoints behind user actions. Every request
//! made on behalf of a signed-in actor carries the `User-Id` header.

pub mod client;
pub mod error;
pub mod requests;

pub use client::TaskboardApi;
pub use error::ApiError;
