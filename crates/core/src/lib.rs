//! Domain model shared by every taskboard crate.
//!
//! Holds the task, worker, log and statistics types the dashboard keeps in
//! memory, the wire records the backend sends, role profiles, and the
//! validation rules applied to user input before any request is made.
//! This crate performs no I/O.

pub mod error;
pub mod log;
pub mod message_types;
pub mod records;
pub mod role;
pub mod stats;
pub mod task;
pub mod types;
pub mod validation;
pub mod worker;
