//! Headless taskboard dashboard: configuration, sign-in and the periodic
//! state summary around the [`taskboard_sync`] runtime.

pub mod config;
pub mod session;
pub mod summary;
