//! Push channel client for the task-distribution backend.
//!
//! Provides typed envelope parsing, the WebSocket connection, a fixed-delay
//! reconnect schedule, the cancellable delayed action shared with the
//! notification presenter, and the long-running [`transport::PushChannel`]
//! task that ties them together.

pub mod client;
pub mod events;
pub mod messages;
pub mod reconnect;
pub mod timer;
pub mod transport;
