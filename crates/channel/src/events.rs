//! Lifecycle and message events emitted by the push channel task.

use crate::messages::PushMessage;

/// Delivered, in arrival order, to the channel's single consumer.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The connection was established and the subscription declared.
    Connected,

    /// The connection was lost; a reconnect is scheduled.
    Disconnected,

    /// A well-formed inbound frame.
    Message(PushMessage),
}
