//! View communication
//!
//! This module defines the trait through which the quiz pushes what the
//! participant should see to whatever renders it. The tunnel abstraction
//! keeps the core free of any particular UI toolkit.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages to the participant's view
///
/// Implementations might render into a DOM through WASM bindings, write to
/// a terminal, or forward JSON over a WebSocket.
pub trait Tunnel {
    /// Sends an update message to the view
    ///
    /// Update messages describe a change to what is currently displayed.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the view
    ///
    /// Sync messages carry everything needed to render the current screen
    /// from scratch.
    fn send_state(&self, state: &SyncMessage);

    /// Closes the tunnel
    ///
    /// Called when the quiz is torn down and the view will receive nothing more.
    fn close(self);
}
