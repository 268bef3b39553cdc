//! Relay engine: forwards text between the device and the frontend.
//!
//! A message from one role is handed verbatim to whichever connection
//! currently holds the other role.  If that slot is empty the message is
//! dropped; nothing is buffered for a peer that connects later.  A peer
//! whose outbound queue is full also loses the message: hand-offs never wait,
//! so one stalled socket cannot hold up the other role's loop.  After a
//! successful hand-off the sender alone receives a [`RelayNotice::RelayAck`]
//! echoing its payload.
//!
//! The engine never touches sockets.  Sessions in the infrastructure layer
//! call [`RelayEngine::attach`] once after the handshake, feed every inbound
//! text frame to [`RelayEngine::on_message`], and call
//! [`RelayEngine::detach`] when their loop ends.

use std::sync::Arc;

use bioreactor_core::Role;
use tracing::{debug, error, info, warn};

use crate::application::registry::{
    ConnectionRegistry, DeliverError, PeerGone, PeerHandle, PeerInbox,
};
use crate::domain::messages::RelayNotice;

/// Result of handing a message to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued on the role's live connection.
    Delivered,
    /// No connection holds the role; the message was dropped.
    NotConnected,
    /// The role's connection has a full outbound queue; the message was
    /// dropped.
    Backlogged,
}

/// Routes messages between the two registry slots.
#[derive(Debug, Clone)]
pub struct RelayEngine {
    registry: Arc<ConnectionRegistry>,
}

impl RelayEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Registers a new connection for `role`, superseding any previous one.
    ///
    /// The returned inbox must be drained by the connection's writer.
    pub fn attach(&self, role: Role) -> (PeerHandle, PeerInbox) {
        let (handle, inbox) = PeerHandle::channel(role);
        if let Some(previous) = self.registry.register(handle.clone()) {
            info!(
                "{role} connection {} superseded by {}",
                previous.id(),
                handle.id()
            );
            previous.supersede();
        }
        info!("{role} connection {} registered", handle.id());
        (handle, inbox)
    }

    /// Removes `handle` from its slot if it is still the registered one.
    ///
    /// Returns `true` if the slot was cleared.
    pub fn detach(&self, handle: &PeerHandle) -> bool {
        let cleared = self.registry.clear(handle.role(), handle.id());
        if cleared {
            info!("{} connection {} unregistered", handle.role(), handle.id());
        } else {
            debug!(
                "{} connection {} already replaced; slot left as is",
                handle.role(),
                handle.id()
            );
        }
        cleared
    }

    /// Queues `text` for the connection currently holding `role`.
    ///
    /// Never waits on the recipient: a full queue yields
    /// [`Delivery::Backlogged`].
    ///
    /// # Errors
    ///
    /// Returns [`PeerGone`] if a connection was registered but its session
    /// ended between the lookup and the hand-off.
    pub async fn deliver_to(&self, role: Role, text: String) -> Result<Delivery, PeerGone> {
        match self.registry.lookup(role) {
            Some(peer) => match peer.deliver(text) {
                Ok(()) => Ok(Delivery::Delivered),
                Err(DeliverError::Backlogged { .. }) => Ok(Delivery::Backlogged),
                Err(DeliverError::Gone(gone)) => Err(gone),
            },
            None => Ok(Delivery::NotConnected),
        }
    }

    /// Forwards a text frame received from `sender` to the other role, then
    /// acknowledges it to `sender`.
    ///
    /// Failures are logged and never propagate: they must not end the
    /// sender's receive loop.
    pub async fn on_message(&self, sender: &PeerHandle, text: String) -> Delivery {
        let recipient = sender.role().peer();
        let ack = match RelayNotice::ack(recipient, text.as_str()).to_text() {
            Ok(ack) => ack,
            Err(e) => {
                error!("failed to encode relay ack: {e}");
                return Delivery::NotConnected;
            }
        };

        match self.deliver_to(recipient, text).await {
            Ok(Delivery::Delivered) => {
                debug!("{} → {recipient}: message forwarded", sender.role());
                if let Err(e) = sender.deliver(ack) {
                    debug!("ack not delivered: {e}");
                }
                Delivery::Delivered
            }
            Ok(Delivery::NotConnected) => {
                debug!("{} → {recipient}: no peer connected, message dropped", sender.role());
                Delivery::NotConnected
            }
            Ok(Delivery::Backlogged) => {
                warn!(
                    "{} → {recipient}: recipient is not keeping up, message dropped",
                    sender.role()
                );
                Delivery::Backlogged
            }
            Err(e) => {
                warn!("{} → {recipient}: {e}, message dropped", sender.role());
                Delivery::NotConnected
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
