//! Command dispatcher: operator commands → device.
//!
//! A [`Command`] is re-validated, serialized to its wire form, and handed to
//! the device slot through the [`RelayEngine`].  There is no retry and no
//! queueing: if no device is attached the caller is told so and the command
//! is discarded.

use std::sync::Arc;

use bioreactor_core::{Command, Role, ValidationError};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::registry::PeerGone;
use crate::application::relay::{Delivery, RelayEngine};
use crate::domain::messages::DEVICE_NOT_CONNECTED;

/// Errors that can occur while dispatching a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A field of a hand-assembled command broke a domain rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    /// The device was registered but its connection closed mid-dispatch.
    #[error("device connection lost: {0}")]
    Transport(#[from] PeerGone),

    /// The device connection is alive but its outbound queue is full.
    #[error("device is not accepting commands: its outbound queue is full")]
    Backlogged,
}

/// Non-error outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The device connection accepted the command.
    Sent { confirmation: String },
    /// No device is attached.
    NotConnected,
}

impl DispatchOutcome {
    /// Text returned to the operator.
    pub fn message(&self) -> &str {
        match self {
            DispatchOutcome::Sent { confirmation } => confirmation,
            DispatchOutcome::NotConnected => DEVICE_NOT_CONNECTED,
        }
    }
}

/// Sends operator commands to the device slot.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    relay: Arc<RelayEngine>,
}

impl CommandDispatcher {
    pub fn new(relay: Arc<RelayEngine>) -> Self {
        Self { relay }
    }

    /// Dispatches `command` to the device.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Validation`] if the command breaks a domain rule.
    /// - [`DispatchError::Transport`] if the device connection closed between
    ///   lookup and send.  Distinct from [`DispatchOutcome::NotConnected`].
    /// - [`DispatchError::Backlogged`] if the device has stopped draining its
    ///   queue.  The command is discarded rather than waited on.
    pub async fn dispatch(&self, command: &Command) -> Result<DispatchOutcome, DispatchError> {
        command.validate()?;
        let wire = command.to_wire()?;

        match self.relay.deliver_to(Role::Device, wire).await? {
            Delivery::Delivered => {
                info!("{} command sent to device", command.kind());
                Ok(DispatchOutcome::Sent {
                    confirmation: command.confirmation(),
                })
            }
            Delivery::NotConnected => {
                warn!("{} command discarded: device not connected", command.kind());
                Ok(DispatchOutcome::NotConnected)
            }
            Delivery::Backlogged => {
                warn!("{} command discarded: device queue full", command.kind());
                Err(DispatchError::Backlogged)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
