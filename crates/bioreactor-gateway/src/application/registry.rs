//! Connection registry: one slot per role.
//!
//! The registry owns the only record of which connection currently plays
//! each [`Role`].  A slot is either empty or holds one [`PeerHandle`]:
//!
//! ```text
//! Empty ──register──► Connected ──clear(same id)──► Empty
//!                        │
//!                        └──register(new)──► Connected (old handle returned)
//! ```
//!
//! Each slot sits behind its own `std::sync::Mutex`.  The lock is held only
//! for the slot read or write itself and never across an `.await`, so the
//! blocking mutex is safe to use from async tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bioreactor_core::{ConnectionId, Role};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 128;

/// The recipient's outbound queue is closed: its session already ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{role} connection {id} is no longer accepting messages")]
pub struct PeerGone {
    pub role: Role,
    pub id: ConnectionId,
}

/// Why a message could not be queued for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliverError {
    /// The connection's outbound queue is full: its writer is not keeping up.
    #[error("{role} connection {id} has a full outbound queue")]
    Backlogged { role: Role, id: ConnectionId },

    #[error(transparent)]
    Gone(#[from] PeerGone),
}

// ── Handles ───────────────────────────────────────────────────────────────────

/// Cloneable sending side of one connection.
///
/// Holding a handle never keeps the connection open; it only allows queueing
/// text for its writer and signalling supersession.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    role: Role,
    outbound: mpsc::Sender<String>,
    superseded: Arc<watch::Sender<bool>>,
}

/// Receiving side of one connection, owned by its session writer.
#[derive(Debug)]
pub struct PeerInbox {
    /// Text frames queued for this connection, in FIFO order.
    pub messages: mpsc::Receiver<String>,
    /// Flips to `true` when a newer connection took over the role.
    pub superseded: watch::Receiver<bool>,
}

impl PeerHandle {
    /// Creates a fresh handle for `role` together with its inbox.
    pub fn channel(role: Role) -> (Self, PeerInbox) {
        let (outbound, messages) = mpsc::channel(OUTBOUND_CAPACITY);
        let (superseded_tx, superseded) = watch::channel(false);
        let handle = Self {
            id: ConnectionId::new(),
            role,
            outbound,
            superseded: Arc::new(superseded_tx),
        };
        (
            handle,
            PeerInbox {
                messages,
                superseded,
            },
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Queues `text` for this connection's writer without waiting.
    ///
    /// # Errors
    ///
    /// - [`DeliverError::Backlogged`] if the queue is full; `text` is dropped.
    /// - [`DeliverError::Gone`] if the connection's session has ended.
    pub fn deliver(&self, text: String) -> Result<(), DeliverError> {
        self.outbound.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => DeliverError::Backlogged {
                role: self.role,
                id: self.id,
            },
            TrySendError::Closed(_) => DeliverError::Gone(PeerGone {
                role: self.role,
                id: self.id,
            }),
        })
    }

    /// Tells the connection's writer to close the socket.
    pub fn supersede(&self) {
        self.superseded.send_replace(true);
    }

    /// Returns `true` once the connection's inbox has been dropped.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Point-in-time view of which roles are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStatus {
    pub device_connected: bool,
    pub frontend_connected: bool,
}

impl RegistryStatus {
    pub fn is_connected(&self, role: Role) -> bool {
        match role {
            Role::Device => self.device_connected,
            Role::Frontend => self.frontend_connected,
        }
    }
}

/// The two role slots.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    device: Mutex<Option<PeerHandle>>,
    frontend: Mutex<Option<PeerHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` in its role's slot.
    ///
    /// Returns the handle it replaced, if any; the caller is responsible for
    /// superseding it.
    pub fn register(&self, handle: PeerHandle) -> Option<PeerHandle> {
        self.slot(handle.role()).replace(handle)
    }

    /// Returns the connection currently registered for `role`.
    pub fn lookup(&self, role: Role) -> Option<PeerHandle> {
        self.slot(role).clone()
    }

    /// Empties `role`'s slot if it still holds connection `id`.
    ///
    /// Returns `true` if the slot was cleared.  A stale id (a connection that
    /// was already superseded) leaves the slot untouched.
    pub fn clear(&self, role: Role, id: ConnectionId) -> bool {
        let mut slot = self.slot(role);
        if slot.as_ref().map(PeerHandle::id) == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            device_connected: self.slot(Role::Device).is_some(),
            frontend_connected: self.slot(Role::Frontend).is_some(),
        }
    }

    fn slot(&self, role: Role) -> MutexGuard<'_, Option<PeerHandle>> {
        let slot = match role {
            Role::Device => &self.device,
            Role::Frontend => &self.frontend,
        };
        // A panic while holding the guard cannot leave the Option half-written.
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
