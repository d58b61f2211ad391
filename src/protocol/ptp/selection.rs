//! Time server selection and failover.
//!
//! Not the IEEE 1588 best master clock algorithm: only `priority1` of the
//! Announce is compared (lower wins). The selected server's priority is
//! aged by one on every timer expiry and restored by each of its Announce
//! messages, so a server that stops announcing is eventually replaced by
//! a backup. Servers should announce at least every ten seconds to avoid
//! flapping between them.

use super::message::{AnnounceMessage, ClockIdentity};

/// Priority before any server has been selected.
pub const INITIAL_PRIORITY: u8 = u8::MAX;

/// Result of evaluating an Announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Announce from the selected server; priority restored.
    Refreshed {
        /// Priority now stored for the server.
        priority: u8,
    },
    /// A better server was found and selected.
    Switched {
        /// Previously selected server, if any.
        previous: Option<ClockIdentity>,
    },
    /// Announce from another server that is not better.
    Rejected,
}

/// Tracks the selected time server and its (aged) priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSelection {
    server: Option<ClockIdentity>,
    priority: u8,
}

impl Default for ServerSelection {
    fn default() -> Self {
        Self {
            server: None,
            priority: INITIAL_PRIORITY,
        }
    }
}

impl ServerSelection {
    /// Identity of the selected server, `None` until an Announce wins.
    #[must_use]
    pub fn server(&self) -> Option<ClockIdentity> {
        self.server
    }

    /// Stored priority of the selected server (lower = better).
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Whether `identity` is the selected server.
    #[must_use]
    pub fn is_selected(&self, identity: &ClockIdentity) -> bool {
        self.server == Some(*identity)
    }

    /// Evaluate an Announce message.
    pub fn evaluate(&mut self, announce: &AnnounceMessage) -> SelectionOutcome {
        let identity = announce.header.clock_identity;
        if self.is_selected(&identity) {
            // Reflects administrative changes and proves the server is alive.
            self.priority = announce.priority1;
            return SelectionOutcome::Refreshed {
                priority: self.priority,
            };
        }
        tracing::debug!(server = %identity, "PTP client: got Announce from new server");
        if announce.priority1 >= self.priority {
            return SelectionOutcome::Rejected;
        }
        let previous = self.server;
        self.server = Some(identity);
        self.priority = announce.priority1;
        SelectionOutcome::Switched { previous }
    }

    /// Age the selected server's priority by one.
    ///
    /// Wraps from 255 to 0, as the 8-bit counter always has: a server that
    /// stays silent long enough ends up looking like the best possible one.
    pub fn age(&mut self) {
        self.priority = self.priority.wrapping_add(1);
    }
}
