//! Per-operation busy state.
//!
//! One guard per [`OperationKind`]. A guard only stops a second call of the
//! same kind; different kinds never block each other. The guard is local to
//! this process and is not a server-side lock.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Send,
    Index,
    Reindex,
    Status,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Send,
        OperationKind::Index,
        OperationKind::Reindex,
        OperationKind::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Send => "send",
            OperationKind::Index => "index",
            OperationKind::Reindex => "reindex",
            OperationKind::Status => "status",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardState {
    #[default]
    Idle,
    InFlight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationGuard {
    state: GuardState,
    last_error: Option<String>,
}

impl OperationGuard {
    /// Moves `Idle -> InFlight`. Returns `false` (and changes nothing) when a
    /// call is already in flight; the caller must abandon its action.
    pub fn try_acquire(&mut self) -> bool {
        match self.state {
            GuardState::Idle => {
                self.state = GuardState::InFlight;
                true
            }
            GuardState::InFlight => false,
        }
    }

    pub fn release(&mut self) {
        self.state = GuardState::Idle;
    }

    /// Release and record how the call ended. `None` clears a previous error.
    pub fn settle(&mut self, error: Option<String>) {
        self.last_error = error;
        self.release();
    }

    pub fn is_busy(&self) -> bool {
        self.state == GuardState::InFlight
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// The four independent guards.
#[derive(Debug, Clone, Default)]
pub struct Guards {
    send: OperationGuard,
    index: OperationGuard,
    reindex: OperationGuard,
    status: OperationGuard,
}

impl Guards {
    pub fn get(&self, kind: OperationKind) -> &OperationGuard {
        match kind {
            OperationKind::Send => &self.send,
            OperationKind::Index => &self.index,
            OperationKind::Reindex => &self.reindex,
            OperationKind::Status => &self.status,
        }
    }

    pub fn get_mut(&mut self, kind: OperationKind) -> &mut OperationGuard {
        match kind {
            OperationKind::Send => &mut self.send,
            OperationKind::Index => &mut self.index,
            OperationKind::Reindex => &mut self.reindex,
            OperationKind::Status => &mut self.status,
        }
    }

    pub fn is_busy(&self, kind: OperationKind) -> bool {
        self.get(kind).is_busy()
    }
}
