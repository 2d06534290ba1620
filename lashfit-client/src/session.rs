//! Upload session: drives the state machine against an analysis backend

use crate::client::AnalysisBackend;
use crate::machine::{Admission, UploadStateMachine, ViewState};
use crate::selection::{FileCandidate, SelectionError};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Owns the view state for one page lifetime.
///
/// The machine lock is only held for the duration of a transition, never
/// across the network await, so intents arriving while a request is in flight
/// are handled immediately.
pub struct UploadSession {
    machine: Mutex<UploadStateMachine>,
    backend: Arc<dyn AnalysisBackend>,
    state_tx: watch::Sender<ViewState>,
}

impl UploadSession {
    /// Create a session in the `Idle` state
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        let (state_tx, _) = watch::channel(ViewState::Idle);
        Self {
            machine: Mutex::new(UploadStateMachine::new()),
            backend,
            state_tx,
        }
    }

    fn with_machine<R>(&self, apply: impl FnOnce(&mut UploadStateMachine) -> R) -> R {
        let mut machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        let result = apply(&mut machine);

        let next = machine.state();
        self.state_tx.send_if_modified(|current| {
            if current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        result
    }

    /// Current view state
    pub fn snapshot(&self) -> ViewState {
        self.state_tx.borrow().clone()
    }

    /// Receive every view state change
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The user picked a file
    pub fn file_chosen(&self, candidate: FileCandidate) -> Result<(), SelectionError> {
        self.with_machine(|machine| machine.file_chosen(candidate))
    }

    /// The user asked for an analysis.
    ///
    /// Runs one full attempt and returns the resulting state. If a request is
    /// already in flight this returns right away with the current state and
    /// sends nothing.
    pub async fn analyze(&self) -> Result<ViewState, SelectionError> {
        let pending = match self.with_machine(|machine| machine.analyze_requested())? {
            Admission::Started(pending) => pending,
            Admission::Suppressed => return Ok(self.snapshot()),
        };

        debug!(backend = self.backend.name(), ticket = ?pending.ticket, "Dispatching analysis");
        let outcome = self.backend.submit(&pending.file).await;

        self.with_machine(|machine| machine.complete(pending.ticket, outcome));
        Ok(self.snapshot())
    }
}
