//! Upload state machine
//!
//! Owns the single `ViewState` and moves it only through named transitions:
//!
//! | From | Event | To |
//! |------|-------|----|
//! | Idle, Ready, Success, Failed, Analyzing | file chosen | Ready |
//! | Ready, Failed, Success | analyze requested | Analyzing |
//! | Analyzing | analyze requested | Analyzing (suppressed) |
//! | Analyzing | completed with a result | Success |
//! | Analyzing | completed with an error | Failed |
//!
//! Each admitted request gets a `Ticket`. A completion carrying anything other
//! than the current ticket is stale and ignored, so a late response can never
//! overwrite a newer state.

use crate::client::{AnalysisError, AnalysisOutcome};
use crate::normalize::{AnalysisResult, normalize};
use crate::selection::{FileCandidate, FileSelection, SelectedFile, SelectionError};
use tracing::{debug, info};

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ViewState {
    #[default]
    Idle,
    Ready(SelectedFile),
    Analyzing(SelectedFile),
    Success(AnalysisResult),
    Failed(AnalysisError),
}

impl ViewState {
    /// Short state name for logging
    pub fn label(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::Ready(_) => "ready",
            ViewState::Analyzing(_) => "analyzing",
            ViewState::Success(_) => "success",
            ViewState::Failed(_) => "failed",
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, ViewState::Analyzing(_))
    }
}

/// Identifies one admitted analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// A request the caller must now send to the analysis backend
#[derive(Debug, Clone)]
pub struct PendingAnalysis {
    pub ticket: Ticket,
    pub file: SelectedFile,
}

/// Result of asking for an analysis
#[derive(Debug, Clone)]
pub enum Admission {
    /// A new request was admitted
    Started(PendingAnalysis),
    /// A request is already in flight; nothing new is sent
    Suppressed,
}

/// Request lifecycle state machine
#[derive(Debug, Default)]
pub struct UploadStateMachine {
    state: ViewState,
    selection: FileSelection,
    next_ticket: u64,
    in_flight: Option<Ticket>,
}

impl UploadStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// The file that would be uploaded by the next request
    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selection.current()
    }

    fn transition(&mut self, next: ViewState) {
        debug!(from = self.state.label(), to = next.label(), "View state transition");
        self.state = next;
    }

    /// The user picked a file.
    ///
    /// Moves to `Ready` from every state. Choosing while a request is in
    /// flight makes that request's outcome stale. A non-image candidate is
    /// rejected without any transition.
    pub fn file_chosen(&mut self, candidate: FileCandidate) -> Result<(), SelectionError> {
        let file = self.selection.choose(candidate)?.clone();

        if let Some(ticket) = self.in_flight.take() {
            info!(?ticket, "New file chosen while analyzing; in-flight result will be discarded");
        }

        info!(file = file.name(), bytes = file.size(), "File selected");
        self.transition(ViewState::Ready(file));
        Ok(())
    }

    /// The user asked for an analysis.
    ///
    /// Returns `NoFileSelected` if nothing was chosen yet. While a request is
    /// in flight further requests are suppressed.
    pub fn analyze_requested(&mut self) -> Result<Admission, SelectionError> {
        if self.state.is_analyzing() {
            debug!("Analysis already in flight; request suppressed");
            return Ok(Admission::Suppressed);
        }

        let file = self
            .selection
            .current()
            .cloned()
            .ok_or(SelectionError::NoFileSelected)?;

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.in_flight = Some(ticket);

        info!(?ticket, file = file.name(), "Analysis started");
        self.transition(ViewState::Analyzing(file.clone()));
        Ok(Admission::Started(PendingAnalysis { ticket, file }))
    }

    /// Apply the outcome of a request.
    ///
    /// Returns `false` and changes nothing when the ticket is stale.
    pub fn complete(&mut self, ticket: Ticket, outcome: AnalysisOutcome) -> bool {
        if self.in_flight != Some(ticket) || !self.state.is_analyzing() {
            debug!(?ticket, state = self.state.label(), "Discarding stale analysis outcome");
            return false;
        }
        self.in_flight = None;

        let next = match outcome.and_then(|body| normalize(&body)) {
            Ok(result) => {
                info!(?ticket, fields = result.field_count(), "Analysis succeeded");
                ViewState::Success(result)
            }
            Err(error) => {
                info!(?ticket, %error, "Analysis failed");
                ViewState::Failed(error)
            }
        };
        self.transition(next);
        true
    }
}
