//! Generation state machine.
//!
//! ```text
//! Idle ─▶ Validating ─▶ AdmissionCheck ─▶ InFlight ─▶ Persisting ─▶ Completed
//!            │                │               │            │
//!            └────────────────┴───────────────┴────────────┴──────▶ Failed
//! Completed / Failed ──next request──▶ Validating
//! ```

use std::sync::{Arc, Mutex};

use crate::models::FileEntry;

/// Phase of the current (or most recent) generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationPhase {
    /// No generation has run yet.
    #[default]
    Idle,

    /// Checking the credential and the request parameters.
    Validating,

    /// Asking the rate limiter for a generation slot.
    AdmissionCheck,

    /// Speech request is on the wire.  The only cancellable phase.
    InFlight,

    /// Audio received; writing the file and the index entry.
    Persisting,

    /// Finished; the new library entry.
    Completed(FileEntry),

    /// Finished with an error; its display message.
    Failed(String),
}

impl GenerationPhase {
    /// `true` while a generation owns the slot.
    ///
    /// ```
    /// use audiogen::generation::GenerationPhase;
    ///
    /// assert!(!GenerationPhase::Idle.is_busy());
    /// assert!(GenerationPhase::InFlight.is_busy());
    /// assert!(!GenerationPhase::Failed("boom".into()).is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GenerationPhase::Validating
                | GenerationPhase::AdmissionCheck
                | GenerationPhase::InFlight
                | GenerationPhase::Persisting
        )
    }

    /// Short label for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationPhase::Idle => "Idle",
            GenerationPhase::Validating => "Validating",
            GenerationPhase::AdmissionCheck => "Checking limits",
            GenerationPhase::InFlight => "Generating",
            GenerationPhase::Persisting => "Saving",
            GenerationPhase::Completed(_) => "Done",
            GenerationPhase::Failed(_) => "Failed",
        }
    }
}

/// Phase shared between the orchestrator and whoever displays it.
pub type SharedPhase = Arc<Mutex<GenerationPhase>>;

pub fn new_shared_phase() -> SharedPhase {
    Arc::new(Mutex::new(GenerationPhase::Idle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases_are_not_busy() {
        assert!(!GenerationPhase::Idle.is_busy());
        assert!(!GenerationPhase::Failed("x".into()).is_busy());
        for busy in [
            GenerationPhase::Validating,
            GenerationPhase::AdmissionCheck,
            GenerationPhase::InFlight,
            GenerationPhase::Persisting,
        ] {
            assert!(busy.is_busy(), "{} should be busy", busy.label());
        }
    }

    #[test]
    fn default_is_idle() {
        assert_eq!(GenerationPhase::default(), GenerationPhase::Idle);
        assert_eq!(*new_shared_phase().lock().unwrap(), GenerationPhase::Idle);
    }
}
