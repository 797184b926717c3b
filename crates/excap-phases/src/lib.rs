//! The SWE phase state machine (C7) and cross-attempt learning state (C8).
//!
//! Has no knowledge of `excap-store`/`excap-runtime`; callers serialize
//! `SwePhaseState`/`AttemptState` into checkpoints via
//! `excap_runtime::checkpoint_orchestrator`'s generic `pause`/`resume`/`fork`.

pub mod attempt_state;
pub mod error;
pub mod swe_phase;

pub use attempt_state::{AttemptState, FailureContext};
pub use error::{Error, Result};
pub use swe_phase::{SwePhase, SwePhaseState, BUDGET_NEUTRAL_TOOLS, PHASE_NEUTRAL_TOOLS};
