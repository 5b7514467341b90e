//! Intake conversation state machine
//!
//! Elm-style: a pure `transition` turns (state, event) into a new state plus
//! effects; the engine owns all I/O.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;
pub mod validator;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{Event, Inbound};
pub use state::{ChatId, DocumentRef, IntakeFields, IntakeState, OperatorId, Step, Submission};
pub use transition::{transition, IntakeContext, TransitionError};
pub use validator::IntakeRules;
