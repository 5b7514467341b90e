//! Pure state transition function
//!
//! Given the same state, context and event, `transition` always produces the
//! same new state and effects. All I/O happens in the engine.

use super::state::{IntakeFields, OperatorId, Step, Submission};
use super::validator::{IntakeRules, NormalizedValue, StepInput, ValidationError};
use super::{Effect, Event, IntakeState};
use crate::uploader::{Ack, UploadError};
use thiserror::Error;

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const TEST_NAME_PROMPT: &str = "Send test name (e.g. Test 1, AIATS March):";
pub const FILE_PROMPT: &str = "Send the PDF file now:";
pub const UPLOAD_SUCCESS: &str = "Upload successful!";
pub const CANCELLED: &str = "Upload cancelled.";
pub const NOT_IN_FLOW: &str = "No upload in progress. Send /start to begin.";

/// Immutable inputs to a transition besides the state itself
#[derive(Debug, Clone, Copy)]
pub struct IntakeContext<'a> {
    pub operator: OperatorId,
    pub authorized_operator: OperatorId,
    pub rules: &'a IntakeRules,
}

impl<'a> IntakeContext<'a> {
    pub fn new(
        operator: OperatorId,
        authorized_operator: OperatorId,
        rules: &'a IntakeRules,
    ) -> Self {
        Self {
            operator,
            authorized_operator,
            rules,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.operator == self.authorized_operator
    }
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: IntakeState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: IntakeState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message from {0} outside of an upload flow")]
    NotInFlow(OperatorId),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &IntakeState,
    ctx: &IntakeContext<'_>,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Start: the only place authorization is checked
        // ============================================================
        (_, Event::Start) if ctx.is_authorized() => {
            Ok(TransitionResult::new(IntakeState::AwaitingBatch)
                .with_effect(Effect::OpenSession)
                .with_effect(Effect::reply(batch_prompt(ctx.rules))))
        }

        (state, Event::Start) => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::reply(UNAUTHORIZED)))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (state, Event::Cancel) if state.is_awaiting() => {
            Ok(TransitionResult::new(IntakeState::Cancelled)
                .with_effect(Effect::reply(CANCELLED))
                .with_effect(Effect::DiscardSession))
        }

        // ============================================================
        // Outside of a flow
        // ============================================================
        (IntakeState::Idle, Event::Text { .. } | Event::Document { .. } | Event::Cancel) => {
            if ctx.is_authorized() {
                Ok(TransitionResult::new(IntakeState::Idle).with_effect(Effect::reply(NOT_IN_FLOW)))
            } else {
                Err(TransitionError::NotInFlow(ctx.operator))
            }
        }

        // ============================================================
        // Field collection
        // ============================================================
        (IntakeState::AwaitingBatch, Event::Text { text }) => {
            match ctx.rules.validate(Step::AwaitingBatch, StepInput::Text(&text)) {
                Ok(NormalizedValue::Batch(batch)) => Ok(advance(
                    IntakeState::AwaitingTestType { batch },
                    test_type_prompt(ctx.rules),
                )),
                other => Ok(reprompt(state, other, batch_prompt(ctx.rules))),
            }
        }

        (IntakeState::AwaitingTestType { batch }, Event::Text { text }) => {
            match ctx.rules.validate(Step::AwaitingTestType, StepInput::Text(&text)) {
                Ok(NormalizedValue::TestType(test_type)) => Ok(advance(
                    IntakeState::AwaitingTestName {
                        batch: batch.clone(),
                        test_type,
                    },
                    TEST_NAME_PROMPT.to_string(),
                )),
                other => Ok(reprompt(state, other, test_type_prompt(ctx.rules))),
            }
        }

        (IntakeState::AwaitingTestName { batch, test_type }, Event::Text { text }) => {
            match ctx.rules.validate(Step::AwaitingTestName, StepInput::Text(&text)) {
                Ok(NormalizedValue::TestName(test_name)) => Ok(advance(
                    IntakeState::AwaitingFile {
                        fields: IntakeFields {
                            batch: batch.clone(),
                            test_type: test_type.clone(),
                            test_name,
                        },
                    },
                    FILE_PROMPT.to_string(),
                )),
                other => Ok(reprompt(state, other, TEST_NAME_PROMPT.to_string())),
            }
        }

        (IntakeState::AwaitingFile { fields }, Event::Document { document }) => {
            match ctx.rules.validate(Step::AwaitingFile, StepInput::Document(&document)) {
                Ok(NormalizedValue::File(file_name)) => {
                    let submission = Submission {
                        fields: fields.clone(),
                        document,
                        file_name,
                    };
                    Ok(TransitionResult::new(IntakeState::Completed {
                        submission: submission.clone(),
                    })
                    .with_effect(Effect::PersistState)
                    .with_effect(Effect::upload(submission)))
                }
                other => Ok(reprompt(state, other, String::new())),
            }
        }

        // Wrong kind of input for the step is a validation failure of that step
        (
            IntakeState::AwaitingBatch
            | IntakeState::AwaitingTestType { .. }
            | IntakeState::AwaitingTestName { .. },
            Event::Document { document },
        ) => {
            let step = state.step().unwrap_or(Step::AwaitingBatch);
            let outcome = ctx.rules.validate(step, StepInput::Document(&document));
            Ok(reprompt(state, outcome, prompt_for(step, ctx.rules)))
        }

        (IntakeState::AwaitingFile { .. }, Event::Text { text }) => {
            let outcome = ctx.rules.validate(Step::AwaitingFile, StepInput::Text(&text));
            Ok(reprompt(state, outcome, String::new()))
        }

        // ============================================================
        // Upload outcome
        // ============================================================
        (IntakeState::Completed { .. }, Event::UploadFinished { result }) => {
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::reply(upload_report(&result)))
                .with_effect(Effect::DiscardSession))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {:?} with event {}",
            state.step(),
            event.kind()
        ))),
    }
}

/// Text shown to the operator once the upload attempt is over
pub fn upload_report(result: &Result<Ack, UploadError>) -> String {
    match result {
        Ok(Ack::Success) => UPLOAD_SUCCESS.to_string(),
        Err(e) => format!("Upload failed: {e}"),
    }
}

pub fn batch_prompt(rules: &IntakeRules) -> String {
    format!("Send batch (e.g. {}):", rules.batches().join(", "))
}

pub fn test_type_prompt(rules: &IntakeRules) -> String {
    format!("Send test type (e.g. {}):", rules.test_types().join(", "))
}

fn prompt_for(step: Step, rules: &IntakeRules) -> String {
    match step {
        Step::AwaitingBatch => batch_prompt(rules),
        Step::AwaitingTestType => test_type_prompt(rules),
        Step::AwaitingTestName => TEST_NAME_PROMPT.to_string(),
        Step::AwaitingFile | Step::Completed | Step::Cancelled => String::new(),
    }
}

fn advance(next: IntakeState, prompt: String) -> TransitionResult {
    TransitionResult::new(next)
        .with_effect(Effect::PersistState)
        .with_effect(Effect::Reply { text: prompt })
}

/// Keep the state as is and tell the operator what was wrong
fn reprompt(
    state: &IntakeState,
    outcome: Result<NormalizedValue, ValidationError>,
    prompt: String,
) -> TransitionResult {
    let error = match outcome {
        Err(e) => e.to_string(),
        // A value of the wrong kind for the step; cannot come out of the validator
        Ok(value) => format!("Unexpected value {value:?}"),
    };
    let text = if prompt.is_empty() {
        error
    } else {
        format!("{error}\n{prompt}")
    };
    TransitionResult::new(state.clone()).with_effect(Effect::Reply { text })
}
