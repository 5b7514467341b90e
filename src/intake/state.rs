//! Intake state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the person talking to the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub i64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat that replies are delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Collected data
// ============================================================================

/// Handle to a document received from the transport.
///
/// Only the declared name is inspected; the bytes are fetched when the upload
/// actually runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub file_name: Option<String>,
    pub file_id: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl DocumentRef {
    #[allow(dead_code)] // Test fixtures
    pub fn new(file_name: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            file_id: file_id.into(),
            size: None,
        }
    }
}

/// Metadata fields gathered before the document step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeFields {
    pub batch: String,
    pub test_type: String,
    pub test_name: String,
}

/// Everything needed for one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub fields: IntakeFields,
    pub document: DocumentRef,
    /// Validated file name (the document's declared name)
    pub file_name: String,
}

// ============================================================================
// Intake State
// ============================================================================

/// Step of the required-input sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AwaitingBatch,
    AwaitingTestType,
    AwaitingTestName,
    AwaitingFile,
    Completed,
    Cancelled,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::AwaitingBatch => "awaiting_batch",
            Step::AwaitingTestType => "awaiting_test_type",
            Step::AwaitingTestName => "awaiting_test_name",
            Step::AwaitingFile => "awaiting_file",
            Step::Completed => "completed",
            Step::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operator intake state.
///
/// Fields collected so far are carried by the variant itself, so a field can
/// only exist once its step has been passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeState {
    /// No session for this operator
    #[default]
    Idle,

    AwaitingBatch,

    AwaitingTestType {
        batch: String,
    },

    AwaitingTestName {
        batch: String,
        test_type: String,
    },

    AwaitingFile {
        fields: IntakeFields,
    },

    /// Document accepted, upload pending or in flight
    Completed {
        submission: Submission,
    },

    Cancelled,
}

impl IntakeState {
    /// Current step, `None` when there is no session
    pub fn step(&self) -> Option<Step> {
        match self {
            IntakeState::Idle => None,
            IntakeState::AwaitingBatch => Some(Step::AwaitingBatch),
            IntakeState::AwaitingTestType { .. } => Some(Step::AwaitingTestType),
            IntakeState::AwaitingTestName { .. } => Some(Step::AwaitingTestName),
            IntakeState::AwaitingFile { .. } => Some(Step::AwaitingFile),
            IntakeState::Completed { .. } => Some(Step::Completed),
            IntakeState::Cancelled => Some(Step::Cancelled),
        }
    }

    /// Terminal states end the session
    #[allow(dead_code)] // State query utility
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntakeState::Completed { .. } | IntakeState::Cancelled)
    }

    /// Waiting on operator input
    pub fn is_awaiting(&self) -> bool {
        matches!(
            self,
            IntakeState::AwaitingBatch
                | IntakeState::AwaitingTestType { .. }
                | IntakeState::AwaitingTestName { .. }
                | IntakeState::AwaitingFile { .. }
        )
    }

    #[allow(dead_code)] // State query utility
    pub fn batch(&self) -> Option<&str> {
        match self {
            IntakeState::AwaitingTestType { batch }
            | IntakeState::AwaitingTestName { batch, .. } => Some(batch),
            IntakeState::AwaitingFile { fields } => Some(&fields.batch),
            IntakeState::Completed { submission } => Some(&submission.fields.batch),
            _ => None,
        }
    }

    #[allow(dead_code)] // State query utility
    pub fn test_type(&self) -> Option<&str> {
        match self {
            IntakeState::AwaitingTestName { test_type, .. } => Some(test_type),
            IntakeState::AwaitingFile { fields } => Some(&fields.test_type),
            IntakeState::Completed { submission } => Some(&submission.fields.test_type),
            _ => None,
        }
    }

    #[allow(dead_code)] // State query utility
    pub fn test_name(&self) -> Option<&str> {
        match self {
            IntakeState::AwaitingFile { fields } => Some(&fields.test_name),
            IntakeState::Completed { submission } => Some(&submission.fields.test_name),
            _ => None,
        }
    }

    #[allow(dead_code)] // State query utility
    pub fn document(&self) -> Option<&DocumentRef> {
        match self {
            IntakeState::Completed { submission } => Some(&submission.document),
            _ => None,
        }
    }
}
