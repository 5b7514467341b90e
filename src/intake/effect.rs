//! Effects produced by state transitions

use super::state::Submission;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a text reply to the operator's chat
    Reply { text: String },

    /// Create a fresh session, replacing any existing one
    OpenSession,

    /// Store the new state in the session
    PersistState,

    /// Drop the session and everything collected in it
    DiscardSession,

    /// Fetch the document and send the submission to the endpoint
    Upload { submission: Submission },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    pub fn upload(submission: Submission) -> Self {
        Effect::Upload { submission }
    }
}
