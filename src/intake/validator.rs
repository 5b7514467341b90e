//! Field validation for each intake step
//!
//! Pure functions: the same (step, input) always yields the same result.

use super::state::{DocumentRef, Step};
use thiserror::Error;

pub const DEFAULT_BATCHES: &[&str] = &["rm", "tym", "oym"];
pub const DEFAULT_TEST_TYPES: &[&str] = &["FTS", "AIATS", "PT", "TE", "NRT"];

const PDF_SUFFIX: &str = ".pdf";

/// Validation failure. The message is shown to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown batch \"{input}\". Allowed: {allowed}")]
    InvalidBatch { input: String, allowed: String },
    #[error("Unknown test type \"{input}\". Allowed: {allowed}")]
    InvalidTestType { input: String, allowed: String },
    #[error("Test name cannot be empty.")]
    EmptyTestName,
    #[error("Please send a PDF document.")]
    InvalidFileType,
    #[error("Please send this as a text message.")]
    TextExpected,
    #[error("No input is expected at step {0}.")]
    StepClosed(Step),
}

/// Raw operator input for a step
#[derive(Debug, Clone, Copy)]
pub enum StepInput<'a> {
    Text(&'a str),
    Document(&'a DocumentRef),
}

/// Value accepted by a step, already normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedValue {
    Batch(String),
    TestType(String),
    TestName(String),
    File(String),
}

/// Allowed values for the enumerated fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRules {
    batches: Vec<String>,
    test_types: Vec<String>,
}

impl Default for IntakeRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_BATCHES.iter().copied(),
            DEFAULT_TEST_TYPES.iter().copied(),
        )
    }
}

impl IntakeRules {
    /// Build rules from raw lists. Entries are normalized the same way operator
    /// input is; blanks and duplicates are dropped.
    pub fn new<B, T>(batches: B, test_types: T) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            batches: normalize_set(batches, str::to_lowercase),
            test_types: normalize_set(test_types, str::to_uppercase),
        }
    }

    pub fn batches(&self) -> &[String] {
        &self.batches
    }

    pub fn test_types(&self) -> &[String] {
        &self.test_types
    }

    /// Validate `input` for `step`
    pub fn validate(
        &self,
        step: Step,
        input: StepInput<'_>,
    ) -> Result<NormalizedValue, ValidationError> {
        match (step, input) {
            (Step::AwaitingBatch, StepInput::Text(text)) => {
                self.validate_batch(text).map(NormalizedValue::Batch)
            }
            (Step::AwaitingTestType, StepInput::Text(text)) => {
                self.validate_test_type(text).map(NormalizedValue::TestType)
            }
            (Step::AwaitingTestName, StepInput::Text(text)) => {
                validate_test_name(text).map(NormalizedValue::TestName)
            }
            (
                Step::AwaitingBatch | Step::AwaitingTestType | Step::AwaitingTestName,
                StepInput::Document(_),
            ) => Err(ValidationError::TextExpected),
            (Step::AwaitingFile, StepInput::Document(document)) => {
                validate_document(Some(document)).map(NormalizedValue::File)
            }
            (Step::AwaitingFile, StepInput::Text(_)) => Err(ValidationError::InvalidFileType),
            (step @ (Step::Completed | Step::Cancelled), _) => {
                Err(ValidationError::StepClosed(step))
            }
        }
    }

    pub fn validate_batch(&self, raw: &str) -> Result<String, ValidationError> {
        let value = raw.trim().to_lowercase();
        if self.batches.contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid_batch(raw.trim()))
        }
    }

    pub fn validate_test_type(&self, raw: &str) -> Result<String, ValidationError> {
        let value = raw.trim().to_uppercase();
        if self.test_types.contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid_test_type(raw.trim()))
        }
    }

    fn invalid_batch(&self, input: &str) -> ValidationError {
        ValidationError::InvalidBatch {
            input: input.to_string(),
            allowed: self.batches.join(", "),
        }
    }

    fn invalid_test_type(&self, input: &str) -> ValidationError {
        ValidationError::InvalidTestType {
            input: input.to_string(),
            allowed: self.test_types.join(", "),
        }
    }
}

pub fn validate_test_name(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(ValidationError::EmptyTestName)
    } else {
        Ok(value.to_string())
    }
}

/// Accepts a document whose declared name ends in `.pdf`, any case.
/// Returns the file name to upload under.
pub fn validate_document(document: Option<&DocumentRef>) -> Result<String, ValidationError> {
    let name = document
        .and_then(|d| d.file_name.as_deref())
        .ok_or(ValidationError::InvalidFileType)?;

    if name.to_lowercase().ends_with(PDF_SUFFIX) {
        Ok(name.to_string())
    } else {
        Err(ValidationError::InvalidFileType)
    }
}

fn normalize_set<I>(values: I, normalize: fn(&str) -> String) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = normalize(value.as_ref().trim());
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
