//! Validation reports returned by `Block::validate`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub kind: ValidationKind,
    pub text: String,
}

impl ValidationMessage {
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Error,
            text: text.into(),
        }
    }
}

/// Messages about one block usage; empty means valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    usage_id: String,
    messages: Vec<ValidationMessage>,
}

impl Validation {
    pub fn new(usage_id: impl Into<String>) -> Self {
        Self {
            usage_id: usage_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn usage_id(&self) -> &str {
        &self.usage_id
    }

    pub fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }

    pub fn add(&mut self, message: ValidationMessage) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.kind == ValidationKind::Error)
    }
}
