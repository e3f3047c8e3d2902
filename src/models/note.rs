use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub note: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl Note {
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            contexts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.note.is_empty()
    }
}
