use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl EmailAddress {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            contexts: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.push(context);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.email_address.is_empty()
    }
}
