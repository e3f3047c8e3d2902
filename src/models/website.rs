use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUrl {
    pub url: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl ContactUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            contexts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty()
    }
}
