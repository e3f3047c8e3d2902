use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.title.is_empty() && self.role.is_empty()
    }

    /// "Title at Name", or whichever half is present.
    pub fn title_at_name(&self) -> Option<String> {
        match (self.title.is_empty(), self.name.is_empty()) {
            (false, false) => Some(format!("{} at {}", self.title, self.name)),
            (true, false) => Some(self.name.clone()),
            (false, true) => Some(self.title.clone()),
            (true, true) => None,
        }
    }
}
