use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneSubType {
    Landline,
    Mobile,
    Fax,
    Pager,
    Voice,
    Modem,
    Video,
    Car,
    BulletinBoardSystem,
    MessagingCapable,
    Assistant,
    DtmfMenu,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub sub_types: Vec<PhoneSubType>,
}

impl PhoneNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            contexts: Vec::new(),
            sub_types: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.push(context);
        self
    }

    pub fn with_sub_type(mut self, sub_type: PhoneSubType) -> Self {
        self.sub_types.push(sub_type);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_empty()
    }
}
