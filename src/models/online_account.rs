use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Unknown,
    Aim,
    Icq,
    Irc,
    Jabber,
    Msn,
    Qq,
    Skype,
    Yahoo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineAccountSubType {
    Sip,
    SipVoip,
    Impp,
    VideoShare,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineAccount {
    pub account_uri: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub sub_types: Vec<OnlineAccountSubType>,
}

impl OnlineAccount {
    pub fn new(account_uri: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            account_uri: account_uri.into(),
            protocol,
            contexts: Vec::new(),
            sub_types: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_uri.is_empty()
    }
}
