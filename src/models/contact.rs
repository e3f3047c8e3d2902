use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Address, CollectionId, ContactId, ContactUrl, EmailAddress, GlobalPresence, Name, Note,
    OnlineAccount, Organization, PhoneNumber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    #[default]
    Contact,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub image_url: String,
}

/// A named category of contact detail, projected and compared as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    DisplayLabel,
    Name,
    Nickname,
    Presence,
    Birthday,
    Gender,
    Favorite,
    Avatar,
    Addresses,
    EmailAddresses,
    PhoneNumbers,
    OnlineAccounts,
    Organizations,
    Notes,
    Urls,
}

impl FieldGroup {
    /// Every group, in the order a fresh contact is projected.
    pub const ALL: [FieldGroup; 15] = [
        FieldGroup::DisplayLabel,
        FieldGroup::Name,
        FieldGroup::Nickname,
        FieldGroup::Presence,
        FieldGroup::Birthday,
        FieldGroup::EmailAddresses,
        FieldGroup::OnlineAccounts,
        FieldGroup::Favorite,
        FieldGroup::Gender,
        FieldGroup::Notes,
        FieldGroup::Organizations,
        FieldGroup::PhoneNumbers,
        FieldGroup::Addresses,
        FieldGroup::Urls,
        FieldGroup::Avatar,
    ];
}

/// Generic contact record served to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Option<ContactId>,
    pub collection_id: Option<CollectionId>,
    #[serde(default)]
    pub contact_type: ContactType,
    pub display_label: Option<String>,
    pub name: Option<Name>,
    pub nickname: Option<String>,
    pub global_presence: Option<GlobalPresence>,
    pub birthday: Option<DateTime<Utc>>,
    pub gender: Option<Gender>,
    pub favorite: Option<bool>,
    pub avatar: Option<Avatar>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub online_accounts: Vec<OnlineAccount>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub urls: Vec<ContactUrl>,
}

impl Contact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every detail instance of `group`.
    pub fn clear_group(&mut self, group: FieldGroup) {
        match group {
            FieldGroup::DisplayLabel => self.display_label = None,
            FieldGroup::Name => self.name = None,
            FieldGroup::Nickname => self.nickname = None,
            FieldGroup::Presence => self.global_presence = None,
            FieldGroup::Birthday => self.birthday = None,
            FieldGroup::Gender => self.gender = None,
            FieldGroup::Favorite => self.favorite = None,
            FieldGroup::Avatar => self.avatar = None,
            FieldGroup::Addresses => self.addresses.clear(),
            FieldGroup::EmailAddresses => self.email_addresses.clear(),
            FieldGroup::PhoneNumbers => self.phone_numbers.clear(),
            FieldGroup::OnlineAccounts => self.online_accounts.clear(),
            FieldGroup::Organizations => self.organizations.clear(),
            FieldGroup::Notes => self.notes.clear(),
            FieldGroup::Urls => self.urls.clear(),
        }
    }

    pub fn display_label_or_default(&self) -> &str {
        self.display_label.as_deref().unwrap_or("(unnamed)")
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
    }

    pub fn primary_phone(&self) -> Option<&str> {
        self.phone_numbers.first().map(|p| p.number.as_str())
    }

    pub fn primary_location(&self) -> Option<String> {
        self.addresses.iter().find_map(|a| a.locality_region())
    }
}
