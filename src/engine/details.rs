//! Native detail surface of the aggregation engine.
//!
//! Repeated details are carried as [`FieldDetails`] values: the detail itself
//! plus a multimap of string parameters. The `"type"` parameter holds the
//! category tags ("home", "work", "mobile", ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const TYPE_PARAMETER: &str = "type";

pub type Parameters = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDetails<T> {
    pub value: T,
    #[serde(default)]
    pub parameters: Parameters,
}

impl<T> FieldDetails<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            parameters: Parameters::new(),
        }
    }

    /// Add a parameter value; a value already present under `name` is kept once.
    pub fn add_parameter(&mut self, name: &str, value: &str) {
        let values = self.parameters.entry(name.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for t in types {
            self.add_parameter(TYPE_PARAMETER, t.as_ref());
        }
        self
    }

    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.parameters.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn types(&self) -> &[String] {
        self.parameter_values(TYPE_PARAMETER)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredName {
    pub family_name: String,
    pub given_name: String,
    pub additional_names: String,
    pub prefixes: String,
    pub suffixes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostalAddress {
    pub po_box: String,
    pub extension: String,
    pub street: String,
    pub locality: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub title: String,
    pub organisation_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceType {
    #[default]
    Unset,
    Offline,
    Available,
    Away,
    ExtendedAway,
    Hidden,
    Busy,
    Unknown,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Unspecified,
    Male,
    Female,
}

/// Avatar as the engine hands it out: either a file the engine already owns,
/// or raw image data that has to go through the avatar cache first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AvatarIcon {
    File { uri: String },
    Bytes { data: Vec<u8> },
}

/// Online accounts keyed by protocol tag.
pub type ImAddresses = BTreeMap<String, Vec<FieldDetails<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSet {
    pub full_name: Option<String>,
    pub structured_name: Option<StructuredName>,
    pub nickname: Option<String>,
    pub alias: Option<String>,
    pub presence_type: PresenceType,
    pub presence_message: String,
    pub birthday: Option<DateTime<Utc>>,
    pub gender: Gender,
    pub is_favourite: bool,
    pub avatar: Option<AvatarIcon>,
    pub email_addresses: Vec<FieldDetails<String>>,
    pub phone_numbers: Vec<FieldDetails<String>>,
    pub postal_addresses: Vec<FieldDetails<PostalAddress>>,
    pub im_addresses: ImAddresses,
    pub roles: Vec<FieldDetails<Role>>,
    pub notes: Vec<FieldDetails<String>>,
    pub urls: Vec<FieldDetails<String>>,
}

impl DetailSet {
    /// Aggregate several persona detail sets into one individual view.
    ///
    /// Single-valued details come from the first persona that has them;
    /// repeated details are the union, in persona order.
    pub fn merge<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a DetailSet>,
    {
        let mut merged = DetailSet::default();
        for set in sets {
            fill(&mut merged.full_name, &set.full_name);
            fill(&mut merged.structured_name, &set.structured_name);
            fill(&mut merged.nickname, &set.nickname);
            fill(&mut merged.alias, &set.alias);
            fill(&mut merged.birthday, &set.birthday);
            fill(&mut merged.avatar, &set.avatar);
            if merged.presence_type == PresenceType::Unset {
                merged.presence_type = set.presence_type;
                merged.presence_message = set.presence_message.clone();
            }
            if merged.gender == Gender::Unspecified {
                merged.gender = set.gender;
            }
            merged.is_favourite |= set.is_favourite;
            union(&mut merged.email_addresses, &set.email_addresses);
            union(&mut merged.phone_numbers, &set.phone_numbers);
            union(&mut merged.postal_addresses, &set.postal_addresses);
            union(&mut merged.roles, &set.roles);
            union(&mut merged.notes, &set.notes);
            union(&mut merged.urls, &set.urls);
            for (protocol, accounts) in &set.im_addresses {
                union(
                    merged.im_addresses.entry(protocol.clone()).or_default(),
                    accounts,
                );
            }
        }
        merged
    }
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

fn union<T: Clone + PartialEq>(target: &mut Vec<T>, source: &[T]) {
    for item in source {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Named properties an individual or persona notifies about and that a
/// persona may be able to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    Alias,
    StructuredName,
    FullName,
    Nickname,
    PresenceType,
    PresenceMessage,
    Birthday,
    EmailAddresses,
    ImAddresses,
    IsFavourite,
    Gender,
    Notes,
    Roles,
    PhoneNumbers,
    PostalAddresses,
    Urls,
    Avatar,
}

impl Property {
    pub const ALL: [Property; 17] = [
        Property::Alias,
        Property::StructuredName,
        Property::FullName,
        Property::Nickname,
        Property::PresenceType,
        Property::PresenceMessage,
        Property::Birthday,
        Property::EmailAddresses,
        Property::ImAddresses,
        Property::IsFavourite,
        Property::Gender,
        Property::Notes,
        Property::Roles,
        Property::PhoneNumbers,
        Property::PostalAddresses,
        Property::Urls,
        Property::Avatar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Alias => "alias",
            Self::StructuredName => "structured-name",
            Self::FullName => "full-name",
            Self::Nickname => "nickname",
            Self::PresenceType => "presence-type",
            Self::PresenceMessage => "presence-message",
            Self::Birthday => "birthday",
            Self::EmailAddresses => "email-addresses",
            Self::ImAddresses => "im-addresses",
            Self::IsFavourite => "is-favourite",
            Self::Gender => "gender",
            Self::Notes => "notes",
            Self::Roles => "roles",
            Self::PhoneNumbers => "phone-numbers",
            Self::PostalAddresses => "postal-addresses",
            Self::Urls => "urls",
            Self::Avatar => "avatar",
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of properties a persona implements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Property>);

impl Capabilities {
    pub fn all() -> Self {
        Self(Property::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(properties: &[Property]) -> Self {
        Self(properties.iter().copied().collect())
    }

    pub fn supports(&self, property: Property) -> bool {
        self.0.contains(&property)
    }

    pub fn without(mut self, property: Property) -> Self {
        self.0.remove(&property);
        self
    }
}

/// One asynchronous detail mutation on a persona.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailChange {
    PostalAddresses(Vec<FieldDetails<PostalAddress>>),
    Avatar(Option<AvatarIcon>),
    Birthday(Option<DateTime<Utc>>),
    IsFavourite(bool),
    FullName(String),
    Alias(String),
    StructuredName(Option<StructuredName>),
    Notes(Vec<FieldDetails<String>>),
    PhoneNumbers(Vec<FieldDetails<String>>),
    ImAddresses(ImAddresses),
    Roles(Vec<FieldDetails<Role>>),
    Urls(Vec<FieldDetails<String>>),
    EmailAddresses(Vec<FieldDetails<String>>),
    Gender(Gender),
}

impl DetailChange {
    pub fn property(&self) -> Property {
        match self {
            Self::PostalAddresses(_) => Property::PostalAddresses,
            Self::Avatar(_) => Property::Avatar,
            Self::Birthday(_) => Property::Birthday,
            Self::IsFavourite(_) => Property::IsFavourite,
            Self::FullName(_) => Property::FullName,
            Self::Alias(_) => Property::Alias,
            Self::StructuredName(_) => Property::StructuredName,
            Self::Notes(_) => Property::Notes,
            Self::PhoneNumbers(_) => Property::PhoneNumbers,
            Self::ImAddresses(_) => Property::ImAddresses,
            Self::Roles(_) => Property::Roles,
            Self::Urls(_) => Property::Urls,
            Self::EmailAddresses(_) => Property::EmailAddresses,
            Self::Gender(_) => Property::Gender,
        }
    }

    /// Write the change into a detail set.
    pub fn apply(self, details: &mut DetailSet) {
        match self {
            Self::PostalAddresses(v) => details.postal_addresses = v,
            Self::Avatar(v) => details.avatar = v,
            Self::Birthday(v) => details.birthday = v,
            Self::IsFavourite(v) => details.is_favourite = v,
            Self::FullName(v) => details.full_name = non_empty(v),
            Self::Alias(v) => details.alias = non_empty(v),
            Self::StructuredName(v) => details.structured_name = v,
            Self::Notes(v) => details.notes = v,
            Self::PhoneNumbers(v) => details.phone_numbers = v,
            Self::ImAddresses(v) => details.im_addresses = v,
            Self::Roles(v) => details.roles = v,
            Self::Urls(v) => details.urls = v,
            Self::EmailAddresses(v) => details.email_addresses = v,
            Self::Gender(v) => details.gender = v,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
