use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSubType {
    Parcel,
    Postal,
    Domestic,
    International,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub post_office_box: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub sub_types: Vec<AddressSubType>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.post_office_box.is_empty()
            && self.street.is_empty()
            && self.locality.is_empty()
            && self.region.is_empty()
            && self.postcode.is_empty()
            && self.country.is_empty()
    }

    pub fn locality_region(&self) -> Option<String> {
        match (self.locality.is_empty(), self.region.is_empty()) {
            (false, false) => Some(format!("{}, {}", self.locality, self.region)),
            (false, true) => Some(self.locality.clone()),
            (true, false) => Some(self.region.clone()),
            (true, true) => None,
        }
    }
}
