mod address;
mod contact;
mod context;
mod email;
mod id;
mod name;
mod note;
mod online_account;
mod organization;
mod phone;
mod presence;
mod website;

pub use address::{Address, AddressSubType};
pub use contact::{Avatar, Contact, ContactType, FieldGroup, Gender};
pub use context::Context;
pub use email::EmailAddress;
pub use id::{
    hash_key, local_token, CollectionId, ContactId, COLLECTION_TOKEN_PREFIX,
    CONTACT_TOKEN_PREFIX, DEFAULT_COLLECTION,
};
pub use name::Name;
pub use note::Note;
pub use online_account::{OnlineAccount, OnlineAccountSubType, Protocol};
pub use organization::Organization;
pub use phone::{PhoneNumber, PhoneSubType};
pub use presence::{GlobalPresence, PresenceState};
pub use website::ContactUrl;
