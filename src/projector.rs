//! Projection of an individual onto a contact record, one field group at a
//! time.
//!
//! Every group is cleared before it is re-derived, so projecting the same
//! individual twice gives the same record. The only asynchronous path is an
//! avatar that exists only as image data and is not yet in the avatar cache;
//! that is returned to the caller as an [`AvatarFetch`].

use std::rc::Rc;

use crate::engine::avatar::file_uri;
use crate::engine::{self, AvatarCache, AvatarIcon, DetailSet, Individual, PresenceType};
use crate::models::{
    Address, Avatar, Contact, ContactId, ContactUrl, EmailAddress, FieldGroup, Gender,
    GlobalPresence, Name, Note, OnlineAccount, Organization, PhoneNumber, PresenceState,
};
use crate::translate;

/// Avatar image data that still has to be written to the avatar cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarFetch {
    pub contact_id: ContactId,
    pub individual_id: String,
    pub data: Vec<u8>,
}

pub struct Projector {
    avatar_cache: Rc<dyn AvatarCache>,
}

impl Projector {
    pub fn new(avatar_cache: Rc<dyn AvatarCache>) -> Self {
        Self { avatar_cache }
    }

    pub fn avatar_cache(&self) -> Rc<dyn AvatarCache> {
        self.avatar_cache.clone()
    }

    /// Re-derive `groups` of `contact` from the individual's current details.
    pub fn project(
        &self,
        contact: &mut Contact,
        individual: &dyn Individual,
        groups: &[FieldGroup],
    ) -> Option<AvatarFetch> {
        let details = individual.details();
        let mut fetch = None;
        for group in groups {
            // A missing label keeps whatever the contact already carries.
            if *group != FieldGroup::DisplayLabel {
                contact.clear_group(*group);
            }
            if let Some(pending) = self.project_group(contact, individual.id(), &details, *group) {
                fetch = Some(pending);
            }
        }
        fetch
    }

    fn project_group(
        &self,
        contact: &mut Contact,
        individual_id: &str,
        details: &DetailSet,
        group: FieldGroup,
    ) -> Option<AvatarFetch> {
        match group {
            FieldGroup::DisplayLabel => {
                if let Some(label) = display_label(details) {
                    contact.display_label = Some(label);
                }
            }
            FieldGroup::Name => contact.name = name(details),
            FieldGroup::Nickname => contact.nickname = non_empty(details.nickname.as_deref()),
            FieldGroup::Presence => contact.global_presence = presence(details),
            FieldGroup::Birthday => contact.birthday = details.birthday,
            FieldGroup::Gender => contact.gender = gender(details.gender),
            FieldGroup::Favorite => contact.favorite = Some(details.is_favourite),
            FieldGroup::Avatar => return self.avatar(contact, individual_id, details),
            FieldGroup::Addresses => contact.addresses = addresses(details),
            FieldGroup::EmailAddresses => contact.email_addresses = email_addresses(details),
            FieldGroup::PhoneNumbers => contact.phone_numbers = phone_numbers(details),
            FieldGroup::OnlineAccounts => contact.online_accounts = online_accounts(details),
            FieldGroup::Organizations => contact.organizations = organizations(details),
            FieldGroup::Notes => contact.notes = notes(details),
            FieldGroup::Urls => contact.urls = urls(details),
        }
        None
    }

    fn avatar(
        &self,
        contact: &mut Contact,
        individual_id: &str,
        details: &DetailSet,
    ) -> Option<AvatarFetch> {
        match details.avatar.as_ref()? {
            AvatarIcon::File { uri } => {
                contact.avatar = Some(Avatar {
                    image_url: uri.clone(),
                });
                None
            }
            AvatarIcon::Bytes { data } => {
                let path = self.avatar_cache.cached_path(individual_id);
                if path.exists() {
                    contact.avatar = Some(Avatar {
                        image_url: file_uri(&path),
                    });
                    return None;
                }
                Some(AvatarFetch {
                    contact_id: contact.id.clone()?,
                    individual_id: individual_id.to_string(),
                    data: data.clone(),
                })
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Nickname, else alias, else full name.
pub fn display_label(details: &DetailSet) -> Option<String> {
    non_empty(details.nickname.as_deref())
        .or_else(|| non_empty(details.alias.as_deref()))
        .or_else(|| non_empty(details.full_name.as_deref()))
}

/// Name from the full name. The structured name is not consulted: backends
/// set it once at creation and then only update the full name.
fn name(details: &DetailSet) -> Option<Name> {
    non_empty(details.full_name.as_deref()).map(|full| Name::from_full_name(&full))
}

fn presence_state(presence: PresenceType) -> PresenceState {
    match presence {
        PresenceType::Offline => PresenceState::Offline,
        PresenceType::Available => PresenceState::Available,
        PresenceType::Away => PresenceState::Away,
        PresenceType::ExtendedAway => PresenceState::ExtendedAway,
        PresenceType::Hidden => PresenceState::Hidden,
        PresenceType::Busy => PresenceState::Busy,
        PresenceType::Unset | PresenceType::Unknown | PresenceType::Error => PresenceState::Unknown,
    }
}

fn presence(details: &DetailSet) -> Option<GlobalPresence> {
    if details.presence_type == PresenceType::Unset {
        return None;
    }
    let alias = non_empty(details.alias.as_deref())?;
    Some(GlobalPresence {
        state: presence_state(details.presence_type),
        custom_message: details.presence_message.clone(),
        nickname: alias,
    })
}

fn gender(gender: engine::Gender) -> Option<Gender> {
    match gender {
        engine::Gender::Male => Some(Gender::Male),
        engine::Gender::Female => Some(Gender::Female),
        engine::Gender::Unspecified => None,
    }
}

fn addresses(details: &DetailSet) -> Vec<Address> {
    details
        .postal_addresses
        .iter()
        .map(|fd| {
            let tags = translate::tags_of(fd);
            Address {
                post_office_box: fd.value.po_box.clone(),
                street: fd.value.street.clone(),
                locality: fd.value.locality.clone(),
                region: fd.value.region.clone(),
                postcode: fd.value.postal_code.clone(),
                country: fd.value.country.clone(),
                contexts: translate::contexts_from_tags(&tags),
                sub_types: translate::address_sub_types_from_tags(&tags),
            }
        })
        .collect()
}

fn email_addresses(details: &DetailSet) -> Vec<EmailAddress> {
    details
        .email_addresses
        .iter()
        .map(|fd| EmailAddress {
            email_address: fd.value.clone(),
            contexts: translate::contexts_from_tags(fd.types()),
        })
        .collect()
}

fn phone_numbers(details: &DetailSet) -> Vec<PhoneNumber> {
    details
        .phone_numbers
        .iter()
        .map(|fd| PhoneNumber {
            number: fd.value.clone(),
            contexts: translate::contexts_from_tags(fd.types()),
            sub_types: translate::phone_sub_types_from_tags(fd.types()),
        })
        .collect()
}

fn online_accounts(details: &DetailSet) -> Vec<OnlineAccount> {
    details
        .im_addresses
        .iter()
        .flat_map(|(protocol, accounts)| {
            let protocol = translate::protocol_from_tag(protocol);
            accounts.iter().map(move |fd| OnlineAccount {
                account_uri: fd.value.clone(),
                protocol,
                contexts: translate::contexts_from_tags(fd.types()),
                sub_types: translate::online_account_sub_types_from_tags(fd.types()),
            })
        })
        .collect()
}

fn organizations(details: &DetailSet) -> Vec<Organization> {
    details
        .roles
        .iter()
        .map(|fd| Organization {
            name: fd.value.organisation_name.clone(),
            title: fd.value.title.clone(),
            role: fd.value.role.clone(),
            contexts: translate::contexts_from_tags(fd.types()),
        })
        .collect()
}

fn notes(details: &DetailSet) -> Vec<Note> {
    details
        .notes
        .iter()
        .map(|fd| Note {
            note: fd.value.clone(),
            contexts: translate::contexts_from_tags(fd.types()),
        })
        .collect()
}

fn urls(details: &DetailSet) -> Vec<ContactUrl> {
    details
        .urls
        .iter()
        .map(|fd| ContactUrl {
            url: fd.value.clone(),
            contexts: translate::contexts_from_tags(fd.types()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        FieldDetails, FileAvatarCache, IndividualSpec, MemoryAggregator, PersonaSpec,
        PostalAddress, Role,
    };
    use crate::models::{AddressSubType, Context, PhoneSubType, Protocol};
    use chrono::TimeZone;

    fn project_details(details: DetailSet) -> (Contact, Option<AvatarFetch>) {
        let cache = Rc::new(FileAvatarCache::new("/nonexistent/folks-avatars"));
        let engine = MemoryAggregator::new(cache.clone());
        engine.add_store("eds", true);
        let individual =
            engine.add_individual(IndividualSpec::new("ind").persona(PersonaSpec::new("eds", details)));
        let projector = Projector::new(cache);
        let mut contact = Contact::new();
        contact.id = Some(ContactId::for_key("contacts:folks:", "ind"));
        let fetch = projector.project(&mut contact, individual.as_ref(), &FieldGroup::ALL);
        (contact, fetch)
    }

    fn full_name(name: &str) -> DetailSet {
        DetailSet {
            full_name: Some(name.to_string()),
            ..DetailSet::default()
        }
    }

    #[test]
    fn test_full_name_split() {
        let (contact, _) = project_details(full_name("Jane Doe"));
        let name = contact.name.unwrap();
        assert_eq!(name.first_name.as_deref(), Some("Jane"));
        assert_eq!(name.last_name.as_deref(), Some("Doe"));

        let (contact, _) = project_details(full_name("Madonna"));
        let name = contact.name.unwrap();
        assert_eq!(name.first_name.as_deref(), Some("Madonna"));
        assert_eq!(name.last_name, None);
    }

    #[test]
    fn test_structured_name_is_not_consulted() {
        let mut details = full_name("Jane Doe");
        details.structured_name = Some(crate::engine::StructuredName {
            family_name: "Smith".to_string(),
            given_name: "Janet".to_string(),
            ..Default::default()
        });
        let (contact, _) = project_details(details);
        assert_eq!(contact.name.unwrap().last_name.as_deref(), Some("Doe"));
    }

    #[test]
    fn test_display_label_fallbacks() {
        let mut details = full_name("Jane Doe");
        details.alias = Some("jd".to_string());
        details.nickname = Some("Janie".to_string());
        assert_eq!(display_label(&details).as_deref(), Some("Janie"));

        details.nickname = Some(String::new());
        assert_eq!(display_label(&details).as_deref(), Some("jd"));

        details.alias = None;
        assert_eq!(display_label(&details).as_deref(), Some("Jane Doe"));

        assert_eq!(display_label(&DetailSet::default()), None);
    }

    #[test]
    fn test_missing_label_keeps_existing_label() {
        let cache = Rc::new(FileAvatarCache::new("/nonexistent/folks-avatars"));
        let engine = MemoryAggregator::new(cache.clone());
        engine.add_store("eds", true);
        let individual = engine.add_individual(
            IndividualSpec::new("ind").persona(PersonaSpec::new("eds", DetailSet::default())),
        );
        let projector = Projector::new(cache);
        let mut contact = Contact::new();
        contact.display_label = Some("Old Label".to_string());
        projector.project(&mut contact, individual.as_ref(), &[FieldGroup::DisplayLabel]);
        assert_eq!(contact.display_label.as_deref(), Some("Old Label"));

        let details = DetailSet {
            alias: Some("jd".to_string()),
            ..DetailSet::default()
        };
        let individual =
            engine.add_individual(IndividualSpec::new("ind2").persona(PersonaSpec::new("eds", details)));
        projector.project(&mut contact, individual.as_ref(), &[FieldGroup::DisplayLabel]);
        assert_eq!(contact.display_label.as_deref(), Some("jd"));
    }

    #[test]
    fn test_presence_requires_type_and_alias() {
        let mut details = DetailSet {
            presence_type: PresenceType::Away,
            presence_message: "lunch".to_string(),
            ..DetailSet::default()
        };
        assert_eq!(presence(&details), None);

        details.alias = Some("jd".to_string());
        let p = presence(&details).unwrap();
        assert_eq!(p.state, PresenceState::Away);
        assert_eq!(p.custom_message, "lunch");
        assert_eq!(p.nickname, "jd");

        details.presence_type = PresenceType::Unset;
        assert_eq!(presence(&details), None);

        details.presence_type = PresenceType::Error;
        assert_eq!(presence(&details).unwrap().state, PresenceState::Unknown);
    }

    #[test]
    fn test_gender_unspecified_is_omitted() {
        let (contact, _) = project_details(DetailSet::default());
        assert_eq!(contact.gender, None);
        assert_eq!(contact.favorite, Some(false));

        let (contact, _) = project_details(DetailSet {
            gender: engine::Gender::Female,
            ..DetailSet::default()
        });
        assert_eq!(contact.gender, Some(Gender::Female));
    }

    #[test]
    fn test_repeated_groups_carry_tags() {
        let mut details = DetailSet::default();
        details.phone_numbers.push(
            FieldDetails::new("555-0100".to_string()).with_types(["work", "mobile"]),
        );
        details.postal_addresses.push(
            FieldDetails::new(PostalAddress {
                street: "1 Main St".to_string(),
                locality: "Springfield".to_string(),
                ..PostalAddress::default()
            })
            .with_types(["home", "parcel"]),
        );
        details.im_addresses.insert(
            "jabber".to_string(),
            vec![FieldDetails::new("jane@jabber.example".to_string()).with_types(["impp"])],
        );
        details.roles.push(FieldDetails::new(Role {
            title: "Engineer".to_string(),
            organisation_name: "Acme".to_string(),
            role: String::new(),
        }));

        let (contact, _) = project_details(details);
        assert_eq!(contact.phone_numbers[0].contexts, vec![Context::Work]);
        assert_eq!(contact.phone_numbers[0].sub_types, vec![PhoneSubType::Mobile]);
        assert_eq!(contact.addresses[0].contexts, vec![Context::Home]);
        assert_eq!(contact.addresses[0].sub_types, vec![AddressSubType::Parcel]);
        assert_eq!(contact.online_accounts[0].protocol, Protocol::Jabber);
        assert_eq!(contact.organizations[0].name, "Acme");
        assert_eq!(contact.organizations[0].title, "Engineer");
    }

    #[test]
    fn test_projection_is_idempotent() {
        let mut details = full_name("Jane Doe");
        details.alias = Some("jd".to_string());
        details.presence_type = PresenceType::Available;
        details.birthday = Some(chrono::Utc.with_ymd_and_hms(1980, 5, 17, 0, 0, 0).unwrap());
        details
            .email_addresses
            .push(FieldDetails::new("jane@example.com".to_string()).with_types(["home"]));

        let cache = Rc::new(FileAvatarCache::new("/nonexistent/folks-avatars"));
        let engine = MemoryAggregator::new(cache.clone());
        engine.add_store("eds", true);
        let individual = engine
            .add_individual(IndividualSpec::new("ind").persona(PersonaSpec::new("eds", details)));
        let projector = Projector::new(cache);

        let mut first = Contact::new();
        projector.project(&mut first, individual.as_ref(), &FieldGroup::ALL);
        let mut second = first.clone();
        projector.project(&mut second, individual.as_ref(), &FieldGroup::ALL);
        assert_eq!(first, second);
    }

    #[test]
    fn test_avatar_file_is_synchronous() {
        let (contact, fetch) = project_details(DetailSet {
            avatar: Some(AvatarIcon::File {
                uri: "file:///tmp/jane.png".to_string(),
            }),
            ..DetailSet::default()
        });
        assert_eq!(fetch, None);
        assert_eq!(contact.avatar.unwrap().image_url, "file:///tmp/jane.png");
    }

    #[test]
    fn test_uncached_avatar_data_is_fetched() {
        let (contact, fetch) = project_details(DetailSet {
            avatar: Some(AvatarIcon::Bytes {
                data: b"png".to_vec(),
            }),
            ..DetailSet::default()
        });
        assert_eq!(contact.avatar, None);
        let fetch = fetch.unwrap();
        assert_eq!(fetch.individual_id, "ind");
        assert_eq!(fetch.data, b"png");
    }

    #[test]
    fn test_cached_avatar_is_used_directly() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Rc::new(FileAvatarCache::new(dir.path()));
        std::fs::write(cache.cached_path("ind"), b"png").unwrap();

        let engine = MemoryAggregator::new(cache.clone());
        engine.add_store("eds", true);
        let individual = engine.add_individual(IndividualSpec::new("ind").persona(PersonaSpec::new(
            "eds",
            DetailSet {
                avatar: Some(AvatarIcon::Bytes {
                    data: b"png".to_vec(),
                }),
                ..DetailSet::default()
            },
        )));
        let mut contact = Contact::new();
        contact.id = Some(ContactId::for_key("contacts:folks:", "ind"));
        let fetch = Projector::new(cache).project(&mut contact, individual.as_ref(), &[FieldGroup::Avatar]);
        assert_eq!(fetch, None);
        assert!(contact.avatar.unwrap().image_url.starts_with("file://"));
    }
}
