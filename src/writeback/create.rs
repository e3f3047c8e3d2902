use tracing::{debug, warn};

use super::{
    avatar_icon, birthday, email_addresses, gender, im_addresses, notes, phone_numbers,
    postal_addresses, roles, structured_name, urls,
};
use crate::engine::{Aggregator, DetailSet, StoreHandle};
use crate::error::ManagerError;
use crate::models::{Contact, ContactId};

/// Build the engine detail set for a new persona from every populated group.
pub fn details_from_contact(contact: &Contact) -> DetailSet {
    let label = contact
        .display_label
        .as_ref()
        .filter(|l| !l.is_empty())
        .cloned();
    DetailSet {
        full_name: label.clone(),
        alias: label,
        nickname: contact.nickname.clone().filter(|n| !n.is_empty()),
        structured_name: structured_name(contact.name.as_ref()),
        birthday: contact.birthday.map(birthday),
        gender: gender(contact.gender),
        is_favourite: contact.favorite.unwrap_or(false),
        avatar: avatar_icon(contact.avatar.as_ref()),
        postal_addresses: postal_addresses(&contact.addresses),
        email_addresses: email_addresses(&contact.email_addresses),
        phone_numbers: phone_numbers(&contact.phone_numbers),
        im_addresses: im_addresses(&contact.online_accounts),
        roles: roles(&contact.organizations),
        notes: notes(&contact.notes),
        urls: urls(&contact.urls),
        ..DetailSet::default()
    }
}

/// Add `contact` as a new persona in `store` and return it with its new id.
pub async fn create_contact(
    aggregator: &dyn Aggregator,
    store: &StoreHandle,
    manager_uri: &str,
    mut contact: Contact,
) -> Result<Contact, ManagerError> {
    let details = details_from_contact(&contact);
    match aggregator.add_persona_from_details(store, details).await {
        Err(err) => {
            warn!(store = store.id(), error = %err, "failed to add individual from contact");
            Err(ManagerError::from_engine(&err))
        }
        Ok(None) => Err(ManagerError::AlreadyExists(
            contact.display_label_or_default().to_string(),
        )),
        Ok(Some(persona)) => {
            if let Some(individual) = persona.individual() {
                let id = ContactId::for_key(manager_uri, individual.id());
                debug!(contact_id = %id, persona = persona.uid(), "contact created");
                contact.id = Some(id);
            }
            Ok(contact)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, FileAvatarCache, MemoryAggregator, TYPE_PARAMETER};
    use crate::error::ErrorKind;
    use crate::models::{
        Avatar, Context, EmailAddress, Gender, Name, OnlineAccount, PhoneNumber, PhoneSubType,
        Protocol,
    };
    use chrono::TimeZone;
    use std::rc::Rc;

    fn jane() -> Contact {
        let mut contact = Contact::new();
        contact.display_label = Some("Jane Doe".to_string());
        contact.name = Some(Name::from_full_name("Jane Doe"));
        contact.nickname = Some("JD".to_string());
        contact.gender = Some(Gender::Female);
        contact.favorite = Some(true);
        contact.birthday = Some(chrono::Utc.with_ymd_and_hms(1980, 5, 17, 8, 30, 0).unwrap());
        contact.avatar = Some(Avatar {
            image_url: "file:///tmp/jane.png".to_string(),
        });
        contact
            .email_addresses
            .push(EmailAddress::new("jane@example.com").with_context(Context::Home));
        contact.phone_numbers.push(
            PhoneNumber::new("555-0100")
                .with_context(Context::Work)
                .with_sub_type(PhoneSubType::Mobile),
        );
        contact
            .online_accounts
            .push(OnlineAccount::new("jane@jabber.example", Protocol::Jabber));
        contact
    }

    fn engine() -> (MemoryAggregator, StoreHandle) {
        let engine = MemoryAggregator::new(Rc::new(FileAvatarCache::new("/tmp/folks-avatars")));
        let store: StoreHandle = engine.add_store("eds", true);
        engine.set_primary_store(Some("eds"));
        (engine, store)
    }

    #[test]
    fn test_details_from_contact() {
        let details = details_from_contact(&jane());
        assert_eq!(details.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(details.alias.as_deref(), Some("Jane Doe"));
        assert_eq!(details.structured_name.as_ref().unwrap().family_name, "Doe");
        assert!(details.is_favourite);
        assert_eq!(details.gender, crate::engine::Gender::Female);
        assert_eq!(
            details.phone_numbers[0].parameter_values(TYPE_PARAMETER),
            ["work".to_string(), "mobile".to_string()]
        );
        assert_eq!(details.im_addresses["jabber"][0].value, "jane@jabber.example");
        assert_eq!(details.nickname.as_deref(), Some("JD"));

        let mut blank = jane();
        blank.nickname = Some(String::new());
        assert!(details_from_contact(&blank).nickname.is_none());
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let (engine, store) = engine();
        let created = create_contact(&engine, &store, "contacts:folks:", jane())
            .await
            .unwrap();
        let id = created.id.unwrap();
        assert!(id.local_id.starts_with("sql-"));
        assert_eq!(id.manager_uri, "contacts:folks:");
    }

    #[tokio::test]
    async fn test_create_existing_persona() {
        let (engine, store) = engine();
        engine.set_add_returns_existing(true);
        let err = create_contact(&engine, &store, "contacts:folks:", jane())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_create_maps_engine_errors() {
        let (engine, store) = engine();
        engine.fail_next_add(EngineError::StoreOffline);
        let err = create_contact(&engine, &store, "contacts:folks:", jane())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);

        engine.fail_next_add(EngineError::AddFailed("bad".into()));
        let err = create_contact(&engine, &store, "contacts:folks:", jane())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
    }
}
