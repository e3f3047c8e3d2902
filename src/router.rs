//! Turns engine notifications into contact notifications.
//!
//! Individuals go through `Unknown -> Tracked -> Removed`. The self
//! individual never becomes tracked. One engine cycle yields at most one
//! `Removed` batch followed by at most one `Added` batch.

use tracing::{debug, warn};

use crate::engine::{
    ChangeReason, EngineEvent, IndividualHandle, PersonaHandle, Property,
};
use crate::identity::IdentityMap;
use crate::models::{Avatar, CollectionId, Contact, ContactId, ContactType, FieldGroup, DEFAULT_COLLECTION};
use crate::projector::{AvatarFetch, Projector};

/// Notification published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactsEvent {
    Added(Vec<ContactId>),
    Removed(Vec<ContactId>),
    Changed(Vec<ContactId>),
}

/// What handling one engine event produced.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub notifications: Vec<ContactsEvent>,
    pub avatar_fetches: Vec<AvatarFetch>,
}

/// Field groups to re-project when a property changes.
pub fn groups_for(property: Property) -> &'static [FieldGroup] {
    match property {
        Property::Alias => &[FieldGroup::DisplayLabel, FieldGroup::Presence],
        Property::StructuredName => &[FieldGroup::Name],
        Property::FullName => &[FieldGroup::Name, FieldGroup::DisplayLabel],
        Property::Nickname => &[FieldGroup::Nickname, FieldGroup::DisplayLabel],
        Property::PresenceType | Property::PresenceMessage => &[FieldGroup::Presence],
        Property::Birthday => &[FieldGroup::Birthday],
        Property::EmailAddresses => &[FieldGroup::EmailAddresses],
        Property::ImAddresses => &[FieldGroup::OnlineAccounts],
        Property::IsFavourite => &[FieldGroup::Favorite],
        Property::Gender => &[FieldGroup::Gender],
        Property::Notes => &[FieldGroup::Notes],
        Property::Roles => &[FieldGroup::Organizations],
        Property::PhoneNumbers => &[FieldGroup::PhoneNumbers],
        Property::PostalAddresses => &[FieldGroup::Addresses],
        Property::Urls => &[FieldGroup::Urls],
        Property::Avatar => &[FieldGroup::Avatar],
    }
}

pub fn presence_uri(persona: &PersonaHandle) -> String {
    format!("presence:{}", persona.uid())
}

pub fn account_uri(persona: &PersonaHandle) -> String {
    format!("account:{}", persona.uid())
}

pub struct Router {
    identity: IdentityMap,
    projector: Projector,
    collection_id: CollectionId,
    initial_population_done: bool,
}

impl Router {
    pub fn new(manager_uri: &str, projector: Projector) -> Self {
        Self {
            identity: IdentityMap::new(manager_uri),
            projector,
            collection_id: CollectionId::new(manager_uri, DEFAULT_COLLECTION),
            initial_population_done: false,
        }
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// True once the first individuals-changed cycle has been handled.
    pub fn initial_population_done(&self) -> bool {
        self.initial_population_done
    }

    pub fn handle(&mut self, event: EngineEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();
        match event {
            EngineEvent::IndividualsChanged {
                added,
                removed,
                message,
                actor,
                reason,
            } => {
                if message.is_some() || actor.is_some() || reason != ChangeReason::Unspecified {
                    debug!(
                        message = message.as_deref().unwrap_or(""),
                        actor = actor.as_ref().map(|a| a.uid()).unwrap_or(""),
                        ?reason,
                        "individuals changed"
                    );
                }
                self.individuals_changed(added, removed, &mut dispatch);
            }
            EngineEvent::DetailsChanged {
                individual,
                properties,
            } => self.details_changed(&individual, &properties, &mut dispatch),
            EngineEvent::PersonasChanged {
                individual,
                added,
                removed,
            } => self.personas_changed(&individual, added, removed, &mut dispatch),
            EngineEvent::PersonaPresenceChanged { persona } => {
                self.presence_changed(&persona, &mut dispatch)
            }
        }
        dispatch
    }

    fn individuals_changed(
        &mut self,
        added: Vec<IndividualHandle>,
        removed: Vec<IndividualHandle>,
        dispatch: &mut Dispatch,
    ) {
        // Removals first: an added individual may reuse personas of a removed one.
        let mut removed_ids = Vec::new();
        for individual in &removed {
            if let Some((id, _entry)) = self.identity.remove(individual.as_ref()) {
                debug!(contact_id = %id, individual = individual.id(), "contact removed");
                removed_ids.push(id);
            }
        }

        let mut added_ids = Vec::new();
        for individual in added {
            if let Some(id) = self.track(individual, dispatch) {
                added_ids.push(id);
            }
        }

        if !removed_ids.is_empty() {
            dispatch.notifications.push(ContactsEvent::Removed(removed_ids));
        }
        if !added_ids.is_empty() {
            dispatch.notifications.push(ContactsEvent::Added(added_ids));
        }
        self.initial_population_done = true;
    }

    fn track(&mut self, individual: IndividualHandle, dispatch: &mut Dispatch) -> Option<ContactId> {
        if individual.is_user() {
            debug!(individual = individual.id(), "skipping self contact");
            return None;
        }
        if self.identity.resolve(individual.as_ref()).is_some() {
            debug!(individual = individual.id(), "individual already tracked");
            return None;
        }

        let mut contact = Contact::new();
        contact.id = Some(self.identity.id_for(individual.id()));
        contact.collection_id = Some(self.collection_id.clone());
        contact.contact_type = ContactType::Contact;
        let fetch = self
            .projector
            .project(&mut contact, individual.as_ref(), &FieldGroup::ALL);

        let key = individual.id().to_string();
        let personas = individual.personas();
        match self.identity.insert(individual, contact) {
            Ok(id) => {
                for persona in personas {
                    debug!(contact_id = %id, presence = %presence_uri(&persona), "watching persona");
                    self.identity.link_persona(&key, persona);
                }
                debug!(contact_id = %id, individual = %key, "contact added");
                dispatch.avatar_fetches.extend(fetch);
                Some(id)
            }
            Err(err) => {
                warn!(error = %err, "not materialising individual");
                None
            }
        }
    }

    fn details_changed(
        &mut self,
        individual: &IndividualHandle,
        properties: &[Property],
        dispatch: &mut Dispatch,
    ) {
        let Some(id) = self.identity.resolve(individual.as_ref()) else {
            return;
        };
        let mut groups: Vec<FieldGroup> = Vec::new();
        for property in properties {
            for group in groups_for(*property) {
                if !groups.contains(group) {
                    groups.push(*group);
                }
            }
        }
        if groups.is_empty() {
            return;
        }
        let Some(entry) = self.identity.get_mut(&id) else {
            return;
        };
        let fetch = self
            .projector
            .project(&mut entry.contact, individual.as_ref(), &groups);
        dispatch.avatar_fetches.extend(fetch);
        debug!(contact_id = %id, ?groups, "contact details changed");
        dispatch.notifications.push(ContactsEvent::Changed(vec![id]));
    }

    fn personas_changed(
        &mut self,
        individual: &IndividualHandle,
        added: Vec<PersonaHandle>,
        removed: Vec<PersonaHandle>,
        dispatch: &mut Dispatch,
    ) {
        let Some(id) = self.identity.resolve(individual.as_ref()) else {
            return;
        };
        if added.is_empty() && removed.is_empty() {
            return;
        }
        let key = individual.id();
        for persona in &removed {
            debug!(contact_id = %id, account = %account_uri(persona), "persona unlinked");
            self.identity.unlink_persona(key, persona.uid());
        }
        for persona in added {
            debug!(contact_id = %id, account = %account_uri(&persona), "persona linked");
            self.identity.link_persona(key, persona);
        }

        let Some(entry) = self.identity.get_mut(&id) else {
            return;
        };
        let before = entry.contact.global_presence.clone();
        self.projector
            .project(&mut entry.contact, individual.as_ref(), &[FieldGroup::Presence]);
        if entry.contact.global_presence != before {
            dispatch.notifications.push(ContactsEvent::Changed(vec![id]));
        }
    }

    fn presence_changed(&mut self, persona: &PersonaHandle, dispatch: &mut Dispatch) {
        let ids = self.identity.individuals_of(persona.uid());
        let mut changed = Vec::new();
        for id in ids {
            let Some(entry) = self.identity.get_mut(&id) else {
                continue;
            };
            let individual = entry.individual.clone();
            self.projector
                .project(&mut entry.contact, individual.as_ref(), &[FieldGroup::Presence]);
            changed.push(id);
        }
        if !changed.is_empty() {
            debug!(presence = %presence_uri(persona), contacts = changed.len(), "presence changed");
            dispatch.notifications.push(ContactsEvent::Changed(changed));
        }
    }

    /// Apply an avatar that finished caching. `None` if the contact is gone.
    pub fn apply_avatar(&mut self, id: &ContactId, image_url: String) -> Option<ContactsEvent> {
        let entry = self.identity.get_mut(id)?;
        debug!(contact_id = %id, image_url = %image_url, "avatar ready");
        entry.contact.avatar = Some(Avatar { image_url });
        Some(ContactsEvent::Changed(vec![id.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        Aggregator, DetailSet, FileAvatarCache, IndividualSpec, MemoryAggregator, PersonaSpec,
        PresenceType,
    };
    use std::rc::Rc;
    use tokio::sync::mpsc::UnboundedReceiver;

    const URI: &str = "contacts:folks:";

    fn named(name: &str) -> DetailSet {
        DetailSet {
            full_name: Some(name.to_string()),
            alias: Some(name.to_string()),
            ..DetailSet::default()
        }
    }

    fn spec(id: &str) -> IndividualSpec {
        IndividualSpec::new(id)
            .persona(PersonaSpec::new("eds", named(id)).with_uid(&format!("p-{id}")))
    }

    fn setup() -> (MemoryAggregator, Router, UnboundedReceiver<EngineEvent>) {
        let cache = Rc::new(FileAvatarCache::new("/nonexistent/folks-avatars"));
        let engine = MemoryAggregator::new(cache.clone());
        engine.add_store("eds", true);
        let rx = engine.subscribe();
        (engine, Router::new(URI, Projector::new(cache)), rx)
    }

    fn pump(router: &mut Router, rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<ContactsEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.extend(router.handle(event).notifications);
        }
        out
    }

    fn id(key: &str) -> ContactId {
        ContactId::for_key(URI, key)
    }

    #[tokio::test]
    async fn test_initial_population_skips_self() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("me").user());
        engine.add_individual(spec("jane"));
        engine.add_individual(spec("john"));
        engine.prepare().await.unwrap();

        assert!(!router.initial_population_done());
        let events = pump(&mut router, &mut rx);
        assert!(router.initial_population_done());
        assert_eq!(events, vec![ContactsEvent::Added(vec![id("jane"), id("john")])]);
        assert!(router.identity().get(&id("me")).is_none());

        let jane = &router.identity().get(&id("jane")).unwrap().contact;
        assert_eq!(jane.collection_id.as_ref().unwrap().local_id, "col-1");
        assert_eq!(jane.contact_type, ContactType::Contact);
    }

    #[tokio::test]
    async fn test_removals_reported_before_additions() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("a"));
        engine.add_individual(spec("b"));
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        engine.change_individuals(vec![spec("c"), spec("d"), spec("e")], &["a", "b"]);
        let events = pump(&mut router, &mut rx);
        assert_eq!(
            events,
            vec![
                ContactsEvent::Removed(vec![id("a"), id("b")]),
                ContactsEvent::Added(vec![id("c"), id("d"), id("e")]),
            ]
        );
    }

    #[tokio::test]
    async fn test_self_never_notified() {
        let (engine, mut router, mut rx) = setup();
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        engine.add_individual(spec("me").user());
        engine.update_persona("p-me", &[Property::FullName], |d| {
            d.full_name = Some("Still Me".to_string())
        });
        engine.remove("me");
        assert!(pump(&mut router, &mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_details_changed_reprojects_affected_groups() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("jane"));
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        engine.update_persona("p-jane", &[Property::FullName, Property::Nickname], |d| {
            d.full_name = Some("Jane Roe".to_string());
            d.nickname = Some("JR".to_string());
        });
        let events = pump(&mut router, &mut rx);
        assert_eq!(events, vec![ContactsEvent::Changed(vec![id("jane")])]);

        let contact = &router.identity().get(&id("jane")).unwrap().contact;
        assert_eq!(contact.display_label.as_deref(), Some("JR"));
        assert_eq!(contact.nickname.as_deref(), Some("JR"));
        assert_eq!(contact.name.as_ref().unwrap().last_name.as_deref(), Some("Roe"));
    }

    #[tokio::test]
    async fn test_persona_presence_routes_to_owner() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("jane"));
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        engine.set_presence("p-jane", PresenceType::Busy, "meeting");
        let events = pump(&mut router, &mut rx);
        assert_eq!(events, vec![ContactsEvent::Changed(vec![id("jane")])]);
        let presence = router
            .identity()
            .get(&id("jane"))
            .unwrap()
            .contact
            .global_presence
            .clone()
            .unwrap();
        assert_eq!(presence.custom_message, "meeting");
    }

    #[tokio::test]
    async fn test_linked_persona_is_routed() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("jane"));
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        engine.link_persona(
            "jane",
            PersonaSpec::new("telepathy", DetailSet::default()).with_uid("p-jabber"),
        );
        pump(&mut router, &mut rx);
        assert_eq!(router.identity().individuals_of("p-jabber"), vec![id("jane")]);

        engine.unlink_persona("p-jabber");
        pump(&mut router, &mut rx);
        assert!(router.identity().individuals_of("p-jabber").is_empty());
    }

    #[tokio::test]
    async fn test_apply_avatar_only_for_tracked_contacts() {
        let (engine, mut router, mut rx) = setup();
        engine.add_individual(spec("jane"));
        engine.prepare().await.unwrap();
        pump(&mut router, &mut rx);

        let event = router.apply_avatar(&id("jane"), "file:///tmp/a.png".to_string());
        assert_eq!(event, Some(ContactsEvent::Changed(vec![id("jane")])));
        assert_eq!(router.apply_avatar(&id("ghost"), "file:///tmp/b.png".to_string()), None);
    }
}
