//! Index between contact ids and engine individuals.
//!
//! Each entry owns the cached contact record and an `Rc` to its individual;
//! dropping the entry releases the handle. A second index maps persona uids
//! to the individuals that reference them, for routing persona-scoped events.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

use crate::engine::{Individual, IndividualHandle, PersonaHandle};
use crate::models::{Contact, ContactId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("individual {key} hashes to {id}, already held by individual {existing}")]
    Collision {
        key: String,
        existing: String,
        id: ContactId,
    },
}

pub struct Entry {
    pub contact: Contact,
    pub individual: IndividualHandle,
}

pub struct IdentityMap {
    manager_uri: String,
    entries: BTreeMap<ContactId, Entry>,
    ids_by_key: HashMap<String, ContactId>,
    individuals_by_persona: HashMap<String, BTreeSet<String>>,
    personas_by_individual: HashMap<String, Vec<PersonaHandle>>,
}

impl IdentityMap {
    pub fn new(manager_uri: &str) -> Self {
        Self {
            manager_uri: manager_uri.to_string(),
            entries: BTreeMap::new(),
            ids_by_key: HashMap::new(),
            individuals_by_persona: HashMap::new(),
            personas_by_individual: HashMap::new(),
        }
    }

    pub fn manager_uri(&self) -> &str {
        &self.manager_uri
    }

    /// The id an individual with this key is (or would be) stored under.
    pub fn id_for(&self, key: &str) -> ContactId {
        ContactId::for_key(&self.manager_uri, key)
    }

    pub fn resolve(&self, individual: &dyn Individual) -> Option<ContactId> {
        self.ids_by_key.get(individual.id()).cloned()
    }

    /// Store `contact` for `individual`. Re-inserting the same individual
    /// replaces its record; a different individual hashing to an occupied id
    /// is rejected.
    pub fn insert(
        &mut self,
        individual: IndividualHandle,
        mut contact: Contact,
    ) -> Result<ContactId, IdentityError> {
        let key = individual.id().to_string();
        let id = self.id_for(&key);
        if let Some(existing) = self.entries.get(&id) {
            if existing.individual.id() != key {
                return Err(IdentityError::Collision {
                    key,
                    existing: existing.individual.id().to_string(),
                    id,
                });
            }
        }
        contact.id = Some(id.clone());
        self.ids_by_key.insert(key, id.clone());
        self.entries.insert(id.clone(), Entry { contact, individual });
        Ok(id)
    }

    /// Drop the entry and persona links of an individual.
    pub fn remove(&mut self, individual: &dyn Individual) -> Option<(ContactId, Entry)> {
        let key = individual.id();
        let id = self.ids_by_key.remove(key)?;
        for persona in self.personas_by_individual.remove(key).unwrap_or_default() {
            self.drop_reverse_link(persona.uid(), key);
        }
        self.entries.remove(&id).map(|entry| (id, entry))
    }

    pub fn link_persona(&mut self, individual_key: &str, persona: PersonaHandle) {
        self.individuals_by_persona
            .entry(persona.uid().to_string())
            .or_default()
            .insert(individual_key.to_string());
        let personas = self
            .personas_by_individual
            .entry(individual_key.to_string())
            .or_default();
        if !personas.iter().any(|p| p.uid() == persona.uid()) {
            personas.push(persona);
        }
    }

    pub fn unlink_persona(&mut self, individual_key: &str, persona_uid: &str) {
        if let Some(personas) = self.personas_by_individual.get_mut(individual_key) {
            personas.retain(|p| p.uid() != persona_uid);
        }
        self.drop_reverse_link(persona_uid, individual_key);
    }

    fn drop_reverse_link(&mut self, persona_uid: &str, individual_key: &str) {
        if let Some(keys) = self.individuals_by_persona.get_mut(persona_uid) {
            keys.remove(individual_key);
            if keys.is_empty() {
                self.individuals_by_persona.remove(persona_uid);
            }
        }
    }

    pub fn personas_of(&self, individual_key: &str) -> &[PersonaHandle] {
        self.personas_by_individual
            .get(individual_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Ids of every tracked individual that references the persona.
    pub fn individuals_of(&self, persona_uid: &str) -> Vec<ContactId> {
        self.individuals_by_persona
            .get(persona_uid)
            .into_iter()
            .flatten()
            .filter_map(|key| self.ids_by_key.get(key).cloned())
            .collect()
    }

    pub fn get(&self, id: &ContactId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &ContactId) -> Option<&mut Entry> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &ContactId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContactId, &Entry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        DetailSet, FileAvatarCache, IndividualSpec, MemoryAggregator, MemoryIndividual, PersonaSpec,
    };
    use std::rc::Rc;

    const URI: &str = "contacts:folks:";

    fn engine() -> MemoryAggregator {
        let engine = MemoryAggregator::new(Rc::new(FileAvatarCache::new("/tmp/folks-avatars")));
        engine.add_store("eds", true);
        engine
    }

    fn individual(engine: &MemoryAggregator, id: &str, persona: &str) -> Rc<MemoryIndividual> {
        engine.add_individual(
            IndividualSpec::new(id)
                .persona(PersonaSpec::new("eds", DetailSet::default()).with_uid(persona)),
        )
    }

    #[test]
    fn test_insert_resolve_remove() {
        let engine = engine();
        let jane = individual(&engine, "jane", "p-jane");
        let mut map = IdentityMap::new(URI);

        let id = map.insert(jane.clone(), Contact::new()).unwrap();
        assert_eq!(id, ContactId::for_key(URI, "jane"));
        assert_eq!(map.resolve(jane.as_ref()), Some(id.clone()));
        assert_eq!(map.get(&id).unwrap().contact.id, Some(id.clone()));

        let (removed, entry) = map.remove(jane.as_ref()).unwrap();
        assert_eq!(removed, id);
        assert_eq!(entry.individual.id(), "jane");
        assert!(map.is_empty());
        assert!(map.remove(jane.as_ref()).is_none());
    }

    #[test]
    fn test_reinsert_keeps_id() {
        let engine = engine();
        let jane = individual(&engine, "jane", "p-jane");
        let mut map = IdentityMap::new(URI);
        let first = map.insert(jane.clone(), Contact::new()).unwrap();
        let second = map.insert(jane, Contact::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_persona_routing() {
        let engine = engine();
        let jane = individual(&engine, "jane", "p-jane");
        let john = individual(&engine, "john", "p-john");
        let mut map = IdentityMap::new(URI);
        let jane_id = map.insert(jane.clone(), Contact::new()).unwrap();
        let john_id = map.insert(john.clone(), Contact::new()).unwrap();

        for p in jane.personas() {
            map.link_persona("jane", p);
        }
        // A persona shared during a merge.
        for p in jane.personas() {
            map.link_persona("john", p);
        }

        let mut owners = map.individuals_of("p-jane");
        owners.sort();
        let mut expected = vec![jane_id.clone(), john_id];
        expected.sort();
        assert_eq!(owners, expected);
        assert_eq!(map.personas_of("jane").len(), 1);

        map.unlink_persona("john", "p-jane");
        assert_eq!(map.individuals_of("p-jane"), vec![jane_id]);

        map.remove(jane.as_ref());
        assert!(map.individuals_of("p-jane").is_empty());
        assert!(map.personas_of("jane").is_empty());
    }

    #[test]
    fn test_collision_is_rejected() {
        let engine = engine();
        let a = individual(&engine, "a", "p-a");
        let b = individual(&engine, "b", "p-b");
        let mut map = IdentityMap::new(URI);
        let occupied = map.id_for("b");
        map.entries.insert(
            occupied,
            Entry {
                contact: Contact::new(),
                individual: a,
            },
        );

        let err = map.insert(b, Contact::new()).unwrap_err();
        assert!(matches!(err, IdentityError::Collision { ref existing, .. } if existing == "a"));
    }
}
