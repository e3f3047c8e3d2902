//! In-process aggregation engine.
//!
//! Backs the command-line tool (loaded from a JSON fixture) and the test
//! suite. Every engine call is recorded so callers can assert on exactly
//! what was written, and failures can be injected per property.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::{Rc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::{
    Aggregator, AvatarCache, Capabilities, ChangeReason, DetailChange, DetailSet, EngineError,
    EngineEvent, Individual, IndividualHandle, Persona, PersonaHandle, PersonaStore, PresenceType,
    Property, StoreHandle,
};

/// A call the engine received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    AddPersona { store: String, details: DetailSet },
    RemoveIndividual { individual: String },
    ChangeDetail { persona: String, property: Property },
    Flush { store: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSpec {
    pub id: String,
    #[serde(default = "default_true")]
    pub writeable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaSpec {
    #[serde(default)]
    pub uid: Option<String>,
    pub store: String,
    /// Properties the persona can write; all of them when absent.
    #[serde(default)]
    pub capabilities: Option<Vec<Property>>,
    #[serde(default)]
    pub details: DetailSet,
}

impl PersonaSpec {
    pub fn new(store: &str, details: DetailSet) -> Self {
        Self {
            store: store.to_string(),
            details,
            ..Self::default()
        }
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = Some(uid.to_string());
        self
    }

    pub fn with_capabilities(mut self, properties: &[Property]) -> Self {
        self.capabilities = Some(properties.to_vec());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndividualSpec {
    pub id: String,
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub personas: Vec<PersonaSpec>,
}

impl IndividualSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn user(mut self) -> Self {
        self.is_user = true;
        self
    }

    pub fn persona(mut self, persona: PersonaSpec) -> Self {
        self.personas.push(persona);
        self
    }
}

/// Serialized engine contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub stores: Vec<StoreSpec>,
    #[serde(default)]
    pub primary_store: Option<String>,
    #[serde(default)]
    pub individuals: Vec<IndividualSpec>,
}

fn default_true() -> bool {
    true
}

struct State {
    stores: BTreeMap<String, Rc<MemoryStore>>,
    primary_store: Option<String>,
    individuals: BTreeMap<String, Rc<MemoryIndividual>>,
    senders: Vec<UnboundedSender<EngineEvent>>,
    calls: Vec<EngineCall>,
    detail_failures: HashMap<Property, EngineError>,
    add_failure: Option<EngineError>,
    prepare_failure: Option<EngineError>,
    add_returns_existing: bool,
    prepared: bool,
    next_persona: u64,
}

struct Core {
    state: RefCell<State>,
    avatar_cache: Rc<dyn AvatarCache>,
}

impl Core {
    fn record(&self, call: EngineCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn emit(&self, event: EngineEvent) {
        debug!(?event, "engine event");
        self.state
            .borrow_mut()
            .senders
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

pub struct MemoryAggregator {
    core: Rc<Core>,
}

impl MemoryAggregator {
    pub fn new(avatar_cache: Rc<dyn AvatarCache>) -> Self {
        Self {
            core: Rc::new(Core {
                state: RefCell::new(State {
                    stores: BTreeMap::new(),
                    primary_store: None,
                    individuals: BTreeMap::new(),
                    senders: Vec::new(),
                    calls: Vec::new(),
                    detail_failures: HashMap::new(),
                    add_failure: None,
                    prepare_failure: None,
                    add_returns_existing: false,
                    prepared: false,
                    next_persona: 0,
                }),
                avatar_cache,
            }),
        }
    }

    pub fn from_fixture(fixture: Fixture, avatar_cache: Rc<dyn AvatarCache>) -> Self {
        let engine = Self::new(avatar_cache);
        for store in &fixture.stores {
            engine.add_store(&store.id, store.writeable);
        }
        if let Some(primary) = &fixture.primary_store {
            engine.set_primary_store(Some(primary));
        }
        for individual in fixture.individuals {
            engine.add_individual(individual);
        }
        engine
    }

    pub fn load_fixture(path: &Path, avatar_cache: Rc<dyn AvatarCache>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture {}", path.display()))?;
        info!(
            path = %path.display(),
            individuals = fixture.individuals.len(),
            "loaded engine fixture"
        );
        Ok(Self::from_fixture(fixture, avatar_cache))
    }

    pub fn add_store(&self, id: &str, writeable: bool) -> Rc<MemoryStore> {
        let store = Rc::new(MemoryStore {
            id: id.to_string(),
            writeable: Cell::new(writeable),
            flushes: Cell::new(0),
            core: Rc::downgrade(&self.core),
        });
        self.core
            .state
            .borrow_mut()
            .stores
            .insert(id.to_string(), store.clone());
        store
    }

    pub fn set_primary_store(&self, id: Option<&str>) {
        self.core.state.borrow_mut().primary_store = id.map(str::to_string);
    }

    pub fn store(&self, id: &str) -> Option<Rc<MemoryStore>> {
        self.core.state.borrow().stores.get(id).cloned()
    }

    fn build_individual(&self, spec: IndividualSpec) -> Rc<MemoryIndividual> {
        let individual = Rc::new(MemoryIndividual {
            id: spec.id,
            is_user: spec.is_user,
            personas: RefCell::new(Vec::new()),
        });
        for persona in spec.personas {
            let persona = self.build_persona(persona, &individual);
            individual.personas.borrow_mut().push(persona);
        }
        individual
    }

    fn build_persona(&self, spec: PersonaSpec, individual: &Rc<MemoryIndividual>) -> Rc<MemoryPersona> {
        let uid = match spec.uid {
            Some(uid) => uid,
            None => {
                let mut state = self.core.state.borrow_mut();
                state.next_persona += 1;
                format!("{}:{}", spec.store, state.next_persona)
            }
        };
        let capabilities = match spec.capabilities {
            Some(props) => Capabilities::of(&props),
            None => Capabilities::all(),
        };
        Rc::new(MemoryPersona {
            uid,
            store_id: spec.store,
            capabilities: RefCell::new(capabilities),
            details: RefCell::new(spec.details),
            individual: RefCell::new(Rc::downgrade(individual)),
            core: Rc::downgrade(&self.core),
        })
    }

    /// Insert an individual. After `prepare` this is announced as an addition.
    pub fn add_individual(&self, spec: IndividualSpec) -> Rc<MemoryIndividual> {
        let individual = self.build_individual(spec);
        self.apply_changes(vec![individual.clone()], &[]);
        individual
    }

    /// Remove an individual by id, announcing it when prepared.
    pub fn remove(&self, id: &str) {
        self.apply_changes(Vec::new(), &[id]);
    }

    /// Apply additions and removals as a single engine notification.
    pub fn change_individuals(
        &self,
        added: Vec<IndividualSpec>,
        removed: &[&str],
    ) -> Vec<Rc<MemoryIndividual>> {
        let added: Vec<Rc<MemoryIndividual>> =
            added.into_iter().map(|s| self.build_individual(s)).collect();
        self.apply_changes(added.clone(), removed);
        added
    }

    fn apply_changes(&self, added: Vec<Rc<MemoryIndividual>>, removed: &[&str]) {
        let (prepared, gone) = {
            let mut state = self.core.state.borrow_mut();
            let gone: Vec<Rc<MemoryIndividual>> = removed
                .iter()
                .filter_map(|id| state.individuals.remove(*id))
                .collect();
            for individual in &added {
                state
                    .individuals
                    .insert(individual.id.clone(), individual.clone());
            }
            (state.prepared, gone)
        };
        if prepared && (!added.is_empty() || !gone.is_empty()) {
            self.core.emit(EngineEvent::IndividualsChanged {
                added: added.into_iter().map(|i| i as IndividualHandle).collect(),
                removed: gone.into_iter().map(|i| i as IndividualHandle).collect(),
                message: None,
                actor: None,
                reason: ChangeReason::Unspecified,
            });
        }
    }

    pub fn individual(&self, id: &str) -> Option<Rc<MemoryIndividual>> {
        self.core.state.borrow().individuals.get(id).cloned()
    }

    pub fn persona(&self, uid: &str) -> Option<Rc<MemoryPersona>> {
        let state = self.core.state.borrow();
        state.individuals.values().find_map(|i| {
            i.personas
                .borrow()
                .iter()
                .find(|p| p.uid == uid)
                .cloned()
        })
    }

    /// Mutate a persona's details out of band and notify listeners.
    pub fn update_persona<F>(&self, uid: &str, properties: &[Property], update: F)
    where
        F: FnOnce(&mut DetailSet),
    {
        let Some(persona) = self.persona(uid) else {
            return;
        };
        update(&mut persona.details.borrow_mut());
        persona.notify(properties.to_vec());
    }

    pub fn set_presence(&self, uid: &str, presence: PresenceType, message: &str) {
        let Some(persona) = self.persona(uid) else {
            return;
        };
        {
            let mut details = persona.details.borrow_mut();
            details.presence_type = presence;
            details.presence_message = message.to_string();
        }
        self.core.emit(EngineEvent::PersonaPresenceChanged {
            persona: persona as PersonaHandle,
        });
    }

    /// Attach a new persona to an existing individual.
    pub fn link_persona(&self, individual_id: &str, spec: PersonaSpec) -> Option<Rc<MemoryPersona>> {
        let individual = self.individual(individual_id)?;
        let persona = self.build_persona(spec, &individual);
        individual.personas.borrow_mut().push(persona.clone());
        self.core.emit(EngineEvent::PersonasChanged {
            individual: individual as IndividualHandle,
            added: vec![persona.clone() as PersonaHandle],
            removed: Vec::new(),
        });
        Some(persona)
    }

    pub fn unlink_persona(&self, uid: &str) {
        let Some(persona) = self.persona(uid) else {
            return;
        };
        let Some(individual) = persona.individual.borrow().upgrade() else {
            return;
        };
        individual.personas.borrow_mut().retain(|p| p.uid != uid);
        *persona.individual.borrow_mut() = Weak::new();
        self.core.emit(EngineEvent::PersonasChanged {
            individual: individual as IndividualHandle,
            added: Vec::new(),
            removed: vec![persona as PersonaHandle],
        });
    }

    pub fn emit(&self, event: EngineEvent) {
        self.core.emit(event);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.core.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.core.state.borrow_mut().calls.clear();
    }

    /// Make the next change of `property` on any persona fail.
    pub fn fail_next(&self, property: Property, error: EngineError) {
        self.core
            .state
            .borrow_mut()
            .detail_failures
            .insert(property, error);
    }

    pub fn fail_next_add(&self, error: EngineError) {
        self.core.state.borrow_mut().add_failure = Some(error);
    }

    pub fn fail_prepare(&self, error: EngineError) {
        self.core.state.borrow_mut().prepare_failure = Some(error);
    }

    /// Make persona creation report that an equivalent persona already exists.
    pub fn set_add_returns_existing(&self, existing: bool) {
        self.core.state.borrow_mut().add_returns_existing = existing;
    }
}

#[async_trait(?Send)]
impl Aggregator for MemoryAggregator {
    async fn prepare(&self) -> Result<(), EngineError> {
        if let Some(err) = self.core.state.borrow_mut().prepare_failure.take() {
            return Err(err);
        }
        let added: Vec<IndividualHandle> = {
            let mut state = self.core.state.borrow_mut();
            state.prepared = true;
            state
                .individuals
                .values()
                .map(|i| i.clone() as IndividualHandle)
                .collect()
        };
        info!(individuals = added.len(), "engine prepared");
        self.core.emit(EngineEvent::IndividualsChanged {
            added,
            removed: Vec::new(),
            message: None,
            actor: None,
            reason: ChangeReason::Unspecified,
        });
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.core.state.borrow_mut().senders.push(tx);
        rx
    }

    fn primary_store(&self) -> Option<StoreHandle> {
        let state = self.core.state.borrow();
        let id = state.primary_store.as_ref()?;
        state.stores.get(id).map(|s| s.clone() as StoreHandle)
    }

    fn avatar_cache(&self) -> Rc<dyn AvatarCache> {
        self.core.avatar_cache.clone()
    }

    async fn add_persona_from_details(
        &self,
        store: &StoreHandle,
        details: DetailSet,
    ) -> Result<Option<PersonaHandle>, EngineError> {
        self.core.record(EngineCall::AddPersona {
            store: store.id().to_string(),
            details: details.clone(),
        });
        tokio::task::yield_now().await;

        let (failure, existing) = {
            let mut state = self.core.state.borrow_mut();
            (state.add_failure.take(), state.add_returns_existing)
        };
        if let Some(err) = failure {
            return Err(err);
        }
        if !store.is_writeable() {
            return Err(EngineError::NoWriteableStore);
        }
        if existing {
            return Ok(None);
        }

        let id = {
            let mut state = self.core.state.borrow_mut();
            state.next_persona += 1;
            format!("individual-new-{}", state.next_persona)
        };
        let spec = IndividualSpec::new(&id).persona(PersonaSpec::new(store.id(), details));
        let individual = self.add_individual(spec);
        let persona = individual
            .personas
            .borrow()
            .first()
            .cloned()
            .ok_or_else(|| EngineError::AddFailed("persona was not created".to_string()))?;
        Ok(Some(persona as PersonaHandle))
    }

    async fn remove_individual(&self, individual: &IndividualHandle) -> Result<(), EngineError> {
        self.core.record(EngineCall::RemoveIndividual {
            individual: individual.id().to_string(),
        });
        tokio::task::yield_now().await;
        if self.individual(individual.id()).is_none() {
            return Err(EngineError::Failed(format!(
                "unknown individual {}",
                individual.id()
            )));
        }
        self.remove(individual.id());
        Ok(())
    }
}

pub struct MemoryIndividual {
    id: String,
    is_user: bool,
    personas: RefCell<Vec<Rc<MemoryPersona>>>,
}

impl Individual for MemoryIndividual {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_user(&self) -> bool {
        self.is_user
    }

    fn details(&self) -> DetailSet {
        let personas = self.personas.borrow();
        let sets: Vec<DetailSet> = personas.iter().map(|p| p.details.borrow().clone()).collect();
        DetailSet::merge(&sets)
    }

    fn personas(&self) -> Vec<PersonaHandle> {
        self.personas
            .borrow()
            .iter()
            .map(|p| p.clone() as PersonaHandle)
            .collect()
    }
}

pub struct MemoryPersona {
    uid: String,
    store_id: String,
    capabilities: RefCell<Capabilities>,
    details: RefCell<DetailSet>,
    individual: RefCell<Weak<MemoryIndividual>>,
    core: Weak<Core>,
}

impl MemoryPersona {
    pub fn details(&self) -> DetailSet {
        self.details.borrow().clone()
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        *self.capabilities.borrow_mut() = capabilities;
    }

    fn notify(&self, properties: Vec<Property>) {
        let (Some(core), Some(individual)) = (self.core.upgrade(), self.individual.borrow().upgrade())
        else {
            return;
        };
        core.emit(EngineEvent::DetailsChanged {
            individual: individual as IndividualHandle,
            properties,
        });
    }
}

#[async_trait(?Send)]
impl Persona for MemoryPersona {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn store_id(&self) -> &str {
        &self.store_id
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.borrow().clone()
    }

    fn individual(&self) -> Option<IndividualHandle> {
        self.individual
            .borrow()
            .upgrade()
            .map(|i| i as IndividualHandle)
    }

    async fn change_detail(&self, change: DetailChange) -> Result<(), EngineError> {
        let property = change.property();
        let core = self
            .core
            .upgrade()
            .ok_or_else(|| EngineError::Failed("engine is gone".to_string()))?;
        core.record(EngineCall::ChangeDetail {
            persona: self.uid.clone(),
            property,
        });
        if !self.capabilities.borrow().supports(property) {
            return Err(EngineError::NotWriteable(property));
        }
        tokio::task::yield_now().await;

        let failure = core.state.borrow_mut().detail_failures.remove(&property);
        if let Some(err) = failure {
            return Err(err);
        }
        change.apply(&mut self.details.borrow_mut());
        self.notify(vec![property]);
        Ok(())
    }
}

pub struct MemoryStore {
    id: String,
    writeable: Cell<bool>,
    flushes: Cell<usize>,
    core: Weak<Core>,
}

impl MemoryStore {
    pub fn flush_count(&self) -> usize {
        self.flushes.get()
    }

    pub fn set_writeable(&self, writeable: bool) {
        self.writeable.set(writeable);
    }
}

#[async_trait(?Send)]
impl PersonaStore for MemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_writeable(&self) -> bool {
        self.writeable.get()
    }

    async fn flush(&self) -> Result<(), EngineError> {
        if let Some(core) = self.core.upgrade() {
            core.record(EngineCall::Flush {
                store: self.id.clone(),
            });
        }
        tokio::task::yield_now().await;
        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FileAvatarCache;

    fn engine() -> MemoryAggregator {
        let engine = MemoryAggregator::new(Rc::new(FileAvatarCache::new("/tmp/folks-avatars")));
        engine.add_store("eds", true);
        engine.set_primary_store(Some("eds"));
        engine
    }

    fn named(name: &str) -> DetailSet {
        DetailSet {
            full_name: Some(name.to_string()),
            ..DetailSet::default()
        }
    }

    #[tokio::test]
    async fn test_prepare_announces_existing_individuals() {
        let engine = engine();
        engine.add_individual(IndividualSpec::new("a").persona(PersonaSpec::new("eds", named("A"))));
        let mut rx = engine.subscribe();
        engine.prepare().await.unwrap();

        match rx.try_recv().unwrap() {
            EngineEvent::IndividualsChanged { added, removed, .. } => {
                assert_eq!(added.len(), 1);
                assert!(removed.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_change_detail_records_and_applies() {
        let engine = engine();
        engine.add_individual(
            IndividualSpec::new("a").persona(PersonaSpec::new("eds", named("A")).with_uid("p1")),
        );
        let persona = engine.persona("p1").unwrap();
        persona
            .change_detail(DetailChange::Alias("Ace".to_string()))
            .await
            .unwrap();

        assert_eq!(persona.details().alias.as_deref(), Some("Ace"));
        assert_eq!(
            engine.calls(),
            vec![EngineCall::ChangeDetail {
                persona: "p1".to_string(),
                property: Property::Alias
            }]
        );
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let engine = engine();
        engine.add_individual(
            IndividualSpec::new("a").persona(PersonaSpec::new("eds", named("A")).with_uid("p1")),
        );
        engine.fail_next(Property::Notes, EngineError::StoreOffline);
        let persona = engine.persona("p1").unwrap();

        let first = persona.change_detail(DetailChange::Notes(Vec::new())).await;
        let second = persona.change_detail(DetailChange::Notes(Vec::new())).await;
        assert_eq!(first, Err(EngineError::StoreOffline));
        assert_eq!(second, Ok(()));
    }

    #[tokio::test]
    async fn test_missing_capability_is_not_writeable() {
        let engine = engine();
        engine.add_individual(IndividualSpec::new("a").persona(
            PersonaSpec::new("eds", named("A"))
                .with_uid("p1")
                .with_capabilities(&[Property::FullName]),
        ));
        let persona = engine.persona("p1").unwrap();
        let result = persona.change_detail(DetailChange::Gender(crate::engine::Gender::Male)).await;
        assert_eq!(result, Err(EngineError::NotWriteable(Property::Gender)));
    }

    #[test]
    fn test_fixture_parses() {
        let raw = r#"{
            "stores": [{"id": "eds"}],
            "primary_store": "eds",
            "individuals": [
                {"id": "me", "is_user": true, "personas": [{"store": "eds", "details": {"full_name": "Me"}}]},
                {"id": "jane", "personas": [{"store": "eds", "details": {
                    "full_name": "Jane Doe",
                    "phone_numbers": [{"value": "555-0100", "parameters": {"type": ["cell"]}}]
                }}]}
            ]
        }"#;
        let fixture: Fixture = serde_json::from_str(raw).unwrap();
        let engine =
            MemoryAggregator::from_fixture(fixture, Rc::new(FileAvatarCache::new("/tmp/x")));
        assert!(engine.store("eds").unwrap().is_writeable());
        assert!(engine.individual("me").unwrap().is_user());
        let jane = engine.individual("jane").unwrap().details();
        assert_eq!(jane.phone_numbers[0].types(), ["cell".to_string()]);
    }
}
