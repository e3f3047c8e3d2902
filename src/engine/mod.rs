//! Boundary to the aggregation engine.
//!
//! The engine owns individuals (aggregated people) and personas (per-store
//! records). Everything here is single-threaded: handles are `Rc`, futures are
//! not `Send`, and notifications arrive on an unbounded channel that the
//! manager drains on its own task.

pub mod avatar;
pub mod details;
pub mod memory;

use async_trait::async_trait;
use std::rc::Rc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

pub use avatar::{AvatarCache, FileAvatarCache};
pub use details::{
    AvatarIcon, Capabilities, DetailChange, DetailSet, FieldDetails, Gender, ImAddresses,
    Parameters, PostalAddress, PresenceType, Property, Role, StructuredName, TYPE_PARAMETER,
};
pub use memory::{
    EngineCall, Fixture, IndividualSpec, MemoryAggregator, MemoryIndividual, MemoryPersona,
    MemoryStore, PersonaSpec, StoreSpec,
};

pub type IndividualHandle = Rc<dyn Individual>;
pub type PersonaHandle = Rc<dyn Persona>;
pub type StoreHandle = Rc<dyn PersonaStore>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("could not add persona: {0}")]
    AddFailed(String),
    #[error("persona store is offline")]
    StoreOffline,
    #[error("no writeable persona store")]
    NoWriteableStore,
    #[error("property {0} is not writeable")]
    NotWriteable(Property),
    #[error("{0}")]
    Failed(String),
}

/// An aggregated person, identified by a stable key.
pub trait Individual {
    fn id(&self) -> &str;
    /// True for the individual that represents the device owner.
    fn is_user(&self) -> bool;
    fn details(&self) -> DetailSet;
    fn personas(&self) -> Vec<PersonaHandle>;
}

/// A per-store record contributing to an individual.
#[async_trait(?Send)]
pub trait Persona {
    fn uid(&self) -> &str;
    fn store_id(&self) -> &str;
    fn capabilities(&self) -> Capabilities;
    fn individual(&self) -> Option<IndividualHandle>;
    async fn change_detail(&self, change: DetailChange) -> Result<(), EngineError>;
}

#[async_trait(?Send)]
pub trait PersonaStore {
    fn id(&self) -> &str;
    fn is_writeable(&self) -> bool;
    async fn flush(&self) -> Result<(), EngineError>;
}

#[async_trait(?Send)]
pub trait Aggregator {
    async fn prepare(&self) -> Result<(), EngineError>;
    /// Stream of engine notifications. Each call returns a fresh receiver.
    fn subscribe(&self) -> UnboundedReceiver<EngineEvent>;
    fn primary_store(&self) -> Option<StoreHandle>;
    fn avatar_cache(&self) -> Rc<dyn AvatarCache>;
    /// Create a persona in `store`. `Ok(None)` means an equivalent persona
    /// already existed.
    async fn add_persona_from_details(
        &self,
        store: &StoreHandle,
        details: DetailSet,
    ) -> Result<Option<PersonaHandle>, EngineError>;
    async fn remove_individual(&self, individual: &IndividualHandle) -> Result<(), EngineError>;
}

/// Why an individual set changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeReason {
    #[default]
    Unspecified,
    IdentityChange,
    InvalidIdentity,
    Offline,
    Banned,
    Busy,
}

#[derive(Clone)]
pub enum EngineEvent {
    IndividualsChanged {
        added: Vec<IndividualHandle>,
        removed: Vec<IndividualHandle>,
        message: Option<String>,
        actor: Option<PersonaHandle>,
        reason: ChangeReason,
    },
    DetailsChanged {
        individual: IndividualHandle,
        properties: Vec<Property>,
    },
    PersonasChanged {
        individual: IndividualHandle,
        added: Vec<PersonaHandle>,
        removed: Vec<PersonaHandle>,
    },
    PersonaPresenceChanged {
        persona: PersonaHandle,
    },
}

impl std::fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndividualsChanged { added, removed, .. } => f
                .debug_struct("IndividualsChanged")
                .field("added", &added.iter().map(|i| i.id()).collect::<Vec<_>>())
                .field("removed", &removed.iter().map(|i| i.id()).collect::<Vec<_>>())
                .finish(),
            Self::DetailsChanged {
                individual,
                properties,
            } => f
                .debug_struct("DetailsChanged")
                .field("individual", &individual.id())
                .field("properties", properties)
                .finish(),
            Self::PersonasChanged {
                individual,
                added,
                removed,
            } => f
                .debug_struct("PersonasChanged")
                .field("individual", &individual.id())
                .field("added", &added.iter().map(|p| p.uid()).collect::<Vec<_>>())
                .field("removed", &removed.iter().map(|p| p.uid()).collect::<Vec<_>>())
                .finish(),
            Self::PersonaPresenceChanged { persona } => f
                .debug_struct("PersonaPresenceChanged")
                .field("persona", &persona.uid())
                .finish(),
        }
    }
}
