//! In-place update of an existing contact.
//!
//! The chain walks [`UpdateStep::CHAIN`] in order. Every step produces
//! exactly one [`StepOutcome`] whether or not it called the engine, a failed
//! step does not stop later ones, and the primary store is flushed once at
//! the end.

use tracing::{debug, warn};

use super::{
    avatar_icon, birthday, details_changed, email_addresses, gender, im_addresses, notes,
    phone_numbers, postal_addresses, roles, structured_name, urls,
};
use crate::engine::{Capabilities, DetailChange, EngineError, PersonaHandle, Property, StoreHandle};
use crate::models::{Contact, ContactId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStep {
    Addresses,
    Avatar,
    Birthday,
    Favorite,
    FullName,
    Alias,
    StructuredName,
    Notes,
    PhoneNumbers,
    ImAddresses,
    Organization,
    Urls,
    EmailAddresses,
    Gender,
}

impl UpdateStep {
    pub const CHAIN: [UpdateStep; 14] = [
        UpdateStep::Addresses,
        UpdateStep::Avatar,
        UpdateStep::Birthday,
        UpdateStep::Favorite,
        UpdateStep::FullName,
        UpdateStep::Alias,
        UpdateStep::StructuredName,
        UpdateStep::Notes,
        UpdateStep::PhoneNumbers,
        UpdateStep::ImAddresses,
        UpdateStep::Organization,
        UpdateStep::Urls,
        UpdateStep::EmailAddresses,
        UpdateStep::Gender,
    ];

    pub fn property(&self) -> Property {
        match self {
            Self::Addresses => Property::PostalAddresses,
            Self::Avatar => Property::Avatar,
            Self::Birthday => Property::Birthday,
            Self::Favorite => Property::IsFavourite,
            Self::FullName => Property::FullName,
            Self::Alias => Property::Alias,
            Self::StructuredName => Property::StructuredName,
            Self::Notes => Property::Notes,
            Self::PhoneNumbers => Property::PhoneNumbers,
            Self::ImAddresses => Property::ImAddresses,
            Self::Organization => Property::Roles,
            Self::Urls => Property::Urls,
            Self::EmailAddresses => Property::EmailAddresses,
            Self::Gender => Property::Gender,
        }
    }

    /// Whether the group this step writes differs between the two records.
    /// Full name and alias are both written from the display label.
    pub fn changed(&self, previous: &Contact, proposed: &Contact) -> bool {
        match self {
            Self::Addresses => details_changed(&previous.addresses, &proposed.addresses),
            Self::Avatar => previous.avatar != proposed.avatar,
            Self::Birthday => previous.birthday != proposed.birthday,
            Self::Favorite => previous.favorite != proposed.favorite,
            Self::FullName | Self::Alias => previous.display_label != proposed.display_label,
            Self::StructuredName => previous.name != proposed.name,
            Self::Notes => details_changed(&previous.notes, &proposed.notes),
            Self::PhoneNumbers => details_changed(&previous.phone_numbers, &proposed.phone_numbers),
            Self::ImAddresses => {
                details_changed(&previous.online_accounts, &proposed.online_accounts)
            }
            Self::Organization => details_changed(&previous.organizations, &proposed.organizations),
            Self::Urls => details_changed(&previous.urls, &proposed.urls),
            Self::EmailAddresses => {
                details_changed(&previous.email_addresses, &proposed.email_addresses)
            }
            Self::Gender => previous.gender != proposed.gender,
        }
    }

    /// Engine mutation carrying the proposed group. An emptied group clears
    /// the engine side.
    pub fn change(&self, proposed: &Contact) -> DetailChange {
        let label = || proposed.display_label.clone().unwrap_or_default();
        match self {
            Self::Addresses => DetailChange::PostalAddresses(postal_addresses(&proposed.addresses)),
            Self::Avatar => DetailChange::Avatar(avatar_icon(proposed.avatar.as_ref())),
            Self::Birthday => DetailChange::Birthday(proposed.birthday.map(birthday)),
            Self::Favorite => DetailChange::IsFavourite(proposed.favorite.unwrap_or(false)),
            Self::FullName => DetailChange::FullName(label()),
            Self::Alias => DetailChange::Alias(label()),
            Self::StructuredName => {
                DetailChange::StructuredName(structured_name(proposed.name.as_ref()))
            }
            Self::Notes => DetailChange::Notes(notes(&proposed.notes)),
            Self::PhoneNumbers => DetailChange::PhoneNumbers(phone_numbers(&proposed.phone_numbers)),
            Self::ImAddresses => DetailChange::ImAddresses(im_addresses(&proposed.online_accounts)),
            Self::Organization => DetailChange::Roles(roles(&proposed.organizations)),
            Self::Urls => DetailChange::Urls(urls(&proposed.urls)),
            Self::EmailAddresses => {
                DetailChange::EmailAddresses(email_addresses(&proposed.email_addresses))
            }
            Self::Gender => DetailChange::Gender(gender(proposed.gender)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The persona cannot hold this group.
    Unsupported,
    Unchanged,
    Updated,
    Failed(EngineError),
}

/// State of one save of an existing contact, threaded through the chain.
pub struct PendingWriteBack {
    pub contact_id: ContactId,
    pub previous: Contact,
    pub proposed: Contact,
    pub persona: PersonaHandle,
    pub store: Option<StoreHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub contact_id: ContactId,
    pub outcomes: Vec<(UpdateStep, StepOutcome)>,
    pub flushed: bool,
}

impl UpdateReport {
    pub fn updated(&self) -> Vec<UpdateStep> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == StepOutcome::Updated)
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn failures(&self) -> Vec<(UpdateStep, &EngineError)> {
        self.outcomes
            .iter()
            .filter_map(|(s, o)| match o {
                StepOutcome::Failed(err) => Some((*s, err)),
                _ => None,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.len() == UpdateStep::CHAIN.len()
    }
}

async fn run_step(
    step: UpdateStep,
    pending: &PendingWriteBack,
    capabilities: &Capabilities,
) -> StepOutcome {
    if !capabilities.supports(step.property()) {
        return StepOutcome::Unsupported;
    }
    if !step.changed(&pending.previous, &pending.proposed) {
        return StepOutcome::Unchanged;
    }
    match pending.persona.change_detail(step.change(&pending.proposed)).await {
        Ok(()) => StepOutcome::Updated,
        Err(err) => StepOutcome::Failed(err),
    }
}

/// Drive the full chain for one contact and flush the store.
pub async fn run_update(pending: PendingWriteBack) -> UpdateReport {
    let capabilities = pending.persona.capabilities();
    let mut outcomes = Vec::with_capacity(UpdateStep::CHAIN.len());

    for step in UpdateStep::CHAIN {
        let outcome = run_step(step, &pending, &capabilities).await;
        match &outcome {
            StepOutcome::Failed(err) => warn!(
                contact_id = %pending.contact_id,
                property = %step.property(),
                error = %err,
                "failed to update contact detail"
            ),
            StepOutcome::Updated => debug!(
                contact_id = %pending.contact_id,
                property = %step.property(),
                "updated contact detail"
            ),
            StepOutcome::Unsupported | StepOutcome::Unchanged => {}
        }
        outcomes.push((step, outcome));
    }

    let flushed = match &pending.store {
        Some(store) => match store.flush().await {
            Ok(()) => true,
            Err(err) => {
                warn!(store = store.id(), error = %err, "failed to flush persona store");
                false
            }
        },
        None => {
            warn!(contact_id = %pending.contact_id, "no primary store to flush");
            false
        }
    };

    UpdateReport {
        contact_id: pending.contact_id,
        outcomes,
        flushed,
    }
}
