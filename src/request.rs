//! Asynchronous host requests and their life cycle.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::watch;

use crate::error::ManagerError;
use crate::models::{Contact, ContactId};
use crate::query::{Filter, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Inactive,
    Active,
    Canceled,
    Finished,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Finished)
    }
}

#[derive(Debug, Clone)]
pub enum RequestKind {
    Fetch {
        filter: Filter,
        sort: Vec<SortOrder>,
    },
    Save {
        contacts: Vec<Contact>,
    },
    Remove {
        ids: Vec<ContactId>,
    },
    /// A request type this backend does not handle.
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestResults {
    pub contacts: Vec<Contact>,
    pub error: Option<ManagerError>,
    /// Per-item errors keyed by the item's index in the request.
    pub error_map: BTreeMap<usize, ManagerError>,
}

struct Inner {
    kind: RequestKind,
    state: watch::Sender<RequestState>,
    results: RefCell<RequestResults>,
}

/// Shared handle to one request; clones refer to the same request.
#[derive(Clone)]
pub struct Request {
    inner: Rc<Inner>,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        let (state, _) = watch::channel(RequestState::Inactive);
        Self {
            inner: Rc::new(Inner {
                kind,
                state,
                results: RefCell::new(RequestResults::default()),
            }),
        }
    }

    pub fn fetch(filter: Filter, sort: Vec<SortOrder>) -> Self {
        Self::new(RequestKind::Fetch { filter, sort })
    }

    pub fn save(contacts: Vec<Contact>) -> Self {
        Self::new(RequestKind::Save { contacts })
    }

    pub fn remove(ids: Vec<ContactId>) -> Self {
        Self::new(RequestKind::Remove { ids })
    }

    pub fn kind(&self) -> &RequestKind {
        &self.inner.kind
    }

    pub fn state(&self) -> RequestState {
        *self.inner.state.borrow()
    }

    pub fn results(&self) -> RequestResults {
        self.inner.results.borrow().clone()
    }

    pub(crate) fn set_state(&self, state: RequestState) {
        self.inner.state.send_replace(state);
    }

    pub(crate) fn finish(&self, results: RequestResults) {
        *self.inner.results.borrow_mut() = results;
        self.set_state(RequestState::Finished);
    }

    /// Wait until the request is finished or canceled.
    pub async fn wait_finished(&self) -> RequestState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(RequestState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}
