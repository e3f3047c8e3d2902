//! The contact manager facade.
//!
//! Reads are served from the in-memory index kept by the [`Router`]. Writes
//! go to the engine as background tasks on the current `LocalSet`, so a
//! manager must be opened and driven from inside one.

use futures::future::join_all;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::engine::{Aggregator, EngineEvent, StoreHandle};
use crate::error::ManagerError;
use crate::models::{Contact, ContactId, ContactType};
use crate::projector::{AvatarFetch, Projector};
use crate::query::{self, Filter, SortOrder};
use crate::request::{Request, RequestKind, RequestResults, RequestState};
use crate::router::{ContactsEvent, Dispatch, Router};
use crate::writeback::{create_contact, run_update, PendingWriteBack, UpdateReport};

pub const MANAGER_NAME: &str = "folks";
pub const MANAGER_VERSION: i32 = 1;

/// Primitive value types declared to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
}

struct Inner {
    aggregator: Rc<dyn Aggregator>,
    config: ManagerConfig,
    manager_uri: String,
    router: RefCell<Router>,
    engine_events: Mutex<UnboundedReceiver<EngineEvent>>,
    subscribers: RefCell<Vec<UnboundedSender<ContactsEvent>>>,
    write_backs: RefCell<Vec<JoinHandle<UpdateReport>>>,
    avatar_fetches: RefCell<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn publish(&self, event: ContactsEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

pub struct Manager {
    inner: Rc<Inner>,
}

impl Manager {
    /// Prepare the engine and wait for its first population cycle.
    pub async fn open(
        aggregator: Rc<dyn Aggregator>,
        config: ManagerConfig,
    ) -> Result<Self, ManagerError> {
        let manager_uri = config.manager_uri();
        let engine_events = aggregator.subscribe();
        let projector = Projector::new(aggregator.avatar_cache());
        let manager = Self {
            inner: Rc::new(Inner {
                router: RefCell::new(Router::new(&manager_uri, projector)),
                aggregator,
                config,
                manager_uri,
                engine_events: Mutex::new(engine_events),
                subscribers: RefCell::new(Vec::new()),
                write_backs: RefCell::new(Vec::new()),
                avatar_fetches: RefCell::new(Vec::new()),
            }),
        };

        if let Err(err) = manager.inner.aggregator.prepare().await {
            error!(error = %err, "failed to prepare aggregation engine");
            return Err(ManagerError::from_engine(&err));
        }
        manager.wait_for_initial_population().await;
        info!(
            manager_uri = %manager.inner.manager_uri,
            contacts = manager.contact_count(),
            "contact manager ready"
        );
        Ok(manager)
    }

    async fn wait_for_initial_population(&self) {
        let pump = async {
            while !self.inner.router.borrow().initial_population_done() {
                if !self.next_event().await {
                    warn!("engine closed before initial population");
                    break;
                }
            }
        };
        match self.inner.config.initial_population_timeout_ms {
            0 => pump.await,
            ms => {
                if tokio::time::timeout(Duration::from_millis(ms), pump)
                    .await
                    .is_err()
                {
                    warn!(timeout_ms = ms, "initial population not complete, continuing");
                }
            }
        }
    }

    pub fn manager_name(&self) -> &'static str {
        MANAGER_NAME
    }

    pub fn manager_version(&self) -> i32 {
        MANAGER_VERSION
    }

    pub fn manager_uri(&self) -> &str {
        &self.inner.manager_uri
    }

    pub fn supported_contact_types(&self) -> Vec<ContactType> {
        vec![ContactType::Contact]
    }

    pub fn supported_data_types(&self) -> Vec<DataType> {
        vec![DataType::String]
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Host-facing change notifications.
    pub fn subscribe(&self) -> UnboundedReceiver<ContactsEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.borrow_mut().push(tx);
        rx
    }

    // ── Engine events ───────────────────────────────────────────────────────

    fn dispatch(&self, event: EngineEvent) {
        let Dispatch {
            notifications,
            avatar_fetches,
        } = self.inner.router.borrow_mut().handle(event);
        for fetch in avatar_fetches {
            self.spawn_avatar_fetch(fetch);
        }
        for notification in notifications {
            self.inner.publish(notification);
        }
    }

    /// Wait for and apply one engine event. False once the engine is gone.
    pub async fn next_event(&self) -> bool {
        let event = {
            let mut rx = self.inner.engine_events.lock().await;
            rx.recv().await
        };
        match event {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Apply every engine event already queued, without waiting.
    pub fn process_pending_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.inner.engine_events.try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                // Someone is parked in `next_event`; they will see it.
                Err(_) => None,
            };
            let Some(event) = event else {
                break;
            };
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Apply engine events until the engine goes away.
    pub async fn run(&self) {
        while self.next_event().await {}
        debug!("engine event stream closed");
    }

    fn spawn_avatar_fetch(&self, fetch: AvatarFetch) {
        let cache = self.inner.router.borrow().projector().avatar_cache();
        let inner: Weak<Inner> = Rc::downgrade(&self.inner);
        let handle = tokio::task::spawn_local(async move {
            match cache.store_avatar(&fetch.individual_id, &fetch.data).await {
                Ok(uri) => {
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    let event = inner.router.borrow_mut().apply_avatar(&fetch.contact_id, uri);
                    if let Some(event) = event {
                        inner.publish(event);
                    }
                }
                Err(err) => warn!(
                    contact_id = %fetch.contact_id,
                    error = %err,
                    "failed to cache avatar"
                ),
            }
        });
        push_task(&self.inner.avatar_fetches, handle);
    }

    /// Wait for every avatar currently being cached.
    pub async fn drain_avatar_fetches(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> =
                self.inner.avatar_fetches.borrow_mut().drain(..).collect();
            if handles.is_empty() {
                break;
            }
            for result in join_all(handles).await {
                if let Err(err) = result {
                    warn!(error = %err, "avatar task failed");
                }
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn contact_count(&self) -> usize {
        self.inner.router.borrow().identity().len()
    }

    pub fn contact(&self, id: &ContactId) -> Result<Contact, ManagerError> {
        self.inner
            .router
            .borrow()
            .identity()
            .get(id)
            .map(|entry| entry.contact.clone())
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    pub fn contacts(&self, filter: &Filter, sort: &[SortOrder]) -> Vec<Contact> {
        let router = self.inner.router.borrow();
        query::select(
            router.identity().iter().map(|(_, entry)| &entry.contact),
            filter,
            sort,
        )
    }

    pub fn contact_ids(&self, filter: &Filter, sort: &[SortOrder]) -> Vec<ContactId> {
        self.contacts(filter, sort)
            .into_iter()
            .filter_map(|c| c.id)
            .collect()
    }

    /// Every detail is representable in the engine, so nothing is pruned.
    pub fn compatible_contact(&self, contact: &Contact) -> Contact {
        contact.clone()
    }

    // ── Requests ────────────────────────────────────────────────────────────

    /// Start an asynchronous request. Returns false if the request type is
    /// not handled, in which case it is canceled.
    pub fn start_request(&self, request: &Request) -> bool {
        debug!(kind = ?request.kind(), "start request");
        request.set_state(RequestState::Active);
        match request.kind() {
            RequestKind::Fetch { filter, sort } => {
                let contacts = self.contacts(filter, sort);
                request.finish(RequestResults {
                    contacts,
                    ..RequestResults::default()
                });
            }
            RequestKind::Save { contacts } => self.start_save(request, contacts.clone()),
            RequestKind::Remove { ids } => self.start_remove(request, ids.clone()),
            RequestKind::Other(kind) => {
                warn!(kind = %kind, "unsupported request type");
                request.set_state(RequestState::Canceled);
                return false;
            }
        }
        true
    }

    fn drop_empty_request(&self, request: &Request, what: &str) {
        warn!("{what} request has no items");
        if self.inner.config.finish_empty_requests {
            request.finish(RequestResults::default());
        }
    }

    fn start_save(&self, request: &Request, contacts: Vec<Contact>) {
        if contacts.is_empty() {
            self.drop_empty_request(request, "save");
            return;
        }
        let Some(store) = self.inner.aggregator.primary_store() else {
            warn!("cannot save contacts: no primary persona store");
            let err = ManagerError::NotSupported("no primary persona store".to_string());
            request.finish(RequestResults {
                error_map: (0..contacts.len()).map(|i| (i, err.clone())).collect(),
                error: Some(err),
                contacts,
            });
            return;
        };

        let mut results = RequestResults {
            contacts: contacts.clone(),
            ..RequestResults::default()
        };
        let mut creates = Vec::new();
        for (index, contact) in contacts.into_iter().enumerate() {
            match contact.id.clone() {
                None => creates.push((index, contact)),
                Some(id) => {
                    if let Err(err) = self.start_update(&store, id, contact) {
                        results.error_map.insert(index, err.clone());
                        results.error = Some(err);
                    }
                }
            }
        }
        if creates.is_empty() {
            request.finish(results);
            return;
        }

        let aggregator = self.inner.aggregator.clone();
        let manager_uri = self.inner.manager_uri.clone();
        let request = request.clone();
        tokio::task::spawn_local(async move {
            let pending = creates.into_iter().map(|(index, contact)| {
                let aggregator = aggregator.clone();
                let store = store.clone();
                let manager_uri = manager_uri.clone();
                async move {
                    let created =
                        create_contact(aggregator.as_ref(), &store, &manager_uri, contact).await;
                    (index, created)
                }
            });
            for (index, created) in join_all(pending).await {
                match created {
                    Ok(contact) => results.contacts[index] = contact,
                    Err(err) => {
                        results.error_map.insert(index, err.clone());
                        results.error = Some(err);
                    }
                }
            }
            request.finish(results);
        });
    }

    /// Launch the update chain for an existing contact. The chain runs in the
    /// background; its report is collected by [`Manager::drain_write_backs`].
    fn start_update(
        &self,
        store: &StoreHandle,
        id: ContactId,
        proposed: Contact,
    ) -> Result<(), ManagerError> {
        let pending = {
            let router = self.inner.router.borrow();
            let Some(entry) = router.identity().get(&id) else {
                warn!(contact_id = %id, "cannot save changes: no corresponding individual");
                return Err(ManagerError::NotFound(id.to_string()));
            };
            let persona = entry
                .individual
                .personas()
                .into_iter()
                .find(|p| p.store_id() == store.id());
            let Some(persona) = persona.filter(|_| store.is_writeable()) else {
                warn!(contact_id = %id, "cannot save changes: no writeable persona");
                return Err(ManagerError::NotSupported(format!(
                    "{id} has no writeable persona"
                )));
            };
            PendingWriteBack {
                contact_id: id,
                previous: entry.contact.clone(),
                proposed,
                persona,
                store: Some(store.clone()),
            }
        };
        debug!(contact_id = %pending.contact_id, "starting update chain");
        let handle = tokio::task::spawn_local(run_update(pending));
        push_task(&self.inner.write_backs, handle);
        Ok(())
    }

    /// Number of update chains still tracked. Finished chains are reaped when
    /// the next one starts; their outcome has already been logged.
    pub fn pending_write_backs(&self) -> usize {
        self.inner.write_backs.borrow().len()
    }

    /// Wait for every in-flight update chain and return their reports.
    pub async fn drain_write_backs(&self) -> Vec<UpdateReport> {
        let mut reports = Vec::new();
        loop {
            let handles: Vec<JoinHandle<UpdateReport>> =
                self.inner.write_backs.borrow_mut().drain(..).collect();
            if handles.is_empty() {
                break;
            }
            for result in join_all(handles).await {
                match result {
                    Ok(report) => reports.push(report),
                    Err(err) => warn!(error = %err, "update chain task failed"),
                }
            }
        }
        reports
    }

    fn start_remove(&self, request: &Request, ids: Vec<ContactId>) {
        if ids.is_empty() {
            self.drop_empty_request(request, "remove");
            return;
        }
        let targets: Vec<_> = {
            let router = self.inner.router.borrow();
            ids.iter()
                .enumerate()
                .filter_map(|(index, id)| match router.identity().get(id) {
                    Some(entry) => Some((index, entry.individual.clone())),
                    None => {
                        warn!(contact_id = %id, "attempted to remove unknown contact");
                        None
                    }
                })
                .collect()
        };

        let aggregator = self.inner.aggregator.clone();
        let request = request.clone();
        tokio::task::spawn_local(async move {
            let pending = targets.into_iter().map(|(index, individual)| {
                let aggregator = aggregator.clone();
                async move { (index, aggregator.remove_individual(&individual).await) }
            });
            let mut results = RequestResults::default();
            for (index, removed) in join_all(pending).await {
                if let Err(err) = removed {
                    warn!(error = %err, "failed to remove individual");
                    let err = ManagerError::from_engine(&err);
                    results.error_map.insert(index, err.clone());
                    results.error = Some(err);
                }
            }
            request.finish(results);
        });
    }
}

fn push_task<T>(tasks: &RefCell<Vec<JoinHandle<T>>>, handle: JoinHandle<T>) {
    let mut tasks = tasks.borrow_mut();
    tasks.retain(|task| !task.is_finished());
    tasks.push(handle);
}
