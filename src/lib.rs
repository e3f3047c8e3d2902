//! Contact-manager backend over an aggregation engine.
//!
//! Individuals (aggregated people) and their personas are projected onto a
//! generic [`Contact`] model, engine notifications are turned into contact
//! notifications, and contact edits are written back detail by detail.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod manager;
pub mod models;
pub mod projector;
pub mod query;
pub mod request;
pub mod router;
pub mod translate;
pub mod writeback;

pub use config::ManagerConfig;
pub use error::{ErrorKind, ManagerError};
pub use manager::{DataType, Manager};
pub use models::{Contact, ContactId};
pub use request::{Request, RequestKind, RequestResults, RequestState};
pub use router::ContactsEvent;
