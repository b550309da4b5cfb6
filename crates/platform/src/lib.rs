//! Bazaar Platform - client for the hosted data platform.
//!
//! The platform owns persistence, password auth, realtime change feeds and
//! file storage. This crate hides it behind two object-safe traits:
//!
//! - [`Backend`] - rows (select/insert/update/delete), realtime, uploads
//! - [`AuthProvider`] - sign up, sign in, token lookup, sign out
//!
//! [`RestBackend`]/[`RestAuth`] talk to the hosted service;
//! [`MemoryBackend`]/[`MemoryAuth`] run in-process for tests and local runs.
//! [`repositories`] layers typed, domain-level access on top of a `Backend`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod backend;
pub mod config;
pub mod conversions;
pub mod env;
pub mod error;
pub mod memory;
pub mod query;
pub mod repositories;
pub mod rest;
pub mod rows;

pub use auth::{AuthError, AuthProvider, AuthSession, AuthUser, MIN_PASSWORD_LEN};
pub use backend::{Backend, ChangeEvent, ChangeFeed, ChangeKind, Row};
pub use config::PlatformConfig;
pub use error::BackendError;
pub use memory::{MemoryAuth, MemoryBackend};
pub use query::{Filter, Query, Table};
pub use repositories::RepositoryError;
pub use rest::{RestAuth, RestBackend};
