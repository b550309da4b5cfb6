//! The row store seam.
//!
//! Services never talk HTTP directly; they go through [`Backend`], which the
//! REST client implements against the hosted platform and
//! [`crate::MemoryBackend`] implements in-process for tests and local runs.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::query::{Filter, Query, Table};

/// One table row as a JSON object.
pub type Row = Map<String, Value>;

/// Kind of change reported by the realtime feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change pushed by the realtime feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    /// New row for inserts and updates.
    pub record: Option<Row>,
    /// Previous row for updates and deletes, when the platform sends it.
    pub old_record: Option<Row>,
}

/// Stream of changes for one subscription. Dropping it unsubscribes.
pub type ChangeFeed = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Row-oriented access to the platform.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, BackendError>;

    /// Patch every row matching all `filters`; returns the updated rows.
    ///
    /// An empty result means nothing matched. Callers use this for
    /// compare-and-set by filtering on the value they read.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError>;

    /// Delete every row matching all `filters`; returns the deleted rows.
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, BackendError>;

    /// Subscribe to changes on `table`, optionally narrowed by one filter.
    async fn subscribe(
        &self,
        table: Table,
        filter: Option<Filter>,
    ) -> Result<ChangeFeed, BackendError>;

    /// Store a file and return its public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError>;
}
