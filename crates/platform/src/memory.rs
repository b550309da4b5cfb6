//! In-process platform for tests and local development.
//!
//! [`MemoryBackend`] keeps every table as a vector of JSON rows, evaluates
//! filters the same way the REST endpoint does, enforces the unique keys from
//! [`Table::unique_keys`] and publishes changes on a broadcast channel so
//! realtime subscriptions work. [`MemoryAuth`] is a matching password store.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use bazaar_core::{Email, UserId};

use crate::auth::{AuthError, AuthProvider, AuthSession, AuthUser, MIN_PASSWORD_LEN};
use crate::backend::{Backend, ChangeEvent, ChangeFeed, ChangeKind, Row};
use crate::error::BackendError;
use crate::query::{Filter, FilterOp, Query, Table};

const CHANGE_BUFFER: usize = 256;

/// Row store held in memory.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
    files: RwLock<HashMap<String, Vec<u8>>>,
    changes: broadcast::Sender<(Table, ChangeEvent)>,
    failing_tables: RwLock<HashSet<Table>>,
    fail_uploads: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(HashMap::new()),
                files: RwLock::new(HashMap::new()),
                changes,
                failing_tables: RwLock::new(HashSet::new()),
                fail_uploads: AtomicBool::new(false),
            }),
        }
    }

    /// Snapshot of a table.
    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.inner
            .tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every insert and update on `table` fail until cleared.
    pub async fn fail_writes_to(&self, table: Table) {
        self.inner.failing_tables.write().await.insert(table);
    }

    /// Undo [`MemoryBackend::fail_writes_to`].
    pub async fn clear_failures(&self) {
        self.inner.failing_tables.write().await.clear();
    }

    /// Make file uploads fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, AtomicOrdering::SeqCst);
    }

    async fn check_writable(&self, table: Table) -> Result<(), BackendError> {
        if self.inner.failing_tables.read().await.contains(&table) {
            return Err(BackendError::Status {
                status: 503,
                message: format!("{table} is unavailable"),
            });
        }
        Ok(())
    }

    fn publish(&self, table: Table, kind: ChangeKind, record: Option<Row>, old_record: Option<Row>) {
        // No receivers is fine.
        let _ = self.inner.changes.send((
            table,
            ChangeEvent {
                table: table.as_str().to_owned(),
                kind,
                record,
                old_record,
            },
        ));
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Order two cell values the way the platform would.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_decimal(a), as_decimal(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_timestamp(a), as_timestamp(b)) {
        return Some(x.cmp(&y));
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let value = cell(row, &filter.column);
    match &filter.op {
        FilterOp::Eq(v) => values_equal(value, v),
        FilterOp::Neq(v) => !value.is_null() && !values_equal(value, v),
        FilterOp::Gt(v) => compare(value, v) == Some(Ordering::Greater),
        FilterOp::Gte(v) => matches!(compare(value, v), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt(v) => compare(value, v) == Some(Ordering::Less),
        FilterOp::Lte(v) => matches!(compare(value, v), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::In(vs) => vs.iter().any(|v| values_equal(value, v)),
        FilterOp::IsNull => value.is_null(),
        FilterOp::NotNull => !value.is_null(),
        FilterOp::Contains(needle) => value
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(row, f))
}

/// First unique key of `table` that `row` collides with in `existing`.
fn conflict(table: Table, existing: &[Row], row: &Row) -> Option<String> {
    let id = cell(row, "id");
    if existing.iter().any(|r| values_equal(cell(r, "id"), id)) {
        return Some(format!("duplicate id {id}"));
    }
    table.unique_keys().iter().find_map(|columns| {
        let key: Vec<&Value> = columns.iter().map(|c| cell(row, c)).collect();
        if key.iter().any(|v| v.is_null()) {
            return None;
        }
        existing
            .iter()
            .any(|r| {
                columns
                    .iter()
                    .zip(&key)
                    .all(|(c, v)| values_equal(cell(r, c), v))
            })
            .then(|| format!("duplicate key ({})", columns.join(", ")))
    })
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError> {
        let tables = self.inner.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .order
                    .iter()
                    .map(|o| {
                        let (x, y) = (cell(a, &o.column), cell(b, &o.column));
                        // Nulls sort last in both directions.
                        let ord = match (x.is_null(), y.is_null()) {
                            (true, false) => return Ordering::Greater,
                            (false, true) => return Ordering::Less,
                            _ => compare(x, y).unwrap_or(Ordering::Equal),
                        };
                        if o.ascending { ord } else { ord.reverse() }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, BackendError> {
        self.check_writable(table).await?;
        let mut tables = self.inner.tables.write().await;
        let existing = tables.entry(table).or_default();

        let mut staged = existing.clone();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.entry("id".to_owned())
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            if let Some(message) = conflict(table, &staged, &row) {
                return Err(BackendError::Conflict {
                    table: table.as_str(),
                    message,
                });
            }
            staged.push(row.clone());
            inserted.push(row);
        }
        *existing = staged;
        drop(tables);

        for row in &inserted {
            self.publish(table, ChangeKind::Insert, Some(row.clone()), None);
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        self.check_writable(table).await?;
        let mut tables = self.inner.tables.write().await;
        let mut changed = Vec::new();
        for row in tables.entry(table).or_default().iter_mut() {
            if matches_all(row, filters) {
                let old = row.clone();
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                changed.push((old, row.clone()));
            }
        }
        drop(tables);

        Ok(changed
            .into_iter()
            .map(|(old, new)| {
                self.publish(table, ChangeKind::Update, Some(new.clone()), Some(old));
                new
            })
            .collect())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        self.check_writable(table).await?;
        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table).or_default();
        let (removed, kept): (Vec<Row>, Vec<Row>) =
            rows.drain(..).partition(|r| matches_all(r, filters));
        *rows = kept;
        drop(tables);

        for row in &removed {
            self.publish(table, ChangeKind::Delete, None, Some(row.clone()));
        }
        Ok(removed)
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: Option<Filter>,
    ) -> Result<ChangeFeed, BackendError> {
        let mut rx = self.inner.changes.subscribe();
        Ok(Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok((changed, event)) => {
                        if changed != table {
                            continue;
                        }
                        let row = event.record.as_ref().or(event.old_record.as_ref());
                        let wanted = match (&filter, row) {
                            (None, _) => true,
                            (Some(f), Some(row)) => matches(row, f),
                            (Some(_), None) => false,
                        };
                        if wanted {
                            yield event;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, table = %table, "Memory change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BackendError> {
        if self.inner.fail_uploads.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Storage("storage unavailable".to_owned()));
        }
        let key = format!("{bucket}/{path}");
        self.inner.files.write().await.insert(key.clone(), bytes);
        Ok(format!("memory://{key}"))
    }
}

/// Password accounts held in memory.
#[derive(Clone, Default)]
pub struct MemoryAuth {
    inner: Arc<RwLock<MemoryAuthState>>,
}

#[derive(Default)]
struct MemoryAuthState {
    accounts: HashMap<String, (UserId, String)>,
    tokens: HashMap<String, AuthUser>,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(state: &mut MemoryAuthState, user: AuthUser) -> AuthSession {
        let access_token = Uuid::new_v4().simple().to_string();
        state.tokens.insert(access_token.clone(), user.clone());
        AuthSession {
            access_token,
            refresh_token: None,
            user,
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }
        let mut state = self.inner.write().await;
        if state.accounts.contains_key(email.as_str()) {
            return Err(AuthError::EmailTaken);
        }
        let id = UserId::random();
        state.accounts.insert(
            email.as_str().to_owned(),
            (id, password.expose_secret().to_owned()),
        );
        Ok(Self::issue(
            &mut state,
            AuthUser {
                id,
                email: email.clone(),
            },
        ))
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let mut state = self.inner.write().await;
        let id = match state.accounts.get(email.as_str()) {
            Some((id, stored)) if stored == password.expose_secret() => *id,
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(Self::issue(
            &mut state,
            AuthUser {
                id,
                email: email.clone(),
            },
        ))
    }

    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.inner
            .read()
            .await
            .tokens
            .get(access_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.inner.write().await.tokens.remove(access_token);
        Ok(())
    }
}
