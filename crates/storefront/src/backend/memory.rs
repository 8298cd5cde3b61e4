//! In-process backend with the hosted service's query semantics.
//!
//! Tables are vectors of JSON rows behind a `tokio` mutex. Inserts assign
//! `id`, `created_at` and `updated_at` when absent; embeds resolve against
//! the other tables on read. One-shot [`Failure`]s can be queued to make the
//! next matching operation fail, and every row operation is recorded so
//! callers can assert on what was sent.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use apartmart_core::UserId;

use super::{
    AUTH_EVENT_CAPACITY, AuthEvent, AuthSession, AuthUser, Backend, BackendError, Cardinality,
    Filter, Query, SignUp,
};

/// Base URL used for public object links.
pub const MEMORY_BASE_URL: &str = "http://memory.local";

/// Row or storage operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Upload,
}

/// A queued one-shot failure: the next `op` on `table` (or bucket, for
/// uploads) answers with a 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub table: String,
    pub op: Operation,
}

impl Failure {
    #[must_use]
    pub fn new(table: &str, op: Operation) -> Self {
        Self {
            table: table.to_owned(),
            op,
        }
    }
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Operation,
    pub table: String,
}

struct Identity {
    id: UserId,
    email: String,
    password: String,
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    identities: HashMap<String, Identity>,
    session: Option<AuthSession>,
    objects: HashMap<(String, String), StoredObject>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
    ticks: i64,
}

impl MemoryState {
    /// Record the call and consume a matching queued failure, if any.
    fn enter(&mut self, op: Operation, table: &str) -> Result<(), BackendError> {
        self.calls.push(Call {
            op,
            table: table.to_owned(),
        });
        if let Some(pos) = self
            .failures
            .iter()
            .position(|f| f.op == op && f.table == table)
        {
            self.failures.remove(pos);
            debug!(?op, table, "Injected failure");
            return Err(BackendError::Api {
                status: 500,
                message: format!("injected {op:?} failure on {table}"),
            });
        }
        Ok(())
    }

    /// Strictly increasing timestamps so `created_at` ordering is stable.
    fn next_timestamp(&mut self) -> String {
        self.ticks += 1;
        let epoch = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        (epoch + Duration::seconds(self.ticks)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn table(&self, name: &str) -> &[Value] {
        self.tables.get(name).map_or(&[], Vec::as_slice)
    }

    fn matching(&self, table: &str, query: &Query) -> Vec<Value> {
        self.table(table)
            .iter()
            .filter(|row| matches_filters(row, &query.filters))
            .cloned()
            .collect()
    }

    fn embed(&self, row: &mut Value, query: &Query) {
        for embed in &query.embeds {
            let related = match embed.cardinality {
                Cardinality::One => {
                    let key = row.get(&embed.foreign_key).cloned().unwrap_or(Value::Null);
                    if key.is_null() {
                        Value::Null
                    } else {
                        self.table(&embed.table)
                            .iter()
                            .find(|other| other.get("id") == Some(&key))
                            .cloned()
                            .unwrap_or(Value::Null)
                    }
                }
                Cardinality::Many => {
                    let id = row.get("id").cloned().unwrap_or(Value::Null);
                    Value::Array(
                        self.table(&embed.table)
                            .iter()
                            .filter(|other| other.get(&embed.foreign_key) == Some(&id))
                            .cloned()
                            .collect(),
                    )
                }
            };
            if let Some(object) = row.as_object_mut() {
                object.insert(embed.alias.clone(), related);
            }
        }
    }

    fn insert_row(&mut self, table: &str, row: Value) -> Result<Value, BackendError> {
        let Value::Object(mut object) = row else {
            return Err(BackendError::InvalidRequest(format!(
                "rows for {table} must be JSON objects"
            )));
        };

        let id = object
            .entry("id")
            .or_insert_with(|| Value::String(UserId::new().to_string()))
            .clone();
        if self.table(table).iter().any(|r| r.get("id") == Some(&id)) {
            return Err(BackendError::Api {
                status: 409,
                message: format!("duplicate key value violates unique constraint \"{table}_pkey\""),
            });
        }

        let now = self.next_timestamp();
        object
            .entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        object
            .entry("updated_at")
            .or_insert_with(|| Value::String(now));

        let row = Value::Object(object);
        self.tables
            .entry(table.to_owned())
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// In-process [`Backend`]. Clones share state.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryBackendInner>,
}

struct MemoryBackendInner {
    state: Mutex<MemoryState>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            inner: Arc::new(MemoryBackendInner {
                state: Mutex::new(MemoryState::default()),
                events,
            }),
        }
    }

    /// Insert rows directly, bypassing failure injection and the call log.
    ///
    /// # Errors
    ///
    /// Returns an error if a row is not an object or repeats an existing id.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let mut state = self.inner.state.lock().await;
        rows.into_iter()
            .map(|row| state.insert_row(table, row))
            .collect()
    }

    /// Snapshot of a table's stored rows.
    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.inner.state.lock().await.table(table).to_vec()
    }

    /// Register an email/password identity without signing it in.
    ///
    /// # Errors
    ///
    /// Returns `UserAlreadyExists` if the email is taken.
    pub async fn create_identity(&self, email: &str, password: &str) -> Result<UserId, BackendError> {
        let mut state = self.inner.state.lock().await;
        let key = email.to_lowercase();
        if state.identities.contains_key(&key) {
            return Err(BackendError::UserAlreadyExists);
        }
        let id = UserId::new();
        state.identities.insert(
            key,
            Identity {
                id,
                email: email.to_owned(),
                password: password.to_owned(),
            },
        );
        Ok(id)
    }

    /// Whether an identity exists for `email`.
    pub async fn has_identity(&self, email: &str) -> bool {
        self.inner
            .state
            .lock()
            .await
            .identities
            .contains_key(&email.to_lowercase())
    }

    /// Make the next `op` on `table` fail.
    pub async fn fail_next(&self, table: &str, op: Operation) {
        self.inner
            .state
            .lock()
            .await
            .failures
            .push(Failure::new(table, op));
    }

    /// Every row and storage operation performed so far.
    pub async fn calls(&self) -> Vec<Call> {
        self.inner.state.lock().await.calls.clone()
    }

    /// Number of recorded `op` calls against `table`.
    pub async fn call_count(&self, table: &str, op: Operation) -> usize {
        self.inner
            .state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op && c.table == table)
            .count()
    }

    /// Stored object bytes and content type.
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        self.inner
            .state
            .lock()
            .await
            .objects
            .get(&(bucket.to_owned(), path.to_owned()))
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.inner.events.send(event);
    }

    async fn start_session(&self, id: UserId, email: &str) -> AuthSession {
        let session = AuthSession {
            user: AuthUser {
                id,
                email: Some(email.to_owned()),
            },
            expires_at: None,
        };
        self.inner.state.lock().await.session = Some(session.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        session
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError> {
        Ok(self.inner.state.lock().await.session.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let (id, stored_email) = {
            let state = self.inner.state.lock().await;
            match state.identities.get(&email.to_lowercase()) {
                Some(identity) if identity.password == password => {
                    (identity.id, identity.email.clone())
                }
                _ => return Err(BackendError::InvalidCredentials),
            }
        };
        Ok(self.start_session(id, &stored_email).await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, BackendError> {
        let id = self.create_identity(email, password).await?;
        let session = self.start_session(id, email).await;
        Ok(SignUp {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.inner.state.lock().await.session = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Select, table)?;

        let mut rows = state.matching(table, query);
        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                query
                    .order
                    .iter()
                    .map(|o| {
                        let ord = compare(
                            a.get(&o.column).unwrap_or(&Value::Null),
                            b.get(&o.column).unwrap_or(&Value::Null),
                        );
                        if o.ascending { ord } else { ord.reverse() }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        for row in &mut rows {
            state.embed(row, query);
        }
        Ok(rows)
    }

    async fn count(&self, table: &str, query: &Query) -> Result<u64, BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Count, table)?;
        let matched = state
            .table(table)
            .iter()
            .filter(|row| matches_filters(row, &query.filters))
            .count();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Insert, table)?;

        let rows = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };

        // All-or-nothing, like a single multi-row INSERT.
        let snapshot = state.table(table).to_vec();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            match state.insert_row(table, row) {
                Ok(row) => stored.push(row),
                Err(e) => {
                    state.tables.insert(table.to_owned(), snapshot);
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Update, table)?;

        let Value::Object(patch) = patch else {
            return Err(BackendError::InvalidRequest(format!(
                "patch for {table} must be a JSON object"
            )));
        };

        let now = state.next_timestamp();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| matches_filters(row, &query.filters))
            {
                if let Some(object) = row.as_object_mut() {
                    apply_patch(object, &patch, &now);
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Delete, table)?;

        if query.filters.is_empty() {
            return Err(BackendError::InvalidRequest(format!(
                "refusing unfiltered delete on {table}"
            )));
        }
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| !matches_filters(row, &query.filters));
        }
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.inner.state.lock().await;
        state.enter(Operation::Upload, bucket)?;

        let key = (bucket.to_owned(), path.to_owned());
        if state.objects.contains_key(&key) {
            return Err(BackendError::Api {
                status: 409,
                message: "The resource already exists".to_owned(),
            });
        }
        state.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{MEMORY_BASE_URL}/storage/v1/object/public/{bucket}/{path}")
    }
}

fn matches_filters(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, Value::Null) | Filter::IsNull(column) => {
            row.get(column).is_none_or(Value::is_null)
        }
        Filter::Eq(column, value) => row.get(column) == Some(value),
    })
}

fn apply_patch(row: &mut Map<String, Value>, patch: &Map<String, Value>, now: &str) {
    for (key, value) in patch {
        row.insert(key.clone(), value.clone());
    }
    if !patch.contains_key("updated_at") && row.contains_key("updated_at") {
        row.insert("updated_at".to_owned(), Value::String(now.to_owned()));
    }
}

/// Column ordering: nulls first, then numbers, strings and booleans.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::backend::Embed;

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let backend = MemoryBackend::new();
        let rows = backend
            .insert("categories", json!({ "name": "Snacks" }))
            .await
            .unwrap();
        let row = &rows[0];
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(row["name"], "Snacks");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let backend = MemoryBackend::new();
        backend
            .insert("profiles", json!({ "id": "u-1", "email": "a@b.co" }))
            .await
            .unwrap();
        let err = backend
            .insert("profiles", json!({ "id": "u-1", "email": "a@b.co" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_multi_row_insert_is_atomic() {
        let backend = MemoryBackend::new();
        let err = backend
            .insert(
                "order_items",
                json!([{ "id": "a" }, { "id": "b" }, { "id": "a" }]),
            )
            .await;
        assert!(err.is_err());
        assert!(backend.rows("order_items").await.is_empty());
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_embeds() {
        let backend = MemoryBackend::new();
        backend
            .seed(
                "products",
                vec![
                    json!({ "id": "p-1", "name": "Tea", "price": 5.0 }),
                    json!({ "id": "p-2", "name": "Soap", "price": 3.0 }),
                ],
            )
            .await
            .unwrap();
        backend
            .seed(
                "product_images",
                vec![
                    json!({ "id": "i-1", "product_id": "p-1", "image_url": "a" }),
                    json!({ "id": "i-2", "product_id": "p-1", "image_url": "b" }),
                ],
            )
            .await
            .unwrap();
        backend
            .seed(
                "cart_items",
                vec![
                    json!({ "id": "c-1", "user_id": "u-1", "product_id": "p-1", "variant_id": null }),
                    json!({ "id": "c-2", "user_id": "u-2", "product_id": "p-2", "variant_id": null }),
                ],
            )
            .await
            .unwrap();

        let cart = backend
            .select(
                "cart_items",
                &Query::new()
                    .embed(Embed::one("product", "products", "product_id"))
                    .embed(Embed::one("variant", "product_variants", "variant_id"))
                    .eq("user_id", "u-1"),
            )
            .await
            .unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0]["product"]["name"], "Tea");
        assert!(cart[0]["variant"].is_null());

        let products = backend
            .select(
                "products",
                &Query::new()
                    .embed(Embed::many("images", "product_images", "product_id"))
                    .order("price", true),
            )
            .await
            .unwrap();
        assert_eq!(products[0]["name"], "Soap");
        assert_eq!(products[1]["images"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let backend = MemoryBackend::new();
        backend
            .seed("profiles", vec![json!({ "id": "u-1", "role": "customer" })])
            .await
            .unwrap();
        let rows = backend
            .update(
                "profiles",
                &Query::new().eq("id", "u-1"),
                json!({ "role": "team" }),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["role"], "team");
        assert_ne!(rows[0]["updated_at"], rows[0]["created_at"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        backend.fail_next("orders", Operation::Insert).await;
        assert!(backend.insert("orders", json!({})).await.is_err());
        assert!(backend.insert("orders", json!({})).await.is_ok());
        assert_eq!(backend.call_count("orders", Operation::Insert).await, 2);
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let backend = MemoryBackend::new();
        backend
            .seed("cart_items", vec![json!({ "id": "c-1", "user_id": "u-1" })])
            .await
            .unwrap();
        assert!(backend.delete("cart_items", &Query::new()).await.is_err());
        backend
            .delete("cart_items", &Query::new().eq("user_id", "u-1"))
            .await
            .unwrap();
        assert!(backend.rows("cart_items").await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_round_trip_emits_events() {
        let backend = MemoryBackend::new();
        let mut events = backend.subscribe();

        let created = backend.sign_up("Shopper@Example.com", "Secret1").await.unwrap();
        assert!(created.session.is_some());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));

        backend.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(backend.get_session().await.unwrap().is_none());

        let err = backend
            .sign_in_with_password("shopper@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));

        let session = backend
            .sign_in_with_password("shopper@example.com", "Secret1")
            .await
            .unwrap();
        assert_eq!(session.user.id, created.user.id);

        assert!(matches!(
            backend.sign_up("shopper@example.com", "x").await,
            Err(BackendError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_existing_path() {
        let backend = MemoryBackend::new();
        backend
            .upload("product-images", "products/a.png", vec![1], "image/png")
            .await
            .unwrap();
        assert!(
            backend
                .upload("product-images", "products/a.png", vec![2], "image/png")
                .await
                .is_err()
        );
        assert_eq!(
            backend.object("product-images", "products/a.png").await,
            Some((vec![1], "image/png".to_owned()))
        );
        assert_eq!(
            backend.public_url("product-images", "products/a.png"),
            "http://memory.local/storage/v1/object/public/product-images/products/a.png"
        );
    }
}
