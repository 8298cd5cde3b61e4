//! `reqwest` client for the hosted service's REST, auth and storage APIs.
//!
//! Requests carry the public API key in the `apikey` header and a bearer
//! token: the signed-in user's access token when there is a session,
//! otherwise the public key itself. Row-level security on the service
//! decides what each caller may read or write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, instrument};
use url::Url;

use super::{
    AUTH_EVENT_CAPACITY, AuthEvent, AuthSession, AuthUser, Backend, BackendError, Query, SignUp,
};
use crate::config::BackendConfig;

/// Refresh the access token this long before it actually expires.
const REFRESH_MARGIN_SECS: i64 = 10;

/// Longest error body excerpt kept in logs and error messages.
const ERROR_BODY_EXCERPT: usize = 200;

// =============================================================================
// SupabaseBackend
// =============================================================================

/// Client for the hosted backend.
///
/// Cheap to clone; clones share the HTTP connection pool, the session and
/// the session-change channel.
#[derive(Clone)]
pub struct SupabaseBackend {
    inner: Arc<SupabaseBackendInner>,
}

struct SupabaseBackendInner {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    session: RwLock<Option<StoredSession>>,
    events: broadcast::Sender<AuthEvent>,
}

/// Session as held in memory. Tokens never leave this module.
struct StoredSession {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    session: AuthSession,
}

impl StoredSession {
    fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.session
            .expires_at
            .is_some_and(|at| at - Duration::seconds(REFRESH_MARGIN_SECS) <= now)
    }
}

/// Token grant response from the auth API.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_stored(self) -> StoredSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + Duration::seconds(secs))
            });
        StoredSession {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            session: AuthSession {
                user: self.user,
                expires_at,
            },
        }
    }
}

/// Sign-up answers with a full session when the service auto-confirms
/// identities, and with the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

/// Union of the error body shapes used by the REST and auth APIs.
#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

impl ErrorBody {
    fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    fn message(&self, fallback: &str) -> String {
        self.msg
            .as_ref()
            .or(self.message.as_ref())
            .or(self.error_description.as_ref())
            .or(self.error.as_ref())
            .cloned()
            .unwrap_or_else(|| fallback.chars().take(ERROR_BODY_EXCERPT).collect())
    }
}

impl SupabaseBackend {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(SupabaseBackendInner {
                client,
                base_url: config.url.as_str().trim_end_matches('/').to_owned(),
                anon_key: config.anon_key.clone(),
                session: RwLock::new(None),
                events,
            }),
        })
    }

    fn endpoint(&self, path: &str, pairs: &[(String, String)]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/{path}", self.inner.base_url))
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Bearer token for the current caller.
    async fn bearer(&self) -> String {
        self.inner.session.read().await.as_ref().map_or_else(
            || self.inner.anon_key.expose_secret().to_owned(),
            |s| s.access_token.expose_secret().to_owned(),
        )
    }

    async fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let bearer = self.bearer().await;
        self.inner
            .client
            .request(method, url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .header("Authorization", format!("Bearer {bearer}"))
    }

    /// Send a request and return the body text of a success response.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = ErrorBody::parse(&text).message(&text);
            tracing::error!(
                status = %status,
                message = %message,
                "Backend returned non-success status"
            );
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    fn parse_rows(text: &str) -> Result<Vec<Value>, BackendError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(text)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    /// POST to the auth token endpoint.
    async fn grant(&self, grant_type: &str, body: Value) -> Result<StoredSession, BackendError> {
        let url = self.endpoint(
            "auth/v1/token",
            &[("grant_type".to_owned(), grant_type.to_owned())],
        )?;
        let response = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body = ErrorBody::parse(&text);
            let message = body.message(&text);
            if body.error_code.as_deref() == Some("invalid_credentials")
                || message.contains("Invalid login credentials")
            {
                return Err(BackendError::InvalidCredentials);
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        Ok(token.into_stored())
    }

    async fn store_session(&self, stored: StoredSession) -> AuthSession {
        let session = stored.session.clone();
        *self.inner.session.write().await = Some(stored);
        session
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers is fine; nobody is listening yet.
        let _ = self.inner.events.send(event);
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<Option<AuthSession>, BackendError> {
        let refresh_token = {
            let guard = self.inner.session.read().await;
            guard
                .as_ref()
                .and_then(|s| s.refresh_token.as_ref())
                .map(|t| t.expose_secret().to_owned())
        };

        let Some(refresh_token) = refresh_token else {
            return Ok(None);
        };

        match self
            .grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(stored) => {
                let session = self.store_session(stored).await;
                debug!("Access token refreshed");
                self.emit(AuthEvent::TokenRefreshed(session.clone()));
                Ok(Some(session))
            }
            Err(e) => {
                *self.inner.session.write().await = None;
                self.emit(AuthEvent::SignedOut);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    // =========================================================================
    // Auth
    // =========================================================================

    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError> {
        let (session, expired) = {
            let guard = self.inner.session.read().await;
            match guard.as_ref() {
                Some(stored) => (Some(stored.session.clone()), stored.expires_soon(Utc::now())),
                None => (None, false),
            }
        };

        if expired {
            return self.refresh().await;
        }
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let stored = self
            .grant(
                "password",
                json!({ "email": email, "password": password }),
            )
            .await?;
        let session = self.store_session(stored).await;
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, BackendError> {
        let url = self.endpoint("auth/v1/signup", &[])?;
        let response = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body = ErrorBody::parse(&text);
            let message = body.message(&text);
            if body.error_code.as_deref() == Some("user_already_exists")
                || message.contains("already registered")
            {
                return Err(BackendError::UserAlreadyExists);
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        match serde_json::from_str::<SignUpResponse>(&text)? {
            SignUpResponse::Session(token) => {
                let user = token.user.clone();
                let session = self.store_session(token.into_stored()).await;
                self.emit(AuthEvent::SignedIn(session.clone()));
                Ok(SignUp {
                    user,
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUp {
                user,
                session: None,
            }),
        }
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self
            .inner
            .session
            .write()
            .await
            .take()
            .map(|s| s.access_token);

        let result = match token {
            Some(token) => {
                let url = self.endpoint("auth/v1/logout", &[])?;
                let builder = self
                    .inner
                    .client
                    .post(url)
                    .header("apikey", self.inner.anon_key.expose_secret())
                    .header(
                        "Authorization",
                        format!("Bearer {}", token.expose_secret()),
                    );
                self.send(builder).await.map(|_| ())
            }
            None => Ok(()),
        };

        self.emit(AuthEvent::SignedOut);
        result
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Rows
    // =========================================================================

    #[instrument(skip(self, query), fields(table = %table))]
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.endpoint(&format!("rest/v1/{table}"), &query.to_pairs())?;
        let builder = self
            .request(reqwest::Method::GET, url)
            .await
            .header("Accept", "application/json");
        let text = self.send(builder).await?;
        Self::parse_rows(&text)
    }

    #[instrument(skip(self, query), fields(table = %table))]
    async fn count(&self, table: &str, query: &Query) -> Result<u64, BackendError> {
        let mut pairs = vec![("select".to_owned(), "*".to_owned())];
        pairs.extend(query.filter_pairs());
        let url = self.endpoint(&format!("rest/v1/{table}"), &pairs)?;
        let response = self
            .request(reqwest::Method::HEAD, url)
            .await
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: format!("count on {table} failed"),
            });
        }

        // Content-Range: 0-24/25 (or */0 for an empty table)
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|range| range.rsplit('/').next())
            .and_then(|total| total.parse::<u64>().ok())
            .ok_or_else(|| BackendError::Api {
                status: status.as_u16(),
                message: "missing or malformed Content-Range header".to_owned(),
            })
    }

    #[instrument(skip(self, rows), fields(table = %table))]
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, BackendError> {
        let url = self.endpoint(
            &format!("rest/v1/{table}"),
            &[("select".to_owned(), "*".to_owned())],
        )?;
        let builder = self
            .request(reqwest::Method::POST, url)
            .await
            .header("Prefer", "return=representation")
            .json(&rows);
        let text = self.send(builder).await?;
        Self::parse_rows(&text)
    }

    #[instrument(skip(self, query, patch), fields(table = %table))]
    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let mut pairs = vec![("select".to_owned(), "*".to_owned())];
        pairs.extend(query.filter_pairs());
        let url = self.endpoint(&format!("rest/v1/{table}"), &pairs)?;
        let builder = self
            .request(reqwest::Method::PATCH, url)
            .await
            .header("Prefer", "return=representation")
            .json(&patch);
        let text = self.send(builder).await?;
        Self::parse_rows(&text)
    }

    #[instrument(skip(self, query), fields(table = %table))]
    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError> {
        if query.filters.is_empty() {
            return Err(BackendError::InvalidRequest(format!(
                "refusing unfiltered delete on {table}"
            )));
        }
        let url = self.endpoint(&format!("rest/v1/{table}"), &query.filter_pairs())?;
        let builder = self.request(reqwest::Method::DELETE, url).await;
        self.send(builder).await.map(|_| ())
    }

    // =========================================================================
    // Storage
    // =========================================================================

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(
            &format!("storage/v1/object/{bucket}/{}", encode_path(path)),
            &[],
        )?;
        let builder = self
            .request(reqwest::Method::POST, url)
            .await
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(builder).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{}",
            self.inner.base_url,
            encode_path(path)
        )
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::config::BackendConfig;

    const ANON_KEY: &str = "anon-test-key";
    const USER_ID: &str = "0b6f1a52-2c3d-4e5f-8a9b-0c1d2e3f4a5b";

    fn backend(server: &MockServer) -> SupabaseBackend {
        let config = BackendConfig {
            url: Url::parse(&server.base_url()).unwrap(),
            anon_key: SecretString::from(ANON_KEY),
            request_timeout: std::time::Duration::from_secs(5),
        };
        SupabaseBackend::new(&config).unwrap()
    }

    fn token_body() -> Value {
        json!({
            "access_token": "user-access-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "user-refresh-token",
            "user": { "id": USER_ID, "email": "shopper@example.com" }
        })
    }

    #[tokio::test]
    async fn test_select_sends_query_and_anon_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/products")
                    .query_param("select", "*,category:categories(*)")
                    .query_param("is_active", "eq.true")
                    .query_param("order", "created_at.desc")
                    .header("apikey", ANON_KEY)
                    .header("Authorization", format!("Bearer {ANON_KEY}"));
                then.status(200).json_body(json!([{ "id": 1 }, { "id": 2 }]));
            })
            .await;

        let query = Query::new()
            .embed(crate::backend::Embed::one("category", "categories", "category_id"))
            .eq("is_active", true)
            .order("created_at", false);
        let rows = backend(&server).select("products", &query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_sign_in_stores_session_and_uses_user_token() {
        let server = MockServer::start_async().await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .json_body(json!({ "email": "shopper@example.com", "password": "Secret1" }));
                then.status(200).json_body(token_body());
            })
            .await;
        let rows = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/cart_items")
                    .header("Authorization", "Bearer user-access-token");
                then.status(200).json_body(json!([]));
            })
            .await;

        let backend = backend(&server);
        let mut events = backend.subscribe();
        let session = backend
            .sign_in_with_password("shopper@example.com", "Secret1")
            .await
            .unwrap();
        assert_eq!(session.user.id.to_string(), USER_ID);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));

        backend.select("cart_items", &Query::new()).await.unwrap();
        token.assert_async().await;
        rows.assert_async().await;
        assert_eq!(backend.get_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_invalid_credentials_are_recognised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({
                    "code": 400,
                    "error_code": "invalid_credentials",
                    "msg": "Invalid login credentials"
                }));
            })
            .await;

        let err = backend(&server)
            .sign_in_with_password("admin@apartmart.com", "admin123")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_without_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/signup");
                then.status(200)
                    .json_body(json!({ "id": USER_ID, "email": "new@example.com", "aud": "authenticated" }));
            })
            .await;

        let outcome = backend(&server)
            .sign_up("new@example.com", "Secret1")
            .await
            .unwrap();
        assert_eq!(outcome.user.id.to_string(), USER_ID);
        assert!(outcome.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_existing_user() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/signup");
                then.status(422).json_body(json!({
                    "code": 422,
                    "error_code": "user_already_exists",
                    "msg": "User already registered"
                }));
            })
            .await;

        let err = backend(&server)
            .sign_up("taken@example.com", "Secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UserAlreadyExists));
    }

    #[tokio::test]
    async fn test_count_reads_content_range() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::HEAD)
                    .path("/rest/v1/orders")
                    .header("Prefer", "count=exact");
                then.status(200).header("Content-Range", "0-24/42");
            })
            .await;

        let total = backend(&server).count("orders", &Query::new()).await.unwrap();
        assert_eq!(total, 42);
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/profiles");
                then.status(409).json_body(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint \"profiles_pkey\""
                }));
            })
            .await;

        let err = backend(&server)
            .insert("profiles", json!({ "id": USER_ID }))
            .await
            .unwrap_err();
        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.contains("duplicate key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_and_delete_use_filters() {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/cart_items")
                    .query_param("id", "eq.item-1")
                    .header("Prefer", "return=representation")
                    .json_body(json!({ "quantity": 3 }));
                then.status(200).json_body(json!([{ "id": "item-1", "quantity": 3 }]));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/cart_items")
                    .query_param("user_id", "eq.u-1");
                then.status(204);
            })
            .await;

        let backend = backend(&server);
        let rows = backend
            .update(
                "cart_items",
                &Query::new().eq("id", "item-1"),
                json!({ "quantity": 3 }),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        backend
            .delete("cart_items", &Query::new().eq("user_id", "u-1"))
            .await
            .unwrap();

        patch.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let server = MockServer::start_async().await;
        let err = backend(&server)
            .delete("cart_items", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_upload_and_public_url() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/storage/v1/object/product-images/products/abc.png")
                    .header("Content-Type", "image/png");
                then.status(200).json_body(json!({ "Key": "product-images/products/abc.png" }));
            })
            .await;

        let backend = backend(&server);
        backend
            .upload("product-images", "products/abc.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        upload.assert_async().await;
        assert_eq!(
            backend.public_url("product-images", "products/abc.png"),
            format!(
                "{}/storage/v1/object/public/product-images/products/abc.png",
                server.base_url()
            )
        );
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(200).json_body(token_body());
            })
            .await;
        let logout = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/logout")
                    .header("Authorization", "Bearer user-access-token");
                then.status(204);
            })
            .await;

        let backend = backend(&server);
        backend
            .sign_in_with_password("shopper@example.com", "Secret1")
            .await
            .unwrap();
        backend.sign_out().await.unwrap();
        logout.assert_async().await;
        assert_eq!(backend.get_session().await.unwrap(), None);
    }

    #[test]
    fn test_error_body_fallbacks() {
        assert_eq!(
            ErrorBody::parse(r#"{"error":"invalid_grant","error_description":"bad"}"#)
                .message(""),
            "bad"
        );
        assert_eq!(ErrorBody::parse("not json").message("not json"), "not json");
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("products/a b.png"), "products/a%20b.png");
    }
}
