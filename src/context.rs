//! Per-request state and chain traversal.
//!
//! One [`Context`] is built for every dispatched request and dropped when the
//! request completes. It carries:
//!
//! - the request head, its body (buffered once), and the resolved client,
//! - the response being written,
//! - the route's frozen chain plus the cursor that walks it,
//! - a lock-guarded key/value store for data shared between handlers.
//!
//! Only the store is synchronised. Everything else is touched by the chain of
//! the one request that owns the context, one handler at a time.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use http::request::Parts;
use http::StatusCode;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::body::{self, ParsedBody, RequestBody};
use crate::error::{BindError, BodyError};
use crate::handler::{BoxFuture, BoxedHandler, Flow};
use crate::multipart::MultipartForm;
use crate::response::{APPLICATION_JSON, ResponseWriter};
use crate::validate::Validate;

/// Role identifier as assigned by the auth hook.
pub type RoleId = i8;

type Store = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Who is making the request.
///
/// The router only fills in `session_token`; user and role are the auth
/// hook's job.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Client {
    pub user_id: i64,
    pub role_id: RoleId,
    pub session_token: String,
}

/// Mutable state for one in-flight request.
pub struct Context {
    request: Parts,
    // Taken (via `get_mut`, never locked) by the first body read. The mutex
    // only exists so `Context` is `Sync` while the body type is not.
    pending: Mutex<Option<RequestBody>>,
    full_path: String,

    client: Client,
    allowed_roles: Arc<[RoleId]>,

    body: Option<Bytes>,
    multipart: Option<MultipartForm>,
    form: Vec<(String, String)>,
    max_multipart_bytes: usize,

    store: RwLock<Option<Store>>,

    chain: Arc<[BoxedHandler]>,
    index: usize,
    aborted: bool,

    response: ResponseWriter,
    created_at: Instant,
}

impl Context {
    pub(crate) fn new(
        request: http::Request<RequestBody>,
        full_path: String,
        chain: Arc<[BoxedHandler]>,
        allowed_roles: Arc<[RoleId]>,
        max_multipart_bytes: usize,
    ) -> Self {
        let (request, pending) = request.into_parts();
        let client = Client {
            session_token: bearer_token(&request),
            ..Client::default()
        };
        Self {
            request,
            pending: Mutex::new(Some(pending)),
            full_path,
            client,
            allowed_roles,
            body: None,
            multipart: None,
            form: Vec::new(),
            max_multipart_bytes,
            store: RwLock::new(None),
            chain,
            index: 0,
            aborted: false,
            response: ResponseWriter::new(),
            created_at: Instant::now(),
        }
    }

    // ── Chain control ─────────────────────────────────────────────────────────

    /// Runs the rest of the chain.
    ///
    /// Each step re-checks the abort flag, takes the handler under the cursor,
    /// advances the cursor, and awaits the handler. A handler returning
    /// [`Flow::Stop`] moves the cursor to the end. Past the end, or once
    /// aborted, this is a no-op.
    ///
    /// Middleware that needs to act after the handlers below it awaits this
    /// directly:
    ///
    /// ```rust
    /// use strand::{BoxFuture, Context, Flow};
    ///
    /// fn timing(c: &mut Context) -> BoxFuture<'_, Flow> {
    ///     Box::pin(async move {
    ///         c.next().await;
    ///         println!("{} took {:?}", c.path(), c.elapsed());
    ///         Flow::Next
    ///     })
    /// }
    /// ```
    pub fn next(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            while self.index < self.chain.len() {
                if self.aborted {
                    return;
                }
                let handler = Arc::clone(&self.chain[self.index]);
                self.index += 1;
                if handler.call(self).await == Flow::Stop {
                    self.index = self.chain.len();
                }
            }
        })
    }

    /// Stops the chain. No handler that has not started yet will run, including
    /// those an enclosing middleware's pending `next()` would have reached.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.abort();
        self.status(code);
    }

    /// Aborts, then writes `code` with `payload` as a JSON body.
    pub fn abort_with_status_json<T: Serialize + ?Sized>(&mut self, code: StatusCode, payload: &T) {
        self.abort();
        if let Err(e) = self.json(code, payload) {
            warn!(path = %self.full_path, "encoding abort payload: {e}");
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Position of the chain cursor: how many handlers have been started.
    pub fn index(&self) -> usize {
        self.index
    }

    // ── Custom data ───────────────────────────────────────────────────────────

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.store
            .write()
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Returns a copy of the value under `key`, if one of type `T` is stored.
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.store.read().as_ref()?.get(key)?.downcast_ref::<T>().cloned()
    }

    // ── Response ──────────────────────────────────────────────────────────────

    /// Writes the status line. Only the first call per request takes effect.
    pub fn status(&mut self, code: StatusCode) {
        if !self.response.write_header(code) {
            warn!(
                path = %self.full_path,
                written = self.response.status().as_u16(),
                ignored = code.as_u16(),
                "superfluous status write"
            );
        }
    }

    /// Sets a response header. Ignored once the status has been written.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if !self.response.set_header(name.clone(), value) {
            warn!(path = %self.full_path, header = %name, "header set after status was written");
        }
    }

    /// Appends raw bytes to the response body, writing `200 OK` first if no
    /// status has been written.
    pub fn write(&mut self, bytes: &[u8]) {
        self.response.write(bytes);
    }

    /// Writes `code` and `data` encoded as JSON (`application/json`).
    ///
    /// The header and status are written before encoding; an encoding error is
    /// returned as-is and leaves them in place, with an empty body.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, data: &T) -> Result<(), serde_json::Error> {
        self.set_header(CONTENT_TYPE, APPLICATION_JSON);
        self.status(code);
        let encoded = serde_json::to_vec(data)?;
        self.response.write(&encoded);
        Ok(())
    }

    /// The status written so far, `200 OK` if none was.
    pub fn status_code(&self) -> StatusCode {
        self.response.status()
    }

    pub(crate) fn response_started(&self) -> bool {
        self.response.header_written()
    }

    pub(crate) fn into_response(self) -> http::Response<http_body_util::Full<Bytes>> {
        self.response.into_response()
    }

    // ── Body binding ──────────────────────────────────────────────────────────

    /// Deserializes the buffered body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let bytes = self.body.as_deref().unwrap_or_default();
        Ok(serde_json::from_slice(bytes)?)
    }

    /// [`bind_json`](Self::bind_json), then the type's field rules.
    pub fn should_bind_json<T: DeserializeOwned + Validate>(&self) -> Result<T, BindError> {
        let value: T = self.bind_json()?;
        value.validate()?;
        Ok(value)
    }

    /// Buffers the request body. Subsequent calls do nothing.
    pub(crate) async fn parse_body(&mut self) -> Result<(), BodyError> {
        if self.body.is_some() || self.multipart.is_some() {
            return Ok(());
        }
        let Some(pending) = self.pending.get_mut().take() else {
            return Ok(());
        };

        self.form = body::query_pairs(&self.request.uri);
        match body::read(&self.request.headers, pending, self.max_multipart_bytes).await? {
            ParsedBody::Raw { bytes, form } => {
                self.form.extend(form);
                self.body = Some(bytes);
            }
            ParsedBody::Multipart(form) => self.multipart = Some(form),
        }
        Ok(())
    }

    /// The body as it stands for a post-mortem: the unread remainder if the
    /// body was never read, otherwise the buffered bytes.
    pub(crate) async fn remaining_body(&mut self) -> Bytes {
        match self.pending.get_mut().take() {
            Some(pending) => body::drain(pending).await,
            None => self.body.clone().unwrap_or_default(),
        }
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Parts {
        &self.request
    }

    pub fn method(&self) -> &http::Method {
        &self.request.method
    }

    /// The request path as received.
    pub fn path(&self) -> &str {
        self.request.uri.path()
    }

    /// The route's mounted path, group prefix included.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers.get(name)?.to_str().ok()
    }

    /// Buffered body bytes. `None` before parsing and for multipart requests.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn multipart_form(&self) -> Option<&MultipartForm> {
        self.multipart.as_ref()
    }

    /// First form value for `key`: query string, then url-encoded body, then
    /// multipart text fields.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .or_else(|| self.multipart.as_ref()?.value(key))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Roles the route was restricted to with [`Route::roles`](crate::Route::roles).
    ///
    /// Nothing in the router compares these with [`Client::role_id`]; an auth
    /// hook that wants role checks reads them from here.
    pub fn allowed_roles(&self) -> &[RoleId] {
        &self.allowed_roles
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// The `Authorization` value with a leading `"Bearer "` stripped, or the raw
/// value when the prefix is absent.
fn bearer_token(request: &Parts) -> String {
    let raw = request
        .headers
        .get(AUTHORIZATION)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();
    match raw.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => token.to_owned(),
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use http_body_util::Full;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::handler::handler;
    use crate::validate::Schema;

    fn request(payload: &'static str) -> http::Request<RequestBody> {
        http::Request::builder()
            .method("POST")
            .uri("/x?page=2")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, "Bearer abc123")
            .body(body::boxed(Full::new(Bytes::from_static(payload.as_bytes()))))
            .unwrap()
    }

    fn context(chain: Vec<BoxedHandler>) -> Context {
        Context::new(request(""), "/x".into(), chain.into(), Arc::from([]), 1024)
    }

    type Log = Arc<StdMutex<Vec<&'static str>>>;

    fn step(log: &Log, name: &'static str, flow: Flow) -> BoxedHandler {
        let log = Arc::clone(log);
        Arc::new(handler(move |_c| {
            log.lock().unwrap().push(name);
            Box::pin(async move { flow })
        }))
    }

    #[tokio::test]
    async fn runs_chain_in_order() {
        let log = Log::default();
        let mut c = context(vec![
            step(&log, "a", Flow::Next),
            step(&log, "b", Flow::Next),
            step(&log, "c", Flow::Next),
        ]);

        c.next().await;

        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(c.index(), 3);
        c.next().await;
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stop_ends_chain_without_abort() {
        let log = Log::default();
        let mut c = context(vec![
            step(&log, "a", Flow::Stop),
            step(&log, "b", Flow::Next),
        ]);

        c.next().await;

        assert_eq!(*log.lock().unwrap(), ["a"]);
        assert!(!c.is_aborted());
    }

    #[tokio::test]
    async fn stop_inside_wrapping_middleware_ends_outer_chain() {
        let log = Log::default();
        let wrap: BoxedHandler = Arc::new(handler(|c| {
            Box::pin(async move {
                c.next().await;
                Flow::Next
            })
        }));
        let mut c = context(vec![wrap, step(&log, "b", Flow::Stop), step(&log, "c", Flow::Next)]);

        c.next().await;

        assert_eq!(*log.lock().unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn abort_halts_pending_outer_next() {
        let log = Log::default();
        let wrap: BoxedHandler = Arc::new(handler(|c| {
            Box::pin(async move {
                c.next().await;
                c.next().await;
                Flow::Next
            })
        }));
        let abort: BoxedHandler = Arc::new(handler(|c| {
            Box::pin(async move {
                c.abort_with_status(StatusCode::FORBIDDEN);
                Flow::Next
            })
        }));
        let mut c = context(vec![wrap, abort, step(&log, "after", Flow::Next)]);

        c.next().await;

        assert!(log.lock().unwrap().is_empty());
        assert!(c.is_aborted());
        assert_eq!(c.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn store_round_trips_typed_values() {
        let c = context(vec![]);
        assert_eq!(c.get::<u64>("user"), None);

        c.set("user", 42_u64);
        assert_eq!(c.get::<u64>("user"), Some(42));
        assert_eq!(c.get::<String>("user"), None);

        c.set("user", String::from("ada"));
        assert_eq!(c.get::<String>("user").as_deref(), Some("ada"));
    }

    #[test]
    fn extracts_bearer_token() {
        let c = context(vec![]);
        assert_eq!(c.client().session_token, "abc123");

        let (parts, _) = http::Request::builder()
            .header(AUTHORIZATION, "Token xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), "Token xyz");

        let (parts, _) = http::Request::new(()).into_parts();
        assert_eq!(bearer_token(&parts), "");
    }

    fn token_for(header: &str) -> String {
        let (parts, _) = http::Request::builder()
            .header(AUTHORIZATION, header)
            .body(())
            .unwrap()
            .into_parts();
        bearer_token(&parts)
    }

    #[test]
    fn bearer_prefix_is_case_sensitive() {
        assert_eq!(token_for("bearer abc"), "bearer abc");
        assert_eq!(token_for("BEARER abc"), "BEARER abc");
    }

    #[test]
    fn bare_bearer_prefix_is_kept_raw() {
        assert_eq!(token_for("Bearer "), "Bearer ");
        assert_eq!(token_for("Bearer x"), "x");
    }

    #[test]
    fn second_status_is_ignored() {
        let mut c = context(vec![]);
        c.status(StatusCode::CREATED);
        c.status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(c.status_code(), StatusCode::CREATED);
    }

    #[test]
    fn json_writes_header_status_and_body() {
        let mut c = context(vec![]);
        c.json(StatusCode::OK, &json!({"status": "ok"})).unwrap();

        let res = c.into_response();
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn parse_body_reads_once() {
        let mut c = Context::new(request(r#"{"q":1}"#), "/x".into(), Arc::from([]), Arc::from([]), 1024);
        assert!(c.body().is_none());

        c.parse_body().await.unwrap();
        assert_eq!(c.body().map(|b| &b[..]), Some(&br#"{"q":1}"#[..]));
        assert_eq!(c.form_value("page"), Some("2"));

        c.body = Some(Bytes::from_static(b"sentinel"));
        c.parse_body().await.unwrap();
        assert_eq!(c.body().map(|b| &b[..]), Some(&b"sentinel"[..]));
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Signup {
        #[serde(default)]
        name: String,
        email: String,
    }

    impl Validate for Signup {
        fn schema() -> Schema<Self> {
            Schema::<Self>::new()
                .field("name", |s| &s.name, "required")
                .field("email", |s| &s.email, "required,email")
        }
    }

    async fn parsed(body: &'static str) -> Context {
        let mut c = Context::new(request(body), "/x".into(), Arc::from([]), Arc::from([]), 1024);
        c.parse_body().await.unwrap();
        c
    }

    #[tokio::test]
    async fn bind_json_round_trips() {
        let c = parsed(r#"{"name":"ada","email":"ada@example.com"}"#).await;
        let s: Signup = c.bind_json().unwrap();
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"name": "ada", "email": "ada@example.com"})
        );
    }

    #[tokio::test]
    async fn bind_json_rejects_malformed_body() {
        let c = parsed(r#"{"name":"#).await;
        assert!(matches!(c.bind_json::<Signup>(), Err(BindError::Deserialize(_))));
    }

    #[tokio::test]
    async fn should_bind_json_validates_fields() {
        let c = parsed(r#"{"email":"ada@example.com"}"#).await;
        let err = c.should_bind_json::<Signup>().unwrap_err();
        assert_eq!(err.to_string(), "name is required");

        let c = parsed(r#"{"name":"ada","email":"not-an-email"}"#).await;
        let BindError::Validation(err) = c.should_bind_json::<Signup>().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(err.field, "email");
        assert!(err.message.contains("invalid email format"));
    }
}
