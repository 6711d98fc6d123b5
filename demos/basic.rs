//! Minimal strand example: signup with validation, a token-guarded group,
//! CORS, request logging, and health checks.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/healthz
//!   curl -X POST http://localhost:3000/signup \
//!        -H 'content-type: application/json' \
//!        -d '{"email":"alice@example.com","name":"alice"}'
//!   curl -X POST http://localhost:3000/signup \
//!        -H 'content-type: application/json' -d '{"email":"nope"}'
//!   curl http://localhost:3000/account/me -H 'authorization: Bearer demo-token'
//!   curl -X DELETE http://localhost:3000/account/me    # → 401

use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use strand::validate::{Schema, Validate};
use strand::{BindError, BoxFuture, Context, Engine, Flow, Server, auth_hook, health, middleware};

#[derive(Debug, Deserialize)]
struct Signup {
    email: String,
    #[serde(default)]
    name: String,
}

impl Validate for Signup {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field("email", |s| &s.email, "required,email")
            .field("name", |s| &s.name, "required")
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut engine = Engine::new();
    engine.allow_all_cors();
    engine.middleware(middleware::trace());

    // Real app: look the token up in a session store.
    engine.use_auth(auth_hook(|c| {
        Box::pin(async move {
            if c.client().session_token != "demo-token" {
                c.abort_with_status_json(StatusCode::UNAUTHORIZED, &json!({ "error": "unauthorized" }));
                return;
            }
            c.client_mut().user_id = 42;
            c.client_mut().role_id = 1;
        })
    }));

    engine.get("/healthz", health::liveness);
    engine.get("/readyz", health::readiness);
    // Global middleware only reaches groups; top-level routes opt in.
    engine.post("/signup", signup).middleware(middleware::trace());

    let account = engine.group("account");
    account.get("/me", me).auth();
    account.delete("/me", close_account).roles([1]);

    Server::bind("0.0.0.0:3000")
        .serve(engine.apply())
        .await
        .expect("server error");
}

// POST /signup → 201, or 400 naming the first bad field
fn signup(c: &mut Context) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        let (code, body) = match c.should_bind_json::<Signup>() {
            Ok(s) => (StatusCode::CREATED, json!({ "email": s.email, "name": s.name })),
            Err(BindError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, json!({ "error": e.message, "field": e.field }))
            }
            Err(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
        };
        let _ = c.json(code, &body);
        Flow::Next
    })
}

// GET /account/me
fn me(c: &mut Context) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        let user = json!({ "user_id": c.client().user_id, "role_id": c.client().role_id });
        let _ = c.json(StatusCode::OK, &user);
        Flow::Next
    })
}

// DELETE /account/me → 204 No Content
fn close_account(c: &mut Context) -> BoxFuture<'_, Flow> {
    Box::pin(async move {
        c.status(StatusCode::NO_CONTENT);
        Flow::Next
    })
}
