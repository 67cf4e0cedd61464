use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{
    config::Settings, rate_limit::RateLimiters, security, state::AppState,
};
use crate::db::types::Role;
use crate::db::{GatewayError, ProcedureCall, ProcedureExecutor, ProcedureResult, Row};

const TEST_JWT_SECRET: &str = "test-secret";

type Reply = Box<dyn Fn(&ProcedureCall) -> Result<ProcedureResult, GatewayError> + Send + Sync>;

/// In-memory procedure executor. Replies are scripted per routine name;
/// unscripted routines answer with an empty result set.
pub(crate) struct ScriptedGateway {
    replies: StdMutex<HashMap<String, Reply>>,
    calls: StdMutex<Vec<ProcedureCall>>,
    available: AtomicBool,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            replies: StdMutex::new(HashMap::new()),
            calls: StdMutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Answers `procedure` with one result set built from JSON objects.
    pub(crate) fn rows(self, procedure: &str, rows: Vec<Value>) -> Self {
        self.sets(procedure, vec![rows])
    }

    pub(crate) fn sets(self, procedure: &str, sets: Vec<Vec<Value>>) -> Self {
        self.reply(procedure, move |_| {
            Ok(ProcedureResult::from_sets(
                sets.iter().map(|rows| rows.iter().cloned().map(Row::from).collect()).collect(),
            ))
        })
    }

    /// Makes `procedure` raise a database error.
    pub(crate) fn raises(self, procedure: &str, message: &str, code: Option<&str>) -> Self {
        let message = message.to_string();
        let code = code.map(str::to_string);
        let name = procedure.to_string();
        self.reply(procedure, move |_| {
            Err(GatewayError::Procedure {
                procedure: name.clone(),
                message: message.clone(),
                code: code.clone(),
            })
        })
    }

    pub(crate) fn reply(
        self,
        procedure: &str,
        reply: impl Fn(&ProcedureCall) -> Result<ProcedureResult, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        self.replies.lock().unwrap().insert(procedure.to_string(), Box::new(reply));
        self
    }

    /// Every call fails as if the database were unreachable.
    pub(crate) fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn calls(&self) -> Vec<ProcedureCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn called(&self, procedure: &str) -> Option<ProcedureCall> {
        self.calls().into_iter().rev().find(|call| call.name() == procedure)
    }
}

#[async_trait]
impl ProcedureExecutor for ScriptedGateway {
    async fn execute(&self, call: ProcedureCall) -> Result<ProcedureResult, GatewayError> {
        call.validate()?;
        self.calls.lock().unwrap().push(call.clone());

        if !self.available.load(Ordering::SeqCst) {
            return Err(GatewayError::Connection(sqlx::Error::PoolTimedOut));
        }

        match self.replies.lock().unwrap().get(call.name()) {
            Some(reply) => reply(&call),
            None => Ok(ProcedureResult::from_rows(Vec::new())),
        }
    }

    async fn check_connection(&self) -> Result<(), GatewayError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Connection(sqlx::Error::PoolTimedOut))
        }
    }

    async fn close(&self) {}
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("APP_ENV", "test");
    std::env::set_var("STRICT_CONFIG", "0");
    std::env::set_var("JWT_SECRET", TEST_JWT_SECRET);
    std::env::remove_var("JWT_EXPIRES_IN");
    std::env::remove_var("DATABASE_URL");
    std::env::remove_var("CORS_ORIGIN");
    std::env::remove_var("PROMETHEUS_ENABLED");
    std::env::remove_var("DB_POOL_MAX");
    std::env::remove_var("DB_POOL_MIN");
    std::env::remove_var("RATE_LIMIT_MAX");
}

pub(crate) async fn test_settings() -> Settings {
    let _guard = env_lock().await;
    set_test_env();
    Settings::load().expect("settings")
}

/// State over a scripted gateway with rate limiting off.
pub(crate) async fn state_with(gateway: ScriptedGateway) -> AppState {
    state_over(Arc::new(gateway)).await
}

async fn state_over(gateway: Arc<ScriptedGateway>) -> AppState {
    AppState::new(test_settings().await, gateway, RateLimiters::disabled())
}

/// Full router over a scripted gateway.
pub(crate) struct TestApp {
    pub(crate) app: Router,
    pub(crate) state: AppState,
    pub(crate) gateway: Arc<ScriptedGateway>,
}

impl TestApp {
    pub(crate) fn token(&self, subject_id: i32, role: Role) -> String {
        bearer_token(subject_id, role, self.state.settings())
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        use tower::ServiceExt;

        let response = self
            .app
            .clone()
            .oneshot(json_request(method, uri, token, body))
            .await
            .expect("response");
        let status = response.status();
        (status, read_json(response).await)
    }
}

pub(crate) async fn test_app(gateway: ScriptedGateway) -> TestApp {
    let gateway = Arc::new(gateway);
    let state = state_over(gateway.clone()).await;
    let app = api::router::router(state.clone());
    TestApp { app, state, gateway }
}

pub(crate) fn bearer_token(subject_id: i32, role: Role, settings: &Settings) -> String {
    security::create_access_token(subject_id, role, settings, None).expect("token")
}

pub(crate) fn expired_token(subject_id: i32, role: Role, settings: &Settings) -> String {
    security::create_access_token(subject_id, role, settings, Some(time::Duration::minutes(-5)))
        .expect("token")
}

/// A well-formed, unexpired token signed with a secret of the caller's
/// choosing.
pub(crate) fn token_signed_with(secret: &str, subject_id: i32, role: Role) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = security::Claims { user_id: subject_id, role, iat: now, exp: now + 3600 };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
