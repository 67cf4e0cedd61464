use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::header::{self, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    normalize_path::NormalizePath,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::api::errors::{ApiError, ErrorBody, ErrorDetail};
use crate::api::guards::authenticate;
use crate::api::{
    auth, branch_tracks, branches, courses, exams, handlers, instructor_courses, questions,
    students, tracks,
};
use crate::core::{config::Settings, metrics, state::AppState};

const REQUEST_ID: &str = "x-request-id";

/// The service handed to the listener: the router behind trailing-slash
/// normalization, so `/api/branches/` reaches `/api/branches`.
pub(crate) fn app(state: AppState) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(router(state))
}

pub(crate) fn router(state: AppState) -> Router {
    let cors = build_cors_layer(state.settings());
    let development = state.settings().runtime().environment.is_development();

    let auth_routes = Router::new()
        .merge(auth::public_router())
        .merge(
            auth::router()
                .route_layer(middleware::from_fn_with_state(state.clone(), authenticate)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_auth));

    let protected = Router::new()
        .nest("/branches", branches::router())
        .nest("/tracks", tracks::router())
        .nest("/branch-tracks", branch_tracks::router())
        .nest("/courses", courses::router())
        .nest("/instructor-course", instructor_courses::router())
        .nest("/students", students::router())
        .nest("/questions", questions::router())
        .nest("/exams", exams::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let api = Router::new().nest("/auth", auth_routes).merge(protected);

    let request_id_header = HeaderName::from_static(REQUEST_ID);
    let request_id_header_for_span = request_id_header.clone();
    let trace_layer = TraceLayer::new_for_http().make_span_with(move |request: &Request| {
        let request_id = request
            .headers()
            .get(&request_id_header_for_span)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        let route = request.extensions().get::<MatchedPath>().map_or("-", MatchedPath::as_str);
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            route = %route,
            request_id = %request_id
        )
    });

    let mut router: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), limit_api))
        .layer(CatchPanicLayer::custom(handle_panic));

    if development {
        router = router.layer(middleware::from_fn(attach_error_detail));
    }

    router = router
        .layer(middleware::from_fn(track_http))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(trace_layer)
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors);

    if state.settings().telemetry().prometheus_enabled {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router.with_state(state)
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip())
}

async fn limit_api(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);
    if !state.limiters().check_api(client) {
        tracing::warn!(client = %client, "API rate limit exceeded");
        return ApiError::TooManyRequests(
            "Too many requests from this IP, please try again later.",
        )
        .into_response();
    }
    next.run(request).await
}

/// Auth routes draw from a small budget that only failed responses
/// (status 400 and above) consume.
async fn limit_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);
    if !state.limiters().admits_auth(client) {
        tracing::warn!(client = %client, "Auth rate limit exceeded");
        return ApiError::TooManyRequests("Too many login attempts, please try again later.")
            .into_response();
    }

    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        state.limiters().charge_auth_failure(client);
    }
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    ApiError::Internal { message: "Internal server error".to_string(), detail: Some(detail) }
        .into_response()
}

/// Development only: folds the cause carried by an error response into
/// its body as `error`.
async fn attach_error_detail(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(detail) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };

    let body = ErrorBody { success: false, message: detail.message, error: Some(detail.detail) };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Json(body).into_response().into_body())
}

async fn track_http(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |matched| matched.as_str().to_string());
    let started = Instant::now();

    let response = next.run(request).await;
    metrics::record_http(method, path, response.status().as_u16(), started.elapsed());
    response
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static(REQUEST_ID),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID)])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        // Wildcard origin cannot be combined with allow_credentials
        base.allow_origin(AnyOrigin)
    } else {
        base.allow_credentials(true).allow_origin(AllowOrigin::list(origins))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use super::{app, router};
    use crate::core::config::{RateLimitSettings, Settings};
    use crate::core::rate_limit::RateLimiters;
    use crate::core::{metrics, state::AppState};
    use crate::db::types::Role;
    use crate::test_support::{self, ScriptedGateway};

    async fn limited_state(max_requests: u32, auth_max_requests: u32) -> AppState {
        let limiters = RateLimiters::from_settings(&RateLimitSettings {
            enabled: true,
            window: Duration::from_secs(900),
            max_requests,
            auth_max_requests,
        });
        let settings = test_support::test_settings().await;
        AppState::new(settings, Arc::new(ScriptedGateway::new()), limiters)
    }

    #[tokio::test]
    async fn root_reports_banner() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;

        let (status, body) = ctx.send(Method::GET, "/", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Exam portal API");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn health_reflects_database_reachability() {
        let up = test_support::test_app(ScriptedGateway::new()).await;
        let (status, body) = up.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "connected");
        assert!(body["timestamp"].is_string());

        let down = test_support::test_app(ScriptedGateway::new().unavailable()).await;
        let (status, body) = down.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["database"], "disconnected");
    }

    #[tokio::test]
    async fn unknown_route_echoes_path() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;

        let (status, body) = ctx.send(Method::GET, "/api/nope", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route not found");
        assert_eq!(body["path"], "/api/nope");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;

        let (status, body) = ctx.send(Method::GET, "/api/branches", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access denied. No token provided.");
        assert!(ctx.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;

        let response = ctx
            .app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn api_budget_is_enforced() {
        let app = router(limited_state(2, 5).await);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(test_support::json_request(Method::GET, "/", None, None))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(test_support::json_request(Method::GET, "/health", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = test_support::read_json(response).await;
        assert_eq!(body["message"], "Too many requests from this IP, please try again later.");
    }

    #[tokio::test]
    async fn auth_budget_only_covers_auth_routes() {
        let app = router(limited_state(100, 1).await);
        let login = || {
            test_support::json_request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "a@b.co"})),
            )
        };

        let first = app.clone().oneshot(login()).await.expect("response");
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = app.clone().oneshot(login()).await.expect("response");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = test_support::read_json(second).await;
        assert_eq!(body["message"], "Too many login attempts, please try again later.");

        let root = app
            .oneshot(test_support::json_request(Method::GET, "/", None, None))
            .await
            .expect("response");
        assert_eq!(root.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn successful_auth_requests_are_not_charged() {
        let gateway = ScriptedGateway::new()
            .rows("sp_select_instructor", vec![json!({"ins_id": 3, "ins_name": "Mona"})]);
        let limiters = RateLimiters::from_settings(&RateLimitSettings {
            enabled: true,
            window: Duration::from_secs(900),
            max_requests: 100,
            auth_max_requests: 2,
        });
        let settings = test_support::test_settings().await;
        let state = AppState::new(settings, Arc::new(gateway), limiters);
        let token = test_support::bearer_token(3, Role::Instructor, state.settings());
        let app = router(state);

        let profile = || test_support::json_request(Method::GET, "/api/auth/me", Some(&token), None);
        for _ in 0..7 {
            let response = app.clone().oneshot(profile()).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({"email": "a@b.co"})),
                ))
                .await
                .expect("response");
            statuses.push(response.status());
        }
        assert_eq!(
            statuses,
            [StatusCode::BAD_REQUEST, StatusCode::BAD_REQUEST, StatusCode::TOO_MANY_REQUESTS]
        );

        let locked_out = app.oneshot(profile()).await.expect("response");
        assert_eq!(locked_out.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn development_exposes_error_cause() {
        let settings = {
            let _guard = test_support::env_lock().await;
            test_support::set_test_env();
            std::env::set_var("APP_ENV", "development");
            let settings = Settings::load().expect("settings");
            std::env::set_var("APP_ENV", "test");
            settings
        };
        let token = test_support::bearer_token(1, Role::Instructor, &settings);
        let gateway =
            ScriptedGateway::new().raises("sp_select_courses", "division by zero", Some("22012"));
        let app = router(AppState::new(settings, Arc::new(gateway), RateLimiters::disabled()));

        let response = app
            .oneshot(test_support::json_request(Method::GET, "/api/courses", Some(&token), None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = test_support::read_json(response).await;
        assert_eq!(body["message"], "An error occurred while fetching courses");
        assert_eq!(body["error"], "sp_select_courses: division by zero");
    }

    #[tokio::test]
    async fn other_environments_hide_error_cause() {
        let gateway =
            ScriptedGateway::new().raises("sp_select_courses", "division by zero", Some("22012"));
        let ctx = test_support::test_app(gateway).await;
        let token = ctx.token(1, Role::Student);

        let (status, body) = ctx.send(Method::GET, "/api/courses", Some(&token), None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn trailing_slash_is_ignored() {
        let gateway = ScriptedGateway::new()
            .rows("sp_select_branches", vec![json!({"branch_id": 1, "branch_name": "Cairo"})]);
        let state = test_support::state_with(gateway).await;
        let token = test_support::bearer_token(1, Role::Student, state.settings());

        let response = app(state)
            .oneshot(test_support::json_request(Method::GET, "/api/branches/", Some(&token), None))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_route_follows_settings() {
        let ctx = test_support::test_app(ScriptedGateway::new()).await;
        let (status, _) = ctx.send(Method::GET, "/metrics", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let settings = {
            let _guard = test_support::env_lock().await;
            test_support::set_test_env();
            std::env::set_var("PROMETHEUS_ENABLED", "1");
            let settings = Settings::load().expect("settings");
            std::env::remove_var("PROMETHEUS_ENABLED");
            settings
        };
        metrics::init(&settings).expect("metrics init");
        let app = router(AppState::new(
            settings,
            Arc::new(ScriptedGateway::new()),
            RateLimiters::disabled(),
        ));

        let response = app
            .oneshot(test_support::json_request(Method::GET, "/metrics", None, None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
