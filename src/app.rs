use crate::{
    auth_middleware::require_bearer,
    models::AppState,
    routes::{health, notify},
};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info_span};

pub fn build_app(state: AppState) -> Router {
    // Never records headers, so the bearer token stays out of the logs.
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let client_ip = req
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map_or_else(|| "-".into(), |ci| ci.0.to_string());
            let rid = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");

            info_span!("http", method = %req.method(), uri = %req.uri(), client_ip = %client_ip, request_id = %rid)
        })
        .on_request(|_req: &Request<Body>, _span: &Span| {
            tracing::debug!("request started");
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &Span| {
            tracing::info!(status = %res.status(), latency_ms = %latency.as_millis(), "response completed");
        })
        .on_failure(|_class: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
            tracing::error!(latency_ms = %latency.as_millis(), "request failed");
        });

    // Request-ID middleware comes first so everything downstream
    // has access to the x-request-id header.
    let request_id_layer = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id());

    // Only POST is authenticated; GET / stays open for health checks.
    let relay = post(notify::send).route_layer(from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(health::get).merge(relay))
        .with_state(state)
        .layer(trace)
        .layer(request_id_layer)
}
