use crate::state::AppState;
use crate::{api, logging, openapi};
use axum::http::HeaderValue;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "watchdesk API",
        description = "问题聚合与看板展示 REST API"
    ),
    tags(
        (name = "Problems", description = "问题列表查询接口"),
        (name = "Dashboard", description = "分组矩阵与概览接口")
    )
)]
struct ApiDoc;

/// 组装 HTTP 应用：业务路由、OpenAPI 文档、CORS 与请求日志中间件。
pub fn build_http_app(state: AppState) -> Router {
    let (problem_router, problem_spec) = api::problems::problem_routes().split_for_parts();
    let (dashboard_router, dashboard_spec) = api::dashboard::dashboard_routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(problem_spec);
    spec.merge(dashboard_spec);

    let cors = build_cors(&state.config.cors_allowed_origins);

    problem_router
        .merge(dashboard_router)
        .with_state(state)
        .merge(openapi::json_route(Arc::new(spec)))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
