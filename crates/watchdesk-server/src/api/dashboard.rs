use crate::api::problems::{build_filter, ListProblemsParams, ProblemItem};
use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_common::types::Severity;
use watchdesk_storage::{ProblemQuery, ProblemStore};

/// 单个分组在某一严重级别下的统计
#[derive(Serialize, ToSchema)]
pub struct SeverityCell {
    /// 严重级别
    pub severity: String,
    /// 匹配问题总数（精确值，不受采样上限影响）
    pub count: u64,
    /// 其中未确认的数量
    pub count_unack: u64,
    /// 采样的问题 ID 列表（受采样上限约束，用于悬浮提示）
    pub problems: Vec<String>,
    /// 采样的未确认问题 ID 列表
    pub problems_unack: Vec<String>,
}

/// 分组行：一个主机分组的严重级别矩阵
#[derive(Serialize, ToSchema)]
pub struct GroupRow {
    /// 分组 ID
    pub id: String,
    /// 分组名称
    pub name: String,
    /// 按严重级别（从低到高）的统计单元
    pub severities: Vec<SeverityCell>,
    /// 各级别问题总数
    pub total: u64,
}

/// 分组矩阵响应
#[derive(Serialize, ToSchema)]
pub struct GroupMatrixData {
    /// 分组行，按名称排序
    pub groups: Vec<GroupRow>,
    /// 采样可见问题的富化结果（每个问题只出现一次）
    pub problems: Vec<ProblemItem>,
    /// 是否因行数上限被截断
    pub truncated: bool,
}

/// 获取按主机分组聚合的问题矩阵。
#[utoipa::path(
    get,
    path = "/v1/dashboard/groups",
    tag = "Dashboard",
    params(ListProblemsParams),
    responses(
        (status = 200, description = "分组问题矩阵", body = GroupMatrixData),
        (status = 400, description = "参数错误", body = crate::api::ApiError)
    )
)]
async fn dashboard_groups(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListProblemsParams>,
) -> impl IntoResponse {
    let filter = match build_filter(&params) {
        Ok(filter) => filter,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };

    match watchdesk_problem::build_dashboard(
        state.store.as_ref(),
        state.store.as_ref(),
        &state.engine,
        &filter,
        Utc::now(),
    ) {
        Ok(dashboard) => {
            let groups = dashboard
                .groups
                .into_iter()
                .map(|g| {
                    let total = g.total();
                    GroupRow {
                        id: g.group.id,
                        name: g.group.name,
                        severities: g
                            .by_severity
                            .into_iter()
                            .zip(Severity::ALL)
                            .map(|(bucket, severity)| SeverityCell {
                                severity: severity.to_string(),
                                count: bucket.count,
                                count_unack: bucket.count_unack,
                                problems: bucket.problems,
                                problems_unack: bucket.problems_unack,
                            })
                            .collect(),
                        total,
                    }
                })
                .collect();
            success_response(
                StatusCode::OK,
                &trace_id,
                GroupMatrixData {
                    groups,
                    problems: dashboard
                        .problems
                        .into_iter()
                        .map(ProblemItem::from)
                        .collect(),
                    truncated: dashboard.truncated,
                },
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build dashboard");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "Database error")
        }
    }
}

/// 仪表盘概览数据
#[derive(Serialize, ToSchema)]
struct DashboardOverview {
    /// 当前问题总数
    total_problems: u64,
    /// 未确认问题总数
    unacknowledged: u64,
    /// 问题按严重级别统计
    by_severity: HashMap<String, u64>,
    /// 服务运行时长（秒）
    uptime_secs: i64,
}

/// 获取仪表盘概览数据。
#[utoipa::path(
    get,
    path = "/v1/dashboard/overview",
    tag = "Dashboard",
    responses(
        (status = 200, description = "仪表盘概览", body = DashboardOverview)
    )
)]
async fn dashboard_overview(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let store: &dyn ProblemStore = state.store.as_ref();

    // Counts come from the store, not from group aggregation: a problem in
    // several groups would double-count in the matrix totals.
    let mut by_severity = HashMap::new();
    let mut total = 0u64;
    for severity in Severity::ALL {
        let count = store
            .count_problems(&ProblemQuery {
                severities: vec![severity],
                ..Default::default()
            })
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, %severity, "Failed to count problems for overview");
                0
            });
        total += count;
        by_severity.insert(severity.to_string(), count);
    }

    let unacknowledged = store
        .count_problems(&ProblemQuery {
            unacknowledged_only: true,
            ..Default::default()
        })
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to count unacknowledged problems");
            0
        });

    let uptime_secs = (Utc::now() - state.start_time).num_seconds();

    success_response(
        StatusCode::OK,
        &trace_id,
        DashboardOverview {
            total_problems: total,
            unacknowledged,
            by_severity,
            uptime_secs,
        },
    )
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(dashboard_groups))
        .routes(routes!(dashboard_overview))
}
