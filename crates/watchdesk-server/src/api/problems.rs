use crate::api::{error_response, parse_id_list, parse_severities, parse_tags, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use watchdesk_common::types::ProblemTag;
use watchdesk_problem::enrich::EnrichedProblem;
use watchdesk_problem::filter::{AckFilter, ProblemFilter};

/// 问题列表查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProblemsParams {
    /// 主机分组 ID 列表（逗号分隔）
    #[param(required = false)]
    groupids: Option<String>,
    /// 排除的主机分组 ID 列表（逗号分隔）
    #[param(required = false)]
    exclude_groupids: Option<String>,
    /// 主机 ID 列表（逗号分隔）
    #[param(required = false)]
    hostids: Option<String>,
    /// 问题名称模糊匹配
    #[param(required = false, rename = "name__contains")]
    #[serde(rename = "name__contains")]
    name_contains: Option<String>,
    /// 严重级别列表（逗号分隔，如 high,disaster）
    #[param(required = false)]
    severities: Option<String>,
    /// 确认状态过滤（all / unack / with_unack，默认 all）
    #[param(required = false)]
    ack: Option<String>,
    /// 是否包含维护中的主机
    #[param(required = false)]
    show_maintenance: Option<bool>,
    /// 标签过滤（逗号分隔的 key:value 或 key）
    #[param(required = false)]
    tags: Option<String>,
    /// 优先展示的标签 key 列表（逗号分隔）
    #[param(required = false)]
    priority_tags: Option<String>,
}

/// 问题标签
#[derive(Serialize, ToSchema)]
pub struct TagItem {
    /// 标签名
    pub tag: String,
    /// 标签值（可为空）
    pub value: String,
}

impl From<ProblemTag> for TagItem {
    fn from(t: ProblemTag) -> Self {
        Self {
            tag: t.tag,
            value: t.value,
        }
    }
}

/// 问题行
#[derive(Serialize, ToSchema)]
pub struct ProblemItem {
    /// 问题唯一标识
    pub id: String,
    /// 触发器 ID
    pub trigger_id: String,
    /// 问题名称
    pub name: String,
    /// 严重级别
    pub severity: String,
    /// 展示状态（problem / closing / resolved）
    pub status: String,
    /// 问题开始时间
    pub clock: DateTime<Utc>,
    /// 展示时间（已恢复取恢复时间，关闭中取当前时间）
    pub effective_clock: DateTime<Utc>,
    /// 是否已确认
    pub acknowledged: bool,
    /// 展示标签（已排序、截断）
    pub tags: Vec<TagItem>,
    /// 是否还有未展示的标签
    pub tags_overflow: bool,
    /// 最近一次更新的操作人（不可见用户显示占位符）
    pub last_actor: Option<String>,
    /// 更新动作位集合（历史并集）
    pub action_flags: u32,
    /// 是否存在待处理的关闭请求
    pub in_closing: bool,
}

impl From<EnrichedProblem> for ProblemItem {
    fn from(e: EnrichedProblem) -> Self {
        let (last_actor, action_flags, in_closing) = match &e.actions {
            Some(a) => (Some(a.last_actor.clone()), a.flags.bits(), a.in_closing),
            None => (None, 0, false),
        };
        Self {
            id: e.problem.id,
            trigger_id: e.problem.trigger_id,
            name: e.problem.name,
            severity: e.problem.severity.to_string(),
            status: e.status.to_string(),
            clock: e.problem.clock,
            effective_clock: e.effective_clock,
            acknowledged: e.problem.acknowledged,
            tags: e.tags.tags.into_iter().map(TagItem::from).collect(),
            tags_overflow: e.tags.overflow,
            last_actor,
            action_flags,
            in_closing,
        }
    }
}

/// 问题列表响应
#[derive(Serialize, ToSchema)]
pub struct ProblemListData {
    /// 问题列表（按 ID 倒序，最新在前）
    pub items: Vec<ProblemItem>,
    /// 是否因行数上限被截断
    pub truncated: bool,
}

pub(crate) fn build_filter(params: &ListProblemsParams) -> Result<ProblemFilter, String> {
    let ack = match params.ack.as_deref() {
        None | Some("all") => AckFilter::All,
        Some("unack") => AckFilter::Unacknowledged,
        Some("with_unack") => AckFilter::WithUnacknowledged,
        Some(other) => return Err(format!("unknown ack mode: {other}")),
    };
    Ok(ProblemFilter {
        group_ids: parse_id_list(params.groupids.as_deref()),
        exclude_group_ids: parse_id_list(params.exclude_groupids.as_deref()),
        host_ids: parse_id_list(params.hostids.as_deref()),
        name: params.name_contains.clone(),
        severities: parse_severities(params.severities.as_deref())?,
        show_maintenance: params.show_maintenance.unwrap_or(false),
        ack,
        tags: parse_tags(params.tags.as_deref()),
        priority_tags: parse_id_list(params.priority_tags.as_deref()).unwrap_or_default(),
    })
}

/// 查询当前问题列表（已按过滤器解析、富化）。
#[utoipa::path(
    get,
    path = "/v1/problems",
    tag = "Problems",
    params(ListProblemsParams),
    responses(
        (status = 200, description = "问题列表", body = ProblemListData),
        (status = 400, description = "参数错误", body = crate::api::ApiError)
    )
)]
async fn list_problems(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListProblemsParams>,
) -> impl IntoResponse {
    let filter = match build_filter(&params) {
        Ok(filter) => filter,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, &msg),
    };

    match watchdesk_problem::list_problems(
        state.store.as_ref(),
        state.store.as_ref(),
        &state.engine,
        &filter,
        Utc::now(),
    ) {
        Ok((problems, truncated)) => success_response(
            StatusCode::OK,
            &trace_id,
            ProblemListData {
                items: problems.into_iter().map(ProblemItem::from).collect(),
                truncated,
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list problems");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "Database error")
        }
    }
}

pub fn problem_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_problems))
}
