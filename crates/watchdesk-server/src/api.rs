pub mod dashboard;
pub mod problems;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use watchdesk_common::types::{ProblemTag, Severity};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码（HTTP 状态码）
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
    /// 业务数据（有数据时返回）
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn error_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: i32::from(status.as_u16()),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

// ---- Query parameter parsing helpers ----

/// Splits a comma-separated id list; `None` for an absent parameter.
pub(crate) fn parse_id_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Parses a comma-separated severity list. Unknown names are rejected so a
/// typo doesn't silently widen the filter.
pub(crate) fn parse_severities(raw: Option<&str>) -> Result<Option<Vec<Severity>>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let mut severities = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        severities.push(part.parse::<Severity>()?);
    }
    Ok(Some(severities))
}

/// Parses a comma-separated tag filter, `key:value` or bare `key` pairs.
pub(crate) fn parse_tags(raw: Option<&str>) -> Vec<ProblemTag> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(':') {
            Some((tag, value)) => ProblemTag::new(tag.trim(), value.trim()),
            None => ProblemTag::new(part, ""),
        })
        .collect()
}
