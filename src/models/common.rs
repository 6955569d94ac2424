use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 失败响应 `{"success": false, "error": ApiError}` 中的错误信息
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// 仅 NOT_ELIGIBLE 时返回具体原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
