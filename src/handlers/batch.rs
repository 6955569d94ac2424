use crate::models::*;
use crate::services::{IssuanceService, StatsService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/batches/issue",
    tag = "batch",
    request_body = IssueTokensRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "发放成功", body = IssueTokensResponse),
        (status = 400, description = "NO_ACTIVE_PRIZES / LIMIT_EXCEEDED / INSUFFICIENT_STOCK"),
        (status = 404, description = "批次或奖品不存在")
    )
)]
/// 发放奖券（新建批次或追加到已有批次），全部成功或全部失败
pub async fn issue_tokens(
    service: web::Data<IssuanceService>,
    body: web::Json<IssueTokensRequest>,
) -> Result<HttpResponse> {
    match service.issue_tokens(body.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/batches/{id}",
    tag = "batch",
    params(
        ("id" = String, Path, description = "批次 ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取批次成功", body = BatchResponse),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn get_batch(
    service: web::Data<IssuanceService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.get_batch(&path.into_inner()).await {
        Ok(batch) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": batch }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/batches/{id}/tokens",
    tag = "batch",
    params(
        ("id" = String, Path, description = "批次 ID"),
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取奖券列表成功", body = TokenPage),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn list_batch_tokens(
    service: web::Data<IssuanceService>,
    path: web::Path<String>,
    query: web::Query<BatchTokenQuery>,
) -> Result<HttpResponse> {
    match service
        .list_batch_tokens(&path.into_inner(), &query.into_inner())
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/batches/{id}/stats",
    tag = "batch",
    params(
        ("id" = String, Path, description = "批次 ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "统计结果（每次实时计算）", body = BatchStatsSummary),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn get_batch_stats(
    service: web::Data<StatsService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.batch_stats(&path.into_inner()).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": stats }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn batch_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/batches")
            .route("/issue", web::post().to(issue_tokens))
            .route("/{id}", web::get().to(get_batch))
            .route("/{id}/tokens", web::get().to(list_batch_tokens))
            .route("/{id}/stats", web::get().to(get_batch_stats)),
    );
}
