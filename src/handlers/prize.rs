use crate::models::*;
use crate::services::PrizeService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/prizes",
    tag = "prize",
    request_body = CreatePrizeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "奖品创建成功", body = PrizeResponse),
        (status = 400, description = "参数错误"),
        (status = 409, description = "奖品 key 已存在 (DUPLICATE_PRIZE_KEY)")
    )
)]
pub async fn create_prize(
    service: web::Data<PrizeService>,
    body: web::Json<CreatePrizeRequest>,
) -> Result<HttpResponse> {
    match service.create_prize(body.into_inner()).await {
        Ok(prize) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/prizes",
    tag = "prize",
    params(
        ("active_only" = Option<bool>, Query, description = "仅返回启用的奖品")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取奖品列表成功", body = [PrizeResponse])
    )
)]
pub async fn list_prizes(
    service: web::Data<PrizeService>,
    query: web::Query<PrizeQuery>,
) -> Result<HttpResponse> {
    match service.list_prizes(&query.into_inner()).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/prizes/{id}/active",
    tag = "prize",
    params(
        ("id" = String, Path, description = "奖品 ID")
    ),
    request_body = SetPrizeActiveRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = PrizeResponse),
        (status = 404, description = "奖品不存在")
    )
)]
/// 启用 / 停用奖品；停用的奖品不再参与发放
pub async fn set_prize_active(
    service: web::Data<PrizeService>,
    path: web::Path<String>,
    body: web::Json<SetPrizeActiveRequest>,
) -> Result<HttpResponse> {
    match service.set_active(&path.into_inner(), body.active).await {
        Ok(prize) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": prize }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn prize_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/prizes")
            .route("", web::post().to(create_prize))
            .route("", web::get().to(list_prizes))
            .route("/{id}/active", web::put().to(set_prize_active)),
    );
}
