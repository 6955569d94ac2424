use crate::middlewares::current_actor;
use crate::models::*;
use crate::services::{IssuanceService, RedemptionService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/tokens/{id}/reveal",
    tag = "token",
    params(
        ("id" = String, Path, description = "奖券 ID")
    ),
    responses(
        (status = 200, description = "揭晓成功", body = RevealResponse),
        (status = 400, description = "两阶段兑换未开启 (TWO_PHASE_DISABLED)"),
        (status = 404, description = "奖券不存在"),
        (status = 409, description = "ALREADY_REVEALED / TOKEN_EXPIRED / TOKEN_DISABLED / DRAW_IN_PROGRESS")
    )
)]
/// 直接揭晓不经过轮盘的奖券
pub async fn reveal(
    service: web::Data<RedemptionService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.reveal(&path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/tokens/{id}/deliver",
    tag = "token",
    params(
        ("id" = String, Path, description = "奖券 ID")
    ),
    request_body(content = DeliverRequest, description = "可选的交付备注"),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "交付成功", body = DeliverResponse),
        (status = 401, description = "未认证（未开启自助交付时）"),
        (status = 403, description = "无交付权限"),
        (status = 409, description = "NOT_REVEALED / ALREADY_DELIVERED")
    )
)]
/// 确认交付；静态批次同时自动完成兑换
pub async fn deliver(
    service: web::Data<RedemptionService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<DeliverRequest>>,
) -> Result<HttpResponse> {
    let actor = current_actor(&req);
    let body = body.map(|b| b.into_inner()).unwrap_or_default();
    match service.deliver(&path.into_inner(), actor.as_ref(), body).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/tokens/{id}/redeem",
    tag = "token",
    params(
        ("id" = String, Path, description = "奖券 ID")
    ),
    responses(
        (status = 200, description = "兑换成功", body = RedeemResponse),
        (status = 409, description = "TOKEN_EXHAUSTED / TOKEN_EXPIRED / TOKEN_NOT_ACTIVE / TWO_PHASE_REQUIRED")
    )
)]
/// 旧版单阶段兑换（可复用券、静态批次，或两阶段关闭时）
pub async fn redeem(
    service: web::Data<RedemptionService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.redeem(&path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/tokens/{id}/verify",
    tag = "token",
    params(
        ("id" = String, Path, description = "奖券 ID")
    ),
    request_body = VerifyTokenRequest,
    responses(
        (status = 200, description = "验签结果", body = VerifyTokenResponse),
        (status = 404, description = "奖券不存在")
    )
)]
pub async fn verify(
    service: web::Data<IssuanceService>,
    path: web::Path<String>,
    body: web::Json<VerifyTokenRequest>,
) -> Result<HttpResponse> {
    match service.verify_token(&path.into_inner(), &body.signature).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn token_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tokens")
            .route("/{id}/reveal", web::post().to(reveal))
            .route("/{id}/deliver", web::post().to(deliver))
            .route("/{id}/redeem", web::post().to(redeem))
            .route("/{id}/verify", web::post().to(verify)),
    );
}
