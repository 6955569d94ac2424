use crate::models::*;
use crate::services::DrawSessionService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/draw-sessions",
    tag = "draw",
    request_body = CreateDrawSessionRequest,
    responses(
        (status = 201, description = "会话创建成功", body = DrawSessionCreatedResponse),
        (status = 400, description = "NO_TOKENS / NOT_ELIGIBLE"),
        (status = 404, description = "批次不存在"),
        (status = 409, description = "批次已有进行中的会话 (ALREADY_EXISTS)")
    )
)]
/// 为批次剩余奖券创建轮盘会话，组成快照在创建时确定
pub async fn create_session(
    service: web::Data<DrawSessionService>,
    body: web::Json<CreateDrawSessionRequest>,
) -> Result<HttpResponse> {
    match service.create_session(body.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": session }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/draw-sessions/{id}",
    tag = "draw",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话详情与抽取记录", body = DrawSessionResponse),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn get_session(
    service: web::Data<DrawSessionService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.get_session(&path.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": session }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/draw-sessions/{id}/spin",
    tag = "draw",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "抽取成功，奖券已揭晓", body = SpinResponse),
        (status = 404, description = "会话不存在"),
        (status = 409, description = "会话已结束 (FINISHED)")
    )
)]
/// 抽取一次:
/// 1. 按剩余数量加权选择候选奖券
/// 2. 条件更新抢占奖券并揭晓
/// 3. 原子递增会话计数得到 order，最后一次抽取同时结束会话
pub async fn spin(
    service: web::Data<DrawSessionService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match service.spin(&path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn draw_session_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/draw-sessions")
            .route("", web::post().to(create_session))
            .route("/{id}", web::get().to(get_session))
            .route("/{id}/spin", web::post().to(spin)),
    );
}
