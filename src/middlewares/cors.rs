use actix_cors::Cors;
use actix_web::http::header;

/// 兑换终端与管理后台都从浏览器调用，仅使用 Bearer 令牌，不携带 Cookie
pub fn create_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}
