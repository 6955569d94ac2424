use crate::error::AppError;
use crate::utils::{Actor, JwtService, Role};
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

// 路径访问规则
struct PathRules {
    // 文档等完全不经过鉴权的路径
    public_prefixes: Vec<&'static str>,
    // 必须携带管理员令牌的路径
    admin_prefixes: Vec<&'static str>,
}

impl PathRules {
    fn new() -> Self {
        Self {
            public_prefixes: vec!["/swagger-ui", "/api-docs/"],
            admin_prefixes: vec!["/api/v1/admin/"],
        }
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_prefixes
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }

    fn requires_admin(&self, path: &str) -> bool {
        self.admin_prefixes
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

/// Bearer 令牌鉴权
/// - 携带令牌：校验失败一律 401；成功则将 Actor 写入请求扩展
/// - 未携带令牌：管理端路径 401，其余路径放行，由处理函数决定（如交付需要 staff）
pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            rules: PathRules::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    rules: PathRules,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        let path = req.path().to_string();
        if self.rules.is_public(&path) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|value| value.trim().to_string());

        let actor = match token {
            Some(token) => match self.jwt_service.verify_access_token(&token) {
                Ok(claims) => Some(Actor::from(claims)),
                Err(_) => {
                    let error = AppError::AuthError("Invalid access token".to_string());
                    return Box::pin(async move { Err(error.into()) });
                }
            },
            None => None,
        };

        if self.rules.requires_admin(&path) {
            match &actor {
                None => {
                    let error = AppError::AuthError("Missing access token".to_string());
                    return Box::pin(async move { Err(error.into()) });
                }
                Some(a) if a.role != Role::Admin => {
                    log::warn!("User {} ({:?}) denied access to {path}", a.user_id, a.role);
                    return Box::pin(async move { Err(AppError::Forbidden.into()) });
                }
                Some(_) => {}
            }
        }

        if let Some(actor) = actor {
            req.extensions_mut().insert(actor);
        }
        Box::pin(self.service.call(req))
    }
}

/// 从请求扩展中获取当前调用方（匿名时为 None）
pub fn current_actor(req: &HttpRequest) -> Option<Actor> {
    req.extensions().get::<Actor>().cloned()
}
