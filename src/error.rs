use crate::models::ApiError;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// 稳定的业务错误码（客户端据此决定重试或终止）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 400
    NoActivePrizes,
    LimitExceeded,
    InsufficientStock,
    NoTokens,
    TwoPhaseDisabled,
    MalformedPayload,
    // 404
    BatchNotFound,
    PrizeNotFound,
    TokenNotFound,
    SessionNotFound,
    // 409
    AlreadyExists,
    Finished,
    NotRevealed,
    AlreadyRevealed,
    AlreadyDelivered,
    TokenExpired,
    TokenNotActive,
    TokenDisabled,
    TokenExhausted,
    TwoPhaseRequired,
    DrawInProgress,
    DuplicatePrizeKey,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoActivePrizes => "NO_ACTIVE_PRIZES",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::InsufficientStock => "INSUFFICIENT_STOCK",
            ErrorCode::NoTokens => "NO_TOKENS",
            ErrorCode::TwoPhaseDisabled => "TWO_PHASE_DISABLED",
            ErrorCode::MalformedPayload => "MALFORMED_PAYLOAD",
            ErrorCode::BatchNotFound => "BATCH_NOT_FOUND",
            ErrorCode::PrizeNotFound => "PRIZE_NOT_FOUND",
            ErrorCode::TokenNotFound => "TOKEN_NOT_FOUND",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::Finished => "FINISHED",
            ErrorCode::NotRevealed => "NOT_REVEALED",
            ErrorCode::AlreadyRevealed => "ALREADY_REVEALED",
            ErrorCode::AlreadyDelivered => "ALREADY_DELIVERED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenNotActive => "TOKEN_NOT_ACTIVE",
            ErrorCode::TokenDisabled => "TOKEN_DISABLED",
            ErrorCode::TokenExhausted => "TOKEN_EXHAUSTED",
            ErrorCode::TwoPhaseRequired => "TWO_PHASE_REQUIRED",
            ErrorCode::DrawInProgress => "DRAW_IN_PROGRESS",
            ErrorCode::DuplicatePrizeKey => "DUPLICATE_PRIZE_KEY",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抽奖会话无法创建的具体原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    TooFewPrizes,
    TooManyPrizes,
    TooFewTokens,
    TooManyTokens,
}

impl IneligibleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IneligibleReason::TooFewPrizes => "TOO_FEW_PRIZES",
            IneligibleReason::TooManyPrizes => "TOO_MANY_PRIZES",
            IneligibleReason::TooFewTokens => "TOO_FEW_TOKENS",
            IneligibleReason::TooManyTokens => "TOO_MANY_TOKENS",
        }
    }
}

impl std::fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}: {1}")]
    BadRequest(ErrorCode, String),

    #[error("Not eligible for a draw session: {0}")]
    NotEligible(IneligibleReason),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}: {1}")]
    NotFound(ErrorCode, String),

    #[error("Conflict: {0}: {1}")]
    Conflict(ErrorCode, String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    pub fn bad_request(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::BadRequest(code, msg.into())
    }

    pub fn not_found(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::NotFound(code, msg.into())
    }

    pub fn conflict(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::Conflict(code, msg.into())
    }

    /// 业务错误码（用于测试断言与响应体）
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::BadRequest(code, _)
            | AppError::NotFound(code, _)
            | AppError::Conflict(code, _) => code.as_str(),
            AppError::NotEligible(_) => "NOT_ELIGIBLE",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden => "FORBIDDEN",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(..) | AppError::NotEligible(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg) | AppError::BadRequest(_, msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::NotEligible(reason) => {
                log::warn!("Draw session not eligible: {reason}");
                self.to_string()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::JwtError(err) => {
                log::warn!("Invalid bearer token: {err}");
                "Invalid access token".to_string()
            }
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                "Forbidden".to_string()
            }
            AppError::NotFound(_, msg) => msg.clone(),
            AppError::Conflict(code, msg) => {
                log::warn!("State conflict {code}: {msg}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        let error = ApiError {
            code: self.code().to_string(),
            message,
            reason: match self {
                AppError::NotEligible(reason) => Some(reason.as_str().to_string()),
                _ => None,
            },
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": error
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::conflict(ErrorCode::AlreadyDelivered, "x").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::not_found(ErrorCode::BatchNotFound, "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::NotEligible(IneligibleReason::TooManyPrizes).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AuthError("missing".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::InternalError("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            AppError::conflict(ErrorCode::Finished, "done").code(),
            "FINISHED"
        );
        assert_eq!(
            AppError::NotEligible(IneligibleReason::TooFewTokens).code(),
            "NOT_ELIGIBLE"
        );
        assert_eq!(
            AppError::DatabaseError(DbErr::Custom("x".into())).code(),
            "DATABASE_ERROR"
        );
    }

    #[actix_web::test]
    async fn test_internal_error_body_is_generic() {
        let resp = AppError::InternalError("secret detail".into()).error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("INTERNAL_ERROR"));
        assert!(!text.contains("secret detail"));
    }

    #[actix_web::test]
    async fn test_not_eligible_body_carries_reason() {
        let resp = AppError::NotEligible(IneligibleReason::TooManyTokens).error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "NOT_ELIGIBLE");
        assert_eq!(value["error"]["reason"], "TOO_MANY_TOKENS");
    }
}
