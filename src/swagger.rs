use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::entities::{DrawMode, DrawStatus, TokenKind};
use crate::models::*;
use crate::services::InvalidReason;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::prize::create_prize,
        handlers::prize::list_prizes,
        handlers::prize::set_prize_active,
        handlers::batch::issue_tokens,
        handlers::batch::get_batch,
        handlers::batch::list_batch_tokens,
        handlers::batch::get_batch_stats,
        handlers::draw_session::create_session,
        handlers::draw_session::get_session,
        handlers::draw_session::spin,
        handlers::token::reveal,
        handlers::token::deliver,
        handlers::token::redeem,
        handlers::token::verify,
    ),
    components(
        schemas(
            CreatePrizeRequest,
            SetPrizeActiveRequest,
            PrizeResponse,
            IssuePrizeRequest,
            IssueTokensRequest,
            IssuedToken,
            IssuedPrizeSummary,
            IssueTokensResponse,
            BatchResponse,
            TokenResponse,
            TokenPage,
            TokenKind,
            CreateDrawSessionRequest,
            DrawMode,
            DrawStatus,
            DrawElement,
            DrawSessionCreatedResponse,
            SpinResponse,
            SpinRecord,
            DrawSessionResponse,
            TokenPhase,
            RevealResponse,
            DeliverRequest,
            DeliveryTimings,
            DeliveryTimestamps,
            DeliverResponse,
            RedeemResponse,
            VerifyTokenRequest,
            VerifyTokenResponse,
            InvalidReason,
            StatsCounts,
            LeadTimeStats,
            PrizeStats,
            BatchStatsSummary,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "prize", description = "Prize catalogue API"),
        (name = "batch", description = "Token issuance and batch API"),
        (name = "draw", description = "Roulette draw session API"),
        (name = "token", description = "Token reveal / deliver / redeem API"),
    ),
    info(
        title = "Prize Token Backend API",
        version = "0.1.0",
        description = "Signed prize tokens, roulette draws and two-phase redemption"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
