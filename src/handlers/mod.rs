pub mod batch;
pub mod draw_session;
pub mod prize;
pub mod token;

pub use batch::batch_config;
pub use draw_session::draw_session_config;
pub use prize::prize_config;
pub use token::token_config;

use actix_web::web;

/// 管理端路由，鉴权中间件要求 admin 角色
pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .configure(prize_config)
            .configure(batch_config),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssuanceConfig;
    use crate::database::create_test_pool;
    use crate::middlewares::AuthMiddleware;
    use crate::services::*;
    use crate::utils::{FlagSource, JwtService, Role, StaticFlags};
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_issue_draw_and_deliver_over_http() {
        let pool = create_test_pool().await;
        let jwt = JwtService::new("http-test");
        let flags: Arc<dyn FlagSource> = Arc::new(StaticFlags {
            two_phase_enabled: true,
            self_deliver_enabled: false,
        });
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .app_data(web::Data::new(PrizeService::new(pool.clone())))
                .app_data(web::Data::new(IssuanceService::new(
                    pool.clone(),
                    SigningService::new("sign", 1),
                    IssuanceConfig::default(),
                )))
                .app_data(web::Data::new(RedemptionService::new(pool.clone(), flags)))
                .app_data(web::Data::new(DrawSessionService::new(pool.clone())))
                .app_data(web::Data::new(StatsService::new(pool.clone())))
                .service(
                    web::scope("/api/v1")
                        .configure(admin_config)
                        .configure(draw_session_config)
                        .configure(token_config),
                ),
        )
        .await;

        let admin = format!(
            "Bearer {}",
            jwt.generate_access_token("admin-1", Role::Admin, 300).unwrap()
        );
        let staff = format!(
            "Bearer {}",
            jwt.generate_access_token("staff-1", Role::Staff, 300).unwrap()
        );

        let mut prize_ids = Vec::new();
        for (key, stock) in [("coffee", 2), ("cake", 1)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/admin/prizes")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({ "key": key, "label": key, "stock": stock }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            let body: Value = test::read_body_json(resp).await;
            prize_ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/admin/batches/issue")
            .insert_header(("Authorization", admin.clone()))
            .set_json(json!({
                "prizes": [{ "prize_id": prize_ids[0] }, { "prize_id": prize_ids[1] }]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["total_issued"], 3);
        let batch_id = body["data"]["batch_id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/api/v1/draw-sessions")
            .set_json(json!({ "batch_id": batch_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["mode"], "BY_PRIZE");
        assert_eq!(body["data"]["max_spins"], 3);
        let session_id = body["data"]["session_id"].as_str().unwrap().to_string();

        let mut first_token = String::new();
        for order in 1..=3 {
            let req = test::TestRequest::post()
                .uri(&format!("/api/v1/draw-sessions/{session_id}/spin"))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["data"]["order"], order);
            assert_eq!(body["data"]["phase"], "REVEALED");
            if order == 1 {
                first_token = body["data"]["token_id"].as_str().unwrap().to_string();
            }
        }

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/draw-sessions/{session_id}/spin"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "FINISHED");

        // 匿名调用方不能确认交付
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/tokens/{first_token}/deliver"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/tokens/{first_token}/deliver"))
            .insert_header(("Authorization", staff.clone()))
            .set_json(json!({ "delivery_note": "handed over" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["phase"], "DELIVERED");
        assert_eq!(body["data"]["auto_redeemed"], false);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/tokens/{first_token}/deliver"))
            .insert_header(("Authorization", staff.clone()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "ALREADY_DELIVERED");

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/admin/batches/{batch_id}/stats"))
            .insert_header(("Authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["counts"]["total"], 3);
        assert_eq!(body["data"]["counts"]["revealed"], 3);
        assert_eq!(body["data"]["counts"]["delivered"], 1);
        assert_eq!(body["data"]["counts"]["revealed_pending"], 2);

        // 管理端接口拒绝 staff
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/admin/batches/{batch_id}"))
            .insert_header(("Authorization", staff))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::FORBIDDEN);
    }
}
