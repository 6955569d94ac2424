use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use prize_token_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::{EnvFlagSource, FlagSource, JwtService},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 校验外部认证服务签发的访问令牌
    let jwt_service = JwtService::new(&config.jwt.secret);

    // 两阶段兑换 / 自助交付开关，每次请求读取
    let flags: Arc<dyn FlagSource> = Arc::new(EnvFlagSource::new(config.redemption.clone()));

    // 创建服务
    let signing_service = config.signing.legacy_keys.iter().fold(
        SigningService::new(&config.signing.secret, config.signing.version),
        |svc, key| svc.with_legacy_key(key.version, &key.secret),
    );
    let prize_service = PrizeService::new(pool.clone());
    let issuance_service =
        IssuanceService::new(pool.clone(), signing_service, config.issuance.clone());
    let redemption_service = RedemptionService::new(pool.clone(), flags);
    let draw_session_service = DrawSessionService::new(pool.clone());
    let stats_service = StatsService::new(pool.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(prize_service.clone()))
            .app_data(web::Data::new(issuance_service.clone()))
            .app_data(web::Data::new(redemption_service.clone()))
            .app_data(web::Data::new(draw_session_service.clone()))
            .app_data(web::Data::new(stats_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::admin_config)
                    .configure(handlers::draw_session_config)
                    .configure(handlers::token_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
