//! 主应用程序入口
//!
//! 加载配置，连接 Postgres 并执行迁移，组装聊天核心后启动 Axum 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    ChatService, ChatServiceDependencies, ConnectionRegistry, LocalRoomBroadcaster, RoomSequencer,
    SystemClock,
};
use axum::http::HeaderValue;
use config::AppConfig;
use infrastructure::{create_pg_pool, PgStorage, MIGRATOR};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load().context("failed to load configuration")?;

    // RUST_LOG 优先，其次配置文件
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = ConnectionRegistry::new();
    let broadcaster = Arc::new(LocalRoomBroadcaster::new(registry.clone()));
    let sequencer = Arc::new(RoomSequencer::new());
    let clock = Arc::new(SystemClock);

    tracing::info!(database = %cfg.redacted_database_url(), "连接数据库");
    let pool = create_pg_pool(&cfg.database.url, cfg.database.max_connections)
        .await
        .context("failed to connect to postgres")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let storage = PgStorage::new(pool);
    let deps = ChatServiceDependencies {
        room_store: storage.room_store,
        message_log: storage.message_log,
        notifier: storage.notifier,
        broadcaster,
        sequencer,
        clock,
    };

    let chat_service = Arc::new(ChatService::new(deps));
    let jwt_service = Arc::new(JwtService::new(cfg.jwt.clone()));
    let state = AppState::new(chat_service, registry, jwt_service);

    let app = router(state).layer(cors_layer(&cfg.server.cors_origins)?);

    let address = cfg.server_addr();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    tracing::info!(%address, "聊天服务器已启动");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    tracing::info!("服务器已关闭");
    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let values = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("invalid cors origin: {origin}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(?error, "failed to listen for shutdown signal");
    }
    tracing::info!("收到关闭信号");
}
