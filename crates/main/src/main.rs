//! 主应用程序入口
//!
//! 加载配置，组装协调器与内存消息存储，启动 Axum Web 服务。

use std::{net::SocketAddr, sync::Arc};

use application::{
    ChatCoordinator, ChatCoordinatorDependencies, CoordinatorSettings, HtmlSanitizer, SystemClock,
};
use config::AppConfig;
use infrastructure::MemoryMessageStore;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        bind = %config.bind_address(),
        history_capacity = config.history.capacity,
        max_connections_per_origin = config.limits.max_connections_per_origin,
        ban_duration_seconds = config.limits.ban_duration_seconds,
        "配置加载完成"
    );

    let message_store = Arc::new(MemoryMessageStore::new(config.history.capacity));
    let coordinator = ChatCoordinator::new(
        CoordinatorSettings::from(&config),
        ChatCoordinatorDependencies {
            message_store,
            sanitizer: Arc::new(HtmlSanitizer),
            clock: Arc::new(SystemClock),
        },
    );
    let state = AppState::new(Arc::new(coordinator), config.server.trust_forwarded_for);

    // 启动 Web 服务器
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;

    tracing::info!("聊天服务器启动在 http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务器已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听 Ctrl-C 信号");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到 Ctrl-C，开始优雅关闭");
}
