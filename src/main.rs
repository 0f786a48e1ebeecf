use axum::{
    routing::{get, post},
    Router,
};
use po_recon_rust::{api, AppConfig, ArtifactFetcher, BipClient, ReportPipeline};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!(
        "Starting server: endpoint={}, report_path={}, poll={}s/timeout={}s",
        config.bip.endpoint,
        config.bip.report_path,
        config.bip.poll_interval_secs,
        config.bip.poll_timeout_secs
    );

    // 远程报表服务客户端 + 管线
    let client = BipClient::new(&config.bip);
    let fetcher = ArtifactFetcher::new(
        client,
        Duration::from_secs(config.bip.poll_interval_secs),
        Duration::from_secs(config.bip.poll_timeout_secs),
    );
    let pipeline = Arc::new(ReportPipeline::new(fetcher, config.report.clone()));

    // 构建路由
    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/report/run", post(api::run_report))
        .route("/api/report/download", post(api::download_report))
        .with_state(pipeline)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/report/run      - Schedule, poll and download (optionally process)");
    info!("  POST /api/report/download - Re-download artifact for an existing job id");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
