use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use econ_dashboard::routers::create_routes;
use econ_dashboard::{load_config, AnalysisHistoryHolder, AppState, FileSlotStorage, WebhookClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // Настройка структурированного логирования
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("econ_dashboard=info,warn"));

    let (file_layer, _log_guard) = match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "econ_dashboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true))
        .with(file_layer)
        .init();

    let webhook = WebhookClient::new(&config)?;
    tracing::info!("Вебхук анализа: {}", webhook.endpoint());
    let storage = Arc::new(FileSlotStorage::new(config.storage_dir()));
    let history = AnalysisHistoryHolder::open(storage).await;

    let state = AppState { webhook, history };

    let app = create_routes(state);
    let addr = config.bind_address()?;
    tracing::info!("Сервер запущен на http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Получен сигнал остановки");
        })
        .await?;
    Ok(())
}
