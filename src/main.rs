use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use requisition_api as api;
use api::store::{InMemoryStore, RequisitionStore, SeaOrmStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::metrics::init();
    api::handlers::health::init_start_time();

    // Init store
    let store: Arc<dyn RequisitionStore> = if cfg.uses_in_memory_store() {
        info!("Using in-memory store; data is lost on shutdown");
        Arc::new(InMemoryStore::new())
    } else {
        let db_pool = api::db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?;
        api::db::check_connection(&db_pool)
            .await
            .context("database did not answer ping")?;
        if cfg.auto_migrate {
            api::db::run_migrations(&db_pool).await.map_err(|e| {
                error!("Failed running migrations: {}", e);
                e
            })?;
        }
        Arc::new(SeaOrmStore::new(Arc::new(db_pool)))
    };

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Build services
    let factory = api::services::ServiceFactory::new(
        store.clone(),
        event_sender,
        api::services::WorkflowSettings::from(&cfg),
    );
    let services = api::services::ServiceContainer::new(&factory);

    let addr = SocketAddr::new(
        cfg.host
            .parse()
            .with_context(|| format!("invalid host address '{}'", cfg.host))?,
        cfg.port,
    );
    let app = api::build_router(api::AppState::new(cfg, store, services));

    // Bind and serve
    info!("requisition-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("requisition-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
