//! USSD gateway server.
//!
//! Loads configuration, wires stores and services, starts the session
//! sweeper and serves the carrier endpoint until Ctrl-C.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ussd_gateway::adapters::file::FileDefinitionStore;
use ussd_gateway::adapters::http::{ussd_routes, UssdHandlers};
use ussd_gateway::adapters::memory::{
    InMemoryDefinitionStore, InMemorySessionRepository, InMemoryStorageRepository,
};
use ussd_gateway::adapters::postgres::{
    run_migrations, PostgresDefinitionStore, PostgresSessionRepository, PostgresStorageRepository,
};
use ussd_gateway::adapters::transport::{ReqwestTransport, ReqwestTransportConfig};
use ussd_gateway::application::{
    ApiInvoker, AutomatonEngine, GenericStorageService, ServiceRegistry, SessionManager,
    SessionSweeper, SessionSweeperConfig, UssdGateway,
};
use ussd_gateway::config::AppConfig;
use ussd_gateway::ports::{DefinitionStore, SessionRepository, StorageRepository};

struct Stores {
    sessions: Arc<dyn SessionRepository>,
    storage: Arc<dyn StorageRepository>,
    definitions: Arc<dyn DefinitionStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let stores = open_stores(&config).await?;

    let transport = ReqwestTransport::new(
        ReqwestTransportConfig::new()
            .with_timeout(config.http_client.default_timeout())
            .with_user_agent(config.http_client.user_agent.clone()),
    )?;
    let api = Arc::new(
        ApiInvoker::new(Arc::new(transport))
            .with_default_timeout(config.http_client.default_timeout())
            .with_retry_backoff(config.http_client.retry_backoff()),
    );

    let sessions = Arc::new(SessionManager::new(
        stores.sessions,
        config.session.timeout(),
    ));
    let storage = Arc::new(GenericStorageService::new(stores.storage));
    let engine = Arc::new(
        AutomatonEngine::new(sessions.clone(), storage, api).with_config(config.engine.clone()),
    );
    let registry = Arc::new(ServiceRegistry::new(
        stores.definitions,
        config.engine.max_message_length,
    ));
    let gateway = Arc::new(UssdGateway::new(
        registry,
        sessions.clone(),
        engine,
        config.engine.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_task = config.session.sweep_enabled.then(|| {
        let sweeper = SessionSweeper::with_config(
            sessions.clone(),
            SessionSweeperConfig::from(&config.session),
        );
        tokio::spawn(async move { sweeper.run(shutdown_rx).await })
    });

    let app = ussd_routes(UssdHandlers::new(gateway)).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(config.server.request_timeout()))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, main_menu = %config.engine.main_menu_code, "USSD gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        match task.await {
            Ok(Err(e)) => tracing::warn!(error = %e, "final session sweep failed"),
            Err(e) => tracing::warn!(error = %e, "session sweeper task aborted"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("USSD gateway stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_stores(config: &AppConfig) -> Result<Stores, Box<dyn Error>> {
    if let Some(database) = &config.database {
        tracing::info!("Connecting to PostgreSQL");
        let pool = database.connect().await?;
        if database.run_migrations {
            run_migrations(&pool).await?;
        }
        return Ok(Stores {
            sessions: Arc::new(PostgresSessionRepository::new(pool.clone())),
            storage: Arc::new(PostgresStorageRepository::new(pool.clone())),
            definitions: Arc::new(PostgresDefinitionStore::new(pool)),
        });
    }

    tracing::warn!("No database configured; sessions and storage are kept in memory");
    let definitions: Arc<dyn DefinitionStore> = match &config.registry.definitions_dir {
        Some(dir) => {
            let store = FileDefinitionStore::open(dir).await?;
            tracing::info!(dir = %dir.display(), "Loaded service definitions from directory");
            Arc::new(store)
        }
        None => {
            tracing::warn!("No definitions directory configured; the catalogue is empty");
            Arc::new(InMemoryDefinitionStore::new())
        }
    };

    Ok(Stores {
        sessions: Arc::new(InMemorySessionRepository::new()),
        storage: Arc::new(InMemoryStorageRepository::new()),
        definitions,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
