use aculink_proxy::{
    config::Config,
    database::create_pool,
    interceptor::{Interceptor, InterceptorSettings, http_client, router},
    relay::TcpRelay,
    repository::{ReadingRepository, SqliteReadingRepository},
    services::{DecodeQueue, TelemetryService},
};
use log::{error, info};
use std::{process, sync::Arc};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = Config::load().unwrap_or_else(|err| {
        error!("Failed to load configuration: {}", err);
        process::exit(1);
    });

    info!("Loaded configuration:");
    info!("  HTTP: {} (vendor host {})", config.server.http_addr, config.vendor.hostname);
    info!("  Upstream: {} as {}", config.vendor.upstream_addr, config.vendor.upstream_host);
    info!("  Relay: {} -> {}", config.server.relay_addr, config.vendor.relay_remote);

    let repository: Option<Arc<dyn ReadingRepository>> = if config.database.enabled() {
        match create_pool(&config.database.url, config.database.pool_size).await {
            Ok(pool) => Some(Arc::new(SqliteReadingRepository::new(pool))),
            Err(e) => {
                error!("Failed to open database {}: {}", config.database.url, e);
                process::exit(1);
            }
        }
    } else {
        info!("No database configured, readings are only logged");
        None
    };

    let service = Arc::new(TelemetryService::new(repository));
    let (queue, _workers) = DecodeQueue::spawn(
        service,
        config.decoder.workers,
        config.decoder.queue_capacity,
    );

    let client = http_client(config.timeouts.connect());
    let interceptor = match Interceptor::new(InterceptorSettings::from(&config), client, queue) {
        Ok(interceptor) => Arc::new(interceptor),
        Err(e) => {
            error!("Invalid vendor configuration: {}", e);
            process::exit(1);
        }
    };

    let http_listener = bind(&config.server.http_addr).await;
    let relay_listener = bind(&config.server.relay_addr).await;

    let relay = TcpRelay::new(
        config.vendor.relay_remote.clone(),
        config.timeouts.connect(),
        config.timeouts.idle(),
    );

    let http_server = tokio::spawn(async move { axum::serve(http_listener, router(interceptor)).await });
    let relay_server = tokio::spawn(relay.serve(relay_listener));

    tokio::select! {
        result = http_server => error!("HTTP server stopped: {:?}", result),
        result = relay_server => error!("Relay stopped: {:?}", result),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
}

async fn bind(addr: &str) -> TcpListener {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Cannot listen on {}: {}", addr, e);
            process::exit(1);
        }
    }
}
