use huddle_server::{AppState, Config, cors_layer, create_router, monitoring};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // Inizializza la configurazione
    let config = Config::from_env()?;
    config.print_info();

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = Arc::new(AppState::with_typing_timeout(
        pool,
        config.jwt_secret.clone(),
        config.typing_timeout(),
    ));

    // il registro delle presenze parte vuoto: i flag di una esecuzione precedente non valgono più
    let reset = state.user.reset_all_presence().await?;
    info!("Reset presence of {} users", reset);

    if config.stats_interval_secs > 0 {
        tokio::spawn(monitoring::start_stats_monitoring(
            state.clone(),
            config.stats_interval_secs,
        ));
    }

    let app = create_router(state).layer(cors_layer(config.cors_origin.as_deref()));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
