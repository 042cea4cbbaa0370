use color_eyre::eyre::WrapErr;
use identity_service::AppResources;
use identity_service::api::start_webserver;
use identity_service::config::load_config;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "identity_service=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    // .env is optional; real deployments use the environment directly
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => return Err(e).wrap_err("failed to read .env file"),
        _ => {}
    }

    initialize_tracing();

    let config = Arc::new(load_config().wrap_err("failed to load configuration")?);
    tracing::info!(
        listen_addr = %config.listen_addr,
        issuer = %config.token_issuer(),
        access_ttl_secs = config.tokens.access_ttl_secs,
        refresh_ttl_secs = config.tokens.refresh_ttl_secs,
        leeway_secs = config.tokens.leeway_secs,
        "configuration loaded"
    );

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("failed to connect to database")?,
    );

    let resources =
        AppResources::new(db, config).wrap_err("failed to initialise OAuth client")?;

    start_webserver(resources).await
}
