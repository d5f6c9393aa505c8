use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use niko_backend_core::{app, app_config, db, initialize_app_state, migrations, BootError};

#[tokio::main]
async fn main() -> Result<(), BootError> {
    dotenv::dotenv().ok();

    let config = app_config::config();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.rust_log.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        environment = %config.environment,
        database = %db::mask_connection_string(&config.database_url),
        "starting niko-backend-core"
    );

    if migrations::should_run_migrations() {
        migrations::run_migrations().await?;
    } else {
        tracing::info!("migrations skipped by configuration");
    }

    let state = initialize_app_state().await?;
    let router = app::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %config.bind_address, "listening");

    axum::serve(listener, router).await?;

    Ok(())
}
