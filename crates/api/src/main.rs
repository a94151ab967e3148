use anyhow::Context;

use forgepos_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forgepos_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if !config.jwt_secret_configured {
        tracing::warn!("tokens are verified with the development secret; set JWT_SECRET in production");
    }

    let app = forgepos_api::app::build_app(&config)
        .await
        .context("failed to assemble backend")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.use_persistent_stores,
        currency = %config.currency,
        "forgepos api listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
