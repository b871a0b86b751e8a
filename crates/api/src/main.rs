use std::sync::Arc;

use anyhow::Context;

use sesame_infra::{AuthConfig, LogNotifier, Notifier, SmtpNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sesame_observability::init();

    let config = AuthConfig::from_env().context("reading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "relaying mail over smtp");
            Arc::new(SmtpNotifier::new(smtp, &config.mail_from).context("configuring smtp relay")?)
        }
        None => Arc::new(LogNotifier::new(config.mail_from.clone())),
    };
    let state = sesame_api::app::build_state(&config, notifier).await?;
    let app = sesame_api::app::build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
