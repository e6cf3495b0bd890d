use anyhow::{Context, Result};
use clap::Parser;
use research_buddy::{
    api, config, logging,
    session::{ResearchSession, SessionApi},
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "research-buddy",
    about = "HTTP server for document-grounded question answering"
)]
struct Cli {
    /// Port to bind; overrides `SERVER_PORT`.
    #[arg(long)]
    port: Option<u16>,
    /// Start with an empty session instead of asking the document service for a ready document.
    #[arg(long)]
    skip_resync: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let session = ResearchSession::from_config().context("failed to build document client")?;
    if !cli.skip_resync {
        let snapshot = session.resync().await;
        tracing::info!(
            status = snapshot.status.label(),
            "Initial readiness check complete"
        );
    }
    let app = api::create_router(Arc::new(session));

    let (listener, port) = bind_listener(cli.port).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener(port_override: Option<u16>) -> Result<(TcpListener, u16)> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = port_override.or(config.server_port) {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        return Ok((listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err).context("failed to bind listener"),
        }
    }

    anyhow::bail!("No available port found in range 4100-4199")
}
