//! Standalone webhook receiver for local testing.
//!
//! Records every delivery in memory and exposes the history over HTTP, so webhook flows can be
//! exercised without an external service.
use anyhow::{Context, Result};
use clap::Parser;
use docqa::{
    logging,
    receiver::{DEFAULT_RECEIVER_PORT, WebhookLog, create_receiver_router},
};
use std::net::Ipv4Addr;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about = "Record webhook deliveries for inspection")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_RECEIVER_PORT)]
    port: u16,

    /// Reject deliveries whose `X-Webhook-Secret` differs from this value.
    #[arg(long)]
    secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let cli = Cli::parse();

    let app = create_receiver_router(WebhookLog::new(), cli.secret.clone());
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, cli.port))
        .await
        .with_context(|| format!("failed to bind port {}", cli.port))?;

    tracing::info!(
        secret_check = cli.secret.is_some(),
        "Webhook receiver listening on http://0.0.0.0:{}/webhook",
        cli.port
    );
    axum::serve(listener, app)
        .await
        .context("webhook receiver terminated")?;
    Ok(())
}
