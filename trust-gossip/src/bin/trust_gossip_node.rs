//! Trust gossip node.
//!
//! Runs one peer: the TCP listener for gossip traffic, the HTTP control
//! surface and the audit writer. Configuration comes from `TRUST_GOSSIP_*`
//! environment variables, overridden by command-line flags.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use trust_gossip::audit::{AuditLog, AuditWriter};
use trust_gossip::config::{Command, NodeConfig, USAGE};
use trust_gossip::control;
use trust_gossip::net::tcp::TcpTransport;
use trust_gossip::runtime::tokio_runtime::TokioRuntime;
use trust_gossip::{GossipEngine, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trust_gossip=debug".into()),
        )
        .init();

    let config = match NodeConfig::from_env()?.apply_args(std::env::args().skip(1))? {
        Command::Run(config) => config,
        Command::Help => {
            eprintln!("{USAGE}");
            return Ok(());
        }
    };
    config.validate()?;

    let runtime = TokioRuntime::new();
    let audit = AuditWriter::spawn(
        AuditLog::new(config.audit_path()),
        config.audit_queue_capacity,
        &runtime,
    );
    let engine = Arc::new(
        GossipEngine::new(&config, TcpTransport::new(config.send_timeout), runtime)?
            .with_audit(audit),
    );

    info!(
        node_id = config.node_id,
        identity = %config.identity(),
        peers = config.peers.len(),
        traitor = config.traitor,
        audit = %config.audit_path().display(),
        "starting node"
    );

    let listener =
        TcpTransport::listen(config.listen_addr, engine.clone(), config.send_timeout).await?;
    info!(addr = %listener.local_addr(), "peer listener started");

    let control_listener = TcpListener::bind(config.control_addr()?).await?;
    let control = tokio::spawn(control::serve(
        control_listener,
        engine.clone(),
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    ));

    match control.await {
        Ok(Ok(())) => info!("shutting down"),
        Ok(Err(e)) => error!(error = %e, "control server failed"),
        Err(e) => error!(error = %e, "control server task failed"),
    }

    listener.shutdown();
    engine.close_audit().await;
    Ok(())
}
