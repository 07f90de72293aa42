//! Server orchestration: the connection `Handler`, and `serve()`, the
//! top-level accept loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, instrument, warn};

use crate::bucket::BucketRegistry;
use crate::cluster::ClusterClient;
use crate::command::resp::{read_command, write_value};
use crate::command::{dispatch, CommandRegistry, RespValue, Session};
use crate::config::ServerConfig;
use crate::error::Result;

/// Shared, per-process connection handler: everything a command handler
/// function needs to serve a request.
pub struct Handler {
    pub(crate) registry: BucketRegistry,
    pub(crate) cluster: ClusterClient,
    pub(crate) config: ServerConfig,
    pub(crate) commands: CommandRegistry,
}

impl Handler {
    /// Builds a handler for a running server: opens the bucket registry,
    /// starts the cluster client, and registers every command.
    async fn new(config: ServerConfig, registry: BucketRegistry, cluster: ClusterClient) -> Self {
        let mut commands = CommandRegistry::new();
        crate::command::handlers::register_all(&mut commands);
        Self {
            registry,
            cluster,
            config,
            commands,
        }
    }

    /// Returns the local hostname, or `"unknown"` if it cannot be
    /// determined — used by `INFO`.
    pub(crate) fn local_hostname(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(test)]
impl Handler {
    /// Test-only constructor: builds a handler with a single-node cluster
    /// client bound to an OS-assigned ephemeral gossip port.
    pub fn for_test(registry: BucketRegistry, mut config: ServerConfig) -> Self {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        config.gossip_host = "127.0.0.1".to_string();
        config.gossip_port = socket.local_addr().unwrap().port();
        drop(socket);

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let cluster = runtime.block_on(ClusterClient::start(&config)).unwrap();

        let mut commands = CommandRegistry::new();
        crate::command::handlers::register_all(&mut commands);
        Self {
            registry,
            cluster,
            config,
            commands,
        }
    }
}

/// Serves the database over the network until a shutdown signal arrives.
///
/// Builds the handler, registers commands, binds the listener, and accepts
/// connections until `SIGINT`/`SIGTERM`, then shuts down gracefully (stop
/// accepting, leave the cluster, close every bucket).
#[instrument(skip(config))]
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;

    let registry = BucketRegistry::open(&config.datadir)?;
    let mut cluster = ClusterClient::start(&config).await?;
    let events = cluster.take_events();

    let handler = Arc::new(Handler::new(config.clone(), registry, cluster).await);

    if let Some(mut events) = events {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!(?event, "gossip event");
            }
        });
    }

    let listener = TcpListener::bind(handler.config.resp_addr()).await?;
    info!(addr = %handler.config.resp_addr(), "listening for RESP connections");

    let accepting = Arc::new(AtomicBool::new(true));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept(), if accepting.load(Ordering::SeqCst) => {
                match result {
                    Ok((stream, addr)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(handler, stream).await {
                                warn!(%addr, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                accepting.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    let leave_result = handler.cluster.leave().await;
    if let Err(e) = &leave_result {
        error!(error = %e, "leaving cluster during shutdown");
    }

    match Arc::try_unwrap(handler) {
        Ok(handler) => handler.registry.close()?,
        Err(_) => warn!("connections still active during shutdown, buckets left open"),
    }

    leave_result?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        tokio::select! {
            _ = &mut ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn handle_connection(handler: Arc<Handler>, stream: TcpStream) -> Result<()> {
    let remote_addr = stream.peer_addr()?;
    let _ = stream.set_nodelay(true);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut session = Session::new(handler.registry.default_bucket_name(), remote_addr);

    loop {
        let cmd = match read_command(&mut reader).await {
            Ok(Some(cmd)) if !cmd.args.is_empty() => cmd,
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                let _ = write_value(&mut write_half, &RespValue::error(format!("ERR {e}"))).await;
                break;
            }
        };

        let outcome = dispatch(&handler, &mut session, &cmd);
        write_value(&mut write_half, &outcome.reply).await?;
        if outcome.close {
            break;
        }
    }

    Ok(())
}
