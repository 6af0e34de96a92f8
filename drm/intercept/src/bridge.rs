use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::dispatch::Dispatcher;

/// Pause after a failed accept, so a full descriptor table is not spun on.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/**
    Source of agent connections. Implemented by [`TcpListener`].
*/
trait Listener: Send + Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/**
    Serve hooking agents on `listener` until `shutdown_rx` turns `true`.

    Each connection carries newline-delimited JSON in both directions and is
    served by its own task. Messages on one connection are handled in order;
    the exchange work itself runs on the blocking pool. A failed accept is
    logged and the listener keeps running.
*/
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    serve_on(listener, dispatcher, shutdown_rx).await
}

async fn serve_on(
    listener: impl Listener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("failed to accept agent connection: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                tracing::info!(%peer, "agent connected");
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Err(e) = connection(stream, dispatcher).await {
                        tracing::warn!(%peer, "agent connection failed: {e}");
                    }
                    tracing::info!(%peer, "agent disconnected");
                });
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn connection(stream: TcpStream, dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let dispatcher = Arc::clone(&dispatcher);
        let reply = tokio::task::spawn_blocking(move || dispatcher.handle_line(&line))
            .await
            .map_err(io::Error::other)?;

        if let Some(mut reply) = reply {
            reply.push('\n');
            writer.write_all(reply.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/**
    Bind the bridge listener.
*/
pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr).await
}
