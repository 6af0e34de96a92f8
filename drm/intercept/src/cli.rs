use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{signal, sync::watch};

use drm_intercept::{Dispatcher, Interceptor, KeyFormat, LogSink, Mode};
use drm_widevine::Device;

/**
    AWP, the Android Widevine Proxy.

    Waits for a hooking agent to connect and forward the license exchanges
    of an application, answers each challenge with one bound to the local
    device and prints the content keys of every verified license.
*/
#[derive(Parser, Debug)]
#[command(name = "awp", version)]
pub struct Cli {
    /**
        Path to the .wvd device file, raw or base64.
    */
    #[arg(short, long)]
    device: PathBuf,

    /**
        Address the agent bridge listens on.
    */
    #[arg(short, long, default_value = "127.0.0.1:27042")]
    listen: SocketAddr,

    /**
        Only replace the token in the challenge. Does not work when the
        application uses a service certificate (privacy mode).
    */
    #[arg(long)]
    token_only: bool,

    /**
        Format of printed keys: default, mp4decrypt, or shaka-packager.
    */
    #[arg(short, long, default_value = "default")]
    key_format: KeyFormat,

    /**
        Log filter used when RUST_LOG is not set.
    */
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/**
    Validated settings for one run.
*/
#[derive(Debug)]
pub struct Config {
    pub device: Device,
    pub listen: SocketAddr,
    pub mode: Mode,
    pub key_format: KeyFormat,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        let wvd_data = std::fs::read(&self.device)
            .with_context(|| format!("failed to read WVD file {}", self.device.display()))?;
        let device = Device::load(&wvd_data).context("failed to parse WVD file")?;

        let mode = if self.token_only {
            Mode::TokenSubstitution
        } else {
            Mode::FullNegotiation
        };

        Ok(Config {
            device,
            listen: self.listen,
            mode,
            key_format: self.key_format,
        })
    }
}

pub async fn run(config: Config) -> Result<()> {
    tracing::info!(
        device_type = %config.device.device_type,
        security_level = %config.device.security_level,
        "loaded device"
    );

    let sink = LogSink::new(config.key_format);
    let interceptor = Interceptor::from_mode(config.mode, config.device, Box::new(sink));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(interceptor)));

    let listener = drm_intercept::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    tracing::info!(
        mode = %config.mode,
        listen = %config.listen,
        "ready, waiting for agent events"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(drm_intercept::serve(listener, dispatcher, shutdown_rx));

    signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);

    server
        .await
        .context("bridge task panicked")?
        .context("bridge failed")?;
    Ok(())
}
