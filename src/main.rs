#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use popdesk::{
    banner, build_app,
    config::{Cli, NotifierSettings, Settings},
    logging::init_logging,
    models::AppState,
    notifier,
    shutdown::ShutdownSignal,
    tunnel::NgrokTunnel,
};

type ServerTask = JoinHandle<std::io::Result<()>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; variables already in the environment win.
    let dotenv = dotenvy::dotenv();

    // Malformed values are configuration errors too: exit 1, not clap's 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print()?;
            anyhow::bail!("invalid configuration");
        }
    };
    let config = cli.config;

    // Keep guard alive so file logger flushes correctly
    let _log_guards = init_logging(&config);

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }

    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            for problem in &e.problems {
                tracing::error!("{}: {}", problem.variable, problem.reason);
            }
            return Err(e.into());
        }
    };

    log_settings(&settings);

    let mut signals = ShutdownSignal::install().context("failed to install signal handlers")?;

    let state = AppState::new(
        settings.auth_token.clone(),
        notifier::from_settings(&settings.notifier),
    );
    let app = build_app(state);

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Starting webhook server on {local_addr}");

    let stop = CancellationToken::new();
    let mut server: ServerTask = tokio::spawn({
        let stop = stop.clone();
        async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
        }
    });

    let tunnel = match &settings.tunnel {
        Some(options) => {
            let opened = tokio::select! {
                opened = NgrokTunnel::open(options) => opened,
                () = signals.recv() => {
                    stop_server(&stop, server).await?;
                    return Ok(());
                }
            };
            match opened {
                Ok(tunnel) => Some(tunnel),
                Err(e) => {
                    tracing::error!("Error setting up ngrok: {e}");
                    stop_server(&stop, server).await.ok();
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("Tunnel disabled, serving locally only");
            None
        }
    };

    let url = tunnel
        .as_ref()
        .map_or_else(|| format!("http://{local_addr}"), |t| t.public_url().to_owned());
    println!("{}", banner::instructions(&url));

    tokio::select! {
        () = signals.recv() => {
            stop.cancel();
            close_tunnel(tunnel).await;
            join_server(server).await
        }
        finished = &mut server => {
            close_tunnel(tunnel).await;
            match finished {
                Ok(Ok(())) => anyhow::bail!("HTTP server stopped unexpectedly"),
                Ok(Err(e)) => Err(anyhow::Error::from(e).context("HTTP server failed")),
                Err(e) => Err(anyhow::Error::from(e).context("HTTP server task aborted")),
            }
        }
    }
}

fn log_settings(settings: &Settings) {
    tracing::info!("=== Configuration ===");
    tracing::info!("Bind address: {}", settings.bind);
    tracing::info!("Webhook auth token: <set>");
    match &settings.tunnel {
        Some(t) => tracing::info!(
            "Tunnel: ngrok ({}), domain: {}",
            t.binary.display(),
            t.domain.as_deref().unwrap_or("<random>")
        ),
        None => tracing::info!("Tunnel: <disabled>"),
    }
    match &settings.notifier {
        NotifierSettings::Desktop => tracing::info!("Notifier: desktop"),
        NotifierSettings::Ntfy(url) => tracing::info!("Notifier: ntfy ({url})"),
    }
    tracing::info!("====================");
}

async fn stop_server(stop: &CancellationToken, server: ServerTask) -> anyhow::Result<()> {
    stop.cancel();
    join_server(server).await
}

async fn join_server(server: ServerTask) -> anyhow::Result<()> {
    server
        .await
        .context("HTTP server task aborted")?
        .context("HTTP server failed")?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Best effort: a failure here is logged, never turned into a non-zero exit.
async fn close_tunnel(tunnel: Option<NgrokTunnel>) {
    let Some(tunnel) = tunnel else {
        return;
    };
    if let Err(e) = tunnel.close().await {
        tracing::warn!("Failed to close tunnel: {e}");
    }
}
