//! sash
//!
//! A reparenting X11 window manager: every managed top-level window is
//! wrapped in a bordered container, with mouse-driven move/resize and
//! click-to-focus.

mod config;
mod errors;
mod event_source;
mod wm;

use anyhow::{Context, Result, bail};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::event_source::EventSource;
use crate::wm::Wm;
use crate::wm::display::X11DisplayServer;
use crate::wm::hooks::DefaultHooks;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sash=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Reap children automatically; spawned processes are not ours to wait on.
    if unsafe { libc::signal(libc::SIGCHLD, libc::SIG_IGN) } == libc::SIG_ERR {
        bail!("Failed to ignore SIGCHLD");
    }

    info!("Starting sash");

    let config = Config::load()?;
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let display = X11DisplayServer::connect()?;
    let source = EventSource::new(display.connection())?;

    let mut wm = Wm::new(display, &config, Box::new(DefaultHooks));
    wm.bootstrap().context("Failed to take over the display")?;

    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Entering event loop");
    let outcome: Result<()> = 'outer: loop {
        // Drain everything already queued before parking on the fd again,
        // processing strictly in arrival order.
        loop {
            match source.poll_next_event() {
                Ok(Some(event)) => {
                    if let Err(e) = wm.dispatch(&event) {
                        break 'outer Err(e);
                    }
                }
                Ok(None) => break,
                Err(e) => break 'outer Err(e),
            }
        }
        if let Err(e) = wm.flush() {
            break 'outer Err(e);
        }

        tokio::select! {
            _ = source.wait_readable() => {}
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break 'outer Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break 'outer Ok(());
            }
        }
    };

    match outcome {
        Ok(()) => {
            // Orderly shutdown: release every client before disconnecting.
            wm.shutdown()?;
            Ok(())
        }
        Err(e) => {
            // The connection is unusable; further requests would themselves
            // fail, so the cleanup pass is skipped.
            error!("Event loop failed: {e:#}");
            Err(e)
        }
    }
}
