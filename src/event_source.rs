//! X11 event source
//!
//! Drains queued X events without blocking and provides an async wakeup when
//! the display-server connection's file descriptor becomes readable, using
//! mio on a background task.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

/// Readiness-driven X event stream.
///
/// The core is a single-consumer loop: it drains every queued event with
/// [`EventSource::poll_next_event`], then parks on
/// [`EventSource::wait_readable`] until the server sends more.
pub struct EventSource {
    conn: Arc<RustConnection>,
    notify: Arc<Notify>,
    _poll_guard: oneshot::Receiver<()>,
}

impl EventSource {
    /// Create an event source over an established connection.
    ///
    /// Spawns a background task that polls the X11 file descriptor and
    /// notifies the loop when events are available.
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        let (guard, poll_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);

        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register X11 FD with mio")?;

        let timeout = Duration::from_millis(100);
        tokio::task::spawn_blocking(move || {
            loop {
                if guard.is_closed() {
                    tracing::debug!("X11 socket polling task shutting down");
                    return;
                }

                if let Err(err) = poll.poll(&mut events, Some(timeout)) {
                    tracing::warn!("X11 socket poll failed: {:?}", err);
                    continue;
                }

                events
                    .iter()
                    .filter(|event| event.token() == mio::Token(0))
                    .for_each(|_| task_notify.notify_one());
            }
        });

        Ok(Self {
            conn,
            notify,
            _poll_guard: poll_guard,
        })
    }

    /// Non-blocking: take the next queued event, if any.
    ///
    /// An error here means the connection itself broke; the loop must stop
    /// and skip the cleanup pass.
    pub fn poll_next_event(&self) -> Result<Option<Event>> {
        Ok(self.conn.poll_for_event()?)
    }

    /// Async wait for the X11 FD to become readable.
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }
}
