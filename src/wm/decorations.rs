//! Decoration capability
//!
//! A decoration policy wraps managed windows: it owns the container window a
//! client is reparented into, drives its visibility, consumes or passes
//! through button presses, and reacts to focus changes. Exactly one policy
//! is assigned to a client when it attaches and never swapped afterwards.
//!
//! Policies keep their per-client state internally, keyed by [`ClientId`],
//! so the client record itself stays policy-agnostic.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::{
    ButtonPressEvent, KeyButMask, MapNotifyEvent, ReparentNotifyEvent, UnmapNotifyEvent, Window,
};

use crate::config::DecorConfig;
use crate::wm::client::{Client, ClientId};
use crate::wm::display::DisplayServer;
use crate::wm::pointer::{DragSpec, PointerMode, PointerSession};
use crate::wm::registry::{Owner, Registry, WindowRole};

/// Index of the null policy in the runtime's policy table.
pub const NULL_DECOR: usize = 0;
/// Index of the frame policy.
pub const FRAME_DECOR: usize = 1;

/// Smallest size a drag-resize may shrink a container to, in device units.
const MIN_DRAG_SIZE: i32 = 32;

/// Outcome of offering a freshly discovered client to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    Failed,
}

/// What a policy decided to do with a button press.
#[derive(Debug, Clone, Copy)]
pub enum ButtonVerdict {
    /// Replay the press to the original client so normal application
    /// click-through still works.
    PassThrough,
    /// The policy consumed the press.
    Caught,
    /// The policy consumed the press and wants an interactive drag.
    Drag(DragSpec),
}

/// Disposition of a forwarded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDisposition {
    Handled,
    /// The owner moved the original window elsewhere; abandon the client
    /// without forgetting its window.
    Release,
}

/// Capability set a window-wrapping policy implements. Notification and
/// drag callbacks default to no-ops so a minimal policy only has to decide
/// attachment.
pub trait Decoration<D: DisplayServer> {
    fn name(&self) -> &'static str;

    /// Decide whether this policy accepts the client. On success the policy
    /// has created and registered its container and owns the window's
    /// decoration permanently.
    fn try_attach(
        &mut self,
        x: &D,
        registry: &mut Registry,
        client: &Client,
    ) -> Result<AttachOutcome>;

    /// Show the container. Idempotent.
    fn map(&mut self, _x: &D, _client: &Client) -> Result<()> {
        Ok(())
    }

    /// Hide the container. Idempotent.
    fn unmap(&mut self, _x: &D, _client: &Client) -> Result<()> {
        Ok(())
    }

    /// Reverse the attach: hand the original window back to the screen root
    /// and tear the container down. With `keep_mapped`, a mapped client's
    /// original window is re-mapped standalone afterwards.
    fn detach(
        &mut self,
        _x: &D,
        _registry: &mut Registry,
        _client: &Client,
        _keep_mapped: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn on_button_press(
        &mut self,
        _x: &D,
        _client: &Client,
        _press: &ButtonPressEvent,
    ) -> Result<ButtonVerdict> {
        Ok(ButtonVerdict::PassThrough)
    }

    fn on_map_notify(&mut self, _x: &D, _client: &Client, _ev: &MapNotifyEvent) -> Result<()> {
        Ok(())
    }

    fn on_unmap_notify(&mut self, _x: &D, _client: &Client, _ev: &UnmapNotifyEvent) -> Result<()> {
        Ok(())
    }

    fn on_reparent_notify(
        &mut self,
        _x: &D,
        _client: &Client,
        _ev: &ReparentNotifyEvent,
    ) -> Result<NotifyDisposition> {
        Ok(NotifyDisposition::Handled)
    }

    fn on_focus(&mut self, _x: &D, _client: &Client) -> Result<()> {
        Ok(())
    }

    fn on_blur(&mut self, _x: &D, _client: &Client) -> Result<()> {
        Ok(())
    }

    /// Pointer moved during a drag this policy started.
    fn drag_motion(
        &mut self,
        _x: &D,
        _client: &Client,
        _session: &PointerSession,
        _ptr_x: i32,
        _ptr_y: i32,
    ) -> Result<()> {
        Ok(())
    }

    /// The drag ended (button release, or the client is going away).
    fn drag_release(&mut self, _x: &D, _client: &Client, _session: &PointerSession) -> Result<()> {
        Ok(())
    }
}

/// Fallback policy for clients no real policy accepted: tracked but
/// undecorated and non-interactive.
pub struct NullDecor;

impl<D: DisplayServer> Decoration<D> for NullDecor {
    fn name(&self) -> &'static str {
        "null"
    }

    fn try_attach(
        &mut self,
        _x: &D,
        _registry: &mut Registry,
        _client: &Client,
    ) -> Result<AttachOutcome> {
        Ok(AttachOutcome::Failed)
    }
}

/// Per-client state of the frame policy.
#[derive(Debug)]
struct Frame {
    container: Window,
    mapped: bool,
}

/// The one concrete policy: wraps each client in a bordered, override-
/// redirect container, recolors the border on focus changes, and starts
/// Alt+button drags for move (left) and resize (right).
pub struct FrameDecor {
    border_width: u16,
    active_pixel: u32,
    inactive_pixel: u32,
    frames: HashMap<ClientId, Frame>,
}

impl FrameDecor {
    pub fn new(config: &DecorConfig) -> Self {
        Self {
            border_width: config.border_width,
            active_pixel: config.active_border,
            inactive_pixel: config.inactive_border,
            frames: HashMap::new(),
        }
    }
}

impl<D: DisplayServer> Decoration<D> for FrameDecor {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn try_attach(
        &mut self,
        x: &D,
        registry: &mut Registry,
        client: &Client,
    ) -> Result<AttachOutcome> {
        // The window may vanish between discovery and this query.
        let Some(geom) = x.geometry(client.window)? else {
            return Ok(AttachOutcome::Failed);
        };

        let container = x.create_container(client.screen, geom, self.border_width)?;
        x.reparent(client.window, container, 0, 0)?;
        x.map_window(client.window)?;
        x.grab_drag_buttons(container)?;
        x.set_border_pixel(container, self.inactive_pixel)?;

        let entry = registry.touch(container);
        entry.role = WindowRole::ManagedClient;
        entry.owner = Owner::Client(client.id);

        self.frames.insert(
            client.id,
            Frame {
                container,
                mapped: false,
            },
        );

        Ok(AttachOutcome::Attached)
    }

    fn map(&mut self, x: &D, client: &Client) -> Result<()> {
        let Some(frame) = self.frames.get_mut(&client.id) else {
            return Ok(());
        };
        if frame.mapped {
            return Ok(());
        }
        frame.mapped = true;

        x.map_window(frame.container)
    }

    fn unmap(&mut self, x: &D, client: &Client) -> Result<()> {
        let Some(frame) = self.frames.get_mut(&client.id) else {
            return Ok(());
        };
        if !frame.mapped {
            return Ok(());
        }
        frame.mapped = false;

        x.unmap_window(frame.container)
    }

    fn detach(
        &mut self,
        x: &D,
        registry: &mut Registry,
        client: &Client,
        keep_mapped: bool,
    ) -> Result<()> {
        let Some(frame) = self.frames.remove(&client.id) else {
            return Ok(());
        };

        // Put the original window back where the container last was. A
        // vanished container still gets the rest of the teardown.
        let geom = x.geometry(frame.container)?.unwrap_or_default();
        let root = x.roots()[client.screen];
        x.reparent(client.window, root, geom.x, geom.y)?;

        if frame.mapped {
            x.unmap_window(frame.container)?;
        }
        registry.erase(frame.container);
        x.destroy_window(frame.container)?;

        if frame.mapped && keep_mapped {
            x.map_window(client.window)?;
        }

        Ok(())
    }

    fn on_button_press(
        &mut self,
        x: &D,
        client: &Client,
        press: &ButtonPressEvent,
    ) -> Result<ButtonVerdict> {
        if u16::from(press.state) & u16::from(KeyButMask::MOD1) == 0 {
            return Ok(ButtonVerdict::PassThrough);
        }

        let Some(frame) = self.frames.get(&client.id) else {
            return Ok(ButtonVerdict::PassThrough);
        };
        let Some(geom) = x.geometry(frame.container)? else {
            debug!(
                "Container of window 0x{:x} vanished mid-press",
                client.window
            );
            return Ok(ButtonVerdict::Caught);
        };

        let spec = if press.detail == 1 {
            DragSpec {
                mode: PointerMode::Moving,
                grip_x: geom.x - press.root_x as i32,
                grip_y: geom.y - press.root_y as i32,
            }
        } else {
            DragSpec {
                mode: PointerMode::Resizing,
                grip_x: geom.width as i32 - press.root_x as i32,
                grip_y: geom.height as i32 - press.root_y as i32,
            }
        };

        Ok(ButtonVerdict::Drag(spec))
    }

    fn on_reparent_notify(
        &mut self,
        _x: &D,
        client: &Client,
        ev: &ReparentNotifyEvent,
    ) -> Result<NotifyDisposition> {
        // The owner reparenting its window away from our container means it
        // no longer wants to be managed here.
        if ev.window == client.window {
            if let Some(frame) = self.frames.get(&client.id) {
                if ev.parent != frame.container {
                    return Ok(NotifyDisposition::Release);
                }
            }
        }
        Ok(NotifyDisposition::Handled)
    }

    fn on_focus(&mut self, x: &D, client: &Client) -> Result<()> {
        let Some(frame) = self.frames.get(&client.id) else {
            return Ok(());
        };
        x.raise_window(frame.container)?;
        x.set_border_pixel(frame.container, self.active_pixel)
    }

    fn on_blur(&mut self, x: &D, client: &Client) -> Result<()> {
        let Some(frame) = self.frames.get(&client.id) else {
            return Ok(());
        };
        x.set_border_pixel(frame.container, self.inactive_pixel)
    }

    fn drag_motion(
        &mut self,
        x: &D,
        client: &Client,
        session: &PointerSession,
        ptr_x: i32,
        ptr_y: i32,
    ) -> Result<()> {
        let Some(frame) = self.frames.get(&client.id) else {
            return Ok(());
        };

        match session.mode {
            PointerMode::Moving => {
                x.move_window(frame.container, session.grip_x + ptr_x, session.grip_y + ptr_y)
            }
            PointerMode::Resizing => {
                let width = (session.grip_x + ptr_x).max(MIN_DRAG_SIZE);
                let height = (session.grip_y + ptr_y).max(MIN_DRAG_SIZE);
                x.resize_window(frame.container, width as u32, height as u32)
            }
        }
    }

    fn drag_release(&mut self, x: &D, client: &Client, session: &PointerSession) -> Result<()> {
        if session.mode != PointerMode::Resizing {
            return Ok(());
        }

        // Tell the inner application its real size.
        if let Some(frame) = self.frames.get(&client.id) {
            if let Some(geom) = x.geometry(frame.container)? {
                x.resize_window(client.window, geom.width, geom.height)?;
            }
        }
        Ok(())
    }
}
