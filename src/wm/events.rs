//! Event dispatcher
//!
//! A flat dispatch table over the notification kinds the manager handles.
//! Handlers are independent: nothing here depends on a previous event except
//! through the registry's role field and the pointer session's own state.
//! Events referencing untracked windows are dropped; that is the steady
//! state for foreign and override-redirect windows, not an error.

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    ButtonPressEvent, ButtonReleaseEvent, DestroyNotifyEvent, MapNotifyEvent, MapRequestEvent,
    MotionNotifyEvent, ReparentNotifyEvent, Timestamp, UnmapNotifyEvent, Window,
};

use crate::errors::CoreError;
use crate::wm::Wm;
use crate::wm::client::ClientId;
use crate::wm::decorations::{ButtonVerdict, NotifyDisposition};
use crate::wm::display::DisplayServer;
use crate::wm::pointer::{DragSpec, PointerSession};
use crate::wm::registry::{Owner, WindowRole};

impl<D: DisplayServer> Wm<D> {
    /// Route one server notification to its handler. Unhandled kinds are
    /// ignored.
    pub fn dispatch(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::MapRequest(e) => self.on_map_request(e),
            Event::MapNotify(e) => self.on_map_notify(e),
            Event::UnmapNotify(e) => self.on_unmap_notify(e),
            Event::ReparentNotify(e) => self.on_reparent_notify(e),
            Event::DestroyNotify(e) => self.on_destroy_notify(e),
            Event::ButtonPress(e) => self.on_button_press(e),
            Event::ButtonRelease(e) => self.on_button_release(e),
            Event::MotionNotify(e) => self.on_motion_notify(e),
            Event::Error(e) => {
                warn!(
                    "X11 error: error_code={}, request_code={}",
                    e.error_code, e.major_opcode
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Map requests are the normal discovery path: a request for a wholly
    /// new window allocates its registry entry.
    fn on_map_request(&mut self, e: &MapRequestEvent) -> Result<()> {
        let role = self.registry.touch(e.window).role;
        match role {
            WindowRole::Unclassified => {
                if let Some(id) = self.attach(e.window)? {
                    self.client_created(id)?;
                }
            }
            WindowRole::ManagedClient => {
                if let Some(id) = self.client_of(e.window) {
                    self.decor_map(id)?;
                }
            }
            WindowRole::IgnoredClient | WindowRole::ScreenRoot => {}
        }
        Ok(())
    }

    fn on_map_notify(&mut self, e: &MapNotifyEvent) -> Result<()> {
        let Some(id) = self.client_of(e.window) else {
            return Ok(());
        };

        if let Some(client) = self.clients.get(&id) {
            self.decors[client.decor].on_map_notify(&self.display, client, e)?;
        }

        let mut action = None;
        if let Some(client) = self.clients.get(&id) {
            if client.window == e.window {
                action = Some(self.hooks.client_mapped(client));
            }
        }
        if let Some(action) = action {
            self.apply_hook_action(id, action)?;
        }
        Ok(())
    }

    fn on_unmap_notify(&mut self, e: &UnmapNotifyEvent) -> Result<()> {
        let Some(id) = self.client_of(e.window) else {
            return Ok(());
        };

        if let Some(client) = self.clients.get(&id) {
            self.decors[client.decor].on_unmap_notify(&self.display, client, e)?;
        }

        let mut action = None;
        if let Some(client) = self.clients.get(&id) {
            if client.window == e.window {
                action = Some(self.hooks.client_unmapped(client));
            }
        }
        if let Some(action) = action {
            self.apply_hook_action(id, action)?;
        }
        Ok(())
    }

    fn on_reparent_notify(&mut self, e: &ReparentNotifyEvent) -> Result<()> {
        // Self-reparent notifications are synthetic/degenerate.
        if e.event == e.parent {
            return Ok(());
        }

        let Some(entry) = self.registry.find(e.window) else {
            return Ok(());
        };
        match (entry.role, entry.owner) {
            (WindowRole::ManagedClient, Owner::Client(id)) => {
                let disposition = {
                    let Some(client) = self.clients.get(&id) else {
                        return Ok(());
                    };
                    self.decors[client.decor].on_reparent_notify(&self.display, client, e)?
                };
                if disposition == NotifyDisposition::Release {
                    self.detach(id, false)?;
                }
            }
            (WindowRole::IgnoredClient, _) => {
                // A voluntarily released window has truly gone away.
                self.registry.erase(e.window);
            }
            _ => {}
        }
        Ok(())
    }

    fn on_destroy_notify(&mut self, e: &DestroyNotifyEvent) -> Result<()> {
        let Some(entry) = self.registry.find(e.window) else {
            return Ok(());
        };
        match (entry.role, entry.owner) {
            (WindowRole::ManagedClient, Owner::Client(id)) => {
                self.detach(id, true)?;
            }
            (WindowRole::IgnoredClient, _) => {
                self.registry.erase(e.window);
            }
            _ => {}
        }
        Ok(())
    }

    /// Presses arrive on container windows via their synchronous button
    /// grabs; anything the policy declines is replayed to the application.
    fn on_button_press(&mut self, e: &ButtonPressEvent) -> Result<()> {
        let Some(id) = self.client_of(e.event) else {
            self.display.replay_pointer(e.time)?;
            return Ok(());
        };

        self.set_focus(id)?;

        let verdict = {
            let Some(client) = self.clients.get(&id) else {
                return Ok(());
            };
            self.decors[client.decor].on_button_press(&self.display, client, e)?
        };

        match verdict {
            ButtonVerdict::Drag(spec) => self.start_drag(id, spec, e.time)?,
            ButtonVerdict::Caught => {}
            ButtonVerdict::PassThrough => self.display.replay_pointer(e.time)?,
        }
        Ok(())
    }

    /// Motion arrives on the screen root as a consequence of the pointer
    /// grab. The position is re-queried because the grab uses motion hints.
    fn on_motion_notify(&mut self, e: &MotionNotifyEvent) -> Result<()> {
        let Some(screen) = self.screen_of_root(e.root) else {
            return Ok(());
        };
        let Some(session) = self.screens[screen].pointer else {
            return Ok(());
        };

        let root = self.screens[screen].root;
        let Some((ptr_x, ptr_y)) = self.display.pointer_position(root)? else {
            return Ok(());
        };

        if let Some(client) = self.clients.get(&session.client) {
            self.decors[client.decor].drag_motion(&self.display, client, &session, ptr_x, ptr_y)?;
        }
        Ok(())
    }

    fn on_button_release(&mut self, e: &ButtonReleaseEvent) -> Result<()> {
        let Some(screen) = self.screen_of_root(e.root) else {
            return Ok(());
        };
        self.end_drag(screen)
    }

    fn start_drag(&mut self, id: ClientId, spec: DragSpec, time: Timestamp) -> Result<()> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        let screen = client.screen;

        let session = PointerSession {
            client: id,
            mode: spec.mode,
            grip_x: spec.grip_x,
            grip_y: spec.grip_y,
        };
        match self.screens[screen].attach_pointer(session) {
            Ok(()) => {
                let root = self.screens[screen].root;
                self.display.grab_pointer(root)?;
                self.display.sync_pointer(time)?;
                debug!("Started {:?} drag on screen {}", spec.mode, screen);
            }
            // Cannot normally happen while the exclusive grab is held; the
            // press is consumed and the active session stays untouched.
            Err(CoreError::PointerBusy) => {
                debug!("Pointer session already active on screen {}", screen);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub(crate) fn end_drag(&mut self, screen: usize) -> Result<()> {
        let Some(session) = self.screens[screen].detach_pointer() else {
            return Ok(());
        };

        if let Some(client) = self.clients.get(&session.client) {
            self.decors[client.decor].drag_release(&self.display, client, &session)?;
        }
        self.display.ungrab_pointer()?;
        Ok(())
    }

    pub(crate) fn client_of(&self, window: Window) -> Option<ClientId> {
        match self.registry.find(window) {
            Some(entry) if entry.role == WindowRole::ManagedClient => match entry.owner {
                Owner::Client(id) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }

    fn screen_of_root(&self, root: Window) -> Option<usize> {
        match self.registry.find(root) {
            Some(entry) if entry.role == WindowRole::ScreenRoot => match entry.owner {
                Owner::Screen(index) => Some(index),
                _ => None,
            },
            _ => None,
        }
    }
}
