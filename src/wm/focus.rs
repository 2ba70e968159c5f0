//! Focus coordinator
//!
//! At most one client per screen holds focus. Focus changes fire the blur
//! and focus activation callbacks on the affected decorations and redirect
//! the server's input to the newly focused original window.

use anyhow::Result;
use tracing::debug;

use crate::wm::Wm;
use crate::wm::client::ClientId;
use crate::wm::display::DisplayServer;

impl<D: DisplayServer> Wm<D> {
    /// Focus a client. No-op when it is already focused.
    pub fn set_focus(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        let screen = client.screen;

        let previous = self.screens[screen].focus;
        if previous == Some(id) {
            return Ok(());
        }

        if let Some(old_id) = previous {
            if let Some(old) = self.clients.get(&old_id) {
                self.decors[old.decor].on_blur(&self.display, old)?;
            }
        }

        if let Some(client) = self.clients.get(&id) {
            self.decors[client.decor].on_focus(&self.display, client)?;
            self.display.focus_input(client.window)?;
            debug!("Focused window 0x{:x}", client.window);
        }

        self.screens[screen].focus = Some(id);
        Ok(())
    }
}
