//! Window manager runtime
//!
//! Owns the registry, the per-screen state, the client records, and the
//! decoration policies, and drives the client lifecycle: discovery, attach,
//! detach, and the shutdown pass. All state is mutated from the single
//! event-loop task; there is no synchronization anywhere in the core.

pub mod client;
pub mod decorations;
pub mod display;
pub mod events;
pub mod focus;
pub mod hooks;
pub mod pointer;
pub mod registry;

#[cfg(test)]
pub mod mock_display;

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Window;

use crate::config::Config;
use client::{Client, ClientId, Screen};
use decorations::{AttachOutcome, Decoration, FrameDecor, NULL_DECOR, NullDecor};
use display::DisplayServer;
use hooks::{HookAction, Hooks};
use registry::{Owner, Registry, WindowRole};

/// The window manager core.
pub struct Wm<D: DisplayServer> {
    pub(crate) display: D,
    pub(crate) registry: Registry,
    pub(crate) screens: Vec<Screen>,
    pub(crate) clients: HashMap<ClientId, Client>,
    pub(crate) decors: Vec<Box<dyn Decoration<D>>>,
    pub(crate) hooks: Box<dyn Hooks>,
    next_client: u64,
}

impl<D: DisplayServer> Wm<D> {
    /// Build the runtime over an established display connection. Seeds one
    /// screen record and one ScreenRoot registry entry per root window and
    /// registers the frame policy on every screen's probe list.
    pub fn new(display: D, config: &Config, hooks: Box<dyn Hooks>) -> Self {
        let mut registry = Registry::new();
        let mut screens = Vec::new();

        for (index, &root) in display.roots().iter().enumerate() {
            let entry = registry.touch(root);
            entry.role = WindowRole::ScreenRoot;
            entry.owner = Owner::Screen(index);

            let mut screen = Screen::new(root);
            screen.probe = vec![decorations::FRAME_DECOR];
            screens.push(screen);
        }

        let decors: Vec<Box<dyn Decoration<D>>> = vec![
            Box::new(NullDecor),
            Box::new(FrameDecor::new(&config.decor)),
        ];

        Self {
            display,
            registry,
            screens,
            clients: HashMap::new(),
            decors,
            hooks,
            next_client: 1,
        }
    }

    /// Acquire substructure redirect on every root (fatal if another window
    /// manager holds it), then adopt the windows that already exist.
    pub fn bootstrap(&mut self) -> Result<()> {
        for index in 0..self.screens.len() {
            let root = self.screens[index].root;
            self.display
                .acquire_redirect(root)
                .with_context(|| format!("screen {index}"))?;
        }

        self.scan()?;
        self.display.flush()?;
        Ok(())
    }

    /// Startup scan: attach and map every non-override-redirect, currently
    /// viewable child of each root.
    fn scan(&mut self) -> Result<()> {
        for index in 0..self.screens.len() {
            let root = self.screens[index].root;
            let Some(children) = self.display.query_tree(root)? else {
                warn!("Could not query the window tree of root 0x{:x}", root);
                continue;
            };

            for child in children {
                let Some(attrs) = self.display.attributes(child)? else {
                    warn!("Couldn't get attributes for window 0x{:x}", child);
                    continue;
                };
                if attrs.override_redirect || !attrs.viewable {
                    continue;
                }
                if let Some(id) = self.attach(child)? {
                    self.client_created(id)?;
                }
            }
        }

        info!(
            "Startup scan complete: {} client(s), {} tracked window(s)",
            self.clients.len(),
            self.registry.len()
        );
        Ok(())
    }

    /// Take a top-level window under management.
    ///
    /// Declines when the window is marked ignored, is already managed, or
    /// its reported parent is not one of our screen roots (a foreign window,
    /// or a race against destruction). The new client is offered to each
    /// policy on the screen's probe list in registration order; when none
    /// accepts it keeps the null policy but is tracked all the same.
    pub fn attach(&mut self, window: Window) -> Result<Option<ClientId>> {
        if let Some(entry) = self.registry.find(window) {
            match entry.role {
                WindowRole::IgnoredClient => return Ok(None),
                WindowRole::ManagedClient => {
                    debug!("Window 0x{:x} is already managed", window);
                    return Ok(None);
                }
                _ => {}
            }
        }

        let Some(parent) = self.display.parent_of(window)? else {
            return Ok(None);
        };
        let screen = match self.registry.find(parent) {
            Some(entry) if entry.role == WindowRole::ScreenRoot => match entry.owner {
                Owner::Screen(index) => index,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        let id = ClientId(self.next_client);
        self.next_client += 1;

        let mut client = Client {
            id,
            screen,
            window,
            decor: NULL_DECOR,
        };

        let entry = self.registry.touch(window);
        entry.role = WindowRole::ManagedClient;
        entry.owner = Owner::Client(id);

        for &index in &self.screens[screen].probe {
            let outcome =
                self.decors[index].try_attach(&self.display, &mut self.registry, &client)?;
            if outcome == AttachOutcome::Attached {
                client.decor = index;
                break;
            }
        }

        self.display.stamp_desktop(window)?;

        info!(
            "Attached window 0x{:x} with {} decoration",
            window,
            self.decors[client.decor].name()
        );

        self.screens[screen].clients.push(id);
        self.clients.insert(id, client);
        Ok(Some(id))
    }

    /// Release a client, destroying its record exactly once.
    ///
    /// With `forget` the original window's registry entry is erased and the
    /// window defensively unmapped (it was destroyed or permanently
    /// released). Without it the entry is demoted to ignored so a later
    /// destroy notification is absorbed instead of mis-dispatched.
    pub fn detach(&mut self, id: ClientId, forget: bool) -> Result<()> {
        let Some(client) = self.clients.remove(&id) else {
            return Ok(());
        };
        let screen = client.screen;

        // A session still dragging this client must be released first so no
        // stale reference survives the detach.
        if self.screens[screen].pointer.map(|s| s.client) == Some(id) {
            if let Some(session) = self.screens[screen].detach_pointer() {
                self.decors[client.decor].drag_release(&self.display, &client, &session)?;
                self.display.ungrab_pointer()?;
            }
        }

        self.hooks.client_closing(&client);

        self.decors[client.decor].detach(&self.display, &mut self.registry, &client, !forget)?;

        if forget {
            self.registry.erase(client.window);
            self.display.unmap_window(client.window)?;
        } else if let Some(entry) = self.registry.find_mut(client.window) {
            entry.role = WindowRole::IgnoredClient;
            entry.owner = Owner::None;
        }

        let screen = &mut self.screens[screen];
        if screen.focus == Some(id) {
            // The client is gone; there is nothing left to blur.
            screen.focus = None;
        }
        screen.clients.retain(|c| *c != id);

        info!("Detached window 0x{:x} (forget={})", client.window, forget);
        Ok(())
    }

    /// Detach every client on every screen. Runs before disconnecting on an
    /// orderly shutdown.
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Detaching all clients");
        for index in 0..self.screens.len() {
            let ids = self.screens[index].clients.clone();
            for id in ids {
                self.detach(id, true)?;
            }
        }
        self.display.flush()?;
        Ok(())
    }

    /// Push any buffered requests out to the server.
    pub fn flush(&self) -> Result<()> {
        self.display.flush()
    }

    /// Fire the created hook for a fresh client and apply its answer.
    pub(crate) fn client_created(&mut self, id: ClientId) -> Result<()> {
        let mut action = None;
        if let Some(client) = self.clients.get(&id) {
            action = Some(self.hooks.client_created(client));
        }
        if let Some(action) = action {
            self.apply_hook_action(id, action)?;
        }
        Ok(())
    }

    pub(crate) fn apply_hook_action(&mut self, id: ClientId, action: HookAction) -> Result<()> {
        match action {
            HookAction::Map => self.decor_map(id),
            HookAction::Unmap => self.decor_unmap(id),
            HookAction::None => Ok(()),
        }
    }

    pub(crate) fn decor_map(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        self.decors[client.decor].map(&self.display, client)
    }

    pub(crate) fn decor_unmap(&mut self, id: ClientId) -> Result<()> {
        let Some(client) = self.clients.get(&id) else {
            return Ok(());
        };
        self.decors[client.decor].unmap(&self.display, client)
    }
}

#[cfg(test)]
impl<D: DisplayServer> Wm<D> {
    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn screen(&self, index: usize) -> &Screen {
        &self.screens[index]
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
