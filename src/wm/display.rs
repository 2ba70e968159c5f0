//! Display server boundary
//!
//! The core consumes a fixed verb set from the display server; everything
//! X11 lives behind the [`DisplayServer`] trait so the runtime can be
//! exercised in tests without a live connection. [`X11DisplayServer`] is the
//! real implementation over x11rb.
//!
//! Query verbs return `Ok(None)` when the server answers with an error for
//! that window (it vanished mid-round-trip); callers abort just that
//! operation. A connection-level failure propagates as `Err` and terminates
//! the loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{
    Allow, Atom, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ConfigureWindowAux,
    ConnectionExt, CreateWindowAux, EventMask, GrabMode, InputFocus, MapState, ModMask, PropMode,
    StackMode, Timestamp, Visualid, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::errors::CoreError;

/// Window geometry in root coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The subset of window attributes the manager inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttrs {
    pub override_redirect: bool,
    pub viewable: bool,
}

/// The display-server verbs the core consumes (spec'd at the interface
/// boundary; the connection itself is opened once at startup and never
/// duplicated).
pub trait DisplayServer {
    /// Root windows, one per screen, in screen order.
    fn roots(&self) -> &[Window];

    /// Request exclusive substructure redirect on a root. Denial means
    /// another window manager owns the screen and is fatal.
    fn acquire_redirect(&self, root: Window) -> Result<()>;

    fn query_tree(&self, window: Window) -> Result<Option<Vec<Window>>>;
    fn parent_of(&self, window: Window) -> Result<Option<Window>>;
    fn geometry(&self, window: Window) -> Result<Option<Geometry>>;
    fn attributes(&self, window: Window) -> Result<Option<WindowAttrs>>;
    fn pointer_position(&self, root: Window) -> Result<Option<(i32, i32)>>;

    /// Create an override-redirect container window on the given screen.
    fn create_container(&self, screen: usize, geom: Geometry, border_width: u16)
    -> Result<Window>;

    /// Grab the drag buttons (left and right, any modifier, synchronous) on
    /// a container so presses can be consumed or replayed.
    fn grab_drag_buttons(&self, window: Window) -> Result<()>;

    /// Exclusive async pointer grab on a root, limited to motion and button
    /// release, confined to the root.
    fn grab_pointer(&self, root: Window) -> Result<()>;
    fn ungrab_pointer(&self) -> Result<()>;

    /// Replay the frozen press to the original client.
    fn replay_pointer(&self, time: Timestamp) -> Result<()>;
    /// Resume frozen pointer event processing, keeping the press.
    fn sync_pointer(&self, time: Timestamp) -> Result<()>;

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()>;
    fn map_window(&self, window: Window) -> Result<()>;
    fn unmap_window(&self, window: Window) -> Result<()>;
    fn destroy_window(&self, window: Window) -> Result<()>;
    fn raise_window(&self, window: Window) -> Result<()>;
    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()>;
    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<()>;
    fn set_border_pixel(&self, window: Window, pixel: u32) -> Result<()>;

    /// Redirect keyboard input to a window.
    fn focus_input(&self, window: Window) -> Result<()>;

    /// Stamp `_NET_WM_DESKTOP` on a newly managed window.
    fn stamp_desktop(&self, window: Window) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

/// Atoms interned once at startup.
#[derive(Debug)]
pub struct Atoms {
    pub _wm_protocols: Atom,
    pub _wm_delete_window: Atom,
    pub net_wm_desktop: Atom,
}

impl Atoms {
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            _wm_protocols: intern("WM_PROTOCOLS")?,
            _wm_delete_window: intern("WM_DELETE_WINDOW")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ScreenInfo {
    root: Window,
    root_visual: Visualid,
    root_depth: u8,
}

/// Real display server over one x11rb connection.
pub struct X11DisplayServer {
    conn: Arc<RustConnection>,
    roots: Vec<Window>,
    screens: Vec<ScreenInfo>,
    atoms: Atoms,
}

impl X11DisplayServer {
    /// Connect to the X server and intern the startup atoms.
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);

        let screens: Vec<ScreenInfo> = conn
            .setup()
            .roots
            .iter()
            .map(|s| ScreenInfo {
                root: s.root,
                root_visual: s.root_visual,
                root_depth: s.root_depth,
            })
            .collect();
        let roots = screens.iter().map(|s| s.root).collect();

        info!(
            "Connected to X server: {} screen(s), default screen {}",
            screens.len(),
            screen_num
        );

        let atoms = Atoms::new(conn.as_ref())?;

        Ok(Self {
            conn,
            roots,
            screens,
            atoms,
        })
    }

    /// Shared handle for the event source.
    pub fn connection(&self) -> Arc<RustConnection> {
        self.conn.clone()
    }
}

/// Map a reply to the §7 taxonomy: an X error on the query target means the
/// window no longer exists; only connection failures propagate.
fn tolerate<T>(reply: Result<T, ReplyError>) -> Result<Option<T>> {
    match reply {
        Ok(value) => Ok(Some(value)),
        Err(ReplyError::X11Error(_)) => Ok(None),
        Err(ReplyError::ConnectionError(e)) => Err(e.into()),
    }
}

impl DisplayServer for X11DisplayServer {
    fn roots(&self) -> &[Window] {
        &self.roots
    }

    fn acquire_redirect(&self, root: Window) -> Result<()> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY;

        self.conn
            .change_window_attributes(
                root,
                &ChangeWindowAttributesAux::new().event_mask(mask),
            )?
            .check()
            .map_err(|_| CoreError::Acquisition(root))?;
        self.conn.flush()?;
        Ok(())
    }

    fn query_tree(&self, window: Window) -> Result<Option<Vec<Window>>> {
        let reply = tolerate(self.conn.query_tree(window)?.reply())?;
        Ok(reply.map(|r| r.children))
    }

    fn parent_of(&self, window: Window) -> Result<Option<Window>> {
        let reply = tolerate(self.conn.query_tree(window)?.reply())?;
        Ok(reply.map(|r| r.parent))
    }

    fn geometry(&self, window: Window) -> Result<Option<Geometry>> {
        let reply = tolerate(self.conn.get_geometry(window)?.reply())?;
        Ok(reply.map(|r| Geometry {
            x: r.x as i32,
            y: r.y as i32,
            width: r.width as u32,
            height: r.height as u32,
        }))
    }

    fn attributes(&self, window: Window) -> Result<Option<WindowAttrs>> {
        let reply = tolerate(self.conn.get_window_attributes(window)?.reply())?;
        Ok(reply.map(|r| WindowAttrs {
            override_redirect: r.override_redirect,
            viewable: r.map_state == MapState::VIEWABLE,
        }))
    }

    fn pointer_position(&self, root: Window) -> Result<Option<(i32, i32)>> {
        let reply = tolerate(self.conn.query_pointer(root)?.reply())?;
        Ok(reply.map(|r| (r.root_x as i32, r.root_y as i32)))
    }

    fn create_container(
        &self,
        screen: usize,
        geom: Geometry,
        border_width: u16,
    ) -> Result<Window> {
        let info = self
            .screens
            .get(screen)
            .copied()
            .context("unknown screen index")?;

        let container = self.conn.generate_id()?;
        self.conn.create_window(
            info.root_depth,
            container,
            info.root,
            geom.x as i16,
            geom.y as i16,
            geom.width as u16,
            geom.height as u16,
            border_width,
            WindowClass::INPUT_OUTPUT,
            info.root_visual,
            &CreateWindowAux::new().override_redirect(1).event_mask(
                EventMask::SUBSTRUCTURE_REDIRECT
                    | EventMask::STRUCTURE_NOTIFY
                    | EventMask::SUBSTRUCTURE_NOTIFY,
            ),
        )?;
        Ok(container)
    }

    fn grab_drag_buttons(&self, window: Window) -> Result<()> {
        for button in [ButtonIndex::M1, ButtonIndex::M3] {
            self.conn.grab_button(
                false,
                window,
                EventMask::BUTTON_PRESS,
                GrabMode::SYNC,
                GrabMode::SYNC,
                x11rb::NONE,
                x11rb::NONE,
                button,
                ModMask::ANY,
            )?;
        }
        Ok(())
    }

    fn grab_pointer(&self, root: Window) -> Result<()> {
        self.conn.grab_pointer(
            false,
            root,
            EventMask::BUTTON_RELEASE
                | EventMask::BUTTON_MOTION
                | EventMask::POINTER_MOTION_HINT,
            GrabMode::ASYNC,
            GrabMode::ASYNC,
            root,
            x11rb::NONE,
            x11rb::CURRENT_TIME,
        )?;
        Ok(())
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn replay_pointer(&self, time: Timestamp) -> Result<()> {
        self.conn.allow_events(Allow::REPLAY_POINTER, time)?;
        Ok(())
    }

    fn sync_pointer(&self, time: Timestamp) -> Result<()> {
        self.conn.allow_events(Allow::SYNC_POINTER, time)?;
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.conn
            .reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().width(width).height(height),
        )?;
        Ok(())
    }

    fn set_border_pixel(&self, window: Window, pixel: u32) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().border_pixel(pixel),
        )?;
        Ok(())
    }

    fn focus_input(&self, window: Window) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn stamp_desktop(&self, window: Window) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[0],
        )?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}
