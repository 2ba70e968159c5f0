//! Client and screen records.

use x11rb::protocol::xproto::Window;

use crate::wm::pointer::PointerSession;

/// Stable handle for a managed client. Handles are never reused, so a stale
/// one held across a detach simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u64);

/// One managed top-level window.
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    /// Index of the owning screen; a client never migrates between screens.
    pub screen: usize,
    /// The application's original window.
    pub window: Window,
    /// Index of the decoration policy assigned at attach time, immutable
    /// thereafter. Index 0 is always the null policy.
    pub decor: usize,
}

/// Per-root-window state.
#[derive(Debug)]
pub struct Screen {
    pub root: Window,
    /// Managed clients in attach order.
    pub clients: Vec<ClientId>,
    /// Decoration policies probed at attach time, first match wins.
    pub probe: Vec<usize>,
    /// At most one focused client.
    pub focus: Option<ClientId>,
    /// At most one interactive pointer session.
    pub pointer: Option<PointerSession>,
}

impl Screen {
    pub fn new(root: Window) -> Self {
        Self {
            root,
            clients: Vec::new(),
            probe: Vec::new(),
            focus: None,
            pointer: None,
        }
    }
}
