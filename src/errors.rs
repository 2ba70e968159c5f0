//! Typed faults surfaced by the window manager core.

use thiserror::Error;
use x11rb::protocol::xproto::Window;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A pointer session is already attached to the screen. The active
    /// session is left untouched.
    #[error("a pointer session is already active on this screen")]
    PointerBusy,

    /// Substructure redirect on a root window was denied, meaning another
    /// window manager owns the screen. Fatal before any state is built.
    #[error("substructure redirect denied on root 0x{0:x} (another window manager running?)")]
    Acquisition(Window),
}
