//! Interactive pointer session
//!
//! A short-lived, per-screen exclusive state machine for mouse-driven move
//! and resize. The session is entered from a decoration's button-press
//! verdict, fed by motion events while the pointer grab is held, and exits
//! on button release or when the dragged client is detached.

use crate::errors::CoreError;
use crate::wm::client::{ClientId, Screen};

/// What the active drag does with pointer motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMode {
    Moving,
    Resizing,
}

/// An active drag. `grip_x`/`grip_y` are the offsets captured at press time
/// between the container's geometry and the pointer's root position, so that
/// `grip + pointer` yields the next position (Moving) or size (Resizing).
#[derive(Debug, Clone, Copy)]
pub struct PointerSession {
    pub client: ClientId,
    pub mode: PointerMode,
    pub grip_x: i32,
    pub grip_y: i32,
}

/// A decoration's request to enter a drag, produced by its button-press
/// handler and applied by the runtime.
#[derive(Debug, Clone, Copy)]
pub struct DragSpec {
    pub mode: PointerMode,
    pub grip_x: i32,
    pub grip_y: i32,
}

impl Screen {
    /// Attach a pointer session. Fails outright if one is already active,
    /// leaving the active session untouched.
    pub fn attach_pointer(&mut self, session: PointerSession) -> Result<(), CoreError> {
        if self.pointer.is_some() {
            return Err(CoreError::PointerBusy);
        }
        self.pointer = Some(session);
        Ok(())
    }

    /// Detach and return the active session, if any.
    pub fn detach_pointer(&mut self) -> Option<PointerSession> {
        self.pointer.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(client: u64, mode: PointerMode) -> PointerSession {
        PointerSession {
            client: ClientId(client),
            mode,
            grip_x: -20,
            grip_y: -10,
        }
    }

    #[test]
    fn test_second_attach_fails_and_preserves_first() {
        let mut screen = Screen::new(1);
        screen
            .attach_pointer(session(1, PointerMode::Moving))
            .unwrap();

        let err = screen.attach_pointer(session(2, PointerMode::Resizing));
        assert!(matches!(err, Err(CoreError::PointerBusy)));

        let active = screen.pointer.unwrap();
        assert_eq!(active.client, ClientId(1));
        assert_eq!(active.mode, PointerMode::Moving);
    }

    #[test]
    fn test_detach_frees_the_slot() {
        let mut screen = Screen::new(1);
        screen
            .attach_pointer(session(1, PointerMode::Moving))
            .unwrap();

        assert!(screen.detach_pointer().is_some());
        assert!(screen.pointer.is_none());
        assert!(screen.detach_pointer().is_none());

        // A fresh attach succeeds once the slot is free again.
        screen
            .attach_pointer(session(2, PointerMode::Resizing))
            .unwrap();
    }
}
