//! Window registry
//!
//! Maps every server-issued window identifier the manager cares about to a
//! role and an owner back-reference. Absence of an entry means the window is
//! untracked; [`Registry::touch`] is the only allocation point.

use std::collections::HashMap;

use x11rb::protocol::xproto::Window;

use crate::wm::client::ClientId;

/// What a tracked window is to the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    /// Seen but not yet classified.
    Unclassified,
    /// A root window of one of the screens.
    ScreenRoot,
    /// An original client window, or a container wrapping one.
    ManagedClient,
    /// A window the manager released voluntarily; later destroy/reparent
    /// notifications for it are absorbed silently.
    IgnoredClient,
}

/// Owner back-reference, resolved through the role tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    None,
    Screen(usize),
    Client(ClientId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub role: WindowRole,
    pub owner: Owner,
}

/// Identifier -> entry map. Constructor-injected into the runtime so the
/// core stays testable with synthetic identifiers; single-threaded access
/// only, no locking.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<Window, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry without mutating anything.
    pub fn find(&self, window: Window) -> Option<&Entry> {
        self.entries.get(&window)
    }

    pub fn find_mut(&mut self, window: Window) -> Option<&mut Entry> {
        self.entries.get_mut(&window)
    }

    /// Return the existing entry, or insert and return a fresh
    /// [`WindowRole::Unclassified`] one. Never fails.
    pub fn touch(&mut self, window: Window) -> &mut Entry {
        self.entries.entry(window).or_insert(Entry {
            role: WindowRole::Unclassified,
            owner: Owner::None,
        })
    }

    /// Remove and return the entry, or `None` if the identifier was
    /// untracked. Erasing an absent key is a no-op.
    pub fn erase(&mut self, window: Window) -> Option<Entry> {
        self.entries.remove(&window)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_allocates_unclassified() {
        let mut registry = Registry::new();
        assert!(registry.find(42).is_none());

        let entry = registry.touch(42);
        assert_eq!(entry.role, WindowRole::Unclassified);
        assert_eq!(entry.owner, Owner::None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_returns_last_written_state() {
        let mut registry = Registry::new();
        {
            let entry = registry.touch(7);
            entry.role = WindowRole::ScreenRoot;
            entry.owner = Owner::Screen(0);
        }

        // A second touch must return the same entry, not reset it.
        let entry = registry.touch(7);
        assert_eq!(entry.role, WindowRole::ScreenRoot);

        let entry = registry.find(7).unwrap();
        assert_eq!(entry.owner, Owner::Screen(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_erase_removes_exactly_once() {
        let mut registry = Registry::new();
        registry.touch(9).role = WindowRole::ManagedClient;

        let erased = registry.erase(9);
        assert_eq!(erased.map(|e| e.role), Some(WindowRole::ManagedClient));
        assert!(registry.find(9).is_none());
        assert_eq!(registry.len(), 0);

        // Erase on an absent key reports "not found".
        assert!(registry.erase(9).is_none());
    }

    #[test]
    fn test_identifiers_are_independent() {
        let mut registry = Registry::new();
        registry.touch(1).role = WindowRole::ScreenRoot;
        registry.touch(2).role = WindowRole::ManagedClient;

        registry.erase(1);
        assert!(registry.find(1).is_none());
        assert_eq!(registry.find(2).unwrap().role, WindowRole::ManagedClient);
    }
}
