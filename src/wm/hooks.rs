//! Lifecycle hook boundary
//!
//! The embedded configuration/scripting collaborator subscribes to four
//! notification points. Each of the first three may answer with a request to
//! change the client's visibility; the runtime applies the answer through
//! the client's decoration.

use crate::wm::client::Client;

/// Visibility change a hook may request back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    None,
    Map,
    Unmap,
}

pub trait Hooks {
    /// A client record was just created for a newly discovered window.
    fn client_created(&mut self, _client: &Client) -> HookAction {
        HookAction::None
    }

    /// The client's original window became mapped.
    fn client_mapped(&mut self, _client: &Client) -> HookAction {
        HookAction::None
    }

    /// The client's original window became unmapped.
    fn client_unmapped(&mut self, _client: &Client) -> HookAction {
        HookAction::None
    }

    /// The client record is about to be destroyed.
    fn client_closing(&mut self, _client: &Client) {}
}

/// Default wiring: show a client as soon as it is created, hide its
/// container when the application hides the original window.
pub struct DefaultHooks;

impl Hooks for DefaultHooks {
    fn client_created(&mut self, _client: &Client) -> HookAction {
        HookAction::Map
    }

    fn client_unmapped(&mut self, _client: &Client) -> HookAction {
        HookAction::Unmap
    }
}
