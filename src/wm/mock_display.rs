//! Mock display server for tests.
//!
//! Records every verb the core issues and answers queries from scripted
//! window state, so the runtime can be driven end to end with synthetic
//! identifiers and hand-built events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use anyhow::Result;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT, ButtonPressEvent, DESTROY_NOTIFY_EVENT,
    DestroyNotifyEvent, KeyButMask, MAP_NOTIFY_EVENT, MAP_REQUEST_EVENT, MOTION_NOTIFY_EVENT,
    MapNotifyEvent, MapRequestEvent, Motion, MotionNotifyEvent, REPARENT_NOTIFY_EVENT,
    ReparentNotifyEvent, Timestamp, UNMAP_NOTIFY_EVENT, UnmapNotifyEvent, Window,
};

use crate::wm::display::{DisplayServer, Geometry, WindowAttrs};

/// Hand-built server notifications for driving the dispatcher in tests.
pub mod synthetic {
    use super::*;

    pub fn map_request(window: Window) -> Event {
        Event::MapRequest(MapRequestEvent {
            response_type: MAP_REQUEST_EVENT,
            sequence: 0,
            parent: 0,
            window,
        })
    }

    pub fn map_notify(window: Window) -> Event {
        Event::MapNotify(MapNotifyEvent {
            response_type: MAP_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            override_redirect: false,
        })
    }

    pub fn unmap_notify(window: Window) -> Event {
        Event::UnmapNotify(UnmapNotifyEvent {
            response_type: UNMAP_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            from_configure: false,
        })
    }

    pub fn destroy_notify(window: Window) -> Event {
        Event::DestroyNotify(DestroyNotifyEvent {
            response_type: DESTROY_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
        })
    }

    pub fn reparent_notify(event: Window, window: Window, parent: Window) -> Event {
        Event::ReparentNotify(ReparentNotifyEvent {
            response_type: REPARENT_NOTIFY_EVENT,
            sequence: 0,
            event,
            window,
            parent,
            x: 0,
            y: 0,
            override_redirect: false,
        })
    }

    pub fn button_press(
        window: Window,
        root: Window,
        detail: u8,
        state: KeyButMask,
        root_x: i16,
        root_y: i16,
    ) -> Event {
        Event::ButtonPress(ButtonPressEvent {
            response_type: BUTTON_PRESS_EVENT,
            detail,
            sequence: 0,
            time: 1,
            root,
            event: window,
            child: 0,
            root_x,
            root_y,
            event_x: 0,
            event_y: 0,
            state,
            same_screen: true,
        })
    }

    pub fn button_release(root: Window) -> Event {
        Event::ButtonRelease(ButtonPressEvent {
            response_type: BUTTON_RELEASE_EVENT,
            detail: 1,
            sequence: 0,
            time: 2,
            root,
            event: root,
            child: 0,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::from(0u16),
            same_screen: true,
        })
    }

    pub fn motion_notify(root: Window) -> Event {
        Event::MotionNotify(MotionNotifyEvent {
            response_type: MOTION_NOTIFY_EVENT,
            detail: Motion::NORMAL,
            sequence: 0,
            time: 1,
            root,
            event: root,
            child: 0,
            root_x: 0,
            root_y: 0,
            event_x: 0,
            event_y: 0,
            state: KeyButMask::from(0u16),
            same_screen: true,
        })
    }
}

/// One recorded display-server call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    AcquireRedirect(Window),
    CreateContainer(Window),
    GrabButtons(Window),
    GrabPointer(Window),
    UngrabPointer,
    ReplayPointer,
    SyncPointer,
    Reparent {
        window: Window,
        parent: Window,
        x: i32,
        y: i32,
    },
    Map(Window),
    Unmap(Window),
    Destroy(Window),
    Raise(Window),
    Move {
        window: Window,
        x: i32,
        y: i32,
    },
    Resize {
        window: Window,
        width: u32,
        height: u32,
    },
    Border {
        window: Window,
        pixel: u32,
    },
    FocusInput(Window),
    StampDesktop(Window),
    Flush,
}

pub struct MockDisplayServer {
    roots: Vec<Window>,
    /// Windows in creation order; children are derived from `parents`.
    windows: RefCell<Vec<Window>>,
    parents: RefCell<HashMap<Window, Window>>,
    geometries: RefCell<HashMap<Window, Geometry>>,
    attributes: RefCell<HashMap<Window, WindowAttrs>>,
    pointer: Cell<(i32, i32)>,
    next_id: Cell<Window>,
    ops: RefCell<Vec<MockOp>>,
}

impl MockDisplayServer {
    pub fn with_root(root: Window) -> Self {
        Self {
            roots: vec![root],
            windows: RefCell::new(Vec::new()),
            parents: RefCell::new(HashMap::new()),
            geometries: RefCell::new(HashMap::new()),
            attributes: RefCell::new(HashMap::new()),
            pointer: Cell::new((0, 0)),
            next_id: Cell::new(0x0080_0000),
            ops: RefCell::new(Vec::new()),
        }
    }

    /// Seed a synthetic window.
    pub fn add_window(&self, window: Window, parent: Window, geom: Geometry, attrs: WindowAttrs) {
        self.windows.borrow_mut().push(window);
        self.parents.borrow_mut().insert(window, parent);
        self.geometries.borrow_mut().insert(window, geom);
        self.attributes.borrow_mut().insert(window, attrs);
    }

    /// Make every later query for this window answer "no such window".
    pub fn forget_window(&self, window: Window) {
        self.windows.borrow_mut().retain(|w| *w != window);
        self.parents.borrow_mut().remove(&window);
        self.geometries.borrow_mut().remove(&window);
        self.attributes.borrow_mut().remove(&window);
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.pointer.set((x, y));
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn count_ops(&self, pred: impl Fn(&MockOp) -> bool) -> usize {
        self.ops.borrow().iter().filter(|op| pred(op)).count()
    }

    /// The container created most recently.
    pub fn last_container(&self) -> Option<Window> {
        self.ops
            .borrow()
            .iter()
            .rev()
            .find_map(|op| match op {
                MockOp::CreateContainer(w) => Some(*w),
                _ => None,
            })
    }

    fn record(&self, op: MockOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl DisplayServer for MockDisplayServer {
    fn roots(&self) -> &[Window] {
        &self.roots
    }

    fn acquire_redirect(&self, root: Window) -> Result<()> {
        self.record(MockOp::AcquireRedirect(root));
        Ok(())
    }

    fn query_tree(&self, window: Window) -> Result<Option<Vec<Window>>> {
        let parents = self.parents.borrow();
        let children = self
            .windows
            .borrow()
            .iter()
            .filter(|w| parents.get(w) == Some(&window))
            .copied()
            .collect();
        Ok(Some(children))
    }

    fn parent_of(&self, window: Window) -> Result<Option<Window>> {
        Ok(self.parents.borrow().get(&window).copied())
    }

    fn geometry(&self, window: Window) -> Result<Option<Geometry>> {
        Ok(self.geometries.borrow().get(&window).copied())
    }

    fn attributes(&self, window: Window) -> Result<Option<WindowAttrs>> {
        Ok(self.attributes.borrow().get(&window).copied())
    }

    fn pointer_position(&self, _root: Window) -> Result<Option<(i32, i32)>> {
        Ok(Some(self.pointer.get()))
    }

    fn create_container(
        &self,
        screen: usize,
        geom: Geometry,
        _border_width: u16,
    ) -> Result<Window> {
        let container = self.next_id.get();
        self.next_id.set(container + 1);

        self.add_window(
            container,
            self.roots[screen],
            geom,
            WindowAttrs {
                override_redirect: true,
                viewable: false,
            },
        );
        self.record(MockOp::CreateContainer(container));
        Ok(container)
    }

    fn grab_drag_buttons(&self, window: Window) -> Result<()> {
        self.record(MockOp::GrabButtons(window));
        Ok(())
    }

    fn grab_pointer(&self, root: Window) -> Result<()> {
        self.record(MockOp::GrabPointer(root));
        Ok(())
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.record(MockOp::UngrabPointer);
        Ok(())
    }

    fn replay_pointer(&self, _time: Timestamp) -> Result<()> {
        self.record(MockOp::ReplayPointer);
        Ok(())
    }

    fn sync_pointer(&self, _time: Timestamp) -> Result<()> {
        self.record(MockOp::SyncPointer);
        Ok(())
    }

    fn reparent(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.parents.borrow_mut().insert(window, parent);
        self.record(MockOp::Reparent {
            window,
            parent,
            x,
            y,
        });
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.record(MockOp::Map(window));
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.record(MockOp::Unmap(window));
        Ok(())
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.forget_window(window);
        self.record(MockOp::Destroy(window));
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<()> {
        self.record(MockOp::Raise(window));
        Ok(())
    }

    fn move_window(&self, window: Window, x: i32, y: i32) -> Result<()> {
        if let Some(geom) = self.geometries.borrow_mut().get_mut(&window) {
            geom.x = x;
            geom.y = y;
        }
        self.record(MockOp::Move { window, x, y });
        Ok(())
    }

    fn resize_window(&self, window: Window, width: u32, height: u32) -> Result<()> {
        if let Some(geom) = self.geometries.borrow_mut().get_mut(&window) {
            geom.width = width;
            geom.height = height;
        }
        self.record(MockOp::Resize {
            window,
            width,
            height,
        });
        Ok(())
    }

    fn set_border_pixel(&self, window: Window, pixel: u32) -> Result<()> {
        self.record(MockOp::Border { window, pixel });
        Ok(())
    }

    fn focus_input(&self, window: Window) -> Result<()> {
        self.record(MockOp::FocusInput(window));
        Ok(())
    }

    fn stamp_desktop(&self, window: Window) -> Result<()> {
        self.record(MockOp::StampDesktop(window));
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.record(MockOp::Flush);
        Ok(())
    }
}
