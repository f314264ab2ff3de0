//! X11 backend
//!
//! Watches `_NET_ACTIVE_WINDOW` on the root window via PropertyNotify events
//! and reads EWMH properties for the focused window. Runs blocking on the
//! window event thread.

use anyhow::{Context as _, Result};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ConnectionExt, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;

use super::{WindowDescription, WindowSource};

x11rb::atom_manager! {
    Atoms: AtomsCookie {
        _NET_ACTIVE_WINDOW,
        _NET_WM_NAME,
        UTF8_STRING,
    }
}

pub struct X11 {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

impl X11 {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to the X11 display")?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms::new(&conn)
            .context("Failed to request X11 atoms")?
            .reply()
            .context("Failed to intern X11 atoms")?;
        Ok(Self { conn, root, atoms })
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let reply = self
            .conn
            .get_property(
                false,
                self.root,
                self.atoms._NET_ACTIVE_WINDOW,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .context("Failed to query _NET_ACTIVE_WINDOW")?
            .reply()
            .context("Failed to read _NET_ACTIVE_WINDOW")?;
        Ok(reply
            .value32()
            .and_then(|mut values| values.next())
            .filter(|&window| window != 0))
    }

    /// WM_CLASS holds two NUL-terminated strings; the second one is the
    /// class.
    fn window_class(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)
            .ok()?
            .reply()
            .ok()?;
        let mut parts = reply.value.split(|&b| b == 0).filter(|p| !p.is_empty());
        let _instance = parts.next();
        parts.next().map(|p| String::from_utf8_lossy(p).into_owned())
    }

    fn window_title(&self, window: Window) -> Option<String> {
        let reply = self
            .conn
            .get_property(
                false,
                window,
                self.atoms._NET_WM_NAME,
                self.atoms.UTF8_STRING,
                0,
                u32::MAX,
            )
            .ok()?
            .reply()
            .ok()?;
        if !reply.value.is_empty() {
            return Some(String::from_utf8_lossy(&reply.value).into_owned());
        }

        // Fallback to the legacy WM_NAME property
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, u32::MAX)
            .ok()?
            .reply()
            .ok()?;
        if reply.value.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&reply.value).into_owned())
        }
    }

    fn describe(&self, window: Window) -> WindowDescription {
        let class = self.window_class(window).unwrap_or_default();
        let title = self.window_title(window).unwrap_or_default();
        WindowDescription::from_parts(&class, &title)
    }
}

impl WindowSource for X11 {
    fn current_window(&mut self) -> Result<WindowDescription> {
        Ok(match self.active_window()? {
            Some(window) => self.describe(window),
            None => WindowDescription::default(),
        })
    }

    fn watch(&mut self, notify: &mut dyn FnMut(WindowDescription)) -> Result<()> {
        let attrs = ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE);
        self.conn
            .change_window_attributes(self.root, &attrs)
            .context("Failed to subscribe to root window property changes")?;
        self.conn.flush().context("Failed to flush X11 connection")?;

        // The root window fires PropertyNotify for many properties; only
        // react to active-window changes, and only when the id changed.
        let mut last_window: Option<Window> = None;
        loop {
            let event = self
                .conn
                .wait_for_event()
                .context("X11 connection lost")?;
            let Event::PropertyNotify(e) = event else {
                continue;
            };
            if e.atom != self.atoms._NET_ACTIVE_WINDOW {
                continue;
            }
            let Some(window) = self.active_window()? else {
                continue;
            };
            if last_window == Some(window) {
                continue;
            }
            last_window = Some(window);
            notify(self.describe(window));
        }
    }
}
