use crate::foundation::error::{CaptureError, CaptureResult};
use crate::session::capture::CaptureSession;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Shared ownership handle for a session. The scene that creates a session owns it.
pub type SessionHandle = Rc<RefCell<CaptureSession>>;

/// Wrap a session in a [`SessionHandle`].
pub fn into_handle(session: CaptureSession) -> SessionHandle {
    Rc::new(RefCell::new(session))
}

/// Named lookup table of capture sessions.
///
/// The registry only holds weak references: destroying a session's owner tears the session
/// down, and the stale entry reads as missing until it is pruned. `names` and `sessions` always
/// hold the same keys; `names` keeps registration order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Weak<RefCell<CaptureSession>>>,
    names: Vec<String>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `session` under `name`. Names of live sessions cannot be reused.
    pub fn register(&mut self, name: impl Into<String>, session: &SessionHandle) -> CaptureResult<()> {
        let name = name.into();
        self.prune();
        if self.sessions.contains_key(&name) {
            return Err(CaptureError::validation(format!(
                "capture '{name}' is already registered"
            )));
        }
        self.sessions.insert(name.clone(), Rc::downgrade(session));
        self.names.push(name);
        Ok(())
    }

    /// Remove `name`. Returns `false` when it was not registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        if self.sessions.remove(name).is_none() {
            return false;
        }
        self.names.retain(|n| n != name);
        true
    }

    /// Drop entries whose sessions no longer exist.
    pub fn prune(&mut self) {
        let dead: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, w)| w.strong_count() == 0)
            .map(|(k, _)| k.clone())
            .collect();
        for name in dead {
            self.unregister(&name);
        }
    }

    /// Live session registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<SessionHandle> {
        self.sessions.get(name).and_then(Weak::upgrade)
    }

    fn lookup_or_report(&self, name: &str) -> CaptureResult<SessionHandle> {
        self.lookup(name).ok_or_else(|| {
            tracing::error!("capture {name} not found or disabled");
            CaptureError::not_found(name)
        })
    }

    /// Request capture on one session.
    pub fn open_by_id(&self, name: &str) -> CaptureResult<()> {
        let session = self.lookup_or_report(name)?;
        let mut session = session
            .try_borrow_mut()
            .map_err(|_| CaptureError::validation(format!("capture '{name}' is busy")))?;
        session.open()
    }

    /// Stop capture on one session.
    pub fn close_by_id(&self, name: &str) -> CaptureResult<()> {
        let session = self.lookup_or_report(name)?;
        let mut session = session
            .try_borrow_mut()
            .map_err(|_| CaptureError::validation(format!("capture '{name}' is busy")))?;
        session.close();
        Ok(())
    }

    /// At least one registered session is capturing. Computed on every call.
    pub fn is_capturing(&self) -> bool {
        self.live().any(|s| s.try_borrow().is_ok_and(|s| s.is_capturing()))
    }

    /// Open every session, unless something is already capturing.
    ///
    /// Returns how many sessions accepted the request.
    pub fn open_all(&self) -> usize {
        if self.is_capturing() {
            tracing::debug!("open_all ignored: a capture is already running");
            return 0;
        }
        self.for_each_in_order(|name, s| match s.open() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session = %name, "open_all: {e}");
                false
            }
        })
    }

    /// Close every session, unless nothing is capturing.
    ///
    /// Returns how many sessions were capturing before the call.
    pub fn close_all(&self) -> usize {
        if !self.is_capturing() {
            tracing::debug!("close_all ignored: nothing is capturing");
            return 0;
        }
        self.for_each_in_order(|_, s| {
            let was_capturing = s.is_capturing();
            s.close();
            was_capturing
        })
    }

    /// Registered names in registration order.
    pub fn list_names(&self) -> &[String] {
        &self.names
    }

    /// Log every registered name.
    pub fn print_names(&self) {
        for name in &self.names {
            tracing::info!("{name}");
        }
    }

    /// Number of registered names, stale ones included until pruned.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// No names are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn live(&self) -> impl Iterator<Item = SessionHandle> + '_ {
        self.names.iter().filter_map(|n| self.lookup(n))
    }

    fn for_each_in_order(&self, mut f: impl FnMut(&str, &mut CaptureSession) -> bool) -> usize {
        let mut hits = 0;
        for name in &self.names {
            let Some(handle) = self.lookup(name) else {
                continue;
            };
            let Ok(mut session) = handle.try_borrow_mut() else {
                tracing::warn!(session = %name, "skipped: session is busy");
                continue;
            };
            if f(name, &mut session) {
                hits += 1;
            }
        }
        hits
    }
}
