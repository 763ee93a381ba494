//! Session entry points.
//!
//! Each execution context (thread) owns one `UserVarStore`, reached only
//! through the functions below. The absent marker a host passes for a NULL
//! argument is `None`; an absent argument makes the call a no-op that
//! answers `None` without touching the store.

use crate::config::StoreConfig;
use crate::error::{Result, UserVarError};
use crate::store::UserVarStore;
use std::cell::{Ref, RefCell, RefMut};
use tracing::{debug, trace};

thread_local! {
    static SESSION: RefCell<UserVarStore> = RefCell::new(UserVarStore::new());
}

fn read(cell: &RefCell<UserVarStore>) -> Result<Ref<'_, UserVarStore>> {
    cell.try_borrow().map_err(|_| UserVarError::SessionBusy)
}

fn write(cell: &RefCell<UserVarStore>) -> Result<RefMut<'_, UserVarStore>> {
    cell.try_borrow_mut().map_err(|_| UserVarError::SessionBusy)
}

/// Choose the configuration for this session's store. Only allowed while
/// the store has not been written to.
pub fn configure(config: StoreConfig) -> Result<()> {
    SESSION.with(|cell| {
        let mut store = write(cell)?;
        if store.is_initialized() {
            return Err(UserVarError::AlreadyInitialized);
        }
        *store = UserVarStore::with_config(config);
        Ok(())
    })
}

/// Run `f` against this session's store without mutating it.
///
/// The store stays borrowed while `f` runs: `getvar` still works inside
/// `f`, but `setvar`, `delvar` and `configure` answer
/// `UserVarError::SessionBusy`, and `end_session` panics.
pub fn with_store<R>(f: impl FnOnce(&UserVarStore) -> R) -> Result<R> {
    SESSION.with(|cell| Ok(f(&*read(cell)?)))
}

/// Set `key` to `value`. `None` when either argument is absent.
pub fn setvar(key: Option<&[u8]>, value: Option<&[u8]>) -> Result<Option<bool>> {
    let (Some(key), Some(value)) = (key, value) else {
        trace!("setvar: absent argument");
        return Ok(None);
    };
    SESSION.with(|cell| write(cell)?.set(key, value)).map(Some)
}

/// Copy of the value under `key`. `None` when `key` is absent or unset.
pub fn getvar(key: Option<&[u8]>) -> Result<Option<Vec<u8>>> {
    let Some(key) = key else {
        trace!("getvar: absent argument");
        return Ok(None);
    };
    SESSION.with(|cell| read(cell)?.get(key))
}

/// Delete `key`. `None` when `key` is absent; otherwise the store's
/// missing-key policy decides the answer for unset keys.
pub fn delvar(key: Option<&[u8]>) -> Result<Option<bool>> {
    let Some(key) = key else {
        trace!("delvar: absent argument");
        return Ok(None);
    };
    SESSION.with(|cell| write(cell)?.delete(key)).map(Some)
}

/// Release every entry at session end. The next `setvar` starts a fresh
/// store with the default configuration. Panics if called from inside
/// `with_store`.
pub fn end_session() {
    SESSION.with(|cell| {
        let old = cell.replace(UserVarStore::new());
        debug!(entries = old.len(), "session ended; user variables released");
    });
}
