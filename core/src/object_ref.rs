//! Weak object references for log entries
//!
//! Entries may mention caller-owned objects without keeping them alive. Each
//! reference lives in an [`ObjectRefCell`] that also remembers the object's
//! type name, so an expired reference still renders as `null (TypeName)`.
//!
//! Cells are recycled through a per-thread [`ObjectRefPool`] so that the hot
//! logging path does not allocate a new wrapper for every object argument.

use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

/// Idle cells kept per thread before surplus cells are dropped
pub const OBJECT_REF_POOL_DEPTH: usize = 16;

/// An object that can be referenced from a log entry
///
/// The default implementations render the full type path, which log lines
/// shorten to `[TypeName]`. Objects following the `"<name> (TypeName)"`
/// convention are shortened to `[TypeName: name]`.
pub trait LogObject: Send + Sync + 'static {
    /// Text shown for this object in a log line
    fn log_text(&self) -> String {
        self.log_type_name().to_string()
    }

    /// Full type path, captured when a reference to the object is taken
    fn log_type_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Last path segment of a type name, keeping generic arguments
///
/// `game::world::Player` becomes `Player`, `alloc::vec::Vec<u8>` becomes `Vec<u8>`.
pub fn short_type_name(full: &str) -> &str {
    let base_len = full.find('<').unwrap_or(full.len());
    match full[..base_len].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Pooled wrapper holding a weak handle plus the cached type name
#[derive(Debug, Default)]
pub struct ObjectRefCell {
    target: Option<Weak<dyn LogObject>>,
    type_name: Option<&'static str>,
}

impl ObjectRefCell {
    fn reset(&mut self) {
        self.target = None;
        self.type_name = None;
    }
}

/// Weak reference to a [`LogObject`], backed by a pooled cell
///
/// Each `WeakRef` owns its cell. Cloning acquires a second cell from the
/// pool rather than sharing, so returning one clone's cell never affects
/// another holder. Dropping a `WeakRef` returns its cell to the pool of the
/// dropping thread.
pub struct WeakRef {
    // Only `None` while the cell is being handed back in `drop`
    cell: Option<Box<ObjectRefCell>>,
}

impl WeakRef {
    /// The referenced object, if it is still alive
    pub fn upgrade(&self) -> Option<Arc<dyn LogObject>> {
        self.cell.as_ref()?.target.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the referenced object is still alive
    pub fn is_alive(&self) -> bool {
        self.cell
            .as_ref()
            .and_then(|cell| cell.target.as_ref())
            .is_some_and(|target| target.strong_count() > 0)
    }

    /// Full type name captured when the reference was taken
    pub fn type_name(&self) -> Option<&'static str> {
        self.cell.as_ref().and_then(|cell| cell.type_name)
    }

    /// Address of the backing cell, for pool bookkeeping checks
    pub fn cell_ptr(&self) -> *const ObjectRefCell {
        self.cell
            .as_deref()
            .map_or(std::ptr::null(), |cell| cell as *const ObjectRefCell)
    }
}

impl Clone for WeakRef {
    fn clone(&self) -> Self {
        match &self.cell {
            Some(cell) => ObjectRefPool::acquire_parts(cell.target.clone(), cell.type_name),
            None => ObjectRefPool::acquire_parts(None, None),
        }
    }
}

impl Drop for WeakRef {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            ObjectRefPool::give_back(cell);
        }
    }
}

impl fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("type_name", &self.type_name())
            .field("alive", &self.is_alive())
            .finish()
    }
}

thread_local! {
    static POOL: RefCell<Vec<Box<ObjectRefCell>>> =
        RefCell::new(Vec::with_capacity(OBJECT_REF_POOL_DEPTH));
}

/// Per-thread pool of [`ObjectRefCell`]s
///
/// Each thread has its own bounded free list; nothing is shared between
/// threads. When the list is empty a fresh cell is allocated, and cells
/// returned to a full list are dropped.
pub struct ObjectRefPool;

impl ObjectRefPool {
    /// Take a cell referencing `object` (or nothing, for `None`)
    pub fn acquire(object: Option<&Arc<dyn LogObject>>) -> WeakRef {
        match object {
            Some(object) => {
                Self::acquire_parts(Some(Arc::downgrade(object)), Some(object.log_type_name()))
            }
            None => Self::acquire_parts(None, None),
        }
    }

    /// Hand a cell back to this thread's pool
    ///
    /// Same as dropping the reference. The target and cached type are
    /// cleared before the cell becomes available again.
    pub fn release(weak: WeakRef) {
        drop(weak);
    }

    /// Number of idle cells in this thread's pool
    pub fn available() -> usize {
        POOL.try_with(|pool| pool.borrow().len()).unwrap_or(0)
    }

    fn acquire_parts(
        target: Option<Weak<dyn LogObject>>,
        type_name: Option<&'static str>,
    ) -> WeakRef {
        let pooled = POOL
            .try_with(|pool| pool.try_borrow_mut().ok().and_then(|mut pool| pool.pop()))
            .ok()
            .flatten();
        let mut cell = pooled.unwrap_or_default();
        cell.target = target;
        cell.type_name = type_name;
        WeakRef { cell: Some(cell) }
    }

    fn give_back(mut cell: Box<ObjectRefCell>) {
        cell.reset();
        // Thread-local storage may already be gone during thread teardown.
        let _ = POOL.try_with(|pool| {
            if let Ok(mut pool) = pool.try_borrow_mut() {
                if pool.len() < OBJECT_REF_POOL_DEPTH {
                    pool.push(cell);
                }
            }
        });
    }
}
