//! Tock specific `MapCell` type for sharing references.

use core::cell::{Cell, UnsafeCell};
use core::mem::MaybeUninit;
use core::ptr;

/// A mutable memory location that enforces borrow rules at runtime without
/// possible panics.
///
/// A `MapCell` is a potential reference to mutable memory. Borrow rules are
/// enforced by forcing clients to either move the memory out of the cell or
/// operate on a borrow within a closure. You can think of a `MapCell` as an
/// `Option` wrapped in a `RefCell`: attempts to take the value from inside a
/// `MapCell` may fail by returning `None`.
pub struct MapCell<T> {
    // Initialized exactly when `occupied` is true, except while a `map`
    // closure is borrowing it.
    val: UnsafeCell<MaybeUninit<T>>,
    occupied: Cell<bool>,
}

impl<T> MapCell<T> {
    pub const fn empty() -> MapCell<T> {
        MapCell {
            val: UnsafeCell::new(MaybeUninit::uninit()),
            occupied: Cell::new(false),
        }
    }

    /// Creates a new `MapCell` containing `value`
    pub const fn new(value: T) -> MapCell<T> {
        MapCell {
            val: UnsafeCell::new(MaybeUninit::new(value)),
            occupied: Cell::new(true),
        }
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    pub fn is_some(&self) -> bool {
        self.occupied.get()
    }

    /// Takes the value out of the `MapCell` leaving it empty. If
    /// the value has already been taken elsewhere (and not `replace`ed), the
    /// returned `Option` will be `None`.
    pub fn take(&self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            self.occupied.set(false);
            // SAFETY: the cell was occupied, so the value is initialized, and
            // clearing `occupied` first keeps it from being read twice.
            Some(unsafe { (*self.val.get()).assume_init_read() })
        }
    }

    /// Store `val`, dropping whatever the cell held before.
    pub fn put(&self, val: T) {
        drop(self.replace(val));
    }

    /// Replaces the contents of the `MapCell` with `val`. If the cell was not
    /// empty, the previous value is returned, otherwise `None` is returned.
    pub fn replace(&self, val: T) -> Option<T> {
        let previous = self.take();
        // SAFETY: the cell is empty after `take`, so nothing is overwritten
        // without being dropped.
        unsafe {
            ptr::write(self.val.get(), MaybeUninit::new(val));
        }
        self.occupied.set(true);
        previous
    }

    /// Allows `closure` to borrow the contents of the `MapCell` if-and-only-if
    /// it is not `take`n already. The state of the `MapCell` is unchanged
    /// after the closure completes.
    pub fn map<F, R>(&self, closure: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        if self.is_some() {
            self.occupied.set(false);
            // SAFETY: the value is initialized, and with `occupied` cleared
            // no other caller can reach it while the closure runs.
            let valref = unsafe { (*self.val.get()).assume_init_mut() };
            let res = closure(valref);
            self.occupied.set(true);
            Some(res)
        } else {
            None
        }
    }

    pub fn map_or<F, R>(&self, default: R, closure: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.map(closure).unwrap_or(default)
    }
}

impl<T> Drop for MapCell<T> {
    fn drop(&mut self) {
        if self.occupied.get() {
            // SAFETY: occupied means initialized, and the cell is never used
            // again.
            unsafe { self.val.get_mut().assume_init_drop() }
        }
    }
}
