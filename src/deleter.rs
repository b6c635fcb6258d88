// Destruction capabilities for ExclusiveHandle
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

/// Releases a resource when its owning handle lets go of it.
///
/// A handle calls `delete` at most once per owned pointer and never with
/// the empty sentinel. Implementations must not panic: a panic here while
/// the handle is being dropped during unwinding aborts the process.
pub trait Deleter<T: ?Sized> {
    fn delete(&mut self, raw: NonNull<T>);
}

/// Frees a pointer that came from `Box::into_raw`.
///
/// Also covers slices and trait objects, so `ExclusiveHandle<[T]>` frees
/// the whole array in one go.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    fn delete(&mut self, raw: NonNull<T>) {
        // Safety: handles built with DefaultDelete only ever own Box allocations.
        unsafe { drop(Box::from_raw(raw.as_ptr())) }
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    fn delete(&mut self, raw: NonNull<T>) {
        self(raw)
    }
}

/// Frees like `DefaultDelete` and records how many times it ran.
///
/// Clones share the same counter, so a test can keep one clone and hand
/// the other to a handle.
#[derive(Debug, Default, Clone)]
pub struct CountingDeleter {
    calls: Rc<Cell<usize>>,
}

impl CountingDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl<T: ?Sized> Deleter<T> for CountingDeleter {
    fn delete(&mut self, raw: NonNull<T>) {
        self.calls.set(self.calls.get() + 1);
        DefaultDelete.delete(raw);
    }
}
