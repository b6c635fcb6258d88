// Exclusive ownership of a heap resource
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::rc::Rc;

use tracing::trace;

use crate::deleter::{DefaultDelete, Deleter};
use crate::error::{self, HandleError};

/// An owning pointer: exactly one live handle refers to a resource, and the
/// resource is destroyed through `D` when that handle lets go of it.
///
/// The handle is either `Empty` or `Owning`. Ownership moves with the value,
/// so a plain `let b = a;` is the transfer.
///
/// Like `Box` and `Rc`, everything except `new` is an associated function
/// (`ExclusiveHandle::release(&mut h)`), so the methods of the owned value
/// reached through `Deref` are never shadowed:
///
/// ```
/// use ownership_lessons::ExclusiveHandle;
///
/// let mut s = ExclusiveHandle::new(String::from("ipad"));
/// s.clear();
/// s.push('x');
/// assert!(ExclusiveHandle::is_owning(&s));
/// assert_eq!(s.as_str(), "x");
/// ```
///
/// Duplicating a handle is rejected by the compiler:
///
/// ```compile_fail
/// use ownership_lessons::ExclusiveHandle;
///
/// fn assert_clone<C: Clone>() {}
/// assert_clone::<ExclusiveHandle<i32>>();
/// ```
///
/// and so is touching the source after a transfer:
///
/// ```compile_fail
/// use ownership_lessons::ExclusiveHandle;
///
/// let a = ExclusiveHandle::new(42);
/// let b = a;
/// assert!(ExclusiveHandle::is_owning(&a));
/// ```
///
/// `take` is the explicit transfer-out for when the source must stay usable:
///
/// ```
/// use ownership_lessons::ExclusiveHandle;
///
/// let mut a = ExclusiveHandle::new(String::from("ipad"));
/// let b = ExclusiveHandle::take(&mut a);
/// assert!(!ExclusiveHandle::is_owning(&a));
/// assert_eq!(b.as_str(), "ipad");
/// ```
pub struct ExclusiveHandle<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    raw: Option<NonNull<T>>,
    deleter: D,
    _owns: PhantomData<T>,
}

impl<T: ?Sized, D: Deleter<T> + Default> ExclusiveHandle<T, D> {
    /// A handle that owns nothing.
    pub fn empty() -> Self {
        Self::with_deleter(D::default())
    }

    /// Takes ownership of `raw` unconditionally, including `None`.
    ///
    /// # Safety
    ///
    /// `raw` must be valid for `D` to destroy, and the caller must neither
    /// keep using it nor destroy it independently afterwards.
    pub unsafe fn from_raw(raw: Option<NonNull<T>>) -> Self {
        // Safety: forwarded to the caller.
        unsafe { Self::from_raw_with_deleter(raw, D::default()) }
    }
}

impl<T: ?Sized, D: Deleter<T>> ExclusiveHandle<T, D> {
    /// An empty handle that will use `deleter` for whatever it later owns.
    pub fn with_deleter(deleter: D) -> Self {
        ExclusiveHandle {
            raw: None,
            deleter,
            _owns: PhantomData,
        }
    }

    /// Like [`from_raw`](Self::from_raw) with an explicit deleter.
    ///
    /// # Safety
    ///
    /// Same contract as `from_raw`: `raw` must be destroyable by `deleter`
    /// and owned by nobody else from now on.
    pub unsafe fn from_raw_with_deleter(raw: Option<NonNull<T>>, deleter: D) -> Self {
        trace!(ptr = ?raw, "handle bound");
        ExclusiveHandle {
            raw,
            deleter,
            _owns: PhantomData,
        }
    }

    pub fn is_owning(this: &Self) -> bool {
        this.raw.is_some()
    }

    /// The held pointer, ownership stays with the handle.
    pub fn get(this: &Self) -> Option<NonNull<T>> {
        this.raw
    }

    pub fn as_ref(this: &Self) -> Option<&T> {
        // Safety: an owned pointer stays valid until the handle gives it up.
        this.raw.map(|raw| unsafe { &*raw.as_ptr() })
    }

    pub fn as_mut(this: &mut Self) -> Option<&mut T> {
        // Safety: &mut Self guarantees nobody else borrows the resource.
        this.raw.map(|raw| unsafe { &mut *raw.as_ptr() })
    }

    /// Checked dereference.
    pub fn try_deref(this: &Self) -> error::Result<&T> {
        Self::as_ref(this).ok_or(HandleError::Empty)
    }

    pub fn try_deref_mut(this: &mut Self) -> error::Result<&mut T> {
        Self::as_mut(this).ok_or(HandleError::Empty)
    }

    pub fn deleter(this: &Self) -> &D {
        &this.deleter
    }

    pub fn deleter_mut(this: &mut Self) -> &mut D {
        &mut this.deleter
    }

    /// Hands the pointer to the caller without destroying it.
    ///
    /// The handle is empty afterwards and the caller is now responsible
    /// for the resource.
    #[must_use = "the released pointer is leaked unless the caller frees it"]
    pub fn release(this: &mut Self) -> Option<NonNull<T>> {
        let raw = this.raw.take();
        trace!(ptr = ?raw, "handle released");
        raw
    }

    /// Consuming form of [`release`](Self::release).
    #[must_use = "the released pointer is leaked unless the caller frees it"]
    pub fn into_raw(mut this: Self) -> Option<NonNull<T>> {
        Self::release(&mut this)
    }

    /// Destroys the current resource, if any, then owns `raw`.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw) for `raw`. It must not
    /// be the pointer this handle already owns.
    pub unsafe fn reset(this: &mut Self, raw: Option<NonNull<T>>) {
        Self::destroy(this);
        trace!(ptr = ?raw, "handle rebound");
        this.raw = raw;
    }

    /// Reset to empty.
    pub fn reset_empty(this: &mut Self) {
        Self::destroy(this);
    }

    /// Move assignment: destroys what `this` holds, then takes over the
    /// resource and deleter of `source`.
    ///
    /// Assigning a handle to itself goes through `take`:
    /// `ExclusiveHandle::assign(&mut h, ExclusiveHandle::take(&mut h))`
    /// leaves `h` owning the same resource.
    pub fn assign(this: &mut Self, mut source: Self) {
        Self::destroy(this);
        this.raw = source.raw.take();
        mem::swap(&mut this.deleter, &mut source.deleter);
        trace!(ptr = ?this.raw, "handle assigned");
    }

    /// Swaps resources and deleters.
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(&mut this.raw, &mut other.raw);
        mem::swap(&mut this.deleter, &mut other.deleter);
    }

    fn destroy(this: &mut Self) {
        if let Some(raw) = this.raw.take() {
            trace!(ptr = ?raw, "handle destroying resource");
            this.deleter.delete(raw);
        }
    }
}

impl<T: ?Sized, D: Deleter<T> + Clone> ExclusiveHandle<T, D> {
    /// Transfer-out: moves the resource into a new handle and leaves `this`
    /// empty. The new handle gets a copy of the deleter.
    pub fn take(this: &mut Self) -> Self {
        let raw = this.raw.take();
        trace!(ptr = ?raw, "handle transferred");
        ExclusiveHandle {
            raw,
            deleter: this.deleter.clone(),
            _owns: PhantomData,
        }
    }

    /// Transfer assignment from a handle that must stay usable.
    ///
    /// `source` ends up empty. Passing `this` as `source` is impossible
    /// because both are exclusive borrows.
    pub fn transfer_from(this: &mut Self, source: &mut Self) {
        Self::assign(this, Self::take(source));
    }
}

impl<T> ExclusiveHandle<T> {
    /// Allocates `value` on the heap and owns it.
    pub fn new(value: T) -> Self {
        Self::from(Box::new(value))
    }
}

impl<T: ?Sized> ExclusiveHandle<T> {
    /// Destroys the current resource and owns `value` instead.
    pub fn replace(this: &mut Self, value: Box<T>) {
        Self::destroy(this);
        this.raw = Some(NonNull::from(Box::leak(value)));
        trace!(ptr = ?this.raw, "handle rebound");
    }

    pub fn into_box(mut this: Self) -> Option<Box<T>> {
        // Safety: handles using DefaultDelete only own Box allocations.
        Self::release(&mut this).map(|raw| unsafe { Box::from_raw(raw.as_ptr()) })
    }

    /// Converts exclusive ownership into shared ownership.
    pub fn into_shared(this: Self) -> Option<Rc<T>> {
        Self::into_box(this).map(Rc::from)
    }
}

impl<T: ?Sized> From<Box<T>> for ExclusiveHandle<T> {
    fn from(value: Box<T>) -> Self {
        let raw = NonNull::from(Box::leak(value));
        // Safety: the pointer comes straight out of a Box we own.
        unsafe { Self::from_raw(Some(raw)) }
    }
}

impl<T: ?Sized> From<ExclusiveHandle<T>> for Option<Box<T>> {
    fn from(handle: ExclusiveHandle<T>) -> Self {
        ExclusiveHandle::into_box(handle)
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for ExclusiveHandle<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for ExclusiveHandle<T, D> {
    type Target = T;

    /// # Panics
    ///
    /// Panics when the handle is empty. Use [`as_ref`](Self::as_ref) or
    /// [`try_deref`](Self::try_deref) when emptiness is expected.
    fn deref(&self) -> &T {
        match Self::as_ref(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty ExclusiveHandle"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for ExclusiveHandle<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        match Self::as_mut(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty ExclusiveHandle"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for ExclusiveHandle<T, D> {
    fn drop(&mut self) {
        Self::destroy(self);
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Debug for ExclusiveHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => write!(f, "Owning({:p})", raw),
            None => f.write_str("Empty"),
        }
    }
}

// Safety: the handle is the only path to the resource, so it is exactly as
// thread-safe as the resource and the deleter themselves.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for ExclusiveHandle<T, D> {}
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for ExclusiveHandle<T, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use super::ExclusiveHandle as Handle;
    use crate::deleter::CountingDeleter;
    use proptest::prelude::*;
    use std::cell::RefCell;

    fn leak<T>(value: T) -> NonNull<T> {
        NonNull::from(Box::leak(Box::new(value)))
    }

    fn counted(value: u32, deleter: &CountingDeleter) -> Handle<u32, CountingDeleter> {
        // Safety: freshly leaked box.
        unsafe { Handle::from_raw_with_deleter(Some(leak(value)), deleter.clone()) }
    }

    #[test]
    fn test_empty_handle() {
        let e: Handle<i32> = Handle::empty();
        assert!(!Handle::is_owning(&e));
        assert!(Handle::get(&e).is_none());
        assert!(Handle::as_ref(&e).is_none());
        assert!(matches!(Handle::try_deref(&e), Err(HandleError::Empty)));
        assert_eq!(format!("{:?}", e), "Empty");
    }

    #[test]
    fn test_from_raw_none_is_empty() {
        let deleter = CountingDeleter::new();
        {
            // Safety: None owns nothing.
            let h: Handle<u32, CountingDeleter> =
                unsafe { Handle::from_raw_with_deleter(None, deleter.clone()) };
            assert!(!Handle::is_owning(&h));
        }
        assert_eq!(deleter.calls(), 0);
    }

    #[test]
    fn test_new_and_deref() {
        let mut h = Handle::new(41);
        assert!(Handle::is_owning(&h));
        *h += 1;
        assert_eq!(*h, 42);
        assert_eq!(Handle::try_deref(&h).ok(), Some(&42));
        assert!(format!("{:?}", h).starts_with("Owning(0x"));
    }

    #[test]
    fn test_try_deref_mut() {
        let mut h = Handle::new(String::from("smart"));
        Handle::try_deref_mut(&mut h).unwrap().push_str("-tv");
        assert_eq!(h.as_str(), "smart-tv");

        Handle::reset_empty(&mut h);
        assert!(matches!(Handle::try_deref_mut(&mut h), Err(HandleError::Empty)));
    }

    #[test]
    #[should_panic(expected = "dereferenced an empty ExclusiveHandle")]
    fn test_deref_empty_panics() {
        let h: Handle<String> = Handle::default();
        let _ = h.len();
    }

    #[test]
    fn test_owned_value_methods_not_shadowed() {
        let mut s = Handle::new(String::from("ipad"));
        s.clear();
        s.push('x');
        assert_eq!(s.as_str(), "x");
        assert!(Handle::is_owning(&s));

        let nothing: Handle<[i32]> = Vec::new().into_boxed_slice().into();
        assert!(nothing.is_empty());
        assert!(Handle::is_owning(&nothing));

        let mut v = Handle::new(vec![1, 2, 3]);
        assert_eq!(v.get(1), Some(&2));
        v.swap(0, 2);
        assert_eq!(v.as_slice(), &[3, 2, 1]);
    }

    // Scenario 1: transfer-construct leaves the source empty.
    #[test]
    fn test_transfer_construct() {
        let deleter = CountingDeleter::new();
        let r1 = leak(1u32);
        // Safety: freshly leaked box.
        let mut a = unsafe { Handle::from_raw_with_deleter(Some(r1), deleter.clone()) };
        assert!(Handle::is_owning(&a));

        let b = Handle::take(&mut a);
        assert!(!Handle::is_owning(&a));
        assert_eq!(Handle::get(&b), Some(r1));

        drop(a);
        assert_eq!(deleter.calls(), 0);
        drop(b);
        assert_eq!(deleter.calls(), 1);
    }

    #[test]
    fn test_native_move_keeps_pointer() {
        let a = Handle::new(String::from("smart-tv"));
        let raw = Handle::get(&a);
        let b = a;
        assert_eq!(Handle::get(&b), raw);
    }

    // Scenario 2: transfer-assign destroys the target's old resource once.
    #[test]
    fn test_transfer_assign() {
        let deleter = CountingDeleter::new();
        let mut b = counted(1, &deleter);
        let r2 = leak(2u32);
        // Safety: freshly leaked box.
        let mut c = unsafe { Handle::from_raw_with_deleter(Some(r2), deleter.clone()) };

        Handle::transfer_from(&mut b, &mut c);
        assert_eq!(deleter.calls(), 1);
        assert_eq!(Handle::get(&b), Some(r2));
        assert!(!Handle::is_owning(&c));

        drop(c);
        assert_eq!(deleter.calls(), 1);
        drop(b);
        assert_eq!(deleter.calls(), 2);
    }

    #[test]
    fn test_assign_moves_deleter() {
        let first = CountingDeleter::new();
        let second = CountingDeleter::new();
        let mut target = counted(1, &first);

        Handle::assign(&mut target, counted(2, &second));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);

        drop(target);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    // Scenario 3: release hands the resource back without destroying it.
    #[test]
    fn test_release() {
        let deleter = CountingDeleter::new();
        let r3 = leak(3u32);
        // Safety: freshly leaked box.
        let mut d = unsafe { Handle::from_raw_with_deleter(Some(r3), deleter.clone()) };

        let released = Handle::release(&mut d);
        assert_eq!(released, Some(r3));
        assert!(!Handle::is_owning(&d));
        drop(d);
        assert_eq!(deleter.calls(), 0);

        // Safety: we own r3 again and it is still alive.
        let value = unsafe { Box::from_raw(r3.as_ptr()) };
        assert_eq!(*value, 3);
    }

    #[test]
    fn test_into_raw() {
        let deleter = CountingDeleter::new();
        let h = counted(8, &deleter);
        let expected = Handle::get(&h);

        let raw = Handle::into_raw(h).unwrap();
        assert_eq!(Some(raw), expected);
        assert_eq!(deleter.calls(), 0);

        // Safety: into_raw handed the box back to us.
        let value = unsafe { Box::from_raw(raw.as_ptr()) };
        assert_eq!(*value, 8);

        let empty: Handle<u32> = Handle::empty();
        assert!(Handle::into_raw(empty).is_none());
    }

    // Scenario 4: reset on an empty handle destroys nothing.
    #[test]
    fn test_reset_empty_handle() {
        let deleter = CountingDeleter::new();
        let mut e = Handle::<u32, _>::with_deleter(deleter.clone());
        assert!(!Handle::is_owning(&e));

        let r4 = leak(4u32);
        // Safety: freshly leaked box.
        unsafe { Handle::reset(&mut e, Some(r4)) };
        assert_eq!(Handle::get(&e), Some(r4));
        assert_eq!(deleter.calls(), 0);
    }

    #[test]
    fn test_reset_rebinds_and_destroys_once() {
        let deleter = CountingDeleter::new();
        let mut h = counted(10, &deleter);
        let fresh = leak(11u32);

        // Safety: freshly leaked box.
        unsafe { Handle::reset(&mut h, Some(fresh)) };
        assert_eq!(deleter.calls(), 1);
        assert_eq!(Handle::get(&h), Some(fresh));
        assert_eq!(*h, 11);

        Handle::reset_empty(&mut h);
        assert_eq!(deleter.calls(), 2);
        assert!(!Handle::is_owning(&h));

        Handle::reset_empty(&mut h);
        assert_eq!(deleter.calls(), 2);
    }

    // Scenario 5: self-transfer-assignment is harmless.
    #[test]
    fn test_self_assign() {
        let deleter = CountingDeleter::new();
        let r5 = leak(5u32);
        // Safety: freshly leaked box.
        let mut f = unsafe { Handle::from_raw_with_deleter(Some(r5), deleter.clone()) };

        let same = Handle::take(&mut f);
        Handle::assign(&mut f, same);

        assert!(Handle::is_owning(&f));
        assert_eq!(Handle::get(&f), Some(r5));
        assert_eq!(deleter.calls(), 0);
    }

    #[test]
    fn test_swap() {
        let mut a = Handle::new(1);
        let mut b = Handle::empty();
        Handle::swap(&mut a, &mut b);
        assert!(!Handle::is_owning(&a));
        assert_eq!(*b, 1);
    }

    #[test]
    fn test_closure_deleter_runs_on_drop() {
        let closed = RefCell::new(Vec::new());
        {
            let closer = |raw: NonNull<&'static str>| {
                // Safety: raw came from leak below.
                let name = unsafe { Box::from_raw(raw.as_ptr()) };
                closed.borrow_mut().push(*name);
            };
            // Safety: freshly leaked box.
            let _guard = unsafe { Handle::from_raw_with_deleter(Some(leak("stream")), closer) };
        }
        assert_eq!(*closed.borrow(), vec!["stream"]);
    }

    #[test]
    fn test_slice_handle_indexing() {
        let mut tab: Handle<[i32]> = vec![0; 1024].into_boxed_slice().into();
        tab[100] = 562;
        tab[101] = 42;
        assert_eq!(tab.len(), 1024);
        assert_eq!(&tab[100..102], &[562, 42]);
    }

    #[test]
    fn test_replace_and_into_box() {
        let mut h = Handle::new(String::from("old"));
        Handle::replace(&mut h, Box::new(String::from("new")));
        assert_eq!(Handle::into_box(h).as_deref().map(String::as_str), Some("new"));
    }

    #[test]
    fn test_into_option_box() {
        let boxed: Option<Box<i32>> = Handle::new(5).into();
        assert_eq!(boxed.as_deref(), Some(&5));

        let nothing: Option<Box<i32>> = Handle::<i32>::empty().into();
        assert!(nothing.is_none());
    }

    #[test]
    fn test_into_shared() {
        let shared = Handle::into_shared(Handle::new(7)).unwrap();
        let other = Rc::clone(&shared);
        assert_eq!(Rc::strong_count(&shared), 2);
        assert_eq!(*other, 7);

        let empty: Handle<i32> = Handle::empty();
        assert!(Handle::into_shared(empty).is_none());
    }

    #[test]
    fn test_trait_object_handle() {
        let doubler: Box<dyn Fn(i32) -> i32> = Box::new(|x: i32| x * 2);
        let h = Handle::from(doubler);
        assert_eq!((*h)(21), 42);
    }

    #[test]
    fn test_handle_is_send_when_contents_are() {
        fn assert_send<S: Send>() {}
        assert_send::<Handle<String>>();
        assert_send::<Handle<[u8]>>();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Alloc(usize),
        Transfer(usize, usize),
        Release(usize),
        Clear(usize),
    }

    fn op_strategy(slots: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..slots).prop_map(Op::Alloc),
            (0..slots, 0..slots).prop_map(|(from, to)| Op::Transfer(from, to)),
            (0..slots).prop_map(Op::Release),
            (0..slots).prop_map(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn test_ownership_sequences(ops in prop::collection::vec(op_strategy(4), 0..64)) {
            let deleter = CountingDeleter::new();
            let mut slots: Vec<_> = (0..4)
                .map(|_| Handle::<u32, _>::with_deleter(deleter.clone()))
                .collect();
            let mut allocated = 0usize;
            let mut released = 0usize;

            for op in ops {
                match op {
                    Op::Alloc(i) => {
                        // Safety: freshly leaked box.
                        unsafe { Handle::reset(&mut slots[i], Some(leak(allocated as u32))) };
                        allocated += 1;
                    }
                    Op::Transfer(from, to) => {
                        let source = Handle::take(&mut slots[from]);
                        let moved = Handle::get(&source);
                        Handle::assign(&mut slots[to], source);
                        prop_assert_eq!(Handle::get(&slots[to]), moved);
                        if from != to {
                            prop_assert!(!Handle::is_owning(&slots[from]));
                        }
                    }
                    Op::Release(i) => {
                        if let Some(raw) = Handle::release(&mut slots[i]) {
                            // Safety: the caller owns the released box.
                            drop(unsafe { Box::from_raw(raw.as_ptr()) });
                            released += 1;
                        }
                        prop_assert!(!Handle::is_owning(&slots[i]));
                    }
                    Op::Clear(i) => Handle::reset_empty(&mut slots[i]),
                }

                let mut owned: Vec<_> = slots.iter().filter_map(Handle::get).collect();
                let before = owned.len();
                owned.sort();
                owned.dedup();
                prop_assert_eq!(owned.len(), before);
            }

            drop(slots);
            prop_assert_eq!(deleter.calls() + released, allocated);
        }
    }
}
