// Finding the first pointer that points at nothing
use std::ptr::NonNull;

use crate::deleter::Deleter;
use crate::handle::ExclusiveHandle;

/// Anything pointer-like that can hold nothing.
pub trait Vacant {
    fn is_vacant(&self) -> bool;
}

impl<T: ?Sized, D: Deleter<T>> Vacant for ExclusiveHandle<T, D> {
    fn is_vacant(&self) -> bool {
        !ExclusiveHandle::is_owning(self)
    }
}

/// Covers `Option<Box<T>>`, `Option<Rc<T>>`, `Option<NonNull<T>>` and
/// friends: `None` is the empty pointer.
impl<P> Vacant for Option<P> {
    fn is_vacant(&self) -> bool {
        self.is_none()
    }
}

impl<T: ?Sized> Vacant for *const T {
    fn is_vacant(&self) -> bool {
        self.is_null()
    }
}

impl<T: ?Sized> Vacant for *mut T {
    fn is_vacant(&self) -> bool {
        self.is_null()
    }
}

impl<P: Vacant + ?Sized> Vacant for &P {
    fn is_vacant(&self) -> bool {
        (**self).is_vacant()
    }
}

/// Position of the first vacant pointer, or `None` when every pointer owns
/// something.
pub fn find_empty<I>(pointers: I) -> Option<usize>
where
    I: IntoIterator,
    I::Item: Vacant,
{
    pointers.into_iter().position(|p| p.is_vacant())
}

/// Same search over raw slots, for symmetry with the owning forms.
pub fn find_null<T>(pointers: &[Option<NonNull<T>>]) -> Option<usize> {
    find_empty(pointers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;
    use std::rc::Rc;

    #[test]
    fn test_finds_first_empty_handle() {
        let handles = vec![
            ExclusiveHandle::new(10),
            ExclusiveHandle::empty(),
            ExclusiveHandle::new(20),
        ];
        assert_eq!(find_empty(&handles), Some(1));
    }

    #[test]
    fn test_finds_first_none_box() {
        let boxes = vec![Some(Box::new(9)), Some(Box::new(10)), None, Some(Box::new(20)), None];
        assert_eq!(find_empty(&boxes), Some(2));
    }

    #[test]
    fn test_finds_first_none_rc_in_array() {
        let shared = [Some(Rc::new(10)), None, Some(Rc::new(3))];
        assert_eq!(find_empty(&shared), Some(1));
        assert_eq!(find_empty(shared), Some(1));
    }

    #[test]
    fn test_raw_pointers() {
        let x = 10;
        let raw: [*const i32; 3] = [&x, &x, ptr::null()];
        assert_eq!(find_empty(raw), Some(2));

        let slots = [NonNull::new(&x as *const i32 as *mut i32), None];
        assert_eq!(find_null(&slots), Some(1));
    }

    #[test]
    fn test_none_found() {
        let shared = [Some(Rc::new(10)), Some(Rc::new(5)), Some(Rc::new(3))];
        assert_eq!(find_empty(&shared), None);

        let handles: Vec<ExclusiveHandle<i32>> = Vec::new();
        assert_eq!(find_empty(&handles), None);
    }
}
