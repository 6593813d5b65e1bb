use std::ptr::NonNull;

/// Destroys the object tracked by a control block.
///
/// A deleter is supplied when externally allocated memory is adopted via
/// [`Shared::adopt_with()`][crate::Shared::adopt_with] or
/// [`Shared::adopt_in()`][crate::Shared::adopt_in]. It is invoked exactly once, when
/// the last strong handle releases the object, regardless of how many weak handles
/// remain outstanding.
///
/// Any `FnMut(NonNull<T>)` closure is a deleter, which is the convenient way to
/// supply one:
///
/// ```rust
/// use std::ptr::NonNull;
///
/// use counted::Shared;
///
/// let target = NonNull::from(Box::leak(Box::new(42_u32)));
///
/// let deleter = |ptr: NonNull<u32>| {
///     // SAFETY: The target came from Box::into_raw.
///     drop(unsafe { Box::from_raw(ptr.as_ptr()) });
/// };
///
/// // SAFETY: The pointer came from Box::into_raw and the deleter releases it.
/// let shared = unsafe { Shared::adopt_with(target, deleter) };
///
/// assert_eq!(*shared, 42);
/// ```
pub trait Deleter<T: ?Sized> {
    /// Destroys the tracked object.
    ///
    /// # Safety
    ///
    /// `target` is the pointer this deleter was registered for. It is valid for reads
    /// and writes, and this call transfers ownership of the target to the deleter.
    /// The target must not be accessed by anyone after this call.
    unsafe fn delete(&mut self, target: NonNull<T>);
}

/// The default deleter for adopted pointers: reconstitutes and drops the [`Box`]
/// the target was allocated by.
///
/// Only valid for targets that originate from [`Box::into_raw()`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxDeleter;

impl<T: ?Sized> Deleter<T> for BoxDeleter {
    unsafe fn delete(&mut self, target: NonNull<T>) {
        // SAFETY: This deleter is only ever paired with targets that came from
        // Box::into_raw(), and the caller guarantees this is the single release.
        drop(unsafe { Box::from_raw(target.as_ptr()) });
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    unsafe fn delete(&mut self, target: NonNull<T>) {
        self(target);
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::testing::DropTracker;

    #[test]
    fn box_deleter_drops_boxed_target() {
        let (tracker, drops) = DropTracker::new();
        let target = NonNull::from(Box::leak(Box::new(tracker)));

        let mut deleter = BoxDeleter;
        unsafe { deleter.delete(target) };

        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn closure_deleter_receives_registered_pointer() {
        let seen = Rc::new(Cell::new(None));

        let mut value = 7_u32;
        let target = NonNull::from(&mut value);

        let seen_by_deleter = Rc::clone(&seen);
        let mut deleter = move |ptr: NonNull<u32>| {
            seen_by_deleter.set(Some(ptr));
        };

        unsafe { Deleter::delete(&mut deleter, target) };

        assert_eq!(seen.get(), Some(target));
    }
}
