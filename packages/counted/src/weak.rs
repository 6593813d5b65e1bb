use std::fmt;
use std::mem;
use std::ptr::NonNull;

use crate::Shared;
use crate::block::{self, Parts};

/// A weak observer of a value owned by [`Shared`] handles.
///
/// An observer tracks the value's lifecycle without extending it: the value dies
/// with its last strong handle no matter how many observers remain. What observers
/// do keep alive is the shared bookkeeping, which is freed only once the last
/// handle of either kind is gone.
///
/// The observer's view of the value is bookkeeping only and can never be accessed
/// directly; [`upgrade()`](Self::upgrade) is the only way to reach the value, and
/// it fails once the value is gone.
///
/// # Example
///
/// ```rust
/// use counted::Shared;
///
/// let shared = Shared::new("observed".to_string());
/// let weak = shared.downgrade();
///
/// assert_eq!(*weak.upgrade().unwrap(), "observed");
///
/// drop(shared);
/// assert!(weak.expired());
/// assert!(weak.upgrade().is_none());
/// ```
///
/// # Thread safety
///
/// Single-threaded, like [`Shared`]: neither [`Send`] nor [`Sync`].
pub struct Weak<T: ?Sized> {
    inner: Option<Parts<T>>,
}

impl<T: ?Sized> Weak<T> {
    /// Creates an empty observer that watches nothing and is already expired.
    ///
    /// This is also what [`Shared::downgrade()`] returns for an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Whether this observer watches nothing.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the observed value has already been destroyed.
    ///
    /// Empty observers are expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.inner.is_none_or(|parts| {
            // SAFETY: This observer's weak reference keeps the block alive.
            unsafe { parts.block.as_ref() }.is_expired()
        })
    }

    /// Attempts to upgrade to a strong handle keeping the value alive.
    ///
    /// Returns `None` once the value has been destroyed. The liveness check and
    /// the registration of the new strong handle are one uninterrupted sequence,
    /// which is correct under this crate's single-threaded model; nothing can
    /// release the value in between.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let shared = Shared::new(3_u32);
    /// let weak = shared.downgrade();
    ///
    /// let upgraded = weak.upgrade().unwrap();
    /// assert_eq!(shared.strong_count(), 2);
    /// assert_eq!(*upgraded, 3);
    /// ```
    #[must_use]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let parts = self.inner?;

        // SAFETY: This observer's weak reference keeps the block alive.
        let header = unsafe { parts.block.as_ref() };

        if header.is_expired() {
            return None;
        }

        // SAFETY: The block is alive and the object was verified alive in this
        // same uninterrupted sequence.
        Some(unsafe { Shared::from_parts(parts) })
    }

    /// The number of strong handles keeping the observed value alive, or 0 once
    /// the value is gone (and for empty observers).
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner.map_or(0, |parts| {
            // SAFETY: This observer's weak reference keeps the block alive.
            unsafe { parts.block.as_ref() }.strong_count()
        })
    }

    /// The number of weak observers of the value, including this one, or 0 for an
    /// empty observer.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.inner.map_or(0, |parts| {
            // SAFETY: This observer's weak reference keeps the block alive.
            unsafe { parts.block.as_ref() }.weak_count()
        })
    }

    /// Moves the complete state out of this observer, leaving it empty.
    ///
    /// The returned observer holds the prior state; no counts change.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            inner: self.inner.take(),
        }
    }

    /// Converts this observer into one watching the same value through a different
    /// type.
    ///
    /// The conversion runs on raw pointers because the value may already be dead;
    /// no counts change. An empty observer converts to an empty observer.
    ///
    /// # Safety
    ///
    /// `cast_fn` must return a pointer to the same object (or a subobject of it)
    /// without dereferencing its argument; the pointee may no longer be alive.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Display;
    /// use std::ptr::NonNull;
    ///
    /// use counted::{Shared, Weak};
    ///
    /// let shared = Shared::new("observed".to_string());
    /// let weak = shared.downgrade();
    ///
    /// // SAFETY: A raw unsizing cast of the same pointer; nothing is dereferenced.
    /// let displayed: Weak<dyn Display> = unsafe {
    ///     Weak::cast(weak, |ptr| {
    ///         NonNull::new(ptr.as_ptr() as *mut dyn Display).unwrap()
    ///     })
    /// };
    ///
    /// assert_eq!(displayed.upgrade().unwrap().to_string(), "observed");
    /// ```
    #[must_use]
    pub unsafe fn cast<U: ?Sized, F>(this: Self, cast_fn: F) -> Weak<U>
    where
        F: FnOnce(NonNull<T>) -> NonNull<U>,
    {
        let Some(parts) = this.inner else {
            return Weak { inner: None };
        };

        let value = cast_fn(parts.value);
        let block = parts.block;

        // The weak reference transfers to the new observer; no count change.
        mem::forget(this);

        Weak {
            inner: Some(Parts { value, block }),
        }
    }

    /// Builds an observer over an existing block, registering the new reference.
    ///
    /// # Safety
    ///
    /// `parts.block` must point to a live block; the caller must hold a reference
    /// of either kind to it for the duration of this call.
    pub(crate) unsafe fn from_parts(parts: Parts<T>) -> Self {
        // SAFETY: The caller guarantees the block is live.
        unsafe { parts.block.as_ref() }.acquire_weak();

        Self { inner: Some(parts) }
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        match self.inner {
            None => Self { inner: None },
            // SAFETY: This observer's weak reference keeps the block alive.
            Some(parts) => unsafe { Self::from_parts(parts) },
        }
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    fn drop(&mut self) {
        if let Some(parts) = self.inner.take() {
            // SAFETY: This observer's weak reference is consumed exactly once, here.
            unsafe { block::release_weak(parts.block) };
        }
    }
}

impl<T: ?Sized> Default for Weak<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    #[cfg_attr(test, mutants::skip)] // Cosmetic output only; no test asserts its exact form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::ptr::NonNull;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::testing::{CountingAllocator, DropTracker};

    assert_not_impl_any!(Weak<u32>: Send, Sync);
    assert_impl_all!(Weak<u32>: std::fmt::Debug, Default);

    #[test]
    fn observer_does_not_keep_value_alive() {
        let (tracker, drops) = DropTracker::new();

        let shared = Shared::new(tracker);
        let weak = shared.downgrade();

        assert!(!weak.expired());
        assert_eq!(weak.strong_count(), 1);

        drop(shared);

        assert_eq!(drops.get(), 1);
        assert!(weak.expired());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn upgrade_registers_a_new_owner() {
        let shared = Shared::new("alive".to_string());
        let weak = shared.downgrade();

        let upgraded = weak.upgrade().unwrap();

        assert_eq!(shared.strong_count(), 2);
        assert!(shared.ptr_eq(&upgraded));
        assert_eq!(*upgraded, "alive");
    }

    #[test]
    fn observer_from_empty_handle_is_expired() {
        let empty = Shared::<u32>::empty();
        let weak = empty.downgrade();

        assert!(weak.is_empty());
        assert!(weak.expired());
        assert!(weak.upgrade().is_none());
        assert_eq!(weak.strong_count(), 0);
        assert_eq!(weak.weak_count(), 0);
    }

    #[test]
    fn deleter_fires_despite_outstanding_observers() {
        let released = std::rc::Rc::new(std::cell::Cell::new(0_u32));

        let target = NonNull::from(Box::leak(Box::new(1_u8)));
        let released_by_deleter = std::rc::Rc::clone(&released);
        let deleter = move |ptr: NonNull<u8>| {
            released_by_deleter.set(released_by_deleter.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let shared = unsafe { Shared::adopt_with(target, deleter) };

        let observers: Vec<_> = (0..3).map(|_| shared.downgrade()).collect();
        assert_eq!(shared.weak_count(), 3);

        drop(shared);

        assert_eq!(released.get(), 1, "deleter fires at the last owner's release");
        assert!(observers.iter().all(Weak::expired));

        drop(observers);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn storage_freed_once_when_owners_release_first() {
        let allocator = CountingAllocator::new();

        let shared = Shared::new_in(7_u32, allocator.clone());
        let weak = shared.downgrade();

        drop(shared);
        assert_eq!(allocator.freed(), 0);

        drop(weak);
        assert_eq!(allocator.freed(), 1);
        assert_eq!(allocator.allocated(), 1);
    }

    #[test]
    fn storage_freed_once_when_observers_release_first() {
        let allocator = CountingAllocator::new();

        let shared = Shared::new_in(7_u32, allocator.clone());
        let weak = shared.downgrade();

        drop(weak);
        assert_eq!(allocator.freed(), 0);

        drop(shared);
        assert_eq!(allocator.freed(), 1);
        assert_eq!(allocator.allocated(), 1);
    }

    #[test]
    fn cloned_observers_count_independently() {
        let shared = Shared::new(0_u8);
        let first = shared.downgrade();
        let second = first.clone();

        assert_eq!(shared.weak_count(), 2);
        assert_eq!(second.weak_count(), 2);

        drop(first);
        assert_eq!(shared.weak_count(), 1);

        drop(second);
        assert_eq!(shared.weak_count(), 0);
    }

    #[test]
    fn take_moves_the_observation() {
        let shared = Shared::new(1_u32);
        let mut source = shared.downgrade();

        let destination = source.take();

        assert!(source.is_empty());
        assert!(source.expired());
        assert_eq!(shared.weak_count(), 1);
        assert!(!destination.expired());
    }

    #[test]
    fn cast_preserves_the_observation() {
        let shared = Shared::new("polymorphic".to_string());
        let weak = shared.downgrade();

        let displayed: Weak<dyn std::fmt::Display> = unsafe {
            Weak::cast(weak, |ptr| {
                NonNull::new(ptr.as_ptr() as *mut dyn std::fmt::Display).unwrap()
            })
        };

        assert_eq!(shared.weak_count(), 1);
        assert_eq!(displayed.upgrade().unwrap().to_string(), "polymorphic");

        drop(shared);
        assert!(displayed.expired());
    }

    #[test]
    fn expired_observer_can_be_cloned_safely() {
        let shared = Shared::new(5_u32);
        let weak = shared.downgrade();
        drop(shared);

        let clone = weak.clone();
        assert!(clone.expired());
        assert_eq!(clone.weak_count(), 2);
    }
}
