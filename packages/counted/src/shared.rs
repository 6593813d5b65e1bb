use std::fmt;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::adopted::AdoptedBlock;
use crate::block::{self, Parts};
use crate::inline::InlineBlock;
use crate::{AllocError, Allocator, BoxDeleter, Deleter, Global, Weak};

/// A strong handle that shares ownership of a value.
///
/// The value stays alive for as long as at least one strong handle exists; it is
/// destroyed exactly when the last strong handle is dropped, regardless of any
/// outstanding [`Weak`] observers. The bookkeeping lives in a control block shared
/// by all handles to the same value.
///
/// # Construction paths
///
/// - [`new()`](Self::new) and friends place the value and its bookkeeping in a
///   *single* allocation (one allocation, one deallocation for the pair).
/// - [`adopt()`](Self::adopt) and friends take ownership of externally allocated
///   memory and allocate a stand-alone control block next to it. The adopted
///   target is released through a [`Deleter`], the block through its
///   [`Allocator`]; these are two independent allocations with two independent
///   release recipes.
///
/// # The empty state
///
/// A handle can be empty: it owns nothing and touches no control block. Empty
/// handles come from [`empty()`](Self::empty), [`Default`], [`take()`](Self::take)
/// and [`reset()`](Self::reset). Dereferencing an empty handle is a caller error
/// and panics; use [`get()`](Self::get) to check first.
///
/// # Example
///
/// ```rust
/// use counted::Shared;
///
/// let first = Shared::new("hello".to_string());
/// let second = first.clone();
///
/// assert_eq!(first.strong_count(), 2);
/// assert_eq!(*second, "hello");
///
/// drop(first);
/// assert_eq!(second.strong_count(), 1);
/// ```
///
/// # Thread safety
///
/// The reference counts are plain cells, so handles are single-threaded: neither
/// [`Send`] nor [`Sync`]. A concurrent variant would need atomic counts and a
/// compare-and-increment upgrade; this type does not provide that.
pub struct Shared<T: ?Sized> {
    inner: Option<Parts<T>>,
}

impl<T> Shared<T> {
    /// Creates a new shared handle owning `value`.
    ///
    /// The value and its bookkeeping are placed in a single allocation.
    ///
    /// # Panics
    ///
    /// Panics if memory cannot be allocated. Use [`try_new()`](Self::try_new) to
    /// handle allocation failure instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let shared = Shared::new(42_u32);
    /// assert_eq!(*shared, 42);
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::try_new(value).expect("allocation failed for shared value")
    }

    /// Creates a new shared handle owning `value`, reporting allocation failure.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the combined allocation cannot be provided; the
    /// value is dropped in that case.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_in(value, Global)
    }

    /// Creates a new shared handle owning `value`, with the combined allocation
    /// provided by `allocator`.
    ///
    /// # Panics
    ///
    /// Panics if memory cannot be allocated. Use [`try_new_in()`](Self::try_new_in)
    /// to handle allocation failure instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::{Global, Shared};
    ///
    /// let shared = Shared::new_in("payload", Global);
    /// assert_eq!(*shared, "payload");
    /// ```
    #[must_use]
    pub fn new_in<A>(value: T, allocator: A) -> Self
    where
        A: Allocator + 'static,
    {
        Self::try_new_in(value, allocator).expect("allocation failed for shared value")
    }

    /// Creates a new shared handle owning `value`, with the combined allocation
    /// provided by `allocator`, reporting allocation failure.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the combined allocation cannot be provided; the
    /// value is dropped in that case.
    pub fn try_new_in<A>(value: T, allocator: A) -> Result<Self, AllocError>
    where
        A: Allocator + 'static,
    {
        let (block, value) = InlineBlock::allocate(value, allocator)?;

        Ok(Self {
            inner: Some(Parts { value, block }),
        })
    }

    /// Creates a new shared handle whose value is produced by `make` after the
    /// combined record has been allocated.
    ///
    /// If `make` panics, the allocation is released before the panic propagates:
    /// no memory leaks and no half-constructed handle becomes observable.
    ///
    /// # Panics
    ///
    /// Panics if memory cannot be allocated, or propagates the panic of `make`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let shared = Shared::new_with(|| vec![1, 2, 3]);
    /// assert_eq!(shared.len(), 3);
    /// ```
    #[must_use]
    pub fn new_with(make: impl FnOnce() -> T) -> Self {
        Self::try_new_with_in(make, Global).expect("allocation failed for shared value")
    }

    /// Creates a new shared handle whose value is produced by `make` after the
    /// combined record has been allocated by `allocator`.
    ///
    /// If `make` panics, the allocation is released before the panic propagates.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the combined allocation cannot be provided; `make`
    /// is not called in that case.
    pub fn try_new_with_in<A>(make: impl FnOnce() -> T, allocator: A) -> Result<Self, AllocError>
    where
        A: Allocator + 'static,
    {
        let (block, value) = InlineBlock::allocate_with(make, allocator)?;

        Ok(Self {
            inner: Some(Parts { value, block }),
        })
    }
}

impl<T: ?Sized> Shared<T> {
    /// Adopts an externally allocated target, releasing it with the default
    /// [`BoxDeleter`] once the last strong handle is dropped.
    ///
    /// A stand-alone control block is allocated next to the target.
    ///
    /// # Panics
    ///
    /// Panics if the control block cannot be allocated.
    ///
    /// # Safety
    ///
    /// `target` must have come from [`Box::into_raw()`], and ownership of it
    /// transfers to the returned handle: nothing else may release it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::ptr::NonNull;
    ///
    /// use counted::Shared;
    ///
    /// let target = NonNull::from(Box::leak(Box::new("adopted".to_string())));
    ///
    /// // SAFETY: The pointer came from Box::into_raw and nothing else releases it.
    /// let shared = unsafe { Shared::adopt(target) };
    ///
    /// assert_eq!(*shared, "adopted");
    /// ```
    #[must_use]
    pub unsafe fn adopt(target: NonNull<T>) -> Self {
        // SAFETY: Forwarding the caller's guarantee; BoxDeleter matches the
        // Box::into_raw origin the caller promised.
        unsafe { Self::adopt_with(target, BoxDeleter) }
    }

    /// Adopts an externally allocated target, releasing it with `deleter` once the
    /// last strong handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the control block cannot be allocated.
    ///
    /// # Safety
    ///
    /// Ownership of `target` transfers to the returned handle, and `deleter`
    /// invoked on `target` must be the correct way to release it.
    #[must_use]
    pub unsafe fn adopt_with<D>(target: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { Self::try_adopt_in(target, deleter, Global) }
            .expect("allocation failed for control block")
    }

    /// Adopts an externally allocated target with a caller-supplied deleter and a
    /// caller-supplied allocator for the stand-alone control block.
    ///
    /// # Panics
    ///
    /// Panics if the control block cannot be allocated. Use
    /// [`try_adopt_in()`](Self::try_adopt_in) to handle allocation failure instead.
    ///
    /// # Safety
    ///
    /// Ownership of `target` transfers to the returned handle, and `deleter`
    /// invoked on `target` must be the correct way to release it.
    #[must_use]
    pub unsafe fn adopt_in<D, A>(target: NonNull<T>, deleter: D, allocator: A) -> Self
    where
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { Self::try_adopt_in(target, deleter, allocator) }
            .expect("allocation failed for control block")
    }

    /// Adopts an externally allocated target, reporting allocation failure.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the control block cannot be allocated. The target
    /// is untouched in that case and ownership of it stays with the caller.
    ///
    /// # Safety
    ///
    /// On success, ownership of `target` transfers to the returned handle, and
    /// `deleter` invoked on `target` must be the correct way to release it.
    pub unsafe fn try_adopt_in<D, A>(
        target: NonNull<T>,
        deleter: D,
        allocator: A,
    ) -> Result<Self, AllocError>
    where
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        let block = AdoptedBlock::allocate(target, deleter, allocator)?;

        Ok(Self {
            inner: Some(Parts {
                value: target,
                block,
            }),
        })
    }

    /// Creates an empty handle that owns nothing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let empty = Shared::<String>::empty();
    ///
    /// assert!(empty.is_empty());
    /// assert_eq!(empty.strong_count(), 0);
    /// assert!(empty.get().is_none());
    /// ```
    #[must_use]
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// Whether this handle owns nothing.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// A reference to the owned value, or `None` for an empty handle.
    #[must_use]
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.inner.as_ref().map(|parts| {
            // SAFETY: This handle holds a strong reference, so the object is alive.
            unsafe { parts.value.as_ref() }
        })
    }

    /// A pointer to the owned value, or `None` for an empty handle.
    ///
    /// The pointer stays valid for as long as this handle (or any clone of it)
    /// exists.
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> Option<NonNull<T>> {
        self.inner.map(|parts| parts.value)
    }

    /// Exclusive access to the owned value, available only while this is the single
    /// handle of any kind: exactly one strong handle and no weak observers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let mut shared = Shared::new(1_u32);
    /// *shared.get_mut().unwrap() = 2;
    ///
    /// let other = shared.clone();
    /// assert!(shared.get_mut().is_none());
    ///
    /// drop(other);
    /// assert_eq!(*shared.get_mut().unwrap(), 2);
    /// ```
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let parts = self.inner.as_mut()?;

        // SAFETY: This handle holds a strong reference, so the block is alive.
        let header = unsafe { parts.block.as_ref() };

        if header.strong_count() == 1 && header.weak_count() == 0 {
            // SAFETY: This is the only handle of any kind, so no other reference to
            // the value can exist, and the exclusive borrow of self covers the
            // returned reference.
            Some(unsafe { parts.value.as_mut() })
        } else {
            None
        }
    }

    /// The number of strong handles sharing ownership with this one, or 0 for an
    /// empty handle.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner.map_or(0, |parts| {
            // SAFETY: This handle holds a strong reference, so the block is alive.
            unsafe { parts.block.as_ref() }.strong_count()
        })
    }

    /// The number of weak observers of the owned value, or 0 for an empty handle.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.inner.map_or(0, |parts| {
            // SAFETY: This handle holds a strong reference, so the block is alive.
            unsafe { parts.block.as_ref() }.weak_count()
        })
    }

    /// Whether `self` and `other` share the same control block (and therefore the
    /// same owned value). Empty handles share nothing, so two empty handles do not
    /// compare equal here.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.inner, other.inner) {
            (Some(own), Some(their)) => own.block == their.block,
            _ => false,
        }
    }

    /// Moves the complete state out of this handle, leaving it empty.
    ///
    /// The returned handle holds the prior state; no counts change.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let mut source = Shared::new(7_u32);
    /// let destination = source.take();
    ///
    /// assert!(source.is_empty());
    /// assert_eq!(source.strong_count(), 0);
    /// assert_eq!(*destination, 7);
    /// assert_eq!(destination.strong_count(), 1);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            inner: self.inner.take(),
        }
    }

    /// Releases this handle's reference and leaves the handle empty.
    ///
    /// Equivalent to assigning a fresh empty handle. To replace the contents
    /// instead, assign the replacement directly: the replacement is fully
    /// constructed before the old reference is released.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Creates a weak observer of the owned value.
    ///
    /// The observer does not keep the value alive. Downgrading an empty handle
    /// yields an already-expired observer.
    ///
    /// # Example
    ///
    /// ```rust
    /// use counted::Shared;
    ///
    /// let shared = Shared::new("watched".to_string());
    /// let weak = shared.downgrade();
    ///
    /// assert_eq!(shared.weak_count(), 1);
    /// assert!(!weak.expired());
    /// ```
    #[must_use]
    pub fn downgrade(&self) -> Weak<T> {
        match self.inner {
            None => Weak::new(),
            // SAFETY: This handle's strong reference keeps the block alive.
            Some(parts) => unsafe { Weak::from_parts(parts) },
        }
    }

    /// Converts this handle into one viewing the same owned value through a
    /// different type, such as a trait object or a field of the value.
    ///
    /// The returned handle shares the original control block: the full original
    /// value stays alive for as long as any handle remains, and is released through
    /// the recipe recorded at construction, not through the converted view. No
    /// counts change; cloning first yields the copying conversion.
    ///
    /// An empty handle converts to an empty handle.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::fmt::Display;
    ///
    /// use counted::Shared;
    ///
    /// let concrete = Shared::new("polymorphic".to_string());
    /// let displayed: Shared<dyn Display> =
    ///     Shared::cast(concrete.clone(), |value| value as &dyn Display);
    ///
    /// assert_eq!(concrete.strong_count(), 2);
    /// assert_eq!(displayed.to_string(), "polymorphic");
    /// ```
    #[must_use]
    pub fn cast<U: ?Sized, F>(this: Self, cast_fn: F) -> Shared<U>
    where
        F: FnOnce(&T) -> &U,
    {
        let Some(parts) = this.inner else {
            return Shared { inner: None };
        };

        // SAFETY: `this` holds a strong reference, so the object is alive.
        let value = NonNull::from(cast_fn(unsafe { parts.value.as_ref() }));
        let block = parts.block;

        // The strong reference transfers to the new handle; no count change.
        mem::forget(this);

        Shared {
            inner: Some(Parts { value, block }),
        }
    }

    /// Builds a strong handle over an existing block, registering the new
    /// reference.
    ///
    /// This is the only way to materialize a strong handle without allocating a
    /// block; it exists for the weak upgrade path.
    ///
    /// # Safety
    ///
    /// `parts.block` must point to a live block whose object has not been released,
    /// verified in the same uninterrupted sequence as this call.
    pub(crate) unsafe fn from_parts(parts: Parts<T>) -> Self {
        // SAFETY: The caller guarantees the block is live with the object alive.
        unsafe { parts.block.as_ref() }.acquire_strong();

        Self { inner: Some(parts) }
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        match self.inner {
            None => Self { inner: None },
            // SAFETY: This handle's strong reference keeps the object alive.
            Some(parts) => unsafe { Self::from_parts(parts) },
        }
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(parts) = self.inner.take() {
            // SAFETY: This handle's strong reference is consumed exactly once, here.
            unsafe { block::release_strong(parts.block) };
        }
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// Provides direct access to the owned value.
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty. Dereferencing an empty handle is a caller
    /// error; use [`get()`](Shared::get) to check first.
    #[inline]
    fn deref(&self) -> &Self::Target {
        self.get().expect("dereferenced an empty handle")
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<Box<T>> for Shared<T> {
    /// Adopts a boxed value, releasing it by reconstituting the box.
    fn from(value: Box<T>) -> Self {
        let target = NonNull::from(Box::leak(value));

        // SAFETY: The pointer came straight out of the box and the default deleter
        // reconstitutes exactly that box.
        unsafe { Self::adopt(target) }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("Shared").field(&value).finish(),
            None => f.write_str("Shared(<empty>)"),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::testing::{CountingAllocator, DropTracker};

    assert_not_impl_any!(Shared<u32>: Send, Sync);
    assert_impl_all!(Shared<u32>: std::fmt::Debug, Default);

    #[test]
    fn clone_increments_count() {
        let original = Shared::new(10_u32);
        assert_eq!(original.strong_count(), 1);

        let copies: Vec<_> = (0..4).map(|_| original.clone()).collect();
        assert_eq!(original.strong_count(), 5);

        drop(copies);
        assert_eq!(original.strong_count(), 1);
    }

    #[test]
    fn value_destroyed_exactly_once() {
        let (tracker, drops) = DropTracker::new();

        let original = Shared::new(tracker);
        let copy = original.clone();

        drop(original);
        assert_eq!(drops.get(), 0);

        drop(copy);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn empty_handle_owns_nothing() {
        let empty = Shared::<String>::default();

        assert!(empty.is_empty());
        assert_eq!(empty.strong_count(), 0);
        assert_eq!(empty.weak_count(), 0);
        assert!(empty.get().is_none());
        assert!(empty.ptr().is_none());
    }

    #[test]
    #[should_panic]
    fn deref_on_empty_panics() {
        let empty = Shared::<u32>::empty();
        let _value = *empty;
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source = Shared::new("moved".to_string());
        let weak = source.downgrade();

        let destination = source.take();

        assert!(source.is_empty());
        assert_eq!(source.strong_count(), 0);
        assert!(source.get().is_none());

        assert_eq!(*destination, "moved");
        assert_eq!(destination.strong_count(), 1);
        assert_eq!(destination.weak_count(), 1);
        assert!(!weak.expired());
    }

    #[test]
    fn reset_releases_this_reference_only() {
        let (tracker, drops) = DropTracker::new();

        let mut first = Shared::new(tracker);
        let second = first.clone();

        first.reset();
        assert!(first.is_empty());
        assert_eq!(drops.get(), 0);
        assert_eq!(second.strong_count(), 1);

        drop(second);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_on_empty_is_a_no_op() {
        let mut empty = Shared::<u32>::empty();
        empty.reset();
        assert!(empty.is_empty());
    }

    #[test]
    fn colocated_construction_is_one_allocation() {
        let allocator = CountingAllocator::new();

        let shared = Shared::new_in("dense".to_string(), allocator.clone());
        assert_eq!(allocator.allocated(), 1);
        assert_eq!(allocator.freed(), 0);

        drop(shared);
        assert_eq!(allocator.allocated(), 1);
        assert_eq!(allocator.freed(), 1);
    }

    #[test]
    fn adoption_allocates_block_separately_from_target() {
        let allocator = CountingAllocator::new();
        let (tracker, drops) = DropTracker::new();

        // The target is one allocation event (the box); the block is another,
        // through the explicit allocator.
        let target = NonNull::from(Box::leak(Box::new(tracker)));
        let shared =
            unsafe { Shared::adopt_in(target, crate::BoxDeleter, allocator.clone()) };

        assert_eq!(allocator.allocated(), 1);
        assert_eq!(drops.get(), 0);

        drop(shared);
        assert_eq!(drops.get(), 1);
        assert_eq!(allocator.freed(), 1);
    }

    #[test]
    fn adopted_closure_deleter_receives_target() {
        let released = std::rc::Rc::new(std::cell::Cell::new(0_u32));

        let target = NonNull::from(Box::leak(Box::new(5_u8)));

        let released_by_deleter = std::rc::Rc::clone(&released);
        let deleter = move |ptr: NonNull<u8>| {
            released_by_deleter.set(released_by_deleter.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let shared = unsafe { Shared::adopt_with(target, deleter) };

        assert_eq!(*shared, 5);
        drop(shared);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn from_box_adopts_the_box() {
        let shared: Shared<str> = Shared::from(Box::<str>::from("unsized"));
        assert_eq!(&*shared, "unsized");
    }

    #[test]
    fn cast_shares_the_block() {
        let concrete = Shared::new("viewed".to_string());
        let displayed: Shared<dyn std::fmt::Display> =
            Shared::cast(concrete.clone(), |value| value as &dyn std::fmt::Display);

        assert_eq!(concrete.strong_count(), 2);
        assert_eq!(displayed.strong_count(), 2);
        assert_eq!(displayed.to_string(), "viewed");

        drop(concrete);
        assert_eq!(displayed.strong_count(), 1);
        assert_eq!(displayed.to_string(), "viewed");
    }

    #[test]
    fn cast_to_field_keeps_whole_value_alive() {
        let (tracker, drops) = DropTracker::new();

        let pair = Shared::new((tracker, 99_u64));
        let number = Shared::cast(pair, |value| &value.1);

        assert_eq!(*number, 99);
        assert_eq!(drops.get(), 0);

        drop(number);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn cast_of_empty_stays_empty() {
        let empty = Shared::<String>::empty();
        let displayed: Shared<dyn std::fmt::Display> =
            Shared::cast(empty, |value| value as &dyn std::fmt::Display);

        assert!(displayed.is_empty());
    }

    #[test]
    fn get_mut_requires_exclusivity() {
        let mut shared = Shared::new(1_u32);
        assert!(shared.get_mut().is_some());

        let copy = shared.clone();
        assert!(shared.get_mut().is_none());
        drop(copy);

        let weak = shared.downgrade();
        assert!(shared.get_mut().is_none());
        drop(weak);

        *shared.get_mut().unwrap() = 2;
        assert_eq!(*shared, 2);
    }

    #[test]
    fn ptr_eq_distinguishes_blocks() {
        let first = Shared::new(0_u8);
        let second = Shared::new(0_u8);
        let copy = first.clone();

        assert!(first.ptr_eq(&copy));
        assert!(!first.ptr_eq(&second));
        assert!(!first.ptr_eq(&Shared::empty()));
        assert!(!Shared::<u8>::empty().ptr_eq(&Shared::empty()));
    }

    #[test]
    fn zero_sized_values_are_supported() {
        let shared = Shared::new(());
        let copy = shared.clone();

        assert_eq!(shared.strong_count(), 2);
        drop(copy);
        drop(shared);
    }

    #[test]
    fn construction_panic_releases_the_allocation() {
        let allocator = CountingAllocator::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _shared = Shared::try_new_with_in(
                || -> u32 { panic!("construction failed") },
                allocator.clone(),
            );
        }));

        assert!(outcome.is_err());
        assert_eq!(allocator.allocated(), 1);
        assert_eq!(allocator.freed(), 1);
    }

    #[test]
    fn debug_formats_value_or_empty() {
        let shared = Shared::new(42_u32);
        assert_eq!(format!("{shared:?}"), "Shared(42)");

        let empty = Shared::<u32>::empty();
        assert_eq!(format!("{empty:?}"), "Shared(<empty>)");
    }

    /// The full lifecycle walked end to end: copies, reset, weak observation,
    /// object death and block death as separate events.
    #[test]
    fn full_lifecycle_scenario() {
        let allocator = CountingAllocator::new();
        let (tracker, drops) = DropTracker::new();

        let mut first = Shared::new_in((tracker, 42_u32), allocator.clone());
        let weak = first.downgrade();
        let second = first.clone();

        assert_eq!(first.strong_count(), 2);

        first.reset();
        assert_eq!(second.strong_count(), 1);
        assert_eq!(drops.get(), 0, "object must survive while an owner remains");

        drop(second);
        assert_eq!(drops.get(), 1, "object dies with the last owner");
        assert!(weak.expired());
        assert_eq!(
            allocator.freed(),
            0,
            "block storage must outlive outstanding observers"
        );

        drop(weak);
        assert_eq!(allocator.freed(), 1, "block storage dies with the last observer");
        assert_eq!(allocator.allocated(), 1);
    }
}
