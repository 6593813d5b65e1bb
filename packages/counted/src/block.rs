use std::cell::Cell;
use std::ptr::NonNull;

/// Bookkeeping shared by every control block variant.
///
/// The header always sits at the very start of the block allocation, so a pointer to
/// the header is also a pointer to the typed block. Each typed block records its own
/// release recipes here at construction time as plain function pointers; which layout
/// a block uses is never inferred from the pointer itself.
#[derive(Debug)]
pub(crate) struct BlockHeader {
    /// Number of live strong handles.
    strong: Cell<usize>,

    /// Number of live weak handles, plus one reference held jointly by all strong
    /// handles. The joint reference keeps the block storage alive through the object
    /// release even if the object's destructor drops weak handles to this same block.
    weak: Cell<usize>,

    /// Destroys the owned object. Invoked exactly once, when the strong count
    /// reaches zero.
    release_object: unsafe fn(NonNull<BlockHeader>),

    /// Frees the block's own storage. Invoked exactly once, when the weak count
    /// reaches zero. The header no longer exists once this returns.
    release_storage: unsafe fn(NonNull<BlockHeader>),
}

impl BlockHeader {
    /// Creates the header for a freshly constructed block: one strong handle, no
    /// weak handles (the raw weak count starts at one for the joint reference).
    pub(crate) fn new(
        release_object: unsafe fn(NonNull<BlockHeader>),
        release_storage: unsafe fn(NonNull<BlockHeader>),
    ) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(1),
            release_object,
            release_storage,
        }
    }

    /// Number of live strong handles.
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Number of live weak handles, excluding the joint reference.
    pub(crate) fn weak_count(&self) -> usize {
        let weak = self.weak.get();

        if self.strong.get() > 0 {
            // Cannot underflow: the joint reference is held while any strong
            // handle lives.
            weak.wrapping_sub(1)
        } else {
            weak
        }
    }

    /// Whether the owned object has already been released.
    pub(crate) fn is_expired(&self) -> bool {
        self.strong.get() == 0
    }

    /// Registers one more strong handle. Only valid while the object is alive; the
    /// caller checks first.
    ///
    /// # Panics
    ///
    /// Panics if the count would overflow `usize`.
    pub(crate) fn acquire_strong(&self) {
        let strong = self.strong.get();
        debug_assert!(
            strong > 0,
            "acquired a strong reference on a block whose object is already released"
        );

        self.strong.set(
            strong
                .checked_add(1)
                .expect("strong handle count overflowed usize"),
        );
    }

    /// Registers one more weak handle.
    ///
    /// # Panics
    ///
    /// Panics if the count would overflow `usize`.
    pub(crate) fn acquire_weak(&self) {
        self.weak.set(
            self.weak
                .get()
                .checked_add(1)
                .expect("weak handle count overflowed usize"),
        );
    }
}

/// Releases one strong reference.
///
/// At the 1 -> 0 transition the owned object is destroyed, then the joint weak
/// reference is released, which also frees the block storage when no weak handles
/// remain outstanding.
///
/// # Safety
///
/// `block` must point to a live block header on which a strong reference is
/// currently held; that reference is consumed by this call.
pub(crate) unsafe fn release_strong(block: NonNull<BlockHeader>) {
    // SAFETY: The caller's strong reference keeps the block alive.
    let header = unsafe { block.as_ref() };

    let strong = header.strong.get();
    debug_assert!(
        strong > 0,
        "released a strong reference on a block that has none"
    );

    // Cannot underflow per the assertion above.
    header.strong.set(strong.wrapping_sub(1));

    if strong == 1 {
        let release_object = header.release_object;

        // The object dies now. The joint weak reference is still held, so the block
        // storage survives this call even if the object's destructor drops weak
        // handles to this very block.
        // SAFETY: The strong 1 -> 0 transition happens once per block, so the object
        // has not been released before.
        unsafe { release_object(block) };

        // SAFETY: Consuming the joint weak reference, which was held until now.
        unsafe { release_weak(block) };
    }
}

/// Releases one weak reference, freeing the block storage when it was the last
/// reference of either kind.
///
/// # Safety
///
/// `block` must point to a live block header on which a weak reference is currently
/// held; that reference is consumed by this call.
pub(crate) unsafe fn release_weak(block: NonNull<BlockHeader>) {
    // SAFETY: The caller's weak reference keeps the block alive.
    let header = unsafe { block.as_ref() };

    let weak = header.weak.get();
    debug_assert!(
        weak > 0,
        "released a weak reference on a block that has none"
    );

    // Cannot underflow per the assertion above.
    header.weak.set(weak.wrapping_sub(1));

    if weak == 1 {
        let release_storage = header.release_storage;

        // SAFETY: Both counts are zero, so the storage is freed exactly once. The
        // header is not touched beyond this point.
        unsafe { release_storage(block) };
    }
}

/// The live payload of a non-empty handle: the value view and the block it belongs
/// to.
///
/// The value pointer may differ from the block's tracked pointer after a cross-type
/// conversion; the block alone decides how the object and the storage are released.
pub(crate) struct Parts<T: ?Sized> {
    pub(crate) value: NonNull<T>,
    pub(crate) block: NonNull<BlockHeader>,
}

impl<T: ?Sized> Clone for Parts<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Parts<T> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    thread_local! {
        static EVENTS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
    }

    fn record_object(_block: NonNull<BlockHeader>) {
        EVENTS.with_borrow_mut(|events| events.push("object"));
    }

    fn record_storage(block: NonNull<BlockHeader>) {
        EVENTS.with_borrow_mut(|events| events.push("storage"));

        // The test blocks below are plain boxed headers.
        drop(unsafe { Box::from_raw(block.as_ptr()) });
    }

    fn test_block() -> NonNull<BlockHeader> {
        EVENTS.with_borrow_mut(Vec::clear);

        NonNull::from(Box::leak(Box::new(BlockHeader::new(
            record_object,
            record_storage,
        ))))
    }

    fn events() -> Vec<&'static str> {
        EVENTS.with_borrow(Clone::clone)
    }

    #[test]
    fn fresh_header_has_one_strong_and_no_weak() {
        let header = BlockHeader::new(record_object, record_storage);

        assert_eq!(header.strong_count(), 1);
        assert_eq!(header.weak_count(), 0);
        assert!(!header.is_expired());
    }

    #[test]
    fn weak_count_excludes_joint_reference_while_object_alive() {
        let header = BlockHeader::new(record_object, record_storage);

        header.acquire_weak();
        header.acquire_weak();

        assert_eq!(header.weak_count(), 2);
        assert_eq!(header.strong_count(), 1);
    }

    #[test]
    fn last_strong_release_destroys_object_then_storage() {
        let block = test_block();

        unsafe { release_strong(block) };

        assert_eq!(events(), ["object", "storage"]);
    }

    #[test]
    fn outstanding_weak_keeps_storage_after_object_release() {
        let block = test_block();

        unsafe { block.as_ref() }.acquire_weak();
        unsafe { release_strong(block) };

        assert_eq!(events(), ["object"]);
        assert!(unsafe { block.as_ref() }.is_expired());
        assert_eq!(unsafe { block.as_ref() }.weak_count(), 1);

        unsafe { release_weak(block) };

        assert_eq!(events(), ["object", "storage"]);
    }

    #[test]
    fn weak_release_before_strong_release_leaves_object_alone() {
        let block = test_block();

        unsafe { block.as_ref() }.acquire_weak();
        unsafe { release_weak(block) };

        assert_eq!(events(), Vec::<&str>::new());

        unsafe { release_strong(block) };

        assert_eq!(events(), ["object", "storage"]);
    }
}
