use std::alloc::Layout;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use scopeguard::ScopeGuard;

use crate::block::BlockHeader;
use crate::{AllocError, Allocator};

/// Combined allocation record: one allocation housing both the control block
/// bookkeeping and the owned value.
///
/// Object release drops the value in place; storage release frees the whole record.
/// The record's own `release_storage` is the discriminator that distinguishes this
/// layout from the stand-alone one.
#[repr(C)] // The header must sit at the start: a header pointer is a block pointer.
pub(crate) struct InlineBlock<T, A: Allocator> {
    header: BlockHeader,

    /// Consumed when the block storage is released.
    allocator: ManuallyDrop<A>,

    /// Dropped in place when the object is released.
    value: ManuallyDrop<T>,
}

impl<T, A: Allocator> InlineBlock<T, A> {
    /// Allocates one record housing `value` and its bookkeeping, with one strong
    /// reference and no weak handles.
    ///
    /// Returns the header pointer and the pointer to the value within the record.
    pub(crate) fn allocate(
        value: T,
        allocator: A,
    ) -> Result<(NonNull<BlockHeader>, NonNull<T>), AllocError> {
        Self::allocate_with(|| value, allocator)
    }

    /// Like [`allocate()`](Self::allocate), but the value is produced by `make`
    /// after the record is allocated. If `make` panics, the record is released
    /// before the panic propagates.
    pub(crate) fn allocate_with(
        make: impl FnOnce() -> T,
        allocator: A,
    ) -> Result<(NonNull<BlockHeader>, NonNull<T>), AllocError> {
        let layout = Layout::new::<Self>();

        let block = allocator.allocate(layout)?.cast::<Self>();

        // Nothing has been written into the record yet; if `make` panics, the only
        // cleanup owed is returning the allocation.
        let allocator = scopeguard::guard(allocator, |allocator| {
            // SAFETY: The record was allocated just above with this layout and
            // contains nothing that needs dropping yet.
            unsafe { allocator.deallocate(block.cast::<u8>(), layout) };
        });

        let value = make();

        let allocator = ScopeGuard::into_inner(allocator);

        // SAFETY: `block` is freshly allocated for exactly this layout and is valid
        // for writes.
        unsafe {
            block.write(Self {
                header: BlockHeader::new(Self::release_object, Self::release_storage),
                allocator: ManuallyDrop::new(allocator),
                value: ManuallyDrop::new(value),
            });
        }

        // SAFETY: The record is fully initialized and `value` is a live field in it;
        // nothing else references the record during construction.
        let value_field = unsafe { &mut (*block.as_ptr()).value };

        // ManuallyDrop<T> has the same layout as T.
        let value_ptr = NonNull::from(value_field).cast::<T>();

        Ok((block.cast::<BlockHeader>(), value_ptr))
    }

    /// Drops the owned value in place.
    ///
    /// # Safety
    ///
    /// `header` must point to the header of a live `InlineBlock<T, A>` whose value
    /// has not been released yet.
    unsafe fn release_object(header: NonNull<BlockHeader>) {
        let block = header.cast::<Self>();

        // SAFETY: The object has not been released before, so the value is still
        // present; it is dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut (*block.as_ptr()).value) };
    }

    /// Frees the whole record using the allocator it was created with.
    ///
    /// # Safety
    ///
    /// `header` must point to the header of a live `InlineBlock<T, A>` with both
    /// counts at zero. The record no longer exists once this returns.
    unsafe fn release_storage(header: NonNull<BlockHeader>) {
        let block = header.cast::<Self>();

        // The allocator is moved out first: it cannot free the memory it is itself
        // stored in.
        // SAFETY: Storage release happens exactly once, so the allocator is still
        // present, and nothing reads the record after this point.
        let allocator = unsafe { ManuallyDrop::take(&mut (*block.as_ptr()).allocator) };

        // SAFETY: The record was allocated by this allocator with this layout.
        unsafe { allocator.deallocate(block.cast::<u8>(), Layout::new::<Self>()) };
    }
}
