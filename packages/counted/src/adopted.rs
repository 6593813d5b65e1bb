use std::alloc::Layout;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use crate::block::BlockHeader;
use crate::{AllocError, Allocator, Deleter};

/// Stand-alone control block, created when externally allocated memory is adopted.
///
/// The tracked object lives elsewhere; only the bookkeeping lives in this
/// allocation. Object release and storage release therefore free two unrelated
/// pieces of memory, through the deleter and the allocator respectively.
#[repr(C)] // The header must sit at the start: a header pointer is a block pointer.
pub(crate) struct AdoptedBlock<T: ?Sized, D: Deleter<T>, A: Allocator> {
    header: BlockHeader,

    /// Consumed when the object is released.
    deleter: ManuallyDrop<D>,

    /// Consumed when the block storage is released.
    allocator: ManuallyDrop<A>,

    /// The adopted pointer. The deleter is always invoked on this pointer,
    /// regardless of any converted views handles may hold.
    target: NonNull<T>,
}

impl<T: ?Sized, D: Deleter<T>, A: Allocator> AdoptedBlock<T, D, A> {
    /// Allocates a stand-alone block tracking `target`, with one strong reference
    /// and no weak handles.
    ///
    /// On failure the target is untouched; ownership of it stays with the caller.
    pub(crate) fn allocate(
        target: NonNull<T>,
        deleter: D,
        allocator: A,
    ) -> Result<NonNull<BlockHeader>, AllocError> {
        let layout = Layout::new::<Self>();

        let block = allocator.allocate(layout)?.cast::<Self>();

        // SAFETY: `block` is freshly allocated for exactly this layout and is valid
        // for writes.
        unsafe {
            block.write(Self {
                header: BlockHeader::new(Self::release_object, Self::release_storage),
                deleter: ManuallyDrop::new(deleter),
                allocator: ManuallyDrop::new(allocator),
                target,
            });
        }

        Ok(block.cast::<BlockHeader>())
    }

    /// Invokes the deleter on the tracked pointer, consuming the deleter.
    ///
    /// # Safety
    ///
    /// `header` must point to the header of a live `AdoptedBlock<T, D, A>` whose
    /// object has not been released yet.
    unsafe fn release_object(header: NonNull<BlockHeader>) {
        let block = header.cast::<Self>().as_ptr();

        // SAFETY: The caller guarantees this is our block, live and valid for reads.
        let target = unsafe { (*block).target };

        // SAFETY: The object has not been released before, so the deleter is still
        // present; it is consumed by this single take.
        let mut deleter = unsafe { ManuallyDrop::take(&mut (*block).deleter) };

        // SAFETY: `target` is the pointer the deleter was registered for and this is
        // the single release of the tracked object.
        unsafe { deleter.delete(target) };
    }

    /// Frees the block's own storage using the allocator it was created with.
    ///
    /// # Safety
    ///
    /// `header` must point to the header of a live `AdoptedBlock<T, D, A>` with both
    /// counts at zero. The block no longer exists once this returns.
    unsafe fn release_storage(header: NonNull<BlockHeader>) {
        let block = header.cast::<Self>();

        // The allocator is moved out first: it cannot free the memory it is itself
        // stored in.
        // SAFETY: Storage release happens exactly once, so the allocator is still
        // present, and nothing reads the block after this point.
        let allocator = unsafe { ManuallyDrop::take(&mut (*block.as_ptr()).allocator) };

        // SAFETY: The block was allocated by this allocator with this layout.
        unsafe { allocator.deallocate(block.cast::<u8>(), Layout::new::<Self>()) };
    }
}
