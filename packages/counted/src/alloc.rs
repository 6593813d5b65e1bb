use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use crate::AllocError;

/// A memory allocation strategy for control blocks and combined allocation records.
///
/// Implementations hand out raw memory described by a [`Layout`] and later take the
/// same memory back. The handles in this crate store the allocator inside the very
/// allocation it produced; the allocator is moved out of that memory before the final
/// deallocation, so implementations never observe a request to free memory they are
/// still stored in.
///
/// # Contract
///
/// - Memory returned by [`allocate`](Self::allocate) stays valid until it is passed
///   to [`deallocate`](Self::deallocate).
/// - [`deallocate`](Self::deallocate) is invoked at most once per successful
///   allocation, with the same layout the memory was requested with.
///
/// # Example
///
/// ```rust
/// use std::alloc::Layout;
///
/// use counted::{Allocator, Global};
///
/// let layout = Layout::new::<u64>();
/// let ptr = Global.allocate(layout).unwrap();
///
/// // SAFETY: The pointer came from this allocator with this layout.
/// unsafe { Global.deallocate(ptr, layout) };
/// ```
pub trait Allocator {
    /// Allocates a block of memory described by `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the memory cannot be provided.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block of memory previously produced by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by a call to `allocate` on this same allocator
    /// with this same `layout`, and must not be used in any way after this call.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process-wide allocator, backed by [`std::alloc`].
///
/// This is the allocator used by all construction paths that do not take an explicit
/// allocator argument.
#[derive(Clone, Copy, Debug, Default)]
pub struct Global;

impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // The system allocator does not deal in zero-sized allocations; a
            // well-aligned dangling pointer satisfies the contract.
            return Ok(dangling_for(layout));
        }

        // SAFETY: The layout has nonzero size, checked above.
        let ptr = unsafe { alloc::alloc(layout) };

        NonNull::new(ptr).ok_or_else(|| AllocError::new(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            // Zero-sized allocations were never given to the system allocator.
            return;
        }

        // SAFETY: Forwarding the caller's guarantee that `ptr` came from an
        // `allocate` call on this allocator with this same layout.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

/// A dangling pointer carrying the alignment of `layout`.
fn dangling_for(layout: Layout) -> NonNull<u8> {
    NonNull::new(ptr::without_provenance_mut(layout.align())).expect("alignment is never zero")
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Global: Send, Sync, Copy, Debug);

    #[test]
    fn allocates_usable_memory() {
        let layout = Layout::new::<u64>();

        let ptr = Global.allocate(layout).unwrap();

        unsafe {
            ptr.cast::<u64>().write(0x5AFE);
            assert_eq!(ptr.cast::<u64>().read(), 0x5AFE);
            Global.deallocate(ptr, layout);
        }
    }

    #[test]
    fn zero_sized_layout_yields_aligned_dangling() {
        let layout = Layout::from_size_align(0, 16).unwrap();

        let ptr = Global.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr().addr() % 16, 0);

        // Nothing was really allocated, so this must be a no-op.
        unsafe { Global.deallocate(ptr, layout) };
    }
}
