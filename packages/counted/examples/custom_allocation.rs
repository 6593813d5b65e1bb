//! Demonstrates custom allocators and custom deleters.
//!
//! A chatty allocator makes the allocation behavior of the two construction
//! paths visible: colocated construction performs one allocation for the value
//! and its bookkeeping together, while adoption allocates a stand-alone control
//! block next to memory that was allocated elsewhere.

use std::alloc::Layout;
use std::ptr::NonNull;

use counted::{AllocError, Allocator, Global, Shared};

/// Delegates to [`Global`] and reports every allocation event.
#[derive(Clone, Copy, Debug)]
struct ChattyAllocator;

impl Allocator for ChattyAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        println!("  allocating {} bytes", layout.size());
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        println!("  freeing {} bytes", layout.size());

        // SAFETY: Forwarding the caller's guarantee; allocations come from Global.
        unsafe { Global.deallocate(ptr, layout) };
    }
}

fn main() {
    demonstrate_colocated_allocation();
    println!();
    demonstrate_adoption();
}

/// One allocation serves both the value and the control block.
fn demonstrate_colocated_allocation() {
    println!("Example 1: Colocated allocation");
    println!("-------------------------------");

    let shared = Shared::new_in([0_u64; 4], ChattyAllocator);
    let observer = shared.downgrade();

    println!("Value created; dropping the owner...");
    drop(shared);

    println!("Owner gone, observer expired: {}; dropping it frees the record", observer.expired());
    drop(observer);
}

/// Adopted memory is released by the deleter, the block by its allocator.
fn demonstrate_adoption() {
    println!("Example 2: Adopting external memory");
    println!("-----------------------------------");

    let target = NonNull::from(Box::leak(Box::new("externally allocated".to_string())));

    let deleter = |ptr: NonNull<String>| {
        // SAFETY: The deleter owns the target at this point; it came from Box::into_raw.
        println!("  deleter invoked for \"{}\"", unsafe { ptr.as_ref() });

        // SAFETY: Reconstituting the box the target was allocated by.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    };

    // SAFETY: The pointer came from Box::into_raw and the deleter releases it.
    let shared = unsafe { Shared::adopt_in(target, deleter, ChattyAllocator) };

    println!("Adopted \"{}\"; dropping the handle...", *shared);
    drop(shared);
}
