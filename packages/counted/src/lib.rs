//! Single-threaded shared ownership with custom deleters, custom allocators and
//! colocated allocation.
//!
//! This crate provides [`Shared<T>`], a strong reference-counting handle, and
//! [`Weak<T>`], a non-owning observer, cooperating through a shared, type-erased
//! control block. The owned object and the bookkeeping are governed by two
//! independent counts: the object dies exactly when the last strong handle is
//! dropped, the bookkeeping exactly when the last handle of either kind is gone.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides
//! mechanisms for high-performance hardware-aware programming in Rust.
//!
//! # Key Features
//!
//! - **Colocated allocation**: [`Shared::new()`] places the value and its
//!   bookkeeping in a single allocation
//! - **Adoption of external memory**: [`Shared::adopt()`] takes over externally
//!   allocated targets, released through a custom [`Deleter`]
//! - **Custom allocation strategies**: every construction path has an `_in`
//!   variant taking an [`Allocator`], and a `try_` variant reporting
//!   [`AllocError`] instead of panicking
//! - **Weak observation**: [`Shared::downgrade()`] and [`Weak::upgrade()`]
//!   track a value's lifecycle without extending it
//! - **Cross-type views**: [`Shared::cast()`] converts a handle into one viewing
//!   the same allocation as a trait object or subobject
//!
//! # Example
//!
//! ```rust
//! use counted::Shared;
//!
//! let first = Shared::new("payload".to_string());
//! let second = first.clone();
//! let observer = first.downgrade();
//!
//! assert_eq!(first.strong_count(), 2);
//!
//! drop(first);
//! drop(second);
//!
//! // The value is gone, the observer outlived it.
//! assert!(observer.expired());
//! assert!(observer.upgrade().is_none());
//! ```
//!
//! # Thread Safety
//!
//! The reference counts are plain (non-atomic) cells, so all handles are
//! single-threaded: neither [`Send`] nor [`Sync`]. Use external synchronization
//! and an atomic variant if you need cross-thread sharing; this crate
//! deliberately does not provide one.

mod adopted;
mod alloc;
mod block;
mod deleter;
mod error;
mod inline;
mod shared;
mod weak;

pub use alloc::*;
pub use deleter::*;
pub use error::*;
pub use shared::Shared;
pub use weak::Weak;

#[cfg(test)]
mod testing;
