use std::alloc::Layout;

use thiserror::Error;

/// Returned when an [`Allocator`][crate::Allocator] cannot provide the requested memory.
///
/// Carries the [`Layout`] of the failed request so callers can report or react to the
/// exact allocation that could not be satisfied.
#[derive(Debug, Error)]
#[error("memory allocation of {size} bytes with alignment {align} failed", size = .layout.size(), align = .layout.align())]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    /// Creates an error describing a failed allocation of `layout`.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout of the allocation that failed.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(AllocError: Send, Sync, Debug);

    #[test]
    fn reports_failed_layout() {
        let layout = Layout::new::<u64>();
        let error = AllocError::new(layout);

        assert_eq!(error.layout(), layout);

        let message = error.to_string();
        assert!(message.contains("8 bytes"));
    }
}
