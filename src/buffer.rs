// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Zero-allocation double buffering for assembled units.
//!
//! An assembler fills one buffer while the other holds the last completed
//! unit for the consumer. When a unit completes, `swap()` exchanges them
//! by index, so steady-state operation never allocates and a partially
//! filled buffer is never handed out.
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────┐
//! │   Buffer A       │  swap  │   Buffer B       │
//! │   (filling)      │  ←──→  │   (ready)        │
//! └──────────────────┘        └──────────────────┘
//! ```

/// Buffers that can be emptied in place for reuse.
pub trait Reset {
    /// Forget the contents while keeping allocations.
    fn reset(&mut self);
}

/// Double buffer over any resettable unit.
///
/// `DoubleBuffer` is not thread-safe. It is owned by a single assembler
/// and touched from one call-per-packet context.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    buffers: [T; 2],
    filling_idx: usize,
}

impl<T: Reset> DoubleBuffer<T> {
    /// Create a double buffer from two pre-allocated units.
    pub fn new(a: T, b: T) -> Self {
        Self {
            buffers: [a, b],
            filling_idx: 0,
        }
    }

    /// Returns a reference to the buffer currently being filled.
    #[inline]
    pub fn filling(&self) -> &T {
        &self.buffers[self.filling_idx]
    }

    /// Returns a mutable reference to the buffer currently being filled.
    #[inline]
    pub fn filling_mut(&mut self) -> &mut T {
        &mut self.buffers[self.filling_idx]
    }

    /// Returns a reference to the buffer holding the last completed unit.
    ///
    /// Before any `swap()` call, this returns an empty buffer.
    #[inline]
    pub fn ready(&self) -> &T {
        &self.buffers[1 - self.filling_idx]
    }

    /// Discard whatever is being filled.
    #[inline]
    pub fn discard(&mut self) {
        self.buffers[self.filling_idx].reset();
    }

    /// Swap buffers and return a reference to the newly-ready (completed)
    /// buffer. The new filling buffer is reset.
    #[inline]
    pub fn swap(&mut self) -> &T {
        self.filling_idx = 1 - self.filling_idx;
        self.buffers[self.filling_idx].reset();
        &self.buffers[1 - self.filling_idx]
    }
}

impl<T: Reset + Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

impl<T> Reset for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}
