//! # valloc - Aligned Allocation Callbacks
//!
//! This crate implements the allocation callback contract of a host library
//! (the `VkAllocationCallbacks` shape) on top of the C library's `malloc`,
//! `realloc` and `free`.
//!
//! ## Overview
//!
//! The host asks for memory with an explicit power-of-two alignment, and wants
//! to reallocate it with that alignment intact. `malloc` only guarantees a small
//! fixed alignment, and there is no aligned `realloc` at all:
//!
//! ```text
//!   What the host wants          What libc offers
//!
//!   alloc(size, align)           malloc(size)          align <= 16 only
//!   realloc(p, size, align)      realloc(p, size)      no alignment at all
//!   free(p)                      free(p)               needs malloc's pointer
//! ```
//!
//! Each request over-allocates by `align + header` bytes, rounds up inside the
//! block and stores a header just before the pointer returned to the host:
//!
//! ```text
//!   Single Allocation:
//!
//!   ┌─────────┬──────────────────┬──────────────────────────┬─────────┐
//!   │ padding │      Header      │      requested size      │ padding │
//!   │         │ ┌──────────────┐ │                          │         │
//!   │         │ │ outer: ptr   │ │                          │         │
//!   │         │ │ size: N      │ │                          │         │
//!   │         │ └──────────────┘ │                          │         │
//!   └─────────┴──────────────────┴──────────────────────────┴─────────┘
//!   ▲                            ▲
//!   │                            └── inner: aligned, returned to the host
//!   └── outer: returned by malloc
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   valloc
//!   ├── align      - align_to! macro, alignment validation
//!   ├── header     - Header placed before each inner pointer (internal)
//!   ├── raw        - RawAllocator trait and the libc primitive
//!   ├── aligned    - AlignedAllocator: allocate / reallocate / free
//!   ├── scope      - allocation scope and internal allocation tags
//!   ├── callbacks  - C callback table and the adapters filling it
//!   ├── buffer     - AlignedBuffer, a safe owning handle
//!   └── error      - AllocError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use valloc::{AlignedAllocator, SystemAllocationScope};
//!
//! let allocator = AlignedAllocator::new();
//! let scope = SystemAllocationScope::OBJECT;
//!
//! unsafe {
//!     let ptr = allocator.allocate(100, 4096, scope);
//!     assert_eq!(ptr as usize % 4096, 0);
//!
//!     let (ptr, original_size) = allocator.reallocate(ptr, 200, 4096, scope);
//!     assert_eq!(original_size, 100);
//!
//!     assert_eq!(allocator.free(ptr), 200);
//! }
//! ```
//!
//! Handing the allocator to a host:
//!
//! ```rust,ignore
//! let callbacks = valloc::create_allocator!();
//! vk_create_instance(&info, callbacks.as_ref(), &mut instance);
//! ```
//!
//! ## Reallocation
//!
//! ```text
//!   alignment <= MIN_REALLOC_ALIGNMENT        alignment > MIN_REALLOC_ALIGNMENT
//!
//!   realloc(outer, padded size)              allocate(size, alignment)
//!        │  content moves with the block          │  fails: original untouched
//!        ▼                                        ▼
//!   same inner offset, rewrite header        copy min(old, new) bytes
//!                                                 │
//!                                                 ▼
//!                                            free(old outer)
//! ```
//!
//! The fast path relies on `realloc` always returning blocks aligned to at
//! least [`MIN_REALLOC_ALIGNMENT`]. That is checked on every call and a
//! violation panics rather than return misaligned memory.
//!
//! ## Limitations
//!
//! - **No pooling**: every request goes straight to the C allocator
//! - **Alignment is not stored**: callers pass the same alignment on every call
//! - **Same-pointer calls must be serialized** by the caller
//!
//! ## Safety
//!
//! Handing a pointer that was not produced by this allocator to `reallocate` or
//! `free`, or freeing it twice, is undefined behavior. [`AlignedBuffer`] is the
//! safe way in.

pub mod align;
mod aligned;
mod buffer;
mod callbacks;
mod error;
mod header;
mod raw;
mod scope;

pub use aligned::AlignedAllocator;
pub use buffer::AlignedBuffer;
pub use callbacks::{
  AllocationCallbacks, DebugAllocationCallbacks, PfnAllocationFunction, PfnFreeFunction,
  PfnInternalAllocationNotification, PfnInternalFreeNotification, PfnReallocationFunction,
  SystemAllocationCallbacks,
};
pub use error::{AllocError, Result};
pub use raw::{Libc, MIN_REALLOC_ALIGNMENT, RawAllocator};
pub use scope::{InternalAllocationType, SystemAllocationScope};
