use std::{ffi::c_void, mem};

/// Alignment that the platform `realloc` is assumed to always honor.
///
/// This is not queryable at runtime. C requires `malloc` results to be suitably
/// aligned for any fundamental type, and `double` is the widest one every target
/// agrees on. The reallocation fast path checks the assumption on every call.
pub const MIN_REALLOC_ALIGNMENT: usize = mem::align_of::<f64>();

/// A primitive, unaligned `malloc`/`realloc`/`free` triad.
///
/// # Safety
///
/// Implementors must behave like the C functions they stand in for:
///
/// - `raw_alloc` returns null or a block of at least `size` bytes aligned to at
///   least [`RawAllocator::MIN_REALLOC_ALIGNMENT`].
/// - `raw_realloc` preserves the first `min(old, new)` bytes, returns a block with
///   the same alignment guarantee, and leaves the original block untouched when it
///   returns null.
/// - `raw_free` releases a block returned by the other two.
pub unsafe trait RawAllocator {
  /// Largest alignment that `raw_realloc` results are guaranteed to have.
  const MIN_REALLOC_ALIGNMENT: usize = MIN_REALLOC_ALIGNMENT;

  fn raw_alloc(
    &self,
    size: usize,
  ) -> *mut c_void;

  /// # Safety
  ///
  /// `ptr` must be a live block returned by this allocator.
  unsafe fn raw_realloc(
    &self,
    ptr: *mut c_void,
    size: usize,
  ) -> *mut c_void;

  /// # Safety
  ///
  /// `ptr` must be a live block returned by this allocator.
  unsafe fn raw_free(
    &self,
    ptr: *mut c_void,
  );
}

/// The C library allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Libc;

unsafe impl RawAllocator for Libc {
  fn raw_alloc(
    &self,
    size: usize,
  ) -> *mut c_void {
    unsafe { libc::malloc(size) }
  }

  unsafe fn raw_realloc(
    &self,
    ptr: *mut c_void,
    size: usize,
  ) -> *mut c_void {
    unsafe { libc::realloc(ptr, size) }
  }

  unsafe fn raw_free(
    &self,
    ptr: *mut c_void,
  ) {
    unsafe { libc::free(ptr) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_libc_honors_min_realloc_alignment() {
    unsafe {
      let mut block = Libc.raw_alloc(3);
      assert!(!block.is_null());
      assert_eq!(block as usize % MIN_REALLOC_ALIGNMENT, 0);

      for size in [17, 4096, 100_000, 5] {
        block = Libc.raw_realloc(block, size);
        assert!(!block.is_null());
        assert_eq!(block as usize % MIN_REALLOC_ALIGNMENT, 0);
      }

      Libc.raw_free(block);
    }
  }
}
