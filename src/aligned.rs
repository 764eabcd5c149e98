use std::{ptr, slice};

use crate::{
  align::is_valid_alignment,
  header::Header,
  raw::{Libc, RawAllocator},
  scope::SystemAllocationScope,
};

/// Power-of-two aligned allocation on top of an unaligned [`RawAllocator`].
///
/// Every pointer handed out is preceded by a small header recording the block the
/// primitive allocator actually returned and the logical size, which is all that
/// is needed to reallocate and free it later. The allocator itself holds no state
/// besides the primitive, so it is freely copyable and re-entrant.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlignedAllocator<R = Libc> {
  raw: R,
}

impl AlignedAllocator<Libc> {
  pub const fn new() -> Self {
    Self { raw: Libc }
  }
}

impl<R: RawAllocator> AlignedAllocator<R> {
  pub const fn with_raw(raw: R) -> Self {
    Self { raw }
  }

  pub fn raw(&self) -> &R {
    &self.raw
  }

  /// Allocates `size` bytes aligned to `alignment`.
  ///
  /// Returns null when `size` is zero (without touching the primitive allocator)
  /// or when the primitive allocator fails.
  ///
  /// # Panics
  ///
  /// If `alignment` is not a power of two.
  pub fn allocate(
    &self,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut u8 {
    assert!(
      is_valid_alignment(alignment),
      "alignment {alignment} is not a power of two"
    );

    if size == 0 {
      return ptr::null_mut();
    }

    let Some(outer_size) = Header::outer_size(size, alignment) else {
      log::trace!("allocate: size={size} alignment={alignment} overflows");
      return ptr::null_mut();
    };

    let outer = self.raw.raw_alloc(outer_size);
    if outer.is_null() {
      log::trace!("allocate: primitive allocation of {outer_size} bytes failed");
      return ptr::null_mut();
    }

    unsafe {
      let inner = Header::inner_for(outer, alignment);
      Header::new(outer, size).write(inner);

      log::trace!(
        "allocate: {inner:?} (outer {outer:?}): size={size} alignment={alignment} scope={scope}"
      );
      inner
    }
  }

  /// Resizes the allocation at `ptr` to `size` bytes, preserving its content.
  ///
  /// Returns the new pointer together with the size the allocation had before
  /// the call (0 if `ptr` was null). A null `ptr` allocates, a zero `size` frees
  /// and returns null. On failure null is returned and `ptr` stays valid.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a live pointer returned by this allocator with an
  /// alignment compatible with `alignment`. On success `ptr` must no longer be used.
  ///
  /// # Panics
  ///
  /// If `alignment` is not a power of two, or if the primitive `realloc` breaks
  /// its alignment guarantee.
  pub unsafe fn reallocate(
    &self,
    ptr: *mut u8,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> (*mut u8, usize) {
    assert!(
      is_valid_alignment(alignment),
      "alignment {alignment} is not a power of two"
    );

    if ptr.is_null() {
      return (self.allocate(size, alignment, scope), 0);
    }

    if size == 0 {
      let original_size = unsafe { self.free(ptr) };
      return (ptr::null_mut(), original_size);
    }

    let header = unsafe { Header::read(ptr) };
    let original_size = header.size;

    let new_inner = if alignment <= R::MIN_REALLOC_ALIGNMENT {
      unsafe { self.reallocate_in_place(ptr, header, size, alignment) }
    } else {
      unsafe { self.reallocate_by_copy(ptr, header, size, alignment, scope) }
    };

    log::trace!(
      "reallocate: {ptr:?} -> {new_inner:?}: size=(original {original_size}, new {size}) \
       alignment={alignment} scope={scope}"
    );

    (new_inner, original_size)
  }

  /// Lets the primitive `realloc` move the block and the content with it.
  ///
  /// `alignment` is at most what `realloc` always provides, so the new outer
  /// block is aligned to `alignment` and the inner pointer keeps its offset.
  unsafe fn reallocate_in_place(
    &self,
    inner: *mut u8,
    header: Header,
    size: usize,
    alignment: usize,
  ) -> *mut u8 {
    let Some(outer_size) = Header::outer_size(size, alignment) else {
      return ptr::null_mut();
    };

    let offset = inner as usize - header.outer as usize;

    let new_outer = unsafe { self.raw.raw_realloc(header.outer, outer_size) };
    if new_outer.is_null() {
      return ptr::null_mut();
    }

    assert!(
      new_outer as usize & (alignment - 1) == 0,
      "realloc returned {new_outer:?}, which is not aligned to {alignment}"
    );

    let new_inner = unsafe { Header::inner_for(new_outer, alignment) };
    assert_eq!(
      new_inner as usize - new_outer as usize,
      offset,
      "realloc moved the inner pointer relative to its block"
    );

    unsafe { Header::new(new_outer, size).write(new_inner) };
    new_inner
  }

  /// Allocates a fresh aligned block, copies the content over, then frees the old
  /// block. The old block is released only once the new one exists.
  unsafe fn reallocate_by_copy(
    &self,
    inner: *mut u8,
    header: Header,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut u8 {
    let new_inner = self.allocate(size, alignment, scope);
    if new_inner.is_null() {
      return ptr::null_mut();
    }

    unsafe {
      ptr::copy_nonoverlapping(inner, new_inner, size.min(header.size));
      self.raw.raw_free(header.outer);
    }

    new_inner
  }

  /// Frees the allocation at `ptr` and returns its logical size.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live pointer returned by this allocator.
  pub unsafe fn free(
    &self,
    ptr: *mut u8,
  ) -> usize {
    assert!(!ptr.is_null(), "free called with a null pointer");

    unsafe {
      let header = Header::read(ptr);
      self.raw.raw_free(header.outer);

      log::trace!("free: {ptr:?} (outer {:?}): size={}", header.outer, header.size);
      header.size
    }
  }

  /// Exercises the allocator end to end and panics on the first broken invariant.
  ///
  /// Covers the zero-size sentinel, every alignment up to 64 KiB, sizes around a
  /// 64 KiB boundary, and content preservation across a same-size, grow and shrink
  /// reallocation for alignments on both sides of the fast path threshold.
  pub fn self_test(&self) {
    const MARKER: &[u8] = b"Hello world\0";
    let scope = SystemAllocationScope::COMMAND;

    assert!(self.allocate(0, 1, scope).is_null());

    let mut alignment = 1;
    while alignment <= 65536 {
      self.check_fill_and_free(1, alignment);
      alignment *= 2;
    }

    let alignment = 65536;
    for size in (alignment - 256)..=(alignment + 256) {
      self.check_fill_and_free(size, alignment);
    }

    for alignment in [1, 4, 8, 4096] {
      let size = 65536;

      unsafe {
        let b0 = self.allocate(size, alignment, scope);
        assert!(!b0.is_null());
        ptr::copy_nonoverlapping(MARKER.as_ptr(), b0, MARKER.len());

        let mut current = b0;
        for (new_size, expected_original) in [(size, size), (size * 2, size), (size, size * 2)] {
          let (next, original_size) = self.reallocate(current, new_size, alignment, scope);
          assert!(!next.is_null());
          assert_eq!(next as usize & (alignment - 1), 0);
          assert_eq!(original_size, expected_original);
          assert_eq!(slice::from_raw_parts(next, MARKER.len()), MARKER);
          current = next;
        }

        assert_eq!(self.free(current), size);
      }
    }
  }

  fn check_fill_and_free(
    &self,
    size: usize,
    alignment: usize,
  ) {
    let block = self.allocate(size, alignment, SystemAllocationScope::COMMAND);
    assert!(!block.is_null(), "allocate({size}, {alignment}) failed");
    assert_eq!(block as usize & (alignment - 1), 0);

    unsafe {
      ptr::write_bytes(block, 0xff, size);
      assert!(slice::from_raw_parts(block, size).iter().all(|&b| b == 0xff));
      assert_eq!(self.free(block), size);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, ffi::c_void};

  use super::*;

  const SCOPE: SystemAllocationScope = SystemAllocationScope::OBJECT;

  /// Counts calls into libc and can be told to fail after a number of them.
  #[derive(Default)]
  struct Flaky {
    calls: Cell<usize>,
    fail_from: Cell<Option<usize>>,
  }

  impl Flaky {
    fn fail_after(
      &self,
      successes: usize,
    ) {
      self.fail_from.set(Some(self.calls.get() + successes));
    }

    fn should_fail(&self) -> bool {
      let call = self.calls.get();
      self.calls.set(call + 1);
      self.fail_from.get().is_some_and(|from| call >= from)
    }
  }

  unsafe impl RawAllocator for Flaky {
    fn raw_alloc(
      &self,
      size: usize,
    ) -> *mut c_void {
      if self.should_fail() {
        return ptr::null_mut();
      }
      Libc.raw_alloc(size)
    }

    unsafe fn raw_realloc(
      &self,
      ptr: *mut c_void,
      size: usize,
    ) -> *mut c_void {
      if self.should_fail() {
        return ptr::null_mut();
      }
      unsafe { Libc.raw_realloc(ptr, size) }
    }

    unsafe fn raw_free(
      &self,
      ptr: *mut c_void,
    ) {
      unsafe { Libc.raw_free(ptr) }
    }
  }

  /// A `realloc` that hands back a block one byte past what malloc returned.
  struct Misaligning;

  unsafe impl RawAllocator for Misaligning {
    fn raw_alloc(
      &self,
      size: usize,
    ) -> *mut c_void {
      Libc.raw_alloc(size)
    }

    unsafe fn raw_realloc(
      &self,
      ptr: *mut c_void,
      size: usize,
    ) -> *mut c_void {
      unsafe {
        Libc.raw_free(ptr);
        Libc.raw_alloc(size + 1).cast::<u8>().add(1).cast()
      }
    }

    unsafe fn raw_free(
      &self,
      ptr: *mut c_void,
    ) {
      unsafe { Libc.raw_free(ptr) }
    }
  }

  fn fill(
    ptr: *mut u8,
    len: usize,
  ) {
    for i in 0..len {
      unsafe { ptr.add(i).write(i as u8) };
    }
  }

  fn check(
    ptr: *const u8,
    len: usize,
  ) {
    for i in 0..len {
      assert_eq!(unsafe { ptr.add(i).read() }, i as u8, "byte {i}");
    }
  }

  #[test]
  fn test_self_test() {
    AlignedAllocator::new().self_test();
  }

  #[test]
  fn test_zero_size_is_null_and_untouched() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());

    for shift in 0..17 {
      assert!(allocator.allocate(0, 1 << shift, SCOPE).is_null());
    }

    assert_eq!(allocator.raw().calls.get(), 0);
  }

  #[test]
  #[should_panic(expected = "not a power of two")]
  fn test_allocate_rejects_bad_alignment() {
    AlignedAllocator::new().allocate(16, 24, SCOPE);
  }

  #[test]
  #[should_panic(expected = "not a power of two")]
  fn test_reallocate_rejects_zero_alignment() {
    unsafe { AlignedAllocator::new().reallocate(ptr::null_mut(), 16, 0, SCOPE) };
  }

  #[test]
  fn test_allocate_reports_size_on_free() {
    let allocator = AlignedAllocator::new();

    for (size, alignment) in [(1, 1), (7, 2), (100, 16), (4095, 4096), (12345, 64)] {
      let ptr = allocator.allocate(size, alignment, SCOPE);
      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % alignment, 0);

      fill(ptr, size);
      check(ptr, size);

      assert_eq!(unsafe { allocator.free(ptr) }, size);
    }
  }

  #[test]
  fn test_allocate_overflow_returns_null() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());

    assert!(allocator.allocate(usize::MAX - 8, 16, SCOPE).is_null());
    assert_eq!(allocator.raw().calls.get(), 0);
  }

  #[test]
  fn test_allocate_failure_returns_null() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());
    allocator.raw().fail_after(0);

    assert!(allocator.allocate(64, 64, SCOPE).is_null());
  }

  #[test]
  fn test_reallocate_null_allocates() {
    let allocator = AlignedAllocator::new();

    let (ptr, original_size) = unsafe { allocator.reallocate(ptr::null_mut(), 40, 32, SCOPE) };
    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % 32, 0);
    assert_eq!(original_size, 0);

    assert_eq!(unsafe { allocator.free(ptr) }, 40);
  }

  #[test]
  fn test_reallocate_to_zero_frees() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());

    let ptr = allocator.allocate(300, 4096, SCOPE);
    let (result, original_size) = unsafe { allocator.reallocate(ptr, 0, 4096, SCOPE) };

    assert!(result.is_null());
    assert_eq!(original_size, 300);
  }

  #[test]
  fn test_reallocate_grow_shrink_round_trip() {
    let allocator = AlignedAllocator::new();

    for alignment in [1, 2, 8, 16, 256, 4096, 65536] {
      let size = 1000;

      unsafe {
        let p0 = allocator.allocate(size, alignment, SCOPE);
        fill(p0, size);

        let (p1, original_size) = allocator.reallocate(p0, size * 2, alignment, SCOPE);
        assert_eq!(original_size, size);
        assert_eq!(p1 as usize % alignment, 0);
        check(p1, size);

        let (p2, original_size) = allocator.reallocate(p1, size, alignment, SCOPE);
        assert_eq!(original_size, size * 2);
        assert_eq!(p2 as usize % alignment, 0);
        check(p2, size);

        assert_eq!(allocator.free(p2), size);
      }
    }
  }

  #[test]
  fn test_reallocate_page_aligned_sequence() {
    let allocator = AlignedAllocator::new();

    unsafe {
      let (p, original_size) = allocator.reallocate(ptr::null_mut(), 1, 4096, SCOPE);
      assert_eq!(p as usize % 4096, 0);
      assert_eq!(original_size, 0);

      let (q, original_size) = allocator.reallocate(p, 65536, 4096, SCOPE);
      assert_eq!(q as usize % 4096, 0);
      assert_eq!(original_size, 1);

      let (r, original_size) = allocator.reallocate(q, 1, 4096, SCOPE);
      assert_eq!(r as usize % 4096, 0);
      assert_eq!(original_size, 65536);

      assert_eq!(allocator.free(r), 1);
    }
  }

  #[test]
  fn test_slow_path_failure_keeps_original() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());

    unsafe {
      let ptr = allocator.allocate(128, 4096, SCOPE);
      fill(ptr, 128);

      allocator.raw().fail_after(0);
      let (result, original_size) = allocator.reallocate(ptr, 1 << 20, 4096, SCOPE);
      assert!(result.is_null());
      assert_eq!(original_size, 128);

      check(ptr, 128);
      assert_eq!(Header::read(ptr).size, 128);
      assert_eq!(allocator.free(ptr), 128);
    }
  }

  #[test]
  fn test_fast_path_failure_keeps_original() {
    let allocator = AlignedAllocator::with_raw(Flaky::default());

    unsafe {
      let ptr = allocator.allocate(128, 8, SCOPE);
      fill(ptr, 128);

      allocator.raw().fail_after(0);
      let (result, original_size) = allocator.reallocate(ptr, 1 << 20, 8, SCOPE);
      assert!(result.is_null());
      assert_eq!(original_size, 128);

      check(ptr, 128);
      assert_eq!(allocator.free(ptr), 128);
    }
  }

  #[test]
  fn test_reallocate_overflow_keeps_original() {
    let allocator = AlignedAllocator::new();

    for alignment in [4, 512] {
      unsafe {
        let ptr = allocator.allocate(16, alignment, SCOPE);
        fill(ptr, 16);

        let (result, original_size) = allocator.reallocate(ptr, usize::MAX, alignment, SCOPE);
        assert!(result.is_null());
        assert_eq!(original_size, 16);

        check(ptr, 16);
        assert_eq!(allocator.free(ptr), 16);
      }
    }
  }

  #[test]
  #[should_panic(expected = "not aligned")]
  fn test_fast_path_detects_misaligned_realloc() {
    let allocator = AlignedAllocator::with_raw(Misaligning);

    unsafe {
      let ptr = allocator.allocate(16, 4, SCOPE);
      allocator.reallocate(ptr, 32, 4, SCOPE);
    }
  }

  #[test]
  fn test_concurrent_distinct_pointers() {
    static ALLOCATOR: AlignedAllocator = AlignedAllocator::new();

    std::thread::scope(|s| {
      for t in 0..4usize {
        s.spawn(move || {
          for i in 0..200usize {
            let alignment = 1 << ((t + i) % 13);
            let size = 1 + (i * 37) % 3000;

            unsafe {
              let ptr = ALLOCATOR.allocate(size, alignment, SCOPE);
              ptr::write_bytes(ptr, t as u8, size);

              let (ptr, original_size) = ALLOCATOR.reallocate(ptr, size * 2, alignment, SCOPE);
              assert_eq!(original_size, size);
              assert_eq!(ptr as usize % alignment, 0);
              assert!(slice::from_raw_parts(ptr, size).iter().all(|&b| b == t as u8));

              assert_eq!(ALLOCATOR.free(ptr), size * 2);
            }
          }
        });
      }
    });
  }
}
