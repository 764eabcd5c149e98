use std::{ffi::c_void, mem, ptr};

use crate::align_to;

/// Bookkeeping stored immediately before every inner pointer.
///
/// The header lives at `inner - Header::SIZE`, which is only guaranteed to be
/// aligned to the caller's alignment, so it is always accessed unaligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
  /// Pointer returned by the primitive allocator.
  pub outer: *mut c_void,
  /// Logical size of the most recent allocate/reallocate.
  pub size: usize,
}

impl Header {
  pub const SIZE: usize = mem::size_of::<Header>();

  pub fn new(
    outer: *mut c_void,
    size: usize,
  ) -> Self {
    Self { outer, size }
  }

  /// Bytes to request from the primitive allocator for `size` usable bytes at
  /// `alignment`, or `None` if that does not fit in a `usize`.
  pub fn outer_size(
    size: usize,
    alignment: usize,
  ) -> Option<usize> {
    alignment.checked_add(Self::SIZE)?.checked_add(size)
  }

  /// Distance from `outer` to the first `alignment`-aligned address that leaves
  /// room for a header in front of it.
  pub fn inner_offset(
    outer: *mut c_void,
    alignment: usize,
  ) -> usize {
    let addr = outer as usize;
    align_to!(addr + Self::SIZE, alignment) - addr
  }

  /// Places the inner pointer inside a block of `outer_size(.., alignment)` bytes.
  ///
  /// # Safety
  ///
  /// `outer` must point to a live block at least `outer_size(_, alignment)` bytes long.
  pub unsafe fn inner_for(
    outer: *mut c_void,
    alignment: usize,
  ) -> *mut u8 {
    unsafe { outer.cast::<u8>().add(Self::inner_offset(outer, alignment)) }
  }

  /// # Safety
  ///
  /// `inner` must have been produced by this allocator and still be live.
  pub unsafe fn read(inner: *const u8) -> Self {
    unsafe { ptr::read_unaligned(inner.sub(Self::SIZE).cast::<Header>()) }
  }

  /// # Safety
  ///
  /// The `Header::SIZE` bytes before `inner` must be writable and belong to `self.outer`.
  pub unsafe fn write(
    self,
    inner: *mut u8,
  ) {
    unsafe { ptr::write_unaligned(inner.sub(Self::SIZE).cast::<Header>(), self) }
  }
}
