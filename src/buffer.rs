use std::{fmt, ptr, slice};

use crate::{
  aligned::AlignedAllocator,
  align::is_valid_alignment,
  error::{AllocError, Result},
  raw::{Libc, RawAllocator},
  scope::SystemAllocationScope,
};

/// An owned, aligned byte buffer backed by an [`AlignedAllocator`].
///
/// The buffer is zero-filled on creation and on growth, so every byte it exposes
/// is initialized. An empty buffer holds no allocation at all.
pub struct AlignedBuffer<R: RawAllocator = Libc> {
  allocator: AlignedAllocator<R>,
  ptr: *mut u8,
  len: usize,
  alignment: usize,
}

unsafe impl<R: RawAllocator + Send> Send for AlignedBuffer<R> {}
unsafe impl<R: RawAllocator + Sync> Sync for AlignedBuffer<R> {}

impl AlignedBuffer<Libc> {
  pub fn new(
    len: usize,
    alignment: usize,
  ) -> Result<Self> {
    Self::new_in(AlignedAllocator::new(), len, alignment)
  }
}

impl<R: RawAllocator> AlignedBuffer<R> {
  pub fn new_in(
    allocator: AlignedAllocator<R>,
    len: usize,
    alignment: usize,
  ) -> Result<Self> {
    if !is_valid_alignment(alignment) {
      return Err(AllocError::InvalidAlignment { alignment });
    }

    let ptr = allocator.allocate(len, alignment, SystemAllocationScope::OBJECT);
    if ptr.is_null() && len != 0 {
      return Err(AllocError::OutOfMemory { size: len, alignment });
    }

    if len != 0 {
      unsafe { ptr::write_bytes(ptr, 0, len) };
    }

    Ok(Self {
      allocator,
      ptr,
      len,
      alignment,
    })
  }

  /// Changes the length to `len`, keeping the first `min(len, self.len())` bytes.
  /// On error the buffer is left as it was.
  pub fn resize(
    &mut self,
    len: usize,
  ) -> Result<()> {
    let (ptr, _) = unsafe {
      self
        .allocator
        .reallocate(self.ptr, len, self.alignment, SystemAllocationScope::OBJECT)
    };

    if ptr.is_null() && len != 0 {
      return Err(AllocError::OutOfMemory {
        size: len,
        alignment: self.alignment,
      });
    }

    if len > self.len {
      unsafe { ptr::write_bytes(ptr.add(self.len), 0, len - self.len) };
    }

    self.ptr = ptr;
    self.len = len;
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn alignment(&self) -> usize {
    self.alignment
  }

  /// Null while the buffer is empty.
  pub fn as_ptr(&self) -> *const u8 {
    self.ptr
  }

  pub fn as_mut_ptr(&mut self) -> *mut u8 {
    self.ptr
  }

  pub fn as_slice(&self) -> &[u8] {
    if self.ptr.is_null() {
      return &[];
    }
    unsafe { slice::from_raw_parts(self.ptr, self.len) }
  }

  pub fn as_mut_slice(&mut self) -> &mut [u8] {
    if self.ptr.is_null() {
      return &mut [];
    }
    unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
  }
}

impl<R: RawAllocator> Drop for AlignedBuffer<R> {
  fn drop(&mut self) {
    if !self.ptr.is_null() {
      unsafe { self.allocator.free(self.ptr) };
    }
  }
}

impl<R: RawAllocator> fmt::Debug for AlignedBuffer<R> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("AlignedBuffer")
      .field("ptr", &self.ptr)
      .field("len", &self.len)
      .field("alignment", &self.alignment)
      .finish()
  }
}
