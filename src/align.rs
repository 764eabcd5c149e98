/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two, otherwise the result is meaningless.
///
/// # Examples
///
/// ```rust
/// use valloc::align_to;
///
/// assert_eq!(align_to!(13, 16), 16);
/// assert_eq!(align_to!(32, 16), 32);
/// assert_eq!(align_to!(0, 4096), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// Whether `alignment` is something the allocator accepts: non-zero and a power of two.
pub const fn is_valid_alignment(alignment: usize) -> bool {
  alignment != 0 && alignment & (alignment - 1) == 0
}
