use std::fmt;

/// Lifetime domain the host attaches to an allocation. Diagnostics only.
///
/// Kept as a transparent `i32` so any value the host passes across the C
/// boundary is representable, including ones this crate does not know.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct SystemAllocationScope(pub i32);

impl SystemAllocationScope {
  pub const COMMAND: Self = Self(0);
  pub const OBJECT: Self = Self(1);
  pub const CACHE: Self = Self(2);
  pub const DEVICE: Self = Self(3);
  pub const INSTANCE: Self = Self(4);

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::COMMAND => "command",
      Self::OBJECT => "object",
      Self::CACHE => "cache",
      Self::DEVICE => "device",
      Self::INSTANCE => "instance",
      _ => "???",
    }
  }
}

impl fmt::Display for SystemAllocationScope {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Kind of memory the host allocated on its own and is merely reporting.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct InternalAllocationType(pub i32);

impl InternalAllocationType {
  pub const EXECUTABLE: Self = Self(0);

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::EXECUTABLE => "executable",
      _ => "???",
    }
  }
}

impl fmt::Display for InternalAllocationType {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
