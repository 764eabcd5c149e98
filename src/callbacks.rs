//! Host-facing callback table.
//!
//! The layout of [`AllocationCallbacks`] and the signatures of its function
//! pointers match `VkAllocationCallbacks`, so a pointer to one can be handed
//! straight to the host. The host calls back with the `p_user_data` value it
//! was given at registration, which must stay valid for as long as the host may
//! use the callbacks.

use std::{
  borrow::Cow,
  ffi::{CStr, c_char, c_void},
  ptr,
};

use crate::{
  aligned::AlignedAllocator,
  scope::{InternalAllocationType, SystemAllocationScope},
};

static ALLOCATOR: AlignedAllocator = AlignedAllocator::new();

pub type PfnAllocationFunction = unsafe extern "system" fn(
  p_user_data: *mut c_void,
  size: usize,
  alignment: usize,
  scope: SystemAllocationScope,
) -> *mut c_void;

pub type PfnReallocationFunction = unsafe extern "system" fn(
  p_user_data: *mut c_void,
  p_original: *mut c_void,
  size: usize,
  alignment: usize,
  scope: SystemAllocationScope,
) -> *mut c_void;

pub type PfnFreeFunction = unsafe extern "system" fn(p_user_data: *mut c_void, p_memory: *mut c_void);

pub type PfnInternalAllocationNotification = unsafe extern "system" fn(
  p_user_data: *mut c_void,
  size: usize,
  allocation_type: InternalAllocationType,
  scope: SystemAllocationScope,
);

pub type PfnInternalFreeNotification = unsafe extern "system" fn(
  p_user_data: *mut c_void,
  size: usize,
  allocation_type: InternalAllocationType,
  scope: SystemAllocationScope,
);

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AllocationCallbacks {
  pub p_user_data: *mut c_void,
  pub pfn_allocation: Option<PfnAllocationFunction>,
  pub pfn_reallocation: Option<PfnReallocationFunction>,
  pub pfn_free: Option<PfnFreeFunction>,
  pub pfn_internal_allocation: Option<PfnInternalAllocationNotification>,
  pub pfn_internal_free: Option<PfnInternalFreeNotification>,
}

impl Default for AllocationCallbacks {
  fn default() -> Self {
    Self {
      p_user_data: ptr::null_mut(),
      pfn_allocation: None,
      pfn_reallocation: None,
      pfn_free: None,
      pfn_internal_allocation: None,
      pfn_internal_free: None,
    }
  }
}

/// Callbacks that route the host's heap traffic through [`AlignedAllocator`]
/// without reporting anything. The user data is passed along but never read.
pub struct SystemAllocationCallbacks;

impl SystemAllocationCallbacks {
  pub fn create_callbacks(user_data: *mut c_void) -> AllocationCallbacks {
    AllocationCallbacks {
      p_user_data: user_data,
      pfn_allocation: Some(Self::fn_allocation),
      pfn_reallocation: Some(Self::fn_reallocation),
      pfn_free: Some(Self::fn_free),
      pfn_internal_allocation: Some(Self::fn_internal_allocation),
      pfn_internal_free: Some(Self::fn_internal_free),
    }
  }

  unsafe extern "system" fn fn_allocation(
    _user_data: *mut c_void,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    ALLOCATOR.allocate(size, alignment, scope).cast()
  }

  unsafe extern "system" fn fn_reallocation(
    _user_data: *mut c_void,
    original: *mut c_void,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    let (ptr, _) = unsafe { ALLOCATOR.reallocate(original.cast(), size, alignment, scope) };
    ptr.cast()
  }

  unsafe extern "system" fn fn_free(
    _user_data: *mut c_void,
    memory: *mut c_void,
  ) {
    if !memory.is_null() {
      unsafe { ALLOCATOR.free(memory.cast()) };
    }
  }

  unsafe extern "system" fn fn_internal_allocation(
    _user_data: *mut c_void,
    _size: usize,
    _allocation_type: InternalAllocationType,
    _scope: SystemAllocationScope,
  ) {
  }

  unsafe extern "system" fn fn_internal_free(
    _user_data: *mut c_void,
    _size: usize,
    _allocation_type: InternalAllocationType,
    _scope: SystemAllocationScope,
  ) {
  }
}

/// Callbacks that log every operation the host performs, tagged with a source
/// string so the log shows which registration the traffic came from.
///
/// The callbacks only borrow `src`, hence the `'static` bound: the host may keep
/// calling them long after `create_callbacks` returned. A temporary table is fine
/// to pass to a single host call, since the host copies what it needs.
///
/// ```rust
/// use valloc::DebugAllocationCallbacks;
///
/// let callbacks = DebugAllocationCallbacks::create_callbacks(c"renderer");
/// let alloc = callbacks.pfn_allocation.unwrap();
/// let free = callbacks.pfn_free.unwrap();
///
/// unsafe {
///   let ptr = alloc(callbacks.p_user_data, 64, 16, Default::default());
///   assert_eq!(ptr as usize % 16, 0);
///   free(callbacks.p_user_data, ptr);
/// }
/// ```
pub struct DebugAllocationCallbacks;

impl DebugAllocationCallbacks {
  pub fn create_callbacks(src: &'static CStr) -> AllocationCallbacks {
    AllocationCallbacks {
      p_user_data: src.as_ptr().cast_mut().cast(),
      pfn_allocation: Some(Self::fn_allocation),
      pfn_reallocation: Some(Self::fn_reallocation),
      pfn_free: Some(Self::fn_free),
      pfn_internal_allocation: Some(Self::fn_internal_allocation),
      pfn_internal_free: Some(Self::fn_internal_free),
    }
  }

  unsafe fn source<'a>(user_data: *mut c_void) -> Cow<'a, str> {
    if user_data.is_null() {
      return Cow::Borrowed("???");
    }
    unsafe { CStr::from_ptr(user_data.cast::<c_char>()) }.to_string_lossy()
  }

  unsafe extern "system" fn fn_allocation(
    user_data: *mut c_void,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    let src = unsafe { Self::source(user_data) };

    let ret = ALLOCATOR.allocate(size, alignment, scope);

    log::info!("alloc: {src}: {ret:?}: size={size} alignment={alignment} scope={scope}");

    ret.cast()
  }

  unsafe extern "system" fn fn_reallocation(
    user_data: *mut c_void,
    original: *mut c_void,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    let src = unsafe { Self::source(user_data) };

    let (ret, original_size) =
      unsafe { ALLOCATOR.reallocate(original.cast(), size, alignment, scope) };

    log::info!(
      "realloc: {src}: {original:?} -> {ret:?}: size=(original {original_size}, new {size}) \
       alignment={alignment} scope={scope}"
    );

    ret.cast()
  }

  unsafe extern "system" fn fn_free(
    user_data: *mut c_void,
    memory: *mut c_void,
  ) {
    let src = unsafe { Self::source(user_data) };

    let original_size = if memory.is_null() {
      0
    } else {
      unsafe { ALLOCATOR.free(memory.cast()) }
    };

    log::info!("free: {src}: {memory:?}: size={original_size}");
  }

  unsafe extern "system" fn fn_internal_allocation(
    user_data: *mut c_void,
    size: usize,
    allocation_type: InternalAllocationType,
    scope: SystemAllocationScope,
  ) {
    let src = unsafe { Self::source(user_data) };
    log::info!("internal allocation: {src}: size={size} type={allocation_type} scope={scope}");
  }

  unsafe extern "system" fn fn_internal_free(
    user_data: *mut c_void,
    size: usize,
    allocation_type: InternalAllocationType,
    scope: SystemAllocationScope,
  ) {
    let src = unsafe { Self::source(user_data) };
    log::info!("internal free: {src}: size={size} type={allocation_type} scope={scope}");
  }
}

/// Callbacks for a host call site, tagged with the call site's `file:line`.
///
/// Evaluates to `Option<AllocationCallbacks>`: `Some` of logging callbacks when
/// the `debug-allocator` feature is on, `None` otherwise, in which case the host
/// falls back to its own allocator. Pass `.as_ref()` of the result to the host.
#[cfg(feature = "debug-allocator")]
#[macro_export]
macro_rules! create_allocator {
  () => {
    ::core::option::Option::Some($crate::DebugAllocationCallbacks::create_callbacks(
      const {
        match ::core::ffi::CStr::from_bytes_with_nul(
          ::core::concat!(::core::file!(), ":", ::core::line!(), "\0").as_bytes(),
        ) {
          ::core::result::Result::Ok(src) => src,
          ::core::result::Result::Err(_) => ::core::panic!("call site contains a nul byte"),
        }
      },
    ))
  };
}

/// Callbacks for a host call site. The `debug-allocator` feature is off, so this
/// is always `None` and the host uses its own allocator.
#[cfg(not(feature = "debug-allocator"))]
#[macro_export]
macro_rules! create_allocator {
  () => {
    ::core::option::Option::<$crate::AllocationCallbacks>::None
  };
}
