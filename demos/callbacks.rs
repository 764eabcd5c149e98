use std::{ffi::c_void, ptr, slice};

use valloc::{AllocationCallbacks, AlignedAllocator, InternalAllocationType, SystemAllocationScope};

/// A stand-in for a host library object that was created with our callbacks and
/// routes all of its heap traffic through them until it is destroyed.
struct Host {
  callbacks: AllocationCallbacks,
}

impl Host {
  fn alloc(
    &self,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    unsafe { (self.callbacks.pfn_allocation.unwrap())(self.callbacks.p_user_data, size, alignment, scope) }
  }

  fn realloc(
    &self,
    original: *mut c_void,
    size: usize,
    alignment: usize,
    scope: SystemAllocationScope,
  ) -> *mut c_void {
    unsafe {
      (self.callbacks.pfn_reallocation.unwrap())(self.callbacks.p_user_data, original, size, alignment, scope)
    }
  }

  fn free(
    &self,
    memory: *mut c_void,
  ) {
    unsafe { (self.callbacks.pfn_free.unwrap())(self.callbacks.p_user_data, memory) }
  }

  fn report_internal(
    &self,
    size: usize,
  ) {
    let kind = InternalAllocationType::EXECUTABLE;
    let scope = SystemAllocationScope::DEVICE;

    unsafe {
      (self.callbacks.pfn_internal_allocation.unwrap())(self.callbacks.p_user_data, size, kind, scope);
      (self.callbacks.pfn_internal_free.unwrap())(self.callbacks.p_user_data, size, kind, scope);
    }
  }
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  // Run the allocator's own checks before handing it to anyone.
  AlignedAllocator::new().self_test();
  println!("[0] self test passed");

  // Without the `debug-allocator` feature there is nothing to demo.
  let Some(callbacks) = valloc::create_allocator!() else {
    println!("debug-allocator feature is off, host would use its own allocator");
    return;
  };
  let host = Host { callbacks };

  // --------------------------------------------------------------------
  // 1) Command-scoped scratch memory, small alignment.
  // --------------------------------------------------------------------
  let scratch = host.alloc(24, 8, SystemAllocationScope::COMMAND);
  println!("\n[1] scratch = {scratch:?}");

  // --------------------------------------------------------------------
  // 2) A page-aligned object that grows and shrinks.
  // --------------------------------------------------------------------
  let object = host.alloc(1, 4096, SystemAllocationScope::OBJECT);
  unsafe { object.cast::<u8>().write(0x42) };

  let object = host.realloc(object, 65536, 4096, SystemAllocationScope::OBJECT);
  let object = host.realloc(object, 1, 4096, SystemAllocationScope::OBJECT);
  println!(
    "[2] object = {object:?}, addr % 4096 = {}, first byte = {:#x}",
    object as usize % 4096,
    unsafe { slice::from_raw_parts(object.cast::<u8>(), 1)[0] },
  );

  // --------------------------------------------------------------------
  // 3) The host reports memory it allocated on its own.
  // --------------------------------------------------------------------
  host.report_internal(16384);

  // --------------------------------------------------------------------
  // 4) Zero-size requests and null frees are legal and do nothing.
  // --------------------------------------------------------------------
  let nothing = host.alloc(0, 16, SystemAllocationScope::CACHE);
  println!("[4] alloc(0) = {nothing:?}");
  host.free(ptr::null_mut());

  host.free(object);
  host.free(scratch);

  println!("\n[5] End of example.");
}
