use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::align_to;
use crate::constants::UNIT_SIZE;
use crate::error::AllocError;
use crate::header::Header;

/// The host primitive the heap grows on.
pub trait HeapGrower {
  /// Extends the heap by `units` units.
  ///
  /// Returns the start of a fresh region of `units * UNIT_SIZE` bytes,
  /// aligned to [`UNIT_SIZE`] and never handed out before, or `None` when
  /// the host cannot supply it.
  fn grow_heap(
    &mut self,
    units: usize,
  ) -> Option<NonNull<u8>>;
}

/// Grows the program break with `sbrk(2)`.
///
/// Like `sbrk` itself this is not thread-safe, and memory is never given back.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct Sbrk;

#[cfg(unix)]
impl HeapGrower for Sbrk {
  fn grow_heap(
    &mut self,
    units: usize,
  ) -> Option<NonNull<u8>> {
    use libc::{c_void, intptr_t, sbrk};

    let failed = usize::MAX as *mut c_void;
    let bytes = units.checked_mul(UNIT_SIZE)?;

    unsafe {
      let brk = sbrk(0);
      if brk == failed {
        return None;
      }

      let pad = align_to!(brk as usize, UNIT_SIZE) - brk as usize;
      let total = bytes.checked_add(pad)?;
      let start = sbrk(intptr_t::try_from(total).ok()?);
      if start == failed {
        return None;
      }

      // Someone else moved the break in between; the padding no longer fits.
      if start as usize + pad != align_to!(start as usize, UNIT_SIZE) {
        log::warn!("program break moved during grow, dropping {total} bytes");
        return None;
      }

      NonNull::new(start.cast::<u8>().add(pad))
    }
  }
}

/// A fixed-capacity heap carved out of one buffer from the global allocator.
///
/// Grows are served back to back, so consecutive regions are contiguous.
/// Every request is recorded, which makes growth observable in tests.
#[derive(Debug)]
pub struct FixedArena {
  base: NonNull<Header>,
  capacity: usize,
  used: usize,
  requests: Vec<usize>,
}

unsafe impl Send for FixedArena {}

impl FixedArena {
  /// Reserves room for `capacity` units.
  pub fn new(capacity: usize) -> Result<Self, AllocError> {
    let layout = Layout::array::<Header>(capacity.max(1))?;
    let base = unsafe { alloc::alloc(layout) }.cast::<Header>();

    match NonNull::new(base) {
      Some(base) => Ok(Self {
        base,
        capacity,
        used: 0,
        requests: Vec::new(),
      }),
      None => Err(AllocError::OutOfMemory),
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Units handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  /// Unit counts of every grow request, failed ones included.
  pub fn requests(&self) -> &[usize] {
    &self.requests
  }

  /// Whether `ptr` points into this arena's buffer.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let start = self.base.as_ptr() as usize;
    let end = start + self.capacity * UNIT_SIZE;

    (start..end).contains(&(ptr as usize))
  }
}

impl HeapGrower for FixedArena {
  fn grow_heap(
    &mut self,
    units: usize,
  ) -> Option<NonNull<u8>> {
    self.requests.push(units);

    if units > self.capacity - self.used {
      return None;
    }

    let region = unsafe { self.base.add(self.used) };
    self.used += units;

    Some(region.cast())
  }
}

impl Drop for FixedArena {
  fn drop(&mut self) {
    if let Ok(layout) = Layout::array::<Header>(self.capacity.max(1)) {
      unsafe { alloc::dealloc(self.base.as_ptr().cast(), layout) }
    }
  }
}
