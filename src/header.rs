use std::ptr::{self, NonNull};

use crate::constants::{ALLOCATED_TAG, UNIT_SIZE};

/// Unit address of a chunk: its byte address divided by [`UNIT_SIZE`].
///
/// Links in the free list are stored as unit addresses rather than references,
/// so merging and unlinking never leave a dangling borrow behind. Unit address
/// zero is reserved for the sentinel, which lives inside the heap itself.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Chunk(usize);

impl Chunk {
  pub const BASE: Chunk = Chunk(0);
  pub const ALLOCATED: Chunk = Chunk(ALLOCATED_TAG);

  /// Chunk whose header starts at `region`, which must be unit aligned.
  pub fn from_region(region: NonNull<u8>) -> Self {
    let addr = region.as_ptr().expose_provenance();
    debug_assert_eq!(addr % UNIT_SIZE, 0, "region {addr:#x} is not unit aligned");

    Chunk(addr / UNIT_SIZE)
  }

  /// Chunk owning the payload that starts at `payload`.
  pub fn from_payload(payload: NonNull<u8>) -> Self {
    let chunk = Self::from_region(payload);

    Chunk(chunk.0 - 1)
  }

  pub fn offset(
    self,
    units: usize,
  ) -> Self {
    Chunk(self.0 + units)
  }

  pub fn addr(self) -> usize {
    self.0 * UNIT_SIZE
  }

  /// Pointer to the first payload byte, one unit past the header.
  pub fn payload(self) -> NonNull<u8> {
    let ptr = ptr::with_exposed_provenance_mut::<u8>(self.offset(1).addr());

    // SAFETY: the payload starts at least one unit above address zero.
    unsafe { NonNull::new_unchecked(ptr) }
  }

  pub(crate) fn header_ptr(self) -> *mut Header {
    ptr::with_exposed_provenance_mut(self.addr())
  }
}

/// Bookkeeping record at the start of every chunk, free or allocated.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
  /// Next chunk in the free list; [`Chunk::ALLOCATED`] while handed out.
  pub next: Chunk,
  /// Units occupied by the chunk, header included.
  pub size: usize,
}

impl Header {
  pub const EMPTY: Header = Header::new(0, Chunk::BASE);

  pub const fn new(
    size: usize,
    next: Chunk,
  ) -> Self {
    Self { next, size }
  }

  /// Unit address one past the end of the chunk this header describes.
  pub fn end_of(
    &self,
    at: Chunk,
  ) -> Chunk {
    at.offset(self.size)
  }
}

/// Units needed to serve a request of `bytes`: the payload rounded up to
/// whole units plus one unit for the header.
pub const fn units_for(bytes: usize) -> Option<usize> {
  bytes.div_ceil(UNIT_SIZE).checked_add(1)
}
