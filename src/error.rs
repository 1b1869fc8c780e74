use std::alloc::LayoutError;
use std::fmt;

/// Why an allocation could not be served.
///
/// Every variant leaves the heap untouched and usable for later calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The host refused to extend the heap.
  OutOfMemory,
  /// The request does not fit in the address space once rounded to units.
  Overflow,
  /// A host buffer could not be described by a `Layout`.
  Layout,
}

impl From<LayoutError> for AllocError {
  fn from(_: LayoutError) -> Self {
    Self::Layout
  }
}

impl fmt::Display for AllocError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::OutOfMemory => f.write_str("host could not extend the heap"),
      Self::Overflow => f.write_str("allocation size overflows the address space"),
      Self::Layout => f.write_str("invalid layout for host buffer"),
    }
  }
}

impl std::error::Error for AllocError {}

/// First broken free-list invariant found by [`Heap::validate`](crate::Heap::validate).
///
/// Addresses are byte addresses of chunk headers; the sentinel reports as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeListError {
  /// Walking `next` links did not return to the sentinel.
  NotCircular,
  /// `next` is not above `at` although `at` is not the highest node.
  Unordered { at: usize, next: usize },
  /// Two free chunks are physically contiguous and were not merged.
  Unmerged { at: usize, next: usize },
  /// Free units in the list disagree with the heap's bookkeeping.
  FreeUnits { expected: usize, found: usize },
}

impl fmt::Display for FreeListError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Self::NotCircular => f.write_str("free list does not return to the sentinel"),
      Self::Unordered { at, next } => {
        write!(f, "free chunk {at:#x} links down to {next:#x}")
      }
      Self::Unmerged { at, next } => {
        write!(f, "free chunks {at:#x} and {next:#x} are adjacent")
      }
      Self::FreeUnits { expected, found } => {
        write!(f, "expected {expected} free units, found {found}")
      }
    }
  }
}

impl std::error::Error for FreeListError {}

#[cfg(test)]
mod tests {
  use std::alloc::Layout;

  use super::*;

  #[test]
  fn layout_error_converts() {
    let err = Layout::from_size_align(8, 3).unwrap_err();

    assert_eq!(AllocError::from(err), AllocError::Layout);
  }

  #[test]
  fn display_names_addresses() {
    let err = FreeListError::Unmerged { at: 0x100, next: 0x140 };

    assert_eq!(err.to_string(), "free chunks 0x100 and 0x140 are adjacent");
  }
}
