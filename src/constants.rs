use std::mem;

use crate::header::Header;

/// Size in bytes of one unit. Every chunk is a whole number of units.
pub const UNIT_SIZE: usize = mem::size_of::<Header>();

/// Smallest number of units requested from the host in a single grow.
pub const MIN_GROW_UNITS: usize = 4096;

/// Written into the `next` slot of a chunk's header while it is allocated.
/// Unit address `usize::MAX` can never hold a header.
pub(crate) const ALLOCATED_TAG: usize = usize::MAX;

const _: () = assert!(UNIT_SIZE == mem::align_of::<Header>());
