use std::iter;
use std::ptr::NonNull;

use log::{debug, trace, warn};

#[cfg(unix)]
use crate::grower::Sbrk;
use crate::constants::{MIN_GROW_UNITS, UNIT_SIZE};
use crate::error::{AllocError, FreeListError};
use crate::grower::HeapGrower;
use crate::header::{Chunk, Header, units_for};

/// Unit counters for a [`Heap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Units obtained from the host so far.
  pub heap_units: usize,
  /// Units currently linked into the free list.
  pub free_units: usize,
  /// Units handed out and not yet released, headers included.
  pub allocated_units: usize,
  /// Successful grows.
  pub grow_calls: usize,
}

/// First-fit heap over a circular, address-ordered free list.
///
/// The list is created on the first [`allocate`](Heap::allocate) and starts
/// at a zero-sized sentinel stored in the heap itself. Every mutating call
/// takes `&mut self`; sharing a heap between threads needs an outer lock.
pub struct Heap<G: HeapGrower> {
  base: Header,
  cursor: Option<Chunk>,
  grow_floor: usize,
  heap_units: usize,
  free_units: usize,
  grow_calls: usize,
  grower: G,
}

#[cfg(unix)]
impl Default for Heap<Sbrk> {
  fn default() -> Self {
    Self::new(Sbrk)
  }
}

impl<G: HeapGrower> Heap<G> {
  pub fn new(grower: G) -> Self {
    Self::with_grow_floor(grower, MIN_GROW_UNITS)
  }

  /// Like [`Heap::new`], but asks the host for at least `grow_floor` units
  /// per grow instead of [`MIN_GROW_UNITS`].
  pub fn with_grow_floor(
    grower: G,
    grow_floor: usize,
  ) -> Self {
    Self {
      base: Header::EMPTY,
      cursor: None,
      grow_floor: grow_floor.max(1),
      heap_units: 0,
      free_units: 0,
      grow_calls: 0,
      grower,
    }
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  pub fn stats(&self) -> HeapStats {
    HeapStats {
      heap_units: self.heap_units,
      free_units: self.free_units,
      allocated_units: self.heap_units - self.free_units,
      grow_calls: self.grow_calls,
    }
  }

  /// Returns a block of at least `bytes` bytes, aligned to [`UNIT_SIZE`].
  ///
  /// The block is uninitialized and stays valid until passed to
  /// [`release`](Heap::release). Zero-byte requests still get a distinct
  /// block. On error the free list is left exactly as it was.
  pub fn allocate(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let required = units_for(bytes).ok_or(AllocError::Overflow)?;

    let mut prev = self.init();
    let mut current = self.header(prev).next;

    loop {
      let node = *self.header(current);

      if node.size >= required {
        let taken = if node.size == required {
          trace!("allocate({bytes}): exact fit at {:#x}", current.addr());
          self.header_mut(prev).next = node.next;
          current
        } else {
          // Hand out the tail so the head keeps its place in the list.
          let remaining = node.size - required;
          trace!(
            "allocate({bytes}): split {:#x} {} -> {remaining} units",
            current.addr(),
            node.size
          );
          self.header_mut(current).size = remaining;
          current.offset(remaining)
        };

        *self.header_mut(taken) = Header::new(required, Chunk::ALLOCATED);
        self.free_units -= required;
        self.cursor = Some(prev);
        self.check();

        return Ok(taken.payload());
      }

      if Some(current) == self.cursor {
        current = self.grow(required)?;
      }

      prev = current;
      current = self.header(current).next;
    }
  }

  /// Gives a block back to the free list, merging it with free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`allocate`](Heap::allocate) on this
  /// heap and not released since. Debug builds panic on a block that is
  /// not currently allocated; release builds do not check.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let chunk = Chunk::from_payload(ptr);

    debug_assert_eq!(
      self.header(chunk).next,
      Chunk::ALLOCATED,
      "release({ptr:p}): not an allocated block"
    );
    trace!("release({ptr:p}): {} units", self.header(chunk).size);

    self.insert(chunk);
    self.check();
  }

  /// Free chunks as `(address, units)`, in ascending address order.
  pub fn free_chunks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut current = self.cursor.map(|_| self.base.next);

    iter::from_fn(move || {
      let chunk = current.filter(|chunk| *chunk != Chunk::BASE)?;
      let header = self.header(chunk);
      current = Some(header.next);

      Some((chunk.addr(), header.size))
    })
  }

  /// Walks the whole free list and reports the first broken invariant.
  pub fn validate(&self) -> Result<(), FreeListError> {
    if self.cursor.is_none() {
      return Ok(());
    }

    let mut found = 0;
    let mut at = Chunk::BASE;

    // Every free chunk spans at least one unit.
    for _ in 0..=self.heap_units {
      let header = self.header(at);
      let next = header.next;

      if next == Chunk::BASE {
        if found != self.free_units {
          return Err(FreeListError::FreeUnits {
            expected: self.free_units,
            found,
          });
        }
        return Ok(());
      }
      if next == Chunk::ALLOCATED {
        return Err(FreeListError::NotCircular);
      }
      if next <= at {
        return Err(FreeListError::Unordered {
          at: at.addr(),
          next: next.addr(),
        });
      }
      if at != Chunk::BASE && header.end_of(at) == next {
        return Err(FreeListError::Unmerged {
          at: at.addr(),
          next: next.addr(),
        });
      }

      found += self.header(next).size;
      at = next;
    }

    Err(FreeListError::NotCircular)
  }

  fn init(&mut self) -> Chunk {
    match self.cursor {
      Some(cursor) => cursor,
      None => {
        self.base = Header::new(0, Chunk::BASE);
        self.cursor = Some(Chunk::BASE);
        Chunk::BASE
      }
    }
  }

  /// Asks the host for `max(min_units, grow_floor)` units and frees them
  /// into the list. Returns the cursor the insertion left behind.
  fn grow(
    &mut self,
    min_units: usize,
  ) -> Result<Chunk, AllocError> {
    let units = min_units.max(self.grow_floor);
    if units.checked_mul(UNIT_SIZE).is_none() {
      return Err(AllocError::Overflow);
    }

    let Some(region) = self.grower.grow_heap(units) else {
      warn!("host refused to grow the heap by {units} units");
      return Err(AllocError::OutOfMemory);
    };

    let chunk = Chunk::from_region(region);
    *self.header_mut(chunk) = Header::new(units, Chunk::ALLOCATED);
    self.heap_units += units;
    self.grow_calls += 1;
    debug!("grew heap by {units} units at {:#x}", chunk.addr());

    Ok(self.insert(chunk))
  }

  /// Links `chunk` in address order after the cursor, merging with whichever
  /// neighbours touch it. Returns the node it was linked after.
  fn insert(
    &mut self,
    chunk: Chunk,
  ) -> Chunk {
    let mut prev = self.init();

    loop {
      let next = self.header(prev).next;

      if chunk > prev && chunk < next {
        break;
      }
      // Wrap point: `chunk` is above the highest node or below the lowest.
      if prev >= next && (chunk > prev || chunk < next) {
        break;
      }

      prev = next;
    }

    let block = *self.header(chunk);
    let next = self.header(prev).next;
    self.free_units += block.size;

    if block.end_of(chunk) == next {
      let absorbed = *self.header(next);
      trace!("merge {:#x} into {:#x}", next.addr(), chunk.addr());

      let header = self.header_mut(chunk);
      header.size += absorbed.size;
      header.next = absorbed.next;
    } else {
      self.header_mut(chunk).next = next;
    }

    let before = *self.header(prev);
    if before.end_of(prev) == chunk {
      let merged = *self.header(chunk);
      trace!("merge {:#x} into {:#x}", chunk.addr(), prev.addr());

      let header = self.header_mut(prev);
      header.size += merged.size;
      header.next = merged.next;
    } else {
      self.header_mut(prev).next = chunk;
    }

    self.cursor = Some(prev);
    prev
  }

  fn header(
    &self,
    chunk: Chunk,
  ) -> &Header {
    if chunk == Chunk::BASE {
      &self.base
    } else {
      // Every non-sentinel chunk reachable here lies in host memory.
      unsafe { &*chunk.header_ptr() }
    }
  }

  fn header_mut(
    &mut self,
    chunk: Chunk,
  ) -> &mut Header {
    if chunk == Chunk::BASE {
      &mut self.base
    } else {
      unsafe { &mut *chunk.header_ptr() }
    }
  }

  #[inline]
  fn check(&self) {
    #[cfg(feature = "paranoid")]
    if let Err(err) = self.validate() {
      panic!("free list corrupted: {err}");
    }
  }
}

#[cfg(test)]
mod tests {
  use test_log::test;

  use super::*;
  use crate::grower::FixedArena;

  fn heap(
    capacity: usize,
    grow_floor: usize,
  ) -> Heap<FixedArena> {
    Heap::with_grow_floor(FixedArena::new(capacity).unwrap(), grow_floor)
  }

  fn addr(ptr: NonNull<u8>) -> usize {
    ptr.as_ptr() as usize
  }

  #[test]
  fn first_allocation_grows_and_splits_tail() {
    let mut heap = heap(64, 16);

    let ptr = heap.allocate(UNIT_SIZE).unwrap();
    let chunks: Vec<_> = heap.free_chunks().collect();

    assert_eq!(heap.grower().requests(), &[16]);
    assert_eq!(chunks.len(), 1);
    let (start, units) = chunks[0];
    assert_eq!(units, 14);
    // The tail is handed out: header right after the shrunken free chunk.
    assert_eq!(addr(ptr), start + 15 * UNIT_SIZE);
    assert_eq!(heap.validate(), Ok(()));
  }

  #[test]
  fn exact_fit_unlinks_the_chunk() {
    let mut heap = heap(64, 4);

    heap.allocate(3 * UNIT_SIZE).unwrap();

    assert_eq!(heap.free_chunks().count(), 0);
    assert_eq!(heap.stats().free_units, 0);
    assert_eq!(heap.validate(), Ok(()));
  }

  #[test]
  fn release_merges_both_neighbours() {
    let mut heap = heap(64, 8);

    let a = heap.allocate(UNIT_SIZE).unwrap();
    let b = heap.allocate(UNIT_SIZE).unwrap();
    let c = heap.allocate(UNIT_SIZE).unwrap();
    let d = heap.allocate(UNIT_SIZE).unwrap();
    assert_eq!(heap.free_chunks().count(), 0);

    unsafe {
      heap.release(a);
      heap.release(c);
      assert_eq!(heap.free_chunks().count(), 2);

      heap.release(b);
    }

    let chunks: Vec<_> = heap.free_chunks().collect();
    assert_eq!(chunks, vec![(addr(d) + UNIT_SIZE, 6)]);
    assert_eq!(heap.validate(), Ok(()));

    unsafe { heap.release(d) };
    assert_eq!(heap.free_chunks().collect::<Vec<_>>(), vec![(addr(d) - UNIT_SIZE, 8)]);
  }

  #[test]
  fn grow_respects_the_floor() {
    let mut heap = heap(1024, 32);

    heap.allocate(0).unwrap();
    heap.allocate(100 * UNIT_SIZE).unwrap();

    assert_eq!(heap.grower().requests(), &[32, 101]);
  }

  #[test]
  fn growth_merges_with_the_top_chunk() {
    let mut heap = heap(1024, 16);

    let small = heap.allocate(UNIT_SIZE).unwrap();
    unsafe { heap.release(small) };
    let (start, _) = heap.free_chunks().next().unwrap();

    heap.allocate(20 * UNIT_SIZE).unwrap();

    // 16 + 21 units merged, then the 21-unit tail handed out.
    assert_eq!(heap.free_chunks().collect::<Vec<_>>(), vec![(start, 16)]);
    assert_eq!(heap.stats().grow_calls, 2);
    assert_eq!(heap.validate(), Ok(()));
  }

  #[test]
  fn failed_grow_leaves_heap_untouched() {
    let mut heap = heap(20, 16);

    heap.allocate(UNIT_SIZE).unwrap();
    let before: Vec<_> = heap.free_chunks().collect();
    let stats = heap.stats();

    assert_eq!(heap.allocate(20 * UNIT_SIZE), Err(AllocError::OutOfMemory));
    assert_eq!(heap.free_chunks().collect::<Vec<_>>(), before);
    assert_eq!(heap.stats(), stats);
    assert_eq!(heap.validate(), Ok(()));
  }

  #[test]
  fn huge_request_overflows() {
    let mut heap = heap(16, 16);

    assert_eq!(heap.allocate(usize::MAX), Err(AllocError::Overflow));
    assert_eq!(heap.grower().requests(), &[] as &[usize]);
  }

  #[test]
  fn stats_track_units() {
    let mut heap = heap(64, 32);

    let ptr = heap.allocate(3 * UNIT_SIZE).unwrap();
    assert_eq!(
      heap.stats(),
      HeapStats {
        heap_units: 32,
        free_units: 28,
        allocated_units: 4,
        grow_calls: 1,
      }
    );

    unsafe { heap.release(ptr) };
    assert_eq!(heap.stats().allocated_units, 0);
  }

  #[test]
  fn fresh_heap_is_valid_and_empty() {
    let heap = heap(8, 8);

    assert_eq!(heap.free_chunks().count(), 0);
    assert_eq!(heap.validate(), Ok(()));
    assert_eq!(heap.stats(), HeapStats::default());
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic(expected = "not an allocated block")]
  fn double_release_panics_in_debug() {
    let mut heap = heap(64, 16);

    let ptr = heap.allocate(8).unwrap();
    let _guard = heap.allocate(8).unwrap();

    unsafe {
      heap.release(ptr);
      heap.release(ptr);
    }
  }
}
