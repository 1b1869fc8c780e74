// Runs in its own binary: nothing else in this process moves the program break
// between the heap's own calls except the system allocator.
#![cfg(unix)]

use ffalloc::{Heap, MIN_GROW_UNITS, Sbrk, UNIT_SIZE};

#[test]
fn sbrk_heap_round_trip() {
  let mut heap: Heap<Sbrk> = Heap::default();

  let first = heap.allocate(8).unwrap().cast::<u64>();
  let second = heap.allocate(6 * 2).unwrap().cast::<u16>();

  unsafe {
    first.write(3);
    for i in 0..6 {
      second.add(i).write((i + 1) as u16);
    }

    assert_eq!(first.read(), 3);
    for i in 0..6 {
      assert_eq!((i + 1) as u16, second.add(i).read());
    }

    heap.release(first.cast());
  }

  let third = heap.allocate(4).unwrap();
  assert_eq!(third, first.cast());
  assert_eq!(third.as_ptr() as usize % UNIT_SIZE, 0);

  let big = heap.allocate(MIN_GROW_UNITS * UNIT_SIZE).unwrap();
  unsafe { big.as_ptr().write_bytes(0x5A, MIN_GROW_UNITS * UNIT_SIZE) };

  assert!(heap.stats().grow_calls >= 2);
  assert_eq!(heap.validate(), Ok(()));
}
