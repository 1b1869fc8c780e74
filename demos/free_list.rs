use std::io::Read;
use std::ptr::NonNull;

use ffalloc::{Heap, Sbrk, UNIT_SIZE};
use libc::sbrk;

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb`, or just watch the program break move as the heap grows.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  bytes: usize,
  ptr: NonNull<u8>,
) {
  println!("Allocated {bytes} bytes, address = {ptr:p}, program break = {:?}", unsafe {
    sbrk(0)
  });
}

fn print_free_list(heap: &Heap<Sbrk>) {
  for (addr, units) in heap.free_chunks() {
    println!("    free chunk {addr:#x}: {units} units ({} bytes)", units * UNIT_SIZE);
  }
  println!("    {:?}", heap.stats());
}

fn main() {
  env_logger::init();

  let mut heap = Heap::<Sbrk>::default();

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) The first allocation finds an empty list and grows the heap by
  //    the minimum of 4096 units. The block is carved from the top.
  // --------------------------------------------------------------------
  let first = heap.allocate(4).expect("heap growth failed");
  println!("\n[1] Allocate 4 bytes");
  print_alloc(4, first);
  print_free_list(&heap);

  unsafe { first.cast::<u32>().write(0xDEADBEEF) };
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Three more blocks, each just below the previous one.
  // --------------------------------------------------------------------
  let second = heap.allocate(12).expect("heap growth failed");
  let third = heap.allocate(64).expect("heap growth failed");
  let fourth = heap.allocate(32).expect("heap growth failed");
  println!("\n[2] Allocate 12, 64 and 32 bytes");
  print_alloc(12, second);
  print_alloc(64, third);
  print_alloc(32, fourth);
  print_free_list(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the first block, then ask for a small block again. The
  //    cursor sits right before the hole, so the hole is reused.
  // --------------------------------------------------------------------
  unsafe { heap.release(first) };
  println!("\n[3] Released first block at {first:p}");
  print_free_list(&heap);

  let fifth = heap.allocate(2).expect("heap growth failed");
  print_alloc(2, fifth);
  println!(
    "[3] fifth == first? {}",
    if fifth == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Release the blocks in the middle; neighbours merge into one chunk.
  // --------------------------------------------------------------------
  unsafe {
    heap.release(third);
    heap.release(second);
  }
  println!("\n[4] Released second and third blocks");
  print_free_list(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) A request larger than anything free grows the heap again.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");

  let big = heap.allocate(128 * 1024).expect("heap growth failed");
  println!("\n[5] Allocate 128 KiB");
  print_alloc(128 * 1024, big);
  print_free_list(&heap);

  print_program_break("after large alloc");
  block_until_enter_pressed();

  println!("\n[6] End of example. The heap never returns memory; the OS reclaims it at exit.");
}
