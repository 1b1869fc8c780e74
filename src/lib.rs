//! # ffalloc - A First-Fit Free-List Allocator
//!
//! This crate provides the classic **free-list allocator**: one circular list
//! of free chunks, kept in address order, searched first-fit from a roaming
//! cursor, and coalesced eagerly on release. Memory comes from a single
//! "grow the heap" primitive, `sbrk(2)` by default.
//!
//! ## Overview
//!
//! ```text
//!   Free List (ascending addresses, one wrap):
//!
//!   ┌────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//!   │  base  │───▶│ free: 6u │───▶│ free: 2u │───▶│ free: 9u │──┐
//!   │ size 0 │    └──────────┘    └──────────┘    └──────────┘  │
//!   └────────┘                         ▲                        │
//!        ▲                           cursor                     │
//!        └──────────────────────────────────────────────────────┘
//!
//!   allocate() scans from the cursor and takes the first chunk that fits.
//!   release() links the chunk back in order and merges touching neighbours.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   ffalloc
//!   ├── align      - align_to! macro
//!   ├── constants  - unit size, growth floor
//!   ├── error      - AllocError, FreeListError
//!   ├── grower     - HeapGrower trait, Sbrk and FixedArena hosts
//!   ├── header     - chunk header and unit arithmetic (internal)
//!   └── heap       - Heap: allocate, release, growth
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ffalloc::Heap;
//!
//! fn main() {
//!     let mut heap = Heap::default();
//!
//!     let ptr = heap.allocate(64).unwrap().cast::<u64>();
//!
//!     unsafe {
//!         ptr.write(42);
//!         println!("Value: {}", ptr.read());
//!
//!         heap.release(ptr.cast());
//!     }
//! }
//! ```
//!
//! ## How It Works
//!
//! Sizes are counted in **units**, one unit being the size of a chunk header
//! (16 bytes). A request for `n` bytes takes `ceil(n / 16) + 1` units, the
//! extra one holding the header:
//!
//! ```text
//!   Single Chunk:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Chunk Header       │         Payload                │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ next: free link │  │  ┌──────────────────────────┐  │
//!   │  │ size: N units   │  │  │   (N - 1) * 16 bytes     │  │
//!   │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │      1 unit           │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! A chunk larger than needed is split: its **tail** is handed out and the
//! head shrinks in place, so the list never has to be relinked.
//!
//! ```text
//!   Before:  │ free: 10u                                   │
//!   After:   │ free: 7u                      │ used: 3u    │
//!                                            ▲
//!                                            └── returned chunk
//! ```
//!
//! When a full circuit of the list finds nothing, the heap grows by at least
//! [`MIN_GROW_UNITS`] units. The new region is released into the list like any
//! other chunk, so it merges with a free chunk at the top of the heap.
//!
//! ## Limitations
//!
//! - **Single owner**: every operation takes `&mut self`; share behind a lock
//! - **No shrinking**: memory from the host is reused, never given back
//! - **Unit alignment only**: payloads are 16-byte aligned, nothing stronger
//!
//! ## Safety
//!
//! [`Heap::release`] is `unsafe`: it trusts that the pointer came from
//! [`Heap::allocate`] and is released once. Debug builds tag allocated
//! headers and panic on a violation; release builds do not check.

pub mod align;
mod constants;
mod error;
mod grower;
mod header;
mod heap;

pub use constants::{MIN_GROW_UNITS, UNIT_SIZE};
pub use error::{AllocError, FreeListError};
#[cfg(unix)]
pub use grower::Sbrk;
pub use grower::{FixedArena, HeapGrower};
pub use heap::{Heap, HeapStats};
