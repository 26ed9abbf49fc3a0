//! Bump allocator with checkpoint/restore, used for per-request scratch
//! memory (`spec.md` §4.1).
//!
//! Allocations advance a cursor within the current block; when the current
//! block cannot satisfy a request a new block is appended. `reset` rewinds
//! every block to empty without returning memory to the OS. The arena is
//! reference-counted (via `Arc`) so worker threads can share ownership of a
//! long-lived scratch region.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use crate::error::EngineError;

const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
const PAGE_SIZE: usize = 4096;
const DEFAULT_ALIGN: usize = 8;
const CACHE_LINE_ALIGN: usize = 64;

struct Block {
    data: NonNull<u8>,
    size: usize,
    used: usize,
    layout: Layout,
}

impl Block {
    fn new(size: usize) -> Option<Block> {
        let layout = Layout::from_size_align(size, CACHE_LINE_ALIGN).ok()?;
        // SAFETY: `layout` has non-zero size; `rounded_block_size` never
        // returns zero.
        let data = unsafe { alloc(layout) };
        let data = NonNull::new(data)?;
        Some(Block {
            data,
            size,
            used: 0,
            layout,
        })
    }

    fn remaining(&self) -> usize {
        self.size - self.used
    }

    fn try_alloc(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let base = self.data.as_ptr() as usize;
        let cur = base + self.used;
        let aligned = (cur + align - 1) & !(align - 1);
        let pad = aligned - cur;
        if pad.checked_add(size)? > self.remaining() {
            return None;
        }
        self.used += pad + size;
        NonNull::new((base + self.used - size) as *mut u8)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: `data`/`layout` were produced together by `Block::new`
        // and this block owns them exclusively.
        unsafe { dealloc(self.data.as_ptr(), self.layout) };
    }
}

fn rounded_block_size(requested: usize) -> usize {
    let min = std::cmp::max(DEFAULT_BLOCK_SIZE, requested + 64);
    (min + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// A checkpoint token returned by [`Arena::checkpoint`]. Restoring to it
/// rewinds the arena's cursor and invalidates every pointer issued after it
/// was taken. Checkpoints must be restored in LIFO order.
pub struct Checkpoint {
    block_index: usize,
    position: usize,
}

/// A bump allocator owning an ordered list of blocks.
///
/// Not `Sync`: a single arena must not be mutated concurrently by more than
/// one thread at a time. Sharing across threads is via `Arc<Arena>`, which
/// manages lifetime only — callers must externally serialize mutating calls
/// (`spec.md` §5).
pub struct Arena {
    blocks: RefCell<Vec<Block>>,
    current_index: Cell<usize>,
    peak_usage: Cell<usize>,
}

impl Arena {
    /// Create a new arena with a single initial block of `initial_size`
    /// bytes (rounded up to the page size).
    pub fn new(initial_size: usize) -> Self {
        let size = rounded_block_size(initial_size);
        let block = Block::new(size).expect("initial arena block allocation failed");
        Arena {
            blocks: RefCell::new(vec![block]),
            current_index: Cell::new(0),
            peak_usage: Cell::new(0),
        }
    }

    /// Allocate `size` bytes aligned to `align` (must be a power of two).
    /// Returns `None` only on backing-store exhaustion.
    pub fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        debug_assert!(align.is_power_of_two());
        let mut blocks = self.blocks.borrow_mut();
        for idx in self.current_index.get()..blocks.len() {
            if let Some(p) = blocks[idx].try_alloc(size, align) {
                self.current_index.set(idx);
                drop(blocks);
                self.bump_peak();
                return Some(p);
            }
        }
        let new_size = rounded_block_size(size.max(align));
        let mut new_block = Block::new(new_size)?;
        let p = new_block.try_alloc(size, align)?;
        blocks.push(new_block);
        self.current_index.set(blocks.len() - 1);
        drop(blocks);
        self.bump_peak();
        Some(p)
    }

    /// Allocate with the default 8-byte alignment.
    pub fn alloc_default(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc(size, DEFAULT_ALIGN)
    }

    /// Allocate aligned to a cache line (64 bytes); used for pairing
    /// intermediates where avoiding false sharing matters.
    pub fn alloc_cache_aligned(&self, size: usize) -> Option<NonNull<u8>> {
        self.alloc(size, CACHE_LINE_ALIGN)
    }

    /// Allocate or report an [`EngineError::ArenaExhausted`].
    pub fn try_alloc_or(&self, size: usize, align: usize) -> Result<NonNull<u8>, EngineError> {
        self.alloc(size, align).ok_or_else(|| EngineError::ArenaExhausted {
            requested: size,
            available: self.total_remaining(),
        })
    }

    /// Take a checkpoint of the current cursor position.
    pub fn checkpoint(&self) -> Checkpoint {
        let idx = self.current_index.get();
        let position = self.blocks.borrow()[idx].used;
        Checkpoint {
            block_index: idx,
            position,
        }
    }

    /// Restore to a previously taken checkpoint. Every pointer allocated
    /// after the checkpoint was taken is invalidated.
    pub fn restore(&self, cp: Checkpoint) {
        let mut blocks = self.blocks.borrow_mut();
        blocks[cp.block_index].used = cp.position;
        for b in blocks.iter_mut().skip(cp.block_index + 1) {
            b.used = 0;
        }
        self.current_index.set(cp.block_index);
    }

    /// Rewind every block to empty and reset the cursor to the head block.
    pub fn reset(&self) {
        let mut blocks = self.blocks.borrow_mut();
        for b in blocks.iter_mut() {
            b.used = 0;
        }
        self.current_index.set(0);
    }

    /// High-water mark of total bytes used across all blocks, monotonic for
    /// the arena's lifetime.
    pub fn peak_usage(&self) -> usize {
        self.peak_usage.get()
    }

    fn total_remaining(&self) -> usize {
        self.blocks.borrow().iter().map(Block::remaining).sum()
    }

    fn bump_peak(&self) {
        let used: usize = self.blocks.borrow().iter().map(|b| b.used).sum();
        if used > self.peak_usage.get() {
            self.peak_usage.set(used);
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new(DEFAULT_BLOCK_SIZE)
    }
}

const SCRATCH_ARENA_SIZE: usize = 256 * 1024;

thread_local! {
    static SCRATCH: RefCell<Option<Arena>> = RefCell::new(None);
}

/// Borrow the current thread's lazily-created 256 KiB scratch arena for
/// pairing intermediates. Created on first use, destroyed on thread exit.
pub fn with_scratch<R>(f: impl FnOnce(&Arena) -> R) -> R {
    SCRATCH.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(Arena::new(SCRATCH_ARENA_SIZE));
        }
        f(slot.as_ref().unwrap())
    })
}
