//! Allocator types, both single-threaded and lock-protected.
//!
//! ## Basic Types
//!
//! ### [`Allocator`](struct.Allocator.html)
//!
//! An `Allocator` is a single-threaded simulator of one address space. It owns
//! the [`BlockList`](../blocklist/struct.BlockList.html), the active
//! [`Strategy`](../strategy/enum.Strategy.html), and a snapshot of the layout
//! it was built with, which [`reset`](struct.Allocator.html#method.reset)
//! returns to.
//!
//! ### [`SyncAllocator`](struct.SyncAllocator.html)
//!
//! A `SyncAllocator` wraps `Allocator` with a spin lock to make it thread-safe.
//! Every operation takes the lock once, so each call is atomic with respect to
//! the others.
//!
//! ### [`Request`](struct.Request.html)
//!
//! A `Request` asks for `size` units on behalf of a process.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use log::debug;
use spin::{Mutex, MutexGuard};

use crate::blocklist::{Block, BlockList, Relation, Stats, Validity};
use crate::strategy::Strategy;

/// A request for `size` contiguous units, to be owned by `process_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub process_id: String,
    pub size: usize,
}

impl Request {
    pub fn new<S: Into<String>>(process_id: S, size: usize) -> Self {
        Request {
            process_id: process_id.into(),
            size,
        }
    }
}

/// Why an allocation was refused. In every case the blocks are left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// No free block is large enough under the active strategy.
    NoFit { size: usize },
    /// Zero-sized requests would create an empty block.
    ZeroSize,
    /// An occupied block needs a non-empty owner.
    EmptyProcessId,
    /// The process already occupies a block.
    AlreadyAllocated { process_id: String },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::NoFit { size } => write!(f, "no free block of size {} or larger", size),
            AllocError::ZeroSize => write!(f, "cannot allocate a block of size 0"),
            AllocError::EmptyProcessId => write!(f, "process id must not be empty"),
            AllocError::AlreadyAllocated { process_id } => {
                write!(f, "process {} already holds a block", process_id)
            }
        }
    }
}

/// Why a deallocation was refused. The blocks are left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeallocError {
    /// No block is occupied by this process: unknown, or already freed.
    NotFound { process_id: String },
}

impl fmt::Display for DeallocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeallocError::NotFound { process_id } => {
                write!(f, "no block is held by process {}", process_id)
            }
        }
    }
}

/// A layout that is not a valid partition of an address space. `index` is the
/// position of the first offending block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutError {
    EmptyBlock { index: usize },
    Gap { index: usize },
    Overlap { index: usize },
    OutOfOrder { index: usize },
    /// The block ends past the last representable address.
    Overflow { index: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::EmptyBlock { index } => write!(f, "block {} has size 0", index),
            LayoutError::Gap { index } => {
                write!(f, "block {} starts after the end of the block before it", index)
            }
            LayoutError::Overlap { index } => {
                write!(f, "block {} overlaps the block before it", index)
            }
            LayoutError::OutOfOrder { index } => {
                write!(f, "block {} starts before the block before it", index)
            }
            LayoutError::Overflow { index } => {
                write!(f, "block {} ends past the largest address", index)
            }
        }
    }
}

/// Check that `layout` is a gapless, ordered partition with no empty blocks,
/// all of whose addresses fit in a `usize`.
pub fn validate_layout(layout: &[(usize, usize)]) -> Result<(), LayoutError> {
    let mut previous: Option<Block> = None;
    for (index, &(start, size)) in layout.iter().enumerate() {
        if size == 0 {
            return Err(LayoutError::EmptyBlock { index });
        }
        if start.checked_add(size).is_none() {
            return Err(LayoutError::Overflow { index });
        }
        let block = Block::free(start, size);
        match previous.as_ref().map(|p| p.relation(&block)) {
            None | Some(Relation::AdjacentBefore) => {}
            Some(Relation::Before) => return Err(LayoutError::Gap { index }),
            Some(Relation::Overlapping) => return Err(LayoutError::Overlap { index }),
            Some(Relation::AdjacentAfter) | Some(Relation::After) => {
                return Err(LayoutError::OutOfOrder { index })
            }
        }
        previous = Some(block);
    }

    Ok(())
}

/// A single-threaded simulator of placement over one address space.
#[derive(Clone, Debug)]
pub struct Allocator {
    blocks: BlockList,
    strategy: Strategy,
    initial: Box<[Block]>,
}

impl Allocator {
    /// Build an allocator over `layout`, a list of `(start, size)` pairs, with
    /// every block free.
    ///
    /// The layout must already be sorted, contiguous, and free of empty
    /// blocks; this is only checked in debug builds. Use
    /// [`try_new`](#method.try_new) for untrusted input.
    pub fn new<I>(layout: I, strategy: Strategy) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let blocks = BlockList::from_layout(layout);
        let initial: Box<[Block]> = blocks.to_vec().into_boxed_slice();
        debug!(
            "New {} allocator over {} blocks: {}",
            strategy,
            blocks.len(),
            blocks
        );

        let allocator = Allocator {
            blocks,
            strategy,
            initial,
        };
        allocator.debug_validate();
        allocator
    }

    /// Build an allocator over `layout`, checking first that it is a valid
    /// partition.
    pub fn try_new<I>(layout: I, strategy: Strategy) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let layout: Vec<(usize, usize)> = layout.into_iter().collect();
        validate_layout(&layout)?;
        Ok(Allocator::new(layout, strategy))
    }

    /// Build an allocator over consecutive blocks of the given sizes, starting
    /// at address 0.
    pub fn from_sizes<I>(sizes: I, strategy: Strategy) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = usize>,
    {
        Allocator::try_new(crate::contiguous(sizes)?, strategy)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Change the strategy used by later calls to
    /// [`allocate`](#method.allocate). Existing blocks are not touched.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        debug!("Strategy: {} -> {}", self.strategy, strategy);
        self.strategy = strategy;
    }

    /// A read-only view of the current blocks, in address order.
    pub fn blocks(&self) -> &BlockList {
        &self.blocks
    }

    /// An owned copy of the current blocks, in address order.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.to_vec()
    }

    /// The blocks as they were at construction, and after every reset.
    pub fn initial_layout(&self) -> &[Block] {
        &self.initial
    }

    /// The block occupied by `process_id`, if any.
    pub fn find(&self, process_id: &str) -> Option<&Block> {
        self.blocks
            .position_of(process_id)
            .map(|index| &self.blocks[index])
    }

    /// Check current size of the block list, and whether its valid.
    ///
    /// Free blocks may sit side by side only where the initial layout had a
    /// boundary; anywhere else, a merge was missed.
    pub fn stats(&self) -> (Validity, Stats) {
        self.blocks.check(&self.initial)
    }

    /// Place `request` in a single free block chosen by the active strategy.
    ///
    /// The chosen block shrinks to exactly `request.size`, and whatever is
    /// left over becomes a new free block right after it. Free neighbours are
    /// never combined to make room; a request that fits no single block fails.
    ///
    /// Returns the address range given to the process.
    pub fn allocate(&mut self, request: Request) -> Result<Range<usize>, AllocError> {
        let Request { process_id, size } = request;
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if process_id.is_empty() {
            return Err(AllocError::EmptyProcessId);
        }
        if self.blocks.position_of(&process_id).is_some() {
            return Err(AllocError::AlreadyAllocated { process_id });
        }

        let index = match self.strategy.select(&self.blocks, size) {
            Some(index) => index,
            None => {
                debug!(
                    "Allocating {}@{} with {}: no fit in {}",
                    process_id, size, self.strategy, self.blocks
                );
                return Err(AllocError::NoFit { size });
            }
        };

        self.blocks.split(index, size);
        self.blocks.occupy(index, process_id);

        let range = self.blocks[index].range();
        debug!(
            "Allocated {} at {:?} with {}: {}",
            self.blocks[index].owner().unwrap_or_default(),
            range,
            self.strategy,
            self.blocks
        );
        self.debug_validate();
        Ok(range)
    }

    /// Free the block held by `process_id`, merging it with a free block on
    /// either side.
    ///
    /// Returns the address range the process held.
    pub fn deallocate(&mut self, process_id: &str) -> Result<Range<usize>, DeallocError> {
        let mut index = self
            .blocks
            .position_of(process_id)
            .ok_or_else(|| DeallocError::NotFound {
                process_id: process_id.into(),
            })?;

        let range = self.blocks[index].range();
        self.blocks.release(index);

        // The list was valid before this block was freed, so only the blocks
        // directly before and after it can be free.
        if index > 0 && self.blocks.try_merge_next(index - 1) {
            index -= 1;
        }
        self.blocks.try_merge_next(index);

        debug!(
            "Deallocated {} at {:?}: {}",
            process_id, range, self.blocks
        );
        self.debug_validate();
        Ok(range)
    }

    /// Throw away every allocation and return to the layout given at
    /// construction.
    pub fn reset(&mut self) {
        self.blocks = BlockList::from(&self.initial[..]);
        debug!("Reset: {}", self.blocks);
        self.debug_validate();
    }

    #[inline]
    fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            let (validity, _stats) = self.stats();
            debug_assert!(
                validity.is_valid(),
                "Invalid block list {:?}: {}",
                validity,
                self.blocks
            );
        }
    }
}

/// An [`Allocator`](struct.Allocator.html) behind a spin lock, for sharing
/// one simulated address space between threads.
pub struct SyncAllocator {
    raw: Mutex<Allocator>,
}

impl From<Allocator> for SyncAllocator {
    fn from(allocator: Allocator) -> Self {
        SyncAllocator {
            raw: Mutex::new(allocator),
        }
    }
}

impl SyncAllocator {
    pub fn new<I>(layout: I, strategy: Strategy) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        Allocator::new(layout, strategy).into()
    }

    /// Lock the allocator for a sequence of operations.
    pub fn get_raw(&self) -> MutexGuard<Allocator> {
        self.raw.lock()
    }

    pub fn into_inner(self) -> Allocator {
        self.raw.into_inner()
    }

    pub fn strategy(&self) -> Strategy {
        self.get_raw().strategy()
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        self.get_raw().set_strategy(strategy)
    }

    pub fn allocate(&self, request: Request) -> Result<Range<usize>, AllocError> {
        self.get_raw().allocate(request)
    }

    pub fn deallocate(&self, process_id: &str) -> Result<Range<usize>, DeallocError> {
        self.get_raw().deallocate(process_id)
    }

    pub fn reset(&self) {
        self.get_raw().reset()
    }

    /// An owned copy of the current blocks, taken under the lock.
    pub fn snapshot(&self) -> Vec<Block> {
        self.get_raw().snapshot()
    }

    pub fn stats(&self) -> (Validity, Stats) {
        self.get_raw().stats()
    }
}
