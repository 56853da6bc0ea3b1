use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::{Deref, Range};

/// A single segment of the simulated address space.
///
/// A block is either free, or occupied by exactly one process. The owner is
/// kept as an `Option`, so a free block structurally has no owner.
///
/// Fields are private: blocks handed out by a [`BlockList`] can be read but
/// never modified outside of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    start: usize,
    size: usize,
    owner: Option<String>,
}

/// An enum for easy comparison of blocks and their order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    Before,
    AdjacentBefore,
    Overlapping,
    AdjacentAfter,
    After,
}

impl Block {
    /// A new, free block covering `start..start + size`.
    pub fn free(start: usize, size: usize) -> Block {
        Block {
            start,
            size,
            owner: None,
        }
    }

    /// The first address covered by this block.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The number of addressable units in this block.
    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the last address covered by this block.
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    /// Get the address range covered by this block.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// The process occupying this block, or `None` if it is free.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Compare two blocks to see how they are ordered.
    pub fn relation(&self, other: &Self) -> Relation {
        let self_range = self.range();
        let other_range = other.range();

        if self_range.end < other_range.start {
            Relation::Before
        } else if self_range.end == other_range.start {
            Relation::AdjacentBefore
        } else if self_range.start < other_range.end {
            Relation::Overlapping
        } else if self_range.start == other_range.end {
            Relation::AdjacentAfter
        } else {
            Relation::After
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner() {
            None => write!(f, "Block({:?}, free)", self.range()),
            Some(owner) => write!(f, "Block({:?}, {})", self.range(), owner),
        }
    }
}

/// A `BlockList` is the ordered sequence of every block in the simulated
/// address space, free and occupied alike.
///
/// Blocks are owned by the list. They may be split or merged internally, but
/// the list only ever hands out shared references.
///
/// It maintains a few invariants, checked by [`stats`](#method.stats):
///
/// - Blocks are sorted by start address.
/// - Each block ends exactly where the next begins: no gaps, no overlaps.
/// - No two free blocks are adjacent, except where the configured layout put a
///   boundary (freed blocks are merged with their neighbours).
/// - No block is empty.
/// - Occupied blocks have a non-empty owner, and no owner appears twice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockList {
    blocks: Vec<Block>,
}

impl<'list> IntoIterator for &'list BlockList {
    type Item = &'list Block;
    type IntoIter = core::slice::Iter<'list, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl Deref for BlockList {
    type Target = [Block];

    fn deref(&self) -> &[Block] {
        &self.blocks
    }
}

impl From<&[Block]> for BlockList {
    fn from(blocks: &[Block]) -> Self {
        BlockList {
            blocks: blocks.to_vec(),
        }
    }
}

impl fmt::Display for BlockList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockList(")?;
        let mut start = true;
        for block in self {
            if !start {
                write!(f, ", ")?;
            } else {
                start = false;
            }
            write!(f, "{}", block)?;
        }

        write!(f, ")")
    }
}

/// Validity contains a representation of all invalid states found in a
/// BlockList.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    /// Number of blocks that do not start after their predecessor.
    pub out_of_orders: usize,
    /// Number of blocks overlapping their predecessor.
    ///
    /// This likely indicates corruption.
    pub overlaps: usize,
    /// Number of blocks that start past the end of their predecessor, leaving
    /// part of the address space unaccounted for.
    pub gaps: usize,
    /// Number of free blocks directly after another free block, where the
    /// layout had no boundary. This means a merge was missed.
    pub adjacents: usize,
    /// Number of blocks with a size of zero.
    pub empties: usize,
    /// Number of occupied blocks with an empty owner.
    pub owner_errors: usize,
    /// Number of occupied blocks whose owner already occupies an earlier block.
    pub duplicate_owners: usize,
}

impl Validity {
    /// Returns a boolean - a simple check if all cases are 0
    pub fn is_valid(&self) -> bool {
        self.out_of_orders == 0
            && self.overlaps == 0
            && self.gaps == 0
            && self.adjacents == 0
            && self.empties == 0
            && self.owner_errors == 0
            && self.duplicate_owners == 0
    }
}

impl From<Validity> for bool {
    fn from(v: Validity) -> bool {
        v.is_valid()
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Number of blocks.
    pub length: usize,
    /// Total size of all blocks.
    pub size: usize,
    /// Total size of free blocks.
    pub free: usize,
    /// Total size of occupied blocks.
    pub used: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
}

impl BlockList {
    /// Build a list of free blocks from `(start, size)` pairs.
    ///
    /// No validation is done here; use [`stats`](#method.stats) to check.
    pub fn from_layout<I: IntoIterator<Item = (usize, usize)>>(layout: I) -> Self {
        BlockList {
            blocks: layout
                .into_iter()
                .map(|(start, size)| Block::free(start, size))
                .collect(),
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Copy the blocks out into an owned vector.
    pub fn to_vec(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Index of the block occupied by `owner`, if any.
    pub fn position_of(&self, owner: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.owner() == Some(owner))
    }

    /// Split the block at `index` so it is exactly `size` long, inserting the
    /// remainder as a new free block directly after it.
    ///
    /// Returns whether a remainder was inserted; an exact fit leaves the list
    /// as it was.
    ///
    /// Panics if `size` is zero or larger than the block.
    pub fn split(&mut self, index: usize, size: usize) -> bool {
        let block = &mut self.blocks[index];
        if size == 0 || size > block.size {
            panic!(
                "Can't split a block of size {} off of a block of size {}",
                size, block.size,
            );
        }

        let remaining = block.size - size;
        if remaining == 0 {
            return false;
        }

        block.size = size;
        let remainder = Block::free(block.start + size, remaining);
        log::trace!("  Splitting {} into {} + {}", index, size, remainder);
        self.blocks.insert(index + 1, remainder);
        true
    }

    /// Mark the block at `index` as occupied by `owner`.
    ///
    /// Panics if the block is already occupied.
    pub fn occupy(&mut self, index: usize, owner: String) {
        let block = &mut self.blocks[index];
        assert!(block.is_free(), "Can't occupy {}: already occupied", block);
        block.owner = Some(owner);
    }

    /// Mark the block at `index` as free, and return its previous owner.
    pub fn release(&mut self, index: usize) -> Option<String> {
        self.blocks[index].owner.take()
    }

    /// Attempt to merge the block at `index` with the next.
    ///
    /// If both are free and the next begins exactly where this one ends, the
    /// two will merge and this will return true; otherwise, this will return
    /// false.
    pub fn try_merge_next(&mut self, index: usize) -> bool {
        let (this, next) = match self.blocks.get(index..index + 2) {
            Some([this, next]) => (this, next),
            _ => return false,
        };
        if !this.is_free() || !next.is_free() || this.end() != next.start {
            return false;
        }

        let next = self.blocks.remove(index + 1);
        log::trace!("  Merging {} into {}", next, self.blocks[index]);
        self.blocks[index].size += next.size;
        true
    }

    /// Check current size of the list, and whether its valid.
    ///
    /// With no layout to compare against, any two adjacent free blocks count
    /// as a missed merge. See [`check`](#method.check).
    pub fn stats(&self) -> (Validity, Stats) {
        self.check(&[])
    }

    /// Check current size of the list, and whether its valid, allowing two
    /// free blocks to sit side by side where a block of `layout` starts.
    ///
    /// `layout` must be sorted by start address.
    pub fn check(&self, layout: &[Block]) -> (Validity, Stats) {
        let mut validity: Validity = Default::default();
        let mut stats: Stats = Default::default();
        let mut owners: BTreeSet<&str> = BTreeSet::new();

        let mut previous: Option<&Block> = None;
        for next in self.iter() {
            match previous.map(|p| p.relation(next)) {
                Some(Relation::Before) => {
                    // Right order, but some addresses belong to no block.
                    validity.gaps += 1;
                }
                Some(Relation::AdjacentBefore) => {
                    // This is valid, do nothing.
                }
                Some(Relation::Overlapping) => {
                    // This is really bad.
                    validity.overlaps += 1;
                }
                Some(Relation::AdjacentAfter) | Some(Relation::After) => {
                    // Wrong order.
                    validity.out_of_orders += 1;
                }
                None => {
                    // This is the first in the list. Valid, do nothing.
                }
            }

            if let Some(p) = previous {
                let boundary = layout
                    .binary_search_by_key(&next.start, Block::start)
                    .is_ok();
                if p.is_free() && next.is_free() && !boundary {
                    validity.adjacents += 1;
                }
            }

            if next.size == 0 {
                validity.empties += 1;
            }

            match next.owner() {
                None => {
                    stats.free += next.size;
                    stats.free_blocks += 1;
                }
                Some(owner) => {
                    if owner.is_empty() {
                        validity.owner_errors += 1;
                    }
                    if !owners.insert(owner) {
                        validity.duplicate_owners += 1;
                    }
                    stats.used += next.size;
                }
            }

            stats.length += 1;
            stats.size += next.size;
            previous = Some(next);
        }

        (validity, stats)
    }
}
