#![no_std]

//! A basic memory placement simulator.
//!
//! The simulator models one contiguous address space, divided into blocks.
//! Processes ask for a number of units; a placement [`Strategy`] picks the free
//! block to carve them out of, and the leftover becomes a new free block.
//! When a process is freed its block is merged with any free neighbour, so
//! the list of blocks stays as short as it can be.
//!
//! ```
//! use basic_memsim::{Allocator, Request, Strategy};
//!
//! let mut sim = Allocator::from_sizes(vec![10, 9, 20], Strategy::BestFit).unwrap();
//! assert_eq!(sim.allocate(Request::new("P1", 8)), Ok(10..18));
//!
//! sim.set_strategy(Strategy::FirstFit);
//! assert_eq!(sim.allocate(Request::new("P2", 8)), Ok(0..8));
//!
//! sim.deallocate("P1").unwrap();
//! sim.reset();
//! assert!(sim.blocks().iter().all(|b| b.is_free()));
//! ```
//!
//! Nothing here touches real memory: addresses are plain offsets, and all
//! state lives in the [`Allocator`].

extern crate alloc;

use alloc::vec::Vec;

pub mod allocators;
pub mod blocklist;
pub mod strategy;

pub use allocators::{
    validate_layout, AllocError, Allocator, DeallocError, LayoutError, Request, SyncAllocator,
};
pub use blocklist::{Block, BlockList, Stats, Validity};
pub use strategy::{ParseStrategyError, Strategy};

/// Lay blocks of the given sizes end to end, starting at address 0, and
/// return their `(start, size)` pairs.
///
/// Fails with [`LayoutError::Overflow`] if the blocks would run past the
/// largest `usize` address.
pub fn contiguous<I>(sizes: I) -> Result<Vec<(usize, usize)>, LayoutError>
where
    I: IntoIterator<Item = usize>,
{
    let mut start: usize = 0;
    sizes
        .into_iter()
        .enumerate()
        .map(|(index, size)| {
            let block = (start, size);
            match start.checked_add(size) {
                Some(end) => {
                    start = end;
                    Ok(block)
                }
                None => Err(LayoutError::Overflow { index }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::vec;
    use test_env_log::test;

    #[test]
    fn test_contiguous() {
        assert_eq!(
            contiguous(vec![10, 9, 20]),
            Ok(vec![(0, 10), (10, 9), (19, 20)])
        );
        assert_eq!(
            contiguous(Vec::<usize>::new()),
            Ok(Vec::<(usize, usize)>::new())
        );
        assert_eq!(
            contiguous(vec![usize::MAX, 1, 1]),
            Err(LayoutError::Overflow { index: 1 })
        );
        assert!(validate_layout(&contiguous(vec![1, 2, 3]).unwrap()).is_ok());
    }

    #[test]
    fn test_basic() {
        let mut sim = Allocator::from_sizes(vec![64, 64, 224], Strategy::FirstFit)
            .expect("layout should be valid");

        let ranges: Vec<_> = [("A", 64), ("B", 64), ("C", 200)]
            .iter()
            .map(|&(pid, size)| {
                let range = sim.allocate(Request::new(pid, size)).unwrap();
                let (validity, _stats) = sim.stats();
                assert!(validity.is_valid());
                range
            })
            .collect();
        assert_eq!(ranges, vec![0..64, 64..128, 128..328]);
        log::info!("allocated: {}", sim.blocks());

        let (_validity, stats) = sim.stats();
        assert_eq!(stats.used, 328);
        assert_eq!(stats.free, 24);

        ////////////////////////////////////////////////////////////
        // Deallocation

        sim.deallocate("B").unwrap();
        let (validity, stats) = sim.stats();
        assert!(validity.is_valid());
        assert_eq!(stats.free_blocks, 2);
        log::info!("dealloc: {}", sim.blocks());

        // Freeing C merges it with the free block on either side
        sim.deallocate("C").unwrap();
        let (validity, stats) = sim.stats();
        assert!(validity.is_valid());
        assert_eq!(stats.length, 2);
        assert_eq!(sim.blocks()[1].range(), 64..352);

        ////////////////////////////////////////////////////////////
        // Allocation into freed space

        sim.set_strategy(Strategy::BestFit);
        assert_eq!(sim.allocate(Request::new("D", 32)), Ok(64..96));
        assert_eq!(sim.allocate(Request::new("E", 256)), Ok(96..352));
        assert_eq!(
            sim.allocate(Request::new("F", 1)),
            Err(AllocError::NoFit { size: 1 })
        );
        log::info!("done: {}", sim.blocks());
    }
}
