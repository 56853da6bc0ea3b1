//! Placement policies.
//!
//! Each [`Strategy`] maps to a selector: a function that looks at the current
//! blocks and picks the index of the free block a request of a given size
//! should be carved out of. Adding a policy means adding one variant and one
//! selector to the table.

use core::fmt;
use core::str::FromStr;

use static_assertions::const_assert_eq;

use crate::blocklist::Block;

/// Picks the index of the block to allocate `size` units from, if any fits.
pub type Selector = fn(&[Block], usize) -> Option<usize>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Take the lowest-addressed free block that is large enough.
    FirstFit = 0,
    /// Take the free block that leaves the smallest remainder; ties go to the
    /// lowest address.
    BestFit = 1,
}

const SELECTORS: [Selector; 2] = [first_fit, best_fit];
const_assert_eq!(SELECTORS.len(), Strategy::ALL.len());

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::FirstFit, Strategy::BestFit];

    pub fn selector(self) -> Selector {
        SELECTORS[self as usize]
    }

    /// Find the index of the block a request of `size` should go into.
    pub fn select(self, blocks: &[Block], size: usize) -> Option<usize> {
        (self.selector())(blocks, size)
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::FirstFit => "first-fit",
            Strategy::BestFit => "best-fit",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::BestFit
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error returned when a string names no known strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParseStrategyError();

impl fmt::Display for ParseStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown strategy; expected first-fit or best-fit")
    }
}

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let matches = |names: &[&str]| names.iter().any(|n| s.eq_ignore_ascii_case(n));

        if matches(&["first-fit", "first_fit", "firstfit", "first"]) {
            Ok(Strategy::FirstFit)
        } else if matches(&["best-fit", "best_fit", "bestfit", "best"]) {
            Ok(Strategy::BestFit)
        } else {
            Err(ParseStrategyError())
        }
    }
}

fn fits(block: &Block, size: usize) -> bool {
    block.is_free() && block.size() >= size
}

fn first_fit(blocks: &[Block], size: usize) -> Option<usize> {
    blocks.iter().position(|block| fits(block, size))
}

fn best_fit(blocks: &[Block], size: usize) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, block) in blocks.iter().enumerate() {
        if !fits(block, size) {
            continue;
        }
        let diff = block.size() - size;
        // Strictly smaller, so the earliest of equal fits wins
        if best.map_or(true, |(_, min_diff)| diff < min_diff) {
            best = Some((index, diff));
        }
    }

    best.map(|(index, _)| index)
}
