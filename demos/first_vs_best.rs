//! Runs the same requests under every strategy and prints where each one
//! lands, so the placements can be compared side by side.

use basic_memsim::{Allocator, Request, Strategy};

const SIZES: [usize; 5] = [100, 500, 200, 300, 600];
const REQUESTS: [(&str, usize); 4] = [("P1", 212), ("P2", 417), ("P3", 112), ("P4", 426)];

fn main() {
    env_logger::init();

    for &strategy in Strategy::ALL.iter() {
        let mut sim = Allocator::from_sizes(SIZES.iter().copied(), strategy)
            .expect("sizes are all positive");
        println!("{}:", strategy);
        for &(pid, size) in REQUESTS.iter() {
            match sim.allocate(Request::new(pid, size)) {
                Ok(range) => println!("    {} ({}) -> {:?}", pid, size, range),
                Err(err) => println!("    {} ({}) -> failed: {}", pid, size, err),
            }
        }
        println!("    {}", sim.blocks());

        let (_validity, stats) = sim.stats();
        println!("    {:?}", stats);

        sim.deallocate("P1").unwrap();
        println!("    after freeing P1: {}", sim.blocks());
        println!();
    }
}
