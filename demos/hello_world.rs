extern crate basic_memsim;

use basic_memsim::{Allocator, Request, Strategy};

fn main() {
    let mut sim = Allocator::from_sizes(vec![100, 500, 200, 300, 600], Strategy::default())
        .expect("sizes are all positive");
    sim.allocate(Request::new("hello", 212)).unwrap();
    println!("Hello, World! {}", sim.blocks());
}
