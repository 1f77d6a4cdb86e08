use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use flat_hash::FlatTable;
use flat_hash::allocator::Allocator;
use flat_hash::allocator::Global;
use flat_hash::allocator::TrackingAllocator;
use flat_hash::flat_table::Entry;
use flat_hash::group::ControlGroup;
use flat_hash::group::DefaultGroup;
use flat_hash::group::ScalarGroup;

#[derive(Parser, Debug)]
struct Args {
    /// Slots to allocate up front.
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Share of the inserted values to remove before defragmenting.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 30)]
    remove_percent: u8,

    /// Probe one control byte at a time even where SSE2 is available.
    #[arg(long)]
    scalar: bool,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn report<A: Allocator, G: ControlGroup>(stage: &str, table: &FlatTable<u64, A, G>) {
    println!();
    println!("--- {stage} ---");
    table.probe_histogram(|&v| hash_u64(v)).print();
    table.debug_stats().print();
}

fn run<G: ControlGroup>(args: &Args) {
    let tracker = TrackingAllocator::new(Global);
    let mut table: FlatTable<u64, _, G> =
        FlatTable::with_capacity_in(args.target_capacity, &tracker);

    println!("Group width: {}", G::WIDTH);
    println!("Actual capacity: {}", table.capacity());

    // Stop right at the load threshold so the fill never triggers a grow.
    let num_values = (table.capacity() * 7 / 10) as u64;
    println!("Filling table with {num_values} u64 values...");
    for value in 0..num_values {
        match table.entry(hash_u64(value), |&v| v == value, |&v| hash_u64(v)) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => {
                panic!("Value already exists in table: {}", value);
            }
        }
    }

    println!("Inserted {} values into table", table.len());
    println!(
        "Final load factor: {:.2}%",
        (table.len() as f64 / table.capacity() as f64) * 100.0
    );
    report("after fill", &table);

    let to_remove = num_values * u64::from(args.remove_percent.min(100)) / 100;
    for value in 0..to_remove {
        table.remove(hash_u64(value), |&v| v == value);
    }
    report(&format!("after removing {to_remove} values"), &table);

    table.defragment(|&v| hash_u64(v));
    report("after defragment", &table);

    let stats = tracker.stats();
    println!();
    println!(
        "Allocator: {} allocations, {} deallocations, {} bytes live",
        stats.allocations,
        stats.deallocations,
        stats.live_bytes()
    );
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating FlatTable with target capacity: {}",
        args.target_capacity
    );

    if args.scalar {
        run::<ScalarGroup>(&args);
    } else {
        run::<DefaultGroup>(&args);
    }
}
