//! Benchmark for list-op application and proxy edits.
//!
//! Builds a synthetic layer, times the hot paths and prints a JSON summary.

use std::time::{Duration, Instant};

use sdf::{Layer, ListOp, ListOpType, Path};
use serde::Serialize;

const ITEMS: usize = 2_000;
const APPLY_ITERS: u32 = 200;
const PRIMS: usize = 500;

#[derive(Debug, Serialize)]
struct Timing {
    name: &'static str,
    iterations: u64,
    total_us: u128,
    per_iter_ns: u128,
}

impl Timing {
    fn new(name: &'static str, iterations: u64, elapsed: Duration) -> Self {
        Self {
            name,
            iterations,
            total_us: elapsed.as_micros(),
            per_iter_ns: elapsed.as_nanos() / u128::from(iterations.max(1)),
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    version: &'static str,
    items: usize,
    prims: usize,
    field_writes: u64,
    change_batches: u64,
    timings: Vec<Timing>,
}

fn path(text: &str) -> Path {
    Path::parse(text).expect("benchmark paths are valid")
}

fn item_paths(prefix: &str, count: usize) -> Vec<Path> {
    (0..count).map(|i| path(&format!("/{prefix}{i}"))).collect()
}

fn bench_apply(timings: &mut Vec<Timing>) {
    let input = item_paths("Item", ITEMS);
    let op = ListOp::create(
        item_paths("Pre", ITEMS / 10),
        item_paths("App", ITEMS / 10),
        input.iter().step_by(3).cloned().collect(),
    );

    let start = Instant::now();
    for _ in 0..APPLY_ITERS {
        let mut items = input.clone();
        op.apply_operations(&mut items, None);
        std::hint::black_box(&items);
    }
    timings.push(Timing::new("list_op_apply", APPLY_ITERS.into(), start.elapsed()));

    let weaker = ListOp::create(
        item_paths("App", ITEMS / 20),
        item_paths("Pre", ITEMS / 20),
        item_paths("Item", ITEMS / 5),
    );
    let start = Instant::now();
    for _ in 0..APPLY_ITERS {
        std::hint::black_box(op.apply_operations_to(&weaker));
    }
    timings.push(Timing::new("list_op_compose", APPLY_ITERS.into(), start.elapsed()));
}

fn bench_proxies(layer: &Layer, timings: &mut Vec<Timing>) {
    let world = layer.create_prim(&path("/World")).expect("create /World");

    let start = Instant::now();
    for i in 0..PRIMS {
        world
            .create_prim(&format!("Prim{i}"))
            .expect("create child prim");
    }
    timings.push(Timing::new("create_prims", PRIMS as u64, start.elapsed()));

    let rel = world.create_relationship("members").expect("create relationship");
    let targets = rel.target_path_list();
    let start = Instant::now();
    for i in 0..PRIMS {
        targets
            .add(path(&format!("/World/Prim{i}")))
            .expect("add target");
    }
    timings.push(Timing::new("add_targets", PRIMS as u64, start.elapsed()));

    let start = Instant::now();
    for i in (0..PRIMS).step_by(2) {
        targets
            .remove(&path(&format!("/World/Prim{i}")))
            .expect("remove target");
    }
    timings.push(Timing::new("remove_targets", (PRIMS / 2) as u64, start.elapsed()));

    let prepended = targets.get_items(ListOpType::Prepended);
    let start = Instant::now();
    for i in 0..PRIMS / 10 {
        prepended
            .insert(Some(0), path(&format!("/Other{i}")))
            .expect("prepend");
    }
    timings.push(Timing::new("list_proxy_insert", (PRIMS / 10) as u64, start.elapsed()));

    let custom = world.custom_data();
    let start = Instant::now();
    for i in 0..PRIMS {
        custom
            .set(format!("key{i}"), format!("value{i}"))
            .expect("set custom data");
    }
    timings.push(Timing::new("map_set", PRIMS as u64, start.elapsed()));

    let children = world.name_children();
    let start = Instant::now();
    for i in 0..PRIMS / 10 {
        std::hint::black_box(children.find(&format!("Prim{i}")));
    }
    timings.push(Timing::new("children_find", (PRIMS / 10) as u64, start.elapsed()));
}

fn main() {
    let layer = Layer::create_anonymous();
    let mut timings = Vec::new();

    bench_apply(&mut timings);
    bench_proxies(&layer, &mut timings);

    let summary = Summary {
        version: sdf::VERSION,
        items: ITEMS,
        prims: PRIMS,
        field_writes: layer.field_write_count(),
        change_batches: layer.change_batch_count(),
        timings,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).expect("summary serializes")
    );
}
