//! Region query benchmarks.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use phasegrid_object::{
    DistanceMode, KindMask, ObjectFlags, ObjectInit, ObjectKind, ObjectStore, PhaseId, PhaseShift,
    Position, WorldObject,
};
use phasegrid_query::{AnyObject, QueryContext, QueryOrigin, Viewpoint};
use phasegrid_spatial::{GridGeometry, GridMap};

/// Populate a square of `side` x `side` units with `count` objects on a
/// fixed lattice, alternating two phases.
fn populate(count: u32, side: f32) -> (GridMap, ObjectStore) {
    let mut grid = GridMap::new(GridGeometry::default());
    let mut store = ObjectStore::with_capacity(count as usize);
    let per_row = (count as f32).sqrt().ceil() as u32;
    let step = side / per_row as f32;

    for i in 0..count {
        let position = Position::new(
            (i % per_row) as f32 * step - side / 2.0,
            (i / per_row) as f32 * step - side / 2.0,
            0.0,
        );
        let kind = if i % 4 == 0 { ObjectKind::GameObject } else { ObjectKind::Creature };
        let guid = store.spawn(
            ObjectInit::new(kind, position)
                .with_phase(PhaseShift::with_phases([PhaseId(i % 2)]))
                .with_flags(ObjectFlags::IN_WORLD),
        );
        let Some(cell) = grid.geometry().cell_of(&position) else {
            continue;
        };
        grid.load(cell);
        grid.insert(guid, cell).expect("fresh guid");
    }
    (grid, store)
}

fn find_all_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_all");

    for count in [1_000, 10_000, 100_000] {
        let (grid, store) = populate(count, 2_000.0);
        let context = QueryContext::new(&grid, &store, DistanceMode::Planar);
        let phase = PhaseShift::with_phases([PhaseId(0)]);

        group.throughput(Throughput::Elements(u64::from(count)));
        for radius in [30.0_f32, 100.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("radius_{radius}"), count),
                &radius,
                |b, &radius| {
                    let center = Position::new(0.0, 0.0, 0.0);
                    let origin = QueryOrigin::at(center, radius, Viewpoint::from_phase(&phase));
                    b.iter(|| black_box(context.find_all(&origin, AnyObject)));
                },
            );
        }
    }

    group.finish();
}

fn nearest_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_nearest");

    for count in [1_000, 10_000, 100_000] {
        let (grid, store) = populate(count, 2_000.0);
        let context = QueryContext::new(&grid, &store, DistanceMode::Planar);
        let phase = PhaseShift::with_phases([PhaseId(1)]);

        group.bench_with_input(BenchmarkId::new("creature", count), &count, |b, _| {
            let center = Position::new(5.0, 5.0, 0.0);
            let origin = QueryOrigin::at(center, 100.0, Viewpoint::from_phase(&phase))
                .with_mask(KindMask::CREATURE);
            let idle = |object: &WorldObject| !object.is_in_combat();
            b.iter(|| black_box(context.find_nearest(&origin, idle)));
        });
    }

    group.finish();
}

criterion_group!(benches, find_all_benchmarks, nearest_benchmarks);
criterion_main!(benches);
