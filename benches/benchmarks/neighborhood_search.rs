use cgmath::prelude::*;
use criterion::{black_box, criterion_group, Criterion};
use rand::prelude::*;

use kcsph2d::sph::neighborhood_search::NeighborhoodSearch;
use kcsph2d::sph::ParticleSet;
use kcsph2d::units::*;

fn bench_neighborhood_search(c: &mut Criterion) {
    const NUM_POSITIONS: usize = 20000;
    const DENSITY: Real = 10.0;
    let search_radius = black_box(1.0);

    let mut rng: rand::rngs::SmallRng = rand::SeedableRng::seed_from_u64(123456789);
    let extent = (NUM_POSITIONS as Real / DENSITY).sqrt();
    let x: Vec<Real> = (0..NUM_POSITIONS).map(|_| rng.gen::<Real>() * extent).collect();
    let y: Vec<Real> = (0..NUM_POSITIONS).map(|_| rng.gen::<Real>() * extent).collect();
    let ones = vec![1.0; NUM_POSITIONS];
    let sets = vec![ParticleSet::wcsph("fluid", &x, &y, &ones, &ones, &ones).unwrap()];

    let mut searcher = NeighborhoodSearch::new(search_radius);
    searcher.update(&sets);

    c.bench_function(
        &format!(
            "neighborhood_search.update (warm), {} positions, {} density, {} search_radius",
            NUM_POSITIONS, DENSITY, search_radius
        ),
        |b| b.iter(|| searcher.update(&sets)),
    );

    c.bench_function(
        &format!(
            "neighborhood_search.foreach_neighbor, {} positions, {} density, {} search_radius",
            NUM_POSITIONS, DENSITY, search_radius
        ),
        |b| {
            let positions = &sets[0].positions;
            let mut pindex = 0; // cycle through position for a more balanced result
            b.iter(|| {
                let mut accum: Vector = Zero::zero();
                searcher.foreach_neighbor(0, positions, positions[pindex], |_, ri_to_rj, _| {
                    accum += ri_to_rj;
                });
                pindex = (pindex + 1) % NUM_POSITIONS;
                accum
            })
        },
    );
}

fn config() -> Criterion {
    Criterion::default().warm_up_time(core::time::Duration::new(0, 1000))
}

criterion_group!(
    name = neighborhood_search;
    config = config();
    targets = bench_neighborhood_search
);
