use criterion::{criterion_group, Criterion};

use kcsph2d::dambreak::{dam_geometry, DamBreakConfig, DAM, FLUID};
use kcsph2d::sph::*;

fn bench_gradient_correction(c: &mut Criterion) {
    let config = DamBreakConfig::default();
    let (fluid, dam) = dam_geometry(&config).unwrap();
    let mut sets = vec![fluid, dam];
    let num_fluid = sets[0].len();

    let mut pre_step = Evaluator::new(
        CubicSpline::new(config.h0()),
        vec![Group::new(vec![Equation::gradient_correction_pre_step(FLUID, &[FLUID, DAM])], false)],
    );
    c.bench_function(&format!("GradientCorrectionPreStep, {} fluid particles", num_fluid), |b| {
        b.iter(|| pre_step.evaluate(&mut sets).unwrap())
    });

    let scheme = Group::new(vec![Equation::continuity(FLUID, &[FLUID, DAM])], true);
    let mut corrected = Evaluator::new(
        CubicSpline::new(config.h0()),
        assemble_equations(&[scheme], &CorrectionConfig::new(FLUID, &[FLUID, DAM])),
    );
    c.bench_function(&format!("corrected continuity, {} fluid particles", num_fluid), |b| {
        b.iter(|| corrected.evaluate(&mut sets).unwrap())
    });
}

fn config() -> Criterion {
    Criterion::default().sample_size(20)
}

criterion_group!(
    name = gradient_correction;
    config = config();
    targets = bench_gradient_correction
);
