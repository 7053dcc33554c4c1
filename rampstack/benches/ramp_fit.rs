use criterion::{Criterion, criterion_group, criterion_main};
use rampstack::{RampCube, RampFitConfig, RampShape, fit_ramp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bench_fit_ramp(c: &mut Criterion) {
    let mut group = c.benchmark_group("ramp_fit");
    group.sample_size(10);

    let shape = RampShape {
        height: 256,
        width: 256,
        groups: 4,
        reads: 16,
    };
    let times: Vec<Vec<f64>> = (0..shape.groups)
        .map(|g| {
            (0..shape.reads)
                .map(|r| ((g * shape.reads + r + 1) as f64) * 1.47)
                .collect()
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(7);
    let mut reads = Vec::with_capacity(shape.len());
    for _ in 0..shape.pixel_count() {
        let rate = 50.0 + rng.random::<f32>() * 500.0;
        for _ in 0..shape.groups {
            for r in 0..shape.reads {
                let signal = 1000.0 + rate * 1.47 * (r + 1) as f32;
                reads.push((signal + rng.random::<f32>() * 8.0) as u16);
            }
        }
    }

    let cube = RampCube::new(&reads, shape, &times).unwrap();

    let configs = [
        ("ols", RampFitConfig::ols()),
        ("mcds_3", RampFitConfig::mcds(3)),
        ("cds", RampFitConfig::cds()),
    ];

    for (name, config) in configs {
        group.bench_function(name, |b| b.iter(|| fit_ramp(&cube, &config).unwrap()));
    }

    group.finish();
}

criterion_group!(benches, bench_fit_ramp);
criterion_main!(benches);
