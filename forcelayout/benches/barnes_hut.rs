use cgmath::Vector3;
use criterion::{Criterion, criterion_group, criterion_main};
use forcelayout::{
    BarnesHutTree,
    constants::DEFAULT_THETA,
    sim::{direct, repulse},
};

fn gen_random(count: usize) -> (Vec<Vector3<f32>>, Vec<Vector3<f32>>) {
    let mut positions = Vec::new();
    for _ in 0..count {
        positions.push(Vector3::new(
            rand::random_range(-1e2..1e2),
            rand::random_range(-1e2..1e2),
            rand::random_range(-1e2..1e2),
        ));
    }

    let out_buffer = vec![Vector3::new(0.0, 0.0, 0.0); positions.len()];

    (positions, out_buffer)
}

fn kernel(mass: u32, difference: Vector3<f32>, distance_sq: f32) -> Vector3<f32> {
    difference * (mass as f32 * repulse(distance_sq, 1e6, 10.01))
}

fn bench_barnes_hut_random(c: &mut Criterion) {
    let (positions, mut out_buffer) = gen_random(1000);

    c.bench_function("barnes_hut_random_1k", |b| {
        b.iter(|| {
            let mut tree = BarnesHutTree::<3>::new(DEFAULT_THETA);
            tree.build(&positions);
            for (i, out) in out_buffer.iter_mut().enumerate() {
                *out = tree.evaluate_kernel(&positions, i, kernel);
            }
        })
    });
}

fn bench_direct_random(c: &mut Criterion) {
    let (positions, mut out_buffer) = gen_random(1000);

    c.bench_function("direct_random_1k", |b| {
        b.iter(|| direct::iter::<3, _>(&positions, &mut out_buffer, kernel))
    });
}

criterion_group!(benches, bench_barnes_hut_random, bench_direct_random);
criterion_main!(benches);
