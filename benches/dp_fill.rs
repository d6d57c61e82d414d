// Criterion benchmarks for the striped DP fill across read lengths and
// both alignment modes.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stripe_align::alignment::{AlignMode, SwAligner};
use stripe_align::scoring::{CostModel, Scoring};

fn bench_scoring() -> Scoring {
    Scoring::new(
        2,
        CostModel::Constant,
        3,
        3,
        0.0,
        0.0,
        0.0,
        0.0,
        2.0,
        0.1,
        CostModel::Constant,
        3,
        false,
        5,
        5,
        3,
        3,
        2,
        -1,
        false,
    )
    .expect("valid scoring")
}

fn make_case(rng: &mut StdRng, rdlen: usize) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let read: Vec<u8> = (0..rdlen).map(|_| rng.gen_range(0..4) as u8).collect();
    let quals = vec![b'I'; rdlen];
    // Window: the read plus flanking context and a sprinkle of noise.
    let flank = rdlen / 4;
    let mut refw: Vec<u8> = (0..flank).map(|_| rng.gen_range(0..4) as u8).collect();
    for &c in &read {
        if rng.gen_range(0..20) == 0 {
            refw.push(rng.gen_range(0..4) as u8);
        } else {
            refw.push(c);
        }
    }
    refw.extend((0..flank).map(|_| rng.gen_range(0..4) as u8));
    (read, quals, refw)
}

fn bench_fill(c: &mut Criterion) {
    let sc = bench_scoring();
    let mut group = c.benchmark_group("dp_fill");
    for &rdlen in &[64usize, 128, 151] {
        let mut rng = StdRng::seed_from_u64(0xfeed_0000 + rdlen as u64);
        let (read, quals, refw) = make_case(&mut rng, rdlen);
        group.throughput(Throughput::Elements((rdlen * refw.len()) as u64));

        let mut local = SwAligner::new(&sc);
        local.init_read(&read, &quals, AlignMode::Local).unwrap();
        group.bench_function(format!("local_{}", rdlen), |b| {
            b.iter(|| {
                let best = local.align(black_box(&refw), 10).unwrap();
                black_box(best)
            })
        });

        let mut e2e = SwAligner::new(&sc);
        e2e.init_read(&read, &quals, AlignMode::EndToEnd).unwrap();
        group.bench_function(format!("end_to_end_{}", rdlen), |b| {
            b.iter(|| {
                let best = e2e.align(black_box(&refw), -60).unwrap();
                black_box(best)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fill);
criterion_main!(benches);
