use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use guard_core::ForceMonitor;

// Synthetic force trace: slow drift with additive noise
fn synth_trace(n: usize, noise_amp: f64, seed: u32) -> Vec<[f64; 3]> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 / 200.0;
            let s = t.sin();
            [
                s + (next() * 2.0 - 1.0) * noise_amp,
                s + (next() * 2.0 - 1.0) * noise_amp,
                s + (next() * 2.0 - 1.0) * noise_amp,
            ]
        })
        .collect()
}

fn bench_push(c: &mut Criterion) {
    let trace = synth_trace(4_000, 0.1, 7);
    for window in [25usize, 100] {
        c.bench_function(&format!("push_sample_window_{window}"), |b| {
            b.iter_batched(
                || {
                    let mut m = ForceMonitor::new(window, window).unwrap();
                    m.set_threshold([4.0, 4.0, 2.0]).unwrap();
                    m.enable();
                    m
                },
                |mut m| {
                    for s in &trace {
                        m.push_sample(black_box(*s));
                    }
                    black_box(m.flag_exceeded())
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(benches, bench_push);
criterion_main!(benches);
