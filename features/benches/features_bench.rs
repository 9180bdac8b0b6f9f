use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ernerf_features::{interpolate, stack_windows, DEEPSPEECH_DIM, WINDOW_FRAMES};

fn logits(frames: usize) -> Vec<Vec<f32>> {
    (0..frames)
        .map(|i| (0..DEEPSPEECH_DIM).map(|d| ((i * 31 + d) % 97) as f32 / 97.0).collect())
        .collect()
}

fn bench_interpolate_10s(c: &mut Criterion) {
    let input = logits(500);

    c.bench_function("interpolate_50_to_25_10s", |b| {
        b.iter(|| black_box(interpolate(black_box(&input), 50.0, 25.0, 250)));
    });
}

fn bench_stack_windows_10s(c: &mut Criterion) {
    let rows = logits(500);

    c.bench_function("stack_windows_500x16", |b| {
        b.iter(|| black_box(stack_windows(black_box(&rows), WINDOW_FRAMES).unwrap()));
    });
}

criterion_group!(benches, bench_interpolate_10s, bench_stack_windows_10s);
criterion_main!(benches);
