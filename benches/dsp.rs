use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lancall::audio::AudioDsp;
use lancall::constants::AUDIO_WINDOW_BYTES;

fn voice_window() -> Vec<u8> {
    let mut window = Vec::with_capacity(AUDIO_WINDOW_BYTES);
    for i in 0..AUDIO_WINDOW_BYTES / 2 {
        let sample: i16 = if i % 2 == 0 { 4000 } else { -4000 };
        window.extend_from_slice(&sample.to_le_bytes());
    }
    window
}

fn dsp_benchmark(c: &mut Criterion) {
    let window = voice_window();
    c.bench_function("dsp_process_window", |b| {
        let mut dsp = AudioDsp::new();
        b.iter(|| {
            let mut buf = window.clone();
            black_box(dsp.process(black_box(&mut buf)));
        });
    });
}

criterion_group!(benches, dsp_benchmark);
criterion_main!(benches);
