use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use daq_video::core::{Frame, ImageData, PixelBuffer};
use daq_video::data::RingBuffer;

fn frame(seq: u64, width: usize, height: usize) -> Frame {
    let image = ImageData::new(width, height, PixelBuffer::U16(vec![0; width * height]))
        .unwrap_or_else(|err| panic!("bench frame: {}", err));
    Frame::new(seq, image)
}

fn benchmark_put(c: &mut Criterion) {
    let template = frame(0, 640, 480);
    let mut group = c.benchmark_group("ring_buffer_put");
    for capacity in [16usize, 600, 2000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &cap| {
            let mut ring = RingBuffer::new(cap);
            b.iter(|| ring.put(black_box(template.clone())));
        });
    }
    group.finish();
}

fn benchmark_replay_get(c: &mut Criterion) {
    c.bench_function("ring_buffer_get_600", |b| {
        b.iter_batched(
            || {
                let mut ring = RingBuffer::new(600);
                for i in 0..600 {
                    ring.put(frame(i, 64, 48));
                }
                ring
            },
            |mut ring| {
                for _ in 0..600 {
                    black_box(ring.get().ok());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_rotation(c: &mut Criterion) {
    let image = frame(0, 640, 480).data;
    c.bench_function("rotate_640x480_u16", |b| {
        b.iter(|| black_box(image.rotated(1)));
    });
}

criterion_group!(benches, benchmark_put, benchmark_replay_get, benchmark_rotation);
criterion_main!(benches);
