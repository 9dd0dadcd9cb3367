//! 링 버퍼 벤치마크
//!
//! 전송 경로(add -> peek -> remove)와 오버플로우 flush 비용을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logship_core::event::Event;
use logship_core::types::Severity;
use logship_log_pipeline::buffer::{OverflowStore, RingBuffer};

fn create_event(i: usize) -> Event {
    Event::new(
        "bench-host",
        "bash_history",
        "command_executed",
        Severity::Low,
        format!("ls -la /srv/data/{i}"),
    )
    .with_command(format!("ls -la /srv/data/{i}"))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn bench_add_and_drain(c: &mut Criterion) {
    let rt = runtime();
    let dir = tempfile::tempdir().expect("tempdir");
    let events: Vec<Event> = (0..1000).map(create_event).collect();

    let mut group = c.benchmark_group("ring_buffer");
    for batch_size in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("add_then_drain", batch_size),
            &batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    rt.block_on(async {
                        let store = OverflowStore::new(dir.path().join("unused.json"));
                        let mut buffer = RingBuffer::new(events.len(), store);
                        for event in &events {
                            buffer.add(event.clone()).await.expect("add");
                        }
                        while !buffer.is_empty() {
                            let batch = buffer.peek_batch(batch_size);
                            buffer.remove_front(black_box(batch.len()));
                        }
                    })
                })
            },
        );
    }
    group.finish();
}

fn bench_overflow_flush(c: &mut Criterion) {
    let rt = runtime();
    let dir = tempfile::tempdir().expect("tempdir");

    let mut group = c.benchmark_group("overflow");
    for capacity in [100usize, 1000] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("flush", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    rt.block_on(async {
                        let path = dir.path().join(format!("buffer-{capacity}.json"));
                        let store = OverflowStore::new(&path);
                        let mut buffer = RingBuffer::new(capacity, store);
                        for i in 0..capacity {
                            buffer.add(create_event(i)).await.expect("add");
                        }
                        buffer.flush().await.expect("flush");
                        buffer.overflow().remove().await.expect("remove");
                    })
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_add_and_drain, bench_overflow_flush);
criterion_main!(benches);
