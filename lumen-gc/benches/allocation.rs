use criterion::{criterion_group, criterion_main, Criterion};
use lumen_gc::{GarbageCollector, GcConfig, Trace, WorkQueue};

struct Leaf(u64);
impl Trace for Leaf {
    fn trace(&self, _queue: &mut WorkQueue) {}
}

fn allocate_many(c: &mut Criterion) {
    c.bench_function("allocate_1000_leaves", |b| {
        b.iter(|| {
            let gc = GarbageCollector::new(GcConfig::default());
            for i in 0..1000u64 {
                let _ = gc.allocate(Leaf(i)).unwrap();
            }
        });
    });
}

criterion_group!(benches, allocate_many);
criterion_main!(benches);
