//! # Loyalty Protocol Benchmarks
//!
//! Hot paths of the points engine:
//!
//! | Path | Expected cost |
//! |------|---------------|
//! | Tier resolution | O(n) validation + O(log n) lookup |
//! | History replay | O(h) |
//! | Backoff delay | O(1) |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loyalty_protocol::{
    backoff_delay, replay_history, resolve_tier, ActionKind, ActionRecord, RetryConfig, Tier,
};
use rand::Rng;

fn tier_table(size: usize) -> Vec<Tier> {
    (0..size)
        .map(|i| Tier::new(format!("Tier-{:03}", i), (i as u64) * 100, vec![]))
        .collect()
}

fn history(len: usize) -> Vec<ActionRecord> {
    let mut rng = rand::thread_rng();
    let mut total = 0u64;
    (0..len)
        .map(|i| {
            let (kind, points) = if rng.gen_bool(0.2) {
                let applied = total.min(rng.gen_range(1..100));
                (ActionKind::Revoke, -(applied as i64))
            } else {
                (ActionKind::Award, rng.gen_range(1..100))
            };
            total = (total as i64 + points) as u64;
            ActionRecord {
                kind,
                action: None,
                points,
                timestamp: i as u64,
                new_total: total,
            }
        })
        .collect()
}

// ============================================================================
// Tier resolution
// ============================================================================

fn bench_resolve_tier(c: &mut Criterion) {
    let mut group = c.benchmark_group("tier-resolution");

    for size in [4usize, 16, 64, 256] {
        let tiers = tier_table(size);
        let top = (size as u64) * 100;

        group.bench_with_input(BenchmarkId::new("resolve_tier", size), &tiers, |b, tiers| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let xp = rng.gen_range(0..top);
                black_box(resolve_tier(xp, tiers).is_ok())
            })
        });
    }

    group.finish();
}

// ============================================================================
// History replay
// ============================================================================

fn bench_replay_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history-replay");
    let tiers = tier_table(8);

    for len in [100usize, 1_000, 10_000] {
        let entries = history(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("replay_history", len), &entries, |b, entries| {
            b.iter(|| black_box(replay_history(entries, &tiers).is_ok()))
        });
    }

    group.finish();
}

// ============================================================================
// Retry backoff
// ============================================================================

fn bench_backoff_delay(c: &mut Criterion) {
    let config = RetryConfig::default();
    c.bench_function("backoff_delay", |b| {
        let mut rng = rand::thread_rng();
        let mut attempt = 0u32;
        b.iter(|| {
            attempt = attempt % config.max_attempts + 1;
            black_box(backoff_delay(&config, attempt, &mut rng))
        })
    });
}

criterion_group!(
    benches,
    bench_resolve_tier,
    bench_replay_history,
    bench_backoff_delay
);
criterion_main!(benches);
