use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gatekeeper::config::RoutePolicyConfig;
use gatekeeper::rate_limit::{InMemoryStore, LimiterClass, RateLimitConfig, RateLimiter};
use gatekeeper::routes::RoutePolicy;
use std::sync::Arc;

fn benchmark_route_classification(c: &mut Criterion) {
    let policy = RoutePolicy::new(RoutePolicyConfig::default());

    let mut group = c.benchmark_group("route_classification");
    for path in [
        "/_next/static/chunks/main.js",
        "/products/widgets",
        "/api/admin/users",
        "/dashboard/orders",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(path), path, |b, path| {
            b.iter(|| black_box(policy.classify(black_box(path))))
        });
    }
    group.finish();
}

fn benchmark_limiter_selection(c: &mut Criterion) {
    let policy = RoutePolicy::new(RoutePolicyConfig::default());

    c.bench_function("limiter_selection", |b| {
        b.iter(|| {
            black_box(policy.limiter_class(black_box("/api/admin/users")));
            black_box(policy.limiter_class(black_box("/api/products")));
            black_box(policy.limiter_class(black_box("/products")));
        })
    });
}

fn benchmark_in_memory_limiter(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let limiter = RateLimiter::new(
        LimiterClass::Api,
        RateLimitConfig {
            limit: 1_000_000,
            window_ms: 60_000,
        },
        Arc::new(InMemoryStore::new()),
    );

    c.bench_function("in_memory_limiter_check", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(limiter.check(black_box("203.0.113.10")).await) })
    });
}

criterion_group!(
    benches,
    benchmark_route_classification,
    benchmark_limiter_selection,
    benchmark_in_memory_limiter
);
criterion_main!(benches);
