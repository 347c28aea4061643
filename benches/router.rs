//! Benchmarks for routing table lookups.
//!
//! Run with: cargo bench --bench router

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smsrouter::router::{Connector, FieldPattern, Filter, Pdu, Routable, Route, RoutingTable, User};
use smsrouter::script::{LuaScriptEngine, ScriptEngine, ScriptLimits};

fn routable() -> Routable {
    Routable::submit_sm(
        Pdu::submit_sm("2588", "+258841234567", "hello world"),
        User::new("user1", "g1"),
    )
}

fn bench_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern");

    group.bench_function("prefix", |b| {
        let pattern = FieldPattern::new(r"\+258").unwrap();
        b.iter(|| black_box(pattern.matches("+258841234567")))
    });

    group.bench_function("alternation", |b| {
        let pattern = FieldPattern::new(r"\+258(84|82|86|87)").unwrap();
        b.iter(|| black_box(pattern.matches("+258841234567")))
    });

    group.bench_function("mismatch", |b| {
        let pattern = FieldPattern::new(r"\+27").unwrap();
        b.iter(|| black_box(pattern.matches("+258841234567")))
    });

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let routable = routable();

    group.bench_function("user", |b| {
        let filter = Filter::user("user1");
        b.iter(|| black_box(filter.matches(&routable)))
    });

    group.bench_function("destination_addr", |b| {
        let filter = Filter::destination_addr(r"\+25884").unwrap();
        b.iter(|| black_box(filter.matches(&routable)))
    });

    group.bench_function("eval_script", |b| {
        let engine: Arc<dyn ScriptEngine> =
            Arc::new(LuaScriptEngine::new(ScriptLimits::default()).unwrap());
        let filter = Filter::eval_script("result = routable.user_id == 'user1'", engine).unwrap();
        b.iter(|| black_box(filter.matches(&routable)))
    });

    group.finish();
}

fn bench_table_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("table/lookup");
    let routable = routable();

    for size in [10u32, 100, 1000] {
        let mut table = RoutingTable::mt();
        table
            .add(Route::default_route(Connector::smppc("default"), 0.0).unwrap(), 0)
            .unwrap();
        // Only the lowest entry matches, so every lookup scans the whole table
        for order in 1..=size {
            let filter = if order == 1 {
                Filter::destination_addr(r"\+258").unwrap()
            } else {
                Filter::destination_addr(&format!(r"\+{}", 1000 + order)).unwrap()
            };
            let route = Route::static_mt(vec![filter], Connector::smppc(format!("c{}", order)), 0.0)
                .unwrap();
            table.add(route, order).unwrap();
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &table, |b, table| {
            b.iter(|| black_box(table.get_route_for(&routable)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pattern, bench_filters, bench_table_lookup);
criterion_main!(benches);
