//! Benchmarks for blacklist domain lookup.
//!
//! Measures how quickly we can find the most specific blacklisted suffix.

use criterion::{BenchmarkId, Criterion, Throughput, black_box};

use dnsgate::filter::Blacklist;

fn build_blacklist() -> Blacklist {
    let mut text = String::new();
    for i in 0..10_000 {
        text.push_str(&format!("ads{i}.tracker{}.com::127.0.0.1\n", i % 97));
    }
    text.push_str("doubleclick.com::0.0.0.0\n");
    Blacklist::parse(&text).unwrap()
}

fn bench_matches(c: &mut Criterion) {
    let blacklist = build_blacklist();

    let mut group = c.benchmark_group("blacklist");
    group.throughput(Throughput::Elements(1));

    // Benchmark exact match
    group.bench_function(BenchmarkId::new("matches", "exact_match"), |b| {
        b.iter(|| blacklist.matches(black_box("doubleclick.com")))
    });

    // Benchmark subdomain match (blocked via parent)
    group.bench_function(BenchmarkId::new("matches", "subdomain_match"), |b| {
        b.iter(|| blacklist.matches(black_box("ads.tracking.doubleclick.com")))
    });

    // Benchmark miss
    group.bench_function(BenchmarkId::new("matches", "miss"), |b| {
        b.iter(|| blacklist.matches(black_box("www.google.com")))
    });

    // Benchmark deep subdomain miss
    group.bench_function(BenchmarkId::new("matches", "deep_miss"), |b| {
        b.iter(|| blacklist.matches(black_box("a.b.c.d.e.f.example.org")))
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut text = String::new();
    for i in 0..10_000 {
        text.push_str(&format!("ads{i}.example.com::127.0.0.1\n"));
    }

    c.bench_function("blacklist/parse_10k", |b| {
        b.iter(|| Blacklist::parse(black_box(&text)).unwrap())
    });
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_matches(&mut criterion);
    bench_parse(&mut criterion);
    criterion.final_summary();
}
