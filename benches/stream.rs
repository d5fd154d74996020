#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use color_eyre::eyre;
use criterion::{black_box, Criterion};
use dramsim::{address, trace, Config, Kind, Memory};

/// Strided stream with every fourth request a write.
fn stream(num_requests: u64, stride: u64) -> Vec<Result<(address, Kind), trace::Error>> {
    (0..num_requests)
        .map(|i| {
            let kind = if i % 4 == 3 { Kind::Write } else { Kind::Read };
            Ok((i * stride, kind))
        })
        .collect()
}

pub fn run_stream(config: Config, num_requests: u64, stride: u64) -> eyre::Result<trace::Summary> {
    let mut memory = Memory::new(config)?;
    let summary = trace::run(&mut memory, stream(num_requests, stride))?;
    Ok(summary)
}

pub fn stream_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);

    group.bench_function("wide_io/sequential/4096", |b| {
        b.iter(|| run_stream(black_box(Config::default()), 4096, 0x40).unwrap());
    });
    group.bench_function("wide_io/row_conflicts/4096", |b| {
        b.iter(|| run_stream(black_box(Config::default()), 4096, 0x10_0000).unwrap());
    });
    group.bench_function("smla_cio/4ch/sequential/4096", |b| {
        let config = Config {
            standard: "SMLA_CIO".to_string(),
            org: "SMLA_CIO_1Gb".to_string(),
            speed: "SMLA_CIO_200".to_string(),
            channels: 4,
            ..Config::default()
        };
        b.iter(|| run_stream(black_box(config.clone()), 4096, 0x40).unwrap());
    });
}

criterion::criterion_group!(benches, stream_benchmark);
criterion::criterion_main!(benches);
