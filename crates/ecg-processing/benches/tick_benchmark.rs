//! Per-tick cost of the acquisition pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecg_core::{ChannelPair, ChannelSource, EcgResult};
use ecg_processing::{derive, FilterBank, Pipeline, PipelineConfig};
use std::time::Duration;

struct Ramp(f32);

impl ChannelSource for Ramp {
    fn read_channels(&mut self) -> EcgResult<ChannelPair<f32>> {
        self.0 = (self.0 + 1.0) % 1024.0;
        Ok(ChannelPair::new(self.0, 1024.0 - self.0))
    }

    fn name(&self) -> &str {
        "ramp"
    }
}

fn bench_filter_bank(c: &mut Criterion) {
    let config = PipelineConfig::reference_design();
    let mut bank = FilterBank::new(&config.filter_stages);
    let mut x = 0.0_f32;

    c.bench_function("filter_bank_pair", |b| {
        b.iter(|| {
            x += 1.0;
            black_box(bank.process_pair(black_box(ChannelPair::new(x, -x))))
        })
    });
}

fn bench_pipeline_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_tick");

    for calibrated in [false, true] {
        let mut config = PipelineConfig::reference_design();
        config.calibration_secs = 0.1;
        let mut pipeline = Pipeline::new(config, Ramp(0.0)).expect("valid config");
        let elapsed = if calibrated {
            Duration::from_secs(1)
        } else {
            Duration::ZERO
        };

        group.bench_with_input(
            BenchmarkId::new("reference", if calibrated { "calibrated" } else { "collecting" }),
            &elapsed,
            |b, elapsed| b.iter(|| black_box(pipeline.process_tick(*elapsed))),
        );
    }

    group.finish();
}

fn bench_derive(c: &mut Criterion) {
    c.bench_function("derive_leads", |b| {
        b.iter(|| black_box(derive(black_box(0.7), black_box(-0.3))))
    });
}

criterion_group!(benches, bench_filter_bank, bench_pipeline_tick, bench_derive);
criterion_main!(benches);
