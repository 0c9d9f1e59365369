//! Benchmarks for the pulse-and-poll loop on simulated hardware

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use syncpulse_core::{Line, LineState, PulseConfig};
use syncpulse_device::Command;
use syncpulse_runtime::{ObservedState, PulseScheduler};
use syncpulse_test::{LatencyModel, LineScript, ManualClock, SimulatedDevice, HIGH, LOW};
use syncpulse_time::HybridWait;

fn latency() -> LatencyModel {
    LatencyModel {
        write: Duration::from_micros(100),
        read: Duration::from_micros(400),
        ..LatencyModel::default()
    }
}

fn bench_observe(c: &mut Criterion) {
    let low = LineState::from(LOW);
    let high = LineState::from(HIGH);

    c.bench_function("observe_alternating", |b| {
        let mut observed = ObservedState::primed(low.clone());
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let state = if flip { high.clone() } else { low.clone() };
            black_box(observed.observe(state))
        })
    });
}

fn bench_pulse_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("pulse_train");
    group.sample_size(20);

    for pulses in [1u32, 10, 50] {
        let config = PulseConfig::new(Duration::from_millis(100), Duration::from_millis(400), pulses);
        let times: Vec<Duration> = (1..=pulses as u64)
            .map(|i| Duration::from_millis(i * 310))
            .collect();

        group.throughput(Throughput::Elements(pulses as u64));
        group.bench_with_input(BenchmarkId::new("spin", pulses), &config, |b, config| {
            b.iter(|| {
                let clock = ManualClock::new();
                let mut device = SimulatedDevice::new(clock.clone(), LineScript::toggles(&times))
                    .with_latency(latency());
                let result = PulseScheduler::new(clock).run(&mut device, config).unwrap();
                black_box(result)
            })
        });
        group.bench_with_input(BenchmarkId::new("hybrid", pulses), &config, |b, config| {
            b.iter(|| {
                let clock = ManualClock::new();
                let mut device = SimulatedDevice::new(clock.clone(), LineScript::toggles(&times))
                    .with_latency(latency());
                let result = PulseScheduler::new(clock)
                    .with_wait(HybridWait::default())
                    .run(&mut device, config)
                    .unwrap();
                black_box(result)
            })
        });
    }

    group.finish();
}

fn bench_command_encoding(c: &mut Criterion) {
    let commands: Vec<Command> = (1..=Line::COUNT)
        .filter_map(|n| Line::new(n).ok())
        .flat_map(|l| [Command::Assert(l), Command::Deassert(l), Command::Read(l)])
        .collect();

    c.bench_function("command_bytes", |b| {
        b.iter(|| {
            let sum: u32 = commands.iter().map(|c| black_box(*c).byte() as u32).sum();
            black_box(sum)
        })
    });
}

criterion_group!(
    benches,
    bench_observe,
    bench_pulse_train,
    bench_command_encoding,
);
criterion_main!(benches);
