//! SyncPulse command-line front end
//!
//! Emits a train of trigger pulses on one line of a DLP-IO8-G class
//! controller while logging every change seen on another line.
//!
//! # Usage
//!
//! ```bash
//! # Ten 1s pulses, 4s apart, on the default port
//! syncpulse run
//!
//! # Short pulses on another port
//! syncpulse run --port /dev/ttyACM0 --pulse-duration 50ms --inter-pulse-gap 0.45
//!
//! # Watch the input line until Ctrl-C
//! syncpulse monitor
//!
//! # Show the effective configuration
//! syncpulse --config rig.yaml config
//! ```

mod config;
mod error;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use syncpulse_device::{list_ports, ChannelOpener, DeviceChannel};
use syncpulse_runtime::{write_event, write_report, CancelFlag, PulseScheduler};
use syncpulse_time::MonotonicClock;

use crate::config::{parse_seconds, Config};
use crate::error::{CliError, CliResult};

/// Trigger pulse generator with input-line change logging
#[derive(Parser)]
#[command(name = "syncpulse")]
#[command(version)]
#[command(about = "Emit trigger pulse trains and log input-line changes")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error), overrides the file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the pulse train and report onsets and input changes
    Run(RunArgs),

    /// Log input-line changes without pulsing
    Monitor {
        /// Stop after this long; runs until interrupted otherwise
        #[arg(short, long, value_parser = parse_seconds)]
        duration: Option<Duration>,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Check that the controller answers
    Ping {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// List serial ports
    Ports,

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// High time of each pulse (seconds or e.g. `250ms`)
    #[arg(short = 'd', long, value_parser = parse_seconds)]
    pulse_duration: Option<Duration>,

    /// Low time after each pulse (seconds or e.g. `4s`)
    #[arg(short = 'g', long, value_parser = parse_seconds)]
    inter_pulse_gap: Option<Duration>,

    /// Number of pulses
    #[arg(short = 'n', long)]
    pulse_count: Option<u32>,

    /// Wait strategy: spin or hybrid
    #[arg(long)]
    wait: Option<String>,

    #[command(flatten)]
    device: DeviceArgs,
}

#[derive(Args)]
struct DeviceArgs {
    /// Serial port of the controller
    #[arg(short, long)]
    port: Option<String>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Read timeout (seconds or e.g. `100ms`)
    #[arg(long, value_parser = parse_seconds)]
    read_timeout: Option<Duration>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(d) = self.pulse_duration {
            config.pulse_duration = d;
        }
        if let Some(g) = self.inter_pulse_gap {
            config.inter_pulse_gap = g;
        }
        if let Some(n) = self.pulse_count {
            config.pulse_count = n;
        }
        if let Some(w) = self.wait {
            config.wait = w;
        }
        self.device.apply(config);
    }
}

impl DeviceArgs {
    fn apply(self, config: &mut Config) {
        if let Some(p) = self.port {
            config.port = p;
        }
        if let Some(b) = self.baud_rate {
            config.baud_rate = b;
        }
        if let Some(t) = self.read_timeout {
            config.read_timeout = t;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_logging(&config.log_level);

    match execute(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Report `e` once on stderr
fn fail(e: &CliError) -> ExitCode {
    // Nothing else can be done if stderr itself is gone
    let _ = write_failure(&mut io::stderr().lock(), e);
    ExitCode::FAILURE
}

fn write_failure<W: Write>(out: &mut W, e: &CliError) -> io::Result<()> {
    writeln!(out, "error: {}", e)
}

/// Initialize logging on stderr; `RUST_LOG` wins over the configured level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .init();
}

fn execute(command: Commands, mut config: Config) -> CliResult<()> {
    match command {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate()?;

            let pulse = config.to_pulse_config()?;
            let device = config.to_device_config()?;
            let scheduler = PulseScheduler::new(MonotonicClock::new())
                .with_wait(config.wait_mode()?)
                .with_cancel(cancel_on_signal()?)
                .with_read_size(config.read_size);

            tracing::info!(
                port = %device.port,
                wait = %config.wait,
                "starting pulse train"
            );
            let result = scheduler.run_session(&device, &pulse)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_report(&mut out, &pulse, &result)?;
            out.flush()?;
        }

        Commands::Monitor { duration, device } => {
            device.apply(&mut config);
            config.validate()?;

            let input_line = config.input_line()?;
            let scheduler = PulseScheduler::new(MonotonicClock::new())
                .with_wait(config.wait_mode()?)
                .with_cancel(cancel_on_signal()?)
                .with_read_size(config.read_size);

            let mut channel = config.to_device_config()?.open()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let outcome = scheduler.monitor(&mut channel, input_line, duration, |event| {
                if let Err(e) = write_event(&mut out, event).and_then(|_| out.flush()) {
                    tracing::warn!("cannot print event: {}", e);
                }
            });
            close_quietly(&mut channel);

            let events = outcome?;
            writeln!(out, "{} change events on line {}", events.len(), input_line)?;
        }

        Commands::Ping { device } => {
            device.apply(&mut config);
            let mut device_config = config.to_device_config()?;
            // Ping explicitly below, so a silent controller is reported rather than refused
            device_config.ping_on_open = false;

            let mut channel = device_config.open()?;
            let answered = channel.ping();
            close_quietly(&mut channel);

            if answered? {
                println!("{}: controller answered", device_config.port);
            } else {
                return Err(syncpulse_core::SyncError::Device(format!(
                    "{}: no answer to ping",
                    device_config.port
                ))
                .into());
            }
        }

        Commands::Ports => {
            let ports = list_ports()?;
            if ports.is_empty() {
                println!("(no serial ports found)");
            }
            for port in ports {
                println!("{}\t{}", port.name, port.description);
            }
        }

        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

/// Cancel flag raised by SIGINT or SIGTERM
fn cancel_on_signal() -> CliResult<CancelFlag> {
    let cancel = CancelFlag::new();
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, cancel.as_atomic()).map_err(CliError::Signal)?;
    }
    Ok(cancel)
}

fn close_quietly<D: DeviceChannel>(channel: &mut D) {
    if let Err(e) = channel.close() {
        tracing::warn!("closing the device failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncpulse_core::SyncError;

    #[test]
    fn test_failure_reported_once() {
        let err = CliError::from(SyncError::Device("/dev/ttyUSB9: no answer to ping".into()));
        let mut out = Vec::new();
        write_failure(&mut out, &err).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "error: Device error: /dev/ttyUSB9: no answer to ping\n");
        assert_eq!(text.lines().count(), 1);
    }
}
