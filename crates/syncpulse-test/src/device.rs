//! Simulated I/O controller
//!
//! Answers read requests from a `LineScript`, lets simulated time pass for
//! every transfer, and logs every command with its timestamp.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use syncpulse_core::{Line, SyncError, SyncResult};
use syncpulse_device::{ChannelOpener, Command, DeviceChannel, PING_REPLY};

use crate::{LineScript, ManualClock, LOW};

/// Simulated transfer times
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencyModel {
    /// Time consumed by one command write
    pub write: Duration,
    /// Time consumed by a read that returns data
    pub read: Duration,
    /// Time consumed by a read that times out
    pub timeout: Duration,
    /// Uniform extra delay in `[0, jitter]` added to every transfer
    pub jitter: Duration,
}

impl Default for LatencyModel {
    fn default() -> Self {
        // Roughly a full-speed USB serial adapter
        LatencyModel {
            write: Duration::from_micros(50),
            read: Duration::from_micros(200),
            timeout: Duration::from_millis(100),
            jitter: Duration::ZERO,
        }
    }
}

impl LatencyModel {
    /// Transfers take no time at all
    pub fn instant() -> Self {
        LatencyModel {
            write: Duration::ZERO,
            read: Duration::ZERO,
            timeout: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

/// One logged command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoggedCommand {
    /// Clock reading when the command was written
    pub at: Duration,
    pub command: Command,
}

#[derive(Debug, Default)]
struct LogInner {
    commands: Vec<LoggedCommand>,
    reads: u64,
    empty_reads: u64,
    closed: bool,
}

/// Shared record of everything the device saw
#[derive(Clone, Debug, Default)]
pub struct DeviceLog {
    inner: Arc<Mutex<LogInner>>,
}

impl DeviceLog {
    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.inner.lock().commands.clone()
    }

    /// Number of commands written so far
    pub fn command_count(&self) -> usize {
        self.inner.lock().commands.len()
    }

    /// Number of reads, including the ones that returned nothing
    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }

    pub fn empty_reads(&self) -> u64 {
        self.inner.lock().empty_reads
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Times at which `line` was asserted
    pub fn rises(&self, line: Line) -> Vec<Duration> {
        self.times_of(Command::Assert(line))
    }

    /// Times at which `line` was deasserted
    pub fn falls(&self, line: Line) -> Vec<Duration> {
        self.times_of(Command::Deassert(line))
    }

    /// `(rise, fall)` pairs for `line`, in order
    pub fn pulses(&self, line: Line) -> Vec<(Duration, Duration)> {
        self.rises(line).into_iter().zip(self.falls(line)).collect()
    }

    /// Whether `line` was left asserted by the last command touching it
    pub fn is_high(&self, line: Line) -> bool {
        self.inner
            .lock()
            .commands
            .iter()
            .rev()
            .find_map(|c| match c.command {
                Command::Assert(l) if l == line => Some(true),
                Command::Deassert(l) if l == line => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn times_of(&self, command: Command) -> Vec<Duration> {
        self.inner
            .lock()
            .commands
            .iter()
            .filter(|c| c.command == command)
            .map(|c| c.at)
            .collect()
    }

    fn record(&self, at: Duration, command: Command) {
        self.inner.lock().commands.push(LoggedCommand { at, command });
    }
}

/// Simulated controller speaking the command alphabet
#[derive(Clone)]
pub struct SimulatedDevice {
    clock: ManualClock,
    /// Waveform of the monitored line
    script: LineScript,
    /// Line the script applies to; every other line reads low
    input_line: Line,
    latency: LatencyModel,
    rng: StdRng,
    /// Bytes waiting on the read side
    pending: VecDeque<u8>,
    answers_ping: bool,
    /// Every n-th read request is swallowed without an answer
    drop_every: Option<u64>,
    /// Transport failure on the n-th read (1-based)
    fail_on_read: Option<u64>,
    /// Transport failure on the n-th write (1-based)
    fail_on_write: Option<u64>,
    read_requests: u64,
    reads: u64,
    writes: u64,
    log: DeviceLog,
}

impl SimulatedDevice {
    /// Device polled on line 2, driven by `script`
    pub fn new(clock: ManualClock, script: LineScript) -> Self {
        SimulatedDevice {
            clock,
            script,
            input_line: Line::TWO,
            latency: LatencyModel::default(),
            rng: StdRng::seed_from_u64(0),
            pending: VecDeque::new(),
            answers_ping: true,
            drop_every: None,
            fail_on_read: None,
            fail_on_write: None,
            read_requests: 0,
            reads: 0,
            writes: 0,
            log: DeviceLog::default(),
        }
    }

    pub fn with_input_line(mut self, line: Line) -> Self {
        self.input_line = line;
        self
    }

    pub fn with_latency(mut self, latency: LatencyModel) -> Self {
        self.latency = latency;
        self
    }

    /// Seed for the latency jitter
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Silent controller: pings go unanswered
    pub fn without_ping(mut self) -> Self {
        self.answers_ping = false;
        self
    }

    /// Leave every `n`-th read request unanswered, so the next read times out
    pub fn dropping_every(mut self, n: u64) -> Self {
        self.drop_every = Some(n.max(1));
        self
    }

    /// Fail the `n`-th read (1-based) with a transport error
    pub fn failing_on_read(mut self, n: u64) -> Self {
        self.fail_on_read = Some(n);
        self
    }

    /// Fail the `n`-th write (1-based) with a transport error
    pub fn failing_on_write(mut self, n: u64) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Handle on the command log; stays valid after the device is dropped
    pub fn log(&self) -> DeviceLog {
        self.log.clone()
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    fn spend(&mut self, base: Duration) {
        let extra = if self.latency.jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = self.latency.jitter.as_nanos() as u64;
            Duration::from_nanos(self.rng.gen_range(0..=max))
        };
        self.clock.advance(base + extra);
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.log.is_closed() {
            Err(SyncError::Device("simulated device is closed".into()))
        } else {
            Ok(())
        }
    }

    fn answer(&mut self, command: Command, at: Duration) {
        match command {
            Command::Read(line) => {
                self.read_requests += 1;
                if let Some(n) = self.drop_every {
                    if self.read_requests % n == 0 {
                        return;
                    }
                }
                let state = if line == self.input_line {
                    self.script.state_at(at).as_bytes().to_vec()
                } else {
                    LOW.to_vec()
                };
                self.pending.extend(state);
            }
            Command::Ping if self.answers_ping => self.pending.push_back(PING_REPLY),
            _ => {}
        }
    }
}

impl DeviceChannel for SimulatedDevice {
    fn write(&mut self, command: Command) -> SyncResult<()> {
        self.ensure_open()?;
        self.writes += 1;
        if self.fail_on_write == Some(self.writes) {
            return Err(SyncError::Device(format!(
                "simulated write failure on {:?}",
                command
            )));
        }

        let at = self.clock.peek();
        self.log.record(at, command);
        self.answer(command, at);
        self.spend(self.latency.write);
        Ok(())
    }

    fn read(&mut self, max_bytes: usize) -> SyncResult<Vec<u8>> {
        self.ensure_open()?;
        self.reads += 1;
        if self.fail_on_read == Some(self.reads) {
            return Err(SyncError::Device("simulated read failure".into()));
        }

        let n = max_bytes.min(self.pending.len());
        let data: Vec<u8> = self.pending.drain(..n).collect();
        {
            let mut log = self.log.inner.lock();
            log.reads += 1;
            if data.is_empty() {
                log.empty_reads += 1;
            }
        }

        if data.is_empty() {
            self.spend(self.latency.timeout);
        } else {
            self.spend(self.latency.read);
        }
        Ok(data)
    }

    fn close(&mut self) -> SyncResult<()> {
        self.log.inner.lock().closed = true;
        Ok(())
    }
}

/// Opener handing out copies of a prototype device
pub struct SimulatedOpener {
    prototype: SimulatedDevice,
    reachable: bool,
    opens: AtomicU32,
}

impl SimulatedOpener {
    pub fn new(prototype: SimulatedDevice) -> Self {
        SimulatedOpener {
            prototype,
            reachable: true,
            opens: AtomicU32::new(0),
        }
    }

    /// Opener whose port does not exist
    pub fn unreachable(prototype: SimulatedDevice) -> Self {
        SimulatedOpener {
            reachable: false,
            ..Self::new(prototype)
        }
    }

    /// Log shared by every device this opener hands out
    pub fn log(&self) -> DeviceLog {
        self.prototype.log()
    }

    /// Number of open attempts
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ChannelOpener for SimulatedOpener {
    type Channel = SimulatedDevice;

    fn open(&self) -> SyncResult<SimulatedDevice> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.reachable {
            return Err(SyncError::Device("simulated port not found".into()));
        }
        Ok(self.prototype.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HIGH;

    fn device(script: LineScript) -> SimulatedDevice {
        SimulatedDevice::new(ManualClock::new(), script)
    }

    #[test]
    fn test_read_request_answers_script_state() {
        let mut dev = device(LineScript::low().then_at(Duration::from_millis(1), HIGH));

        dev.write(Command::Read(Line::TWO)).unwrap();
        assert_eq!(dev.read(3).unwrap(), LOW);

        dev.clock().advance(Duration::from_millis(1));
        dev.write(Command::Read(Line::TWO)).unwrap();
        assert_eq!(dev.read(3).unwrap(), HIGH);
    }

    #[test]
    fn test_read_without_request_times_out() {
        let mut dev = device(LineScript::low());
        let before = dev.clock().peek();

        assert!(dev.read(3).unwrap().is_empty());
        assert_eq!(dev.clock().peek() - before, LatencyModel::default().timeout);
        assert_eq!(dev.log().empty_reads(), 1);
    }

    #[test]
    fn test_transfers_advance_clock() {
        let mut dev = device(LineScript::low());
        dev.write(Command::Read(Line::TWO)).unwrap();
        dev.read(3).unwrap();
        assert_eq!(dev.clock().peek(), Duration::from_micros(250));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let latency = LatencyModel {
            jitter: Duration::from_micros(100),
            ..LatencyModel::instant()
        };
        let mut dev = device(LineScript::low()).with_latency(latency).with_seed(42);

        for _ in 0..100 {
            dev.write(Command::Assert(Line::ONE)).unwrap();
        }
        assert!(dev.clock().peek() <= Duration::from_millis(10));
    }

    #[test]
    fn test_log_tracks_pulses() {
        let mut dev = device(LineScript::low());
        dev.write(Command::Assert(Line::ONE)).unwrap();
        dev.write(Command::Deassert(Line::ONE)).unwrap();
        dev.write(Command::Assert(Line::ONE)).unwrap();

        let log = dev.log();
        assert_eq!(log.rises(Line::ONE).len(), 2);
        assert_eq!(log.pulses(Line::ONE).len(), 1);
        assert!(log.is_high(Line::ONE));
        assert!(!log.is_high(Line::TWO));
    }

    #[test]
    fn test_dropped_replies() {
        let mut dev = device(LineScript::low()).dropping_every(2);

        dev.write(Command::Read(Line::TWO)).unwrap();
        assert!(!dev.read(3).unwrap().is_empty());
        dev.write(Command::Read(Line::TWO)).unwrap();
        assert!(dev.read(3).unwrap().is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let mut dev = device(LineScript::low()).failing_on_write(2);
        dev.write(Command::Ping).unwrap();
        assert!(dev.write(Command::Ping).unwrap_err().is_device());

        let mut dev = device(LineScript::low()).failing_on_read(1);
        assert!(dev.read(3).unwrap_err().is_device());
    }

    #[test]
    fn test_ping_and_close() {
        let mut dev = device(LineScript::low());
        assert!(dev.ping().unwrap());

        dev.close().unwrap();
        assert!(dev.log().is_closed());
        assert!(dev.write(Command::Ping).is_err());

        let mut silent = device(LineScript::low()).without_ping();
        assert!(!silent.ping().unwrap());
    }

    #[test]
    fn test_opener() {
        let opener = SimulatedOpener::new(device(LineScript::low()));
        let mut dev = opener.open().unwrap();
        dev.write(Command::Ping).unwrap();
        assert_eq!(opener.log().command_count(), 1);

        let opener = SimulatedOpener::unreachable(device(LineScript::low()));
        assert!(opener.open().err().unwrap().is_device());
        assert_eq!(opener.opens(), 1);
        assert_eq!(opener.log().command_count(), 0);
    }
}
