//! Pulse-and-poll scheduler

use std::time::Duration;

use syncpulse_core::{InputEvent, Line, LineState, Offset, PulseConfig, SyncError, SyncResult};
use syncpulse_device::{ChannelOpener, Command, DeviceChannel};
use syncpulse_time::{Clock, Schedule, SpinWait, WaitStrategy};

use crate::{CancelFlag, ObservedState, RunResult};

/// Default number of bytes requested per input read
pub const DEFAULT_READ_SIZE: usize = 3;

/// State of one run: the channel, the clock origin and what was recorded
///
/// Owned by a single run and never shared, so the scheduler itself holds
/// no per-run state.
pub struct RunContext<'a, D, C: ?Sized> {
    device: &'a mut D,
    clock: &'a C,
    /// Clock reading at the start of the run
    t0: Duration,
    input_line: Line,
    read_size: usize,
    observed: ObservedState,
    onsets: Vec<Offset>,
    events: Vec<InputEvent>,
}

impl<'a, D, C> RunContext<'a, D, C>
where
    D: DeviceChannel,
    C: Clock + ?Sized,
{
    /// Capture t0, then prime the observed state with one read that is
    /// never recorded as an event
    pub fn start(device: &'a mut D, clock: &'a C, input_line: Line, read_size: usize) -> SyncResult<Self> {
        let t0 = clock.now();
        let mut ctx = RunContext {
            device,
            clock,
            t0,
            input_line,
            read_size,
            observed: ObservedState::default(),
            onsets: Vec::new(),
            events: Vec::new(),
        };

        let initial = ctx.read_input()?;
        ctx.observed = ObservedState::primed(LineState::from(initial));
        Ok(ctx)
    }

    /// One poll: request the input line, compare, record a change.
    /// Returns true when a new event was recorded.
    pub fn poll(&mut self) -> SyncResult<bool> {
        let bytes = self.read_input()?;
        if bytes.is_empty() {
            return Ok(false);
        }

        if !self.observed.observe(LineState::from(bytes)) {
            return Ok(false);
        }

        let offset = self.offset();
        let state = self.observed.current().clone();
        tracing::debug!(offset = %offset, state = %state, "input line changed");
        self.events.push(InputEvent::new(offset, state));
        Ok(true)
    }

    /// Time since t0
    pub fn offset(&self) -> Offset {
        self.clock.offset_from(self.t0)
    }

    pub fn t0(&self) -> Duration {
        self.t0
    }

    pub fn observed(&self) -> &ObservedState {
        &self.observed
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn onsets(&self) -> &[Offset] {
        &self.onsets
    }

    fn read_input(&mut self) -> SyncResult<Vec<u8>> {
        self.device.write(Command::Read(self.input_line))?;
        self.device.read(self.read_size)
    }
}

/// Emits a pulse train while polling the input line for changes
pub struct PulseScheduler<C, W = SpinWait> {
    clock: C,
    wait: W,
    cancel: Option<CancelFlag>,
    read_size: usize,
}

impl<C: Clock> PulseScheduler<C, SpinWait> {
    /// Scheduler with the spinning wait strategy
    pub fn new(clock: C) -> Self {
        PulseScheduler {
            clock,
            wait: SpinWait,
            cancel: None,
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

impl<C: Clock, W: WaitStrategy> PulseScheduler<C, W> {
    /// Replace the wait strategy
    pub fn with_wait<W2: WaitStrategy>(self, wait: W2) -> PulseScheduler<C, W2> {
        PulseScheduler {
            clock: self.clock,
            wait,
            cancel: self.cancel,
            read_size: self.read_size,
        }
    }

    /// Check `flag` on every poll iteration
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Bytes requested per input read
    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Validate `config`, open a channel, run, and close the channel
    ///
    /// Nothing is opened when the configuration is invalid. The channel is
    /// closed on success and on failure; a failing close only surfaces when
    /// the run itself succeeded.
    pub fn run_session<O: ChannelOpener>(&self, opener: &O, config: &PulseConfig) -> SyncResult<RunResult> {
        config.validate()?;
        let mut device = opener.open()?;

        let result = self.run(&mut device, config);
        let closed = device.close();

        match (result, closed) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!("closing the device after a failed run: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Emit `config.pulse_count` pulses on an already open channel
    pub fn run<D: DeviceChannel>(&self, device: &mut D, config: &PulseConfig) -> SyncResult<RunResult> {
        config.validate()?;
        let schedule = Schedule::for_config(config);
        let requested = config.pulse_count;
        let output = config.output_line;

        let mut ctx = RunContext::start(device, &self.clock, config.input_line, self.read_size)?;
        tracing::info!(
            pulses = requested,
            period = ?schedule.period(),
            pulse_duration = ?config.pulse_duration,
            output_line = %output,
            input_line = %config.input_line,
            "pulse train started"
        );

        for (i, onset) in schedule.iter().enumerate() {
            let completed = i as u32;
            self.check_cancel(completed, requested)?;

            // Wait phase
            let due = ctx.t0.saturating_add(onset.as_duration());
            self.poll_until(&mut ctx, due, completed, requested)?;

            // Rise
            let rise = self.clock.now();
            ctx.onsets.push(Offset::from_duration(rise.saturating_sub(ctx.t0)));
            ctx.device.write(Command::Assert(output))?;

            // High phase, timed from the rise rather than from t0
            let fall = rise.saturating_add(config.pulse_duration);
            if let Err(e) = self.poll_until(&mut ctx, fall, completed, requested) {
                if matches!(e, SyncError::Cancelled { .. }) {
                    if let Err(cleanup) = ctx.device.write(Command::Deassert(output)) {
                        tracing::warn!("could not lower line {} after cancel: {}", output, cleanup);
                    }
                }
                return Err(e);
            }

            ctx.device.write(Command::Deassert(output))?;
            tracing::debug!(
                pulse = i + 1,
                of = requested,
                scheduled = %onset,
                actual = %ctx.onsets[i],
                "pulse emitted"
            );
        }

        // Settle: passive, no polling
        if !schedule.is_empty() {
            self.clock.sleep(config.inter_pulse_gap);
        }

        let result = RunResult {
            schedule,
            actual_onsets: ctx.onsets,
            input_events: ctx.events,
            total_elapsed: self.clock.offset_from(ctx.t0),
        };
        tracing::info!(
            elapsed = %result.total_elapsed,
            events = result.input_events.len(),
            max_lateness = ?result.max_lateness(),
            "pulse train finished"
        );
        Ok(result)
    }

    /// Poll the input line without emitting pulses
    ///
    /// Runs for `duration`, or until cancelled when `duration` is `None`.
    /// Cancellation ends a monitor normally; `on_event` sees every change
    /// as it is recorded.
    pub fn monitor<D, F>(
        &self,
        device: &mut D,
        input_line: Line,
        duration: Option<Duration>,
        mut on_event: F,
    ) -> SyncResult<Vec<InputEvent>>
    where
        D: DeviceChannel,
        F: FnMut(&InputEvent),
    {
        if duration.is_none() && self.cancel.is_none() {
            return Err(SyncError::Config(
                "an unbounded monitor needs a cancel flag".into(),
            ));
        }

        let mut ctx = RunContext::start(device, &self.clock, input_line, self.read_size)?;
        let until = match duration {
            Some(d) => ctx.t0.saturating_add(d),
            None => Duration::MAX,
        };
        tracing::info!(input_line = %input_line, duration = ?duration, "monitor started");

        let outcome = self.wait.wait_until(&self.clock, until, || {
            // Pulse counts mean nothing here; the error only ends the loop
            self.check_cancel(0, 0)?;
            if ctx.poll()? {
                if let Some(event) = ctx.events.last() {
                    on_event(event);
                }
            }
            Ok(())
        });

        match outcome {
            Ok(()) | Err(SyncError::Cancelled { .. }) => {
                tracing::info!(events = ctx.events.len(), "monitor finished");
                Ok(ctx.events)
            }
            Err(e) => Err(e),
        }
    }

    fn check_cancel(&self, completed: u32, requested: u32) -> SyncResult<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(SyncError::Cancelled {
                completed,
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn poll_until<D: DeviceChannel>(
        &self,
        ctx: &mut RunContext<'_, D, C>,
        deadline: Duration,
        completed: u32,
        requested: u32,
    ) -> SyncResult<()> {
        self.wait.wait_until(&self.clock, deadline, || {
            self.check_cancel(completed, requested)?;
            ctx.poll().map(|_| ())
        })
    }
}
