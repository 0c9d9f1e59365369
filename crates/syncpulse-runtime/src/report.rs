//! Human-readable run report
//!
//! Meant for the operator's terminal, not for machine parsing.

use std::io::{self, Write};

use syncpulse_core::{InputEvent, PulseConfig};

use crate::RunResult;

/// Print the summary, elapsed time, onsets and input-event offsets
pub fn write_report<W: Write>(out: &mut W, config: &PulseConfig, result: &RunResult) -> io::Result<()> {
    writeln!(
        out,
        "{} periods of {} seconds",
        config.pulse_count,
        config.period().as_secs_f64()
    )?;
    writeln!(out, "Total time-elapsed: {}", result.total_elapsed)?;

    writeln!(out, "Actual onsets:")?;
    write_offsets(out, result.actual_onsets.iter().copied())?;

    writeln!(out, "Change events on line {}:", config.input_line)?;
    write_offsets(out, result.input_events.iter().map(|e| e.offset))?;

    if let (Some(max), Some(mean)) = (result.max_lateness(), result.mean_lateness()) {
        writeln!(
            out,
            "Onset lateness: max {:.3} ms, mean {:.3} ms",
            max.as_secs_f64() * 1e3,
            mean.as_secs_f64() * 1e3
        )?;
    }
    Ok(())
}

/// One line per input change, as printed by the monitor
pub fn write_event<W: Write>(out: &mut W, event: &InputEvent) -> io::Result<()> {
    writeln!(out, "{} {}", event.offset, event.state)
}

fn write_offsets<W, I>(out: &mut W, offsets: I) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = syncpulse_core::Offset>,
{
    let line: Vec<String> = offsets.map(|o| o.to_string()).collect();
    writeln!(out, "{}", line.join(" "))
}
