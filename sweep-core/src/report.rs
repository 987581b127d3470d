//! Line-oriented CSV output.
//!
//! Lines are rendered without a terminator; each sink decides how to end a
//! line on its transport.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};

use crate::analog::{AnalogExtremes, AnalogScale};
use crate::averager::MeanTenths;
use crate::sweep::SweepParameters;

pub const HEADER: &str = "nChars,nRetry,tRetry[ms],Time[ms]";
pub const ANALOG_HEADER_SUFFIX: &str = ",Min[mV],Max[mV]";
pub const FINISHED_MARKER: &str = "Finished";

/// Enough room for the widest row any plan can produce.
pub const MAX_LINE_LEN: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportError {
    /// The line did not fit the formatting buffer.
    Overflow,
    /// The sink has no room for another line.
    SinkFull,
    /// The sink's transport is gone.
    Closed,
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Overflow => f.write_str("report line exceeds buffer"),
            ReportError::SinkFull => f.write_str("report sink full"),
            ReportError::Closed => f.write_str("report sink closed"),
        }
    }
}

/// Voltage columns of a data row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VoltageCells {
    /// Analog mode is off; the columns are absent.
    Absent,
    /// Analog mode is on but the window saw no samples; the columns are empty.
    Unsampled,
    Millivolts { min: u32, max: u32 },
}

impl VoltageCells {
    /// Converts the extremes of a closed window, if the probe produced any.
    pub fn from_window(extremes: Option<AnalogExtremes>, scale: &AnalogScale) -> Self {
        match extremes {
            None => VoltageCells::Absent,
            Some(extremes) if !extremes.is_sampled() => VoltageCells::Unsampled,
            Some(extremes) => VoltageCells::Millivolts {
                min: scale.to_millivolts(extremes.min),
                max: scale.to_millivolts(extremes.max),
            },
        }
    }
}

/// One data row: the parameters, their mean elapsed time and optional voltages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MeasurementRow {
    pub params: SweepParameters,
    pub mean: MeanTenths,
    pub voltage: VoltageCells,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportLine {
    Header { analog: bool },
    Row(MeasurementRow),
    Finished,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Header { analog } => {
                f.write_str(HEADER)?;
                if *analog {
                    f.write_str(ANALOG_HEADER_SUFFIX)?;
                }
                Ok(())
            }
            ReportLine::Row(row) => {
                write!(
                    f,
                    "{},{},{},{}",
                    row.params.payload_len,
                    row.params.retry_count,
                    row.params.retry_interval_ms,
                    row.mean.raw()
                )?;
                match row.voltage {
                    VoltageCells::Absent => Ok(()),
                    VoltageCells::Unsampled => f.write_str(",,"),
                    VoltageCells::Millivolts { min, max } => write!(f, ",{min},{max}"),
                }
            }
            ReportLine::Finished => f.write_str(FINISHED_MARKER),
        }
    }
}

/// Renders a line into a fixed-capacity string.
pub fn format_line<const N: usize>(line: &ReportLine) -> Result<String<N>, ReportError> {
    let mut out = String::new();
    write!(out, "{line}").map_err(|_| ReportError::Overflow)?;
    Ok(out)
}

/// Destination for report lines.
pub trait ReportSink {
    fn emit(&mut self, line: &ReportLine) -> Result<(), ReportError>;
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn emit(&mut self, line: &ReportLine) -> Result<(), ReportError> {
        (**self).emit(line)
    }
}

/// In-memory sink holding up to `LINES` rendered lines.
#[derive(Clone, Debug, Default)]
pub struct ReportLog<const LINES: usize> {
    lines: Vec<String<MAX_LINE_LEN>, LINES>,
}

impl<const LINES: usize> ReportLog<LINES> {
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl<const LINES: usize> ReportSink for ReportLog<LINES> {
    fn emit(&mut self, line: &ReportLine) -> Result<(), ReportError> {
        let rendered = format_line::<MAX_LINE_LEN>(line)?;
        self.lines
            .push(rendered)
            .map_err(|_| ReportError::SinkFull)
    }
}
