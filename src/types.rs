use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chart values for one user, stored as a single JSON blob keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub calls_per_day: Vec<CallsPerDay>,
    pub success_vs_failure: SuccessVsFailure,
    pub avg_call_duration: Vec<AvgCallDuration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsPerDay {
    pub date: String,
    pub calls: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessVsFailure {
    pub success: u64,
    pub failure: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvgCallDuration {
    pub period: String,
    /// Seconds
    pub duration: f64,
}

impl CallsPerDay {
    pub fn new(date: impl Into<String>, calls: u64) -> Self {
        Self {
            date: date.into(),
            calls,
        }
    }
}

impl AvgCallDuration {
    pub fn new(period: impl Into<String>, duration: f64) -> Self {
        Self {
            period: period.into(),
            duration,
        }
    }
}

/// Built-in dummy data shown until a user's saved values are loaded.
impl Default for ChartData {
    fn default() -> Self {
        Self {
            calls_per_day: vec![
                CallsPerDay::new("Mon", 45),
                CallsPerDay::new("Tue", 52),
                CallsPerDay::new("Wed", 48),
                CallsPerDay::new("Thu", 61),
                CallsPerDay::new("Fri", 55),
                CallsPerDay::new("Sat", 38),
                CallsPerDay::new("Sun", 42),
            ],
            success_vs_failure: SuccessVsFailure {
                success: 285,
                failure: 15,
            },
            avg_call_duration: vec![
                AvgCallDuration::new("Week 1", 120.0),
                AvgCallDuration::new("Week 2", 135.0),
                AvgCallDuration::new("Week 3", 128.0),
                AvgCallDuration::new("Week 4", 142.0),
            ],
        }
    }
}

impl ChartData {
    /// Copy out the sub-portion belonging to one chart.
    pub fn slice(&self, kind: ChartKind) -> ChartSlice {
        match kind {
            ChartKind::CallsPerDay => ChartSlice::CallsPerDay(self.calls_per_day.clone()),
            ChartKind::SuccessVsFailure => ChartSlice::SuccessVsFailure(self.success_vs_failure),
            ChartKind::AvgCallDuration => ChartSlice::AvgCallDuration(self.avg_call_duration.clone()),
        }
    }

    /// Replace exactly the field the slice belongs to. Other charts are untouched.
    pub fn merge(&mut self, slice: ChartSlice) {
        match slice {
            ChartSlice::CallsPerDay(rows) => self.calls_per_day = rows,
            ChartSlice::SuccessVsFailure(pair) => self.success_vs_failure = pair,
            ChartSlice::AvgCallDuration(rows) => self.avg_call_duration = rows,
        }
    }

    /// Durations must be finite and non-negative. Counts are unsigned by type.
    pub fn validate(&self) -> Result<(), String> {
        for row in &self.avg_call_duration {
            if !row.duration.is_finite() || row.duration < 0.0 {
                return Err(format!(
                    "Invalid duration {} for {}",
                    row.duration, row.period
                ));
            }
        }
        Ok(())
    }
}

/// The three charts on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    CallsPerDay,
    SuccessVsFailure,
    AvgCallDuration,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [
        ChartKind::CallsPerDay,
        ChartKind::SuccessVsFailure,
        ChartKind::AvgCallDuration,
    ];

    /// Field name inside the stored blob.
    pub fn key(self) -> &'static str {
        match self {
            ChartKind::CallsPerDay => "callsPerDay",
            ChartKind::SuccessVsFailure => "successVsFailure",
            ChartKind::AvgCallDuration => "avgCallDuration",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::CallsPerDay => "Calls Per Day",
            ChartKind::SuccessVsFailure => "Success vs Failure",
            ChartKind::AvgCallDuration => "Average Call Duration",
        }
    }

    /// Accepts the wire key or a short alias typed at the shell.
    pub fn parse(value: &str) -> Option<ChartKind> {
        match value.trim().to_ascii_lowercase().as_str() {
            "callsperday" | "calls" | "calls-per-day" => Some(ChartKind::CallsPerDay),
            "successvsfailure" | "outcomes" | "success" | "success-vs-failure" => {
                Some(ChartKind::SuccessVsFailure)
            }
            "avgcallduration" | "duration" | "avg-call-duration" => {
                Some(ChartKind::AvgCallDuration)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Chart data under edit, tagged with the chart it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartSlice {
    CallsPerDay(Vec<CallsPerDay>),
    SuccessVsFailure(SuccessVsFailure),
    AvgCallDuration(Vec<AvgCallDuration>),
}

/// A single-field edit coming from the edit form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueChange {
    Calls { index: usize, calls: u64 },
    Success(u64),
    Failure(u64),
    Duration { index: usize, seconds: f64 },
}

impl ChartSlice {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSlice::CallsPerDay(_) => ChartKind::CallsPerDay,
            ChartSlice::SuccessVsFailure(_) => ChartKind::SuccessVsFailure,
            ChartSlice::AvgCallDuration(_) => ChartKind::AvgCallDuration,
        }
    }

    /// Replace one element (by index for sequences, by field for the pair).
    ///
    /// The slice is left untouched when the change targets another chart,
    /// an index out of range, or a negative/non-finite duration.
    pub fn apply(&mut self, change: ValueChange) -> Result<(), String> {
        match (self, change) {
            (ChartSlice::CallsPerDay(rows), ValueChange::Calls { index, calls }) => {
                let len = rows.len();
                let row = rows
                    .get_mut(index)
                    .ok_or_else(|| format!("No day at position {} (have {})", index, len))?;
                row.calls = calls;
                Ok(())
            }
            (ChartSlice::SuccessVsFailure(pair), ValueChange::Success(success)) => {
                pair.success = success;
                Ok(())
            }
            (ChartSlice::SuccessVsFailure(pair), ValueChange::Failure(failure)) => {
                pair.failure = failure;
                Ok(())
            }
            (ChartSlice::AvgCallDuration(rows), ValueChange::Duration { index, seconds }) => {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(format!("Invalid duration {}", seconds));
                }
                let len = rows.len();
                let row = rows
                    .get_mut(index)
                    .ok_or_else(|| format!("No period at position {} (have {})", index, len))?;
                row.duration = seconds;
                Ok(())
            }
            (slice, change) => Err(format!(
                "{:?} does not apply to {}",
                change,
                slice.kind().title()
            )),
        }
    }
}

/// Remote row in the chart store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub email: String,
    pub chart_values: ChartData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
