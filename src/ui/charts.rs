//! Chart panels: bar (calls per day), pie (success vs failure), line
//! (average call duration). Each panel carries an "Edit Values" action.

use std::fmt;

use serde::Serialize;

use super::Intent;
use crate::types::{ChartData, ChartKind};

pub const EDIT_ACTION_LABEL: &str = "Edit Values";

const BAR_WIDTH: usize = 40;
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub label: &'static str,
    pub value: u64,
    /// Whole percent of the total, 0 when the total is 0.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Encoding {
    Bar { bars: Vec<Point> },
    Pie { slices: Vec<PieSlice> },
    Line {
        y_label: &'static str,
        points: Vec<Point>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPanel {
    pub kind: ChartKind,
    pub title: &'static str,
    pub action_label: &'static str,
    pub encoding: Encoding,
}

impl ChartPanel {
    pub fn edit_intent(&self) -> Intent {
        Intent::EditRequested(self.kind)
    }
}

pub fn panel(kind: ChartKind, data: &ChartData) -> ChartPanel {
    let encoding = match kind {
        ChartKind::CallsPerDay => Encoding::Bar {
            bars: data
                .calls_per_day
                .iter()
                .map(|row| Point {
                    label: row.date.clone(),
                    value: row.calls as f64,
                })
                .collect(),
        },
        ChartKind::SuccessVsFailure => {
            let pair = data.success_vs_failure;
            let total = pair.success.saturating_add(pair.failure);
            Encoding::Pie {
                slices: vec![
                    PieSlice {
                        label: "Success",
                        value: pair.success,
                        percent: percent_of(pair.success, total),
                    },
                    PieSlice {
                        label: "Failure",
                        value: pair.failure,
                        percent: percent_of(pair.failure, total),
                    },
                ],
            }
        }
        ChartKind::AvgCallDuration => Encoding::Line {
            y_label: "Seconds",
            points: data
                .avg_call_duration
                .iter()
                .map(|row| Point {
                    label: row.period.clone(),
                    value: row.duration,
                })
                .collect(),
        },
    };

    ChartPanel {
        kind,
        title: kind.title(),
        action_label: EDIT_ACTION_LABEL,
        encoding,
    }
}

/// All three panels in dashboard order.
pub fn panels(data: &ChartData) -> Vec<ChartPanel> {
    ChartKind::ALL.iter().map(|kind| panel(*kind, data)).collect()
}

fn percent_of(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

fn scaled(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round() as usize
}

fn label_width(points: &[Point]) -> usize {
    points.iter().map(|p| p.label.chars().count()).max().unwrap_or(0)
}

impl fmt::Display for ChartPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  [{}]", self.title, self.action_label)?;
        match &self.encoding {
            Encoding::Bar { bars } => {
                let max = bars.iter().map(|p| p.value).fold(0.0, f64::max);
                let width = label_width(bars);
                for bar in bars {
                    writeln!(
                        f,
                        "  {:<width$} {} {}",
                        bar.label,
                        "█".repeat(scaled(bar.value, max, BAR_WIDTH)),
                        bar.value,
                        width = width
                    )?;
                }
            }
            Encoding::Pie { slices } => {
                for slice in slices {
                    writeln!(
                        f,
                        "  {:<7} {:>3}% {} ({})",
                        slice.label,
                        slice.percent,
                        "■".repeat(scaled(slice.percent as f64, 100.0, BAR_WIDTH)),
                        slice.value
                    )?;
                }
            }
            Encoding::Line { y_label, points } => {
                let max = points.iter().map(|p| p.value).fold(0.0, f64::max);
                let spark: String = points
                    .iter()
                    .map(|p| SPARKS[scaled(p.value, max, SPARKS.len() - 1)])
                    .collect();
                writeln!(f, "  {} ({})", spark, y_label)?;
                let width = label_width(points);
                for point in points {
                    writeln!(f, "  {:<width$} {}s", point.label, point.value, width = width)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SuccessVsFailure;

    #[test]
    fn test_panels_in_dashboard_order() {
        let kinds: Vec<ChartKind> = panels(&ChartData::default()).iter().map(|p| p.kind).collect();
        assert_eq!(kinds, ChartKind::ALL.to_vec());
    }

    #[test]
    fn test_pie_percentages() {
        let panel = panel(ChartKind::SuccessVsFailure, &ChartData::default());
        match panel.encoding {
            Encoding::Pie { slices } => {
                assert_eq!(slices[0].percent, 95);
                assert_eq!(slices[1].percent, 5);
            }
            other => panic!("unexpected encoding {:?}", other),
        }
    }

    #[test]
    fn test_pie_with_no_calls() {
        let mut data = ChartData::default();
        data.success_vs_failure = SuccessVsFailure {
            success: 0,
            failure: 0,
        };
        let text = panel(ChartKind::SuccessVsFailure, &data).to_string();
        assert!(text.contains("Success   0%"));
    }

    #[test]
    fn test_edit_action_emits_intent() {
        let panel = panel(ChartKind::AvgCallDuration, &ChartData::default());
        assert_eq!(panel.action_label, "Edit Values");
        assert_eq!(panel.edit_intent(), Intent::EditRequested(ChartKind::AvgCallDuration));
    }

    #[test]
    fn test_bar_text_scales_to_largest() {
        let text = panel(ChartKind::CallsPerDay, &ChartData::default()).to_string();
        let thu = text.lines().find(|l| l.trim_start().starts_with("Thu")).unwrap();
        assert_eq!(thu.matches('█').count(), BAR_WIDTH);
        assert!(thu.ends_with("61"));
    }

    #[test]
    fn test_line_text_has_seconds() {
        let text = panel(ChartKind::AvgCallDuration, &ChartData::default()).to_string();
        assert!(text.contains("Week 4 142s"));
        assert!(text.contains("(Seconds)"));
    }

    #[test]
    fn test_serializes_for_view_layer() {
        let json = serde_json::to_value(panel(ChartKind::CallsPerDay, &ChartData::default())).unwrap();
        assert_eq!(json["kind"], "callsPerDay");
        assert_eq!(json["actionLabel"], "Edit Values");
        assert_eq!(json["encoding"]["type"], "bar");
        assert_eq!(json["encoding"]["bars"][0]["label"], "Mon");
    }
}
