//! Modal forms: identity capture and chart value editing.

use serde::Serialize;

use super::FieldKey;
use crate::error::DashboardError;
use crate::types::{ChartKind, ChartSlice, ValueChange};
use crate::workflow::EditState;

pub const OVERWRITE_MESSAGE: &str = "You have previously saved data. Do you want to overwrite it?";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityForm {
    pub title: &'static str,
    pub description: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub error: Option<String>,
}

impl IdentityForm {
    fn with_error(error: Option<String>) -> Self {
        Self {
            title: "Enter Your Email",
            description: "Please enter your email address to edit chart values. \
                          This will be used to save your preferences.",
            label: "Email Address",
            placeholder: "your.email@example.com",
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub key: FieldKey,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum EditView {
    ConfirmOverwrite {
        message: &'static str,
        /// Previously saved values, pretty-printed JSON.
        preview: String,
    },
    Fields {
        description: &'static str,
        fields: Vec<FieldView>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditForm {
    pub chart: ChartKind,
    pub title: String,
    pub view: EditView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "modal", rename_all = "camelCase")]
pub enum Modal {
    None,
    Identity(IdentityForm),
    Edit(EditForm),
}

/// The modal to show for the current workflow state.
pub fn modal(state: &EditState) -> Modal {
    match state {
        EditState::Idle | EditState::FetchingPrevious { .. } | EditState::Saving { .. } => {
            Modal::None
        }
        EditState::AwaitingIdentity { error, .. } => {
            Modal::Identity(IdentityForm::with_error(error.clone()))
        }
        EditState::Confirming { chart, previous } => Modal::Edit(EditForm {
            chart: *chart,
            title: edit_title(*chart),
            view: EditView::ConfirmOverwrite {
                message: OVERWRITE_MESSAGE,
                preview: serde_json::to_string_pretty(previous).unwrap_or_default(),
            },
        }),
        EditState::Editing { chart, working, .. } => Modal::Edit(EditForm {
            chart: *chart,
            title: edit_title(*chart),
            view: EditView::Fields {
                description: description(*chart),
                fields: fields(working),
            },
        }),
    }
}

fn edit_title(chart: ChartKind) -> String {
    format!("Edit {}", chart.title())
}

fn description(chart: ChartKind) -> &'static str {
    match chart {
        ChartKind::CallsPerDay => "Edit the number of calls for each day:",
        ChartKind::SuccessVsFailure => "Edit success and failure counts:",
        ChartKind::AvgCallDuration => "Edit average call duration (in seconds):",
    }
}

fn fields(working: &ChartSlice) -> Vec<FieldView> {
    match working {
        ChartSlice::CallsPerDay(rows) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| FieldView {
                key: FieldKey::Calls(i),
                label: row.date.clone(),
                value: row.calls.to_string(),
            })
            .collect(),
        ChartSlice::SuccessVsFailure(pair) => vec![
            FieldView {
                key: FieldKey::Success,
                label: "Success".to_string(),
                value: pair.success.to_string(),
            },
            FieldView {
                key: FieldKey::Failure,
                label: "Failure".to_string(),
                value: pair.failure.to_string(),
            },
        ],
        ChartSlice::AvgCallDuration(rows) => rows
            .iter()
            .enumerate()
            .map(|(i, row)| FieldView {
                key: FieldKey::Duration(i),
                label: row.period.clone(),
                value: row.duration.to_string(),
            })
            .collect(),
    }
}

/// Parse raw text from a numeric input.
///
/// Invalid, negative or non-finite entry is rejected; it is never coerced to zero.
pub fn parse_field_input(field: FieldKey, raw: &str) -> Result<ValueChange, DashboardError> {
    let raw = raw.trim();
    let count = || {
        raw.parse::<u64>().map_err(|_| {
            DashboardError::InvalidInput(format!(
                "\"{}\" is not a whole number of 0 or more",
                raw
            ))
        })
    };

    match field {
        FieldKey::Calls(index) => Ok(ValueChange::Calls {
            index,
            calls: count()?,
        }),
        FieldKey::Success => Ok(ValueChange::Success(count()?)),
        FieldKey::Failure => Ok(ValueChange::Failure(count()?)),
        FieldKey::Duration(index) => {
            let seconds = raw
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| {
                    DashboardError::InvalidInput(format!(
                        "\"{}\" is not a duration of 0 seconds or more",
                        raw
                    ))
                })?;
            Ok(ValueChange::Duration { index, seconds })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AvgCallDuration, ChartData};

    #[test]
    fn test_parse_counts() {
        assert_eq!(
            parse_field_input(FieldKey::Calls(2), " 61 ").unwrap(),
            ValueChange::Calls { index: 2, calls: 61 }
        );
        assert_eq!(
            parse_field_input(FieldKey::Failure, "0").unwrap(),
            ValueChange::Failure(0)
        );
    }

    #[test]
    fn test_parse_rejects_instead_of_zeroing() {
        for raw in ["", "abc", "-1", "1.5", "1e3"] {
            assert!(
                matches!(
                    parse_field_input(FieldKey::Success, raw),
                    Err(DashboardError::InvalidInput(_))
                ),
                "{}",
                raw
            );
        }
        for raw in ["", "fast", "-0.5", "inf", "NaN"] {
            assert!(parse_field_input(FieldKey::Duration(0), raw).is_err(), "{}", raw);
        }
    }

    #[test]
    fn test_parse_fractional_duration() {
        assert_eq!(
            parse_field_input(FieldKey::Duration(1), "128.5").unwrap(),
            ValueChange::Duration {
                index: 1,
                seconds: 128.5
            }
        );
    }

    #[test]
    fn test_identity_modal_carries_error() {
        let state = EditState::AwaitingIdentity {
            chart: ChartKind::CallsPerDay,
            error: Some("Please enter your email address".into()),
        };
        match modal(&state) {
            Modal::Identity(form) => {
                assert_eq!(form.title, "Enter Your Email");
                assert_eq!(form.error.as_deref(), Some("Please enter your email address"));
            }
            other => panic!("unexpected modal {:?}", other),
        }
    }

    #[test]
    fn test_confirm_view_previews_previous_values() {
        let state = EditState::Confirming {
            chart: ChartKind::AvgCallDuration,
            previous: ChartSlice::AvgCallDuration(vec![AvgCallDuration::new("Week 1", 100.0)]),
        };
        let Modal::Edit(form) = modal(&state) else {
            panic!("expected edit modal");
        };
        assert_eq!(form.title, "Edit Average Call Duration");
        match form.view {
            EditView::ConfirmOverwrite { message, preview } => {
                assert_eq!(message, OVERWRITE_MESSAGE);
                let parsed: serde_json::Value = serde_json::from_str(&preview).unwrap();
                assert_eq!(parsed[0]["period"], "Week 1");
                assert_eq!(parsed[0]["duration"], 100.0);
            }
            other => panic!("unexpected view {:?}", other),
        }
    }

    #[test]
    fn test_editing_view_lists_fields() {
        let state = EditState::Editing {
            chart: ChartKind::CallsPerDay,
            working: ChartData::default().slice(ChartKind::CallsPerDay),
            previous: None,
        };
        let Modal::Edit(form) = modal(&state) else {
            panic!("expected edit modal");
        };
        let EditView::Fields { description, fields } = form.view else {
            panic!("expected fields");
        };
        assert_eq!(description, "Edit the number of calls for each day:");
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[3].key, FieldKey::Calls(3));
        assert_eq!(fields[3].label, "Thu");
        assert_eq!(fields[3].value, "61");
    }

    #[test]
    fn test_no_modal_while_saving_or_idle() {
        assert_eq!(modal(&EditState::Idle), Modal::None);
    }
}
