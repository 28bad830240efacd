//! Presentation components.
//!
//! Views are built from controller state and never mutate it. User actions
//! come back as [`Intent`]s for the dashboard driver.

pub mod charts;
pub mod forms;

use serde::Serialize;

use crate::types::ChartKind;

pub use charts::{panel, panels, ChartPanel, Encoding};
pub use forms::{modal, parse_field_input, EditForm, IdentityForm, Modal};

/// Everything a view can ask the controller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    EditRequested(ChartKind),
    IdentitySubmitted(String),
    ValueEntered { field: FieldKey, raw: String },
    ConfirmOverwrite,
    Save,
    Cancel,
}

/// One input in the edit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "index", rename_all = "camelCase")]
pub enum FieldKey {
    Calls(usize),
    Success,
    Failure,
    Duration(usize),
}
