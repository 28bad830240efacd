//! Terminal front end.
//!
//! Reads one command per line, turns it into an [`Intent`], and redraws.
//! Remote completions are applied as they arrive, between keystrokes.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::dashboard::Dashboard;
use crate::error::{DashboardError, ErrorKind, UiError};
use crate::store::ChartStore;
use crate::types::ChartKind;
use crate::ui::forms::{EditView, FieldView};
use crate::ui::{Intent, Modal};
use crate::workflow::Phase;

const HELP: &str = "\
Commands:
  show                      redraw the charts
  edit calls|outcomes|duration
  email <address>           identify yourself to save values
  set <field|#> <value>     change one value, e.g. `set Thu 61` or `set 2 140.5`
  confirm                   overwrite previously saved values
  save | cancel
  whoami | signout | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Show,
    Help,
    Quit,
    WhoAmI,
    SignOut,
    Edit(ChartKind),
    Email(String),
    Set { field: String, value: String },
    Confirm,
    Save,
    Cancel,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "" | "show" => Ok(Command::Show),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        "whoami" => Ok(Command::WhoAmI),
        "signout" => Ok(Command::SignOut),
        "confirm" | "overwrite" => Ok(Command::Confirm),
        "save" => Ok(Command::Save),
        "cancel" => Ok(Command::Cancel),
        "email" => Ok(Command::Email(rest.to_string())),
        "edit" => ChartKind::parse(rest)
            .map(Command::Edit)
            .ok_or_else(|| format!("Unknown chart \"{}\". Try calls, outcomes or duration.", rest)),
        "set" => {
            let (field, value) = rest
                .rsplit_once(char::is_whitespace)
                .map(|(f, v)| (f.trim(), v.trim()))
                .filter(|(f, v)| !f.is_empty() && !v.is_empty())
                .ok_or_else(|| "Usage: set <field|#> <value>".to_string())?;
            Ok(Command::Set {
                field: field.trim_matches('"').to_string(),
                value: value.to_string(),
            })
        }
        other => Err(format!("Unknown command \"{}\". Type help.", other)),
    }
}

/// Find a form field by its 1-based position or its label.
pub fn resolve_field<'a>(fields: &'a [FieldView], name: &str) -> Option<&'a FieldView> {
    if let Ok(position) = name.parse::<usize>() {
        return position.checked_sub(1).and_then(|i| fields.get(i));
    }
    fields.iter().find(|f| f.label.eq_ignore_ascii_case(name))
}

pub fn render_modal(modal: &Modal) -> Option<String> {
    match modal {
        Modal::None => None,
        Modal::Identity(form) => {
            let mut out = format!("== {} ==\n{}\n{}: email <{}>", form.title, form.description, form.label, form.placeholder);
            if let Some(error) = &form.error {
                out.push_str(&format!("\n! {}", error));
            }
            out.push_str("\n[cancel] [email <address>]");
            Some(out)
        }
        Modal::Edit(form) => {
            let mut out = format!("== {} ==\n", form.title);
            match &form.view {
                EditView::ConfirmOverwrite { message, preview } => {
                    out.push_str(message);
                    out.push_str("\nPrevious values:\n");
                    out.push_str(preview);
                    out.push_str("\n[cancel] [confirm]");
                }
                EditView::Fields { description, fields } => {
                    out.push_str(description);
                    for (i, field) in fields.iter().enumerate() {
                        out.push_str(&format!("\n  {}. {:<8} {}", i + 1, field.label, field.value));
                    }
                    out.push_str("\n[cancel] [save]");
                }
            }
            Some(out)
        }
    }
}

fn render<S: ChartStore + 'static>(dash: &Dashboard<S>) {
    println!("\nCall Analytics Dashboard");
    if let Some(identity) = dash.identity() {
        println!("Logged in as: {}", identity);
    }
    if dash.busy() {
        println!("Loading...");
    }
    match render_modal(&dash.modal()) {
        Some(text) => println!("{}", text),
        None => {
            for panel in dash.panels() {
                println!("{}", panel);
            }
        }
    }
}

fn report(err: &DashboardError) {
    let ui = UiError::from(err);
    match ui.error_type {
        ErrorKind::Input => println!("! {}", ui.message),
        _ => println!("! {} ({})", ui.message, ui.recovery_suggestion),
    }
}

fn field_intent<S: ChartStore + 'static>(
    dash: &Dashboard<S>,
    field: &str,
    value: String,
) -> Result<Intent, DashboardError> {
    let Modal::Edit(form) = dash.modal() else {
        return Err(DashboardError::InvalidTransition {
            action: "change a value",
            phase: dash.phase(),
        });
    };
    let EditView::Fields { fields, .. } = &form.view else {
        return Err(DashboardError::InvalidTransition {
            action: "change a value",
            phase: Phase::Confirming,
        });
    };
    let found = resolve_field(fields, field)
        .ok_or_else(|| DashboardError::InvalidInput(format!("No field \"{}\"", field)))?;
    Ok(Intent::ValueEntered {
        field: found.key,
        raw: value,
    })
}

/// Returns false when the user asked to quit.
async fn execute<S: ChartStore + 'static>(dash: &mut Dashboard<S>, command: Command) -> bool {
    let result = match command {
        Command::Quit => return false,
        Command::Help => {
            println!("{}", HELP);
            return true;
        }
        Command::Show => Ok(()),
        Command::WhoAmI => {
            match dash.identity() {
                Some(identity) => {
                    let saved = dash.has_saved_data().await;
                    println!(
                        "{} ({})",
                        identity,
                        if saved { "saved values on file" } else { "nothing saved yet" }
                    );
                }
                None => println!("Not identified yet"),
            }
            return true;
        }
        Command::SignOut => dash.sign_out(),
        Command::Edit(chart) => dash.dispatch(Intent::EditRequested(chart)),
        Command::Email(raw) => dash.dispatch(Intent::IdentitySubmitted(raw)),
        Command::Set { field, value } => {
            field_intent(dash, &field, value).and_then(|intent| dash.dispatch(intent))
        }
        Command::Confirm => dash.dispatch(Intent::ConfirmOverwrite),
        Command::Save => dash.dispatch(Intent::Save),
        Command::Cancel => dash.dispatch(Intent::Cancel),
    };

    if let Err(e) = result {
        report(&e);
    }
    render(dash);
    true
}

/// Run until stdin closes or the user quits. Outstanding saves are drained first.
pub async fn run<S: ChartStore + 'static>(mut dash: Dashboard<S>) -> Result<(), DashboardError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render(&dash);
    println!("Type help for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(command) => {
                        if !execute(&mut dash, command).await {
                            break;
                        }
                    }
                    Err(message) => println!("! {}", message),
                }
            }
            Some(_) = dash.next_completion(), if dash.has_in_flight() => {
                render(&dash);
            }
        }
    }

    if dash.phase() == Phase::Saving {
        log::info!("Waiting for save to finish");
    }
    dash.settle().await;
    Ok(())
}
