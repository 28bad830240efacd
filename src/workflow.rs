//! Edit workflow controller.
//!
//! One chart is edited at a time:
//! `Idle -> AwaitingIdentity -> FetchingPrevious -> Confirming -> Editing -> Saving -> Idle`
//!
//! The controller never performs I/O. Each transition returns the [`Effect`]s
//! the driver must run, and every remote call carries a [`SessionToken`].
//! Completions whose token is no longer current are dropped.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::error::DashboardError;
use crate::identity::Identity;
use crate::store::StoreError;
use crate::types::{ChartData, ChartKind, ChartSlice, ValueChange};

/// Identifies one remote call issued by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    fn fresh() -> Self {
        SessionToken(Uuid::new_v4())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Work the driver must carry out on behalf of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PersistIdentity(Identity),
    /// Startup rehydration of the user's saved values.
    Load { token: SessionToken, key: Identity },
    /// Previously saved values for the overwrite warning.
    Fetch { token: SessionToken, key: Identity },
    Upsert {
        token: SessionToken,
        key: Identity,
        data: ChartData,
    },
    /// The call for this token is no longer wanted.
    Abort(SessionToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    AwaitingIdentity,
    FetchingPrevious,
    Confirming,
    Editing,
    Saving,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::AwaitingIdentity => "awaiting identity",
            Phase::FetchingPrevious => "fetching previous values",
            Phase::Confirming => "confirming overwrite",
            Phase::Editing => "editing",
            Phase::Saving => "saving",
        })
    }
}

/// Transient state for the chart being edited.
#[derive(Debug, Clone, PartialEq)]
pub enum EditState {
    Idle,
    AwaitingIdentity {
        chart: ChartKind,
        error: Option<String>,
    },
    FetchingPrevious {
        chart: ChartKind,
        token: SessionToken,
    },
    Confirming {
        chart: ChartKind,
        previous: ChartSlice,
    },
    Editing {
        chart: ChartKind,
        working: ChartSlice,
        previous: Option<ChartSlice>,
    },
    Saving {
        chart: ChartKind,
        token: SessionToken,
    },
}

impl EditState {
    pub fn phase(&self) -> Phase {
        match self {
            EditState::Idle => Phase::Idle,
            EditState::AwaitingIdentity { .. } => Phase::AwaitingIdentity,
            EditState::FetchingPrevious { .. } => Phase::FetchingPrevious,
            EditState::Confirming { .. } => Phase::Confirming,
            EditState::Editing { .. } => Phase::Editing,
            EditState::Saving { .. } => Phase::Saving,
        }
    }

    pub fn chart(&self) -> Option<ChartKind> {
        match self {
            EditState::Idle => None,
            EditState::AwaitingIdentity { chart, .. }
            | EditState::FetchingPrevious { chart, .. }
            | EditState::Confirming { chart, .. }
            | EditState::Editing { chart, .. }
            | EditState::Saving { chart, .. } => Some(*chart),
        }
    }
}

/// Session identity and the values currently on screen.
#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub identity: Option<Identity>,
    pub chart_data: ChartData,
    /// Bumped every time a save is merged into `chart_data`.
    revision: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingLoad {
    token: SessionToken,
    revision: u64,
}

pub struct EditWorkflow {
    ctx: DashboardContext,
    state: EditState,
    pending_load: Option<PendingLoad>,
}

impl EditWorkflow {
    pub fn new(chart_data: ChartData, identity: Option<Identity>) -> Self {
        Self {
            ctx: DashboardContext {
                identity,
                chart_data,
                revision: 0,
            },
            state: EditState::Idle,
            pending_load: None,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn chart_data(&self) -> &ChartData {
        &self.ctx.chart_data
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.ctx.identity.as_ref()
    }

    /// True while a load or a save is in flight.
    pub fn loading(&self) -> bool {
        self.pending_load.is_some() || self.phase() == Phase::Saving
    }

    /// Adopt an identity found in durable storage. Ignored if one is already set.
    pub fn adopt_identity(&mut self, identity: Identity) {
        if self.ctx.identity.is_none() {
            self.ctx.identity = Some(identity);
        }
    }

    /// Forget the identity and drop that user's values from the screen.
    ///
    /// Only allowed while idle. A load still in flight for the old identity
    /// is aborted.
    pub fn forget_identity(&mut self) -> Result<Vec<Effect>, DashboardError> {
        self.require(Phase::Idle, "sign out")?;
        self.ctx.identity = None;
        self.ctx.chart_data = ChartData::default();
        self.ctx.revision += 1;
        Ok(self
            .pending_load
            .take()
            .map(|pending| Effect::Abort(pending.token))
            .into_iter()
            .collect())
    }

    /// Start rehydrating saved values for the known identity, if any.
    pub fn begin_load(&mut self) -> Option<Effect> {
        let key = self.ctx.identity.clone()?;
        let token = SessionToken::fresh();
        self.pending_load = Some(PendingLoad {
            token,
            revision: self.ctx.revision,
        });
        log::debug!("Loading saved chart data for {}", key);
        Some(Effect::Load { token, key })
    }

    /// Apply a load result. Returns true if the on-screen values were replaced.
    pub fn load_completed(
        &mut self,
        token: SessionToken,
        outcome: Result<Option<ChartData>, StoreError>,
    ) -> bool {
        let Some(pending) = self.pending_load.filter(|p| p.token == token) else {
            log::debug!("Dropping stale load result {}", token);
            return false;
        };
        self.pending_load = None;

        match outcome {
            Ok(Some(data)) if pending.revision == self.ctx.revision => {
                self.ctx.chart_data = data;
                true
            }
            Ok(Some(_)) => {
                log::debug!("Discarding loaded values superseded by a newer save");
                false
            }
            Ok(None) => false,
            Err(e) => {
                log::error!("Error loading user data: {}", e);
                false
            }
        }
    }

    /// Edit requested for `chart`. Only accepted while idle.
    pub fn request_edit(&mut self, chart: ChartKind) -> Result<Vec<Effect>, DashboardError> {
        self.require(Phase::Idle, "start an edit")?;

        match self.ctx.identity.clone() {
            Some(key) => Ok(vec![self.start_fetch(chart, key)]),
            None => {
                self.transition(EditState::AwaitingIdentity { chart, error: None });
                Ok(Vec::new())
            }
        }
    }

    /// Identity submitted from the capture form.
    ///
    /// A rejected submission keeps the workflow in `AwaitingIdentity` with the
    /// message recorded for the form.
    pub fn submit_identity(&mut self, raw: &str) -> Result<Vec<Effect>, DashboardError> {
        let EditState::AwaitingIdentity { chart, error } = &mut self.state else {
            return Err(self.invalid("submit an email"));
        };
        let chart = *chart;

        let identity = match Identity::parse(raw) {
            Ok(identity) => identity,
            Err(e) => {
                *error = Some(e.to_string());
                return Err(e.into());
            }
        };

        self.ctx.identity = Some(identity.clone());
        let fetch = self.start_fetch(chart, identity.clone());
        Ok(vec![Effect::PersistIdentity(identity), fetch])
    }

    /// Previous values arrived. Returns true if the result was current.
    pub fn previous_fetched(
        &mut self,
        token: SessionToken,
        outcome: Result<Option<ChartData>, StoreError>,
    ) -> bool {
        let chart = match &self.state {
            EditState::FetchingPrevious { chart, token: current } if *current == token => *chart,
            _ => {
                log::debug!("Dropping stale fetch result {}", token);
                return false;
            }
        };

        match outcome {
            Ok(Some(saved)) => {
                self.transition(EditState::Confirming {
                    chart,
                    previous: saved.slice(chart),
                });
            }
            Ok(None) => self.start_editing_current(chart),
            Err(e) => {
                log::warn!("Error fetching previous data, editing without overwrite check: {}", e);
                self.start_editing_current(chart);
            }
        }
        true
    }

    /// Accept the overwrite. Editing continues from the previously saved values.
    pub fn confirm_overwrite(&mut self) -> Result<(), DashboardError> {
        let EditState::Confirming { chart, previous } = &self.state else {
            return Err(self.invalid("confirm an overwrite"));
        };
        let next = EditState::Editing {
            chart: *chart,
            working: previous.clone(),
            previous: Some(previous.clone()),
        };
        self.transition(next);
        Ok(())
    }

    /// Replace one value in the working copy.
    pub fn change_value(&mut self, change: ValueChange) -> Result<(), DashboardError> {
        let EditState::Editing { working, .. } = &mut self.state else {
            return Err(self.invalid("change a value"));
        };
        working.apply(change).map_err(DashboardError::InvalidInput)
    }

    /// Merge the working copy into the on-screen values and request persistence.
    ///
    /// The merge is applied before the upsert is issued and is never rolled back.
    pub fn save(&mut self) -> Result<Effect, DashboardError> {
        let EditState::Editing { chart, working, .. } = &self.state else {
            return Err(self.invalid("save"));
        };
        let Some(key) = self.ctx.identity.clone() else {
            log::error!("No user email available");
            return Err(DashboardError::MissingIdentity);
        };
        let chart = *chart;

        self.ctx.chart_data.merge(working.clone());
        self.ctx.revision += 1;

        let token = SessionToken::fresh();
        self.transition(EditState::Saving { chart, token });
        Ok(Effect::Upsert {
            token,
            key,
            data: self.ctx.chart_data.clone(),
        })
    }

    /// Upsert finished. The session ends whatever the outcome.
    pub fn save_completed(&mut self, token: SessionToken, outcome: Result<(), StoreError>) -> bool {
        match &self.state {
            EditState::Saving { token: current, .. } if *current == token => {}
            _ => {
                log::debug!("Dropping stale save result {}", token);
                return false;
            }
        }

        match outcome {
            Ok(()) => log::info!("Saved chart data"),
            Err(e) => log::error!("Failed to save chart data, keeping local values: {}", e),
        }
        self.transition(EditState::Idle);
        true
    }

    /// Abort the session. Nothing persisted is touched.
    pub fn cancel(&mut self) -> Result<Vec<Effect>, DashboardError> {
        let effects = match &self.state {
            EditState::Idle => return Ok(Vec::new()),
            EditState::Saving { .. } => return Err(self.invalid("cancel")),
            EditState::FetchingPrevious { token, .. } => vec![Effect::Abort(*token)],
            EditState::AwaitingIdentity { .. }
            | EditState::Confirming { .. }
            | EditState::Editing { .. } => Vec::new(),
        };
        self.transition(EditState::Idle);
        Ok(effects)
    }

    fn start_fetch(&mut self, chart: ChartKind, key: Identity) -> Effect {
        let token = SessionToken::fresh();
        self.transition(EditState::FetchingPrevious { chart, token });
        Effect::Fetch { token, key }
    }

    fn start_editing_current(&mut self, chart: ChartKind) {
        let working = self.ctx.chart_data.slice(chart);
        self.transition(EditState::Editing {
            chart,
            working,
            previous: None,
        });
    }

    fn transition(&mut self, next: EditState) {
        log::debug!(
            "Edit workflow {} -> {} ({:?})",
            self.state.phase(),
            next.phase(),
            next.chart()
        );
        self.state = next;
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), DashboardError> {
        if self.phase() == phase {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> DashboardError {
        DashboardError::InvalidTransition {
            action,
            phase: self.phase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AvgCallDuration, SuccessVsFailure};

    fn alice() -> Identity {
        Identity::parse("alice@example.com").unwrap()
    }

    fn fetch_token(effects: &[Effect]) -> SessionToken {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Fetch { token, .. } => Some(*token),
                _ => None,
            })
            .expect("fetch effect")
    }

    fn upsert_parts(effect: Effect) -> (SessionToken, Identity, ChartData) {
        match effect {
            Effect::Upsert { token, key, data } => (token, key, data),
            other => panic!("expected upsert, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_without_identity_prompts() {
        let mut wf = EditWorkflow::new(ChartData::default(), None);
        let effects = wf.request_edit(ChartKind::CallsPerDay).unwrap();
        assert!(effects.is_empty());
        assert_eq!(wf.phase(), Phase::AwaitingIdentity);
    }

    #[test]
    fn test_malformed_identity_does_not_advance() {
        let mut wf = EditWorkflow::new(ChartData::default(), None);
        wf.request_edit(ChartKind::CallsPerDay).unwrap();

        for raw in ["", "   ", "alice", "alice@example", "a b@example.com", "@x.io"] {
            assert!(matches!(
                wf.submit_identity(raw),
                Err(DashboardError::Identity(_))
            ));
            assert_eq!(wf.phase(), Phase::AwaitingIdentity);
            assert!(wf.identity().is_none());
        }

        match wf.state() {
            EditState::AwaitingIdentity { error, .. } => {
                assert_eq!(error.as_deref(), Some("Please enter a valid email address"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_identity_submission_persists_then_fetches() {
        let mut wf = EditWorkflow::new(ChartData::default(), None);
        wf.request_edit(ChartKind::AvgCallDuration).unwrap();
        let effects = wf.submit_identity("  Alice@Example.com ").unwrap();

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::PersistIdentity(alice()));
        assert!(matches!(&effects[1], Effect::Fetch { key, .. } if *key == alice()));
        assert_eq!(wf.phase(), Phase::FetchingPrevious);
        assert_eq!(wf.identity(), Some(&alice()));
    }

    #[test]
    fn test_absent_record_edits_current_values() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::SuccessVsFailure).unwrap());

        assert!(wf.previous_fetched(token, Ok(None)));
        match wf.state() {
            EditState::Editing {
                working, previous, ..
            } => {
                assert_eq!(
                    *working,
                    ChartSlice::SuccessVsFailure(SuccessVsFailure {
                        success: 285,
                        failure: 15
                    })
                );
                assert!(previous.is_none());
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_fetch_error_never_blocks_editing() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::CallsPerDay).unwrap());
        assert!(wf.previous_fetched(token, Err(StoreError::Unavailable("down".into()))));
        assert_eq!(wf.phase(), Phase::Editing);
    }

    #[test]
    fn test_confirm_seeds_from_previous_not_current() {
        let mut saved = ChartData::default();
        saved.avg_call_duration = vec![AvgCallDuration::new("Week 1", 100.0)];

        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::AvgCallDuration).unwrap());
        wf.previous_fetched(token, Ok(Some(saved)));

        let expected = ChartSlice::AvgCallDuration(vec![AvgCallDuration::new("Week 1", 100.0)]);
        assert_eq!(
            *wf.state(),
            EditState::Confirming {
                chart: ChartKind::AvgCallDuration,
                previous: expected.clone()
            }
        );

        wf.confirm_overwrite().unwrap();
        match wf.state() {
            EditState::Editing { working, .. } => assert_eq!(*working, expected),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_stale_fetch_is_dropped() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let first = fetch_token(&wf.request_edit(ChartKind::CallsPerDay).unwrap());
        let cancel = wf.cancel().unwrap();
        assert_eq!(cancel, vec![Effect::Abort(first)]);

        let second = fetch_token(&wf.request_edit(ChartKind::SuccessVsFailure).unwrap());
        assert!(!wf.previous_fetched(first, Ok(Some(ChartData::default()))));
        assert_eq!(wf.phase(), Phase::FetchingPrevious);

        assert!(wf.previous_fetched(second, Ok(None)));
        assert_eq!(wf.state().chart(), Some(ChartKind::SuccessVsFailure));
    }

    #[test]
    fn test_save_merges_optimistically_and_ends_on_failure() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::SuccessVsFailure).unwrap());
        wf.previous_fetched(token, Ok(None));
        wf.change_value(ValueChange::Success(300)).unwrap();
        wf.change_value(ValueChange::Failure(20)).unwrap();

        let (token, key, data) = upsert_parts(wf.save().unwrap());
        assert_eq!(key, alice());
        assert_eq!(data.success_vs_failure.success, 300);
        assert_eq!(wf.chart_data().success_vs_failure.failure, 20);
        assert_eq!(wf.phase(), Phase::Saving);
        assert!(wf.loading());

        assert!(wf.save_completed(token, Err(StoreError::Unavailable("down".into()))));
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(!wf.loading());
        assert_eq!(wf.chart_data().success_vs_failure.success, 300);
    }

    #[test]
    fn test_cancel_discards_working_copy() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::CallsPerDay).unwrap());
        wf.previous_fetched(token, Ok(None));
        wf.change_value(ValueChange::Calls { index: 0, calls: 1 })
            .unwrap();

        assert!(wf.cancel().unwrap().is_empty());
        assert_eq!(wf.phase(), Phase::Idle);
        assert_eq!(*wf.chart_data(), ChartData::default());
    }

    #[test]
    fn test_intents_out_of_phase_are_rejected() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        assert!(wf.save().is_err());
        assert!(wf.confirm_overwrite().is_err());
        assert!(wf.change_value(ValueChange::Success(1)).is_err());
        assert!(wf.submit_identity("a@b.co").is_err());

        let token = fetch_token(&wf.request_edit(ChartKind::CallsPerDay).unwrap());
        assert!(wf.request_edit(ChartKind::AvgCallDuration).is_err());
        wf.previous_fetched(token, Ok(None));
        wf.save().unwrap();
        assert!(matches!(
            wf.cancel(),
            Err(DashboardError::InvalidTransition {
                phase: Phase::Saving,
                ..
            })
        ));
    }

    #[test]
    fn test_rejected_value_change_keeps_working_copy() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::CallsPerDay).unwrap());
        wf.previous_fetched(token, Ok(None));
        let before = wf.state().clone();

        assert!(matches!(
            wf.change_value(ValueChange::Calls { index: 42, calls: 1 }),
            Err(DashboardError::InvalidInput(_))
        ));
        assert!(wf.change_value(ValueChange::Success(1)).is_err());
        assert_eq!(*wf.state(), before);
    }

    #[test]
    fn test_load_replaces_values() {
        let mut saved = ChartData::default();
        saved.success_vs_failure.success = 1;

        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let Some(Effect::Load { token, .. }) = wf.begin_load() else {
            panic!("expected load");
        };
        assert!(wf.loading());
        assert!(wf.load_completed(token, Ok(Some(saved.clone()))));
        assert_eq!(*wf.chart_data(), saved);
        assert!(!wf.loading());
    }

    #[test]
    fn test_load_without_identity_is_skipped() {
        let mut wf = EditWorkflow::new(ChartData::default(), None);
        assert!(wf.begin_load().is_none());
    }

    #[test]
    fn test_load_after_save_is_discarded() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let Some(Effect::Load { token: load, .. }) = wf.begin_load() else {
            panic!("expected load");
        };

        let fetch = fetch_token(&wf.request_edit(ChartKind::SuccessVsFailure).unwrap());
        wf.previous_fetched(fetch, Ok(None));
        wf.change_value(ValueChange::Success(500)).unwrap();
        let (save, _, _) = upsert_parts(wf.save().unwrap());
        wf.save_completed(save, Ok(()));

        assert!(!wf.load_completed(load, Ok(Some(ChartData::default()))));
        assert_eq!(wf.chart_data().success_vs_failure.success, 500);
    }

    #[test]
    fn test_forget_identity_only_when_idle() {
        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        wf.request_edit(ChartKind::CallsPerDay).unwrap();
        assert!(wf.forget_identity().is_err());
        wf.cancel().unwrap();
        assert!(wf.forget_identity().unwrap().is_empty());
        assert!(wf.identity().is_none());
    }

    #[test]
    fn test_forget_identity_resets_values_and_aborts_load() {
        let mut saved = ChartData::default();
        saved.success_vs_failure.success = 9999;

        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let Some(Effect::Load { token: first, .. }) = wf.begin_load() else {
            panic!("expected load");
        };
        assert!(wf.load_completed(first, Ok(Some(saved.clone()))));
        assert_eq!(wf.chart_data().success_vs_failure.success, 9999);
        assert!(wf.forget_identity().unwrap().is_empty());
        assert_eq!(*wf.chart_data(), ChartData::default());

        wf.adopt_identity(alice());
        let Some(Effect::Load { token: second, .. }) = wf.begin_load() else {
            panic!("expected load");
        };
        assert_eq!(wf.forget_identity().unwrap(), vec![Effect::Abort(second)]);
        assert!(!wf.loading());
        assert!(!wf.load_completed(second, Ok(Some(saved))));
        assert_eq!(*wf.chart_data(), ChartData::default());
    }

    #[test]
    fn test_cancel_from_confirming_returns_to_idle() {
        let mut saved = ChartData::default();
        saved.success_vs_failure = SuccessVsFailure {
            success: 7,
            failure: 3,
        };

        let mut wf = EditWorkflow::new(ChartData::default(), Some(alice()));
        let token = fetch_token(&wf.request_edit(ChartKind::SuccessVsFailure).unwrap());
        assert!(wf.previous_fetched(token, Ok(Some(saved))));
        assert_eq!(wf.phase(), Phase::Confirming);

        assert!(wf.cancel().unwrap().is_empty());
        assert_eq!(wf.phase(), Phase::Idle);
        assert_eq!(*wf.chart_data(), ChartData::default());
        assert!(wf.confirm_overwrite().is_err());
    }
}
