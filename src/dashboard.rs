//! Dashboard driver.
//!
//! Owns the edit workflow, the remote store, and the durable identity file.
//! Remote calls run as tokio tasks tagged with the workflow's session token.
//! Completions are applied one at a time, so the workflow has a single writer.
//! Must be used from within a tokio runtime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::{AbortHandle, JoinSet};

use crate::error::DashboardError;
use crate::identity::{Identity, IdentityStore};
use crate::store::{exists_or_false, ChartStore, StoreError};
use crate::types::ChartData;
use crate::ui::{self, ChartPanel, Intent, Modal};
use crate::workflow::{EditWorkflow, Effect, Phase, SessionToken};

/// Result of a remote call, tagged with the token it was issued under.
#[derive(Debug)]
pub enum Completion {
    Loaded {
        token: SessionToken,
        outcome: Result<Option<ChartData>, StoreError>,
    },
    Previous {
        token: SessionToken,
        outcome: Result<Option<ChartData>, StoreError>,
    },
    Saved {
        token: SessionToken,
        outcome: Result<(), StoreError>,
    },
}

impl Completion {
    fn token(&self) -> SessionToken {
        match self {
            Completion::Loaded { token, .. }
            | Completion::Previous { token, .. }
            | Completion::Saved { token, .. } => *token,
        }
    }
}

/// What a completion did once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Loaded,
    Previous,
    Saved,
    /// The owning session had already moved on.
    Stale,
}

pub struct Dashboard<S: ChartStore + 'static> {
    workflow: EditWorkflow,
    store: Arc<S>,
    identities: IdentityStore,
    tasks: JoinSet<Completion>,
    handles: HashMap<SessionToken, AbortHandle>,
}

impl<S: ChartStore + 'static> Dashboard<S> {
    /// Read the durable identity once and start loading that user's values.
    pub fn open(store: Arc<S>, identities: IdentityStore) -> Self {
        let identity = identities.load().unwrap_or_else(|e| {
            log::warn!("Could not read stored identity: {}", e);
            None
        });
        if let Some(id) = &identity {
            log::info!("Restored session for {}", id);
        }

        let mut dashboard = Self {
            workflow: EditWorkflow::new(ChartData::default(), identity),
            store,
            identities,
            tasks: JoinSet::new(),
            handles: HashMap::new(),
        };
        if let Some(load) = dashboard.workflow.begin_load() {
            dashboard.run_effects(vec![load]);
        }
        dashboard
    }

    pub fn workflow(&self) -> &EditWorkflow {
        &self.workflow
    }

    pub fn chart_data(&self) -> &ChartData {
        self.workflow.chart_data()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.workflow.identity()
    }

    pub fn phase(&self) -> Phase {
        self.workflow.phase()
    }

    /// True while any remote call is outstanding, for the loading indicator.
    pub fn busy(&self) -> bool {
        self.workflow.loading() || self.phase() == Phase::FetchingPrevious
    }

    pub fn has_in_flight(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn panels(&self) -> Vec<ChartPanel> {
        ui::panels(self.workflow.chart_data())
    }

    pub fn modal(&self) -> Modal {
        ui::modal(self.workflow.state())
    }

    /// Apply a user intent and launch whatever remote work it needs.
    pub fn dispatch(&mut self, intent: Intent) -> Result<(), DashboardError> {
        let effects = match intent {
            Intent::EditRequested(chart) => {
                self.refresh_identity();
                self.workflow.request_edit(chart)?
            }
            Intent::IdentitySubmitted(raw) => self.workflow.submit_identity(&raw)?,
            Intent::ValueEntered { field, raw } => {
                let change = ui::parse_field_input(field, &raw)?;
                self.workflow.change_value(change)?;
                Vec::new()
            }
            Intent::ConfirmOverwrite => {
                self.workflow.confirm_overwrite()?;
                Vec::new()
            }
            Intent::Save => vec![self.workflow.save()?],
            Intent::Cancel => self.workflow.cancel()?,
        };
        self.run_effects(effects);
        Ok(())
    }

    /// Wait for the next remote call to finish and apply it.
    ///
    /// Returns `None` once nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Settled> {
        loop {
            match self.tasks.join_next().await? {
                Ok(completion) => {
                    self.handles.remove(&completion.token());
                    return Some(self.apply(completion));
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    log::error!("Store task failed: {}", e);
                    self.handles.retain(|_, handle| !handle.is_finished());
                }
            }
        }
    }

    /// Drain every outstanding remote call.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Whether the store holds saved values for the current user.
    pub async fn has_saved_data(&self) -> bool {
        match self.workflow.identity() {
            Some(id) => exists_or_false(self.store.as_ref(), id).await,
            None => false,
        }
    }

    /// Forget the identity in memory and on disk. The on-screen values go back
    /// to the defaults.
    pub fn sign_out(&mut self) -> Result<(), DashboardError> {
        let effects = self.workflow.forget_identity()?;
        self.run_effects(effects);
        self.identities.clear()
    }

    fn apply(&mut self, completion: Completion) -> Settled {
        let (applied, settled) = match completion {
            Completion::Loaded { token, outcome } => {
                (self.workflow.load_completed(token, outcome), Settled::Loaded)
            }
            Completion::Previous { token, outcome } => {
                (self.workflow.previous_fetched(token, outcome), Settled::Previous)
            }
            Completion::Saved { token, outcome } => {
                (self.workflow.save_completed(token, outcome), Settled::Saved)
            }
        };
        if applied {
            settled
        } else {
            Settled::Stale
        }
    }

    /// Pick up an identity written to durable storage since startup.
    fn refresh_identity(&mut self) {
        if self.workflow.identity().is_some() {
            return;
        }
        match self.identities.load() {
            Ok(Some(identity)) => self.workflow.adopt_identity(identity),
            Ok(None) => {}
            Err(e) => log::warn!("Could not read stored identity: {}", e),
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistIdentity(identity) => {
                    if let Err(e) = self.identities.save(&identity) {
                        log::warn!("Failed to persist identity: {}", e);
                    }
                }
                Effect::Load { token, key } => {
                    let store = Arc::clone(&self.store);
                    self.spawn(token, async move {
                        let outcome = store.fetch(&key).await;
                        Completion::Loaded { token, outcome }
                    });
                }
                Effect::Fetch { token, key } => {
                    let store = Arc::clone(&self.store);
                    self.spawn(token, async move {
                        let outcome = store.fetch(&key).await;
                        Completion::Previous { token, outcome }
                    });
                }
                Effect::Upsert { token, key, data } => {
                    let store = Arc::clone(&self.store);
                    self.spawn(token, async move {
                        let outcome = store.upsert(&key, &data).await;
                        Completion::Saved { token, outcome }
                    });
                }
                Effect::Abort(token) => {
                    if let Some(handle) = self.handles.remove(&token) {
                        log::debug!("Aborting superseded request {}", token);
                        handle.abort();
                    }
                }
            }
        }
    }

    fn spawn<F>(&mut self, token: SessionToken, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.handles.insert(token, handle);
    }
}
