use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::entity::FieldKey;
use crate::error::{Error, Result};
use crate::progress::ProgressState;
use crate::view::ViewState;
use crate::view::notice::NoticeSender;

/// Toggles of one field that have rendered but not yet settled.
#[derive(Debug)]
struct InFlight {
    pending: BTreeSet<u64>,
    /// Last value known to be authoritative: the value shown before the
    /// first pending toggle, or the newest successful settlement since.
    baseline: ProgressState,
    baseline_token: u64,
}

impl InFlight {
    fn new(baseline: ProgressState) -> Self {
        Self {
            pending: BTreeSet::new(),
            baseline,
            baseline_token: 0,
        }
    }

    fn superseded(&self, token: u64) -> bool {
        self.pending.range(token + 1..).next().is_some()
    }
}

/// Applies a requested value to the view before the backend confirms it,
/// then reconciles with the backend's answer or rolls back.
pub struct ToggleController {
    view: Arc<ViewState>,
    notices: NoticeSender,
    serialize: bool,
    next_token: AtomicU64,
    in_flight: DashMap<FieldKey, InFlight>,
}

impl ToggleController {
    /// With `serialize` set, a settlement only renders when no newer toggle
    /// of the same field is still in flight.
    pub fn new(view: Arc<ViewState>, notices: NoticeSender, serialize: bool) -> Self {
        Self {
            view,
            notices,
            serialize,
            next_token: AtomicU64::new(0),
            in_flight: DashMap::new(),
        }
    }

    pub fn view(&self) -> &Arc<ViewState> {
        &self.view
    }

    pub fn notices(&self) -> &NoticeSender {
        &self.notices
    }

    /// Number of unsettled toggles of `key`.
    pub fn pending(&self, key: &FieldKey) -> usize {
        self.in_flight.get(key).map(|f| f.pending.len()).unwrap_or(0)
    }

    /// Render `requested`, run `mutate(requested)`, then render the server's
    /// value or roll back to `current`.
    ///
    /// Returns the server value. Values that do not fit `key` fail with
    /// `Validation` before anything is rendered; every other failure is
    /// rolled back, announced, and returned.
    pub async fn toggle<F, Fut>(
        &self,
        key: FieldKey,
        current: ProgressState,
        requested: ProgressState,
        mutate: F,
    ) -> Result<ProgressState>
    where
        F: FnOnce(ProgressState) -> Fut,
        Fut: Future<Output = Result<ProgressState>>,
    {
        current.check_for(&key)?;
        let token = self.begin(&key, &current, &requested)?;
        debug!(%key, token, "optimistic {requested}");

        let outcome = mutate(requested).await.and_then(|value| {
            value.check_for(&key).map_err(|_| {
                Error::Transport(format!("backend answered {value} for {key}"))
            })?;
            Ok(value)
        });

        match &outcome {
            Ok(value) => info!(%key, token, "confirmed {value}"),
            Err(e) => {
                warn!(%key, token, "rolling back: {e}");
                self.notices.error(key.failure_message());
            }
        }
        if let Some(display) = self.settle(&key, token, &current, &outcome) {
            self.show(&key, &display);
        }
        outcome
    }

    /// Render a value that has no backend counterpart.
    pub fn toggle_local(&self, key: FieldKey, requested: ProgressState) -> Result<ProgressState> {
        self.view.render(&key, &requested)?;
        debug!(%key, "local {requested}");
        Ok(requested)
    }

    fn begin(&self, key: &FieldKey, current: &ProgressState, requested: &ProgressState) -> Result<u64> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.serialize {
            self.view.render(key, requested)?;
            return Ok(token);
        }
        let mut slot = self
            .in_flight
            .entry(*key)
            .or_insert_with(|| InFlight::new(current.clone()));
        if let Err(e) = self.view.render(key, requested) {
            drop(slot);
            self.in_flight.remove_if(key, |_, f| f.pending.is_empty());
            return Err(e);
        }
        slot.pending.insert(token);
        Ok(token)
    }

    /// What to display once `token` settles, if anything.
    fn settle(
        &self,
        key: &FieldKey,
        token: u64,
        current: &ProgressState,
        outcome: &Result<ProgressState>,
    ) -> Option<ProgressState> {
        if !self.serialize {
            return Some(match outcome {
                Ok(value) => value.clone(),
                Err(_) => current.clone(),
            });
        }
        let display = {
            let mut slot = self.in_flight.get_mut(key)?;
            slot.pending.remove(&token);
            if let Ok(value) = outcome {
                if token > slot.baseline_token {
                    slot.baseline = value.clone();
                    slot.baseline_token = token;
                }
            }
            if slot.superseded(token) {
                debug!(%key, token, "superseded, not rendering");
                None
            } else {
                Some(slot.baseline.clone())
            }
        };
        self.in_flight.remove_if(key, |_, f| f.pending.is_empty());
        display
    }

    fn show(&self, key: &FieldKey, value: &ProgressState) {
        if let Err(e) = self.view.render(key, value) {
            warn!(%key, "settled value not displayed: {e}");
        }
    }
}
