//! View state for the asset list page.
//!
//! [`reduce`] is the whole state machine and performs no I/O. [`Coordinator`]
//! feeds it events and runs the network requests the state asks for.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::{AssetApi, ClientError};
use crate::filter::{self, FilterCriteria};
use crate::model::{Asset, AssetField, AssetKind};
use crate::session::SessionStore;
use crate::sort::{self, SortConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last fetch failed; the list is empty but the controls still work.
    Failed,
    Detail,
    RedirectToLogin,
    Unmounted,
}

#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub phase: Phase,
    /// Last fetched snapshot, replaced wholesale.
    pub assets: Vec<Asset>,
    /// `sort(filter(assets, criteria), sort)`, kept in step with every event.
    pub visible: Vec<Asset>,
    pub criteria: FilterCriteria,
    pub sort: SortConfig,
    pub selected: Option<Asset>,
    pub error: Option<String>,
    generation: u64,
    outstanding: Option<u64>,
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Generation of the fetch the view is waiting on, if any.
    pub fn pending_fetch(&self) -> Option<u64> {
        match self.phase {
            Phase::Loading => self.outstanding,
            _ => None,
        }
    }

    pub fn agencies(&self) -> Vec<String> {
        filter::unique_agencies(&self.assets)
    }

    pub fn districts(&self) -> Vec<String> {
        filter::unique_districts(&self.assets)
    }

    fn accepts_controls(&self) -> bool {
        !matches!(
            self.phase,
            Phase::Idle | Phase::RedirectToLogin | Phase::Unmounted
        )
    }

    fn start_fetch(&mut self) {
        self.generation += 1;
        self.outstanding = Some(self.generation);
        self.phase = Phase::Loading;
        self.error = None;
    }

    fn recompute(&mut self) {
        let filtered = filter::filter_assets(&self.assets, &self.criteria);
        self.visible = sort::sort_assets(&filtered, &self.sort);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.phase == Phase::Loading && self.outstanding == Some(generation)
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    Mounted { has_session: bool },
    SessionLost,
    Refresh,
    FetchSucceeded { generation: u64, assets: Vec<Asset> },
    FetchFailed { generation: u64, error: String },
    SearchChanged(String),
    SearchCleared,
    SetTypeInclude(bool),
    ToggleType(AssetKind),
    SetAgencyInclude(bool),
    ToggleAgency(String),
    SetDistrictInclude(bool),
    ToggleDistrict(String),
    CriteriaReplaced(FilterCriteria),
    SortRequested(AssetField),
    RowSelected(String),
    Back,
    UpdateSucceeded,
    UpdateFailed { error: String },
    Unmounted,
}

pub fn reduce(mut state: ViewState, event: Event) -> ViewState {
    if state.phase == Phase::Unmounted || state.phase == Phase::RedirectToLogin {
        return state;
    }

    match event {
        Event::Mounted { has_session } => {
            if state.phase != Phase::Idle {
                return state;
            }
            if has_session {
                state.start_fetch();
            } else {
                state.phase = Phase::RedirectToLogin;
            }
        }
        Event::SessionLost => {
            state.phase = Phase::RedirectToLogin;
            state.outstanding = None;
        }
        Event::Refresh => {
            if matches!(state.phase, Phase::Ready | Phase::Failed) {
                state.start_fetch();
            }
        }
        Event::FetchSucceeded { generation, assets } => {
            if !state.is_current(generation) {
                debug!(generation, "dropping stale fetch result");
                return state;
            }
            state.outstanding = None;
            state.assets = assets;
            state.phase = Phase::Ready;
            state.recompute();
        }
        Event::FetchFailed { generation, error } => {
            if !state.is_current(generation) {
                debug!(generation, "dropping stale fetch failure");
                return state;
            }
            state.outstanding = None;
            state.assets.clear();
            state.phase = Phase::Failed;
            state.error = Some(error);
            state.recompute();
        }
        Event::SearchChanged(text) => {
            if state.accepts_controls() {
                state.criteria.search_text = text;
                state.recompute();
            }
        }
        Event::SearchCleared => {
            if state.accepts_controls() {
                state.criteria.search_text.clear();
                state.recompute();
            }
        }
        Event::SetTypeInclude(include) => {
            if state.accepts_controls() {
                state.criteria.type_include = include;
                state.recompute();
            }
        }
        Event::ToggleType(kind) => {
            if state.accepts_controls() {
                state.criteria.toggle_type(kind);
                state.recompute();
            }
        }
        Event::SetAgencyInclude(include) => {
            if state.accepts_controls() {
                state.criteria.agency_include = include;
                state.recompute();
            }
        }
        Event::ToggleAgency(agency) => {
            if state.accepts_controls() {
                state.criteria.toggle_agency(&agency);
                state.recompute();
            }
        }
        Event::SetDistrictInclude(include) => {
            if state.accepts_controls() {
                state.criteria.district_include = include;
                state.recompute();
            }
        }
        Event::ToggleDistrict(district) => {
            if state.accepts_controls() {
                state.criteria.toggle_district(&district);
                state.recompute();
            }
        }
        Event::CriteriaReplaced(criteria) => {
            if state.accepts_controls() {
                state.criteria = criteria;
                state.recompute();
            }
        }
        Event::SortRequested(field) => {
            if state.accepts_controls() {
                state.sort = state.sort.toggle(field);
                state.recompute();
            }
        }
        Event::RowSelected(id) => {
            if state.phase != Phase::Ready {
                return state;
            }
            if let Some(asset) = state.assets.iter().find(|a| a.id == id) {
                state.selected = Some(asset.clone());
                state.phase = Phase::Detail;
                state.error = None;
            }
        }
        Event::Back => {
            if state.phase == Phase::Detail {
                state.selected = None;
                state.phase = Phase::Ready;
                state.error = None;
            }
        }
        Event::UpdateSucceeded => {
            if state.phase == Phase::Detail {
                state.selected = None;
                state.start_fetch();
            }
        }
        Event::UpdateFailed { error } => {
            if state.phase == Phase::Detail {
                state.error = Some(error);
            }
        }
        Event::Unmounted => {
            state.phase = Phase::Unmounted;
            state.outstanding = None;
        }
    }
    state
}

/// Tears the view down from outside the coordinator, e.g. on Ctrl-C.
#[derive(Clone, Debug)]
pub struct UnmountHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl UnmountHandle {
    pub fn unmount(&self) {
        self.tx.send_replace(true);
    }
}

pub struct Coordinator<'a> {
    api: &'a dyn AssetApi,
    session: &'a dyn SessionStore,
    state: ViewState,
    unmount_tx: Arc<watch::Sender<bool>>,
    unmount_rx: watch::Receiver<bool>,
}

impl<'a> Coordinator<'a> {
    pub fn new(api: &'a dyn AssetApi, session: &'a dyn SessionStore) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            api,
            session,
            state: ViewState::default(),
            unmount_tx: Arc::new(tx),
            unmount_rx: rx,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn unmount_handle(&self) -> UnmountHandle {
        UnmountHandle {
            tx: Arc::clone(&self.unmount_tx),
        }
    }

    pub fn dispatch(&mut self, event: Event) -> &ViewState {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
        &self.state
    }

    fn current_token(&self) -> Option<String> {
        match self.session.token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read session");
                None
            }
        }
    }

    pub async fn mount(&mut self) -> &ViewState {
        let has_session = self.current_token().is_some();
        self.dispatch(Event::Mounted { has_session });
        self.run_pending_fetch().await;
        &self.state
    }

    /// Re-fetches the list from `Ready` or `Failed`.
    pub async fn refresh(&mut self) -> &ViewState {
        self.dispatch(Event::Refresh);
        self.run_pending_fetch().await;
        &self.state
    }

    /// Saves the record shown in the detail view, then reloads the list.
    pub async fn submit_update(&mut self, asset: &Asset) -> Result<(), ClientError> {
        let Some(token) = self.current_token() else {
            self.dispatch(Event::SessionLost);
            return Err(ClientError::AuthRequired);
        };
        match self.api.update_asset(&token, asset).await {
            Ok(()) => {
                self.dispatch(Event::UpdateSucceeded);
                self.run_pending_fetch().await;
                Ok(())
            }
            Err(e) => {
                warn!(id = %asset.id, error = %e, "asset update failed");
                self.dispatch(Event::UpdateFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn unmount(&mut self) {
        self.unmount_tx.send_replace(true);
        self.dispatch(Event::Unmounted);
    }

    async fn run_pending_fetch(&mut self) {
        let Some(generation) = self.state.pending_fetch() else {
            return;
        };
        let already_gone = *self.unmount_rx.borrow();
        if already_gone {
            self.dispatch(Event::Unmounted);
            return;
        }
        let Some(token) = self.current_token() else {
            self.dispatch(Event::SessionLost);
            return;
        };

        let mut unmounted = self.unmount_rx.clone();
        let api = self.api;
        let outcome = tokio::select! {
            result = api.fetch_assets(&token) => Some(result),
            _ = unmounted.wait_for(|gone| *gone) => None,
        };

        match outcome {
            None => {
                debug!(generation, "fetch cancelled by unmount");
                self.dispatch(Event::Unmounted);
            }
            Some(Ok(assets)) => {
                self.dispatch(Event::FetchSucceeded { generation, assets });
            }
            Some(Err(e)) => {
                warn!(error = %e, "error fetching idle assets");
                self.dispatch(Event::FetchFailed {
                    generation,
                    error: e.to_string(),
                });
            }
        }
    }
}
