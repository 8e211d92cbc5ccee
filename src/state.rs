use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    engine::{ExamEngine, clock::Clock, violation::ViolationPolicy},
    store::{ExamCatalog, SessionRepository},
    utils::notify::Notifier,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExamEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

impl AppState {
    /// Wires the engine from its collaborators, taking the violation policy
    /// from `config`.
    pub fn new(
        config: Config,
        exams: Arc<dyn ExamCatalog>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let policy = ViolationPolicy::from(&config);
        Self {
            engine: Arc::new(ExamEngine::new(exams, sessions, clock, policy)),
            notifier,
            config,
        }
    }
}

impl FromRef<AppState> for Arc<ExamEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Notifier> {
    fn from_ref(state: &AppState) -> Self {
        state.notifier.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
