use crate::config::Config;
use crate::sanitize::InputSanitizer;
use crate::store::Repositories;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub sanitizer: InputSanitizer,
    pub config: Config,
}

impl AppState {
    /// State with the default sanitization policy.
    pub fn new(repos: Repositories, config: Config) -> Self {
        AppState {
            repos,
            sanitizer: InputSanitizer::default(),
            config,
        }
    }
}

impl FromRef<AppState> for Repositories {
    fn from_ref(state: &AppState) -> Self {
        state.repos.clone()
    }
}

impl FromRef<AppState> for InputSanitizer {
    fn from_ref(state: &AppState) -> Self {
        state.sanitizer.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
