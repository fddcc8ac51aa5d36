//! Shared handler state
//!
//! The client bundle is constructed once in `main` and passed into every
//! handler; nothing lives in module-level globals, so tests swap in fakes.

use skyforge_cloud::CloudApi;
use skyforge_remote::Connect;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cloud: Arc<dyn CloudApi>,
    pub connector: Arc<dyn Connect>,
}

impl AppState {
    pub fn new(cloud: Arc<dyn CloudApi>, connector: Arc<dyn Connect>) -> Self {
        Self { cloud, connector }
    }
}
