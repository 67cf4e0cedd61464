use std::sync::Arc;

use crate::core::{config::Settings, rate_limit::RateLimiters};
use crate::db::ProcedureExecutor;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    gateway: Arc<dyn ProcedureExecutor>,
    limiters: RateLimiters,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        gateway: Arc<dyn ProcedureExecutor>,
        limiters: RateLimiters,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, gateway, limiters }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn gateway(&self) -> &dyn ProcedureExecutor {
        self.inner.gateway.as_ref()
    }

    pub(crate) fn limiters(&self) -> &RateLimiters {
        &self.inner.limiters
    }
}
