use std::sync::Arc;

use crate::core::config::Settings;
use crate::core::time::Clock;
use crate::repositories::ExamStore;
use crate::services::reporting::ReportService;
use crate::services::session::SessionService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn ExamStore>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, store: Arc<dyn ExamStore>, clock: Arc<dyn Clock>) -> Self {
        Self { inner: Arc::new(InnerState { settings, store, clock }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &Arc<dyn ExamStore> {
        &self.inner.store
    }

    pub(crate) fn sessions(&self) -> SessionService {
        SessionService::new(
            self.inner.store.clone(),
            self.inner.clock.clone(),
            self.inner.settings.exam().save_grace_seconds,
        )
    }

    pub(crate) fn reports(&self) -> ReportService {
        ReportService::new(self.inner.store.clone())
    }
}
