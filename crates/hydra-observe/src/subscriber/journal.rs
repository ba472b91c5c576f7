use async_trait::async_trait;
use hydra_core::{JobEvent, Subscribe};

use crate::subscriber::view::log_event;

/// Logs every [`JobEvent`] through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &JobEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }
}
