//! Debounced draft autosave for the page editor.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{Page, PageStatus};
use crate::client::ClientError;
use crate::core::shared::debounce::Debouncer;

pub const AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

#[async_trait]
pub trait DraftSink: Send + Sync {
    async fn save_draft(&self, page_id: Uuid, version: i32, content: &str) -> Result<Page, ClientError>;
}

#[derive(Debug)]
pub struct AutosaveUpdate {
    pub generation: u64,
    pub result: Result<Page, ClientError>,
}

pub struct Autosaver {
    sink: Arc<dyn DraftSink>,
    debouncer: Debouncer,
    page_id: Uuid,
    status: PageStatus,
    version: Arc<AtomicI32>,
    updates: mpsc::UnboundedSender<AutosaveUpdate>,
}

impl Autosaver {
    pub fn new(sink: Arc<dyn DraftSink>, page: &Page) -> (Self, mpsc::UnboundedReceiver<AutosaveUpdate>) {
        Self::with_delay(sink, page, AUTOSAVE_DELAY)
    }

    pub fn with_delay(
        sink: Arc<dyn DraftSink>,
        page: &Page,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<AutosaveUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sink,
                debouncer: Debouncer::new(delay),
                page_id: page.id,
                status: page.status(),
                version: Arc::new(AtomicI32::new(page.version)),
                updates: tx,
            },
            rx,
        )
    }

    pub fn version(&self) -> i32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Tracks a status change made elsewhere, e.g. a submit for review.
    pub fn set_status(&mut self, status: PageStatus) {
        self.status = status;
        if !status.autosaves() {
            self.debouncer.cancel();
        }
    }

    /// Adopts a page returned by an explicit save.
    pub fn sync(&mut self, page: &Page) {
        self.version.store(page.version, Ordering::SeqCst);
        self.set_status(page.status());
    }

    pub fn on_edit(&mut self, content: &str) {
        if !self.status.autosaves() {
            debug!("page {} is {}, autosave skipped", self.page_id, self.status);
            return;
        }
        let sink = Arc::clone(&self.sink);
        let version = Arc::clone(&self.version);
        let updates = self.updates.clone();
        let page_id = self.page_id;
        let content = content.to_string();
        self.debouncer.schedule(move |generation| async move {
            let result = sink
                .save_draft(page_id, version.load(Ordering::SeqCst), &content)
                .await;
            match &result {
                Ok(page) => version.store(page.version, Ordering::SeqCst),
                Err(e) => warn!("autosave of page {page_id} failed: {e}"),
            }
            let _ = updates.send(AutosaveUpdate {
                generation: generation.value(),
                result,
            });
        });
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}
