//! Debounced routing analysis while a requester types a description.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::suggestion::{AnalyzeTicketRequest, RoutingSuggestion};
use crate::client::ClientError;
use crate::core::shared::debounce::Debouncer;

pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const ANALYSIS_DELAY: Duration = Duration::from_millis(500);

#[async_trait]
pub trait RoutingAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalyzeTicketRequest) -> Result<RoutingSuggestion, ClientError>;
}

#[derive(Debug)]
pub struct AnalysisUpdate {
    pub generation: u64,
    pub result: Result<RoutingSuggestion, ClientError>,
}

/// Feeds description edits to a [`RoutingAnalyzer`], at most one call per
/// quiet period. Results from superseded requests are dropped.
pub struct AnalysisSession {
    analyzer: Arc<dyn RoutingAnalyzer>,
    debouncer: Debouncer,
    min_chars: usize,
    updates: mpsc::UnboundedSender<AnalysisUpdate>,
}

impl AnalysisSession {
    pub fn new(analyzer: Arc<dyn RoutingAnalyzer>) -> (Self, mpsc::UnboundedReceiver<AnalysisUpdate>) {
        Self::with_timing(analyzer, ANALYSIS_DELAY, MIN_DESCRIPTION_CHARS)
    }

    pub fn with_timing(
        analyzer: Arc<dyn RoutingAnalyzer>,
        delay: Duration,
        min_chars: usize,
    ) -> (Self, mpsc::UnboundedReceiver<AnalysisUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                analyzer,
                debouncer: Debouncer::new(delay),
                min_chars,
                updates: tx,
            },
            rx,
        )
    }

    /// Call on every edit. Short descriptions cancel any pending analysis.
    pub fn on_input(&mut self, title: Option<&str>, description: &str) {
        if description.trim().chars().count() < self.min_chars {
            self.debouncer.cancel();
            return;
        }

        let request = AnalyzeTicketRequest {
            title: title.map(str::to_string),
            description: description.to_string(),
        };
        let analyzer = Arc::clone(&self.analyzer);
        let updates = self.updates.clone();
        self.debouncer.schedule(move |generation| async move {
            let result = analyzer.analyze(&request).await;
            if !generation.is_current() {
                debug!("discarding stale analysis {}", generation.value());
                return;
            }
            let _ = updates.send(AnalysisUpdate {
                generation: generation.value(),
                result,
            });
        });
    }

    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAnalyzer {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingAnalyzer {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl RoutingAnalyzer for RecordingAnalyzer {
        async fn analyze(&self, request: &AnalyzeTicketRequest) -> Result<RoutingSuggestion, ClientError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request.description.clone());
            }
            Ok(RoutingSuggestion {
                confidence: 0.9,
                reason: request.description.clone(),
                ..RoutingSuggestion::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_nine_chars_never_analyzed() {
        let analyzer = Arc::new(RecordingAnalyzer::default());
        let (mut session, _rx) = AnalysisSession::new(analyzer.clone());
        session.on_input(None, "123456789");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(analyzer.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_chars_analyzed_once_after_pause() {
        let analyzer = Arc::new(RecordingAnalyzer::default());
        let (mut session, mut rx) = AnalysisSession::new(analyzer.clone());
        session.on_input(Some("VPN"), "1234567890");

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(analyzer.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(analyzer.calls(), vec!["1234567890".to_string()]);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.result.unwrap().reason, "1234567890");
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_typing_fires_once_with_final_text() {
        let analyzer = Arc::new(RecordingAnalyzer::default());
        let (mut session, mut rx) = AnalysisSession::new(analyzer.clone());

        let mut text = String::from("printer is");
        for _ in 0..20 {
            text.push('!');
            session.on_input(None, &text);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(analyzer.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(analyzer.calls(), vec![text.clone()]);
        assert_eq!(rx.recv().await.unwrap().result.unwrap().reason, text);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shortening_cancels_pending() {
        let analyzer = Arc::new(RecordingAnalyzer::default());
        let (mut session, _rx) = AnalysisSession::new(analyzer.clone());
        session.on_input(None, "long enough text");
        assert!(session.is_pending());
        session.on_input(None, "short");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(analyzer.calls().is_empty());
    }
}
