//! Page review workflow: draft, in review, published.
//!
//! Allowed moves are draft→in_review, in_review→published,
//! in_review→draft (changes requested) and published→draft (reopen).
//! A page under review cannot be edited by anyone.

use async_trait::async_trait;
use log::warn;
use serde::Serialize;
use uuid::Uuid;

use super::types::{Page, PageComment, PageStatus};

pub const APPROVAL_COMMENT: &str = "LGTM";

impl PageStatus {
    pub fn can_transition(&self, to: PageStatus) -> bool {
        matches!(
            (self, to),
            (PageStatus::Draft, PageStatus::InReview)
                | (PageStatus::InReview, PageStatus::Published)
                | (PageStatus::InReview, PageStatus::Draft)
                | (PageStatus::Published, PageStatus::Draft)
        )
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, PageStatus::InReview)
    }

    /// Drafts autosave; reviewed and published pages are saved explicitly.
    pub fn autosaves(&self) -> bool {
        matches!(self, PageStatus::Draft)
    }
}

pub fn check_transition(from: PageStatus, to: PageStatus) -> Result<(), String> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(format!("cannot move a page from {from} to {to}"))
    }
}

/// Status and comment storage behind the workflow, either the REST client
/// or the database.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn set_status(
        &self,
        page_id: Uuid,
        status: PageStatus,
        reviewer_id: Option<Uuid>,
    ) -> Result<Page, Self::Error>;

    async fn add_comment(&self, page_id: Uuid, content: &str) -> Result<PageComment, Self::Error>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub page: Page,
    pub comment: Option<PageComment>,
    pub comment_error: Option<String>,
}

impl PublishOutcome {
    pub fn comment_posted(&self) -> bool {
        self.comment.is_some()
    }
}

pub async fn submit_for_review<S: ReviewStore + ?Sized>(
    store: &S,
    page_id: Uuid,
    reviewer_id: Option<Uuid>,
) -> Result<Page, S::Error> {
    store.set_status(page_id, PageStatus::InReview, reviewer_id).await
}

/// Publishes, then posts the approval comment. The publish is not rolled
/// back when the comment fails.
pub async fn approve_and_publish<S: ReviewStore + ?Sized>(
    store: &S,
    page_id: Uuid,
) -> Result<PublishOutcome, S::Error> {
    let page = store.set_status(page_id, PageStatus::Published, None).await?;
    match store.add_comment(page_id, APPROVAL_COMMENT).await {
        Ok(comment) => Ok(PublishOutcome {
            page,
            comment: Some(comment),
            comment_error: None,
        }),
        Err(e) => {
            warn!("page {page_id} published but approval comment failed: {e}");
            Ok(PublishOutcome {
                page,
                comment: None,
                comment_error: Some(e.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct FakeError(String);

    #[derive(Default)]
    struct FakeStore {
        status: Mutex<Option<PageStatus>>,
        comments: Mutex<Vec<String>>,
        fail_status: bool,
        fail_comment: bool,
    }

    fn page(id: Uuid, status: PageStatus) -> Page {
        Page {
            id,
            tenant_id: Uuid::nil(),
            book_id: None,
            parent_id: None,
            kind: "file".to_string(),
            title: "Onboarding".to_string(),
            content: String::new(),
            status: status.as_str().to_string(),
            reviewer_id: None,
            version: 2,
            created_by: None,
            embedding: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl ReviewStore for FakeStore {
        type Error = FakeError;

        async fn set_status(
            &self,
            page_id: Uuid,
            status: PageStatus,
            _reviewer_id: Option<Uuid>,
        ) -> Result<Page, FakeError> {
            if self.fail_status {
                return Err(FakeError("status rejected".to_string()));
            }
            if let Ok(mut s) = self.status.lock() {
                *s = Some(status);
            }
            Ok(page(page_id, status))
        }

        async fn add_comment(&self, page_id: Uuid, content: &str) -> Result<PageComment, FakeError> {
            if self.fail_comment {
                return Err(FakeError("comment rejected".to_string()));
            }
            if let Ok(mut c) = self.comments.lock() {
                c.push(content.to_string());
            }
            Ok(PageComment {
                id: Uuid::new_v4(),
                page_id,
                author_id: None,
                author_name: None,
                content: content.to_string(),
                created_at: Utc::now(),
            })
        }
    }

    #[test]
    fn test_transitions() {
        use PageStatus::*;
        assert!(Draft.can_transition(InReview));
        assert!(InReview.can_transition(Published));
        assert!(InReview.can_transition(Draft));
        assert!(Published.can_transition(Draft));
        assert!(!Draft.can_transition(Published));
        assert!(!Published.can_transition(InReview));
        assert!(!Draft.can_transition(Draft));
        assert!(check_transition(Draft, Published).is_err());
    }

    #[test]
    fn test_in_review_is_not_editable() {
        assert!(!PageStatus::InReview.is_editable());
        assert!(PageStatus::Draft.is_editable());
        assert!(PageStatus::Published.is_editable());
        assert!(!PageStatus::Published.autosaves());
    }

    #[tokio::test]
    async fn test_approve_posts_lgtm() {
        let store = FakeStore::default();
        let id = Uuid::new_v4();
        let outcome = approve_and_publish(&store, id).await.unwrap();
        assert!(outcome.comment_posted());
        assert_eq!(outcome.page.status(), PageStatus::Published);
        assert_eq!(*store.comments.lock().unwrap(), vec![APPROVAL_COMMENT.to_string()]);
    }

    #[tokio::test]
    async fn test_comment_failure_keeps_publish() {
        let store = FakeStore {
            fail_comment: true,
            ..FakeStore::default()
        };
        let outcome = approve_and_publish(&store, Uuid::new_v4()).await.unwrap();
        assert!(!outcome.comment_posted());
        assert_eq!(outcome.comment_error.as_deref(), Some("comment rejected"));
        assert_eq!(*store.status.lock().unwrap(), Some(PageStatus::Published));
    }

    #[tokio::test]
    async fn test_publish_failure_skips_comment() {
        let store = FakeStore {
            fail_status: true,
            ..FakeStore::default()
        };
        assert!(approve_and_publish(&store, Uuid::new_v4()).await.is_err());
        assert!(store.comments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_for_review() {
        let store = FakeStore::default();
        let page = submit_for_review(&store, Uuid::new_v4(), Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(page.status(), PageStatus::InReview);
        assert!(!page.status().is_editable());
    }
}
