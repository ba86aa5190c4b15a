//! Typed REST client for the intranet API.
//!
//! The interaction state machines (ticket wizard, analysis session, move
//! navigator, autosave, review workflow) talk to the server through the
//! traits they declare; [`ApiClient`] implements all of them over HTTP.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::docs::autosave::DraftSink;
use crate::docs::delete_guard::{DeleteIntent, DeleteKind};
use crate::docs::tree::PageMover;
use crate::docs::types::{
    CreatePageCommentRequest, Page, PageComment, PageStatus, StatusChangeRequest, UpdatePageRequest,
};
use crate::docs::workflow::ReviewStore;
use crate::helpdesk::forms::FormField;
use crate::helpdesk::types::{FormCategory, Helpdesk};
use crate::search::SearchHit;
use crate::tickets::types::{CreateTicketRequest, Ticket};
use crate::tickets::wizard::{HelpdeskChoice, TicketSubmitter};
use crate::triage::debounce::RoutingAnalyzer;
use crate::triage::suggestion::{AnalyzeTicketRequest, RoutingSuggestion};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Stale `version` on an optimistic update.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
    tenant_header: String,
    user_header: String,
}

impl ApiClient {
    pub fn new(base_url: &str, tenant_id: Uuid) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, tenant_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, tenant_id: Uuid, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant_id,
            user_id: None,
            tenant_header: "X-Tenant-ID".to_string(),
            user_header: "X-User-ID".to_string(),
        })
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// For deployments that renamed the identity headers.
    pub fn with_header_names(mut self, tenant_header: &str, user_header: &str) -> Self {
        self.tenant_header = tenant_header.to_string();
        self.user_header = user_header.to_string();
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(self.tenant_header.as_str(), self.tenant_id.to_string());
        if let Some(user_id) = self.user_id {
            builder = builder.header(self.user_header.as_str(), user_id.to_string());
        }
        builder
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(self.request(Method::PATCH, path).json(body)).await
    }

    /// DELETE endpoints answer 204 without a body.
    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<(), ClientError> {
        let builder = self.request(Method::DELETE, path).query(query);
        Self::check(builder.send().await?).await?;
        Ok(())
    }

    pub async fn list_helpdesks(&self) -> Result<Vec<Helpdesk>, ClientError> {
        self.get("/api/helpdesks").await
    }

    /// Categories and fields of one helpdesk, as the ticket wizard consumes them.
    pub async fn helpdesk_choice(&self, helpdesk_id: Uuid) -> Result<HelpdeskChoice, ClientError> {
        let categories: Vec<FormCategory> = self
            .get(&format!("/api/helpdesks/{helpdesk_id}/form-categories"))
            .await?;
        let fields: Vec<FormField> = self
            .get(&format!("/api/helpdesks/{helpdesk_id}/form-fields"))
            .await?;
        Ok(HelpdeskChoice {
            helpdesk_id,
            categories,
            fields,
        })
    }

    pub async fn get_page(&self, page_id: Uuid) -> Result<Page, ClientError> {
        self.get(&format!("/api/pages/{page_id}")).await
    }

    pub async fn list_book_pages(&self, book_id: Uuid) -> Result<Vec<Page>, ClientError> {
        self.get(&format!("/api/books/{book_id}/pages")).await
    }

    pub async fn update_page(&self, page_id: Uuid, request: &UpdatePageRequest) -> Result<Page, ClientError> {
        self.patch(&format!("/api/pages/{page_id}"), request).await
    }

    pub async fn request_delete(&self, kind: DeleteKind, id: Uuid) -> Result<DeleteIntent, ClientError> {
        let path = match kind {
            DeleteKind::Page => format!("/api/pages/{id}/delete-intent"),
            DeleteKind::Book => format!("/api/books/{id}/delete-intent"),
        };
        self.post(&path, &serde_json::json!({})).await
    }

    /// Completes a delete once the intent's countdown has elapsed.
    pub async fn confirm_delete(&self, intent: &DeleteIntent) -> Result<(), ClientError> {
        let path = match intent.kind {
            DeleteKind::Page => format!("/api/pages/{}", intent.id),
            DeleteKind::Book => format!("/api/books/{}", intent.id),
        };
        self.delete(&path, &[("token", intent.token.as_str())]).await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<SearchHit>, ClientError> {
        self.send(self.request(Method::GET, "/api/search").query(&[("q", term)]))
            .await
    }
}

#[async_trait]
impl TicketSubmitter for ApiClient {
    async fn create_ticket(&self, request: &CreateTicketRequest) -> Result<Ticket, ClientError> {
        self.post("/api/tickets", request).await
    }
}

#[async_trait]
impl RoutingAnalyzer for ApiClient {
    async fn analyze(&self, request: &AnalyzeTicketRequest) -> Result<RoutingSuggestion, ClientError> {
        self.post("/api/ai/analyze-ticket", request).await
    }
}

#[async_trait]
impl ReviewStore for ApiClient {
    type Error = ClientError;

    async fn set_status(
        &self,
        page_id: Uuid,
        status: PageStatus,
        reviewer_id: Option<Uuid>,
    ) -> Result<Page, ClientError> {
        let body = StatusChangeRequest { status, reviewer_id };
        self.post(&format!("/api/pages/{page_id}/status"), &body).await
    }

    async fn add_comment(&self, page_id: Uuid, content: &str) -> Result<PageComment, ClientError> {
        let body = CreatePageCommentRequest {
            content: content.to_string(),
            author_name: None,
        };
        self.post(&format!("/api/pages/{page_id}/comments"), &body).await
    }
}

#[async_trait]
impl PageMover for ApiClient {
    async fn move_page(&self, page_id: Uuid, version: i32, new_parent: Option<Uuid>) -> Result<Page, ClientError> {
        let body = UpdatePageRequest {
            version,
            parent_id: Some(new_parent),
            ..UpdatePageRequest::default()
        };
        self.update_page(page_id, &body).await
    }
}

#[async_trait]
impl DraftSink for ApiClient {
    async fn save_draft(&self, page_id: Uuid, version: i32, content: &str) -> Result<Page, ClientError> {
        let body = UpdatePageRequest {
            version,
            content: Some(content.to_string()),
            ..UpdatePageRequest::default()
        };
        self.update_page(page_id, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::workflow::approve_and_publish;
    use mockito::Matcher;

    const TENANT: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn tenant() -> Uuid {
        TENANT.parse().unwrap()
    }

    fn page_json(id: Uuid, status: &str, version: i32, parent: Option<Uuid>) -> String {
        serde_json::json!({
            "id": id,
            "bookId": Uuid::nil(),
            "parentId": parent,
            "kind": "file",
            "title": "Runbook",
            "content": "steps",
            "status": status,
            "reviewerId": null,
            "version": version,
            "createdBy": null,
            "createdAt": "2026-01-05T10:00:00Z",
            "updatedAt": "2026-01-05T10:00:00Z"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_tenant_and_user_headers_sent() {
        let mut server = mockito::Server::new_async().await;
        let user = Uuid::new_v4();
        let page_id = Uuid::new_v4();
        let mock = server
            .mock("GET", format!("/api/pages/{page_id}").as_str())
            .match_header("x-tenant-id", TENANT)
            .match_header("x-user-id", user.to_string().as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(page_json(page_id, "draft", 1, None))
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap().with_user(user);
        let page = client.get_page(page_id).await.unwrap();
        assert_eq!(page.id, page_id);
        assert_eq!(page.status(), PageStatus::Draft);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let mut server = mockito::Server::new_async().await;
        let page_id = Uuid::new_v4();
        let _mock = server
            .mock("PATCH", format!("/api/pages/{page_id}").as_str())
            .with_status(409)
            .with_body(r#"{"error":"page was modified by someone else"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap();
        let err = client.save_draft(page_id, 3, "new text").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            err,
            ClientError::Api {
                status: 409,
                message: "page was modified by someone else".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_move_to_root_sends_explicit_null() {
        let mut server = mockito::Server::new_async().await;
        let page_id = Uuid::new_v4();
        let mock = server
            .mock("PATCH", format!("/api/pages/{page_id}").as_str())
            .match_body(Matcher::Json(serde_json::json!({ "version": 4, "parentId": null })))
            .with_status(200)
            .with_body(page_json(page_id, "draft", 5, None))
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap();
        let page = client.move_page(page_id, 4, None).await.unwrap();
        assert_eq!(page.version, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_helpdesk_choice_loads_categories_and_fields() {
        let mut server = mockito::Server::new_async().await;
        let helpdesk_id = Uuid::new_v4();
        let _categories = server
            .mock("GET", format!("/api/helpdesks/{helpdesk_id}/form-categories").as_str())
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _fields = server
            .mock("GET", format!("/api/helpdesks/{helpdesk_id}/form-fields").as_str())
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap();
        let choice = client.helpdesk_choice(helpdesk_id).await.unwrap();
        assert_eq!(choice.helpdesk_id, helpdesk_id);
        assert!(choice.categories.is_empty());
        assert!(choice.fields.is_empty());
    }

    #[tokio::test]
    async fn test_publish_survives_comment_failure() {
        let mut server = mockito::Server::new_async().await;
        let page_id = Uuid::new_v4();
        let _status = server
            .mock("POST", format!("/api/pages/{page_id}/status").as_str())
            .match_body(Matcher::PartialJson(serde_json::json!({ "status": "published" })))
            .with_status(200)
            .with_body(page_json(page_id, "published", 2, None))
            .create_async()
            .await;
        let _comment = server
            .mock("POST", format!("/api/pages/{page_id}/comments").as_str())
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap();
        let outcome = approve_and_publish(&client, page_id).await.unwrap();
        assert_eq!(outcome.page.status(), PageStatus::Published);
        assert!(!outcome.comment_posted());
        assert!(outcome.comment_error.is_some());
    }

    #[tokio::test]
    async fn test_confirm_delete_passes_token() {
        let mut server = mockito::Server::new_async().await;
        let book_id = Uuid::new_v4();
        let mock = server
            .mock("DELETE", format!("/api/books/{book_id}").as_str())
            .match_query(Matcher::UrlEncoded("token".into(), "abc".into()))
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url(), tenant()).unwrap();
        let intent = DeleteIntent {
            token: "abc".to_string(),
            kind: DeleteKind::Book,
            id: book_id,
            countdown_seconds: 5,
            expires_in_seconds: 300,
        };
        client.confirm_delete(&intent).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = ApiClient::with_timeout("http://127.0.0.1:9", tenant(), Duration::from_millis(200)).unwrap();
        assert!(matches!(client.list_helpdesks().await, Err(ClientError::Transport(_))));
    }
}
