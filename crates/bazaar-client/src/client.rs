use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use bazaar_types::api::{
    ConversationSummary, CreateConversationRequest, CreateConversationResponse, ErrorResponse,
    ListingResponse, LoginRequest, LoginResponse, MarkReadResponse, MessageResponse,
    PostMessageRequest, RegisterRequest, RegisterResponse, SendMessageRequest, SendMessageResponse,
};
use bazaar_types::notifications::Notification;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: StatusCode, message: String },
}

/// Authenticated handle on one bazaar server. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Create an account and return a client authenticated as it.
    pub async fn register(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<(Self, RegisterResponse), ClientError> {
        let mut client = Self::new(base_url, "");
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: RegisterResponse = client.fetch_with(Method::POST, "/auth/register", &body).await?;
        client.token = response.token.clone();
        Ok((client, response))
    }

    pub async fn login(
        base_url: impl Into<String>,
        username: &str,
        password: &str,
    ) -> Result<(Self, LoginResponse), ClientError> {
        let mut client = Self::new(base_url, "");
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = client.fetch_with(Method::POST, "/auth/login", &body).await?;
        client.token = response.token.clone();
        Ok((client, response))
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.fetch(self.request(Method::GET, "/conversations")).await
    }

    pub async fn open_conversation(
        &self,
        other_user_id: i64,
    ) -> Result<CreateConversationResponse, ClientError> {
        let body = CreateConversationRequest {
            other_user_id: Some(other_user_id),
        };
        self.fetch_with(Method::POST, "/conversations", &body).await
    }

    pub async fn messages(&self, conversation_id: i64) -> Result<Vec<MessageResponse>, ClientError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        self.fetch(self.request(Method::GET, &path)).await
    }

    pub async fn send_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let body = SendMessageRequest {
            conversation_id,
            content: content.to_string(),
        };
        self.fetch_with(Method::POST, "/messages", &body).await
    }

    /// Same as [`send_message`](Self::send_message) through the nested route.
    pub async fn post_to_conversation(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<SendMessageResponse, ClientError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let body = PostMessageRequest {
            content: content.to_string(),
        };
        self.fetch_with(Method::POST, &path, &body).await
    }

    /// Fetch an ad. The owner is notified unless it is their own.
    pub async fn view_ad(&self, listing_id: i64) -> Result<ListingResponse, ClientError> {
        let path = format!("/listings/{}", listing_id);
        self.fetch(self.request(Method::GET, &path)).await
    }

    pub async fn view_service(&self, service_id: i64) -> Result<ListingResponse, ClientError> {
        let path = format!("/services/{}", service_id);
        self.fetch(self.request(Method::GET, &path)).await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.fetch(self.request(Method::GET, "/notifications")).await
    }

    pub async fn mark_read(&self, notification_id: i64) -> Result<MarkReadResponse, ClientError> {
        let path = format!("/notifications/{}/read", notification_id);
        self.fetch(self.request(Method::PUT, &path)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    async fn fetch_with<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.fetch(self.request(method, path).json(body)).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    debug!("{} error body: {}", status, text);
    Err(ClientError::Status {
        status,
        message: error_message(status, &text),
    })
}

/// The server's `{"error": ...}` message when there is one, else the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string())
}
