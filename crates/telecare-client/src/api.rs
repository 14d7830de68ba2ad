//! REST client for the chat-room backend.
//!
//! Every success payload arrives wrapped in a `{message, data}` envelope;
//! failures carry `{message}` with the backend's human-readable reason.
//! A 401 anywhere maps to [`ApiError::Unauthenticated`], which hosts
//! handle uniformly by redirecting to login.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use telecare_net::{NetError, TokenBroker};
use telecare_shared::model::{RoomDetail, RoomPreview, SessionToken};

use crate::config::CoreConfig;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RoomListBody {
    #[serde(default)]
    pending: Vec<RoomPreview>,
    #[serde(default)]
    on_going: Vec<RoomPreview>,
    #[serde(default)]
    expired: Vec<RoomPreview>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client with a default HTTP stack. Hosts that manage the
    /// session cookie themselves pass a preconfigured client via
    /// [`ApiClient::with_client`].
    pub fn new(config: &CoreConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, &config.http_base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Full room listing for the current user or doctor, flattened into a
    /// single set. Bucketing is recomputed locally so the directory, the
    /// expiry clock and the previews can never drift apart.
    pub async fn room_list(&self) -> Result<Vec<RoomPreview>, ApiError> {
        let response = self.http.get(self.endpoint("/v2/chat-room")).send().await?;
        let body: Envelope<RoomListBody> = read_json(response).await?;

        let mut rooms = body.data.pending;
        rooms.extend(body.data.on_going);
        rooms.extend(body.data.expired);
        Ok(rooms)
    }

    pub async fn room_detail(&self, room_id: i64) -> Result<RoomDetail, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&format!("/v2/chat-room/{room_id}")))
            .send()
            .await?;
        let body: Envelope<RoomDetail> = read_json(response).await?;
        Ok(body.data)
    }

    /// Exchange a room hash for a fresh token pair. Called once per
    /// connection attempt; reconnects never reuse a pair.
    pub async fn issue_token(&self, room_hash: &str) -> Result<SessionToken, ApiError> {
        debug!(room = %room_hash, "Requesting channel token pair");
        let response = self
            .http
            .post(self.endpoint("/v2/chat-room/token"))
            .json(&json!({ "room_hash": room_hash }))
            .send()
            .await?;
        let body: Envelope<SessionToken> = read_json(response).await?;
        Ok(body.data)
    }

    /// End the consultation (either side).
    pub async fn close_room(&self, room_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .patch(self.endpoint(&format!("/v2/chat-room/{room_id}/close")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Doctor accepts a pending consultation request, which starts the
    /// session clock server-side.
    pub async fn join_room(&self, room_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .patch(self.endpoint(&format!("/v2/chat-room/{room_id}/join")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Room lookup and lifecycle operations the session needs from the
/// backend. A trait so sessions can be exercised against fakes.
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn room_detail(&self, room_id: i64) -> Result<RoomDetail, ApiError>;
    async fn close_room(&self, room_id: i64) -> Result<(), ApiError>;
}

#[async_trait]
impl RoomService for ApiClient {
    async fn room_detail(&self, room_id: i64) -> Result<RoomDetail, ApiError> {
        ApiClient::room_detail(self, room_id).await
    }

    async fn close_room(&self, room_id: i64) -> Result<(), ApiError> {
        ApiClient::close_room(self, room_id).await
    }
}

#[async_trait]
impl TokenBroker for ApiClient {
    async fn issue_token(&self, room_hash: &str) -> Result<SessionToken, NetError> {
        ApiClient::issue_token(self, room_hash)
            .await
            .map_err(|e| NetError::Token(e.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthenticated);
    }
    if !status.is_success() {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();
        return Err(ApiError::Status {
            code: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}
