//! JSON API for accounts and rooms.
//!
//! Registration and login hand out the same bearer tokens the relay endpoint
//! admits. Every room route requires `Authorization: Bearer <token>`.

use crate::directory::{Room, User};
use crate::error::{AuthError, StorageError};
use crate::server::ChatRelay;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::{header::AUTHORIZATION, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chat_types::RoomId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API error, rendered as `{"error": "..."}` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing, malformed or rejected bearer token.
    #[error("not authenticated")]
    Unauthorized,

    /// Login with an unknown email or wrong password.
    #[error("invalid email or password")]
    BadCredentials,

    /// Request body failed validation.
    #[error("{0}")]
    Invalid(String),

    /// Resource conflict.
    #[error("{0}")]
    Conflict(String),

    /// Resource absent (or not visible to the caller).
    #[error("not found")]
    NotFound,

    /// Anything else; details are logged, not returned.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::BadCredentials => StatusCode::UNAUTHORIZED,
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!("API error: {}", detail);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EmailTaken { email } => {
                Self::Conflict(format!("email already registered: {}", email))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

/// The caller, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let relay = parts
            .extensions
            .get::<Arc<ChatRelay>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("relay state missing".to_string()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::Unauthorized)?;

        let identity = relay.verifier().verify(token).await.map_err(|e| {
            tracing::debug!("Bearer token rejected: {}", e);
            match e {
                AuthError::Directory(inner) => ApiError::Internal(inner.to_string()),
                _ => ApiError::Unauthorized,
            }
        })?;

        relay
            .users()
            .find_by_email(identity.as_str())
            .await?
            .map(AuthUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Extract the token from an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// Body of register and login.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Token handed out by register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for the API and the relay endpoint.
    pub token: String,
}

/// Body of room creation.
#[derive(Debug, Deserialize)]
pub struct NewRoom {
    /// Room name.
    pub name: String,
}

/// Query of room search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Substring to look for in room names.
    #[serde(default)]
    pub query: String,
}

/// A room together with its live member count.
#[derive(Debug, Serialize)]
pub struct RoomView {
    /// Directory record.
    #[serde(flatten)]
    pub room: Room,
    /// Sessions currently connected to the room.
    pub online: usize,
}

/// `POST /api/register`
pub async fn register(
    Extension(relay): Extension<Arc<ChatRelay>>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Invalid(
            "email and password are required".to_string(),
        ));
    }

    let user = relay.users().create_user(email, &body.password).await?;
    tracing::info!("Registered user {}", user.email);

    let token = issue(&relay, &user.email)?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// `POST /api/login`
pub async fn login(
    Extension(relay): Extension<Arc<ChatRelay>>,
    Json(body): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = relay
        .users()
        .check_password(body.email.trim(), &body.password)
        .await?
        .ok_or(ApiError::BadCredentials)?;

    Ok(Json(issue(&relay, &user.email)?))
}

/// `GET /api/rooms`
pub async fn list_rooms(
    Extension(relay): Extension<Arc<ChatRelay>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(relay.rooms().rooms_owned_by(user.id).await?))
}

/// `GET /api/rooms/search?query=`
pub async fn search_rooms(
    Extension(relay): Extension<Arc<ChatRelay>>,
    _user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(relay.rooms().search_rooms(&params.query).await?))
}

/// `POST /api/rooms`
pub async fn create_room(
    Extension(relay): Extension<Arc<ChatRelay>>,
    AuthUser(user): AuthUser,
    Json(body): Json<NewRoom>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::Invalid("room name is required".to_string()));
    }

    let room = relay.rooms().create_room(name, user.id).await?;
    tracing::info!("Room {} created by {}", room.id, user.email);
    Ok((StatusCode::CREATED, Json(room)))
}

/// `GET /api/rooms/{id}`
pub async fn get_room(
    Extension(relay): Extension<Arc<ChatRelay>>,
    _user: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<Json<RoomView>, ApiError> {
    let room_id = RoomId::new(room_id);
    let room = relay
        .rooms()
        .get_room(room_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(RoomView {
        room,
        online: relay.registry().member_count(room_id),
    }))
}

/// `HEAD /api/rooms/{id}`: 200 if the room exists, 404 otherwise.
pub async fn room_exists(
    Extension(relay): Extension<Arc<ChatRelay>>,
    _user: AuthUser,
    Path(room_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if relay.rooms().room_exists(RoomId::new(room_id)).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound)
    }
}

/// `DELETE /api/rooms/{id}`
pub async fn delete_room(
    Extension(relay): Extension<Arc<ChatRelay>>,
    AuthUser(user): AuthUser,
    Path(room_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let room_id = RoomId::new(room_id);
    if relay.rooms().delete_room(room_id, user.id).await? {
        tracing::info!("Room {} deleted by {}", room_id, user.email);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

fn issue(relay: &ChatRelay, email: &str) -> Result<TokenResponse, ApiError> {
    relay
        .issuer()
        .issue(email)
        .map(|token| TokenResponse { token })
        .map_err(|e| ApiError::Internal(e.to_string()))
}
