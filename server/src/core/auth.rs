use crate::core::{AppError, AppState};
use crate::entities::{Channel, DirectMessageThread, MemberRole, Server, User};
use crate::repositories::Read;
use axum::extract::{Query, State};
use axum::{body::Body, extract::Request, http, http::Response, middleware::Next};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// struct che codifica il contenuto del token jwt
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub id: i32,
    pub username: String,
}

/// Token passato come query string (`/ws?token=...`): i browser non possono
/// impostare header custom durante l'handshake WebSocket.
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[instrument(skip(secret), fields(username = %username, id = %id))]
pub fn encode_jwt(username: String, id: i32, secret: &str) -> Result<String, AppError> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let expire: chrono::TimeDelta = Duration::hours(24);
    let exp: usize = (now + expire).timestamp() as usize;
    let iat: usize = now.timestamp() as usize;
    let claim = Claims {
        iat,
        exp,
        username,
        id,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        AppError::internal_server_error("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, AppError> {
    debug!("Decoding JWT token");
    // Validation::default controlla firma (HS256) e scadenza
    decode::<Claims>(
        jwt_token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| {
        debug!("JWT token decoded successfully for user: {}", data.claims.username);
        data
    })
    .map_err(|e| {
        warn!("Failed to decode JWT token: {:?}", e);
        AppError::unauthorized("invalid credential")
    })
}

/// Estrae il bearer token dall'header Authorization oppure dal parametro `token`.
fn extract_token(req: &Request) -> Option<String> {
    if let Some(header) = req.headers().get(http::header::AUTHORIZATION) {
        let value = header.to_str().ok()?;
        let mut parts = value.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
                Some(token.to_string())
            }
            _ => None,
        };
    }

    Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Identity Assertion Verifier: dato il token presentato all'handshake restituisce
/// l'utente (senza password) oppure un errore 401.
///
/// * token assente -> `no credential`
/// * firma non valida o token scaduto -> `invalid credential`
/// * utente non più presente nel database -> `unknown identity`
#[instrument(skip(state, token))]
pub async fn verify_credential(state: &AppState, token: Option<&str>) -> Result<User, AppError> {
    let token = token.ok_or_else(|| {
        warn!("Missing credential");
        AppError::unauthorized("no credential")
    })?;

    let token_data = decode_jwt(token, &state.jwt_secret)?;

    match state.user.read(&token_data.claims.id).await? {
        Some(user) => {
            info!(user_id = user.user_id, "User authenticated: {}", user.username);
            Ok(user)
        }
        None => {
            warn!("User not found in database: {}", token_data.claims.id);
            Err(AppError::unauthorized("unknown identity"))
        }
    }
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let token = extract_token(&req);
    let current_user = verify_credential(&state, token.as_deref()).await?;
    req.extensions_mut().insert(current_user);
    // a valle lo user si recupera con Extension<User>
    Ok(next.run(req).await)
}

/// Il proprietario è sempre membro, anche senza una riga in server_members.
/// Restituisce il ruolo effettivo: `None` per il proprietario (privilegiato per definizione).
#[instrument(skip(state))]
pub async fn authorize_server_member(
    state: &AppState,
    user_id: i32,
    server_id: i32,
) -> Result<(Server, Option<MemberRole>), AppError> {
    let server = state
        .server
        .read(&server_id)
        .await?
        .ok_or_else(|| AppError::not_found("Server not found"))?;

    if server.is_owner(user_id) {
        return Ok((server, None));
    }

    let member = state
        .server
        .find_member(&server_id, &user_id)
        .await?
        .ok_or_else(|| {
            warn!("User {} is not a member of server {}", user_id, server_id);
            AppError::forbidden("You are not a member of this server")
        })?;

    Ok((server, Some(member.role)))
}

/// Accesso a un canale: membro del server proprietario e, per i canali privati,
/// proprietario, admin oppure presente nella lista degli utenti ammessi.
#[instrument(skip(state))]
pub async fn authorize_channel(
    state: &AppState,
    user_id: i32,
    channel_id: i32,
) -> Result<Channel, AppError> {
    let channel = state
        .channel
        .read(&channel_id)
        .await?
        .ok_or_else(|| AppError::not_found("Channel not found"))?;

    let (_, role) = authorize_server_member(state, user_id, channel.server_id).await?;

    if channel.is_private {
        let privileged = matches!(role, None | Some(MemberRole::Admin));
        if !privileged && !state.channel.is_user_allowed(&channel_id, &user_id).await? {
            warn!("User {} is not allowed in private channel {}", user_id, channel_id);
            return Err(AppError::forbidden("You do not have access to this channel"));
        }
    }

    Ok(channel)
}

#[instrument(skip(state))]
pub async fn authorize_thread(
    state: &AppState,
    user_id: i32,
    thread_id: i32,
) -> Result<DirectMessageThread, AppError> {
    let thread = state
        .dm
        .read(&thread_id)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;

    if !thread.has_participant(user_id) {
        warn!("User {} is not a participant of thread {}", user_id, thread_id);
        return Err(AppError::forbidden("You are not a participant of this conversation"));
    }

    Ok(thread)
}
