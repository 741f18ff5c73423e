//! Real-time gateway: handshake authentication, the per-connection event
//! loop, and inbound event dispatch.
//!
//! Authentication happens once, before the upgrade: a missing, expired, or
//! invalid token -- or an inactive/unverified contractor -- rejects the
//! handshake with a structured error body. Only afterwards is the connection
//! registered with the room registry.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;
use dispatch_core::contractor::Contractor;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::auth::jwt::{extract_bearer, verify_access_token, TokenError};
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::protocol::{ClientEvent, ServerEvent, WsErrorCode};

/// Handshake query parameters: `GET /ws?token=<access token>`.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// HTTP handler that authenticates the handshake and upgrades to WebSocket.
///
/// The token is taken from the `token` query parameter or, failing that, an
/// `Authorization: Bearer` header.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let token = query.token.or_else(|| {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .map(str::to_string)
    });
    let token = token.ok_or(AppError::AuthenticationRequired)?;

    let claims = verify_access_token(&token, &state.config.jwt).map_err(|e| match e {
        TokenError::Expired => AppError::TokenExpired,
        TokenError::Invalid => AppError::TokenInvalid,
    })?;

    let contractor: Contractor =
        dispatch_db::repositories::ContractorRepo::get_by_id(&state.pool, claims.sub)
            .await?
            .map(Into::into)
            .ok_or(AppError::ContractorNotFound(claims.sub))?;

    if !contractor.is_active {
        return Err(AppError::ContractorInactive);
    }
    if !contractor.is_verified {
        return Err(AppError::ContractorNotVerified);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, contractor)))
}

/// Manage a single authenticated WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), registers
/// with the registry, spawns a sender task forwarding the registry channel to
/// the sink, and processes inbound events on the current task. Disconnect
/// removes the connection from every room immediately.
async fn handle_socket(socket: WebSocket, state: AppState, contractor: Contractor) {
    let socket_id = uuid::Uuid::new_v4().to_string();
    let contractor_id = contractor.id;
    tracing::info!(socket_id = %socket_id, contractor_id, "WebSocket connected");

    let mut rx = state
        .registry
        .register(socket_id.clone(), contractor_id, contractor.skills)
        .await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward registry channel messages to the WebSocket sink.
    let sender_socket_id = socket_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(socket_id = %sender_socket_id, "WebSocket sink closed");
                break;
            }
        }
    });

    state
        .registry
        .send_to(
            &socket_id,
            ServerEvent::ConnectionEstablished {
                contractor_id,
                socket_id: socket_id.clone(),
                timestamp: Utc::now(),
            }
            .to_message(),
        )
        .await;

    // Receiver loop: process inbound events one at a time.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                state.registry.touch(&socket_id).await;
                let reply = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => handle_event(&state, &socket_id, contractor_id, event).await,
                    Err(e) => {
                        tracing::debug!(socket_id = %socket_id, error = %e, "Unparseable event");
                        Some(ServerEvent::ConnectionError {
                            message: "Unrecognized event".to_string(),
                            error: e.to_string(),
                        })
                    }
                };
                if let Some(reply) = reply {
                    state.registry.send_to(&socket_id, reply.to_message()).await;
                }
            }
            Ok(Message::Pong(_)) => {
                state.registry.touch(&socket_id).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary and ping frames carry no protocol meaning here.
            }
            Err(e) => {
                tracing::debug!(socket_id = %socket_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: leave every room and stop the sender.
    state.registry.unregister(&socket_id).await;
    send_task.abort();
    tracing::info!(socket_id = %socket_id, contractor_id, "WebSocket disconnected");
}

/// Dispatch one inbound event, returning the reply to send (if any).
///
/// Every event is independently rate-limited per contractor + event type;
/// exceeding the limit yields a RATE_LIMIT_EXCEEDED error reply, never a
/// silent drop.
async fn handle_event(
    state: &AppState,
    socket_id: &str,
    contractor_id: i64,
    event: ClientEvent,
) -> Option<ServerEvent> {
    if let Err(exceeded) = state.rate_limiter.check(contractor_id, event.name()) {
        tracing::warn!(
            contractor_id,
            event = event.name(),
            retry_after_secs = exceeded.retry_after_secs,
            "Rate limit exceeded"
        );
        return Some(ServerEvent::Error {
            message: format!(
                "Rate limit exceeded for {}, retry in {}s",
                event.name(),
                exceeded.retry_after_secs
            ),
            code: WsErrorCode::RateLimitExceeded,
        });
    }

    match event {
        ClientEvent::Join => Some(ServerEvent::ConnectionEstablished {
            contractor_id,
            socket_id: socket_id.to_string(),
            timestamp: Utc::now(),
        }),

        ClientEvent::LocationUpdate(payload) => {
            match state
                .registry
                .update_location(socket_id, payload.lat, payload.lng, payload.radius)
                .await
            {
                Ok(area) => Some(ServerEvent::LocationUpdated {
                    lat: area.point.lat,
                    lng: area.point.lng,
                    radius_miles: dispatch_core::geo::meters_to_miles(area.radius_m),
                    timestamp: Utc::now(),
                }),
                Err(e) => {
                    tracing::debug!(socket_id, error = %e, "Location update rejected");
                    Some(ServerEvent::Error {
                        message: e.to_string(),
                        code: WsErrorCode::InvalidLocation,
                    })
                }
            }
        }

        ClientEvent::TaskSubscribe(payload) => {
            if let Some(location) = payload.location {
                if let Err(e) = state
                    .registry
                    .update_location(socket_id, location.lat, location.lng, location.radius)
                    .await
                {
                    return Some(ServerEvent::Error {
                        message: e.to_string(),
                        code: WsErrorCode::SubscriptionFailed,
                    });
                }
            }
            match state
                .registry
                .update_subscription(socket_id, payload.skills)
                .await
            {
                Ok(skills) => Some(ServerEvent::SubscriptionConfirmed {
                    skills,
                    timestamp: Utc::now(),
                }),
                Err(e) => Some(ServerEvent::Error {
                    message: e.to_string(),
                    code: WsErrorCode::SubscriptionFailed,
                }),
            }
        }

        ClientEvent::Ping => Some(ServerEvent::Pong {
            timestamp: Utc::now(),
        }),

        ClientEvent::NotificationAck(payload) => {
            // At-most-once delivery: the ack is recorded for diagnostics,
            // nothing is retried either way.
            tracing::debug!(
                contractor_id,
                notification_id = %payload.notification_id,
                "Notification acknowledged"
            );
            None
        }

        ClientEvent::RoomInfo => Some(ServerEvent::RoomInfoResponse {
            rooms: state.registry.rooms_of(socket_id).await,
            stats: state.registry.stats().await,
        }),
    }
}

/// Spawn the heartbeat task: periodic pings plus stale-connection purging
/// and rate-limiter pruning.
pub fn start_heartbeat(
    state: AppState,
) -> tokio::task::JoinHandle<()> {
    let interval_secs = state.config.ws_heartbeat_interval_secs;
    let max_idle = chrono::Duration::seconds(
        (interval_secs * state.config.ws_idle_intervals as u64) as i64,
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let purged = state.registry.purge_stale(max_idle).await;
            if !purged.is_empty() {
                tracing::info!(count = purged.len(), "Purged unresponsive connections");
            }
            let count = state.registry.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            state.registry.ping_all().await;
            state.rate_limiter.prune();
        }
    })
}
