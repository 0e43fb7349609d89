//! 실시간 웹소켓 채널.
//!
//! 핸드셰이크는 인증 우선입니다. 첫 프레임이 `{"type":"auth","token"}`이
//! 아니거나 토큰이 무효하면 auth_error를 보내고 닫습니다. 성공하면
//! 허브에 등록되어 사이클 메시지를 받습니다.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, info, warn};

use pulse_market::{ClientMessage, ServerMessage};

use crate::state::AppState;

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    // 인증 우선: 첫 텍스트 프레임이 auth여야 함
    let user_id = match authenticate(&state, &mut stream).await {
        Ok(user_id) => user_id,
        Err(reason) => {
            let _ = send_json(
                &mut sink,
                &ServerMessage::AuthError {
                    message: reason.clone(),
                },
            )
            .await;
            let _ = sink.close().await;
            debug!("WebSocket rejected: {}", reason);
            return;
        }
    };

    if send_json(
        &mut sink,
        &ServerMessage::AuthSuccess {
            user_id: user_id.clone(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let (sub_id, mut rx) = state.hub.register(&user_id).await;
    info!("WebSocket session started for user {}", user_id);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if send_json(&mut sink, &message).await.is_err() {
                            state.hub.unregister(&user_id, sub_id).await;
                            break;
                        }
                    }
                    // 핸들이 교체됨: 이 연결만 조용히 종료
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        state.hub.unregister(&user_id, sub_id).await;
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(other)) => {
                        debug!("Ignoring unexpected frame from {}: {:?}", user_id, other);
                    }
                }
            }
        }
    }

    info!("WebSocket session ended for user {}", user_id);
}

/// 인증 핸드셰이크. 제한 시간 안에 유효한 auth 프레임이 와야 합니다.
async fn authenticate(
    state: &AppState,
    stream: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> Result<String, String> {
    let frame = tokio::time::timeout(AUTH_TIMEOUT, stream.next())
        .await
        .map_err(|_| "authentication timed out".to_string())?
        .ok_or_else(|| "connection closed before authentication".to_string())?
        .map_err(|e| format!("transport error: {}", e))?;

    let text = match frame {
        Message::Text(text) => text,
        _ => return Err("first frame must be an auth message".to_string()),
    };

    let message: ClientMessage = serde_json::from_str(text.as_str())
        .map_err(|e| format!("malformed auth frame: {}", e))?;
    let ClientMessage::Auth { token } = message;

    state.verifier.verify(&token).map_err(|e| {
        warn!("WebSocket authentication failed: {}", e);
        "invalid token".to_string()
    })
}

async fn send_json(
    sink: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(json.into())).await
}
