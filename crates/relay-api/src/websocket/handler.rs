//! WebSocket 연결 handler.
//!
//! Axum WebSocket 엔드포인트와 연결별 송수신 루프.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::ServerMessage;
use super::relay::ChartRelay;
use super::session::Session;
use crate::state::AppState;

/// WebSocket 업그레이드 핸들러.
///
/// # 엔드포인트
///
/// `GET /ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let relay = state.relay.clone();
    let queue = state.outbound_queue;
    ws.on_upgrade(move |socket| handle_socket(socket, relay, queue))
}

/// WebSocket 연결 처리.
///
/// 수신 루프와 송신 태스크 중 하나가 끝나면 세션을 정리합니다.
async fn handle_socket(socket: WebSocket, relay: Arc<ChartRelay>, queue: usize) {
    let (tx, rx) = mpsc::channel(queue.max(1));
    let session = relay.connect(tx);
    let connection = session.id();

    let (sender, receiver) = socket.split();
    let mut send_task = tokio::spawn(write_outbound(sender, rx));

    tokio::select! {
        _ = read_inbound(&relay, &session, receiver) => {
            debug!(%connection, "Receive loop ended");
        }
        _ = &mut send_task => {
            debug!(%connection, "Send task ended");
        }
    }

    relay.disconnect(connection);
    send_task.abort();
}

/// 클라이언트 프레임을 릴레이로 넘깁니다.
async fn read_inbound(
    relay: &ChartRelay,
    session: &Arc<Session>,
    mut receiver: SplitStream<WebSocket>,
) {
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => relay.handle_text(session, text.as_str()),
            Ok(Message::Binary(_)) => {
                debug!(connection = %session.id(), "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %session.id(), error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}

/// 세션 큐의 메시지를 순서대로 소켓에 씁니다.
async fn write_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerMessage>,
) {
    while let Some(message) = outbound.recv().await {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// WebSocket 라우터 생성.
pub fn websocket_router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(websocket_handler))
}
