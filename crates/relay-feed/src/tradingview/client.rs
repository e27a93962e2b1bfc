//! TradingView 차트 소켓 클라이언트.
//!
//! 구독마다 소켓 하나를 열고, 읽기 태스크 하나가 소켓을 소유합니다.
//! 링크가 닫히면 태스크는 Close 프레임을 보내고 종료합니다.

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use relay_core::{FeedConfig, Market};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::ORIGIN, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::protocol::{self, Frame, SeriesEvent};
use crate::error::{FeedError, FeedResult};
use crate::link::{LinkCore, StreamLink};
use crate::traits::{ChartFeed, ChartLink};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// TradingView 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct TradingViewConfig {
    /// 소켓 URL
    pub url: String,
    /// Origin 헤더
    pub origin: String,
    /// 요청할 바 개수
    pub bar_count: usize,
    /// 연결, 헬로 수신, 구독 요청까지의 타임아웃
    pub handshake_timeout: Duration,
}

impl From<&FeedConfig> for TradingViewConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            url: config.url.clone(),
            origin: config.origin.clone(),
            bar_count: config.bar_count,
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
        }
    }
}

/// TradingView 소켓 기반 [`ChartFeed`].
pub struct TradingViewFeed {
    config: TradingViewConfig,
}

impl TradingViewFeed {
    pub fn new(config: TradingViewConfig) -> Self {
        Self { config }
    }

    /// 소켓을 열고 서버 헬로를 기다립니다.
    async fn connect(&self) -> FeedResult<Socket> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        let origin = HeaderValue::from_str(&self.config.origin)
            .map_err(|e| FeedError::Connect(format!("invalid origin: {e}")))?;
        request.headers_mut().insert(ORIGIN, origin);

        let (mut socket, _) = connect_async(request).await?;

        loop {
            let message = socket
                .next()
                .await
                .ok_or_else(|| FeedError::Handshake("socket closed before hello".to_string()))??;

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return Err(FeedError::Handshake("socket closed before hello".to_string()));
                }
                _ => continue,
            };

            let mut hello = false;
            for frame in protocol::decode_message(&text) {
                match frame? {
                    Frame::Heartbeat(beat) => {
                        socket.send(Message::Text(protocol::encode_frame(&beat).into())).await?;
                    }
                    Frame::Info(_) | Frame::Packet(_) => hello = true,
                }
            }
            if hello {
                return Ok(socket);
            }
        }
    }
}

#[async_trait]
impl ChartFeed for TradingViewFeed {
    fn name(&self) -> &str {
        "tradingview"
    }

    async fn open(&self, market: &Market) -> FeedResult<Box<dyn ChartLink>> {
        let session = protocol::new_chart_session_id();
        let packets = protocol::subscribe_packets(&session, market, self.config.bar_count);
        let socket = within_handshake(self.config.handshake_timeout, async {
            let mut socket = self.connect().await?;
            send_packets(&mut socket, packets).await?;
            Ok::<_, FeedError>(socket)
        })
        .await?;

        info!(market = %market, session = %session, "TradingView series requested");

        let link = StreamLink::spawn(market.clone(), self.config.bar_count, move |core| {
            drive(core, socket)
        });
        Ok(Box::new(link))
    }
}

/// 핸드셰이크 전체(연결, 헬로 대기, 구독 패킷 전송)에 시간 제한을 둡니다.
async fn within_handshake<T, F>(limit: Duration, handshake: F) -> FeedResult<T>
where
    F: Future<Output = FeedResult<T>>,
{
    tokio::time::timeout(limit, handshake).await.map_err(|_| {
        FeedError::Timeout(format!("handshake not completed within {}s", limit.as_secs()))
    })?
}

/// 구독 패킷을 순서대로 보냅니다.
async fn send_packets<S>(sink: &mut S, packets: Vec<String>) -> FeedResult<()>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    for packet in packets {
        sink.send(Message::Text(packet.into()))
            .await
            .map_err(|e| FeedError::Handshake(e.to_string()))?;
    }
    Ok(())
}

/// 링크가 닫히거나 소켓이 끊길 때까지 프레임을 처리합니다.
async fn drive(core: Arc<LinkCore>, socket: Socket) {
    let (mut write, mut read) = socket.split();

    loop {
        let message = tokio::select! {
            _ = core.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                debug!(market = %core.market(), "TradingView socket released");
                return;
            }
            message = read.next() => message,
        };

        let text = match message {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "closed by server".to_string());
                core.publish_error(&FeedError::Disconnected(reason));
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => {
                core.publish_error(&FeedError::Disconnected(err.to_string()));
                return;
            }
            None => {
                core.publish_error(&FeedError::Disconnected("stream ended".to_string()));
                return;
            }
        };

        for frame in protocol::decode_message(&text) {
            match frame {
                Ok(Frame::Heartbeat(beat)) => {
                    let reply = Message::Text(protocol::encode_frame(&beat).into());
                    if let Err(err) = write.send(reply).await {
                        core.publish_error(&FeedError::Disconnected(err.to_string()));
                        return;
                    }
                }
                Ok(Frame::Packet(packet)) => match protocol::interpret(&packet) {
                    SeriesEvent::Bars(bars) => core.publish_bars(bars),
                    SeriesEvent::Error(err) => {
                        warn!(market = %core.market(), error = %err, "TradingView reported an error");
                        core.publish_error(&err);
                        if err.is_terminal() {
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                    }
                    SeriesEvent::Ignored => {}
                },
                Ok(Frame::Info(_)) => {}
                Err(err) => debug!(error = %err, "Skipping undecodable frame"),
            }
        }
    }
}
