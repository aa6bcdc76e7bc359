//! WebSocket subscription endpoint
//!
//! Clients connect to `/ws` and receive every broadcast frame. Inbound
//! messages are ignored; the connection is unregistered when the client
//! closes it or the socket errors.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::handlers::ApiState;
use crate::subscribers::{SinkError, SubscriberRegistry, SubscriberSink};

/// Write half of an accepted WebSocket
pub struct WebSocketSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl SubscriberSink for WebSocketSubscriber {
    async fn send_text(&self, text: Arc<str>) -> Result<(), SinkError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Upgrade handler for `/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry, peer))
}

async fn handle_socket(socket: WebSocket, registry: Arc<SubscriberRegistry>, peer: SocketAddr) {
    let (sender, mut receiver) = socket.split();
    let subscriber: Arc<dyn SubscriberSink> = Arc::new(WebSocketSubscriber::new(sender));
    let id = registry.add(&subscriber);
    debug!(subscriber = id, %peer, "WebSocket subscribed");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(subscriber = id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    registry.remove(id);
    debug!(subscriber = id, "WebSocket closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::service::tests::fixture;
    use server::HealthState;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite::Message as ClientMessage};

    async fn wait_for_subscribers(registry: &SubscriberRegistry, expected: usize) {
        for _ in 0..200 {
            if registry.len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} subscribers", expected);
    }

    #[tokio::test]
    async fn test_websocket_receives_broadcast_and_unregisters() {
        let f = fixture(5, 50);
        let registry = Arc::new(SubscriberRegistry::new(Duration::from_secs(5)));
        let state = ApiState {
            service: f.service.clone(),
            registry: registry.clone(),
        };
        let router = create_router(state, Arc::new(HealthState::new("test")), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let (mut client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        let frame = r#"{"type":"crypto","data":[]}"#;
        let report = registry.broadcast(frame).await;
        assert_eq!(report.delivered, 1);

        let received = client.next().await.unwrap().unwrap();
        assert_eq!(received, ClientMessage::Text(frame.to_string()));

        // Inbound messages are ignored
        client.send(ClientMessage::Text("hello".into())).await.unwrap();
        client.close(None).await.unwrap();
        wait_for_subscribers(&registry, 0).await;
    }
}
