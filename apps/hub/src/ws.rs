use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use road_store_core::{Subscriber, SubscriptionRegistry};

use crate::state::AppState;

struct WsSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait::async_trait]
impl Subscriber for WsSubscriber {
    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.sink.lock().await.send(Message::Text(text.into())).await?;
        Ok(())
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state.subscriptions))
}

// Inbound frames are only read to notice the disconnect.
async fn serve_socket(socket: WebSocket, registry: Arc<SubscriptionRegistry>) {
    let (sink, mut stream) = socket.split();
    let Some(id) = registry.subscribe(Arc::new(WsSubscriber { sink: Mutex::new(sink) })) else {
        debug!("registry shut down, refusing websocket");
        return;
    };
    info!(subscriber = %id, "websocket connected");

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(subscriber = %id, error = %e, "websocket receive failed");
                break;
            }
        }
    }

    registry.unsubscribe(id);
    info!(subscriber = %id, "websocket disconnected");
}
