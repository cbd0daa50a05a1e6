use axum::{
    debug_handler,
    extract::{Path, State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info};

use crate::{
    Broker,
    db::ChatId,
    events::{self, EventBody, InboundEvent},
};

#[debug_handler(state = crate::AppState)]
pub async fn user_feed(
    Path(chat_id): Path<ChatId>,
    State(broker): State<Broker>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(async move |stream| {
        let mut feed = broker.transport.subscribe(chat_id);
        let (mut sender, mut receiver) = stream.split();
        info!(chat_id, "feed attached");

        let mut feed_task = tokio::spawn(async move {
            while let Some(out) = feed.recv().await {
                let Ok(frame) = serde_json::to_string(&out) else {
                    continue;
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
            let Ok(body) = serde_json::from_slice::<EventBody>(&msg.into_data()) else {
                debug!(chat_id, "ignoring unparsable frame");
                continue;
            };

            if let Err(err) = events::handle(&broker, InboundEvent { from: chat_id, body }).await {
                debug!(chat_id, %err, "event from feed refused");
            }
        }

        // Dropping the feed with the task takes the user offline.
        feed_task.abort();
        let _ = (&mut feed_task).await;
        info!(chat_id, "feed detached");
    })
}
