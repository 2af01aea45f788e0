//! WebSocket upgrade glue
//! Adapts an upgraded warp WebSocket to the hub's transport contract and
//! runs the session lifecycle to completion.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use log::debug;
use tokio::sync::watch;
use warp::ws::{Message, WebSocket};
use warp::Filter;

use crate::config::HubOptions;
use crate::core::buffer::BufferPool;
use crate::core::connection::Connection;
use crate::core::hub::Hub;
use crate::core::lifecycle::{run_session, EventHandler};
use crate::core::transport::{Frame, TransportSink, TransportStream};
use crate::error::{HubError, Result};

/// Write half of an upgraded WebSocket
struct WsSink {
    tx: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.tx
            .send(Message::binary(payload.to_vec()))
            .await
            .map_err(|e| HubError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.tx.send(Message::close()).await;
        Ok(())
    }
}

/// Read half of an upgraded WebSocket
struct WsStream {
    rx: SplitStream<WebSocket>,
}

#[async_trait]
impl TransportStream for WsStream {
    async fn next_frame(&mut self) -> Result<Frame> {
        loop {
            match self.rx.next().await {
                None => return Ok(Frame::Close),
                Some(Err(e)) => return Err(HubError::TransportError(e.to_string())),
                Some(Ok(message)) => {
                    if message.is_close() {
                        return Ok(Frame::Close);
                    }
                    // Control frames are transport noise, not message data
                    if message.is_ping() || message.is_pong() {
                        continue;
                    }
                    // warp reassembles fragmented messages before delivery,
                    // so each data frame carries one complete logical message
                    return Ok(Frame::Data {
                        payload: message.into_bytes(),
                        fin: true,
                    });
                }
            }
        }
    }
}

/// Handle one upgraded WebSocket connection: wrap it in a [`Connection`] and
/// run the session lifecycle until the session ends.
pub async fn handle_ws_client(
    ws: WebSocket,
    hub: Arc<Hub>,
    options: Arc<HubOptions>,
    handler: Arc<dyn EventHandler>,
    pool: Arc<BufferPool>,
    shutdown: watch::Receiver<bool>,
) {
    let (ws_tx, ws_rx) = ws.split();
    let connection = Arc::new(Connection::new(
        Box::new(WsStream { rx: ws_rx }),
        Box::new(WsSink { tx: ws_tx }),
        &options,
        pool,
    ));
    debug!("upgraded websocket for connection {}", connection.id());
    run_session(connection, hub, handler, &options, shutdown).await;
}

/// Build a warp route that upgrades requests on `path` and dispatches each
/// session to `handler`. Idempotent to call per route; all routes built from
/// the same `hub` share one registry.
pub fn ws_route(
    path: &'static str,
    hub: Arc<Hub>,
    options: Arc<HubOptions>,
    handler: Arc<dyn EventHandler>,
    shutdown: watch::Receiver<bool>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let pool = BufferPool::new(options.max_message_size, options.buffer_pool_capacity);
    warp::path(path)
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let hub = hub.clone();
            let options = options.clone();
            let handler = handler.clone();
            let pool = pool.clone();
            let shutdown = shutdown.clone();
            ws.on_upgrade(move |socket| {
                handle_ws_client(socket, hub, options, handler, pool, shutdown)
            })
        })
}
