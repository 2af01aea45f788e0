// End-to-end test over a real warp server and a tokio-tungstenite client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use wshub::config::HubOptions;
use wshub::core::{EventHandler, Hub, SessionContext};
use wshub::error::Result;
use wshub::handlers::ws_route;

struct EchoHandler;

#[async_trait]
impl EventHandler for EchoHandler {
    async fn on_connected(&self, ctx: &SessionContext) -> Result<()> {
        ctx.join_group("all").await;
        Ok(())
    }

    async fn on_message(&self, ctx: &SessionContext, payload: &[u8]) -> Result<()> {
        ctx.send(payload).await
    }
}

fn start_server(hub: Arc<Hub>) -> (String, watch::Sender<bool>) {
    let options = Arc::new(HubOptions::for_testing());
    let handler: Arc<dyn EventHandler> = Arc::new(EchoHandler);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let routes = ws_route("ws", hub, options, handler, shutdown_rx);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    (format!("ws://{}/ws", addr), shutdown_tx)
}

async fn wait_for<F, Fut>(what: &str, condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_websocket_echo_round_trip() {
    let hub = Arc::new(Hub::new());
    let (url, _shutdown_tx) = start_server(hub.clone());

    let (mut client, _) = connect_async(url.as_str()).await.expect("client connects");
    client
        .send(Message::Binary(b"ping".to_vec()))
        .await
        .unwrap();

    let reply = client.next().await.expect("reply").expect("frame");
    assert_eq!(reply.into_data(), b"ping".to_vec());

    client.close(None).await.unwrap();
    wait_for("session teardown", || async {
        hub.connection_count().await == 0
    })
    .await;
    assert_eq!(hub.group_count().await, 0);
}

#[tokio::test]
async fn test_websocket_group_broadcast() {
    let hub = Arc::new(Hub::new());
    let (url, _shutdown_tx) = start_server(hub.clone());

    let (mut first, _) = connect_async(url.as_str()).await.expect("first client");
    let (mut second, _) = connect_async(url.as_str()).await.expect("second client");

    wait_for("both sessions in the group", || async {
        matches!(hub.group("all").await, Some(g) if g.member_count().await == 2)
    })
    .await;

    let group = hub.group("all").await.unwrap();
    assert_eq!(group.send_all(b"fan-out").await, 2);

    for client in [&mut first, &mut second] {
        let message = client.next().await.expect("broadcast").expect("frame");
        assert_eq!(message.into_data(), b"fan-out".to_vec());
    }

    first.close(None).await.unwrap();
    second.close(None).await.unwrap();
    wait_for("teardown of both sessions", || async {
        hub.connection_count().await == 0
    })
    .await;
    assert_eq!(hub.group_count().await, 0);
}
