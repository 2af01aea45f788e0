// Session lifecycle scenarios: registration, callbacks, read loop exit
// conditions, and exactly-once teardown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use wshub::config::HubOptions;
use wshub::core::transport::memory::{self, MemorySink, MemoryStream};
use wshub::core::{
    run_session, BufferPool, Connection, EventHandler, Frame, Hub, SessionContext,
    TransportStream,
};
use wshub::error::{HubError, Result};

/// Test handler that records every callback and can be configured to join
/// groups, abort the session on connect, fail on message, or echo.
#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<String>>,
    join_on_connect: Vec<String>,
    abort_on_connect: bool,
    fail_on_message: bool,
    echo: bool,
}

impl RecordingHandler {
    async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_connected(&self, ctx: &SessionContext) -> Result<()> {
        self.events.lock().await.push("connected".to_string());
        for group in &self.join_on_connect {
            ctx.join_group(group).await;
        }
        if self.abort_on_connect {
            ctx.abort();
        }
        Ok(())
    }

    async fn on_message(&self, ctx: &SessionContext, payload: &[u8]) -> Result<()> {
        self.events
            .lock()
            .await
            .push(format!("message:{}", String::from_utf8_lossy(payload)));
        if self.fail_on_message {
            return Err(HubError::MessageParseError("unreadable payload".to_string()));
        }
        if self.echo {
            ctx.send(payload).await?;
        }
        Ok(())
    }

    async fn on_disconnected(&self, _ctx: &SessionContext) {
        self.events.lock().await.push("disconnected".to_string());
    }
}

struct Session {
    peer_sink: MemorySink,
    peer_stream: MemoryStream,
    task: JoinHandle<()>,
}

fn start_session(
    hub: &Arc<Hub>,
    handler: Arc<RecordingHandler>,
    options: &HubOptions,
    shutdown: watch::Receiver<bool>,
) -> Session {
    let pool = BufferPool::new(options.max_message_size, options.buffer_pool_capacity);
    let ((peer_sink, peer_stream), (conn_sink, conn_stream)) = memory::pair();
    let connection = Arc::new(Connection::new(
        Box::new(conn_stream),
        Box::new(conn_sink),
        options,
        pool,
    ));
    let hub = hub.clone();
    let options = options.clone();
    let task = tokio::spawn(async move {
        run_session(connection, hub, handler, &options, shutdown).await;
    });
    Session {
        peer_sink,
        peer_stream,
        task,
    }
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
async fn test_join_two_groups_then_disconnect_empties_registries() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        join_on_connect: vec!["a".to_string(), "b".to_string()],
        ..Default::default()
    });

    let session = start_session(&hub, handler.clone(), &options, shutdown_rx);

    wait_for("groups to appear", || async {
        hub.group_count().await == 2
    })
    .await;
    assert_eq!(hub.connection_count().await, 1);

    session.peer_sink.send_frame(Frame::Close).unwrap();
    session.task.await.unwrap();

    assert_eq!(hub.group_count().await, 0);
    assert_eq!(hub.connection_count().await, 0);
    assert_eq!(handler.events().await, vec!["connected", "disconnected"]);
}

#[tokio::test]
async fn test_group_broadcast_reaches_members_only() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let in_group = || {
        Arc::new(RecordingHandler {
            join_on_connect: vec!["g".to_string()],
            ..Default::default()
        })
    };
    let mut first = start_session(&hub, in_group(), &options, shutdown_rx.clone());
    let mut second = start_session(&hub, in_group(), &options, shutdown_rx.clone());
    let mut outside = start_session(
        &hub,
        Arc::new(RecordingHandler::default()),
        &options,
        shutdown_rx,
    );

    wait_for("group membership", || async {
        matches!(hub.group("g").await, Some(g) if g.member_count().await == 2)
    })
    .await;
    assert_eq!(hub.connection_count().await, 3);

    let group = hub.group("g").await.unwrap();
    assert_eq!(group.send_all(b"members only").await, 2);

    for peer in [&mut first.peer_stream, &mut second.peer_stream] {
        match peer.next_frame().await.unwrap() {
            Frame::Data { payload, .. } => assert_eq!(payload, b"members only"),
            Frame::Close => panic!("unexpected close"),
        }
    }
    let nothing =
        tokio::time::timeout(Duration::from_millis(50), outside.peer_stream.next_frame()).await;
    assert!(nothing.is_err(), "non-member must not receive the broadcast");

    for session in [first, second, outside] {
        session.peer_sink.send_frame(Frame::Close).unwrap();
        session.task.await.unwrap();
    }
    assert_eq!(hub.connection_count().await, 0);
}

#[tokio::test]
async fn test_abort_in_on_connected_skips_read_loop() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        abort_on_connect: true,
        ..Default::default()
    });

    let session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    // Frames sent by the peer must never reach on_message
    let _ = session.peer_sink.send_frame(Frame::Data {
        payload: b"ignored".to_vec(),
        fin: true,
    });

    session.task.await.unwrap();
    assert_eq!(hub.connection_count().await, 0);
    assert_eq!(handler.events().await, vec!["connected", "disconnected"]);
}

#[tokio::test]
async fn test_handler_error_tears_down_session_once() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        fail_on_message: true,
        join_on_connect: vec!["g".to_string()],
        ..Default::default()
    });

    let session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    wait_for("registration", || async {
        hub.connection_count().await == 1
    })
    .await;

    session
        .peer_sink
        .send_frame(Frame::Data {
            payload: b"boom".to_vec(),
            fin: true,
        })
        .unwrap();
    session.task.await.unwrap();

    assert_eq!(
        handler.events().await,
        vec!["connected", "message:boom", "disconnected"]
    );
    assert_eq!(hub.connection_count().await, 0);
    assert_eq!(hub.group_count().await, 0);
}

#[tokio::test]
async fn test_echo_session_round_trip() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        echo: true,
        ..Default::default()
    });

    let mut session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    session
        .peer_sink
        .send_frame(Frame::Data {
            payload: b"ping".to_vec(),
            fin: true,
        })
        .unwrap();

    match session.peer_stream.next_frame().await.unwrap() {
        Frame::Data { payload, .. } => assert_eq!(payload, b"ping"),
        Frame::Close => panic!("unexpected close"),
    }

    session.peer_sink.send_frame(Frame::Close).unwrap();
    session.task.await.unwrap();
    assert_eq!(
        handler.events().await,
        vec!["connected", "message:ping", "disconnected"]
    );
}

#[tokio::test]
async fn test_shutdown_signal_ends_session() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler::default());

    let session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    wait_for("registration", || async {
        hub.connection_count().await == 1
    })
    .await;

    shutdown_tx.send(true).unwrap();
    session.task.await.unwrap();

    assert_eq!(hub.connection_count().await, 0);
    assert_eq!(handler.events().await, vec!["connected", "disconnected"]);
}

#[tokio::test]
async fn test_teardown_signals_close_to_peer() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        fail_on_message: true,
        ..Default::default()
    });

    let mut session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    session
        .peer_sink
        .send_frame(Frame::Data {
            payload: b"boom".to_vec(),
            fin: true,
        })
        .unwrap();
    session.task.await.unwrap();

    // A server-initiated session end must still close the transport
    // gracefully rather than just dropping it
    assert_eq!(session.peer_stream.next_frame().await.unwrap(), Frame::Close);
    assert_eq!(
        handler.events().await,
        vec!["connected", "message:boom", "disconnected"]
    );
}

#[tokio::test]
async fn test_rejected_session_closes_transport() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler {
        abort_on_connect: true,
        ..Default::default()
    });

    let mut session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    session.task.await.unwrap();

    assert_eq!(session.peer_stream.next_frame().await.unwrap(), Frame::Close);
}

#[tokio::test]
async fn test_oversized_message_ends_session() {
    let options = HubOptions::for_testing();
    let hub = Arc::new(Hub::new());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler = Arc::new(RecordingHandler::default());

    let session = start_session(&hub, handler.clone(), &options, shutdown_rx);
    session
        .peer_sink
        .send_frame(Frame::Data {
            payload: vec![0; options.max_message_size + 1],
            fin: true,
        })
        .unwrap();

    session.task.await.unwrap();
    assert_eq!(hub.connection_count().await, 0);
    assert_eq!(handler.events().await, vec!["connected", "disconnected"]);
}
