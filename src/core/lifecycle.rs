//! Session lifecycle
//! Ties one duplex connection to the user-supplied event handler: register,
//! connected callback, framed read loop, then teardown exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::HubOptions;
use crate::core::connection::{Connection, MessageKind};
use crate::core::hub::Hub;
use crate::error::{HubError, Result};

/// User-supplied behavior at the three session events.
///
/// `on_connected` may send an initial message, join groups, or call
/// [`SessionContext::abort`] to reject the session before the read loop
/// starts. `on_message` receives the raw payload of exactly one logical
/// message. `on_disconnected` fires exactly once per session, after the
/// connection has been removed from the registries, even when the session
/// was rejected in `on_connected`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_connected(&self, _ctx: &SessionContext) -> Result<()> {
        Ok(())
    }

    async fn on_message(&self, ctx: &SessionContext, payload: &[u8]) -> Result<()>;

    async fn on_disconnected(&self, _ctx: &SessionContext) {}
}

/// Accessors exposed to the handler during one session
#[derive(Clone)]
pub struct SessionContext {
    connection: Arc<Connection>,
    hub: Arc<Hub>,
}

impl SessionContext {
    pub fn new(connection: Arc<Connection>, hub: Arc<Hub>) -> Self {
        Self { connection, hub }
    }

    /// The current connection, for send/receive/abort/property storage
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The process-wide storage, to query all connections and groups
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn id(&self) -> Uuid {
        self.connection.id()
    }

    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        self.connection.send(payload).await
    }

    pub fn abort(&self) {
        self.connection.abort();
    }

    pub async fn join_group(&self, name: &str) {
        self.hub.join_group(&self.connection, name).await;
    }

    pub async fn leave_group(&self, name: &str) {
        self.hub.leave_group(&self.connection, name).await;
    }
}

/// Run one session to completion.
///
/// Registers the connection, invokes the connected callback, runs the framed
/// read loop until the peer closes, the connection aborts, a read times out,
/// a message oversteps the size ceiling, the transport fails, or `shutdown`
/// flips. It then always completes the teardown sequence: deregister, leave
/// all groups, signal closure to the peer, invoke the disconnected callback.
/// No session error escapes this function or affects another session.
pub async fn run_session(
    connection: Arc<Connection>,
    hub: Arc<Hub>,
    handler: Arc<dyn EventHandler>,
    options: &HubOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    let ctx = SessionContext::new(connection.clone(), hub.clone());

    hub.add_connection(connection.clone()).await;
    info!(
        "client connected: {} ({} connections)",
        connection.id(),
        hub.connection_count().await
    );

    let accepted = match handler.on_connected(&ctx).await {
        Ok(()) => !connection.is_aborted(),
        Err(e) => {
            warn!("on_connected rejected session {}: {}", connection.id(), e);
            connection.abort();
            false
        }
    };

    if accepted {
        // The identity is immutable from here on
        connection.finalize();
        receive_loop(&connection, &ctx, handler.as_ref(), options, &mut shutdown).await;
    }

    // Teardown runs for every exit reason, including a rejected session
    hub.remove_connection(&connection).await;
    connection.close().await;
    handler.on_disconnected(&ctx).await;
    info!(
        "client disconnected: {} ({} connections)",
        connection.id(),
        hub.connection_count().await
    );
}

async fn receive_loop(
    connection: &Arc<Connection>,
    ctx: &SessionContext,
    handler: &dyn EventHandler,
    options: &HubOptions,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            debug!("shutdown requested, ending session {}", connection.id());
            break;
        }

        let received = tokio::select! {
            result = connection.receive_timeout(options.read_message_timeout) => result,
            _ = shutdown.changed() => {
                debug!("shutdown requested, ending session {}", connection.id());
                break;
            }
        };

        match received {
            Ok((payload, MessageKind::Data)) => {
                if let Err(e) = handler.on_message(ctx, &payload).await {
                    warn!("handler error on session {}: {}", connection.id(), e);
                    connection.abort();
                    break;
                }
                if connection.is_aborted() {
                    break;
                }
            }
            Ok((_, MessageKind::Close)) => {
                debug!("peer closed session {}", connection.id());
                break;
            }
            Err(HubError::Aborted) => break,
            Err(e) => {
                // Transport errors, timeouts and oversized messages all end
                // the session; reads are never retried here
                warn!("session {} ended: {}", connection.id(), e);
                break;
            }
        }

        if !options.keep_alive_interval.is_zero() {
            tokio::time::sleep(options.keep_alive_interval).await;
        }
    }
}
