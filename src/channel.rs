//! Channel handles multiplexed over a connection.
//!
//! The connection core treats channels as opaque recipients of inbound
//! frames and sources of outbound ones. A [`Channel`] carries just enough
//! behavior to be exercised: the open/close RPCs on its own id and an
//! exactly-once local shutdown that unblocks any pending RPC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

use crate::connection::{ConnectionInner, Rendezvous};
use crate::error::{Error, Result, REPLY_SUCCESS};
use crate::protocol::{Frame, Method, MethodKind};

/// A logical session multiplexed over a connection, identified by a 16-bit
/// non-zero id.
///
/// Obtained from [`Connection::channel`](crate::Connection::channel);
/// already open when returned.
#[derive(Clone)]
pub struct Channel {
    core: Arc<ChannelCore>,
}

impl Channel {
    /// This channel's id, unique within its connection.
    pub fn id(&self) -> u16 {
        self.core.id
    }

    /// Request and await an orderly close of this channel.
    ///
    /// The channel is unusable afterwards regardless of the result.
    pub async fn close(&self) -> Result<()> {
        let result = self
            .core
            .call(
                Method::ChannelClose {
                    reply_code: REPLY_SUCCESS,
                    reply_text: "kthxbai".to_string(),
                    class_id: 0,
                    method_id: 0,
                },
                &[MethodKind::ChannelCloseOk],
            )
            .await;
        self.core.conn.deregister(self.core.id);
        self.core.shutdown(None);
        result.map(drop)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("id", &self.core.id).finish()
    }
}

/// Connection-facing channel state, stored in the registry.
pub(crate) struct ChannelCore {
    id: u16,
    conn: Arc<ConnectionInner>,
    rpc_tx: StdMutex<Option<mpsc::Sender<Method>>>,
    errors_tx: StdMutex<Option<mpsc::Sender<Error>>>,
    rendezvous: Mutex<Rendezvous>,
    closed: AtomicBool,
}

impl ChannelCore {
    pub(crate) fn new(id: u16, conn: Arc<ConnectionInner>) -> Arc<ChannelCore> {
        let (rpc_tx, rpc_rx) = mpsc::channel(1);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Arc::new(ChannelCore {
            id,
            conn,
            rpc_tx: StdMutex::new(Some(rpc_tx)),
            errors_tx: StdMutex::new(Some(errors_tx)),
            rendezvous: Mutex::new(Rendezvous {
                rpc: rpc_rx,
                errors: errors_rx,
            }),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn into_handle(self: Arc<Self>) -> Channel {
        Channel { core: self }
    }

    /// Send `channel.open` and await the confirmation.
    pub(crate) async fn open(&self) -> Result<()> {
        self.call(Method::ChannelOpen, &[MethodKind::ChannelOpenOk])
            .await
            .map(drop)
    }

    /// Inbound frame from the connection's dispatch. Runs on the reader
    /// task, so it never blocks.
    pub(crate) fn recv(self: &Arc<Self>, frame: Frame) {
        match frame {
            Frame::Method {
                method:
                    Method::ChannelClose {
                        reply_code,
                        reply_text,
                        ..
                    },
                ..
            } => {
                // A close must be answered with close-ok even as we tear the
                // channel down locally.
                let core = self.clone();
                tokio::spawn(async move {
                    let _ = core
                        .conn
                        .send(Frame::method(core.id, Method::ChannelCloseOk))
                        .await;
                    core.conn.deregister(core.id);
                    core.shutdown(Some(Error::Server {
                        code: reply_code,
                        text: reply_text,
                    }));
                });
            }
            Frame::Method { method, .. } => {
                let tx = self.rpc_tx.lock().unwrap().clone();
                if let Some(tx) = tx {
                    if tx.try_send(method).is_err() {
                        tracing::warn!(channel = self.id, "dropping method, no pending call");
                    }
                }
            }
            // Content frames are opaque to the connection core.
            _ => tracing::trace!(channel = self.id, "ignoring content frame"),
        }
    }

    /// Tear down local state exactly once. With an error, any pending RPC
    /// unblocks with it; without, pending RPCs observe the closed rendezvous.
    pub(crate) fn shutdown(&self, err: Option<Error>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let errors_tx = self.errors_tx.lock().unwrap().take();
        if let (Some(e), Some(tx)) = (err, errors_tx) {
            let _ = tx.try_send(e);
        }
        self.rpc_tx.lock().unwrap().take();
    }

    /// One synchronous request/response on this channel's id.
    async fn call(&self, request: Method, expected: &[MethodKind]) -> Result<Method> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        let mut pending = self.rendezvous.lock().await;
        self.conn.send(Frame::method(self.id, request)).await?;
        let Rendezvous { rpc, errors } = &mut *pending;
        tokio::select! {
            err = errors.recv() => Err(err.unwrap_or(Error::Closed)),
            msg = rpc.recv() => {
                let msg = msg.ok_or(Error::Closed)?;
                if expected.iter().any(|kind| *kind == msg.kind()) {
                    Ok(msg)
                } else {
                    Err(Error::CommandInvalid)
                }
            }
        }
    }
}
