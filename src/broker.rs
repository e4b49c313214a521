//! Publish/subscribe broker for live viewers.
//!
//! A single task owns the registry of viewer channels. Registration,
//! removal, publishing and the subscriber-count query are all commands on
//! its inbox, so they are applied strictly in the order they were sent.

use ahash::AHashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::BrokerError;

/// Serialized sample as streamed to viewers.
pub type Payload = Arc<str>;

enum Command {
    Register {
        channel: mpsc::Sender<Payload>,
        reply: oneshot::Sender<u64>,
    },
    Unregister(u64),
    Publish(Payload),
    Count(oneshot::Sender<usize>),
}

/// The broker task state. Only reachable through a [`BrokerHandle`].
pub struct LiveBroker {
    inbox: mpsc::Receiver<Command>,
    subscribers: AHashMap<u64, mpsc::Sender<Payload>>,
    next_id: u64,
}

impl LiveBroker {
    /// Spawns the broker task.
    ///
    /// `queue_depth` bounds the command inbox, `subscriber_buffer` bounds
    /// each viewer's pending payloads. The task stops when `token` is
    /// cancelled or every handle is dropped, closing all viewer channels.
    pub fn spawn(
        queue_depth: usize,
        subscriber_buffer: usize,
        token: CancellationToken,
    ) -> (BrokerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let broker = LiveBroker {
            inbox: rx,
            subscribers: AHashMap::new(),
            next_id: 0,
        };
        let task = tokio::spawn(broker.run(token));
        let handle = BrokerHandle {
            tx,
            subscriber_buffer: subscriber_buffer.max(1),
        };
        (handle, task)
    }

    async fn run(mut self, token: CancellationToken) {
        debug!("Live broker started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                cmd = self.inbox.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
            }
        }

        let open = self.subscribers.len();
        self.subscribers.clear();
        info!(subscribers = open, "Live broker stopped");
    }

    fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Register { channel, reply } => {
                let id = self.next_id;
                self.next_id += 1;
                self.subscribers.insert(id, channel);
                debug!(subscriber = id, total = self.subscribers.len(), "Viewer registered");
                // Caller gave up waiting; its receiver is gone and the next
                // publish will remove the entry.
                let _ = reply.send(id);
            }
            Command::Unregister(id) => {
                if self.subscribers.remove(&id).is_some() {
                    debug!(subscriber = id, total = self.subscribers.len(), "Viewer unregistered");
                }
            }
            Command::Publish(payload) => self.broadcast(payload),
            Command::Count(reply) => {
                let _ = reply.send(self.subscribers.len());
            }
        }
    }

    fn broadcast(&mut self, payload: Payload) {
        self.subscribers
            .retain(|id, channel| match channel.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    trace!(subscriber = *id, "Viewer buffer full, dropping update");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = *id, "Viewer channel closed, removing");
                    false
                }
            });
    }
}

/// Cloneable sender side of the broker.
#[derive(Clone)]
pub struct BrokerHandle {
    tx: mpsc::Sender<Command>,
    subscriber_buffer: usize,
}

impl BrokerHandle {
    /// Registers a new viewer. The registration is applied before this returns.
    pub async fn register(&self) -> Result<Subscription, BrokerError> {
        let (channel, rx) = mpsc::channel(self.subscriber_buffer);
        let (reply, ack) = oneshot::channel();

        self.tx
            .send(Command::Register { channel, reply })
            .await
            .map_err(|_| BrokerError::Closed)?;
        let id = ack.await.map_err(|_| BrokerError::Closed)?;

        Ok(Subscription {
            id,
            rx,
            broker: self.tx.downgrade(),
        })
    }

    /// Removes a viewer. Unknown or already removed ids are ignored.
    pub async fn unregister(&self, id: u64) {
        let _ = self.tx.send(Command::Unregister(id)).await;
    }

    /// Queues a payload without waiting for inbox capacity.
    pub fn try_publish(&self, payload: Payload) -> Result<(), BrokerError> {
        self.tx
            .try_send(Command::Publish(payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => BrokerError::InboxFull,
                TrySendError::Closed(_) => BrokerError::Closed,
            })
    }

    pub async fn publish(&self, payload: Payload) -> Result<(), BrokerError> {
        self.tx
            .send(Command::Publish(payload))
            .await
            .map_err(|_| BrokerError::Closed)
    }

    pub async fn subscriber_count(&self) -> Result<usize, BrokerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Count(reply))
            .await
            .map_err(|_| BrokerError::Closed)?;
        rx.await.map_err(|_| BrokerError::Closed)
    }
}

/// One viewer's receiving end. Dropping it unregisters the viewer.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Payload>,
    broker: mpsc::WeakSender<Command>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops receiving without unregistering; the broker removes the viewer
    /// on its next publish.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Next payload, or `None` once the broker has stopped or dropped this viewer.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(tx) = self.broker.upgrade() {
            let _ = tx.try_send(Command::Unregister(self.id));
        }
    }
}
