use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::trace;
use tracing::warn;

use crate::BackendConfig;
use crate::ExecutorError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub body: T,
}

/// Backend half of a [`SequencedChannel`]: requests come in on
/// `requests`, replies echo the request's sequence number on `replies`.
#[derive(Debug)]
pub struct BackendEndpoint<Q, R> {
    pub requests: mpsc::Receiver<Sequenced<Q>>,
    pub replies: mpsc::Sender<Sequenced<R>>,
}

/// Request/reply correlation with one backend process.
///
/// One request is outstanding at a time. A reply carrying another sequence
/// number is left over from an earlier request that timed out: it is
/// discarded and the receive retried a bounded number of times.
#[derive(Debug)]
pub struct SequencedChannel<Q, R> {
    backend: String,
    tx: mpsc::Sender<Sequenced<Q>>,
    rx: Mutex<mpsc::Receiver<Sequenced<R>>>,
    next_seq: AtomicU64,
    reply_timeout: Duration,
    stale_reply_retries: u32,
}

impl<Q: Send, R: Send> SequencedChannel<Q, R> {
    pub fn new(
        backend: impl Into<String>,
        config: &BackendConfig,
    ) -> (Self, BackendEndpoint<Q, R>) {
        let (req_tx, req_rx) = mpsc::channel(config.channel_capacity);
        let (rep_tx, rep_rx) = mpsc::channel(config.channel_capacity);
        let channel = Self {
            backend: backend.into(),
            tx: req_tx,
            rx: Mutex::new(rep_rx),
            next_seq: AtomicU64::new(1),
            reply_timeout: config.reply_timeout(),
            stale_reply_retries: config.stale_reply_retries,
        };
        let endpoint = BackendEndpoint {
            requests: req_rx,
            replies: rep_tx,
        };
        (channel, endpoint)
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub async fn call(
        &self,
        body: Q,
    ) -> Result<R> {
        let mut rx = self.rx.lock().await;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.tx
            .send(Sequenced { seq, body })
            .await
            .map_err(|_| self.closed())?;
        trace!("sent seq {} to {}", seq, self.backend);

        let mut stale_left = self.stale_reply_retries;
        loop {
            let reply = match tokio::time::timeout(self.reply_timeout, rx.recv()).await {
                Err(_) => {
                    return Err(ExecutorError::BackendTimeout {
                        backend: self.backend.clone(),
                        after: self.reply_timeout,
                    }
                    .into())
                }
                Ok(None) => return Err(self.closed()),
                Ok(Some(reply)) => reply,
            };

            if reply.seq == seq {
                return Ok(reply.body);
            }

            warn!(
                "discarding stale reply seq {} from {} (expected {})",
                reply.seq, self.backend, seq
            );
            if stale_left == 0 {
                return Err(ExecutorError::StaleReply {
                    backend: self.backend.clone(),
                    expected: seq,
                    received: reply.seq,
                }
                .into());
            }
            stale_left -= 1;
        }
    }

    fn closed(&self) -> crate::Error {
        ExecutorError::ChannelClosed {
            backend: self.backend.clone(),
        }
        .into()
    }
}
