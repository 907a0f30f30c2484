//! Scripted transport for client unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::time::Instant;

use super::Transport;
use crate::error::{Error, Result};

/// Reply produced for each request, given its raw bytes.
type Responder = Box<dyn FnMut(&[u8]) -> Vec<Bytes> + Send>;

struct Inner {
    sent: Vec<Bytes>,
    inbox: VecDeque<Bytes>,
    responder: Option<Responder>,
    refuse: bool,
}

/// Transport whose peer is a closure.
///
/// Each sent datagram is recorded and passed to the responder; whatever it
/// returns is queued for `recv`. An empty queue behaves like silence until
/// the deadline.
#[derive(Clone)]
pub(crate) struct MockTransport {
    target: SocketAddr,
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub(crate) fn new(target: SocketAddr) -> Self {
        Self {
            target,
            inner: Arc::new(Mutex::new(Inner {
                sent: Vec::new(),
                inbox: VecDeque::new(),
                responder: None,
                refuse: false,
            })),
        }
    }

    pub(crate) fn respond_with(self, responder: impl FnMut(&[u8]) -> Vec<Bytes> + Send + 'static) -> Self {
        self.inner.lock().unwrap().responder = Some(Box::new(responder));
        self
    }

    /// Fail every receive with `ConnectionRefused`.
    pub(crate) fn refusing(self) -> Self {
        self.inner.lock().unwrap().refuse = true;
        self
    }

    /// Queue an unsolicited datagram.
    pub(crate) fn push(&self, data: impl Into<Bytes>) {
        self.inner.lock().unwrap().inbox.push_back(data.into());
    }

    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap().sent.clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(Bytes::copy_from_slice(data));
        if let Some(responder) = inner.responder.as_mut() {
            let replies = responder(data);
            inner.inbox.extend(replies);
        }
        Ok(())
    }

    async fn recv(&self, deadline: Instant) -> Result<Option<Bytes>> {
        let next = {
            let mut inner = self.inner.lock().unwrap();
            if inner.refuse {
                return Err(Error::Network {
                    target: self.target,
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                }
                .boxed());
            }
            inner.inbox.pop_front()
        };
        match next {
            Some(data) => Ok(Some(data)),
            None => {
                tokio::time::sleep_until(deadline).await;
                Ok(None)
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.target
    }
}
