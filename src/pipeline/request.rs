//! Request handles
//!
//! A [`ModelRequest`] is polled like any other frame-driven operation: check
//! `is_complete()` each frame, then `take()` the result. The pipeline keeps
//! the matching [`Resolver`], which is consumed on delivery, so a request
//! resolves at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::AssetError;
use crate::protocol::RequestId;
use crate::scene::Group;

/// Outcome of a model request
pub type ModelResult = Result<Group, AssetError>;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Caller side of a pending model request
#[derive(Debug)]
pub struct ModelRequest {
    id: RequestId,
    name: String,
    token: CancelToken,
    receiver: Receiver<ModelResult>,
    result: Option<ModelResult>,
}

/// Pipeline side of a pending model request
#[derive(Debug)]
pub(crate) struct Resolver {
    pub id: RequestId,
    pub name: String,
    pub token: CancelToken,
    sender: Sender<ModelResult>,
}

impl Resolver {
    /// Deliver the outcome. Consumes the resolver.
    pub fn resolve(self, result: ModelResult) {
        // The caller may have dropped its handle
        let _ = self.sender.send(result);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Create a connected resolver/handle pair
pub(crate) fn request_pair(id: RequestId, name: &str, token: CancelToken) -> (Resolver, ModelRequest) {
    let (sender, receiver) = bounded(1);
    let resolver = Resolver {
        id,
        name: name.to_string(),
        token: token.clone(),
        sender,
    };
    let request = ModelRequest {
        id,
        name: name.to_string(),
        token,
        receiver,
        result: None,
    };
    (resolver, request)
}

impl ModelRequest {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Logical asset name this request was issued for
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Stop caring about the result. The request still resolves, with
    /// [`AssetError::Cancelled`] unless it had already been delivered.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    fn store(&mut self, received: Result<ModelResult, ()>) {
        self.result = Some(match received {
            Ok(result) => result,
            // Resolver dropped without delivering (pipeline or loader gone)
            Err(()) => Err(AssetError::DecodeFailure(
                "request dropped before completion".into(),
            )),
        });
    }

    /// Check if the request has completed (polls the channel)
    pub fn is_complete(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }

        match self.receiver.try_recv() {
            Ok(result) => {
                self.store(Ok(result));
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.store(Err(()));
                true
            }
        }
    }

    /// Block up to `timeout` for the result
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.result.is_some() {
            return true;
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(result) => {
                self.store(Ok(result));
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.store(Err(()));
                true
            }
        }
    }

    /// Get a reference to the result if complete
    pub fn result(&self) -> Option<&ModelResult> {
        self.result.as_ref()
    }

    /// Take the result if complete
    pub fn take(mut self) -> Option<ModelResult> {
        self.is_complete();
        self.result
    }
}
