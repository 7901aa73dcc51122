//! Background decode worker
//!
//! One named thread owns a [`Decoder`] and serves requests in arrival order.
//! Requests and responses travel over `crossbeam-channel`; everything that
//! crosses is plain owned data.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error, info};

use super::decode::Decoder;
use crate::error::AssetError;
use crate::protocol::{WorkerMessage, WorkerRequest, WorkerResponse};

/// Name of the worker thread
pub const WORKER_THREAD: &str = "decode-worker";

pub struct DecodeWorker {
    requests: Option<Sender<WorkerRequest>>,
    responses: Receiver<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
    alive: bool,
}

impl DecodeWorker {
    /// Start the worker thread
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn(decoder: impl Decoder) -> std::io::Result<Self> {
        let (request_tx, request_rx) = unbounded::<WorkerRequest>();
        let (response_tx, response_rx) = unbounded::<WorkerMessage>();

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || run(decoder, request_rx, response_tx))?;

        info!("decode worker started");
        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
            alive: true,
        })
    }

    /// Threads are not available; there is never a worker
    #[cfg(target_arch = "wasm32")]
    pub fn spawn(_decoder: impl Decoder) -> std::io::Result<Self> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "threads are not available on this target",
        ))
    }

    /// Worker over existing channels, with no thread of its own
    #[cfg(test)]
    pub(crate) fn from_channels(requests: Sender<WorkerRequest>, responses: Receiver<WorkerMessage>) -> Self {
        Self {
            requests: Some(requests),
            responses,
            handle: None,
            alive: true,
        }
    }

    /// False once the thread has gone away. Never recovers.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn disconnected(&mut self) -> AssetError {
        if self.alive {
            error!("decode worker disconnected");
            self.alive = false;
        }
        AssetError::WorkerUnavailable
    }

    pub fn post(&mut self, request: WorkerRequest) -> Result<(), AssetError> {
        let sent = match &self.requests {
            Some(tx) if self.alive => tx.send(request).is_ok(),
            _ => false,
        };
        if sent {
            Ok(())
        } else {
            Err(self.disconnected())
        }
    }

    /// Next response, if one is ready
    pub fn try_recv(&mut self) -> Result<Option<WorkerMessage>, AssetError> {
        match self.responses.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Next response, waiting up to `timeout`
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<WorkerMessage>, AssetError> {
        match self.responses.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(self.disconnected()),
        }
    }

    /// Close the request channel and wait for the current decode to finish
    pub fn shutdown(mut self) {
        self.requests = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        // Dropping the sender ends the thread after its current job
        self.requests = None;
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn run(mut decoder: impl Decoder, requests: Receiver<WorkerRequest>, responses: Sender<WorkerMessage>) {
    for WorkerRequest { id, url } in requests {
        debug!(id, url = %url, "decoding");
        let response = catch_unwind(AssertUnwindSafe(|| decoder.decode(&url)))
            .unwrap_or_else(|_| WorkerResponse::failed(format!("decoder panicked on {}", url)));

        if responses.send(WorkerMessage { id, response }).is_err() {
            break;
        }
    }
    info!("decode worker stopped");
}
