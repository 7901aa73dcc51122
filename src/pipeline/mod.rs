//! Asset Pipeline
//!
//! Turns a logical asset name into a reconstructed scene graph.
//!
//! ## Worker path
//!
//! `request_model` resolves the name, then either posts `{ id, url }` to the
//! decode worker or, when a decode is already in flight, appends the request
//! to a FIFO queue. Exactly one request occupies the in-flight slot at a
//! time. `poll()` (once per frame) drains worker responses, reconstructs
//! geometry and material on the calling thread, resolves the slot's handle
//! and posts the next queued request.
//!
//! ```text
//! request_model ──► queue ──► in-flight slot ──► decode-worker
//!                                   ▲                  │
//!                 ModelRequest ◄── poll() ◄── WorkerMessage
//! ```
//!
//! ## Direct path
//!
//! `request_model_direct` hands the URL to a [`SceneLoader`] on its own
//! thread. It ignores the slot, so any number of direct loads may run
//! alongside the worker path.
//!
//! ## Cancellation
//!
//! Every request carries a [`CancelToken`]. A cancelled request still in the
//! queue is never posted; a cancelled in-flight request has its response
//! discarded without reconstruction. Either way the handle resolves with
//! [`AssetError::Cancelled`].

mod decode;
mod direct;
mod reconstruct;
mod request;
mod worker;

pub use decode::{Decoder, GltfDecoder};
pub use direct::{GltfSceneLoader, SceneLoader};
pub use reconstruct::{reconstruct, texture_from_descriptor};
pub use request::{CancelToken, ModelRequest, ModelResult};
pub use worker::{DecodeWorker, WORKER_THREAD};

#[cfg(test)]
pub(crate) use decode::fixtures;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::asset::{AssetRegistry, MetadataProblem};
use crate::config::PipelineConfig;
use crate::error::{AssetError, ConfigError};
use crate::protocol::{RequestId, WorkerMessage, WorkerRequest, WorkerResponse};
use crate::storage::Storage;
use request::{request_pair, Resolver};

/// How long `wait` blocks on a channel before re-checking state
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// A worker-path request waiting for its turn
struct Queued {
    resolver: Resolver,
    url: String,
}

pub struct AssetPipeline {
    registry: AssetRegistry,
    worker: Option<DecodeWorker>,
    loader: Arc<dyn SceneLoader>,
    next_id: RequestId,
    /// The one request the worker is decoding
    in_flight: Option<Resolver>,
    queue: VecDeque<Queued>,
    /// Incomplete metadata found at startup
    metadata_problems: Vec<MetadataProblem>,
}

impl AssetPipeline {
    /// Pipeline without a decode worker. Only the direct path works until
    /// [`with_worker`](Self::with_worker) succeeds.
    pub fn new(registry: AssetRegistry, loader: impl SceneLoader) -> Self {
        Self {
            registry,
            worker: None,
            loader: Arc::new(loader),
            next_id: 1,
            in_flight: None,
            queue: VecDeque::new(),
            metadata_problems: Vec::new(),
        }
    }

    /// Start a decode worker. If the runtime cannot provide one the
    /// pipeline stays worker-less and worker requests fail with
    /// `WorkerUnavailable`.
    pub fn with_worker(mut self, decoder: impl Decoder) -> Self {
        match DecodeWorker::spawn(decoder) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => warn!("decode worker unavailable: {}", e),
        }
        self
    }

    /// Registry, storage, worker and loader as configured. Runs the
    /// metadata completeness check, which only warns.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let registry = config.registry()?;
        let storage = config.storage();
        let mut pipeline = Self::new(registry, GltfSceneLoader::new(storage.clone()));
        pipeline.startup_check(&storage);
        if config.use_worker {
            Ok(pipeline.with_worker(GltfDecoder::new(storage)))
        } else {
            info!("decode worker disabled by configuration");
            Ok(pipeline)
        }
    }

    /// Load the declared metadata records and check them for missing
    /// fields. Problems are logged and kept; loading never fails on them.
    pub fn startup_check(&mut self, storage: &Storage) -> &[MetadataProblem] {
        self.registry.load_infos(storage);
        self.metadata_problems = self.registry.check_metadata();
        if !self.metadata_problems.is_empty() {
            warn!(count = self.metadata_problems.len(), "incomplete model metadata");
        }
        &self.metadata_problems
    }

    /// Problems found by the last [`startup_check`](Self::startup_check)
    pub fn metadata_problems(&self) -> &[MetadataProblem] {
        &self.metadata_problems
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    /// True while a live decode worker exists
    pub fn has_worker(&self) -> bool {
        self.worker.as_ref().map(|w| w.is_alive()).unwrap_or(false)
    }

    /// Id of the request currently being decoded
    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|r| r.id)
    }

    /// Number of requests waiting behind the in-flight one
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Queued request ids, next first
    pub fn queued_ids(&self) -> Vec<RequestId> {
        self.queue.iter().map(|q| q.resolver.id).collect()
    }

    fn url_for(&self, name: &str) -> Result<String, AssetError> {
        self.registry
            .url(name)
            .map(str::to_string)
            .ok_or_else(|| AssetError::UnknownAsset(name.to_string()))
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // =========================================================================
    // Worker path
    // =========================================================================

    pub fn request_model(&mut self, name: &str) -> Result<ModelRequest, AssetError> {
        self.request_model_with(name, CancelToken::new())
    }

    /// Issue a worker-path request. Unknown names and a missing worker are
    /// reported here, before anything is posted.
    pub fn request_model_with(&mut self, name: &str, token: CancelToken) -> Result<ModelRequest, AssetError> {
        let url = self.url_for(name)?;
        if !self.has_worker() {
            return Err(AssetError::WorkerUnavailable);
        }

        let id = self.next_request_id();
        let (resolver, request) = request_pair(id, name, token);
        info!(id, asset = name, "model requested");

        if resolver.is_cancelled() {
            resolver.resolve(Err(AssetError::Cancelled));
        } else if self.in_flight.is_none() {
            self.post(resolver, url).map_err(|(_, e)| e)?;
        } else {
            debug!(id, queued = self.queue.len() + 1, "decode in flight, queueing");
            self.queue.push_back(Queued { resolver, url });
        }
        Ok(request)
    }

    /// Occupy the slot with `resolver` and send its url to the worker. On
    /// failure the resolver is handed back unresolved.
    fn post(&mut self, resolver: Resolver, url: String) -> Result<(), (Resolver, AssetError)> {
        let posted = match self.worker.as_mut() {
            Some(worker) => worker.post(WorkerRequest { id: resolver.id, url }),
            None => Err(AssetError::WorkerUnavailable),
        };
        match posted {
            Ok(()) => {
                debug!(id = resolver.id, asset = %resolver.name, "posted to worker");
                self.in_flight = Some(resolver);
                Ok(())
            }
            Err(e) => Err((resolver, e)),
        }
    }

    /// Fill an empty slot from the queue, skipping cancelled requests
    fn advance(&mut self) -> usize {
        let mut resolved = 0;
        while self.in_flight.is_none() {
            let Some(Queued { resolver, url }) = self.queue.pop_front() else { break };
            if resolver.is_cancelled() {
                info!(id = resolver.id, "cancelled before posting");
                resolver.resolve(Err(AssetError::Cancelled));
                resolved += 1;
                continue;
            }
            if let Err((resolver, e)) = self.post(resolver, url) {
                warn!(id = resolver.id, asset = %resolver.name, "request rejected: {}", e);
                resolver.resolve(Err(e));
                resolved += 1;
            }
        }
        resolved
    }

    /// Resolve queued requests whose token has fired
    fn sweep_cancelled(&mut self) -> usize {
        let (cancelled, kept): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|q| q.resolver.is_cancelled());
        self.queue = kept.into();
        let count = cancelled.len();
        for Queued { resolver, .. } in cancelled {
            info!(id = resolver.id, "cancelled before posting");
            resolver.resolve(Err(AssetError::Cancelled));
        }
        count
    }

    /// Reject everything waiting on the worker
    fn fail_pending(&mut self, error: AssetError) -> usize {
        let mut count = 0;
        if let Some(resolver) = self.in_flight.take() {
            warn!(id = resolver.id, asset = %resolver.name, "request rejected: {}", error);
            resolver.resolve(Err(error.clone()));
            count += 1;
        }
        for Queued { resolver, .. } in self.queue.drain(..) {
            warn!(id = resolver.id, asset = %resolver.name, "request rejected: {}", error);
            resolver.resolve(Err(error.clone()));
            count += 1;
        }
        count
    }

    /// Handle one worker response. Returns the number of requests resolved.
    fn deliver(&mut self, message: WorkerMessage) -> usize {
        let WorkerMessage { id, response } = message;
        let resolver = match self.in_flight.take() {
            Some(resolver) if resolver.id == id => resolver,
            other => {
                warn!(id, expected = ?other.as_ref().map(|r| r.id), "response id mismatch, dropping");
                self.in_flight = other;
                return 0;
            }
        };

        if resolver.is_cancelled() {
            info!(id, asset = %resolver.name, "cancelled in flight, response discarded");
            resolver.resolve(Err(AssetError::Cancelled));
        } else {
            let result = match response {
                WorkerResponse::Decoded { geometries, texture } => reconstruct(geometries, texture),
                WorkerResponse::Failed { error } => Err(AssetError::DecodeFailure(error)),
            };
            match &result {
                Ok(group) => info!(id, asset = %resolver.name, meshes = group.mesh_count(), "model resolved"),
                Err(e) => warn!(id, asset = %resolver.name, "model rejected: {}", e),
            }
            resolver.resolve(result);
        }

        1 + self.advance()
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<WorkerMessage>, AssetError> {
        let Some(worker) = self.worker.as_mut() else {
            return Err(AssetError::WorkerUnavailable);
        };
        match timeout {
            Some(timeout) => worker.recv_timeout(timeout),
            None => worker.try_recv(),
        }
    }

    /// Process worker responses without blocking. Call once per frame.
    /// Returns how many requests were resolved.
    pub fn poll(&mut self) -> usize {
        let mut resolved = self.sweep_cancelled();
        while self.in_flight.is_some() {
            match self.receive(None) {
                Ok(Some(message)) => resolved += self.deliver(message),
                Ok(None) => break,
                Err(e) => {
                    resolved += self.fail_pending(e);
                    break;
                }
            }
        }
        resolved
    }

    /// Block until `request` completes, pumping the worker meanwhile.
    /// Works for both worker and direct requests.
    pub fn wait(&mut self, mut request: ModelRequest) -> ModelResult {
        while !request.is_complete() {
            if self.in_flight.is_some() {
                match self.receive(Some(WAIT_SLICE)) {
                    Ok(Some(message)) => {
                        self.deliver(message);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.fail_pending(e);
                    }
                }
            } else {
                request.wait_timeout(WAIT_SLICE);
            }
            self.sweep_cancelled();
        }
        request
            .take()
            .unwrap_or_else(|| Err(AssetError::DecodeFailure("request dropped before completion".into())))
    }

    // =========================================================================
    // Direct path
    // =========================================================================

    pub fn request_model_direct(&mut self, name: &str) -> Result<ModelRequest, AssetError> {
        self.request_model_direct_with(name, CancelToken::new())
    }

    /// Load through the [`SceneLoader`] on a dedicated thread (synchronously
    /// where threads are unavailable). Not subject to the in-flight slot.
    pub fn request_model_direct_with(
        &mut self,
        name: &str,
        token: CancelToken,
    ) -> Result<ModelRequest, AssetError> {
        let url = self.url_for(name)?;
        let id = self.next_request_id();
        let (resolver, request) = request_pair(id, name, token);
        info!(id, asset = name, "direct load requested");

        let loader = Arc::clone(&self.loader);

        #[cfg(not(target_arch = "wasm32"))]
        std::thread::Builder::new()
            .name(format!("direct-load-{}", id))
            .spawn(move || load_direct(loader.as_ref(), resolver, &url))
            .map_err(|e| AssetError::DecodeFailure(format!("could not start loader thread: {}", e)))?;

        #[cfg(target_arch = "wasm32")]
        load_direct(loader.as_ref(), resolver, &url);

        Ok(request)
    }
}

fn load_direct(loader: &dyn SceneLoader, resolver: Resolver, url: &str) {
    if resolver.is_cancelled() {
        resolver.resolve(Err(AssetError::Cancelled));
        return;
    }
    let result = loader.load(url);
    if resolver.is_cancelled() {
        info!(id = resolver.id, "direct load cancelled, result discarded");
        resolver.resolve(Err(AssetError::Cancelled));
        return;
    }
    match &result {
        Ok(group) => info!(id = resolver.id, asset = %resolver.name, meshes = group.mesh_count(), "direct load resolved"),
        Err(e) => warn!(id = resolver.id, asset = %resolver.name, "direct load rejected: {}", e),
    }
    resolver.resolve(result);
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        self.fail_pending(AssetError::WorkerUnavailable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetEntry;
    use crate::error::ErrorKind;
    use crate::geometry::{TypedArray, POSITION};
    use crate::protocol::{RasterImage, ShallowAttribute, ShallowGeometry, TextureDescriptor};
    use crate::asset::RegistryManifest;
    use crate::scene::{Group, Shading};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Instant;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn shard() -> ShallowGeometry {
        let mut shallow = ShallowGeometry::default();
        shallow.attributes.insert(
            POSITION.into(),
            ShallowAttribute::new(TypedArray::Float32(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]), 3),
        );
        shallow.index = Some(ShallowAttribute::new(TypedArray::Uint32(vec![0, 1, 2]), 1));
        shallow
    }

    fn decoded(count: usize) -> WorkerResponse {
        WorkerResponse::Decoded {
            geometries: vec![shard(); count],
            texture: TextureDescriptor::new(RasterImage {
                width: 1,
                height: 1,
                pixels: vec![200, 180, 160, 255],
            }),
        }
    }

    fn no_loader(_url: &str) -> Result<Group, AssetError> {
        Err(AssetError::DecodeFailure("direct path not used".into()))
    }

    /// Worker that reports each url it receives, then waits for the gate
    fn gated(seen: Sender<String>, gate: Receiver<()>) -> impl Decoder {
        move |url: &str| {
            let _ = seen.send(url.to_string());
            let _ = gate.recv();
            decoded(3)
        }
    }

    fn pipeline_with(decoder: impl Decoder) -> AssetPipeline {
        AssetPipeline::new(AssetRegistry::builtin(), no_loader).with_worker(decoder)
    }

    fn poll_until_done(pipeline: &mut AssetPipeline, requests: &mut Vec<ModelRequest>) -> Vec<RequestId> {
        let deadline = Instant::now() + TIMEOUT;
        let mut order = Vec::new();
        while !requests.is_empty() && Instant::now() < deadline {
            pipeline.poll();
            requests.retain_mut(|r| {
                if r.is_complete() {
                    order.push(r.id());
                    false
                } else {
                    true
                }
            });
            std::thread::sleep(Duration::from_millis(1));
        }
        order
    }

    #[test]
    fn test_seated_cupid_end_to_end() {
        let (seen_tx, seen_rx) = unbounded();
        let mut pipeline = pipeline_with(move |url: &str| {
            let _ = seen_tx.send(url.to_string());
            decoded(3)
        });

        let request = pipeline.request_model("seatedCupid").unwrap();
        assert_eq!(
            seen_rx.recv_timeout(TIMEOUT).unwrap(),
            "puzzles/seated-cupid/seated-cupid.glb"
        );

        let group = pipeline.wait(request).unwrap();
        assert_eq!(group.mesh_count(), 3);
        assert_eq!(group.material_count(), 1);
        assert_eq!(group.meshes()[0].material.shading, Shading::Unlit);
        assert_eq!(pipeline.in_flight(), None);
    }

    #[test]
    fn test_malformed_response_is_transfer_error() {
        let mut pipeline = pipeline_with(|_: &str| {
            let mut bad = ShallowGeometry::default();
            bad.attributes.insert(
                POSITION.into(),
                ShallowAttribute::new(TypedArray::Float32(vec![1.0, 2.0, 3.0]), 4),
            );
            WorkerResponse::Decoded {
                geometries: vec![bad],
                texture: TextureDescriptor::new(RasterImage {
                    width: 1,
                    height: 1,
                    pixels: vec![0; 4],
                }),
            }
        });

        let request = pipeline.request_model("seatedCupid").unwrap();
        let err = pipeline.wait(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferError);
        assert!(err.to_string().contains("not a multiple of item size 4"));
    }

    #[test]
    fn test_worker_error_is_decode_failure() {
        let mut pipeline = pipeline_with(|_: &str| WorkerResponse::failed("unexpected end of file"));
        let request = pipeline.request_model("hydriaVase").unwrap();
        assert_eq!(
            pipeline.wait(request).unwrap_err(),
            AssetError::DecodeFailure("unexpected end of file".into())
        );
    }

    #[test]
    fn test_unknown_asset_posts_nothing() {
        let (seen_tx, seen_rx) = unbounded();
        let mut pipeline = pipeline_with(move |url: &str| {
            let _ = seen_tx.send(url.to_string());
            decoded(1)
        });

        let err = pipeline.request_model("doesNotExist").unwrap_err();
        assert_eq!(err, AssetError::UnknownAsset("doesNotExist".into()));
        assert_eq!(pipeline.in_flight(), None);
        assert_eq!(pipeline.queued(), 0);
        assert!(seen_rx.recv_timeout(Duration::from_millis(50)).is_err());

        assert_eq!(
            pipeline.request_model_direct("doesNotExist").unwrap_err().kind(),
            ErrorKind::UnknownAsset
        );
    }

    #[test]
    fn test_single_in_flight_fifo() {
        let (seen_tx, seen_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let mut pipeline = pipeline_with(gated(seen_tx, gate_rx));

        let first = pipeline.request_model("seatedCupid").unwrap();
        let second = pipeline.request_model("hydriaVase").unwrap();
        let third = pipeline.request_model("nTomoMask").unwrap();
        let ids = [first.id(), second.id(), third.id()];

        assert_eq!(pipeline.in_flight(), Some(ids[0]));
        assert_eq!(pipeline.queued_ids(), vec![ids[1], ids[2]]);
        assert_eq!(seen_rx.recv_timeout(TIMEOUT).unwrap(), "puzzles/seated-cupid/seated-cupid.glb");
        // Nothing else reaches the worker while the first decode is held
        assert!(seen_rx.recv_timeout(Duration::from_millis(50)).is_err());

        // Release one decode at a time; only the head of the queue moves
        let mut requests = vec![first, second, third];
        for step in 0..requests.len() {
            gate_tx.send(()).unwrap();
            let deadline = Instant::now() + TIMEOUT;
            while !requests[step].is_complete() && Instant::now() < deadline {
                pipeline.poll();
                std::thread::sleep(Duration::from_millis(1));
            }
            assert!(requests[step].result().unwrap().is_ok());
            for later in &mut requests[step + 1..] {
                assert!(!later.is_complete());
            }
            assert_eq!(pipeline.in_flight(), ids.get(step + 1).copied());
        }

        let urls: Vec<_> = seen_rx.try_iter().collect();
        assert_eq!(
            urls,
            vec![
                "puzzles/hydria-vase/hydria-vase.glb".to_string(),
                "puzzles/n-tomo-mask/n-tomo-mask.glb".to_string(),
            ]
        );
        assert_eq!(pipeline.in_flight(), None);
    }

    #[test]
    fn test_each_request_resolves_once() {
        let mut pipeline = pipeline_with(|_: &str| decoded(1));
        let mut requests: Vec<_> = ["seatedCupid", "hydriaVase", "seatedCupid"]
            .iter()
            .map(|name| pipeline.request_model(name).unwrap())
            .collect();

        let order = poll_until_done(&mut pipeline, &mut requests);
        assert_eq!(order.len(), 3);
        // Extra polls find nothing left to resolve
        assert_eq!(pipeline.poll(), 0);
    }

    #[test]
    fn test_cancelled_queued_request_is_never_posted() {
        let (seen_tx, seen_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let mut pipeline = pipeline_with(gated(seen_tx, gate_rx));

        let first = pipeline.request_model("seatedCupid").unwrap();
        let second = pipeline.request_model("hydriaVase").unwrap();
        second.cancel();
        assert_eq!(pipeline.poll(), 1);
        assert_eq!(pipeline.queued(), 0);

        gate_tx.send(()).unwrap();
        assert!(pipeline.wait(first).is_ok());
        assert_eq!(pipeline.wait(second).unwrap_err(), AssetError::Cancelled);

        let urls: Vec<_> = seen_rx.try_iter().collect();
        assert_eq!(urls, vec!["puzzles/seated-cupid/seated-cupid.glb".to_string()]);
    }

    #[test]
    fn test_cancelled_in_flight_response_is_discarded() {
        let (seen_tx, _seen_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let mut pipeline = pipeline_with(gated(seen_tx, gate_rx));

        let token = CancelToken::new();
        let first = pipeline.request_model_with("seatedCupid", token.clone()).unwrap();
        let second = pipeline.request_model("hydriaVase").unwrap();
        token.cancel();

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        assert_eq!(pipeline.wait(first).unwrap_err().kind(), ErrorKind::Cancelled);
        // The queue moves on
        assert_eq!(pipeline.wait(second).unwrap().mesh_count(), 3);
    }

    #[test]
    fn test_pre_cancelled_token() {
        let mut pipeline = pipeline_with(|_: &str| decoded(1));
        let token = CancelToken::new();
        token.cancel();
        let request = pipeline.request_model_with("seatedCupid", token).unwrap();
        assert_eq!(pipeline.in_flight(), None);
        assert_eq!(pipeline.wait(request).unwrap_err(), AssetError::Cancelled);
    }

    #[test]
    fn test_no_worker() {
        let mut pipeline = AssetPipeline::new(AssetRegistry::builtin(), |_: &str| -> Result<Group, AssetError> { Ok(Group::new()) });
        assert!(!pipeline.has_worker());
        assert_eq!(
            pipeline.request_model("seatedCupid").unwrap_err(),
            AssetError::WorkerUnavailable
        );
        // Unknown names are still reported first
        assert_eq!(
            pipeline.request_model("doesNotExist").unwrap_err().kind(),
            ErrorKind::UnknownAsset
        );
        // The direct path is the fallback
        let request = pipeline.request_model_direct("seatedCupid").unwrap();
        assert!(pipeline.wait(request).is_ok());
    }

    #[test]
    fn test_direct_path_ignores_slot() {
        let (gate_tx, gate_rx) = unbounded();
        let (seen_tx, _) = unbounded();
        let mut pipeline = AssetPipeline::new(AssetRegistry::builtin(), |url: &str| -> Result<Group, AssetError> {
            let mut group = Group::new();
            group.name = Some(url.to_string());
            Ok(group)
        })
        .with_worker(gated(seen_tx, gate_rx));

        let held = pipeline.request_model("seatedCupid").unwrap();
        let museum = pipeline.request_model_direct("museum").unwrap();
        let vase = pipeline.request_model_direct("hydriaVase").unwrap();

        let museum = pipeline.wait(museum).unwrap();
        let vase = pipeline.wait(vase).unwrap();
        assert_eq!(museum.name.as_deref(), Some("museum.glb"));
        assert_eq!(vase.name.as_deref(), Some("puzzles/hydria-vase/hydria-vase.glb"));
        assert_eq!(pipeline.in_flight(), Some(held.id()));

        gate_tx.send(()).unwrap();
        assert!(pipeline.wait(held).is_ok());
    }

    #[test]
    fn test_direct_cancel() {
        let mut pipeline = AssetPipeline::new(AssetRegistry::builtin(), |_: &str| -> Result<Group, AssetError> { Ok(Group::new()) });
        let token = CancelToken::new();
        token.cancel();
        let request = pipeline.request_model_direct_with("museum", token).unwrap();
        assert_eq!(pipeline.wait(request).unwrap_err(), AssetError::Cancelled);
    }

    #[test]
    fn test_gltf_end_to_end() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cupid.glb"), fixtures::triangle_glb(3, true)).unwrap();

        let mut registry = AssetRegistry::new();
        registry.add(AssetEntry::new("seatedCupid", "cupid.glb")).unwrap();
        let storage = Storage::with_root(dir.path());
        let mut pipeline = AssetPipeline::new(registry, GltfSceneLoader::new(storage.clone()))
            .with_worker(GltfDecoder::new(storage));

        let request = pipeline.request_model("seatedCupid").unwrap();
        let group = pipeline.wait(request).unwrap();
        assert_eq!(group.mesh_count(), 3);
        assert_eq!(group.material_count(), 1);
        let map = group.meshes()[0].material.map.clone().unwrap();
        assert_eq!((map.width(), map.height()), (2, 2));

        let request = pipeline.request_model_direct("seatedCupid").unwrap();
        let direct = pipeline.wait(request).unwrap();
        assert_eq!(direct.mesh_count(), 3);
        assert_eq!(direct.meshes()[0].material.shading, Shading::Standard);
    }

    #[test]
    fn test_from_config_without_worker() {
        let config = PipelineConfig {
            use_worker: false,
            ..PipelineConfig::default()
        };
        let mut pipeline = AssetPipeline::from_config(&config).unwrap();
        assert!(!pipeline.has_worker());
        assert_eq!(pipeline.registry().len(), 12);
        assert_eq!(
            pipeline.request_model("museum").unwrap_err().kind(),
            ErrorKind::WorkerUnavailable
        );
    }

    #[test]
    fn test_dropping_pipeline_rejects_pending() {
        let (seen_tx, seen_rx) = unbounded();
        let (_gate_tx, gate_rx) = unbounded();
        let mut pipeline = pipeline_with(gated(seen_tx, gate_rx));

        let mut held = pipeline.request_model("seatedCupid").unwrap();
        let mut queued = pipeline.request_model("hydriaVase").unwrap();
        seen_rx.recv_timeout(TIMEOUT).unwrap();
        drop(pipeline);

        for request in [&mut held, &mut queued] {
            assert!(request.wait_timeout(TIMEOUT));
            assert_eq!(
                request.result().unwrap().as_ref().unwrap_err().kind(),
                ErrorKind::WorkerUnavailable
            );
        }
    }

    #[test]
    fn test_dead_worker_rejects_pending() {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded::<WorkerMessage>();
        let mut pipeline = AssetPipeline::new(AssetRegistry::builtin(), no_loader);
        pipeline.worker = Some(DecodeWorker::from_channels(request_tx, response_rx));

        let mut first = pipeline.request_model("seatedCupid").unwrap();
        let mut second = pipeline.request_model("hydriaVase").unwrap();
        assert_eq!(request_rx.recv_timeout(TIMEOUT).unwrap().url, "puzzles/seated-cupid/seated-cupid.glb");

        // The worker thread goes away mid-decode
        drop(response_tx);
        drop(request_rx);

        assert_eq!(pipeline.poll(), 2);
        assert!(first.is_complete() && second.is_complete());
        assert_eq!(first.take().unwrap().unwrap_err(), AssetError::WorkerUnavailable);
        assert_eq!(second.take().unwrap().unwrap_err(), AssetError::WorkerUnavailable);
        assert!(!pipeline.has_worker());
        assert_eq!(pipeline.in_flight(), None);
        assert_eq!(
            pipeline.request_model("nTomoMask").unwrap_err(),
            AssetError::WorkerUnavailable
        );
    }

    #[test]
    fn test_from_config_checks_metadata() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("puzzles/seated-cupid")).unwrap();
        std::fs::write(
            root.join("puzzles/seated-cupid/info.json"),
            r#"{ "piecesNumber": 5, "fileName": "seatedCupid", "artName": "Seated Cupid" }"#,
        )
        .unwrap();

        let manifest = RegistryManifest {
            entries: vec![AssetEntry::puzzle("seatedCupid", "seated-cupid")],
        };
        let registry = AssetRegistry::from_manifest(manifest).unwrap();
        let manifest_path = root.join("registry.ron");
        std::fs::write(&manifest_path, registry.to_manifest_string().unwrap()).unwrap();

        let config = PipelineConfig {
            asset_root: root.to_path_buf(),
            registry: Some(manifest_path),
            use_worker: false,
            ..PipelineConfig::default()
        };
        let pipeline = AssetPipeline::from_config(&config).unwrap();

        assert_eq!(pipeline.registry().info("seatedCupid").unwrap().pieces_number, Some(5));
        let problems = pipeline.metadata_problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].name, "seatedCupid");
        assert_eq!(problems[0].missing, vec!["artAuthor", "modelAuthor", "tags", "description"]);
    }
}
