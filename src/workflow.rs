use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::codec;
use crate::config::ServerConfig;
use crate::error::{NodeError, Result};
use crate::events::{EventListener, NodeEvent};
use crate::ports::{NodeInputs, OutputStore};
use crate::request::RequestBuilder;
use crate::seed::{CryptoSeedSource, SeedResetPolicy, SeedSource, SeedState};
use crate::transport::{PendingResponse, Transport};
use crate::types::{Img2ImgSettings, ViewSize};

/// Lifecycle of one generation:
/// `Idle -> Preparing -> Submitted -> AwaitingCompletion -> Decoding -> Done`,
/// with `Aborted` reachable from every non-idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowState {
    Idle,
    Preparing,
    Submitted,
    AwaitingCompletion,
    Decoding,
    Done,
    Aborted,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Aborted)
    }
}

/// Why a generation ended in [`WorkflowState::Aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Inputs could not be turned into a request. Nothing was sent.
    RequestConstruction,
    /// The request could not be sent, or the connection failed.
    Transport,
    /// The server answered with no images or an unreadable payload.
    Protocol,
    /// Cancelled through a [`CancelHandle`].
    Cancelled,
}

/// Result of one node execution. Failures are contained here, never raised.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The output image was updated. `output_seed` is the server-reported seed,
    /// if the info payload carried one.
    Completed { output_seed: Option<i64> },
    /// Nothing was written to the outputs.
    Aborted { reason: AbortReason, error: String },
    /// No source image bound; the workflow did not start.
    NoSourceImage,
    /// A generation is already in flight on this node.
    Busy,
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }
}

/// Cancels an in-flight generation from outside the executing task,
/// e.g. when the owning graph is torn down.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancel: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation. Takes effect at the next poll tick; a no-op when idle.
    pub fn cancel(&self) {
        if self.in_flight.load(Ordering::Acquire) {
            self.cancel.store(true, Ordering::Release);
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Holds the in-flight flag for the lifetime of one run, including when the
/// run's future is dropped midway.
///
/// `run` takes `&mut self`, so one workflow value cannot be driven twice at
/// once. The flag is what [`CancelHandle`] observes from other tasks; the
/// `Busy` rejection only fires if the flag is still set when a run starts.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one img2img round-trip: build and submit the request, poll until the
/// response arrives, decode it into the node's outputs.
///
/// The wait is cooperative: between checks the workflow sleeps for
/// `poll_interval`, handing control back to the runtime.
pub struct GenerationWorkflow<T: Transport> {
    config: ServerConfig,
    transport: T,
    seed_source: Box<dyn SeedSource>,
    seed_policy: SeedResetPolicy,
    state: WorkflowState,
    in_flight: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    listeners: Vec<EventListener>,
}

impl<T: Transport> GenerationWorkflow<T> {
    pub fn new(config: ServerConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            seed_source: Box::new(CryptoSeedSource),
            seed_policy: SeedResetPolicy::default(),
            state: WorkflowState::Idle,
            in_flight: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            listeners: Vec::new(),
        }
    }

    pub fn set_seed_source(&mut self, source: Box<dyn SeedSource>) {
        self.seed_source = source;
    }

    pub fn set_seed_policy(&mut self, policy: SeedResetPolicy) {
        self.seed_policy = policy;
    }

    pub fn seed_policy(&self) -> SeedResetPolicy {
        self.seed_policy
    }

    pub fn add_listener(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancel: Arc::clone(&self.cancel),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Run one generation to `Done` or `Aborted`.
    ///
    /// `seed` is resolved before the request and reset per the seed policy
    /// once the server reports the seed it used. `outputs` is written only
    /// on success.
    pub async fn run(
        &mut self,
        inputs: &NodeInputs,
        settings: &Img2ImgSettings,
        view: ViewSize,
        seed: &mut SeedState,
        outputs: &mut OutputStore,
    ) -> ExecutionOutcome {
        if inputs.source_image.is_none() {
            log::debug!("No source image bound, skipping img2img generation");
            return ExecutionOutcome::NoSourceImage;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            log::warn!("img2img generation already in flight, ignoring execution");
            return ExecutionOutcome::Busy;
        };
        self.cancel.store(false, Ordering::Release);

        self.transition(WorkflowState::Preparing);
        let body = match RequestBuilder::new(inputs, settings, view)
            .build(seed, self.seed_source.as_ref())
            .and_then(|request| codec::encode_request(&request))
        {
            Ok(body) => body,
            Err(e) => return self.abort(AbortReason::RequestConstruction, e),
        };

        if self.is_cancelled() {
            return self.abort(AbortReason::Cancelled, NodeError::Cancelled);
        }

        let url = self.config.img2img_url();
        log::info!("Submitting img2img request to {} (seed {})", url, seed.value());
        let mut pending = match self.transport.submit(&url, body, self.config.auth_header()) {
            Ok(pending) => pending,
            Err(e) => return self.abort(AbortReason::Transport, e),
        };
        self.transition(WorkflowState::Submitted);

        let response = match self.await_completion(&mut pending).await {
            Ok(response) => response,
            Err(NodeError::Cancelled) => {
                return self.abort(AbortReason::Cancelled, NodeError::Cancelled)
            }
            Err(e) => return self.abort(AbortReason::Transport, e),
        };

        self.transition(WorkflowState::Decoding);
        match self.decode(&response, view, seed, outputs) {
            Ok(output_seed) => {
                self.transition(WorkflowState::Done);
                log::info!("img2img generation complete");
                ExecutionOutcome::Completed { output_seed }
            }
            Err(e) => self.abort(AbortReason::Protocol, e),
        }
    }

    async fn await_completion(&mut self, pending: &mut PendingResponse) -> Result<String> {
        let mut ticks = 0u32;
        while !pending.is_finished() {
            log::debug!("img2img response pending (poll {})", ticks);
            ticks += 1;
            if self.is_cancelled() {
                pending.abort();
                return Err(NodeError::Cancelled);
            }
            if self.state != WorkflowState::AwaitingCompletion {
                self.transition(WorkflowState::AwaitingCompletion);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        pending.wait().await
    }

    fn decode(
        &self,
        body: &str,
        view: ViewSize,
        seed: &mut SeedState,
        outputs: &mut OutputStore,
    ) -> Result<Option<i64>> {
        let response = codec::decode_response(body)?;
        let first = response.images.first().ok_or(NodeError::NoImages)?;
        let image = codec::decode_image(first, view.width, view.height)?;

        let reported = self.read_reported_seed(&response.info);
        outputs.commit(image, reported);

        if let Some(output_seed) = reported {
            seed.after_generation(self.seed_policy);
            self.emit(NodeEvent::SeedUpdated {
                seed: seed.value(),
                output_seed,
            });
        }
        Ok(reported)
    }

    // Info problems never fail the generation; the image is kept regardless.
    fn read_reported_seed(&self, info: &str) -> Option<i64> {
        if info.is_empty() {
            return None;
        }
        match codec::decode_info(info) {
            Ok(info) => Some(info.seed),
            Err(e) => {
                log::warn!("Could not read generation info, seed not updated: {}", e);
                None
            }
        }
    }

    fn abort(&mut self, reason: AbortReason, error: NodeError) -> ExecutionOutcome {
        match reason {
            AbortReason::RequestConstruction => {
                log::error!("Failed to prepare img2img request: {}", error);
            }
            AbortReason::Transport => {
                log::error!("img2img request failed: {}", error);
            }
            AbortReason::Protocol => {
                if matches!(error, NodeError::NoImages) {
                    log::error!(
                        "No image was returned by the server. Verify that the server is correctly set up."
                    );
                } else {
                    log::error!("Unreadable img2img response: {}", error);
                }
                self.emit(NodeEvent::ProgressCleared);
            }
            AbortReason::Cancelled => {
                log::info!("img2img generation cancelled");
                self.emit(NodeEvent::ProgressCleared);
            }
        }
        self.transition(WorkflowState::Aborted);
        ExecutionOutcome::Aborted {
            reason,
            error: error.to_string(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn transition(&mut self, to: WorkflowState) {
        let from = self.state;
        self.state = to;
        log::debug!("img2img workflow: {:?} -> {:?}", from, to);
        self.emit(NodeEvent::StateChanged { from, to });
    }

    fn emit(&self, event: NodeEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }
}
