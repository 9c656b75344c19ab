use crate::config::ServerConfig;
use crate::events::NodeEvent;
use crate::ports::{InputBindings, NodeInputs, OutputStore, PortValue};
use crate::seed::{SeedResetPolicy, SeedSource, SeedState};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Img2ImgSettings, ViewSize};
use crate::workflow::{CancelHandle, ExecutionOutcome, GenerationWorkflow, WorkflowState};

/// Image-to-image graph node.
///
/// Each call to [`execute`](Self::execute) snapshots the bound inputs, runs
/// one generation against the configured server, and on success publishes
/// the result on the `Out Image` and `Seed` output ports.
///
/// # Example
/// ```no_run
/// use sd_img2img_node::{Img2ImgNode, InputBindings, InputPort, PortValue, Prompt, ServerConfig, ViewSize};
/// use image::RgbaImage;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let mut node = Img2ImgNode::new(ServerConfig::new("http://127.0.0.1:7860"));
///
/// let bindings = InputBindings::new()
///     .with(InputPort::InImage, PortValue::Image(Arc::new(RgbaImage::new(512, 512))))
///     .with(InputPort::Prompt, PortValue::Prompt(Prompt::new("oil painting of a harbor")));
///
/// let outcome = node.execute(&bindings, ViewSize::new(512, 512)).await;
/// if outcome.is_completed() {
///     let image = node.request_value("Out Image");
///     let seed = node.request_value("Seed");
/// }
/// # }
/// ```
pub struct Img2ImgNode<T: Transport = HttpTransport> {
    /// Values used for ports the host has not bound.
    pub inputs: NodeInputs,
    pub settings: Img2ImgSettings,
    seed: SeedState,
    outputs: OutputStore,
    workflow: GenerationWorkflow<T>,
}

impl Img2ImgNode<HttpTransport> {
    /// Create a node talking HTTP to the configured server.
    pub fn new(config: ServerConfig) -> Self {
        let transport = HttpTransport::new(config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Img2ImgNode<T> {
    /// Create a node with a custom transport.
    pub fn with_transport(config: ServerConfig, transport: T) -> Self {
        Self {
            inputs: NodeInputs::default(),
            settings: Img2ImgSettings::default(),
            seed: SeedState::default(),
            outputs: OutputStore::default(),
            workflow: GenerationWorkflow::new(config, transport),
        }
    }

    /// Replace the source of freshly drawn seeds.
    pub fn with_seed_source(mut self, source: impl SeedSource + 'static) -> Self {
        self.workflow.set_seed_source(Box::new(source));
        self
    }

    /// Choose what happens to a pinned seed after a generation.
    pub fn with_seed_policy(mut self, policy: SeedResetPolicy) -> Self {
        self.workflow.set_seed_policy(policy);
        self
    }

    /// Set the starting seed.
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed.set(seed);
        self
    }

    /// Register an observer for state changes, seed updates and progress resets.
    pub fn on_event<F>(&mut self, listener: F)
    where
        F: Fn(&NodeEvent) + Send + Sync + 'static,
    {
        self.workflow.add_listener(Box::new(listener));
    }

    /// The node's local seed field.
    pub fn seed(&self) -> i64 {
        self.seed.value()
    }

    pub fn set_seed(&mut self, seed: i64) {
        self.seed.set(seed);
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    /// Read an output port by name. Unknown names yield `None`.
    pub fn request_value(&self, port_name: &str) -> Option<PortValue> {
        self.outputs.request_value(port_name)
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state()
    }

    pub fn is_in_flight(&self) -> bool {
        self.workflow.is_in_flight()
    }

    /// Handle for cancelling an in-flight generation from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.workflow.cancel_handle()
    }

    pub fn config(&self) -> &ServerConfig {
        self.workflow.config()
    }

    pub fn transport(&self) -> &T {
        self.workflow.transport()
    }

    /// Execute the node once.
    ///
    /// `view` is the size of the surface the result is rendered to; it sets
    /// the requested width and height. Never fails: problems are logged and
    /// reported through the returned outcome, leaving the outputs untouched.
    pub async fn execute(&mut self, bindings: &InputBindings, view: ViewSize) -> ExecutionOutcome {
        let snapshot = self.inputs.pull(bindings);
        log::debug!("img2img output size {}x{}", view.width, view.height);

        self.workflow
            .run(
                &snapshot,
                &self.settings,
                view,
                &mut self.seed,
                &mut self.outputs,
            )
            .await
    }
}
