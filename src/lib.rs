//! # sd-img2img-node
//!
//! An image-to-image node for visual dataflow graphs, backed by a
//! Stable Diffusion server's `img2img` endpoint (AUTOMATIC1111-compatible).
//!
//! One execution of the node performs a single round-trip: the bound inputs
//! (source image, optional mask, prompt, steps, CFG, denoising strength) are
//! snapshotted, serialized into a JSON request with base64 PNG images, and
//! POSTed to the server. While the request is outstanding the node yields to
//! the runtime between polls instead of blocking. The first returned image
//! and the seed the server reports are then published on the node's output
//! ports.
//!
//! Failures never propagate to the host graph. Each execution returns an
//! [`ExecutionOutcome`] and the outputs are only written on success.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sd_img2img_node::{
//!     ExecutionOutcome, Img2ImgNode, InputBindings, InputPort, PortValue, Prompt,
//!     ServerConfig, ViewSize,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("http://127.0.0.1:7860").with_auth("user", "secret");
//!     let mut node = Img2ImgNode::new(config);
//!     node.on_event(|event| println!("{:?}", event));
//!
//!     let source = image::open("sketch.png")?.to_rgba8();
//!     let bindings = InputBindings::new()
//!         .with(InputPort::InImage, PortValue::Image(Arc::new(source)))
//!         .with(
//!             InputPort::Prompt,
//!             PortValue::Prompt(Prompt::new("watercolor landscape").negative("blurry")),
//!         )
//!         .with(InputPort::DenoiseStrength, PortValue::Float(0.6));
//!
//!     match node.execute(&bindings, ViewSize::new(768, 512)).await {
//!         ExecutionOutcome::Completed { output_seed } => {
//!             println!("Seed used: {:?}", output_seed);
//!             if let Some(image) = node.outputs().image() {
//!                 image.save("result.png")?;
//!             }
//!         }
//!         other => println!("No new output: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Seeds
//!
//! The node's seed defaults to `-1` (let the server pick). After a generation
//! the server-reported seed appears on the `Seed` output. A seed of `0` is
//! drawn locally before each request and reset to `0` afterwards, so every run
//! re-randomizes. Any other seed, `-1` included, is kept across runs unless
//! [`SeedResetPolicy::ResetAlways`] is selected.

pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod ports;
pub mod request;
pub mod seed;
pub mod transport;
pub mod types;
pub mod workflow;

pub use config::ServerConfig;
pub use error::{NodeError, Result};
pub use events::{EventListener, NodeEvent};
pub use node::Img2ImgNode;
pub use ports::{InputBindings, InputPort, NodeInputs, OutputPort, OutputStore, PortValue};
pub use request::{opaque_mask, RequestBuilder};
pub use seed::{
    CryptoSeedSource, SeedResetPolicy, SeedSource, SeedState, SERVER_RANDOM_SEED, UNSET_SEED,
};
pub use transport::{HttpTransport, PendingResponse, Transport};
pub use types::{
    ControlNetData, GenerationInfo, GenerationRequest, GenerationResponse, Img2ImgSettings,
    InpaintSettings, Prompt, ViewSize,
};
pub use workflow::{AbortReason, CancelHandle, ExecutionOutcome, GenerationWorkflow, WorkflowState};
