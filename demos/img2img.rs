//! Run one img2img generation on a local image.
//!
//! Requires a Stable Diffusion WebUI started with `--api`, by default at
//! http://127.0.0.1:7860. Server settings are read from `SD_*` environment
//! variables (`SD_SERVER_URL`, `SD_USE_AUTH`, `SD_USERNAME`, `SD_PASSWORD`).
//!
//! ```sh
//! cargo run --example img2img -- input.png "a watercolor harbor at dusk" [output.png]
//! ```

use sd_img2img_node::{
    ExecutionOutcome, Img2ImgNode, InputBindings, InputPort, NodeEvent, PortValue, Prompt,
    ServerConfig, ViewSize, UNSET_SEED,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(input), Some(prompt)) = (args.next(), args.next()) else {
        eprintln!("Usage: img2img <input image> <prompt> [output.png]");
        return Ok(());
    };
    let output = args.next().unwrap_or_else(|| "img2img_result.png".to_string());

    let config = ServerConfig::from_env();
    println!("Server: {}", config.img2img_url());

    let source = image::open(&input)?.to_rgba8();
    let (width, height) = source.dimensions();
    println!("Source: {} ({}x{})", input, width, height);

    let mut node = Img2ImgNode::new(config).with_seed(UNSET_SEED);
    node.on_event(|event| match event {
        NodeEvent::StateChanged { to, .. } => println!("  -> {:?}", to),
        NodeEvent::SeedUpdated { output_seed, .. } => println!("Server used seed {}", output_seed),
        NodeEvent::ProgressCleared => {}
    });

    let bindings = InputBindings::new()
        .with(InputPort::InImage, PortValue::Image(Arc::new(source)))
        .with(
            InputPort::Prompt,
            PortValue::Prompt(Prompt::new(prompt).negative("lowres, blurry, watermark")),
        )
        .with(InputPort::Step, PortValue::Int(25))
        .with(InputPort::DenoiseStrength, PortValue::Float(0.55));

    match node.execute(&bindings, ViewSize::new(width, height)).await {
        ExecutionOutcome::Completed { .. } => {
            if let Some(image) = node.outputs().image() {
                image.save(&output)?;
                println!("Saved: {}", output);
            }
        }
        ExecutionOutcome::Aborted { reason, error } => {
            eprintln!("Generation aborted ({:?}): {}", reason, error)
        }
        ExecutionOutcome::NoSourceImage => eprintln!("No source image bound"),
        ExecutionOutcome::Busy => eprintln!("A generation is already running"),
    }

    Ok(())
}
