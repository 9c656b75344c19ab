use thiserror::Error;

/// Errors produced while preparing, sending, or decoding an img2img generation.
///
/// None of these escape [`Img2ImgNode::execute`](crate::Img2ImgNode::execute);
/// the workflow logs them and reports an [`ExecutionOutcome`](crate::ExecutionOutcome).
#[derive(Error, Debug)]
pub enum NodeError {
    /// The node executed without a bound source image.
    #[error("No source image is bound to the node")]
    MissingSourceImage,

    /// A raster could not be used (e.g. zero width or height).
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// PNG/JPEG encode or decode failure.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// A payload was not valid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured server URL could not be parsed.
    #[error("Invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The server returned a non-success HTTP status.
    #[error("Server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The server answered but sent back no images.
    #[error("No image was returned by the server")]
    NoImages,

    /// The background request task panicked or was aborted.
    #[error("Request task failed: {0}")]
    Task(String),

    /// The generation was cancelled before it completed.
    #[error("Generation was cancelled")]
    Cancelled,
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, NodeError>;
