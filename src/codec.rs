//! Text encodings for everything that crosses the wire: base64 PNG rasters
//! and the request/response JSON envelopes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::{NodeError, Result};
use crate::types::{GenerationInfo, GenerationRequest, GenerationResponse};

/// Encode a raster as a base64 PNG string.
pub fn encode_image(image: &RgbaImage) -> Result<String> {
    if image.width() == 0 || image.height() == 0 {
        return Err(NodeError::InvalidImage(format!(
            "cannot encode a {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(STANDARD.encode(bytes))
}

/// Decode a base64 PNG/JPEG into a raster.
///
/// `width`/`height` are the size the caller expects. The decoded raster keeps
/// its own dimensions; a mismatch is only logged.
pub fn decode_image(data: &str, width: u32, height: u32) -> Result<RgbaImage> {
    let bytes = STANDARD.decode(strip_data_uri(data))?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    if image.width() != width || image.height() != height {
        log::debug!(
            "Decoded image is {}x{}, expected {}x{}",
            image.width(),
            image.height(),
            width,
            height
        );
    }
    Ok(image)
}

/// Serialize a request to its JSON body.
pub fn encode_request(request: &GenerationRequest) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

/// Parse a request JSON body.
pub fn decode_request(json: &str) -> Result<GenerationRequest> {
    Ok(serde_json::from_str(json)?)
}

/// Parse the img2img response body.
pub fn decode_response(json: &str) -> Result<GenerationResponse> {
    Ok(serde_json::from_str(json)?)
}

/// Parse the JSON string carried in [`GenerationResponse::info`].
pub fn decode_info(json: &str) -> Result<GenerationInfo> {
    Ok(serde_json::from_str(json)?)
}

// Some servers prefix payloads with `data:image/png;base64,`
fn strip_data_uri(data: &str) -> &str {
    let data = data.trim();
    match data.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, b64)| b64).unwrap_or(rest),
        None => data,
    }
}
