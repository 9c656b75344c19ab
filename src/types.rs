use serde::{Deserialize, Deserializer, Serialize};

/// Positive/negative prompt pair fed into the node's `Prompt` port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub positive: String,
    pub negative: String,
}

impl Prompt {
    pub fn new(positive: impl Into<String>) -> Self {
        Self {
            positive: positive.into(),
            negative: String::new(),
        }
    }

    /// Set the negative prompt.
    pub fn negative(mut self, negative: impl Into<String>) -> Self {
        self.negative = negative.into();
        self
    }
}

/// Auxiliary ControlNet conditioning. Carried through the node untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlNetData(pub serde_json::Value);

/// Output surface size the generation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSize {
    pub width: u32,
    pub height: u32,
}

impl ViewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ViewSize {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

/// Inpainting controls sent with every img2img request.
#[derive(Debug, Clone, PartialEq)]
pub struct InpaintSettings {
    /// Masked content fill mode (0 = fill, 1 = original, 2 = latent noise, 3 = latent nothing).
    pub fill: i32,
    pub full_res: bool,
    pub full_res_padding: i32,
    /// 1 inverts the mask.
    pub mask_invert: i32,
    pub mask_blur: i32,
}

impl Default for InpaintSettings {
    fn default() -> Self {
        Self {
            fill: 0,
            full_res: true,
            full_res_padding: 32,
            mask_invert: 0,
            mask_blur: 0,
        }
    }
}

/// Node configuration that is not exposed as a port.
#[derive(Debug, Clone, PartialEq)]
pub struct Img2ImgSettings {
    /// Sampler identifier (e.g. "Euler", "Euler a", "DPM++ 2M Karras").
    pub sampler: String,
    pub inpaint: InpaintSettings,
}

impl Default for Img2ImgSettings {
    fn default() -> Self {
        Self {
            sampler: "Euler".to_string(),
            inpaint: InpaintSettings::default(),
        }
    }
}

/// JSON body of `POST /sdapi/v1/img2img`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Exactly one base64 PNG: the source image.
    pub init_images: Vec<String>,
    /// Base64 PNG mask. White regions are regenerated.
    pub mask: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: i32,
    pub cfg_scale: i32,
    pub denoising_strength: f32,
    pub width: u32,
    pub height: u32,
    pub seed: i64,
    pub tiling: bool,
    pub sampler_name: String,
    pub inpainting_fill: i32,
    pub inpaint_full_res: bool,
    pub inpaint_full_res_padding: i32,
    pub inpainting_mask_invert: i32,
    pub mask_blur: i32,
}

/// JSON body returned by the img2img endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Base64-encoded result images. Empty means the server failed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    /// JSON-encoded [`GenerationInfo`], or empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub info: String,
}

/// Secondary structure carried as a string in [`GenerationResponse::info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    /// Seed the server actually used.
    pub seed: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_node_fields() {
        let settings = Img2ImgSettings::default();
        assert_eq!(settings.sampler, "Euler");
        assert_eq!(settings.inpaint.fill, 0);
        assert!(settings.inpaint.full_res);
        assert_eq!(settings.inpaint.full_res_padding, 32);
        assert_eq!(settings.inpaint.mask_invert, 0);
        assert_eq!(settings.inpaint.mask_blur, 0);
    }

    #[test]
    fn test_response_tolerates_missing_and_null_fields() {
        let resp: GenerationResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.images.is_empty());
        assert!(resp.info.is_empty());

        let resp: GenerationResponse =
            serde_json::from_str(r#"{"images": null, "info": null}"#).unwrap();
        assert!(resp.images.is_empty());
        assert!(resp.info.is_empty());
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let resp: GenerationResponse = serde_json::from_str(
            r#"{"images": ["abc"], "parameters": {"steps": 20}, "info": "{\"seed\": 1}"}"#,
        )
        .unwrap();
        assert_eq!(resp.images, vec!["abc".to_string()]);
        assert_eq!(resp.info, r#"{"seed": 1}"#);
    }

    #[test]
    fn test_control_net_is_transparent() {
        let data = ControlNetData(serde_json::json!({"module": "canny", "weight": 1.0}));
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.starts_with("{\"module\""));
    }

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("a castle").negative("blurry");
        assert_eq!(prompt.positive, "a castle");
        assert_eq!(prompt.negative, "blurry");
    }
}
