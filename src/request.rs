use image::{Rgba, RgbaImage};

use crate::codec;
use crate::error::{NodeError, Result};
use crate::ports::NodeInputs;
use crate::seed::{SeedSource, SeedState};
use crate::types::{GenerationRequest, Img2ImgSettings, ViewSize};

/// Mask pixel meaning "regenerate this pixel".
pub const MASK_KEEP: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fully opaque white mask, used when no mask is bound.
pub fn opaque_mask(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, MASK_KEEP)
}

/// Assembles a [`GenerationRequest`] from an input snapshot and node settings.
///
/// Output dimensions come from the view size, not from the source image.
///
/// # Example
/// ```
/// use sd_img2img_node::{NodeInputs, RequestBuilder, Img2ImgSettings, ViewSize, SeedState, CryptoSeedSource};
/// use image::RgbaImage;
/// use std::sync::Arc;
///
/// let inputs = NodeInputs {
///     source_image: Some(Arc::new(RgbaImage::new(64, 64))),
///     ..Default::default()
/// };
/// let settings = Img2ImgSettings::default();
/// let mut seed = SeedState::new(1234);
///
/// let request = RequestBuilder::new(&inputs, &settings, ViewSize::new(768, 512))
///     .build(&mut seed, &CryptoSeedSource)
///     .unwrap();
///
/// assert_eq!(request.width, 768);
/// assert_eq!(request.seed, 1234);
/// assert_eq!(request.init_images.len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    inputs: &'a NodeInputs,
    settings: &'a Img2ImgSettings,
    view: ViewSize,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(inputs: &'a NodeInputs, settings: &'a Img2ImgSettings, view: ViewSize) -> Self {
        Self {
            inputs,
            settings,
            view,
        }
    }

    /// Build the request, drawing a seed into `seed` if it is unset.
    ///
    /// Fails without touching `seed` when no source image is bound or an
    /// image cannot be encoded.
    pub fn build(
        &self,
        seed: &mut SeedState,
        source: &dyn SeedSource,
    ) -> Result<GenerationRequest> {
        let image = self
            .inputs
            .source_image
            .as_deref()
            .ok_or(NodeError::MissingSourceImage)?;

        let init_image = codec::encode_image(image)?;
        let mask = match self.inputs.mask_image.as_deref() {
            Some(mask) => {
                if mask.dimensions() != image.dimensions() {
                    log::warn!(
                        "Mask is {}x{} but source image is {}x{}",
                        mask.width(),
                        mask.height(),
                        image.width(),
                        image.height()
                    );
                }
                codec::encode_image(mask)?
            }
            None => codec::encode_image(&opaque_mask(image.width(), image.height()))?,
        };

        let inpaint = &self.settings.inpaint;
        Ok(GenerationRequest {
            init_images: vec![init_image],
            mask,
            prompt: self.inputs.prompt.positive.clone(),
            negative_prompt: self.inputs.prompt.negative.clone(),
            steps: self.inputs.steps,
            cfg_scale: self.inputs.cfg,
            denoising_strength: self.inputs.denoise_strength,
            width: self.view.width,
            height: self.view.height,
            seed: seed.resolve(source),
            tiling: false,
            sampler_name: self.settings.sampler.clone(),
            inpainting_fill: inpaint.fill,
            inpaint_full_res: inpaint.full_res,
            inpaint_full_res_padding: inpaint.full_res_padding,
            inpainting_mask_invert: inpaint.mask_invert,
            mask_blur: inpaint.mask_blur,
        })
    }
}
