//! Hero image generation
//!
//! Prompt and image backends are interchangeable behind `PromptProvider` and
//! `ImageProvider`; the pipeline only ever sees the prompt text and the
//! returned pixel buffer.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::brief::{CampaignBrief, Product};
use crate::error::{PipelineError, PipelineResult};
use crate::hashing::digest;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::ratios::RatioPolicy;

pub const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, deformed, ugly, \
bad anatomy, watermark, text overlay, signature, \
amateur, grainy, pixelated, out of focus, \
cluttered background, messy, unprofessional";
pub const DEFAULT_INFERENCE_STEPS: u32 = 28;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 3.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub provider_format: String,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
}

impl GenerationRequest {
    /// Request sized for a generation ratio; unknown ratios use the landscape default.
    pub fn for_ratio(prompt: impl Into<String>, ratio: &str) -> Self {
        let size = RatioPolicy::generation_size(ratio);
        Self {
            prompt: prompt.into(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            width: size.width,
            height: size.height,
            provider_format: RatioPolicy::provider_format(ratio).to_string(),
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
        }
    }
}

pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Estimated spend per generated image, in USD.
    fn cost_per_image(&self) -> f64;

    fn generate(&self, request: &GenerationRequest) -> PipelineResult<RgbaImage>;
}

/// Offline provider: a deterministic two-tone gradient with a centred block,
/// seeded from the prompt. Same prompt and size give the same pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderProvider;

impl ImageProvider for PlaceholderProvider {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn cost_per_image(&self) -> f64 {
        0.0
    }

    fn generate(&self, request: &GenerationRequest) -> PipelineResult<RgbaImage> {
        if request.width == 0 || request.height == 0 {
            return Err(PipelineError::generation(format!(
                "cannot generate a {}x{} image",
                request.width, request.height
            )));
        }
        let seed = digest(request.prompt.as_bytes());
        let start = [seed[0], seed[1], seed[2]];
        let end = [seed[3], seed[4], seed[5]];
        let accent = Rgba([seed[6] | 0x80, seed[7] | 0x80, seed[8] | 0x80, 255]);

        let (w, h) = (request.width, request.height);
        let span = (w + h).saturating_sub(2).max(1) as f32;
        let mut img = RgbaImage::from_fn(w, h, |x, y| {
            let t = (x + y) as f32 / span;
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            Rgba([mix(start[0], end[0]), mix(start[1], end[1]), mix(start[2], end[2]), 255])
        });

        // product stand-in, kept in the middle third so every crop retains it
        let (bw, bh) = (w / 3, h / 3);
        for y in (h - bh) / 2..(h - bh) / 2 + bh {
            for x in (w - bw) / 2..(w - bw) / 2 + bw {
                img.put_pixel(x, y, accent);
            }
        }
        Ok(img)
    }
}

/// Centre-composed product photography prompt for one product.
pub fn image_prompt(brief: &CampaignBrief, product: &Product) -> String {
    let mut subject = product.display_name().to_string();
    if let Some(desc) = product.description.as_deref().filter(|d| !d.trim().is_empty()) {
        subject.push_str(". ");
        subject.push_str(desc.trim());
    }
    let mut prompt = format!(
        "Professional product photography of {subject}. \
Centered composition, product in middle of frame, studio lighting, high quality, \
commercial advertising style, clean white background, sharp focus, detailed, photorealistic."
    );
    if let Some(audience) = brief.target_audience.as_deref().filter(|a| !a.trim().is_empty()) {
        prompt.push_str(&format!(" Styled for {}.", audience.trim()));
    }
    prompt
}

/// Turns a brief and product into an image prompt, typically through an LLM.
pub trait PromptProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Estimated spend per prompt request, in USD.
    fn cost_per_call(&self) -> f64;

    fn generate_prompt(&self, brief: &CampaignBrief, product: &Product) -> PipelineResult<String>;
}

/// Offline prompts from the fixed template.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplatePromptProvider;

impl PromptProvider for TemplatePromptProvider {
    fn name(&self) -> &str {
        "template"
    }

    fn cost_per_call(&self) -> f64 {
        0.0
    }

    fn generate_prompt(&self, brief: &CampaignBrief, product: &Product) -> PipelineResult<String> {
        Ok(image_prompt(brief, product))
    }
}

/// Ask the provider; a failed or blank answer falls back to the template.
pub fn resolve_prompt(
    provider: &dyn PromptProvider,
    brief: &CampaignBrief,
    product: &Product,
    observer: &dyn PipelineObserver,
) -> String {
    let reason = match provider.generate_prompt(brief, product) {
        Ok(prompt) if !prompt.trim().is_empty() => return prompt.trim().to_string(),
        Ok(_) => "empty prompt".to_string(),
        Err(e) => e.to_string(),
    };
    observer.on_event(&PipelineEvent::PromptFallback {
        product_id: product.id.clone(),
        provider: provider.name().to_string(),
        reason,
    });
    image_prompt(brief, product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::RecordingObserver;

    struct DownPrompts;

    impl PromptProvider for DownPrompts {
        fn name(&self) -> &str {
            "llm"
        }

        fn cost_per_call(&self) -> f64 {
            0.01
        }

        fn generate_prompt(&self, _: &CampaignBrief, _: &Product) -> PipelineResult<String> {
            Err(PipelineError::generation("rate limited"))
        }
    }

    fn brief() -> CampaignBrief {
        serde_json::from_str(
            r#"{"campaign_id": "c", "campaign_message": "Hi",
                "target_audience": "young professionals",
                "products": [{"id": "mat", "name": "Yoga Mat", "description": "Eco friendly"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn request_uses_ratio_policy() {
        let req = GenerationRequest::for_ratio("x", "9x16");
        assert_eq!((req.width, req.height), (1080, 1920));
        assert_eq!(req.num_inference_steps, 28);

        let unknown = GenerationRequest::for_ratio("x", "7x5");
        assert_eq!((unknown.width, unknown.height), (1920, 1080));
        assert_eq!(unknown.provider_format, "landscape_16_9");
    }

    #[test]
    fn placeholder_is_deterministic_and_sized() {
        let req = GenerationRequest::for_ratio("Yoga mat", "1x1");
        let a = PlaceholderProvider.generate(&req).unwrap();
        let b = PlaceholderProvider.generate(&req).unwrap();
        assert_eq!(a.dimensions(), (req.width, req.height));
        assert_eq!(a, b);

        let other = PlaceholderProvider
            .generate(&GenerationRequest::for_ratio("Water bottle", "1x1"))
            .unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn placeholder_rejects_empty_size() {
        let mut req = GenerationRequest::for_ratio("x", "1x1");
        req.width = 0;
        assert_eq!(PlaceholderProvider.generate(&req).unwrap_err().kind(), "generation");
    }

    #[test]
    fn prompt_mentions_product_and_centering() {
        let brief = brief();
        let prompt = image_prompt(&brief, &brief.products[0]);
        assert!(prompt.starts_with("Professional product photography of Yoga Mat. Eco friendly."));
        assert!(prompt.contains("Centered composition"));
        assert!(prompt.ends_with("Styled for young professionals."));
    }

    #[test]
    fn failed_prompt_request_falls_back_to_template() {
        let brief = brief();
        let observer = RecordingObserver::default();
        let prompt = resolve_prompt(&DownPrompts, &brief, &brief.products[0], &observer);
        assert_eq!(prompt, image_prompt(&brief, &brief.products[0]));
        assert!(matches!(
            observer.take().as_slice(),
            [PipelineEvent::PromptFallback { provider, reason, .. }]
                if provider == "llm" && reason.contains("rate limited")
        ));
    }

    #[test]
    fn template_provider_needs_no_fallback() {
        let brief = brief();
        let observer = RecordingObserver::default();
        let prompt = resolve_prompt(&TemplatePromptProvider, &brief, &brief.products[0], &observer);
        assert!(prompt.contains("Yoga Mat"));
        assert!(observer.take().is_empty());
    }
}
