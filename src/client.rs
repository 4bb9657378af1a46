use std::{path::Path, time::Duration};

use crate::{
    codec::EncodedFrame,
    foundation::error::{PixelartError, PixelartResult},
};

pub const DEFAULT_API_BASE: &str = "https://api.pixellab.ai/v2";
pub const API_KEY_ENV: &str = "PIXELLAB_API_KEY";

/// One text-to-animation request.
#[derive(Clone, Debug)]
pub struct GenerationRequest<'a> {
    pub reference: &'a Path,
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
}

/// Frames returned by one call, in order, with what the call cost.
#[derive(Clone, Debug, Default)]
pub struct Generation {
    pub frames: Vec<EncodedFrame>,
    pub cost_usd: f64,
}

/// The remote generation boundary. Implementations never retry.
pub trait AnimationGenerator {
    fn generate(&mut self, req: &GenerationRequest<'_>) -> PixelartResult<Generation>;
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub generate_timeout: Duration,
    pub balance_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            generate_timeout: Duration::from_secs(300),
            balance_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read the API key from `PIXELLAB_API_KEY`.
    pub fn from_env() -> PixelartResult<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(PixelartError::validation(format!(
                "{API_KEY_ENV} environment variable is not set (get a key at https://pixellab.ai)"
            ))),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Balance {
    pub credits_usd: f64,
    pub generations_used: u64,
    pub generations_total: u64,
}

#[derive(serde::Serialize)]
struct ImageSize {
    width: u32,
    height: u32,
}

#[derive(serde::Serialize)]
struct AnimateRequest<'a> {
    reference_image: EncodedFrame,
    reference_image_size: ImageSize,
    image_size: ImageSize,
    action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Usage {
    usd: f64,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AnimateResponse {
    images: Vec<EncodedFrame>,
    usage: Usage,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Credits {
    usd: f64,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Subscription {
    generations: u64,
    total: u64,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BalanceResponse {
    credits: Credits,
    subscription: Subscription,
}

/// Blocking PixelLab v2 client.
pub struct PixelLabClient {
    cfg: ClientConfig,
    http: reqwest::blocking::Client,
}

impl PixelLabClient {
    pub fn new(cfg: ClientConfig) -> PixelartResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("pixelart-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { cfg, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn balance(&self) -> PixelartResult<Balance> {
        let resp = self
            .http
            .get(self.cfg.endpoint("balance"))
            .bearer_auth(&self.cfg.api_key)
            .timeout(self.cfg.balance_timeout)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(PixelartError::api(status.as_u16(), &body));
        }
        let data: BalanceResponse = resp.json()?;
        Ok(Balance {
            credits_usd: data.credits.usd,
            generations_used: data.subscription.generations,
            generations_total: data.subscription.total,
        })
    }
}

impl AnimationGenerator for PixelLabClient {
    #[tracing::instrument(skip(self, req), fields(reference = %req.reference.display()))]
    fn generate(&mut self, req: &GenerationRequest<'_>) -> PixelartResult<Generation> {
        let payload = AnimateRequest {
            reference_image: EncodedFrame::from_file(req.reference)?,
            reference_image_size: ImageSize {
                width: req.width,
                height: req.height,
            },
            image_size: ImageSize {
                width: req.width,
                height: req.height,
            },
            action: req.prompt,
            seed: req.seed,
        };

        let resp = self
            .http
            .post(self.cfg.endpoint("animate-with-text-v2"))
            .bearer_auth(&self.cfg.api_key)
            .timeout(self.cfg.generate_timeout)
            .json(&payload)
            .send()?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            return Err(PixelartError::api(status.as_u16(), &body));
        }

        let data: AnimateResponse = resp.json()?;
        tracing::debug!(frames = data.images.len(), usd = data.usage.usd, "generation ok");
        Ok(Generation {
            frames: data.images,
            cost_usd: data.usage.usd,
        })
    }
}
