//! Vision attachments: images of the canvas sent along with a prompt.
//!
//! Rasterizing is done by an external service; this side only asks for an
//! image and forwards it base64 encoded.

use crate::canvas::{LocalCanvasState, Position};
use crate::color::HexColor;
use crate::llm::{Attachment, build_adapter_client_with_timeout, sanitize_api_error};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// What a rasterizer needs to draw this agent's view.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRequest {
    pub position: Option<Position>,
    pub grid: Vec<Vec<HexColor>>,
}

impl CaptureRequest {
    pub fn new(position: Option<Position>, canvas: &LocalCanvasState) -> Self {
        Self {
            position,
            grid: canvas.rows(),
        }
    }
}

pub trait AttachmentSource: Send + Sync {
    fn name(&self) -> &str;

    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Attachment>>> + Send + 'a>>;
}

/// Never attaches anything.
pub struct NoAttachments;

impl AttachmentSource for NoAttachments {
    fn name(&self) -> &str {
        "none"
    }

    fn capture<'a>(
        &'a self,
        _request: &'a CaptureRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Attachment>>> + Send + 'a>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

/// POSTs the grid to a rasterizer and attaches the PNG it returns.
///
/// The service may answer with raw `image/png` bytes or with JSON
/// `{"image": "<base64 or data URL>"}`.
pub struct HttpRasterizer {
    url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RasterResponse {
    image: String,
}

impl HttpRasterizer {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: build_adapter_client_with_timeout(30),
        }
    }

    async fn fetch(&self, request: &CaptureRequest) -> anyhow::Result<Vec<Attachment>> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("rasterizer error ({status}): {}", sanitize_api_error(&body));
        }
        let is_png = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("image/"));
        let data = if is_png {
            STANDARD.encode(response.bytes().await?)
        } else {
            let body: RasterResponse = response.json().await?;
            strip_data_url(&body.image).to_string()
        };
        if data.is_empty() {
            anyhow::bail!("rasterizer returned an empty image");
        }
        Ok(vec![Attachment::png(data)])
    }
}

impl AttachmentSource for HttpRasterizer {
    fn name(&self) -> &str {
        "http"
    }

    fn capture<'a>(
        &'a self,
        request: &'a CaptureRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Attachment>>> + Send + 'a>> {
        Box::pin(self.fetch(request))
    }
}

fn strip_data_url(image: &str) -> &str {
    image
        .split_once(";base64,")
        .filter(|(head, _)| head.starts_with("data:"))
        .map_or(image, |(_, data)| data)
        .trim()
}
