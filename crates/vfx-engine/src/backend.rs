use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, REFERER};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::attachment::ImageAttachment;
use crate::config::LabsSettings;

const ENHANCE_PATH: &str = "videoFx.generateNextScenePrompts";
const CAPTION_PATH: &str = "backbone.captionImage";
const IMAGE_TO_PROMPT_PATH: &str = "general.generatePromptlessI2VPrompt";
const TOOL_REFERER: &str = "https://labs.google/fx/aitk-web/videofx-tt/tools/video-fx";

pub const MIN_CANDIDATES: u8 = 1;
pub const MAX_CANDIDATES: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionCategory {
    Scene,
    Subject,
    Style,
}

impl CaptionCategory {
    pub const ALL: [CaptionCategory; 3] = [Self::Scene, Self::Subject, Self::Style];

    pub fn media_category(self) -> &'static str {
        match self {
            Self::Scene => "MEDIA_CATEGORY_SCENE",
            Self::Subject => "MEDIA_CATEGORY_SUBJECT",
            Self::Style => "MEDIA_CATEGORY_STYLE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Subject => "subject",
            Self::Style => "style",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnhanceRequest {
    pub prompt: String,
    pub candidates: u8,
    pub image: Option<ImageAttachment>,
}

/// The remote prompt service, reduced to the three calls the tools make.
pub trait PromptBackend: Send + Sync {
    fn name(&self) -> &str;
    fn enhance(&self, request: &EnhanceRequest) -> Result<Vec<String>>;
    fn caption(&self, image: &ImageAttachment, category: CaptionCategory) -> Result<String>;
    fn image_to_prompt(&self, image: &ImageAttachment) -> Result<String>;
}

#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn PromptBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: PromptBackend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.name().to_string(), Box::new(backend));
    }

    pub fn take(&mut self, name: &str) -> Option<Box<dyn PromptBackend>> {
        self.backends.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

pub fn default_backend_registry(labs: &LabsSettings) -> Result<BackendRegistry> {
    let mut backends = BackendRegistry::new();
    backends.register(DryrunBackend);
    backends.register(LabsBackend::new(labs)?);
    Ok(backends)
}

pub struct DryrunBackend;

impl PromptBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn enhance(&self, request: &EnhanceRequest) -> Result<Vec<String>> {
        let core = request
            .prompt
            .rsplit("\n\n")
            .find(|part| !part.trim().is_empty() && !part.starts_with("--neg"))
            .unwrap_or("")
            .trim();
        Ok((0..request.candidates.max(MIN_CANDIDATES))
            .map(|idx| {
                format!(
                    "[dryrun {}] A cinematic shot: {}",
                    short_id(&request.prompt, u64::from(idx)),
                    truncate_text(core, 160)
                )
            })
            .collect())
    }

    fn caption(&self, image: &ImageAttachment, category: CaptionCategory) -> Result<String> {
        Ok(format!(
            "[dryrun {}] {} description of a {} image ({} bytes)",
            short_id(&image.base64(), category as u64),
            category.label(),
            image.mime_type,
            image.size_bytes()
        ))
    }

    fn image_to_prompt(&self, image: &ImageAttachment) -> Result<String> {
        Ok(format!(
            "[dryrun {}] A slow push-in on the scene from the reference image.",
            short_id(&image.base64(), 0)
        ))
    }
}

pub struct LabsBackend {
    base_url: String,
    cookie: Option<String>,
    http: HttpClient,
}

impl LabsBackend {
    pub fn new(settings: &LabsSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            cookie: settings.cookie.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post(&self, label: &str, path: &str, payload: &Value, referer: bool) -> Result<Value> {
        let mut request = self
            .http
            .post(self.endpoint(path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "*/*")
            .json(payload);
        if let Some(cookie) = self.cookie.as_deref() {
            request = request.header(COOKIE, cookie);
        }
        if referer {
            request = request.header(REFERER, TOOL_REFERER);
        }
        let response = request
            .send()
            .with_context(|| format!("{label} request failed"))?;
        response_json_or_error(label, response)
    }
}

impl PromptBackend for LabsBackend {
    fn name(&self) -> &str {
        "labs"
    }

    fn enhance(&self, request: &EnhanceRequest) -> Result<Vec<String>> {
        let payload = enhance_payload(request, timestamp_millis());
        let response = self.post("enhancer", ENHANCE_PATH, &payload, false)?;
        extract_enhance_candidates(&response)
    }

    fn caption(&self, image: &ImageAttachment, category: CaptionCategory) -> Result<String> {
        let payload = caption_payload(&image.data_url(), category, timestamp_millis());
        let response = self.post("deconstructor", CAPTION_PATH, &payload, false)?;
        extract_caption(&response)
    }

    fn image_to_prompt(&self, image: &ImageAttachment) -> Result<String> {
        let payload = image_to_prompt_payload(&image.base64(), timestamp_millis());
        let response = self.post("image-to-prompt", IMAGE_TO_PROMPT_PATH, &payload, true)?;
        extract_image_prompt(&response)
    }
}

fn session_id(now_ms: u128) -> String {
    format!("/aitk-web/videofx-tt;{now_ms}")
}

pub(crate) fn enhance_payload(request: &EnhanceRequest, now_ms: u128) -> Value {
    let mut body = json!({
        "clientContext": {
            "sessionId": session_id(now_ms),
            "workflowId": format!("enhance-{now_ms}"),
        },
        "prompt": request.prompt,
        "candidatesCount": request.candidates.clamp(MIN_CANDIDATES, MAX_CANDIDATES),
    });
    if let (Some(image), Some(object)) = (request.image.as_ref(), body.as_object_mut()) {
        object.insert(
            "mediaInput".to_string(),
            json!({
                "mediaCategory": "MEDIA_CATEGORY_SCENE",
                "rawBytes": image.data_url(),
            }),
        );
    }
    json!({ "json": body })
}

pub(crate) fn caption_payload(data_url: &str, category: CaptionCategory, now_ms: u128) -> Value {
    json!({
        "json": {
            "clientContext": {
                "sessionId": session_id(now_ms),
                "workflowId": format!("decon-{now_ms}"),
            },
            "captionInput": {
                "candidatesCount": 1,
                "mediaInput": {
                    "mediaCategory": category.media_category(),
                    "rawBytes": data_url,
                },
            },
        }
    })
}

pub(crate) fn image_to_prompt_payload(image_base64: &str, now_ms: u128) -> Value {
    json!({
        "json": {
            "sessionId": session_id(now_ms),
            "imageBase64": image_base64,
        }
    })
}

/// Candidate texts from an enhancer response. Accepts the captioning shape
/// (`candidates[].output`), a `prompts` list, or a bare string.
pub(crate) fn extract_enhance_candidates(response: &Value) -> Result<Vec<String>> {
    let data = response.pointer("/result/data/json").unwrap_or(&Value::Null);
    let texts: Vec<String> = if let Some(text) = data.as_str() {
        vec![text.to_string()]
    } else if let Some(candidates) = data.pointer("/result/candidates").and_then(Value::as_array) {
        candidates
            .iter()
            .filter_map(|candidate| candidate.get("output").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    } else if let Some(prompts) = data
        .pointer("/result/prompts")
        .or_else(|| data.get("prompts"))
        .and_then(Value::as_array)
    {
        prompts
            .iter()
            .filter_map(|prompt| {
                prompt
                    .as_str()
                    .or_else(|| prompt.get("prompt").and_then(Value::as_str))
            })
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };
    let texts: Vec<String> = texts
        .into_iter()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    if texts.is_empty() {
        bail!("No enhanced prompt in API response.");
    }
    Ok(texts)
}

pub(crate) fn extract_caption(response: &Value) -> Result<String> {
    response
        .pointer("/result/data/json/result/candidates/0/output")
        .and_then(Value::as_str)
        .filter(|caption| !caption.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No caption in API response."))
}

pub(crate) fn extract_image_prompt(response: &Value) -> Result<String> {
    response
        .pointer("/result/data/json")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("No valid prompt in API response."))
}

/// Message carried by a tRPC error body, if any.
pub(crate) fn api_error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let detail = error.get("json").unwrap_or(error);
    detail
        .get("message")
        .or_else(|| detail.get("code"))
        .and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    let parsed: Option<Value> = serde_json::from_str(&body).ok();
    if !status.is_success() {
        let message = parsed
            .as_ref()
            .and_then(api_error_message)
            .unwrap_or_else(|| format!("API Error {code}"));
        bail!("{label} request failed ({code}): {}", truncate_text(&message, 512));
    }
    parsed.with_context(|| format!("{label} returned invalid JSON payload"))
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

fn short_id(seed: &str, idx: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(idx.to_be_bytes());
    hex::encode(&hasher.finalize()[..4])
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
