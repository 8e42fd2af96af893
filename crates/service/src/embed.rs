//! Embedding charts in other pages.
//!
//! The host page loads `embed.js`, which turns every `[data-grafer-src]`
//! container into an iframe and resizes it when the chart inside posts
//! `{type: "grafer-resize", height}`. [`FrameRegistry`] is the same
//! bookkeeping on the Rust side, so the protocol rules are tested here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const RESIZE_MESSAGE_TYPE: &str = "grafer-resize";

const RESIZER_TEMPLATE: &str = include_str!("../assets/resizer.js");

/// The two deployed flavours of the loader. They disagree on the initial
/// height and on the padding added to reported heights, and both are in use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizerVariant {
    /// 400px before the first message, heights applied as reported.
    #[default]
    Standard,
    /// 600px before the first message, 5px added to every reported height.
    Padded,
}

impl ResizerVariant {
    pub fn default_height(self) -> u32 {
        match self {
            ResizerVariant::Standard => 400,
            ResizerVariant::Padded => 600,
        }
    }

    pub fn buffer(self) -> u32 {
        match self {
            ResizerVariant::Standard => 0,
            ResizerVariant::Padded => 5,
        }
    }
}

impl FromStr for ResizerVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ResizerVariant::Standard),
            "padded" => Ok(ResizerVariant::Padded),
            other => Err(format!("unknown resizer variant '{other}'")),
        }
    }
}

/// `{type: "grafer-resize", height: number}`
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResizeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub height: f64,
}

impl ResizeMessage {
    /// Accept only well-formed resize messages with a finite, non-negative height.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        let msg: ResizeMessage = serde_json::from_value(payload.clone()).ok()?;
        if msg.kind != RESIZE_MESSAGE_TYPE || !msg.height.is_finite() || msg.height < 0.0 {
            return None;
        }
        Some(msg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

#[derive(Debug)]
struct Frame<S> {
    source: S,
    height: u32,
}

/// Iframes on a host page, keyed by the handle of their content window.
#[derive(Debug)]
pub struct FrameRegistry<S> {
    variant: ResizerVariant,
    frames: Vec<Frame<S>>,
}

impl<S: PartialEq> FrameRegistry<S> {
    pub fn new(variant: ResizerVariant) -> Self {
        Self { variant, frames: Vec::new() }
    }

    /// Register an iframe; it starts at the variant's default height.
    pub fn register(&mut self, source: S) -> FrameId {
        self.frames.push(Frame { source, height: self.variant.default_height() });
        FrameId(self.frames.len() - 1)
    }

    pub fn height(&self, id: FrameId) -> Option<u32> {
        self.frames.get(id.0).map(|f| f.height)
    }

    /// Apply a message posted by `source`. Returns the resized frame and its
    /// new height; messages of other types or from unknown windows change nothing.
    pub fn handle_message(&mut self, source: &S, payload: &serde_json::Value) -> Option<(FrameId, u32)> {
        let msg = ResizeMessage::parse(payload)?;
        let idx = self.frames.iter().position(|f| &f.source == source)?;
        let height = (msg.height.ceil() as u32).saturating_add(self.variant.buffer());
        self.frames[idx].height = height;
        Some((FrameId(idx), height))
    }
}

/// The loader script with the variant's constants filled in.
pub fn resizer_script(variant: ResizerVariant) -> String {
    RESIZER_TEMPLATE
        .replace("__DEFAULT_HEIGHT__", &variant.default_height().to_string())
        .replace("__BUFFER__", &variant.buffer().to_string())
        .replace("__MESSAGE_TYPE__", RESIZE_MESSAGE_TYPE)
}

/// Public address of one saved version of a chart.
pub fn public_url(base_url: &str, public_path: &str, id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = public_path.trim_start_matches('/');
    let id: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
    format!("{base}/{path}?version={id}")
}

/// HTML to paste into another page to embed a saved version.
pub fn embed_snippet(base_url: &str, public_path: &str, id: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let src = public_url(base, public_path, id);
    format!(
        "<div class=\"grafer-embed\" data-grafer-src=\"{}\"></div>\n<script src=\"{}/embed.js\" async></script>",
        html_attr_escape(&src),
        html_attr_escape(base)
    )
}

fn html_attr_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}
