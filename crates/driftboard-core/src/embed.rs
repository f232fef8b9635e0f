//! URL classification for embeds and the queue that applies results to shapes.

use crate::shapes::{ShapeId, ShapeKind};
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use url::Url;

/// Length of a video id on the supported video host.
const VIDEO_ID_LEN: usize = 11;

const VIDEO_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];
const VIDEO_SHORT_HOST: &str = "youtu.be";
const TWEET_HOSTS: &[&str] = &["twitter.com", "x.com"];

/// Embed resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmbedError {
    #[error("Empty input")]
    Empty,
    #[error("Malformed URL: {0}")]
    Malformed(String),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Provider-specific render information for a resolved embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedDescriptor {
    Video { video_id: String },
    Tweet { status_id: String, author: String },
    Iframe { url: String },
}

impl EmbedDescriptor {
    /// Frame size a freshly pasted embed of this kind takes.
    pub fn default_size(&self) -> Size {
        match self {
            EmbedDescriptor::Video { .. } => Size::new(853.0, 480.0),
            EmbedDescriptor::Tweet { .. } => Size::new(331.0, 290.0),
            EmbedDescriptor::Iframe { .. } => Size::new(853.0, 480.0),
        }
    }

    /// Shape kind an embed carrying this descriptor reports.
    pub fn shape_kind(&self) -> ShapeKind {
        match self {
            EmbedDescriptor::Video { .. } => ShapeKind::Video,
            EmbedDescriptor::Tweet { .. } => ShapeKind::Tweet,
            EmbedDescriptor::Iframe { .. } => ShapeKind::Iframe,
        }
    }

    /// Container class the host renders this embed into.
    pub fn container_class(&self) -> &'static str {
        self.shape_kind().container_class()
    }

    /// URL the host loads inside the embed frame.
    pub fn render_url(&self) -> String {
        match self {
            EmbedDescriptor::Video { video_id } => {
                format!("https://www.youtube.com/embed/{video_id}")
            }
            EmbedDescriptor::Tweet { status_id, .. } => {
                format!("https://platform.twitter.com/embed/Tweet.html?id={status_id}")
            }
            EmbedDescriptor::Iframe { url } => url.clone(),
        }
    }
}

/// Classify `input` as a video, tweet or generic page.
///
/// Pure: the same input always yields the same descriptor.
pub fn resolve(input: &str) -> Result<EmbedDescriptor, EmbedError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EmbedError::Empty);
    }
    let url = Url::parse(trimmed).map_err(|e| EmbedError::Malformed(format!("{trimmed}: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(EmbedError::UnsupportedScheme(url.scheme().to_string()));
    }
    let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
        return Err(EmbedError::Malformed(format!("{trimmed}: missing host")));
    };

    if let Some(video_id) = video_id(&url, &host) {
        return Ok(EmbedDescriptor::Video { video_id });
    }
    if let Some((author, status_id)) = tweet_status(&url, &host) {
        return Ok(EmbedDescriptor::Tweet { status_id, author });
    }
    Ok(EmbedDescriptor::Iframe {
        url: url.to_string(),
    })
}

fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn video_id(url: &Url, host: &str) -> Option<String> {
    let segments = path_segments(url);
    let candidate = if host == VIDEO_SHORT_HOST {
        segments.first().map(|s| s.to_string())
    } else if VIDEO_HOSTS.contains(&host) {
        match segments.as_slice() {
            ["watch"] => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            ["shorts", id, ..] | ["embed", id, ..] => Some(id.to_string()),
            _ => None,
        }
    } else {
        None
    };
    candidate.filter(|id| is_video_id(id))
}

fn tweet_status(url: &Url, host: &str) -> Option<(String, String)> {
    let bare = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("mobile."))
        .unwrap_or(host);
    if !TWEET_HOSTS.contains(&bare) {
        return None;
    }
    match path_segments(url).as_slice() {
        [author, "status", status_id, ..]
            if !status_id.is_empty() && status_id.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some((author.to_string(), status_id.to_string()))
        }
        _ => None,
    }
}

/// A pending classification for one embed shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTask {
    pub shape_id: ShapeId,
    pub url: String,
}

/// Resolution outcome for a task that was not cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub shape_id: ShapeId,
    pub url: String,
    pub result: Result<EmbedDescriptor, EmbedError>,
}

/// FIFO of resolution tasks, processed on the editor's tick.
#[derive(Debug, Default)]
pub struct EmbedQueue {
    tasks: VecDeque<ResolveTask>,
    cancelled: HashSet<ShapeId>,
}

impl EmbedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task. Earlier cancelled tasks for the shape stay dropped.
    pub fn push(&mut self, shape_id: ShapeId, url: impl Into<String>) {
        if self.cancelled.remove(&shape_id) {
            self.tasks.retain(|t| t.shape_id != shape_id);
        }
        self.tasks.push_back(ResolveTask {
            shape_id,
            url: url.into(),
        });
    }

    /// Drop every outstanding task for `shape_id`.
    pub fn cancel(&mut self, shape_id: ShapeId) {
        if self.tasks.iter().any(|t| t.shape_id == shape_id) {
            self.cancelled.insert(shape_id);
        }
    }

    /// Whether a live task exists for `shape_id`.
    pub fn is_queued(&self, shape_id: ShapeId) -> bool {
        !self.cancelled.contains(&shape_id) && self.tasks.iter().any(|t| t.shape_id == shape_id)
    }

    pub fn len(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !self.cancelled.contains(&t.shape_id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every live task in issuance order and empty the queue.
    pub fn drain(&mut self) -> Vec<Resolution> {
        let cancelled = std::mem::take(&mut self.cancelled);
        self.tasks
            .drain(..)
            .filter(|task| !cancelled.contains(&task.shape_id))
            .map(|task| Resolution {
                result: resolve(&task.url),
                shape_id: task.shape_id,
                url: task.url,
            })
            .collect()
    }
}
