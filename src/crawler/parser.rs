//! API payload decoding and topic classification
//!
//! This module decodes the topics and download-url envelopes and extracts the
//! image and file references embedded in each topic.

use serde::Deserialize;

/// Envelope wrapping every API response
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub succeeded: bool,
    pub resp_data: Option<T>,
}

/// `resp_data` of the topics endpoint
#[derive(Debug, Deserialize)]
pub struct TopicsData {
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// `resp_data` of the file download-url endpoint
#[derive(Debug, Deserialize)]
pub struct DownloadUrlData {
    pub download_url: String,
}

/// Discriminated kind of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A plain post (`talk`)
    Post,
    /// A question with an optional answer (`q&a`)
    QuestionAnswer,
    /// Any type this crate does not understand
    Other,
}

impl RecordKind {
    /// Maps the API's `type` field to a kind
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "talk" => Self::Post,
            "q&a" => Self::QuestionAnswer,
            _ => Self::Other,
        }
    }
}

/// One fetched topic
#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
    pub topic_id: u64,

    #[serde(rename = "type")]
    pub kind: String,

    /// Creation time, e.g. `2024-01-15T10:20:30.456+0800`; the dedup and ordering key
    pub create_time: String,

    #[serde(default)]
    pub talk: Option<Body>,

    #[serde(default)]
    pub question: Option<Body>,

    #[serde(default)]
    pub answer: Option<Body>,
}

/// Text body of a post, question or answer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub owner: Option<Owner>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub images: Vec<ImageInfo>,

    #[serde(default)]
    pub files: Vec<FileInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: Option<String>,
}

/// Image entry as the API reports it
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    pub image_id: u64,

    #[serde(rename = "type", default = "default_image_type")]
    pub kind: String,

    #[serde(default)]
    pub thumbnail: Option<ImageSource>,

    #[serde(default)]
    pub large: Option<ImageSource>,

    #[serde(default)]
    pub original: Option<ImageSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSource {
    pub url: String,
}

/// File entry as the API reports it
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file_id: u64,

    #[serde(default = "default_file_name")]
    pub name: String,
}

fn default_image_type() -> String {
    "jpg".to_string()
}

fn default_file_name() -> String {
    "unknown".to_string()
}

/// An image scheduled for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub id: u64,
    /// File extension, e.g. `jpg`
    pub extension: String,
    /// Source URLs, highest fidelity first
    pub candidates: Vec<String>,
}

impl MediaRef {
    /// Builds a reference from an API image entry
    pub fn from_image(image: &ImageInfo) -> Self {
        let candidates = [&image.original, &image.large, &image.thumbnail]
            .into_iter()
            .flatten()
            .map(|source| source.url.clone())
            .collect();

        Self {
            id: image.image_id,
            extension: sanitize_extension(&image.kind),
            candidates,
        }
    }

    /// Path relative to the output root the image is saved at
    pub fn relative_path(&self) -> String {
        format!("images/{}.{}", self.id, self.extension)
    }
}

/// A file attachment scheduled for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub id: u64,
    /// Sanitized file name
    pub name: String,
    /// Extension derived from the name (empty when the name has none)
    pub extension: String,
}

impl AttachmentRef {
    /// Builds a reference from an API file entry
    pub fn from_file(file: &FileInfo) -> Self {
        let name = sanitize_filename(&file.name);
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        Self {
            id: file.file_id,
            name,
            extension,
        }
    }

    /// Path relative to the output root the file is saved at
    pub fn relative_path(&self) -> String {
        format!("files/{}/{}", self.id, self.name)
    }
}

impl Topic {
    pub fn record_kind(&self) -> RecordKind {
        RecordKind::from_api(&self.kind)
    }

    /// Bodies that may carry media, in document order
    pub fn bodies(&self) -> Vec<&Body> {
        match self.record_kind() {
            RecordKind::Post => self.talk.iter().collect(),
            RecordKind::QuestionAnswer => self.question.iter().chain(self.answer.iter()).collect(),
            RecordKind::Other => Vec::new(),
        }
    }

    /// Name of the topic's author
    pub fn author(&self) -> &str {
        self.talk
            .as_ref()
            .or(self.question.as_ref())
            .and_then(Body::owner_name)
            .unwrap_or("unknown")
    }

    /// Grouping key of the document this topic belongs in (`YYYY-MM`)
    pub fn month_key(&self) -> &str {
        self.create_time.get(..7).unwrap_or("unknown")
    }

    /// Images embedded anywhere in the topic
    pub fn media_refs(&self) -> Vec<MediaRef> {
        self.bodies()
            .into_iter()
            .flat_map(|body| body.images.iter())
            .map(MediaRef::from_image)
            .collect()
    }

    /// Files attached anywhere in the topic
    pub fn attachment_refs(&self) -> Vec<AttachmentRef> {
        self.bodies()
            .into_iter()
            .flat_map(|body| body.files.iter())
            .map(AttachmentRef::from_file)
            .collect()
    }
}

impl Body {
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().and_then(|owner| owner.name.as_deref())
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Replaces characters that are unsafe in file names and caps the length
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\n' | '\r' => '_',
            other => other,
        })
        .take(80)
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

fn sanitize_extension(kind: &str) -> String {
    let ext: String = kind
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        default_image_type()
    } else {
        ext
    }
}
