#![forbid(unsafe_code)]

//! Push-channel event vocabulary.
//!
//! The backend delivers named events whose `data` is a JSON record. The set
//! of names is closed ([`PushEventKind`]); anything else is ignored by the
//! channel. Decoding is per event: one malformed payload yields an
//! [`EventDecodeError`] for that event only.

use std::fmt;

use serde::Deserialize;

/// A named event as it arrives on the wire, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event name (`event:` field); `message` when the server sent none.
    pub name: String,
    /// Payload text (`data:` lines joined with `\n`).
    pub data: String,
    /// Last event id seen on the stream, if any.
    pub id: Option<String>,
}

impl RawEvent {
    /// Build a raw event from name and payload.
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// The enumerated event types the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushEventKind {
    /// New items were ingested.
    NewArticles,
    /// Progress of a bulk (OPML) import.
    ImportProgress,
    /// A bulk import finished.
    ImportComplete,
    /// A bulk export finished.
    ExportComplete,
    /// Feed discovery found feeds.
    DiscoveryComplete,
    /// Feed discovery found nothing.
    DiscoveryEmpty,
    /// Feed discovery failed.
    DiscoveryFailed,
    /// Historical backfill of a feed failed.
    BackfillFailed,
}

impl PushEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [PushEventKind; 8] = [
        Self::NewArticles,
        Self::ImportProgress,
        Self::ImportComplete,
        Self::ExportComplete,
        Self::DiscoveryComplete,
        Self::DiscoveryEmpty,
        Self::DiscoveryFailed,
        Self::BackfillFailed,
    ];

    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewArticles => "new_articles",
            Self::ImportProgress => "import_progress",
            Self::ImportComplete => "import_complete",
            Self::ExportComplete => "export_complete",
            Self::DiscoveryComplete => "discovery_complete",
            Self::DiscoveryEmpty => "discovery_empty",
            Self::DiscoveryFailed => "discovery_failed",
            Self::BackfillFailed => "backfill_failed",
        }
    }

    /// Look up a kind by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `new_articles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewArticles {
    /// Number of new items.
    #[serde(default)]
    pub count: u64,
    /// Feeds that received items; empty means unknown.
    #[serde(default)]
    pub feed_ids: Vec<String>,
    /// Folders containing those feeds.
    #[serde(default)]
    pub folder_ids: Vec<String>,
    /// Tags applied to the new items.
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

/// Payload of `import_progress`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportProgress {
    /// Import job id.
    pub job_id: String,
    /// Feeds processed so far.
    pub processed: u64,
    /// Feeds in the import.
    pub total: u64,
}

impl ImportProgress {
    /// Completion ratio in `[0, 1]`.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.processed.min(self.total) as f64) / (self.total as f64)
        }
    }
}

/// Payload of `import_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportComplete {
    /// Import job id.
    pub job_id: String,
    /// Feeds added.
    #[serde(default)]
    pub imported: u64,
    /// Feeds that failed to import.
    #[serde(default)]
    pub failed: u64,
}

/// Payload of `export_complete`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportComplete {
    /// Export job id.
    pub job_id: String,
    /// Where the export can be downloaded.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Payload shared by the discovery outcome events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryOutcome {
    /// The address discovery was run against.
    pub url: String,
    /// Feed urls found (`discovery_complete` only).
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Failure reason (`discovery_failed` only).
    #[serde(default)]
    pub error: Option<String>,
}

/// Payload of `backfill_failed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackfillFailure {
    /// Feed whose history could not be fetched.
    pub feed_id: String,
    /// Failure reason.
    #[serde(default)]
    pub error: Option<String>,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    NewArticles(NewArticles),
    ImportProgress(ImportProgress),
    ImportComplete(ImportComplete),
    ExportComplete(ExportComplete),
    DiscoveryComplete(DiscoveryOutcome),
    DiscoveryEmpty(DiscoveryOutcome),
    DiscoveryFailed(DiscoveryOutcome),
    BackfillFailed(BackfillFailure),
}

impl PushEvent {
    /// The kind of this event.
    #[must_use]
    pub fn kind(&self) -> PushEventKind {
        match self {
            Self::NewArticles(_) => PushEventKind::NewArticles,
            Self::ImportProgress(_) => PushEventKind::ImportProgress,
            Self::ImportComplete(_) => PushEventKind::ImportComplete,
            Self::ExportComplete(_) => PushEventKind::ExportComplete,
            Self::DiscoveryComplete(_) => PushEventKind::DiscoveryComplete,
            Self::DiscoveryEmpty(_) => PushEventKind::DiscoveryEmpty,
            Self::DiscoveryFailed(_) => PushEventKind::DiscoveryFailed,
            Self::BackfillFailed(_) => PushEventKind::BackfillFailed,
        }
    }

    /// Decode a raw event.
    ///
    /// Returns `Ok(None)` for names outside the known set.
    pub fn decode(raw: &RawEvent) -> Result<Option<Self>, EventDecodeError> {
        let Some(kind) = PushEventKind::from_name(&raw.name) else {
            return Ok(None);
        };
        let data = if raw.data.trim().is_empty() {
            "{}"
        } else {
            raw.data.as_str()
        };
        let parse_err = |e: serde_json::Error| EventDecodeError {
            kind,
            message: e.to_string(),
        };
        let event = match kind {
            PushEventKind::NewArticles => {
                Self::NewArticles(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::ImportProgress => {
                Self::ImportProgress(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::ImportComplete => {
                Self::ImportComplete(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::ExportComplete => {
                Self::ExportComplete(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::DiscoveryComplete => {
                Self::DiscoveryComplete(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::DiscoveryEmpty => {
                Self::DiscoveryEmpty(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::DiscoveryFailed => {
                Self::DiscoveryFailed(serde_json::from_str(data).map_err(parse_err)?)
            }
            PushEventKind::BackfillFailed => {
                Self::BackfillFailed(serde_json::from_str(data).map_err(parse_err)?)
            }
        };
        Ok(Some(event))
    }
}

/// A known event whose payload did not match its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecodeError {
    /// The event kind that failed.
    pub kind: PushEventKind,
    /// Decoder message.
    pub message: String,
}

impl fmt::Display for EventDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {} payload: {}", self.kind, self.message)
    }
}

impl std::error::Error for EventDecodeError {}
