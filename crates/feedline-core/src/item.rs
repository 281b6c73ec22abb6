#![forbid(unsafe_code)]

//! Feed items and optimistic field patches.
//!
//! The pipeline treats an [`Item`] as an opaque record: only the stable id and
//! the two mutable flags (`is_read`, `is_saved`) are inspected. Everything the
//! backend sends beyond that is kept verbatim in [`Item::payload`] for the UI.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a feed item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a backend id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A loaded feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable id, unique within a loaded list.
    pub id: ItemId,
    /// Read flag, the usual target of optimistic patches.
    #[serde(default)]
    pub is_read: bool,
    /// Saved / read-later flag.
    #[serde(default)]
    pub is_saved: bool,
    /// Remaining backend fields, untouched by the pipeline.
    #[serde(default, flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    /// Create an unread, unsaved item with an empty payload.
    #[must_use]
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            is_read: false,
            is_saved: false,
            payload: serde_json::Map::new(),
        }
    }

    /// Set the read flag.
    #[must_use]
    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Set the saved flag.
    #[must_use]
    pub fn with_saved(mut self, is_saved: bool) -> Self {
        self.is_saved = is_saved;
        self
    }

    /// Attach an opaque payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Merge `patch` into this item and return the inverse patch.
    ///
    /// The inverse names exactly the fields `patch` touched, carrying their
    /// previous values, so applying it undoes this call.
    pub fn apply(&mut self, patch: &ItemPatch) -> ItemPatch {
        let mut inverse = ItemPatch::default();
        if let Some(read) = patch.is_read {
            inverse.is_read = Some(self.is_read);
            self.is_read = read;
        }
        if let Some(saved) = patch.is_saved {
            inverse.is_saved = Some(self.is_saved);
            self.is_saved = saved;
        }
        inverse
    }
}

/// A partial update of an item's mutable flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    /// New read flag, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    /// New saved flag, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
}

impl ItemPatch {
    /// Patch that only sets the read flag.
    #[must_use]
    pub fn read(is_read: bool) -> Self {
        Self {
            is_read: Some(is_read),
            is_saved: None,
        }
    }

    /// Patch that only sets the saved flag.
    #[must_use]
    pub fn saved(is_saved: bool) -> Self {
        Self {
            is_read: None,
            is_saved: Some(is_saved),
        }
    }

    /// True when the patch touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_read.is_none() && self.is_saved.is_none()
    }

    /// Fields set in `other` override fields set in `self`.
    #[must_use]
    pub fn overlay(mut self, other: &ItemPatch) -> Self {
        if other.is_read.is_some() {
            self.is_read = other.is_read;
        }
        if other.is_saved.is_some() {
            self.is_saved = other.is_saved;
        }
        self
    }

    /// Keep only the fields of `self` that `mask` also touches.
    #[must_use]
    pub fn only(mut self, mask: &ItemPatch) -> Self {
        if mask.is_read.is_none() {
            self.is_read = None;
        }
        if mask.is_saved.is_none() {
            self.is_saved = None;
        }
        self
    }

    /// Keep only the fields of `self` that `mask` does not touch.
    #[must_use]
    pub fn without(mut self, mask: &ItemPatch) -> Self {
        if mask.is_read.is_some() {
            self.is_read = None;
        }
        if mask.is_saved.is_some() {
            self.is_saved = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_returns_inverse_of_touched_fields() {
        let mut item = Item::new("a").with_saved(true);
        let inverse = item.apply(&ItemPatch::read(true));
        assert!(item.is_read);
        assert!(item.is_saved);
        assert_eq!(inverse, ItemPatch::read(false));

        item.apply(&inverse);
        assert!(!item.is_read);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut item = Item::new("a");
        let inverse = item.apply(&ItemPatch::default());
        assert!(inverse.is_empty());
        assert_eq!(item, Item::new("a"));
    }

    #[test]
    fn overlay_prefers_later_fields() {
        let merged = ItemPatch::read(true).overlay(&ItemPatch {
            is_read: Some(false),
            is_saved: Some(true),
        });
        assert_eq!(merged.is_read, Some(false));
        assert_eq!(merged.is_saved, Some(true));
    }

    #[test]
    fn without_masks_fields() {
        let patch = ItemPatch {
            is_read: Some(true),
            is_saved: Some(true),
        };
        assert_eq!(patch.without(&ItemPatch::read(false)), ItemPatch::saved(true));
        assert_eq!(patch.only(&ItemPatch::read(false)), ItemPatch::read(true));
    }

    #[test]
    fn item_payload_round_trips_through_flatten() {
        let json = r#"{"id":"x1","is_read":true,"title":"Hello","feed_id":7}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id.as_str(), "x1");
        assert!(item.is_read);
        assert!(!item.is_saved);
        assert_eq!(item.payload.get("title").and_then(|v| v.as_str()), Some("Hello"));
        assert_eq!(item.payload.get("feed_id").and_then(|v| v.as_i64()), Some(7));
    }
}
