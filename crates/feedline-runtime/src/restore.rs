#![forbid(unsafe_code)]

//! One-shot scroll restoration across list remounts.
//!
//! Before leaving a list (opening an article, say) the session saves the id
//! of the row at the top of the viewport together with the identity of the
//! list it came from. When a list mounts again, [`ScrollRestoration::try_restore`]
//! looks for that id among the loaded items:
//!
//! | Situation                         | Token   | Outcome              |
//! |-----------------------------------|---------|----------------------|
//! | no token                          | -       | `NoToken`            |
//! | identity differs                  | deleted | `Discarded`          |
//! | id found at `i`                   | deleted | `Restored(i)`        |
//! | id missing, pages still loading   | kept    | `Pending`            |
//! | id missing, loading finished      | deleted | `GaveUp`             |
//!
//! The token lives in a [`SessionStore`] and is flushed after every change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use feedline_core::{Item, ItemId};

use crate::storage::SessionStore;
use crate::summary::ListIdentity;

/// Storage key of the token.
pub const RESTORE_KEY: &str = "feedline.scroll_restore";

/// Schema version of the stored token.
pub const TOKEN_VERSION: u32 = 1;

/// What gets persisted between mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreToken {
    /// Row to bring back into view.
    pub target_item_id: ItemId,
    /// Path form of the list the row belonged to.
    pub source_list_identity: String,
}

/// Result of a restore attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was saved.
    NoToken,
    /// The token belonged to another list and was dropped.
    Discarded,
    /// The target is at this index; the token was consumed.
    Restored(usize),
    /// The target is not loaded yet; try again after the next page.
    Pending,
    /// Loading finished without finding the target; the token was dropped.
    GaveUp,
}

impl RestoreOutcome {
    /// True when a later attempt could still succeed.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Saves and consumes the scroll-restoration token.
#[derive(Debug, Clone)]
pub struct ScrollRestoration {
    store: Arc<SessionStore>,
    key: String,
}

impl ScrollRestoration {
    /// Restoration backed by `store` under [`RESTORE_KEY`].
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            key: RESTORE_KEY.to_owned(),
        }
    }

    /// Use a different storage key (one per window, for instance).
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Storage key in use.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remember `item_id` as the row to return to in `identity`.
    pub fn save_target(&self, item_id: &ItemId, identity: &ListIdentity) {
        let token = RestoreToken {
            target_item_id: item_id.clone(),
            source_list_identity: identity.to_path(),
        };
        if let Err(error) = self.store.set_json(self.key.clone(), TOKEN_VERSION, &token) {
            tracing::warn!(%error, "failed to encode scroll restore token");
            return;
        }
        self.flush();
        tracing::debug!(target = %item_id, list = %identity, "scroll restore target saved");
    }

    /// The stored token, if it decodes.
    #[must_use]
    pub fn peek(&self) -> Option<RestoreToken> {
        self.store
            .get_json::<RestoreToken>(&self.key, TOKEN_VERSION)
            .ok()
            .flatten()
    }

    /// Forget any saved token.
    pub fn clear(&self) {
        if self.store.remove(&self.key).is_some() {
            self.flush();
        }
    }

    /// Try to resolve the saved token against the items loaded so far.
    pub fn try_restore(
        &self,
        items: &[Item],
        current: &ListIdentity,
        still_loading: bool,
    ) -> RestoreOutcome {
        let token = match self.store.get_json::<RestoreToken>(&self.key, TOKEN_VERSION) {
            Ok(Some(token)) => token,
            Ok(None) => return RestoreOutcome::NoToken,
            Err(error) => {
                tracing::warn!(%error, "dropping undecodable scroll restore token");
                self.clear();
                return RestoreOutcome::NoToken;
            }
        };

        if token.source_list_identity != current.to_path() {
            tracing::debug!(
                saved = %token.source_list_identity,
                current = %current,
                "scroll restore token belongs to another list"
            );
            self.clear();
            return RestoreOutcome::Discarded;
        }

        if let Some(index) = items.iter().position(|item| item.id == token.target_item_id) {
            self.clear();
            tracing::debug!(target = %token.target_item_id, index, "scroll position restored");
            return RestoreOutcome::Restored(index);
        }

        if still_loading {
            RestoreOutcome::Pending
        } else {
            tracing::debug!(target = %token.target_item_id, "scroll restore target not in list");
            self.clear();
            RestoreOutcome::GaveUp
        }
    }

    fn flush(&self) {
        if let Err(error) = self.store.flush() {
            tracing::warn!(%error, key = %self.key, "session storage flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter().map(|id| Item::new(*id)).collect()
    }

    fn restoration() -> ScrollRestoration {
        ScrollRestoration::new(SessionStore::in_memory().shared())
    }

    #[test]
    fn missing_token_is_no_token() {
        let r = restoration();
        assert_eq!(
            r.try_restore(&items(&["a"]), &ListIdentity::All, false),
            RestoreOutcome::NoToken
        );
    }

    #[test]
    fn found_target_is_consumed_once() {
        let r = restoration();
        r.save_target(&ItemId::new("b"), &ListIdentity::All);
        let list = items(&["a", "b", "c"]);
        assert_eq!(r.try_restore(&list, &ListIdentity::All, false), RestoreOutcome::Restored(1));
        assert_eq!(r.try_restore(&list, &ListIdentity::All, false), RestoreOutcome::NoToken);
    }

    #[test]
    fn other_list_discards_token() {
        let r = restoration();
        r.save_target(&ItemId::new("b"), &ListIdentity::All);
        let feed = ListIdentity::Feed("42".into());
        assert_eq!(r.try_restore(&items(&["b"]), &feed, false), RestoreOutcome::Discarded);
        assert!(r.peek().is_none());
    }

    #[test]
    fn pending_while_loading_then_gives_up() {
        let r = restoration();
        r.save_target(&ItemId::new("z"), &ListIdentity::All);
        let list = items(&["a", "b"]);
        assert_eq!(r.try_restore(&list, &ListIdentity::All, true), RestoreOutcome::Pending);
        assert!(r.peek().is_some());
        assert_eq!(r.try_restore(&list, &ListIdentity::All, false), RestoreOutcome::GaveUp);
        assert!(r.peek().is_none());
    }

    #[test]
    fn undecodable_token_is_dropped() {
        let store = SessionStore::in_memory().shared();
        store.set(RESTORE_KEY, TOKEN_VERSION, b"not json".to_vec());
        let r = ScrollRestoration::new(Arc::clone(&store));
        assert_eq!(
            r.try_restore(&items(&["a"]), &ListIdentity::All, false),
            RestoreOutcome::NoToken
        );
        assert!(store.get(RESTORE_KEY).is_none());
    }

    #[test]
    fn old_token_version_is_dropped() {
        let store = SessionStore::in_memory().shared();
        let token = RestoreToken {
            target_item_id: ItemId::new("a"),
            source_list_identity: "/articles".into(),
        };
        store.set_json(RESTORE_KEY, TOKEN_VERSION + 1, &token).unwrap();
        let r = ScrollRestoration::new(store);
        assert_eq!(
            r.try_restore(&items(&["a"]), &ListIdentity::All, false),
            RestoreOutcome::NoToken
        );
    }

    #[test]
    fn token_survives_storage_flush() {
        let store = SessionStore::in_memory().shared();
        let r = ScrollRestoration::new(Arc::clone(&store)).with_key("window-2.restore");
        r.save_target(&ItemId::new("a"), &ListIdentity::Saved);
        assert!(!store.is_dirty());
        assert_eq!(
            r.peek().map(|t| t.source_list_identity),
            Some("/saved".to_owned())
        );
    }
}
