//! URL Frontier: deduplicated, status-indexed collection of work items.
//!
//! Every operation here is total and non-blocking — no IO, no suspension
//! point. A single [`parking_lot::Mutex`] guards the three indices together
//! so that writers are trivially linearizable: this is the "coarse lock"
//! strategy the design this engine follows explicitly sanctions, since a
//! critical section here never touches the browser or the filesystem.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::{canonicalize_url, stable_id};

/// Lifecycle status of a [`UrlEntity`] within a [`Frontier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrlStatus {
    Pending,
    Processing,
    Visited,
    Failed,
    Blocked,
    /// The engine never transitions an entity here directly and treats it
    /// as an alias of `Visited` (see DESIGN.md).
    Completed,
}

impl UrlStatus {
    pub const ALL: [UrlStatus; 6] = [
        UrlStatus::Pending,
        UrlStatus::Processing,
        UrlStatus::Visited,
        UrlStatus::Failed,
        UrlStatus::Blocked,
        UrlStatus::Completed,
    ];
}

/// A single URL known to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEntity {
    pub id: String,
    pub url: String,
    pub category: String,
    pub status: UrlStatus,
    /// Milliseconds since the Unix epoch; monotonic per-entity across
    /// `update_status` calls (never decreases).
    pub updated_at_ms: u64,
    pub title: Option<String>,
}

impl UrlEntity {
    /// Construct a new entity in `Pending` status from a raw (not yet
    /// canonicalized) URL string. Returns `None` if the URL cannot be
    /// parsed even after the `https://` upgrade attempt.
    #[must_use]
    pub fn new(raw_url: &str, category: impl Into<String>) -> Option<Self> {
        let canonical = canonicalize_url(raw_url)?;
        let id = stable_id(&canonical);
        Some(Self {
            id,
            url: canonical,
            category: category.into(),
            status: UrlStatus::Pending,
            updated_at_ms: now_ms(),
            title: None,
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct FrontierInner {
    by_id: HashMap<String, UrlEntity>,
    by_url: HashMap<String, String>,
    by_status: HashMap<UrlStatus, Vec<String>>,
}

impl FrontierInner {
    fn new() -> Self {
        let mut by_status = HashMap::new();
        for status in UrlStatus::ALL {
            by_status.insert(status, Vec::new());
        }
        Self {
            by_id: HashMap::new(),
            by_url: HashMap::new(),
            by_status,
        }
    }

    fn remove_from_status_set(&mut self, status: UrlStatus, id: &str) {
        if let Some(set) = self.by_status.get_mut(&status) {
            set.retain(|existing| existing != id);
        }
    }
}

/// The URL Frontier (C1): deduplicated, status-indexed work queue shared
/// across every live tab.
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierInner::new()),
        }
    }

    /// Insert `entity`, keyed by its already-canonical URL. Returns `true`
    /// if newly inserted, `false` if an entity with the same URL already
    /// existed (in which case `entity` is discarded — the caller should
    /// look the existing one up via [`Frontier::by_url`] if it needs it).
    pub fn add(&self, entity: UrlEntity) -> bool {
        let mut inner = self.inner.lock();
        if inner.by_url.contains_key(&entity.url) {
            return false;
        }
        inner.by_status.entry(entity.status).or_default().push(entity.id.clone());
        inner.by_url.insert(entity.url.clone(), entity.id.clone());
        inner.by_id.insert(entity.id.clone(), entity);
        true
    }

    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<UrlEntity> {
        self.inner.lock().by_id.get(id).cloned()
    }

    #[must_use]
    pub fn by_url(&self, url: &str) -> Option<UrlEntity> {
        let inner = self.inner.lock();
        let id = inner.by_url.get(url)?;
        inner.by_id.get(id).cloned()
    }

    /// Entities currently in `status`, optionally limited, ordered
    /// oldest-updated-first when `oldest_first` is true (ties broken by
    /// insertion order).
    #[must_use]
    pub fn by_status(&self, status: UrlStatus, limit: Option<usize>, oldest_first: bool) -> Vec<UrlEntity> {
        let inner = self.inner.lock();
        let Some(ids) = inner.by_status.get(&status) else {
            return Vec::new();
        };
        let mut entities: Vec<UrlEntity> = ids
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect();

        if oldest_first {
            entities.sort_by_key(|e| e.updated_at_ms);
        } else {
            entities.sort_by_key(|e| std::cmp::Reverse(e.updated_at_ms));
        }

        if let Some(limit) = limit {
            entities.truncate(limit);
        }
        entities
    }

    /// Atomically moves `id` from its current status-set into `status`.
    /// Returns `false` if `id` is unknown.
    pub fn update_status(&self, id: &str, status: UrlStatus) -> bool {
        let mut inner = self.inner.lock();
        let Some(old_status) = inner.by_id.get(id).map(|e| e.status) else {
            return false;
        };

        inner.remove_from_status_set(old_status, id);
        if let Some(entity) = inner.by_id.get_mut(id) {
            entity.status = status;
            entity.updated_at_ms = now_ms();
        }
        inner.by_status.entry(status).or_default().push(id.to_string());
        true
    }

    #[must_use]
    pub fn count_by_status(&self, status: UrlStatus) -> usize {
        self.inner
            .lock()
            .by_status
            .get(&status)
            .map_or(0, Vec::len)
    }

    #[must_use]
    pub fn snapshot(&self) -> HashMap<UrlStatus, usize> {
        self.inner
            .lock()
            .by_status
            .iter()
            .map(|(status, ids)| (*status, ids.len()))
            .collect()
    }

    #[must_use]
    pub fn all(&self) -> Vec<UrlEntity> {
        self.inner.lock().by_id.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_under_url_equivalence() {
        let frontier = Frontier::new();
        let a = UrlEntity::new("https://example.org/", "entry").expect("parses");
        let b = UrlEntity::new("https://example.org/", "discovered").expect("parses");

        assert!(frontier.add(a), "first insert should succeed");
        assert!(!frontier.add(b), "duplicate url should be rejected");
        assert_eq!(frontier.len(), 1, "frontier size increases exactly once");
    }

    #[test]
    fn every_entity_is_in_exactly_one_status_set() {
        let frontier = Frontier::new();
        let entity = UrlEntity::new("https://example.org/a", "entry").expect("parses");
        let id = entity.id.clone();
        frontier.add(entity);

        assert!(frontier.update_status(&id, UrlStatus::Processing));
        assert!(frontier.update_status(&id, UrlStatus::Visited));

        let total: usize = UrlStatus::ALL.iter().map(|s| frontier.count_by_status(*s)).sum();
        assert_eq!(total, 1);
        assert_eq!(frontier.count_by_status(UrlStatus::Visited), 1);
        assert_eq!(frontier.count_by_status(UrlStatus::Pending), 0);
    }

    #[test]
    fn update_status_on_unknown_id_returns_false() {
        let frontier = Frontier::new();
        assert!(!frontier.update_status("missing", UrlStatus::Visited));
    }

    #[test]
    fn visited_query_excludes_pending_after_transition() {
        let frontier = Frontier::new();
        let entity = UrlEntity::new("https://example.org/b", "entry").expect("parses");
        let id = entity.id.clone();
        frontier.add(entity);
        frontier.update_status(&id, UrlStatus::Visited);

        let visited = frontier.by_status(UrlStatus::Visited, None, true);
        assert!(visited.iter().any(|e| e.id == id));
        let pending = frontier.by_status(UrlStatus::Pending, None, true);
        assert!(pending.iter().all(|e| e.id != id));
    }

    #[test]
    fn by_status_oldest_first_orders_by_updated_at() {
        let frontier = Frontier::new();
        let first = UrlEntity::new("https://example.org/1", "entry").expect("parses");
        let id_first = first.id.clone();
        frontier.add(first);

        std::thread::sleep(std::time::Duration::from_millis(2));

        let second = UrlEntity::new("https://example.org/2", "entry").expect("parses");
        frontier.add(second);

        let got = frontier.by_status(UrlStatus::Pending, None, true);
        assert_eq!(got.first().expect("has entries").id, id_first);
    }
}
