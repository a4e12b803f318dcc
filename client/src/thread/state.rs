use std::collections::BTreeSet;

use quillboard_shared::{Comment, CommentsPage, Pagination, SortMode};
use tracing::warn;

use super::tree;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

/// The one reply box that may be open at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyBox {
    pub target: String,
    pub draft: String,
}

/// Client-only view of a comment thread. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadState {
    pub phase: Phase,
    pub sort: SortMode,
    pub page: u32,
    pub limit: u32,
    pub comments: Vec<Comment>,
    pub pagination: Option<Pagination>,
    pub draft: String,
    pub reply: Option<ReplyBox>,
    pub submitting: bool,
    /// Comments with a like or delete in flight.
    pub pending: BTreeSet<String>,
    pub error: Option<String>,
}

impl ThreadState {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            phase: Phase::Idle,
            sort: SortMode::default(),
            page: 1,
            limit: limit.max(1),
            comments: Vec::new(),
            pagination: None,
            draft: String::new(),
            reply: None,
            submitting: false,
            pending: BTreeSet::new(),
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Loading)
    }

    /// Loaded successfully and there is nothing to show. Distinct from an
    /// errored load, which may also have no comments.
    pub fn is_empty(&self) -> bool {
        self.phase == Phase::Loaded && self.comments.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.pagination.map_or(0, |p| p.total)
    }

    pub fn is_pending(&self, comment_id: &str) -> bool {
        self.pending.contains(comment_id)
    }

    pub fn reply_open_for(&self, comment_id: &str) -> bool {
        self.reply.as_ref().is_some_and(|r| r.target == comment_id)
    }

    pub fn find(&self, comment_id: &str) -> Option<&Comment> {
        tree::locate(&self.comments, comment_id).map(|found| found.comment())
    }

    /// Replaces the thread wholesale; nothing from the previous page survives.
    /// The page count is recomputed from `total` and at most `limit` top-level
    /// comments are kept, whatever the backend sent.
    pub(crate) fn apply(&mut self, listing: CommentsPage) {
        let mut pagination = listing.pagination;
        if pagination.limit == 0 {
            pagination.limit = self.limit;
        }
        let pages = Pagination::pages_for(pagination.total, pagination.limit);
        if pages != pagination.pages {
            warn!(reported = pagination.pages, pages, total = pagination.total, "correcting page count");
            pagination.pages = pages;
        }

        let mut comments = tree::normalize(listing.comments);
        let cap = pagination.limit.min(self.limit) as usize;
        if comments.len() > cap {
            warn!(received = comments.len(), limit = cap, "dropping top-level comments beyond the page limit");
            comments.truncate(cap);
        }

        self.comments = comments;
        self.pagination = Some(pagination);
        self.phase = Phase::Loaded;
        self.error = None;
    }
}
