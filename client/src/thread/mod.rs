//! Paginated, sortable comment + reply thread for a single post.
//!
//! Every mutation is followed by a full refetch of the current page; the
//! thread never splices comments in locally. Loads are ticketed when they are
//! dispatched and only the newest ticket may write state, so a slow response
//! for an old page or sort can never overwrite a newer one.

mod state;
pub mod tree;

use std::cell::{Cell, Ref, RefCell};
use std::future::Future;
use std::rc::Rc;

use quillboard_shared::{Comment, CommentsPage, CreateComment, SortMode, User};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ThreadError};
use crate::http::{ApiClient, RequestOptions};
use crate::token::TokenProvider;
use crate::transport::Transport;

pub use state::{Phase, ReplyBox, ThreadState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was dispatched before this one came back.
    Superseded,
    /// The thread was detached while the request was in flight.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    Cancelled,
}

type Observer = Box<dyn Fn(&ThreadState)>;

pub struct CommentThread<T, P> {
    client: Rc<ApiClient<T, P>>,
    post_id: String,
    viewer: RefCell<Option<User>>,
    state: RefCell<ThreadState>,
    ticket: Cell<u64>,
    attached: Cell<bool>,
    observer: Option<Observer>,
}

impl<T: Transport, P: TokenProvider> CommentThread<T, P> {
    pub fn new(client: Rc<ApiClient<T, P>>, post_id: impl Into<String>) -> Self {
        let limit = client.config().comments_per_page;
        Self {
            client,
            post_id: post_id.into(),
            viewer: RefCell::new(None),
            state: RefCell::new(ThreadState::new(limit)),
            ticket: Cell::new(0),
            attached: Cell::new(true),
            observer: None,
        }
    }

    /// Called with the new state after every change.
    pub fn with_observer(mut self, observer: impl Fn(&ThreadState) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn with_viewer(self, viewer: Option<User>) -> Self {
        *self.viewer.borrow_mut() = viewer;
        self
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn viewer(&self) -> Option<User> {
        self.viewer.borrow().clone()
    }

    pub fn set_viewer(&self, viewer: Option<User>) {
        *self.viewer.borrow_mut() = viewer;
        self.notify();
    }

    pub fn state(&self) -> Ref<'_, ThreadState> {
        self.state.borrow()
    }

    pub fn snapshot(&self) -> ThreadState {
        self.state.borrow().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    /// Stops every in-flight response from touching state. The requests
    /// themselves are left to finish.
    pub fn detach(&self) {
        if self.attached.replace(false) {
            debug!(post_id = %self.post_id, "comment thread detached");
        }
    }

    pub fn can_delete(&self, comment: &Comment) -> bool {
        self.viewer
            .borrow()
            .as_ref()
            .is_some_and(|viewer| comment.can_be_managed_by(viewer))
    }

    pub fn is_liked(&self, comment: &Comment) -> bool {
        self.viewer
            .borrow()
            .as_ref()
            .is_some_and(|viewer| comment.is_liked_by(&viewer.id))
    }

    // ── Loading ──

    pub fn mount(&self) -> impl Future<Output = Result<LoadOutcome, ThreadError>> + '_ {
        let sort = self.state.borrow().sort;
        self.load_page(1, sort)
    }

    /// Fetches one page and replaces the thread with it. The request is
    /// ticketed here, at call time, so dispatch order decides which response
    /// wins regardless of when the returned future is first polled.
    pub fn load_page(
        &self,
        page: u32,
        sort: SortMode,
    ) -> impl Future<Output = Result<LoadOutcome, ThreadError>> + '_ {
        let ticket = (page >= 1).then(|| self.begin_load(page, sort));
        async move {
            let ticket = ticket.ok_or(ThreadError::InvalidPage)?;
            self.run_load(ticket, page, sort).await
        }
    }

    pub fn change_sort(
        &self,
        sort: SortMode,
    ) -> impl Future<Output = Result<LoadOutcome, ThreadError>> + '_ {
        let page = self.state.borrow().page;
        self.load_page(page, sort)
    }

    pub fn change_page(
        &self,
        page: u32,
    ) -> impl Future<Output = Result<LoadOutcome, ThreadError>> + '_ {
        let (page, sort) = {
            let state = self.state.borrow();
            let page = match state.pagination {
                Some(pagination) if page >= 1 => pagination.clamp(page),
                _ => page,
            };
            (page, state.sort)
        };
        self.load_page(page, sort)
    }

    /// Reloads the current page and sort.
    pub fn retry(&self) -> impl Future<Output = Result<LoadOutcome, ThreadError>> + '_ {
        let (page, sort) = {
            let state = self.state.borrow();
            (state.page, state.sort)
        };
        self.load_page(page, sort)
    }

    fn begin_load(&self, page: u32, sort: SortMode) -> u64 {
        let ticket = self.ticket.get() + 1;
        self.ticket.set(ticket);
        debug!(post_id = %self.post_id, page, %sort, ticket, "loading comments");
        self.update(|s| {
            s.phase = Phase::Loading;
            s.page = page;
            s.sort = sort;
            s.error = None;
        });
        ticket
    }

    async fn run_load(
        &self,
        mut ticket: u64,
        mut page: u32,
        sort: SortMode,
    ) -> Result<LoadOutcome, ThreadError> {
        let mut clamped = false;
        loop {
            let result = self.fetch(page, sort).await;

            if !self.attached.get() {
                return Ok(LoadOutcome::Detached);
            }
            let latest = self.ticket.get();
            if ticket != latest {
                debug!(post_id = %self.post_id, ticket, latest, "discarding superseded comment page");
                return Ok(LoadOutcome::Superseded);
            }

            match result {
                Ok(listing) => {
                    let last = listing.pagination.last_page();
                    // The page can vanish under us, e.g. after deleting the
                    // only comment on the last page. Step back once.
                    if page > last && !clamped {
                        clamped = true;
                        page = last;
                        ticket = self.begin_load(page, sort);
                        continue;
                    }
                    self.update(|s| s.apply(listing));
                    return Ok(LoadOutcome::Applied);
                }
                Err(err) => {
                    let message = err.user_message();
                    // Last good comments stay on screen next to the error.
                    self.update(|s| {
                        s.phase = Phase::Errored;
                        s.error = Some(message);
                    });
                    return Err(err.into());
                }
            }
        }
    }

    async fn fetch(&self, page: u32, sort: SortMode) -> Result<CommentsPage, ApiError> {
        let limit = self.state.borrow().limit;
        let path = format!("/comments/post/{}", urlencoding::encode(&self.post_id));
        let options = RequestOptions::new()
            .query("page", page)
            .query("limit", limit)
            .query("sort", sort);
        self.client.get(&path, options).await
    }

    // ── Drafts and the reply box ──

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|s| s.draft = text);
    }

    /// Opens the reply box under `comment_id`, closing any other one. Replies
    /// to replies attach to the reply's top-level comment.
    pub fn open_reply(&self, comment_id: &str) {
        let target = self.thread_root(comment_id);
        self.update(|s| {
            if s.reply.as_ref().map(|r| r.target.as_str()) != Some(target.as_str()) {
                s.reply = Some(ReplyBox {
                    target,
                    draft: String::new(),
                });
            }
        });
    }

    pub fn close_reply(&self) {
        self.update(|s| s.reply = None);
    }

    pub fn set_reply_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|s| {
            if let Some(reply) = s.reply.as_mut() {
                reply.draft = text;
            }
        });
    }

    fn thread_root(&self, comment_id: &str) -> String {
        let state = self.state.borrow();
        match tree::locate(&state.comments, comment_id) {
            Some(found) => {
                let root = found.thread_root();
                if root != comment_id {
                    debug!(comment_id, root_id = root, "reply target is a reply; using its top-level comment");
                }
                root.to_string()
            }
            // Not on this page: let the backend decide.
            None => comment_id.to_string(),
        }
    }

    // ── Mutations ──

    pub async fn submit_draft(&self) -> Result<(), ThreadError> {
        let draft = self.state.borrow().draft.clone();
        self.submit_comment(&draft, None).await
    }

    pub async fn submit_reply(&self) -> Result<(), ThreadError> {
        let reply = self.state.borrow().reply.clone();
        let reply = reply.ok_or(ThreadError::NoReplyOpen)?;
        self.submit_comment(&reply.draft, Some(&reply.target)).await
    }

    /// Posts a comment, or a reply when `parent_comment_id` is set. On
    /// success the draft is cleared if it holds the posted text, the reply
    /// box closes and the current page is refetched. On failure drafts are
    /// left untouched.
    pub async fn submit_comment(
        &self,
        content: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<(), ThreadError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ThreadError::EmptyContent);
        }
        if self.state.borrow().submitting {
            return Err(ThreadError::Busy);
        }

        let body = CreateComment {
            post_id: self.post_id.clone(),
            content: content.to_string(),
            parent_comment_id: parent_comment_id.map(|id| self.thread_root(id)),
        };
        let is_reply = body.parent_comment_id.is_some();

        self.update(|s| s.submitting = true);
        let result = self
            .client
            .post::<Value, _>("/comments", &body, RequestOptions::new())
            .await;

        match result {
            Ok(_) => {
                self.update(|s| {
                    s.submitting = false;
                    s.reply = None;
                    // Only the text that was actually posted is cleared.
                    if !is_reply && s.draft.trim() == content {
                        s.draft.clear();
                    }
                });
                // A failed refetch is reported through the thread state.
                let _ = self.retry().await;
                Ok(())
            }
            Err(err) => {
                let message = err.user_message();
                self.update(|s| {
                    s.submitting = false;
                    s.error = Some(message);
                });
                Err(err.into())
            }
        }
    }

    /// Likes the comment, or unlikes it if the viewer already does. The count
    /// shown afterwards is the refetched one.
    pub async fn like_comment(&self, comment_id: &str) -> Result<LikeToggle, ThreadError> {
        let viewer_id = self
            .viewer
            .borrow()
            .as_ref()
            .map(|v| v.id.clone())
            .ok_or(ThreadError::NotAuthenticated)?;
        let toggle = {
            let state = self.state.borrow();
            let comment = state
                .find(comment_id)
                .ok_or_else(|| ThreadError::UnknownComment(comment_id.to_string()))?;
            if comment.is_liked_by(&viewer_id) {
                LikeToggle::Unliked
            } else {
                LikeToggle::Liked
            }
        };

        self.begin_pending(comment_id)?;
        let path = format!("/comments/{}/like", urlencoding::encode(comment_id));
        let result = self
            .client
            .post::<Value, _>(&path, &json!({}), RequestOptions::new())
            .await;
        self.finish_pending(comment_id, result).await?;
        Ok(toggle)
    }

    /// Deletes a comment the viewer authored (or any comment, for admins)
    /// once `confirm` agrees. The backend re-checks ownership; its refusal
    /// comes back as an ordinary [`ApiError::Envelope`].
    pub async fn delete_comment(
        &self,
        comment_id: &str,
        confirm: impl FnOnce(&Comment) -> bool,
    ) -> Result<Deletion, ThreadError> {
        let comment = self
            .state
            .borrow()
            .find(comment_id)
            .cloned()
            .ok_or_else(|| ThreadError::UnknownComment(comment_id.to_string()))?;
        if self.viewer.borrow().is_none() {
            return Err(ThreadError::NotAuthenticated);
        }
        if !self.can_delete(&comment) {
            return Err(ThreadError::Forbidden);
        }
        if !confirm(&comment) {
            return Ok(Deletion::Cancelled);
        }

        self.begin_pending(comment_id)?;
        let path = format!("/comments/{}", urlencoding::encode(comment_id));
        let result = self.client.delete::<Value>(&path, RequestOptions::new()).await;
        self.finish_pending(comment_id, result).await?;
        Ok(Deletion::Deleted)
    }

    fn begin_pending(&self, comment_id: &str) -> Result<(), ThreadError> {
        if self.state.borrow().is_pending(comment_id) {
            return Err(ThreadError::Busy);
        }
        self.update(|s| {
            s.pending.insert(comment_id.to_string());
        });
        Ok(())
    }

    async fn finish_pending(
        &self,
        comment_id: &str,
        result: Result<Value, ApiError>,
    ) -> Result<(), ThreadError> {
        match result {
            Ok(_) => {
                self.update(|s| {
                    s.pending.remove(comment_id);
                });
                let _ = self.retry().await;
                Ok(())
            }
            Err(err) => {
                let message = err.user_message();
                self.update(|s| {
                    s.pending.remove(comment_id);
                    s.error = Some(message);
                });
                Err(err.into())
            }
        }
    }

    // ── Plumbing ──

    fn update(&self, change: impl FnOnce(&mut ThreadState)) {
        if !self.attached.get() {
            return;
        }
        change(&mut self.state.borrow_mut());
        self.notify();
    }

    fn notify(&self) {
        if !self.attached.get() {
            return;
        }
        if let Some(observer) = &self.observer {
            observer(&self.state.borrow());
        }
    }
}
