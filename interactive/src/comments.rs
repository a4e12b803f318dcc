use std::future::Future;
use std::rc::Rc;

use leptos::prelude::*;
use quillboard_client::{ApiError, CommentThread, ThreadError, ThreadState};
use quillboard_shared::{Comment, SortMode};
use tracing::debug;
use wasm_bindgen_futures::spawn_local;
use web_sys::window;

use crate::api::{self, BrowserTransport, StoredToken};
use crate::auth::{AuthState, SessionBadge};
use crate::likes::LikeButton;

type Thread = CommentThread<BrowserTransport, StoredToken>;

/// Handle to the mounted thread engine and its mirrored state, shared via
/// context with every component in the section.
#[derive(Clone, Copy)]
pub struct ThreadContext {
    thread: StoredValue<Rc<Thread>, LocalStorage>,
    pub state: RwSignal<ThreadState>,
    notice: RwSignal<Option<String>>,
    auth: AuthState,
}

impl ThreadContext {
    /// Runs `op` against the engine in the background. API failures are
    /// already recorded in the thread state; local refusals become a notice.
    pub fn dispatch<F, Fut>(&self, op: F)
    where
        F: FnOnce(Rc<Thread>) -> Fut + 'static,
        Fut: Future<Output = Result<(), ThreadError>> + 'static,
    {
        let Some(thread) = self.thread.try_get_value() else {
            return;
        };
        let ctx = *self;
        ctx.notice.set(None);
        spawn_local(async move {
            if let Err(err) = op(thread).await {
                ctx.report(&err);
            }
        });
    }

    fn with_thread<R>(&self, f: impl FnOnce(&Thread) -> R) -> Option<R> {
        self.thread.try_with_value(|thread| f(thread))
    }

    fn report(&self, err: &ThreadError) {
        if err.api().is_some_and(ApiError::is_unauthorized) {
            self.auth.expire();
        }
        if err.is_validation() {
            self.notice.set(Some(err.user_message()));
        } else {
            debug!(error = %err, "comment action failed");
        }
    }
}

fn confirm_delete(_: &Comment) -> bool {
    window()
        .and_then(|w| {
            w.confirm_with_message("Are you sure you want to delete this comment?")
                .ok()
        })
        .unwrap_or(false)
}

/// Top-level comment section for a blog post.
#[component]
pub fn CommentSection(post_id: String) -> impl IntoView {
    let auth = expect_context::<AuthState>();

    let thread = Thread::new(Rc::new(api::client()), post_id).with_viewer(auth.user.get_untracked());
    let state = RwSignal::new(thread.snapshot());
    let thread = thread.with_observer(move |s| {
        state.try_set(s.clone());
    });

    let ctx = ThreadContext {
        thread: StoredValue::new_local(Rc::new(thread)),
        state,
        notice: RwSignal::new(None),
        auth,
    };
    provide_context(ctx);

    // Keep the engine's viewer in step with login and logout
    Effect::new(move |_| {
        let viewer = auth.user.get();
        ctx.with_thread(|t| t.set_viewer(viewer));
    });

    on_cleanup(move || {
        ctx.with_thread(Thread::detach);
    });

    ctx.dispatch(|thread| async move { thread.mount().await.map(|_| ()) });

    let comments = Memo::new(move |_| state.with(|s| s.comments.clone()));
    let error = Memo::new(move |_| state.with(|s| s.error.clone()));
    let first_load = Memo::new(move |_| state.with(|s| s.is_loading() && s.comments.is_empty()));
    let empty = Memo::new(move |_| state.with(ThreadState::is_empty));

    let on_retry = move |_| ctx.dispatch(|t| async move { t.retry().await.map(|_| ()) });

    view! {
        <section class="quillboard-comments">
            <div class="quillboard-comments-header">
                <h3>{move || format!("Comments ({})", state.with(ThreadState::total))}</h3>
                <SortPicker />
            </div>
            <SessionBadge />
            <CommentForm />
            <Show when=move || ctx.notice.get().is_some()>
                <p class="quillboard-hint">{move || ctx.notice.get().unwrap_or_default()}</p>
            </Show>
            <Show when=move || error.get().is_some()>
                <div class="quillboard-error" role="alert">
                    <span>{move || error.get().unwrap_or_default()}</span>
                    <button class="quillboard-btn quillboard-btn-sm" on:click=on_retry>"Retry"</button>
                </div>
            </Show>
            <Show when=move || first_load.get()>
                <p class="quillboard-loading">"Loading comments..."</p>
            </Show>
            <Show when=move || empty.get()>
                <p class="quillboard-empty">"No comments yet. Be the first to comment!"</p>
            </Show>
            <div
                class="quillboard-comment-list"
                class:quillboard-stale=move || state.with(|s| s.is_loading())
            >
                // Keyed on the whole comment so refetched changes re-render
                <For
                    each=move || comments.get()
                    key=|c| c.clone()
                    let:comment
                >
                    <CommentItem comment=comment />
                </For>
            </div>
            <Pager />
        </section>
    }
}

#[component]
fn SortPicker() -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();

    let on_change = move |ev: leptos::ev::Event| {
        let Ok(sort) = event_target_value(&ev).parse::<SortMode>() else {
            return;
        };
        ctx.dispatch(move |t| async move { t.change_sort(sort).await.map(|_| ()) });
    };

    view! {
        <select
            class="quillboard-sort"
            on:change=on_change
            prop:value=move || ctx.state.with(|s| s.sort.as_str())
        >
            {SortMode::ALL
                .iter()
                .map(|mode| view! { <option value={mode.as_str()}>{mode.label()}</option> })
                .collect_view()}
        </select>
    }
}

/// Form for posting a new top-level comment.
#[component]
fn CommentForm() -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let auth = ctx.auth;
    let state = ctx.state;

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        ctx.dispatch(|t| async move { t.submit_draft().await });
    };

    move || {
        if auth.signed_in() {
            view! {
                <form class="quillboard-comment-form" on:submit=on_submit>
                    <textarea
                        class="quillboard-textarea"
                        placeholder="Write a comment..."
                        prop:value=move || state.with(|s| s.draft.clone())
                        on:input=move |ev| {
                            let text = event_target_value(&ev);
                            ctx.with_thread(|t| t.set_draft(text));
                        }
                    />
                    <button
                        class="quillboard-btn"
                        type="submit"
                        disabled=move || state.with(|s| s.submitting || s.draft.trim().is_empty())
                    >
                        {move || if state.with(|s| s.submitting) { "Posting..." } else { "Post Comment" }}
                    </button>
                </form>
            }
            .into_any()
        } else {
            view! { <p class="quillboard-hint">"Log in to join the discussion."</p> }.into_any()
        }
    }
}

/// A top-level comment with its replies and, when open, the reply box.
#[component]
fn CommentItem(comment: Comment) -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let id = comment.id.clone();
    let replies = comment.replies.clone();

    view! {
        <div class="quillboard-thread">
            <CommentCard comment=comment />
            <Show when=move || ctx.state.with(|s| s.reply_open_for(&id))>
                <ReplyForm />
            </Show>
            <div class="quillboard-replies">
                <For
                    each=move || replies.clone()
                    key=|c| c.id.clone()
                    let:reply
                >
                    <CommentCard comment=reply />
                </For>
            </div>
        </div>
    }
}

/// Header, body and actions of a single comment or reply.
#[component]
fn CommentCard(comment: Comment) -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let auth = ctx.auth;

    let can_manage = {
        let comment = comment.clone();
        move || {
            auth.user
                .with(|u| u.as_ref().is_some_and(|u| comment.can_be_managed_by(u)))
        }
    };
    let pending = {
        let id = comment.id.clone();
        move || ctx.state.with(|s| s.is_pending(&id))
    };

    let on_reply = {
        let id = comment.id.clone();
        move |_| {
            ctx.with_thread(|t| t.open_reply(&id));
        }
    };
    let on_delete = {
        let id = comment.id.clone();
        move |_| {
            let id = id.clone();
            ctx.dispatch(move |t| async move {
                t.delete_comment(&id, confirm_delete).await.map(|_| ())
            });
        }
    };

    view! {
        <div class="quillboard-comment" class:quillboard-reply={!comment.is_top_level()}>
            <div class="quillboard-comment-header">
                <img src={comment.author.avatar_url.clone()} alt="" class="quillboard-avatar" width="24" height="24" />
                <strong>{comment.author.display_name.clone()}</strong>
                <time datetime={comment.created_at.clone()}>{comment.created_at.clone()}</time>
                <Show when=can_manage>
                    <button
                        class="quillboard-btn quillboard-btn-sm quillboard-btn-danger"
                        on:click=on_delete.clone()
                        disabled=pending.clone()
                    >
                        "Delete"
                    </button>
                </Show>
            </div>
            <p class="quillboard-comment-body">{comment.content.clone()}</p>
            <div class="quillboard-comment-actions">
                <LikeButton comment=comment.clone() />
                <Show when=move || auth.signed_in()>
                    <button class="quillboard-btn quillboard-btn-sm" on:click=on_reply.clone()>"Reply"</button>
                </Show>
            </div>
        </div>
    }
}

#[component]
fn ReplyForm() -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let state = ctx.state;
    let draft = move || {
        state.with(|s| s.reply.as_ref().map(|r| r.draft.clone()).unwrap_or_default())
    };

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        ctx.dispatch(|t| async move { t.submit_reply().await });
    };

    view! {
        <form class="quillboard-reply-form" on:submit=on_submit>
            <input
                class="quillboard-input"
                type="text"
                placeholder="Write a reply..."
                prop:value=draft
                on:input=move |ev| {
                    let text = event_target_value(&ev);
                    ctx.with_thread(|t| t.set_reply_draft(text));
                }
            />
            <button
                class="quillboard-btn quillboard-btn-sm"
                type="submit"
                disabled=move || state.with(|s| s.submitting) || draft().trim().is_empty()
            >
                "Reply"
            </button>
            <button
                class="quillboard-btn quillboard-btn-sm"
                type="button"
                on:click=move |_| {
                    ctx.with_thread(Thread::close_reply);
                }
            >
                "Cancel"
            </button>
        </form>
    }
}

#[component]
fn Pager() -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let state = ctx.state;
    let pagination = Memo::new(move |_| state.with(|s| s.pagination));

    let go = move |page: u32| {
        ctx.dispatch(move |t| async move { t.change_page(page).await.map(|_| ()) });
    };

    view! {
        <Show when=move || pagination.get().is_some_and(|p| p.pages > 1)>
            <div class="quillboard-pagination">
                <button
                    class="quillboard-btn quillboard-btn-sm"
                    disabled=move || state.with(|s| s.is_loading()) || !pagination.get().is_some_and(|p| p.has_prev())
                    on:click=move |_| go(state.with_untracked(|s| s.page).saturating_sub(1))
                >
                    "Prev"
                </button>
                <span>
                    {move || {
                        let pages = pagination.get().map_or(1, |p| p.pages);
                        format!("Page {} of {}", state.with(|s| s.page), pages)
                    }}
                </span>
                <button
                    class="quillboard-btn quillboard-btn-sm"
                    disabled=move || state.with(|s| s.is_loading()) || !pagination.get().is_some_and(|p| p.has_next())
                    on:click=move |_| go(state.with_untracked(|s| s.page) + 1)
                >
                    "Next"
                </button>
            </div>
        </Show>
    }
}
