use leptos::prelude::*;
use quillboard_shared::Comment;

use crate::auth::AuthState;
use crate::comments::ThreadContext;

/// Like toggle with count. The count only moves once the backend has
/// answered and the page has been refetched.
#[component]
pub fn LikeButton(comment: Comment) -> impl IntoView {
    let ctx = expect_context::<ThreadContext>();
    let auth = expect_context::<AuthState>();

    let comment_id = comment.id.clone();
    let liked = {
        let comment = comment.clone();
        move || {
            auth.user
                .get()
                .is_some_and(|u| comment.is_liked_by(&u.id))
        }
    };
    let pending = {
        let id = comment_id.clone();
        move || ctx.state.with(|s| s.is_pending(&id))
    };

    let on_click = move |_| {
        let id = comment_id.clone();
        ctx.dispatch(move |thread| async move { thread.like_comment(&id).await.map(|_| ()) });
    };

    view! {
        <button
            class="quillboard-like-btn"
            class:active=liked.clone()
            aria-pressed=move || if liked() { "true" } else { "false" }
            on:click=on_click
            disabled=move || !auth.signed_in() || pending()
        >
            // Unicode heart
            "\u{2665} "
            <span class="quillboard-like-count">{comment.like_count}</span>
        </button>
    }
}
