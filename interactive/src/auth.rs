use leptos::prelude::*;
use quillboard_client::RequestOptions;
use quillboard_shared::User;
use serde_json::{json, Value};
use tracing::{debug, info};
use wasm_bindgen_futures::spawn_local;
use web_sys::window;

use crate::api;

const LOGIN_URL: &str = "/login";

/// Reactive auth state shared via context.
#[derive(Clone, Copy, Debug)]
pub struct AuthState {
    pub user: RwSignal<Option<User>>,
    pub token: RwSignal<Option<String>>,
}

impl AuthState {
    /// A usable session needs both the token and the profile it belongs to.
    /// Every signed-in-only control gates on this.
    pub fn signed_in(&self) -> bool {
        self.token.with(Option::is_some) && self.user.with(Option::is_some)
    }

    /// Forget the session after the backend rejected its token.
    pub fn expire(&self) {
        info!("session expired, signing out");
        api::clear_session();
        self.token.set(None);
        self.user.set(None);
    }
}

/// Check the URL for `?token=...&user=...` (set by the login redirect),
/// persist both, and clean the URL.
fn consume_url_session() -> Option<(String, Option<User>)> {
    let win = window()?;
    let href = win.location().href().ok()?;
    let url = web_sys::Url::new(&href).ok()?;
    let params = url.search_params();
    let token = params.get("token")?;

    let user = params
        .get("user")
        .and_then(|raw| serde_json::from_str::<User>(&raw).ok());
    api::set_token(&token);
    if let Some(ref u) = user {
        api::set_user(u);
    }

    // Remove the credentials from the visible URL
    params.delete("token");
    params.delete("user");
    let query = params.to_string().as_string().unwrap_or_default();
    let clean = if query.is_empty() {
        url.pathname()
    } else {
        format!("{}?{}", url.pathname(), query)
    };
    let _ = win.history().ok().map(|h| {
        let _ = h.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&clean));
    });

    Some((token, user))
}

/// Wraps children with the auth context.
#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let (initial_token, initial_user) = consume_url_session()
        .map(|(token, user)| (Some(token), user))
        .unwrap_or_else(|| (api::stored_token(), api::stored_user()));

    // A profile without a token is not a session
    let initial_user = initial_token.as_ref().and(initial_user);
    debug!(signed_in = initial_user.is_some(), "session restored");

    let auth = AuthState {
        user: RwSignal::new(initial_user),
        token: RwSignal::new(initial_token),
    };
    provide_context(auth);

    children()
}

/// Signed-in badge with logout, or a login link.
#[component]
pub fn SessionBadge() -> impl IntoView {
    let auth = expect_context::<AuthState>();

    let on_logout = move |_| {
        spawn_local(async move {
            let result = api::client()
                .post::<Value, _>("/auth/logout", &json!({}), RequestOptions::new())
                .await;
            // The local session goes regardless of what the backend says
            if let Err(e) = result {
                debug!(error = %e, "logout request failed");
            }
            api::clear_session();
            auth.token.set(None);
            auth.user.set(None);
        });
    };

    move || {
        if let Some(user) = auth.user.get() {
            view! {
                <div class="quillboard-auth">
                    <img src={user.avatar_url.clone()} alt="" class="quillboard-avatar" width="24" height="24" />
                    <span class="quillboard-username">{user.display_name.clone()}</span>
                    <button class="quillboard-btn quillboard-btn-sm" on:click=on_logout>"Logout"</button>
                </div>
            }
            .into_any()
        } else {
            view! {
                <a class="quillboard-btn" href=LOGIN_URL>"Log in"</a>
            }
            .into_any()
        }
    }
}
