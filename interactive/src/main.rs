mod api;
mod auth;
mod comments;
mod likes;
mod logging;

use leptos::prelude::*;
use wasm_bindgen::JsCast;

fn main() {
    console_error_panic_hook::set_once();
    logging::init();

    let document = web_sys::window()
        .expect("no window")
        .document()
        .expect("no document");

    // Mount the comment section if the mount point exists
    let Some(el) = document.get_element_by_id("quillboard-comments") else {
        tracing::debug!("no comment mount point on this page");
        return;
    };
    let post_id = el.get_attribute("data-post-id").unwrap_or_default();
    if post_id.is_empty() {
        tracing::warn!("comment mount point has no data-post-id");
        return;
    }

    let html_el: web_sys::HtmlElement = el.unchecked_into();
    leptos::mount::mount_to(html_el, move || {
        view! {
            <auth::AuthProvider>
                <comments::CommentSection post_id=post_id.clone() />
            </auth::AuthProvider>
        }
    })
    .forget();
}
