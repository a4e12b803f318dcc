//! In-memory stand-in for the blog backend's comment API, speaking the same
//! `{ success, data, message }` envelope.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use quillboard_client::{ApiClient, ClientConfig, ReqwestTransport, TokenSlot};
use serde::Deserialize;
use serde_json::{json, Value};

pub type TestClient = ApiClient<ReqwestTransport, TokenSlot>;

type Reply = (StatusCode, Json<Value>);

struct StoredComment {
    id: String,
    post: String,
    parent: Option<String>,
    author: String,
    content: String,
    likes: BTreeSet<String>,
    seq: u64,
}

#[derive(Default)]
struct Store {
    seq: u64,
    comments: Vec<StoredComment>,
}

type Shared = Arc<Mutex<Store>>;

/// Known accounts: `(id, is_admin)`. Each authenticates as `Bearer token-<id>`.
const USERS: &[(&str, bool)] = &[("ann", false), ("bob", false), ("root", true)];

pub fn token_for(user_id: &str) -> String {
    format!("token-{user_id}")
}

fn ok(status: StatusCode, data: Value) -> Reply {
    (
        status,
        Json(json!({"success": true, "data": data, "timestamp": "2024-05-01T00:00:00Z"})),
    )
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({"success": false, "message": message})))
}

fn viewer(headers: &HeaderMap) -> Option<(&'static str, bool)> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    USERS
        .iter()
        .find(|(id, _)| token_for(id) == token)
        .copied()
}

fn render(c: &StoredComment, replies: Vec<Value>) -> Value {
    let stamp = format!("2024-05-01T10:{:02}:{:02}Z", c.seq / 60, c.seq % 60);
    json!({
        "_id": c.id,
        "content": c.content,
        "author": {"_id": c.author, "username": c.author, "fullName": c.author, "avatar": ""},
        "post": c.post,
        "parentComment": c.parent,
        "replies": replies,
        "likes": c.likes,
        "likeCount": c.likes.len(),
        "isSpam": false,
        "createdAt": stamp,
        "updatedAt": stamp,
    })
}

fn render_with_replies(store: &Store, c: &StoredComment) -> Value {
    let mut replies: Vec<&StoredComment> = store
        .comments
        .iter()
        .filter(|r| r.parent.as_deref() == Some(c.id.as_str()))
        .collect();
    replies.sort_by_key(|r| r.seq);
    let replies = replies.into_iter().map(|r| render(r, Vec::new())).collect();
    render(c, replies)
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<String>,
}

async fn list_comments(
    State(store): State<Shared>,
    Path(post_id): Path<String>,
    Query(q): Query<ListQuery>,
) -> Reply {
    let store = store.lock().unwrap();
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(10).max(1);

    let mut top: Vec<&StoredComment> = store
        .comments
        .iter()
        .filter(|c| c.post == post_id && c.parent.is_none())
        .collect();
    match q.sort.as_deref() {
        Some("oldest") => top.sort_by_key(|c| c.seq),
        Some("mostLiked") => top.sort_by(|a, b| b.likes.len().cmp(&a.likes.len())),
        _ => top.sort_by(|a, b| b.seq.cmp(&a.seq)),
    }

    let total = top.len() as u64;
    let pages = total.div_ceil(u64::from(limit)).max(1);
    let comments: Vec<Value> = top
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .map(|c| render_with_replies(&store, c))
        .collect();

    ok(
        StatusCode::OK,
        json!({
            "comments": comments,
            "pagination": {"page": page, "limit": limit, "total": total, "pages": pages}
        }),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    post_id: String,
    content: String,
    parent_comment_id: Option<String>,
}

async fn create_comment(
    State(store): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Reply {
    let Some((author, _)) = viewer(&headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    if body.content.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Content required");
    }

    let mut store = store.lock().unwrap();
    if let Some(parent) = &body.parent_comment_id {
        match store.comments.iter().find(|c| &c.id == parent) {
            None => return fail(StatusCode::NOT_FOUND, "Parent comment not found"),
            Some(p) if p.parent.is_some() => {
                return fail(StatusCode::BAD_REQUEST, "Cannot reply to a reply")
            }
            Some(_) => {}
        }
    }

    store.seq += 1;
    let comment = StoredComment {
        id: format!("c{}", store.seq),
        post: body.post_id,
        parent: body.parent_comment_id,
        author: author.to_string(),
        content: body.content.trim().to_string(),
        likes: BTreeSet::new(),
        seq: store.seq,
    };
    let rendered = render(&comment, Vec::new());
    store.comments.push(comment);
    ok(StatusCode::CREATED, rendered)
}

async fn toggle_like(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let Some((user, _)) = viewer(&headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let mut store = store.lock().unwrap();
    let Some(comment) = store.comments.iter_mut().find(|c| c.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Comment not found");
    };
    let liked = if comment.likes.remove(user) {
        false
    } else {
        comment.likes.insert(user.to_string());
        true
    };
    ok(StatusCode::OK, json!({"liked": liked, "likeCount": comment.likes.len()}))
}

async fn delete_comment(
    State(store): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let Some((user, is_admin)) = viewer(&headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let mut store = store.lock().unwrap();
    let Some(comment) = store.comments.iter().find(|c| c.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Comment not found");
    };
    if comment.author != user && !is_admin {
        return fail(StatusCode::FORBIDDEN, "Not authorized to delete this comment");
    }
    store
        .comments
        .retain(|c| c.id != id && c.parent.as_deref() != Some(id.as_str()));
    ok(StatusCode::OK, Value::Null)
}

/// Spawns the mock backend on a random port and returns its API base URL.
pub async fn spawn_backend() -> String {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let app = Router::new()
        .route("/api/comments/post/{post_id}", get(list_comments))
        .route("/api/comments", post(create_comment))
        .route("/api/comments/{id}/like", post(toggle_like))
        .route("/api/comments/{id}", delete(delete_comment))
        .with_state(Shared::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{port}/api")
}

pub fn client(base_url: &str, tokens: TokenSlot) -> TestClient {
    ApiClient::new(
        ClientConfig::default().with_base_url(base_url),
        ReqwestTransport::new(),
        tokens,
    )
}
