//! Scripted transport and payload builders for unit tests.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::ApiClient;
use crate::token::TokenSlot;
use crate::transport::{HttpRequest, HttpResponse, Transport};

pub(crate) const BASE_URL: &str = "http://test.local/api";

struct Scripted {
    /// Substring the request URL must contain; `None` matches anything.
    matcher: Option<String>,
    reply: Result<HttpResponse, TransportError>,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct Inner {
    script: RefCell<Vec<Scripted>>,
    requests: RefCell<Vec<HttpRequest>>,
}

/// Replays canned responses in order, optionally holding one back until the
/// test releases it.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    inner: Rc<Inner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, matcher: Option<&str>, reply: Result<HttpResponse, TransportError>) {
        self.inner.script.borrow_mut().push(Scripted {
            matcher: matcher.map(str::to_string),
            reply,
            gate: None,
        });
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(None, Ok(HttpResponse { status, body: body.to_string() }));
    }

    pub fn push_json_for(&self, url_part: &str, status: u16, body: Value) {
        self.push(Some(url_part), Ok(HttpResponse { status, body: body.to_string() }));
    }

    pub fn push_raw(&self, status: u16, body: &str) {
        self.push(None, Ok(HttpResponse { status, body: body.to_string() }));
    }

    pub fn push_error(&self, err: TransportError) {
        self.push(None, Err(err));
    }

    /// Queues a response that is only delivered once the returned sender fires.
    pub fn push_gated_for(&self, url_part: &str, status: u16, body: Value) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.script.borrow_mut().push(Scripted {
            matcher: Some(url_part.to_string()),
            reply: Ok(HttpResponse { status, body: body.to_string() }),
            gate: Some(rx),
        });
        tx
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.borrow().len()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> {
        let next = {
            let mut script = self.inner.script.borrow_mut();
            let position = script.iter().position(|s| {
                s.matcher.as_deref().map_or(true, |part| request.url.contains(part))
            });
            position.map(|i| script.remove(i))
        };
        self.inner.requests.borrow_mut().push(request);

        async move {
            let Some(next) = next else {
                return Err(TransportError::Network("no scripted response".into()));
            };
            if let Some(gate) = next.gate {
                let _ = gate.await;
            }
            next.reply
        }
    }
}

pub(crate) fn client_with(fake: &FakeTransport, tokens: TokenSlot) -> ApiClient<FakeTransport, TokenSlot> {
    ApiClient::new(
        ClientConfig::default().with_base_url(BASE_URL),
        fake.clone(),
        tokens,
    )
}

pub(crate) fn comment(id: &str, author: &str, parent: Option<&str>, likes: &[&str]) -> Value {
    json!({
        "_id": id,
        "content": format!("comment {id}"),
        "author": {"_id": author, "username": author, "fullName": author, "avatar": ""},
        "post": "p1",
        "parentComment": parent,
        "replies": [],
        "likes": likes,
        "likeCount": likes.len(),
        "isSpam": false,
        "createdAt": "2024-05-01T10:00:00Z",
        "updatedAt": "2024-05-01T10:00:00Z"
    })
}

pub(crate) fn with_replies(mut parent: Value, replies: Vec<Value>) -> Value {
    parent["replies"] = Value::Array(replies);
    parent
}

/// A successful comment listing envelope.
pub(crate) fn listing(page: u32, limit: u32, total: u64, comments: Vec<Value>) -> Value {
    let pages = total.div_ceil(u64::from(limit)).max(1);
    json!({
        "success": true,
        "data": {
            "comments": comments,
            "pagination": {"page": page, "limit": limit, "total": total, "pages": pages}
        }
    })
}

pub(crate) fn ack() -> Value {
    json!({"success": true, "data": null})
}
