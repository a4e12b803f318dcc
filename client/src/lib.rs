//! Client-side core of the quillboard reader: the HTTP client adapter every
//! network call goes through, and the comment thread engine built on it.

pub mod config;
pub mod error;
pub mod http;
pub mod thread;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::ClientConfig;
pub use error::{ApiError, ThreadError, TransportError};
pub use http::{ApiClient, RequestOptions};
pub use thread::{CommentThread, Deletion, LikeToggle, LoadOutcome, Phase, ReplyBox, ThreadState};
pub use token::{NoToken, TokenProvider, TokenSlot};
pub use transport::{Body, HttpRequest, HttpResponse, Method, Transport};

#[cfg(not(target_arch = "wasm32"))]
pub use transport::ReqwestTransport;

pub use quillboard_shared as types;
