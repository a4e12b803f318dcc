use quillboard_shared::Comment;
use tracing::warn;

/// Where a comment id sits in a loaded two-level thread.
#[derive(Debug, Clone, Copy)]
pub enum Located<'a> {
    TopLevel(&'a Comment),
    Reply { reply: &'a Comment, parent: &'a Comment },
}

impl<'a> Located<'a> {
    pub fn comment(&self) -> &'a Comment {
        match self {
            Located::TopLevel(comment) => comment,
            Located::Reply { reply, .. } => reply,
        }
    }

    /// Id of the top-level comment a reply to this comment must attach to.
    pub fn thread_root(&self) -> &'a str {
        match self {
            Located::TopLevel(comment) => &comment.id,
            Located::Reply { parent, .. } => &parent.id,
        }
    }
}

pub fn locate<'a>(comments: &'a [Comment], id: &str) -> Option<Located<'a>> {
    comments.iter().find_map(|top| {
        if top.id == id {
            return Some(Located::TopLevel(top));
        }
        top.replies
            .iter()
            .find(|reply| reply.id == id)
            .map(|reply| Located::Reply { reply, parent: top })
    })
}

/// Forces a fetched page into comment + reply shape. Replies listed at top
/// level are dropped; replies nested under replies are hoisted onto the
/// top-level comment.
pub fn normalize(comments: Vec<Comment>) -> Vec<Comment> {
    comments
        .into_iter()
        .filter_map(|mut top| {
            if let Some(parent) = &top.parent_comment_id {
                warn!(comment_id = %top.id, parent_id = %parent, "dropping reply listed at top level");
                return None;
            }
            let replies = std::mem::take(&mut top.replies);
            top.replies = flatten(&top.id, replies);
            Some(top)
        })
        .collect()
}

fn flatten(root: &str, replies: Vec<Comment>) -> Vec<Comment> {
    let mut out = Vec::with_capacity(replies.len());
    for mut reply in replies {
        let nested = std::mem::take(&mut reply.replies);
        if reply.parent_comment_id.as_deref() != Some(root) {
            warn!(comment_id = %reply.id, root_id = root, "re-parenting reply onto its top-level comment");
            reply.parent_comment_id = Some(root.to_string());
        }
        out.push(reply);
        if !nested.is_empty() {
            warn!(count = nested.len(), root_id = root, "hoisting nested replies");
            out.extend(flatten(root, nested));
        }
    }
    out
}
