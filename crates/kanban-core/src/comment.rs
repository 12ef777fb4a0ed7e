use crate::error::{KanbanError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const MAX_COMMENT_LEN: usize = 10_000;

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Set for replies; always a comment on the same task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(
        task_id: Uuid,
        parent: Option<&Comment>,
        author_id: Uuid,
        body: &str,
    ) -> Result<Self> {
        if let Some(parent) = parent {
            if parent.task_id != task_id {
                return Err(KanbanError::InvalidInput(format!(
                    "comment {} belongs to another task",
                    parent.id
                )));
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            task_id,
            parent_id: parent.map(|p| p.id),
            author_id,
            body: validate_body(body)?,
            created_at: Utc::now(),
            edited_at: None,
        })
    }

    /// Replace the body. Only the author may edit.
    pub fn edit(&mut self, editor: Uuid, body: &str) -> Result<()> {
        if editor != self.author_id {
            return Err(KanbanError::Forbidden(
                "only the author can edit a comment".into(),
            ));
        }
        self.body = validate_body(body)?;
        self.edited_at = Some(Utc::now());
        Ok(())
    }
}

fn validate_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(KanbanError::InvalidInput("comment must not be empty".into()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(KanbanError::InvalidInput(format!(
            "comment is longer than {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(body.to_string())
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Nest a task's comments under their parents, oldest first at every level.
/// Replies whose parent is missing are promoted to the top level.
pub fn thread(mut comments: Vec<Comment>) -> Vec<CommentThread> {
    comments.sort_by_key(|c| (c.created_at, c.id));
    let known: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();

    let mut children: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for c in comments {
        match c.parent_id.filter(|p| known.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(c),
            None => roots.push(c),
        }
    }

    fn build(c: Comment, children: &mut HashMap<Uuid, Vec<Comment>>) -> CommentThread {
        let replies = children
            .remove(&c.id)
            .unwrap_or_default()
            .into_iter()
            .map(|r| build(r, children))
            .collect();
        CommentThread { comment: c, replies }
    }

    roots.into_iter().map(|c| build(c, &mut children)).collect()
}

/// Ids of `root` and every reply beneath it.
pub fn subtree_ids(comments: &[Comment], root: Uuid) -> Vec<Uuid> {
    let mut out = vec![root];
    let mut i = 0;
    while let Some(&current) = out.get(i) {
        for c in comments {
            if c.parent_id == Some(current) && !out.contains(&c.id) {
                out.push(c.id);
            }
        }
        i += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(c: &mut Comment, secs: i64) {
        c.created_at = Utc::now() + Duration::seconds(secs);
    }

    #[test]
    fn reply_must_share_task() {
        let author = Uuid::new_v4();
        let root = Comment::new(Uuid::new_v4(), None, author, "root").unwrap();
        let err = Comment::new(Uuid::new_v4(), Some(&root), author, "reply").unwrap_err();
        assert!(matches!(err, KanbanError::InvalidInput(_)));

        let reply = Comment::new(root.task_id, Some(&root), author, "reply").unwrap();
        assert_eq!(reply.parent_id, Some(root.id));
    }

    #[test]
    fn empty_body_rejected() {
        assert!(Comment::new(Uuid::new_v4(), None, Uuid::new_v4(), "   ").is_err());
    }

    #[test]
    fn only_author_edits() {
        let author = Uuid::new_v4();
        let mut c = Comment::new(Uuid::new_v4(), None, author, "draft").unwrap();
        assert!(matches!(
            c.edit(Uuid::new_v4(), "hijack"),
            Err(KanbanError::Forbidden(_))
        ));
        c.edit(author, "final").unwrap();
        assert_eq!(c.body, "final");
        assert!(c.edited_at.is_some());
    }

    #[test]
    fn thread_nests_replies_in_order() {
        let task = Uuid::new_v4();
        let author = Uuid::new_v4();
        let mut a = Comment::new(task, None, author, "a").unwrap();
        at(&mut a, 0);
        let mut b = Comment::new(task, None, author, "b").unwrap();
        at(&mut b, 10);
        let mut a2 = Comment::new(task, Some(&a), author, "a2").unwrap();
        at(&mut a2, 20);
        let mut a1 = Comment::new(task, Some(&a), author, "a1").unwrap();
        at(&mut a1, 15);
        let mut a1x = Comment::new(task, Some(&a1), author, "a1x").unwrap();
        at(&mut a1x, 30);

        let threads = thread(vec![a2, b, a1x, a, a1]);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.body, "a");
        let replies: Vec<&str> = threads[0]
            .replies
            .iter()
            .map(|r| r.comment.body.as_str())
            .collect();
        assert_eq!(replies, vec!["a1", "a2"]);
        assert_eq!(threads[0].replies[0].replies[0].comment.body, "a1x");
        assert_eq!(threads[1].comment.body, "b");
    }

    #[test]
    fn orphaned_reply_promoted() {
        let task = Uuid::new_v4();
        let author = Uuid::new_v4();
        let parent = Comment::new(task, None, author, "gone").unwrap();
        let reply = Comment::new(task, Some(&parent), author, "left behind").unwrap();
        let threads = thread(vec![reply]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.body, "left behind");
    }

    #[test]
    fn subtree_collects_descendants() {
        let task = Uuid::new_v4();
        let author = Uuid::new_v4();
        let a = Comment::new(task, None, author, "a").unwrap();
        let a1 = Comment::new(task, Some(&a), author, "a1").unwrap();
        let a1x = Comment::new(task, Some(&a1), author, "a1x").unwrap();
        let b = Comment::new(task, None, author, "b").unwrap();
        let all = vec![a.clone(), a1.clone(), a1x.clone(), b.clone()];

        let ids = subtree_ids(&all, a.id);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&a1x.id));
        assert!(!ids.contains(&b.id));
    }
}
