use redb::ReadableTable;
use uuid::Uuid;

use super::{
    get_json, pair_key, put_json, remove_key, scan_children, storage, Store, ATTACHMENTS,
    COMMENTS, TASKS,
};
use crate::attachment::Attachment;
use crate::comment::{subtree_ids, thread, Comment, CommentThread};
use crate::error::{KanbanError, Result};

impl Store {
    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    /// Add a comment, or a reply when `parent_id` names a comment on the same task.
    pub fn add_comment(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        body: &str,
    ) -> Result<Comment> {
        let wt = self.db().begin_write().map_err(storage)?;
        let comment = {
            require_task(&wt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
            let mut table = wt.open_table(COMMENTS).map_err(storage)?;
            let parent: Option<Comment> = match parent_id {
                Some(id) => Some(
                    get_json(&table, &pair_key(task_id, id))?
                        .ok_or_else(|| KanbanError::CommentNotFound(id.to_string()))?,
                ),
                None => None,
            };
            let comment = Comment::new(task_id, parent.as_ref(), author_id, body)?;
            put_json(&mut table, &pair_key(task_id, comment.id), &comment)?;
            comment
        };
        wt.commit().map_err(storage)?;
        tracing::debug!(task = %task_id, comment = %comment.id, "added comment");
        Ok(comment)
    }

    /// A task's comments as threads, oldest first.
    pub fn list_comments(&self, board_id: Uuid, task_id: Uuid) -> Result<Vec<CommentThread>> {
        let rt = self.db().begin_read().map_err(storage)?;
        require_task(&rt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
        let table = rt.open_table(COMMENTS).map_err(storage)?;
        let comments: Vec<Comment> = scan_children(&table, task_id)?;
        Ok(thread(comments))
    }

    pub fn edit_comment(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        comment_id: Uuid,
        editor: Uuid,
        body: &str,
    ) -> Result<Comment> {
        let wt = self.db().begin_write().map_err(storage)?;
        let comment = {
            require_task(&wt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
            let mut table = wt.open_table(COMMENTS).map_err(storage)?;
            let key = pair_key(task_id, comment_id);
            let mut comment: Comment = get_json(&table, &key)?
                .ok_or_else(|| KanbanError::CommentNotFound(comment_id.to_string()))?;
            comment.edit(editor, body)?;
            put_json(&mut table, &key, &comment)?;
            comment
        };
        wt.commit().map_err(storage)?;
        Ok(comment)
    }

    /// Delete a comment and every reply beneath it. Only the author may delete.
    /// Returns the number of comments removed.
    pub fn delete_comment(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        comment_id: Uuid,
        actor: Uuid,
    ) -> Result<usize> {
        let wt = self.db().begin_write().map_err(storage)?;
        let removed = {
            require_task(&wt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
            let mut table = wt.open_table(COMMENTS).map_err(storage)?;
            let all: Vec<Comment> = scan_children(&table, task_id)?;
            let target = all
                .iter()
                .find(|c| c.id == comment_id)
                .ok_or_else(|| KanbanError::CommentNotFound(comment_id.to_string()))?;
            if target.author_id != actor {
                return Err(KanbanError::Forbidden(
                    "only the author can delete a comment".into(),
                ));
            }
            let ids = subtree_ids(&all, comment_id);
            for id in &ids {
                remove_key(&mut table, &pair_key(task_id, *id))?;
            }
            ids.len()
        };
        wt.commit().map_err(storage)?;
        tracing::debug!(task = %task_id, comment = %comment_id, removed, "deleted comment");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Attachment metadata
    // -----------------------------------------------------------------------

    /// Record an attachment whose bytes are already in the blob store.
    pub fn add_attachment(&self, board_id: Uuid, attachment: &Attachment) -> Result<()> {
        let wt = self.db().begin_write().map_err(storage)?;
        {
            require_task(
                &wt.open_table(TASKS).map_err(storage)?,
                board_id,
                attachment.task_id,
            )?;
            let mut table = wt.open_table(ATTACHMENTS).map_err(storage)?;
            put_json(
                &mut table,
                &pair_key(attachment.task_id, attachment.id),
                attachment,
            )?;
        }
        wt.commit().map_err(storage)?;
        tracing::info!(
            task = %attachment.task_id,
            attachment = %attachment.id,
            size = attachment.size,
            "added attachment"
        );
        Ok(())
    }

    /// Attachments of a task, oldest first.
    pub fn list_attachments(&self, board_id: Uuid, task_id: Uuid) -> Result<Vec<Attachment>> {
        let rt = self.db().begin_read().map_err(storage)?;
        require_task(&rt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
        let table = rt.open_table(ATTACHMENTS).map_err(storage)?;
        let mut out: Vec<Attachment> = scan_children(&table, task_id)?;
        out.sort_by_key(|a| (a.created_at, a.id));
        Ok(out)
    }

    pub fn get_attachment(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment> {
        let rt = self.db().begin_read().map_err(storage)?;
        require_task(&rt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
        let table = rt.open_table(ATTACHMENTS).map_err(storage)?;
        get_json(&table, &pair_key(task_id, attachment_id))?
            .ok_or_else(|| KanbanError::AttachmentNotFound(attachment_id.to_string()))
    }

    /// Remove an attachment row and return it so the caller can delete the blob.
    pub fn remove_attachment(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment> {
        let wt = self.db().begin_write().map_err(storage)?;
        let attachment = {
            require_task(&wt.open_table(TASKS).map_err(storage)?, board_id, task_id)?;
            let mut table = wt.open_table(ATTACHMENTS).map_err(storage)?;
            let key = pair_key(task_id, attachment_id);
            let attachment: Attachment = get_json(&table, &key)?
                .ok_or_else(|| KanbanError::AttachmentNotFound(attachment_id.to_string()))?;
            remove_key(&mut table, &key)?;
            attachment
        };
        wt.commit().map_err(storage)?;
        Ok(attachment)
    }
}

/// Fail with `TaskNotFound` unless the task exists on this board.
fn require_task<Tbl>(tasks: &Tbl, board_id: Uuid, task_id: Uuid) -> Result<()>
where
    Tbl: ReadableTable<&'static [u8], &'static [u8]>,
{
    match tasks
        .get(pair_key(board_id, task_id).as_slice())
        .map_err(storage)?
    {
        Some(_) => Ok(()),
        None => Err(KanbanError::TaskNotFound(task_id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::fixture;
    use crate::task::NewTask;

    #[test]
    fn threaded_comments_round_trip() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let root = fx
            .store
            .add_comment(fx.board.id, task.id, fx.user.id, None, "first")
            .unwrap();
        fx.store
            .add_comment(fx.board.id, task.id, fx.user.id, Some(root.id), "reply")
            .unwrap();

        let threads = fx.store.list_comments(fx.board.id, task.id).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies[0].comment.body, "reply");
    }

    #[test]
    fn reply_to_missing_parent_rejected() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let err = fx
            .store
            .add_comment(fx.board.id, task.id, fx.user.id, Some(Uuid::new_v4()), "x")
            .unwrap_err();
        assert!(matches!(err, KanbanError::CommentNotFound(_)));
    }

    #[test]
    fn delete_removes_subtree_and_checks_author() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let root = fx
            .store
            .add_comment(fx.board.id, task.id, fx.user.id, None, "root")
            .unwrap();
        fx.store
            .add_comment(fx.board.id, task.id, fx.user.id, Some(root.id), "child")
            .unwrap();
        fx.store
            .add_comment(fx.board.id, task.id, fx.user.id, None, "other")
            .unwrap();

        let err = fx
            .store
            .delete_comment(fx.board.id, task.id, root.id, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, KanbanError::Forbidden(_)));

        let removed = fx
            .store
            .delete_comment(fx.board.id, task.id, root.id, fx.user.id)
            .unwrap();
        assert_eq!(removed, 2);
        let threads = fx.store.list_comments(fx.board.id, task.id).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.body, "other");
    }

    #[test]
    fn edit_comment_by_author() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let c = fx
            .store
            .add_comment(fx.board.id, task.id, fx.user.id, None, "draft")
            .unwrap();
        let edited = fx
            .store
            .edit_comment(fx.board.id, task.id, c.id, fx.user.id, "final")
            .unwrap();
        assert_eq!(edited.body, "final");
    }

    #[test]
    fn attachments_follow_task_lifecycle() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let a = Attachment::new(task.id, "a.txt", "text/plain", 3, fx.user.id).unwrap();
        fx.store.add_attachment(fx.board.id, &a).unwrap();
        fx.store
            .add_comment(fx.board.id, task.id, fx.user.id, None, "note")
            .unwrap();
        assert_eq!(fx.store.list_attachments(fx.board.id, task.id).unwrap(), vec![a.clone()]);
        assert_eq!(fx.store.get_attachment(fx.board.id, task.id, a.id).unwrap(), a);

        let (_, removed) = fx.store.delete_task(fx.board.id, task.id).unwrap();
        assert_eq!(removed, vec![a.clone()]);
        assert!(matches!(
            fx.store.list_attachments(fx.board.id, task.id),
            Err(KanbanError::TaskNotFound(_))
        ));
    }

    #[test]
    fn remove_attachment_returns_row() {
        let fx = fixture();
        let task = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t"), None)
            .unwrap();
        let a = Attachment::new(task.id, "a.txt", "text/plain", 3, fx.user.id).unwrap();
        fx.store.add_attachment(fx.board.id, &a).unwrap();
        let removed = fx.store.remove_attachment(fx.board.id, task.id, a.id).unwrap();
        assert_eq!(removed.blob_key, a.blob_key);
        assert!(matches!(
            fx.store.get_attachment(fx.board.id, task.id, a.id),
            Err(KanbanError::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn attachment_on_missing_task_rejected() {
        let fx = fixture();
        let a = Attachment::new(Uuid::new_v4(), "a.txt", "text/plain", 3, fx.user.id).unwrap();
        assert!(matches!(
            fx.store.add_attachment(fx.board.id, &a),
            Err(KanbanError::TaskNotFound(_))
        ));
    }
}
