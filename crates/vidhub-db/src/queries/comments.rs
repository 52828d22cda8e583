use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{NOW, OWNER_COLUMNS, owner_from_row};
use crate::Database;
use crate::models::{CommentRow, CommentViewRow, Pagination};

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        video_id: row.get(1)?,
        owner_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn query_comment(conn: &Connection, id: &str) -> Result<Option<CommentRow>> {
    let row = conn
        .query_row(
            "SELECT id, video_id, owner_id, content, created_at, updated_at
             FROM comments WHERE id = ?1",
            [id],
            comment_from_row,
        )
        .optional()?;
    Ok(row)
}

impl Database {
    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        video_id: &str,
        owner_id: &str,
        content: &str,
    ) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, video_id, owner_id, content) VALUES (?1, ?2, ?3, ?4)",
                params![id, video_id, owner_id, content],
            )?;
            query_comment(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Comment {} vanished after insert", id))
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Comments on a video, newest first, with like counts and the viewer's flag.
    pub fn comment_views(
        &self,
        video_id: &str,
        viewer_id: &str,
        page: Pagination,
    ) -> Result<(Vec<CommentViewRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE video_id = ?1",
                [video_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT c.id, c.video_id, c.owner_id, c.content, c.created_at, c.updated_at,
                        {OWNER_COLUMNS},
                        (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id),
                        EXISTS(SELECT 1 FROM likes l WHERE l.comment_id = c.id AND l.liked_by = ?2)
                 FROM comments c
                 JOIN users u ON u.id = c.owner_id
                 WHERE c.video_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(
                    params![video_id, viewer_id, page.limit, page.offset()],
                    |row| {
                        Ok(CommentViewRow {
                            comment: comment_from_row(row)?,
                            owner: owner_from_row(row, 6)?,
                            likes_count: row.get(10)?,
                            is_liked: row.get(11)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    pub fn update_comment(&self, id: &str, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("UPDATE comments SET content = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, content],
            )?;
            query_comment(conn, id)
        })
    }

    /// Delete a comment and its likes. Returns false if it did not exist.
    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM likes WHERE comment_id = ?1", [id])?;
            let n = tx.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(n == 1)
        })
    }
}
