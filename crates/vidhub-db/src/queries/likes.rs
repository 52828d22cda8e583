use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use super::{OWNER_COLUMNS, VIDEO_COLUMN_COUNT, VIDEO_COLUMNS, owner_from_row, video_from_row};
use crate::Database;
use crate::models::{LikeTarget, Pagination, VideoListRow};

impl Database {
    // -- Likes --

    /// Toggle a like: removes it if present, inserts it if not.
    ///
    /// Returns `None` when the target is missing or hidden from the user
    /// (an unpublished video, or a comment on one, that the user does not
    /// own). Otherwise returns whether the like exists afterwards.
    ///
    /// The visibility check and the flip run in one transaction on the writer
    /// connection, so a concurrent delete cannot slip in between. The insert
    /// is `OR IGNORE` against the per-target unique index, so a duplicate
    /// toggle can never leave two rows for the same (user, target).
    pub fn toggle_like(
        &self,
        user_id: &str,
        target: LikeTarget,
        target_id: &str,
    ) -> Result<Option<bool>> {
        let column = target.column();
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let visible: bool = match target {
                LikeTarget::Video => tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM videos
                     WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2))",
                    params![target_id, user_id],
                    |r| r.get(0),
                )?,
                LikeTarget::Comment => tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM comments c
                     JOIN videos v ON v.id = c.video_id
                     WHERE c.id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2))",
                    params![target_id, user_id],
                    |r| r.get(0),
                )?,
                LikeTarget::Tweet => tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM tweets WHERE id = ?1)",
                    [target_id],
                    |r| r.get(0),
                )?,
            };
            if !visible {
                return Ok(None);
            }

            let removed = tx.execute(
                &format!("DELETE FROM likes WHERE liked_by = ?1 AND {column} = ?2"),
                params![user_id, target_id],
            )?;

            let active = if removed > 0 {
                false
            } else {
                tx.execute(
                    &format!("INSERT OR IGNORE INTO likes (id, liked_by, {column}) VALUES (?1, ?2, ?3)"),
                    params![Uuid::new_v4().to_string(), user_id, target_id],
                )?;
                true
            };

            tx.commit()?;
            Ok(Some(active))
        })
    }

    pub fn count_likes(&self, target: LikeTarget, target_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM likes WHERE {} = ?1", target.column()),
                [target_id],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    /// Videos the user has liked, newest like first. Unpublished videos are
    /// skipped unless the user owns them.
    pub fn liked_videos(&self, user_id: &str, page: Pagination) -> Result<(Vec<VideoListRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 WHERE l.liked_by = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)",
                [user_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS}, {OWNER_COLUMNS}
                 FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE l.liked_by = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
                 ORDER BY l.created_at DESC, l.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(params![user_id, page.limit, page.offset()], |row| {
                    Ok(VideoListRow {
                        video: video_from_row(row, 0)?,
                        owner: owner_from_row(row, VIDEO_COLUMN_COUNT)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }
}
