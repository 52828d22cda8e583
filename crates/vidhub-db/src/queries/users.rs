use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{
    NOW, OWNER_COLUMNS, VIDEO_COLUMN_COUNT, VIDEO_COLUMNS, owner_from_row, video_from_row,
};
use crate::Database;
use crate::models::{ChannelProfileRow, NewUser, Pagination, UserRow, VideoListRow};

const USER_COLUMNS: &str = "id, username, email, full_name, password, avatar_url, avatar_id, \
     cover_url, cover_id, refresh_token, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password: row.get(4)?,
        avatar_url: row.get(5)?,
        avatar_id: row.get(6)?,
        cover_url: row.get(7)?,
        cover_id: row.get(8)?,
        refresh_token: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, full_name, password, avatar_url, avatar_id, cover_url, cover_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.full_name,
                    user.password_hash,
                    user.avatar_url,
                    user.avatar_id,
                    user.cover_url,
                    user.cover_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Look a user up by username or email. Both are stored lowercase.
    pub fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1"),
                    [identifier],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// True if any user other than `except_id` already holds the username or email.
    pub fn user_conflicts(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM users
                    WHERE (username = ?1 OR email = ?2) AND id IS NOT ?3
                 )",
                params![username, email, except_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("UPDATE users SET refresh_token = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, token],
            )?;
            Ok(())
        })
    }

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns false when another request already rotated it.
    pub fn rotate_refresh_token(&self, id: &str, expected: &str, next: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                &format!(
                    "UPDATE users SET refresh_token = ?3, updated_at = {NOW}
                     WHERE id = ?1 AND refresh_token = ?2"
                ),
                params![id, expected, next],
            )?;
            Ok(n == 1)
        })
    }

    /// Store a new password hash and drop the refresh token so other sessions
    /// must log in again.
    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE users SET password = ?2, refresh_token = NULL, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, password_hash],
            )?;
            Ok(())
        })
    }

    pub fn update_account(&self, id: &str, full_name: &str, email: &str) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE users SET full_name = ?2, email = ?3, updated_at = {NOW} WHERE id = ?1"
                ),
                params![id, full_name, email],
            )?;
            query_user_by_id(conn, id)
        })
    }

    /// Point the avatar at a new asset. Returns the previous storage id.
    pub fn replace_avatar(&self, id: &str, url: &str, storage_id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let old: Option<String> = tx
                .query_row("SELECT avatar_id FROM users WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            tx.execute(
                &format!(
                    "UPDATE users SET avatar_url = ?2, avatar_id = ?3, updated_at = {NOW} WHERE id = ?1"
                ),
                params![id, url, storage_id],
            )?;
            tx.commit()?;
            Ok(old)
        })
    }

    /// Point the cover image at a new asset. Returns the previous storage id, if any.
    pub fn replace_cover_image(&self, id: &str, url: &str, storage_id: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let old: Option<String> = tx
                .query_row("SELECT cover_id FROM users WHERE id = ?1", [id], |r| r.get(0))
                .optional()?
                .flatten();
            tx.execute(
                &format!(
                    "UPDATE users SET cover_url = ?2, cover_id = ?3, updated_at = {NOW} WHERE id = ?1"
                ),
                params![id, url, storage_id],
            )?;
            tx.commit()?;
            Ok(old)
        })
    }

    // -- Channel profile --

    pub fn channel_profile(&self, username: &str, viewer_id: &str) -> Result<Option<ChannelProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.username, u.full_name, u.email, u.avatar_url, u.cover_url,
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                        EXISTS(SELECT 1 FROM subscriptions s
                               WHERE s.channel_id = u.id AND s.subscriber_id = ?2),
                        u.created_at
                     FROM users u
                     WHERE u.username = ?1",
                    params![username, viewer_id],
                    |row| {
                        Ok(ChannelProfileRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            full_name: row.get(2)?,
                            email: row.get(3)?,
                            avatar_url: row.get(4)?,
                            cover_url: row.get(5)?,
                            subscribers_count: row.get(6)?,
                            channels_subscribed_to_count: row.get(7)?,
                            is_subscribed: row.get(8)?,
                            created_at: row.get(9)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Watch history --

    /// Append a video to the user's history. Re-watching keeps the original position.
    pub fn add_to_watch_history(&self, user_id: &str, video_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO watch_history (user_id, video_id, position)
                 SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
                 FROM watch_history WHERE user_id = ?1",
                params![user_id, video_id],
            )?;
            Ok(())
        })
    }

    /// Watched videos, most recently added first. Videos unpublished since
    /// are hidden unless the user owns them.
    pub fn watch_history(&self, user_id: &str, page: Pagination) -> Result<(Vec<VideoListRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM watch_history w
                 JOIN videos v ON v.id = w.video_id
                 WHERE w.user_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)",
                [user_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS}, {OWNER_COLUMNS}
                 FROM watch_history w
                 JOIN videos v ON v.id = w.video_id
                 JOIN users u ON u.id = v.owner_id
                 WHERE w.user_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?1)
                 ORDER BY w.position DESC
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

    pub fn watch_history_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT video_id FROM watch_history WHERE user_id = ?1 ORDER BY position",
            )?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }
}
