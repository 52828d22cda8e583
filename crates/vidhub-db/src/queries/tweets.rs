use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{NOW, OWNER_COLUMNS, owner_from_row};
use crate::Database;
use crate::models::{Pagination, TweetRow, TweetViewRow};

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<TweetRow> {
    Ok(TweetRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn query_tweet(conn: &Connection, id: &str) -> Result<Option<TweetRow>> {
    let row = conn
        .query_row(
            "SELECT id, owner_id, content, created_at, updated_at FROM tweets WHERE id = ?1",
            [id],
            tweet_from_row,
        )
        .optional()?;
    Ok(row)
}

impl Database {
    // -- Tweets --

    pub fn insert_tweet(&self, id: &str, owner_id: &str, content: &str) -> Result<TweetRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tweets (id, owner_id, content) VALUES (?1, ?2, ?3)",
                params![id, owner_id, content],
            )?;
            query_tweet(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Tweet {} vanished after insert", id))
        })
    }

    pub fn get_tweet(&self, id: &str) -> Result<Option<TweetRow>> {
        self.with_conn(|conn| query_tweet(conn, id))
    }

    /// A user's tweets, newest first, with like counts and the viewer's flag.
    pub fn tweet_views(
        &self,
        owner_id: &str,
        viewer_id: &str,
        page: Pagination,
    ) -> Result<(Vec<TweetViewRow>, i64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tweets WHERE owner_id = ?1",
                [owner_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT t.id, t.owner_id, t.content, t.created_at, t.updated_at,
                        {OWNER_COLUMNS},
                        (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id),
                        EXISTS(SELECT 1 FROM likes l WHERE l.tweet_id = t.id AND l.liked_by = ?2)
                 FROM tweets t
                 JOIN users u ON u.id = t.owner_id
                 WHERE t.owner_id = ?1
                 ORDER BY t.created_at DESC, t.rowid DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(
                    params![owner_id, viewer_id, page.limit, page.offset()],
                    |row| {
                        Ok(TweetViewRow {
                            tweet: tweet_from_row(row)?,
                            owner: owner_from_row(row, 5)?,
                            likes_count: row.get(9)?,
                            is_liked: row.get(10)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    pub fn update_tweet(&self, id: &str, content: &str) -> Result<Option<TweetRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("UPDATE tweets SET content = ?2, updated_at = {NOW} WHERE id = ?1"),
                params![id, content],
            )?;
            query_tweet(conn, id)
        })
    }

    /// Delete a tweet and its likes. Returns false if it did not exist.
    pub fn delete_tweet(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM likes WHERE tweet_id = ?1", [id])?;
            let n = tx.execute("DELETE FROM tweets WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(n == 1)
        })
    }
}
