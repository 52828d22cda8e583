use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::{
    NOW, OWNER_COLUMNS, VIDEO_COLUMN_COUNT, VIDEO_COLUMNS, like_pattern, owner_from_row,
    video_from_row,
};
use crate::Database;
use crate::models::{NewVideo, VideoChanges, VideoDetailRow, VideoFilter, VideoListRow, VideoRow};

fn query_video(conn: &Connection, id: &str) -> Result<Option<VideoRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.id = ?1"),
            [id],
            |row| video_from_row(row, 0),
        )
        .optional()?;
    Ok(row)
}

impl Database {
    // -- Videos --

    pub fn insert_video(&self, video: &NewVideo<'_>) -> Result<VideoRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO videos (id, owner_id, video_url, video_storage_id, thumbnail_url,
                                     thumbnail_storage_id, title, description, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    video.id,
                    video.owner_id,
                    video.video_url,
                    video.video_storage_id,
                    video.thumbnail_url,
                    video.thumbnail_storage_id,
                    video.title,
                    video.description,
                    video.duration,
                ],
            )?;
            query_video(conn, video.id)?
                .ok_or_else(|| anyhow::anyhow!("Video {} vanished after insert", video.id))
        })
    }

    /// Raw row regardless of publish state. Used for existence and ownership checks.
    pub fn get_video(&self, id: &str) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| query_video(conn, id))
    }

    /// Video detail with like/comment counts, the owner's subscriber count and
    /// the viewer's `is_liked`/`is_subscribed` flags, in one statement.
    pub fn video_detail(&self, id: &str, viewer_id: &str) -> Result<Option<VideoDetailRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {VIDEO_COLUMNS}, u.username, u.avatar_url,
                            (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = v.owner_id),
                            EXISTS(SELECT 1 FROM subscriptions s
                                   WHERE s.channel_id = v.owner_id AND s.subscriber_id = ?2),
                            (SELECT COUNT(*) FROM likes l WHERE l.video_id = v.id),
                            (SELECT COUNT(*) FROM comments c WHERE c.video_id = v.id),
                            EXISTS(SELECT 1 FROM likes l WHERE l.video_id = v.id AND l.liked_by = ?2)
                         FROM videos v
                         JOIN users u ON u.id = v.owner_id
                         WHERE v.id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2)"
                    ),
                    params![id, viewer_id],
                    |row| {
                        let at = VIDEO_COLUMN_COUNT;
                        Ok(VideoDetailRow {
                            video: video_from_row(row, 0)?,
                            owner_username: row.get(at)?,
                            owner_avatar_url: row.get(at + 1)?,
                            owner_subscribers_count: row.get(at + 2)?,
                            owner_is_subscribed: row.get(at + 3)?,
                            likes_count: row.get(at + 4)?,
                            comments_count: row.get(at + 5)?,
                            is_liked: row.get(at + 6)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Filtered, sorted, paginated listing. Returns the page and the total
    /// number of matching videos.
    pub fn list_videos(&self, filter: &VideoFilter<'_>) -> Result<(Vec<VideoListRow>, i64)> {
        let mut clauses = vec!["(v.is_published = 1 OR v.owner_id = ?)".to_string()];
        let mut values = vec![Value::Text(filter.viewer_id.to_string())];

        if let Some(owner) = filter.owner_id {
            clauses.push("v.owner_id = ?".to_string());
            values.push(Value::Text(owner.to_string()));
        }
        for token in &filter.search_tokens {
            clauses.push(
                "(v.title LIKE ? ESCAPE '\\' OR v.description LIKE ? ESCAPE '\\')".to_string(),
            );
            let pattern = like_pattern(token);
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        let where_sql = clauses.join(" AND ");
        let direction = if filter.ascending { "ASC" } else { "DESC" };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM videos v WHERE {where_sql}"),
                params_from_iter(values.iter()),
                |r| r.get(0),
            )?;

            let mut page_values = values.clone();
            page_values.push(Value::Integer(i64::from(filter.pagination.limit)));
            page_values.push(Value::Integer(filter.pagination.offset()));

            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS}, {OWNER_COLUMNS}
                 FROM videos v
                 JOIN users u ON u.id = v.owner_id
                 WHERE {where_sql}
                 ORDER BY {} {direction}, v.rowid {direction}
                 LIMIT ? OFFSET ?",
                filter.sort.column()
            ))?;
            let rows = stmt
                .query_map(params_from_iter(page_values.iter()), |row| {
                    Ok(VideoListRow {
                        video: video_from_row(row, 0)?,
                        owner: owner_from_row(row, VIDEO_COLUMN_COUNT)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok((rows, total))
        })
    }

    pub fn update_video(&self, id: &str, changes: &VideoChanges<'_>) -> Result<Option<VideoRow>> {
        let (thumb_url, thumb_id) = match changes.thumbnail {
            Some((url, storage_id)) => (Some(url), Some(storage_id)),
            None => (None, None),
        };
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE videos SET
                        title = COALESCE(?2, title),
                        description = COALESCE(?3, description),
                        thumbnail_url = COALESCE(?4, thumbnail_url),
                        thumbnail_storage_id = COALESCE(?5, thumbnail_storage_id),
                        updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, changes.title, changes.description, thumb_url, thumb_id],
            )?;
            query_video(conn, id)
        })
    }

    /// Add one view. Returns false if the video no longer exists.
    pub fn increment_views(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE videos SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(n == 1)
        })
    }

    /// Flip the publish flag and return its new value.
    pub fn toggle_published(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE videos SET is_published = 1 - is_published, updated_at = {NOW}
                     WHERE id = ?1"
                ),
                [id],
            )?;
            let published = conn
                .query_row("SELECT is_published FROM videos WHERE id = ?1", [id], |r| {
                    r.get(0)
                })
                .optional()?;
            Ok(published)
        })
    }

    /// Delete a video together with its likes, its comments (and their
    /// likes), playlist memberships and watch-history entries, in one
    /// transaction. Returns the deleted row so the caller can release its
    /// media assets.
    pub fn delete_video(&self, id: &str) -> Result<Option<VideoRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(video) = query_video(&tx, id)? else {
                return Ok(None);
            };

            tx.execute(
                "DELETE FROM likes WHERE comment_id IN (SELECT id FROM comments WHERE video_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM likes WHERE video_id = ?1", [id])?;
            tx.execute("DELETE FROM comments WHERE video_id = ?1", [id])?;
            tx.execute("DELETE FROM playlist_videos WHERE video_id = ?1", [id])?;
            tx.execute("DELETE FROM watch_history WHERE video_id = ?1", [id])?;
            tx.execute("DELETE FROM videos WHERE id = ?1", [id])?;

            tx.commit()?;
            Ok(Some(video))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{LikeTarget, Pagination, VideoChanges, VideoFilter, VideoSort};
    use crate::test_support::{open_temp, user, video};

    fn filter<'a>(viewer: &'a str) -> VideoFilter<'a> {
        VideoFilter {
            owner_id: None,
            search_tokens: vec![],
            viewer_id: viewer,
            sort: VideoSort::CreatedAt,
            ascending: false,
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn detail_reports_viewer_relative_flags() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let v = video(&db, &alice, "intro");

        let before = db.video_detail(&v, &bob).unwrap().unwrap();
        assert_eq!(before.likes_count, 0);
        assert!(!before.is_liked);
        assert!(!before.owner_is_subscribed);

        db.toggle_like(&bob, LikeTarget::Video, &v).unwrap();
        db.toggle_subscription(&bob, &alice).unwrap();

        let after = db.video_detail(&v, &bob).unwrap().unwrap();
        assert_eq!(after.likes_count, 1);
        assert!(after.is_liked);
        assert!(after.owner_is_subscribed);
        assert_eq!(after.owner_subscribers_count, 1);

        // The owner sees the counts but not bob's flags.
        let owner_view = db.video_detail(&v, &alice).unwrap().unwrap();
        assert_eq!(owner_view.likes_count, 1);
        assert!(!owner_view.is_liked);
    }

    #[test]
    fn unpublished_videos_only_visible_to_owner() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let v = video(&db, &alice, "draft");

        assert_eq!(db.toggle_published(&v).unwrap(), Some(false));
        assert!(db.video_detail(&v, &bob).unwrap().is_none());
        assert!(db.video_detail(&v, &alice).unwrap().is_some());

        assert_eq!(db.list_videos(&filter(&bob)).unwrap().1, 0);
        assert_eq!(db.list_videos(&filter(&alice)).unwrap().1, 1);
        assert_eq!(db.toggle_published(&v).unwrap(), Some(true));
        assert_eq!(db.toggle_published("missing").unwrap(), None);
    }

    #[test]
    fn list_searches_tokens_and_paginates() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        video(&db, &alice, "Learning Rust ownership");
        video(&db, &alice, "Rust async deep dive");
        video(&db, &bob, "Cooking pasta");

        let mut f = filter(&bob);
        f.search_tokens = vec!["rust".into()];
        let (rows, total) = db.list_videos(&f).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);

        f.search_tokens = vec!["rust".into(), "async".into()];
        let (rows, _) = db.list_videos(&f).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].video.title, "Rust async deep dive");

        let mut by_owner = filter(&alice);
        by_owner.owner_id = Some(&bob);
        assert_eq!(db.list_videos(&by_owner).unwrap().1, 1);

        let mut paged = filter(&alice);
        paged.pagination = Pagination::new(Some(2), Some(2));
        let (rows, total) = db.list_videos(&paged).unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 1);

        let mut by_title = filter(&alice);
        by_title.sort = VideoSort::Title;
        by_title.ascending = true;
        let (rows, _) = db.list_videos(&by_title).unwrap();
        assert_eq!(rows[0].video.title, "Cooking pasta");
    }

    #[test]
    fn views_increment_by_one() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let v = video(&db, &alice, "intro");

        assert!(db.increment_views(&v).unwrap());
        assert!(db.increment_views(&v).unwrap());
        assert_eq!(db.get_video(&v).unwrap().unwrap().views, 2);
        assert!(!db.increment_views("missing").unwrap());
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let v = video(&db, &alice, "intro");

        let updated = db
            .update_video(
                &v,
                &VideoChanges {
                    title: Some("renamed"),
                    thumbnail: Some(("http://media/t2.png", "t2.png")),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.description, "a description");
        assert_eq!(updated.thumbnail_storage_id, "t2.png");
    }

    #[test]
    fn delete_cascades_to_dependents() {
        let (_dir, db) = open_temp();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let v = video(&db, &alice, "intro");

        db.insert_comment("c1", &v, &bob, "nice").unwrap();
        db.toggle_like(&bob, LikeTarget::Video, &v).unwrap();
        db.toggle_like(&alice, LikeTarget::Comment, "c1").unwrap();
        db.insert_playlist("p1", &bob, "faves", "best").unwrap();
        db.add_video_to_playlist("p1", &v).unwrap();
        db.add_to_watch_history(&bob, &v).unwrap();

        let deleted = db.delete_video(&v).unwrap().unwrap();
        assert_eq!(deleted.video_storage_id, "v.mp4");

        assert!(db.get_video(&v).unwrap().is_none());
        assert!(db.get_comment("c1").unwrap().is_none());
        assert_eq!(db.count_likes(LikeTarget::Video, &v).unwrap(), 0);
        assert_eq!(db.count_likes(LikeTarget::Comment, "c1").unwrap(), 0);
        assert!(db.get_playlist("p1").unwrap().unwrap().videos.is_empty());
        assert!(db.watch_history_ids(&bob).unwrap().is_empty());
        assert!(db.delete_video(&v).unwrap().is_none());
    }
}
