use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use super::{NOW, OWNER_COLUMNS, owner_from_row};
use crate::Database;
use crate::models::{PlaylistRow, PlaylistVideoRow, PlaylistViewRow};

fn query_video_ids(conn: &Connection, playlist_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT video_id FROM playlist_videos WHERE playlist_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([playlist_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn query_playlist(conn: &Connection, id: &str) -> Result<Option<PlaylistRow>> {
    let row = conn
        .query_row(
            "SELECT id, owner_id, name, description, created_at, updated_at
             FROM playlists WHERE id = ?1",
            [id],
            |row| {
                Ok(PlaylistRow {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    videos: Vec::new(),
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    match row {
        Some(mut playlist) => {
            playlist.videos = query_video_ids(conn, id)?;
            Ok(Some(playlist))
        }
        None => Ok(None),
    }
}

/// Playlists with their owners and videos, in one statement.
///
/// Videos come back in insertion order. Videos unpublished since being added
/// only show up for their owner. Rows arrive grouped by playlist, so each
/// playlist is folded from a contiguous run.
fn query_playlist_views(
    conn: &Connection,
    where_sql: &str,
    key: &str,
    viewer_id: &str,
) -> Result<Vec<PlaylistViewRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id, p.name, p.description, p.created_at, p.updated_at, {OWNER_COLUMNS},
                pv.video_id, pv.video_url, pv.thumbnail_url, pv.title, pv.description,
                pv.duration, pv.views, pv.created_at
         FROM playlists p
         JOIN users u ON u.id = p.owner_id
         LEFT JOIN (
             SELECT m.playlist_id, m.position, v.id AS video_id, v.video_url,
                    v.thumbnail_url, v.title, v.description, v.duration, v.views,
                    v.created_at
             FROM playlist_videos m
             JOIN videos v ON v.id = m.video_id
             WHERE v.is_published = 1 OR v.owner_id = ?2
         ) pv ON pv.playlist_id = p.id
         WHERE {where_sql}
         ORDER BY p.created_at DESC, p.rowid DESC, pv.position"
    ))?;

    let mut rows = stmt.query(params![key, viewer_id])?;
    let mut playlists: Vec<PlaylistViewRow> = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        if playlists.last().is_none_or(|p| p.id != id) {
            playlists.push(PlaylistViewRow {
                id,
                name: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
                owner: owner_from_row(row, 5)?,
                videos: Vec::new(),
            });
        }

        let video_id: Option<String> = row.get(9)?;
        if let (Some(video_id), Some(playlist)) = (video_id, playlists.last_mut()) {
            playlist.videos.push(PlaylistVideoRow {
                id: video_id,
                video_url: row.get(10)?,
                thumbnail_url: row.get(11)?,
                title: row.get(12)?,
                description: row.get(13)?,
                duration: row.get(14)?,
                views: row.get(15)?,
                created_at: row.get(16)?,
            });
        }
    }
    Ok(playlists)
}

impl Database {
    // -- Playlists --

    pub fn insert_playlist(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        description: &str,
    ) -> Result<PlaylistRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO playlists (id, owner_id, name, description) VALUES (?1, ?2, ?3, ?4)",
                params![id, owner_id, name, description],
            )?;
            query_playlist(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Playlist {} vanished after insert", id))
        })
    }

    pub fn get_playlist(&self, id: &str) -> Result<Option<PlaylistRow>> {
        self.with_conn(|conn| query_playlist(conn, id))
    }

    pub fn playlist_view(&self, id: &str, viewer_id: &str) -> Result<Option<PlaylistViewRow>> {
        self.with_conn(|conn| {
            Ok(query_playlist_views(conn, "p.id = ?1", id, viewer_id)?
                .into_iter()
                .next())
        })
    }

    pub fn playlist_views_by_owner(&self, owner_id: &str, viewer_id: &str) -> Result<Vec<PlaylistViewRow>> {
        self.with_conn(|conn| query_playlist_views(conn, "p.owner_id = ?1", owner_id, viewer_id))
    }

    pub fn update_playlist(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<PlaylistRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "UPDATE playlists SET
                        name = COALESCE(?2, name),
                        description = COALESCE(?3, description),
                        updated_at = {NOW}
                     WHERE id = ?1"
                ),
                params![id, name, description],
            )?;
            query_playlist(conn, id)
        })
    }

    /// Delete a playlist and its memberships. Returns false if it did not exist.
    pub fn delete_playlist(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM playlist_videos WHERE playlist_id = ?1", [id])?;
            let n = tx.execute("DELETE FROM playlists WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(n == 1)
        })
    }

    /// Append a video unless it is already in the playlist.
    pub fn add_video_to_playlist(&self, playlist_id: &str, video_id: &str) -> Result<Option<PlaylistRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position)
                 SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
                 FROM playlist_videos WHERE playlist_id = ?1",
                params![playlist_id, video_id],
            )?;
            conn.execute(
                &format!("UPDATE playlists SET updated_at = {NOW} WHERE id = ?1"),
                [playlist_id],
            )?;
            query_playlist(conn, playlist_id)
        })
    }

    pub fn remove_video_from_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<Option<PlaylistRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
                params![playlist_id, video_id],
            )?;
            conn.execute(
                &format!("UPDATE playlists SET updated_at = {NOW} WHERE id = ?1"),
                [playlist_id],
            )?;
            query_playlist(conn, playlist_id)
        })
    }
}
