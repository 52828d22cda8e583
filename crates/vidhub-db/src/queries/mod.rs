mod comments;
mod likes;
mod playlists;
mod subscriptions;
mod tweets;
mod users;
mod videos;

use rusqlite::Row;

use crate::models::{OwnerRow, VideoRow};

/// SQL expression producing the same timestamp format as the column defaults.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub(crate) const VIDEO_COLUMNS: &str = "v.id, v.owner_id, v.video_url, v.video_storage_id, \
     v.thumbnail_url, v.thumbnail_storage_id, v.title, v.description, v.duration, v.views, \
     v.is_published, v.created_at, v.updated_at";
pub(crate) const VIDEO_COLUMN_COUNT: usize = 13;

pub(crate) const OWNER_COLUMNS: &str = "u.id, u.username, u.full_name, u.avatar_url";

pub(crate) fn video_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(at)?,
        owner_id: row.get(at + 1)?,
        video_url: row.get(at + 2)?,
        video_storage_id: row.get(at + 3)?,
        thumbnail_url: row.get(at + 4)?,
        thumbnail_storage_id: row.get(at + 5)?,
        title: row.get(at + 6)?,
        description: row.get(at + 7)?,
        duration: row.get(at + 8)?,
        views: row.get(at + 9)?,
        is_published: row.get(at + 10)?,
        created_at: row.get(at + 11)?,
        updated_at: row.get(at + 12)?,
    })
}

pub(crate) fn owner_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<OwnerRow> {
    Ok(OwnerRow {
        id: row.get(at)?,
        username: row.get(at + 1)?,
        full_name: row.get(at + 2)?,
        avatar_url: row.get(at + 3)?,
    })
}

/// Escape `%`, `_` and `\` so a user token matches literally inside `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(token: &str) -> String {
    let mut out = String::with_capacity(token.len() + 2);
    out.push('%');
    for c in token.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
