use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                TEXT PRIMARY KEY,
                username          TEXT NOT NULL UNIQUE,
                email             TEXT NOT NULL UNIQUE,
                full_name         TEXT NOT NULL,
                password          TEXT NOT NULL,
                avatar_url        TEXT NOT NULL,
                avatar_id         TEXT NOT NULL,
                cover_url         TEXT,
                cover_id          TEXT,
                refresh_token     TEXT,
                created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE videos (
                id                    TEXT PRIMARY KEY,
                owner_id              TEXT NOT NULL REFERENCES users(id),
                video_url             TEXT NOT NULL,
                video_storage_id      TEXT NOT NULL,
                thumbnail_url         TEXT NOT NULL,
                thumbnail_storage_id  TEXT NOT NULL,
                title                 TEXT NOT NULL,
                description           TEXT NOT NULL,
                duration              REAL NOT NULL DEFAULT 0 CHECK (duration >= 0),
                views                 INTEGER NOT NULL DEFAULT 0,
                is_published          INTEGER NOT NULL DEFAULT 1,
                created_at            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at            TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_videos_owner ON videos(owner_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                video_id    TEXT NOT NULL REFERENCES videos(id),
                owner_id    TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_comments_video ON comments(video_id, created_at);

            CREATE TABLE tweets (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_tweets_owner ON tweets(owner_id, created_at);

            -- Exactly one target column is set per row.
            CREATE TABLE likes (
                id          TEXT PRIMARY KEY,
                liked_by    TEXT NOT NULL REFERENCES users(id),
                video_id    TEXT REFERENCES videos(id),
                comment_id  TEXT REFERENCES comments(id),
                tweet_id    TEXT REFERENCES tweets(id),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                CHECK ((video_id IS NOT NULL) + (comment_id IS NOT NULL) + (tweet_id IS NOT NULL) = 1)
            );

            CREATE UNIQUE INDEX uq_likes_video ON likes(liked_by, video_id) WHERE video_id IS NOT NULL;
            CREATE UNIQUE INDEX uq_likes_comment ON likes(liked_by, comment_id) WHERE comment_id IS NOT NULL;
            CREATE UNIQUE INDEX uq_likes_tweet ON likes(liked_by, tweet_id) WHERE tweet_id IS NOT NULL;
            CREATE INDEX idx_likes_video ON likes(video_id);
            CREATE INDEX idx_likes_comment ON likes(comment_id);
            CREATE INDEX idx_likes_tweet ON likes(tweet_id);

            CREATE TABLE subscriptions (
                id             TEXT PRIMARY KEY,
                subscriber_id  TEXT NOT NULL REFERENCES users(id),
                channel_id     TEXT NOT NULL REFERENCES users(id),
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(subscriber_id, channel_id)
            );

            CREATE INDEX idx_subscriptions_channel ON subscriptions(channel_id);

            CREATE TABLE playlists (
                id           TEXT PRIMARY KEY,
                owner_id     TEXT NOT NULL REFERENCES users(id),
                name         TEXT NOT NULL,
                description  TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE playlist_videos (
                playlist_id  TEXT NOT NULL REFERENCES playlists(id),
                video_id     TEXT NOT NULL REFERENCES videos(id),
                position     INTEGER NOT NULL,
                PRIMARY KEY (playlist_id, video_id)
            );

            CREATE TABLE watch_history (
                user_id     TEXT NOT NULL REFERENCES users(id),
                video_id    TEXT NOT NULL REFERENCES videos(id),
                position    INTEGER NOT NULL,
                PRIMARY KEY (user_id, video_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
