//! Mapping from database rows to the JSON shapes returned by the API.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use vidhub_db::models::{
    ChannelProfileRow, ChannelSummaryRow, CommentRow, CommentViewRow, OwnerRow, PlaylistRow,
    PlaylistViewRow, TweetRow, TweetViewRow, UserRow, VideoDetailRow, VideoListRow, VideoRow,
};
use vidhub_types::api::{
    ChannelOwner, ChannelProfile, ChannelSummary, CommentView, PlaylistVideo, PlaylistView,
    TweetView, VideoDetail, VideoSummary,
};
use vidhub_types::models::{
    Comment, MediaAsset, OwnerSummary, Playlist, Tweet, UserProfile, Video,
};

fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::nil()
    })
}

fn timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::<Utc>::default()
        })
}

pub fn user_profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: uuid(&row.id, "user id"),
        username: row.username.clone(),
        email: row.email.clone(),
        full_name: row.full_name.clone(),
        avatar: row.avatar_url.clone(),
        cover_image: row.cover_url.clone(),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn owner_summary(row: OwnerRow) -> OwnerSummary {
    OwnerSummary {
        id: uuid(&row.id, "owner id"),
        username: row.username,
        full_name: row.full_name,
        avatar: row.avatar_url,
    }
}

pub fn channel_profile(row: ChannelProfileRow) -> ChannelProfile {
    ChannelProfile {
        id: uuid(&row.id, "user id"),
        username: row.username,
        full_name: row.full_name,
        email: row.email,
        avatar: row.avatar_url,
        cover_image: row.cover_url,
        subscribers_count: row.subscribers_count,
        channels_subscribed_to_count: row.channels_subscribed_to_count,
        is_subscribed: row.is_subscribed,
        created_at: timestamp(&row.created_at),
    }
}

pub fn channel_summary(row: ChannelSummaryRow) -> ChannelSummary {
    ChannelSummary {
        id: uuid(&row.id, "user id"),
        username: row.username,
        full_name: row.full_name,
        avatar: row.avatar_url,
        subscribers_count: row.subscribers_count,
        is_subscribed: row.is_subscribed,
    }
}

pub fn video(row: VideoRow) -> Video {
    Video {
        id: uuid(&row.id, "video id"),
        owner_id: uuid(&row.owner_id, "owner id"),
        video_file: MediaAsset {
            url: row.video_url,
            storage_id: row.video_storage_id,
        },
        thumbnail: MediaAsset {
            url: row.thumbnail_url,
            storage_id: row.thumbnail_storage_id,
        },
        title: row.title,
        description: row.description,
        duration: row.duration,
        views: row.views,
        is_published: row.is_published,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn video_detail(row: VideoDetailRow) -> VideoDetail {
    let v = row.video;
    VideoDetail {
        id: uuid(&v.id, "video id"),
        video_file: v.video_url,
        thumbnail: v.thumbnail_url,
        title: v.title,
        description: v.description,
        duration: v.duration,
        views: v.views,
        is_published: v.is_published,
        likes_count: row.likes_count,
        comments_count: row.comments_count,
        is_liked: row.is_liked,
        owner: ChannelOwner {
            id: uuid(&v.owner_id, "owner id"),
            username: row.owner_username,
            avatar: row.owner_avatar_url,
            subscribers_count: row.owner_subscribers_count,
            is_subscribed: row.owner_is_subscribed,
        },
        created_at: timestamp(&v.created_at),
    }
}

pub fn video_summary(row: VideoListRow) -> VideoSummary {
    let v = row.video;
    VideoSummary {
        id: uuid(&v.id, "video id"),
        video_file: v.video_url,
        thumbnail: v.thumbnail_url,
        title: v.title,
        description: v.description,
        duration: v.duration,
        views: v.views,
        is_published: v.is_published,
        owner: owner_summary(row.owner),
        created_at: timestamp(&v.created_at),
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: uuid(&row.id, "comment id"),
        video_id: uuid(&row.video_id, "video id"),
        owner_id: uuid(&row.owner_id, "owner id"),
        content: row.content,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn comment_view(row: CommentViewRow) -> CommentView {
    let c = row.comment;
    CommentView {
        id: uuid(&c.id, "comment id"),
        video_id: uuid(&c.video_id, "video id"),
        content: c.content,
        likes_count: row.likes_count,
        is_liked: row.is_liked,
        owner: owner_summary(row.owner),
        created_at: timestamp(&c.created_at),
        updated_at: timestamp(&c.updated_at),
    }
}

pub fn tweet(row: TweetRow) -> Tweet {
    Tweet {
        id: uuid(&row.id, "tweet id"),
        owner_id: uuid(&row.owner_id, "owner id"),
        content: row.content,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn tweet_view(row: TweetViewRow) -> TweetView {
    let t = row.tweet;
    TweetView {
        id: uuid(&t.id, "tweet id"),
        content: t.content,
        likes_count: row.likes_count,
        is_liked: row.is_liked,
        owner: owner_summary(row.owner),
        created_at: timestamp(&t.created_at),
    }
}

pub fn playlist(row: PlaylistRow) -> Playlist {
    Playlist {
        id: uuid(&row.id, "playlist id"),
        owner_id: uuid(&row.owner_id, "owner id"),
        name: row.name,
        description: row.description,
        videos: row.videos.iter().map(|v| uuid(v, "video id")).collect(),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}

pub fn playlist_view(row: PlaylistViewRow) -> PlaylistView {
    let videos: Vec<PlaylistVideo> = row
        .videos
        .into_iter()
        .map(|v| PlaylistVideo {
            id: uuid(&v.id, "video id"),
            video_file: v.video_url,
            thumbnail: v.thumbnail_url,
            title: v.title,
            description: v.description,
            duration: v.duration,
            views: v.views,
            created_at: timestamp(&v.created_at),
        })
        .collect();

    PlaylistView {
        id: uuid(&row.id, "playlist id"),
        name: row.name,
        description: row.description,
        owner: owner_summary(row.owner),
        total_videos: videos.len() as i64,
        total_views: videos.iter().map(|v| v.views).sum(),
        videos,
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
    }
}
