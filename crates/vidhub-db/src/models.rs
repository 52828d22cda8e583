//! Database row types. These map directly to SQLite rows and stay
//! independent of the vidhub-types API models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar_url: String,
    pub avatar_id: String,
    pub cover_url: Option<String>,
    pub cover_id: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub avatar_id: &'a str,
    pub cover_url: Option<&'a str>,
    pub cover_id: Option<&'a str>,
}

/// The public-safe subset of a user joined into other views.
pub struct OwnerRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
}

pub struct ChannelProfileRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub cover_url: Option<String>,
    pub subscribers_count: i64,
    pub channels_subscribed_to_count: i64,
    pub is_subscribed: bool,
    pub created_at: String,
}

pub struct ChannelSummaryRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub subscribers_count: i64,
    pub is_subscribed: bool,
}

pub struct VideoRow {
    pub id: String,
    pub owner_id: String,
    pub video_url: String,
    pub video_storage_id: String,
    pub thumbnail_url: String,
    pub thumbnail_storage_id: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewVideo<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub video_url: &'a str,
    pub video_storage_id: &'a str,
    pub thumbnail_url: &'a str,
    pub thumbnail_storage_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration: f64,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Default)]
pub struct VideoChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub thumbnail: Option<(&'a str, &'a str)>,
}

/// Video detail with its social aggregates, relative to one viewer.
pub struct VideoDetailRow {
    pub video: VideoRow,
    pub owner_username: String,
    pub owner_avatar_url: String,
    pub owner_subscribers_count: i64,
    pub owner_is_subscribed: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

pub struct VideoListRow {
    pub video: VideoRow,
    pub owner: OwnerRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSort {
    #[default]
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "v.created_at",
            Self::Views => "v.views",
            Self::Duration => "v.duration",
            Self::Title => "v.title COLLATE NOCASE",
        }
    }
}

/// Filter for the video listing. Unpublished videos are only returned to
/// their owner.
pub struct VideoFilter<'a> {
    pub owner_id: Option<&'a str>,
    pub search_tokens: Vec<String>,
    pub viewer_id: &'a str,
    pub sort: VideoSort,
    pub ascending: bool,
    pub pagination: Pagination,
}

pub struct CommentRow {
    pub id: String,
    pub video_id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentViewRow {
    pub comment: CommentRow,
    pub owner: OwnerRow,
    pub likes_count: i64,
    pub is_liked: bool,
}

pub struct TweetRow {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct TweetViewRow {
    pub tweet: TweetRow,
    pub owner: OwnerRow,
    pub likes_count: i64,
    pub is_liked: bool,
}

pub struct PlaylistRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    /// Video ids in insertion order.
    pub videos: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct PlaylistVideoRow {
    pub id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub created_at: String,
}

pub struct PlaylistViewRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner: OwnerRow,
    pub videos: Vec<PlaylistVideoRow>,
    pub created_at: String,
    pub updated_at: String,
}

/// Which kind of entity a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video,
    Comment,
    Tweet,
}

impl LikeTarget {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Video => "video_id",
            Self::Comment => "comment_id",
            Self::Tweet => "tweet_id",
        }
    }
}

/// 1-indexed page plus page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
