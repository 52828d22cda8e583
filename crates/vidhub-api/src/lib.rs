pub mod auth;
pub mod comments;
pub mod error;
pub mod extract;
pub mod likes;
pub mod media;
pub mod middleware;
pub mod playlists;
pub mod routes;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;
pub mod views;

pub use routes::router;
