//! Internal social feed: department channels, posts, comments and
//! trending hashtags.

pub mod error;
pub mod handlers;
pub mod storage;
pub mod trending;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::SocialError;

pub fn configure_social_routes() -> Router<Arc<AppState>> {
    use handlers::*;

    Router::new()
        .route("/api/feed/channels", get(list_channels).post(create_channel))
        .route("/api/feed/posts", get(list_posts).post(create_post))
        .route(
            "/api/feed/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/feed/trending", get(get_trending))
}
