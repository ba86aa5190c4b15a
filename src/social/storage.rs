use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::error::SocialError;
use super::trending::{hashtags, trending, TrendingTopic, TRENDING_LIMIT, TRENDING_WINDOW_DAYS};
use super::types::*;
use crate::core::shared::schema::{departments, feed_channels, feed_post_comments, feed_posts};

const DEFAULT_FEED_PAGE: i64 = 30;
const MAX_FEED_PAGE: i64 = 100;
const MAX_POST_CHARS: usize = 5000;

fn check_content(content: &str) -> Result<String, SocialError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(SocialError::Validation("content is empty".to_string()));
    }
    if content.chars().count() > MAX_POST_CHARS {
        return Err(SocialError::Validation(format!(
            "content is longer than {MAX_POST_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

pub fn list_channels(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Channel>, SocialError> {
    Ok(feed_channels::table
        .filter(feed_channels::tenant_id.eq(tenant_id))
        .order(feed_channels::name.asc())
        .select(Channel::as_select())
        .load(conn)?)
}

pub fn get_channel(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Channel, SocialError> {
    feed_channels::table
        .filter(feed_channels::tenant_id.eq(tenant_id))
        .filter(feed_channels::id.eq(id))
        .select(Channel::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SocialError::NotFound(format!("channel {id}")))
}

pub fn create_channel(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    req: CreateChannelRequest,
) -> Result<Channel, SocialError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(SocialError::Validation("channel name is required".to_string()));
    }
    if let Some(department_id) = req.department_id {
        let found: i64 = departments::table
            .filter(departments::tenant_id.eq(tenant_id))
            .filter(departments::id.eq(department_id))
            .count()
            .get_result(conn)?;
        if found == 0 {
            return Err(SocialError::Validation(format!("unknown department {department_id}")));
        }
    }
    let channel = Channel {
        id: Uuid::new_v4(),
        tenant_id,
        name: name.to_string(),
        department_id: req.department_id,
        description: req.description,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(feed_channels::table)
        .values(&channel)
        .returning(Channel::as_returning())
        .get_result(conn)?)
}

fn comment_counts(conn: &mut PgConnection, post_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, SocialError> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = feed_post_comments::table
        .filter(feed_post_comments::post_id.eq_any(post_ids))
        .group_by(feed_post_comments::post_id)
        .select((feed_post_comments::post_id, diesel::dsl::count_star()))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}

fn to_views(conn: &mut PgConnection, posts: Vec<Post>) -> Result<Vec<PostView>, SocialError> {
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
    let counts = comment_counts(conn, &ids)?;
    Ok(posts
        .into_iter()
        .map(|post| PostView {
            hashtags: hashtags(&post.content).into_iter().collect(),
            comment_count: counts.get(&post.id).copied().unwrap_or(0),
            post,
        })
        .collect())
}

/// Newest first. A department filter covers every channel mapped to it.
pub fn list_posts(conn: &mut PgConnection, tenant_id: Uuid, query: FeedQuery) -> Result<Vec<PostView>, SocialError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_PAGE).clamp(1, MAX_FEED_PAGE);
    let mut q = feed_posts::table
        .filter(feed_posts::tenant_id.eq(tenant_id))
        .into_boxed();
    if let Some(channel_id) = query.channel_id {
        q = q.filter(feed_posts::channel_id.eq(channel_id));
    }
    if let Some(department_id) = query.department_id {
        let channels: Vec<Uuid> = feed_channels::table
            .filter(feed_channels::tenant_id.eq(tenant_id))
            .filter(feed_channels::department_id.eq(department_id))
            .select(feed_channels::id)
            .load(conn)?;
        q = q.filter(feed_posts::channel_id.eq_any(channels));
    }
    if let Some(before) = query.before {
        q = q.filter(feed_posts::created_at.lt(before));
    }
    let posts = q
        .order(feed_posts::created_at.desc())
        .limit(limit)
        .select(Post::as_select())
        .load(conn)?;
    to_views(conn, posts)
}

pub fn get_post(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Post, SocialError> {
    feed_posts::table
        .filter(feed_posts::tenant_id.eq(tenant_id))
        .filter(feed_posts::id.eq(id))
        .select(Post::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SocialError::NotFound(format!("post {id}")))
}

pub fn create_post(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    author_id: Option<Uuid>,
    req: CreatePostRequest,
) -> Result<PostView, SocialError> {
    let content = check_content(&req.content)?;
    if let Some(channel_id) = req.channel_id {
        get_channel(conn, tenant_id, channel_id)?;
    }
    let post = Post {
        id: Uuid::new_v4(),
        tenant_id,
        channel_id: req.channel_id,
        author_id,
        content,
        created_at: Utc::now(),
    };
    let saved = diesel::insert_into(feed_posts::table)
        .values(&post)
        .returning(Post::as_returning())
        .get_result(conn)?;
    Ok(PostView {
        hashtags: hashtags(&saved.content).into_iter().collect(),
        comment_count: 0,
        post: saved,
    })
}

pub fn list_comments(conn: &mut PgConnection, tenant_id: Uuid, post_id: Uuid) -> Result<Vec<PostComment>, SocialError> {
    get_post(conn, tenant_id, post_id)?;
    Ok(feed_post_comments::table
        .filter(feed_post_comments::post_id.eq(post_id))
        .order(feed_post_comments::created_at.asc())
        .select(PostComment::as_select())
        .load(conn)?)
}

pub fn add_comment(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    post_id: Uuid,
    author_id: Option<Uuid>,
    req: CreatePostCommentRequest,
) -> Result<PostComment, SocialError> {
    let content = check_content(&req.content)?;
    get_post(conn, tenant_id, post_id)?;
    let comment = PostComment {
        id: Uuid::new_v4(),
        post_id,
        author_id,
        content,
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(feed_post_comments::table)
        .values(&comment)
        .returning(PostComment::as_returning())
        .get_result(conn)?)
}

pub fn trending_topics(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<TrendingTopic>, SocialError> {
    let since = now - Duration::days(TRENDING_WINDOW_DAYS);
    let contents: Vec<String> = feed_posts::table
        .filter(feed_posts::tenant_id.eq(tenant_id))
        .filter(feed_posts::created_at.ge(since))
        .filter(feed_posts::content.like("%#%"))
        .select(feed_posts::content)
        .load(conn)?;
    Ok(trending(contents.iter().map(String::as_str), TRENDING_LIMIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_trimmed_and_bounded() {
        assert_eq!(check_content("  hello #team ").unwrap(), "hello #team");
        assert!(check_content("   ").is_err());
        assert!(check_content(&"x".repeat(MAX_POST_CHARS + 1)).is_err());
    }
}
