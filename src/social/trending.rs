use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

pub const TRENDING_WINDOW_DAYS: i64 = 7;
pub const TRENDING_LIMIT: usize = 10;

static HASHTAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w&])#(\w{1,64})").ok());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingTopic {
    pub tag: String,
    pub count: usize,
}

/// Lowercased, distinct hashtags of one post, without the `#`.
pub fn hashtags(content: &str) -> BTreeSet<String> {
    let Some(re) = HASHTAG.as_ref() else {
        return BTreeSet::new();
    };
    re.captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|tag| !tag.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Counts posts per tag, a post counting once however often it repeats a
/// tag. Ordered by count, then tag.
pub fn trending<'a, I>(posts: I, limit: usize) -> Vec<TrendingTopic>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for content in posts {
        for tag in hashtags(content) {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut topics: Vec<TrendingTopic> = counts
        .into_iter()
        .map(|(tag, count)| TrendingTopic { tag, count })
        .collect();
    topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    topics.truncate(limit);
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_case_insensitive_tags() {
        let tags = hashtags("Kickoff #Launch today! #launch #Q3-plan email me@x.com#nope &#39;");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["launch", "q3"]);
    }

    #[test]
    fn test_numeric_only_tags_ignored() {
        assert!(hashtags("ticket #42").is_empty());
    }

    #[test]
    fn test_ranking_ties_break_alphabetically() {
        let posts = [
            "#rust #tokio",
            "#Rust again #rust",
            "#axum #tokio",
            "#diesel",
        ];
        let top = trending(posts.iter().copied(), 3);
        assert_eq!(
            top,
            vec![
                TrendingTopic { tag: "rust".into(), count: 2 },
                TrendingTopic { tag: "tokio".into(), count: 2 },
                TrendingTopic { tag: "axum".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_limit() {
        let posts: Vec<String> = (0..15).map(|i| format!("#tag{i:02}")).collect();
        assert_eq!(trending(posts.iter().map(String::as_str), TRENDING_LIMIT).len(), 10);
    }
}
