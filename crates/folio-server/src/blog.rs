//! Optional blog-post feed.
//!
//! The service does not parse RSS. A feed is any source of ready-made post
//! entries; the bundled one reads a JSON array from the data directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use folio_core::Result;

/// File under the data directory read by [`JsonFileFeed`].
pub const BLOG_FEED_FILE: &str = "blogs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub published: Option<String>,
}

/// Source of blog posts. Called on the blocking pool.
pub trait BlogFeed: Send + Sync {
    fn posts(&self) -> Result<Vec<BlogPost>>;
}

/// Reads posts from a JSON file on every call.
pub struct JsonFileFeed {
    path: PathBuf,
}

impl JsonFileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BlogFeed for JsonFileFeed {
    fn posts(&self) -> Result<Vec<BlogPost>> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_file_feed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(BLOG_FEED_FILE);
        std::fs::write(
            &path,
            r#"[{"title": "Hello", "link": "https://example.com/hello", "published": "2024-01-01"},
                {"title": "Untimed", "link": "https://example.com/untimed"}]"#,
        )
        .unwrap();

        let posts = JsonFileFeed::new(&path).posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Hello");
        assert_eq!(posts[1].published, None);
    }

    #[test]
    fn test_json_file_feed_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(JsonFileFeed::new(tmp.path().join("missing.json")).posts().is_err());

        let path = tmp.path().join(BLOG_FEED_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonFileFeed::new(&path).posts().is_err());
    }
}
