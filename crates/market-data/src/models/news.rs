//! Editorial news feed models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single market news article.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub image: String,
    pub published_at: DateTime<Utc>,
}
