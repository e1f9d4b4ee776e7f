use serde::{Deserialize, Serialize};

use super::entry::{Access, Entry};

/// Category filter applied on top of the search query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedFilter {
    #[default]
    All,
    Access(Access),
    ContentType(String),
}

impl FeedFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Access(access) => entry.access == *access,
            FeedFilter::ContentType(content_type) => entry.content_type == *content_type,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FeedFilter::All)
    }
}

impl From<String> for FeedFilter {
    fn from(value: String) -> Self {
        if value == "all" {
            FeedFilter::All
        } else if let Some(access) = Access::parse(&value) {
            FeedFilter::Access(access)
        } else {
            FeedFilter::ContentType(value)
        }
    }
}

impl From<FeedFilter> for String {
    fn from(filter: FeedFilter) -> Self {
        match filter {
            FeedFilter::All => "all".to_string(),
            FeedFilter::Access(access) => access.as_str().to_string(),
            FeedFilter::ContentType(content_type) => content_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedSort {
    #[default]
    Newest,
    Oldest,
    MostLoved,
    Trending,
}

impl FeedSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newest" => Some(FeedSort::Newest),
            "oldest" => Some(FeedSort::Oldest),
            "most-loved" => Some(FeedSort::MostLoved),
            "trending" => Some(FeedSort::Trending),
            _ => None,
        }
    }
}

/// The user-facing controls that shape the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedControls {
    pub search_query: String,
    pub filter: FeedFilter,
    pub sort: FeedSort,
}

impl FeedControls {
    /// True when the search box or the category filter narrows the feed.
    pub fn is_narrowed(&self) -> bool {
        !self.search_query.trim().is_empty() || !self.filter.is_all()
    }
}

/// An entry as displayed: `entry.hearts` already includes any pending
/// optimistic heart from this viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCard {
    #[serde(flatten)]
    pub entry: Entry,
    pub hearted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedCounters {
    pub total: usize,
    pub today: usize,
    pub free: usize,
    pub paid: usize,
    pub streak: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyState {
    /// Nothing published yet.
    NoEntries,
    /// Entries exist but none pass the current search / filter.
    NoMatches,
}

impl EmptyState {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::NoEntries => "No entries yet.",
            EmptyState::NoMatches => "No entries found.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub current_day: u32,
    pub today: Vec<EntryCard>,
    pub previous: Vec<EntryCard>,
    pub has_more_previous: bool,
    pub counters: FeedCounters,
    pub empty_state: Option<EmptyState>,
    pub source_error: Option<String>,
}

impl FeedView {
    pub fn is_empty(&self) -> bool {
        self.today.is_empty() && self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keys() {
        assert_eq!(FeedFilter::from("all".to_string()), FeedFilter::All);
        assert_eq!(
            FeedFilter::from("Paid".to_string()),
            FeedFilter::Access(Access::Paid)
        );
        assert_eq!(
            FeedFilter::from("Video".to_string()),
            FeedFilter::ContentType("Video".to_string())
        );
        assert_eq!(String::from(FeedFilter::Access(Access::Free)), "Free");
    }

    #[test]
    fn test_filter_matches_access_or_content_type() {
        let mut entry = Entry::new("a", "t");
        entry.access = Access::Paid;
        entry.content_type = "Video".to_string();

        assert!(FeedFilter::All.matches(&entry));
        assert!(FeedFilter::Access(Access::Paid).matches(&entry));
        assert!(!FeedFilter::Access(Access::Free).matches(&entry));
        assert!(FeedFilter::ContentType("Video".into()).matches(&entry));
        assert!(!FeedFilter::ContentType("Essay".into()).matches(&entry));
    }

    #[test]
    fn test_sort_keys() {
        assert_eq!(FeedSort::parse("most-loved"), Some(FeedSort::MostLoved));
        assert_eq!(FeedSort::parse("random"), None);
        assert_eq!(
            serde_json::to_string(&FeedSort::MostLoved).unwrap(),
            "\"most-loved\""
        );
    }

    #[test]
    fn test_controls_narrowed() {
        let mut controls = FeedControls::default();
        assert!(!controls.is_narrowed());
        controls.search_query = "  ".to_string();
        assert!(!controls.is_narrowed());
        controls.filter = FeedFilter::ContentType("Video".into());
        assert!(controls.is_narrowed());
    }
}
