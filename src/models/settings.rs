use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub version: String,
    pub sprint: SprintSettings,
    pub store: StoreSettings,
    pub feed: FeedSettings,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            sprint: SprintSettings::default(),
            store: StoreSettings::default(),
            feed: FeedSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// What the day counter shows before the sprint has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreStartDay {
    #[default]
    Zero,
    One,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintSettings {
    pub start_date: NaiveDate,
    pub total_days: u32,
    #[serde(default)]
    pub pre_start_day: PreStartDay,
    /// IANA zone name for day boundaries; the machine's local zone when unset.
    #[serde(default)]
    pub timezone: Option<String>,
    pub weekly_themes: Vec<String>,
    #[serde(default = "default_day_tick_secs")]
    pub day_tick_secs: u64,
}

impl Default for SprintSettings {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 10, 13).unwrap_or_default(),
            total_days: 90,
            pre_start_day: PreStartDay::Zero,
            timezone: None,
            weekly_themes: default_weekly_themes(),
            day_tick_secs: default_day_tick_secs(),
        }
    }
}

fn default_day_tick_secs() -> u64 {
    60
}

fn default_weekly_themes() -> Vec<String> {
    [
        "Narratives, Myths & Lies",
        "Digital Selves & Authenticity",
        "The Aesthetics of Power",
        "Creator Economy & The Future of Work",
        "Black Feminist Thought in a Digital Age",
        "Nostalgia, Trends, and the Cultural Cycle",
        "Visual Storytelling & Online Identity",
        "The Art of the Critique",
        "Building Community in Public",
        "Rest, Leisure, and Liberatory Practice",
        "Money, Ambition, and Creative Integrity",
        "The Algorithm & The Archive",
        "Reflections & Future Forecasts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub api_key: String,
    /// Bearer token for admin writes; anonymous reads work without it.
    #[serde(default)]
    pub id_token: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            api_key: String::new(),
            id_token: None,
            collection: "drops".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub page_size: usize,
    pub poll_interval_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub db_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_file: "sprintfeed.db".to_string(),
        }
    }
}
