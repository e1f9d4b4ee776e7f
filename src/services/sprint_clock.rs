use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{FeedError, Result};
use crate::models::{PreStartDay, SprintSettings};

/// Zone whose midnights delimit sprint days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SprintZone {
    Local,
    Named(Tz),
}

impl SprintZone {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(SprintZone::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(SprintZone::Named)
                .map_err(|e| FeedError::Config(format!("timezone {}: {}", name, e))),
        }
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            SprintZone::Local => instant.with_timezone(&Local).date_naive(),
            SprintZone::Named(tz) => instant.with_timezone(tz).date_naive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SprintPhase {
    NotStarted { days_until: u32 },
    /// `week` is zero-based.
    Running { day: u32, week: u32 },
    Finished,
}

/// Banner shown above the feed: a headline plus the theme it introduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeBanner {
    pub headline: String,
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintCalendar {
    start: NaiveDate,
    total_days: u32,
    pre_start: PreStartDay,
    zone: SprintZone,
}

impl SprintCalendar {
    pub fn new(start: NaiveDate, total_days: u32) -> Self {
        Self {
            start,
            total_days: total_days.max(1),
            pre_start: PreStartDay::Zero,
            zone: SprintZone::Local,
        }
    }

    pub fn with_pre_start(mut self, pre_start: PreStartDay) -> Self {
        self.pre_start = pre_start;
        self
    }

    pub fn with_zone(mut self, zone: SprintZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn from_settings(settings: &SprintSettings) -> Result<Self> {
        if settings.total_days == 0 {
            return Err(FeedError::Config("total_days must be positive".to_string()));
        }
        Ok(Self::new(settings.start_date, settings.total_days)
            .with_pre_start(settings.pre_start_day)
            .with_zone(SprintZone::parse(settings.timezone.as_deref())?))
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    pub fn total_days(&self) -> u32 {
        self.total_days
    }

    /// Last calendar day that still belongs to the sprint.
    pub fn end_date(&self) -> NaiveDate {
        self.start + ChronoDuration::days(i64::from(self.total_days) - 1)
    }

    pub fn day_for_date(&self, date: NaiveDate) -> u32 {
        if date < self.start {
            return match self.pre_start {
                PreStartDay::Zero => 0,
                PreStartDay::One => 1,
            };
        }
        let elapsed = (date - self.start).num_days() + 1;
        elapsed.min(i64::from(self.total_days)) as u32
    }

    pub fn current_day(&self, now: DateTime<Utc>) -> u32 {
        self.day_for_date(self.zone.date_of(now))
    }

    /// Sprint day an entry created at `created` belongs to; never below 1.
    pub fn day_of(&self, created: DateTime<Utc>) -> u32 {
        self.current_day(created).max(1)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SprintPhase {
        let date = self.zone.date_of(now);
        if date < self.start {
            let days_until = (self.start - date).num_days() as u32;
            return SprintPhase::NotStarted { days_until };
        }
        if date > self.end_date() {
            return SprintPhase::Finished;
        }
        let day = self.day_for_date(date);
        SprintPhase::Running {
            day,
            week: (day - 1) / 7,
        }
    }

    pub fn weekly_theme(&self, now: DateTime<Utc>, themes: &[String]) -> Option<ThemeBanner> {
        match self.phase(now) {
            SprintPhase::NotStarted { days_until } => {
                let headline = match days_until {
                    0 => "Sprint Starts Today!".to_string(),
                    1 => "Sprint Starts Tomorrow!".to_string(),
                    n => format!("Sprint Starts in {} days!", n),
                };
                Some(ThemeBanner {
                    headline,
                    theme: format!("First theme: {}", themes.first()?),
                })
            }
            SprintPhase::Running { week, .. } => {
                let theme = themes.get(week as usize).or_else(|| themes.last())?;
                Some(ThemeBanner {
                    headline: "This Week's Theme:".to_string(),
                    theme: theme.clone(),
                })
            }
            SprintPhase::Finished => None,
        }
    }

    /// Start and end dates joined by an em dash, e.g. `October 13 \u{2014} January 10, 2026`.
    pub fn date_range_label(&self) -> String {
        format!(
            "{} \u{2014} {}",
            self.start.format("%B %-d"),
            self.end_date().format("%B %-d, %Y")
        )
    }
}

/// Re-evaluates the sprint day every `every` and publishes changes.
///
/// The task stops once every receiver has been dropped.
pub fn start_day_ticker(calendar: SprintCalendar, every: Duration) -> watch::Receiver<u32> {
    let (tx, rx) = watch::channel(calendar.current_day(Utc::now()));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let day = calendar.current_day(Utc::now());
            let changed = tx.send_if_modified(|current| {
                if *current != day {
                    *current = day;
                    true
                } else {
                    false
                }
            });
            if changed {
                log::info!("[SprintClock] Day rolled over to {}", day);
            }
        }
    });

    rx
}
