// Task selectors: quick filters and category filters

use chrono::{DateTime, Days, TimeDelta, TimeZone, Utc};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::models::{Priority, Task};
use crate::time::resolve_local;

/// Which tasks to show. Reserved keywords are matched exactly; any other
/// value selects a category by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    All,
    Today,
    Upcoming,
    Completed,
    HighPriority,
    Category(String),
}

impl Selector {
    /// Quick filters in sidebar order
    pub fn quick_filters() -> [Selector; 5] {
        [
            Selector::All,
            Selector::Today,
            Selector::Upcoming,
            Selector::HighPriority,
            Selector::Completed,
        ]
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "all" => Selector::All,
            "today" => Selector::Today,
            "upcoming" => Selector::Upcoming,
            "completed" => Selector::Completed,
            "high-priority" => Selector::HighPriority,
            other => Selector::Category(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::All => "all",
            Selector::Today => "today",
            Selector::Upcoming => "upcoming",
            Selector::Completed => "completed",
            Selector::HighPriority => "high-priority",
            Selector::Category(id) => id.as_str(),
        }
    }

    /// Human label for quick filters; category selectors return their id
    pub fn label(&self) -> &str {
        match self {
            Selector::All => "All Tasks",
            Selector::Today => "Today",
            Selector::Upcoming => "Upcoming",
            Selector::Completed => "Completed",
            Selector::HighPriority => "High Priority",
            Selector::Category(id) => id.as_str(),
        }
    }

    /// Whether `task` passes this selector at instant `now`.
    ///
    /// `today` compares calendar days in `now`'s zone. `upcoming` requires the
    /// scheduled instant to be strictly after `now` plus one calendar day, so a
    /// task scheduled for the early part of tomorrow is in neither bucket.
    pub fn matches<Tz: TimeZone>(&self, task: &Task, now: &DateTime<Tz>) -> bool {
        let tz = now.timezone();
        match self {
            Selector::All => true,
            Selector::Today => task
                .scheduled_at(&tz)
                .is_some_and(|at| at.with_timezone(&tz).date_naive() == now.date_naive()),
            Selector::Upcoming => {
                let tomorrow = one_day_after(now);
                task.scheduled_at(&tz).is_some_and(|at| at > tomorrow)
            }
            Selector::Completed => task.completed,
            Selector::HighPriority => task.priority == Priority::High && !task.completed,
            Selector::Category(id) => task.category == *id,
        }
    }
}

/// Same wall-clock time on the next calendar day in `now`'s zone
fn one_day_after<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.naive_local()
        .checked_add_days(Days::new(1))
        .and_then(|next| resolve_local(&now.timezone(), &next))
        .unwrap_or_else(|| now.with_timezone(&Utc) + TimeDelta::days(1))
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::parse(raw)
    }
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Selector::parse(s))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
