// Derived views over the task collection: filtering, ordering, counts

use chrono::{DateTime, Days, TimeZone, Utc};

use crate::filter::Selector;
use crate::models::{Category, Task};

/// Tasks passing `selector` and `query`, incomplete first, newest first within each group.
///
/// The query is applied only when non-empty and matches title, description or
/// any tag, case-insensitively. Ties on `created_at` keep their input order.
pub fn filter_tasks<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    selector: &Selector,
    query: &str,
    now: &DateTime<Tz>,
) -> Vec<&'a Task> {
    let mut selected: Vec<&Task> =
        tasks.iter().filter(|task| selector.matches(task, now)).collect();

    if !query.is_empty() {
        let needle = query.to_lowercase();
        selected.retain(|task| task.matches_query(&needle));
    }

    selected.sort_by(|a, b| {
        a.completed
            .cmp(&b.completed)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    selected
}

/// Badge count for a selector; always equals `filter_tasks(tasks, selector, "", now).len()`
pub fn count<Tz: TimeZone>(tasks: &[Task], selector: &Selector, now: &DateTime<Tz>) -> usize {
    tasks.iter().filter(|task| selector.matches(task, now)).count()
}

/// Counts for every quick filter followed by every category, in sidebar order
pub fn badge_counts<Tz: TimeZone>(
    tasks: &[Task],
    categories: &[Category],
    now: &DateTime<Tz>,
) -> Vec<(Selector, usize)> {
    Selector::quick_filters()
        .into_iter()
        .chain(categories.iter().map(|c| Selector::Category(c.id.clone())))
        .map(|selector| {
            let n = count(tasks, &selector, now);
            (selector, n)
        })
        .collect()
}

/// Category with the given id, or the "Unknown" placeholder
pub fn resolve_category(categories: &[Category], id: &str) -> Category {
    categories
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .unwrap_or_else(|| Category::unknown(id))
}

/// Which empty-state message to show when a view has no tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// Nothing matched a non-empty search
    NoMatches,
    NoTasks,
}

impl EmptyState {
    pub fn for_query(query: &str) -> Self {
        if query.is_empty() {
            EmptyState::NoTasks
        } else {
            EmptyState::NoMatches
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            EmptyState::NoMatches => "Try adjusting your search terms",
            EmptyState::NoTasks => "Create your first task to get started",
        }
    }
}

/// Short relative label for a date: "Today", "Tomorrow" or e.g. "Jan 10"
pub fn date_label<Tz: TimeZone>(at: &DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local = at.with_timezone(&now.timezone());
    let today = now.date_naive();
    let day = local.date_naive();

    if day == today {
        "Today".to_string()
    } else if today.checked_add_days(Days::new(1)) == Some(day) {
        "Tomorrow".to_string()
    } else {
        local.format("%b %-d").to_string()
    }
}
