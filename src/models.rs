// Data models for GoldTasks

use chrono::{DateTime, TimeZone, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::time::parse_timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}' (expected low, medium or high)", other)),
        }
    }
}

/// A to-do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Raw date or date-time text, parsed leniently when used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Scheduled instant, or `None` when missing or unparseable
    pub fn scheduled_at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        self.scheduled_date.as_deref().and_then(|raw| parse_timestamp(raw, tz))
    }

    pub fn due_at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(|raw| parse_timestamp(raw, tz))
    }

    /// Case-insensitive substring match on title, description or any tag.
    /// `needle` must already be lowercased.
    pub fn matches_query(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains(needle)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
    }

    /// Merge a patch into this task and stamp `updated_at`
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(scheduled_date) = patch.scheduled_date {
            self.scheduled_date = scheduled_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }

        self.touch(now);
        Ok(())
    }

    /// Stamp `updated_at`, never moving it before `created_at`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Fields supplied when creating a task; id and timestamps are assigned by the store
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub due_date: Option<String>,
    pub scheduled_date: Option<String>,
    pub priority: Priority,
}

/// Partial task update. `None` leaves a field untouched; for optional fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<String>>,
    pub scheduled_date: Option<Option<String>>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.due_date.is_none()
            && self.scheduled_date.is_none()
            && self.priority.is_none()
    }
}

pub(crate) fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(eyre!("Task title cannot be empty"));
    }
    Ok(())
}

/// Trim tags, drop empty ones and repeats; first occurrence wins
pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Grouping label attached to tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
}

impl Category {
    pub const UNKNOWN_NAME: &'static str = "Unknown";
    pub const UNKNOWN_ICON: &'static str = "📝";
    pub const UNKNOWN_COLOR: &'static str = "gold";

    /// Placeholder shown for a task whose category no longer exists
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Self::UNKNOWN_NAME.to_string(),
            color: Self::UNKNOWN_COLOR.to_string(),
            icon: Self::UNKNOWN_ICON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
    pub icon: String,
}

/// Categories present on first run
pub fn default_categories() -> Vec<Category> {
    [
        ("1", "Work", "gold", "💼"),
        ("2", "Personal", "blue", "🏠"),
        ("3", "Health", "green", "💪"),
        ("4", "Learning", "purple", "📚"),
    ]
    .into_iter()
    .map(|(id, name, color, icon)| Category {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        icon: icon.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    FamilyMember,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::FamilyMember => "family_member",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::FamilyMember => "Family Member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "admin" => Ok(Role::Admin),
            "family_member" | "family" => Ok(Role::FamilyMember),
            other => Err(format!("unknown role '{}' (expected admin or family_member)", other)),
        }
    }
}

/// Household roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// Orthogonal to role; an admin can also be a family member
    #[serde(default)]
    pub is_family_member: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn apply(&mut self, patch: UserPatch) -> Result<()> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            self.email = email.trim().to_string();
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_family_member: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<Option<String>>,
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(eyre!("Name cannot be empty"));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(eyre!("Invalid email address: '{}'", email)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        Task {
            id: "t1".to_string(),
            title: "Buy Milk".to_string(),
            description: None,
            completed: false,
            category: "2".to_string(),
            tags: vec!["Grocery".to_string()],
            due_date: None,
            scheduled_date: Some("2024-01-10T09:00:00Z".to_string()),
            priority: Priority::Medium,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_priority_serialization() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::FamilyMember).unwrap(), "\"family_member\"");
        assert_eq!("family-member".parse::<Role>().unwrap(), Role::FamilyMember);
        assert_eq!(Role::Admin.label(), "Administrator");
    }

    #[test]
    fn test_task_serialization_uses_camel_case() {
        let task = sample_task();
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"scheduledDate\":\"2024-01-10T09:00:00Z\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("dueDate"));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_task_deserialize_defaults() {
        let json = r#"{
            "id": "9",
            "title": "Walk dog",
            "category": "2",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(!task.completed);
        assert!(task.tags.is_empty());
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_matches_query() {
        let task = sample_task();
        assert!(task.matches_query("grocery"));
        assert!(task.matches_query("milk"));
        assert!(!task.matches_query("bread"));
    }

    #[test]
    fn test_apply_patch_stamps_updated_at() {
        let mut task = sample_task();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();
        task.apply(
            TaskPatch {
                completed: Some(true),
                description: Some(Some("2 litres".to_string())),
                scheduled_date: Some(None),
                ..Default::default()
            },
            later,
        )
        .unwrap();

        assert!(task.completed);
        assert_eq!(task.description.as_deref(), Some("2 litres"));
        assert!(task.scheduled_date.is_none());
        assert_eq!(task.updated_at, later);
        assert_eq!(task.title, "Buy Milk");
    }

    #[test]
    fn test_touch_never_precedes_created_at() {
        let mut task = sample_task();
        let earlier = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        task.touch(earlier);
        assert_eq!(task.updated_at, task.created_at);
    }

    #[test]
    fn test_apply_rejects_blank_title() {
        let mut task = sample_task();
        let result = task.apply(
            TaskPatch {
                title: Some("   ".to_string()),
                completed: Some(true),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
        assert!(!task.completed);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![
            " home ".to_string(),
            "".to_string(),
            "home".to_string(),
            "chores".to_string(),
        ]);
        assert_eq!(tags, vec!["home".to_string(), "chores".to_string()]);
    }

    #[test]
    fn test_default_categories() {
        let categories = default_categories();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Work", "Personal", "Health", "Learning"]);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("mum@example.com").is_ok());
        assert!(validate_email("mum").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_user_serialization() {
        let user = User {
            id: "u1".to_string(),
            email: "dad@example.com".to_string(),
            name: "Dad".to_string(),
            role: Role::Admin,
            is_family_member: true,
            avatar: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"isFamilyMember\":true"));
        assert!(json.contains("\"role\":\"admin\""));
    }
}
