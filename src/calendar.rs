// Single-event iCalendar export for scheduled tasks

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::models::Task;
use crate::time::format_ics;

/// Events have no end time of their own; every export spans this long
pub const EVENT_DURATION_MINUTES: i64 = 60;
pub const PRODUCT_ID: &str = "-//GoldTasks//EN";
pub const UID_DOMAIN: &str = "goldtasks.com";

/// A generated calendar file, ready for download or sharing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDocument {
    /// Suggested filename, `<title>.ics`, not sanitized
    pub filename: String,
    pub content: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarDocument {
    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Write the document into `dir` under its suggested filename.
    ///
    /// The filename must be a single plain component so the file lands inside `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let name = Path::new(&self.filename);
        let mut components = name.components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            return Err(eyre!(
                "Refusing to export to {:?}: task title is not a plain file name",
                self.filename
            ));
        }

        let path = dir.join(name);
        fs::write(&path, self.as_bytes())
            .with_context(|| format!("Failed to write calendar file {:?}", path))?;
        info!(path = ?path, "Exported calendar event");
        Ok(path)
    }
}

/// Build a one-hour calendar event for `task`, stamped at `now`.
///
/// Returns `None` when the task has no schedule or the schedule does not parse.
pub fn export_calendar_event<Tz: TimeZone>(
    task: &Task,
    now: &DateTime<Tz>,
) -> Option<CalendarDocument> {
    let start = task.scheduled_at(&now.timezone())?;
    let end = start + TimeDelta::minutes(EVENT_DURATION_MINUTES);
    let stamp = now.with_timezone(&Utc);

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{}", PRODUCT_ID),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}@{}", task.id, UID_DOMAIN),
        format!("DTSTAMP:{}", format_ics(&stamp)),
        format!("DTSTART:{}", format_ics(&start)),
        format!("DTEND:{}", format_ics(&end)),
        format!("SUMMARY:{}", escape_text(&task.title)),
        format!("DESCRIPTION:{}", escape_text(task.description.as_deref().unwrap_or_default())),
        format!("CATEGORIES:{}", escape_text(&task.category)),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut content = lines.join("\r\n");
    content.push_str("\r\n");

    Some(CalendarDocument {
        filename: format!("{}.ics", task.title),
        content,
        start,
        end,
    })
}

/// Escape a TEXT value: backslash, semicolon, comma and line breaks
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use tempfile::TempDir;

    fn pay_bills() -> Task {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Task {
            id: "7".to_string(),
            title: "Pay Bills".to_string(),
            description: None,
            completed: false,
            category: "2".to_string(),
            tags: vec![],
            due_date: None,
            scheduled_date: Some("2024-01-10T09:00:00Z".to_string()),
            priority: Priority::High,
            created_at: created,
            updated_at: created,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 17, 30, 15).unwrap()
    }

    #[test]
    fn test_export_pay_bills() {
        let doc = export_calendar_event(&pay_bills(), &now()).unwrap();

        assert_eq!(doc.end, Utc.with_ymd_and_hms(2024, 1, 10, 10, 0, 0).unwrap());
        assert_eq!(doc.filename, "Pay Bills.ics");

        let lines: Vec<&str> = doc.content.split("\r\n").collect();
        assert_eq!(lines[0], "BEGIN:VCALENDAR");
        assert!(lines.contains(&"UID:7@goldtasks.com"));
        assert!(lines.contains(&"DTSTAMP:20240105T173015Z"));
        assert!(lines.contains(&"DTSTART:20240110T090000Z"));
        assert!(lines.contains(&"DTEND:20240110T100000Z"));
        assert!(lines.contains(&"SUMMARY:Pay Bills"));
        assert!(lines.contains(&"DESCRIPTION:"));
        assert!(lines.contains(&"CATEGORIES:2"));
        assert!(doc.content.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
    }

    #[test]
    fn test_export_without_schedule_is_none() {
        let mut task = pay_bills();
        task.scheduled_date = None;
        assert!(export_calendar_event(&task, &now()).is_none());

        task.scheduled_date = Some("someday".to_string());
        assert!(export_calendar_event(&task, &now()).is_none());
    }

    #[test]
    fn test_export_is_deterministic() {
        let a = export_calendar_event(&pay_bills(), &now()).unwrap();
        let b = export_calendar_event(&pay_bills(), &now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_description_is_escaped() {
        let mut task = pay_bills();
        task.description = Some("Gas, water; power\nand rent".to_string());
        let doc = export_calendar_event(&task, &now()).unwrap();
        assert!(doc.content.contains("DESCRIPTION:Gas\\, water\\; power\\nand rent\r\n"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a\\b"), "a\\\\b");
        assert_eq!(escape_text("line1\r\nline2"), "line1\\nline2");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn test_write_to() {
        let temp = TempDir::new().unwrap();
        let doc = export_calendar_event(&pay_bills(), &now()).unwrap();
        let path = doc.write_to(temp.path()).unwrap();
        assert_eq!(path, temp.path().join("Pay Bills.ics"));
        assert_eq!(fs::read_to_string(path).unwrap(), doc.content);
    }

    #[test]
    fn test_write_to_stays_inside_dir() {
        let export_dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();

        for title in [
            elsewhere.path().join("bills").display().to_string(),
            "../bills".to_string(),
            "nested/bills".to_string(),
        ] {
            let mut task = pay_bills();
            task.title = title;
            let doc = export_calendar_event(&task, &now()).unwrap();
            let err = doc.write_to(export_dir.path()).unwrap_err();
            assert!(err.to_string().contains("not a plain file name"));
        }

        assert!(!elsewhere.path().join("bills.ics").exists());
        assert_eq!(fs::read_dir(export_dir.path()).unwrap().count(), 0);
    }
}
