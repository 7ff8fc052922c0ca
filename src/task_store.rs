// In-memory task and category collections with save-on-mutation

use chrono::{DateTime, Utc};
use eyre::{Context, Result, eyre};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Category, NewCategory, NewTask, Task, TaskPatch, default_categories, normalize_tags,
    validate_title,
};
use crate::storage::SaveHook;

/// Owns the task list and the category list.
///
/// Every mutation updates the in-memory collection first and then hands the
/// whole collection to the matching save hook, if one is installed.
pub struct TaskStore {
    tasks: Vec<Task>,
    categories: Vec<Category>,
    on_save_tasks: Option<SaveHook<Task>>,
    on_save_categories: Option<SaveHook<Category>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Empty task list with the default categories
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            categories: default_categories(),
            on_save_tasks: None,
            on_save_categories: None,
        }
    }

    pub fn with_hooks(mut self, tasks: SaveHook<Task>, categories: SaveHook<Category>) -> Self {
        self.on_save_tasks = Some(tasks);
        self.on_save_categories = Some(categories);
        self
    }

    /// Replace both collections wholesale, without saving.
    ///
    /// `categories` is `None` when nothing was ever stored, in which case the
    /// defaults stay in place. A stored empty list is kept as is.
    pub fn load(&mut self, tasks: Vec<Task>, categories: Option<Vec<Category>>) {
        self.tasks = tasks;
        if let Some(categories) = categories {
            self.categories = categories;
        }
        debug!(
            tasks = self.tasks.len(),
            categories = self.categories.len(),
            "Loaded task store"
        );
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    /// Create a task; newest tasks go to the front of the list
    pub fn add_task(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        validate_title(&new.title)?;

        let task = Task {
            id: Uuid::now_v7().to_string(),
            title: new.title.trim().to_string(),
            description: new.description.filter(|d| !d.trim().is_empty()),
            completed: false,
            category: new.category,
            tags: normalize_tags(new.tags),
            due_date: new.due_date,
            scheduled_date: new.scheduled_date,
            priority: new.priority,
            created_at: now,
            updated_at: now,
        };

        self.tasks.insert(0, task.clone());
        info!(id = %task.id, title = %task.title, "Created task");

        self.save_tasks()?;
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch, now: DateTime<Utc>) -> Result<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| eyre!("Task not found: {}", id))?;

        task.apply(patch, now)?;
        let updated = task.clone();
        debug!(id, "Updated task");

        self.save_tasks()?;
        Ok(updated)
    }

    pub fn toggle_completed(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task> {
        let completed = self
            .task(id)
            .map(|t| t.completed)
            .ok_or_else(|| eyre!("Task not found: {}", id))?;

        self.update_task(
            id,
            TaskPatch {
                completed: Some(!completed),
                ..Default::default()
            },
            now,
        )
    }

    /// Remove a task permanently
    pub fn delete_task(&mut self, id: &str) -> Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(eyre!("Task not found: {}", id));
        }
        info!(id, "Deleted task");

        self.save_tasks()
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub fn add_category(&mut self, new: NewCategory) -> Result<Category> {
        if new.name.trim().is_empty() {
            return Err(eyre!("Category name cannot be empty"));
        }

        let category = Category {
            id: Uuid::now_v7().to_string(),
            name: new.name.trim().to_string(),
            color: new.color,
            icon: new.icon,
        };

        self.categories.push(category.clone());
        info!(id = %category.id, name = %category.name, "Created category");

        self.save_categories()?;
        Ok(category)
    }

    /// Remove a category; tasks referring to it keep the dangling id
    pub fn delete_category(&mut self, id: &str) -> Result<()> {
        let before = self.categories.len();
        self.categories.retain(|c| c.id != id);
        if self.categories.len() == before {
            return Err(eyre!("Category not found: {}", id));
        }
        info!(id, "Deleted category");

        self.save_categories()
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn save_tasks(&mut self) -> Result<()> {
        if let Some(hook) = self.on_save_tasks.as_mut() {
            hook(&self.tasks).context("Failed to save tasks")?;
        }
        Ok(())
    }

    fn save_categories(&mut self) -> Result<()> {
        if let Some(hook) = self.on_save_categories.as_mut() {
            hook(&self.categories).context("Failed to save categories")?;
        }
        Ok(())
    }
}
