use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::Level;

use goldtasks::models::{
    Category, NewCategory, NewTask, NewUser, Priority, Role, Task, TaskPatch, User, UserPatch,
};
use goldtasks::storage::{load_collection, removing_save_hook, save_hook};
use goldtasks::view::{EmptyState, badge_counts, date_label, filter_tasks, resolve_category};
use goldtasks::{Config, Record, Selector, Store, TaskStore, UserStore, export_calendar_event};

#[derive(Parser)]
#[command(name = "goldtasks")]
#[command(about = "GoldTasks - household tasks with categories, filters and calendar export")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the config file (default: ~/.config/goldtasks/goldtasks.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task database (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },

    /// Log in by email
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// End the current session
    Logout,

    /// Show the current user
    Whoami,

    /// Change the current user's password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },

    /// Add a task
    Add(AddArgs),

    /// List tasks
    List {
        /// all, today, upcoming, completed, high-priority, or a category id
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Case-insensitive search over title, description and tags
        #[arg(short, long, default_value = "")]
        query: String,
    },

    /// Show task counts per quick filter and category
    Counts,

    /// Edit a task
    Edit(EditArgs),

    /// Toggle a task between done and not done
    Done { id: String },

    /// Delete a task
    Rm { id: String },

    /// Export a scheduled task as an .ics calendar file
    Export {
        id: String,

        /// Output directory (overrides config export_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage categories
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Manage the household roster (administrators)
    #[command(subcommand)]
    User(UserCommands),
}

#[derive(Args)]
struct AddArgs {
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(short, long, default_value = "1")]
    category: String,
    #[arg(short, long = "tag")]
    tags: Vec<String>,
    /// Date or date-time, e.g. 2024-01-10 or 2024-01-10T09:00
    #[arg(long)]
    due: Option<String>,
    #[arg(long)]
    scheduled: Option<String>,
    #[arg(short, long, default_value = "medium")]
    priority: Priority,
}

#[derive(Args)]
struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    description: Option<String>,
    #[arg(long)]
    clear_description: bool,
    #[arg(short, long)]
    category: Option<String>,
    /// Replaces all tags
    #[arg(short, long = "tag")]
    tags: Option<Vec<String>>,
    #[arg(long, conflicts_with = "clear_due")]
    due: Option<String>,
    #[arg(long)]
    clear_due: bool,
    #[arg(long, conflicts_with = "clear_scheduled")]
    scheduled: Option<String>,
    #[arg(long)]
    clear_scheduled: bool,
    #[arg(short, long)]
    priority: Option<Priority>,
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    List,
    /// Add a category
    Add {
        name: String,
        #[arg(long, default_value = "gold")]
        color: String,
        #[arg(long, default_value = "📝")]
        icon: String,
    },
    /// Delete a category; its tasks keep the dangling reference
    Rm { id: String },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List the roster
    List,
    /// Add a user
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "family_member")]
        role: Role,
        /// Grant family membership
        #[arg(long)]
        family: bool,
    },
    /// Edit a user's name, email or avatar
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Delete a user
    Rm { id: String },
    /// Toggle, assign (--on) or remove (--off) family membership
    Family {
        id: String,
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
}

/// Stores wired to the SQLite-backed key-value store
struct App {
    config: Config,
    tasks: TaskStore,
    users: UserStore,
}

impl App {
    fn open(config: Config) -> Result<Self> {
        let storage = Rc::new(Store::open(&config.data_dir)?);

        let todos_key = config.key(Task::collection_name());
        let categories_key = config.key(Category::collection_name());
        let users_key = config.key(User::collection_name());
        let session_key = config.session_key();

        let mut tasks = TaskStore::new().with_hooks(
            save_hook(storage.clone(), todos_key.clone()),
            save_hook(storage.clone(), categories_key.clone()),
        );
        tasks.load(
            load_collection(&*storage, &todos_key)?.unwrap_or_default(),
            load_collection(&*storage, &categories_key)?,
        );

        let mut users = UserStore::new().with_hooks(
            save_hook(storage.clone(), users_key.clone()),
            removing_save_hook(storage.clone(), session_key.clone()),
        );
        let session: Option<Vec<User>> = load_collection(&*storage, &session_key)?;
        users.load(
            load_collection(&*storage, &users_key)?.unwrap_or_default(),
            session.and_then(|s| s.into_iter().next()),
        );

        Ok(Self { config, tasks, users })
    }

    fn require_login(&self) -> Result<&User> {
        self.users
            .require_session()
            .map_err(|_| eyre!("Not logged in. Run `goldtasks login` first."))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // Setup tracing
    let level = match cli.verbose {
        0 => config.level()?,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut app = App::open(config)?;
    let now = Local::now();
    let stamp = now.with_timezone(&Utc);

    match cli.command {
        Commands::Register { email, password, name } => {
            let user = app.users.register(&email, &password, &name)?;
            println!("Welcome, {} ({})", user.name.bold(), user.role.label());
        }
        Commands::Login { email, password } => {
            let user = app.users.login(&email, &password)?;
            println!("Logged in as {}", user.name.bold());
        }
        Commands::Logout => {
            app.users.logout()?;
            println!("Logged out");
        }
        Commands::Whoami => match app.users.current_user() {
            Some(user) => print_user(user),
            None => println!("Not logged in"),
        },
        Commands::Passwd { current, new, confirm } => {
            app.users.change_password(&current, &new, &confirm)?;
            println!("Password updated successfully");
        }
        Commands::Add(args) => {
            app.require_login()?;
            let task = app.tasks.add_task(
                NewTask {
                    title: args.title,
                    description: args.description,
                    category: args.category,
                    tags: args.tags,
                    due_date: args.due,
                    scheduled_date: args.scheduled,
                    priority: args.priority,
                },
                stamp,
            )?;
            println!("Created {}", task.id.dimmed());
        }
        Commands::List { filter, query } => {
            app.require_login()?;
            let selector = Selector::parse(&filter);
            let tasks = filter_tasks(app.tasks.tasks(), &selector, &query, &now);
            if tasks.is_empty() {
                println!("{}", "No tasks found".bold());
                println!("{}", EmptyState::for_query(&query).message().dimmed());
            }
            for task in tasks {
                print_task(task, app.tasks.categories(), &now);
            }
        }
        Commands::Counts => {
            app.require_login()?;
            let categories = app.tasks.categories();
            for (selector, n) in badge_counts(app.tasks.tasks(), categories, &now) {
                let label = match &selector {
                    Selector::Category(id) => {
                        let category = resolve_category(categories, id);
                        format!("{} {}", category.icon, category.name)
                    }
                    quick => quick.label().to_string(),
                };
                println!("{:<20} {:>4}", label, n.to_string().yellow());
            }
        }
        Commands::Edit(args) => {
            app.require_login()?;
            let patch = TaskPatch {
                title: args.title,
                description: clearable(args.description, args.clear_description),
                completed: None,
                category: args.category,
                tags: args.tags,
                due_date: clearable(args.due, args.clear_due),
                scheduled_date: clearable(args.scheduled, args.clear_scheduled),
                priority: args.priority,
            };
            if patch.is_empty() {
                return Err(eyre!("Nothing to change"));
            }
            let task = app.tasks.update_task(&args.id, patch, stamp)?;
            print_task(&task, app.tasks.categories(), &now);
        }
        Commands::Done { id } => {
            app.require_login()?;
            let task = app.tasks.toggle_completed(&id, stamp)?;
            print_task(&task, app.tasks.categories(), &now);
        }
        Commands::Rm { id } => {
            app.require_login()?;
            app.tasks.delete_task(&id)?;
            println!("Deleted {}", id);
        }
        Commands::Export { id, out } => {
            app.require_login()?;
            let task = app
                .tasks
                .task(&id)
                .ok_or_else(|| eyre!("Task not found: {}", id))?;
            match export_calendar_event(task, &now) {
                Some(doc) => {
                    let dir = out.unwrap_or_else(|| app.config.export_dir.clone());
                    let path = doc.write_to(&dir)?;
                    println!("Exported {}", path.display());
                }
                None => println!("Task has no schedule; nothing to export"),
            }
        }
        Commands::Category(command) => {
            app.require_login()?;
            run_category(&mut app, command)?;
        }
        Commands::User(command) => {
            app.require_login()?;
            run_user(&mut app, command)?;
        }
    }

    Ok(())
}

fn run_category(app: &mut App, command: CategoryCommands) -> Result<()> {
    match command {
        CategoryCommands::List => {
            for category in app.tasks.categories() {
                println!(
                    "{} {:<16} {:<8} {}",
                    category.icon,
                    category.name,
                    category.color,
                    category.id.dimmed()
                );
            }
        }
        CategoryCommands::Add { name, color, icon } => {
            let category = app.tasks.add_category(NewCategory { name, color, icon })?;
            println!("Created category {} {}", category.name, category.id.dimmed());
        }
        CategoryCommands::Rm { id } => {
            app.tasks.delete_category(&id)?;
            println!("Deleted category {}", id);
        }
    }
    Ok(())
}

fn run_user(app: &mut App, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::List => {
            println!(
                "{} users, {} family members, {} administrators",
                app.users.users().len(),
                app.users.family_member_count(),
                app.users.admin_count()
            );
            for user in app.users.users() {
                print_user(user);
            }
        }
        UserCommands::Add {
            email,
            name,
            role,
            family,
        } => {
            let user = app.users.create_user(NewUser {
                email,
                name,
                role,
                is_family_member: family,
            })?;
            println!("Created user {} {}", user.name, user.id.dimmed());
        }
        UserCommands::Edit {
            id,
            name,
            email,
            avatar,
        } => {
            let user = app.users.update_user(
                &id,
                UserPatch {
                    name,
                    email,
                    avatar: avatar.map(|a| Some(a).filter(|a| !a.is_empty())),
                },
            )?;
            print_user(&user);
        }
        UserCommands::Rm { id } => {
            app.users.delete_user(&id)?;
            println!("Deleted user {}", id);
        }
        UserCommands::Family { id, on, off } => {
            let user = if on {
                app.users.assign_family_membership(&id)?
            } else if off {
                app.users.remove_family_membership(&id)?
            } else {
                app.users.toggle_family_membership(&id)?
            };
            print_user(&user);
        }
    }
    Ok(())
}

/// `--x value` sets, `--clear-x` clears, neither leaves the field alone
fn clearable(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear { Some(None) } else { value.map(Some) }
}

fn print_task(task: &Task, categories: &[Category], now: &DateTime<Local>) {
    let check = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let title = if task.completed {
        task.title.strikethrough().dimmed()
    } else {
        task.title.bold()
    };
    println!("{} {}  {}", check, title, task.id.dimmed());

    if let Some(description) = &task.description {
        println!("      {}", description);
    }

    let category = resolve_category(categories, &task.category);
    let priority = match task.priority {
        Priority::High => task.priority.as_str().red(),
        Priority::Medium => task.priority.as_str().yellow(),
        Priority::Low => task.priority.as_str().green(),
    };
    let mut meta = vec![format!("{} {}", category.icon, category.name), priority.to_string()];

    let tz = now.timezone();
    if let Some(due) = task.due_at(&tz) {
        meta.push(format!("Due {}", date_label(&due, now)));
    }
    if let Some(scheduled) = task.scheduled_at(&tz) {
        meta.push(format!("Scheduled {}", date_label(&scheduled, now)).blue().to_string());
    }
    if !task.tags.is_empty() {
        let mut tags: Vec<String> = task.tags.iter().take(2).map(|t| format!("#{}", t)).collect();
        if task.tags.len() > 2 {
            tags.push(format!("+{}", task.tags.len() - 2));
        }
        meta.push(tags.join(" "));
    }
    println!("      {}", meta.join("  "));
}

fn print_user(user: &User) {
    let family = if user.is_family_member {
        "family".green()
    } else {
        "not family".dimmed()
    };
    println!(
        "{:<16} {:<28} {:<14} {}  {}",
        user.name.bold(),
        user.email,
        user.role.label(),
        family,
        user.id.dimmed()
    );
}
