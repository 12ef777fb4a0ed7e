use crate::cmd::{open_store, resolve_board, resolve_task};
use crate::output::{print_json, print_table, short_id};
use chrono::NaiveDate;
use clap::Subcommand;
use kanban_core::search::TaskFilter;
use kanban_core::task::NewTask;
use kanban_core::types::Priority;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Add a task at the end of a column
    Add {
        /// Board id or slug
        board: String,
        #[arg(required = true)]
        title: Vec<String>,
        /// Target column (default: the intake column)
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// low, normal, high or urgent
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Tag; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks in board order
    List {
        board: String,
        #[arg(long)]
        column: Option<String>,
        /// Substring of title or description
        #[arg(long)]
        q: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Move a task to a column, optionally at a zero-based index
    Move {
        board: String,
        /// Task id or unique id prefix
        task: String,
        column: String,
        #[arg(long, allow_negative_numbers = true)]
        position: Option<i64>,
    },
    /// Delete a task with its comments and attachments
    Rm { board: String, task: String },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::Add {
            board,
            title,
            column,
            description,
            priority,
            due,
            tags,
        } => {
            let input = NewTask {
                title: title.join(" "),
                description,
                column,
                priority,
                due_date: due,
                tags,
                ..NewTask::default()
            };
            add(root, &board, input, json)
        }
        TaskSubcommand::List {
            board,
            column,
            q,
            tag,
            priority,
        } => {
            let filter = TaskFilter {
                q,
                column,
                tag,
                priority,
                ..TaskFilter::default()
            };
            list(root, &board, &filter, json)
        }
        TaskSubcommand::Move {
            board,
            task,
            column,
            position,
        } => move_task(root, &board, &task, &column, position, json),
        TaskSubcommand::Rm { board, task } => remove(root, &board, &task, json),
    }
}

fn add(root: &Path, board: &str, input: NewTask, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let board = resolve_board(&store, board)?;
    let task = store.create_task(board.id, input, None)?;

    if json {
        print_json(&task)?;
    } else {
        println!("Added task [{}] to {}: {}", short_id(task.id), task.column, task.title);
    }
    Ok(())
}

fn list(root: &Path, board: &str, filter: &TaskFilter, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let board = resolve_board(&store, board)?;
    if let Some(column) = &filter.column {
        store.layout().get(column)?;
    }
    let tasks = filter.apply(store.layout(), store.list_tasks(board.id)?);

    if json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|t| {
            vec![
                short_id(t.id),
                t.column.clone(),
                t.priority.to_string(),
                t.due_date.map(|d| d.to_string()).unwrap_or_default(),
                t.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "COLUMN", "PRIORITY", "DUE", "TITLE"], &rows);
    Ok(())
}

fn move_task(
    root: &Path,
    board: &str,
    task: &str,
    column: &str,
    position: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let board = resolve_board(&store, board)?;
    let task = resolve_task(&store, &board, task)?;
    let moved = store.move_task(board.id, task.id, column, position)?;

    if json {
        print_json(&moved)?;
    } else {
        println!(
            "Moved [{}] {} -> {}",
            short_id(moved.id),
            task.column,
            moved.column
        );
    }
    Ok(())
}

fn remove(root: &Path, board: &str, task: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let board = resolve_board(&store, board)?;
    let task = resolve_task(&store, &board, task)?;
    let (removed, attachments) = store.delete_task(board.id, task.id)?;

    let blobs = kanban_core::attachment::FsBlobStore::new(kanban_core::paths::blobs_dir(root))?;
    for a in &attachments {
        if let Err(e) = kanban_core::attachment::BlobStore::delete(&blobs, &a.blob_key) {
            tracing::warn!(blob = %a.blob_key, error = %e, "failed to delete attachment blob");
        }
    }

    if json {
        print_json(&serde_json::json!({ "deleted": removed.id, "attachments": attachments.len() }))?;
    } else {
        println!("Deleted task [{}]: {}", short_id(removed.id), removed.title);
    }
    Ok(())
}
