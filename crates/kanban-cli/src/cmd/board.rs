use crate::cmd::{open_store, resolve_account, resolve_board};
use crate::output::{print_json, print_table, short_id};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum BoardSubcommand {
    /// List boards
    List {
        /// Only boards of this account id
        #[arg(long)]
        account: Option<String>,
    },
    /// Create a board
    Create {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        /// Account id (optional when only one account exists)
        #[arg(long)]
        account: Option<String>,
    },
    /// Show a board with its columns and tasks
    Show {
        /// Board id or slug
        board: String,
    },
}

pub fn run(root: &Path, subcmd: BoardSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BoardSubcommand::List { account } => list(root, account.as_deref(), json),
        BoardSubcommand::Create {
            slug,
            title,
            account,
        } => create(root, &slug, title.as_deref(), account.as_deref(), json),
        BoardSubcommand::Show { board } => show(root, &board, json),
    }
}

fn list(root: &Path, account: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let boards = match account {
        Some(_) => store.list_boards(resolve_account(&store, account)?.id)?,
        None => store.list_all_boards()?,
    };

    if json {
        return print_json(&boards);
    }
    if boards.is_empty() {
        println!("No boards.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = boards
        .iter()
        .map(|b| vec![b.id.to_string(), b.slug.clone(), b.title.clone()])
        .collect();
    print_table(&["ID", "SLUG", "TITLE"], &rows);
    Ok(())
}

fn create(
    root: &Path,
    slug: &str,
    title: Option<&str>,
    account: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let account = resolve_account(&store, account)?;
    let board = store.create_board(account.id, slug, title.unwrap_or(slug))?;

    if json {
        print_json(&board)?;
    } else {
        println!("Created board '{}' [{}]", board.slug, board.id);
    }
    Ok(())
}

fn show(root: &Path, selector: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let board = resolve_board(&store, selector)?;
    let view = store.board_view(board.id)?;

    if json {
        return print_json(&view);
    }
    println!("{} ({})", view.board.title, view.board.slug);
    for col in &view.columns {
        let limit = col.capacity.map(|n| format!("/{n}")).unwrap_or_default();
        println!("\n{} [{}{limit}]", col.title, col.count);
        for (i, t) in col.tasks.iter().enumerate() {
            println!("  {i:>2}. {}  {}  ({})", short_id(t.id), t.title, t.priority);
        }
    }
    Ok(())
}
