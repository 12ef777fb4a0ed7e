use crate::cmd::open_store;
use crate::output::{print_json, print_table};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum AccountSubcommand {
    /// Create a team account with its first user
    Create {
        /// Team name
        #[arg(long)]
        name: String,
        /// Owner email
        #[arg(long)]
        email: String,
        /// Owner password (at least 8 characters)
        #[arg(long, env = "KANBAN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List accounts
    List,
}

pub fn run(root: &Path, subcmd: AccountSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AccountSubcommand::Create {
            name,
            email,
            password,
            display_name,
        } => create(root, &name, &email, &password, display_name.as_deref(), json),
        AccountSubcommand::List => list(root, json),
    }
}

fn create(
    root: &Path,
    name: &str,
    email: &str,
    password: &str,
    display_name: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let (account, user) = store.create_account(name, email, display_name, password)?;

    if json {
        print_json(&serde_json::json!({ "account": account, "user": user.profile() }))?;
    } else {
        println!("Created account '{}' [{}]", account.name, account.id);
        println!("Owner: {} <{}>", user.display_name, user.email);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let accounts = store.list_accounts()?;

    if json {
        return print_json(&accounts);
    }
    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }
    let mut rows = Vec::with_capacity(accounts.len());
    for a in &accounts {
        let members = store.list_users(a.id)?.len();
        rows.push(vec![a.id.to_string(), a.name.clone(), members.to_string()]);
    }
    print_table(&["ID", "NAME", "MEMBERS"], &rows);
    Ok(())
}
