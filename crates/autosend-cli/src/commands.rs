//! Subcommand handlers.
//!
//! Each handler performs one store operation and prints the outcome.

use anyhow::{Context, Result, bail};
use autosend_store::{ConfigUpdate, OptionExt, StoreError, UserStore};
use tracing::info;

use crate::cli::{AdminThreadAction, AutomationAction, ConfigAction, ConfigSetArgs, UserAction};

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

pub async fn users(store: &UserStore, action: UserAction) -> Result<()> {
    match action {
        UserAction::Create {
            username,
            password,
            key,
        } => match store.create_user(&username, &password, key.as_deref()).await {
            Ok(id) => {
                info!(user_id = id, "user created");
                println!("  [+] Created user '{username}' with id {id}");
                Ok(())
            }
            Err(err @ StoreError::Conflict { .. }) => bail!("cannot create user: {err}"),
            Err(err) => Err(err).context("failed to create user"),
        },
        UserAction::Show { username } => {
            let user = store
                .get_user_by_username(&username)
                .await?
                .or_not_found("user", &username)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        UserAction::Count => {
            println!("{}", store.count().await?);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

pub async fn config(store: &UserStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { id } => {
            let config = store.get_user_config(id).await?.or_not_found("user", id)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Set(args) => {
            let id = args.id;
            let update = config_update(args);
            if update.is_empty() {
                println!("  [=] No fields given, nothing to update");
                return Ok(());
            }
            let updated = store.update_user_config(id, &update).await?;
            report_rows(updated, id);
        }
    }
    Ok(())
}

/// Convert parsed flags into a sparse update; omitted flags stay `None`.
fn config_update(args: ConfigSetArgs) -> ConfigUpdate {
    ConfigUpdate {
        cookies: args.cookies,
        chat_id: args.chat_id,
        messages: args.messages,
        delay: args.delay,
        name_prefix: args.name_prefix,
    }
}

// ---------------------------------------------------------------------------
// automation / admin-thread
// ---------------------------------------------------------------------------

pub async fn automation(store: &UserStore, action: AutomationAction) -> Result<()> {
    match action {
        AutomationAction::Start { id } => {
            report_rows(store.set_automation_running(id, true).await?, id);
        }
        AutomationAction::Stop { id } => {
            report_rows(store.set_automation_running(id, false).await?, id);
        }
        AutomationAction::Status { id } => {
            let running = store.get_automation_running(id).await?;
            println!("{}", if running { "running" } else { "stopped" });
        }
    }
    Ok(())
}

pub async fn admin_thread(store: &UserStore, action: AdminThreadAction) -> Result<()> {
    match action {
        AdminThreadAction::Set { id, thread_id } => {
            report_rows(store.save_admin_e2ee_thread_id(id, &thread_id).await?, id);
        }
        AdminThreadAction::Get { id } => match store.get_admin_e2ee_thread_id(id).await? {
            Some(thread_id) => println!("{thread_id}"),
            None => println!("  [=] No admin thread id stored"),
        },
    }
    Ok(())
}

fn report_rows(updated: usize, id: i64) {
    if updated == 0 {
        println!("  [!] No user with id {id}; nothing updated");
    } else {
        println!("  [+] Updated user {id}");
    }
}

// ── tests ────────────────────────────────────────────────────────────
