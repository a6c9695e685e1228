//! Keyword CLI subcommands for seeding and inspecting substitutions.
//!
//! Provides commands to:
//! - `set`: Insert or replace a keyword
//! - `list`: Show all keywords, newest first
//! - `delete`: Remove a keyword by key

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;

use crate::domain::{KeywordRecord, RecordKind, StoredRecord};
use crate::store::{with_timeout, RecordStore};

/// Keyword-related subcommands
#[derive(Subcommand, Debug)]
pub enum KeywordCommands {
    /// Insert or replace a keyword
    Set {
        /// Key (stored lowercased)
        key: String,

        /// Replacement text
        value: String,
    },

    /// List keywords
    List,

    /// Delete a keyword
    Delete {
        /// Key to delete
        key: String,
    },
}

/// Execute a keyword subcommand against `store`
pub async fn execute(
    command: KeywordCommands,
    store: Arc<dyn RecordStore>,
    timeout: Duration,
) -> Result<()> {
    match command {
        KeywordCommands::Set { key, value } => {
            if key.trim().is_empty() {
                anyhow::bail!("Keyword key must not be empty");
            }

            let record = KeywordRecord::new(&key, value);
            let stored = with_timeout(timeout, store.save_keyword(&record)).await?;
            println!("Saved keyword '{}' (id {})", stored.key, stored.id);
        }
        KeywordCommands::List => {
            let records = with_timeout(timeout, store.list(RecordKind::Keyword)).await?;

            if records.is_empty() {
                println!("No keywords stored.");
                return Ok(());
            }

            println!("{:<20} {:<40} UPDATED", "KEY", "VALUE");
            println!("{}", "-".repeat(80));
            for record in &records {
                if let StoredRecord::Keyword(keyword) = record {
                    println!(
                        "{:<20} {:<40} {}",
                        keyword.key,
                        truncate(&keyword.value, 40),
                        keyword.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        KeywordCommands::Delete { key } => {
            if with_timeout(timeout, store.delete(RecordKind::Keyword, &key)).await? {
                println!("Deleted keyword '{}'", key.trim().to_lowercase());
            } else {
                anyhow::bail!("Keyword not found: {}", key);
            }
        }
    }

    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
