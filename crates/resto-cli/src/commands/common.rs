use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use resto_core::config::CONFIG_FILE_NAME;
use resto_core::models::SyncConflict;
use resto_core::{ClientConfig, Restaurant, Review, SyncContext};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct RestaurantListItem {
    pub id: i64,
    pub name: String,
    pub cuisine_type: String,
    pub neighborhood: String,
    pub address: String,
    pub is_favorite: bool,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub collection: String,
    pub record_id: i64,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("resto").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("failed to resolve config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("resto").join("resto.db"))
        .ok_or_else(|| CliError::Config("failed to resolve data directory".to_string()))
}

/// Config file, then `RESTO_*` environment, then `--db-path`.
pub fn load_config(
    config_path: Option<&Path>,
    cli_db_path: Option<PathBuf>,
) -> Result<ClientConfig, CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    let mut config = ClientConfig::load_from_path(&path)?.with_env_overrides()?;
    if let Some(db_path) = cli_db_path {
        config.db_path = Some(db_path);
    }
    Ok(config)
}

pub fn open_context(config: &ClientConfig) -> Result<SyncContext, CliError> {
    let db_path = match &config.db_path {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    Ok(SyncContext::from_config(config, db_path)?)
}

pub fn format_restaurant_lines(restaurants: &[Restaurant]) -> Vec<String> {
    restaurants
        .iter()
        .map(|restaurant| {
            let marker = if restaurant.is_favorite { '*' } else { ' ' };
            format!(
                "{:>4} {marker} {:<32}  {:<14}  {}",
                restaurant.id,
                truncate(&restaurant.name, 32),
                truncate(&restaurant.cuisine_type, 14),
                restaurant.neighborhood
            )
        })
        .collect()
}

pub fn restaurant_to_list_item(restaurant: &Restaurant) -> RestaurantListItem {
    let now_ms = Utc::now().timestamp_millis();
    RestaurantListItem {
        id: restaurant.id.get(),
        name: restaurant.name.clone(),
        cuisine_type: restaurant.cuisine_type.clone(),
        neighborhood: restaurant.neighborhood.clone(),
        address: restaurant.address.clone(),
        is_favorite: restaurant.is_favorite,
        updated_at: restaurant.updated_at,
        relative_time: format_relative_time(restaurant.updated_at, now_ms),
    }
}

pub fn format_review_lines(reviews: &[Review]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();
    for review in reviews {
        let pending = if review.is_temporary() {
            "  (not synced)"
        } else {
            ""
        };
        lines.push(format!(
            "{:>5}  {}  {}  {}{pending}",
            review.id,
            render_rating(review.rating),
            review.name,
            format_relative_time(review.updated_at, now_ms)
        ));
        for line in review.comments.lines() {
            lines.push(format!("       {line}"));
        }
    }
    lines
}

pub fn render_rating(rating: i32) -> String {
    let filled = usize::try_from(rating.clamp(0, resto_core::models::MAX_RATING)).unwrap_or(0);
    let empty = usize::try_from(resto_core::models::MAX_RATING).unwrap_or(0) - filled;
    format!("{}{}", "*".repeat(filled), ".".repeat(empty))
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut truncated = value
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        collection: conflict.collection.to_string(),
        record_id: conflict.record_id,
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        winner: conflict.winner.as_str().to_string(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  {}={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.winner.as_str(),
                conflict.collection,
                conflict.record_id,
                conflict.local_updated_at,
                conflict.remote_updated_at
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Comments from arguments, then piped stdin, then `$EDITOR`.
pub fn resolve_comments(parts: &[String]) -> Result<String, CliError> {
    if let Some(comments) = normalize_text(&parts.join(" ")) {
        return Ok(comments);
    }

    if let Some(comments) = read_piped_stdin()? {
        return Ok(comments);
    }

    if let Some(comments) = capture_editor_input("")? {
        return Ok(comments);
    }

    Err(CliError::EmptyComments)
}

pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_text(&buffer))
}

pub fn capture_editor_input(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_review_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_text(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_review_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("resto-review-{}-{now}.txt", std::process::id()))
}
