use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Generate a migration id from the current UTC time (YYYYMMDDHHMMSS)
pub fn generate_migration_id() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Lowercase a name and collapse everything but letters and digits into `-`
pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// File name for a new migration script: `{id}-{slug}.sql`
pub fn migration_file_name(id: &str, name: &str) -> String {
    format!("{}-{}.sql", id, slugify(name))
}

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
