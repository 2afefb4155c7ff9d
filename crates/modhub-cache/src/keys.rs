//! Cache key builders for all ModHub cache entries.
//!
//! Centralising key construction prevents typos and makes it easy
//! to find every key the application uses. Keys are relative to a
//! [`CacheBin`](crate::CacheBin), which adds the tier prefix.

// ── Bootstrap tier ─────────────────────────────────────────

/// Names and paths of bootstrap-eligible modules.
pub fn bootstrap_modules() -> String {
    "bootstrap_modules".to_string()
}

// ── Default tier ───────────────────────────────────────────

/// The full extension list snapshot.
pub fn system_list() -> String {
    "system_list".to_string()
}

/// The persisted hook implementation index.
pub fn module_implements() -> String {
    "module_implements".to_string()
}

/// Collected per-hook metadata declared by extensions.
pub fn hook_info() -> String {
    "hook_info".to_string()
}
