use std::time::Duration;

use student_tracker::{AppState, DbOperations, Settings};
use tempfile::TempDir;

/// Fresh state backed by its own SQLite file. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn test_state() -> (AppState, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("students.db").display());

    let db = DbOperations::new_with_options(&url, 1, Duration::from_secs(5))
        .await
        .expect("Failed to open test database");
    db.init_schema().await.expect("Failed to create schema");

    let config = Settings::new().expect("Failed to load config");
    (AppState::with_db(config, db), dir)
}
