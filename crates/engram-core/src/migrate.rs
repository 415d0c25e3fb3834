//! Migration Runner
//!
//! Guards the on-disk store with a schema version persisted atomically
//! to `schema_version.json` beside the database. A compile-time ordered
//! migration list runs on daemon start: pending migrations apply in
//! order, each success persists its version, and any failure stops the
//! sequence at the last good step. Migrations are idempotent and safe
//! to re-run.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::document::now_iso;
use crate::error::{EngramError, Result};
use crate::store::{Collection, DocumentEntry, WhereFilter};

// ============================================================================
// VERSIONING
// ============================================================================

/// Current schema version; bump when appending a migration
pub const SCHEMA_VERSION: u32 = 2;

const SCHEMA_VERSION_FILE: &str = "schema_version.json";

fn version_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SCHEMA_VERSION_FILE)
}

/// Read the persisted schema version (0 when unset)
pub fn current_version(data_dir: &Path) -> u32 {
    let Ok(content) = std::fs::read_to_string(version_path(data_dir)) else {
        return 0;
    };
    serde_json::from_str::<Value>(&content)
        .ok()
        .and_then(|v| v.get("version").and_then(Value::as_u64))
        .unwrap_or(0) as u32
}

/// Persist the schema version atomically (temp + rename)
pub fn save_version(data_dir: &Path, version: u32) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = version_path(data_dir);
    let temp = path.with_extension("json.tmp");
    std::fs::write(
        &temp,
        serde_json::to_string_pretty(&json!({
            "version": version,
            "updated_at": now_iso(),
        }))?,
    )?;
    std::fs::rename(&temp, &path)?;
    Ok(())
}

// ============================================================================
// MIGRATIONS
// ============================================================================

/// Everything a migration may touch
pub struct MigrationContext<'a> {
    pub collection: &'a Collection,
    pub data_dir: &'a Path,
}

/// One ordered migration step
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub run: fn(&MigrationContext<'_>) -> Result<()>,
}

/// The ordered migration list
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Establish schema version tracking",
            run: migration_001_initial,
        },
        Migration {
            version: 2,
            description: "Rewrite legacy commit documents as session summaries",
            run: migration_002_commit_to_session_summary,
        },
    ]
}

fn migration_001_initial(_ctx: &MigrationContext<'_>) -> Result<()> {
    Ok(())
}

/// Stores imported from before the taxonomy rename may hold `commit`
/// documents; rewrite them in place as `session_summary`. Fresh stores
/// have nothing to rewrite.
fn migration_002_commit_to_session_summary(ctx: &MigrationContext<'_>) -> Result<()> {
    let legacy = ctx
        .collection
        .get_where(Some(&WhereFilter::eq("type", "commit")))?;
    if legacy.is_empty() {
        return Ok(());
    }

    let mut updates = Vec::with_capacity(legacy.len());
    for doc in legacy {
        let mut metadata = doc.metadata;
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("type".to_string(), json!("session_summary"));
            obj.entry("status".to_string()).or_insert(json!("active"));
        }
        updates.push(DocumentEntry::new(doc.id, doc.text, metadata));
    }
    let migrated = updates.len();
    ctx.collection.upsert(updates)?;
    tracing::info!(migrated, "legacy commit documents rewritten as session summaries");
    Ok(())
}

// ============================================================================
// RUNNER
// ============================================================================

/// Run pending migrations in order. `dry_run` reports what would be
/// done without mutating the store or the version file.
pub fn run_migrations(ctx: &MigrationContext<'_>, dry_run: bool) -> Result<Value> {
    let current = current_version(ctx.data_dir);
    let all = migrations();
    let pending: Vec<&Migration> = all.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(json!({
            "status": "up_to_date",
            "current_version": current,
            "target_version": SCHEMA_VERSION,
            "migrations_run": 0,
        }));
    }

    tracing::info!(
        from = current,
        to = SCHEMA_VERSION,
        pending = pending.len(),
        "running migrations"
    );

    let backup = if dry_run {
        None
    } else {
        match backup_store(ctx.data_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("backup before migration failed: {}", e);
                None
            }
        }
    };

    let mut results = Vec::new();
    let mut final_version = current;
    let mut migrations_run = 0;

    for migration in pending {
        if dry_run {
            results.push(json!({
                "version": migration.version,
                "description": migration.description,
                "status": "dry_run",
            }));
            continue;
        }

        match (migration.run)(ctx) {
            Ok(()) => {
                save_version(ctx.data_dir, migration.version)?;
                final_version = migration.version;
                migrations_run += 1;
                results.push(json!({
                    "version": migration.version,
                    "description": migration.description,
                    "status": "success",
                }));
                tracing::info!(version = migration.version, "migration complete");
            }
            Err(e) => {
                tracing::error!(version = migration.version, "migration failed: {}", e);
                results.push(json!({
                    "version": migration.version,
                    "description": migration.description,
                    "status": "failed",
                    "error": e.to_string(),
                }));
                break;
            }
        }
    }

    let status = if dry_run {
        "dry_run"
    } else if final_version == SCHEMA_VERSION {
        "complete"
    } else {
        "partial"
    };

    let mut report = json!({
        "status": status,
        "current_version": final_version,
        "target_version": SCHEMA_VERSION,
        "migrations_run": migrations_run,
        "results": results,
    });
    if let Some(backup) = backup {
        report["backup"] = json!(backup.display().to_string());
    }
    Ok(report)
}

// ============================================================================
// BACKUPS
// ============================================================================

const BACKUP_DIR: &str = "backups";

/// Copy the data directory (minus prior backups) into a timestamped
/// backup directory; returns its path
pub fn backup_store(data_dir: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let target = data_dir.join(BACKUP_DIR).join(format!("backup_{}", stamp));
    copy_dir(data_dir, &target, &[BACKUP_DIR])?;
    tracing::info!(backup = %target.display(), "store backed up");
    Ok(target)
}

/// Restore a backup over the data directory. Refuses backups written by
/// a newer schema than this build understands.
pub fn restore_backup(data_dir: &Path, backup: &Path) -> Result<()> {
    if !backup.is_dir() {
        return Err(EngramError::NotFound(format!("backup: {}", backup.display())));
    }
    let backup_version = current_version(backup);
    if backup_version > SCHEMA_VERSION {
        return Err(EngramError::PreconditionFailed(format!(
            "backup schema v{} is newer than supported v{}",
            backup_version, SCHEMA_VERSION
        )));
    }
    copy_dir(backup, data_dir, &[BACKUP_DIR])?;
    tracing::info!(backup = %backup.display(), "store restored");
    Ok(())
}

fn copy_dir(from: &Path, to: &Path, skip: &[&str]) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if skip.iter().any(|s| name.to_string_lossy() == *s) {
            continue;
        }
        let source = entry.path();
        let target = to.join(&name);
        if source.is_dir() {
            copy_dir(&source, &target, &[])?;
        } else {
            std::fs::copy(&source, &target)?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Collection) {
        let dir = TempDir::new().unwrap();
        let collection =
            Collection::open(dir.path().join("engram.db"), Arc::new(Embedder::new())).unwrap();
        (dir, collection)
    }

    #[test]
    fn test_fresh_store_migrates_to_current() {
        let (dir, collection) = setup();
        let ctx = MigrationContext {
            collection: &collection,
            data_dir: dir.path(),
        };

        let report = run_migrations(&ctx, false).unwrap();
        assert_eq!(report["status"], "complete");
        assert_eq!(report["current_version"], SCHEMA_VERSION);
        assert_eq!(current_version(dir.path()), SCHEMA_VERSION);
    }

    #[test]
    fn test_up_to_date_is_a_noop() {
        let (dir, collection) = setup();
        let ctx = MigrationContext {
            collection: &collection,
            data_dir: dir.path(),
        };
        run_migrations(&ctx, false).unwrap();

        let report = run_migrations(&ctx, false).unwrap();
        assert_eq!(report["status"], "up_to_date");
        assert_eq!(report["migrations_run"], 0);
    }

    #[test]
    fn test_dry_run_mutates_nothing() {
        let (dir, collection) = setup();
        let ctx = MigrationContext {
            collection: &collection,
            data_dir: dir.path(),
        };

        let report = run_migrations(&ctx, true).unwrap();
        assert_eq!(report["status"], "dry_run");
        assert_eq!(current_version(dir.path()), 0);
        assert_eq!(report["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_version_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        assert_eq!(current_version(dir.path()), 0);
        save_version(dir.path(), 2).unwrap();
        assert_eq!(current_version(dir.path()), 2);

        let raw = std::fs::read_to_string(dir.path().join(SCHEMA_VERSION_FILE)).unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert!(parsed.get("updated_at").is_some());
    }

    #[test]
    fn test_backup_and_restore() {
        let (dir, collection) = setup();
        save_version(dir.path(), SCHEMA_VERSION).unwrap();
        drop(collection);

        let backup = backup_store(dir.path()).unwrap();
        assert!(backup.join(SCHEMA_VERSION_FILE).exists());
        assert!(backup.join("engram.db").exists());

        restore_backup(dir.path(), &backup).unwrap();
        assert_eq!(current_version(dir.path()), SCHEMA_VERSION);
    }

    #[test]
    fn test_restore_rejects_newer_schema() {
        let (dir, _collection) = setup();
        let backup = TempDir::new().unwrap();
        save_version(backup.path(), SCHEMA_VERSION + 10).unwrap();

        let err = restore_backup(dir.path(), backup.path()).unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");
    }
}
