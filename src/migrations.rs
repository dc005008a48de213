//! Schema migration framework.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, tracked by the `schema_version` table.
//!
//! A migration may also carry a Rust step that runs right after its SQL,
//! inside the same transaction. Steps register the new tables in the CMS
//! metadata mirror, install default vocabularies and write the access rules,
//! so the schema and its CMS description never drift apart across versions.

use rusqlite::Connection;

use crate::access;
use crate::catalog;
use crate::db::vocabulary::ensure_vocabulary_entry;

type Step = fn(&Connection) -> Result<(), String>;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
    step: Option<Step>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "cms_catalog",
        sql: include_str!("migrations/001_cms_catalog.sql"),
        step: None,
    },
    Migration {
        version: 2,
        name: "school_types",
        sql: include_str!("migrations/002_school_types.sql"),
        step: Some(school_types_step),
    },
    Migration {
        version: 3,
        name: "educational_paths",
        sql: include_str!("migrations/003_educational_paths.sql"),
        step: Some(educational_paths_step),
    },
    Migration {
        version: 4,
        name: "schools",
        sql: include_str!("migrations/004_schools.sql"),
        step: Some(schools_step),
    },
    Migration {
        version: 5,
        name: "schools_educational_paths",
        sql: include_str!("migrations/005_schools_educational_paths.sql"),
        step: Some(junction_step),
    },
    Migration {
        version: 6,
        name: "videos",
        sql: include_str!("migrations/006_videos.sql"),
        step: Some(videos_step),
    },
    Migration {
        version: 7,
        name: "events",
        sql: include_str!("migrations/007_events.sql"),
        step: Some(events_step),
    },
    Migration {
        version: 8,
        name: "transport_routes",
        sql: include_str!("migrations/008_transport_routes.sql"),
        step: Some(transport_routes_step),
    },
    Migration {
        version: 9,
        name: "school_admins",
        sql: include_str!("migrations/009_school_admins.sql"),
        step: Some(school_admins_step),
    },
    Migration {
        version: 10,
        name: "site_settings",
        sql: include_str!("migrations/010_site_settings.sql"),
        step: Some(site_settings_step),
    },
    Migration {
        version: 11,
        name: "school_contacts",
        sql: include_str!("migrations/011_school_contacts.sql"),
        step: Some(school_contacts_step),
    },
    Migration {
        version: 12,
        name: "access_rules",
        sql: "",
        step: Some(access_rules_step),
    },
];

/// Standard Italian school types installed with the schema.
const DEFAULT_SCHOOL_TYPES: &[(&str, &str)] = &[
    (
        "Liceo",
        "Percorso di studi di carattere prevalentemente teorico e propedeutico alla formazione universitaria",
    ),
    (
        "Istituto Tecnico",
        "Percorso di studi che unisce teoria e pratica con specializzazioni tecniche",
    ),
    (
        "Istituto Professionale",
        "Percorso di studi orientato all'acquisizione di competenze pratiche per l'inserimento nel mondo del lavoro",
    ),
    (
        "Scuola Professionale",
        "Formazione professionale con focus sulle competenze pratiche e stage in azienda",
    ),
];

const DEFAULT_EDUCATIONAL_PATHS: &[(&str, &str)] = &[
    ("Classico", "Percorso con focus su materie umanistiche, latino e greco"),
    ("Scientifico", "Percorso con focus su matematica, fisica e scienze naturali"),
    ("Linguistico", "Percorso con focus sullo studio delle lingue straniere"),
    ("Scienze Umane", "Percorso con focus su psicologia, pedagogia e sociologia"),
    ("Artistico", "Percorso con focus su arti visive, grafica e design"),
    ("Musicale", "Percorso con focus sulla formazione musicale"),
    ("Tecnologico", "Percorso con focus su informatica e tecnologie"),
    ("Economico", "Percorso con focus su economia, diritto e finanza"),
    ("Alberghiero", "Percorso con focus su gastronomia, ospitalità e turismo"),
    ("Industriale", "Percorso con focus su meccanica, elettronica e automazione"),
];

fn register(conn: &Connection, collections: &[&str]) -> Result<(), String> {
    catalog::register_collections(conn, collections).map_err(|e| e.to_string())
}

fn schools_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["schools"])
}

fn junction_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["schools_educational_paths"])
}

fn videos_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["videos"])
}

fn events_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["events"])
}

fn transport_routes_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["transport_routes"])
}

fn school_admins_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["school_admins"])
}

fn school_contacts_step(conn: &Connection) -> Result<(), String> {
    register(
        conn,
        &["school_emails", "school_phones", "school_educational_path_links"],
    )
}

fn access_rules_step(conn: &Connection) -> Result<(), String> {
    access::install_access_rules(conn)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn school_types_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["school_types"])?;
    for &(name, description) in DEFAULT_SCHOOL_TYPES {
        ensure_vocabulary_entry(conn, "school_types", name, Some(description))
            .map_err(|e| format!("Failed to install school type {}: {}", name, e))?;
    }
    Ok(())
}

fn educational_paths_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["educational_paths"])?;
    for &(name, description) in DEFAULT_EDUCATIONAL_PATHS {
        ensure_vocabulary_entry(conn, "educational_paths", name, Some(description))
            .map_err(|e| format!("Failed to install educational path {}: {}", name, e))?;
    }
    Ok(())
}

/// Register the singleton and give it its one row.
fn site_settings_step(conn: &Connection) -> Result<(), String> {
    register(conn, &["site_settings"])?;
    conn.execute(
        "INSERT INTO site_settings (id)
         SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM site_settings)",
        [uuid::Uuid::new_v4().to_string()],
    )
    .map_err(|e| format!("Failed to create site settings row: {}", e))?;
    Ok(())
}

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("Failed to create schema_version table: {}", e))
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("Failed to read schema version: {}", e))
}

/// Back up the database before applying migrations.
///
/// Uses SQLite's online backup API to create a hot copy at
/// `<db_path>.pre-migration.bak`. Only called when there are pending migrations
/// against a database that already has a schema.
fn backup_before_migration(conn: &Connection) -> Result<(), String> {
    let db_path: String = conn
        .query_row("PRAGMA database_list", [], |row| row.get(2))
        .map_err(|e| format!("Failed to get database path: {}", e))?;

    if db_path.is_empty() || db_path == ":memory:" {
        // In-memory or temp database, nothing to back up
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = Connection::open(&backup_path)
        .map_err(|e| format!("Failed to open backup file: {}", e))?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)
        .map_err(|e| format!("Failed to initialize pre-migration backup: {}", e))?;

    backup
        .step(-1)
        .map_err(|e| format!("Pre-migration backup failed: {}", e))?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

/// Apply one migration's SQL and step, then record it, all in one transaction.
fn apply(conn: &Connection, migration: &Migration) -> Result<(), String> {
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| format!("Migration v{} could not begin: {}", migration.version, e))?;

    let result = (|| -> Result<(), String> {
        if !migration.sql.is_empty() {
            conn.execute_batch(migration.sql)
                .map_err(|e| format!("Migration v{} failed: {}", migration.version, e))?;
        }
        if let Some(step) = migration.step {
            step(conn).map_err(|e| format!("Migration v{} step failed: {}", migration.version, e))?;
        }
        conn.execute(
            "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )
        .map_err(|e| format!("Failed to record migration v{}: {}", migration.version, e))?;
        Ok(())
    })();

    match result {
        Ok(()) => conn
            .execute_batch("COMMIT")
            .map_err(|e| format!("Migration v{} could not commit: {}", migration.version, e)),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Run all pending migrations.
///
/// Returns the number of migrations applied (0 if already up-to-date).
///
/// Forward-compat guard: if the database has a higher version than the highest
/// known migration, returns an error telling the operator to update.
pub fn run_migrations(conn: &Connection) -> Result<usize, String> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = MIGRATIONS.last().map(|m| m.version).unwrap_or(0);

    // Forward-compat guard
    if current > max_known {
        return Err(format!(
            "Database schema version ({}) is newer than this version of orientamento supports ({}). \
             Please update orientamento to the latest version.",
            current, max_known
        ));
    }

    // Collect pending migrations
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(0);
    }

    // A fresh database has nothing worth backing up
    if current > 0 {
        backup_before_migration(conn)?;
    }

    for migration in &pending {
        apply(conn, migration)?;
        log::info!("Applied migration v{} ({})", migration.version, migration.name);
    }

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn test_fresh_db_applies_all() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());

        let version = current_version(&conn).expect("version query");
        assert_eq!(version, 12);

        // Natural key is enforced by the schema
        conn.execute(
            "INSERT INTO schools (id, miur_code, name) VALUES ('s1', 'TN001', 'A')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO schools (id, miur_code, name) VALUES ('s2', 'TN001', 'B')",
            [],
        );
        assert!(dup.is_err(), "miur_code must be unique");

        // Singleton row exists
        let settings: i64 = conn
            .query_row("SELECT COUNT(*) FROM site_settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(settings, 1);
    }

    #[test]
    fn test_migration_versions_are_increasing() {
        let versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();

        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let result = run_migrations(&conn);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(
            err.contains("newer than this version"),
            "error should mention version mismatch: {}",
            err
        );
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();

        let first = run_migrations(&conn).expect("first run");
        assert_eq!(first, MIGRATIONS.len());

        let second = run_migrations(&conn).expect("second run");
        assert_eq!(second, 0, "second run should apply no migrations");

        let types: i64 = conn
            .query_row("SELECT COUNT(*) FROM school_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(types, 4, "default vocabulary installed once");
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();

        let broken = Migration {
            version: 1,
            name: "broken",
            sql: "CREATE TABLE half_done (id TEXT); INSERT INTO nowhere VALUES (1);",
            step: None,
        };
        assert!(apply(&conn, &broken).is_err());

        let exists = conn.prepare("SELECT 1 FROM half_done").is_ok();
        assert!(!exists, "partial DDL must be rolled back");
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_pre_migration_backup_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test_backup.db");

        let conn = Connection::open(&db_path).expect("open db");
        conn.execute_batch("PRAGMA journal_mode=WAL;").unwrap();

        // Simulate a database stopped part-way through the sequence
        ensure_schema_version_table(&conn).unwrap();
        apply(&conn, &MIGRATIONS[0]).unwrap();

        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len() - 1);

        let backup_path = dir.path().join("test_backup.db.pre-migration.bak");
        assert!(
            backup_path.exists(),
            "pre-migration backup should be created at {}",
            backup_path.display()
        );
    }
}
