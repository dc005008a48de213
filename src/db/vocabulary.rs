use super::*;

impl SchoolDb {
    // =========================================================================
    // Controlled vocabularies: school types and educational paths
    // =========================================================================

    /// List all school types ordered by name.
    pub fn list_school_types(&self) -> Result<Vec<DbSchoolType>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM school_types ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbSchoolType {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?;

        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }

    /// List all educational paths ordered by name.
    pub fn list_educational_paths(&self) -> Result<Vec<DbEducationalPath>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description FROM educational_paths ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(DbEducationalPath {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?;

        let mut paths = Vec::new();
        for row in rows {
            paths.push(row?);
        }
        Ok(paths)
    }

    /// Insert a school type unless one with the same name exists.
    /// Returns the id of the stored row.
    pub fn ensure_school_type(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<String, DbError> {
        ensure_vocabulary_entry(&self.conn, "school_types", name, description)
    }

    /// Insert an educational path unless one with the same name exists.
    /// Returns the id of the stored row.
    pub fn ensure_educational_path(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<String, DbError> {
        ensure_vocabulary_entry(&self.conn, "educational_paths", name, description)
    }
}

/// Insert-if-absent keyed by the case-insensitive unique name.
///
/// Existing rows are left untouched: vocabularies are created once and never
/// rewritten by the seed batch.
pub(crate) fn ensure_vocabulary_entry(
    conn: &Connection,
    table: &'static str,
    name: &str,
    description: Option<&str>,
) -> Result<String, DbError> {
    let now = now_rfc3339();
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name) DO NOTHING"
        ),
        params![new_id(), name, description, now],
    )?;

    let id = conn.query_row(
        &format!("SELECT id FROM {table} WHERE name = ?1"),
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}
