use super::*;

impl SchoolDb {
    // =========================================================================
    // School ↔ educational path relationships
    // =========================================================================

    /// Upsert the detail-bearing link for a (school, path) pair.
    ///
    /// On conflict the URL and sort order are overwritten, the row id is kept.
    pub fn upsert_path_link(
        &self,
        school_id: &str,
        educational_path_id: &str,
        link_url: Option<&str>,
        sort: i64,
    ) -> Result<(), DbError> {
        let now = now_rfc3339();
        self.conn.execute(
            "INSERT INTO school_educational_path_links
                (id, school_id, educational_path_id, link_url, sort, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(school_id, educational_path_id) DO UPDATE SET
                link_url = excluded.link_url,
                sort = excluded.sort,
                updated_at = excluded.updated_at",
            params![new_id(), school_id, educational_path_id, link_url, sort, now],
        )?;
        Ok(())
    }

    /// Add the plain many-to-many junction row, ignoring an existing pair.
    /// Returns true if a row was inserted.
    pub fn link_school_path(
        &self,
        school_id: &str,
        educational_path_id: &str,
    ) -> Result<bool, DbError> {
        let now = now_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO schools_educational_paths
                (id, schools_id, educational_paths_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(schools_id, educational_paths_id) DO NOTHING",
            params![new_id(), school_id, educational_path_id, now],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_path_links(&self, school_id: &str) -> Result<Vec<DbPathLink>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, school_id, educational_path_id, link_url, sort
             FROM school_educational_path_links
             WHERE school_id = ?1
             ORDER BY sort, educational_path_id",
        )?;
        let rows = stmt.query_map(params![school_id], |row| {
            Ok(DbPathLink {
                id: row.get(0)?,
                school_id: row.get(1)?,
                educational_path_id: row.get(2)?,
                link_url: row.get(3)?,
                sort: row.get(4)?,
            })
        })?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    /// Path ids joined to a school through the plain junction, sorted.
    pub fn list_school_path_memberships(&self, school_id: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT educational_paths_id FROM schools_educational_paths
             WHERE schools_id = ?1
             ORDER BY educational_paths_id",
        )?;
        let rows = stmt.query_map(params![school_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::schools::tests::sample_school;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_path_link_upsert_merges_url() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TNTF02000G", "ITT Marconi"))
            .unwrap();
        let path = db.ensure_educational_path("Tecnologico", None).unwrap();

        db.upsert_path_link(&school, &path, Some("https://old.example.it"), 1)
            .unwrap();
        db.upsert_path_link(&school, &path, Some("https://new.example.it"), 3)
            .unwrap();

        let links = db.list_path_links(&school).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_url.as_deref(), Some("https://new.example.it"));
        assert_eq!(links[0].sort, 3);
    }

    #[test]
    fn test_junction_insert_ignores_duplicates() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TNTF02000G", "ITT Marconi"))
            .unwrap();
        let path = db.ensure_educational_path("Industriale", None).unwrap();

        assert!(db.link_school_path(&school, &path).unwrap());
        assert!(!db.link_school_path(&school, &path).unwrap());
        assert_eq!(db.list_school_path_memberships(&school).unwrap(), vec![path]);
    }
}
