use super::*;

impl SchoolDb {
    // =========================================================================
    // School admins (CMS user ↔ school scoping used by the access rules)
    // =========================================================================

    /// Link a CMS user to a school. Existing links are left as they are.
    /// Returns true if a new link was created.
    pub fn assign_school_admin(&self, user_id: &str, school_id: &str) -> Result<bool, DbError> {
        let now = now_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO school_admins (id, directus_user_id, school_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(directus_user_id, school_id) DO NOTHING",
            params![new_id(), user_id, school_id, now],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a user's link to a school. Returns true if a link existed.
    pub fn revoke_school_admin(&self, user_id: &str, school_id: &str) -> Result<bool, DbError> {
        let removed = self.conn.execute(
            "DELETE FROM school_admins WHERE directus_user_id = ?1 AND school_id = ?2",
            params![user_id, school_id],
        )?;
        Ok(removed > 0)
    }

    /// All admin links held by a user.
    pub fn schools_for_admin(&self, user_id: &str) -> Result<Vec<DbSchoolAdmin>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, directus_user_id, school_id FROM school_admins
             WHERE directus_user_id = ?1
             ORDER BY school_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(DbSchoolAdmin {
                id: row.get(0)?,
                directus_user_id: row.get(1)?,
                school_id: row.get(2)?,
            })
        })?;

        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schools::tests::sample_school;
    use crate::db::test_utils::test_db;

    fn insert_user(db: &SchoolDb, id: &str) {
        db.conn_ref()
            .execute(
                "INSERT INTO directus_users (id, email) VALUES (?1, ?2)",
                params![id, format!("{id}@example.it")],
            )
            .expect("insert user");
    }

    #[test]
    fn test_assign_is_idempotent() {
        let db = test_db();
        insert_user(&db, "user-1");
        let school = db.upsert_school(&sample_school("TNPM02000E", "Liceo Filzi")).unwrap();

        assert!(db.assign_school_admin("user-1", &school).unwrap());
        assert!(!db.assign_school_admin("user-1", &school).unwrap());

        let links = db.schools_for_admin("user-1").unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].school_id, school);
    }

    #[test]
    fn test_revoke_removes_link() {
        let db = test_db();
        insert_user(&db, "user-2");
        let school = db.upsert_school(&sample_school("TNPM02000E", "Liceo Filzi")).unwrap();
        db.assign_school_admin("user-2", &school).unwrap();

        assert!(db.revoke_school_admin("user-2", &school).unwrap());
        assert!(!db.revoke_school_admin("user-2", &school).unwrap());
        assert!(db.schools_for_admin("user-2").unwrap().is_empty());
    }

    #[test]
    fn test_assign_requires_existing_user() {
        let db = test_db();
        let school = db.upsert_school(&sample_school("TNPM02000E", "Liceo Filzi")).unwrap();
        assert!(db.assign_school_admin("ghost", &school).is_err());
    }
}
