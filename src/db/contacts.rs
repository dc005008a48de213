use super::*;

/// Owned contact collections: (table, value column).
const EMAILS: (&str, &str) = ("school_emails", "email");
const PHONES: (&str, &str) = ("school_phones", "number");

impl SchoolDb {
    // =========================================================================
    // Contact collections (replace semantics)
    // =========================================================================

    /// Replace every email of a school with `emails`, in order.
    /// Returns the number of rows inserted.
    pub fn replace_school_emails(
        &self,
        school_id: &str,
        emails: &[NewContact],
    ) -> Result<usize, DbError> {
        replace_contacts(&self.conn, EMAILS, school_id, emails)
    }

    /// Replace every phone number of a school with `phones`, in order.
    /// Returns the number of rows inserted.
    pub fn replace_school_phones(
        &self,
        school_id: &str,
        phones: &[NewContact],
    ) -> Result<usize, DbError> {
        replace_contacts(&self.conn, PHONES, school_id, phones)
    }

    pub fn list_school_emails(&self, school_id: &str) -> Result<Vec<DbContact>, DbError> {
        list_contacts(&self.conn, EMAILS, school_id)
    }

    pub fn list_school_phones(&self, school_id: &str) -> Result<Vec<DbContact>, DbError> {
        list_contacts(&self.conn, PHONES, school_id)
    }
}

/// Delete all rows owned by `school_id`, then insert `contacts`.
///
/// The delete finishes before the first insert; `sort` is the 1-based
/// position in `contacts`.
fn replace_contacts(
    conn: &Connection,
    (table, column): (&str, &str),
    school_id: &str,
    contacts: &[NewContact],
) -> Result<usize, DbError> {
    let removed = conn.execute(
        &format!("DELETE FROM {table} WHERE school_id = ?1"),
        params![school_id],
    )?;

    let now = now_rfc3339();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (id, school_id, description, {column}, sort, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
    ))?;
    for (idx, contact) in contacts.iter().enumerate() {
        stmt.execute(params![
            new_id(),
            school_id,
            contact.description,
            contact.value,
            (idx + 1) as i64,
            now,
        ])?;
    }

    log::debug!(
        "{}: replaced {} row(s) with {} for school {}",
        table,
        removed,
        contacts.len(),
        school_id
    );
    Ok(contacts.len())
}

fn list_contacts(
    conn: &Connection,
    (table, column): (&str, &str),
    school_id: &str,
) -> Result<Vec<DbContact>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, school_id, description, {column}, sort
         FROM {table} WHERE school_id = ?1
         ORDER BY sort, description"
    ))?;
    let rows = stmt.query_map(params![school_id], |row| {
        Ok(DbContact {
            id: row.get(0)?,
            school_id: row.get(1)?,
            description: row.get(2)?,
            value: row.get(3)?,
            sort: row.get(4)?,
        })
    })?;

    let mut contacts = Vec::new();
    for row in rows {
        contacts.push(row?);
    }
    Ok(contacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schools::tests::sample_school;
    use crate::db::test_utils::test_db;

    fn contact(description: &str, value: &str) -> NewContact {
        NewContact {
            description: description.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_replace_emails_is_idempotent() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TN1M00200X", "Liceo Arcivescovile"))
            .unwrap();
        let emails = vec![
            contact("orientamento", "orienta@example.it"),
            contact("segreteria", "segreteria@example.it"),
        ];

        db.replace_school_emails(&school, &emails).unwrap();
        db.replace_school_emails(&school, &emails).unwrap();

        let stored = db.list_school_emails(&school).unwrap();
        assert_eq!(stored.len(), 2, "second run must not duplicate rows");
        assert_eq!(stored[0].description, "orientamento");
        assert_eq!(stored[0].sort, 1);
        assert_eq!(stored[1].value, "segreteria@example.it");
        assert_eq!(stored[1].sort, 2);
    }

    #[test]
    fn test_replace_drops_rows_missing_from_new_set() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TN1M00200X", "Liceo Arcivescovile"))
            .unwrap();
        db.replace_school_phones(
            &school,
            &[
                contact("telefono", "+39 0464 406000"),
                contact("fax", "+39 0464 406077"),
            ],
        )
        .unwrap();
        db.replace_school_phones(&school, &[contact("telefono", "+39 0464 406001")])
            .unwrap();

        let stored = db.list_school_phones(&school).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, "+39 0464 406001");

        db.replace_school_phones(&school, &[]).unwrap();
        assert!(db.list_school_phones(&school).unwrap().is_empty());
    }

    #[test]
    fn test_replace_leaves_other_schools_alone() {
        let db = test_db();
        let a = db.upsert_school(&sample_school("A001", "Alpha")).unwrap();
        let b = db.upsert_school(&sample_school("B001", "Beta")).unwrap();
        db.replace_school_emails(&a, &[contact("istituto", "a@example.it")])
            .unwrap();
        db.replace_school_emails(&b, &[contact("istituto", "b@example.it")])
            .unwrap();

        db.replace_school_emails(&a, &[]).unwrap();
        assert_eq!(db.list_school_emails(&b).unwrap().len(), 1);
    }
}
