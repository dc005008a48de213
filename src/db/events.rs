use super::*;

impl SchoolDb {
    // =========================================================================
    // Events (owned by one school, replace semantics)
    // =========================================================================

    /// Replace every event of a school with `events`.
    /// Returns the number of rows inserted.
    pub fn replace_school_events(
        &self,
        school_id: &str,
        events: &[NewEvent],
    ) -> Result<usize, DbError> {
        self.conn
            .execute("DELETE FROM events WHERE school_id = ?1", params![school_id])?;

        let now = now_rfc3339();
        let mut stmt = self.conn.prepare(
            "INSERT INTO events (id, school_id, title, description, start_date, end_date,
                location, is_online, online_link, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )?;
        for event in events {
            stmt.execute(params![
                new_id(),
                school_id,
                event.title,
                event.description,
                event.start_date.to_rfc3339(),
                event.end_date.map(|d| d.to_rfc3339()),
                event.location,
                event.is_online,
                event.online_link,
                now,
            ])?;
        }
        Ok(events.len())
    }

    /// List a school's events in chronological order.
    pub fn list_school_events(&self, school_id: &str) -> Result<Vec<DbEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, school_id, title, description, start_date, end_date,
                    location, is_online, online_link
             FROM events WHERE school_id = ?1
             ORDER BY start_date, title",
        )?;
        let rows = stmt.query_map(params![school_id], |row| {
            Ok(DbEvent {
                id: row.get(0)?,
                school_id: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                start_date: row.get(4)?,
                end_date: row.get(5)?,
                location: row.get(6)?,
                is_online: row.get(7)?,
                online_link: row.get(8)?,
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db::schools::tests::sample_school;
    use crate::db::test_utils::test_db;

    fn open_day(day: u32) -> NewEvent {
        NewEvent {
            title: "Open Day".to_string(),
            description: Some("Presentazione dell'offerta formativa".to_string()),
            start_date: Utc.with_ymd_and_hms(2024, 12, day, 13, 30, 0).unwrap(),
            end_date: Some(Utc.with_ymd_and_hms(2024, 12, day, 16, 30, 0).unwrap()),
            location: Some("Viale Dei Colli, 17 - Rovereto".to_string()),
            is_online: false,
            online_link: None,
        }
    }

    #[test]
    fn test_replace_events_twice_keeps_one_copy() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TNCF011001", "IFP Alberghiero"))
            .unwrap();
        let events = vec![open_day(14), open_day(6)];

        db.replace_school_events(&school, &events).unwrap();
        db.replace_school_events(&school, &events).unwrap();

        let stored = db.list_school_events(&school).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].start_date < stored[1].start_date, "chronological");
        assert!(stored[0].start_date.starts_with("2024-12-06T13:30:00"));
        assert!(!stored[0].is_online);
    }

    #[test]
    fn test_events_cascade_with_school() {
        let db = test_db();
        let school = db
            .upsert_school(&sample_school("TNCF011001", "IFP Alberghiero"))
            .unwrap();
        db.replace_school_events(&school, &[open_day(6)]).unwrap();

        db.conn_ref()
            .execute("DELETE FROM schools WHERE id = ?1", params![school])
            .unwrap();
        assert_eq!(db.count_rows("events").unwrap(), 0);
    }
}
