use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};

use super::*;

const SCHOOL_COLUMNS: &str = "id, miur_code, name, type, website_url, description, address,
     geo_location, orientation_contact, main_campus, canteen, boarding,
     parent_school, updated_at";

impl SchoolDb {
    // =========================================================================
    // Schools (aggregate root, keyed by miur_code)
    // =========================================================================

    /// Insert a school or overwrite the one sharing its `miur_code`.
    ///
    /// One atomic `INSERT … ON CONFLICT … RETURNING` statement: a new row gets
    /// a fresh id, an existing row keeps its id so children written by earlier
    /// runs stay attached. Returns the stored id.
    pub fn upsert_school(&self, school: &NewSchool) -> Result<String, DbError> {
        let geo = school
            .geo_location
            .map(|g| serde_json::to_string(&g))
            .transpose()
            .map_err(|source| DbError::Json {
                column: "schools.geo_location",
                source,
            })?;
        let now = now_rfc3339();

        let id: Option<String> = self
            .conn
            .query_row(
                "INSERT INTO schools (id, miur_code, name, type, website_url, description,
                    address, geo_location, orientation_contact, main_campus, canteen,
                    boarding, parent_school, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                 ON CONFLICT(miur_code) DO UPDATE SET
                    name = excluded.name,
                    type = excluded.type,
                    website_url = excluded.website_url,
                    description = excluded.description,
                    address = excluded.address,
                    geo_location = excluded.geo_location,
                    orientation_contact = excluded.orientation_contact,
                    main_campus = excluded.main_campus,
                    canteen = excluded.canteen,
                    boarding = excluded.boarding,
                    parent_school = excluded.parent_school,
                    updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    new_id(),
                    school.miur_code,
                    school.name,
                    school.school_type,
                    school.website_url,
                    school.description,
                    school.address,
                    geo,
                    school.orientation_contact,
                    school.main_campus,
                    school.canteen,
                    school.boarding,
                    school.parent_school,
                    now,
                ],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(DbError::MissingId {
                table: "schools",
                key: school.miur_code.clone(),
            }),
        }
    }

    /// Resolve a natural key to the school id, if the school exists.
    pub fn find_school_id_by_code(&self, miur_code: &str) -> Result<Option<String>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM schools WHERE miur_code = ?1 LIMIT 1",
                params![miur_code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Fetch a school by natural key.
    pub fn get_school_by_code(&self, miur_code: &str) -> Result<Option<DbSchool>, DbError> {
        let school = self
            .conn
            .query_row(
                &format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE miur_code = ?1"),
                params![miur_code],
                school_from_row,
            )
            .optional()?;
        Ok(school)
    }

    /// List all schools ordered by natural key.
    pub fn list_schools(&self) -> Result<Vec<DbSchool>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SCHOOL_COLUMNS} FROM schools ORDER BY miur_code"))?;
        let rows = stmt.query_map([], school_from_row)?;

        let mut schools = Vec::new();
        for row in rows {
            schools.push(row?);
        }
        Ok(schools)
    }
}

fn school_from_row(row: &Row<'_>) -> rusqlite::Result<DbSchool> {
    let geo: Option<String> = row.get(7)?;
    let geo_location = geo
        .map(|raw| serde_json::from_str::<GeoLocation>(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(DbSchool {
        id: row.get(0)?,
        miur_code: row.get(1)?,
        name: row.get(2)?,
        school_type: row.get(3)?,
        website_url: row.get(4)?,
        description: row.get(5)?,
        address: row.get(6)?,
        geo_location,
        orientation_contact: row.get(8)?,
        main_campus: row.get(9)?,
        canteen: row.get(10)?,
        boarding: row.get(11)?,
        parent_school: row.get(12)?,
        updated_at: row.get(13)?,
    })
}
