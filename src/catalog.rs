//! CMS metadata mirror.
//!
//! The CMS discovers tables through its own catalog (`directus_collections`,
//! `directus_fields`, `directus_relations`). Every table created by a
//! migration is described here and registered by the same migration.
//! `verify_catalog` checks the stored mirror against the live schema.

use std::collections::HashSet;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::{DbError, SchoolDb};

/// One registered collection (table) and its UI metadata.
#[derive(Debug, Clone, Copy)]
pub struct CollectionDef {
    pub name: &'static str,
    pub icon: &'static str,
    pub note: &'static str,
    pub display_template: Option<&'static str>,
    pub hidden: bool,
    pub singleton: bool,
    pub sort_field: Option<&'static str>,
    /// Fields besides `id` and the audit columns, which every table carries.
    pub fields: &'static [FieldDef],
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub field: &'static str,
    /// CSV of CMS "special" flags (`uuid`, `m2o`, `o2m`, `m2m`, `cast-json`…).
    pub special: Option<&'static str>,
    pub interface: &'static str,
    pub options: Option<&'static str>,
    pub display: Option<&'static str>,
    pub required: bool,
    pub readonly: bool,
    pub hidden: bool,
    pub width: &'static str,
    pub note: Option<&'static str>,
}

impl FieldDef {
    const fn new(field: &'static str, interface: &'static str) -> Self {
        Self {
            field,
            special: None,
            interface,
            options: None,
            display: Some("raw"),
            required: false,
            readonly: false,
            hidden: false,
            width: "full",
            note: None,
        }
    }

    const fn input(field: &'static str, note: &'static str) -> Self {
        Self::new(field, "input").note(note)
    }

    const fn text(field: &'static str, note: &'static str) -> Self {
        Self::new(field, "input-multiline").note(note)
    }

    const fn boolean(field: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("cast-boolean"),
            display: Some("boolean"),
            width: "half",
            ..Self::new(field, "boolean")
        }
        .note(note)
    }

    const fn json(field: &'static str, interface: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("cast-json"),
            display: None,
            ..Self::new(field, interface)
        }
        .note(note)
    }

    const fn datetime(field: &'static str, note: &'static str) -> Self {
        Self {
            display: Some("datetime"),
            width: "half",
            ..Self::new(field, "datetime")
        }
        .note(note)
    }

    const fn m2o(field: &'static str, template: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("m2o"),
            options: Some(template),
            display: Some("related-values"),
            ..Self::new(field, "select-dropdown-m2o")
        }
        .note(note)
    }

    const fn file(field: &'static str, interface: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("file"),
            display: Some("image"),
            width: "half",
            ..Self::new(field, interface)
        }
        .note(note)
    }

    /// A one-to-many alias with no column behind it.
    const fn o2m(field: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("o2m"),
            display: Some("related-values"),
            ..Self::new(field, "list-o2m")
        }
        .note(note)
    }

    /// A many-to-many alias resolved through a junction collection.
    const fn m2m(field: &'static str, note: &'static str) -> Self {
        Self {
            special: Some("m2m"),
            display: Some("related-values"),
            ..Self::new(field, "list-m2m")
        }
        .note(note)
    }

    const fn sort(field: &'static str) -> Self {
        Self {
            hidden: true,
            ..Self::new(field, "input")
        }
    }

    const fn note(self, note: &'static str) -> Self {
        Self {
            note: Some(note),
            ..self
        }
    }

    const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    const fn hidden(self) -> Self {
        Self {
            hidden: true,
            ..self
        }
    }

    /// True for fields that exist only in the catalog.
    pub fn is_alias(&self) -> bool {
        is_alias_special(self.special)
    }
}

fn is_alias_special(special: Option<&str>) -> bool {
    special
        .map(|s| s.split(',').any(|flag| matches!(flag.trim(), "o2m" | "m2m" | "alias")))
        .unwrap_or(false)
}

/// A foreign key as the CMS sees it.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub many_collection: &'static str,
    pub many_field: &'static str,
    pub one_collection: &'static str,
    /// Alias field on the one side, when the relation is browsable from there.
    pub one_field: Option<&'static str>,
    pub junction_field: Option<&'static str>,
}

const fn rel(
    many_collection: &'static str,
    many_field: &'static str,
    one_collection: &'static str,
    one_field: Option<&'static str>,
) -> RelationDef {
    RelationDef {
        many_collection,
        many_field,
        one_collection,
        one_field,
        junction_field: None,
    }
}

const SCHOOL_TEMPLATE: &str = r#"{"template":"{{name}}"}"#;
const PATH_TEMPLATE: &str = r#"{"template":"{{name}}"}"#;
const USER_TEMPLATE: &str = r#"{"template":"{{first_name}} {{last_name}}"}"#;

pub const COLLECTIONS: &[CollectionDef] = &[
    CollectionDef {
        name: "school_types",
        icon: "category",
        note: "Types of schools (Liceo, Istituto Tecnico, etc.)",
        display_template: Some("{{name}}"),
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::input("name", "Name of the school type").required(),
            FieldDef::text("description", "Description of this school type"),
        ],
    },
    CollectionDef {
        name: "educational_paths",
        icon: "map",
        note: "Educational paths offered by schools (indirizzo linguistico, indirizzo classico, etc.)",
        display_template: Some("{{name}}"),
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::input("name", "Name of the educational path").required(),
            FieldDef::text("description", "Short description of this educational path"),
            FieldDef::new("details", "input-rich-text-html")
                .note("Detailed information about this educational path"),
            FieldDef::m2m("schools", "Schools offering this educational path"),
        ],
    },
    CollectionDef {
        name: "schools",
        icon: "school",
        note: "Schools participating in the orientation program",
        display_template: Some("{{name}}"),
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::input("miur_code", "Ministry school code, unique per campus").required(),
            FieldDef::input("name", "Full name of the school").required(),
            FieldDef::m2o("type", SCHOOL_TEMPLATE, "Type of school").required(),
            FieldDef::file("logo", "file-image", "School logo"),
            FieldDef::input("website_url", "Official school website URL"),
            FieldDef::text("description", "Brief description of the school"),
            FieldDef::new("detailed_info", "input-rich-text-html")
                .note("Detailed information about the school"),
            FieldDef::input("address", "Street address"),
            FieldDef::input("orientation_contact", "Person in charge of orientation"),
            FieldDef::json("geo_location", "map", "Campus coordinates"),
            FieldDef::boolean("main_campus", "Whether this is the main campus"),
            FieldDef::m2o("parent_school", SCHOOL_TEMPLATE, "Main campus of this branch"),
            FieldDef::boolean("canteen", "Canteen available"),
            FieldDef::boolean("boarding", "Boarding available"),
            FieldDef::input("email", "Generic contact email"),
            FieldDef::input("phone", "Generic contact phone"),
            FieldDef::m2m("educational_paths", "Educational paths offered by this school"),
            FieldDef::o2m("path_links", "Links to path details on the school website"),
            FieldDef::o2m("emails", "Email contacts"),
            FieldDef::o2m("phones", "Phone contacts"),
            FieldDef::o2m("events", "Orientation events"),
            FieldDef::o2m("videos", "Orientation videos"),
            FieldDef::o2m("branches", "Branch campuses"),
            FieldDef::o2m("school_admins", "Users administering this school").hidden(),
        ],
    },
    CollectionDef {
        name: "schools_educational_paths",
        icon: "import_export",
        note: "Junction table between schools and their educational paths",
        display_template: None,
        hidden: true,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::m2o("schools_id", SCHOOL_TEMPLATE, "School").hidden(),
            FieldDef::m2o("educational_paths_id", PATH_TEMPLATE, "Educational path").hidden(),
        ],
    },
    CollectionDef {
        name: "videos",
        icon: "videocam",
        note: "Videos related to schools for orientation",
        display_template: Some("{{title}}"),
        hidden: false,
        singleton: false,
        sort_field: Some("sort"),
        fields: &[
            FieldDef::input("title", "Title of the video").required(),
            FieldDef::text("description", "Description of the video content"),
            FieldDef::file("video_file", "file", "Upload video file (leave empty if using YouTube link)"),
            FieldDef::input("youtube_id", "YouTube video ID (leave empty if uploading video file)"),
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "School this video belongs to").required(),
            FieldDef::new("type", "select-dropdown").note("Type of video content"),
            FieldDef::sort("sort"),
        ],
    },
    CollectionDef {
        name: "events",
        icon: "event",
        note: "Open days and orientation events",
        display_template: Some("{{title}}"),
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "Campus hosting the event").required(),
            FieldDef::input("title", "Title of the event").required(),
            FieldDef::text("description", "Description of the event"),
            FieldDef::datetime("start_date", "Start date and time").required(),
            FieldDef::datetime("end_date", "End date and time"),
            FieldDef::input("location", "Where the event takes place"),
            FieldDef::boolean("is_online", "Whether the event is online"),
            FieldDef::input("online_link", "Link for online events"),
            FieldDef::file("image", "file-image", "Event image"),
        ],
    },
    CollectionDef {
        name: "transport_routes",
        icon: "directions_bus",
        note: "Public transport routes to reach schools",
        display_template: Some("{{name}}"),
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::input("name", "Name of the route").required(),
            FieldDef::text("description", "Description of the route"),
            FieldDef::input("start_point", "Where the route starts").required(),
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "Destination school"),
            FieldDef::json("route_path", "input-code", "Route geometry"),
            FieldDef::new("transportation_type", "select-dropdown").note("Bus, train, bike…"),
            FieldDef::new("estimated_time_minutes", "input").note("Estimated travel time"),
        ],
    },
    CollectionDef {
        name: "school_admins",
        icon: "admin_panel_settings",
        note: "Links users to schools for admin permissions",
        display_template: None,
        hidden: false,
        singleton: false,
        sort_field: None,
        fields: &[
            FieldDef::m2o("directus_user_id", USER_TEMPLATE, "Administrator").required(),
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "Administered school").required(),
        ],
    },
    CollectionDef {
        name: "site_settings",
        icon: "settings",
        note: "Global site settings",
        display_template: Some("{{site_title}}"),
        hidden: false,
        singleton: true,
        sort_field: None,
        fields: &[
            FieldDef::input("site_title", "Title shown in the site header"),
            FieldDef::new("welcome_message", "input-rich-text-html").note("Homepage welcome text"),
            FieldDef::input("contact_email", "Public contact address"),
            FieldDef::file("homepage_hero_image", "file-image", "Homepage hero image"),
            FieldDef::text("footer_text", "Footer text"),
            FieldDef::json("social_media_links", "list", "Social media links"),
        ],
    },
    CollectionDef {
        name: "school_emails",
        icon: "mail",
        note: "Email contacts for schools",
        display_template: Some("{{description}}: {{email}}"),
        hidden: false,
        singleton: false,
        sort_field: Some("sort"),
        fields: &[
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "School").required(),
            FieldDef::input("description", "Label (orientamento, segreteria…)").required(),
            FieldDef::input("email", "Email address").required(),
            FieldDef::sort("sort"),
        ],
    },
    CollectionDef {
        name: "school_phones",
        icon: "phone",
        note: "Phone contacts for schools",
        display_template: Some("{{description}}: {{number}}"),
        hidden: false,
        singleton: false,
        sort_field: Some("sort"),
        fields: &[
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "School").required(),
            FieldDef::input("description", "Label (telefono, fax…)").required(),
            FieldDef::input("number", "Phone number").required(),
            FieldDef::sort("sort"),
        ],
    },
    CollectionDef {
        name: "school_educational_path_links",
        icon: "link",
        note: "Links to detailed information about educational paths at specific schools",
        display_template: Some("{{educational_path_id.name}} at {{school_id.name}}"),
        hidden: true,
        singleton: false,
        sort_field: Some("sort"),
        fields: &[
            FieldDef::m2o("school_id", SCHOOL_TEMPLATE, "School").required(),
            FieldDef::m2o("educational_path_id", PATH_TEMPLATE, "Educational path").required(),
            FieldDef::input("link_url", "Page describing this path at this school"),
            FieldDef::sort("sort"),
        ],
    },
];

pub const RELATIONS: &[RelationDef] = &[
    rel("schools", "type", "school_types", None),
    rel("schools", "logo", "directus_files", None),
    rel("schools", "parent_school", "schools", Some("branches")),
    RelationDef {
        junction_field: Some("educational_paths_id"),
        ..rel("schools_educational_paths", "schools_id", "schools", Some("educational_paths"))
    },
    RelationDef {
        junction_field: Some("schools_id"),
        ..rel(
            "schools_educational_paths",
            "educational_paths_id",
            "educational_paths",
            Some("schools"),
        )
    },
    rel("videos", "school_id", "schools", Some("videos")),
    rel("videos", "video_file", "directus_files", None),
    rel("events", "school_id", "schools", Some("events")),
    rel("events", "image", "directus_files", None),
    rel("transport_routes", "school_id", "schools", None),
    rel("school_admins", "directus_user_id", "directus_users", None),
    rel("school_admins", "school_id", "schools", Some("school_admins")),
    rel("site_settings", "homepage_hero_image", "directus_files", None),
    rel("school_emails", "school_id", "schools", Some("emails")),
    rel("school_phones", "school_id", "schools", Some("phones")),
    rel("school_educational_path_links", "school_id", "schools", Some("path_links")),
    rel(
        "school_educational_path_links",
        "educational_path_id",
        "educational_paths",
        None,
    ),
];

/// Look up a collection definition by table name.
pub fn collection(name: &str) -> Option<&'static CollectionDef> {
    COLLECTIONS.iter().find(|c| c.name == name)
}

/// Names of every collection this crate owns.
pub fn collection_names() -> Vec<&'static str> {
    COLLECTIONS.iter().map(|c| c.name).collect()
}

const ID_FIELD: FieldDef = FieldDef {
    special: Some("uuid"),
    readonly: true,
    hidden: true,
    ..FieldDef::new("id", "input")
};

const AUDIT_FIELDS: &[FieldDef] = &[
    FieldDef {
        special: Some("date-created"),
        readonly: true,
        hidden: true,
        ..FieldDef::datetime("created_at", "")
    },
    FieldDef {
        special: Some("date-updated"),
        readonly: true,
        hidden: true,
        ..FieldDef::datetime("updated_at", "")
    },
    FieldDef {
        special: Some("user-created"),
        readonly: true,
        hidden: true,
        display: Some("user"),
        ..FieldDef::m2o("user_created", USER_TEMPLATE, "")
    },
    FieldDef {
        special: Some("user-updated"),
        readonly: true,
        hidden: true,
        display: Some("user"),
        ..FieldDef::m2o("user_updated", USER_TEMPLATE, "")
    },
];

/// Register the named collections, their fields and the relations they own.
///
/// Re-registering replaces the stored rows, so the call is idempotent.
pub fn register_collections(conn: &Connection, names: &[&str]) -> Result<(), DbError> {
    for name in names {
        let def = collection(name).ok_or_else(|| {
            DbError::Migration(format!("No catalog definition for collection {}", name))
        })?;
        register_collection(conn, def)?;
        register_relations(conn, def.name)?;
    }
    Ok(())
}

/// Write one collection row and its full field list.
pub fn register_collection(conn: &Connection, def: &CollectionDef) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO directus_collections
            (collection, icon, note, display_template, hidden, singleton, sort_field,
             archive_app_filter, accountability)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 'all')
         ON CONFLICT(collection) DO UPDATE SET
            icon = excluded.icon,
            note = excluded.note,
            display_template = excluded.display_template,
            hidden = excluded.hidden,
            singleton = excluded.singleton,
            sort_field = excluded.sort_field",
        params![
            def.name,
            def.icon,
            def.note,
            def.display_template,
            def.hidden,
            def.singleton,
            def.sort_field,
        ],
    )?;

    conn.execute(
        "DELETE FROM directus_fields WHERE collection = ?1",
        params![def.name],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO directus_fields
            (collection, field, special, interface, options, display, readonly, hidden,
             sort, width, required, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    let all = std::iter::once(&ID_FIELD)
        .chain(def.fields.iter())
        .chain(AUDIT_FIELDS.iter());
    for (idx, field) in all.enumerate() {
        stmt.execute(params![
            def.name,
            field.field,
            field.special,
            field.interface,
            field.options,
            field.display,
            field.readonly,
            field.hidden,
            (idx + 1) as i64,
            field.width,
            field.required,
            field.note.filter(|n| !n.is_empty()),
        ])?;
    }

    log::debug!("Registered collection {} in the CMS catalog", def.name);
    Ok(())
}

/// Write every relation whose many side is `many_collection`.
pub fn register_relations(conn: &Connection, many_collection: &str) -> Result<(), DbError> {
    for relation in RELATIONS.iter().filter(|r| r.many_collection == many_collection) {
        register_relation(conn, relation)?;
    }
    Ok(())
}

fn register_relation(conn: &Connection, relation: &RelationDef) -> Result<(), DbError> {
    conn.execute(
        "DELETE FROM directus_relations WHERE many_collection = ?1 AND many_field = ?2",
        params![relation.many_collection, relation.many_field],
    )?;
    conn.execute(
        "INSERT INTO directus_relations
            (many_collection, many_field, one_collection, one_field, junction_field,
             one_deselect_action)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            relation.many_collection,
            relation.many_field,
            relation.one_collection,
            relation.one_field,
            relation.junction_field,
            if relation.junction_field.is_some() { "delete" } else { "nullify" },
        ],
    )?;
    Ok(())
}

// =============================================================================
// Consistency check
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogDrift {
    /// A registered collection has no table.
    MissingTable { collection: String },
    /// A registered non-alias field has no column.
    MissingColumn { collection: String, field: String },
    /// A column the CMS does not know about.
    UnregisteredColumn { collection: String, field: String },
    /// An alias field with no relation pointing back at it.
    DanglingAlias { collection: String, field: String },
}

impl std::fmt::Display for CatalogDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogDrift::MissingTable { collection } => {
                write!(f, "collection {} has no table", collection)
            }
            CatalogDrift::MissingColumn { collection, field } => {
                write!(f, "field {}.{} has no column", collection, field)
            }
            CatalogDrift::UnregisteredColumn { collection, field } => {
                write!(f, "column {}.{} is not registered", collection, field)
            }
            CatalogDrift::DanglingAlias { collection, field } => {
                write!(f, "alias {}.{} has no relation", collection, field)
            }
        }
    }
}

impl SchoolDb {
    /// Compare the stored CMS catalog with the live schema.
    pub fn verify_catalog(&self) -> Result<Vec<CatalogDrift>, DbError> {
        verify_catalog(self.conn_ref())
    }
}

/// Compare the stored CMS catalog with the live schema for every collection
/// this crate owns. An empty result means the mirror is consistent.
pub fn verify_catalog(conn: &Connection) -> Result<Vec<CatalogDrift>, DbError> {
    let mut drift = Vec::new();

    for def in COLLECTIONS {
        let columns = table_columns(conn, def.name)?;
        if columns.is_empty() {
            drift.push(CatalogDrift::MissingTable {
                collection: def.name.to_string(),
            });
            continue;
        }

        let registered = registered_fields(conn, def.name)?;
        let mut seen = HashSet::new();
        for (field, special) in &registered {
            seen.insert(field.as_str());
            if is_alias_special(special.as_deref()) {
                let backed: bool = conn
                    .prepare(
                        "SELECT 1 FROM directus_relations
                         WHERE one_collection = ?1 AND one_field = ?2",
                    )?
                    .exists(params![def.name, field])?;
                if !backed {
                    drift.push(CatalogDrift::DanglingAlias {
                        collection: def.name.to_string(),
                        field: field.clone(),
                    });
                }
            } else if !columns.contains(field) {
                drift.push(CatalogDrift::MissingColumn {
                    collection: def.name.to_string(),
                    field: field.clone(),
                });
            }
        }

        for column in &columns {
            if !seen.contains(column.as_str()) {
                drift.push(CatalogDrift::UnregisteredColumn {
                    collection: def.name.to_string(),
                    field: column.clone(),
                });
            }
        }
    }

    Ok(drift)
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, DbError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
    let mut columns = HashSet::new();
    for row in rows {
        columns.insert(row?);
    }
    Ok(columns)
}

fn registered_fields(
    conn: &Connection,
    collection: &str,
) -> Result<Vec<(String, Option<String>)>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT field, special FROM directus_fields WHERE collection = ?1 ORDER BY sort",
    )?;
    let rows = stmt.query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut fields = Vec::new();
    for row in rows {
        fields.push(row?);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_migrated_catalog_has_no_drift() {
        let db = test_db();
        let drift = db.verify_catalog().expect("verify");
        assert!(drift.is_empty(), "unexpected drift: {:?}", drift);
    }

    #[test]
    fn test_every_collection_registered() {
        let db = test_db();
        let registered: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM directus_collections", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(registered as usize, COLLECTIONS.len());

        let singleton: bool = db
            .conn_ref()
            .query_row(
                "SELECT singleton FROM directus_collections WHERE collection = 'site_settings'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(singleton);
    }

    #[test]
    fn test_id_and_audit_fields_wrap_declared_fields() {
        let db = test_db();
        let fields = registered_fields(db.conn_ref(), "school_phones").unwrap();
        let names: Vec<&str> = fields.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "school_id",
                "description",
                "number",
                "sort",
                "created_at",
                "updated_at",
                "user_created",
                "user_updated"
            ]
        );
    }

    #[test]
    fn test_reregistering_is_idempotent() {
        let db = test_db();
        let count = |db: &SchoolDb| -> i64 {
            db.conn_ref()
                .query_row("SELECT COUNT(*) FROM directus_fields", [], |row| row.get(0))
                .unwrap()
        };
        let before = count(&db);
        register_collections(db.conn_ref(), &["schools", "school_emails"]).unwrap();
        assert_eq!(count(&db), before);
        assert!(db.verify_catalog().unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_column_is_reported() {
        let db = test_db();
        db.conn_ref()
            .execute_batch("ALTER TABLE schools ADD COLUMN motto TEXT;")
            .unwrap();

        let drift = db.verify_catalog().unwrap();
        assert_eq!(
            drift,
            vec![CatalogDrift::UnregisteredColumn {
                collection: "schools".to_string(),
                field: "motto".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_column_and_dangling_alias_are_reported() {
        let db = test_db();
        db.conn_ref()
            .execute_batch(
                "INSERT INTO directus_fields (collection, field, interface)
                 VALUES ('events', 'capacity', 'input');
                 DELETE FROM directus_relations
                 WHERE many_collection = 'school_phones' AND many_field = 'school_id';",
            )
            .unwrap();

        let drift = db.verify_catalog().unwrap();
        assert!(drift.contains(&CatalogDrift::MissingColumn {
            collection: "events".to_string(),
            field: "capacity".to_string()
        }));
        assert!(drift.contains(&CatalogDrift::DanglingAlias {
            collection: "schools".to_string(),
            field: "phones".to_string()
        }));
        assert_eq!(drift.len(), 2);
    }

    #[test]
    fn test_alias_fields_have_no_column() {
        let schools = collection("schools").unwrap();
        let aliases: Vec<&str> = schools
            .fields
            .iter()
            .filter(|f| f.is_alias())
            .map(|f| f.field)
            .collect();
        assert!(aliases.contains(&"educational_paths"));
        assert!(aliases.contains(&"school_admins"));
        assert!(!aliases.contains(&"parent_school"));
    }

    #[test]
    fn test_unknown_collection_is_rejected() {
        let db = test_db();
        let err = register_collections(db.conn_ref(), &["podcasts"]).unwrap_err();
        assert!(err.to_string().contains("podcasts"));
    }
}
