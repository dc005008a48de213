//! Access-control descriptors for the CMS.
//!
//! School administrators may only touch rows belonging to a school they are
//! linked to through `school_admins`. The rules are stored as CMS permission
//! rows whose `permissions` / `validation` columns hold a JSON filter tree.
//! The CMS evaluates them; this module only builds and installs them.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::catalog;
use crate::db::{new_id, DbError};

/// Pseudo-variable the CMS substitutes with the requesting user's id.
pub const CURRENT_USER: &str = "$CURRENT_USER";

pub const SCHOOL_ADMIN_ROLE: &str = "School Administrator";
pub const SCHOOL_ADMIN_POLICY: &str = "School Administrator Policy";
pub const ASSIGN_SCHOOL_FLOW: &str = "Assign School to Admin";

/// A CMS filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{}`: matches every row.
    Any,
    /// `{"_and": [...]}`
    And(Vec<Filter>),
    /// `{"<field>": <filter>}`: descends into a column or relation.
    Field(String, Box<Filter>),
    /// `{"_some": <filter>}`: at least one related row matches.
    SomeOf(Box<Filter>),
    /// `{"_eq": <value>}`
    Eq(Value),
}

impl Filter {
    pub fn field(name: &str, inner: Filter) -> Self {
        Filter::Field(name.to_string(), Box::new(inner))
    }

    pub fn some(inner: Filter) -> Self {
        Filter::SomeOf(Box::new(inner))
    }

    pub fn eq_current_user() -> Self {
        Filter::Eq(Value::String(CURRENT_USER.to_string()))
    }

    /// The row is a school administered by the caller.
    fn administered_school() -> Self {
        Filter::field(
            "school_admins",
            Filter::some(Filter::field("directus_user_id", Filter::eq_current_user())),
        )
    }

    /// Applies to `schools` rows.
    pub fn owned_school() -> Self {
        Filter::And(vec![Filter::administered_school()])
    }

    /// Applies to child rows whose `field` points at an administered school.
    pub fn via_school(field: &str) -> Self {
        Filter::And(vec![Filter::field(field, Filter::administered_school())])
    }

    /// Applies to `school_admins` rows belonging to the caller.
    pub fn own_assignment() -> Self {
        Filter::field("directus_user_id", Filter::eq_current_user())
    }

    /// Render the predicate in the CMS JSON shape.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Any => Value::Object(Map::new()),
            Filter::And(parts) => {
                json!({ "_and": Value::Array(parts.iter().map(Filter::to_json).collect()) })
            }
            Filter::Field(name, inner) => {
                let mut map = Map::new();
                map.insert(name.clone(), inner.to_json());
                Value::Object(map)
            }
            Filter::SomeOf(inner) => json!({ "_some": inner.to_json() }),
            Filter::Eq(value) => json!({ "_eq": value }),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    /// Full CRUD, used for the CMS administrator.
    Manage,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

/// Columns a rule grants access to. Stored comma-separated, the way the CMS
/// keeps them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    All,
    Only(&'static [&'static str]),
}

impl Fields {
    pub fn to_csv(&self) -> String {
        match self {
            Fields::All => "*".to_string(),
            Fields::Only(list) => list.join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRule {
    pub collection: &'static str,
    pub action: Action,
    /// `None` for deletes, which touch no fields.
    pub fields: Option<Fields>,
    pub permissions: Filter,
    pub validation: Filter,
    pub presets: Option<Value>,
}

impl PermissionRule {
    fn read_all(collection: &'static str) -> Self {
        Self {
            collection,
            action: Action::Read,
            fields: Some(Fields::All),
            permissions: Filter::Any,
            validation: Filter::Any,
            presets: None,
        }
    }

    fn scoped(collection: &'static str, action: Action, scope: Filter) -> Self {
        match action {
            Action::Delete => Self {
                collection,
                action,
                fields: None,
                permissions: scope,
                validation: Filter::Any,
                presets: None,
            },
            _ => Self {
                collection,
                action,
                fields: Some(Fields::All),
                permissions: scope.clone(),
                validation: scope,
                presets: None,
            },
        }
    }
}

/// Columns of `schools` a school administrator may edit.
pub const SCHOOL_UPDATE_FIELDS: &[&str] = &[
    "name",
    "website_url",
    "description",
    "detailed_info",
    "address",
    "geo_location",
    "email",
    "phone",
    "logo",
    "canteen",
    "boarding",
    "miur_code",
    "orientation_contact",
    "parent_school",
    "type",
];

/// Every rule granted to the school administrator policy.
pub fn school_admin_rules() -> Vec<PermissionRule> {
    let mut rules: Vec<PermissionRule> = ["educational_paths", "school_types", "directus_users"]
        .into_iter()
        .map(PermissionRule::read_all)
        .collect();

    rules.push(PermissionRule::read_all("schools"));
    rules.push(PermissionRule {
        collection: "schools",
        action: Action::Update,
        fields: Some(Fields::Only(SCHOOL_UPDATE_FIELDS)),
        permissions: Filter::owned_school(),
        validation: Filter::owned_school(),
        presets: None,
    });

    for collection in ["school_emails", "school_phones", "school_educational_path_links"] {
        for action in [Action::Create, Action::Update, Action::Delete] {
            let mut rule = PermissionRule::scoped(collection, action, Filter::via_school("school_id"));
            if action == Action::Create {
                rule.presets = Some(Value::Object(Map::new()));
            }
            rules.push(rule);
        }
    }

    for collection in ["videos", "transport_routes", "events"] {
        for action in [Action::Create, Action::Update, Action::Delete] {
            rules.push(PermissionRule::scoped(
                collection,
                action,
                Filter::via_school("school_id"),
            ));
        }
    }

    rules.push(PermissionRule {
        collection: "school_admins",
        action: Action::Read,
        fields: Some(Fields::All),
        permissions: Filter::own_assignment(),
        validation: Filter::Any,
        presets: None,
    });

    rules.push(PermissionRule::scoped(
        "schools_educational_paths",
        Action::Create,
        Filter::via_school("schools_id"),
    ));
    rules.push(PermissionRule::scoped(
        "schools_educational_paths",
        Action::Delete,
        Filter::via_school("schools_id"),
    ));

    rules.push(PermissionRule {
        action: Action::Create,
        ..PermissionRule::read_all("directus_files")
    });
    rules.push(PermissionRule::read_all("directus_files"));

    rules
}

/// Unrestricted `manage` on every collection this crate owns.
pub fn admin_rules() -> Vec<PermissionRule> {
    catalog::collection_names()
        .into_iter()
        .map(|collection| PermissionRule {
            action: Action::Manage,
            ..PermissionRule::read_all(collection)
        })
        .collect()
}

/// What `install_access_rules` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSummary {
    pub role_id: String,
    pub policy_id: String,
    pub policy_rules: usize,
    /// Zero when the database has no administrator role yet.
    pub admin_rules: usize,
}

/// Install the school administrator role, its policy and permissions, the
/// administrator grants and the assignment flow.
///
/// Safe to run repeatedly: role, policy, access link and flow are looked up
/// by name, permissions are replaced.
pub fn install_access_rules(conn: &Connection) -> Result<AccessSummary, DbError> {
    let role_id = ensure_role(conn)?;
    let policy_id = ensure_policy(conn)?;
    ensure_access_link(conn, &role_id, &policy_id)?;

    conn.execute(
        "DELETE FROM directus_permissions WHERE policy = ?1",
        params![policy_id],
    )?;
    let policy_rules = school_admin_rules();
    for rule in &policy_rules {
        insert_permission(conn, None, Some(&policy_id), rule)?;
    }

    let admin_role: Option<String> = conn
        .query_row(
            "SELECT id FROM directus_roles WHERE admin_access = 1 ORDER BY id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let admin_count = match admin_role {
        Some(admin_role) => {
            let rules = admin_rules();
            for rule in &rules {
                conn.execute(
                    "DELETE FROM directus_permissions
                     WHERE role = ?1 AND policy IS NULL AND collection = ?2 AND action = ?3",
                    params![admin_role, rule.collection, rule.action.as_str()],
                )?;
                insert_permission(conn, Some(&admin_role), None, rule)?;
            }
            log::info!(
                "Granted manage on {} collections to administrator role {}",
                rules.len(),
                admin_role
            );
            rules.len()
        }
        None => {
            log::warn!("No administrator role found, skipping administrator grants");
            0
        }
    };

    ensure_assignment_flow(conn)?;

    log::info!(
        "Installed {} permissions for policy '{}'",
        policy_rules.len(),
        SCHOOL_ADMIN_POLICY
    );
    Ok(AccessSummary {
        role_id,
        policy_id,
        policy_rules: policy_rules.len(),
        admin_rules: admin_count,
    })
}

fn find_id(conn: &Connection, sql: &str, name: &str) -> Result<Option<String>, DbError> {
    Ok(conn.query_row(sql, params![name], |row| row.get(0)).optional()?)
}

fn ensure_role(conn: &Connection) -> Result<String, DbError> {
    if let Some(id) = find_id(
        conn,
        "SELECT id FROM directus_roles WHERE name = ?1",
        SCHOOL_ADMIN_ROLE,
    )? {
        log::debug!("Role '{}' already exists ({})", SCHOOL_ADMIN_ROLE, id);
        return Ok(id);
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO directus_roles (id, name, icon, description, admin_access)
         VALUES (?1, ?2, 'school', 'Role for school admins to manage their school data', 0)",
        params![id, SCHOOL_ADMIN_ROLE],
    )?;
    log::info!("Created role '{}'", SCHOOL_ADMIN_ROLE);
    Ok(id)
}

fn ensure_policy(conn: &Connection) -> Result<String, DbError> {
    if let Some(id) = find_id(
        conn,
        "SELECT id FROM directus_policies WHERE name = ?1",
        SCHOOL_ADMIN_POLICY,
    )? {
        log::debug!("Policy '{}' already exists ({})", SCHOOL_ADMIN_POLICY, id);
        return Ok(id);
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO directus_policies
            (id, name, icon, description, ip_access, enforce_tfa, admin_access, app_access)
         VALUES (?1, ?2, 'policy',
            'Policy granting app access and specific permissions for School Administrators',
            NULL, 0, 0, 1)",
        params![id, SCHOOL_ADMIN_POLICY],
    )?;
    log::info!("Created policy '{}'", SCHOOL_ADMIN_POLICY);
    Ok(id)
}

fn ensure_access_link(conn: &Connection, role_id: &str, policy_id: &str) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO directus_access (id, role, \"user\", policy, sort)
         SELECT ?1, ?2, NULL, ?3, 1
         WHERE NOT EXISTS (
            SELECT 1 FROM directus_access WHERE role = ?2 AND policy = ?3
         )",
        params![new_id(), role_id, policy_id],
    )?;
    Ok(())
}

fn insert_permission(
    conn: &Connection,
    role: Option<&str>,
    policy: Option<&str>,
    rule: &PermissionRule,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO directus_permissions
            (role, policy, collection, action, permissions, validation, presets, fields)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            role,
            policy,
            rule.collection,
            rule.action.as_str(),
            rule.permissions.to_json().to_string(),
            rule.validation.to_json().to_string(),
            rule.presets.as_ref().map(Value::to_string),
            rule.fields.as_ref().map(Fields::to_csv),
        ],
    )?;
    Ok(())
}

fn ensure_assignment_flow(conn: &Connection) -> Result<(), DbError> {
    let options = json!({
        "scope": ["items.create"],
        "collections": ["school_admins"],
    });
    let inserted = conn.execute(
        "INSERT INTO directus_flows
            (id, name, icon, color, description, status, \"trigger\", accountability, options)
         SELECT ?1, ?2, 'admin_panel_settings', '#0055ff',
            'Automatically assigns a school to the user who created it via school_admins junction',
            'active', 'event', 'all', ?3
         WHERE NOT EXISTS (SELECT 1 FROM directus_flows WHERE name = ?2)",
        params![new_id(), ASSIGN_SCHOOL_FLOW, options.to_string()],
    )?;
    if inserted > 0 {
        log::info!("Created flow '{}'", ASSIGN_SCHOOL_FLOW);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_via_school_json_shape() {
        let expected = json!({
            "_and": [{
                "school_id": {
                    "school_admins": {
                        "_some": { "directus_user_id": { "_eq": "$CURRENT_USER" } }
                    }
                }
            }]
        });
        assert_eq!(Filter::via_school("school_id").to_json(), expected);
    }

    #[test]
    fn test_owned_school_and_own_assignment_shapes() {
        assert_eq!(
            Filter::owned_school().to_json(),
            json!({
                "_and": [{
                    "school_admins": {
                        "_some": { "directus_user_id": { "_eq": "$CURRENT_USER" } }
                    }
                }]
            })
        );
        assert_eq!(
            serde_json::to_value(Filter::own_assignment()).unwrap(),
            json!({ "directus_user_id": { "_eq": "$CURRENT_USER" } })
        );
        assert_eq!(Filter::Any.to_json(), json!({}));
    }

    #[test]
    fn test_school_admin_rules_cover_owned_collections() {
        let rules = school_admin_rules();
        assert_eq!(rules.len(), 28);

        let find = |collection: &str, action: Action| {
            rules
                .iter()
                .find(|r| r.collection == collection && r.action == action)
                .unwrap_or_else(|| panic!("missing {} {:?}", collection, action))
        };

        let update = find("schools", Action::Update);
        assert!(SCHOOL_UPDATE_FIELDS.contains(&"orientation_contact"));
        assert_eq!(update.permissions, Filter::owned_school());

        let delete = find("events", Action::Delete);
        assert_eq!(delete.fields, None);
        assert_eq!(delete.permissions, Filter::via_school("school_id"));
        assert_eq!(delete.validation, Filter::Any);

        let junction = find("schools_educational_paths", Action::Create);
        assert_eq!(junction.validation, Filter::via_school("schools_id"));

        assert_eq!(find("school_admins", Action::Read).permissions, Filter::own_assignment());
        assert!(find("school_emails", Action::Create).presets.is_some());
        assert!(rules
            .iter()
            .all(|r| !(r.collection == "schools" && r.action == Action::Delete)));
    }

    #[test]
    fn test_install_is_idempotent() {
        let db = test_db();
        let conn = db.conn_ref();
        let before = count(conn, "SELECT COUNT(*) FROM directus_permissions");
        assert_eq!(before, 28);

        let summary = install_access_rules(conn).unwrap();
        assert_eq!(summary.policy_rules, 28);
        assert_eq!(summary.admin_rules, 0);

        assert_eq!(count(conn, "SELECT COUNT(*) FROM directus_permissions"), before);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM directus_roles"), 1);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM directus_policies"), 1);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM directus_access"), 1);
        assert_eq!(count(conn, "SELECT COUNT(*) FROM directus_flows"), 1);
    }

    #[test]
    fn test_admin_role_gets_manage_on_every_collection() {
        let db = test_db();
        let conn = db.conn_ref();
        conn.execute(
            "INSERT INTO directus_roles (id, name, admin_access) VALUES ('admin', 'Administrator', 1)",
            [],
        )
        .unwrap();

        let summary = install_access_rules(conn).unwrap();
        assert_eq!(summary.admin_rules, catalog::COLLECTIONS.len());
        install_access_rules(conn).unwrap();

        assert_eq!(
            count(
                conn,
                "SELECT COUNT(*) FROM directus_permissions WHERE role = 'admin' AND action = 'manage'"
            ),
            catalog::COLLECTIONS.len() as i64
        );
    }

    #[test]
    fn test_stored_rule_columns() {
        let db = test_db();
        let (fields, permissions): (String, String) = db
            .conn_ref()
            .query_row(
                "SELECT fields, permissions FROM directus_permissions
                 WHERE collection = 'schools' AND action = 'update'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(fields.starts_with("name,website_url,"));
        assert!(fields.contains("miur_code"));

        let parsed: Value = serde_json::from_str(&permissions).unwrap();
        assert_eq!(parsed, Filter::owned_school().to_json());

        let delete_fields: Option<String> = db
            .conn_ref()
            .query_row(
                "SELECT fields FROM directus_permissions
                 WHERE collection = 'videos' AND action = 'delete'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(delete_fields, None);
    }
}
