//! Shared type definitions for the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Write to {table} for key {key} returned no id")]
    MissingId { table: &'static str, key: String },

    #[error("Invalid JSON in {column}: {source}")]
    Json {
        column: &'static str,
        source: serde_json::Error,
    },
}

/// A row from `school_types`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbSchoolType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A row from `educational_paths`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbEducationalPath {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Coordinates stored as a JSON object in `schools.geo_location`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Values written by `upsert_school`. `parent_school` is an already
/// resolved school id, never a natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchool {
    pub miur_code: String,
    pub name: String,
    pub school_type: Option<String>,
    pub website_url: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub geo_location: Option<GeoLocation>,
    pub orientation_contact: Option<String>,
    pub main_campus: bool,
    pub canteen: bool,
    pub boarding: bool,
    pub parent_school: Option<String>,
}

/// A row from `schools`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbSchool {
    pub id: String,
    pub miur_code: String,
    pub name: String,
    pub school_type: Option<String>,
    pub website_url: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub geo_location: Option<GeoLocation>,
    pub orientation_contact: Option<String>,
    pub main_campus: bool,
    pub canteen: bool,
    pub boarding: bool,
    pub parent_school: Option<String>,
    pub updated_at: String,
}

/// A labelled contact value (email address or phone number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub description: String,
    pub value: String,
}

/// A row from `school_emails` or `school_phones`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DbContact {
    pub id: String,
    pub school_id: String,
    pub description: String,
    pub value: String,
    pub sort: i64,
}

/// Values written by `replace_school_events`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub is_online: bool,
    pub online_link: Option<String>,
}

/// A row from `events`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbEvent {
    pub id: String,
    pub school_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub is_online: bool,
    pub online_link: Option<String>,
}

/// A row from `school_educational_path_links`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DbPathLink {
    pub id: String,
    pub school_id: String,
    pub educational_path_id: String,
    pub link_url: Option<String>,
    pub sort: i64,
}

/// A row from `school_admins`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DbSchoolAdmin {
    pub id: String,
    pub directus_user_id: String,
    pub school_id: String,
}

/// Fresh row id in the CMS's uuid format.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
