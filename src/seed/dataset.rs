//! Seed dataset format.
//!
//! A dataset is one JSON document describing a batch of schools and
//! everything they own. Schools are identified by `miur_code`, the natural
//! key the store upserts on. Parents are referenced by natural key too.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{GeoLocation, NewContact, NewEvent};
use crate::error::SeedError;

const EMBEDDED_DATASET: &str = include_str!("../../seeds/rovereto_schools.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedDataset {
    pub batch: String,
    #[serde(default)]
    pub schools: Vec<SchoolSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchoolSeed {
    /// Natural key. Missing keys deserialize empty and fail validation.
    #[serde(default)]
    pub miur_code: String,
    pub name: String,
    /// Free-text school type label, resolved against `school_types`.
    #[serde(rename = "type", default)]
    pub school_type: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub geo_location: Option<GeoLocation>,
    #[serde(default)]
    pub orientation_contact: Option<String>,
    #[serde(default = "default_true")]
    pub main_campus: bool,
    #[serde(default)]
    pub canteen: bool,
    #[serde(default)]
    pub boarding: bool,
    /// Natural key of the main campus, for branch campuses.
    #[serde(default)]
    pub parent_school: Option<String>,
    #[serde(default)]
    pub emails: Vec<EmailSeed>,
    #[serde(default)]
    pub phones: Vec<PhoneSeed>,
    #[serde(default)]
    pub educational_paths: Vec<PathSeed>,
    #[serde(default)]
    pub events: Vec<EventSeed>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSeed {
    pub description: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhoneSeed {
    pub description: String,
    pub number: String,
}

/// A free-text path label plus the school's page describing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathSeed {
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventSeed {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub online_link: Option<String>,
}

impl SchoolSeed {
    pub fn email_contacts(&self) -> Vec<NewContact> {
        self.emails
            .iter()
            .map(|e| NewContact {
                description: e.description.clone(),
                value: e.email.clone(),
            })
            .collect()
    }

    pub fn phone_contacts(&self) -> Vec<NewContact> {
        self.phones
            .iter()
            .map(|p| NewContact {
                description: p.description.clone(),
                value: p.number.clone(),
            })
            .collect()
    }

    pub fn new_events(&self) -> Vec<NewEvent> {
        self.events
            .iter()
            .map(|e| NewEvent {
                title: e.title.clone(),
                description: e.description.clone(),
                start_date: e.start_date,
                end_date: e.end_date,
                location: e.location.clone(),
                is_online: e.is_online,
                online_link: e.online_link.clone(),
            })
            .collect()
    }

    /// Parent natural key, ignoring blanks.
    pub fn parent_code(&self) -> Option<&str> {
        self.parent_school
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// The Rovereto dataset compiled into the binary.
pub fn load_embedded() -> Result<SeedDataset, SeedError> {
    parse_dataset(EMBEDDED_DATASET)
}

pub fn load_dataset_file(path: &Path) -> Result<SeedDataset, SeedError> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::DatasetRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(&content)
}

pub fn parse_dataset(content: &str) -> Result<SeedDataset, SeedError> {
    let dataset: SeedDataset = serde_json::from_str(content)?;
    validate_dataset(&dataset)?;
    Ok(dataset)
}

/// Reject datasets the batch cannot write deterministically: every school
/// needs a natural key and no key may appear twice.
pub fn validate_dataset(dataset: &SeedDataset) -> Result<(), SeedError> {
    let mut seen = HashSet::new();
    for school in &dataset.schools {
        let code = school.miur_code.trim();
        if code.is_empty() {
            return Err(SeedError::MissingNaturalKey {
                name: school.name.clone(),
            });
        }
        if !seen.insert(code) {
            return Err(SeedError::DuplicateNaturalKey(code.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_dataset_loads() {
        let dataset = load_embedded().expect("embedded dataset");
        assert_eq!(dataset.batch, "rovereto_schools");
        assert_eq!(dataset.schools.len(), 13);

        let branch = dataset
            .schools
            .iter()
            .find(|s| s.parent_code().is_some())
            .expect("branch campus");
        assert_eq!(branch.parent_code(), Some("TNCF002001"));
        assert!(!branch.main_campus);
    }

    #[test]
    fn test_contacts_keep_dataset_order() {
        let dataset = load_embedded().unwrap();
        let alberghiero = &dataset.schools[0];
        let emails = alberghiero.email_contacts();
        assert_eq!(emails[0].description, "orientamento");
        assert_eq!(emails.len(), alberghiero.emails.len());
        assert_eq!(alberghiero.phone_contacts()[1].value, "+39 0464 435851");
    }

    #[test]
    fn test_missing_natural_key_is_configuration_error() {
        let err = parse_dataset(r#"{"batch": "b", "schools": [{"name": "Senza codice"}]}"#)
            .unwrap_err();
        assert!(matches!(err, SeedError::MissingNaturalKey { ref name } if name == "Senza codice"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_natural_key_rejected() {
        let json = r#"{"batch": "b", "schools": [
            {"miur_code": "TNPM02000E", "name": "A"},
            {"miur_code": " TNPM02000E ", "name": "B"}
        ]}"#;
        assert!(matches!(
            parse_dataset(json),
            Err(SeedError::DuplicateNaturalKey(code)) if code == "TNPM02000E"
        ));
    }

    #[test]
    fn test_minimal_school_defaults() {
        let dataset =
            parse_dataset(r#"{"batch": "b", "schools": [{"miur_code": "X1", "name": "X"}]}"#)
                .unwrap();
        let school = &dataset.schools[0];
        assert!(school.main_campus);
        assert!(!school.canteen);
        assert!(school.school_type.is_none());
        assert!(school.events.is_empty());
    }

    #[test]
    fn test_event_dates_parse_as_utc() {
        let dataset = load_embedded().unwrap();
        let event = &dataset.schools[0].events[0];
        assert_eq!(event.start_date.to_rfc3339(), "2024-12-06T13:30:00+00:00");
        assert_eq!(dataset.schools[0].new_events().len(), dataset.schools[0].events.len());
    }

    #[test]
    fn test_unreadable_file() {
        let err = load_dataset_file(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(matches!(err, SeedError::DatasetRead { .. }));
    }
}
