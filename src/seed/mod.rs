//! Seed batch runner.
//!
//! Writes a whole dataset in one transaction: either every school and all of
//! its dependents land, or nothing does. Per school:
//!
//! 1. resolve the parent campus by natural key (missing → NULL + warning)
//! 2. upsert the school on `miur_code`
//! 3. replace emails, phones and events
//! 4. fan out educational paths into the detail link and the junction
//!
//! Unresolved vocabulary labels are reported as warnings and never abort.

pub mod dataset;
pub mod resolver;

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::db::{DbError, NewSchool, SchoolDb};
use crate::error::SeedError;

use dataset::{validate_dataset, SchoolSeed, SeedDataset};
use resolver::{Resolution, VocabularyResolver};

/// Something the batch skipped or defaulted instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedWarning {
    UnresolvedPath { school: String, label: String },
    UnresolvedSchoolType { school: String, label: Option<String> },
    MissingParent { school: String, parent: String },
}

impl std::fmt::Display for SeedWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedWarning::UnresolvedPath { school, label } => {
                write!(f, "{}: no educational path matches '{}'", school, label)
            }
            SeedWarning::UnresolvedSchoolType { school, label } => write!(
                f,
                "{}: no school type matches '{}'",
                school,
                label.as_deref().unwrap_or("")
            ),
            SeedWarning::MissingParent { school, parent } => {
                write!(f, "{}: parent school {} not found", school, parent)
            }
        }
    }
}

/// Counts of rows written by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub batch: String,
    pub schools_written: usize,
    pub emails: usize,
    pub phones: usize,
    pub events: usize,
    /// Distinct (school, path) pairs written to the detail link table.
    /// Labels resolving to a path already linked for the school count once.
    pub path_links: usize,
    /// Junction rows that did not exist before this run.
    pub new_memberships: usize,
    pub warnings: Vec<SeedWarning>,
}

impl SeedReport {
    fn new(batch: &str) -> Self {
        Self {
            batch: batch.to_string(),
            ..Self::default()
        }
    }

    fn warn(&mut self, warning: SeedWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Order schools so every parent present in the batch precedes its branches.
/// Declaration order is otherwise kept. Parents outside the batch impose no
/// constraint.
pub fn plan_order(schools: &[SchoolSeed]) -> Result<Vec<&SchoolSeed>, SeedError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let index: HashMap<&str, usize> = schools
        .iter()
        .enumerate()
        .map(|(i, s)| (s.miur_code.trim(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; schools.len()];
    let mut ordered = Vec::with_capacity(schools.len());

    for start in 0..schools.len() {
        // Walk up the parent chain, then emit it top-down.
        let mut chain = Vec::new();
        let mut current = Some(start);
        while let Some(i) = current {
            match marks[i] {
                Mark::Done => break,
                Mark::InProgress => {
                    return Err(SeedError::ParentCycle(schools[i].miur_code.clone()));
                }
                Mark::Unvisited => {
                    marks[i] = Mark::InProgress;
                    chain.push(i);
                    current = schools[i]
                        .parent_code()
                        .and_then(|code| index.get(code).copied());
                }
            }
        }
        for &i in chain.iter().rev() {
            marks[i] = Mark::Done;
            ordered.push(&schools[i]);
        }
    }

    Ok(ordered)
}

/// Write `dataset` into the store as one all-or-nothing batch.
pub fn run_seed(db: &SchoolDb, dataset: &SeedDataset) -> Result<SeedReport, SeedError> {
    validate_dataset(dataset)?;
    let order = plan_order(&dataset.schools)?;
    log::info!(
        "Seeding batch '{}' ({} schools)",
        dataset.batch,
        order.len()
    );

    let report = db.with_transaction(|db| {
        let resolver =
            VocabularyResolver::new(&db.list_school_types()?, &db.list_educational_paths()?);
        let mut report = SeedReport::new(&dataset.batch);
        for school in &order {
            seed_school(db, &resolver, school, &mut report)?;
        }
        Ok::<_, SeedError>(report)
    })?;

    log::info!(
        "Batch '{}' committed: {} schools, {} emails, {} phones, {} events, {} path links, {} warnings",
        report.batch,
        report.schools_written,
        report.emails,
        report.phones,
        report.events,
        report.path_links,
        report.warnings.len()
    );
    Ok(report)
}

fn seed_school(
    db: &SchoolDb,
    resolver: &VocabularyResolver,
    school: &SchoolSeed,
    report: &mut SeedReport,
) -> Result<(), SeedError> {
    let code = school.miur_code.trim();

    let parent_school = match school.parent_code() {
        Some(parent) => {
            let found = db.find_school_id_by_code(parent)?;
            if found.is_none() {
                report.warn(SeedWarning::MissingParent {
                    school: code.to_string(),
                    parent: parent.to_string(),
                });
            }
            found
        }
        None => None,
    };

    let school_type = match resolver.resolve_school_type(school.school_type.as_deref(), &school.name)
    {
        Resolution::Unresolved => {
            report.warn(SeedWarning::UnresolvedSchoolType {
                school: code.to_string(),
                label: school.school_type.clone(),
            });
            None
        }
        Resolution::Inferred { id, marker } => {
            log::debug!("{}: school type inferred from name marker '{}'", code, marker);
            Some(id)
        }
        Resolution::Exact(id) => Some(id),
    };

    let school_id = db
        .upsert_school(&NewSchool {
            miur_code: code.to_string(),
            name: school.name.clone(),
            school_type,
            website_url: school.website_url.clone(),
            description: school.description.clone(),
            address: school.address.clone(),
            geo_location: school.geo_location,
            orientation_contact: school.orientation_contact.clone(),
            main_campus: school.main_campus,
            canteen: school.canteen,
            boarding: school.boarding,
            parent_school,
        })
        .map_err(|e| match e {
            DbError::MissingId { .. } => {
                log::error!("Upsert of {} ({}) returned no id", school.name, code);
                SeedError::MissingParentId {
                    name: school.name.clone(),
                    code: code.to_string(),
                }
            }
            other => SeedError::Db(other),
        })?;
    report.schools_written += 1;

    report.emails += db.replace_school_emails(&school_id, &school.email_contacts())?;
    report.phones += db.replace_school_phones(&school_id, &school.phone_contacts())?;
    report.events += db.replace_school_events(&school_id, &school.new_events())?;

    let mut linked = HashSet::new();
    for (idx, path) in school.educational_paths.iter().enumerate() {
        let Some(path_id) = resolver.resolve_path(&path.name).id().map(str::to_string) else {
            report.warn(SeedWarning::UnresolvedPath {
                school: code.to_string(),
                label: path.name.clone(),
            });
            continue;
        };
        db.upsert_path_link(&school_id, &path_id, path.link.as_deref(), (idx + 1) as i64)?;
        if db.link_school_path(&school_id, &path_id)? {
            report.new_memberships += 1;
        }
        if linked.insert(path_id) {
            report.path_links += 1;
        }
    }

    log::debug!("Seeded {} ({}) as {}", school.name, code, school_id);
    Ok(())
}
