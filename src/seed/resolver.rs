//! Free-text label → vocabulary id resolution.
//!
//! Built once per batch from the stored vocabularies and never mutated
//! afterwards. Matching is case-insensitive: an exact name match wins,
//! otherwise the first marker rule whose substring occurs in the label picks
//! the target entry.

use std::collections::HashMap;

use crate::db::{DbEducationalPath, DbSchoolType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exact(String),
    /// Matched through a marker rule. Carries the marker that fired.
    Inferred { id: String, marker: &'static str },
    Unresolved,
}

impl Resolution {
    pub fn id(&self) -> Option<&str> {
        match self {
            Resolution::Exact(id) | Resolution::Inferred { id, .. } => Some(id),
            Resolution::Unresolved => None,
        }
    }
}

/// Marker substrings and the (lowercase) vocabulary name they point at.
/// Order matters: the first rule with a matching marker wins.
type MarkerRule = (&'static [&'static str], &'static str);

const PATH_RULES: &[MarkerRule] = &[
    (&["panificazione", "pasticceria", "cucina", "sala e bar"], "alberghiero"),
    (&["servizi per la sanità", "assistenza sociale"], "scienze umane"),
    (&["servizi d'impresa", "servizi di vendita"], "economico"),
    (&["grafica", "design", "audiovisivo", "multimedia"], "artistico"),
    (
        &[
            "meccatronico",
            "meccanico",
            "meccatronica",
            "elettrico",
            "elettronica",
            "automazione",
            "carpenteria",
        ],
        "industriale",
    ),
    (&["informatica"], "tecnologico"),
    (&["classi"], "classico"),
    (&["scienti"], "scientifico"),
    (&["linguist"], "linguistico"),
    (&["scienze umane"], "scienze umane"),
    (&["artist"], "artistico"),
    (&["music"], "musicale"),
    (&["tecnolog", "tecnic"], "tecnologico"),
    (&["econom"], "economico"),
    (&["albergh"], "alberghiero"),
    (&["industrial", "meccanic", "elettronic"], "industriale"),
];

/// Applied to the school's name when its type label has no exact match.
const SCHOOL_TYPE_RULES: &[MarkerRule] = &[
    (&["liceo"], "liceo"),
    (&["istituto tecnico", "itet"], "istituto tecnico"),
    (&["istituto professionale", "ifp"], "istituto professionale"),
    (&["cfp", "formazione professionale"], "scuola professionale"),
];

#[derive(Debug, Clone, Default)]
pub struct VocabularyResolver {
    school_types: HashMap<String, String>,
    paths: HashMap<String, String>,
}

impl VocabularyResolver {
    pub fn new(school_types: &[DbSchoolType], paths: &[DbEducationalPath]) -> Self {
        Self {
            school_types: school_types
                .iter()
                .map(|t| (normalize(&t.name), t.id.clone()))
                .collect(),
            paths: paths
                .iter()
                .map(|p| (normalize(&p.name), p.id.clone()))
                .collect(),
        }
    }

    pub fn resolve_path(&self, label: &str) -> Resolution {
        resolve(&self.paths, label, PATH_RULES)
    }

    /// Resolve a school type from its label, falling back to markers in the
    /// school's name.
    pub fn resolve_school_type(&self, label: Option<&str>, school_name: &str) -> Resolution {
        if let Some(label) = label {
            if let Some(id) = self.school_types.get(&normalize(label)) {
                return Resolution::Exact(id.clone());
            }
        }
        match resolve(&self.school_types, school_name, SCHOOL_TYPE_RULES) {
            // A school literally named after a type is still an inference.
            Resolution::Exact(id) => Resolution::Inferred {
                id,
                marker: "name",
            },
            other => other,
        }
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

fn resolve(map: &HashMap<String, String>, label: &str, rules: &[MarkerRule]) -> Resolution {
    let needle = normalize(label);
    if needle.is_empty() {
        return Resolution::Unresolved;
    }
    if let Some(id) = map.get(&needle) {
        return Resolution::Exact(id.clone());
    }

    for (markers, target) in rules {
        if let Some(marker) = markers.iter().find(|m| needle.contains(*m)) {
            // A rule whose target is missing from the vocabulary does not
            // shadow later rules.
            if let Some(id) = map.get(*target) {
                return Resolution::Inferred {
                    id: id.clone(),
                    marker: *marker,
                };
            }
        }
    }
    Resolution::Unresolved
}
