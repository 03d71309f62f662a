//! Static inputs of the labs page: the ordered project list and the optional
//! `labs.toml` settings file.
//!
//! Projects are read once at startup (JSON array, JSON `{ "projects": [...] }`
//! object, or TOML `[[projects]]` tables) and never mutated afterwards. The
//! order of the list is significant: it drives card placement and the stagger
//! delay of each card.

mod config;

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use config::{AntialiasSetting, ShowcaseConfig, WindowSettings};

const BUILTIN_PROJECTS: &str = include_str!("../data/projects.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse project list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Live,
    Dev,
}

impl ProjectStatus {
    /// Badge text shown in the card header.
    pub fn badge(self) -> &'static str {
        match self {
            ProjectStatus::Live => "LIVE",
            ProjectStatus::Dev => "IN DEV",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.badge())
    }
}

/// Linear RGBA colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub fn parse_hex(raw: &str) -> Result<Self, CatalogError> {
        let digits = raw
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| CatalogError::Invalid(format!("colour '{raw}' must start with '#'")))?;
        let expanded: String = match digits.len() {
            3 | 4 => digits.chars().flat_map(|ch| [ch, ch]).collect(),
            6 | 8 => digits.to_string(),
            _ => {
                return Err(CatalogError::Invalid(format!(
                    "colour '{raw}' must have 3, 4, 6 or 8 hex digits"
                )))
            }
        };

        let mut channels = [1.0_f32; 4];
        for (index, slot) in channels.iter_mut().enumerate() {
            let start = index * 2;
            let Some(pair) = expanded.get(start..start + 2) else {
                break;
            };
            let value = u8::from_str_radix(pair, 16)
                .map_err(|_| CatalogError::Invalid(format!("colour '{raw}' is not valid hex")))?;
            *slot = f32::from(value) / 255.0;
        }
        Ok(Self(channels))
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }
}

/// Colour or two-stop gradient used for a card's accent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColorDescriptor {
    Solid(String),
    Gradient {
        from: String,
        to: String,
        #[serde(default = "default_gradient_angle")]
        angle: f32,
    },
}

fn default_gradient_angle() -> f32 {
    135.0
}

impl ColorDescriptor {
    /// First stop of the gradient, or the solid colour itself.
    pub fn primary(&self) -> Result<Rgba, CatalogError> {
        match self {
            ColorDescriptor::Solid(hex) => Rgba::parse_hex(hex),
            ColorDescriptor::Gradient { from, .. } => Rgba::parse_hex(from),
        }
    }

    /// Last stop of the gradient; solid colours return themselves.
    pub fn secondary(&self) -> Result<Rgba, CatalogError> {
        match self {
            ColorDescriptor::Solid(hex) => Rgba::parse_hex(hex),
            ColorDescriptor::Gradient { to, .. } => Rgba::parse_hex(to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub tech: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub icon: String,
    pub color: ColorDescriptor,
}

impl Project {
    pub fn has_link(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    pub projects: Vec<Project>,
}

impl Catalog {
    /// The project list compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_PROJECTS)
    }

    pub fn from_json_str(input: &str) -> Result<Self, CatalogError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            List(Vec<Project>),
            Wrapped { projects: Vec<Project> },
        }

        let projects = match serde_json::from_str::<Helper>(input)? {
            Helper::List(projects) | Helper::Wrapped { projects } => projects,
        };
        let catalog = Self { projects };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(input)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads a project list from disk, choosing the format from the extension.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|project| project.id.as_str())
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = BTreeSet::new();
        for (index, project) in self.projects.iter().enumerate() {
            if project.id.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "project #{index} has an empty id"
                )));
            }
            if !seen.insert(project.id.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate project id '{}'",
                    project.id
                )));
            }
            if project.title.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "project '{}' has an empty title",
                    project.id
                )));
            }
            project.color.primary().map_err(|err| {
                CatalogError::Invalid(format!("project '{}': {err}", project.id))
            })?;
            project.color.secondary().map_err(|err| {
                CatalogError::Invalid(format!("project '{}': {err}", project.id))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_nine_projects_in_order() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        assert_eq!(catalog.len(), 9);
        assert_eq!(catalog.projects[0].id, "metalogos");
        assert_eq!(catalog.projects[8].id, "voice");
    }

    #[test]
    fn parses_wrapped_json_and_optional_url() {
        let catalog = Catalog::from_json_str(
            r##"{
                "projects": [{
                    "id": "demo",
                    "category": "Test",
                    "title": "Demo",
                    "description": "A demo",
                    "status": "dev",
                    "tech": ["Rust"],
                    "icon": "cpu",
                    "color": "#fff"
                }]
            }"##,
        )
        .expect("parse");
        let project = &catalog.projects[0];
        assert_eq!(project.status, ProjectStatus::Dev);
        assert!(!project.has_link());
        assert_eq!(project.color.primary().unwrap(), Rgba([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn parses_toml_projects() {
        let catalog = Catalog::from_toml_str(
            r##"
[[projects]]
id = "alpha"
category = "One"
title = "Alpha"
description = "first"
status = "live"
tech = ["A", "B"]
url = "https://example.com"
icon = "star"
color = { from = "#000000", to = "#ff0000" }
"##,
        )
        .expect("parse toml");
        let project = &catalog.projects[0];
        assert!(project.has_link());
        assert_eq!(project.tech, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(project.color.secondary().unwrap(), Rgba([1.0, 0.0, 0.0, 1.0]));
        assert!(matches!(
            project.color,
            ColorDescriptor::Gradient { angle, .. } if angle == 135.0
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let project = r##"{"id":"dup","category":"c","title":"t","description":"d","status":"live","icon":"i","color":"#123456"}"##;
        let input = format!("[{project},{project}]");
        let err = Catalog::from_json_str(&input).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(message) if message.contains("dup")));
    }

    #[test]
    fn rejects_malformed_colour() {
        let input = r##"[{"id":"x","category":"c","title":"t","description":"d","status":"live","icon":"i","color":"teal"}]"##;
        assert!(matches!(
            Catalog::from_json_str(input),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn status_badges_match_card_labels() {
        assert_eq!(ProjectStatus::Live.badge(), "LIVE");
        assert_eq!(ProjectStatus::Dev.to_string(), "IN DEV");
    }

    #[test]
    fn load_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.toml");
        fs::write(
            &path,
            r##"
[[projects]]
id = "beta"
category = "Two"
title = "Beta"
description = "second"
status = "dev"
icon = "moon"
color = "#334455"
"##,
        )
        .unwrap();
        let catalog = Catalog::load(&path).expect("load");
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["beta"]);

        let missing = Catalog::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, CatalogError::Io { .. }));
    }
}
