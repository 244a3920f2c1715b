use std::fs;
use std::path::{Path, PathBuf};

use gazex_core::{AttentionClass, ImageDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ManifestError;
use crate::placeholder::{PLACEHOLDER_CATEGORIES, PLACEHOLDER_IMAGES_PER_CATEGORY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub attention: AttentionClass,
    pub images: Vec<String>,
}

impl Category {
    pub fn descriptor(&self, index: usize) -> Option<ImageDescriptor> {
        self.images.get(index).map(|path| ImageDescriptor {
            path: path.clone(),
            category: self.name.clone(),
            attention: self.attention,
        })
    }
}

/// Stimulus categories and their images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub categories: Vec<Category>,
}

/// Where the active manifest came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    File(PathBuf),
    Placeholder { reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub source: ManifestSource,
}

impl Manifest {
    pub fn from_json_file(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every category needs images, and both attention classes must be present.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if let Some(empty) = self.categories.iter().find(|c| c.images.is_empty()) {
            return Err(ManifestError::EmptyCategory(empty.name.clone()));
        }
        for class in [AttentionClass::High, AttentionClass::Low] {
            if self.of_class(class).next().is_none() {
                return Err(ManifestError::MissingClass(class));
            }
        }
        Ok(())
    }

    /// The seven generated categories, five images each.
    pub fn placeholder() -> Self {
        let categories = PLACEHOLDER_CATEGORIES
            .iter()
            .map(|(name, attention, _)| Category {
                name: name.to_string(),
                attention: *attention,
                images: (1..=PLACEHOLDER_IMAGES_PER_CATEGORY)
                    .map(|n| format!("images/{name}/{n}.jpg"))
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    /// Loads `path`, falling back to the placeholder manifest when there is no
    /// path or the file is unusable.
    pub fn load_or_placeholder(path: Option<&Path>) -> LoadedManifest {
        let result = match path {
            Some(path) => Self::from_json_file(path).map(|m| (m, path.to_path_buf())),
            None => {
                return LoadedManifest {
                    manifest: Self::placeholder(),
                    source: ManifestSource::Placeholder {
                        reason: "no manifest configured".to_string(),
                    },
                };
            }
        };
        match result {
            Ok((manifest, path)) => {
                info!(path = %path.display(), categories = manifest.categories.len(), "manifest loaded");
                LoadedManifest {
                    manifest,
                    source: ManifestSource::File(path),
                }
            }
            Err(err) => {
                warn!(error = %err, "manifest unusable, using placeholder stimuli");
                LoadedManifest {
                    manifest: Self::placeholder(),
                    source: ManifestSource::Placeholder {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }

    pub fn of_class(&self, class: AttentionClass) -> impl Iterator<Item = &Category> {
        self.categories
            .iter()
            .filter(move |c| c.attention == class && !c.images.is_empty())
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }
}
