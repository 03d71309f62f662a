//! Shader sources for the project cards.
//!
//! Every card id maps to one fragment shader; all cards share a single vertex
//! shader. Sources are written against the three.js conventions (`varying`,
//! `uniform`, `gl_FragColor`) and are wrapped into Vulkan-style GLSL by the
//! renderer before compilation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

/// Vertex shader shared by every card quad.
pub const CARD_VERTEX: &str = include_str!("../glsl/card.vert");

const BUILTIN_FRAGMENTS: &[(&str, &str)] = &[
    ("metalogos", include_str!("../glsl/metalogos.frag")),
    ("spinozaos", include_str!("../glsl/spinozaos.frag")),
    ("lithosphere", include_str!("../glsl/lithosphere.frag")),
    ("boardroom", include_str!("../glsl/boardroom.frag")),
    ("nexus", include_str!("../glsl/nexus.frag")),
    ("oracle", include_str!("../glsl/oracle.frag")),
    ("engram", include_str!("../glsl/engram.frag")),
    ("manifesto", include_str!("../glsl/manifesto.frag")),
    ("voice", include_str!("../glsl/voice.frag")),
];

const FRAGMENT_EXTENSIONS: &[&str] = &["frag", "glsl"];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no shader registered for '{0}'")]
    MissingShader(String),
    #[error("failed to read shader directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read shader file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader '{0}' has an empty fragment source")]
    EmptySource(String),
}

/// Vertex and fragment source for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub id: String,
    pub vertex: Arc<str>,
    pub fragment: Arc<str>,
}

/// Card id to fragment source mapping. Read-only once the page is running.
#[derive(Debug, Clone)]
pub struct ShaderRegistry {
    vertex: Arc<str>,
    fragments: BTreeMap<String, Arc<str>>,
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl ShaderRegistry {
    /// Registry holding only the shared vertex shader.
    pub fn empty() -> Self {
        Self {
            vertex: Arc::from(CARD_VERTEX),
            fragments: BTreeMap::new(),
        }
    }

    /// Registry populated with the fragment shaders compiled into the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (id, source) in BUILTIN_FRAGMENTS {
            registry.fragments.insert((*id).to_string(), Arc::from(*source));
        }
        registry
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn insert(
        &mut self,
        id: impl Into<String>,
        fragment: impl Into<Arc<str>>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        let fragment = fragment.into();
        if fragment.trim().is_empty() {
            return Err(RegistryError::EmptySource(id));
        }
        if self.fragments.insert(id.clone(), fragment).is_some() {
            debug!(id = %id, "replaced registered shader");
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.fragments.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    /// Resolves `id`, returning `None` when it is not registered.
    pub fn lookup(&self, id: &str) -> Option<ShaderProgram> {
        self.fragments.get(id).map(|fragment| ShaderProgram {
            id: id.to_string(),
            vertex: Arc::clone(&self.vertex),
            fragment: Arc::clone(fragment),
        })
    }

    pub fn get(&self, id: &str) -> Result<ShaderProgram, RegistryError> {
        self.lookup(id)
            .ok_or_else(|| RegistryError::MissingShader(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Adds every `*.frag` / `*.glsl` file in `dir`, keyed by file stem.
    /// Existing ids are overridden. Returns the number of shaders loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let io_error = |source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAGMENT_EXTENSIONS.contains(&ext));
            if path.is_file() && matches_extension {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "skipping shader with non UTF-8 name");
                continue;
            };
            let source = match fs::read_to_string(&path) {
                Ok(source) => source,
                Err(source) => {
                    let err = RegistryError::ReadFile {
                        path: path.clone(),
                        source,
                    };
                    warn!("skipping shader: {err}");
                    continue;
                }
            };
            match self.insert(id, source) {
                Ok(()) => loaded += 1,
                Err(err) => warn!(path = %path.display(), "skipping shader: {err}"),
            }
        }
        debug!(dir = %dir.display(), count = loaded, "loaded shader directory");
        Ok(loaded)
    }
}
