//! Composite template and static-asset lookup chain.
//!
//! The host's own directories sit at the front of the chain and every
//! initialised plugin appends its `templates/` and `static/` directories
//! behind them. Lookups walk the chain front to back, so a plugin can never
//! shadow the host or a plugin initialised before it.

use crate::plugin::domain::PluginId;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use minijinja::{Environment, Error as TemplateError, ErrorKind};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Subdirectory of a plugin source root holding templates.
pub const TEMPLATES_DIR: &str = "templates";

/// Subdirectory of a plugin source root holding static assets.
pub const STATIC_DIR: &str = "static";

/// Owner of a chain link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOwner {
    /// The host application itself.
    Host,
    /// A plugin.
    Plugin(PluginId),
}

/// One entry of the lookup chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLink {
    /// Who contributed the link.
    pub owner: LinkOwner,
    /// Template directory, when present.
    pub templates_dir: Option<PathBuf>,
    /// Static asset directory, when present.
    pub static_dir: Option<PathBuf>,
}

impl TemplateLink {
    /// Builds a link from a plugin source root, keeping only the
    /// subdirectories that exist.
    #[must_use]
    pub fn from_source_root(plugin_id: PluginId, source_root: &Path) -> Self {
        let existing = |name: &str| {
            let candidate = source_root.join(name);
            candidate.is_dir().then_some(candidate)
        };
        Self {
            owner: LinkOwner::Plugin(plugin_id),
            templates_dir: existing(TEMPLATES_DIR),
            static_dir: existing(STATIC_DIR),
        }
    }

    /// Returns whether the link contributes any directory.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.templates_dir.is_none() && self.static_dir.is_none()
    }
}

/// Ordered template and static lookup chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateChain {
    links: Vec<TemplateLink>,
}

impl TemplateChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain headed by the host's own directories.
    #[must_use]
    pub fn with_host_dirs(templates_dir: Option<PathBuf>, static_dir: Option<PathBuf>) -> Self {
        Self {
            links: vec![TemplateLink {
                owner: LinkOwner::Host,
                templates_dir,
                static_dir,
            }],
        }
    }

    /// Appends a link.
    ///
    /// Returns `false` without changing the chain when the link is empty, its
    /// owner already has a link, or it repeats a directory already chained.
    pub fn append(&mut self, link: TemplateLink) -> bool {
        if link.is_empty() {
            return false;
        }
        let duplicate = self.links.iter().any(|existing| {
            existing.owner == link.owner
                || (link.templates_dir.is_some() && existing.templates_dir == link.templates_dir)
                || (link.static_dir.is_some() && existing.static_dir == link.static_dir)
        });
        if duplicate {
            return false;
        }
        self.links.push(link);
        true
    }

    /// Returns the links front to back.
    #[must_use]
    pub fn links(&self) -> &[TemplateLink] {
        &self.links
    }

    /// Builds a template environment whose loader walks the chain.
    #[must_use]
    pub fn environment(&self) -> Environment<'static> {
        let template_dirs: Vec<PathBuf> = self
            .links
            .iter()
            .filter_map(|link| link.templates_dir.clone())
            .collect();
        let mut environment = Environment::new();
        environment.set_loader(move |name| load_from_dirs(&template_dirs, name));
        environment
    }

    /// Resolves a static asset path to the first chained file that exists.
    #[must_use]
    pub fn resolve_static(&self, asset: &str) -> Option<PathBuf> {
        let relative = safe_relative_path(asset)?;
        self.links
            .iter()
            .filter_map(|link| link.static_dir.as_deref())
            .find(|dir| {
                open_dir(dir)
                    .ok()
                    .and_then(|handle| handle.metadata(&relative).ok())
                    .is_some_and(|metadata| metadata.is_file())
            })
            .map(|dir| dir.join(&relative))
    }
}

fn open_dir(path: &Path) -> io::Result<Dir> {
    Dir::open_ambient_dir(path, ambient_authority())
}

fn load_from_dirs(dirs: &[PathBuf], name: &str) -> Result<Option<String>, TemplateError> {
    let Some(relative) = safe_relative_path(name) else {
        return Ok(None);
    };
    for dir in dirs {
        let handle = match open_dir(dir) {
            Ok(handle) => handle,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(io_to_template_error(name, err)),
        };
        match handle.read_to_string(&relative) {
            Ok(source) => return Ok(Some(source)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_to_template_error(name, err)),
        }
    }
    Ok(None)
}

fn io_to_template_error(name: &str, err: io::Error) -> TemplateError {
    TemplateError::new(
        ErrorKind::InvalidOperation,
        format!("could not read template '{name}'"),
    )
    .with_source(err)
}

fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw);
    let is_safe = !raw.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    is_safe.then(|| path.to_path_buf())
}
