//! SPA shell rendering
//!
//! The shell is `index.html` from the asset bundle, rendered with minijinja.
//! It receives the bootstrap object as a script-safe JSON string in
//! `config`, the build manifest in `manifest`, plus `dev` and `base`.

use minijinja::{AutoEscape, Environment, Value, context};
use serde::Serialize;
use thiserror::Error;

use logdeck_core::{AgentRegistry, Host};

use crate::assets::Assets;
use crate::config::Config;

/// Name of the shell template in the asset bundle
pub const TEMPLATE: &str = "index.html";

/// Name of the build manifest in the asset bundle
pub const MANIFEST: &str = "manifest.json";

/// Defects in the packaged shell
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Shell template index.html is missing")]
    MissingTemplate,

    #[error("Shell template index.html is not valid UTF-8")]
    Encoding,

    #[error("Shell template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Manifest manifest.json is missing")]
    MissingManifest,

    #[error("Manifest manifest.json could not be parsed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Configuration object injected into the shell for the browser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    /// Base path, empty when mounted at the root
    pub base: String,
    pub version: String,
    pub authorization_needed: bool,
    pub secured: bool,
    pub hostname: String,
    /// Agent hosts sorted by name
    pub hosts: Vec<Host>,
}

impl BootstrapConfig {
    /// Assemble the object for one render
    pub fn assemble(config: &Config, registry: &AgentRegistry, authorization_needed: bool) -> Self {
        let hosts = registry
            .list()
            .iter()
            .map(|agent| agent.host().clone())
            .collect();

        Self {
            base: config.prefix().to_string(),
            version: config.version.clone(),
            authorization_needed,
            secured: config.secured(),
            hostname: config.hostname.clone(),
            hosts,
        }
    }
}

/// Serialize to JSON that is safe to embed in a `<script>` element
pub fn script_safe_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

/// Compiled shell template and manifest
#[derive(Debug)]
pub struct Shell {
    env: Environment<'static>,
    manifest: serde_json::Value,
    dev: bool,
}

impl Shell {
    /// Load the shell from the asset bundle
    ///
    /// In dev mode a missing or broken manifest degrades to `{}`.
    pub fn load(assets: &Assets, dev: bool) -> Result<Self, PackagingError> {
        let bytes = assets.get(TEMPLATE).ok_or(PackagingError::MissingTemplate)?;
        let source = String::from_utf8(bytes.to_vec()).map_err(|_| PackagingError::Encoding)?;

        let mut env = Environment::new();
        // The config is pre-escaped for script context; nothing else needs HTML escaping.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template_owned(TEMPLATE, source)?;

        let manifest = load_manifest(assets, dev)?;
        Ok(Self {
            env,
            manifest,
            dev,
        })
    }

    pub fn manifest(&self) -> &serde_json::Value {
        &self.manifest
    }

    /// Render the shell document
    pub fn render(&self, config: &BootstrapConfig) -> Result<String, PackagingError> {
        let html = self.env.get_template(TEMPLATE)?.render(
            context! {
                config => Value::from_safe_string(script_safe_json(config)?),
                manifest => Value::from_serialize(&self.manifest),
                dev => self.dev,
                base => config.base.clone(),
            },
        )?;
        Ok(html)
    }
}

fn load_manifest(assets: &Assets, dev: bool) -> Result<serde_json::Value, PackagingError> {
    let empty = || serde_json::Value::Object(serde_json::Map::new());

    let Some(bytes) = assets.get(MANIFEST) else {
        if dev {
            return Ok(empty());
        }
        return Err(PackagingError::MissingManifest);
    };

    match serde_json::from_slice(bytes) {
        Ok(manifest) => Ok(manifest),
        Err(e) if dev => {
            tracing::warn!(error = %e, "ignoring unparseable manifest in dev mode");
            Ok(empty())
        }
        Err(e) => Err(e.into()),
    }
}
