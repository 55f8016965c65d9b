//! HTML page rendering via `minijinja`.
//!
//! The dashboard and fire alert panel ship embedded in the binary. When a
//! template directory is configured, any of the known templates found
//! there replaces its embedded version, so operators can restyle pages
//! without recompiling. Templates are read once at startup.

use std::path::{Path, PathBuf};

use firewatch_types::{AlertView, HubStats};
use minijinja::{Environment, context};
use tracing::info;

/// Dashboard page template name.
pub const DASHBOARD: &str = "dashboard.html";

/// Fire alert panel template name.
pub const FIRE_ALERT: &str = "fire_alert.html";

const EMBEDDED: [(&str, &str); 2] = [
    (DASHBOARD, include_str!("../templates/dashboard.html")),
    (FIRE_ALERT, include_str!("../templates/fire_alert.html")),
];

/// Errors from loading or rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A template override could not be read from disk.
    #[error("failed to read template {path}: {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A template failed to compile.
    #[error("failed to compile template {name}: {source}")]
    Compile {
        /// Template name.
        name: &'static str,
        /// The underlying template error.
        source: minijinja::Error,
    },

    /// A template failed to render.
    #[error("failed to render template {name}: {source}")]
    Render {
        /// Template name.
        name: &'static str,
        /// The underlying template error.
        source: minijinja::Error,
    },
}

/// Compiled page templates.
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Load the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Compile`] if an embedded template is
    /// invalid.
    pub fn embedded() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        for (name, source) in EMBEDDED {
            env.add_template(name, source)
                .map_err(|source| TemplateError::Compile { name, source })?;
        }
        Ok(Self { env })
    }

    /// Load the embedded templates, then replace each one that also
    /// exists in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Read`] if an override exists but cannot be
    /// read, or [`TemplateError::Compile`] if it does not compile.
    pub fn with_overrides(dir: &Path) -> Result<Self, TemplateError> {
        let mut templates = Self::embedded()?;
        for (name, _) in EMBEDDED {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            let source = std::fs::read_to_string(&path)
                .map_err(|source| TemplateError::Read { path: path.clone(), source })?;
            templates
                .env
                .add_template_owned(name, source)
                .map_err(|source| TemplateError::Compile { name, source })?;
            info!(template = name, path = %path.display(), "Template override loaded");
        }
        Ok(templates)
    }

    /// Render the dashboard page.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] on render failure.
    pub fn dashboard(&self, stats: &HubStats, history_capacity: usize) -> Result<String, TemplateError> {
        self.render(
            DASHBOARD,
            context! {
                stats => stats,
                history_capacity => history_capacity,
                ws_path => "/ws",
            },
        )
    }

    /// Render the fire alert panel for `alert`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Render`] on render failure.
    pub fn fire_alert(&self, alert: &AlertView) -> Result<String, TemplateError> {
        self.render(FIRE_ALERT, context! { alert => alert })
    }

    fn render(&self, name: &'static str, ctx: minijinja::Value) -> Result<String, TemplateError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(|source| TemplateError::Render { name, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> AlertView {
        AlertView {
            temperature: 85.2,
            humidity: 10.0,
            smoke_level: 900,
            latitude: 1.0,
            longitude: 2.0,
            timestamp: "2026-05-01 12:00:00".to_owned(),
        }
    }

    #[test]
    fn embedded_templates_render() {
        let Ok(templates) = Templates::embedded() else {
            return;
        };
        let page = templates.dashboard(&HubStats::default(), 100).unwrap_or_default();
        assert!(page.contains("Firewatch"));
        assert!(page.contains("/ws"));

        let panel = templates.fire_alert(&alert()).unwrap_or_default();
        assert!(panel.contains("85.2"));
        assert!(panel.contains("900"));
        assert!(panel.contains("2026-05-01 12:00:00"));
    }

    #[test]
    fn override_directory_replaces_matching_templates() {
        let dir = std::env::temp_dir().join(format!("firewatch-tpl-{}", std::process::id()));
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join(FIRE_ALERT), "FIRE at {{ alert.smoke_level }}").ok();

        let templates = Templates::with_overrides(&dir);
        assert!(templates.is_ok());
        if let Ok(templates) = templates {
            assert_eq!(templates.fire_alert(&alert()).unwrap_or_default(), "FIRE at 900");
            // No override for the dashboard: the embedded page is used.
            let page = templates.dashboard(&HubStats::default(), 100).unwrap_or_default();
            assert!(page.contains("Firewatch"));
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn broken_override_is_a_compile_error() {
        let dir = std::env::temp_dir().join(format!("firewatch-bad-tpl-{}", std::process::id()));
        std::fs::create_dir_all(&dir).ok();
        std::fs::write(dir.join(DASHBOARD), "{% if %}").ok();

        let result = Templates::with_overrides(&dir);
        assert!(matches!(
            result,
            Err(TemplateError::Compile { name: DASHBOARD, .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
