//! Template loading and rendering using Tera.
//!
//! User-facing messages live in template files so projects can reword them.
//! Files under `.claude/commit-gate/templates` override the embedded
//! defaults of the same name.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tera::{Context, Tera};

/// Override directory, relative to the project root.
pub const TEMPLATES_DIR: &str = ".claude/commit-gate/templates";

/// Embedded default templates for fallback when files don't exist.
static EMBEDDED_TEMPLATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "messages/commit_gate_block.tera",
        include_str!("../templates/messages/commit_gate_block.tera"),
    );
    m.insert(
        "messages/session_status.tera",
        include_str!("../templates/messages/session_status.tera"),
    );
    m
});

/// Global template engine with caching.
static TERA: Lazy<RwLock<Option<Tera>>> = Lazy::new(|| RwLock::new(None));

/// Initialize the template engine with templates from the specified directory.
///
/// Without a directory, [`TEMPLATES_DIR`] under the current directory is
/// used. If the directory doesn't exist, only embedded defaults are loaded.
///
/// # Errors
///
/// Returns an error if the templates directory exists but contains invalid
/// templates.
pub fn init_templates(templates_dir: Option<&Path>) -> Result<()> {
    let dir = templates_dir.map_or_else(
        || std::env::current_dir().unwrap_or_default().join(TEMPLATES_DIR),
        Path::to_path_buf,
    );

    let mut tera = Tera::default();

    if dir.exists() {
        let glob_pattern = format!("{}/**/*.tera", dir.display());
        tera = Tera::new(&glob_pattern).map_err(|e| {
            Error::Template(format!("Failed to load templates from {}: {e}", dir.display()))
        })?;
    }

    // Fill in whatever the directory didn't override
    for (name, content) in EMBEDDED_TEMPLATES.iter() {
        if tera.get_template(name).is_err() {
            tera.add_raw_template(name, content)
                .map_err(|e| Error::Template(format!("Embedded template {name}: {e}")))?;
        }
    }

    *TERA.write().map_err(|e| Error::Template(e.to_string()))? = Some(tera);

    Ok(())
}

/// Render a template with the given context.
///
/// Templates are lazy-loaded on first use.
///
/// # Errors
///
/// Returns an error if the template doesn't exist or rendering fails.
pub fn render(name: &str, context: &Context) -> Result<String> {
    let needs_init = TERA.read().map_err(|e| Error::Template(e.to_string()))?.is_none();

    if needs_init {
        init_templates(None)?;
    }

    let guard = TERA.read().map_err(|e| Error::Template(e.to_string()))?;
    let tera = guard.as_ref().ok_or_else(|| Error::Template("Templates not initialized".into()))?;
    let rendered = tera
        .render(name, context)
        .map_err(|e| Error::Template(format!("Failed to render template {name}: {e}")))?;
    drop(guard);

    Ok(rendered)
}

/// Reset the template cache, forcing re-initialization on next use.
///
/// # Errors
///
/// Returns an error if the write lock cannot be acquired.
pub fn reset_cache() -> Result<()> {
    *TERA.write().map_err(|e| Error::Template(e.to_string()))? = None;
    Ok(())
}

/// Get the list of all embedded template names.
#[must_use]
pub fn embedded_template_names() -> Vec<&'static str> {
    EMBEDDED_TEMPLATES.keys().copied().collect()
}

/// Verify every message renders with sample data, using the overrides in
/// `templates_dir` where present.
///
/// The cache is cleared afterwards either way.
///
/// # Errors
///
/// Returns an error if an override fails to load or any template fails to
/// render.
pub fn verify_templates(templates_dir: &Path) -> Result<()> {
    reset_cache()?;
    let result = init_templates(Some(templates_dir)).and_then(|()| {
        embedded_template_names().into_iter().try_for_each(|name| {
            render(name, &sample_context())
                .map(drop)
                .map_err(|e| Error::Template(format!("Template {name} failed to render: {e}")))
        })
    });
    reset_cache()?;
    result
}

/// A context carrying every variable the embedded templates use.
fn sample_context() -> Context {
    let mut ctx = Context::new();

    // Block advisory
    ctx.insert("gating_command", "git commit");
    ctx.insert(
        "missing",
        &serde_json::json!([
            {"kind": "test", "remediation": "make test"},
            {"kind": "format", "remediation": "make fmt"},
        ]),
    );
    ctx.insert("will_proceed", &true);

    // Session status
    ctx.insert("session_id", "default");
    ctx.insert("exists", &true);
    ctx.insert("updated_at", "2024-01-01T00:00:00+00:00");
    ctx.insert("satisfied", &["lint"]);
    ctx.insert("warned", &["format,test"]);

    ctx
}
