//! Configuration file rendering.
//!
//! Templates use `$name` / `${name}` placeholders with `$$` as an escaped
//! dollar. Substitution is strict: an unknown name or a stray `$` fails the
//! render instead of leaving the placeholder in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EntrypointError, Result};

pub type Context = BTreeMap<String, String>;

pub trait Renderer {
    fn render(&self, template: &str, destination: &Path, context: &Context) -> Result<()>;
}

/// Renders templates found in a single directory.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(template_dir: PathBuf) -> Self {
        Self { template_dir }
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, destination: &Path, context: &Context) -> Result<()> {
        let render_err = |detail: String| EntrypointError::Render {
            template: template.to_string(),
            detail,
        };
        let source = self.template_dir.join(template);
        let raw = std::fs::read_to_string(&source)
            .map_err(|e| render_err(format!("read {}: {e}", source.display())))?;
        let rendered = substitute(&raw, context).map_err(render_err)?;
        std::fs::write(destination, rendered)
            .map_err(|e| render_err(format!("write {}: {e}", destination.display())))?;
        debug!(template, destination = %destination.display(), "rendered");
        Ok(())
    }
}

pub fn substitute(template: &str, context: &Context) -> std::result::Result<String, String> {
    let lookup = |name: &str| {
        context
            .get(name)
            .ok_or_else(|| format!("no value for ${name}"))
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after)) = rest.split_once('$') {
        out.push_str(before);

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            let (name, tail) = braced
                .split_once('}')
                .ok_or_else(|| "unterminated ${ placeholder".to_string())?;
            if identifier_len(name) != name.len() || name.is_empty() {
                return Err(format!("invalid placeholder ${{{name}}}"));
            }
            out.push_str(lookup(name)?);
            rest = tail;
        } else {
            let len = identifier_len(after);
            if len == 0 {
                let consumed = template.len() - rest.len() + before.len();
                let line = template
                    .get(..consumed)
                    .unwrap_or_default()
                    .matches('\n')
                    .count()
                    + 1;
                return Err(format!("invalid placeholder on line {line}"));
            }
            let (name, tail) = after.split_at(len);
            out.push_str(lookup(name)?);
            rest = tail;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Length in bytes of the identifier (`[_A-Za-z][_A-Za-z0-9]*`) at the start of `s`.
fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}
