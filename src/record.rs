/// Parser for individual hit records.
///
/// A record is one pipe-delimited line (see [`Layout`] for the field order):
///   HIT|TestAsm|System.Void N.C::M()|/src/proj/a.cs|5|0|nop
///
/// The method signature is `<returnType> <Class>::<method>`; the return type
/// is dropped. A line number that is not a 32-bit integer becomes [`UNKNOWN_LINE`]
/// instead of rejecting the record.
use crate::error::{HitcovError, Result};
use crate::layout::Layout;
use crate::model::{UNKNOWN_FILE, UNKNOWN_LINE};

/// Token marking an executed instruction. Anything else is a miss.
pub const HIT_TOKEN: &str = "HIT";

/// Package used for legacy records whose class has no namespace.
pub const DEFAULT_PACKAGE: &str = "default";

/// One parsed hit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRecord {
    pub hit: bool,
    pub package: String,
    pub class: String,
    pub method: String,
    pub file: String,
    pub line: i64,
}

/// Turns raw lines into [`HitRecord`]s for a fixed layout.
#[derive(Debug, Clone)]
pub struct RecordParser {
    layout: Layout,
    source_root: Option<String>,
}

impl RecordParser {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            source_root: None,
        }
    }

    /// Strip this prefix from source file paths so the report references
    /// them relative to the project root.
    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        self.source_root = if root.is_empty() { None } else { Some(root) };
        self
    }

    /// Parse a single record. `line_no` is the 1-based position in the input,
    /// used only for error reporting.
    pub fn parse(&self, line_no: usize, text: &str) -> Result<HitRecord> {
        let fields: Vec<&str> = text.split('|').collect();
        let required = self.layout.required_fields();
        if fields.len() < required {
            return Err(HitcovError::Record {
                line: line_no,
                message: format!("expected at least {} fields, found {}", required, fields.len()),
            });
        }

        let hit = fields[0].trim() == HIT_TOKEN;
        let (package, signature, file, line_str) = match self.layout {
            Layout::Legacy => (None, fields[1], None, fields[2]),
            Layout::Assembly => (Some(fields[1]), fields[2], Some(fields[3]), fields[4]),
        };

        let (class, method) = split_signature(signature).ok_or_else(|| HitcovError::Record {
            line: line_no,
            message: format!("method signature '{}' has no '::' separator", signature),
        })?;

        let package = match package {
            Some(p) => p.to_string(),
            None => namespace_of(class).unwrap_or(DEFAULT_PACKAGE).to_string(),
        };

        let file = match file {
            Some(f) if !f.is_empty() && f != UNKNOWN_FILE => self.relativize(f),
            _ => UNKNOWN_FILE.to_string(),
        };

        // Source line numbers are 32-bit; anything wider is as good as missing.
        let line = line_str
            .trim()
            .parse::<i32>()
            .map_or(UNKNOWN_LINE, i64::from);

        Ok(HitRecord {
            hit,
            package,
            class: class.to_string(),
            method: method.to_string(),
            file,
            line,
        })
    }

    fn relativize(&self, path: &str) -> String {
        if let Some(root) = &self.source_root {
            if let Some(rest) = path.strip_prefix(root.as_str()) {
                // Only strip at a path boundary: /proj must not eat /project.
                let at_boundary = root.ends_with(['/', '\\']) || rest.starts_with(['/', '\\']);
                let rest = rest.trim_start_matches(['/', '\\']);
                if at_boundary && !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
        path.to_string()
    }
}

/// Split `<returnType> <Class>::<method>` into `(class, method)`.
fn split_signature(signature: &str) -> Option<(&str, &str)> {
    let full_name = match signature.trim().split_once(' ') {
        Some((_return_type, name)) => name.trim(),
        None => signature.trim(),
    };
    let (class, method) = full_name.split_once("::")?;
    if class.is_empty() || method.is_empty() {
        return None;
    }
    Some((class, method))
}

/// Namespace portion of a fully-qualified class name.
fn namespace_of(class: &str) -> Option<&str> {
    class.rsplit_once('.').map(|(ns, _)| ns).filter(|ns| !ns.is_empty())
}
