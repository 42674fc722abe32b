/// Field layouts of the hit-record file.
///
/// Two layouts exist in the wild:
///   legacy:   hit|methodSignature|lineNumber|instructionOffset|instruction
///   assembly: hit|assemblyName|methodSignature|sourceFile|lineNumber|instructionOffset|instruction
///
/// The layout is normally chosen upstream; when it is not, it is detected
/// from the first non-empty record.
use crate::error::HitcovError;

/// Supported record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    Legacy,
    #[default]
    Assembly,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Legacy => "legacy",
            Layout::Assembly => "assembly",
        }
    }

    /// Number of leading fields a record must carry to be usable. The
    /// instruction offset and text that follow the line number are optional.
    pub fn required_fields(&self) -> usize {
        match self {
            Layout::Legacy => 3,
            Layout::Assembly => 5,
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = HitcovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(Layout::Legacy),
            "assembly" => Ok(Layout::Assembly),
            _ => Err(HitcovError::UnknownLayout(s.to_string())),
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess the layout from a sample of the input. The legacy layout puts the
/// method signature (which always contains `::`) in the second field.
pub fn detect_layout(content: &str) -> Layout {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty());
    match first.and_then(|l| l.split('|').nth(1)) {
        Some(field) if field.contains("::") => Layout::Legacy,
        _ => Layout::Assembly,
    }
}
