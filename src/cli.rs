//! Command handler functions for the hitcov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::layout::Layout;
use crate::process::{CoverageProcessor, ProcessOptions};
use crate::summary::CoverageSummary;

/// Output style for the `summary` command.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SummaryFormat {
    Text,
    Json,
}

/// Options shared by every command that reads a hit-record file.
#[derive(Clone, Debug, Default)]
pub struct InputArgs<'a> {
    pub layout: Option<&'a str>,
    pub source_root: Option<&'a Path>,
    pub no_interpolate: bool,
}

impl InputArgs<'_> {
    fn to_options(&self) -> Result<ProcessOptions> {
        let mut options = ProcessOptions::default();
        if let Some(layout) = self.layout {
            options = options.with_layout(layout.parse::<Layout>()?);
        }
        if let Some(root) = self.source_root {
            options = options.with_source_root(root);
        }
        if self.no_interpolate {
            options = options.without_interpolation();
        }
        Ok(options)
    }
}

fn load(hits: &Path, args: &InputArgs<'_>) -> Result<CoverageProcessor> {
    let mut processor = CoverageProcessor::new(args.to_options()?);
    let stats = processor
        .process(hits)
        .with_context(|| format!("Failed to process {}", hits.display()))?;
    if stats.skipped > 0 {
        eprintln!(
            "Warning: skipped {} malformed record(s) in {}",
            stats.skipped,
            hits.display()
        );
    }
    Ok(processor)
}

pub fn cmd_report(hits: &Path, output: &Path, args: &InputArgs<'_>) -> Result<String> {
    let processor = load(hits, args)?;
    processor
        .output(output)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    let counts = processor.tree().counts();
    Ok(format!(
        "Wrote {} → line-rate {} ({}/{} lines)\n",
        output.display(),
        counts.line_rate(),
        counts.line_hit,
        counts.line_total,
    ))
}

pub fn cmd_summary(hits: &Path, format: SummaryFormat, args: &InputArgs<'_>) -> Result<String> {
    let processor = load(hits, args)?;
    let summary = CoverageSummary::from_tree(processor.tree());
    match format {
        SummaryFormat::Text => Ok(summary.to_text()),
        SummaryFormat::Json => {
            let mut json = summary.to_json().context("Failed to serialize summary")?;
            json.push('\n');
            Ok(json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_hits(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("hits.txt");
        std::fs::write(
            &path,
            "HIT|Asm|System.Void N.C::M()|a.cs|5|0|nop\n\
             MISS|Asm|System.Void N.C::M()|a.cs|7|1|ret\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_cmd_report_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let hits = write_hits(dir.path());
        let out = dir.path().join("coverage.xml");

        let msg = cmd_report(&hits, &out, &InputArgs::default()).unwrap();
        assert!(msg.contains("line-rate 0.6666667 (2/3 lines)"));
        let xml = std::fs::read_to_string(&out).unwrap();
        assert!(xml.contains("<coverage "));
    }

    #[test]
    fn test_cmd_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let hits = write_hits(dir.path());
        let args = InputArgs {
            no_interpolate: true,
            ..InputArgs::default()
        };
        let out = cmd_summary(&hits, SummaryFormat::Json, &args).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["lines_valid"], 2);
        assert_eq!(value["line_rate"], "0.5");
    }

    #[test]
    fn test_bad_layout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let hits = write_hits(dir.path());
        let args = InputArgs {
            layout: Some("xml"),
            ..InputArgs::default()
        };
        let err = cmd_summary(&hits, SummaryFormat::Text, &args).unwrap_err();
        assert!(err.to_string().contains("Unknown record layout"));
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        let out = dir.path().join("coverage.xml");
        assert!(cmd_report(&missing, &out, &InputArgs::default()).is_err());
        assert!(!out.exists());
    }
}
