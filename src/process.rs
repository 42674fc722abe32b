use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{HitcovError, Result};
use crate::layout::{detect_layout, Layout};
use crate::model::CoverageTree;
use crate::record::RecordParser;
use crate::report::{CoberturaWriter, ReportOptions};

/// Knobs for turning a hit-record file into a tree.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Record layout; detected from the first record when unset.
    pub layout: Option<Layout>,
    /// Prefix stripped from source paths; the working directory when unset.
    pub source_root: Option<PathBuf>,
    /// Fill line gaps after loading.
    pub interpolate: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            layout: None,
            source_root: None,
            interpolate: true,
        }
    }
}

impl ProcessOptions {
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    #[must_use]
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn without_interpolation(mut self) -> Self {
        self.interpolate = false;
        self
    }
}

/// What happened while loading a hit-record file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    /// Records added to the tree.
    pub records: usize,
    /// Malformed records that were skipped.
    pub skipped: usize,
    /// Lines synthesized by interpolation.
    pub interpolated: u64,
}

/// Loads hit records into a [`CoverageTree`] and writes the Cobertura report.
#[derive(Debug, Default)]
pub struct CoverageProcessor {
    options: ProcessOptions,
    tree: CoverageTree,
    source_root: Option<String>,
}

impl CoverageProcessor {
    pub fn new(options: ProcessOptions) -> Self {
        let source_root = match &options.source_root {
            Some(root) => Some(root.to_string_lossy().into_owned()),
            None => match std::env::current_dir() {
                Ok(cwd) => Some(cwd.to_string_lossy().into_owned()),
                Err(e) => {
                    debug!("no working directory to relativize paths against: {e}");
                    None
                }
            },
        };
        Self {
            options,
            tree: CoverageTree::new(),
            source_root,
        }
    }

    pub fn tree(&self) -> &CoverageTree {
        &self.tree
    }

    /// Read a hit-record file and build the tree from it. Malformed records
    /// are logged and skipped; only I/O failures abort, and then the
    /// previously held tree is left untouched.
    pub fn process(&mut self, input: &Path) -> Result<ProcessStats> {
        let file = std::fs::File::open(input).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => HitcovError::InputNotFound(input.to_path_buf()),
            _ => HitcovError::Io(e),
        })?;
        let stats = self.process_reader(BufReader::new(file))?;
        info!(
            input = %input.display(),
            records = stats.records,
            skipped = stats.skipped,
            interpolated = stats.interpolated,
            "processed hit records"
        );
        Ok(stats)
    }

    /// Same as [`process`](Self::process) for any buffered source.
    pub fn process_reader<R: BufRead>(&mut self, mut reader: R) -> Result<ProcessStats> {
        let mut tree = CoverageTree::new();
        let mut stats = ProcessStats::default();
        let mut parser: Option<RecordParser> = None;

        let mut buf = Vec::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            line_no += 1;

            let raw = String::from_utf8_lossy(&buf);
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }

            let record_parser = parser.get_or_insert_with(|| self.record_parser(text));
            match record_parser.parse(line_no, text) {
                Ok(record) => {
                    tree.save(&record);
                    stats.records += 1;
                }
                Err(e) => {
                    warn!("skipping record: {e}");
                    stats.skipped += 1;
                }
            }
        }

        if self.options.interpolate {
            stats.interpolated = tree.interpolate();
        }

        self.tree = tree;
        Ok(stats)
    }

    fn record_parser(&self, first_record: &str) -> RecordParser {
        let layout = self
            .options
            .layout
            .unwrap_or_else(|| detect_layout(first_record));
        debug!(%layout, "using record layout");
        let parser = RecordParser::new(layout);
        match &self.source_root {
            Some(root) => parser.with_source_root(root.as_str()),
            None => parser,
        }
    }

    /// Report settings for this run: current time, crate version, and the
    /// source root as the only `<source>` entry.
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            sources: self.source_root.iter().cloned().collect(),
            ..ReportOptions::default()
        }
    }

    /// Write the Cobertura report to `path`.
    pub fn output(&self, path: &Path) -> Result<()> {
        self.output_with(path, &self.report_options())
    }

    /// Write the report through a temporary file in the destination
    /// directory, renamed into place once complete, so an interrupted run
    /// never leaves a truncated report behind.
    pub fn output_with(&self, path: &Path, options: &ReportOptions) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        CoberturaWriter::new(options.clone()).write(&self.tree, BufWriter::new(tmp.as_file_mut()))?;
        tmp.persist(path).map_err(|e| HitcovError::Io(e.error))?;

        info!(output = %path.display(), "wrote coverage report");
        Ok(())
    }
}
