//! In-memory coverage tree built from hit records.
//!
//! The tree has five keyed levels (package → class → method → file → line)
//! and every level carries its own [`Counts`]. A count at any level is always
//! the sum of the same count across its children; [`CoverageTree::save`] and
//! the interpolator keep that true by bumping every level on the way down.
use std::borrow::Cow;
use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::record::HitRecord;

/// File name used when an instruction has no resolvable source document.
pub const UNKNOWN_FILE: &str = "unknown";

/// Line key used when an instruction has no resolvable source line.
pub const UNKNOWN_LINE: i64 = -1;

/// Format a coverage rate the way Cobertura consumers expect: the shortest
/// decimal text of an `f32` division, or `"0"` when there is nothing to cover.
#[must_use]
pub fn format_rate(hit: u64, total: u64) -> String {
    if total == 0 {
        "0".to_string()
    } else {
        (hit as f32 / total as f32).to_string()
    }
}

/// Line and branch counters kept at every level of the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub line_total: u64,
    pub line_hit: u64,
    pub branch_total: u64,
    pub branch_hit: u64,
}

impl Counts {
    /// Account for one instruction.
    pub fn record(&mut self, hit: bool) {
        self.line_total += 1;
        self.branch_total += 1;
        if hit {
            self.line_hit += 1;
            self.branch_hit += 1;
        }
    }

    /// Add another set of counts into this one.
    pub fn absorb(&mut self, other: &Counts) {
        self.line_total += other.line_total;
        self.line_hit += other.line_hit;
        self.branch_total += other.branch_total;
        self.branch_hit += other.branch_hit;
    }

    #[must_use]
    pub fn line_rate(&self) -> String {
        format_rate(self.line_hit, self.line_total)
    }

    #[must_use]
    pub fn branch_rate(&self) -> String {
        format_rate(self.branch_hit, self.branch_total)
    }
}

/// Children of one tree level, kept in first-seen order.
pub type Children<T> = IndexMap<String, T>;

/// Return the child for `key`, creating an empty one on first reference.
/// The key is only copied when the child is new.
fn child<'a, T: Default>(children: &'a mut Children<T>, key: &str) -> &'a mut T {
    match children.get_index_of(key) {
        Some(idx) => &mut children[idx],
        None => children.entry(key.to_owned()).or_default(),
    }
}

/// One IL instruction mapped to a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub hit: bool,
}

/// A single source line and the instructions that map to it.
#[derive(Debug, Clone)]
pub struct Line {
    pub(crate) counts: Counts,
    pub(crate) instructions: Cow<'static, [Instruction]>,
    pub(crate) synthetic: bool,
}

/// Template for an interpolated line whose neighbour was executed.
pub static HIT_LINE: Line = Line {
    counts: Counts {
        line_total: 1,
        line_hit: 1,
        branch_total: 1,
        branch_hit: 1,
    },
    instructions: Cow::Borrowed(&[Instruction { hit: true }]),
    synthetic: true,
};

/// Template for an interpolated line whose neighbour was never executed.
pub static MISS_LINE: Line = Line {
    counts: Counts {
        line_total: 1,
        line_hit: 0,
        branch_total: 1,
        branch_hit: 0,
    },
    instructions: Cow::Borrowed(&[Instruction { hit: false }]),
    synthetic: true,
};

impl Default for Line {
    fn default() -> Self {
        Self {
            counts: Counts::default(),
            instructions: Cow::Borrowed(&[]),
            synthetic: false,
        }
    }
}

impl Line {
    fn push(&mut self, hit: bool) {
        self.instructions.to_mut().push(Instruction { hit });
        self.counts.record(hit);
    }

    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// A line is hit when any of its instructions was.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.counts.line_hit > 0
    }

    /// Filled in by the interpolator rather than recorded.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// More than one instruction on a line marks it as a decision point.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.instructions.len() > 1
    }
}

/// The lines of one source file that belong to a single method.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub(crate) counts: Counts,
    pub(crate) lines: BTreeMap<i64, Line>,
}

impl SourceFile {
    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Lines in ascending numeric order, including the unknown line if any.
    #[must_use]
    pub fn lines(&self) -> &BTreeMap<i64, Line> {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, number: i64) -> Option<&Line> {
        self.lines.get(&number)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Method {
    pub(crate) counts: Counts,
    pub(crate) files: Children<SourceFile>,
}

impl Method {
    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    #[must_use]
    pub fn files(&self) -> &Children<SourceFile> {
        &self.files
    }
}

#[derive(Debug, Clone, Default)]
pub struct Class {
    pub(crate) counts: Counts,
    pub(crate) methods: Children<Method>,
}

impl Class {
    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    #[must_use]
    pub fn methods(&self) -> &Children<Method> {
        &self.methods
    }

    /// The first known source file seen across this class's methods, or
    /// [`UNKNOWN_FILE`] when every instruction was unattributed.
    #[must_use]
    pub fn filename(&self) -> &str {
        self.methods
            .values()
            .flat_map(|m| m.files.keys().map(String::as_str))
            .find(|name| *name != UNKNOWN_FILE)
            .unwrap_or(UNKNOWN_FILE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Package {
    pub(crate) counts: Counts,
    pub(crate) classes: Children<Class>,
}

impl Package {
    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    #[must_use]
    pub fn classes(&self) -> &Children<Class> {
        &self.classes
    }
}

/// Root of the coverage model for a single run.
#[derive(Debug, Clone, Default)]
pub struct CoverageTree {
    pub(crate) counts: Counts,
    pub(crate) packages: Children<Package>,
}

impl CoverageTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    #[must_use]
    pub fn packages(&self) -> &Children<Package> {
        &self.packages
    }

    /// Add one instruction to the tree, creating any missing levels and
    /// bumping the counters at every level from the line up to the root.
    pub fn save(&mut self, record: &HitRecord) {
        let hit = record.hit;
        self.counts.record(hit);

        let package = child(&mut self.packages, &record.package);
        package.counts.record(hit);

        let class = child(&mut package.classes, &record.class);
        class.counts.record(hit);

        let method = child(&mut class.methods, &record.method);
        method.counts.record(hit);

        let file = child(&mut method.files, &record.file);
        file.counts.record(hit);

        file.lines.entry(record.line).or_default().push(hit);
    }

    /// Look up a file scope by its full path through the tree.
    #[must_use]
    pub fn file(&self, package: &str, class: &str, method: &str, file: &str) -> Option<&SourceFile> {
        self.packages
            .get(package)?
            .classes
            .get(class)?
            .methods
            .get(method)?
            .files
            .get(file)
    }
}
