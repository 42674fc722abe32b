//! Cobertura XML output for a [`CoverageTree`].
//!
//! Output structure:
//!   <coverage line-rate=".." branch-rate=".." version=".." timestamp="..">
//!     <sources><source>/path/to/root</source></sources>
//!     <packages>
//!       <package name=".." line-rate=".." branch-rate="..">
//!         <classes>
//!           <class name=".." filename=".." line-rate=".." branch-rate="..">
//!             <methods>
//!               <method name=".." signature=".." line-rate=".." branch-rate="..">
//!                 <lines><line number=".." hits=".." branch=".."/></lines>
//!               </method>
//!             </methods>
//!             <lines>..</lines>
//!           </class>
//!         </classes>
//!       </package>
//!     </packages>
//!   </coverage>
//!
//! The document is streamed once through an indenting writer, so the output
//! is already pretty-printed and byte-stable for a given tree and options.
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::model::{Class, Counts, CoverageTree, Line, Method, UNKNOWN_LINE};

/// Settings that do not come from the tree itself.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub version: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Entries for the `<sources>` block.
    pub sources: Vec<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            sources: Vec::new(),
        }
    }
}

/// Per-line data needed for a `<line>` element.
#[derive(Debug, Clone, Copy, Default)]
struct LineStats {
    hit: bool,
    synthetic: bool,
    /// Counts of the constituent lines that are branches themselves.
    branch: Option<Counts>,
}

impl LineStats {
    fn from_line(line: &Line) -> Self {
        Self {
            hit: line.is_hit(),
            synthetic: line.is_synthetic(),
            branch: line.is_branch().then(|| *line.counts()),
        }
    }

    /// Fold another method's line with the same number into this one.
    /// Recorded lines replace synthetic ones, and synthetic lines never
    /// change a recorded verdict.
    fn merge(&mut self, other: LineStats) {
        match (self.synthetic, other.synthetic) {
            (true, false) => *self = other,
            (false, true) => {}
            _ => {
                self.hit |= other.hit;
                self.branch = match (self.branch, other.branch) {
                    (Some(mut mine), Some(theirs)) => {
                        mine.absorb(&theirs);
                        Some(mine)
                    }
                    (mine, theirs) => mine.or(theirs),
                };
            }
        }
    }
}

/// Writes a [`CoverageTree`] as a Cobertura document.
#[derive(Debug, Clone, Default)]
pub struct CoberturaWriter {
    options: ReportOptions,
}

impl CoberturaWriter {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Render the report into a string.
    pub fn render(&self, tree: &CoverageTree) -> Result<String> {
        let mut buf = Vec::new();
        self.write(tree, &mut buf)?;
        // Every byte written came from &str values.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Stream the report into `out`.
    pub fn write<W: Write>(&self, tree: &CoverageTree, out: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let counts = tree.counts();
        let timestamp = self.options.timestamp.to_string();
        let lines_covered = counts.line_hit.to_string();
        let lines_valid = counts.line_total.to_string();
        let branches_covered = counts.branch_hit.to_string();
        let branches_valid = counts.branch_total.to_string();
        let mut root = BytesStart::new("coverage");
        push_rates(&mut root, counts);
        root.push_attribute(("lines-covered", lines_covered.as_str()));
        root.push_attribute(("lines-valid", lines_valid.as_str()));
        root.push_attribute(("branches-covered", branches_covered.as_str()));
        root.push_attribute(("branches-valid", branches_valid.as_str()));
        root.push_attribute(("version", self.options.version.as_str()));
        root.push_attribute(("timestamp", timestamp.as_str()));
        writer.write_event(Event::Start(root))?;

        writer.write_event(Event::Start(BytesStart::new("sources")))?;
        for source in &self.options.sources {
            writer.write_event(Event::Start(BytesStart::new("source")))?;
            writer.write_event(Event::Text(BytesText::new(source)))?;
            writer.write_event(Event::End(BytesEnd::new("source")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("sources")))?;

        writer.write_event(Event::Start(BytesStart::new("packages")))?;
        for (package_name, package) in tree.packages().iter() {
            let mut elem = BytesStart::new("package");
            elem.push_attribute(("name", package_name.as_str()));
            push_rates(&mut elem, package.counts());
            writer.write_event(Event::Start(elem))?;

            writer.write_event(Event::Start(BytesStart::new("classes")))?;
            for (class_name, class) in package.classes().iter() {
                write_class(&mut writer, class_name, class)?;
            }
            writer.write_event(Event::End(BytesEnd::new("classes")))?;

            writer.write_event(Event::End(BytesEnd::new("package")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("packages")))?;

        writer.write_event(Event::End(BytesEnd::new("coverage")))?;
        writer.get_mut().write_all(b"\n")?;
        writer.get_mut().flush()?;
        Ok(())
    }
}

fn write_class<W: Write>(writer: &mut Writer<W>, name: &str, class: &Class) -> Result<()> {
    let filename = class.filename();
    let mut elem = BytesStart::new("class");
    elem.push_attribute(("name", name));
    elem.push_attribute(("filename", filename));
    push_rates(&mut elem, class.counts());
    writer.write_event(Event::Start(elem))?;

    writer.write_event(Event::Start(BytesStart::new("methods")))?;
    for (method_key, method) in class.methods().iter() {
        write_method(writer, method_key, method)?;
    }
    writer.write_event(Event::End(BytesEnd::new("methods")))?;

    // Class-level lines: every method's lines in the class's reported file,
    // merged by line number.
    let mut merged: BTreeMap<i64, LineStats> = BTreeMap::new();
    for method in class.methods().values() {
        if let Some(file) = method.files().get(filename) {
            for (&number, line) in file.lines() {
                let stats = LineStats::from_line(line);
                match merged.entry(number) {
                    Entry::Vacant(slot) => {
                        slot.insert(stats);
                    }
                    Entry::Occupied(mut slot) => slot.get_mut().merge(stats),
                }
            }
        }
    }
    write_lines(writer, merged.into_iter())?;

    writer.write_event(Event::End(BytesEnd::new("class")))?;
    Ok(())
}

fn write_method<W: Write>(writer: &mut Writer<W>, key: &str, method: &Method) -> Result<()> {
    let (name, signature) = split_method_key(key);
    let mut elem = BytesStart::new("method");
    elem.push_attribute(("name", name));
    elem.push_attribute(("signature", signature));
    push_rates(&mut elem, method.counts());
    writer.write_event(Event::Start(elem))?;

    // One run of ascending line numbers per source file, in first-seen file
    // order. A method spanning several files can repeat a number across runs.
    let lines = method.files().values().flat_map(|file| {
        file.lines()
            .iter()
            .map(|(&number, line)| (number, LineStats::from_line(line)))
    });
    write_lines(writer, lines)?;

    writer.write_event(Event::End(BytesEnd::new("method")))?;
    Ok(())
}

fn write_lines<W: Write>(
    writer: &mut Writer<W>,
    lines: impl Iterator<Item = (i64, LineStats)>,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("lines")))?;
    for (number, stats) in lines.filter(|(n, _)| *n != UNKNOWN_LINE) {
        let number = number.to_string();
        let hits = if stats.hit { "1" } else { "0" };
        let mut elem = BytesStart::new("line");
        elem.push_attribute(("number", number.as_str()));
        elem.push_attribute(("hits", hits));
        match stats.branch {
            Some(counts) => {
                let condition = condition_coverage(&counts);
                elem.push_attribute(("branch", "true"));
                elem.push_attribute(("condition-coverage", condition.as_str()));
            }
            None => elem.push_attribute(("branch", "false")),
        }
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("lines")))?;
    Ok(())
}

fn push_rates(elem: &mut BytesStart<'_>, counts: &Counts) {
    let line_rate = counts.line_rate();
    let branch_rate = counts.branch_rate();
    elem.push_attribute(("line-rate", line_rate.as_str()));
    elem.push_attribute(("branch-rate", branch_rate.as_str()));
}

/// `"{percent}% ({hit}/{total})"` with the percentage truncated.
#[must_use]
pub fn condition_coverage(counts: &Counts) -> String {
    let percent = if counts.branch_total == 0 {
        0
    } else {
        100 * counts.branch_hit / counts.branch_total
    };
    format!("{}% ({}/{})", percent, counts.branch_hit, counts.branch_total)
}

/// Split a method key like `Add(System.Int32)` into its bare name and
/// parameter list.
#[must_use]
pub fn split_method_key(key: &str) -> (&str, &str) {
    match key.find('(') {
        Some(idx) => (&key[..idx], &key[idx..]),
        None => (key, ""),
    }
}
