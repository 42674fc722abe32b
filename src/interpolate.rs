//! Gap filling for source lines that produced no instructions.
//!
//! Structural lines (closing braces, continuations) never show up in the hit
//! records, but coverage consumers expect a verdict for every line between
//! the first and last instrumented line of a method. Each gap between two
//! recorded lines of a file scope takes the verdict of the recorded line just
//! before it.
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::model::{Counts, CoverageTree, SourceFile, HIT_LINE, MISS_LINE, UNKNOWN_LINE};

impl CoverageTree {
    /// Fill line gaps in every method/file scope and fold the synthetic
    /// lines into the counters of every enclosing level. Recorded lines are
    /// never modified. Returns the number of lines added.
    pub fn interpolate(&mut self) -> u64 {
        let mut tree_delta = Counts::default();

        for (package_name, package) in self.packages.iter_mut() {
            let mut package_delta = Counts::default();
            for (class_name, class) in package.classes.iter_mut() {
                let mut class_delta = Counts::default();
                for (method_name, method) in class.methods.iter_mut() {
                    let mut method_delta = Counts::default();
                    for (file_name, file) in method.files.iter_mut() {
                        let delta = fill_gaps(file);
                        if delta.line_total > 0 {
                            debug!(
                                package = package_name,
                                class = class_name,
                                method = method_name,
                                file = file_name,
                                added = delta.line_total,
                                "interpolated missing lines"
                            );
                        }
                        method_delta.absorb(&delta);
                    }
                    method.counts.absorb(&method_delta);
                    class_delta.absorb(&method_delta);
                }
                class.counts.absorb(&class_delta);
                package_delta.absorb(&class_delta);
            }
            package.counts.absorb(&package_delta);
            tree_delta.absorb(&package_delta);
        }

        self.counts.absorb(&tree_delta);
        tree_delta.line_total
    }
}

/// Fill the gaps of one file scope, returning the counts that were added.
fn fill_gaps(file: &mut SourceFile) -> Counts {
    let mut added = Counts::default();

    // BTreeMap keys are ascending; walk them from the highest line down.
    let mut known: Vec<i64> = file
        .lines
        .keys()
        .copied()
        .filter(|&n| n != UNKNOWN_LINE)
        .collect();
    if known.is_empty() {
        return added;
    }
    known.reverse();

    let highest = known[0];
    let lowest = known[known.len() - 1];
    let Some(span) = highest.checked_sub(lowest) else {
        debug!(highest, lowest, "line span out of range, not interpolating");
        return added;
    };
    if span == known.len() as i64 - 1 {
        return added;
    }

    for pair in known.windows(2) {
        let (this_line, next_line) = (pair[0], pair[1]);
        if this_line - next_line < 2 {
            continue;
        }
        let template = match file.lines.get(&next_line) {
            Some(line) if line.is_hit() => &HIT_LINE,
            _ => &MISS_LINE,
        };
        for number in next_line + 1..this_line {
            if number == UNKNOWN_LINE {
                continue;
            }
            if let Entry::Vacant(slot) = file.lines.entry(number) {
                slot.insert(template.clone());
                added.absorb(template.counts());
            }
        }
    }

    file.counts.absorb(&added);
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::HitRecord;

    fn save(tree: &mut CoverageTree, hit: bool, method: &str, file: &str, line: i64) {
        tree.save(&HitRecord {
            hit,
            package: "Asm".to_string(),
            class: "N.C".to_string(),
            method: method.to_string(),
            file: file.to_string(),
            line,
        });
    }

    #[test]
    fn test_contiguous_lines_unchanged() {
        let mut tree = CoverageTree::new();
        for line in [10, 11, 12] {
            save(&mut tree, line != 11, "M()", "a.cs", line);
        }
        let before = *tree.counts();
        assert_eq!(tree.interpolate(), 0);
        assert_eq!(*tree.counts(), before);
        assert_eq!(tree.file("Asm", "N.C", "M()", "a.cs").unwrap().lines().len(), 3);
    }

    #[test]
    fn test_gap_takes_preceding_line_verdict() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "M()", "a.cs", 10);
        save(&mut tree, false, "M()", "a.cs", 15);

        assert_eq!(tree.interpolate(), 4);

        let file = tree.file("Asm", "N.C", "M()", "a.cs").unwrap();
        for n in 11..=14 {
            let line = file.line(n).unwrap();
            assert!(line.is_hit(), "line {n} should be hit");
            assert_eq!(line.instructions().len(), 1);
        }
        assert!(!file.line(15).unwrap().is_hit());
        assert_eq!(file.counts().line_total, 6);
        assert_eq!(file.counts().line_hit, 5);
        assert_eq!(tree.counts().line_total, 6);
        assert_eq!(tree.counts().branch_hit, 5);
    }

    #[test]
    fn test_gap_after_miss_is_miss() {
        let mut tree = CoverageTree::new();
        save(&mut tree, false, "M()", "a.cs", 3);
        save(&mut tree, true, "M()", "a.cs", 6);
        tree.interpolate();

        let file = tree.file("Asm", "N.C", "M()", "a.cs").unwrap();
        assert!(!file.line(4).unwrap().is_hit());
        assert!(!file.line(5).unwrap().is_hit());
        assert_eq!(file.counts().line_hit, 1);
    }

    #[test]
    fn test_unknown_line_is_ignored() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "M()", "a.cs", UNKNOWN_LINE);
        save(&mut tree, true, "M()", "a.cs", 4);
        assert_eq!(tree.interpolate(), 0);

        let file = tree.file("Asm", "N.C", "M()", "a.cs").unwrap();
        assert!(file.line(0).is_none());
        assert_eq!(file.counts().line_total, 2);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "A()", "a.cs", 1);
        save(&mut tree, true, "B()", "a.cs", 5);
        assert_eq!(tree.interpolate(), 0);

        save(&mut tree, true, "A()", "b.cs", 20);
        save(&mut tree, true, "A()", "b.cs", 22);
        assert_eq!(tree.interpolate(), 1);
        let method = tree
            .packages()
            .get("Asm")
            .unwrap()
            .classes()
            .get("N.C")
            .unwrap()
            .methods()
            .get("A()")
            .unwrap();
        assert_eq!(method.counts().line_total, 4);
    }

    #[test]
    fn test_recorded_branch_lines_untouched() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "M()", "a.cs", 1);
        save(&mut tree, false, "M()", "a.cs", 1);
        save(&mut tree, false, "M()", "a.cs", 4);
        tree.interpolate();

        let file = tree.file("Asm", "N.C", "M()", "a.cs").unwrap();
        assert_eq!(file.line(1).unwrap().instructions().len(), 2);
        assert!(file.line(2).unwrap().is_hit());
        assert!(file.line(3).unwrap().is_hit());
        assert!(!file.line(2).unwrap().is_branch());
    }

    #[test]
    fn test_gap_across_unknown_line_keeps_it() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "M()", "a.cs", UNKNOWN_LINE);
        save(&mut tree, true, "M()", "a.cs", UNKNOWN_LINE);
        save(&mut tree, false, "M()", "a.cs", -3);
        save(&mut tree, false, "M()", "a.cs", 2);

        // -2, 0 and 1 are filled; -1 stays the recorded unknown line.
        assert_eq!(tree.interpolate(), 3);

        let file = tree.file("Asm", "N.C", "M()", "a.cs").unwrap();
        let unknown = file.line(UNKNOWN_LINE).unwrap();
        assert_eq!(unknown.instructions().len(), 2);
        assert!(!unknown.is_synthetic());
        assert!(file.line(0).unwrap().is_synthetic());

        let sum: u64 = file.lines().values().map(|l| l.counts().line_total).sum();
        assert_eq!(file.counts().line_total, sum);
        assert_eq!(file.counts().line_total, 7);
        assert_eq!(file.counts().line_hit, 2);
    }

    #[test]
    fn test_unrepresentable_span_is_skipped() {
        let mut tree = CoverageTree::new();
        save(&mut tree, true, "M()", "a.cs", i64::MIN);
        save(&mut tree, true, "M()", "a.cs", i64::MAX);
        assert_eq!(tree.interpolate(), 0);
        assert_eq!(tree.counts().line_total, 2);
    }
}
