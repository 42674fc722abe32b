//! Condensed per-method view of a coverage tree, for terminals and scripts.
use std::fmt::Write;

use serde::Serialize;

use crate::error::Result;
use crate::model::CoverageTree;

/// Totals for the whole run plus one row per method.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageSummary {
    pub lines_valid: u64,
    pub lines_covered: u64,
    pub line_rate: String,
    pub branch_rate: String,
    pub methods: Vec<MethodSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    pub package: String,
    pub class: String,
    pub method: String,
    pub lines_valid: u64,
    pub lines_covered: u64,
    pub line_rate: String,
}

impl CoverageSummary {
    pub fn from_tree(tree: &CoverageTree) -> Self {
        let mut methods = Vec::new();
        for (package_name, package) in tree.packages().iter() {
            for (class_name, class) in package.classes().iter() {
                for (method_name, method) in class.methods().iter() {
                    let counts = method.counts();
                    methods.push(MethodSummary {
                        package: package_name.to_string(),
                        class: class_name.to_string(),
                        method: method_name.to_string(),
                        lines_valid: counts.line_total,
                        lines_covered: counts.line_hit,
                        line_rate: counts.line_rate(),
                    });
                }
            }
        }

        let counts = tree.counts();
        Self {
            lines_valid: counts.line_total,
            lines_covered: counts.line_hit,
            line_rate: counts.line_rate(),
            branch_rate: counts.branch_rate(),
            methods,
        }
    }

    /// Methods that have at least one missed line.
    fn uncovered(&self) -> impl Iterator<Item = &MethodSummary> {
        self.methods
            .iter()
            .filter(|m| m.lines_covered < m.lines_valid)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let pct = |covered: u64, valid: u64| -> f64 {
            if valid == 0 {
                0.0
            } else {
                covered as f64 / valid as f64 * 100.0
            }
        };

        writeln!(
            out,
            "Lines:      {}/{} ({:.1}%)",
            self.lines_covered,
            self.lines_valid,
            pct(self.lines_covered, self.lines_valid)
        )
        .unwrap();
        writeln!(out, "Methods:    {}", self.methods.len()).unwrap();

        if self.methods.is_empty() {
            return out;
        }

        out.push('\n');
        writeln!(out, "{:<60} {:>8} {:>8} {:>8}", "METHOD", "LINES", "COVERED", "RATE").unwrap();
        writeln!(out, "{}", "-".repeat(88)).unwrap();
        for m in &self.methods {
            let name = format!("{}::{}", m.class, m.method);
            writeln!(
                out,
                "{:<60} {:>8} {:>8} {:>7.1}%",
                name,
                m.lines_valid,
                m.lines_covered,
                pct(m.lines_covered, m.lines_valid)
            )
            .unwrap();
        }

        let uncovered: Vec<_> = self.uncovered().collect();
        if !uncovered.is_empty() {
            out.push('\n');
            writeln!(out, "Uncovered lines in {} method(s):", uncovered.len()).unwrap();
            for m in uncovered {
                writeln!(
                    out,
                    "  {}::{} ({} missed)",
                    m.class,
                    m.method,
                    m.lines_valid - m.lines_covered
                )
                .unwrap();
            }
        }
        out
    }
}
