#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::str;

use hitcov::model::{Counts, CoverageTree};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tempfile::TempDir;

/// Write `content` as a hit-record file in a fresh temp dir.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn write_hits(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hits.txt");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn sum<'a>(children: impl Iterator<Item = &'a Counts>) -> Counts {
    let mut total = Counts::default();
    for c in children {
        total.absorb(c);
    }
    total
}

fn assert_bounded(counts: &Counts, what: &str) {
    assert!(counts.line_hit <= counts.line_total, "{what}: line hit > total");
    assert!(counts.branch_hit <= counts.branch_total, "{what}: branch hit > total");
}

/// Every level's counts equal the sum of its children and never exceed
/// their totals.
pub fn assert_invariants(tree: &CoverageTree) {
    assert_bounded(tree.counts(), "root");
    assert_eq!(
        *tree.counts(),
        sum(tree.packages().values().map(|p| p.counts())),
        "root"
    );
    for (pn, package) in tree.packages().iter() {
        assert_bounded(package.counts(), pn);
        assert_eq!(
            *package.counts(),
            sum(package.classes().values().map(|c| c.counts())),
            "package {pn}"
        );
        for (cn, class) in package.classes().iter() {
            assert_bounded(class.counts(), cn);
            assert_eq!(
                *class.counts(),
                sum(class.methods().values().map(|m| m.counts())),
                "class {cn}"
            );
            for (mn, method) in class.methods().iter() {
                assert_bounded(method.counts(), mn);
                assert_eq!(
                    *method.counts(),
                    sum(method.files().values().map(|f| f.counts())),
                    "method {mn}"
                );
                for (fname, file) in method.files().iter() {
                    assert_bounded(file.counts(), fname);
                    assert_eq!(
                        *file.counts(),
                        sum(file.lines().values().map(|l| l.counts())),
                        "file {fname}"
                    );
                    for (n, line) in file.lines() {
                        assert_bounded(line.counts(), "line");
                        assert_eq!(
                            line.counts().line_total,
                            line.instructions().len() as u64,
                            "line {n}"
                        );
                    }
                }
            }
        }
    }
}

/// Attributes of one element in a written report.
pub type Attrs = HashMap<String, String>;

/// Collect the attributes of every element named `name`, in document order.
pub fn elements(xml: &str, name: &str) -> Vec<Attrs> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut found = Vec::new();
    loop {
        match reader.read_event() {
            Err(e) => panic!("invalid XML: {e}"),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == name.as_bytes() {
                    found.push(attr_map(e));
                }
            }
            _ => {}
        }
    }
    found
}

/// `<line>` elements inside `<method>` blocks only.
pub fn method_lines(xml: &str) -> Vec<Attrs> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_method = false;
    let mut found = Vec::new();
    loop {
        match reader.read_event() {
            Err(e) => panic!("invalid XML: {e}"),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"method" => in_method = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"method" => in_method = false,
            Ok(Event::Empty(ref e)) if in_method && e.name().as_ref() == b"line" => {
                found.push(attr_map(e));
            }
            _ => {}
        }
    }
    found
}

fn attr_map(e: &quick_xml::events::BytesStart) -> Attrs {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}

/// `<line>` elements of one `<class>`: those inside its methods, and its own
/// class-level block.
#[derive(Debug, Default)]
pub struct ClassLines {
    pub methods: Vec<Attrs>,
    pub class: Vec<Attrs>,
}

/// Collect [`ClassLines`] for every class, in document order.
pub fn class_lines(xml: &str) -> Vec<ClassLines> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_method = false;
    let mut found: Vec<ClassLines> = Vec::new();
    loop {
        match reader.read_event() {
            Err(e) => panic!("invalid XML: {e}"),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"class" => {
                found.push(ClassLines::default());
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"method" => in_method = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"method" => in_method = false,
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"line" => {
                let class = found.last_mut().expect("<line> outside <class>");
                if in_method {
                    class.methods.push(attr_map(e));
                } else {
                    class.class.push(attr_map(e));
                }
            }
            _ => {}
        }
    }
    found
}
