#![allow(dead_code)]

use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use kira_isatab::builder::{SheetRef, read_sheet};
use kira_isatab::domain::{Graph, Investigation};
use kira_isatab::investigation::InvestigationReader;
use kira_isatab::tokenizer::QuotePolicy;
use kira_isatab::warning::Warning;

pub fn fixture(path: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

pub fn load_investigation(path: &str) -> (Investigation, Vec<Warning>) {
    load_investigation_at(&fixture(path))
}

pub fn load_investigation_at(path: &Utf8Path) -> (Investigation, Vec<Warning>) {
    let file = File::open(path).unwrap();
    InvestigationReader::new(BufReader::new(file))
        .with_path(path.to_path_buf())
        .read()
        .unwrap()
}

fn sheet_dir(investigation: &Investigation) -> Utf8PathBuf {
    investigation
        .info
        .path
        .as_ref()
        .and_then(|path| path.parent())
        .unwrap()
        .to_path_buf()
}

pub fn load_study(investigation: &Investigation, study: usize) -> (Graph, Vec<Warning>) {
    let info = &investigation.studies[study];
    let path = sheet_dir(investigation).join(info.path().unwrap());
    let file = File::open(&path).unwrap();
    read_sheet(
        investigation,
        info,
        SheetRef::Study,
        BufReader::new(file),
        QuotePolicy::Char('"'),
    )
    .unwrap()
}

pub fn load_assay(
    investigation: &Investigation,
    study: usize,
    assay: usize,
) -> (Graph, Vec<Warning>) {
    let info = &investigation.studies[study];
    let (_, assay_info) = info.assays.get_index(assay).unwrap();
    let path = sheet_dir(investigation).join(&assay_info.path);
    let file = File::open(&path).unwrap();
    read_sheet(
        investigation,
        info,
        SheetRef::Assay(assay_info),
        BufReader::new(file),
        QuotePolicy::Char('"'),
    )
    .unwrap()
}

pub fn messages(warnings: &[Warning]) -> Vec<&str> {
    warnings
        .iter()
        .map(|warning| warning.message.as_str())
        .collect()
}
