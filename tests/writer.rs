mod common;

use std::collections::HashSet;
use std::fs;

use assert_matches::assert_matches;
use kira_isatab::builder::{SheetRef, read_sheet};
use kira_isatab::domain::{
    Annotated, Arc, Attribute, AttributeKey, Graph, Investigation, Material, MaterialKind, Process,
    SheetId,
};
use kira_isatab::error::IsaError;
use kira_isatab::tokenizer::QuotePolicy;
use kira_isatab::writer::{SheetWriter, write_sheet};

use common::{fixture, load_assay, load_investigation, load_study};

fn render(graph: &Graph, quote: QuotePolicy) -> String {
    let mut out = Vec::new();
    write_sheet(graph, &mut out, quote).unwrap();
    String::from_utf8(out).unwrap()
}

fn reread(investigation: &Investigation, graph: &Graph, text: &str, quote: QuotePolicy) -> Graph {
    let study = &investigation.studies[graph.sheet.study - 1];
    let sheet = match graph.sheet.assay {
        Some(assay) => SheetRef::Assay(study.assays.get_index(assay - 1).unwrap().1),
        None => SheetRef::Study,
    };
    let (graph, warnings) = read_sheet(investigation, study, sheet, text.as_bytes(), quote).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    graph
}

fn arc_set(graph: &Graph) -> HashSet<&Arc> {
    graph.arcs.iter().collect()
}

fn assert_same_graph(left: &Graph, right: &Graph) {
    assert_eq!(left.materials, right.materials);
    assert_eq!(left.processes, right.processes);
    assert_eq!(arc_set(left), arc_set(right));
    assert_eq!(left.arcs.len(), right.arcs.len());
}

#[test]
fn sheets_are_reproduced_verbatim() {
    let (investigation, _) = load_investigation("minimal/i_minimal.txt");
    let (study, _) = load_study(&investigation, 0);
    let (assay, _) = load_assay(&investigation, 0, 0);

    let original = fs::read_to_string(fixture("minimal/s_minimal.txt")).unwrap();
    assert_eq!(render(&study, QuotePolicy::None), original);
    let original = fs::read_to_string(fixture("minimal/a_minimal.txt")).unwrap();
    assert_eq!(render(&assay, QuotePolicy::None), original);
}

#[test]
fn round_trip_preserves_the_graph() {
    for (path, assays) in [
        ("minimal/i_minimal.txt", 1),
        ("small/i_small.txt", 1),
        ("gelelect/i_gelelect.txt", 1),
    ] {
        let (investigation, _) = load_investigation(path);
        let (study, _) = load_study(&investigation, 0);
        let mut graphs = vec![study];
        for idx in 0..assays {
            graphs.push(load_assay(&investigation, 0, idx).0);
        }
        for graph in &graphs {
            for quote in [QuotePolicy::None, QuotePolicy::Char('"')] {
                let text = render(graph, quote);
                let again = reread(&investigation, graph, &text, quote);
                assert_same_graph(graph, &again);
            }
        }
    }
}

#[test]
fn writing_is_idempotent() {
    let (investigation, _) = load_investigation("small/i_small.txt");
    let (assay, _) = load_assay(&investigation, 0, 0);
    let first = render(&assay, QuotePolicy::Char('"'));
    let second = render(
        &reread(&investigation, &assay, &first, QuotePolicy::Char('"')),
        QuotePolicy::Char('"'),
    );
    assert_eq!(first, second);
}

#[test]
fn every_cell_is_quoted_uniformly() {
    let (investigation, _) = load_investigation("gelelect/i_gelelect.txt");
    let (study, _) = load_study(&investigation, 0);
    let text = render(&study, QuotePolicy::Char('"'));
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("\"Source Name\"\t\"Characteristics[organism]\"\t\"Term Source REF\"\t\"Term Accession Number\"\t\"Protocol REF\"\t\"Sample Name\"")
    );
    assert_eq!(
        lines.next(),
        Some("\"culture1\"\t\"Escherichia coli\"\t\"\"\t\"\"\t\"sample collection\"\t\"culture1 sample\"")
    );
}

fn hand_built() -> Graph {
    let sheet = SheetId::study(1);
    let mut graph = Graph::new(sheet);
    let mut source = Material::new(
        sheet.material_key(MaterialKind::Source, "mouse"),
        "mouse",
        MaterialKind::Source,
    );
    source.attributes.push(Attribute::new(
        AttributeKey::Characteristic("organism".to_string()),
        Annotated::term("Mus musculus", "NCBITAXON", "10090"),
    ));
    let mut sample = Material::new(
        sheet.material_key(MaterialKind::Sample, "liver"),
        "liver",
        MaterialKind::Sample,
    );
    sample.attributes.push(Attribute {
        key: AttributeKey::FactorValue("dose".to_string()),
        value: Annotated::text("5"),
        unit: Some(Annotated::term("milligram", "UO", "UO_0000022")),
    });
    let process = Process::new("S1-dissection", "dissection");
    graph.add_material(source);
    graph.add_process(process);
    graph.add_material(sample);
    graph.add_arc("S1-source-name-mouse", "S1-dissection");
    graph.add_arc("S1-dissection", "S1-sample-name-liver");
    graph
}

#[test]
fn graphs_without_schema_get_a_canonical_header() {
    let graph = hand_built();
    let text = render(&graph, QuotePolicy::None);
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Source Name\tCharacteristics[organism]\tTerm Source REF\tTerm Accession Number\tProtocol REF\tSample Name\tFactor Value[dose]\tUnit\tTerm Source REF\tTerm Accession Number")
    );
    assert_eq!(
        lines.next(),
        Some("mouse\tMus musculus\tNCBITAXON\t10090\tdissection\tliver\t5\tmilligram\tUO\tUO_0000022")
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn unquoted_output_rejects_tabs_in_cells() {
    let mut graph = hand_built();
    graph.add_material(Material::new("S1-sample-name-a\tb", "a\tb", MaterialKind::Sample));
    let mut out = Vec::new();
    assert_matches!(
        write_sheet(&graph, &mut out, QuotePolicy::None),
        Err(IsaError::UnwritableCell(cell)) if cell == "a\tb"
    );
    let mut out = Vec::new();
    SheetWriter::new(&graph, QuotePolicy::Char('"'))
        .write(&mut out)
        .unwrap();
    assert!(String::from_utf8(out).unwrap().contains("\"a\tb\""));
}

#[test]
fn dangling_arc_is_rejected_before_writing() {
    let mut graph = hand_built();
    graph.add_arc("S1-sample-name-liver", "S1-sample-name-nowhere");
    let mut out = Vec::new();
    assert_matches!(
        write_sheet(&graph, &mut out, QuotePolicy::None),
        Err(IsaError::DanglingArc { head, .. }) if head == "S1-sample-name-nowhere"
    );
    assert!(out.is_empty());
}
