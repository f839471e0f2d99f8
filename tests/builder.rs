mod common;

use kira_isatab::builder::GraphBuilder;
use kira_isatab::domain::{AttributeKey, MaterialKind, ProcessNameType, SheetId};
use kira_isatab::schema::SheetSchema;
use kira_isatab::tokenizer::Row;
use kira_isatab::warning::Severity;

use common::{load_assay, load_investigation, load_study};

fn row(line: usize, cells: &[&str]) -> Row {
    Row {
        line,
        cells: cells.iter().map(|cell| cell.to_string()).collect(),
    }
}

#[test]
fn study_sheet_graph() {
    let (investigation, _) = load_investigation("minimal/i_minimal.txt");
    let (graph, warnings) = load_study(&investigation, 0);
    assert!(warnings.is_empty(), "{warnings:?}");

    assert_eq!(graph.sheet, SheetId::study(1));
    assert_eq!(graph.path.as_ref().map(|path| path.as_str()), Some("s_minimal.txt"));
    assert_eq!(graph.materials.len(), 5);
    // identical sample collection applications merge into one process
    assert_eq!(graph.processes.len(), 2);
    assert_eq!(graph.arcs.len(), 5);

    let sample = &graph.materials["S1-sample-name-sample1"];
    assert_eq!(sample.kind, MaterialKind::Sample);
    let dose = sample
        .attribute(&AttributeKey::FactorValue("dose".to_string()))
        .unwrap();
    assert_eq!(dose.value.text, "10");
    assert_eq!(dose.unit.as_ref().map(|unit| unit.text.as_str()), Some("mg"));

    let source = &graph.materials["S1-source-name-source1"];
    let organism = source.characteristics().next().unwrap();
    assert_eq!(organism.value.term_source.as_deref(), Some("NCBITAXON"));

    let process = graph.processes.values().next().unwrap();
    assert_eq!(process.protocol_ref, "sample collection");
    assert_eq!(process.date(), Some("2018-02-02"));
    let temperature = process
        .attribute(&AttributeKey::ParameterValue("storage temperature".to_string()))
        .unwrap();
    let unit = temperature.unit.as_ref().unwrap();
    assert_eq!(unit.text, "degree Celsius");
    assert_eq!(unit.term_source.as_deref(), Some("UO"));
}

#[test]
fn assay_sheet_shares_sample_keys_with_study() {
    let (investigation, _) = load_investigation("minimal/i_minimal.txt");
    let (study, _) = load_study(&investigation, 0);
    let (assay, warnings) = load_assay(&investigation, 0, 0);
    assert!(warnings.is_empty(), "{warnings:?}");

    assert_eq!(assay.sheet, SheetId::assay(1, 1));
    for key in ["S1-sample-name-sample1", "S1-sample-name-sample2", "S1-sample-name-sample3"] {
        assert!(study.materials.contains_key(key));
        assert!(assay.materials.contains_key(key));
    }
    assert!(assay.materials.contains_key("S1-A1-extract-name-extract1"));
    let named = &assay.processes["S1-A1-process-assay-name-assay1"];
    assert_eq!(named.protocol_ref, "sequencing");
    assert_eq!(named.name.as_deref(), Some("assay1"));
    assert_eq!(named.name_type, Some(ProcessNameType::AssayName));
}

#[test]
fn process_without_protocol_ref_is_unknown() {
    let (investigation, _) = load_investigation("small/i_small.txt");
    let (assay, _) = load_assay(&investigation, 0, 0);
    let transformation = &assay.processes["S1-A1-process-data-transformation-name-transformation1"];
    assert!(transformation.has_unknown_protocol());
    assert_eq!(transformation.protocol_ref, "Unknown");
    // both rows lead into the same derived file
    let incoming = assay
        .arcs
        .iter()
        .filter(|arc| arc.head == transformation.key)
        .count();
    assert_eq!(incoming, 2);
}

#[test]
fn empty_cells_and_rows() {
    let schema = SheetSchema::resolve(&["Source Name", "Protocol REF", "Sample Name"]).unwrap();
    let mut builder = GraphBuilder::new(SheetId::study(1), schema);
    builder.add_row(&row(2, &["src", "", "smp"]));
    builder.add_row(&row(3, &["", "", ""]));
    let (graph, warnings) = builder.finish();

    assert_eq!(graph.materials.len(), 2);
    assert!(graph.processes.is_empty());
    assert_eq!(graph.arcs.len(), 1);
    assert_eq!(graph.arcs[0].tail, "S1-source-name-src");
    assert_eq!(graph.arcs[0].head, "S1-sample-name-smp");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Parse);
    assert_eq!(warnings[0].message, "Line 3: row defines no nodes, skipping");
}

#[test]
fn conflicting_attribute_keeps_first_value() {
    let schema = SheetSchema::resolve(&["Source Name", "Characteristics[organism]", "Sample Name"])
        .unwrap();
    let mut builder = GraphBuilder::new(SheetId::study(1), schema);
    builder.add_row(&row(2, &["src", "Homo sapiens", "s1"]));
    builder.add_row(&row(3, &["src", "", "s2"]));
    builder.add_row(&row(4, &["src", "Mus musculus", "s3"]));
    let (graph, warnings) = builder.finish();

    let source = &graph.materials["S1-source-name-src"];
    assert_eq!(source.attributes.len(), 1);
    assert_eq!(source.attributes[0].value.text, "Homo sapiens");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.starts_with("Line 4: conflicting Characteristics[organism]"));
}

#[test]
fn discovery_order_is_row_major() {
    let (investigation, _) = load_investigation("minimal/i_minimal.txt");
    let (graph, _) = load_study(&investigation, 0);
    let keys: Vec<_> = graph.nodes().iter().map(|node| node.key().to_string()).collect();
    assert_eq!(keys[0], "S1-source-name-source1");
    assert_eq!(keys[2], "S1-sample-name-sample1");
    assert_eq!(keys[3], "S1-sample-name-sample2");
    assert_eq!(keys[4], "S1-source-name-source2");
}

#[test]
fn applications_differing_only_by_unit_stay_apart() {
    let schema = SheetSchema::resolve(&[
        "Source Name",
        "Protocol REF",
        "Parameter Value[temperature]",
        "Unit",
        "Sample Name",
    ])
    .unwrap();
    let mut builder = GraphBuilder::new(SheetId::study(1), schema);
    builder.add_row(&row(2, &["src", "incubation", "37", "celsius", "s1"]));
    builder.add_row(&row(3, &["src", "incubation", "37", "fahrenheit", "s2"]));
    let (graph, warnings) = builder.finish();

    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(graph.processes.len(), 2);
    let units: Vec<_> = graph
        .processes
        .values()
        .map(|process| {
            process
                .attribute(&AttributeKey::ParameterValue("temperature".to_string()))
                .and_then(|attribute| attribute.unit.as_ref())
                .map(|unit| unit.text.clone())
        })
        .collect();
    assert_eq!(
        units,
        [Some("celsius".to_string()), Some("fahrenheit".to_string())]
    );
}

#[test]
fn every_arc_of_every_fixture_sheet_resolves() {
    for investigation_file in [
        "minimal/i_minimal.txt",
        "small/i_small.txt",
        "gelelect/i_gelelect.txt",
    ] {
        let (investigation, _) = load_investigation(investigation_file);
        let (study, _) = load_study(&investigation, 0);
        let (assay, _) = load_assay(&investigation, 0, 0);
        for graph in [&study, &assay] {
            assert!(graph.dangling_arc().is_none(), "{investigation_file}");
            for arc in &graph.arcs {
                assert!(graph.contains(&arc.tail) && graph.contains(&arc.head));
            }
        }
    }
}
