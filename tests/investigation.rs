mod common;

use assert_matches::assert_matches;
use kira_isatab::error::IsaError;
use kira_isatab::investigation::read_investigation;
use kira_isatab::warning::Severity;

use common::{fixture, load_investigation, messages};

#[test]
fn reads_all_sections() {
    let (investigation, warnings) = load_investigation("minimal/i_minimal.txt");
    assert!(warnings.is_empty(), "{warnings:?}");

    assert_eq!(investigation.info.identifier, "i_minimal");
    assert_eq!(investigation.info.title, "Minimal investigation");
    assert_eq!(investigation.info.path, Some(fixture("minimal/i_minimal.txt")));
    assert_eq!(investigation.info.comments.len(), 1);
    assert_eq!(investigation.info.comments[0].name, "Created With Configuration");
    assert_eq!(
        investigation.ontology_sources.keys().collect::<Vec<_>>(),
        ["NCBITAXON", "OBI", "UO"]
    );
    assert_eq!(investigation.contacts.len(), 1);
    assert_eq!(investigation.contacts[0].last_name, "Doe");
    assert!(investigation.publications.is_empty());

    let study = &investigation.studies[0];
    assert_eq!(study.info.identifier, "s_minimal");
    assert_eq!(study.path().map(|path| path.as_str()), Some("s_minimal.txt"));
    assert_eq!(study.designs.len(), 1);
    assert_eq!(study.designs[0].term_source.as_deref(), Some("OBI"));
    assert_eq!(study.factors.keys().collect::<Vec<_>>(), ["dose"]);

    let assay = &study.assays["a_minimal.txt"];
    assert_eq!(assay.measurement_type.text, "transcription profiling");
    assert_eq!(assay.technology_type.text, "nucleotide sequencing");
    assert_eq!(assay.technology_type.term_source, None);
    assert_eq!(assay.platform, "Illumina HiSeq 2000");

    assert_eq!(
        study.protocols.keys().collect::<Vec<_>>(),
        ["sample collection", "nucleic acid extraction", "sequencing"]
    );
    let collection = &study.protocols["sample collection"];
    assert_eq!(
        collection.parameters.keys().collect::<Vec<_>>(),
        ["instrument", "storage temperature"]
    );
    assert!(study.protocols["nucleic acid extraction"].parameters.is_empty());
    assert_eq!(study.protocols["sequencing"].protocol_type.text, "nucleic acid sequencing");
}

#[test]
fn empty_ontology_source_is_skipped_with_parse_warning() {
    let (investigation, warnings) = load_investigation("gelelect/i_gelelect.txt");
    assert_eq!(investigation.ontology_sources.len(), 1);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Parse);
    assert_eq!(messages(&warnings), ["Skipping empty ontology source: , , , "]);
    assert_eq!(investigation.studies[0].info.title, "");
}

#[test]
fn duplicate_ontology_source_keeps_the_first() {
    let input = "ONTOLOGY SOURCE REFERENCE\n\
                 Term Source Name\tOBI\tOBI\n\
                 Term Source File\tobi.owl\tother.owl\n\
                 INVESTIGATION\n\
                 Investigation Identifier\ti1\n";
    let (investigation, warnings) = read_investigation(input.as_bytes()).unwrap();
    assert_eq!(investigation.ontology_sources["OBI"].file, "obi.owl");
    assert_eq!(messages(&warnings), ["Skipping duplicate ontology source: OBI"]);
}

#[test]
fn comment_lines_and_quoted_values() {
    let input = "# exported by hand\n\
                 INVESTIGATION\n\
                 \"Investigation Identifier\"\t\"i1\"\n\
                 Investigation Title\t\"Title with \"\"quotes\"\"\"\n";
    let (investigation, _) = read_investigation(input.as_bytes()).unwrap();
    assert_eq!(investigation.info.identifier, "i1");
    assert_eq!(investigation.info.title, "Title with \"quotes\"");
}

#[test]
fn unknown_row_label_is_structural() {
    let input = "INVESTIGATION\nInvestigation Colour\tblue\n";
    assert_matches!(
        read_investigation(input.as_bytes()),
        Err(IsaError::InvalidInvestigation { line: 2, .. })
    );
}

#[test]
fn rows_before_any_section_are_structural() {
    let input = "Investigation Identifier\ti1\nINVESTIGATION\n";
    assert_matches!(
        read_investigation(input.as_bytes()),
        Err(IsaError::InvalidInvestigation { line: 1, .. })
    );
}

#[test]
fn study_sections_need_a_study() {
    let input = "INVESTIGATION\nInvestigation Identifier\ti1\nSTUDY FACTORS\nStudy Factor Name\tdose\n";
    assert_matches!(
        read_investigation(input.as_bytes()),
        Err(IsaError::InvalidInvestigation { line: 3, .. })
    );
}

#[test]
fn blank_protocol_column_is_skipped() {
    let input = "INVESTIGATION\n\
                 Investigation Identifier\ti1\n\
                 STUDY\n\
                 Study Identifier\ts1\n\
                 Study File Name\ts_1.txt\n\
                 STUDY PROTOCOLS\n\
                 Study Protocol Name\tp1\t\tp2\n\
                 Study Protocol Type\tt1\t\tt2\n";
    let (investigation, warnings) = read_investigation(input.as_bytes()).unwrap();
    assert_eq!(
        investigation.studies[0].protocols.keys().collect::<Vec<_>>(),
        ["p1", "p2"]
    );
    assert_eq!(messages(&warnings), ["Skipping empty study protocol"]);
}

#[test]
fn duplicate_study_declarations_keep_the_first() {
    let input = "INVESTIGATION\n\
                 Investigation Identifier\ti1\n\
                 STUDY\n\
                 Study Identifier\ts1\n\
                 Study File Name\ts_1.txt\n\
                 STUDY FACTORS\n\
                 Study Factor Name\tdose\tdose\n\
                 Study Factor Type\tamount\ttime\n\
                 STUDY ASSAYS\n\
                 Study Assay File Name\ta_1.txt\ta_1.txt\n\
                 Study Assay Technology Platform\tfirst\tsecond\n\
                 STUDY PROTOCOLS\n\
                 Study Protocol Name\tp1\tp1\n\
                 Study Protocol Type\tt1\tt2\n";
    let (investigation, warnings) = read_investigation(input.as_bytes()).unwrap();
    let study = &investigation.studies[0];
    assert_eq!(study.factors["dose"].factor_type.text, "amount");
    assert_eq!(study.assays["a_1.txt"].platform, "first");
    assert_eq!(study.protocols["p1"].protocol_type.text, "t1");
    assert_eq!(
        messages(&warnings),
        [
            "Skipping duplicate study factor: dose",
            "Skipping duplicate study assay: a_1.txt",
            "Skipping duplicate study protocol: p1",
        ]
    );
    assert!(warnings.iter().all(|warning| warning.severity == Severity::Parse));
}
