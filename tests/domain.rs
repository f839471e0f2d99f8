use assert_matches::assert_matches;
use kira_isatab::domain::{
    Annotated, Attribute, AttributeKey, Graph, Material, MaterialKind, Node, Process, ProcessNameType,
    SheetId, UNKNOWN_PROTOCOL,
};
use kira_isatab::error::IsaError;

#[test]
fn named_process_keys_carry_the_name_column() {
    let sheet = SheetId::assay(2, 1);
    assert_eq!(
        sheet.named_process_key(ProcessNameType::NormalizationName, "norm1"),
        "S2-A1-process-normalization-name-norm1"
    );
    assert_eq!(sheet.to_string(), "S2-A1");
    assert!(sheet.is_assay());
}

#[test]
fn same_name_different_kind_is_a_different_node() {
    let sheet = SheetId::study(1);
    let mut graph = Graph::new(sheet);
    graph.add_material(Material::new(
        sheet.material_key(MaterialKind::Source, "x"),
        "x",
        MaterialKind::Source,
    ));
    graph.add_material(Material::new(
        sheet.material_key(MaterialKind::Sample, "x"),
        "x",
        MaterialKind::Sample,
    ));
    assert_eq!(graph.materials.len(), 2);
}

#[test]
fn nodes_follow_discovery_order() {
    let mut graph = Graph::new(SheetId::study(1));
    graph.add_process(Process::new("p", "sample collection"));
    graph.add_material(Material::new("m", "m", MaterialKind::Sample));
    graph.add_process(Process::new("p", "ignored"));

    let keys: Vec<_> = graph.nodes().iter().map(Node::key).collect();
    assert_eq!(keys, ["p", "m"]);
    assert_eq!(graph.processes["p"].protocol_ref, "sample collection");
}

#[test]
fn unknown_protocol_detection() {
    assert!(Process::new("a", UNKNOWN_PROTOCOL).has_unknown_protocol());
    assert!(Process::new("b", "").has_unknown_protocol());
    assert!(!Process::new("c", "sequencing").has_unknown_protocol());
}

#[test]
fn attribute_keys_know_where_they_apply() {
    let characteristic = AttributeKey::Characteristic("organism".to_string());
    assert_eq!(characteristic.label(), "Characteristics[organism]");
    assert!(characteristic.applies_to_material());
    assert!(!characteristic.applies_to_process());

    let parameter = AttributeKey::ParameterValue("temperature".to_string());
    assert!(parameter.accepts_unit());
    assert!(parameter.applies_to_process());

    let mut process = Process::new("p", "sequencing");
    process.attributes.push(Attribute::new(
        AttributeKey::Performer,
        Annotated::text("alice"),
    ));
    assert_eq!(process.performer(), Some("alice"));
    assert_eq!(process.date(), None);
}

#[test]
fn column_labels_parse_into_kinds() {
    assert_eq!("Extract Name".parse::<MaterialKind>().unwrap(), MaterialKind::Extract);
    assert_eq!(
        "Normalization Name".parse::<ProcessNameType>().unwrap(),
        ProcessNameType::NormalizationName
    );
    assert_matches!(
        "Protocol REF".parse::<MaterialKind>(),
        Err(IsaError::UnknownLabel(label)) if label == "Protocol REF"
    );
    assert_matches!(
        "Extract Name".parse::<ProcessNameType>(),
        Err(IsaError::UnknownLabel(_))
    );
}
