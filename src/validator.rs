use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::{
    Annotated, AttributeKey, Graph, Investigation, Material, MaterialKind, Node, Process, StudyInfo,
    UNKNOWN_PROTOCOL,
};
use crate::resolver::ResolutionContext;
use crate::warning::{Warning, Warnings};

pub fn validate(investigation: &Investigation, study: &StudyInfo, graph: &Graph) -> Vec<Warning> {
    let assay = graph
        .sheet
        .assay
        .and_then(|number| study.assays.get_index(number.checked_sub(1)?))
        .map(|(_, assay)| assay);
    let context = ResolutionContext::new(investigation, study, assay);
    Validator::new(&context).validate(graph)
}

pub fn validate_investigation(investigation: &Investigation) -> Vec<Warning> {
    let mut warnings = Warnings::new();
    let declared: HashSet<&str> = investigation
        .ontology_sources
        .keys()
        .map(String::as_str)
        .collect();

    if investigation.info.identifier.is_empty() {
        warnings.advisory("Investigation without identifier");
    }
    if investigation.info.title.is_empty() {
        warnings.advisory("Investigation without title");
    }
    check_date(
        &investigation.info.submission_date,
        "investigation submission date",
        &mut warnings,
    );
    check_date(
        &investigation.info.public_release_date,
        "investigation public release date",
        &mut warnings,
    );

    let mut identifiers = HashSet::new();
    for study in &investigation.studies {
        let info = &study.info;
        let path = info.path.as_ref().map(|path| path.as_str()).unwrap_or_default();
        if info.title.is_empty() {
            warnings.moderate(format!(
                "Study without title:\nID:\t{}\nTitle:\t\nPath:\t{}",
                info.identifier, path
            ));
        }
        if info.path.is_none() {
            warnings.critical(format!("Study without file path:\nID:\t{}", info.identifier));
        }
        if !info.identifier.is_empty() && !identifiers.insert(info.identifier.as_str()) {
            warnings.critical(format!("Duplicate study identifier \"{}\"", info.identifier));
        }
        check_date(&info.submission_date, "study submission date", &mut warnings);
        check_date(
            &info.public_release_date,
            "study public release date",
            &mut warnings,
        );

        for design in &study.designs {
            check_term_source(&declared, design, "study design type", &mut warnings);
        }
        for factor in study.factors.values() {
            check_term_source(&declared, &factor.factor_type, "study factor type", &mut warnings);
        }
        for assay in study.assays.values() {
            check_term_source(
                &declared,
                &assay.measurement_type,
                "assay measurement type",
                &mut warnings,
            );
            check_term_source(
                &declared,
                &assay.technology_type,
                "assay technology type",
                &mut warnings,
            );
        }
        for protocol in study.protocols.values() {
            check_term_source(
                &declared,
                &protocol.protocol_type,
                "study protocol type",
                &mut warnings,
            );
            for parameter in protocol.parameters.values() {
                check_term_source(&declared, parameter, "protocol parameter", &mut warnings);
            }
        }
    }
    warnings.into_vec()
}

fn check_term_source(
    declared: &HashSet<&str>,
    value: &Annotated,
    what: &str,
    warnings: &mut Warnings,
) {
    if let Some(source) = value.term_source.as_deref() {
        if !source.is_empty() && !declared.contains(source) {
            warnings.moderate(format!(
                "Term source \"{source}\" of {what} \"{}\" is not declared in the investigation",
                value.text
            ));
        }
    }
}

pub fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn check_date(value: &str, what: &str, warnings: &mut Warnings) {
    if !value.is_empty() && !is_iso_date(value) {
        warnings.moderate(format!("Invalid ISO 8601 {what}: \"{value}\""));
    }
}

// Unnamed processes are labelled by protocol and the node they follow.
fn process_label(graph: &Graph, process: &Process) -> String {
    if let Some(name) = &process.name {
        return name.clone();
    }
    let predecessor = graph
        .arcs
        .iter()
        .find(|arc| arc.head == process.key)
        .and_then(|arc| graph.lookup(&arc.tail));
    match predecessor {
        Some(node) => format!("{} after {}", process.protocol_ref, node.name()),
        None => process.protocol_ref.clone(),
    }
}

pub struct Validator<'c, 'a> {
    context: &'c ResolutionContext<'a>,
}

impl<'c, 'a> Validator<'c, 'a> {
    pub fn new(context: &'c ResolutionContext<'a>) -> Self {
        Self { context }
    }

    pub fn validate(&self, graph: &Graph) -> Vec<Warning> {
        let mut warnings = Warnings::new();
        self.check_presence(&mut warnings);
        for node in graph.nodes() {
            match node {
                Node::Material(material) => self.check_material(graph, material, &mut warnings),
                Node::Process(process) => self.check_process(graph, process, &mut warnings),
            }
        }
        tracing::debug!(sheet = %graph.sheet, warnings = warnings.len(), "validated sheet");
        warnings.into_vec()
    }

    fn check_presence(&self, warnings: &mut Warnings) {
        if let Some(assay) = self.context.assay {
            if assay.platform.is_empty() {
                warnings.advisory(format!(
                    "Assay without platform:\nPath:\t{}\nMeasurement Type:\t{}\nTechnology Type:\t{}\nTechnology Platform:\t",
                    assay.path, assay.measurement_type.text, assay.technology_type.text
                ));
            }
        }
    }

    fn check_material(&self, graph: &Graph, material: &Material, warnings: &mut Warnings) {
        let in_assay = graph.sheet.is_assay();
        let allowed = if in_assay {
            material.kind != MaterialKind::Source
        } else {
            material.kind.is_study_scoped()
        };
        if !allowed {
            let sheet = if in_assay { "assay" } else { "study" };
            warnings.critical(format!(
                "Found {} \"{}\" in {sheet} sheet",
                material.kind, material.name
            ));
        }

        if in_assay && material.kind == MaterialKind::Sample {
            if let Some(samples) = &self.context.study_samples {
                if !samples.contains(&material.key) {
                    warnings.moderate(format!(
                        "Sample \"{}\" of assay is not declared in the study sheet",
                        material.name
                    ));
                }
            }
        }

        let view = self.context.material(graph, &material.key).unwrap_or(material);
        for attribute in &view.attributes {
            if let AttributeKey::FactorValue(factor) = &attribute.key {
                if !self.context.factors().contains_key(factor) {
                    warnings.moderate(format!(
                        "Factor value for undeclared factor \"{factor}\" on material \"{}\"",
                        material.name
                    ));
                }
            }
            self.check_annotation(&attribute.key, &attribute.value, &material.name, warnings);
            if let Some(unit) = &attribute.unit {
                self.check_annotation(&attribute.key, unit, &material.name, warnings);
            }
        }
    }

    fn check_process(&self, graph: &Graph, process: &Process, warnings: &mut Warnings) {
        let label = process_label(graph, process);
        let label = label.as_str();
        if process.has_unknown_protocol() {
            warnings.moderate(format!(
                "Can't validate parameter values and names for process with undeclared protocol \"{UNKNOWN_PROTOCOL}\" and name type \"{}\"",
                process.name_type.map(|name_type| name_type.label()).unwrap_or_default()
            ));
        } else if let Some(protocol) = self.context.protocols().get(&process.protocol_ref) {
            for parameter in process.parameter_values() {
                if let AttributeKey::ParameterValue(name) = &parameter.key {
                    if !protocol.parameters.contains_key(name) {
                        warnings.moderate(format!(
                            "Parameter \"{name}\" of process \"{label}\" is not declared for protocol \"{}\"",
                            protocol.name
                        ));
                    }
                }
            }
            if let Some(name_type) = process.name_type {
                let accepted = name_type.accepted_protocol_types();
                let protocol_type = protocol.protocol_type.text.as_str();
                let supported = accepted.is_empty()
                    || protocol_type.is_empty()
                    || accepted
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(protocol_type));
                if !supported {
                    let only = accepted
                        .iter()
                        .map(|candidate| format!("\"{candidate}\""))
                        .collect::<Vec<_>>()
                        .join(", ");
                    warnings.moderate(format!(
                        "\"{name_type}\" not supported by protocol type \"{protocol_type}\" (only {only})"
                    ));
                }
            }
        } else {
            warnings.critical(format!(
                "Protocol \"{}\" of process \"{label}\" is not declared in study \"{}\"",
                process.protocol_ref, self.context.study.info.identifier
            ));
        }

        for attribute in &process.attributes {
            if attribute.key == AttributeKey::Date {
                let value = attribute.value.text.as_str();
                if !value.is_empty() && !is_iso_date(value) {
                    warnings.moderate(format!(
                        "Invalid ISO 8601 date \"{value}\" of process \"{label}\""
                    ));
                }
            }
            self.check_annotation(&attribute.key, &attribute.value, label, warnings);
            if let Some(unit) = &attribute.unit {
                self.check_annotation(&attribute.key, unit, label, warnings);
            }
        }
    }

    fn check_annotation(
        &self,
        key: &AttributeKey,
        value: &Annotated,
        owner: &str,
        warnings: &mut Warnings,
    ) {
        if let Some(source) = value.term_source.as_deref() {
            if !source.is_empty() && !self.context.has_ontology_source(source) {
                warnings.moderate(format!(
                    "Term source \"{source}\" of {key} on \"{owner}\" is not declared in the investigation"
                ));
            }
        }
    }
}
