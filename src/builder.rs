use std::collections::HashMap;
use std::io::BufRead;

use crate::domain::{
    Annotated, AssayInfo, Attribute, Graph, Investigation, Material, Process, SheetId, StudyInfo,
    UNKNOWN_PROTOCOL,
};
use crate::error::IsaError;
use crate::schema::{AnnotationRole, ColumnKind, NodeSlot, SheetSchema, SlotKind};
use crate::tokenizer::{QuotePolicy, Row, SheetTokenizer};
use crate::warning::{Warning, Warnings};

#[derive(Debug, Clone, Copy)]
pub enum SheetRef<'a> {
    Study,
    Assay(&'a AssayInfo),
}

pub fn read_sheet<R: BufRead>(
    investigation: &Investigation,
    study: &StudyInfo,
    sheet: SheetRef<'_>,
    reader: R,
    quote: QuotePolicy,
) -> Result<(Graph, Vec<Warning>), IsaError> {
    let study_number =
        investigation
            .study_number(study)
            .ok_or_else(|| IsaError::InvalidInvestigation {
                line: 0,
                message: format!(
                    "study {:?} is not part of the investigation",
                    study.info.identifier
                ),
            })?;
    let (id, path) = match sheet {
        SheetRef::Study => (SheetId::study(study_number), study.path().cloned()),
        SheetRef::Assay(assay) => {
            let assay_number = study
                .assays
                .get_index_of(assay.path.as_str())
                .ok_or_else(|| IsaError::UnresolvablePath(assay.path.clone()))?
                + 1;
            (
                SheetId::assay(study_number, assay_number),
                Some(assay.path.clone()),
            )
        }
    };

    let tokenizer = SheetTokenizer::new(reader, quote)?;
    let schema = SheetSchema::resolve(tokenizer.header())?;
    let mut builder = GraphBuilder::new(id, schema);
    for row in tokenizer {
        builder.add_row(&row?);
    }
    let (mut graph, warnings) = builder.finish();
    graph.path = path;
    tracing::debug!(
        sheet = %graph.sheet,
        materials = graph.materials.len(),
        processes = graph.processes.len(),
        arcs = graph.arcs.len(),
        "built sheet graph"
    );
    Ok((graph, warnings))
}

pub struct GraphBuilder {
    schema: SheetSchema,
    graph: Graph,
    warnings: Warnings,
}

impl GraphBuilder {
    pub fn new(sheet: SheetId, schema: SheetSchema) -> Self {
        Self {
            schema,
            graph: Graph::new(sheet),
            warnings: Warnings::new(),
        }
    }

    pub fn add_row(&mut self, row: &Row) {
        let mut previous: Option<String> = None;
        for slot_idx in 0..self.schema.slots.len() {
            let slot_kind = self.schema.slots[slot_idx].kind;
            let attributes =
                slot_attributes(&self.schema, &self.schema.slots[slot_idx], &row.cells);
            let key = match slot_kind {
                SlotKind::Material { kind, column } => {
                    let name = row.cells[column].trim();
                    if name.is_empty() {
                        continue;
                    }
                    let key = self.graph.sheet.material_key(kind, name);
                    self.graph.add_material(Material::new(&key, name, kind));
                    key
                }
                SlotKind::Process {
                    protocol_column,
                    name,
                } => {
                    let protocol = match protocol_column {
                        Some(column) => row.cells[column].trim(),
                        None => UNKNOWN_PROTOCOL,
                    };
                    let named = name
                        .map(|(column, name_type)| (row.cells[column].trim(), name_type))
                        .filter(|(value, _)| !value.is_empty());
                    if protocol.is_empty() && named.is_none() {
                        continue;
                    }
                    if protocol_column.is_none() && named.is_none() {
                        continue;
                    }
                    let key = match named {
                        Some((value, name_type)) => {
                            self.graph.sheet.named_process_key(name_type, value)
                        }
                        None => {
                            let fingerprint = attributes
                                .iter()
                                .map(fingerprint)
                                .collect::<Vec<_>>()
                                .join("|");
                            format!(
                                "{}-{protocol}-{slot_idx}-{}-{fingerprint}",
                                self.graph.sheet.prefix(),
                                previous.as_deref().unwrap_or_default()
                            )
                        }
                    };
                    let mut process = Process::new(&key, protocol);
                    process.name = named.map(|(value, _)| value.to_string());
                    process.name_type = name.map(|(_, name_type)| name_type);
                    self.add_process(process, row.line);
                    key
                }
            };

            self.graph.place(&key, slot_idx);
            self.merge_attributes(&key, attributes, row.line);
            if let Some(tail) = &previous {
                self.graph.add_arc(tail, &key);
            }
            previous = Some(key);
        }

        if previous.is_none() {
            self.warnings
                .parse(format!("Line {}: row defines no nodes, skipping", row.line));
        }
    }

    pub fn finish(mut self) -> (Graph, Vec<Warning>) {
        self.graph.schema = Some(self.schema);
        (self.graph, self.warnings.into_vec())
    }

    fn add_process(&mut self, process: Process, line: usize) {
        if let Some(existing) = self.graph.processes.get(&process.key) {
            if existing.protocol_ref != process.protocol_ref {
                self.warnings.parse(format!(
                    "Line {line}: process {:?} used with protocol {:?} and {:?}, keeping the first",
                    process.name.as_deref().unwrap_or_default(),
                    existing.protocol_ref,
                    process.protocol_ref
                ));
            }
            return;
        }
        self.graph.add_process(process);
    }

    fn merge_attributes(&mut self, key: &str, incoming: Vec<Attribute>, line: usize) {
        let existing = if let Some(material) = self.graph.materials.get_mut(key) {
            &mut material.attributes
        } else if let Some(process) = self.graph.processes.get_mut(key) {
            &mut process.attributes
        } else {
            return;
        };
        for attribute in incoming {
            match existing.iter_mut().find(|current| current.key == attribute.key) {
                None => existing.push(attribute),
                Some(current) if current == &attribute || is_blank(&attribute) => {}
                Some(current) if is_blank(current) => *current = attribute,
                Some(current) => self.warnings.parse(format!(
                    "Line {line}: conflicting {} for {key}: {:?} vs {:?}, keeping the first",
                    attribute.key, current.value.text, attribute.value.text
                )),
            }
        }
    }
}

fn is_blank(attribute: &Attribute) -> bool {
    attribute.value.is_empty() && attribute.unit.as_ref().is_none_or(Annotated::is_empty)
}

fn annotated_fingerprint(value: &Annotated) -> String {
    match (value.term_source.as_deref(), value.accession.as_deref()) {
        (None, None) => value.text.clone(),
        (source, accession) => format!(
            "{}[{}:{}]",
            value.text,
            source.unwrap_or_default(),
            accession.unwrap_or_default()
        ),
    }
}

// Plain values keep their bare text so simple keys stay readable.
fn fingerprint(attribute: &Attribute) -> String {
    let value = annotated_fingerprint(&attribute.value);
    match &attribute.unit {
        Some(unit) => format!("{value} {}", annotated_fingerprint(unit)),
        None => value,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn slot_attributes(schema: &SheetSchema, slot: &NodeSlot, cells: &[String]) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut value_owner: HashMap<usize, usize> = HashMap::new();
    let mut unit_owner: HashMap<usize, usize> = HashMap::new();

    for &column in &slot.columns {
        let cell = cells[column].trim();
        match &schema.columns[column].kind {
            ColumnKind::Attribute(key) => {
                value_owner.insert(column, attributes.len());
                attributes.push(Attribute::new(key.clone(), Annotated::text(cell)));
            }
            ColumnKind::Annotation { role, target } => {
                if let Some(&owner) = value_owner.get(target) {
                    let attribute = &mut attributes[owner];
                    match role {
                        AnnotationRole::Unit => {
                            attribute.unit = Some(Annotated::text(cell));
                            unit_owner.insert(column, owner);
                        }
                        AnnotationRole::TermSource => attribute.value.term_source = non_empty(cell),
                        AnnotationRole::TermAccession => {
                            attribute.value.accession = non_empty(cell)
                        }
                    }
                } else if let Some(&owner) = unit_owner.get(target) {
                    let unit = attributes[owner].unit.get_or_insert_with(Annotated::default);
                    match role {
                        AnnotationRole::TermSource => unit.term_source = non_empty(cell),
                        AnnotationRole::TermAccession => unit.accession = non_empty(cell),
                        AnnotationRole::Unit => {}
                    }
                }
            }
            _ => {}
        }
    }
    attributes
}
