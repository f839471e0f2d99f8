use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{AttributeKey, MaterialKind, ProcessNameType};
use crate::error::IsaError;

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Characteristics?|Factor Value|Parameter Value|Comment)\s*\[(.*)\]$")
        .expect("bracketed label pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationRole {
    TermSource,
    TermAccession,
    Unit,
}

impl AnnotationRole {
    pub fn label(&self) -> &'static str {
        match self {
            AnnotationRole::TermSource => "Term Source REF",
            AnnotationRole::TermAccession => "Term Accession Number",
            AnnotationRole::Unit => "Unit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Material(MaterialKind),
    ProtocolRef,
    ProcessName(ProcessNameType),
    Attribute(AttributeKey),
    /// Annotates the value column at `target`.
    Annotation { role: AnnotationRole, target: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub label: String,
    pub kind: ColumnKind,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Material {
        kind: MaterialKind,
        column: usize,
    },
    Process {
        protocol_column: Option<usize>,
        name: Option<(usize, ProcessNameType)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSlot {
    pub kind: SlotKind,
    pub columns: Vec<usize>,
}

impl NodeSlot {
    fn accepts_name(&self) -> bool {
        matches!(
            self.kind,
            SlotKind::Process {
                protocol_column: Some(_),
                name: None
            }
        )
    }

    fn is_material(&self) -> bool {
        matches!(self.kind, SlotKind::Material { .. })
    }
}

enum Label {
    Material(MaterialKind),
    ProtocolRef,
    ProcessName(ProcessNameType),
    Attribute(AttributeKey),
    Annotation(AnnotationRole),
}

fn classify(label: &str) -> Option<Label> {
    if let Ok(kind) = label.parse::<MaterialKind>() {
        return Some(Label::Material(kind));
    }
    if let Ok(name_type) = label.parse::<ProcessNameType>() {
        return Some(Label::ProcessName(name_type));
    }
    let plain = match label {
        "Protocol REF" => Some(Label::ProtocolRef),
        "Term Source REF" => Some(Label::Annotation(AnnotationRole::TermSource)),
        "Term Accession Number" => Some(Label::Annotation(AnnotationRole::TermAccession)),
        "Unit" => Some(Label::Annotation(AnnotationRole::Unit)),
        "Material Type" => Some(Label::Attribute(AttributeKey::MaterialType)),
        "Label" => Some(Label::Attribute(AttributeKey::Label)),
        "Description" => Some(Label::Attribute(AttributeKey::Description)),
        "Performer" => Some(Label::Attribute(AttributeKey::Performer)),
        "Date" => Some(Label::Attribute(AttributeKey::Date)),
        "Array Design REF" => Some(Label::Attribute(AttributeKey::ArrayDesignRef)),
        "First Dimension" => Some(Label::Attribute(AttributeKey::FirstDimension)),
        "Second Dimension" => Some(Label::Attribute(AttributeKey::SecondDimension)),
        _ => None,
    };
    if plain.is_some() {
        return plain;
    }
    let captures = BRACKETED.captures(label)?;
    let qualifier = captures[2].trim().to_string();
    let key = match &captures[1] {
        "Characteristics" | "Characteristic" => AttributeKey::Characteristic(qualifier),
        "Factor Value" => AttributeKey::FactorValue(qualifier),
        "Parameter Value" => AttributeKey::ParameterValue(qualifier),
        _ => AttributeKey::Comment(qualifier),
    };
    Some(Label::Attribute(key))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSchema {
    pub columns: Vec<ColumnDescriptor>,
    pub slots: Vec<NodeSlot>,
}

impl SheetSchema {
    pub fn resolve<S: AsRef<str>>(header: &[S]) -> Result<Self, IsaError> {
        let mut columns: Vec<ColumnDescriptor> = Vec::with_capacity(header.len());
        let mut slots: Vec<NodeSlot> = Vec::new();
        let mut last_value: Option<usize> = None;
        let mut annotated: HashSet<(usize, AnnotationRole)> = HashSet::new();

        for (idx, raw) in header.iter().enumerate() {
            let raw = raw.as_ref();
            let malformed = |reason: &str| IsaError::MalformedHeader {
                column: idx + 1,
                label: raw.to_string(),
                reason: reason.to_string(),
            };
            let label = classify(raw.trim()).ok_or_else(|| malformed("unknown column label"))?;

            let kind = match label {
                Label::Material(kind) => {
                    slots.push(NodeSlot {
                        kind: SlotKind::Material { kind, column: idx },
                        columns: vec![idx],
                    });
                    last_value = None;
                    ColumnKind::Material(kind)
                }
                Label::ProtocolRef => {
                    slots.push(NodeSlot {
                        kind: SlotKind::Process {
                            protocol_column: Some(idx),
                            name: None,
                        },
                        columns: vec![idx],
                    });
                    last_value = None;
                    ColumnKind::ProtocolRef
                }
                Label::ProcessName(name_type) => {
                    let joins_protocol = slots.last().is_some_and(NodeSlot::accepts_name);
                    if let Some(slot) = slots.last_mut().filter(|_| joins_protocol) {
                        if let SlotKind::Process { name, .. } = &mut slot.kind {
                            *name = Some((idx, name_type));
                        }
                        slot.columns.push(idx);
                    } else {
                        slots.push(NodeSlot {
                            kind: SlotKind::Process {
                                protocol_column: None,
                                name: Some((idx, name_type)),
                            },
                            columns: vec![idx],
                        });
                    }
                    last_value = None;
                    ColumnKind::ProcessName(name_type)
                }
                Label::Attribute(key) => {
                    let slot = slots
                        .last_mut()
                        .ok_or_else(|| malformed("attribute column before any node column"))?;
                    let applies = if slot.is_material() {
                        key.applies_to_material()
                    } else {
                        key.applies_to_process()
                    };
                    if !applies {
                        return Err(malformed("attribute not allowed for the preceding node"));
                    }
                    let duplicate = slot.columns.iter().any(|&other| {
                        matches!(&columns[other].kind, ColumnKind::Attribute(existing) if existing == &key)
                    });
                    if duplicate {
                        return Err(malformed("duplicate attribute column for one node"));
                    }
                    slot.columns.push(idx);
                    last_value = Some(idx);
                    ColumnKind::Attribute(key)
                }
                Label::Annotation(role) => {
                    let target =
                        last_value.ok_or_else(|| malformed("annotation without a value column"))?;
                    let valid = match (&columns[target].kind, role) {
                        (ColumnKind::Attribute(key), AnnotationRole::Unit) => key.accepts_unit(),
                        (ColumnKind::Attribute(key), _) => key.is_annotatable(),
                        (
                            ColumnKind::Annotation {
                                role: AnnotationRole::Unit,
                                ..
                            },
                            AnnotationRole::TermSource | AnnotationRole::TermAccession,
                        ) => true,
                        _ => false,
                    };
                    if !valid {
                        return Err(malformed("annotation does not fit the preceding column"));
                    }
                    if !annotated.insert((target, role)) {
                        return Err(malformed("duplicate annotation column"));
                    }
                    if role == AnnotationRole::Unit {
                        last_value = Some(idx);
                    }
                    if let Some(slot) = slots.last_mut() {
                        slot.columns.push(idx);
                    }
                    ColumnKind::Annotation { role, target }
                }
            };

            columns.push(ColumnDescriptor {
                label: raw.to_string(),
                kind,
                slot: slots.len() - 1,
            });
        }

        if slots.is_empty() {
            return Err(IsaError::MalformedHeader {
                column: 1,
                label: String::new(),
                reason: "no material or process columns".to_string(),
            });
        }

        Ok(Self { columns, slots })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|col| col.label.as_str()).collect()
    }
}
