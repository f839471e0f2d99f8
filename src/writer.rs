use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;

use crate::domain::{Attribute, AttributeKey, Graph, MaterialKind, Node, ProcessNameType};
use crate::error::IsaError;
use crate::schema::{AnnotationRole, ColumnKind, SheetSchema, SlotKind};
use crate::tokenizer::QuotePolicy;

pub fn write_sheet<W: Write>(graph: &Graph, sink: W, quote: QuotePolicy) -> Result<(), IsaError> {
    SheetWriter::new(graph, quote).write(sink)
}

pub struct SheetWriter<'g> {
    graph: &'g Graph,
    quote: QuotePolicy,
}

impl<'g> SheetWriter<'g> {
    pub fn new(graph: &'g Graph, quote: QuotePolicy) -> Self {
        Self { graph, quote }
    }

    pub fn write<W: Write>(&self, mut sink: W) -> Result<(), IsaError> {
        if let Some(arc) = self.graph.dangling_arc() {
            return Err(IsaError::DanglingArc {
                tail: arc.tail.clone(),
                head: arc.head.clone(),
            });
        }

        let (schema, placement) = self.layout()?;
        self.write_record(&mut sink, schema.labels())?;

        let mut written = HashSet::new();
        let mut rows = 0usize;
        for path in self.paths() {
            let cells = self.render_row(&schema, &placement, &path);
            if written.insert(cells.clone()) {
                self.write_record(&mut sink, cells.iter().map(String::as_str).collect())?;
                rows += 1;
            }
        }
        sink.flush()?;
        tracing::debug!(sheet = %self.graph.sheet, rows, "wrote sheet");
        Ok(())
    }

    fn layout(&self) -> Result<(Cow<'g, SheetSchema>, HashMap<&'g str, usize>), IsaError> {
        if let Some(schema) = &self.graph.schema {
            let placement: Option<HashMap<&str, usize>> = self
                .graph
                .nodes()
                .into_iter()
                .map(|node| {
                    let key = node.key();
                    self.graph.placement(key).map(|slot| (key, slot))
                })
                .collect();
            if let Some(placement) = placement {
                return Ok((Cow::Borrowed(schema), placement));
            }
        }
        let (schema, placement) = canonical_layout(self.graph)?;
        Ok((Cow::Owned(schema), placement))
    }

    /// Every path from a node without incoming arcs to a node without
    /// outgoing arcs. Nodes on a cycle end the path at the repeat.
    fn paths(&self) -> Vec<Vec<&'g str>> {
        let graph = self.graph;
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut has_incoming: HashSet<&str> = HashSet::new();
        for arc in &graph.arcs {
            successors
                .entry(arc.tail.as_str())
                .or_default()
                .push(arc.head.as_str());
            has_incoming.insert(arc.head.as_str());
        }

        let nodes = graph.nodes();
        let mut starts: Vec<&str> = nodes
            .iter()
            .map(|node| node.key())
            .filter(|key| !has_incoming.contains(key))
            .collect();

        let mut paths = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cursor = 0;
        loop {
            while cursor < starts.len() {
                let start = starts[cursor];
                cursor += 1;
                let mut stack = vec![vec![start]];
                while let Some(path) = stack.pop() {
                    let Some(&last) = path.last() else {
                        continue;
                    };
                    visited.insert(last);
                    let next: Vec<&str> = successors
                        .get(last)
                        .map(|heads| {
                            heads
                                .iter()
                                .copied()
                                .filter(|head| !path.contains(head))
                                .collect()
                        })
                        .unwrap_or_default();
                    if next.is_empty() {
                        paths.push(path);
                        continue;
                    }
                    for head in next.into_iter().rev() {
                        let mut extended = path.clone();
                        extended.push(head);
                        stack.push(extended);
                    }
                }
            }
            match nodes
                .iter()
                .map(|node| node.key())
                .find(|key| !visited.contains(key))
            {
                Some(orphan) => starts.push(orphan),
                None => break,
            }
        }
        paths
    }

    fn render_row(
        &self,
        schema: &SheetSchema,
        placement: &HashMap<&str, usize>,
        path: &[&str],
    ) -> Vec<String> {
        let mut cells = vec![String::new(); schema.len()];
        for key in path {
            let (Some(&slot_idx), Some(node)) = (placement.get(key), self.graph.lookup(key)) else {
                continue;
            };
            let Some(slot) = schema.slots.get(slot_idx) else {
                continue;
            };
            let attributes = match node {
                Node::Material(material) => &material.attributes,
                Node::Process(process) => &process.attributes,
            };
            for &column in &slot.columns {
                cells[column] = match (&schema.columns[column].kind, node) {
                    (ColumnKind::Material(_), Node::Material(material)) => material.name.clone(),
                    (ColumnKind::ProtocolRef, Node::Process(process)) => {
                        process.protocol_ref.clone()
                    }
                    (ColumnKind::ProcessName(_), Node::Process(process)) => {
                        process.name.clone().unwrap_or_default()
                    }
                    _ => attribute_cell(schema, column, attributes),
                };
            }
        }
        cells
    }

    fn write_record<W: Write>(&self, sink: &mut W, cells: Vec<&str>) -> Result<(), IsaError> {
        let mut line = String::new();
        for (idx, cell) in cells.iter().enumerate() {
            if idx > 0 {
                line.push('\t');
            }
            match self.quote.quote_char() {
                Some(quote) => {
                    line.push(quote);
                    line.push_str(&cell.replace(quote, &format!("{quote}{quote}")));
                    line.push(quote);
                }
                None => {
                    if cell.contains(['\t', '\n', '\r']) {
                        return Err(IsaError::UnwritableCell(cell.to_string()));
                    }
                    line.push_str(cell);
                }
            }
        }
        line.push('\n');
        sink.write_all(line.as_bytes())?;
        Ok(())
    }
}

fn find<'a>(attributes: &'a [Attribute], key: &AttributeKey) -> Option<&'a Attribute> {
    attributes.iter().find(|attribute| &attribute.key == key)
}

fn attribute_cell(schema: &SheetSchema, column: usize, attributes: &[Attribute]) -> String {
    let value = match &schema.columns[column].kind {
        ColumnKind::Attribute(key) => find(attributes, key).map(|attribute| &attribute.value),
        ColumnKind::Annotation { role, target } => match &schema.columns[*target].kind {
            ColumnKind::Attribute(key) => {
                let attribute = find(attributes, key);
                match role {
                    AnnotationRole::Unit => attribute.and_then(|attribute| attribute.unit.as_ref()),
                    _ => attribute.map(|attribute| &attribute.value),
                }
            }
            ColumnKind::Annotation {
                role: AnnotationRole::Unit,
                target: owner,
            } => match &schema.columns[*owner].kind {
                ColumnKind::Attribute(key) => {
                    find(attributes, key).and_then(|attribute| attribute.unit.as_ref())
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };
    let Some(value) = value else {
        return String::new();
    };
    match &schema.columns[column].kind {
        ColumnKind::Annotation {
            role: AnnotationRole::TermSource,
            ..
        } => value.term_source.clone().unwrap_or_default(),
        ColumnKind::Annotation {
            role: AnnotationRole::TermAccession,
            ..
        } => value.accession.clone().unwrap_or_default(),
        _ => value.text.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Signature {
    Material(MaterialKind),
    Process {
        protocol: bool,
        name_type: Option<ProcessNameType>,
    },
}

/// Header for graphs that were not read from a sheet: node slots ordered by
/// distance from the path starts, each node column followed by its
/// attribute columns and their annotations.
fn canonical_layout(graph: &Graph) -> Result<(SheetSchema, HashMap<&str, usize>), IsaError> {
    let nodes = graph.nodes();
    let depth = depths(graph, &nodes);

    let mut slot_order: Vec<(usize, Signature)> = Vec::new();
    let mut members: HashMap<(usize, Signature), Vec<Node<'_>>> = HashMap::new();
    for node in &nodes {
        let signature = match node {
            Node::Material(material) => Signature::Material(material.kind),
            Node::Process(process) => Signature::Process {
                protocol: !(process.has_unknown_protocol() && process.name_type.is_some()),
                name_type: process.name_type,
            },
        };
        let slot = (depth.get(node.key()).copied().unwrap_or(0), signature);
        let entry = members.entry(slot).or_default();
        if entry.is_empty() {
            slot_order.push(slot);
        }
        entry.push(*node);
    }
    slot_order.sort_by_key(|(level, _)| *level);

    let mut labels: Vec<String> = Vec::new();
    let mut placement = HashMap::new();
    for (slot_idx, slot) in slot_order.iter().enumerate() {
        match slot.1 {
            Signature::Material(kind) => labels.push(kind.label().to_string()),
            Signature::Process {
                protocol,
                name_type,
            } => {
                if protocol {
                    labels.push("Protocol REF".to_string());
                }
                if let Some(name_type) = name_type {
                    labels.push(name_type.label().to_string());
                }
            }
        }

        let mut keys: Vec<&AttributeKey> = Vec::new();
        let mut annotated: HashSet<&AttributeKey> = HashSet::new();
        let mut with_unit: HashSet<&AttributeKey> = HashSet::new();
        let mut unit_annotated: HashSet<&AttributeKey> = HashSet::new();
        for node in &members[slot] {
            placement.insert(node.key(), slot_idx);
            let attributes = match node {
                Node::Material(material) => &material.attributes,
                Node::Process(process) => &process.attributes,
            };
            for attribute in attributes {
                if !keys.contains(&&attribute.key) {
                    keys.push(&attribute.key);
                }
                if attribute.value.term_source.is_some() || attribute.value.accession.is_some() {
                    annotated.insert(&attribute.key);
                }
                if let Some(unit) = &attribute.unit {
                    with_unit.insert(&attribute.key);
                    if unit.term_source.is_some() || unit.accession.is_some() {
                        unit_annotated.insert(&attribute.key);
                    }
                }
            }
        }
        for key in keys {
            labels.push(key.label());
            if annotated.contains(key) {
                labels.push(AnnotationRole::TermSource.label().to_string());
                labels.push(AnnotationRole::TermAccession.label().to_string());
            }
            if with_unit.contains(key) {
                labels.push(AnnotationRole::Unit.label().to_string());
                if unit_annotated.contains(key) {
                    labels.push(AnnotationRole::TermSource.label().to_string());
                    labels.push(AnnotationRole::TermAccession.label().to_string());
                }
            }
        }
    }

    let schema = SheetSchema::resolve(&labels)?;
    if schema.slots.len() != slot_order.len() {
        return Err(IsaError::MalformedHeader {
            column: 1,
            label: labels.join("\t"),
            reason: "graph cannot be laid out as a sheet".to_string(),
        });
    }
    debug_assert!(schema.slots.iter().zip(&slot_order).all(|(slot, (_, signature))| {
        match (slot.kind, signature) {
            (SlotKind::Material { kind, .. }, Signature::Material(expected)) => kind == *expected,
            (SlotKind::Process { .. }, Signature::Process { .. }) => true,
            _ => false,
        }
    }));
    Ok((schema, placement))
}

fn depths<'g>(graph: &'g Graph, nodes: &[Node<'g>]) -> HashMap<&'g str, usize> {
    let mut incoming: HashMap<&str, usize> = nodes.iter().map(|node| (node.key(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for arc in &graph.arcs {
        *incoming.entry(arc.head.as_str()).or_default() += 1;
        successors
            .entry(arc.tail.as_str())
            .or_default()
            .push(arc.head.as_str());
    }

    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|node| node.key())
        .filter(|key| incoming.get(key).copied().unwrap_or(0) == 0)
        .collect();
    for key in &queue {
        depth.insert(*key, 0);
    }
    while let Some(key) = queue.pop_front() {
        let level = depth.get(key).copied().unwrap_or(0);
        for &head in successors.get(key).map(Vec::as_slice).unwrap_or_default() {
            let entry = depth.entry(head).or_insert(0);
            *entry = (*entry).max(level + 1);
            if let Some(count) = incoming.get_mut(head) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(head);
                }
            }
        }
    }
    depth
}
