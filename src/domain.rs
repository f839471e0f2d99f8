use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::IsaError;
use crate::schema::SheetSchema;

pub const UNKNOWN_PROTOCOL: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Annotated {
    pub text: String,
    pub term_source: Option<String>,
    pub accession: Option<String>,
}

impl Annotated {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            term_source: None,
            accession: None,
        }
    }

    pub fn term(
        text: impl Into<String>,
        term_source: impl Into<String>,
        accession: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            term_source: Some(term_source.into()),
            accession: Some(accession.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.term_source.as_deref().unwrap_or_default().is_empty()
            && self.accession.as_deref().unwrap_or_default().is_empty()
    }
}

impl fmt::Display for Annotated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OntologySourceRef {
    pub name: String,
    pub file: String,
    pub version: String,
    pub description: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasicInfo {
    pub path: Option<Utf8PathBuf>,
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub submission_date: String,
    pub public_release_date: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Publication {
    pub pubmed_id: String,
    pub doi: String,
    pub author_list: String,
    pub title: String,
    pub status: Annotated,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub last_name: String,
    pub first_name: String,
    pub mid_initial: String,
    pub email: String,
    pub phone: String,
    pub fax: String,
    pub address: String,
    pub affiliation: String,
    pub role: Annotated,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactorInfo {
    pub name: String,
    pub factor_type: Annotated,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssayInfo {
    pub path: Utf8PathBuf,
    pub measurement_type: Annotated,
    pub technology_type: Annotated,
    pub platform: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolInfo {
    pub name: String,
    pub protocol_type: Annotated,
    pub description: String,
    pub uri: String,
    pub version: String,
    pub parameters: IndexMap<String, Annotated>,
    pub components: Vec<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudyInfo {
    pub info: BasicInfo,
    pub designs: Vec<Annotated>,
    pub publications: Vec<Publication>,
    pub factors: IndexMap<String, FactorInfo>,
    /// Keyed by the assay file path as written in the investigation.
    pub assays: IndexMap<String, AssayInfo>,
    pub protocols: IndexMap<String, ProtocolInfo>,
    pub contacts: Vec<Contact>,
}

impl StudyInfo {
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        self.info.path.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Investigation {
    pub info: BasicInfo,
    pub ontology_sources: IndexMap<String, OntologySourceRef>,
    pub publications: Vec<Publication>,
    pub contacts: Vec<Contact>,
    pub studies: Vec<StudyInfo>,
}

impl Investigation {
    pub fn study_number(&self, study: &StudyInfo) -> Option<usize> {
        self.studies
            .iter()
            .position(|candidate| {
                candidate.info.identifier == study.info.identifier
                    && candidate.info.path == study.info.path
            })
            .map(|idx| idx + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataFileKind {
    RawData,
    DerivedData,
    ArrayData,
    ArrayDataMatrix,
    DerivedArrayData,
    DerivedArrayDataMatrix,
    RawSpectralData,
    DerivedSpectralData,
    FreeInductionDecayData,
    AcquisitionParameterData,
    Image,
    SpotPicking,
    ProteinAssignment,
    PeptideAssignment,
    PostTranslationalModificationAssignment,
    MetaboliteAssignment,
}

impl DataFileKind {
    pub const ALL: [DataFileKind; 16] = [
        DataFileKind::RawData,
        DataFileKind::DerivedData,
        DataFileKind::ArrayData,
        DataFileKind::ArrayDataMatrix,
        DataFileKind::DerivedArrayData,
        DataFileKind::DerivedArrayDataMatrix,
        DataFileKind::RawSpectralData,
        DataFileKind::DerivedSpectralData,
        DataFileKind::FreeInductionDecayData,
        DataFileKind::AcquisitionParameterData,
        DataFileKind::Image,
        DataFileKind::SpotPicking,
        DataFileKind::ProteinAssignment,
        DataFileKind::PeptideAssignment,
        DataFileKind::PostTranslationalModificationAssignment,
        DataFileKind::MetaboliteAssignment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DataFileKind::RawData => "Raw Data File",
            DataFileKind::DerivedData => "Derived Data File",
            DataFileKind::ArrayData => "Array Data File",
            DataFileKind::ArrayDataMatrix => "Array Data Matrix File",
            DataFileKind::DerivedArrayData => "Derived Array Data File",
            DataFileKind::DerivedArrayDataMatrix => "Derived Array Data Matrix File",
            DataFileKind::RawSpectralData => "Raw Spectral Data File",
            DataFileKind::DerivedSpectralData => "Derived Spectral Data File",
            DataFileKind::FreeInductionDecayData => "Free Induction Decay Data File",
            DataFileKind::AcquisitionParameterData => "Acquisition Parameter Data File",
            DataFileKind::Image => "Image File",
            DataFileKind::SpotPicking => "Spot Picking File",
            DataFileKind::ProteinAssignment => "Protein Assignment File",
            DataFileKind::PeptideAssignment => "Peptide Assignment File",
            DataFileKind::PostTranslationalModificationAssignment => {
                "Post Translational Modification Assignment File"
            }
            DataFileKind::MetaboliteAssignment => "Metabolite Assignment File",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MaterialKind {
    Source,
    Sample,
    Extract,
    LabeledExtract,
    DataFile(DataFileKind),
}

impl MaterialKind {
    pub fn label(&self) -> &'static str {
        match self {
            MaterialKind::Source => "Source Name",
            MaterialKind::Sample => "Sample Name",
            MaterialKind::Extract => "Extract Name",
            MaterialKind::LabeledExtract => "Labeled Extract Name",
            MaterialKind::DataFile(kind) => kind.label(),
        }
    }

    pub fn is_study_scoped(&self) -> bool {
        matches!(self, MaterialKind::Source | MaterialKind::Sample)
    }

    fn slug(&self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

impl FromStr for MaterialKind {
    type Err = IsaError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "Source Name" => Ok(MaterialKind::Source),
            "Sample Name" => Ok(MaterialKind::Sample),
            "Extract Name" => Ok(MaterialKind::Extract),
            "Labeled Extract Name" => Ok(MaterialKind::LabeledExtract),
            _ => DataFileKind::ALL
                .into_iter()
                .find(|kind| kind.label() == label)
                .map(MaterialKind::DataFile)
                .ok_or_else(|| IsaError::UnknownLabel(label.to_string())),
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessNameType {
    AssayName,
    MsAssayName,
    NmrAssayName,
    HybridizationAssayName,
    GelElectrophoresisAssayName,
    ScanName,
    DataAcquisitionName,
    NormalizationName,
    DataTransformationName,
}

impl ProcessNameType {
    pub const ALL: [ProcessNameType; 9] = [
        ProcessNameType::AssayName,
        ProcessNameType::MsAssayName,
        ProcessNameType::NmrAssayName,
        ProcessNameType::HybridizationAssayName,
        ProcessNameType::GelElectrophoresisAssayName,
        ProcessNameType::ScanName,
        ProcessNameType::DataAcquisitionName,
        ProcessNameType::NormalizationName,
        ProcessNameType::DataTransformationName,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProcessNameType::AssayName => "Assay Name",
            ProcessNameType::MsAssayName => "MS Assay Name",
            ProcessNameType::NmrAssayName => "NMR Assay Name",
            ProcessNameType::HybridizationAssayName => "Hybridization Assay Name",
            ProcessNameType::GelElectrophoresisAssayName => "Gel Electrophoresis Assay Name",
            ProcessNameType::ScanName => "Scan Name",
            ProcessNameType::DataAcquisitionName => "Data Acquisition Name",
            ProcessNameType::NormalizationName => "Normalization Name",
            ProcessNameType::DataTransformationName => "Data Transformation Name",
        }
    }

    /// Protocol types a process with this name column may declare. Empty
    /// means any protocol type is accepted.
    pub fn accepted_protocol_types(&self) -> &'static [&'static str] {
        match self {
            ProcessNameType::AssayName => &[],
            ProcessNameType::MsAssayName => &["mass spectrometry"],
            ProcessNameType::NmrAssayName => &["nmr spectroscopy"],
            ProcessNameType::HybridizationAssayName => &["nucleic acid hybridization"],
            ProcessNameType::GelElectrophoresisAssayName => &["electrophoresis"],
            ProcessNameType::ScanName => &["data collection"],
            ProcessNameType::DataAcquisitionName => &["data acquisition"],
            ProcessNameType::NormalizationName => &["data normalization"],
            ProcessNameType::DataTransformationName => &["data transformation"],
        }
    }

    fn slug(&self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

impl FromStr for ProcessNameType {
    type Err = IsaError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == label)
            .ok_or_else(|| IsaError::UnknownLabel(label.to_string()))
    }
}

impl fmt::Display for ProcessNameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeKey {
    Characteristic(String),
    FactorValue(String),
    ParameterValue(String),
    Comment(String),
    MaterialType,
    Label,
    Description,
    Performer,
    Date,
    ArrayDesignRef,
    FirstDimension,
    SecondDimension,
}

impl AttributeKey {
    pub fn label(&self) -> String {
        match self {
            AttributeKey::Characteristic(name) => format!("Characteristics[{name}]"),
            AttributeKey::FactorValue(name) => format!("Factor Value[{name}]"),
            AttributeKey::ParameterValue(name) => format!("Parameter Value[{name}]"),
            AttributeKey::Comment(name) => format!("Comment[{name}]"),
            AttributeKey::MaterialType => "Material Type".to_string(),
            AttributeKey::Label => "Label".to_string(),
            AttributeKey::Description => "Description".to_string(),
            AttributeKey::Performer => "Performer".to_string(),
            AttributeKey::Date => "Date".to_string(),
            AttributeKey::ArrayDesignRef => "Array Design REF".to_string(),
            AttributeKey::FirstDimension => "First Dimension".to_string(),
            AttributeKey::SecondDimension => "Second Dimension".to_string(),
        }
    }

    pub fn is_annotatable(&self) -> bool {
        matches!(
            self,
            AttributeKey::Characteristic(_)
                | AttributeKey::FactorValue(_)
                | AttributeKey::ParameterValue(_)
                | AttributeKey::MaterialType
                | AttributeKey::Label
                | AttributeKey::FirstDimension
                | AttributeKey::SecondDimension
        )
    }

    pub fn accepts_unit(&self) -> bool {
        matches!(
            self,
            AttributeKey::Characteristic(_)
                | AttributeKey::FactorValue(_)
                | AttributeKey::ParameterValue(_)
        )
    }

    pub fn applies_to_material(&self) -> bool {
        matches!(
            self,
            AttributeKey::Characteristic(_)
                | AttributeKey::FactorValue(_)
                | AttributeKey::Comment(_)
                | AttributeKey::MaterialType
                | AttributeKey::Label
                | AttributeKey::Description
        )
    }

    pub fn applies_to_process(&self) -> bool {
        matches!(
            self,
            AttributeKey::ParameterValue(_)
                | AttributeKey::Comment(_)
                | AttributeKey::Performer
                | AttributeKey::Date
                | AttributeKey::ArrayDesignRef
                | AttributeKey::FirstDimension
                | AttributeKey::SecondDimension
        )
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub key: AttributeKey,
    pub value: Annotated,
    pub unit: Option<Annotated>,
}

impl Attribute {
    pub fn new(key: AttributeKey, value: Annotated) -> Self {
        Self {
            key,
            value,
            unit: None,
        }
    }
}

fn find_attribute<'a>(attributes: &'a [Attribute], key: &AttributeKey) -> Option<&'a Attribute> {
    attributes.iter().find(|attr| &attr.key == key)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Material {
    pub key: String,
    pub name: String,
    pub kind: MaterialKind,
    pub attributes: Vec<Attribute>,
}

impl Material {
    pub fn new(key: impl Into<String>, name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &AttributeKey) -> Option<&Attribute> {
        find_attribute(&self.attributes, key)
    }

    pub fn characteristics(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| matches!(attr.key, AttributeKey::Characteristic(_)))
    }

    pub fn factor_values(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| matches!(attr.key, AttributeKey::FactorValue(_)))
    }

    pub fn comments(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| matches!(attr.key, AttributeKey::Comment(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub key: String,
    pub protocol_ref: String,
    pub name: Option<String>,
    pub name_type: Option<ProcessNameType>,
    pub attributes: Vec<Attribute>,
}

impl Process {
    pub fn new(key: impl Into<String>, protocol_ref: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            protocol_ref: protocol_ref.into(),
            name: None,
            name_type: None,
            attributes: Vec::new(),
        }
    }

    pub fn has_unknown_protocol(&self) -> bool {
        self.protocol_ref.is_empty() || self.protocol_ref == UNKNOWN_PROTOCOL
    }

    pub fn attribute(&self, key: &AttributeKey) -> Option<&Attribute> {
        find_attribute(&self.attributes, key)
    }

    pub fn parameter_values(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| matches!(attr.key, AttributeKey::ParameterValue(_)))
    }

    pub fn performer(&self) -> Option<&str> {
        self.attribute(&AttributeKey::Performer)
            .map(|attr| attr.value.text.as_str())
    }

    pub fn date(&self) -> Option<&str> {
        self.attribute(&AttributeKey::Date)
            .map(|attr| attr.value.text.as_str())
    }

    pub fn comments(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|attr| matches!(attr.key, AttributeKey::Comment(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Arc {
    pub tail: String,
    pub head: String,
}

impl Arc {
    pub fn new(tail: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            tail: tail.into(),
            head: head.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeHandle {
    Material(usize),
    Process(usize),
}

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Material(&'a Material),
    Process(&'a Process),
}

impl<'a> Node<'a> {
    pub fn key(&self) -> &'a str {
        match self {
            Node::Material(material) => &material.key,
            Node::Process(process) => &process.key,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Node::Material(material) => &material.name,
            Node::Process(process) => process.name.as_deref().unwrap_or(&process.protocol_ref),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SheetId {
    pub study: usize,
    pub assay: Option<usize>,
}

impl SheetId {
    pub fn study(study: usize) -> Self {
        Self { study, assay: None }
    }

    pub fn assay(study: usize, assay: usize) -> Self {
        Self {
            study,
            assay: Some(assay),
        }
    }

    pub fn is_assay(&self) -> bool {
        self.assay.is_some()
    }

    pub fn study_prefix(&self) -> String {
        format!("S{}", self.study)
    }

    pub fn prefix(&self) -> String {
        match self.assay {
            Some(assay) => format!("S{}-A{assay}", self.study),
            None => self.study_prefix(),
        }
    }

    pub fn material_key(&self, kind: MaterialKind, name: &str) -> String {
        let prefix = if kind.is_study_scoped() {
            self.study_prefix()
        } else {
            self.prefix()
        };
        format!("{prefix}-{}-{name}", kind.slug())
    }

    pub fn named_process_key(&self, name_type: ProcessNameType, name: &str) -> String {
        format!("{}-process-{}-{name}", self.prefix(), name_type.slug())
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub sheet: SheetId,
    pub path: Option<Utf8PathBuf>,
    pub schema: Option<SheetSchema>,
    pub materials: IndexMap<String, Material>,
    pub processes: IndexMap<String, Process>,
    pub arcs: Vec<Arc>,
    order: Vec<NodeHandle>,
    placement: HashMap<String, usize>,
    arc_set: HashSet<Arc>,
}

impl Graph {
    pub fn new(sheet: SheetId) -> Self {
        Self {
            sheet,
            path: None,
            schema: None,
            materials: IndexMap::new(),
            processes: IndexMap::new(),
            arcs: Vec::new(),
            order: Vec::new(),
            placement: HashMap::new(),
            arc_set: HashSet::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.materials.contains_key(key) || self.processes.contains_key(key)
    }

    pub fn add_material(&mut self, material: Material) -> NodeHandle {
        if let Some(idx) = self.materials.get_index_of(&material.key) {
            return NodeHandle::Material(idx);
        }
        let (idx, _) = self.materials.insert_full(material.key.clone(), material);
        let handle = NodeHandle::Material(idx);
        self.order.push(handle);
        handle
    }

    pub fn add_process(&mut self, process: Process) -> NodeHandle {
        if let Some(idx) = self.processes.get_index_of(&process.key) {
            return NodeHandle::Process(idx);
        }
        let (idx, _) = self.processes.insert_full(process.key.clone(), process);
        let handle = NodeHandle::Process(idx);
        self.order.push(handle);
        handle
    }

    pub fn add_arc(&mut self, tail: &str, head: &str) {
        let arc = Arc::new(tail, head);
        if self.arc_set.insert(arc.clone()) {
            self.arcs.push(arc);
        }
    }

    pub fn node(&self, handle: NodeHandle) -> Option<Node<'_>> {
        match handle {
            NodeHandle::Material(idx) => self
                .materials
                .get_index(idx)
                .map(|(_, material)| Node::Material(material)),
            NodeHandle::Process(idx) => self
                .processes
                .get_index(idx)
                .map(|(_, process)| Node::Process(process)),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Node<'_>> {
        self.materials
            .get(key)
            .map(Node::Material)
            .or_else(|| self.processes.get(key).map(Node::Process))
    }

    /// Nodes in discovery order (row-major, then column-major). Nodes added
    /// directly to the public maps come after the tracked ones.
    pub fn nodes(&self) -> Vec<Node<'_>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(self.materials.len() + self.processes.len());
        for handle in &self.order {
            if let Some(node) = self.node(*handle) {
                if seen.insert(node.key().to_string()) {
                    nodes.push(node);
                }
            }
        }
        for material in self.materials.values() {
            if seen.insert(material.key.clone()) {
                nodes.push(Node::Material(material));
            }
        }
        for process in self.processes.values() {
            if seen.insert(process.key.clone()) {
                nodes.push(Node::Process(process));
            }
        }
        nodes
    }

    pub fn place(&mut self, key: &str, slot: usize) {
        self.placement.entry(key.to_string()).or_insert(slot);
    }

    pub fn placement(&self, key: &str) -> Option<usize> {
        self.placement.get(key).copied()
    }

    pub fn dangling_arc(&self) -> Option<&Arc> {
        self.arcs
            .iter()
            .find(|arc| !self.contains(&arc.tail) || !self.contains(&arc.head))
    }
}
