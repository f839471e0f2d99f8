use std::collections::HashSet;
use std::io::BufRead;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use regex::Regex;

use crate::domain::{
    Annotated, AssayInfo, BasicInfo, Comment, Contact, FactorInfo, Investigation,
    OntologySourceRef, ProtocolInfo, Publication, StudyInfo,
};
use crate::error::IsaError;
use crate::tokenizer::{LineReader, QuotePolicy};
use crate::warning::{Warning, Warnings};

static COMMENT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Comment\s*\[(.*)\]$").expect("comment label pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    OntologySources,
    Investigation,
    InvestigationPublications,
    InvestigationContacts,
    Study,
    StudyDesigns,
    StudyPublications,
    StudyFactors,
    StudyAssays,
    StudyProtocols,
    StudyContacts,
}

impl SectionKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "ONTOLOGY SOURCE REFERENCE" => Some(SectionKind::OntologySources),
            "INVESTIGATION" => Some(SectionKind::Investigation),
            "INVESTIGATION PUBLICATIONS" => Some(SectionKind::InvestigationPublications),
            "INVESTIGATION CONTACTS" => Some(SectionKind::InvestigationContacts),
            "STUDY" => Some(SectionKind::Study),
            "STUDY DESIGN DESCRIPTORS" => Some(SectionKind::StudyDesigns),
            "STUDY PUBLICATIONS" => Some(SectionKind::StudyPublications),
            "STUDY FACTORS" => Some(SectionKind::StudyFactors),
            "STUDY ASSAYS" => Some(SectionKind::StudyAssays),
            "STUDY PROTOCOLS" => Some(SectionKind::StudyProtocols),
            "STUDY CONTACTS" => Some(SectionKind::StudyContacts),
            _ => None,
        }
    }

    fn allowed_labels(&self) -> Vec<String> {
        match self {
            SectionKind::OntologySources => fixed_labels(&[
                "Term Source Name",
                "Term Source File",
                "Term Source Version",
                "Term Source Description",
            ]),
            SectionKind::Investigation => basic_labels("Investigation"),
            SectionKind::Study => {
                let mut labels = basic_labels("Study");
                labels.push("Study File Name".to_string());
                labels
            }
            SectionKind::InvestigationPublications => publication_labels("Investigation"),
            SectionKind::StudyPublications => publication_labels("Study"),
            SectionKind::InvestigationContacts => contact_labels("Investigation"),
            SectionKind::StudyContacts => contact_labels("Study"),
            SectionKind::StudyDesigns => fixed_labels(&[
                "Study Design Type",
                "Study Design Type Term Accession Number",
                "Study Design Type Term Source REF",
            ]),
            SectionKind::StudyFactors => fixed_labels(&[
                "Study Factor Name",
                "Study Factor Type",
                "Study Factor Type Term Accession Number",
                "Study Factor Type Term Source REF",
            ]),
            SectionKind::StudyAssays => fixed_labels(&[
                "Study Assay File Name",
                "Study Assay Measurement Type",
                "Study Assay Measurement Type Term Accession Number",
                "Study Assay Measurement Type Term Source REF",
                "Study Assay Technology Type",
                "Study Assay Technology Type Term Accession Number",
                "Study Assay Technology Type Term Source REF",
                "Study Assay Technology Platform",
            ]),
            SectionKind::StudyProtocols => fixed_labels(&[
                "Study Protocol Name",
                "Study Protocol Type",
                "Study Protocol Type Term Accession Number",
                "Study Protocol Type Term Source REF",
                "Study Protocol Description",
                "Study Protocol URI",
                "Study Protocol Version",
                "Study Protocol Parameters Name",
                "Study Protocol Parameters Name Term Accession Number",
                "Study Protocol Parameters Name Term Source REF",
                "Study Protocol Components Name",
                "Study Protocol Components Type",
                "Study Protocol Components Type Term Accession Number",
                "Study Protocol Components Type Term Source REF",
            ]),
        }
    }
}

fn fixed_labels(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| label.to_string()).collect()
}

fn basic_labels(prefix: &str) -> Vec<String> {
    [
        "Identifier",
        "Title",
        "Description",
        "Submission Date",
        "Public Release Date",
    ]
    .iter()
    .map(|suffix| format!("{prefix} {suffix}"))
    .collect()
}

fn publication_labels(prefix: &str) -> Vec<String> {
    [
        "PubMed ID",
        "Publication DOI",
        "Publication Author List",
        "Publication Title",
        "Publication Status",
        "Publication Status Term Accession Number",
        "Publication Status Term Source REF",
    ]
    .iter()
    .map(|suffix| format!("{prefix} {suffix}"))
    .collect()
}

fn contact_labels(prefix: &str) -> Vec<String> {
    [
        "Last Name",
        "First Name",
        "Mid Initials",
        "Email",
        "Phone",
        "Fax",
        "Address",
        "Affiliation",
        "Roles",
        "Roles Term Accession Number",
        "Roles Term Source REF",
    ]
    .iter()
    .map(|suffix| format!("{prefix} Person {suffix}"))
    .collect()
}

#[derive(Debug)]
struct SectionRow {
    line: usize,
    label: String,
    values: Vec<String>,
}

#[derive(Debug)]
struct Section {
    kind: SectionKind,
    line: usize,
    rows: Vec<SectionRow>,
}

impl Section {
    fn check_labels(&self) -> Result<(), IsaError> {
        let allowed = self.kind.allowed_labels();
        let mut seen = HashSet::new();
        for row in &self.rows {
            let known =
                allowed.iter().any(|label| label == &row.label) || COMMENT_LABEL.is_match(&row.label);
            if !known {
                return Err(IsaError::InvalidInvestigation {
                    line: row.line,
                    message: format!("unexpected row label {:?}", row.label),
                });
            }
            if !seen.insert(row.label.as_str()) {
                return Err(IsaError::InvalidInvestigation {
                    line: row.line,
                    message: format!("duplicate row label {:?}", row.label),
                });
            }
        }
        Ok(())
    }

    fn width(&self) -> usize {
        self.rows.iter().map(|row| row.values.len()).max().unwrap_or(0)
    }

    fn value(&self, label: &str, idx: usize) -> String {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .and_then(|row| row.values.get(idx))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    fn annotated(&self, label: &str, idx: usize) -> Annotated {
        let non_empty = |value: String| (!value.is_empty()).then_some(value);
        Annotated {
            text: self.value(label, idx),
            term_source: non_empty(self.value(&format!("{label} Term Source REF"), idx)),
            accession: non_empty(self.value(&format!("{label} Term Accession Number"), idx)),
        }
    }

    fn comments(&self, idx: usize) -> Vec<Comment> {
        self.rows
            .iter()
            .filter_map(|row| {
                let captures = COMMENT_LABEL.captures(&row.label)?;
                let value = row.values.get(idx)?.trim();
                (!value.is_empty()).then(|| Comment {
                    name: captures[1].trim().to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    fn is_blank(&self, idx: usize) -> bool {
        self.rows.iter().all(|row| {
            row.values
                .get(idx)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
    }

    fn invalid(&self, message: impl Into<String>) -> IsaError {
        IsaError::InvalidInvestigation {
            line: self.line,
            message: message.into(),
        }
    }
}

pub struct InvestigationReader<R> {
    reader: R,
    path: Option<Utf8PathBuf>,
}

impl<R: BufRead> InvestigationReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, path: None }
    }

    pub fn with_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn read(self) -> Result<(Investigation, Vec<Warning>), IsaError> {
        let sections = collect_sections(self.reader)?;
        let mut warnings = Warnings::new();
        let mut investigation = Investigation::default();

        for section in &sections {
            section.check_labels()?;
            match section.kind {
                SectionKind::OntologySources => {
                    read_ontology_sources(section, &mut investigation, &mut warnings)?
                }
                SectionKind::Investigation => {
                    investigation.info = read_basic_info(section, "Investigation");
                }
                SectionKind::InvestigationPublications => {
                    investigation.publications = read_publications(section, "Investigation");
                }
                SectionKind::InvestigationContacts => {
                    investigation.contacts = read_contacts(section, "Investigation");
                }
                SectionKind::Study => investigation.studies.push(StudyInfo {
                    info: read_basic_info(section, "Study"),
                    ..StudyInfo::default()
                }),
                SectionKind::StudyDesigns => {
                    let study = current_study(&mut investigation, section)?;
                    study.designs = (0..section.width())
                        .filter(|&idx| !section.is_blank(idx))
                        .map(|idx| section.annotated("Study Design Type", idx))
                        .collect();
                }
                SectionKind::StudyPublications => {
                    current_study(&mut investigation, section)?.publications =
                        read_publications(section, "Study");
                }
                SectionKind::StudyContacts => {
                    current_study(&mut investigation, section)?.contacts =
                        read_contacts(section, "Study");
                }
                SectionKind::StudyFactors => {
                    let study = current_study(&mut investigation, section)?;
                    read_factors(section, study, &mut warnings)?
                }
                SectionKind::StudyAssays => {
                    let study = current_study(&mut investigation, section)?;
                    read_assays(section, study, &mut warnings)?
                }
                SectionKind::StudyProtocols => {
                    let study = current_study(&mut investigation, section)?;
                    read_protocols(section, study, &mut warnings)?
                }
            }
        }

        investigation.info.path = self.path;
        tracing::debug!(
            studies = investigation.studies.len(),
            ontology_sources = investigation.ontology_sources.len(),
            "read investigation"
        );
        Ok((investigation, warnings.into_vec()))
    }
}

fn current_study<'i>(
    investigation: &'i mut Investigation,
    section: &Section,
) -> Result<&'i mut StudyInfo, IsaError> {
    investigation
        .studies
        .last_mut()
        .ok_or_else(|| section.invalid("study section before STUDY"))
}

pub fn read_investigation<R: BufRead>(reader: R) -> Result<(Investigation, Vec<Warning>), IsaError> {
    InvestigationReader::new(reader).read()
}

fn collect_sections<R: BufRead>(reader: R) -> Result<Vec<Section>, IsaError> {
    let mut sections: Vec<Section> = Vec::new();
    for row in LineReader::new(reader, QuotePolicy::Char('"')) {
        let row = row?;
        let label = row.cells[0].trim();
        if label.starts_with('#') {
            continue;
        }
        if let Some(kind) = SectionKind::from_keyword(label) {
            sections.push(Section {
                kind,
                line: row.line,
                rows: Vec::new(),
            });
            continue;
        }
        let section = sections
            .last_mut()
            .ok_or_else(|| IsaError::InvalidInvestigation {
                line: row.line,
                message: format!("row {label:?} outside of any section"),
            })?;
        section.rows.push(SectionRow {
            line: row.line,
            label: label.to_string(),
            values: row.cells[1..].to_vec(),
        });
    }
    if sections.is_empty() {
        return Err(IsaError::InvalidInvestigation {
            line: 0,
            message: "no sections found".to_string(),
        });
    }
    Ok(sections)
}

fn read_ontology_sources(
    section: &Section,
    investigation: &mut Investigation,
    warnings: &mut Warnings,
) -> Result<(), IsaError> {
    for idx in 0..section.width() {
        let source = OntologySourceRef {
            name: section.value("Term Source Name", idx),
            file: section.value("Term Source File", idx),
            version: section.value("Term Source Version", idx),
            description: section.value("Term Source Description", idx),
            comments: section.comments(idx),
        };
        if source.name.is_empty() {
            if section.is_blank(idx) {
                warnings.parse(format!(
                    "Skipping empty ontology source: {}, {}, {}, {}",
                    source.name, source.file, source.version, source.description
                ));
                continue;
            }
            return Err(section.invalid(format!("ontology source {} has no name", idx + 1)));
        }
        if investigation.ontology_sources.contains_key(&source.name) {
            warnings.parse(format!(
                "Skipping duplicate ontology source: {}",
                source.name
            ));
            continue;
        }
        investigation
            .ontology_sources
            .insert(source.name.clone(), source);
    }
    Ok(())
}

fn read_basic_info(section: &Section, prefix: &str) -> BasicInfo {
    let path = (prefix == "Study")
        .then(|| section.value("Study File Name", 0))
        .filter(|path| !path.is_empty())
        .map(Utf8PathBuf::from);
    BasicInfo {
        path,
        identifier: section.value(&format!("{prefix} Identifier"), 0),
        title: section.value(&format!("{prefix} Title"), 0),
        description: section.value(&format!("{prefix} Description"), 0),
        submission_date: section.value(&format!("{prefix} Submission Date"), 0),
        public_release_date: section.value(&format!("{prefix} Public Release Date"), 0),
        comments: section.comments(0),
    }
}

fn read_publications(section: &Section, prefix: &str) -> Vec<Publication> {
    (0..section.width())
        .filter(|&idx| !section.is_blank(idx))
        .map(|idx| Publication {
            pubmed_id: section.value(&format!("{prefix} PubMed ID"), idx),
            doi: section.value(&format!("{prefix} Publication DOI"), idx),
            author_list: section.value(&format!("{prefix} Publication Author List"), idx),
            title: section.value(&format!("{prefix} Publication Title"), idx),
            status: section.annotated(&format!("{prefix} Publication Status"), idx),
            comments: section.comments(idx),
        })
        .collect()
}

fn read_contacts(section: &Section, prefix: &str) -> Vec<Contact> {
    let label = |suffix: &str| format!("{prefix} Person {suffix}");
    (0..section.width())
        .filter(|&idx| !section.is_blank(idx))
        .map(|idx| Contact {
            last_name: section.value(&label("Last Name"), idx),
            first_name: section.value(&label("First Name"), idx),
            mid_initial: section.value(&label("Mid Initials"), idx),
            email: section.value(&label("Email"), idx),
            phone: section.value(&label("Phone"), idx),
            fax: section.value(&label("Fax"), idx),
            address: section.value(&label("Address"), idx),
            affiliation: section.value(&label("Affiliation"), idx),
            role: section.annotated(&label("Roles"), idx),
            comments: section.comments(idx),
        })
        .collect()
}

fn read_factors(
    section: &Section,
    study: &mut StudyInfo,
    warnings: &mut Warnings,
) -> Result<(), IsaError> {
    for idx in 0..section.width() {
        if section.is_blank(idx) {
            warnings.parse("Skipping empty study factor");
            continue;
        }
        let name = section.value("Study Factor Name", idx);
        if name.is_empty() {
            return Err(section.invalid(format!("study factor {} has no name", idx + 1)));
        }
        if study.factors.contains_key(&name) {
            warnings.parse(format!("Skipping duplicate study factor: {name}"));
            continue;
        }
        let factor = FactorInfo {
            name: name.clone(),
            factor_type: section.annotated("Study Factor Type", idx),
            comments: section.comments(idx),
        };
        study.factors.insert(name, factor);
    }
    Ok(())
}

fn read_assays(
    section: &Section,
    study: &mut StudyInfo,
    warnings: &mut Warnings,
) -> Result<(), IsaError> {
    for idx in 0..section.width() {
        if section.is_blank(idx) {
            warnings.parse("Skipping empty study assay");
            continue;
        }
        let path = section.value("Study Assay File Name", idx);
        if path.is_empty() {
            return Err(section.invalid(format!("study assay {} has no file name", idx + 1)));
        }
        if study.assays.contains_key(&path) {
            warnings.parse(format!("Skipping duplicate study assay: {path}"));
            continue;
        }
        let assay = AssayInfo {
            path: Utf8PathBuf::from(&path),
            measurement_type: section.annotated("Study Assay Measurement Type", idx),
            technology_type: section.annotated("Study Assay Technology Type", idx),
            platform: section.value("Study Assay Technology Platform", idx),
            comments: section.comments(idx),
        };
        study.assays.insert(path, assay);
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(';').map(|part| part.trim().to_string()).collect()
}

fn read_protocols(
    section: &Section,
    study: &mut StudyInfo,
    warnings: &mut Warnings,
) -> Result<(), IsaError> {
    for idx in 0..section.width() {
        if section.is_blank(idx) {
            warnings.parse("Skipping empty study protocol");
            continue;
        }
        let name = section.value("Study Protocol Name", idx);
        if name.is_empty() {
            return Err(section.invalid(format!("study protocol {} has no name", idx + 1)));
        }
        if study.protocols.contains_key(&name) {
            warnings.parse(format!("Skipping duplicate study protocol: {name}"));
            continue;
        }

        let names = split_list(&section.value("Study Protocol Parameters Name", idx));
        let accessions = split_list(&section.value(
            "Study Protocol Parameters Name Term Accession Number",
            idx,
        ));
        let sources = split_list(&section.value("Study Protocol Parameters Name Term Source REF", idx));
        let parameters = names
            .into_iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(pos, name)| {
                let pick = |list: &[String]| list.get(pos).filter(|value| !value.is_empty()).cloned();
                let value = Annotated {
                    text: name.clone(),
                    term_source: pick(&sources),
                    accession: pick(&accessions),
                };
                (name, value)
            })
            .collect();
        let components = split_list(&section.value("Study Protocol Components Name", idx))
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();

        let protocol = ProtocolInfo {
            name: name.clone(),
            protocol_type: section.annotated("Study Protocol Type", idx),
            description: section.value("Study Protocol Description", idx),
            uri: section.value("Study Protocol URI", idx),
            version: section.value("Study Protocol Version", idx),
            parameters,
            components,
            comments: section.comments(idx),
        };
        study.protocols.insert(name, protocol);
    }
    Ok(())
}
