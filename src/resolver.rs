use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::domain::{
    Annotated, AssayInfo, Attribute, AttributeKey, FactorInfo, Graph, Investigation, Material, MaterialKind,
    ProtocolInfo, StudyInfo,
};
use crate::error::IsaError;
use crate::warning::{Warning, Warnings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub attribute: String,
    pub study_value: String,
    pub assay_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMaterial {
    pub material: Material,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext<'a> {
    pub investigation: &'a Investigation,
    pub study: &'a StudyInfo,
    pub assay: Option<&'a AssayInfo>,
    pub ontology_sources: HashSet<&'a str>,
    pub study_samples: Option<HashSet<String>>,
    pub shared_materials: IndexMap<String, SharedMaterial>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        investigation: &'a Investigation,
        study: &'a StudyInfo,
        assay: Option<&'a AssayInfo>,
    ) -> Self {
        Self {
            investigation,
            study,
            assay,
            ontology_sources: investigation
                .ontology_sources
                .keys()
                .map(String::as_str)
                .collect(),
            study_samples: None,
            shared_materials: IndexMap::new(),
        }
    }

    pub fn protocols(&self) -> &'a IndexMap<String, ProtocolInfo> {
        &self.study.protocols
    }

    pub fn factors(&self) -> &'a IndexMap<String, FactorInfo> {
        &self.study.factors
    }

    pub fn has_ontology_source(&self, name: &str) -> bool {
        self.ontology_sources.contains(name)
    }

    pub fn material<'g>(&'g self, graph: &'g Graph, key: &str) -> Option<&'g Material> {
        self.shared_materials
            .get(key)
            .map(|shared| &shared.material)
            .or_else(|| graph.materials.get(key))
    }
}

pub struct Resolver<'a> {
    investigation: &'a Investigation,
    study: &'a StudyInfo,
    directory: Utf8PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(
        investigation: &'a Investigation,
        study: &'a StudyInfo,
        investigation_path: &Utf8Path,
    ) -> Self {
        let directory = investigation_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();
        Self {
            investigation,
            study,
            directory,
        }
    }

    pub fn resolve_path(&self, relative: &Utf8Path) -> Result<Utf8PathBuf, IsaError> {
        let path = self.directory.join(relative);
        if relative.as_str().is_empty() || !path.is_file() {
            return Err(IsaError::UnresolvablePath(path));
        }
        Ok(path)
    }

    pub fn study_path(&self) -> Result<Utf8PathBuf, IsaError> {
        let relative = self
            .study
            .path()
            .ok_or_else(|| IsaError::UnresolvablePath(self.directory.clone()))?;
        self.resolve_path(relative)
    }

    pub fn assay_path(&self, assay: &AssayInfo) -> Result<Utf8PathBuf, IsaError> {
        self.resolve_path(&assay.path)
    }

    pub fn study_context(&self) -> ResolutionContext<'a> {
        ResolutionContext::new(self.investigation, self.study, None)
    }

    /// Unifies the materials an assay shares with its study. Conflicting
    /// values are kept on both sides and reported as moderate warnings.
    pub fn assay_context(
        &self,
        assay: &'a AssayInfo,
        study_graph: &Graph,
        assay_graph: &Graph,
    ) -> (ResolutionContext<'a>, Vec<Warning>) {
        let mut warnings = Warnings::new();
        let mut context = ResolutionContext::new(self.investigation, self.study, Some(assay));
        context.study_samples = Some(
            study_graph
                .materials
                .values()
                .filter(|material| material.kind == MaterialKind::Sample)
                .map(|material| material.key.clone())
                .collect(),
        );

        for (key, assay_material) in &assay_graph.materials {
            let Some(study_material) = study_graph.materials.get(key) else {
                if let Some(other) = study_graph.materials.values().find(|material| {
                    material.name == assay_material.name
                        && material.kind != assay_material.kind
                        && assay_material.kind.is_study_scoped()
                }) {
                    warnings.moderate(format!(
                        "Conflicting kind for material \"{}\": \"{}\" in study {} but \"{}\" in assay {}",
                        assay_material.name,
                        other.kind,
                        self.study.path().map(|path| path.as_str()).unwrap_or_default(),
                        assay_material.kind,
                        assay.path
                    ));
                }
                continue;
            };
            let shared = unify(study_material, assay_material);
            for conflict in &shared.conflicts {
                warnings.moderate(format!(
                    "Conflicting {} for material \"{}\": \"{}\" in study {} but \"{}\" in assay {}",
                    conflict.attribute,
                    study_material.name,
                    conflict.study_value,
                    self.study.path().map(|path| path.as_str()).unwrap_or_default(),
                    conflict.assay_value,
                    assay.path
                ));
            }
            context.shared_materials.insert(key.clone(), shared);
        }

        tracing::debug!(
            assay = %assay.path,
            shared = context.shared_materials.len(),
            conflicts = warnings.len(),
            "resolved assay against study"
        );
        (context, warnings.into_vec())
    }
}

// Study-scoped attributes first declared by an assay, with that assay's path.
#[derive(Debug, Default)]
pub struct AssayLedger {
    declared: HashMap<(String, AttributeKey), (Attribute, Utf8PathBuf)>,
}

impl AssayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the sources and samples of `assay_graph` against the assays
    /// recorded before it, then records them. Attributes the study sheet
    /// declares are left to `assay_context`.
    pub fn record(
        &mut self,
        assay: &AssayInfo,
        study_graph: Option<&Graph>,
        assay_graph: &Graph,
    ) -> Vec<Warning> {
        let mut warnings = Warnings::new();
        for material in assay_graph.materials.values() {
            if !material.kind.is_study_scoped() {
                continue;
            }
            let study_material = study_graph.and_then(|graph| graph.materials.get(&material.key));
            for attribute in &material.attributes {
                if is_blank(attribute) {
                    continue;
                }
                let in_study = study_material.is_some_and(|study| {
                    study
                        .attribute(&attribute.key)
                        .is_some_and(|declared| !is_blank(declared))
                });
                if in_study {
                    continue;
                }
                let slot = (material.key.clone(), attribute.key.clone());
                match self.declared.get(&slot) {
                    Some((earlier, earlier_path)) => {
                        if attribute_conflict(earlier, attribute) {
                            warnings.moderate(format!(
                                "Conflicting {} for material \"{}\": \"{}\" in assay {} but \"{}\" in assay {}",
                                attribute.key,
                                material.name,
                                render(earlier),
                                earlier_path,
                                render(attribute),
                                assay.path
                            ));
                        }
                    }
                    None => {
                        self.declared
                            .insert(slot, (attribute.clone(), assay.path.clone()));
                    }
                }
            }
        }
        warnings.into_vec()
    }
}

fn is_blank(attribute: &Attribute) -> bool {
    attribute.value.is_empty() && attribute.unit.as_ref().is_none_or(Annotated::is_empty)
}

fn differs(left: &str, right: &str) -> bool {
    !left.is_empty() && !right.is_empty() && left != right
}

fn annotated_conflict(left: &Annotated, right: &Annotated) -> bool {
    differs(&left.text, &right.text)
        || differs(
            left.term_source.as_deref().unwrap_or_default(),
            right.term_source.as_deref().unwrap_or_default(),
        )
        || differs(
            left.accession.as_deref().unwrap_or_default(),
            right.accession.as_deref().unwrap_or_default(),
        )
}

fn attribute_conflict(left: &Attribute, right: &Attribute) -> bool {
    if annotated_conflict(&left.value, &right.value) {
        return true;
    }
    match (&left.unit, &right.unit) {
        (Some(left), Some(right)) => annotated_conflict(left, right),
        _ => false,
    }
}

fn render(attribute: &Attribute) -> String {
    match &attribute.unit {
        Some(unit) if !unit.text.is_empty() => format!("{} {}", attribute.value.text, unit.text),
        _ => attribute.value.text.clone(),
    }
}

fn unify(study: &Material, assay: &Material) -> SharedMaterial {
    let mut material = study.clone();
    let mut conflicts = Vec::new();
    for attribute in &assay.attributes {
        let position = material
            .attributes
            .iter()
            .position(|current| current.key == attribute.key);
        match position {
            None => material.attributes.push(attribute.clone()),
            Some(idx) => {
                let current = &mut material.attributes[idx];
                if attribute_conflict(current, attribute) {
                    conflicts.push(Conflict {
                        attribute: attribute.key.label(),
                        study_value: render(current),
                        assay_value: render(attribute),
                    });
                } else if current.value.text.is_empty() {
                    *current = attribute.clone();
                }
            }
        }
    }
    SharedMaterial {
        material,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_characteristic(value: &str) -> Material {
        let mut material = Material::new("S1-sample-name-x", "x", MaterialKind::Sample);
        material.attributes.push(Attribute::new(
            AttributeKey::Characteristic("organism".to_string()),
            Annotated::text(value),
        ));
        material
    }

    #[test]
    fn empty_assay_value_inherits_from_study() {
        let shared = unify(&with_characteristic("Homo sapiens"), &with_characteristic(""));
        assert!(shared.conflicts.is_empty());
        assert_eq!(shared.material.attributes[0].value.text, "Homo sapiens");
    }

    #[test]
    fn differing_values_are_preserved_as_conflict() {
        let shared = unify(&with_characteristic("Homo sapiens"), &with_characteristic("Mus musculus"));
        assert_eq!(shared.conflicts.len(), 1);
        assert_eq!(shared.conflicts[0].study_value, "Homo sapiens");
        assert_eq!(shared.conflicts[0].assay_value, "Mus musculus");
        assert_eq!(shared.material.attributes[0].value.text, "Homo sapiens");
    }
}
