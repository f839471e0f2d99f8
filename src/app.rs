use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::builder::{SheetRef, read_sheet};
use crate::config::ResolvedConfig;
use crate::domain::{Graph, Investigation, SheetId, StudyInfo};
use crate::dot::DotExporter;
use crate::error::IsaError;
use crate::investigation::InvestigationReader;
use crate::resolver::{AssayLedger, ResolutionContext, Resolver};
use crate::tokenizer::QuotePolicy;
use crate::validator::{Validator, validate_investigation};
use crate::warning::{Severity, Warning};
use crate::writer::write_sheet;

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    // Used for reading and writing, so written sheets read back unchanged.
    pub quote: QuotePolicy,
    pub output_dir: Option<Utf8PathBuf>,
    pub skip: Vec<Utf8PathBuf>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            quote: QuotePolicy::Char('"'),
            output_dir: None,
            skip: Vec::new(),
        }
    }
}

impl ProcessOptions {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            quote: config.quote,
            output_dir: None,
            skip: config.skip.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub investigation: Utf8PathBuf,
    pub warnings: Vec<Warning>,
    pub sheets: Vec<SheetReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    pub sheet: SheetId,
    pub path: Utf8PathBuf,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
    pub skipped: bool,
    pub written: Option<Utf8PathBuf>,
}

impl SheetReport {
    fn new(sheet: SheetId, path: &Utf8Path) -> Self {
        Self {
            sheet,
            path: path.to_path_buf(),
            warnings: Vec::new(),
            error: None,
            skipped: false,
            written: None,
        }
    }
}

impl Report {
    pub fn all_warnings(&self) -> impl Iterator<Item = &Warning> {
        self.warnings
            .iter()
            .chain(self.sheets.iter().flat_map(|sheet| sheet.warnings.iter()))
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.all_warnings().map(|warning| warning.severity).max()
    }

    pub fn failed_sheets(&self) -> usize {
        self.sheets.iter().filter(|sheet| sheet.error.is_some()).count()
    }

    pub fn severe_count(&self) -> usize {
        self.all_warnings()
            .filter(|warning| warning.is_severe())
            .count()
            + self.failed_sheets()
    }

    pub fn enforce_strict(&self) -> Result<(), IsaError> {
        match self.severe_count() {
            0 => Ok(()),
            count => Err(IsaError::StrictViolation { count }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default)]
pub struct App {
    options: ProcessOptions,
}

impl App {
    pub fn new(options: ProcessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProcessOptions {
        &self.options
    }

    /// Reads, resolves and validates an investigation with all its sheets,
    /// writing normalized sheets when an output directory is configured.
    /// A structural failure in one sheet is recorded in its report and does
    /// not stop the others.
    pub fn process(
        &self,
        investigation_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<Report, IsaError> {
        let start = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Read; investigation {investigation_path}"),
            elapsed: None,
        });
        let (investigation, mut warnings) = self.read_investigation(investigation_path)?;
        warnings.extend(validate_investigation(&investigation));

        if let Some(output_dir) = &self.options.output_dir {
            fs::create_dir_all(output_dir)?;
            if let Some(file_name) = investigation_path.file_name() {
                let target = output_dir.join(file_name);
                if !same_file(investigation_path, &target) {
                    fs::copy(investigation_path, &target)?;
                }
            }
        }

        let mut sheets = Vec::new();
        for study in &investigation.studies {
            self.process_study(&investigation, study, investigation_path, &mut sheets, sink);
        }

        let report = Report {
            investigation: investigation_path.to_path_buf(),
            warnings,
            sheets,
        };
        tracing::info!(
            investigation = %investigation_path,
            sheets = report.sheets.len(),
            failed = report.failed_sheets(),
            "processed investigation"
        );
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} sheet(s), {} warning(s)",
                report.sheets.len(),
                report.all_warnings().count()
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(report)
    }

    pub fn export_dot<W: Write>(
        &self,
        investigation_path: &Utf8Path,
        out: W,
        sink: &dyn ProgressSink,
    ) -> Result<W, IsaError> {
        let (investigation, _) = self.read_investigation(investigation_path)?;
        let mut exporter = DotExporter::new(out)?;
        for study in &investigation.studies {
            let resolver = Resolver::new(&investigation, study, investigation_path);
            let path = resolver.study_path()?;
            sink.event(ProgressEvent {
                message: format!("phase=Render; study {path}"),
                elapsed: None,
            });
            let (graph, _) = self.read_graph(&investigation, study, SheetRef::Study, &path)?;
            exporter.cluster(&graph)?;
            for assay in study.assays.values() {
                let path = resolver.assay_path(assay)?;
                sink.event(ProgressEvent {
                    message: format!("phase=Render; assay {path}"),
                    elapsed: None,
                });
                let (graph, _) =
                    self.read_graph(&investigation, study, SheetRef::Assay(assay), &path)?;
                exporter.cluster(&graph)?;
            }
        }
        exporter.finish()
    }

    fn read_investigation(
        &self,
        path: &Utf8Path,
    ) -> Result<(Investigation, Vec<Warning>), IsaError> {
        if !path.is_file() {
            return Err(IsaError::UnresolvablePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        InvestigationReader::new(BufReader::new(file))
            .with_path(path)
            .read()
    }

    fn read_graph(
        &self,
        investigation: &Investigation,
        study: &StudyInfo,
        sheet: SheetRef<'_>,
        path: &Utf8Path,
    ) -> Result<(Graph, Vec<Warning>), IsaError> {
        let file = File::open(path)?;
        read_sheet(
            investigation,
            study,
            sheet,
            BufReader::new(file),
            self.options.quote,
        )
    }

    fn process_study(
        &self,
        investigation: &Investigation,
        study: &StudyInfo,
        investigation_path: &Utf8Path,
        sheets: &mut Vec<SheetReport>,
        sink: &dyn ProgressSink,
    ) {
        let Some(study_number) = investigation.study_number(study) else {
            return;
        };
        let resolver = Resolver::new(investigation, study, investigation_path);

        let study_id = SheetId::study(study_number);
        let study_relative = study.path().cloned().unwrap_or_default();
        let mut study_report = SheetReport::new(study_id, &study_relative);
        sink.event(ProgressEvent {
            message: format!("phase=Validate; study {study_relative}"),
            elapsed: None,
        });
        let study_graph = match self.study_sheet(&resolver, investigation, study) {
            Ok((graph, warnings)) => {
                study_report.warnings = warnings;
                self.record_output(&graph, &mut study_report);
                Some(graph)
            }
            Err(err) => {
                tracing::warn!(sheet = %study_relative, error = %err, "study sheet failed");
                study_report.error = Some(err.to_string());
                None
            }
        };
        sheets.push(study_report);

        let mut ledger = AssayLedger::new();
        for (idx, assay) in study.assays.values().enumerate() {
            let mut report = SheetReport::new(SheetId::assay(study_number, idx + 1), &assay.path);
            if self.options.skip.contains(&assay.path) {
                tracing::info!(assay = %assay.path, "skipping assay");
                report.skipped = true;
                sheets.push(report);
                continue;
            }
            sink.event(ProgressEvent {
                message: format!("phase=Validate; assay {}", assay.path),
                elapsed: None,
            });
            let result = resolver.assay_path(assay).and_then(|path| {
                let (graph, mut warnings) =
                    self.read_graph(investigation, study, SheetRef::Assay(assay), &path)?;
                let (context, conflicts) = match &study_graph {
                    Some(study_graph) => resolver.assay_context(assay, study_graph, &graph),
                    None => (
                        ResolutionContext::new(investigation, study, Some(assay)),
                        Vec::new(),
                    ),
                };
                warnings.extend(conflicts);
                warnings.extend(ledger.record(assay, study_graph.as_ref(), &graph));
                warnings.extend(Validator::new(&context).validate(&graph));
                Ok((graph, warnings))
            });
            match result {
                Ok((graph, warnings)) => {
                    report.warnings = warnings;
                    self.record_output(&graph, &mut report);
                }
                Err(err) => {
                    tracing::warn!(sheet = %assay.path, error = %err, "assay sheet failed");
                    report.error = Some(err.to_string());
                }
            }
            sheets.push(report);
        }
    }

    fn study_sheet(
        &self,
        resolver: &Resolver<'_>,
        investigation: &Investigation,
        study: &StudyInfo,
    ) -> Result<(Graph, Vec<Warning>), IsaError> {
        let path = resolver.study_path()?;
        let (graph, mut warnings) = self.read_graph(investigation, study, SheetRef::Study, &path)?;
        let context = resolver.study_context();
        warnings.extend(Validator::new(&context).validate(&graph));
        Ok((graph, warnings))
    }

    fn record_output(&self, graph: &Graph, report: &mut SheetReport) {
        let Some(output_dir) = &self.options.output_dir else {
            return;
        };
        let target = output_dir.join(&report.path);
        match write_file(graph, &target, self.options.quote) {
            Ok(()) => report.written = Some(target),
            Err(err) => {
                tracing::warn!(sheet = %report.path, error = %err, "writing sheet failed");
                report.error = Some(err.to_string());
            }
        }
    }
}

fn same_file(left: &Utf8Path, right: &Utf8Path) -> bool {
    match (left.canonicalize_utf8(), right.canonicalize_utf8()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn write_file(graph: &Graph, target: &Utf8Path, quote: QuotePolicy) -> Result<(), IsaError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(target)?;
    write_sheet(graph, BufWriter::new(file), quote)
}
