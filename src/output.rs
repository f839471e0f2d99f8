use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, Report};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &Report) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &Report) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_report(&mut stdout, report)
    }

    pub fn write_report<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
        writeln!(out, "investigation {}", report.investigation)?;
        for warning in &report.warnings {
            writeln!(out, "  {}", indent(&warning.to_string()))?;
        }
        for sheet in &report.sheets {
            let status = if sheet.skipped {
                " (skipped)"
            } else if sheet.error.is_some() {
                " (failed)"
            } else {
                ""
            };
            writeln!(out, "{} {}{status}", sheet.sheet, sheet.path)?;
            if let Some(error) = &sheet.error {
                writeln!(out, "  error: {error}")?;
            }
            for warning in &sheet.warnings {
                writeln!(out, "  {}", indent(&warning.to_string()))?;
            }
            if let Some(written) = &sheet.written {
                writeln!(out, "  written to {written}")?;
            }
        }
        let max = report
            .max_severity()
            .map(|severity| severity.to_string())
            .unwrap_or_else(|| "none".to_string());
        writeln!(
            out,
            "{} warning(s), highest severity: {max}",
            report.all_warnings().count()
        )?;
        Ok(())
    }
}

fn indent(message: &str) -> String {
    message.replace('\n', "\n    ")
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => tracing::info!("{}", event.message),
        }
    }
}
