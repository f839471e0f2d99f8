use std::io::Write;

use crate::domain::Graph;
use crate::error::IsaError;

const INDENT: &str = "    ";

pub struct DotExporter<W: Write> {
    sink: W,
}

fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

impl<W: Write> DotExporter<W> {
    pub fn new(mut sink: W) -> Result<Self, IsaError> {
        writeln!(sink, "digraph investigation {{")?;
        writeln!(sink, "  rankdir = \"LR\";")?;
        Ok(Self { sink })
    }

    pub fn cluster(&mut self, graph: &Graph) -> Result<(), IsaError> {
        let path = graph
            .path
            .as_ref()
            .map(|path| path.as_str())
            .unwrap_or_default();
        let study = graph.sheet.study.saturating_sub(1);
        match graph.sheet.assay {
            Some(assay) => {
                writeln!(self.sink, "  /* assay {path} */")?;
                writeln!(
                    self.sink,
                    "  subgraph clusterAssayS{study}A{} {{",
                    assay.saturating_sub(1)
                )?;
                writeln!(self.sink, "    label = \"Assay: {path}\"")?;
            }
            None => {
                writeln!(self.sink, "  /* study {path} */")?;
                writeln!(self.sink, "  subgraph clusterStudy{study} {{")?;
                writeln!(self.sink, "    label = \"Study: {path}\"")?;
            }
        }
        self.body(graph)?;
        writeln!(self.sink, "  }}")?;
        Ok(())
    }

    fn body(&mut self, graph: &Graph) -> Result<(), IsaError> {
        writeln!(self.sink, "{INDENT}/* materials */")?;
        for (key, material) in &graph.materials {
            let name = if material.name.is_empty() {
                "-"
            } else {
                material.name.as_str()
            };
            let label = quoted(&format!("{}:\n{name}\n({key})", material.kind));
            writeln!(
                self.sink,
                "{INDENT}{} [label={label},shape=box,color=black,fontcolor=black]",
                quoted(key)
            )?;
        }
        writeln!(self.sink, "{INDENT}/* processes */")?;
        for (key, process) in &graph.processes {
            let protocol = if process.protocol_ref.is_empty() {
                "-"
            } else {
                process.protocol_ref.as_str()
            };
            let name = process
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or("-");
            let label = quoted(&format!("Process:\n{protocol}\n{name}\n({key})"));
            writeln!(
                self.sink,
                "{INDENT}{} [label={label},shape=ellipse,color=blue,fontcolor=blue]",
                quoted(key)
            )?;
        }
        writeln!(self.sink, "{INDENT}/* arcs */")?;
        for arc in &graph.arcs {
            writeln!(
                self.sink,
                "{INDENT}{} -> {};",
                quoted(&arc.tail),
                quoted(&arc.head)
            )?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, IsaError> {
        writeln!(self.sink, "}}")?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}
