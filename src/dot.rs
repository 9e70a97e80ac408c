//! Read-only export of a graph as a stream of node and edge declarations.

use std::io::{self, Write};

use crate::TapeTerm;

/// Receiver of the graph emitted by [`render`]. Nodes are identified by their label.
pub trait GraphSink {
    fn node(&mut self, id: &str);
    fn edge(&mut self, from: &str, to: &str, label: &str);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    Node(String),
    Edge {
        from: String,
        to: String,
        label: String,
    },
}

impl GraphSink for Vec<GraphEvent> {
    fn node(&mut self, id: &str) {
        self.push(GraphEvent::Node(id.to_string()));
    }

    fn edge(&mut self, from: &str, to: &str, label: &str) {
        self.push(GraphEvent::Edge {
            from: from.to_string(),
            to: to.to_string(),
            label: label.to_string(),
        });
    }
}

/// Declare every node reachable from `term` in pre-order, then emit one edge
/// per operand, labeled with the operand's current gradient.
pub fn render(term: &TapeTerm, sink: &mut impl GraphSink) {
    render_nodes(term, sink);
    render_edges(term, sink);
}

fn render_nodes(term: &TapeTerm, sink: &mut impl GraphSink) {
    sink.node(&term.name());
    for operand in term.operands() {
        render_nodes(&operand, sink);
    }
}

fn render_edges(term: &TapeTerm, sink: &mut impl GraphSink) {
    let name = term.name();
    for operand in term.operands() {
        render_edges(&operand, sink);
        sink.edge(&name, &operand.name(), &format!("{:.2}", operand.grad()));
    }
}

/// Writes graphviz dot text. The first I/O error is kept and returned by
/// [`DotSink::finish`]; everything after it is dropped.
pub struct DotSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> DotSink<W> {
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "digraph G {{\nrankdir=\"LR\";")?;
        Ok(Self {
            writer,
            error: None,
        })
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        writeln!(self.writer, "}}")?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_line(&mut self, line: std::fmt::Arguments) {
        if self.error.is_none() {
            if let Err(e) = self.writer.write_fmt(line) {
                self.error = Some(e);
            }
        }
    }
}

impl<W: Write> GraphSink for DotSink<W> {
    fn node(&mut self, id: &str) {
        self.write_line(format_args!("\"{}\";\n", escape(id)));
    }

    fn edge(&mut self, from: &str, to: &str, label: &str) {
        self.write_line(format_args!(
            "\"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape(from),
            escape(to),
            escape(label)
        ));
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
