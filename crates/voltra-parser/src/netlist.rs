//! The netlist parser proper.

use std::path::{Path, PathBuf};

use voltra_core::{Circuit, NodeId};
use voltra_devices::{
    Capacitor, CobraSource, CurrentSource, Diode, Inductor, Nmos, NonLinearCapacitor, Npn, Pnp,
    PortSpec, Resistor, SParameterBlock, SParameterBlockPR, SinusoidalVoltageSource,
    TimeSeriesVoltageSource, VoltageSource,
};

use crate::error::{Error, Result};

/// The `.transient(t0, tEnd, dt)` directive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientCommand {
    pub t_start: f64,
    pub t_stop: f64,
    pub dt: f64,
}

/// Analysis commands collected from the directives.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub transient: Option<TransientCommand>,
    /// Node groups from `.graph(...)` directives, one per occurrence.
    pub graphs: Vec<Vec<u32>>,
    /// Cleared by `.nodc`.
    pub perform_dc: bool,
    /// From `.outputFile("...")`; the driver falls back to
    /// `datadump.txt` when absent.
    pub output_file: Option<PathBuf>,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            transient: None,
            graphs: Vec::new(),
            perform_dc: true,
            output_file: None,
        }
    }
}

/// A fully parsed netlist: the circuit and what to do with it.
#[derive(Debug)]
pub struct ParsedNetlist {
    pub circuit: Circuit,
    pub analysis: Analysis,
}

/// Pull the next whitespace-separated field off `rest`.
fn take_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    *rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (field, tail) = rest.split_at(end);
    *rest = tail;
    Some(field)
}

/// Strip one layer of single or double quotes.
fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| field.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(field)
}

struct LineCursor<'a> {
    rest: &'a str,
    line: usize,
}

impl<'a> LineCursor<'a> {
    fn field(&mut self, what: &str) -> Result<&'a str> {
        take_field(&mut self.rest)
            .ok_or_else(|| Error::parse(self.line, format!("missing field: {what}")))
    }

    fn node(&mut self, what: &str) -> Result<NodeId> {
        let field = self.field(what)?;
        field
            .parse::<u32>()
            .map(NodeId::new)
            .map_err(|_| Error::parse(self.line, format!("bad node index for {what}: {field:?}")))
    }

    fn value(&mut self, what: &str) -> Result<f64> {
        let field = self.field(what)?;
        field
            .parse::<f64>()
            .map_err(|_| Error::parse(self.line, format!("bad value for {what}: {field:?}")))
    }

    fn optional_value(&mut self, what: &str) -> Result<Option<f64>> {
        match take_field(&mut self.rest) {
            None => Ok(None),
            Some(field) => field
                .parse::<f64>()
                .map(Some)
                .map_err(|_| Error::parse(self.line, format!("bad value for {what}: {field:?}"))),
        }
    }

    fn has_more(&self) -> bool {
        !self.rest.trim_start().is_empty()
    }

    /// The remainder of the line as a (possibly quoted) path.
    fn path(&mut self, what: &str, base_dir: &Path) -> Result<PathBuf> {
        let raw = unquote(self.rest.trim());
        self.rest = "";
        if raw.is_empty() {
            return Err(Error::parse(self.line, format!("missing path: {what}")));
        }
        let path = Path::new(raw);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        })
    }
}

/// Parse a netlist. Relative data-file paths resolve against `base_dir`
/// (normally the netlist's own directory).
pub fn parse(text: &str, base_dir: &Path) -> Result<ParsedNetlist> {
    let mut circuit = Circuit::new();
    let mut analysis = Analysis::default();

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        if trimmed.starts_with('.') {
            parse_directive(trimmed, line_no, base_dir, &mut analysis)?;
            continue;
        }

        parse_element(trimmed, line_no, base_dir, &mut circuit)?;
    }

    Ok(ParsedNetlist { circuit, analysis })
}

fn parse_directive(
    line: &str,
    line_no: usize,
    base_dir: &Path,
    analysis: &mut Analysis,
) -> Result<()> {
    let arguments = |prefix: &str| -> Option<&str> {
        line.strip_prefix(prefix)
            .and_then(|rest| rest.trim_end().strip_suffix(')'))
    };

    if let Some(args) = arguments(".transient(") {
        let values: Vec<f64> = args
            .split(',')
            .map(|a| {
                a.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::parse(line_no, format!("bad transient argument: {a:?}")))
            })
            .collect::<Result<_>>()?;
        if values.len() != 3 {
            return Err(Error::parse(line_no, ".transient takes (t0, tEnd, dt)"));
        }
        analysis.transient = Some(TransientCommand {
            t_start: values[0],
            t_stop: values[1],
            dt: values[2],
        });
        return Ok(());
    }

    if let Some(args) = arguments(".graph(") {
        let nodes: Vec<u32> = args
            .split(',')
            .map(|a| {
                a.trim()
                    .parse::<u32>()
                    .map_err(|_| Error::parse(line_no, format!("bad graph node: {a:?}")))
            })
            .collect::<Result<_>>()?;
        analysis.graphs.push(nodes);
        return Ok(());
    }

    if line.trim() == ".nodc" {
        analysis.perform_dc = false;
        return Ok(());
    }

    if let Some(args) = arguments(".outputFile(") {
        let raw = unquote(args.trim());
        let path = Path::new(raw);
        analysis.output_file = Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        });
        return Ok(());
    }

    Err(Error::UnknownDirective {
        line: line_no,
        directive: line.split_whitespace().next().unwrap_or(line).to_string(),
    })
}

fn parse_element(
    line: &str,
    line_no: usize,
    base_dir: &Path,
    circuit: &mut Circuit,
) -> Result<()> {
    let mut cursor = LineCursor {
        rest: line,
        line: line_no,
    };
    let designator = cursor.field("designator")?.to_string();

    // dispatch on the designator prefix, longest first
    if designator.starts_with("CN") {
        let n1 = cursor.node("n1")?;
        let n2 = cursor.node("n2")?;
        let c_p = cursor.value("Cp")?;
        let c_o = cursor.value("Co")?;
        let p_10 = cursor.value("P10")?;
        let p_11 = cursor.value("P11")?;
        circuit.register_node(n1);
        circuit.register_node(n2);
        circuit.elements.add_nonlinear(Box::new(NonLinearCapacitor::new(
            designator, n1, n2, c_p, c_o, p_10, p_11,
        )));
        return Ok(());
    }

    if designator.starts_with("IN") {
        let n1 = cursor.node("n1")?;
        let n2 = cursor.node("n2")?;
        let r1_pos = cursor.node("r1+")?;
        let r1_neg = cursor.node("r1-")?;
        let r2_pos = cursor.node("r2+")?;
        let r2_neg = cursor.node("r2-")?;
        for node in [n1, n2, r1_pos, r1_neg, r2_pos, r2_neg] {
            circuit.register_node(node);
        }
        circuit.elements.add_nonlinear(Box::new(CobraSource::new(
            designator, n1, n2, r1_pos, r1_neg, r2_pos, r2_neg,
        )));
        return Ok(());
    }

    if designator.starts_with("VS") {
        let n1 = cursor.node("n1")?;
        let n2 = cursor.node("n2")?;
        let amplitude = cursor.value("V")?;
        let frequency = cursor.optional_value("freq")?.unwrap_or(1.0);
        let offset = cursor.optional_value("offset")?.unwrap_or(0.0);
        let phase = cursor.optional_value("phase")?.unwrap_or(0.0);
        circuit.register_node(n1);
        circuit.register_node(n2);
        let current = circuit.allocate_current();
        circuit.elements.add_dynamic(Box::new(SinusoidalVoltageSource::new(
            designator, n1, n2, amplitude, frequency, offset, phase, current,
        )));
        return Ok(());
    }

    if designator.starts_with("VT") {
        let n1 = cursor.node("n1")?;
        let n2 = cursor.node("n2")?;
        let timescale = cursor.value("timescale")?;
        let path = cursor.path("time-series file", base_dir)?;
        circuit.register_node(n1);
        circuit.register_node(n2);
        let current = circuit.allocate_current();
        circuit.elements.add_dynamic(Box::new(TimeSeriesVoltageSource::from_file(
            designator, n1, n2, timescale, &path, current,
        )?));
        return Ok(());
    }

    if designator.starts_with("SV") {
        // SVP carries a pre-fit pole-residue table; SVF would need the
        // fit-on-load integration that is out of scope
        if !designator.starts_with("SVP") {
            return Err(Error::UnsupportedDevice {
                line: line_no,
                designator,
            });
        }
        let num_ports = cursor.value("numPorts")? as usize;
        let mut specs = Vec::with_capacity(num_ports);
        for p in 0..num_ports {
            let positive = cursor.node(&format!("port {} +", p + 1))?;
            let negative = cursor.node(&format!("port {} -", p + 1))?;
            circuit.register_node(positive);
            circuit.register_node(negative);
            specs.push(PortSpec {
                positive,
                negative,
                current_index: circuit.allocate_current(),
            });
        }
        let path = cursor.path("pole-residue table", base_dir)?;
        circuit.elements.add_dynamic(Box::new(SParameterBlockPR::from_file(
            designator, specs, &path,
        )?));
        return Ok(());
    }

    match designator.chars().next() {
        Some('R') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            let value = cursor.value("resistance")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            // a trailing flag field requests a group-II branch current
            let resistor = if cursor.has_more() {
                let current = circuit.allocate_current();
                Resistor::group2(designator, n1, n2, value, current)
            } else {
                Resistor::new(designator, n1, n2, value)
            };
            circuit.elements.add_static(Box::new(resistor));
        }
        Some('C') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            let value = cursor.value("capacitance")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            circuit
                .elements
                .add_dynamic(Box::new(Capacitor::new(designator, n1, n2, value)));
        }
        Some('L') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            let value = cursor.value("inductance")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            let dc_current = circuit.allocate_dc_current();
            circuit
                .elements
                .add_dynamic(Box::new(Inductor::new(designator, n1, n2, value, dc_current)));
        }
        Some('I') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            let value = cursor.value("current")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            circuit
                .elements
                .add_static(Box::new(CurrentSource::new(designator, n1, n2, value)));
        }
        Some('V') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            let value = cursor.value("voltage")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            let current = circuit.allocate_current();
            circuit
                .elements
                .add_static(Box::new(VoltageSource::new(designator, n1, n2, value, current)));
        }
        Some('D') => {
            let n1 = cursor.node("n1")?;
            let n2 = cursor.node("n2")?;
            circuit.register_node(n1);
            circuit.register_node(n2);
            circuit
                .elements
                .add_nonlinear(Box::new(Diode::new(designator, n1, n2)));
        }
        Some('Q') => {
            return parse_transistor(designator, cursor, circuit);
        }
        Some('S') => {
            let frac_max_to_keep = cursor.value("fracMaxToKeep")?;
            let num_ports = cursor.value("numPorts")? as usize;
            let mut specs = Vec::with_capacity(num_ports);
            for p in 0..num_ports {
                let positive = cursor.node(&format!("port {} +", p + 1))?;
                let negative = cursor.node(&format!("port {} -", p + 1))?;
                circuit.register_node(positive);
                circuit.register_node(negative);
                specs.push(PortSpec {
                    positive,
                    negative,
                    current_index: circuit.allocate_current(),
                });
            }
            let path = cursor.path("touchstone file", base_dir)?;
            circuit.elements.add_dynamic(Box::new(SParameterBlock::from_touchstone(
                designator,
                specs,
                &path,
                frac_max_to_keep,
            )?));
        }
        _ => {
            return Err(Error::parse(
                line_no,
                format!("unknown element prefix: {designator:?}"),
            ));
        }
    }

    Ok(())
}

fn parse_transistor(
    designator: String,
    mut cursor: LineCursor<'_>,
    circuit: &mut Circuit,
) -> Result<()> {
    enum Kind {
        Npn,
        Pnp,
        Nmos,
    }

    let kind = if designator.starts_with("QMN") {
        Kind::Nmos
    } else if designator.starts_with("QN") {
        Kind::Npn
    } else if designator.starts_with("QP") {
        Kind::Pnp
    } else {
        // P-MOS and anything else behind the Q prefix
        return Err(Error::UnsupportedDevice {
            line: cursor.line,
            designator,
        });
    };

    let a = cursor.node("terminal 1")?;
    let b = cursor.node("terminal 2")?;
    let c = cursor.node("terminal 3")?;
    for node in [a, b, c] {
        circuit.register_node(node);
    }

    match kind {
        // terminals are C B E for bipolars, D G S for the FET
        Kind::Npn => circuit
            .elements
            .add_nonlinear(Box::new(Npn::new(designator, a, b, c))),
        Kind::Pnp => circuit
            .elements
            .add_nonlinear(Box::new(Pnp::new(designator, a, b, c))),
        Kind::Nmos => circuit
            .elements
            .add_nonlinear(Box::new(Nmos::new(designator, a, b, c))),
    }

    Ok(())
}
