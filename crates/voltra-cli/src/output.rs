//! Waveform table writers.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use voltra_core::NodeId;
use voltra_solver::Simulation;

/// Write the full solution as a tab-separated table:
/// `time\tn1\t…\ti1\t…`, one row per time step, nine significant digits.
pub fn write_table(path: &Path, simulation: &Simulation) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    let num_nodes = simulation.circuit().num_nodes();
    let num_currents = simulation.circuit().num_currents();

    write!(out, "time")?;
    for i in 1..=num_nodes {
        write!(out, "\tn{i}")?;
    }
    for i in 1..=num_currents {
        write!(out, "\ti{i}")?;
    }

    let dt = simulation.params().dt;
    for n in 0..simulation.steps() {
        write!(out, "\n{:.9e}", n as f64 * dt)?;
        for row in 0..num_nodes + num_currents {
            write!(out, "\t{:.9e}", simulation.solution()[(row, n)])?;
        }
    }
    writeln!(out)?;
    out.flush()
}

/// Emit one `graph<k>.tsv` next to the main table per `.graph` directive:
/// the time column plus the selected node waveforms.
pub fn write_graph_tables(
    output_path: &Path,
    simulation: &Simulation,
    graphs: &[Vec<u32>],
) -> io::Result<()> {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));

    for (index, nodes) in graphs.iter().enumerate() {
        let path = dir.join(format!("graph{}.tsv", index + 1));
        let mut out = BufWriter::new(File::create(path)?);

        write!(out, "time")?;
        for &node in nodes {
            write!(out, "\tn{node}")?;
        }

        let dt = simulation.params().dt;
        for n in 0..simulation.steps() {
            write!(out, "\n{:.9e}", n as f64 * dt)?;
            for &node in nodes {
                write!(out, "\t{:.9e}", simulation.voltage(NodeId::new(node), n))?;
            }
        }
        writeln!(out)?;
        out.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltra_core::Circuit;
    use voltra_devices::{Resistor, VoltageSource};
    use voltra_solver::TransientParams;

    fn divider_simulation() -> Simulation {
        let mut circuit = Circuit::new();
        circuit.register_node(NodeId::new(2));
        let vi = circuit.allocate_current();
        circuit.elements.add_static(Box::new(VoltageSource::new(
            "V1",
            NodeId::new(1),
            NodeId::new(0),
            10.0,
            vi,
        )));
        circuit.elements.add_static(Box::new(Resistor::new(
            "R1",
            NodeId::new(1),
            NodeId::new(2),
            1000.0,
        )));
        circuit.elements.add_static(Box::new(Resistor::new(
            "R2",
            NodeId::new(2),
            NodeId::new(0),
            1000.0,
        )));

        let mut sim = Simulation::new(
            circuit,
            TransientParams {
                t_start: 0.0,
                t_stop: 4e-5,
                dt: 1e-5,
            },
            false,
        );
        sim.run().unwrap();
        sim
    }

    #[test]
    fn test_table_layout() {
        let sim = divider_simulation();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.tsv");
        write_table(&path, &sim).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time\tn1\tn2\ti1"));

        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), sim.steps());

        // last row holds the settled divider
        let fields: Vec<f64> = rows
            .last()
            .unwrap()
            .split('\t')
            .map(|f| f.parse().unwrap())
            .collect();
        assert_eq!(fields.len(), 4);
        assert!((fields[0] - 3e-5).abs() < 1e-12);
        assert!((fields[1] - 10.0).abs() < 1e-6);
        assert!((fields[2] - 5.0).abs() < 1e-6);
        assert!((fields[3] + 5e-3).abs() < 1e-6);
    }

    #[test]
    fn test_graph_tables() {
        let sim = divider_simulation();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dump.tsv");
        write_graph_tables(&output, &sim, &[vec![2], vec![1, 2]]).unwrap();

        let first = std::fs::read_to_string(dir.path().join("graph1.tsv")).unwrap();
        assert!(first.starts_with("time\tn2"));
        let second = std::fs::read_to_string(dir.path().join("graph2.tsv")).unwrap();
        assert!(second.starts_with("time\tn1\tn2"));
        assert_eq!(second.lines().count(), sim.steps() + 1);
    }
}
