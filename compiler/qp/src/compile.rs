// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Orchestrates the compilation pipeline (spec §2): calibration
//! resolution, bus mapping, scheduling, and per-bus code generation.

use crate::bus_mapping::BusMapping;
use crate::config::BackendConfig;
use crate::errors::CompileError;
use crate::output::{ArmParameters, BusOutput, CompilationOutput};
use qp_calibration::Calibration;
use qp_data_structures::constants::MAX_NCO_FREQ_HZ;
use qp_data_structures::node_path::NodePath;
use qp_ir::{Node, Operand, Operation};

/// Compiles a finished `QProgram` tree against a calibration store, bus
/// mapping, and backend configuration into one [`CompilationOutput`] per
/// bus the program touches (spec §2, §4.5).
///
/// # Errors
/// Returns [`CompileError`] on the first calibration miss, scheduling
/// failure, out-of-range backend parameter, unsupported operation, or
/// code generation failure encountered. Compilation never returns a
/// partial output (spec §7): any error aborts the whole request.
pub fn compile(
    root: &[Node],
    calibration: &Calibration,
    bus_mapping: &BusMapping,
    config: &BackendConfig,
) -> Result<CompilationOutput, CompileError> {
    let resolved = calibration.finalize(root)?;
    let mapped = bus_mapping.apply(&resolved);

    validate_frequency_bounds(&mapped, NodePath::root())?;
    validate_supported_ops(&mapped, config)?;

    let scheduled = qp_scheduler::project(&mapped, &config.scheduler_config())?;
    for diagnostic in &scheduled.diagnostics {
        log::warn!("{diagnostic:?}");
    }

    let mut buses: Vec<String> = Vec::new();
    for node in &scheduled.root {
        node.for_each_operation(&mut |op| {
            buses.extend(op.buses().into_iter().map(str::to_string));
        });
    }
    buses.sort();
    buses.dedup();

    let mut outputs = Vec::with_capacity(buses.len());
    for bus in &buses {
        let bus_config = config.bus(bus);
        let program = qp_codegen::lower_bus(
            &scheduled.root,
            bus,
            bus_config.target_limits(),
            bus_config.distortions.clone(),
        )
        .map_err(|source| {
            CompileError::Codegen {
                bus: bus.clone(),
                source,
            }
        })?;
        outputs.push(BusOutput::from_program(
            bus.clone(),
            program,
            ArmParameters {
                markers_default: bus_config.markers_default,
            },
        ));
    }

    Ok(CompilationOutput { buses: outputs })
}

/// Rejects a literal `SetFrequency` outside Qblox's NCO range (spec
/// §4.4.2: "within ±500 MHz on Qblox"). A variable frequency cannot be
/// checked here since its runtime value is not known until materialization.
fn validate_frequency_bounds(nodes: &[Node], path: NodePath) -> Result<(), CompileError> {
    for (i, node) in nodes.iter().enumerate() {
        let child_path = path.child(i);
        match node {
            Node::Block(children) | Node::InfiniteLoop(children) => {
                validate_frequency_bounds(children, child_path)?;
            }
            Node::ForLoop { body, .. } | Node::Loop { body, .. } | Node::Average { body, .. } => {
                validate_frequency_bounds(body, child_path)?;
            }
            Node::Parallel { branches } => {
                for (b, branch) in branches.iter().enumerate() {
                    validate_frequency_bounds(&branch.body, child_path.child(b))?;
                }
            }
            Node::Op(Operation::SetFrequency {
                freq_hz: Operand::Literal(hz),
                ..
            }) => {
                if hz.abs() > MAX_NCO_FREQ_HZ {
                    return Err(CompileError::OutOfRange {
                        param: "freq_hz".to_string(),
                        value: *hz,
                        min: -MAX_NCO_FREQ_HZ,
                        max: MAX_NCO_FREQ_HZ,
                        path: child_path,
                    });
                }
            }
            Node::Op(_) => {}
        }
    }
    Ok(())
}

/// Rejects `MeasureReset` when the target backend declares no active-reset
/// support. Supplemented beyond spec.md's distillation, since a complete
/// backend integration needs a capability check before handing the
/// scheduler an operation the instrument cannot execute.
fn validate_supported_ops(nodes: &[Node], config: &BackendConfig) -> Result<(), CompileError> {
    if config.supports_active_reset {
        return Ok(());
    }
    for node in nodes {
        let mut found = false;
        node.for_each_operation(&mut |op| {
            if matches!(op, Operation::MeasureReset { .. }) {
                found = true;
            }
        });
        if found {
            return Err(CompileError::UnsupportedOp {
                backend: config.backend_name.clone(),
                op: "MeasureReset".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qp_ir::{Builder, WaveformRef, WeightsRef};
    use qp_waveforms::Waveform;

    #[test]
    fn frequency_outside_nco_range_is_rejected() {
        let mut b = Builder::new();
        b.set_frequency("q0", Operand::Literal(600e6)).unwrap();
        let root = b.finish();

        let err = compile(&root, &Calibration::new(), &BusMapping::new(), &BackendConfig::default()).unwrap_err();
        assert!(matches!(err, CompileError::OutOfRange { .. }));
    }

    #[test]
    fn measure_reset_is_rejected_without_active_reset_support() {
        let mut b = Builder::new();
        b.measure_reset(
            "readout",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 40,
            }),
            WeightsRef::Duration(40),
            "control",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 20,
            }),
            0,
        );
        let root = b.finish();

        let config = BackendConfig {
            supports_active_reset: false,
            ..BackendConfig::default()
        };
        let err = compile(&root, &Calibration::new(), &BusMapping::new(), &config).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOp { .. }));
    }

    #[test]
    fn single_square_play_compiles_to_scenario_s1() {
        let mut b = Builder::new();
        b.play(
            "q0",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 40,
            }),
            None,
        )
        .unwrap();
        let root = b.finish();

        let output = compile(&root, &Calibration::new(), &BusMapping::new(), &BackendConfig::default()).unwrap();
        let q0 = output.bus("q0").unwrap();
        assert!(q0.program.contains("play 0, 1, 40"));
        assert_eq!(q0.waveforms.len(), 2);
        assert!(q0.acquisitions.is_empty());
    }

    #[test]
    fn unmapped_bus_is_unaffected_by_an_unrelated_mapping() {
        let mut b = Builder::new();
        b.play(
            "q0",
            WaveformRef::Waveform(Waveform::Square {
                amplitude: 1.0,
                duration_ns: 40,
            }),
            None,
        )
        .unwrap();
        let root = b.finish();

        let mut mapping = BusMapping::new();
        mapping.set("q1", "sequencer7");

        let output = compile(&root, &Calibration::new(), &mapping, &BackendConfig::default()).unwrap();
        assert!(output.bus("q0").is_some());
    }
}
