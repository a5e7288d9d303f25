// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_ir::{Builder, Domain, Node, Operand, Operation, QProgram, WaveformRef, WeightsRef};
use qp_waveforms::Waveform;

fn square(duration_ns: u32) -> WaveformRef {
    WaveformRef::Waveform(Waveform::Square {
        amplitude: 1.0,
        duration_ns,
    })
}

#[test]
fn frequency_sweep_produces_eleven_iterations() {
    let mut b = Builder::new();
    let freq = b.variable("if_freq", Domain::Frequency).unwrap();
    b.for_loop(&freq, 100e6, 200e6, 10e6, |inner| {
        inner
            .set_frequency("readout", Operand::Variable(freq.clone()))
            .unwrap();
        inner.play("readout", square(1000), None).unwrap();
        inner.acquire("readout", WeightsRef::Duration(1000), true);
    });
    let program = QProgram::new(b.finish());

    let Node::ForLoop {
        start, stop, step, ..
    } = &program.root[0]
    else {
        panic!("expected a single for loop at the root");
    };
    assert_eq!(qp_ir::for_loop_iteration_count(*start, *stop, *step), 11);

    let mut op_count = 0;
    program.for_each_operation(|_| op_count += 1);
    assert_eq!(op_count, 3);
}

#[test]
fn sync_touches_every_listed_bus() {
    let mut b = Builder::new();
    b.sync(vec!["q0".to_string(), "q1".to_string(), "readout".to_string()]);
    let program = QProgram::new(b.finish());

    let mut buses = Vec::new();
    program.for_each_operation(|op| {
        if let Operation::Sync { buses: b } = op {
            buses = b.clone();
        }
    });
    assert_eq!(buses, vec!["q0", "q1", "readout"]);
}

#[test]
fn serialize_round_trip_through_qprogram() {
    let mut b = Builder::new();
    b.play("q0", square(40), None).unwrap();
    let program = QProgram::new(b.finish());

    let serialized = program.to_serialized();
    let restored = QProgram::from_serialized(serialized).expect("current version round-trips");
    assert_eq!(program, restored);
}
