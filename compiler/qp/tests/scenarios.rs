// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end scenarios exercised through the public [`qp::compile`]
//! entrypoint, covering one literal case per pipeline concern: a single
//! play, long-wait chunking, a register-counted for-loop, cross-bus sync,
//! weighted-acquisition register reuse, and acquisition overflow.

use qp::{BackendConfig, BusMapping, Builder, Calibration, Domain, Node, Operand, WaveformRef, WeightsRef};
use qp_waveforms::{Waveform, Weights};

fn compile(root: &[Node], config: &BackendConfig) -> qp::CompilationOutput {
    qp::compile(root, &Calibration::new(), &BusMapping::new(), config).expect("compilation should succeed")
}

#[test]
fn s1_single_square_play() {
    let mut b = Builder::new();
    b.play(
        "b0",
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns: 40,
        }),
        None,
    )
    .unwrap();
    let root = b.finish();

    let output = compile(&root, &BackendConfig::default());
    let b0 = output.bus("b0").unwrap();

    assert!(b0.program.contains("play 0, 1, 40"));
    assert_eq!(b0.waveforms.len(), 2);
    let i_wf = &b0.waveforms.iter().find(|(id, _)| *id == 0).unwrap().1;
    let q_wf = &b0.waveforms.iter().find(|(id, _)| *id == 1).unwrap().1;
    assert_eq!(i_wf.len(), 40);
    assert_eq!(q_wf.len(), 40);
    assert!(i_wf.iter().all(|&s| (s - 1.0).abs() < 1e-9));
    assert!(q_wf.iter().all(|&s| s.abs() < 1e-9));
    assert!(b0.acquisitions.is_empty());
}

#[test]
fn s2_long_wait_decomposition() {
    let mut b = Builder::new();
    b.wait("b0", Operand::Literal(200_000)).unwrap();
    let root = b.finish();

    let output = compile(&root, &BackendConfig::default());
    let b0 = output.bus("b0").unwrap();

    assert!(b0.program.contains("wait 65532"));
    assert!(b0.program.contains("wait 3404"));
    assert!(b0.program.contains("loop"));
}

#[test]
fn s3_for_loop_over_frequency() {
    let mut b = Builder::new();
    let freq = b.variable("freq", Domain::Frequency).unwrap();
    b.for_loop(&freq, 100e6, 200e6, 10e6, |inner| {
        inner.set_frequency("b0", Operand::Variable(freq.clone())).unwrap();
        inner
            .play(
                "b0",
                WaveformRef::Waveform(Waveform::Square {
                    amplitude: 1.0,
                    duration_ns: 100,
                }),
                None,
            )
            .unwrap();
    });
    let root = b.finish();

    let output = compile(&root, &BackendConfig::default());
    let b0 = output.bus("b0").unwrap();

    // freq_hz quantization is round(4 * hz): 100e6 -> 400_000_000, step 10e6 -> 40_000_000.
    assert!(b0.program.contains("move 400000000"));
    assert!(b0.program.contains("set_freq"));
    assert!(b0.program.contains("add"));
    assert!(b0.program.contains("40000000"));
    assert!(b0.program.contains("loop"));
}

#[test]
fn s4_cross_bus_sync() {
    let mut b = Builder::new();
    b.play(
        "b0",
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns: 200,
        }),
        None,
    )
    .unwrap();
    b.play(
        "b1",
        WaveformRef::Waveform(Waveform::Square {
            amplitude: 1.0,
            duration_ns: 40,
        }),
        None,
    )
    .unwrap();
    b.sync(vec!["b0".to_string(), "b1".to_string()]);
    let root = b.finish();

    let output = compile(&root, &BackendConfig::default());
    let b1 = output.bus("b1").unwrap();

    assert!(b1.program.contains("wait 160"));
}

#[test]
fn s5_weighted_acquisition_reuse() {
    let mut b = Builder::new();
    let weights = Weights::new(vec![1.0, 0.5], vec![0.0, 0.0]);
    b.acquire("r0", WeightsRef::Weights(weights.clone()), false);
    b.acquire("r0", WeightsRef::Weights(weights), false);
    let root = b.finish();

    let output = compile(&root, &BackendConfig::default());
    let r0 = output.bus("r0").unwrap();

    let acquire_lines: Vec<&str> = r0
        .program
        .lines()
        .filter(|l| l.trim_start().starts_with("acquire_weighed"))
        .collect();
    assert_eq!(acquire_lines.len(), 2);

    // Both lines reference the same pair of weight registers (third and
    // fourth comma-separated arguments).
    let registers_of = |line: &str| -> Vec<&str> {
        line.trim_start()
            .trim_start_matches("acquire_weighed ")
            .split(',')
            .map(str::trim)
            .collect()
    };
    let first = registers_of(acquire_lines[0]);
    let second = registers_of(acquire_lines[1]);
    assert_eq!(first[2], second[2], "weight I register should be shared");
    assert_eq!(first[3], second[3], "weight Q register should be shared");
    assert_eq!(r0.weights.len(), 2, "one entry per I/Q channel, not per call");
}

#[test]
fn s6_acquisition_overflow() {
    // Three nested structural depths against a deliberately tiny
    // `max_acquisition_indices` reproduces the overflow the scenario
    // describes without needing 32+ levels of literal nesting.
    let mut b = Builder::new();
    b.acquire("r0", WeightsRef::Duration(100), false);
    b.infinite_loop(|l1| {
        l1.acquire("r0", WeightsRef::Duration(100), false);
        l1.infinite_loop(|l2| {
            l2.acquire("r0", WeightsRef::Duration(100), false);
        });
    });
    let root = b.finish();

    let mut config = BackendConfig::default();
    config.buses.insert(
        "r0".to_string(),
        qp::BusConfig {
            max_acquisition_indices: 2,
            ..qp::BusConfig::default()
        },
    );

    let err = qp::compile(&root, &Calibration::new(), &BusMapping::new(), &config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("r0"), "error should name the offending bus");
    assert!(
        message.contains('3') || message.contains("overflow") || message.contains("index"),
        "error should speak to the offending index count: {message}"
    );
}
