// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use miette::Diagnostic;
use qp_data_structures::node_path::NodePath;
use thiserror::Error;

/// Errors raised by [`crate::compile`] (spec §6.3, §7). Compilation is
/// fatal-only: the first error encountered aborts the whole request, there
/// is no partial `CompilationOutput`.
#[derive(Clone, Debug, Diagnostic, Error)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(code("Qp.Compile.Calibration"))]
    Calibration(#[from] qp_calibration::CalibrationMiss),

    #[error(transparent)]
    #[diagnostic(code("Qp.Compile.Build"))]
    Build(#[from] qp_ir::BuildError),

    #[error(transparent)]
    #[diagnostic(code("Qp.Compile.Schedule"))]
    Schedule(#[from] qp_scheduler::SchedulerError),

    #[error("bus `{bus}`: {source}")]
    #[diagnostic(code("Qp.Compile.Codegen"))]
    Codegen {
        bus: String,
        #[source]
        source: qp_codegen::CodegenError,
    },

    #[error("`{param}` = {value} at {path} is out of range {min}..={max}")]
    #[diagnostic(code("Qp.Compile.OutOfRange"))]
    OutOfRange {
        param: String,
        value: f64,
        min: f64,
        max: f64,
        path: NodePath,
    },

    #[error("backend `{backend}` does not support `{op}`")]
    #[diagnostic(code("Qp.Compile.UnsupportedOp"))]
    UnsupportedOp { backend: String, op: String },

    /// Reserved: the IR's `wait_time_ns` is a `u32`, so a literal negative
    /// wait cannot arise from the builder today. Kept for a future per-bus
    /// delay policy (`BusConfig::delay_ns`) that could derive a negative
    /// effective wait once bus delays are applied during scheduling.
    #[error("bus `{bus}`: effective wait of {requested_ns}ns cannot be realized")]
    #[diagnostic(code("Qp.Compile.BadTiming"))]
    BadTiming { bus: String, requested_ns: i64 },
}
