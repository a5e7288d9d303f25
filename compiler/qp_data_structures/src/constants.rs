// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hardware constants for the Qblox-style sequencer target.
//!
//! These are defaults; a [`crate::target::TargetLimits`] lets a backend
//! configuration override them per-instrument without touching call sites.

/// Minimum clock granularity, in nanoseconds. All real-time durations reaching
/// the code generator must be a positive multiple of this.
pub const MIN_CLOCK: u32 = 4;

/// Minimum duration of a single `wait` instruction, in nanoseconds.
pub const MIN_WAIT: u32 = 4;

/// Maximum duration of a single `wait` instruction, in nanoseconds.
pub const MAX_WAIT: u32 = 65_532;

/// Minimum ticks consumed by a `play` instruction itself.
pub const MIN_PLAY_TICK: u32 = 4;

/// Default maximum number of distinct acquisition indices per bus.
pub const MAX_ACQUISITION_INDICES: usize = 32;

/// Default number of real-time-capable general purpose registers (`R0..Rn`).
pub const NUM_REGISTERS: usize = 64;

/// Threshold above which a `Square` waveform is replaced by a chunked loop.
pub const LONG_SQUARE_THRESHOLD_NS: u32 = 100;

/// Lower bound of the search space for long-square / flat-top chunk sizes.
pub const CHUNK_MIN_NS: u32 = 100;

/// Upper bound of the search space for long-square / flat-top chunk sizes.
pub const CHUNK_MAX_NS: u32 = 500;

/// Threshold above which a `FlatTop` waveform is decomposed into
/// rising-edge / square-loop / falling-edge.
pub const FLAT_TOP_THRESHOLD_NS: u32 = 100;

/// Default propagation wait for an active-reset trigger round trip, in nanoseconds.
pub const DEFAULT_RESET_PROPAGATION_NS: u32 = 400;

/// NCO frequency bound on Qblox, in Hz (symmetric around zero).
pub const MAX_NCO_FREQ_HZ: f64 = 500_000_000.0;

/// DAC full-scale integer bound used for gain/offset quantization (`±32767`).
pub const DAC_FULL_SCALE: i32 = 32_767;

/// Default marker mask applied in `setup` when a program does not set one explicitly.
pub const DEFAULT_MARKERS: u8 = 0xF;

/// Number of exponential predistortion filter slots per output.
pub const MAX_EXPONENTIAL_FILTERS: usize = 4;

/// Exact number of FIR filter coefficients supported by the sequencer.
pub const FIR_COEFFICIENTS: usize = 32;

/// Hardware-configurable real-time limits for a single backend/instrument.
/// Defaults match the Qblox constants above; a [`crate::target::TargetLimits`]
/// can be supplied by backend configuration to override a subset of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetLimits {
    pub min_clock_ns: u32,
    pub min_wait_ns: u32,
    pub max_wait_ns: u32,
    pub max_acquisition_indices: usize,
    pub num_registers: usize,
}

impl Default for TargetLimits {
    fn default() -> Self {
        Self {
            min_clock_ns: MIN_CLOCK,
            min_wait_ns: MIN_WAIT,
            max_wait_ns: MAX_WAIT,
            max_acquisition_indices: MAX_ACQUISITION_INDICES,
            num_registers: NUM_REGISTERS,
        }
    }
}
