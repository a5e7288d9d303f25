// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::operand::{FreqOperand, GainOperand, PhaseOperand, TimeOperand};
use crate::waveform_ref::{WaveformRef, WeightsRef};
use serde::{Deserialize, Serialize};

/// A virtual bus name, resolved to a physical bus by a `BusMapping` at
/// code-generation time (spec §6.1).
pub type Bus = String;

/// Leaf operations of the IR (spec §3.3). Every operation other than `Sync`
/// touches exactly one bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Play {
        bus: Bus,
        waveform: WaveformRef,
        wait_time_ns: Option<TimeOperand>,
    },
    Measure {
        bus: Bus,
        readout_waveform: WaveformRef,
        weights: WeightsRef,
        save_adc: bool,
        rotation: Option<PhaseOperand>,
        threshold: Option<f64>,
    },
    Acquire {
        bus: Bus,
        weights: WeightsRef,
        save_adc: bool,
    },
    Wait {
        bus: Bus,
        duration_ns: TimeOperand,
    },
    Sync {
        buses: Vec<Bus>,
    },
    WaitTrigger {
        bus: Bus,
        duration_ns: TimeOperand,
        trigger_address: u8,
    },
    SetFrequency {
        bus: Bus,
        freq_hz: FreqOperand,
    },
    SetPhase {
        bus: Bus,
        phase_rad: PhaseOperand,
    },
    ResetPhase {
        bus: Bus,
    },
    SetGain {
        bus: Bus,
        gain_i: GainOperand,
        gain_q: Option<GainOperand>,
    },
    SetOffset {
        bus: Bus,
        offset_i: GainOperand,
        offset_q: Option<GainOperand>,
    },
    SetMarkers {
        bus: Bus,
        mask: u8,
    },
    MeasureReset {
        bus: Bus,
        readout_waveform: WaveformRef,
        weights: WeightsRef,
        control_bus: Bus,
        reset_pulse: WaveformRef,
        trigger_address: u8,
    },
}

impl Operation {
    /// The buses this operation touches (one, except `Sync` and
    /// `MeasureReset` which also references a `control_bus`).
    #[must_use]
    pub fn buses(&self) -> Vec<&str> {
        match self {
            Operation::Play { bus, .. }
            | Operation::Measure { bus, .. }
            | Operation::Acquire { bus, .. }
            | Operation::Wait { bus, .. }
            | Operation::WaitTrigger { bus, .. }
            | Operation::SetFrequency { bus, .. }
            | Operation::SetPhase { bus, .. }
            | Operation::ResetPhase { bus }
            | Operation::SetGain { bus, .. }
            | Operation::SetOffset { bus, .. }
            | Operation::SetMarkers { bus, .. } => vec![bus.as_str()],
            Operation::MeasureReset {
                bus, control_bus, ..
            } => vec![bus.as_str(), control_bus.as_str()],
            Operation::Sync { buses } => buses.iter().map(String::as_str).collect(),
        }
    }
}
