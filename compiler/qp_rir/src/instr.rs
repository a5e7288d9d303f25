// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ids::Register;
use std::fmt::{self, Display, Formatter};

/// An instruction argument: either an immediate or a register (spec §6.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Value {
    Imm(i64),
    Reg(Register),
}

impl From<Register> for Value {
    fn from(r: Register) -> Self {
        Value::Reg(r)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Imm(v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Imm(v) => write!(f, "{v}"),
            Value::Reg(r) => write!(f, "{r}"),
        }
    }
}

/// One Q1ASM instruction (spec §6.2 mnemonic list). `Label` is a
/// pseudo-instruction marking a jump target; it is never itself one of the
/// real-time instructions it precedes.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Label(String),
    Wait(Value),
    WaitSync(Value),
    Play { i: Value, q: Value, duration: Value },
    Acquire { index: Value, bin: Value, duration: Value },
    AcquireWeighed {
        index: Value,
        bin: Value,
        weight_i: Value,
        weight_q: Value,
        duration: Value,
    },
    SetFreq(Value),
    SetPh(Value),
    SetPhDelta(Value),
    ResetPh,
    SetAwgGain { i: Value, q: Value },
    SetAwgOffs { i: Value, q: Value },
    SetMrk(Value),
    UpdParam(Value),
    Move { src: Value, dst: Register },
    Add { a: Value, b: Value, dst: Register },
    Sub { a: Value, b: Value, dst: Register },
    Not { src: Value, dst: Register },
    Loop { counter: Register, label: String },
    Jmp(String),
    LatchEn { enable: Value, duration: Value },
    LatchRst(Value),
    SetConditional { enable: Value, mask: Value, duration: Value },
    Stop,
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Label(name) => write!(f, "{name}:"),
            Instr::Wait(d) => write!(f, "    wait {d}"),
            Instr::WaitSync(d) => write!(f, "    wait_sync {d}"),
            Instr::Play { i, q, duration } => write!(f, "    play {i}, {q}, {duration}"),
            Instr::Acquire {
                index,
                bin,
                duration,
            } => write!(f, "    acquire {index}, {bin}, {duration}"),
            Instr::AcquireWeighed {
                index,
                bin,
                weight_i,
                weight_q,
                duration,
            } => write!(
                f,
                "    acquire_weighed {index}, {bin}, {weight_i}, {weight_q}, {duration}"
            ),
            Instr::SetFreq(v) => write!(f, "    set_freq {v}"),
            Instr::SetPh(v) => write!(f, "    set_ph {v}"),
            Instr::SetPhDelta(v) => write!(f, "    set_ph_delta {v}"),
            Instr::ResetPh => write!(f, "    reset_ph"),
            Instr::SetAwgGain { i, q } => write!(f, "    set_awg_gain {i}, {q}"),
            Instr::SetAwgOffs { i, q } => write!(f, "    set_awg_offs {i}, {q}"),
            Instr::SetMrk(v) => write!(f, "    set_mrk {v}"),
            Instr::UpdParam(v) => write!(f, "    upd_param {v}"),
            Instr::Move { src, dst } => write!(f, "    move {src}, {dst}"),
            Instr::Add { a, b, dst } => write!(f, "    add {a}, {b}, {dst}"),
            Instr::Sub { a, b, dst } => write!(f, "    sub {a}, {b}, {dst}"),
            Instr::Not { src, dst } => write!(f, "    not {src}, {dst}"),
            Instr::Loop { counter, label } => write!(f, "    loop {counter}, @{label}"),
            Instr::Jmp(label) => write!(f, "    jmp @{label}"),
            Instr::LatchEn { enable, duration } => write!(f, "    latch_en {enable}, {duration}"),
            Instr::LatchRst(d) => write!(f, "    latch_rst {d}"),
            Instr::SetConditional {
                enable,
                mask,
                duration,
            } => write!(f, "    set_conditional {enable}, {mask}, {duration}"),
            Instr::Stop => write!(f, "    stop"),
        }
    }
}
