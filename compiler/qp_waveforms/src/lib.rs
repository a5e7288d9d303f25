// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The waveform model (spec §3.1, §4.2): analytic waveform descriptors, IQ
//! pairs, integration weights, and real-time predistortion filters.

pub mod distortion;
pub mod waveform;
pub mod weights;

pub use distortion::{Distortion, Filter, FilterState, Normalization};
pub use waveform::{IQPair, Waveform};
pub use weights::Weights;
