// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_data_structures::fingerprint::{quantize_sample, Fingerprint};
use serde::{Deserialize, Serialize};

/// An explicit integration weight envelope for a weighted acquisition
/// (spec §3.3 `Acquire`, §4.4.6). Unlike [`crate::Waveform`], weights are
/// always given as explicit samples rather than an analytic descriptor: they
/// are derived from calibration data, not generated on the fly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub i: Vec<f64>,
    pub q: Vec<f64>,
}

impl Weights {
    /// # Panics
    /// Panics if the `I` and `Q` weight channels have different lengths.
    #[must_use]
    pub fn new(i: Vec<f64>, q: Vec<f64>) -> Self {
        assert_eq!(i.len(), q.len(), "weight channels must share a duration");
        Self { i, q }
    }

    #[must_use]
    pub fn duration_ns(&self) -> u32 {
        self.i.len() as u32
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let qi: Vec<i32> = self.i.iter().copied().map(quantize_sample).collect();
        let qq: Vec<i32> = self.q.iter().copied().map(quantize_sample).collect();
        Fingerprint::of(&(qi, qq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_weights_share_a_fingerprint() {
        let a = Weights::new(vec![1.0, 0.5], vec![0.0, 0.0]);
        let b = Weights::new(vec![1.0, 0.5], vec![0.0, 0.0]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
