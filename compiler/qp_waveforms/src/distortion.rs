// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Real-time predistortion filters (spec §3.5, §4.2, §4.4.9): a bus carries
//! an ordered chain of linear filters applied to a sampled envelope before it
//! is inserted into the waveform table.

use serde::{Deserialize, Serialize};

/// A single linear filter in a bus's predistortion chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    BiasTee {
        tau_ns: f64,
    },
    Exponential {
        tau_ns: f64,
        amplitude: f64,
    },
    /// Exactly [`qp_data_structures::constants::FIR_COEFFICIENTS`] taps.
    Fir {
        coefficients: Vec<f64>,
    },
    /// A generic direct-form-II linear filter, `b`/`a` coefficients as in
    /// `scipy.signal.lfilter`.
    Lfilter {
        b: Vec<f64>,
        a: Vec<f64>,
    },
}

/// Whether a filter normalizes its output to match the pre-distortion peak
/// amplitude, or scales by an explicit factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Normalization {
    AutoNorm,
    Factor(f64),
}

/// A predistortion filter's activation state (spec §4.4.9).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FilterState {
    Enabled,
    Bypassed,
    /// Coerced from `Enabled` because the filter's group delay would
    /// otherwise desynchronize this bus's outputs against the rest of the
    /// program.
    DelayComp,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState::Enabled
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub filter: Filter,
    pub normalization: Normalization,
    #[serde(default)]
    pub state: FilterState,
}

impl Distortion {
    /// Applies this filter to `samples`, matching peak amplitude if
    /// `normalization` is [`Normalization::AutoNorm`] (handling negative and
    /// sudden-net-zero envelopes per spec §4.2). A [`FilterState::Bypassed`]
    /// filter passes samples through unchanged; `Enabled` and `DelayComp`
    /// both apply the filter, the two differing only in how the filter
    /// reached that state.
    #[must_use]
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        if self.state == FilterState::Bypassed {
            return samples.to_vec();
        }
        let filtered = apply_filter(&self.filter, samples);
        match self.normalization {
            Normalization::Factor(factor) => filtered.into_iter().map(|s| s * factor).collect(),
            Normalization::AutoNorm => auto_norm(samples, &filtered),
        }
    }
}

impl Filter {
    /// Whether this filter's impulse response carries a nonzero group
    /// delay. A `Fir`/`Lfilter` with more than one tap shifts its output in
    /// time relative to an undistorted bus; `BiasTee`/`Exponential` are
    /// single-pole corrections with no such shift.
    #[must_use]
    pub fn introduces_delay(&self) -> bool {
        match self {
            Filter::BiasTee { .. } | Filter::Exponential { .. } => false,
            Filter::Fir { coefficients } => coefficients.len() > 1,
            Filter::Lfilter { b, .. } => b.len() > 1,
        }
    }
}

/// Applies an ordered chain of distortions, each stage consuming the
/// previous stage's output (spec §4.2: "applied AFTER envelope generation in
/// list order").
#[must_use]
pub fn apply_chain(samples: &[f64], chain: &[Distortion]) -> Vec<f64> {
    let mut current = samples.to_vec();
    for distortion in chain {
        current = distortion.apply(&current);
    }
    current
}

fn apply_filter(filter: &Filter, samples: &[f64]) -> Vec<f64> {
    match filter {
        Filter::BiasTee { tau_ns } => {
            // High-pass first-order IIR: y[n] = a*(y[n-1] + x[n] - x[n-1]).
            let alpha = tau_ns / (tau_ns + 1.0);
            let mut out = Vec::with_capacity(samples.len());
            let mut prev_in = 0.0;
            let mut prev_out = 0.0;
            for &x in samples {
                let y = alpha * (prev_out + x - prev_in);
                out.push(y);
                prev_in = x;
                prev_out = y;
            }
            out
        }
        Filter::Exponential { tau_ns, amplitude } => {
            // Compensates an exponential droop of time constant tau_ns and
            // relative amplitude `amplitude` via the standard two-pole/two-zero
            // correction.
            let alpha = 1.0 - (-1.0 / tau_ns).exp();
            let k = amplitude;
            let b0 = 1.0 / (1.0 + k * alpha);
            let b1 = -(1.0 - alpha) / (1.0 + k * alpha);
            let a1 = -(1.0 - alpha - k * alpha) / (1.0 + k * alpha);
            lfilter(&[b0, b1], &[1.0, a1], samples)
        }
        Filter::Fir { coefficients } => fir(coefficients, samples),
        Filter::Lfilter { b, a } => lfilter(b, a, samples),
    }
}

fn fir(coefficients: &[f64], samples: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    for n in 0..samples.len() {
        let mut acc = 0.0;
        for (k, &c) in coefficients.iter().enumerate() {
            if k <= n {
                acc += c * samples[n - k];
            }
        }
        out.push(acc);
    }
    out
}

fn lfilter(b: &[f64], a: &[f64], samples: &[f64]) -> Vec<f64> {
    let a0 = a.first().copied().unwrap_or(1.0);
    let mut out = Vec::with_capacity(samples.len());
    for n in 0..samples.len() {
        let mut acc = 0.0;
        for (k, &bk) in b.iter().enumerate() {
            if k <= n {
                acc += bk * samples[n - k];
            }
        }
        for (k, &ak) in a.iter().enumerate().skip(1) {
            if k <= n {
                acc -= ak * out[n - k];
            }
        }
        out.push(acc / a0);
    }
    out
}

fn auto_norm(original: &[f64], filtered: &[f64]) -> Vec<f64> {
    let peak_of = |s: &[f64]| s.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));
    let original_peak = peak_of(original);
    let filtered_peak = peak_of(filtered);
    if filtered_peak < f64::EPSILON || original_peak < f64::EPSILON {
        return filtered.to_vec();
    }
    let scale = original_peak / filtered_peak;
    filtered.iter().map(|&s| s * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_norm_preserves_peak_amplitude() {
        let original = vec![1.0, -1.0, 0.5, -0.5];
        let dist = Distortion {
            filter: Filter::Fir {
                coefficients: vec![0.5, 0.5],
            },
            normalization: Normalization::AutoNorm,
            state: FilterState::Enabled,
        };
        let out = dist.apply(&original);
        let peak = out.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));
        assert!((peak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn auto_norm_handles_all_zero_input() {
        let original = vec![0.0, 0.0, 0.0];
        let dist = Distortion {
            filter: Filter::Fir {
                coefficients: vec![1.0],
            },
            normalization: Normalization::AutoNorm,
            state: FilterState::Enabled,
        };
        let out = dist.apply(&original);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn explicit_norm_factor_scales_output() {
        let original = vec![1.0, 1.0];
        let dist = Distortion {
            filter: Filter::Fir {
                coefficients: vec![1.0],
            },
            normalization: Normalization::Factor(0.5),
            state: FilterState::Enabled,
        };
        assert_eq!(dist.apply(&original), vec![0.5, 0.5]);
    }

    #[test]
    fn chain_applies_in_list_order() {
        let chain = vec![
            Distortion {
                filter: Filter::Fir {
                    coefficients: vec![1.0],
                },
                normalization: Normalization::Factor(2.0),
                state: FilterState::Enabled,
            },
            Distortion {
                filter: Filter::Fir {
                    coefficients: vec![1.0],
                },
                normalization: Normalization::Factor(3.0),
                state: FilterState::Enabled,
            },
        ];
        let out = apply_chain(&[1.0], &chain);
        assert_eq!(out, vec![6.0]);
    }

    #[test]
    fn bypassed_filter_passes_samples_through_unchanged() {
        let original = vec![1.0, 2.0, 3.0];
        let dist = Distortion {
            filter: Filter::Fir {
                coefficients: vec![0.25, 0.25],
            },
            normalization: Normalization::Factor(9.0),
            state: FilterState::Bypassed,
        };
        assert_eq!(dist.apply(&original), original);
    }

    #[test]
    fn multi_tap_fir_introduces_delay_but_single_tap_does_not() {
        assert!(Filter::Fir {
            coefficients: vec![0.5, 0.5]
        }
        .introduces_delay());
        assert!(!Filter::Fir {
            coefficients: vec![1.0]
        }
        .introduces_delay());
        assert!(!Filter::BiasTee { tau_ns: 100.0 }.introduces_delay());
    }
}
