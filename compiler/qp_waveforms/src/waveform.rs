// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use qp_data_structures::fingerprint::{quantize_sample, Fingerprint};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// An analytic waveform descriptor. `envelope` is a pure function of the
/// descriptor; two waveforms with the same descriptor always produce the
/// same samples, which is what table dedup (spec §3.6 invariant 4) relies on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
    Square {
        amplitude: f64,
        duration_ns: u32,
    },
    Gaussian {
        amplitude: f64,
        duration_ns: u32,
        num_sigmas: f64,
    },
    /// The derivative-of-Gaussian component of a DRAG pulse. Not constructed
    /// directly by callers; [`IQPair::drag`] owns the paired `Gaussian` and
    /// derives this one from it on demand (design notes §9: "cyclic
    /// references ... modeled by ownership").
    GaussianDerivative {
        amplitude: f64,
        duration_ns: u32,
        num_sigmas: f64,
        drag_coefficient: f64,
    },
    FlatTop {
        amplitude: f64,
        duration_ns: u32,
        buffer_ns: u32,
    },
    Ramp {
        start: f64,
        end: f64,
        duration_ns: u32,
    },
    Chained(Vec<Waveform>),
    Arbitrary(Vec<f64>),
    TwoStep {
        amplitude_first: f64,
        amplitude_second: f64,
        duration_ns: u32,
        step_at_ns: u32,
    },
    Cosine {
        amplitude: f64,
        duration_ns: u32,
    },
    SuddenNetZero {
        amplitude: f64,
        duration_ns: u32,
        half_duration_ns: u32,
        t_phi_ns: u32,
    },
}

impl Waveform {
    /// Duration of the waveform in nanoseconds. For compound waveforms this
    /// is the union (sum) of the children's durations, per spec §4.2.
    #[must_use]
    pub fn duration_ns(&self) -> u32 {
        match self {
            Waveform::Square { duration_ns, .. }
            | Waveform::Gaussian { duration_ns, .. }
            | Waveform::GaussianDerivative { duration_ns, .. }
            | Waveform::FlatTop { duration_ns, .. }
            | Waveform::Ramp { duration_ns, .. }
            | Waveform::TwoStep { duration_ns, .. }
            | Waveform::Cosine { duration_ns, .. }
            | Waveform::SuddenNetZero { duration_ns, .. } => *duration_ns,
            Waveform::Chained(children) => children.iter().map(Waveform::duration_ns).sum(),
            Waveform::Arbitrary(samples) => samples.len() as u32,
        }
    }

    /// Samples the analytic descriptor into `duration_ns()` real values, one
    /// per nanosecond, optionally limited to `resolution_ns` distinct levels
    /// via nearest-neighbor up-sampling (spec §4.2): the descriptor is only
    /// evaluated once per `resolution_ns` window, then that value is held for
    /// the whole window.
    #[must_use]
    pub fn envelope(&self, resolution_ns: u32) -> Vec<f64> {
        let resolution_ns = resolution_ns.max(1);
        let duration = self.duration_ns();
        if let Waveform::Chained(children) = self {
            let mut out = Vec::with_capacity(duration as usize);
            for child in children {
                out.extend(child.envelope(resolution_ns));
            }
            return out;
        }
        if let Waveform::Arbitrary(samples) = self {
            return samples.clone();
        }

        let mut out = Vec::with_capacity(duration as usize);
        let mut t = 0u32;
        while t < duration {
            let held = self.sample_at(t);
            let window_end = (t + resolution_ns).min(duration);
            for _ in t..window_end {
                out.push(held);
            }
            t = window_end;
        }
        out
    }

    /// Evaluates the analytic descriptor at a single instant `t` (nanoseconds
    /// from pulse start). Never called for `Chained`/`Arbitrary`, which are
    /// handled directly in [`Waveform::envelope`].
    fn sample_at(&self, t: u32) -> f64 {
        match self {
            Waveform::Square { amplitude, .. } => *amplitude,
            Waveform::Gaussian {
                amplitude,
                duration_ns,
                num_sigmas,
            } => gaussian(t, *duration_ns, *num_sigmas) * amplitude,
            Waveform::GaussianDerivative {
                amplitude,
                duration_ns,
                num_sigmas,
                drag_coefficient,
            } => gaussian_derivative(t, *duration_ns, *num_sigmas) * amplitude * drag_coefficient,
            Waveform::FlatTop {
                amplitude,
                duration_ns,
                buffer_ns,
            } => flat_top(t, *duration_ns, *buffer_ns) * amplitude,
            Waveform::Ramp {
                start,
                end,
                duration_ns,
            } => {
                if *duration_ns <= 1 {
                    *end
                } else {
                    let frac = f64::from(t) / f64::from(duration_ns - 1);
                    start + (end - start) * frac
                }
            }
            Waveform::TwoStep {
                amplitude_first,
                amplitude_second,
                step_at_ns,
                ..
            } => {
                if t < *step_at_ns {
                    *amplitude_first
                } else {
                    *amplitude_second
                }
            }
            Waveform::Cosine {
                amplitude,
                duration_ns,
            } => {
                let omega = 2.0 * PI / f64::from((*duration_ns).max(1));
                amplitude * 0.5 * (1.0 - (omega * f64::from(t)).cos())
            }
            Waveform::SuddenNetZero {
                amplitude,
                half_duration_ns,
                t_phi_ns,
                ..
            } => sudden_net_zero(t, *half_duration_ns, *t_phi_ns) * amplitude,
            Waveform::Chained(_) | Waveform::Arbitrary(_) => {
                unreachable!("handled directly in envelope")
            }
        }
    }

    /// Deterministic fingerprint over the emitted samples, rounded to the DAC
    /// integer grid (spec §4.2: "round to integral sample grid after
    /// envelope generation"). Two descriptors that emit the same waveform
    /// table entry hash identically even if their analytic parameters differ
    /// in ways that don't affect the sampled output.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let quantized: Vec<i32> = self.envelope(1).into_iter().map(quantize_sample).collect();
        Fingerprint::of(&quantized)
    }
}

fn gaussian(t: u32, duration_ns: u32, num_sigmas: f64) -> f64 {
    let mu = f64::from(duration_ns) / 2.0;
    let sigma = f64::from(duration_ns) / num_sigmas.max(f64::EPSILON);
    let dt = f64::from(t) - mu;
    (-(dt * dt) / (2.0 * sigma * sigma)).exp()
}

/// dI/dt of the Gaussian envelope, analytically. Amplitude 0 is handled by
/// the caller multiplying by zero, so no division ever occurs here (spec
/// §4.2: "amplitude 0 must produce a flat zero without division errors").
fn gaussian_derivative(t: u32, duration_ns: u32, num_sigmas: f64) -> f64 {
    let mu = f64::from(duration_ns) / 2.0;
    let sigma = f64::from(duration_ns) / num_sigmas.max(f64::EPSILON);
    let dt = f64::from(t) - mu;
    let envelope = (-(dt * dt) / (2.0 * sigma * sigma)).exp();
    -dt / (sigma * sigma) * envelope
}

fn flat_top(t: u32, duration_ns: u32, buffer_ns: u32) -> f64 {
    let buffer_ns = buffer_ns.min(duration_ns / 2).max(1);
    if t < buffer_ns {
        // Rising edge: half a raised cosine from 0 to 1.
        let frac = f64::from(t) / f64::from(buffer_ns);
        0.5 * (1.0 - (PI * frac).cos())
    } else if t >= duration_ns - buffer_ns {
        let into_fall = t - (duration_ns - buffer_ns);
        let frac = f64::from(into_fall) / f64::from(buffer_ns);
        0.5 * (1.0 + (PI * frac).cos())
    } else {
        1.0
    }
}

fn sudden_net_zero(t: u32, half_duration_ns: u32, t_phi_ns: u32) -> f64 {
    if t < half_duration_ns {
        1.0
    } else if t < half_duration_ns + t_phi_ns {
        0.0
    } else {
        -1.0
    }
}

/// A pair of equal-duration waveforms carried on the I and Q DAC channels of a bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IQPair {
    pub i: Waveform,
    pub q: Waveform,
}

impl IQPair {
    /// Builds an `I`/`Q` pair from two waveforms of equal duration.
    ///
    /// # Panics
    /// Panics if `i` and `q` have different durations; an `IQPair` with
    /// mismatched channel durations cannot be played by a single `play`
    /// instruction (spec §3.1).
    #[must_use]
    pub fn new(i: Waveform, q: Waveform) -> Self {
        assert_eq!(
            i.duration_ns(),
            q.duration_ns(),
            "IQPair channels must share a duration"
        );
        Self { i, q }
    }

    /// Builds the canonical DRAG pulse: a Gaussian on `I` and its scaled
    /// derivative on `Q` (spec §4.2).
    #[must_use]
    pub fn drag(amplitude: f64, duration_ns: u32, num_sigmas: f64, drag_coefficient: f64) -> Self {
        Self {
            i: Waveform::Gaussian {
                amplitude,
                duration_ns,
                num_sigmas,
            },
            q: Waveform::GaussianDerivative {
                amplitude,
                duration_ns,
                num_sigmas,
                drag_coefficient,
            },
        }
    }

    #[must_use]
    pub fn duration_ns(&self) -> u32 {
        self.i.duration_ns()
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&(self.i.fingerprint(), self.q.fingerprint()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_envelope_is_constant() {
        let wf = Waveform::Square {
            amplitude: 1.0,
            duration_ns: 40,
        };
        let env = wf.envelope(1);
        assert_eq!(env.len(), 40);
        assert!(env.iter().all(|&s| (s - 1.0).abs() < 1e-12));
    }

    #[test]
    fn drag_zero_amplitude_is_flat_zero() {
        let pair = IQPair::drag(0.0, 40, 4.0, 0.5);
        assert!(pair.i.envelope(1).iter().all(|&s| s == 0.0));
        assert!(pair.q.envelope(1).iter().all(|&s| s.is_finite() && s == 0.0));
    }

    #[test]
    fn chained_duration_is_sum_of_children() {
        let wf = Waveform::Chained(vec![
            Waveform::Square {
                amplitude: 1.0,
                duration_ns: 10,
            },
            Waveform::Square {
                amplitude: 0.5,
                duration_ns: 20,
            },
        ]);
        assert_eq!(wf.duration_ns(), 30);
        assert_eq!(wf.envelope(1).len(), 30);
    }

    #[test]
    fn resolution_upsamples_by_nearest_neighbor() {
        let wf = Waveform::Ramp {
            start: 0.0,
            end: 1.0,
            duration_ns: 8,
        };
        let env = wf.envelope(4);
        assert_eq!(env.len(), 8);
        // Each group of 4 samples should be identical (held value).
        assert_eq!(env[0], env[1]);
        assert_eq!(env[1], env[2]);
        assert_eq!(env[2], env[3]);
        assert_ne!(env[0], env[4]);
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive_to_shape() {
        let a = Waveform::Square {
            amplitude: 1.0,
            duration_ns: 40,
        };
        let b = Waveform::Square {
            amplitude: 1.0,
            duration_ns: 40,
        };
        let c = Waveform::Square {
            amplitude: 0.5,
            duration_ns: 40,
        };
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn iqpair_requires_equal_duration() {
        let result = std::panic::catch_unwind(|| {
            IQPair::new(
                Waveform::Square {
                    amplitude: 1.0,
                    duration_ns: 10,
                },
                Waveform::Square {
                    amplitude: 1.0,
                    duration_ns: 20,
                },
            )
        });
        assert!(result.is_err());
    }
}
