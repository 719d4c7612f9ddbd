// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Windowed autocorrelation, computed per window section.

use log::trace;

use crate::section::{Section, SectionKind};

/// Computes the contribution of one section to the autocorrelation of the windowed samples for the
/// lags `min_lag..=max_lag`, writing `dest[lag]`.
///
/// The contribution of a section `[start, end)` is `Σ y[i]·y[i - lag]` over `i` in the section,
/// where `y = samples·window`. Summing the contributions of a complete set of sections yields
/// [`autocorrelation_direct`].
pub fn compute_autocorr(
    section: &Section,
    samples: &[i32],
    window: &[f64],
    min_lag: usize,
    max_lag: usize,
    dest: &mut [f64],
) {
    debug_assert!(section.end <= samples.len() && samples.len() == window.len());
    debug_assert!(dest.len() > max_lag);

    let Section { start, end, kind, .. } = *section;

    match kind {
        SectionKind::Zero => {
            dest[min_lag..=max_lag].fill(0.0);
        }
        SectionKind::Unity => {
            for lag in min_lag..=max_lag {
                dest[lag] = unity_narrow(samples, start, end, lag) as f64;
            }
        }
        SectionKind::UnityLarge => {
            for lag in min_lag..=max_lag {
                dest[lag] = unity_wide(samples, start, end, lag) as f64;
            }
        }
        SectionKind::UnityGlue => {
            for lag in min_lag..=max_lag {
                let from = start.max(lag);

                dest[lag] = (from..end)
                    .map(|i| {
                        let j = i - lag;
                        f64::from(samples[i]) * (f64::from(samples[j]) * window[j])
                    })
                    .sum();
            }
        }
        SectionKind::Data => {
            for lag in min_lag..=max_lag {
                let from = start.max(lag);

                dest[lag] = (from..end)
                    .map(|i| {
                        let j = i - lag;
                        (f64::from(samples[i]) * window[i]) * (f64::from(samples[j]) * window[j])
                    })
                    .sum();
            }
        }
        SectionKind::Glue => {
            // Window the section and the samples it reaches back to into a local buffer.
            let lo = start.saturating_sub(max_lag);

            let local: Vec<f64> = samples[lo..end]
                .iter()
                .zip(&window[lo..end])
                .map(|(&x, &w)| f64::from(x) * w)
                .collect();

            for lag in min_lag..=max_lag {
                let from = start.max(lag);

                dest[lag] = if from < end {
                    local[from - lo..end - lo]
                        .iter()
                        .zip(&local[from - lag - lo..end - lag - lo])
                        .map(|(a, b)| a * b)
                        .sum()
                }
                else {
                    0.0
                };
            }
        }
    }
}

/// Exact windowless sum of products. The sum may not exceed 63 bits for well-formed samples.
fn unity_narrow(samples: &[i32], start: usize, end: usize, lag: usize) -> i64 {
    let from = start.max(lag);

    if from >= end {
        return 0;
    }

    samples[from..end]
        .iter()
        .zip(&samples[from - lag..end - lag])
        .fold(0i64, |acc, (&a, &b)| acc.wrapping_add(i64::from(a) * i64::from(b)))
}

/// Exact windowless sum of products using a 128-bit accumulator.
fn unity_wide(samples: &[i32], start: usize, end: usize, lag: usize) -> i128 {
    let from = start.max(lag);

    if from >= end {
        return 0;
    }

    samples[from..end]
        .iter()
        .zip(&samples[from - lag..end - lag])
        .map(|(&a, &b)| i128::from(i64::from(a) * i64::from(b)))
        .sum()
}

/// Computes the autocorrelation of the windowed samples for lags `0..=max_lag` in a single pass
/// without sectioning.
pub fn autocorrelation_direct(samples: &[i32], window: &[f64], max_lag: usize, dest: &mut [f64]) {
    debug_assert!(samples.len() == window.len());
    debug_assert!(dest.len() > max_lag);

    let windowed: Vec<f64> =
        samples.iter().zip(window).map(|(&x, &w)| f64::from(x) * w).collect();

    for (lag, d) in dest[..=max_lag].iter_mut().enumerate() {
        *d = if lag < windowed.len() {
            windowed[lag..].iter().zip(&windowed[..windowed.len() - lag]).map(|(a, b)| a * b).sum()
        }
        else {
            0.0
        };
    }
}

/// `LpcSubframeInfo` caches the partial autocorrelation sums of shared sections while the candidate
/// windows of one subframe are evaluated.
///
/// Partial sums are keyed by section id and are extended to higher lags on demand. The cache
/// must be cleared before it is used with different samples or a different set of sections.
#[derive(Default)]
pub struct LpcSubframeInfo {
    partials: Vec<Vec<f64>>,
}

impl LpcSubframeInfo {
    /// Instantiate a new `LpcSubframeInfo` with an empty cache.
    pub fn new() -> Self {
        Default::default()
    }

    /// Discards all cached partial sums.
    pub fn clear(&mut self) {
        self.partials.clear();
    }

    /// Returns the partial sums of a shared section for the lags `0..=max_lag`.
    fn shared_autocorr(
        &mut self,
        id: usize,
        section: &Section,
        samples: &[i32],
        window: &[f64],
        max_lag: usize,
    ) -> &[f64] {
        if self.partials.len() <= id {
            self.partials.resize_with(id + 1, Vec::new);
        }

        let partial = &mut self.partials[id];

        let known = partial.len();

        if known <= max_lag {
            partial.resize(max_lag + 1, 0.0);
            compute_autocorr(section, samples, window, known, max_lag, partial);
        }
        else {
            trace!("autocorr: reusing lags 0..={} of shared section {}", max_lag, id);
        }

        &partial[..=max_lag]
    }

    /// Adds the contributions of all `sections` for the lags `min_lag..=max_lag` into `dest[lag]`.
    pub fn accumulate(
        &mut self,
        sections: &[Section],
        samples: &[i32],
        window: &[f64],
        min_lag: usize,
        max_lag: usize,
        dest: &mut [f64],
    ) {
        let mut scratch = vec![0.0; max_lag + 1];

        for section in sections {
            let contrib = match section.id {
                Some(id) => self.shared_autocorr(id, section, samples, window, max_lag),
                None => {
                    compute_autocorr(section, samples, window, min_lag, max_lag, &mut scratch);
                    &scratch[..]
                }
            };

            for (d, c) in dest[min_lag..=max_lag].iter_mut().zip(&contrib[min_lag..=max_lag]) {
                *d += c;
            }
        }
    }
}
