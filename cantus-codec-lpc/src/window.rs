// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Analysis window functions.
//!
//! All windows are computed in double precision. Windows with flat regions (rectangle, Tukey, and
//! punched Tukey) produce exactly `1.0` and `0.0` over those regions so that section detection can
//! recognize them.

use std::f64::consts::PI;

use cantus_core::errors::{invalid_param_error, Result};

/// The shape of an analysis window.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WindowKind {
    /// Uniformly 1.
    Rectangle,
    /// A parabola, `1 - k^2`, with `k` the normalized distance from the center.
    Welch,
    /// The square of the Welch window.
    Bartlett,
    /// A raised cosine, `0.5 - 0.5·cos(2πn / (L - 1))`.
    Hann,
    /// A 5-term flat-top window.
    FlatTop,
    /// A rectangle with cosine tapers. `p` is the fraction of the window that is tapered.
    Tukey { p: f64 },
    /// A Tukey window with the region `[start·L, end·L)` zeroed. Each of the two remaining edge
    /// segments receives its own Tukey taper of fraction `p`.
    PunchoutTukey { p: f64, start: f64, end: f64 },
}

impl WindowKind {
    /// Returns an error if the window parameters are out of range.
    pub fn validate(&self) -> Result<()> {
        let unit = |v: f64| v.is_finite() && v >= 0.0 && v <= 1.0;

        match *self {
            WindowKind::Tukey { p } if !unit(p) => {
                invalid_param_error("window: tukey fraction must be within [0, 1]")
            }
            WindowKind::PunchoutTukey { p, start, end } => {
                if !unit(p) || !unit(start) || !unit(end) || start > end {
                    return invalid_param_error("window: invalid punchout tukey parameters");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Computes a window of length `len`.
pub fn compute_window(kind: WindowKind, len: usize) -> Vec<f64> {
    let mut window = vec![0.0; len];
    fill_window(kind, &mut window);
    window
}

/// Fills `dest` with a window of length `dest.len()`.
pub fn fill_window(kind: WindowKind, dest: &mut [f64]) {
    // A single point window carries the sample unmodified.
    if dest.len() <= 1 {
        dest.fill(1.0);
        return;
    }

    match kind {
        WindowKind::Rectangle => dest.fill(1.0),
        WindowKind::Welch => welch(dest),
        WindowKind::Bartlett => {
            welch(dest);
            for w in dest.iter_mut() {
                *w *= *w;
            }
        }
        WindowKind::Hann => hann(dest),
        WindowKind::FlatTop => flat_top(dest),
        WindowKind::Tukey { p } => tukey(p, dest),
        WindowKind::PunchoutTukey { p, start, end } => {
            let len = dest.len();

            let start = (start.clamp(0.0, 1.0) * len as f64) as usize;
            let end = (end.clamp(0.0, 1.0) * len as f64) as usize;

            if end <= start {
                tukey(p, dest);
                return;
            }

            let (head, rest) = dest.split_at_mut(start);
            let (hole, tail) = rest.split_at_mut(end - start);

            tukey(p, head);
            hole.fill(0.0);
            tukey(p, tail);
        }
    }
}

fn welch(dest: &mut [f64]) {
    let n2 = (dest.len() - 1) as f64 / 2.0;

    for (n, w) in dest.iter_mut().enumerate() {
        let k = (n as f64 - n2) / n2;
        *w = 1.0 - k * k;
    }
}

fn hann(dest: &mut [f64]) {
    let m1 = (dest.len() - 1) as f64;

    for (n, w) in dest.iter_mut().enumerate() {
        *w = 0.5 - 0.5 * (2.0 * PI * n as f64 / m1).cos();
    }
}

fn flat_top(dest: &mut [f64]) {
    let m1 = (dest.len() - 1) as f64;

    for (n, w) in dest.iter_mut().enumerate() {
        let x = 2.0 * PI * n as f64 / m1;

        *w = 1.0 - 1.93 * x.cos() + 1.29 * (2.0 * x).cos() - 0.388 * (3.0 * x).cos()
            + 0.0322 * (4.0 * x).cos();
    }
}

fn tukey(p: f64, dest: &mut [f64]) {
    let len = dest.len();

    match len {
        0 => return,
        1 => {
            dest[0] = 1.0;
            return;
        }
        _ => (),
    }

    if p <= 0.0 {
        dest.fill(1.0);
        return;
    }
    else if p >= 1.0 {
        hann(dest);
        return;
    }

    let taper = p * (len - 1) as f64;
    let width = (taper / 2.0).floor() as usize;

    dest.fill(1.0);

    for n in 0..=width {
        let w = 0.5 - 0.5 * (2.0 * PI * n as f64 / taper).cos();

        dest[n] = w;
        dest[len - 1 - n] = w;
    }
}
