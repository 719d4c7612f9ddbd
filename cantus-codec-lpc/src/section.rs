// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Window section detection.
//!
//! The autocorrelation of a windowed block, `R[lag] = Σ y[i]·y[i - lag]` with `y = x·w`, is a sum
//! over the later index `i`. Splitting `[0, len)` into sections and summing the terms whose later
//! index falls within each section yields the same result as a single pass, but allows each section
//! to be computed the cheapest way its weights permit:
//!
//! * `Zero`: every weight is 0. The section contributes nothing.
//! * `Unity`/`UnityLarge`: every weight within the section, and within the `max_order` positions
//!   preceding it, is exactly 1. The window is skipped entirely and the products are accumulated
//!   exactly in integer arithmetic. `UnityLarge` selects the wider accumulator.
//! * `UnityGlue`: weights within the section are 1 but some preceding weight is not. Only the
//!   earlier operand of each product is weighted.
//! * `Data`: arbitrary weights.
//! * `Glue`: the leading positions of a data run that follows a run with a different identity.
//!   Splitting them off lets the rest of the run be shared with another window.
//!
//! Sections with identical bounds and kind in several windows, whose products are also identical
//! (for `Data`, equal weights over the section and its `max_order` predecessors), receive a common
//! id so that their partial sums are computed once.

use log::trace;

use cantus_core::errors::{invalid_param_error, Result};
use cantus_core::util::bits::bit_width_u64;

use crate::lpc::MAX_LPC_ORDER;

/// The type of a window section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Zero,
    Unity,
    UnityLarge,
    Data,
    UnityGlue,
    Glue,
}

/// A typed half-open interval `[start, end)` of an analysis window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
    pub kind: SectionKind,
    /// If set, the section's partial sums are shared with an identical section of another window.
    pub id: Option<usize>,
}

impl Section {
    fn new(start: usize, end: usize, kind: SectionKind) -> Self {
        Section { start, end, kind, id: None }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Tag {
    Zero,
    Unity,
    Data,
}

#[inline(always)]
fn tag(weight: f64) -> Tag {
    if weight == 0.0 {
        Tag::Zero
    }
    else if weight == 1.0 {
        Tag::Unity
    }
    else {
        Tag::Data
    }
}

/// Returns the maximal runs `(start, end, tag)` of a window.
fn runs(window: &[f64]) -> Vec<(usize, usize, Tag)> {
    let mut runs = Vec::new();

    let mut i = 0;

    while i < window.len() {
        let start = i;
        let run_tag = tag(window[i]);

        while i < window.len() && tag(window[i]) == run_tag {
            i += 1;
        }

        runs.push((start, i, run_tag));
    }

    runs
}

/// Returns true if the unity sections of a block require the wide accumulator.
///
/// The sum of `len` products of two `bits_per_sample`-bit samples needs up-to
/// `2·bits_per_sample + ceil(log2(len))` bits.
pub fn needs_wide_accumulator(bits_per_sample: u32, len: usize) -> bool {
    let log2_len = bit_width_u64((len as u64).saturating_sub(1));
    2 * bits_per_sample + log2_len >= 61
}

/// Returns the number of leading positions of the data interval `[start, end)` in window `k` to
/// split off as glue.
///
/// Windows with equal weights at `start` are partners. A partner that also agrees over the
/// `max_order` positions preceding `start` needs no glue. Otherwise, glue extends until the
/// lagged products no longer reach back past the point of agreement.
fn data_glue_len(
    windows: &[&[f64]],
    k: usize,
    start: usize,
    end: usize,
    max_order: usize,
) -> usize {
    let window = windows[k];

    let reach = max_order.min(start);

    let mut glue = None;

    for (k2, partner) in windows.iter().enumerate() {
        if k2 == k || partner[start] != window[start] {
            continue;
        }

        let agree = (1..=reach).take_while(|&d| partner[start - d] == window[start - d]).count();

        let need = if agree == reach { 0 } else { (max_order - agree).min(end - start) };

        glue = Some(glue.map_or(need, |g: usize| g.min(need)));
    }

    glue.unwrap_or(0)
}

struct Group {
    start: usize,
    end: usize,
    kind: SectionKind,
    owner: usize,
    members: usize,
}

/// Detects the sections of every window in a batch of equal length windows.
///
/// All windows are scanned together so that sections with an identical shape in several windows
/// line up and share an id. The sections of each window are contiguous, in order, and cover the
/// window exactly. Autocorrelation over the returned sections must not be requested beyond
/// `max_order` lags.
pub fn detect_sections<W: AsRef<[f64]>>(
    windows: &[W],
    bits_per_sample: u32,
    max_order: usize,
) -> Result<Vec<Vec<Section>>> {
    if bits_per_sample == 0 || bits_per_sample > 32 {
        return invalid_param_error("section: bits per sample must be within [1, 32]");
    }

    if max_order > MAX_LPC_ORDER {
        return invalid_param_error("section: order exceeds the maximum lpc order");
    }

    let windows: Vec<&[f64]> = windows.iter().map(|w| w.as_ref()).collect();

    let len = match windows.first() {
        Some(first) => first.len(),
        None => return Ok(Vec::new()),
    };

    if windows.iter().any(|w| w.len() != len) {
        return invalid_param_error("section: windows must be of equal length");
    }

    if len == 0 {
        return Ok(vec![Vec::new(); windows.len()]);
    }

    let unity_kind = if needs_wide_accumulator(bits_per_sample, len) {
        SectionKind::UnityLarge
    }
    else {
        SectionKind::Unity
    };

    let window_runs: Vec<_> = windows.iter().map(|w| runs(w)).collect();

    // Collect the boundaries of every window into a common set of cuts.
    let mut cuts = vec![false; len + 1];

    cuts[0] = true;
    cuts[len] = true;

    for runs in window_runs.iter() {
        for &(start, end, run_tag) in runs.iter() {
            cuts[start] = true;

            // Past this point a unity run is valid without glue.
            if run_tag == Tag::Unity && start > 0 && start + max_order < end {
                cuts[start + max_order] = true;
            }
        }
    }

    // Cut wherever two windows begin or cease to agree.
    for (a, wa) in windows.iter().enumerate() {
        for wb in windows[a + 1..].iter() {
            for i in 1..len {
                if (wa[i] == wb[i]) != (wa[i - 1] == wb[i - 1]) {
                    cuts[i] = true;
                }
            }
        }
    }

    let bounds: Vec<usize> = (0..=len).filter(|&i| cuts[i]).collect();

    // Split each window into pieces along the cuts.
    let mut pieces = Vec::with_capacity(windows.len());

    for (k, runs) in window_runs.iter().enumerate() {
        let mut list = Vec::with_capacity(bounds.len());

        let mut run = 0;

        for pair in bounds.windows(2) {
            let (start, end) = (pair[0], pair[1]);

            while runs[run].1 <= start {
                run += 1;
            }

            let (run_start, _, run_tag) = runs[run];

            match run_tag {
                Tag::Zero => list.push(Section::new(start, end, SectionKind::Zero)),
                Tag::Unity => {
                    let kind = if run_start > 0 && start < run_start + max_order {
                        SectionKind::UnityGlue
                    }
                    else {
                        unity_kind
                    };

                    list.push(Section::new(start, end, kind));
                }
                Tag::Data => {
                    let glue = data_glue_len(&windows, k, start, end, max_order);

                    if glue > 0 {
                        list.push(Section::new(start, start + glue, SectionKind::Glue));
                    }
                    if start + glue < end {
                        list.push(Section::new(start + glue, end, SectionKind::Data));
                    }
                }
            }
        }

        pieces.push(list);
    }

    // Group identical pieces across windows.
    let mut groups: Vec<Group> = Vec::new();
    let mut membership: Vec<Vec<Option<usize>>> = Vec::with_capacity(pieces.len());

    for (k, list) in pieces.iter().enumerate() {
        let mut members = Vec::with_capacity(list.len());

        for piece in list.iter() {
            let shareable = matches!(
                piece.kind,
                SectionKind::Unity | SectionKind::UnityLarge | SectionKind::Data
            );

            if !shareable {
                members.push(None);
                continue;
            }

            let reach = piece.start.saturating_sub(max_order);

            let found = groups.iter().position(|g| {
                g.start == piece.start
                    && g.end == piece.end
                    && g.kind == piece.kind
                    && (g.kind != SectionKind::Data
                        || windows[g.owner][reach..piece.end] == windows[k][reach..piece.end])
            });

            match found {
                Some(idx) => {
                    groups[idx].members += 1;
                    members.push(Some(idx));
                }
                None => {
                    groups.push(Group {
                        start: piece.start,
                        end: piece.end,
                        kind: piece.kind,
                        owner: k,
                        members: 1,
                    });
                    members.push(Some(groups.len() - 1));
                }
            }
        }

        membership.push(members);
    }

    // Only groups with more than one member are shared.
    let mut ids = vec![None; groups.len()];
    let mut n_shared = 0;

    for (id, group) in ids.iter_mut().zip(groups.iter()) {
        if group.members > 1 {
            *id = Some(n_shared);
            n_shared += 1;
        }
    }

    // Merge adjacent unshared pieces of the same kind.
    let mut sections = Vec::with_capacity(pieces.len());

    for (k, (list, members)) in pieces.into_iter().zip(membership).enumerate() {
        let mut merged: Vec<Section> = Vec::with_capacity(list.len());

        for (mut piece, member) in list.into_iter().zip(members) {
            piece.id = member.and_then(|idx| ids[idx]);

            if let Some(last) = merged.last_mut() {
                if last.kind == piece.kind && last.id.is_none() && piece.id.is_none() {
                    last.end = piece.end;
                    continue;
                }
            }

            merged.push(piece);
        }

        trace!("section: window {} split into {} sections", k, merged.len());

        sections.push(merged);
    }

    trace!("section: {} sections shared across {} windows", n_shared, windows.len());

    Ok(sections)
}
