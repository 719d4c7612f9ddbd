// Cantus
// Copyright (c) 2024 The Project Cantus Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block analysis across channels.

use std::sync::atomic::AtomicBool;

#[cfg(feature = "par")]
use rayon::iter::IntoParallelIterator;
#[cfg(feature = "par")]
use rayon::iter::ParallelIterator;

use log::debug;

use cantus_core::errors::{invalid_param_error, Result};

use crate::options::LpcOptions;
use crate::subframe::{encode_lpc_subframe_with_abort, LpcSubframe};

/// Analyzes every channel of a block, returning one subframe per channel in channel order.
///
/// Channels are independent. With the `par` feature they are analyzed in parallel, each task
/// owning its own analysis state. If `abort` is raised, each channel returns the best subframe
/// found so far.
pub fn analyze_channels<C>(
    channels: &[C],
    options: &LpcOptions,
    abort: Option<&AtomicBool>,
) -> Result<Vec<LpcSubframe>>
where
    C: AsRef<[i32]> + Sync,
{
    options.validate()?;

    if let Some(first) = channels.first() {
        let len = first.as_ref().len();

        if channels.iter().any(|c| c.as_ref().len() != len) {
            return invalid_param_error("analysis: channels differ in length");
        }
    }

    debug!("analysis: analyzing {} channels", channels.len());

    map_channels(channels, |channel| {
        encode_lpc_subframe_with_abort(channel.as_ref(), options, abort)
    })
}

#[cfg(feature = "par")]
fn map_channels<C, F>(channels: &[C], analyze: F) -> Result<Vec<LpcSubframe>>
where
    C: Sync,
    F: Fn(&C) -> Result<LpcSubframe> + Sync + Send,
{
    channels.into_par_iter().map(analyze).collect()
}

#[cfg(not(feature = "par"))]
fn map_channels<C, F>(channels: &[C], analyze: F) -> Result<Vec<LpcSubframe>>
where
    F: Fn(&C) -> Result<LpcSubframe>,
{
    channels.iter().map(analyze).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subframe::encode_lpc_subframe;

    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn verify_channels_match_single() {
        let mut rng = SmallRng::seed_from_u64(31);

        let channels: Vec<Vec<i32>> = (0..4)
            .map(|c| {
                let mut acc = 0i32;
                (0..2048)
                    .map(|_| {
                        acc = (acc + rng.random_range(-64..64) * (c + 1)).clamp(-32768, 32767);
                        acc
                    })
                    .collect()
            })
            .collect();

        let options = LpcOptions::default();

        let subframes = analyze_channels(&channels, &options, None).unwrap();

        assert_eq!(subframes.len(), channels.len());

        for (subframe, channel) in subframes.iter().zip(channels.iter()) {
            assert_eq!(subframe, &encode_lpc_subframe(channel, &options).unwrap());
        }
    }

    #[test]
    fn verify_invalid_channels() {
        let channels = [vec![0; 64], vec![0; 32]];

        assert!(analyze_channels(&channels, &LpcOptions::default(), None).is_err());

        let empty: [Vec<i32>; 0] = [];

        assert!(analyze_channels(&empty, &LpcOptions::default(), None).unwrap().is_empty());
    }

    #[test]
    fn verify_abort_raised() {
        let channels = [vec![100; 1024], vec![-100; 1024]];

        let abort = AtomicBool::new(true);

        let subframes = analyze_channels(&channels, &LpcOptions::default(), Some(&abort)).unwrap();

        assert_eq!(subframes.len(), 2);
    }
}
