use cantus_codec_lpc::autocorr::{autocorrelation_direct, LpcSubframeInfo};
use cantus_codec_lpc::lpc::{quantize, LpcContext, QuantizedPredictor, MAX_LPC_ORDER};
use cantus_codec_lpc::residual::{decode_residual, encode_residual};
use cantus_codec_lpc::section::{detect_sections, Section};
use cantus_codec_lpc::window::{compute_window, WindowKind};
use cantus_codec_lpc::{
    analyze_channels, encode_lpc_subframe, read_lpc_subframe, write_lpc_subframe, LpcOptions,
};
use cantus_core::io::{BitReaderLtr, BitWriterLtr, ReadBitsLtr, WriteBitsLtr};
use cantus_core::util::bits::zigzag_encode_i32;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const BIT_DEPTHS: [u32; 4] = [8, 16, 24, 32];

fn sample_range(bps: u32) -> (i32, i32) {
    let max = ((1i64 << (bps - 1)) - 1) as i32;
    (-max - 1, max)
}

fn random_block(rng: &mut SmallRng, len: usize, bps: u32) -> Vec<i32> {
    let (min, max) = sample_range(bps);
    (0..len).map(|_| rng.random_range(min..=max)).collect()
}

/// A bitwise CRC-16 with polynomial 0x8005 and an initial value of 0.
fn reference_crc16(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;

    for &byte in bytes {
        crc ^= u16::from(byte) << 8;

        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }

    crc
}

fn random_window(rng: &mut SmallRng, len: usize) -> Vec<f64> {
    let mut window = Vec::with_capacity(len);

    while window.len() < len {
        let run = rng.random_range(1..=(len / 4).max(1)).min(len - window.len());

        match rng.random_range(0..3) {
            0 => window.extend(std::iter::repeat(0.0).take(run)),
            1 => window.extend(std::iter::repeat(1.0).take(run)),
            _ => window.extend((0..run).map(|_| rng.random::<f64>())),
        }
    }

    window
}

fn assert_partitions(sections: &[Section], len: usize) {
    let mut pos = 0;

    for section in sections {
        assert_eq!(section.start, pos);
        assert!(section.end > section.start);
        pos = section.end;
    }

    assert_eq!(pos, len);
}

#[test]
fn residual_round_trip() {
    let mut rng = SmallRng::seed_from_u64(0xc0ffee);

    for &bps in BIT_DEPTHS.iter() {
        let (min, max) = sample_range(bps);

        for &len in [192, 4096, 16384].iter() {
            let blocks = [
                vec![0; len],
                vec![max; len],
                (0..len).map(|i| if i % 2 == 0 { max } else { min }).collect(),
                random_block(&mut rng, len, bps),
            ];

            for order in 1..=MAX_LPC_ORDER {
                let precision = rng.random_range(2..=15);
                let shift = rng.random_range(0..=15);

                let qmax = (1 << (precision - 1)) - 1;

                let coefs: Vec<i32> =
                    (0..order).map(|_| rng.random_range(-qmax - 1..=qmax)).collect();

                let predictor = QuantizedPredictor::new(&coefs, precision, shift).unwrap();

                let mut residual = vec![0; len];
                let mut decoded = vec![0; len];
                let mut sums = [0; 1];

                for block in blocks.iter() {
                    encode_residual(block, &predictor, bps, 0, &mut residual, &mut sums).unwrap();
                    decode_residual(&residual, &predictor, bps, &mut decoded).unwrap();

                    assert_eq!(&decoded, block, "bps={} len={} order={}", bps, len, order);
                }
            }
        }
    }
}

#[test]
fn crc16_matches_reference() {
    let mut rng = SmallRng::seed_from_u64(16);

    let mut buf = vec![0u8; 1024];

    let mut writer = BitWriterLtr::new(&mut buf);

    let mut widths = Vec::new();

    while writer.bits_written() < 8 * 1000 {
        let width = rng.random_range(1..=32);
        writer.write_bits_leq32(width, rng.random());
        widths.push(width);
    }

    let n_bits = writer.bits_written();
    let crc = writer.crc16();

    let len = writer.finish().unwrap();

    assert_eq!(crc, reference_crc16(&buf[..(n_bits / 8) as usize]));

    // Query the reader after every field, most of which end mid-byte.
    let mut reader = BitReaderLtr::new(&buf[..len]);

    for &width in widths.iter() {
        reader.read_bits_leq32(width).unwrap();

        let n_bytes = (reader.bits_read() / 8) as usize;

        assert_eq!(reader.crc16(), reference_crc16(&buf[..n_bytes]));
    }
}

#[test]
fn rice_codes_invert() {
    let mut rng = SmallRng::seed_from_u64(30);

    let mut candidates = vec![0, 1, -1, 2, -2, 1000, -1000, i32::MAX, i32::MIN, i32::MIN + 1];
    candidates.extend((0..200).map(|_| rng.random::<i32>()));
    candidates.extend((0..200).map(|_| rng.random_range(-5000..5000)));

    for k in 0..=30 {
        // Keep the unary part of each code short.
        let values: Vec<i32> =
            candidates.iter().copied().filter(|&v| zigzag_encode_i32(v) >> k <= 1 << 14).collect();

        assert!(!values.is_empty());

        let mut buf = vec![0u8; values.len() * ((1 << 14) / 8 + 8)];

        let mut writer = BitWriterLtr::new(&mut buf);

        writer.write_rice_block_signed(k, &values);

        let len = writer.finish().unwrap();

        let mut decoded = vec![0; values.len()];

        BitReaderLtr::new(&buf[..len]).read_rice_block(k, &mut decoded).unwrap();

        assert_eq!(decoded, values, "k={}", k);
    }
}

#[test]
fn window_sanity() {
    for len in [2, 3, 16, 1000, 4096] {
        let hann = compute_window(WindowKind::Hann, len);

        assert!(hann[0].abs() < 1e-12);
        assert!(hann[len - 1].abs() < 1e-12);

        assert!(compute_window(WindowKind::Rectangle, len).iter().all(|&w| w == 1.0));

        for kind in [
            WindowKind::Welch,
            WindowKind::Bartlett,
            WindowKind::Tukey { p: 0.5 },
            WindowKind::PunchoutTukey { p: 0.5, start: 0.25, end: 0.75 },
        ] {
            assert!(compute_window(kind, len).iter().all(|&w| w >= 0.0 && w <= 1.0));
        }
    }
}

#[test]
fn sections_partition_windows() {
    let mut rng = SmallRng::seed_from_u64(77);

    for _ in 0..50 {
        let len = rng.random_range(1..3000);
        let max_order = rng.random_range(0..=MAX_LPC_ORDER);
        let bps = rng.random_range(1..=32);

        let windows = [
            random_window(&mut rng, len),
            random_window(&mut rng, len),
            compute_window(WindowKind::Tukey { p: rng.random() }, len),
        ];

        let sections = detect_sections(&windows, bps, max_order).unwrap();

        assert_eq!(sections.len(), windows.len());

        for list in sections.iter() {
            assert_partitions(list, len);
        }
    }
}

#[test]
fn sectioned_autocorrelation_matches_direct() {
    let mut rng = SmallRng::seed_from_u64(2024);

    for round in 0..24 {
        let len = rng.random_range(64..5000);
        let max_lag = rng.random_range(1..=MAX_LPC_ORDER);
        let bps = BIT_DEPTHS[round % BIT_DEPTHS.len()];

        let base = random_window(&mut rng, len);

        // A second window sharing part of the first, so that sections are shared.
        let mut partner = base.clone();
        let cut = rng.random_range(0..len);
        partner[cut..].copy_from_slice(&random_window(&mut rng, len - cut));

        let windows = [
            base,
            partner,
            compute_window(
                WindowKind::PunchoutTukey { p: rng.random(), start: 0.2, end: 0.6 },
                len,
            ),
        ];

        let samples = random_block(&mut rng, len, bps);

        let sections = detect_sections(&windows, bps, max_lag).unwrap();

        let mut info = LpcSubframeInfo::new();

        for (window, list) in windows.iter().zip(sections.iter()) {
            let mut expected = vec![0.0; max_lag + 1];
            autocorrelation_direct(&samples, window, max_lag, &mut expected);

            let mut actual = vec![0.0; max_lag + 1];
            info.accumulate(list, &samples, window, 0, max_lag, &mut actual);

            for (a, e) in actual.iter().zip(expected.iter()) {
                let tol = 1e-6 * e.abs() + 1e-9 * expected[0].max(1.0);
                assert!((a - e).abs() <= tol, "round={} actual={} expected={}", round, a, e);
            }
        }
    }
}

#[test]
fn quantized_coefficients_are_bounded() {
    let mut rng = SmallRng::seed_from_u64(5);

    for _ in 0..2000 {
        let order = rng.random_range(1..=MAX_LPC_ORDER);
        let precision = rng.random_range(2..=16);
        let max_shift = rng.random_range(0..=20);
        let zero_shift = rng.random_range(0..=5);

        let magnitude = 2f64.powi(rng.random_range(-30..8));

        let coefs: Vec<f64> =
            (0..order).map(|_| (rng.random::<f64>() * 2.0 - 1.0) * magnitude).collect();

        let q = quantize(&coefs, precision, max_shift, zero_shift).unwrap();

        let qmax = (1i32 << (precision - 1)) - 1;

        assert!(q.coefs().iter().all(|&c| c >= -qmax - 1 && c <= qmax));

        let cmax = coefs.iter().fold(0.0f64, |m, c| m.max(c.abs()));

        if cmax * 2f64.powi(max_shift as i32) < 1.0 {
            assert!(q.is_zero());
            assert_eq!(q.shift(), zero_shift);
        }
        else {
            assert!(q.shift() <= max_shift);

            if precision > 2 {
                assert!(!q.is_zero());
            }
        }
    }
}

#[test]
fn akaike_ranking_is_deterministic() {
    let mut rng = SmallRng::seed_from_u64(8);

    let samples = random_block(&mut rng, 4096, 16);
    let window = compute_window(WindowKind::Hann, samples.len());
    let sections = detect_sections(&[&window[..]], 16, MAX_LPC_ORDER).unwrap();

    let rank = |samples: &[i32], alpha: f64, beta: f64| {
        let mut info = LpcSubframeInfo::new();
        let mut ctx = LpcContext::new();

        ctx.compute_reflection(MAX_LPC_ORDER, samples, &window, &sections[0], &mut info).unwrap();
        ctx.rank_orders_by_akaike(samples.len(), 1, MAX_LPC_ORDER, alpha, beta).unwrap().to_vec()
    };

    let first = rank(&samples, 1.0, 0.05);

    for _ in 0..5 {
        assert_eq!(rank(&samples, 1.0, 0.05), first);
    }

    // Equal scores keep their ascending order.
    let silence = vec![0; samples.len()];

    assert_eq!(rank(&silence, 0.0, 0.0), (1..=MAX_LPC_ORDER).collect::<Vec<_>>());
}

#[test]
fn subframe_round_trip() {
    let mut rng = SmallRng::seed_from_u64(44);

    for &bps in BIT_DEPTHS.iter() {
        for &len in [192, 4096].iter() {
            let (min, max) = sample_range(bps);

            // A random walk is well predicted by low orders.
            let step = (1i64 << (bps - 1)) / 64;
            let mut acc = 0i64;

            let walk: Vec<i32> = (0..len)
                .map(|_| {
                    acc += rng.random_range(-step..=step);
                    acc = acc.clamp(i64::from(min), i64::from(max));
                    acc as i32
                })
                .collect();

            let channels = [walk, random_block(&mut rng, len, bps), vec![max; len]];

            let options = LpcOptions { bits_per_sample: bps, max_order: 32, ..Default::default() };

            let subframes = analyze_channels(&channels, &options, None).unwrap();

            let mut buf = vec![0u8; subframes.iter().map(|s| (s.bits / 8 + 8) as usize).sum()];

            let mut writer = BitWriterLtr::new(&mut buf);

            for subframe in subframes.iter() {
                write_lpc_subframe(&mut writer, subframe).unwrap();
            }

            let size = writer.finish().unwrap();

            let mut reader = BitReaderLtr::new(&buf[..size]);

            for (subframe, channel) in subframes.iter().zip(channels.iter()) {
                let mut decoded = vec![0; len];

                let predictor = read_lpc_subframe(&mut reader, bps, &mut decoded).unwrap();

                assert_eq!(predictor, subframe.predictor);
                assert_eq!(&decoded, channel, "bps={} len={}", bps, len);
            }
        }
    }
}

#[test]
fn predictable_signal_compresses() {
    let samples: Vec<i32> = (0..4096)
        .map(|i| {
            let t = i as f64;
            (8000.0 * (t * 0.031).sin() + 3000.0 * (t * 0.173).sin()) as i32
        })
        .collect();

    let subframe = encode_lpc_subframe(&samples, &LpcOptions::default()).unwrap();

    assert!(subframe.predictor.order() >= 2);
    assert!(subframe.bits < 16 * 4096 / 2, "bits={}", subframe.bits);
}
