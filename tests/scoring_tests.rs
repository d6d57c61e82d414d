// Tests for the scoring scheme: max-gap calibration, N filtering, linear
// score functions and preset parameters.

use stripe_align::scoring::{CostModel, Scoring};
use stripe_align::AlignError;

#[test]
fn bwa_sw_like_preset_fields() {
    let sc = Scoring::bwa_sw_like();
    assert_eq!(sc.match_bonus, 1);
    assert_eq!(sc.mm(10), 3, "constant mismatch penalty ignores quality");
    assert_eq!(sc.n(10), 3);
    assert_eq!(sc.snp, 3);
    assert_eq!(sc.read_gap_open(), 15);
    assert_eq!(sc.read_gap_extend(), 4);
    assert_eq!(sc.ref_gap_open(), 15);
    assert_eq!(sc.ref_gap_extend(), 4);
    assert_eq!(sc.gapbar, 5);
    assert_eq!(sc.rowlo, -1);
    assert!(!sc.row_first);
}

#[test]
fn max_read_gaps_calibration() {
    // match=1, read gap (11, 4): open 15, extend 4. The first converted
    // position also forfeits its match reward.
    let sc = Scoring::bwa_sw_like();
    assert_eq!(sc.max_read_gaps(0, 10), 0); // 10 - 1 - 15 = -6
    assert_eq!(sc.max_read_gaps(0, 15), 0); // 15 - 1 - 15 = -1
    assert_eq!(sc.max_read_gaps(0, 16), 1); // 16 - 1 - 15 =  0
    assert_eq!(sc.max_read_gaps(0, 20), 1); // 20 - 2 - 19 = -1
    assert_eq!(sc.max_read_gaps(0, 21), 2); // 21 - 2 - 19 =  0
}

#[test]
fn max_ref_gaps_calibration() {
    // Reference gaps do not forfeit a match reward; the sequences differ
    // from the read-gap ones by exactly that asymmetry.
    let sc = Scoring::bwa_sw_like();
    assert_eq!(sc.max_ref_gaps(0, 10), 0); // 10 - 0 - 15 = -5
    assert_eq!(sc.max_ref_gaps(0, 14), 0); // 14 - 0 - 15 = -1
    assert_eq!(sc.max_ref_gaps(0, 15), 1); // 15 - 0 - 15 =  0
    assert_eq!(sc.max_ref_gaps(0, 18), 1); // 18 - 0 - 19 = -1
    assert_eq!(sc.max_ref_gaps(0, 19), 2); // 19 - 0 - 19 =  0
    assert_eq!(sc.max_ref_gaps(0, 21), 2); // 21 - 0 - 23 = -2
}

#[test]
fn max_gaps_with_quality_costs() {
    // match=4, both gap types (25, 10), QUAL cost models.
    let sc = Scoring::new(
        4,
        CostModel::Qual,
        0,
        30,
        -3.0,
        -3.0,
        0.0,
        0.0,
        3.0,
        0.4,
        CostModel::Qual,
        0,
        true,
        25,
        25,
        10,
        10,
        5,
        -1,
        false,
    )
    .expect("valid scoring");

    assert_eq!(sc.max_read_gaps(0, 9), 0); // 36 - 4 - 35 = -3
    assert_eq!(sc.max_read_gaps(0, 10), 1); // 40 - 4 - 35 =  1
    assert_eq!(sc.max_read_gaps(0, 13), 1); // 52 - 8 - 45 = -1
    assert_eq!(sc.max_read_gaps(0, 14), 2); // 56 - 8 - 45 =  3

    assert_eq!(sc.max_ref_gaps(0, 8), 0); // 32 - 0 - 35 = -3
    assert_eq!(sc.max_ref_gaps(0, 9), 1); // 36 - 0 - 35 =  1
    assert_eq!(sc.max_ref_gaps(0, 12), 2); // 48 - 0 - 45 =  3
    assert_eq!(sc.max_ref_gaps(0, 14), 3); // 56 - 0 - 55 =  1

    // Quality-driven penalties pass the quality straight through.
    for q in 0..64 {
        assert_eq!(sc.mm(q), q);
        assert_eq!(sc.n(q), q);
    }

    // N ceiling: const=3, linear=0.4.
    assert_eq!(sc.n_ceil(1), 3);
    assert_eq!(sc.n_ceil(3), 4);
    assert_eq!(sc.n_ceil(5), 5);
    assert_eq!(sc.n_ceil(8), 6);
}

#[test]
fn rounded_qual_penalties_round_through_the_cost_model() {
    // Quality-rounded penalties: nearest multiple of 10, capped at 30,
    // with nonzero qualities never rounding below 10.
    let sc = Scoring::new(
        2,
        CostModel::RoundedQual,
        0,
        3,
        -3.0,
        -3.0,
        0.0,
        0.0,
        2.0,
        0.1,
        CostModel::RoundedQual,
        0,
        false,
        11,
        11,
        4,
        4,
        5,
        -1,
        false,
    )
    .expect("valid scoring");

    for (q, expect) in [
        (0, 0),
        (1, 10),
        (4, 10),
        (5, 10),
        (14, 10),
        (15, 20),
        (24, 20),
        (25, 30),
        (30, 30),
        (40, 30),
        (63, 30),
    ] {
        assert_eq!(sc.mm(q), expect, "mm({}) should round to {}", q, expect);
        assert_eq!(sc.n(q), expect, "n({}) should round to {}", q, expect);
    }
}

#[test]
fn n_ceil_calibration_and_saturation() {
    let sc = Scoring::bwa_sw_like();
    // const=2, linear=0.1
    assert_eq!(sc.n_ceil(1), 2);
    assert_eq!(sc.n_ceil(9), 2);
    assert_eq!(sc.n_ceil(10), 3);

    // A negative formula saturates at zero.
    let mut neg = Scoring::bwa_sw_like();
    neg.n_ceil_const = -5.0;
    neg.n_ceil_linear = 0.0;
    assert_eq!(neg.n_ceil(100), 0);
}

#[test]
fn n_filter_counts_against_ceiling() {
    let sc = Scoring::bwa_sw_like();
    // len 10 -> ceiling 3. Three Ns pass, four do not.
    let three_ns = [4u8, 4, 4, 0, 0, 0, 0, 0, 0, 0];
    let four_ns = [4u8, 4, 4, 4, 0, 0, 0, 0, 0, 0];
    assert!(sc.n_filter(&three_ns));
    assert!(!sc.n_filter(&four_ns));
}

#[test]
fn n_filter_matches_closed_form() {
    // nFilter(r) must equal count_of_N(r) <= floor(const + linear * len).
    let sc = Scoring::bwa_sw_like();
    for len in 1..40usize {
        for ns in 0..=len {
            let mut read = vec![0u8; len];
            for slot in read.iter_mut().take(ns) {
                *slot = 4;
            }
            let expect = (ns as u64) <= sc.n_ceil(len);
            assert_eq!(
                sc.n_filter(&read),
                expect,
                "len={} ns={} ceiling={}",
                len,
                ns,
                sc.n_ceil(len)
            );
        }
    }
}

#[test]
fn n_filter_pair_concatenates_when_configured() {
    let mut sc = Scoring::bwa_sw_like();
    sc.ncatpair = true;
    // Joint length 20 -> ceiling 4. Three Ns in mate 1 plus two in mate 2
    // exceed it; both mates are rejected together.
    let rd1 = [4u8, 4, 4, 0, 0, 0, 0, 0, 0, 0];
    let rd2 = [4u8, 4, 0, 0, 0, 0, 0, 0, 0, 0];
    let (p1, p2) = sc.n_filter_pair(Some(&rd1), Some(&rd2));
    assert!(!p1 && !p2, "joint excess must reject both mates");

    // One N fewer passes jointly.
    let rd2_ok = [4u8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let (p1, p2) = sc.n_filter_pair(Some(&rd1), Some(&rd2_ok));
    assert!(p1 && p2);

    // Without concatenation each mate is filtered alone (len 10 -> 3).
    sc.ncatpair = false;
    let (p1, p2) = sc.n_filter_pair(Some(&rd1), Some(&rd2));
    assert!(p1 && p2);
}

#[test]
fn max_read_gaps_matches_closed_form() {
    // Property: the result is the largest k whose running score
    // (k converted positions, each forfeiting its match, the first also
    // paying the open and the rest the extend) stays >= 0.
    let sc = Scoring::bwa_sw_like();
    let closed = |rdlen: usize, k: i64| {
        (rdlen as i64) * sc.match_bonus as i64
            - k * sc.match_bonus as i64
            - sc.read_gap_open() as i64
            - (k - 1) * sc.read_gap_extend() as i64
    };
    for rdlen in 16..64usize {
        let got = sc.max_read_gaps(0, rdlen) as i64;
        assert!(got >= 1, "rdlen={} allows at least one gap", rdlen);
        assert!(closed(rdlen, got) >= 0, "rdlen={} k={}", rdlen, got);
        assert!(closed(rdlen, got + 1) < 0, "rdlen={} k={}", rdlen, got);
    }
}

#[test]
fn minsc_is_linear_in_length() {
    let sc = Scoring::bwa_sw_like();
    assert_eq!(sc.minsc(0), -3);
    assert_eq!(sc.minsc(4), -15);
    assert_eq!(sc.minsc(100), -303);
}

#[test]
fn invalid_configurations_are_rejected() {
    let bad_match = Scoring::new(
        -1,
        CostModel::Constant,
        3,
        3,
        -3.0,
        -3.0,
        0.0,
        0.0,
        2.0,
        0.1,
        CostModel::Constant,
        3,
        false,
        11,
        11,
        4,
        4,
        5,
        -1,
        false,
    );
    assert!(matches!(bad_match, Err(AlignError::InvalidConfiguration(_))));

    let bad_gapbar = Scoring::new(
        1,
        CostModel::Constant,
        3,
        3,
        -3.0,
        -3.0,
        0.0,
        0.0,
        2.0,
        0.1,
        CostModel::Constant,
        3,
        false,
        11,
        11,
        4,
        4,
        -2,
        -1,
        false,
    );
    assert!(matches!(bad_gapbar, Err(AlignError::InvalidConfiguration(_))));
}
