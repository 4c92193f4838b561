use pump_core::{ExtremumDetector, Polarity};
use proptest::prelude::*;
use rstest::rstest;

fn firing_indices(det: &mut ExtremumDetector<i32>, xs: &[i32]) -> Vec<(usize, i32)> {
    let mut hits = Vec::new();
    for (i, &x) in xs.iter().enumerate() {
        if det.add_sample(x) {
            hits.push((i, det.center_value().expect("center after firing")));
        }
    }
    hits
}

proptest! {
    // strictly rising to a single maximum at `p`, then strictly falling
    #[test]
    fn triangle_peak_fires_once_lagged_by_lookahead(
        lookahead in 1usize..6,
        rise in 0usize..20,
        fall in 0usize..20,
    ) {
        let p = lookahead + rise;
        let tail = lookahead + fall;
        let xs: Vec<i32> = (0..=p as i32)
            .chain((1..=tail as i32).map(|k| p as i32 - k))
            .collect();
        let mut det = ExtremumDetector::peak(lookahead);
        let hits = firing_indices(&mut det, &xs);
        prop_assert_eq!(hits, vec![(p + lookahead, p as i32)]);
    }

    #[test]
    fn trough_mirrors_peak(
        lookahead in 1usize..6,
        xs in prop::collection::vec(-1_000i32..1_000, 0..200),
    ) {
        let negated: Vec<i32> = xs.iter().map(|x| -x).collect();
        let mut peak = ExtremumDetector::new(lookahead, Polarity::Peak);
        let mut trough = ExtremumDetector::new(lookahead, Polarity::Trough);
        let peaks = firing_indices(&mut peak, &xs);
        let troughs: Vec<(usize, i32)> = firing_indices(&mut trough, &negated)
            .into_iter()
            .map(|(i, v)| (i, -v))
            .collect();
        prop_assert_eq!(peaks, troughs);
    }
}

#[rstest]
#[case(1, 2)]
#[case(1, 5)]
#[case(2, 3)]
#[case(3, 4)]
fn plateau_fires_exactly_once(#[case] lookahead: usize, #[case] width: usize) {
    let mut xs = vec![0; lookahead];
    xs.extend(1..=3);
    let first = xs.len();
    xs.extend(std::iter::repeat_n(9, width));
    xs.extend([3, 2, 1]);
    xs.extend(vec![0; lookahead]);

    let mut det = ExtremumDetector::peak(lookahead);
    let hits = firing_indices(&mut det, &xs);
    let last = first + width - 1;
    assert_eq!(hits, vec![(last + lookahead, 9)]);
}

#[rstest]
#[case(Polarity::Peak, vec![0, 0, 7, 0, 0], 7)]
#[case(Polarity::Trough, vec![0, 0, -7, 0, 0], -7)]
fn single_spike_detected_at_center(
    #[case] polarity: Polarity,
    #[case] xs: Vec<i32>,
    #[case] expected: i32,
) {
    let mut det = ExtremumDetector::new(2, polarity);
    assert_eq!(firing_indices(&mut det, &xs), vec![(4, expected)]);
}

#[test]
fn monotonic_signal_never_fires() {
    let mut peak = ExtremumDetector::peak(3);
    let mut trough = ExtremumDetector::trough(3);
    for x in 0..100 {
        assert!(!peak.add_sample(x));
        assert!(!trough.add_sample(x));
    }
}

#[test]
fn prefilled_baseline_allows_early_detection() {
    // without prefill the maximum at index 1 would never be centered
    let xs = [5, 9, 4, 3, 2];
    let mut cold = ExtremumDetector::peak(3);
    assert!(firing_indices(&mut cold, &xs).is_empty());

    let mut warm = ExtremumDetector::peak(3);
    warm.prefill(0);
    assert_eq!(firing_indices(&mut warm, &xs), vec![(4, 9)]);
}
