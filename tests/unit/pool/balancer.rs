use super::*;

fn reported(average_ms: f64) -> PerformanceStats {
    PerformanceStats {
        frames_count: 1,
        total_render_time: average_ms,
        max_frame_time: average_ms,
    }
}

fn options(min: usize, max: usize) -> BalancerOptions {
    BalancerOptions {
        min_executors: min,
        max_executors: max,
        balanced_fields: vec!["items".to_string()],
        ..BalancerOptions::default()
    }
}

fn size_of(decision: &BalancerDecision, current: usize) -> usize {
    match decision {
        BalancerDecision::Keep => current,
        BalancerDecision::Rebalance { selectors } => selectors.len(),
    }
}

#[test]
fn defaults() {
    let o = BalancerOptions::default();
    assert_eq!((o.min_executors, o.max_executors, o.frequency_ms), (1, 8, 5000));
    assert_eq!(o.thresholds.too_slow_if_more_than, 16.0);
    assert_eq!(o.thresholds.too_fast_if_less_than, 5.0);
    assert!(o.validate().is_ok());
}

#[test]
fn slow_grows_by_one_with_fresh_selectors() {
    let decision = decide(&[reported(20.0)], &options(1, 4));
    let BalancerDecision::Rebalance { selectors } = decision else {
        panic!("expected rebalance");
    };
    assert_eq!(selectors.len(), 2);
    for (i, s) in selectors.iter().enumerate() {
        assert_eq!((s.index(), s.count()), (i, 2));
        assert!(s.is_balanced("items"));
    }
}

#[test]
fn fast_shrinks_by_one() {
    let decision = decide(&[reported(1.0), reported(2.0), reported(3.0)], &options(1, 4));
    assert_eq!(size_of(&decision, 3), 2);
}

#[test]
fn in_band_is_a_no_op() {
    assert_eq!(decide(&[reported(10.0), reported(12.0)], &options(1, 4)), BalancerDecision::Keep);
    // thresholds are strict
    assert_eq!(decide(&[reported(16.0)], &options(1, 4)), BalancerDecision::Keep);
    assert_eq!(decide(&[reported(5.0), reported(5.0)], &options(1, 4)), BalancerDecision::Keep);
}

#[test]
fn step_is_bounded_and_clamped() {
    for min in 1..=3 {
        for max in min..=5 {
            let opts = options(min, max);
            for current in min..=max {
                for avg in [0.0, 4.9, 5.0, 10.0, 16.0, 16.1, 100.0] {
                    let stats = vec![reported(avg); current];
                    let next = size_of(&decide(&stats, &opts), current);
                    assert!(next.abs_diff(current) <= 1, "{current} -> {next}");
                    assert!((min..=max).contains(&next), "{current} -> {next} outside [{min},{max}]");
                }
            }
        }
    }
}

#[test]
fn mean_is_taken_over_member_averages() {
    // one slow member, one fast member: mean 15 stays in band
    let stats = [
        PerformanceStats {
            frames_count: 2,
            total_render_time: 56.0,
            max_frame_time: 40.0,
        },
        reported(2.0),
    ];
    assert_eq!(decide(&stats, &options(1, 4)), BalancerDecision::Keep);
}

#[test]
fn silent_members_are_left_out() {
    assert_eq!(
        decide(&[PerformanceStats::default()], &options(1, 4)),
        BalancerDecision::Keep
    );
    let stats = [reported(30.0), PerformanceStats::default()];
    assert_eq!(size_of(&decide(&stats, &options(1, 4)), 2), 3);
}

#[test]
fn validate_rejects_inconsistent_options() {
    assert!(options(0, 2).validate().is_err());
    assert!(options(3, 2).validate().is_err());
    let mut o = options(1, 2);
    o.thresholds.too_fast_if_less_than = 20.0;
    assert!(matches!(o.validate(), Err(FleetError::Configuration(_))));
    let mut o = options(1, 2);
    o.frequency_ms = 0;
    assert!(o.validate().is_err());
}

#[test]
fn options_load_from_camel_case_json() {
    let o: BalancerOptions = serde_json::from_value(serde_json::json!({
        "maxExecutors": 4,
        "balancedFields": ["points"],
        "thresholds": {"tooSlowIfMoreThan": 20.0}
    }))
    .unwrap();
    assert_eq!(o.min_executors, 1);
    assert_eq!(o.max_executors, 4);
    assert_eq!(o.balanced_fields, vec!["points".to_string()]);
    assert_eq!(o.thresholds.too_slow_if_more_than, 20.0);
    assert_eq!(o.thresholds.too_fast_if_less_than, 5.0);
    assert_eq!(o.frequency(), Duration::from_secs(5));
}
