use flock_counter::{
    BoundingBox, CountPolicy, IdentityRemapper, InclusionRegion, Point, RawDetection, SessionId,
    TrackRef, TrackingCountEngine,
};

fn sheep(id: u64, cy: f32, conf: f32) -> RawDetection {
    RawDetection::new(
        Some(id),
        BoundingBox::new(100.0, cy - 10.0, 140.0, cy + 10.0).unwrap(),
        "sheep",
        conf,
    )
}

fn policy(min_confidence: f32) -> CountPolicy {
    CountPolicy {
        target_class: "sheep".to_string(),
        min_confidence,
    }
}

#[test]
fn repeated_track_counts_once_in_whole_frame_and_area_modes() {
    let area = InclusionRegion::area(&[
        Point::new(0.0, 0.0),
        Point::new(640.0, 0.0),
        Point::new(640.0, 480.0),
        Point::new(0.0, 480.0),
    ])
    .unwrap();

    for region in [InclusionRegion::WholeFrame, area] {
        let mut engine = TrackingCountEngine::new();
        for frame in 1..=50 {
            let outcome = engine.process(
                frame,
                &[sheep(42, 200.0 + frame as f32, 0.9)],
                &region,
                &policy(0.8),
                true,
            );
            assert_eq!(outcome.counters.visible_this_frame, 1);
        }
        assert_eq!(engine.total_unique(), 1);
        assert_eq!(engine.counted().len(), 1);
        assert_eq!(engine.counted()[0].frame, 1);
    }
}

#[test]
fn line_crossing_counts_once_and_ignores_back_and_forth() {
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::line(35.0).unwrap();
    let mut news = Vec::new();
    for (frame, y) in [10.0, 20.0, 30.0, 40.0, 40.0, 30.0, 40.0]
        .into_iter()
        .enumerate()
    {
        let outcome = engine.process(frame as u64 + 1, &[sheep(1, y, 0.9)], &region, &policy(0.8), true);
        news.push(outcome.counters.newly_counted_this_frame);
    }
    assert_eq!(news, vec![0, 0, 0, 1, 0, 0, 0]);
    assert_eq!(engine.total_unique(), 1);
}

#[test]
fn line_at_300_counts_on_third_frame() {
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::line(300.0).unwrap();
    let totals: Vec<u64> = [250.0, 280.0, 320.0]
        .into_iter()
        .enumerate()
        .map(|(frame, y)| {
            engine
                .process(frame as u64 + 1, &[sheep(1, y, 0.9)], &region, &policy(0.8), true)
                .counters
                .total_unique
        })
        .collect();
    assert_eq!(totals, vec![0, 0, 1]);
    assert_eq!(engine.counted()[0].frame, 3);
}

#[test]
fn track_spawning_below_the_line_is_not_counted() {
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::line(300.0).unwrap();
    for frame in 1..=3 {
        engine.process(frame, &[sheep(8, 350.0, 0.9)], &region, &policy(0.8), true);
    }
    assert_eq!(engine.total_unique(), 0);
}

#[test]
fn whole_frame_scenario_counts_new_track_only() {
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::WholeFrame;

    let first = engine.process(1, &[sheep(5, 100.0, 0.9)], &region, &policy(0.8), true);
    assert_eq!(first.counters.total_unique, 1);

    let second = engine.process(
        2,
        &[sheep(5, 110.0, 0.9), sheep(7, 300.0, 0.85)],
        &region,
        &policy(0.8),
        true,
    );
    assert_eq!(second.counters.total_unique, 2);
    assert_eq!(second.counters.newly_counted_this_frame, 1);
    assert_eq!(second.counters.visible_this_frame, 2);
    assert_eq!(second.new_ids().collect::<Vec<_>>(), vec![SessionId(2)]);
}

#[test]
fn remapping_is_stable_within_a_session_and_restarts_after_reset() {
    let mut remapper = IdentityRemapper::new();
    let large = TrackRef(9_000_001);
    let sparse = TrackRef(17);

    let a = remapper.remap(large);
    let b = remapper.remap(sparse);
    assert_eq!((a, b), (SessionId(1), SessionId(2)));
    assert_eq!(remapper.remap(large), a);
    assert_eq!(remapper.remap(sparse), b);

    remapper.reset();
    assert_eq!(remapper.remap(sparse), SessionId(1));
}

#[test]
fn fresh_engine_starts_from_zero_after_counting() {
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::WholeFrame;
    engine.process(
        1,
        &[sheep(1, 100.0, 0.9), sheep(2, 200.0, 0.9), sheep(3, 300.0, 0.9)],
        &region,
        &policy(0.8),
        true,
    );
    assert_eq!(engine.total_unique(), 3);

    engine.reset();
    let outcome = engine.process(1, &[], &region, &policy(0.8), true);
    assert_eq!(outcome.counters.total_unique, 0);
    assert_eq!(outcome.counters.visible_this_frame, 0);
}

#[test]
fn region_swap_between_frames_applies_whole() {
    let mut engine = TrackingCountEngine::new();
    let left = InclusionRegion::area(&[
        Point::new(0.0, 0.0),
        Point::new(50.0, 0.0),
        Point::new(50.0, 480.0),
        Point::new(0.0, 480.0),
    ])
    .unwrap();

    // Boxes are centred at x = 120, outside the left strip.
    let outcome = engine.process(
        1,
        &[sheep(1, 100.0, 0.9), sheep(2, 200.0, 0.9)],
        &left,
        &policy(0.8),
        true,
    );
    assert_eq!(outcome.counters.newly_counted_this_frame, 0);

    let outcome = engine.process(
        2,
        &[sheep(1, 100.0, 0.9), sheep(2, 200.0, 0.9)],
        &InclusionRegion::WholeFrame,
        &policy(0.8),
        true,
    );
    assert_eq!(outcome.counters.newly_counted_this_frame, 2);
    assert!(outcome.detections.iter().all(|det| det.included));
}

#[test]
fn reused_track_reference_keeps_its_session_id() {
    // A detector reusing a reference for a new animal is indistinguishable from the
    // same animal returning, so it is not counted again.
    let mut engine = TrackingCountEngine::new();
    let region = InclusionRegion::WholeFrame;
    engine.process(1, &[sheep(3, 100.0, 0.9)], &region, &policy(0.8), true);
    engine.process(2, &[], &region, &policy(0.8), true);
    let outcome = engine.process(3, &[sheep(3, 400.0, 0.9)], &region, &policy(0.8), true);
    assert_eq!(outcome.counters.newly_counted_this_frame, 0);
    assert_eq!(outcome.detections[0].session_id, Some(SessionId(1)));
}
