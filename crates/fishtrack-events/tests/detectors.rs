use fishtrack_core::{CameraSide, Pt2};
use fishtrack_events::{
    ActivityDetector, DecodedMarker, Detector, DetectorState, EventDetector, EventError,
    EventInterval, EventKind, Frame, MarkerDecoder, MarkerDetector,
};
use image::{GrayImage, Luma};
use std::sync::Arc;

/// Reports a marker whenever the top-left pixel is lit.
struct LitPixelDecoder;

impl MarkerDecoder for LitPixelDecoder {
    fn decode(&self, image: &GrayImage) -> Vec<DecodedMarker> {
        if image.get_pixel(0, 0).0[0] == 0 {
            return Vec::new();
        }
        vec![DecodedMarker {
            payload: "geo:60.1,24.9;site=weir%201".to_string(),
            corners: [
                Pt2::new(1.0, 1.0),
                Pt2::new(3.0, 1.0),
                Pt2::new(3.0, 3.0),
                Pt2::new(1.0, 3.0),
            ],
        }]
    }
}

fn frame(index: u64, lit: bool) -> Frame {
    let value = if lit { 255 } else { 0 };
    Frame::new(index, GrayImage::from_pixel(4, 4, Luma([value])))
}

fn marker_detector(miss_tolerance: u32) -> MarkerDetector {
    MarkerDetector::new(CameraSide::Primary, Arc::new(LitPixelDecoder), miss_tolerance)
}

#[test]
fn marker_visible_on_frames_10_to_14() {
    let mut det = marker_detector(3);
    for i in 0..30 {
        det.check_frame(&frame(i, (10..=14).contains(&i))).unwrap();
    }
    assert_eq!(det.state(), DetectorState::Closed);
    assert!(det.detected_any());

    let interval = det.interval();
    assert_eq!(interval.kind, EventKind::Marker);
    assert_eq!(interval.start_frame, Some(10));
    assert!(interval.end_frame.unwrap() >= 14);
    assert_eq!(interval.payload["lat"], "60.1");
    assert_eq!(interval.payload["site"], "weir 1");
}

#[test]
fn short_dropouts_do_not_close_the_marker() {
    let mut det = marker_detector(3);
    let lit = |i: u64| matches!(i, 2..=4 | 6..=7);
    for i in 0..9 {
        det.check_frame(&frame(i, lit(i))).unwrap();
    }
    assert_eq!(det.state(), DetectorState::Active);
    det.finish().unwrap();
    assert_eq!(det.interval().start_frame, Some(2));
    assert_eq!(det.interval().end_frame, Some(7));
}

#[test]
fn closed_marker_ignores_later_frames() {
    let mut det = marker_detector(1);
    for (i, lit) in [true, false, true, true].into_iter().enumerate() {
        det.check_frame(&frame(i as u64, lit)).unwrap();
    }
    let interval = det.interval();
    assert_eq!((interval.start_frame, interval.end_frame), (Some(0), Some(0)));
}

#[test]
fn unseen_marker_stays_idle() {
    let mut det = marker_detector(2);
    for i in 0..5 {
        det.check_frame(&frame(i, false)).unwrap();
    }
    det.finish().unwrap();
    assert_eq!(det.state(), DetectorState::Idle);
    assert!(!det.detected_any());
}

#[test]
fn activity_window_5_to_9() {
    let mut det = ActivityDetector::new(CameraSide::Secondary, 1, 5, 9).unwrap();
    for cursor in 0..15 {
        assert_eq!(det.is_active(cursor), (5..=9).contains(&cursor));
        det.check_frame(&frame(cursor, false)).unwrap();
    }
    let interval = det.interval();
    assert_eq!(interval.id, Some(1));
    assert_eq!(interval.camera, CameraSide::Secondary);
    assert_eq!((interval.start_frame, interval.end_frame), (Some(5), Some(9)));
}

#[test]
fn single_frame_activity_opens_and_closes() {
    let mut det = ActivityDetector::new(CameraSide::Primary, 2, 3, 3).unwrap();
    for cursor in 0..5 {
        det.check_frame(&frame(cursor, false)).unwrap();
    }
    assert_eq!(det.interval().len(), Some(1));
}

#[test]
fn activity_rejects_inverted_range() {
    assert_eq!(
        ActivityDetector::new(CameraSide::Primary, 0, 9, 5).unwrap_err(),
        EventError::InvalidRange { start: 9, end: 5 }
    );
}

#[test]
fn premature_and_double_transitions_are_errors() {
    let mut det: Detector = ActivityDetector::new(CameraSide::Primary, 0, 0, 10)
        .unwrap()
        .into();
    assert!(matches!(det.end_event(0), Err(EventError::PrematureEnd { .. })));
    det.start_event(0).unwrap();
    assert!(matches!(det.start_event(1), Err(EventError::DoubleStart { .. })));
    det.end_event(4).unwrap();
    assert!(matches!(det.end_event(5), Err(EventError::DoubleEnd { .. })));
    assert_eq!(det.kind(), EventKind::Activity);
    assert!(det.is_closed());
}

#[test]
fn handle_snapshot_is_consistent_across_threads() {
    let mut det: Detector = marker_detector(2).into();
    let handle = det.handle();
    let reader = std::thread::spawn(move || {
        let mut seen: Vec<EventInterval> = Vec::new();
        for _ in 0..200 {
            seen.push(handle.snapshot());
        }
        seen
    });
    for i in 0..20 {
        det.check_frame(&frame(i, (4..=8).contains(&i))).unwrap();
    }
    for snap in reader.join().unwrap() {
        if let Some(end) = snap.end_frame {
            assert_eq!(snap.start_frame, Some(4));
            assert_eq!(end, 8);
        }
    }
    assert_eq!(det.interval().end_frame, Some(8));
}

#[test]
fn interval_serializes_with_snake_case_tags() {
    let mut det = ActivityDetector::new(CameraSide::Primary, 7, 0, 1).unwrap();
    det.check_frame(&frame(0, false)).unwrap();
    det.check_frame(&frame(1, false)).unwrap();
    let json = serde_json::to_value(det.interval()).unwrap();
    assert_eq!(json["kind"], "activity");
    assert_eq!(json["camera"], "primary");
    assert_eq!(json["end_frame"], 1);
}
