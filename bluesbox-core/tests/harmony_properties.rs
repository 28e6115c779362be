use bluesbox_core::types::transport::{
    MAX_BAR_SPAN, MAX_TEMPO, MIN_BAR_SPAN, MIN_TEMPO, loop_playback_rate, loop_start_offset,
    seconds_per_beat, sixteenth, step_duration,
};
use bluesbox_core::types::{
    BluesForm, Chord, PitchClass, PitchClassSet, Variation, build_progression,
    build_progression_with, quantize, scale_for,
};

#[test]
fn every_key_and_dominant_form_has_twelve_bars_on_i_and_v() {
    let forms = [(false, false), (true, false), (false, true), (true, true)];
    for key in PitchClass::all() {
        for (quick_change, turnaround_v) in forms {
            let form = BluesForm {
                quick_change,
                turnaround_v,
                minor: false,
            };
            let p = build_progression_with(key, form);
            assert_eq!(p.len(), 12);
            assert_eq!(p[0].chord.root(), key);
            assert_eq!(p[8].chord.root(), key + 7, "bar 9 must be the V chord");
        }
    }
}

#[test]
fn every_variation_tag_yields_twelve_bars() {
    for key in PitchClass::all() {
        for variation in Variation::all() {
            assert_eq!(build_progression(key, variation).len(), 12);
        }
    }
}

#[test]
fn minor_blues_ignores_the_quick_change_flag() {
    for key in PitchClass::all() {
        let plain = build_progression_with(
            key,
            BluesForm {
                quick_change: false,
                turnaround_v: false,
                minor: true,
            },
        );
        let quick = build_progression_with(
            key,
            BluesForm {
                quick_change: true,
                turnaround_v: false,
                minor: true,
            },
        );
        assert_eq!(plain, quick);
        assert_eq!(plain, build_progression(key, Variation::MinorBlues));
    }
}

#[test]
fn blues_scale_has_six_distinct_classes_from_fixed_offsets() {
    for root in PitchClass::all() {
        let chord = Chord::dominant_seventh(root);
        let scale = scale_for(&chord);
        assert_eq!(scale.len(), 6);
        for pc in &scale {
            let offset = (pc.value() as i32 - root.value() as i32).rem_euclid(12);
            assert!([0, 3, 5, 6, 7, 10].contains(&offset));
        }
    }
}

#[test]
fn quantize_is_idempotent_and_lands_in_scale() {
    for root in PitchClass::all() {
        let scale = scale_for(&Chord::dominant_seventh(root));
        for pitch in 24..108 {
            let once = quantize(pitch, &scale);
            assert_eq!(quantize(once, &scale), once);
            assert!(scale.contains(&PitchClass::of_midi(once)));
            assert!((once - pitch).abs() <= 6);
        }
    }
}

#[test]
fn quantize_with_empty_set_is_identity() {
    let empty = PitchClassSet::new();
    for pitch in 0..128 {
        assert_eq!(quantize(pitch, &empty), pitch);
    }
}

#[test]
fn swing_pairs_sum_to_an_eighth_note() {
    for tempo in MIN_TEMPO..=MAX_TEMPO {
        for swing in [0.5, 0.55, 0.6, 0.66, 0.75] {
            for pair in 0..8 {
                let sum = step_duration(pair * 2, tempo, swing)
                    + step_duration(pair * 2 + 1, tempo, swing);
                assert!((sum - 2.0 * sixteenth(tempo)).abs() < 1e-12);
            }
        }
    }
}

#[test]
fn loop_rate_fills_the_bar_span_exactly() {
    for tempo in MIN_TEMPO..=MAX_TEMPO {
        for span in MIN_BAR_SPAN..=MAX_BAR_SPAN {
            for buffer in [0.5, 1.7, 4.0, 9.3] {
                let rate = loop_playback_rate(buffer, span, tempo);
                let filled = rate * span as f64 * 4.0 * seconds_per_beat(tempo);
                assert!((filled - buffer).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn loop_offset_locks_to_running_bar() {
    let spb = seconds_per_beat(96);
    assert!((loop_start_offset(5, 4, 96) - 4.0 * spb).abs() < 1e-12);
    assert!((loop_start_offset(7, 2, 96) - 4.0 * spb).abs() < 1e-12);
    assert_eq!(loop_start_offset(6, 2, 96), 0.0);
}
