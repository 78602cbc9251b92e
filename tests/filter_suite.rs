use std::sync::Arc;
use zoom_visualizer::effects;
use zoom_visualizer::filter::{
    screen_to_tran, tran_to_screen, BufferState, CoordConverter, FilterCoefficients,
    ZoomFilterBuffers, ZoomPointFn, MAX_TRAN_LERP, SUB_CELL_RES,
};

const W: usize = 32;
const H: usize = 20;

fn make_engine(stripe_height: usize, zoom_fn: ZoomPointFn) -> ZoomFilterBuffers {
    let mut engine = ZoomFilterBuffers::new(W, H, stripe_height, zoom_fn);
    engine.start();
    engine
}

/// Expected destination-buffer value for one pixel, computed the same way
/// the engine does: normalize, displace, quantize.
fn expected_tran(engine: &ZoomFilterBuffers, zoom_fn: &ZoomPointFn, x: usize, y: usize) -> (i32, i32) {
    let conv = engine.converter();
    let coords = conv.screen_to_normalized(x as i32, y as i32);
    let p = conv.normalized_to_tran((zoom_fn)(coords));
    (p.x, p.y)
}

/// Force the engine into a fresh build of `zoom_fn`.
fn begin_build(engine: &mut ZoomFilterBuffers, zoom_fn: ZoomPointFn) {
    engine.request_new_settings(zoom_fn);
    engine.set_lerp_factor(MAX_TRAN_LERP);
    engine.update(0);
    assert_eq!(engine.state(), BufferState::Building);
}

// ── Coordinate transform & coefficient table ────────────────────────────────

#[test]
fn coord_round_trip_is_stable() {
    let conv = CoordConverter::new(W, H);
    for y in 0..H as i32 {
        for x in 0..W as i32 {
            let normalized = conv.screen_to_normalized(x, y);
            let tran = conv.normalized_to_tran(normalized);
            let direct = screen_to_tran(x, y);
            assert!(
                (tran.x - direct.x).abs() <= 1 && (tran.y - direct.y).abs() <= 1,
                "round trip drifted more than one sub-cell at ({x},{y}): {tran:?} vs {direct:?}"
            );
            assert_eq!(tran_to_screen(tran), (x, y));
        }
    }
}

#[test]
fn coeff_table_on_cell_entry_has_single_weight() {
    let coeffs = FilterCoefficients::new();
    let entry = coeffs.get(0, 0);
    assert!(entry.is_on_cell);
    assert_eq!(entry.weights, [255, 0, 0, 0]);
}

#[test]
fn coeff_table_weights_fit_one_byte() {
    let coeffs = FilterCoefficients::new();
    for cx in 0..SUB_CELL_RES as usize {
        for cy in 0..SUB_CELL_RES as usize {
            let entry = coeffs.get(cx, cy);
            let sum: u32 = entry.weights.iter().sum();
            assert!(sum <= 255, "weights at ({cx},{cy}) sum to {sum}");
            assert!(sum > 0, "weights at ({cx},{cy}) are all zero");
            assert_eq!(entry.is_on_cell, cx == 0 && cy == 0);
        }
    }
}

// ── Lerp boundary laws ──────────────────────────────────────────────────────

#[test]
fn lerp_zero_reads_source_buffer_exactly() {
    let zoom_fn = effects::pull_zoom(0.25);
    let mut engine = make_engine(H, zoom_fn);
    engine.set_lerp_factor(0);
    for y in 0..H {
        for x in 0..W {
            let (p, clipped) = engine.blended_sample(y * W + x);
            // Source buffer starts as the identity mapping.
            assert_eq!(p, screen_to_tran(x as i32, y as i32));
            assert!(!clipped);
        }
    }
}

#[test]
fn lerp_max_reads_dest_buffer_exactly() {
    let zoom_fn = effects::pull_zoom(0.25);
    let mut engine = make_engine(H, Arc::clone(&zoom_fn));
    engine.set_lerp_factor(MAX_TRAN_LERP);
    for y in 0..H {
        for x in 0..W {
            let (p, clipped) = engine.blended_sample(y * W + x);
            let (ex, ey) = expected_tran(&engine, &zoom_fn, x, y);
            assert_eq!((p.x, p.y), (ex, ey), "mismatch at ({x},{y})");
            assert!(!clipped, "inward zoom should never clip");
        }
    }
}

#[test]
#[should_panic]
fn lerp_factor_out_of_range_is_a_contract_violation() {
    let mut engine = make_engine(H, effects::identity());
    engine.set_lerp_factor(MAX_TRAN_LERP + 1);
}

// ── Striped builds ──────────────────────────────────────────────────────────

#[test]
fn striped_build_matches_single_pass_build() {
    let next_fn = effects::wave(6.0, 0.01);

    let mut striped = make_engine(H, effects::identity());
    begin_build(&mut striped, Arc::clone(&next_fn));
    let mut steps = 0;
    while striped.state() == BufferState::Building {
        striped.advance_stripe(3);
        steps += 1;
        assert!(steps <= H, "stripe cursor failed to wrap");
    }

    let mut single = make_engine(H, effects::identity());
    begin_build(&mut single, Arc::clone(&next_fn));
    single.advance_stripe(H);
    assert_eq!(single.state(), BufferState::Ready);

    striped.set_lerp_factor(MAX_TRAN_LERP);
    single.set_lerp_factor(MAX_TRAN_LERP);
    for pos in 0..W * H {
        assert_eq!(
            striped.blended_sample(pos).0,
            single.blended_sample(pos).0,
            "buffers differ at pos {pos}"
        );
    }
}

#[test]
fn stripe_cursor_advances_and_wraps() {
    let mut engine = make_engine(5, effects::identity());
    begin_build(&mut engine, effects::pull_zoom(0.1));
    assert_eq!(engine.stripe_y_start(), 0);

    for expected in [5, 10, 15] {
        engine.update(0);
        assert_eq!(engine.stripe_y_start(), expected);
        assert_eq!(engine.state(), BufferState::Building);
    }
    engine.update(0);
    assert_eq!(engine.stripe_y_start(), 0);
    assert_eq!(engine.state(), BufferState::Ready);
    assert_eq!(engine.lerp_factor(), 0);
}

#[test]
fn settings_change_mid_build_waits_for_next_build() {
    let fn_b = effects::pull_zoom(0.2);
    let fn_c = effects::pull_zoom(0.35);

    let mut engine = make_engine(H, effects::identity());
    begin_build(&mut engine, Arc::clone(&fn_b));

    // Partially build with B, then ask for C mid-stripe-fill.
    engine.advance_stripe(4);
    engine.request_new_settings(Arc::clone(&fn_c));
    while engine.state() == BufferState::Building {
        engine.advance_stripe(4);
    }

    // The finished buffer must be B's field, untouched by C.
    engine.set_lerp_factor(MAX_TRAN_LERP);
    for y in 0..H {
        for x in 0..W {
            let (p, _) = engine.blended_sample(y * W + x);
            let (ex, ey) = expected_tran(&engine, &fn_b, x, y);
            assert_eq!((p.x, p.y), (ex, ey), "old-function build corrupted at ({x},{y})");
        }
    }

    // Only the subsequent build uses C.
    assert!(engine.have_settings_changed());
    engine.update(0);
    assert_eq!(engine.state(), BufferState::Building);
    assert!(!engine.have_settings_changed());
    while engine.state() == BufferState::Building {
        engine.advance_stripe(4);
    }
    engine.set_lerp_factor(MAX_TRAN_LERP);
    for y in 0..H {
        for x in 0..W {
            let (p, _) = engine.blended_sample(y * W + x);
            let (ex, ey) = expected_tran(&engine, &fn_c, x, y);
            assert_eq!((p.x, p.y), (ex, ey), "new-function build wrong at ({x},{y})");
        }
    }
}

// ── Blend handoff & clipping ────────────────────────────────────────────────

#[test]
fn saturated_blend_holds_the_destination_field() {
    let zoom_fn = effects::pull_zoom(0.25);
    let mut engine = make_engine(H, Arc::clone(&zoom_fn));
    engine.update(MAX_TRAN_LERP);
    engine.update(1000);
    // Without a settings change the blend saturates and stays put.
    assert_eq!(engine.state(), BufferState::Ready);
    assert_eq!(engine.lerp_factor(), MAX_TRAN_LERP);
    for pos in 0..W * H {
        let (p, _) = engine.blended_sample(pos);
        let (ex, ey) = expected_tran(&engine, &zoom_fn, pos % W, pos / W);
        assert_eq!((p.x, p.y), (ex, ey));
    }
}

#[test]
fn build_completion_saves_the_mid_blend_field_as_the_new_source() {
    let fn_a = effects::pull_zoom(0.3);
    let fn_b = effects::wave(4.0, 0.015);

    // srce is the identity and dest is A's field, so a half-advanced blend
    // differs from both endpoints.
    let mut engine = make_engine(H, Arc::clone(&fn_a));
    engine.set_lerp_factor(MAX_TRAN_LERP / 2);
    let seen: Vec<_> = (0..W * H).map(|pos| engine.blended_sample(pos).0).collect();

    engine.request_new_settings(Arc::clone(&fn_b));
    engine.update(0);
    assert_eq!(engine.state(), BufferState::Building);
    while engine.state() == BufferState::Building {
        engine.update(0);
    }

    // The finished build replaced dest with B's field and saved the
    // half-blended field as the new source, so factor zero reproduces
    // exactly what was on screen when the build landed.
    assert_eq!(engine.lerp_factor(), 0);
    for (pos, before) in seen.iter().enumerate() {
        let (p, _) = engine.blended_sample(pos);
        assert_eq!(p, *before, "handoff jumped at pos {pos}");
    }

    engine.set_lerp_factor(MAX_TRAN_LERP);
    for y in 0..H {
        for x in 0..W {
            let (p, _) = engine.blended_sample(y * W + x);
            let (ex, ey) = expected_tran(&engine, &fn_b, x, y);
            assert_eq!((p.x, p.y), (ex, ey), "new destination wrong at ({x},{y})");
        }
    }
}

#[test]
fn outward_zoom_clips_and_clamps_into_bounds() {
    // Magnify past the edges: corners must clip.
    let mut engine = make_engine(H, effects::pull_zoom(-0.5));
    engine.set_lerp_factor(MAX_TRAN_LERP);

    let mut any_clipped = false;
    for pos in 0..W * H {
        let (p, clipped) = engine.blended_sample(pos);
        any_clipped |= clipped;
        let (sx, sy) = tran_to_screen(p);
        assert!((0..W as i32).contains(&sx), "x out of bounds: {sx}");
        assert!((0..H as i32).contains(&sy), "y out of bounds: {sy}");
    }
    assert!(any_clipped, "expected at least one clipped corner");

    let (_, center_clipped) = engine.blended_sample((H / 2) * W + W / 2);
    assert!(!center_clipped, "centre should stay in bounds");
}

#[test]
fn source_point_info_is_safe_in_every_state() {
    let mut engine = make_engine(4, effects::identity());
    begin_build(&mut engine, effects::wave(5.0, 0.02));
    // Mid-build queries must still serve the last completed field.
    engine.advance_stripe(4);
    for pos in 0..W * H {
        let info = engine.source_point_info(pos);
        assert!((0..W as i32).contains(&info.screen_x));
        assert!((0..H as i32).contains(&info.screen_y));
    }
}

#[test]
fn identity_field_is_exact_and_on_cell() {
    let mut engine = make_engine(H, effects::identity());
    engine.set_lerp_factor(MAX_TRAN_LERP);
    for y in 0..H {
        for x in 0..W {
            let info = engine.source_point_info(y * W + x);
            assert_eq!((info.screen_x, info.screen_y), (x as i32, y as i32));
            assert!(info.coeffs.is_on_cell);
            assert!(!info.is_clipped);
        }
    }
}

#[test]
fn normalized_space_is_symmetric_about_the_centre() {
    let conv = CoordConverter::new(W, H);
    let left = conv.screen_to_normalized(0, 0);
    let right = conv.screen_to_normalized(W as i32 - 1, 0);
    assert!((left.x + right.x).abs() < 1e-5);
    assert!((left.x - -2.0).abs() < 1e-6);
    assert!((right.x - 2.0).abs() < 1e-5);
}
