//! End-to-end build-mode scenarios driven through `Session::tick`.

use domino_engine::prelude::*;
use glam::{Quat, Vec2, Vec3};

const DT: f64 = 1.0 / 60.0;

fn session() -> Session {
    domino_engine::init_tracing();
    Session::new(SessionConfig {
        fixed_dt: DT,
        controller: ControllerConfig {
            scroll_refresh_secs: 0.5,
            rotate_degrees_per_unit: 10.0,
            hold_height: 0.5,
        },
    })
}

fn spawn_frame(at: Vec3, color: Color) -> InputFrame {
    InputFrame {
        surface_point: Some(at),
        spawn: Some(color),
        ..InputFrame::idle()
    }
}

fn recolor_frame(color: Color) -> InputFrame {
    InputFrame {
        recolor: Some(color),
        ..InputFrame::idle()
    }
}

fn delete_frame() -> InputFrame {
    InputFrame {
        delete_pressed: true,
        ..InputFrame::idle()
    }
}

/// Ticks of idle input that cover the scroll refresh window with margin.
fn past_refresh_window() -> u64 {
    (0.5 / DT).ceil() as u64 + 5
}

// ---------------------------------------------------------------------------
// Recolor, rotate burst, delete, then unwind
// ---------------------------------------------------------------------------

#[test]
fn recolor_rotate_delete_then_three_undos() {
    let mut session = session();
    let t0 = Transform::from_position(Vec3::new(2.0, 0.0, -1.0));
    // Initial placement comes from the host, not from a recorded spawn.
    let e = session.registry_mut().create(t0, Color::WHITE);

    session.tick(&InputFrame::select(e)).unwrap();
    session.tick(&recolor_frame(Color::RED)).unwrap();
    assert_eq!(session.history().len(), 1);

    for _ in 0..5 {
        session.tick(&InputFrame::scroll(1.0)).unwrap();
    }
    assert_eq!(session.history().len(), 2);
    let rotated = session.registry().get(e).unwrap().transform;
    assert_eq!(rotated.position, t0.position);
    assert!(rotated
        .rotation
        .abs_diff_eq(Quat::from_rotation_y(50f32.to_radians()), 1e-5));

    session.tick(&delete_frame()).unwrap();
    assert_eq!(session.history().len(), 3);
    assert!(session.registry().is_empty());

    // (1) The domino comes back red with its pre-delete transform, under a
    //     new id, and nothing is selected.
    let report = session.tick(&InputFrame::undo()).unwrap();
    assert_eq!(report.undo, Some(UndoOutcome::Undone));
    assert_eq!(session.registry().len(), 1);
    let resurrected = session.registry().live_ids()[0];
    assert_ne!(resurrected, e);
    let entity = session.registry().get(resurrected).unwrap();
    assert_eq!(entity.color, Color::RED);
    assert_eq!(entity.transform, rotated);
    assert!(!entity.selected);
    assert!(session.controller().selection().is_empty());

    // (2) Rotation reverted.
    session.tick(&InputFrame::undo()).unwrap();
    assert_eq!(session.registry().get(resurrected).unwrap().transform, t0);

    // (3) Color reverted.
    session.tick(&InputFrame::undo()).unwrap();
    assert_eq!(session.registry().get(resurrected).unwrap().color, Color::WHITE);

    // (4) Nothing left.
    let report = session.tick(&InputFrame::undo()).unwrap();
    assert_eq!(report.undo, Some(UndoOutcome::NothingToUndo));
    assert_eq!(session.registry().len(), 1);
    session.history().verify_index().unwrap();
}

#[test]
fn recorded_spawn_unwinds_to_empty_scene() {
    let mut session = session();
    let report = session.tick(&spawn_frame(Vec3::ZERO, Color::WHITE)).unwrap();
    let e = report.spawned.unwrap();
    session.tick(&InputFrame::select(e)).unwrap();
    session.tick(&recolor_frame(Color::BLUE)).unwrap();
    session.tick(&delete_frame()).unwrap();
    assert_eq!(session.history().len(), 3);

    for _ in 0..3 {
        let report = session.tick(&InputFrame::undo()).unwrap();
        assert_eq!(report.undo, Some(UndoOutcome::Undone));
    }
    assert!(session.registry().is_empty());
    assert!(session.history().referenced_ids().is_empty());
}

// ---------------------------------------------------------------------------
// Scroll debounce
// ---------------------------------------------------------------------------

#[test]
fn scroll_bursts_coalesce_into_one_step_each() {
    let mut session = session();
    let e = session.registry_mut().create(Transform::default(), Color::WHITE);
    session.tick(&InputFrame::select(e)).unwrap();

    for _ in 0..12 {
        session.tick(&InputFrame::scroll(0.5)).unwrap();
    }
    assert_eq!(session.history().len(), 1);

    session.run_idle(past_refresh_window()).unwrap();
    assert!(session.controller().scroll_burst_open());

    for _ in 0..7 {
        session.tick(&InputFrame::scroll(-0.5)).unwrap();
    }
    assert_eq!(session.history().len(), 2);

    // Undo the second burst only.
    session.tick(&InputFrame::undo()).unwrap();
    let after_first = session.registry().get(e).unwrap().transform.rotation;
    assert!(after_first.abs_diff_eq(Quat::from_rotation_y(60f32.to_radians()), 1e-5));
}

#[test]
fn every_scroll_tick_restarts_the_refresh_window() {
    let mut session = session();
    let e = session.registry_mut().create(Transform::default(), Color::WHITE);
    session.tick(&InputFrame::select(e)).unwrap();

    // Scroll ticks 0.4 s apart for several seconds: each one lands inside
    // the window restarted by the previous tick.
    let gap = (0.4 / DT) as u64;
    for _ in 0..10 {
        session.tick(&InputFrame::scroll(1.0)).unwrap();
        session.run_idle(gap).unwrap();
    }
    assert_eq!(session.history().len(), 1);
}

#[test]
fn undo_inside_a_burst_then_scroll_again_is_recorded() {
    let mut session = session();
    let e = session.registry_mut().create(Transform::default(), Color::WHITE);
    session.tick(&InputFrame::select(e)).unwrap();
    session.tick(&recolor_frame(Color::RED)).unwrap();
    for _ in 0..3 {
        session.tick(&InputFrame::scroll(1.5)).unwrap();
    }
    session.tick(&InputFrame::undo()).unwrap();
    for _ in 0..3 {
        session.tick(&InputFrame::scroll(1.5)).unwrap();
    }
    assert_eq!(session.history().len(), 2);

    session.tick(&InputFrame::undo()).unwrap();
    let entity = session.registry().get(e).unwrap();
    assert_eq!(entity.transform, Transform::default());
    assert_eq!(entity.color, Color::RED);
}

#[test]
fn recolor_inside_a_burst_then_scroll_undoes_rotation_first() {
    let mut session = session();
    let e = session.registry_mut().create(Transform::default(), Color::WHITE);
    session.tick(&InputFrame::select(e)).unwrap();
    session.tick(&InputFrame::scroll(1.0)).unwrap();
    let after_first_scroll = session.registry().get(e).unwrap().transform;
    session.tick(&recolor_frame(Color::RED)).unwrap();
    let report = session.tick(&InputFrame::scroll(2.0)).unwrap();
    assert_eq!(report.pushed, 1);

    session.tick(&InputFrame::undo()).unwrap();
    let entity = session.registry().get(e).unwrap();
    assert_eq!(entity.transform, after_first_scroll);
    assert_eq!(entity.color, Color::RED);

    session.tick(&InputFrame::undo()).unwrap();
    session.tick(&InputFrame::undo()).unwrap();
    let entity = session.registry().get(e).unwrap();
    assert_eq!(entity.transform, Transform::default());
    assert_eq!(entity.color, Color::WHITE);
    assert!(session.history().is_empty());
}

// ---------------------------------------------------------------------------
// Drag
// ---------------------------------------------------------------------------

#[test]
fn drag_is_one_undo_step() {
    let mut session = session();
    let e = session
        .registry_mut()
        .create(Transform::from_position(Vec3::ZERO), Color::WHITE);

    session
        .tick(&InputFrame {
            hit: Some(e),
            pickup_pressed: true,
            surface_point: Some(Vec3::ZERO),
            ..InputFrame::idle()
        })
        .unwrap();
    for i in 1..=30 {
        session
            .tick(&InputFrame {
                surface_point: Some(Vec3::new(i as f32 * 0.1, 0.0, 0.0)),
                ..InputFrame::idle()
            })
            .unwrap();
    }
    session
        .tick(&InputFrame {
            pickup_released: true,
            ..InputFrame::idle()
        })
        .unwrap();

    assert_eq!(session.history().len(), 1);
    let moved = session.registry().get(e).unwrap().transform.position;
    assert!((moved.x - 3.0).abs() < 1e-5);

    session.tick(&InputFrame::undo()).unwrap();
    assert_eq!(session.registry().get(e).unwrap().transform.position, Vec3::ZERO);
}

#[test]
fn pickup_of_fixed_entity_is_ignored() {
    let mut session = session();
    let anchor = session
        .registry_mut()
        .create_with(Transform::default(), Color::BLACK, false);
    session
        .tick(&InputFrame {
            hit: Some(anchor),
            pickup_pressed: true,
            surface_point: Some(Vec3::new(5.0, 0.0, 0.0)),
            ..InputFrame::idle()
        })
        .unwrap();
    assert!(session.history().is_empty());
    assert!(session.controller().held().is_none());
    assert_eq!(
        session.registry().get(anchor).unwrap().transform,
        Transform::default()
    );
}

// ---------------------------------------------------------------------------
// Rectangle selection, mode hand-off, layouts
// ---------------------------------------------------------------------------

#[test]
fn rectangle_selection_then_group_recolor_and_delete() {
    let mut session = session();
    let ids: Vec<EntityId> = (0..4)
        .map(|i| {
            session
                .registry_mut()
                .create(Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)), Color::WHITE)
        })
        .collect();
    let projections: Vec<(EntityId, Vec2)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, Vec2::new(i as f32 * 100.0, 50.0)))
        .collect();

    session
        .tick(&InputFrame {
            rect_select: Some(RectSelection {
                rect: ScreenRect::new(Vec2::new(250.0, 0.0), Vec2::new(50.0, 100.0)),
                projections,
            }),
            ..InputFrame::idle()
        })
        .unwrap();
    assert_eq!(session.controller().selection(), &ids[1..3]);
    assert!(session.history().is_empty());

    session.tick(&recolor_frame(Color::GREEN)).unwrap();
    session.tick(&delete_frame()).unwrap();
    assert_eq!(session.registry().len(), 2);

    session.tick(&InputFrame::undo()).unwrap();
    session.tick(&InputFrame::undo()).unwrap();
    let colors: Vec<Color> = session.registry().iter().map(|(_, e)| e.color).collect();
    assert_eq!(colors, vec![Color::WHITE; 4]);
    session.history().verify_index().unwrap();
}

#[test]
fn history_survives_round_trip_through_spectator_mode() {
    let mut session = session();
    session.tick(&spawn_frame(Vec3::ZERO, Color::WHITE)).unwrap();
    session.tick(&spawn_frame(Vec3::X, Color::WHITE)).unwrap();

    session.set_mode(Mode::Spectator);
    session.run_idle(30).unwrap();
    session.set_mode(Mode::Build);

    assert_eq!(session.history().len(), 2);
    session.tick(&InputFrame::undo()).unwrap();
    session.tick(&InputFrame::undo()).unwrap();
    assert!(session.registry().is_empty());
}

#[test]
fn loading_a_layout_restores_positions_and_clears_history() {
    let mut session = session();
    for x in 0..3 {
        session
            .tick(&spawn_frame(Vec3::new(x as f32, 0.0, 0.0), Color::YELLOW))
            .unwrap();
    }
    let saved = SavedLayout::from_json(&session.capture_layout().to_json().unwrap()).unwrap();

    let first = session.registry().live_ids()[0];
    session.tick(&InputFrame::select(first)).unwrap();
    session.tick(&recolor_frame(Color::RED)).unwrap();
    session.tick(&InputFrame::scroll(3.0)).unwrap();
    assert_eq!(session.history().len(), 5);

    let report = session.load_layout(&saved);
    assert_eq!(report.restored, 3);
    assert!(session.history().is_empty());
    assert!(session.controller().selection().is_empty());
    assert_eq!(session.capture_layout(), saved);
}

#[test]
fn registry_events_mirror_undo_for_the_renderer() {
    let mut session = session();
    let e = session.registry_mut().create(Transform::default(), Color::WHITE);
    session.tick(&InputFrame::select(e)).unwrap();
    session.tick(&delete_frame()).unwrap();
    session.registry_mut().drain_events();

    session.tick(&InputFrame::undo()).unwrap();
    let events = session.registry_mut().drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        RegistryEvent::Spawned { snapshot, .. } if snapshot.color == Color::WHITE
    ));
}
