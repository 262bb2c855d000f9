use super::*;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Size};
use crate::foundation::error::LayerstackError;
use crate::geometry::transform::Transform2D;
use crate::render::assets::InMemoryAssets;
use crate::render::backend::RenderSettings;
use crate::render::cpu::CpuBackend;
use crate::scene::model::{Layer, LayerContent};

fn square(id: u64, x: f64, y: f64) -> Layer {
    Layer::new(
        LayerId(id),
        LayerContent::Solid {
            color: Color::BLACK,
            size: Size::new(40.0, 40.0),
        },
    )
    .with_transform(Transform2D::at(x, y))
}

fn three_layers() -> Scene {
    Scene::new(Canvas::new(400, 300))
        .with_layer(square(1, 60.0, 60.0))
        .unwrap()
        .with_layer(square(2, 140.0, 60.0))
        .unwrap()
        .with_layer(square(3, 260.0, 200.0))
        .unwrap()
}

fn editor() -> Editor {
    let config = EditorConfig {
        snap: SnapConfig {
            enabled: false,
            ..SnapConfig::default()
        },
        ..EditorConfig::default()
    };
    Editor::new(three_layers(), config).unwrap()
}

fn position(scene: &Scene, id: u64) -> (f64, f64) {
    let t = scene.layer(LayerId(id)).unwrap().transform;
    (t.x, t.y)
}

#[test]
fn dragging_a_multi_selection_commits_one_batch_command() {
    let mut ed = editor();
    ed.set_selection(&[LayerId(1), LayerId(2), LayerId(3)])
        .unwrap();

    ed.handle_pointer(PointerEvent::down(60.0, 60.0)).unwrap();
    ed.handle_pointer(PointerEvent::moved(70.0, 65.0)).unwrap();
    let out = ed.handle_pointer(PointerEvent::up(75.0, 70.0)).unwrap();

    let Some(InteractionAction::Committed(Command::BatchTransform { changes })) = out.last()
    else {
        panic!("expected a batch commit, got {out:?}");
    };
    assert_eq!(changes.len(), 3);
    assert_eq!(ed.document().history().past_len(), 1);
    assert_eq!(position(ed.scene(), 1), (75.0, 70.0));
    assert_eq!(position(ed.scene(), 2), (155.0, 70.0));
    assert_eq!(position(ed.scene(), 3), (275.0, 210.0));

    ed.undo().unwrap();
    assert_eq!(ed.scene(), &three_layers());
}

#[test]
fn preview_moves_while_committed_scene_stays() {
    let mut ed = editor();
    ed.handle_pointer(PointerEvent::down(140.0, 60.0)).unwrap();
    ed.handle_pointer(PointerEvent::moved(150.0, 80.0)).unwrap();

    assert!(ed.is_gesture_active());
    assert_eq!(ed.selection(), &[LayerId(2)]);
    assert_eq!(position(ed.scene(), 2), (140.0, 60.0));
    assert_eq!(position(&ed.preview_scene(), 2), (150.0, 80.0));
    assert_eq!(ed.handles()[0].layer, LayerId(2));
    assert!(!ed.document().can_undo());
}

#[test]
fn undo_during_a_gesture_cancels_it_first() {
    let mut ed = editor();
    ed.handle_pointer(PointerEvent::down(60.0, 60.0)).unwrap();
    ed.handle_pointer(PointerEvent::up(90.0, 60.0)).unwrap();
    assert_eq!(position(ed.scene(), 1), (90.0, 60.0));

    ed.handle_pointer(PointerEvent::down(90.0, 60.0)).unwrap();
    ed.handle_pointer(PointerEvent::moved(120.0, 100.0)).unwrap();
    ed.undo().unwrap();

    assert!(!ed.is_gesture_active());
    assert_eq!(position(ed.scene(), 1), (60.0, 60.0));
    assert_eq!(ed.preview_scene(), *ed.scene());

    // The release of the aborted gesture commits nothing.
    let out = ed.handle_pointer(PointerEvent::up(130.0, 110.0)).unwrap();
    assert!(out.is_empty());
    assert!(!ed.document().can_undo());
}

#[test]
fn click_without_movement_records_nothing() {
    let mut ed = editor();
    ed.handle_pointer(PointerEvent::down(60.0, 60.0)).unwrap();
    let out = ed.handle_pointer(PointerEvent::up(60.0, 60.0)).unwrap();
    assert_eq!(out, vec![InteractionAction::NothingToCommit]);
    assert_eq!(ed.selection(), &[LayerId(1)]);
    assert!(!ed.document().can_undo());
}

#[test]
fn marquee_selects_intersecting_layers() {
    let mut ed = editor();
    ed.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
    ed.handle_pointer(PointerEvent::moved(170.0, 100.0)).unwrap();
    assert!(ed.marquee().is_some());
    ed.handle_pointer(PointerEvent::up(170.0, 100.0)).unwrap();

    assert_eq!(ed.selection(), &[LayerId(1), LayerId(2)]);
    assert!(ed.marquee().is_none());
    assert!(!ed.document().can_undo());
}

#[test]
fn pressing_empty_canvas_clears_selection() {
    let mut ed = editor();
    ed.set_selection(&[LayerId(3)]).unwrap();
    ed.handle_pointer(PointerEvent::down(380.0, 20.0)).unwrap();
    ed.handle_pointer(PointerEvent::up(380.0, 20.0)).unwrap();
    assert!(ed.selection().is_empty());
}

#[test]
fn execute_outside_gesture_goes_through_history() {
    let mut ed = editor();
    let changed = ed
        .execute(Command::SetVisibility {
            id: LayerId(3),
            visible: false,
        })
        .unwrap();
    assert!(changed);
    assert!(!ed.scene().layer(LayerId(3)).unwrap().visible);
    ed.undo().unwrap();
    ed.redo().unwrap();
    assert!(!ed.scene().layer(LayerId(3)).unwrap().visible);

    let err = ed
        .execute(Command::RemoveLayer { id: LayerId(77) })
        .unwrap_err();
    assert!(matches!(err, LayerstackError::NotFound(_)));
}

#[test]
fn render_preview_shows_the_dragged_position() {
    let mut ed = editor();
    let assets = InMemoryAssets::new();
    let mut backend = CpuBackend::new(RenderSettings::default());

    ed.handle_pointer(PointerEvent::down(260.0, 200.0)).unwrap();
    ed.handle_pointer(PointerEvent::moved(340.0, 200.0)).unwrap();
    let frame = ed.render_preview(&mut backend, &assets, 0.0).unwrap();

    assert_eq!((frame.width, frame.height), (400, 300));
    assert_eq!(frame.pixel(340, 200), Some([0, 0, 0, 255]));
    assert_eq!(frame.pixel(260, 200), Some([255, 255, 255, 255]));

    let committed = backend
        .render_scene(ed.scene(), 0.0, ed.scene().canvas(), &assets)
        .unwrap();
    assert_eq!(committed.pixel(260, 200), Some([0, 0, 0, 255]));
}

#[test]
fn bounded_history_depth_is_honoured() {
    let config = EditorConfig {
        history_depth: Some(2),
        ..EditorConfig::default()
    };
    let mut ed = Editor::new(three_layers(), config).unwrap();
    for opacity in [0.9, 0.8, 0.7] {
        ed.execute(Command::SetOpacity {
            id: LayerId(1),
            opacity,
        })
        .unwrap();
    }
    ed.undo().unwrap();
    ed.undo().unwrap();
    assert!(matches!(ed.undo(), Err(LayerstackError::NothingToUndo)));
    assert_eq!(ed.scene().layer(LayerId(1)).unwrap().opacity, 0.9);
}
