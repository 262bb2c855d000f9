use super::*;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Size};
use crate::scene::model::LayerContent;

fn solid(id: u64) -> Layer {
    Layer::new(
        LayerId(id),
        LayerContent::Solid {
            color: Color::BLACK,
            size: Size::new(10.0, 10.0),
        },
    )
    .with_transform(Transform2D::at(id as f64 * 10.0, 5.0))
}

fn scene3() -> Scene {
    let mut s = Scene::new(Canvas::new(100, 100));
    for id in 1..=3 {
        s = s.with_layer(solid(id)).unwrap();
    }
    s
}

fn apply_changed(cmd: &Command, scene: &Scene) -> (Scene, Command) {
    match cmd.apply(scene).unwrap() {
        Applied::Changed { scene, inverse } => (scene, inverse),
        Applied::NoOp => panic!("expected {} to change the scene", cmd.label()),
    }
}

fn assert_roundtrip(cmd: Command) {
    let base = scene3();
    let (next, inverse) = apply_changed(&cmd, &base);
    assert_ne!(next, base, "{} should change the scene", cmd.label());
    let (restored, _) = apply_changed(&inverse, &next);
    assert_eq!(restored, base, "{} inverse should restore", cmd.label());
}

#[test]
fn every_command_inverts() {
    assert_roundtrip(Command::AddLayer {
        layer: solid(9),
        index: Some(1),
    });
    assert_roundtrip(Command::RemoveLayer { id: LayerId(2) });
    assert_roundtrip(Command::Reorder {
        id: LayerId(1),
        to: 2,
    });
    assert_roundtrip(Command::SetTransform {
        id: LayerId(3),
        transform: Transform2D::new(1.0, 2.0, 3.0, 4.0, 45.0),
    });
    assert_roundtrip(Command::SetVisibility {
        id: LayerId(1),
        visible: false,
    });
    assert_roundtrip(Command::SetOpacity {
        id: LayerId(1),
        opacity: 0.3,
    });
    assert_roundtrip(Command::BatchTransform {
        changes: vec![
            (LayerId(1), Transform2D::at(0.0, 0.0)),
            (LayerId(3), Transform2D::at(1.0, 1.0)),
        ],
    });
    assert_roundtrip(Command::SetKeyframes {
        id: LayerId(2),
        keyframes: Keyframes::new(vec![
            crate::animation::keyframes::Keyframe::translate(0.0, 0.0, 0.0),
            crate::animation::keyframes::Keyframe::translate(1.0, 5.0, 0.0),
        ])
        .unwrap(),
    });
    assert_roundtrip(Command::RenameLayer {
        id: LayerId(2),
        name: "logo".to_owned(),
    });
}

#[test]
fn apply_leaves_input_untouched() {
    let base = scene3();
    let before = base.clone();
    let _ = Command::RemoveLayer { id: LayerId(1) }.apply(&base).unwrap();
    assert_eq!(base, before);
    assert_eq!(base.len(), 3);
}

#[test]
fn reorder_clamps_and_detects_noop() {
    let base = scene3();
    let (next, inverse) = apply_changed(
        &Command::Reorder {
            id: LayerId(1),
            to: 50,
        },
        &base,
    );
    assert_eq!(next.index_of(LayerId(1)), Some(2));
    assert_eq!(
        inverse,
        Command::Reorder {
            id: LayerId(1),
            to: 0
        }
    );

    let same = Command::Reorder {
        id: LayerId(3),
        to: 7,
    }
    .apply(&base)
    .unwrap();
    assert!(matches!(same, Applied::NoOp));
}

#[test]
fn missing_ids_are_not_found() {
    let base = scene3();
    let cmds = [
        Command::RemoveLayer { id: LayerId(42) },
        Command::Reorder {
            id: LayerId(42),
            to: 0,
        },
        Command::SetTransform {
            id: LayerId(42),
            transform: Transform2D::IDENTITY,
        },
        Command::BatchTransform {
            changes: vec![
                (LayerId(1), Transform2D::at(50.0, 50.0)),
                (LayerId(42), Transform2D::IDENTITY),
            ],
        },
    ];
    for cmd in cmds {
        let err = cmd.apply(&base).unwrap_err();
        assert!(matches!(err, LayerstackError::NotFound(_)), "{err}");
    }
}

#[test]
fn non_finite_values_are_invalid_geometry() {
    let base = scene3();
    let err = Command::SetTransform {
        id: LayerId(1),
        transform: Transform2D::new(f64::INFINITY, 0.0, 1.0, 1.0, 0.0),
    }
    .apply(&base)
    .unwrap_err();
    assert!(matches!(err, LayerstackError::InvalidGeometry(_)));

    let err = Command::SetOpacity {
        id: LayerId(1),
        opacity: f64::NAN,
    }
    .apply(&base)
    .unwrap_err();
    assert!(matches!(err, LayerstackError::InvalidGeometry(_)));
}

#[test]
fn equal_values_are_noops() {
    let base = scene3();
    let current = base.layer(LayerId(2)).unwrap().transform;
    for cmd in [
        Command::SetTransform {
            id: LayerId(2),
            transform: current,
        },
        Command::SetVisibility {
            id: LayerId(2),
            visible: true,
        },
        Command::SetOpacity {
            id: LayerId(2),
            opacity: 1.0,
        },
        Command::BatchTransform {
            changes: vec![(LayerId(2), current)],
        },
        Command::BatchTransform { changes: vec![] },
    ] {
        assert!(matches!(cmd.apply(&base).unwrap(), Applied::NoOp));
    }
}

#[test]
fn opacity_is_clamped() {
    let (half, _) = apply_changed(
        &Command::SetOpacity {
            id: LayerId(1),
            opacity: 0.5,
        },
        &scene3(),
    );
    let (next, _) = apply_changed(
        &Command::SetOpacity {
            id: LayerId(1),
            opacity: 3.0,
        },
        &half,
    );
    assert_eq!(next.layer(LayerId(1)).unwrap().opacity, 1.0);

    // Clamping onto the current value changes nothing.
    let raised = Command::SetOpacity {
        id: LayerId(1),
        opacity: 3.0,
    };
    assert!(matches!(raised.apply(&next).unwrap(), Applied::NoOp));
}

#[test]
fn batch_rejects_repeated_layer() {
    let err = Command::BatchTransform {
        changes: vec![
            (LayerId(1), Transform2D::at(1.0, 1.0)),
            (LayerId(1), Transform2D::at(2.0, 2.0)),
        ],
    }
    .apply(&scene3())
    .unwrap_err();
    assert!(matches!(err, LayerstackError::Validation(_)));
}

#[test]
fn add_with_existing_id_is_rejected() {
    let err = Command::AddLayer {
        layer: solid(2),
        index: None,
    }
    .apply(&scene3())
    .unwrap_err();
    assert!(matches!(err, LayerstackError::Validation(_)));
}

#[test]
fn commands_serialize_with_op_tag() {
    let v = serde_json::to_value(Command::RemoveLayer { id: LayerId(4) }).unwrap();
    assert_eq!(v, serde_json::json!({"op": "remove_layer", "id": 4}));
}
