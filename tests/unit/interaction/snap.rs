use super::*;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Size};
use crate::geometry::transform::Transform2D;
use crate::scene::model::{Layer, LayerContent};

fn scene_with_block() -> Scene {
    Scene::new(Canvas::new(400, 300))
        .with_layer(
            Layer::new(
                LayerId(1),
                LayerContent::Solid {
                    color: Color::BLACK,
                    size: Size::new(50.0, 50.0),
                },
            )
            .with_transform(Transform2D::at(300.0, 100.0)),
        )
        .unwrap()
}

#[test]
fn snaps_center_to_canvas_center() {
    let targets = SnapTargets::collect(&scene_with_block(), &[]);
    // 30 px wide box centered at x=197: 3 px off the canvas center.
    let moving = Rect::new(182.0, 20.0, 212.0, 50.0);
    let (offset, guides) = targets.snap_rect(moving, &SnapConfig::default());
    assert_eq!(offset.x, 3.0);
    assert!(guides.contains(&SnapGuide::Vertical {
        x: 200.0,
        source: SnapSource::Canvas
    }));
}

#[test]
fn snaps_to_other_layer_edges() {
    let targets = SnapTargets::collect(&scene_with_block(), &[]);
    // Block spans y 75..125; moving box bottom at 72 snaps onto its top edge.
    let moving = Rect::new(10.0, 52.0, 30.0, 72.0);
    let (offset, guides) = targets.snap_rect(moving, &SnapConfig::default());
    assert_eq!(offset.y, 3.0);
    assert!(guides.contains(&SnapGuide::Horizontal {
        y: 75.0,
        source: SnapSource::Layer(LayerId(1))
    }));
}

#[test]
fn moving_layers_are_not_targets() {
    let targets = SnapTargets::collect(&scene_with_block(), &[LayerId(1)]);
    let moving = Rect::new(10.0, 52.0, 30.0, 72.0);
    let (offset, _) = targets.snap_rect(moving, &SnapConfig::default());
    assert_eq!(offset.y, 0.0);
}

#[test]
fn out_of_tolerance_or_disabled_does_not_snap() {
    let targets = SnapTargets::collect(&scene_with_block(), &[]);
    let moving = Rect::new(100.0, 180.0, 120.0, 200.0);
    let (offset, guides) = targets.snap_rect(moving, &SnapConfig::default());
    assert_eq!(offset, Vec2::ZERO);
    assert!(guides.is_empty());

    let off = SnapConfig {
        enabled: false,
        ..SnapConfig::default()
    };
    let (offset, _) = targets.snap_rect(Rect::new(182.0, 20.0, 212.0, 50.0), &off);
    assert_eq!(offset, Vec2::ZERO);
}

#[test]
fn closest_candidate_wins() {
    let targets = SnapTargets::collect(&Scene::new(Canvas::new(400, 300)), &[]);
    // Left edge 4 px from 0, right edge 2 px from the center line: center wins.
    let moving = Rect::new(4.0, 100.0, 198.0, 120.0);
    let (offset, _) = targets.snap_rect(moving, &SnapConfig::default());
    assert_eq!(offset.x, 2.0);
}

#[test]
fn angles_snap_to_right_angles() {
    let cfg = SnapConfig::default();
    assert_eq!(snap_angle(87.0, &cfg), (90.0, true));
    assert_eq!(snap_angle(-3.0, &cfg), (0.0, true));
    assert_eq!(snap_angle(358.0, &cfg), (0.0, true));
    assert_eq!(snap_angle(45.0, &cfg), (45.0, false));
}
