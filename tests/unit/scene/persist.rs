use super::*;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Size};
use crate::geometry::transform::Transform2D;
use crate::scene::model::{AssetRef, Layer, LayerContent, LayerId, TextContent};

fn sample() -> Scene {
    Scene::new(Canvas::new(1080, 1350))
        .with_background(Color::rgb(12, 34, 56))
        .with_duration(3.0)
        .with_layer(
            Layer::new(
                LayerId(1),
                LayerContent::Image {
                    asset: AssetRef::new("photos/model.png"),
                    size: Size::new(800.0, 1000.0),
                },
            )
            .with_name("photo")
            .with_transform(Transform2D::new(540.0, 675.0, 1.25, 1.25, 12.5)),
        )
        .unwrap()
        .with_layer(
            Layer::new(
                LayerId(2),
                LayerContent::Text {
                    text: TextContent {
                        text: "LIVE NOW".to_owned(),
                        font_size: 72.0,
                        color: Color::WHITE,
                        font_family: None,
                    },
                    size: Size::new(600.0, 90.0),
                },
            )
            .with_opacity(0.75)
            .with_visible(false),
        )
        .unwrap()
}

#[test]
fn json_roundtrip_is_lossless() {
    let scene = sample();
    let json = scene.to_json_string().unwrap();
    let back = Scene::from_reader(json.as_bytes()).unwrap();
    assert_eq!(back, scene);
    assert_ne!(back.id(), scene.id());
}

#[test]
fn to_writer_matches_to_json_string() {
    let scene = sample();
    let mut buf = Vec::new();
    scene.to_writer(&mut buf).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), scene.to_json_string().unwrap());
}

#[test]
fn minimal_json_uses_defaults() {
    let json = r##"{
        "canvas": {"width": 64, "height": 32},
        "layers": [
            {"id": 5, "content": {"kind": "solid", "color": "#ff0000", "size": {"width": 4, "height": 4}}}
        ]
    }"##;
    let scene = Scene::from_reader(json.as_bytes()).unwrap();
    assert_eq!(scene.background(), Color::WHITE);
    let layer = scene.layer(LayerId(5)).unwrap();
    assert!(layer.visible);
    assert_eq!(layer.opacity, 1.0);
    assert_eq!(layer.transform, Transform2D::IDENTITY);
}

#[test]
fn load_canonicalizes_angles() {
    let json = r##"{
        "canvas": {"width": 64, "height": 32},
        "layers": [
            {"id": 1, "transform": {"rotation_deg": -45},
             "content": {"kind": "solid", "color": "#000000", "size": {"width": 4, "height": 4}}}
        ]
    }"##;
    let scene = Scene::from_reader(json.as_bytes()).unwrap();
    assert_eq!(scene.layer(LayerId(1)).unwrap().transform.rotation_deg, 315.0);
}

#[test]
fn duplicate_ids_fail_validation() {
    let json = r##"{
        "canvas": {"width": 8, "height": 8},
        "layers": [
            {"id": 1, "content": {"kind": "solid", "color": "#000000", "size": {"width": 1, "height": 1}}},
            {"id": 1, "content": {"kind": "solid", "color": "#000000", "size": {"width": 1, "height": 1}}}
        ]
    }"##;
    let err = Scene::from_reader(json.as_bytes()).unwrap_err();
    assert!(err.to_string().contains("duplicate layer id"));
}

#[test]
fn malformed_json_is_a_validation_error() {
    let err = Scene::from_reader("{".as_bytes()).unwrap_err();
    assert!(matches!(err, LayerstackError::Validation(_)));
}
