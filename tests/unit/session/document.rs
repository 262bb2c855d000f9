use super::*;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Size};

fn solid(side: f64) -> LayerContent {
    LayerContent::Solid {
        color: Color::BLACK,
        size: Size::new(side, side),
    }
}

fn doc_with_two() -> Document {
    let scene = Scene::new(Canvas::new(200, 200))
        .with_layer(Layer::new(LayerId(3), solid(10.0)).with_transform(Transform2D::at(20.0, 20.0)))
        .unwrap()
        .with_layer(Layer::new(LayerId(7), solid(10.0)).with_transform(Transform2D::at(80.0, 80.0)))
        .unwrap();
    Document::new(scene).unwrap()
}

#[test]
fn add_layer_allocates_ids_above_existing_ones() {
    let mut doc = doc_with_two();
    let a = doc.add_layer(solid(5.0), Transform2D::at(1.0, 1.0)).unwrap();
    let b = doc.add_layer(solid(5.0), Transform2D::at(2.0, 2.0)).unwrap();
    assert_eq!(a, LayerId(8));
    assert_eq!(b, LayerId(9));
    assert_eq!(doc.scene().index_of(b), Some(3));
}

#[test]
fn ids_are_not_reused_after_undo() {
    let mut doc = doc_with_two();
    let a = doc.add_layer(solid(5.0), Transform2D::IDENTITY).unwrap();
    doc.undo().unwrap();
    assert!(!doc.scene().contains(a));
    let b = doc.add_layer(solid(5.0), Transform2D::IDENTITY).unwrap();
    assert_ne!(a, b);
}

#[test]
fn set_selection_rejects_unknown_ids_and_keeps_previous() {
    let mut doc = doc_with_two();
    doc.set_selection(&[LayerId(3)]).unwrap();
    let err = doc.set_selection(&[LayerId(7), LayerId(99)]).unwrap_err();
    assert!(matches!(err, LayerstackError::NotFound(_)));
    assert_eq!(doc.selection(), &[LayerId(3)]);
}

#[test]
fn set_selection_collapses_duplicates_in_order() {
    let mut doc = doc_with_two();
    doc.set_selection(&[LayerId(7), LayerId(3), LayerId(7)])
        .unwrap();
    assert_eq!(doc.selection(), &[LayerId(7), LayerId(3)]);
    doc.clear_selection();
    assert!(doc.selection().is_empty());
}

#[test]
fn removing_a_selected_layer_prunes_the_selection() {
    let mut doc = doc_with_two();
    doc.set_selection(&[LayerId(3), LayerId(7)]).unwrap();
    doc.remove_layer(LayerId(3)).unwrap();
    assert_eq!(doc.selection(), &[LayerId(7)]);

    // Selection is not part of history.
    doc.undo().unwrap();
    assert!(doc.scene().contains(LayerId(3)));
    assert_eq!(doc.selection(), &[LayerId(7)]);
}

#[test]
fn failed_command_leaves_scene_and_history_untouched() {
    let mut doc = doc_with_two();
    let before = doc.scene().clone();
    let err = doc
        .set_transform(LayerId(42), Transform2D::at(1.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, LayerstackError::NotFound(_)));
    assert_eq!(doc.scene(), &before);
    assert!(!doc.can_undo());
}

#[test]
fn no_op_edits_are_not_recorded() {
    let mut doc = doc_with_two();
    assert!(!doc.set_opacity(LayerId(3), 1.0).unwrap());
    assert!(!doc.can_undo());
    assert!(doc.set_opacity(LayerId(3), 0.5).unwrap());
    assert!(doc.can_undo());
}

#[test]
fn undo_redo_round_trip_through_document() {
    let mut doc = doc_with_two();
    let original = doc.scene().clone();
    doc.rename_layer(LayerId(7), "logo").unwrap();
    doc.reorder(LayerId(7), 0).unwrap();
    let edited = doc.scene().clone();
    assert_eq!(edited.index_of(LayerId(7)), Some(0));

    doc.undo().unwrap();
    doc.undo().unwrap();
    assert_eq!(doc.scene(), &original);
    assert!(matches!(doc.undo(), Err(LayerstackError::NothingToUndo)));

    doc.redo().unwrap();
    doc.redo().unwrap();
    assert_eq!(doc.scene(), &edited);
    assert!(!doc.can_redo());
}

#[test]
fn inserted_layer_id_bumps_the_allocator() {
    let mut doc = doc_with_two();
    doc.insert_layer(Layer::new(LayerId(20), solid(4.0)), Some(0))
        .unwrap();
    assert_eq!(doc.scene().index_of(LayerId(20)), Some(0));
    assert_eq!(doc.allocate_layer_id().unwrap(), LayerId(21));
}

#[test]
fn highest_possible_id_exhausts_the_allocator() {
    let scene = Scene::new(Canvas::new(50, 50))
        .with_layer(Layer::new(LayerId(u64::MAX), solid(4.0)))
        .unwrap();
    let mut doc = Document::new(scene).unwrap();
    let err = doc.add_layer(solid(2.0), Transform2D::IDENTITY).unwrap_err();
    assert!(matches!(err, LayerstackError::Validation(_)));
    assert_eq!(doc.scene().len(), 1);
    assert!(!doc.can_undo());

    let mut doc = doc_with_two();
    doc.insert_layer(Layer::new(LayerId(u64::MAX), solid(4.0)), None)
        .unwrap();
    assert!(matches!(
        doc.allocate_layer_id(),
        Err(LayerstackError::Validation(_))
    ));
}
