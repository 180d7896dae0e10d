//! End-to-end behaviour of the viewer against a recording surface

use std::cell::RefCell;
use std::rc::Rc;

use canvas_viewer::testing::{rect_at, DrawCall, RecordingSurface, TestLoader};
use canvas_viewer::{
    LoadError, LoadedImage, Progress, RenderTarget, Surface, Viewer, ViewerConfig, ViewerError, ZoomConfig,
};
use egui::Vec2;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn viewer() -> (Viewer<RecordingSurface>, TestLoader) {
    init_logging();
    let loader = TestLoader::new();
    let viewer = Viewer::new(RecordingSurface::new(50.0, 50.0), loader.clone());
    (viewer, loader)
}

fn image_draws(viewer: &Viewer<RecordingSurface>) -> usize {
    viewer.with_surface(|s| s.image_draws().len())
}

fn scale_of(viewer: &Viewer<RecordingSurface>, index: usize) -> f32 {
    let item = viewer.item(index).expect("item exists");
    let scale = item.borrow().scale();
    scale
}

fn position_of(viewer: &Viewer<RecordingSurface>, index: usize) -> Vec2 {
    let item = viewer.item(index).expect("item exists");
    let position = item.borrow().position();
    position
}

/// Viewer with `sources` added and every one of them loaded
fn loaded_viewer(sources: &[&str]) -> (Viewer<RecordingSurface>, TestLoader) {
    let (viewer, loader) = viewer();
    for source in sources {
        viewer.add_image(*source, 100.0, 100.0);
    }
    for source in sources {
        loader.resolve(source);
    }
    assert!(viewer.is_all_loaded());
    (viewer, loader)
}

// =============================================================================
// Sequential loading
// =============================================================================

#[test]
fn first_image_is_selected_and_loading_starts() {
    let (viewer, loader) = viewer();
    assert_eq!(viewer.current(), None);
    viewer.add_image("a1", 100.0, 100.0);
    assert_eq!(viewer.current(), Some(0));
    assert_eq!(loader.opened(), vec!["a1"]);
    assert!(viewer.item(0).unwrap().borrow().is_loading());
}

#[test]
fn only_one_image_is_in_flight() {
    let (viewer, loader) = viewer();
    viewer
        .add_image("a", 100.0, 100.0)
        .add_image("b", 100.0, 100.0)
        .add_image("c", 100.0, 100.0);
    assert_eq!(loader.opened(), vec!["a"]);
    assert!(!viewer.item(1).unwrap().borrow().is_loading());

    loader.resolve("a");
    assert_eq!(loader.opened(), vec!["a", "b"]);
}

#[test]
fn loads_settle_in_insertion_order() {
    let (viewer, loader) = viewer();
    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = Rc::clone(&order);
        viewer
            .on_loaded(Some(Rc::new(move |image: &LoadedImage| order.borrow_mut().push(image.source.clone()))))
            .unwrap();
    }
    viewer
        .add_image("A", 100.0, 100.0)
        .add_image("B", 100.0, 100.0)
        .add_image("C", 100.0, 100.0);

    loader.resolve("A");
    // C's fetch finishes before B's
    loader.resolve("C");
    assert_eq!(*order.borrow(), vec!["A"]);
    assert!(!viewer.item(2).unwrap().borrow().is_loaded());
    assert_eq!(loader.opened(), vec!["A", "B"]);

    loader.resolve("B");
    assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
    assert!(viewer.is_all_loaded());
}

#[test]
fn loader_advances_past_failures() {
    let (viewer, loader) = viewer();
    viewer.add_image("bad", 100.0, 100.0).add_image("good", 100.0, 100.0);
    loader.reject("bad", LoadError::Http { status: 404, status_text: "Not Found".to_string() });
    assert!(viewer.item(0).unwrap().borrow().has_error());
    assert_eq!(loader.opened(), vec!["bad", "good"]);

    loader.resolve("good");
    assert!(viewer.item(1).unwrap().borrow().is_loaded());
}

#[test]
fn adding_after_everything_settled_restarts_loading() {
    let (viewer, loader) = loaded_viewer(&["a"]);
    viewer.add_image("b", 100.0, 100.0);
    assert_eq!(loader.opened(), vec!["a", "b"]);
    assert!(!viewer.is_all_loaded());
}

#[test]
fn synchronously_resolved_sources_load_in_one_call() {
    let (viewer, loader) = viewer();
    let sources: Vec<String> = (0..500).map(|i| format!("img{}", i)).collect();
    for source in &sources {
        loader.resolve(source);
    }
    for source in &sources {
        viewer.add_image(source.as_str(), 10.0, 10.0);
    }
    assert!(viewer.is_all_loaded());
    assert!(viewer.items().iter().all(|item| item.borrow().is_loaded()));
}

#[test]
fn two_images_one_loaded_draws_once() {
    let (viewer, loader) = viewer();
    viewer.add_image("a1", 100.0, 100.0).add_image("a2", 100.0, 100.0);
    loader.resolve("a1");

    let draws = viewer.with_surface(|s| {
        s.image_draws()
            .into_iter()
            .map(|(label, _)| label.map(str::to_string))
            .collect::<Vec<_>>()
    });
    assert_eq!(draws, vec![Some("a1".to_string())]);
    assert!(viewer.item(1).unwrap().borrow().is_loading());
}

#[test]
fn loaded_background_image_is_not_drawn() {
    let (viewer, loader) = viewer();
    viewer.add_image("a", 100.0, 100.0).add_image("b", 100.0, 100.0);
    loader.resolve("a");
    viewer.with_surface_mut(|s| s.take_calls());

    loader.resolve("b");
    assert_eq!(image_draws(&viewer), 0);
}

#[test]
fn first_image_draws_placeholder_once() {
    let (viewer, loader) = viewer();
    let count = Rc::new(RefCell::new(0));
    {
        let count = Rc::clone(&count);
        viewer.set_placeholder(
            RenderTarget::callback(move |_: &mut RecordingSurface, _: Option<&Progress<Vec<u8>>>| {
                *count.borrow_mut() += 1;
            }),
            false,
        );
    }
    viewer.add_image("a", 100.0, 100.0);
    assert_eq!(*count.borrow(), 1);

    loader.resolve("a");
    assert_eq!(*count.borrow(), 1);
    assert_eq!(image_draws(&viewer), 1);
}

#[test]
fn removing_the_loading_image_keeps_the_queue_moving() {
    let (viewer, loader) = viewer();
    viewer.add_image("a", 100.0, 100.0).add_image("b", 100.0, 100.0);
    viewer.remove_by_index(0);

    loader.resolve("a");
    assert_eq!(loader.opened(), vec!["a", "b"]);

    viewer.add_image("c", 100.0, 100.0);
    loader.resolve("b");
    loader.resolve("c");
    assert_eq!(loader.opened(), vec!["a", "b", "c"]);
    assert!(viewer.item(0).unwrap().borrow().is_loaded());
    assert!(viewer.item(1).unwrap().borrow().is_loaded());
    assert!(viewer.is_all_loaded());
}

#[test]
fn removing_an_image_behind_the_frontier_skips_nothing() {
    let (viewer, loader) = viewer();
    viewer
        .add_image("a", 100.0, 100.0)
        .add_image("b", 100.0, 100.0)
        .add_image("c", 100.0, 100.0);
    loader.resolve("a");
    // b is loading at index 1; removing a shifts it to index 0
    viewer.remove_by_index(0);

    loader.resolve("b");
    assert_eq!(loader.opened(), vec!["a", "b", "c"]);
    loader.resolve("c");
    assert!(viewer.is_all_loaded());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn error_callback_runs_once_for_selected_failure() {
    let (viewer, loader) = viewer();
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = Rc::clone(&seen);
        viewer.on_error(move |_surface: &mut RecordingSurface, error: Option<&LoadError>| {
            seen.borrow_mut().push(error.cloned());
        });
    }
    viewer.add_image("a", 100.0, 100.0);
    let error = LoadError::Network("connection reset".to_string());
    loader.reject("a", error.clone());

    assert_eq!(*seen.borrow(), vec![Some(error)]);
    assert_eq!(image_draws(&viewer), 0);
    assert!(viewer.item(0).unwrap().borrow().has_error());
}

#[test]
fn background_failure_is_not_rendered() {
    let (viewer, loader) = viewer();
    let calls = Rc::new(RefCell::new(0));
    {
        let calls = Rc::clone(&calls);
        viewer.on_error(move |_: &mut RecordingSurface, _: Option<&LoadError>| *calls.borrow_mut() += 1);
    }
    viewer.add_image("a", 100.0, 100.0).add_image("b", 100.0, 100.0);
    loader.resolve("a");
    loader.reject("b", LoadError::Decode("truncated".to_string()));
    assert_eq!(*calls.borrow(), 0);

    // Selecting the failed image shows the error target
    viewer.next();
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn failure_without_error_target_is_silent() {
    let (viewer, loader) = viewer();
    viewer.add_image("a", 100.0, 100.0);
    loader.reject("a", LoadError::Network("offline".to_string()));
    assert_eq!(image_draws(&viewer), 0);
}

#[test]
fn error_image_is_drawn_for_selected_failure() {
    let (viewer, loader) = viewer();
    viewer.set_error_image("broken.png", Some(Vec2::new(-10.0, -10.0)), Some(Vec2::new(80.0, 80.0)));
    loader.resolve("broken.png");
    viewer.add_image("a", 100.0, 100.0);
    loader.reject("a", LoadError::Network("offline".to_string()));

    let draws = viewer.with_surface(|s| {
        s.image_draws()
            .into_iter()
            .map(|(label, rect)| (label.map(str::to_string), rect))
            .collect::<Vec<_>>()
    });
    assert_eq!(
        draws,
        vec![(Some("broken.png".to_string()), rect_at(Vec2::new(-10.0, -10.0), Vec2::new(80.0, 80.0)))]
    );
}

#[test]
fn error_callback_replaces_error_image() {
    let (viewer, loader) = viewer();
    viewer.set_error_image("broken.png", None, Some(Vec2::new(80.0, 80.0)));
    loader.resolve("broken.png");
    let calls = Rc::new(RefCell::new(0));
    {
        let calls = Rc::clone(&calls);
        viewer.on_error(move |_: &mut RecordingSurface, _: Option<&LoadError>| *calls.borrow_mut() += 1);
    }

    viewer.add_image("a", 100.0, 100.0);
    loader.reject("a", LoadError::Network("offline".to_string()));
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(image_draws(&viewer), 0);
}

#[test]
fn error_image_replaces_error_callback() {
    let (viewer, loader) = viewer();
    let calls = Rc::new(RefCell::new(0));
    {
        let calls = Rc::clone(&calls);
        viewer.on_error(move |_: &mut RecordingSurface, _: Option<&LoadError>| *calls.borrow_mut() += 1);
    }
    viewer.set_error_image("broken.png", None, Some(Vec2::new(80.0, 80.0)));
    loader.resolve("broken.png");

    viewer.add_image("a", 100.0, 100.0);
    loader.reject("a", LoadError::Network("offline".to_string()));
    assert_eq!(*calls.borrow(), 0);
    let labels = viewer.with_surface(|s| {
        s.image_draws()
            .into_iter()
            .map(|(label, _)| label.map(str::to_string))
            .collect::<Vec<_>>()
    });
    assert_eq!(labels, vec![Some("broken.png".to_string())]);
}

#[test]
fn missing_loaded_handler_is_invalid() {
    let (viewer, _) = viewer();
    assert!(matches!(viewer.on_loaded(None), Err(ViewerError::InvalidArgument(_))));
}

// =============================================================================
// Selection
// =============================================================================

#[test]
fn selecting_loaded_image_resets_its_transform() {
    let (viewer, _) = loaded_viewer(&["a", "b"]);
    viewer.select(1).zoom_in().translate(Vec2::new(-20.0, -20.0));
    assert_eq!(scale_of(&viewer, 1), 1.4);

    viewer.select(0).select(1);
    assert_eq!(scale_of(&viewer, 1), 1.0);
    assert_eq!(position_of(&viewer, 1), Vec2::ZERO);
}

#[test]
fn selecting_current_index_is_a_no_op() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.zoom_in();
    viewer.select(0);
    assert_eq!(scale_of(&viewer, 0), 1.4);
}

#[test]
fn navigation_stops_at_the_ends() {
    let (viewer, _) = loaded_viewer(&["a", "b", "c"]);
    viewer.prev();
    assert_eq!(viewer.current(), Some(0));
    viewer.next().next().next();
    assert_eq!(viewer.current(), Some(2));
    viewer.select(7);
    assert_eq!(viewer.current(), Some(2));
    viewer.prev();
    assert_eq!(viewer.current(), Some(1));
}

#[test]
fn selecting_unloaded_image_draws_placeholder() {
    let (viewer, _) = viewer();
    let ticks = Rc::new(RefCell::new(Vec::new()));
    {
        let ticks = Rc::clone(&ticks);
        viewer.set_placeholder(
            RenderTarget::callback(move |_: &mut RecordingSurface, tick: Option<&Progress<Vec<u8>>>| {
                ticks.borrow_mut().push(tick.map(|t| t.loaded));
            }),
            false,
        );
    }
    viewer.add_image("a", 100.0, 100.0).add_image("b", 100.0, 100.0);
    ticks.borrow_mut().clear();

    viewer.next();
    assert_eq!(*ticks.borrow(), vec![None]);
}

#[test]
fn remove_keeps_current_index() {
    let (viewer, _) = loaded_viewer(&["a", "b", "c"]);
    viewer.select(2);
    viewer.remove_by_index(0);
    assert_eq!(viewer.len(), 2);
    assert_eq!(viewer.current(), Some(2));
    assert!(viewer.selected().is_none());

    viewer.remove_by_index(9);
    assert_eq!(viewer.len(), 2);
}

#[test]
fn removed_item_finishes_loading_detached() {
    let (viewer, loader) = viewer();
    viewer.add_image("a", 100.0, 100.0);
    let detached = viewer.item(0).unwrap();
    viewer.remove_by_index(0);

    loader.resolve("a");
    assert!(detached.borrow().is_loaded());
    assert!(viewer.is_empty());
}

// =============================================================================
// Zoom and pan
// =============================================================================

#[test]
fn zoom_steps_apply_only_to_selected() {
    let (viewer, _) = loaded_viewer(&["a", "b"]);
    viewer.select(1);
    let mut seen = Vec::new();
    for _ in 0..3 {
        viewer.zoom_in();
        seen.push(scale_of(&viewer, 1));
        assert_eq!(scale_of(&viewer, 0), 1.0);
    }
    assert_eq!(seen, vec![1.4, 1.8, 2.0]);

    viewer.zoom_in();
    assert_eq!(scale_of(&viewer, 1), 1.0);
    assert_eq!(scale_of(&viewer, 0), 1.0);
}

#[test]
fn free_zoom_then_step_restarts_table() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.zoom(0.3);
    assert!((scale_of(&viewer, 0) - 1.3).abs() < 0.001);
    viewer.zoom_in();
    assert_eq!(scale_of(&viewer, 0), 1.0);
    viewer.zoom(-5.0);
    assert_eq!(scale_of(&viewer, 0), 1.0);
}

#[test]
fn transforms_are_inert_until_loaded() {
    let (viewer, loader) = viewer();
    viewer.add_image("a", 100.0, 100.0);
    viewer.zoom_in().zoom(0.5).translate(Vec2::new(-10.0, -10.0));
    assert_eq!(scale_of(&viewer, 0), 1.0);
    assert_eq!(position_of(&viewer, 0), Vec2::ZERO);
    assert_eq!(image_draws(&viewer), 0);

    loader.reject("a", LoadError::Network("offline".to_string()));
    viewer.zoom_in();
    assert_eq!(scale_of(&viewer, 0), 1.0);
}

#[test]
fn translate_is_clamped_on_draw() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.translate(Vec2::ZERO);
    assert_eq!(position_of(&viewer, 0), Vec2::ZERO);

    viewer.translate(Vec2::new(-30.0, -10.0));
    assert_eq!(position_of(&viewer, 0), Vec2::new(-30.0, -10.0));

    // 100x100 on 50x50: x and y stay within [-50, 0]
    viewer.translate(Vec2::new(-500.0, 500.0));
    assert_eq!(position_of(&viewer, 0), Vec2::new(-50.0, 0.0));

    // Deltas compose from the corrected position
    viewer.translate(Vec2::new(10.0, -5.0));
    assert_eq!(position_of(&viewer, 0), Vec2::new(-40.0, -5.0));
}

#[test]
fn zoom_redraws_at_scaled_size() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.with_surface_mut(|s| s.take_calls());
    viewer.zoom_in();
    let calls = viewer.with_surface_mut(|s| s.take_calls());
    assert!(matches!(calls[0], DrawCall::Clear(_)));
    match &calls[1] {
        DrawCall::Image { rect, .. } => assert!((rect.width() - 140.0).abs() < 0.001),
        other => panic!("expected an image draw, got {:?}", other),
    }
}

#[test]
fn fill_width_applies_on_next_draw() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.with_surface_mut(|s| s.take_calls());
    viewer.fill_width();
    assert_eq!(image_draws(&viewer), 0);

    viewer.restore();
    let rect = viewer.with_surface(|s| s.image_draws()[0].1);
    assert!((rect.width() - 50.0).abs() < 0.001);
}

#[test]
fn fill_height_applies_on_next_draw() {
    let (viewer, loader) = viewer();
    viewer.add_image("tall", 100.0, 200.0);
    loader.resolve("tall");
    viewer.with_surface_mut(|s| s.take_calls());
    viewer.fill_height();
    assert_eq!(image_draws(&viewer), 0);

    viewer.restore();
    let rect = viewer.with_surface(|s| s.image_draws()[0].1);
    assert!((rect.height() - 50.0).abs() < 0.001);
    assert!((rect.width() - 25.0).abs() < 0.001);
}

#[test]
fn zoom_out_steps_backwards_through_table() {
    let (viewer, _) = loaded_viewer(&["a", "b"]);
    viewer.select(1);
    viewer.zoom_out();
    assert_eq!(scale_of(&viewer, 1), 2.0);
    viewer.zoom_out();
    assert_eq!(scale_of(&viewer, 1), 1.8);
    assert_eq!(scale_of(&viewer, 0), 1.0);

    viewer.with_surface_mut(|s| s.take_calls());
    viewer.zoom_out();
    let rect = viewer.with_surface(|s| s.image_draws()[0].1);
    assert!((rect.width() - 140.0).abs() < 0.001);
}

#[test]
fn custom_zoom_table() {
    init_logging();
    let loader = TestLoader::new();
    let config = ViewerConfig {
        zoom: ZoomConfig { min_scale: 1.0, max_scale: 3.0, steps: vec![1.0, 3.0] },
        ..Default::default()
    };
    let viewer = Viewer::with_config(RecordingSurface::new(50.0, 50.0), loader.clone(), config).unwrap();
    viewer.add_image("a", 100.0, 100.0);
    loader.resolve("a");
    viewer.zoom_in();
    assert_eq!(scale_of(&viewer, 0), 3.0);
    viewer.zoom(-0.5);
    assert_eq!(scale_of(&viewer, 0), 2.5);
}

#[test]
fn invalid_config_is_rejected() {
    let config = ViewerConfig {
        zoom: ZoomConfig { steps: Vec::new(), ..Default::default() },
        ..Default::default()
    };
    let result = Viewer::with_config(RecordingSurface::new(50.0, 50.0), TestLoader::new(), config);
    assert!(matches!(result, Err(ViewerError::InvalidConfig(_))));
}

// =============================================================================
// Resize and placeholders
// =============================================================================

#[test]
fn construction_syncs_backing_size() {
    let mut surface = RecordingSurface::new(50.0, 50.0);
    surface.set_client_size(Vec2::new(120.0, 80.0));
    let viewer = Viewer::new(surface, TestLoader::new());
    assert_eq!(viewer.with_surface(|s| s.size()), Vec2::new(120.0, 80.0));
}

#[test]
fn resize_restores_selected_image() {
    let (viewer, _) = loaded_viewer(&["a"]);
    viewer.zoom_in().translate(Vec2::new(-20.0, -20.0));

    viewer.with_surface_mut(|s| s.set_client_size(Vec2::new(80.0, 60.0)));
    viewer.handle_resize();
    assert_eq!(viewer.with_surface(|s| s.size()), Vec2::new(80.0, 60.0));
    assert_eq!(scale_of(&viewer, 0), 1.0);
    assert_eq!(position_of(&viewer, 0), Vec2::ZERO);
}

#[test]
fn placeholder_follows_progress_of_selected_image() {
    let (viewer, loader) = viewer();
    let ticks = Rc::new(RefCell::new(Vec::new()));
    {
        let ticks = Rc::clone(&ticks);
        viewer.set_placeholder(
            RenderTarget::callback(move |_: &mut RecordingSurface, tick: Option<&Progress<Vec<u8>>>| {
                ticks.borrow_mut().push(tick.map(|t| (t.loaded, t.total)));
            }),
            true,
        );
    }
    viewer.add_image("a", 100.0, 100.0);
    ticks.borrow_mut().clear();

    loader.progress("a", 10, 40);
    loader.progress("a", 30, 40);
    assert_eq!(*ticks.borrow(), vec![Some((10, 40)), Some((30, 40))]);
}

#[test]
fn placeholder_ignores_progress_when_not_requested() {
    let (viewer, loader) = viewer();
    let count = Rc::new(RefCell::new(0));
    {
        let count = Rc::clone(&count);
        viewer.set_placeholder(
            RenderTarget::callback(move |_: &mut RecordingSurface, _: Option<&Progress<Vec<u8>>>| {
                *count.borrow_mut() += 1;
            }),
            false,
        );
    }
    viewer.add_image("a", 100.0, 100.0);
    let before = *count.borrow();
    loader.progress("a", 10, 40);
    assert_eq!(*count.borrow(), before);
}

#[test]
fn placeholder_image_is_loaded_outside_the_queue() {
    let (viewer, loader) = viewer();
    viewer.set_placeholder_image("spinner.gif", Some(Vec2::new(20.0, 20.0)), false);
    assert_eq!(loader.opened(), vec!["spinner.gif"]);
    loader.resolve("spinner.gif");

    viewer.add_image("a", 100.0, 100.0);
    assert_eq!(loader.opened(), vec!["spinner.gif", "a"]);
    let labels = viewer.with_surface(|s| {
        s.image_draws()
            .into_iter()
            .filter_map(|(label, _)| label.map(str::to_string))
            .collect::<Vec<_>>()
    });
    assert!(labels.iter().all(|l| l == "spinner.gif"));
    assert!(!labels.is_empty());
}

#[test]
fn independent_viewers_do_not_share_state() {
    let (first, first_loader) = loaded_viewer(&["a"]);
    let (second, second_loader) = loaded_viewer(&["a"]);
    first.zoom_in();
    assert_eq!(scale_of(&first, 0), 1.4);
    assert_eq!(scale_of(&second, 0), 1.0);
    assert_eq!(first_loader.opened(), second_loader.opened());
}
