mod common;

use common::{mounted, ready, station};
use geopol_map::host::{Cursor, HostEvent, MapHost, ScreenPoint};
use geopol_map::map::layers::{cluster_layer_id, leaf_layer_id};
use geopol_map::map::DEFAULT_SOURCE_ID;
use geopol_map::{
    ClusterOptions, FeatureCollection, LngLat, LoadState, MapConfig, MapError, ViewEvent,
};

fn leaves() -> String {
    leaf_layer_id(DEFAULT_SOURCE_ID)
}

fn clusters() -> String {
    cluster_layer_id(DEFAULT_SOURCE_ID)
}

/// Two stations about 9 px apart at zoom 11, next to the default center
fn close_pair() -> FeatureCollection {
    FeatureCollection::new(vec![
        station("a", 9.1829, 48.7758),
        station("b", 9.1859, 48.7758),
    ])
    .unwrap()
}

#[test]
fn test_stuttgart_renders_nine_leaves() {
    let (view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    let host = view.host().unwrap();

    assert_eq!(host.layer_ids(), vec![leaves()]);
    assert_eq!(host.source_ids(), vec![DEFAULT_SOURCE_ID.to_string()]);
    let rendered = host.query_rendered_features(None, &[leaves().as_str()]);
    assert_eq!(rendered.len(), 9);
    assert!(rendered.iter().all(|f| !f.is_cluster()));
}

#[test]
fn test_events_of_a_normal_startup() {
    let (mut view, _) = mounted(MapConfig::default(), FeatureCollection::stuttgart());
    assert_eq!(*view.load_state(), LoadState::Loading);

    let events = view.pump();
    assert_eq!(events[0], ViewEvent::StateChanged(LoadState::Loading));
    assert_eq!(events[1], ViewEvent::StateChanged(LoadState::Ready));
    assert!(matches!(events[2], ViewEvent::Reconciled(ref r) if r.layer_ids == vec![leaves()]));
    assert_eq!(events.len(), 3);
}

#[test]
fn test_click_headquarters_opens_popup() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    let events = view.pump();

    assert!(events.contains(&ViewEvent::SelectionChanged(Some("pp-stuttgart".into()))));
    assert_eq!(view.selection(), Some("pp-stuttgart"));
    let overlay = view.overlay().unwrap();
    assert_eq!(overlay.address, "Hahnemannstraße 1, 70191 Stuttgart");
    assert_eq!(overlay.icon, "🏛️");
    assert_eq!(overlay.phone.href, "tel:071189900");

    let host = view.host().unwrap();
    assert_eq!(host.inner.open_popups().count(), 1);
}

#[test]
fn test_only_one_popup_open() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    view.pump();
    view.host_mut().unwrap().click_at(LngLat::new(9.207963, 48.783734));
    view.pump();

    assert_eq!(view.selection(), Some("pr-stuttgart-5"));
    let host = view.host().unwrap();
    let open: Vec<_> = host.inner.open_popups().map(|o| o.feature_id.clone()).collect();
    assert_eq!(open, vec!["pr-stuttgart-5".to_string()]);
}

#[test]
fn test_click_on_empty_map_clears_selection() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    view.pump();

    view.host_mut().unwrap().inner.click(ScreenPoint::new(2.0, 2.0));
    let events = view.pump();

    assert!(events.contains(&ViewEvent::SelectionChanged(None)));
    assert_eq!(view.selection(), None);
    assert!(!view.overlay_visible());
}

#[test]
fn test_hover_switches_cursor() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    let p = view
        .host()
        .unwrap()
        .inner
        .viewport()
        .project(LngLat::new(9.18686, 48.81046));

    view.host_mut().unwrap().inner.pointer_move(ScreenPoint::new(p.x, p.y));
    assert!(view.pump().contains(&ViewEvent::CursorChanged(Cursor::Pointer)));
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Pointer);

    view.host_mut().unwrap().inner.pointer_move(ScreenPoint::new(2.0, 2.0));
    assert!(view.pump().contains(&ViewEvent::CursorChanged(Cursor::Default)));
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Default);
}

#[test]
fn test_unmount_twice_leaves_nothing_registered() {
    let (mut view, log) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    view.pump();

    view.unmount();
    view.unmount();

    let log = log.borrow();
    assert_eq!(log.remove_calls, 1);
    assert_eq!(log.at_removal, Some((Vec::new(), Vec::new())));
    assert_eq!(*view.load_state(), LoadState::Idle);
    assert_eq!(view.selection(), None);
    assert!(view.host().is_none());
}

#[test]
fn test_unmount_while_loading() {
    let (mut view, log) = mounted(MapConfig::default(), FeatureCollection::stuttgart());
    view.unmount();
    assert_eq!(log.borrow().at_removal, Some((Vec::new(), Vec::new())));
    assert!(view.pump().contains(&ViewEvent::StateChanged(LoadState::Idle)));
}

#[test]
fn test_drop_releases_host() {
    let (view, log) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    drop(view);
    assert_eq!(log.borrow().remove_calls, 1);
}

#[test]
fn test_style_failure_is_terminal() {
    let mut config = MapConfig::default();
    config.style.tiles = vec!["tiles.invalid/{z}/{x}/{y}.png".into()];
    let (mut view, log) = mounted(config, FeatureCollection::stuttgart());

    let events = view.pump();
    assert!(view.load_state().is_error());
    assert!(!events.contains(&ViewEvent::StateChanged(LoadState::Ready)));
    let reason = view.load_state().error().unwrap().to_string();
    assert!(reason.contains("tiles.invalid"), "{reason}");

    // A late load notification does not revive the map
    log.borrow_mut().inject.push_back(HostEvent::StyleLoaded);
    view.pump();
    assert!(view.load_state().is_error());
    assert_eq!(view.load_state().error(), Some(reason.as_str()));
    assert!(view.host().unwrap().layer_ids().is_empty());

    let err = view.set_features(FeatureCollection::empty()).unwrap_err();
    assert!(matches!(err, MapError::NotReady(_)));
}

#[test]
fn test_host_error_after_ready() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().inner.emit_error("tile 11/1076/704 failed");
    view.pump();
    assert_eq!(
        view.load_state().error(),
        Some("map style failed to load: tile 11/1076/704 failed")
    );
}

#[test]
fn test_unavailable_container_fails_mount() {
    let factory = common::FlakyFactory::default();
    let mut view = geopol_map::MapView::new(
        factory,
        MapConfig::default(),
        FeatureCollection::stuttgart(),
    );
    let err = view
        .mount(geopol_map::host::Container::new("map", 0, 0))
        .unwrap_err();
    assert!(matches!(err, MapError::Initialization(_)));
    assert!(view.load_state().is_error());
    assert!(view.host().is_none());
}

#[test]
fn test_reinit_after_failure() {
    let (mut view, log) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().inner.emit_error("network down");
    view.pump();
    assert!(view.load_state().is_error());

    view.reinit().unwrap();
    view.pump();
    assert!(view.load_state().is_ready());
    assert_eq!(log.borrow().remove_calls, 1);
    assert_eq!(view.host().unwrap().layer_ids(), vec![leaves()]);
}

#[test]
fn test_retry_recovers_from_one_failure() {
    let (mut view, log) = mounted(MapConfig::default(), FeatureCollection::stuttgart());
    log.borrow_mut().fail_add_layer = 1;
    view.pump();

    assert!(view.load_state().is_ready());
    assert_eq!(log.borrow().add_layer_calls, 2);
    let host = view.host().unwrap();
    assert_eq!(host.layer_ids(), vec![leaves()]);
    assert_eq!(host.source_ids().len(), 1);
}

#[test]
fn test_second_failure_enters_error() {
    let (mut view, log) = mounted(MapConfig::default(), FeatureCollection::stuttgart());
    log.borrow_mut().fail_add_layer = 2;
    view.pump();

    let reason = view.load_state().error().unwrap();
    assert!(reason.starts_with("layer registration failed"), "{reason}");
    let host = view.host().unwrap();
    assert!(host.layer_ids().is_empty());
    assert!(host.source_ids().is_empty());
}

#[test]
fn test_clustering_merges_close_points() {
    let config = MapConfig {
        clustering: ClusterOptions::enabled(),
        ..MapConfig::default()
    };
    let (view, _) = ready(config, close_pair());
    let host = view.host().unwrap();

    assert_eq!(host.layer_ids(), vec![leaves(), clusters()]);
    let rendered = host.query_rendered_features(None, &[clusters().as_str()]);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].point_count().unwrap() >= 2);
    assert!(host.query_rendered_features(None, &[leaves().as_str()]).is_empty());
}

#[test]
fn test_cluster_click_zooms_in() {
    let config = MapConfig {
        clustering: ClusterOptions::enabled(),
        ..MapConfig::default()
    };
    let (mut view, _) = ready(config, close_pair());
    let before = view.host().unwrap().camera().zoom;
    let cluster = view.host().unwrap().query_rendered_features(None, &[clusters().as_str()])[0].clone();

    view.host_mut().unwrap().click_at(cluster.coordinate);
    view.pump();
    let events = view.pump();

    let target = events
        .iter()
        .find_map(|e| match e {
            ViewEvent::CameraEased(target) => Some(*target),
            _ => None,
        })
        .expect("camera eased");
    assert!(target.zoom > before);
    assert_eq!(target.center, cluster.coordinate);
    assert_eq!(view.host().unwrap().camera().zoom, target.zoom);
    // No leaf was selected by the cluster click
    assert_eq!(view.selection(), None);
}

#[test]
fn test_expansion_after_data_change_is_dropped() {
    let config = MapConfig {
        clustering: ClusterOptions::enabled(),
        ..MapConfig::default()
    };
    let (mut view, _) = ready(config, close_pair());
    let before = view.host().unwrap().camera();
    let cluster = view.host().unwrap().query_rendered_features(None, &[clusters().as_str()])[0].clone();

    view.host_mut().unwrap().click_at(cluster.coordinate);
    view.pump();
    view.set_features(FeatureCollection::stuttgart()).unwrap();
    let events = view.pump();

    assert!(!events.iter().any(|e| matches!(e, ViewEvent::CameraEased(_))));
    assert_eq!(view.host().unwrap().camera(), before);
}

#[test]
fn test_toggle_clustering_while_ready() {
    let (mut view, _) = ready(MapConfig::default(), close_pair());
    view.set_cluster_options(ClusterOptions::enabled()).unwrap();
    assert_eq!(view.host().unwrap().layer_ids(), vec![leaves(), clusters()]);

    view.set_cluster_options(ClusterOptions::default()).unwrap();
    let host = view.host().unwrap();
    assert_eq!(host.layer_ids(), vec![leaves()]);
    assert_eq!(host.query_rendered_features(None, &[]).len(), 2);
}

#[test]
fn test_options_set_while_loading_apply_once_ready() {
    let (mut view, log) = mounted(MapConfig::default(), FeatureCollection::stuttgart());
    view.set_features(close_pair()).unwrap();
    view.set_cluster_options(ClusterOptions::enabled()).unwrap();
    assert_eq!(log.borrow().add_layer_calls, 0);

    view.pump();
    assert_eq!(log.borrow().add_layer_calls, 2);
    let registration = view.registration().unwrap();
    assert!(registration.clustering_enabled);
    assert_eq!(view.features().len(), 2);
}

#[test]
fn test_removed_selection_is_cleared() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    view.pump();
    assert!(view.overlay_visible());

    view.set_features(close_pair()).unwrap();
    let events = view.pump();
    assert!(events.contains(&ViewEvent::SelectionChanged(None)));
    assert_eq!(view.selection(), None);
    assert!(!view.overlay_visible());
}

#[test]
fn test_hiding_features_removes_layers() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.set_show_features(false).unwrap();
    let host = view.host().unwrap();
    assert!(host.layer_ids().is_empty());
    assert!(host.source_ids().is_empty());

    view.set_show_features(true).unwrap();
    assert_eq!(view.host().unwrap().layer_ids(), vec![leaves()]);
}

#[test]
fn test_failed_reconcile_releases_selection_and_listeners() {
    let (mut view, log) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    view.host_mut().unwrap().click_at(LngLat::new(9.18686, 48.81046));
    view.pump();
    assert_eq!(view.selection(), Some("pp-stuttgart"));

    log.borrow_mut().fail_add_layer = 2;
    let err = view.set_cluster_options(ClusterOptions::enabled()).unwrap_err();
    assert!(matches!(err, MapError::LayerRegistration { .. }));
    let events = view.pump();

    assert!(view.load_state().is_error());
    assert!(events.contains(&ViewEvent::SelectionChanged(None)));
    assert_eq!(view.selection(), None);
    assert!(!view.overlay_visible());
    assert!(view.registration().is_none());
    let host = view.host().unwrap();
    assert!(host.layer_ids().is_empty());
    assert!(host.source_ids().is_empty());
    assert!(host.inner.listeners().is_empty());
    assert_eq!(host.inner.open_popups().count(), 0);
}

/// Two stations on the same spot never separate
fn coincident_pair() -> FeatureCollection {
    FeatureCollection::new(vec![
        station("a", 9.1829, 48.7758),
        station("b", 9.1829, 48.7758),
    ])
    .unwrap()
}

#[test]
fn test_oversized_cluster_zoom_rejected_by_setter() {
    let (mut view, _) = ready(MapConfig::default(), coincident_pair());
    let err = view
        .set_cluster_options(ClusterOptions {
            enabled: true,
            radius: 50,
            max_zoom: 255,
        })
        .unwrap_err();

    assert!(matches!(err, MapError::InvalidOptions(_)));
    assert!(view.load_state().is_ready());
    assert_eq!(view.host().unwrap().layer_ids(), vec![leaves()]);
}

#[test]
fn test_oversized_cluster_zoom_from_config_stays_in_range() {
    // Configs built in code skip `MapConfig::validate`
    let config = MapConfig {
        clustering: ClusterOptions {
            enabled: true,
            radius: 50,
            max_zoom: 255,
        },
        ..MapConfig::default()
    };
    let (mut view, _) = ready(config, coincident_pair());
    let cluster = view.host().unwrap().query_rendered_features(None, &[clusters().as_str()])[0].clone();

    view.host_mut().unwrap().click_at(cluster.coordinate);
    view.pump();
    view.pump();

    let zoom = view.host().unwrap().camera().zoom;
    assert_eq!(zoom, view.config().style.max_zoom as f64);
}

fn hover_headquarters(view: &mut geopol_map::MapView<common::FlakyFactory>) {
    let p = view
        .host()
        .unwrap()
        .inner
        .viewport()
        .project(LngLat::new(9.18686, 48.81046));
    view.host_mut().unwrap().inner.pointer_move(ScreenPoint::new(p.x, p.y));
    view.pump();
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Pointer);
}

#[test]
fn test_reconcile_under_pointer_resets_cursor() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    hover_headquarters(&mut view);

    view.set_cluster_options(ClusterOptions {
        radius: 60,
        ..ClusterOptions::default()
    })
    .unwrap();
    let events = view.pump();
    assert!(events.contains(&ViewEvent::CursorChanged(Cursor::Default)));
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Default);

    view.host_mut().unwrap().inner.pointer_move(ScreenPoint::new(1.0, 1.0));
    view.pump();
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Default);

    // Moving back onto the feature is a fresh enter on the new layer
    hover_headquarters(&mut view);
}

#[test]
fn test_hiding_features_under_pointer_resets_cursor() {
    let (mut view, _) = ready(MapConfig::default(), FeatureCollection::stuttgart());
    hover_headquarters(&mut view);

    view.set_show_features(false).unwrap();
    assert!(view.pump().contains(&ViewEvent::CursorChanged(Cursor::Default)));
    assert_eq!(view.host().unwrap().inner.cursor(), Cursor::Default);
}
