//! Raw-vs-clustered rendering and cluster expansion navigation.

use super::layers::cluster_layer_id;
use crate::config::ClusterOptions;
use crate::error::{HostError, MapError};
use crate::geo::LngLat;
use crate::host::{
    CameraTarget, CircleLayer, CirclePaint, Expr, MapHost, RenderedFeature, RequestId, POINT_COUNT,
};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Every feature drawn individually
    Leaves,
    /// Nearby features aggregated per zoom level
    Clustered,
}

impl RenderMode {
    pub fn from_options(options: &ClusterOptions) -> Self {
        if options.enabled {
            RenderMode::Clustered
        } else {
            RenderMode::Leaves
        }
    }
}

/// Aggregate circles, colored and sized in steps at 5 and 10 members
pub fn cluster_layer(source_id: &str) -> CircleLayer {
    CircleLayer {
        id: cluster_layer_id(source_id),
        source: source_id.to_string(),
        filter: Some(Expr::has(POINT_COUNT)),
        paint: CirclePaint {
            radius: Expr::step(
                Expr::get(POINT_COUNT),
                Expr::literal(20),
                vec![(5.0, Expr::literal(25)), (10.0, Expr::literal(30))],
            ),
            color: Expr::step(
                Expr::get(POINT_COUNT),
                Expr::literal("#3b82f6"),
                vec![(5.0, Expr::literal("#2563eb")), (10.0, Expr::literal("#1e40af"))],
            ),
            stroke_width: 3.0,
            stroke_color: "#ffffff".into(),
        },
    }
}

struct PendingExpansion {
    generation: u64,
    center: LngLat,
    cluster_id: u64,
}

/// Issues expansion-zoom lookups and eases the camera when they resolve.
///
/// Every lookup is tagged with the generation current when it was issued;
/// `invalidate` (called on each applied reconcile) makes older lookups stale.
#[derive(Default)]
pub struct ClusterController {
    generation: u64,
    pending: HashMap<RequestId, PendingExpansion>,
}

impl ClusterController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ask the host for the zoom at which `cluster` splits apart
    pub fn expand<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        source_id: &str,
        cluster: &RenderedFeature,
    ) -> Option<RequestId> {
        let Some(cluster_id) = cluster.cluster_id() else {
            warn!(layer = %cluster.layer_id, "clicked cluster has no cluster id");
            return None;
        };
        let request = host.request_cluster_expansion_zoom(source_id, cluster_id);
        debug!(cluster_id, request = request.0, points = ?cluster.point_count(), "expansion requested");
        self.pending.insert(
            request,
            PendingExpansion {
                generation: self.generation,
                center: cluster.coordinate,
                cluster_id,
            },
        );
        Some(request)
    }

    /// Apply a lookup result. Stale or failed lookups change nothing.
    pub fn resolve<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        request: RequestId,
        result: Result<f64, HostError>,
    ) -> Option<CameraTarget> {
        let Some(pending) = self.pending.remove(&request) else {
            debug!(request = request.0, "dropping unknown or stale expansion result");
            return None;
        };
        if pending.generation != self.generation {
            debug!(request = request.0, "dropping stale expansion result");
            return None;
        }

        match result {
            Ok(zoom) => {
                let target = CameraTarget {
                    center: pending.center,
                    zoom,
                };
                debug!(cluster_id = pending.cluster_id, zoom, "easing to cluster");
                host.ease_to(target);
                Some(target)
            }
            Err(e) => {
                let error = MapError::ClusterExpansion(format!("cluster {}: {e}", pending.cluster_id));
                warn!(%error, "cluster expansion ignored");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StyleConfig, ViewState};
    use crate::data::{Category, Feature, FeatureCollection};
    use crate::engine::Engine;
    use crate::host::{Container, GeoJsonSource, HostEvent};

    fn clustered_host() -> Engine {
        let view = ViewState {
            center: LngLat::new(9.18, 48.78),
            zoom: 10.0,
            ..ViewState::default()
        };
        let mut host = Engine::new(&Container::new("map", 800, 600), &StyleConfig::default(), &view).unwrap();
        host.poll_events();

        let features = FeatureCollection::new(vec![
            Feature::new("a", "A", "", Category::Station, "", LngLat::new(9.1800, 48.7800)),
            Feature::new("b", "B", "", Category::Station, "", LngLat::new(9.1815, 48.7805)),
        ])
        .unwrap();
        host.add_source(
            "s",
            GeoJsonSource {
                data: features.to_geojson(),
                cluster: true,
                cluster_radius: 50,
                cluster_max_zoom: 14,
            },
        )
        .unwrap();
        host.add_layer(cluster_layer("s")).unwrap();
        host
    }

    fn expansion_result(host: &mut Engine) -> (RequestId, Result<f64, HostError>) {
        host.poll_events()
            .into_iter()
            .find_map(|e| match e {
                HostEvent::ClusterExpansionZoom { request, result } => Some((request, result)),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_cluster_paint_steps() {
        let layer = cluster_layer("police-stations");
        assert_eq!(layer.id, "police-stations-clusters");
        let props = |n: u64| {
            let mut p = geojson::JsonObject::new();
            p.insert(POINT_COUNT.into(), n.into());
            p
        };
        assert_eq!(layer.paint.radius.evaluate_f64(&props(2)), Some(20.0));
        assert_eq!(layer.paint.radius.evaluate_f64(&props(5)), Some(25.0));
        assert_eq!(layer.paint.color.evaluate(&props(12)), "#1e40af");
        assert!(layer.matches(&props(2)));
    }

    #[test]
    fn test_expansion_eases_closer() {
        let mut host = clustered_host();
        let mut controller = ClusterController::new();
        let cluster = host.query_rendered_features(None, &["s-clusters"]).remove(0);
        assert_eq!(cluster.point_count(), Some(2));

        controller.expand(&mut host, "s", &cluster).unwrap();
        let (request, result) = expansion_result(&mut host);
        let target = controller.resolve(&mut host, request, result).unwrap();

        assert!(target.zoom > 10.0);
        assert_eq!(host.camera().zoom, target.zoom);
        assert_eq!(host.camera().center, cluster.coordinate);
    }

    #[test]
    fn test_stale_expansion_is_dropped() {
        let mut host = clustered_host();
        let mut controller = ClusterController::new();
        let cluster = host.query_rendered_features(None, &["s-clusters"]).remove(0);

        controller.expand(&mut host, "s", &cluster).unwrap();
        controller.invalidate();
        let (request, result) = expansion_result(&mut host);

        assert_eq!(controller.resolve(&mut host, request, result), None);
        assert_eq!(host.camera().zoom, 10.0);
    }

    #[test]
    fn test_failed_lookup_changes_nothing() {
        let mut host = clustered_host();
        let mut controller = ClusterController::new();
        let mut cluster = host.query_rendered_features(None, &["s-clusters"]).remove(0);
        cluster.properties.insert("cluster_id".into(), 999_999u64.into());

        controller.expand(&mut host, "s", &cluster).unwrap();
        let (request, result) = expansion_result(&mut host);
        assert!(result.is_err());
        assert_eq!(controller.resolve(&mut host, request, result), None);
        assert_eq!(host.camera().zoom, 10.0);
        assert_eq!(controller.pending_count(), 0);
    }
}
