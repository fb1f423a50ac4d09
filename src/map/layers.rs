//! Source and layer reconciliation against a host.
//!
//! The manager keeps its own record of what it registered (source id to
//! layer ids plus a fingerprint of the inputs) and diffs the desired state
//! against that record instead of probing the host.

use super::clustering::{cluster_layer, RenderMode};
use crate::config::ClusterOptions;
use crate::data::FeatureCollection;
use crate::error::{HostError, MapError};
use crate::hash::{hash2, hash3};
use crate::host::{CircleLayer, CirclePaint, Expr, GeoJsonSource, MapHost, POINT_COUNT};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const DEFAULT_SOURCE_ID: &str = "police-stations";

pub const HEADQUARTERS_COLOR: &str = "#DC2626";
pub const STATION_COLOR: &str = "#2563EB";
pub const HEADQUARTERS_RADIUS: f64 = 12.0;
pub const STATION_RADIUS: f64 = 8.0;

pub fn leaf_layer_id(source_id: &str) -> String {
    format!("{source_id}-circles")
}

pub fn cluster_layer_id(source_id: &str) -> String {
    format!("{source_id}-clusters")
}

/// What is registered on the host for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRegistration {
    pub source_id: String,
    /// Drawing order, bottom first
    pub layer_ids: Vec<String>,
    pub clustering_enabled: bool,
    pub fingerprint: u64,
}

impl LayerRegistration {
    pub fn leaf_layer_id(&self) -> Option<&str> {
        let id = leaf_layer_id(&self.source_id);
        self.layer_ids.iter().find(|l| **l == id).map(String::as_str)
    }

    pub fn cluster_layer_id(&self) -> Option<&str> {
        let id = cluster_layer_id(&self.source_id);
        self.layer_ids.iter().find(|l| **l == id).map(String::as_str)
    }

    pub fn render_mode(&self) -> RenderMode {
        if self.clustering_enabled {
            RenderMode::Clustered
        } else {
            RenderMode::Leaves
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Inputs matched the current registration, the host was not touched
    Unchanged(LayerRegistration),
    Applied(LayerRegistration),
}

impl ReconcileOutcome {
    pub fn registration(&self) -> &LayerRegistration {
        match self {
            ReconcileOutcome::Unchanged(r) | ReconcileOutcome::Applied(r) => r,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Circle layer for individual facilities, styled by category
pub fn leaf_layer(source_id: &str) -> CircleLayer {
    let is_headquarters = || Expr::eq(Expr::get("category"), Expr::literal("headquarters"));
    CircleLayer {
        id: leaf_layer_id(source_id),
        source: source_id.to_string(),
        filter: Some(Expr::not(Expr::has(POINT_COUNT))),
        paint: CirclePaint {
            radius: Expr::case(
                vec![(is_headquarters(), Expr::literal(HEADQUARTERS_RADIUS))],
                Expr::literal(STATION_RADIUS),
            ),
            color: Expr::case(
                vec![(is_headquarters(), Expr::literal(HEADQUARTERS_COLOR))],
                Expr::literal(STATION_COLOR),
            ),
            stroke_width: 2.0,
            stroke_color: "#ffffff".into(),
        },
    }
}

fn input_fingerprint(features: &FeatureCollection, options: &ClusterOptions) -> u64 {
    hash3(
        features.fingerprint(),
        options.enabled as u64,
        hash2(options.radius as u64, options.max_zoom as u64),
    )
}

pub struct LayerManager {
    source_id: String,
    registrations: HashMap<String, LayerRegistration>,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_ID)
    }
}

impl LayerManager {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            registrations: HashMap::new(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn registration(&self) -> Option<&LayerRegistration> {
        self.registrations.get(&self.source_id)
    }

    pub fn registered_count(&self) -> usize {
        self.registrations.len()
    }

    /// True when `reconcile` with these inputs would touch the host
    pub fn needs_apply<H: MapHost + ?Sized>(
        &self,
        host: &H,
        features: &FeatureCollection,
        options: &ClusterOptions,
    ) -> bool {
        match self.registration() {
            Some(reg) => {
                reg.fingerprint != input_fingerprint(features, options)
                    || !host.has_source(&reg.source_id)
                    || reg.layer_ids.iter().any(|id| !host.has_layer(id))
            }
            None => true,
        }
    }

    /// Bring the host in line with `features` and `options`.
    ///
    /// Removes the current registration (layers, then source), creates the
    /// source and its layers, and on a creation failure clears everything
    /// and tries once more.
    pub fn reconcile<H: MapHost + ?Sized>(
        &mut self,
        host: &mut H,
        features: &FeatureCollection,
        options: &ClusterOptions,
    ) -> Result<ReconcileOutcome, MapError> {
        if !self.needs_apply(host, features, options) {
            if let Some(reg) = self.registration() {
                debug!(source = %reg.source_id, "reconcile unchanged");
                return Ok(ReconcileOutcome::Unchanged(reg.clone()));
            }
        }

        if let Some(previous) = self.registrations.remove(&self.source_id) {
            self.remove(host, &previous.layer_ids)?;
        }

        let fingerprint = input_fingerprint(features, options);
        let registration = match self.create(host, features, options, fingerprint) {
            Ok(reg) => reg,
            Err(first) => {
                warn!(source = %self.source_id, error = %first, "layer registration failed, retrying");
                let all = [leaf_layer_id(&self.source_id), cluster_layer_id(&self.source_id)];
                self.remove(host, &all)?;
                match self.create(host, features, options, fingerprint) {
                    Ok(reg) => reg,
                    Err(second) => {
                        // Leave nothing half-registered behind
                        if let Err(e) = self.remove(host, &all) {
                            warn!(source = %self.source_id, error = %e, "cleanup after failed retry");
                        }
                        return Err(MapError::LayerRegistration {
                            source_id: self.source_id.clone(),
                            reason: second.to_string(),
                        });
                    }
                }
            }
        };

        info!(
            source = %registration.source_id,
            features = features.len(),
            clustering = registration.clustering_enabled,
            layers = registration.layer_ids.len(),
            "layers registered"
        );
        self.registrations
            .insert(registration.source_id.clone(), registration.clone());
        Ok(ReconcileOutcome::Applied(registration))
    }

    fn create<H: MapHost + ?Sized>(
        &self,
        host: &mut H,
        features: &FeatureCollection,
        options: &ClusterOptions,
        fingerprint: u64,
    ) -> Result<LayerRegistration, HostError> {
        let mode = RenderMode::from_options(options);
        host.add_source(
            &self.source_id,
            GeoJsonSource {
                data: features.to_geojson(),
                cluster: mode == RenderMode::Clustered,
                cluster_radius: options.radius,
                cluster_max_zoom: options.max_zoom,
            },
        )?;

        let mut layer_ids = Vec::with_capacity(2);
        let leaf = leaf_layer(&self.source_id);
        layer_ids.push(leaf.id.clone());
        host.add_layer(leaf)?;

        if mode == RenderMode::Clustered {
            let clusters = cluster_layer(&self.source_id);
            layer_ids.push(clusters.id.clone());
            host.add_layer(clusters)?;
        }

        Ok(LayerRegistration {
            source_id: self.source_id.clone(),
            layer_ids,
            clustering_enabled: mode == RenderMode::Clustered,
            fingerprint,
        })
    }

    /// Remove `layer_ids` (topmost first) and then the source. Missing
    /// entries are skipped; a source still used by another layer is an error.
    fn remove<H: MapHost + ?Sized>(&self, host: &mut H, layer_ids: &[String]) -> Result<(), MapError> {
        for id in layer_ids.iter().rev() {
            match host.remove_layer(id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => debug!(layer = %id, "layer already gone"),
                Err(e) => warn!(layer = %id, error = %e, "layer removal failed"),
            }
        }

        match host.remove_source(&self.source_id) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(source = %self.source_id, "source already gone");
                Ok(())
            }
            Err(e) => Err(MapError::LayerRegistration {
                source_id: self.source_id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Remove every tracked registration from the host; never fails
    pub fn teardown<H: MapHost + ?Sized>(&mut self, host: &mut H) {
        let registrations: Vec<_> = self.registrations.drain().collect();
        for (source_id, registration) in registrations {
            if let Err(e) = self.remove(host, &registration.layer_ids) {
                warn!(source = %source_id, error = %e, "teardown left the source registered");
            }
        }
    }

    /// Drop the record without touching a host (host already released)
    pub fn forget(&mut self) {
        self.registrations.clear();
    }
}
