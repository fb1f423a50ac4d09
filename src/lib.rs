//! Police facility map: layer lifecycle, clustering and interaction on top of
//! a host rendering engine, plus a terminal engine that draws with Braille.

pub mod braille;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod geo;
pub mod hash;
pub mod host;
pub mod logging;
pub mod map;

pub use config::{ClusterOptions, MapConfig, StyleConfig, ViewState};
pub use data::{Category, Feature, FeatureCollection};
pub use error::{HostError, MapError};
pub use geo::LngLat;
pub use map::{LoadState, MapView, ViewEvent};
