//! Feature store: the immutable set of police facilities rendered on the map.

use crate::error::MapError;
use crate::geo::LngLat;
use crate::hash::{hash2, hash_str};
use geojson::feature::Id;
use geojson::{GeoJson, Geometry, JsonObject, JsonValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Kind of police facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Headquarters,
    Station,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Headquarters => "headquarters",
            Category::Station => "station",
        }
    }

    /// Parse a category value, accepting the German labels found in older datasets
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "headquarters" | "präsidium" | "praesidium" | "hauptwache" => Some(Category::Headquarters),
            "station" | "revier" => Some(Category::Station),
            _ => None,
        }
    }
}

/// One geolocated police facility
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: String,
    name: String,
    address: String,
    category: Category,
    phone: String,
    coordinate: LngLat,
}

impl Feature {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        category: Category,
        phone: impl Into<String>,
        coordinate: LngLat,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            category,
            phone: phone.into(),
            coordinate,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn coordinate(&self) -> LngLat {
        self.coordinate
    }

    /// GeoJSON properties as the host sees them
    pub fn properties(&self) -> JsonObject {
        let mut props = JsonObject::new();
        props.insert("id".into(), JsonValue::from(self.id.clone()));
        props.insert("name".into(), JsonValue::from(self.name.clone()));
        props.insert("address".into(), JsonValue::from(self.address.clone()));
        props.insert("category".into(), JsonValue::from(self.category.as_str()));
        props.insert("phone".into(), JsonValue::from(self.phone.clone()));
        props
    }

    fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.coordinate.lon,
                self.coordinate.lat,
            ]))),
            id: Some(Id::String(self.id.clone())),
            properties: Some(self.properties()),
            foreign_members: None,
        }
    }

    fn from_geojson(feature: &geojson::Feature) -> Result<Self, MapError> {
        let props = feature.properties.as_ref();
        let text = |key: &str| {
            props
                .and_then(|p| p.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        // Property id wins over the feature id
        let id = text("id")
            .or_else(|| match &feature.id {
                Some(Id::String(s)) => Some(s.clone()),
                Some(Id::Number(n)) => Some(n.to_string()),
                None => None,
            })
            .ok_or_else(|| MapError::InvalidFeatures("feature without id".into()))?;

        let name = text("name")
            .ok_or_else(|| MapError::InvalidFeatures(format!("feature '{id}' has no name")))?;

        let category = text("category")
            .or_else(|| text("type"))
            .and_then(|v| Category::parse(&v))
            .unwrap_or(Category::Station);

        let coordinate = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(coords)) if coords.len() >= 2 => LngLat::new(coords[0], coords[1]),
            _ => {
                return Err(MapError::InvalidFeatures(format!(
                    "feature '{id}' is not a point"
                )))
            }
        };
        if !coordinate.is_valid() {
            return Err(MapError::InvalidFeatures(format!(
                "feature '{id}' has coordinates out of range"
            )));
        }

        Ok(Self {
            name,
            address: text("address").unwrap_or_default(),
            category,
            phone: text("phone").unwrap_or_default(),
            coordinate,
            id,
        })
    }
}

/// Immutable, id-indexed collection of features. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    features: Arc<Vec<Feature>>,
    index: Arc<HashMap<String, usize>>,
}

impl FeatureCollection {
    /// Build a collection, rejecting duplicate ids
    pub fn new(features: Vec<Feature>) -> Result<Self, MapError> {
        let mut index = HashMap::with_capacity(features.len());
        for (i, feature) in features.iter().enumerate() {
            if index.insert(feature.id.clone(), i).is_some() {
                return Err(MapError::InvalidFeatures(format!(
                    "duplicate feature id '{}'",
                    feature.id
                )));
            }
        }
        Ok(Self {
            features: Arc::new(features),
            index: Arc::new(index),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.index.get(id).map(|&i| &self.features[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of features of a category (legend counts)
    pub fn count(&self, category: Category) -> usize {
        self.features.iter().filter(|f| f.category == category).count()
    }

    /// Content hash used to detect unchanged data between reconciliations
    pub fn fingerprint(&self) -> u64 {
        self.features.iter().fold(hash2(0, self.len() as u64), |h, f| {
            let h = hash_str(h, &f.id);
            let h = hash_str(h, &f.name);
            let h = hash_str(h, &f.address);
            let h = hash_str(h, f.category.as_str());
            let h = hash_str(h, &f.phone);
            hash2(hash2(h, f.coordinate.lon.to_bits()), f.coordinate.lat.to_bits())
        })
    }

    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(Feature::to_geojson).collect(),
            foreign_members: None,
        }
    }

    pub fn from_geojson(geojson: &GeoJson) -> Result<Self, MapError> {
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc
                .features
                .iter()
                .map(Feature::from_geojson)
                .collect::<Result<Vec<_>, _>>()?,
            GeoJson::Feature(f) => vec![Feature::from_geojson(f)?],
            GeoJson::Geometry(_) => {
                return Err(MapError::InvalidFeatures(
                    "expected a FeatureCollection, got a bare geometry".into(),
                ))
            }
        };
        Self::new(features)
    }

    /// Load features from a GeoJSON file
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let content = fs::read_to_string(path).map_err(|e| {
            MapError::InvalidFeatures(format!("cannot read {}: {e}", path.display()))
        })?;
        let geojson: GeoJson = content.parse().map_err(|e| {
            MapError::InvalidFeatures(format!("cannot parse {}: {e}", path.display()))
        })?;
        let collection = Self::from_geojson(&geojson)?;
        debug!(path = %path.display(), features = collection.len(), "loaded feature file");
        Ok(collection)
    }

    /// Police headquarters and the eight precincts of Stuttgart
    pub fn stuttgart() -> Self {
        let hq = |id, name, address, phone, lon, lat| {
            Feature::new(id, name, address, Category::Headquarters, phone, LngLat::new(lon, lat))
        };
        let station = |id, name, address, phone, lon, lat| {
            Feature::new(id, name, address, Category::Station, phone, LngLat::new(lon, lat))
        };

        let features = vec![
            hq("pp-stuttgart", "Polizeipräsidium Stuttgart", "Hahnemannstraße 1, 70191 Stuttgart", "0711 8990-0", 9.18686, 48.81046),
            station("pr-stuttgart-1", "Polizeirevier 1 Theodor-Heuss-Straße", "Theodor-Heuss-Straße 11, 70174 Stuttgart", "0711 8990-3100", 9.174450, 48.776927),
            station("pr-stuttgart-2", "Polizeirevier 2 Wolframstraße", "Wolframstraße 36, 70191 Stuttgart", "0711 8990-3200", 9.183011, 48.792233),
            station("pr-stuttgart-3", "Polizeirevier 3 Gutenbergstraße", "Gutenbergstraße 109/111, 70197 Stuttgart", "0711 8990-3300", 9.153933, 48.770066),
            station("pr-stuttgart-4", "Polizeirevier 4 Balinger Straße", "Balinger Straße 31, 70567 Stuttgart", "0711 8990-3400", 9.142720, 48.729910),
            station("pr-stuttgart-5", "Polizeirevier 5 Ostendstraße", "Ostendstraße 88, 70188 Stuttgart", "0711 8990-3500", 9.207963, 48.783734),
            station("pr-stuttgart-6", "Polizeirevier 6 Martin-Luther-Straße", "Martin-Luther-Straße 40/42, 70372 Stuttgart", "0711 8990-3600", 9.224090, 48.805090),
            station("pr-stuttgart-7", "Polizeirevier 7 Ludwigsburger Straße", "Ludwigsburger Straße 126, 70435 Stuttgart", "0711 8990-3700", 9.174645, 48.831760),
            station("pr-stuttgart-8", "Polizeirevier 8 Kärntner Straße", "Kärntner Straße 18, 70469 Stuttgart", "0711 8990-3800", 9.160630, 48.813125),
        ];

        // Ids above are unique
        Self::new(features).unwrap_or_default()
    }
}
