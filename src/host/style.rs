//! Source and layer specifications plus the paint expression language the
//! host evaluates per feature.

use geojson::{JsonObject, JsonValue};

/// Data-driven expression evaluated against a feature's properties
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(JsonValue),
    Get(String),
    Has(String),
    Not(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    /// First branch whose condition is true, else the fallback
    Case {
        branches: Vec<(Expr, Expr)>,
        fallback: Box<Expr>,
    },
    /// `base` below the first stop, otherwise the output of the last stop <= input
    Step {
        input: Box<Expr>,
        base: Box<Expr>,
        stops: Vec<(f64, Expr)>,
    },
}

impl Expr {
    pub fn literal(value: impl Into<JsonValue>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn get(key: &str) -> Self {
        Expr::Get(key.to_string())
    }

    pub fn has(key: &str) -> Self {
        Expr::Has(key.to_string())
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn eq(a: Expr, b: Expr) -> Self {
        Expr::Eq(Box::new(a), Box::new(b))
    }

    pub fn case(branches: Vec<(Expr, Expr)>, fallback: Expr) -> Self {
        Expr::Case {
            branches,
            fallback: Box::new(fallback),
        }
    }

    pub fn step(input: Expr, base: Expr, stops: Vec<(f64, Expr)>) -> Self {
        Expr::Step {
            input: Box::new(input),
            base: Box::new(base),
            stops,
        }
    }

    pub fn evaluate(&self, props: &JsonObject) -> JsonValue {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Get(key) => props.get(key).cloned().unwrap_or(JsonValue::Null),
            Expr::Has(key) => JsonValue::Bool(props.contains_key(key)),
            Expr::Not(inner) => JsonValue::Bool(!inner.evaluate_bool(props)),
            Expr::Eq(a, b) => JsonValue::Bool(a.evaluate(props) == b.evaluate(props)),
            Expr::Case { branches, fallback } => branches
                .iter()
                .find(|(cond, _)| cond.evaluate_bool(props))
                .map(|(_, out)| out.evaluate(props))
                .unwrap_or_else(|| fallback.evaluate(props)),
            Expr::Step { input, base, stops } => {
                let Some(x) = input.evaluate(props).as_f64() else {
                    return base.evaluate(props);
                };
                stops
                    .iter()
                    .take_while(|(stop, _)| *stop <= x)
                    .last()
                    .map(|(_, out)| out.evaluate(props))
                    .unwrap_or_else(|| base.evaluate(props))
            }
        }
    }

    pub fn evaluate_bool(&self, props: &JsonObject) -> bool {
        self.evaluate(props).as_bool().unwrap_or(false)
    }

    pub fn evaluate_f64(&self, props: &JsonObject) -> Option<f64> {
        self.evaluate(props).as_f64()
    }

    /// Expression in array notation, e.g. `["step", ["get", "point_count"], ...]`
    pub fn to_json(&self) -> JsonValue {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Get(key) => serde_json::json!(["get", key]),
            Expr::Has(key) => serde_json::json!(["has", key]),
            Expr::Not(inner) => serde_json::json!(["!", inner.to_json()]),
            Expr::Eq(a, b) => serde_json::json!(["==", a.to_json(), b.to_json()]),
            Expr::Case { branches, fallback } => {
                let mut out = vec![JsonValue::from("case")];
                for (cond, value) in branches {
                    out.push(cond.to_json());
                    out.push(value.to_json());
                }
                out.push(fallback.to_json());
                JsonValue::Array(out)
            }
            Expr::Step { input, base, stops } => {
                let mut out = vec![JsonValue::from("step"), input.to_json(), base.to_json()];
                for (stop, value) in stops {
                    out.push(JsonValue::from(*stop));
                    out.push(value.to_json());
                }
                JsonValue::Array(out)
            }
        }
    }
}

/// Paint properties of a circle layer
#[derive(Debug, Clone, PartialEq)]
pub struct CirclePaint {
    /// Radius in screen pixels
    pub radius: Expr,
    /// `#rrggbb` color
    pub color: Expr,
    pub stroke_width: f64,
    pub stroke_color: String,
}

/// A circle layer drawing the points of one source
#[derive(Debug, Clone, PartialEq)]
pub struct CircleLayer {
    pub id: String,
    pub source: String,
    pub filter: Option<Expr>,
    pub paint: CirclePaint,
}

impl CircleLayer {
    pub fn matches(&self, props: &JsonObject) -> bool {
        self.filter.as_ref().map_or(true, |f| f.evaluate_bool(props))
    }
}

/// A GeoJSON point source, optionally clustered by the host
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonSource {
    pub data: geojson::FeatureCollection,
    pub cluster: bool,
    pub cluster_radius: u32,
    pub cluster_max_zoom: u8,
}

/// Parse `#rrggbb` (case-insensitive) into RGB
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
