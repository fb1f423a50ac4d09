use super::geometry::{draw_circle, draw_ring};
use super::Engine;
use crate::braille::BrailleCanvas;
use crate::host::parse_hex_color;

/// Screen pixels covered by one Braille dot (a character cell is 8x16 px)
pub const PIXELS_PER_DOT: f64 = 4.0;
pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

/// One color of the frame; cells later in the list draw over earlier ones
pub struct ColorLayer {
    pub color: [u8; 3],
    pub canvas: BrailleCanvas,
}

/// A rasterized frame
pub struct Frame {
    pub layers: Vec<ColorLayer>,
    /// (column, row, text) overlays such as cluster counts
    pub labels: Vec<(u16, u16, String)>,
}

impl Frame {
    fn canvas_for(&mut self, color: [u8; 3], cols: usize, rows: usize) -> &mut BrailleCanvas {
        let idx = match self.layers.iter().position(|l| l.color == color) {
            Some(idx) => idx,
            None => {
                self.layers.push(ColorLayer {
                    color,
                    canvas: BrailleCanvas::new(cols, rows),
                });
                self.layers.len() - 1
            }
        };
        &mut self.layers[idx].canvas
    }

    pub fn is_blank(&self) -> bool {
        self.layers.iter().all(|l| l.canvas.is_blank()) && self.labels.is_empty()
    }
}

/// Pixel length to dots, never below one dot
fn dots(px: f64) -> i32 {
    (px / PIXELS_PER_DOT).round().max(1.0) as i32
}

pub(super) fn render(engine: &Engine, cols: usize, rows: usize) -> Frame {
    let mut frame = Frame {
        layers: Vec::new(),
        labels: Vec::new(),
    };

    for layer in engine.layers() {
        for drawn in engine.draw_layer(layer) {
            let cx = (drawn.screen.x / PIXELS_PER_DOT).round() as i32;
            let cy = (drawn.screen.y / PIXELS_PER_DOT).round() as i32;
            let radius = dots(drawn.radius);

            let fill = parse_hex_color(&drawn.fill).unwrap_or([0, 0, 0]);
            draw_circle(frame.canvas_for(fill, cols, rows), cx, cy, radius);

            if drawn.stroke_width > 0.0 {
                let stroke = parse_hex_color(&drawn.stroke).unwrap_or([255, 255, 255]);
                let outer = radius + dots(drawn.stroke_width);
                draw_ring(frame.canvas_for(stroke, cols, rows), cx, cy, radius, outer);
            }

            if let Some(label) = drawn.label {
                let col = (cx / 2) as i64 - (label.chars().count() as i64 / 2);
                let row = (cy / 4) as i64;
                if col >= 0 && row >= 0 && (row as usize) < rows {
                    frame.labels.push((col as u16, row as u16, label));
                }
            }
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterOptions, StyleConfig, ViewState};
    use crate::data::FeatureCollection;
    use crate::geo::LngLat;
    use crate::host::{CircleLayer, CirclePaint, Container, Expr, GeoJsonSource, MapHost};

    fn engine(cluster: bool, zoom: f64) -> Engine {
        let view = ViewState {
            center: LngLat::new(9.1829, 48.7758),
            zoom,
            ..ViewState::default()
        };
        let container = Container::new("map", 80 * CELL_WIDTH_PX, 24 * CELL_HEIGHT_PX);
        let mut engine = Engine::new(&container, &StyleConfig::default(), &view).unwrap();
        engine.poll_events();
        let options = ClusterOptions::default();
        engine
            .add_source(
                "s",
                GeoJsonSource {
                    data: FeatureCollection::stuttgart().to_geojson(),
                    cluster,
                    cluster_radius: options.radius,
                    cluster_max_zoom: options.max_zoom,
                },
            )
            .unwrap();
        engine
            .add_layer(CircleLayer {
                id: "l".into(),
                source: "s".into(),
                filter: None,
                paint: CirclePaint {
                    radius: Expr::literal(8),
                    color: Expr::literal("#2563EB"),
                    stroke_width: 2.0,
                    stroke_color: "#ffffff".into(),
                },
            })
            .unwrap();
        engine
    }

    #[test]
    fn test_points_render_fill_and_stroke() {
        let frame = engine(false, 11.0).render(80, 24);
        let colors: Vec<_> = frame.layers.iter().map(|l| l.color).collect();
        assert_eq!(colors, vec![[0x25, 0x63, 0xEB], [255, 255, 255]]);
        assert!(frame.layers.iter().all(|l| !l.canvas.is_blank()));
        assert!(frame.labels.is_empty());
    }

    #[test]
    fn test_clusters_get_count_labels() {
        let frame = engine(true, 3.0).render(80, 24);
        assert_eq!(frame.labels.len(), 1);
        assert_eq!(frame.labels[0].2, "9");
    }

    #[test]
    fn test_empty_map_renders_blank() {
        let mut engine = engine(false, 11.0);
        engine.remove_layer("l").unwrap();
        assert!(engine.render(80, 24).is_blank());
    }
}
