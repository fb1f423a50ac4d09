use crate::app::App;
use geopol_map::engine::renderer::CELL_WIDTH_PX;
use geopol_map::engine::Frame as MapFrame;
use geopol_map::host::{Cursor, Overlay};
use geopol_map::{Category, LoadState};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_status_bar(frame, app, chunks[1]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Polizei Stuttgart ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    match app.view.load_state() {
        LoadState::Ready => {}
        LoadState::Error(reason) => {
            render_banner(frame, inner, "Karte konnte nicht geladen werden", reason, Color::Red);
            return;
        }
        LoadState::Idle | LoadState::Loading => {
            render_banner(frame, inner, "Karte wird geladen…", "", Color::Yellow);
            return;
        }
    }
    let Some(engine) = app.engine() else {
        return;
    };

    let map_widget = MapWidget {
        frame: engine.render(inner.width as usize, inner.height as usize),
        cursor_pos: app
            .mouse_cell()
            .filter(|&(cx, cy)| cx < inner.width && cy < inner.height),
        pointer: engine.cursor() == Cursor::Pointer,
    };
    frame.render_widget(map_widget, inner);

    render_legend(frame, app, inner);
    if let Some(attribution) = engine.attribution().filter(|_| inner.height > 0) {
        let width = (attribution.chars().count() as u16).min(inner.width);
        let rect = Rect::new(inner.right() - width, inner.bottom().saturating_sub(1), width, 1);
        frame.render_widget(
            Paragraph::new(attribution).style(Style::default().fg(Color::DarkGray)),
            rect,
        );
    }
    if let Some(overlay) = app.view.overlay() {
        render_popup(frame, overlay, inner);
    }
}

/// Braille map with cluster counts and the cursor marker on top
struct MapWidget {
    frame: MapFrame,
    cursor_pos: Option<(u16, u16)>,
    pointer: bool,
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front, later layers overwrite shared cells
        for layer in &self.frame.layers {
            let [r, g, b] = layer.color;
            for (col, row, ch) in layer.canvas.cells() {
                if col >= area.width as usize || row >= area.height as usize {
                    continue;
                }
                let (x, y) = (area.x + col as u16, area.y + row as u16);
                buf[(x, y)].set_char(ch).set_fg(Color::Rgb(r, g, b));
            }
        }

        let label_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
        for (lx, ly, text) in &self.frame.labels {
            if *ly >= area.height || *lx >= area.width {
                continue;
            }
            let max_len = area.width.saturating_sub(*lx) as usize;
            for (i, ch) in text.chars().take(max_len).enumerate() {
                buf[(area.x + *lx + i as u16, area.y + *ly)]
                    .set_char(ch)
                    .set_style(label_style);
            }
        }

        if let Some((cx, cy)) = self.cursor_pos {
            let (glyph, color) = if self.pointer { ('◉', Color::Yellow) } else { ('╋', Color::Red) };
            buf[(area.x + cx, area.y + cy)].set_char(glyph).set_fg(color);
        }
    }
}

fn render_banner(frame: &mut Frame, area: Rect, title: &str, detail: &str, color: Color) {
    let mut lines = vec![Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];
    if !detail.is_empty() {
        lines.push(Line::from(Span::styled(detail.to_string(), Style::default().fg(Color::Gray))));
        lines.push(Line::from(Span::styled(
            "r: neu laden",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let height = (lines.len() as u16).min(area.height);
    let rect = Rect::new(area.x, area.y + area.height.saturating_sub(height) / 2, area.width, height);
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }),
        rect,
    );
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let features = app.view.features();
    let lines = vec![
        Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Rgb(0xDC, 0x26, 0x26))),
            Span::raw(format!("Präsidium ({})", features.count(Category::Headquarters))),
        ]),
        Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Rgb(0x25, 0x63, 0xEB))),
            Span::raw(format!("Reviere ({})", features.count(Category::Station))),
        ]),
    ];
    if area.width < 20 || area.height < 4 {
        return;
    }
    let rect = Rect::new(area.x, area.y, 18, 2);
    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines), rect);
}

fn render_popup(frame: &mut Frame, overlay: &Overlay, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            format!("{} {}", overlay.icon, overlay.heading),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(overlay.address.clone()),
        Line::from(vec![
            Span::raw("☎ "),
            Span::styled(overlay.phone.label.clone(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(Span::styled(
            format!("➜ {}", overlay.route.label),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(Span::styled(
            overlay.route.href.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let width = (overlay.max_width / CELL_WIDTH_PX as u16).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let rect = Rect::new(area.right() - width, area.y, width, height);
    let title = if overlay.close_button { " Esc ✕ " } else { "" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(Span::styled(title, Style::default().fg(Color::DarkGray)));

    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        rect,
    );
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let clustering = app.view.cluster_options().enabled;
    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.scale_label(), Style::default().fg(Color::Magenta)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            if clustering { "[C]luster " } else { "[c]luster " },
            Style::default().fg(if clustering { Color::Green } else { Color::DarkGray }),
        ),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(" | ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(notice.clone(), Style::default().fg(Color::White)));
    }
    spans.push(Span::styled(
        " | hjkl:pan +/-:zoom click:select esc:close r:reload q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
