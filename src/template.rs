//! Builds the dashboard SVG document from a `RenderedView`.
//!
//! This is the only consumer of the view's fields; everything the layout
//! needs is resolved before it gets here, so this module is pure string
//! assembly. The rasterizer in `render.rs` turns the result into pixels.

use std::fmt::Write;

use crate::constants::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::view::RenderedView;

// Layout bands, in viewport pixels (landscape; rotated later for the panel).
const MARGIN: f64 = 48.0;
const HEADER_Y: f64 = 96.0;
const CURRENT_Y: f64 = 330.0;
const STRIP_TOP: f64 = 470.0;
const GRAPH_TOP: f64 = 560.0;
const GRAPH_BOTTOM: f64 = 780.0;
const STRIP_TEMP_Y: f64 = 830.0;
const STRIP_POP_Y: f64 = 872.0;
const ZONES_Y: f64 = 980.0;

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn text(svg: &mut String, x: f64, y: f64, size: u32, anchor: &str, body: &str) {
    let _ = writeln!(
        svg,
        r#"<text x="{x:.0}" y="{y:.0}" font-family="sans-serif" font-size="{size}" text-anchor="{anchor}" fill="black">{}</text>"#,
        xml_escape(body)
    );
}

fn dim_text(svg: &mut String, x: f64, y: f64, size: u32, anchor: &str, body: &str) {
    let _ = writeln!(
        svg,
        r##"<text x="{x:.0}" y="{y:.0}" font-family="sans-serif" font-size="{size}" text-anchor="{anchor}" fill="#555555">{}</text>"##,
        xml_escape(body)
    );
}

/// Sun by day, moon by night, drawn with primitives so no glyph fonts are
/// required on the device building the image.
fn sky_marker(svg: &mut String, x: f64, y: f64, r: f64, dark: bool) {
    if dark {
        let _ = writeln!(
            svg,
            r#"<circle cx="{x:.0}" cy="{y:.0}" r="{r:.0}" fill="black"/><circle cx="{:.0}" cy="{:.0}" r="{r:.0}" fill="white"/>"#,
            x + r * 0.6,
            y - r * 0.3,
        );
    } else {
        let _ = writeln!(
            svg,
            r#"<circle cx="{x:.0}" cy="{y:.0}" r="{r:.0}" fill="none" stroke="black" stroke-width="4"/>"#
        );
    }
}

fn forecast_strip(svg: &mut String, view: &RenderedView) {
    if view.forecast.is_empty() {
        dim_text(
            svg,
            VIEWPORT_WIDTH as f64 / 2.0,
            (GRAPH_TOP + GRAPH_BOTTOM) / 2.0,
            44,
            "middle",
            "forecast unavailable",
        );
        return;
    }

    let width = VIEWPORT_WIDTH as f64 - 2.0 * MARGIN;
    let col_w = width / view.forecast.len() as f64;
    let span = view.graph_max - view.graph_min;

    let mut points = String::new();
    for (i, hour) in view.forecast.iter().enumerate() {
        let x = MARGIN + (i as f64 + 0.5) * col_w;
        let frac = ((hour.temperature - view.graph_min) / span).clamp(0.0, 1.0);
        let y = GRAPH_BOTTOM - frac * (GRAPH_BOTTOM - GRAPH_TOP);
        let _ = write!(points, "{x:.1},{y:.1} ");

        text(svg, x, STRIP_TOP, 34, "middle", &hour.hour);
        sky_marker(svg, x, STRIP_TOP + 40.0, 10.0, hour.is_dark);
        text(svg, x, STRIP_TEMP_Y, 40, "middle", &format!("{:.0}", hour.temperature));
        dim_text(
            svg,
            x,
            STRIP_POP_Y,
            30,
            "middle",
            &format!("{:.0}%", hour.precipitation_probability),
        );
        let _ = writeln!(
            svg,
            r#"<circle cx="{x:.1}" cy="{y:.1}" r="6" fill="black"/>"#
        );
    }
    let _ = writeln!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="black" stroke-width="3"/>"#,
        points.trim_end()
    );

    // Axis labels for the graph window.
    dim_text(svg, MARGIN, GRAPH_TOP - 8.0, 28, "start", &format!("{:.0}", view.graph_max));
    dim_text(svg, MARGIN, GRAPH_BOTTOM + 30.0, 28, "start", &format!("{:.0}", view.graph_min));
}

fn zones_panel(svg: &mut String, view: &RenderedView) {
    let third = (VIEWPORT_WIDTH as f64 - 2.0 * MARGIN) / 3.0;
    let panels = [
        ("Nursery", &view.nursery.current, &view.nursery.high, &view.nursery.low),
        ("Basement", &view.basement.current, &view.basement.high, &view.basement.low),
    ];
    for (i, (label, current, high, low)) in panels.iter().enumerate() {
        let x = MARGIN + i as f64 * third;
        dim_text(svg, x, ZONES_Y, 34, "start", label);
        text(svg, x, ZONES_Y + 56.0, 64, "start", &format!("{current}°"));
        dim_text(svg, x + 190.0, ZONES_Y + 56.0, 34, "start", &format!("{high} / {low}"));
    }
    let x = MARGIN + 2.0 * third;
    dim_text(svg, x, ZONES_Y, 34, "start", "Air Quality");
    text(svg, x, ZONES_Y + 56.0, 64, "start", &view.aqi);
}

/// Compose the full document. Always well-formed, whatever mix of real
/// values and placeholders the view carries.
pub fn render_svg(view: &RenderedView) -> String {
    let mut svg = String::with_capacity(8 * 1024);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{VIEWPORT_WIDTH}" height="{VIEWPORT_HEIGHT}" viewBox="0 0 {VIEWPORT_WIDTH} {VIEWPORT_HEIGHT}">"#
    );
    let _ = writeln!(
        svg,
        r#"<rect width="{VIEWPORT_WIDTH}" height="{VIEWPORT_HEIGHT}" fill="white"/>"#
    );

    // Header: date left, refresh stamp right.
    text(&mut svg, MARGIN, HEADER_Y, 56, "start", &view.current_date);
    dim_text(
        &mut svg,
        VIEWPORT_WIDTH as f64 - MARGIN,
        HEADER_Y,
        34,
        "end",
        &format!("updated {}", view.last_refreshed),
    );

    // Current conditions.
    text(&mut svg, MARGIN, CURRENT_Y, 220, "start", &format!("{}°", view.current_temp));
    text(&mut svg, MARGIN, CURRENT_Y + 80.0, 52, "start", &view.weather_description);
    dim_text(
        &mut svg,
        MARGIN,
        CURRENT_Y + 140.0,
        40,
        "start",
        &format!("High {}°  Low {}°", view.daily_temp_high, view.daily_temp_low),
    );
    sky_marker(
        &mut svg,
        VIEWPORT_WIDTH as f64 - MARGIN - 60.0,
        CURRENT_Y - 60.0,
        44.0,
        view.is_dark,
    );

    forecast_strip(&mut svg, view);
    zones_panel(&mut svg, view);

    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ForecastHour, ZoneReadout};

    fn sample_view() -> RenderedView {
        RenderedView {
            weather_description: "Partly Cloudy".into(),
            weather_code: 1101,
            current_date: "Thursday, August 6".into(),
            current_temp: "72".into(),
            is_dark: false,
            daily_temp_high: "74".into(),
            daily_temp_low: "56".into(),
            forecast: (0..12)
                .map(|i| ForecastHour {
                    hour: format!("{} PM", 1 + i % 11),
                    temperature: 60.0 + i as f64,
                    weather_code: 1100,
                    precipitation_probability: 5.0,
                    is_dark: i > 8,
                })
                .collect(),
            graph_min: 55.5,
            graph_max: 75.5,
            nursery: ZoneReadout {
                current: "68".into(),
                high: "70".into(),
                low: "64".into(),
            },
            basement: ZoneReadout {
                current: "66".into(),
                high: "67".into(),
                low: "66".into(),
            },
            aqi: "23".into(),
            last_refreshed: "12:05 PM".into(),
        }
    }

    #[test]
    fn document_carries_every_view_field() {
        let svg = render_svg(&sample_view());
        for needle in [
            "Thursday, August 6",
            "72°",
            "Partly Cloudy",
            "High 74°  Low 56°",
            "68°",
            "66°",
            "23",
            "updated 12:05 PM",
            "<polyline",
        ] {
            assert!(svg.contains(needle), "missing {needle:?}");
        }
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn placeholder_view_renders_without_forecast_strip() {
        let mut view = sample_view();
        view.forecast.clear();
        view.current_temp = "--".into();
        let svg = render_svg(&view);
        assert!(svg.contains("forecast unavailable"));
        assert!(!svg.contains("<polyline"));
        assert!(svg.contains("--°"));
    }

    #[test]
    fn text_content_is_escaped() {
        assert_eq!(xml_escape("5 < 6 & 7 > 2"), "5 &lt; 6 &amp; 7 &gt; 2");
    }

    #[test]
    fn one_graph_point_per_forecast_hour() {
        let svg = render_svg(&sample_view());
        let points = svg
            .split("points=\"")
            .nth(1)
            .and_then(|s| s.split('"').next())
            .unwrap();
        assert_eq!(points.split_whitespace().count(), 12);
    }
}
