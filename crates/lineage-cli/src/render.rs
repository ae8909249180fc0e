//! Output formats for a lineage view: Graphviz, standalone SVG, JSON, and an
//! HTML page that replays the impact wave.

use anyhow::{anyhow, Result};
use lineage_graph::{
    Edge, EdgeKey, EdgeType, Highlight, HighlightSet, HoverState, Layer, Layout, LineageGraph,
    LineageView, Point, Status, WavePlan,
};
use serde::Serialize;
use std::fmt::Write as _;

/// Canvas the SVG is fitted into.
pub const CANVAS_WIDTH: f64 = 900.0;
pub const CANVAS_HEIGHT: f64 = 600.0;
pub const CANVAS_PADDING: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Dot,
    Svg,
    Json,
    Html,
}

impl RenderFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot" | "gv" => Ok(Self::Dot),
            "svg" => Ok(Self::Svg),
            "json" => Ok(Self::Json),
            "html" | "htm" => Ok(Self::Html),
            other => Err(anyhow!(
                "unknown render format `{other}` (expected dot|svg|json|html)"
            )),
        }
    }
}

/// Render the current state of `view` in `format`.
///
/// `wave` is only embedded by the HTML output.
pub fn render(view: &LineageView, format: RenderFormat, wave: Option<&WavePlan>) -> Result<String> {
    let visible = view.visible();
    let layout = view.layout();
    Ok(match format {
        RenderFormat::Dot => render_dot(&visible, &layout, view.highlight()),
        RenderFormat::Svg => render_svg(&visible, &layout, view.hover_state(), view.highlight()),
        RenderFormat::Json => render_json(view)?,
        RenderFormat::Html => render_html(view, wave)?,
    })
}

pub fn status_color(status: Status) -> &'static str {
    match status {
        Status::Ok => "#2fb344",
        Status::Running => "#1c7ed6",
        Status::Late => "#f59f00",
        Status::Failed => "#e03131",
        Status::Unknown => "#adb5bd",
    }
}

pub fn layer_color(layer: Layer) -> &'static str {
    match layer {
        Layer::Source => "#868e96",
        Layer::Staging => "#7950f2",
        Layer::Dw => "#1971c2",
        Layer::Mart => "#0ca678",
    }
}

fn layer_title(layer: Layer) -> &'static str {
    match layer {
        Layer::Source => "Sources",
        Layer::Staging => "Staging",
        Layer::Dw => "Data warehouse",
        Layer::Mart => "Marts",
    }
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Debug, Serialize)]
struct ViewSnapshot<'a> {
    phase: lineage_graph::ViewPhase,
    mode: lineage_graph::LayoutMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<&'a str>,
    nodes: &'a [lineage_graph::Node],
    edges: &'a [Edge],
    positions: &'a Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight: Option<&'a HighlightSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wave: Option<&'a WavePlan>,
}

fn snapshot_json(view: &LineageView, wave: Option<&WavePlan>, pretty: bool) -> Result<String> {
    let visible = view.visible();
    let layout = view.layout();
    let snapshot = ViewSnapshot {
        phase: view.phase(),
        mode: view.mode(),
        error: view.error(),
        selected: view.selected(),
        nodes: &visible.nodes,
        edges: &visible.edges,
        positions: &layout,
        highlight: view.highlight().active(),
        wave,
    };
    Ok(if pretty {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        serde_json::to_string(&snapshot)?
    })
}

/// `{nodes, edges, positions, highlight}` of the visible graph.
pub fn render_json(view: &LineageView) -> Result<String> {
    snapshot_json(view, None, true)
}

// ============================================================================
// DOT
// ============================================================================

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn render_dot(graph: &LineageGraph, layout: &Layout, highlight: &Highlight) -> String {
    let mut out = String::new();
    out.push_str("digraph lineage {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];\n");
    out.push_str("  edge [fontname=\"Helvetica\"];\n\n");

    for layer in Layer::ALL {
        let members: Vec<_> = graph.nodes.iter().filter(|n| n.layer == layer).collect();
        if members.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  subgraph cluster_{} {{", layer.as_str());
        let _ = writeln!(out, "    label=\"{}\";", layer_title(layer));
        out.push_str("    style=\"rounded,dashed\";\n");
        let _ = writeln!(out, "    color=\"{}\";", layer_color(layer));
        for n in members {
            let mut attrs = vec![
                format!("label=\"{}\\n{}\"", dot_escape(&n.label), n.status()),
                format!("color=\"{}\"", layer_color(n.layer)),
            ];
            if highlight.is_node_faded(&n.id) {
                attrs.push("fillcolor=\"#f1f3f5\"".to_string());
                attrs.push("fontcolor=gray60".to_string());
            } else {
                attrs.push(format!("fillcolor=\"{}\"", status_color(n.status())));
                attrs.push("fontcolor=white".to_string());
            }
            if highlight.is_node_highlighted(&n.id) {
                attrs.push("penwidth=2.5".to_string());
            }
            if let Some(p) = layout.get(&n.id) {
                attrs.push(format!("pos=\"{:.0},{:.0}\"", p.x, -p.y));
            }
            let _ = writeln!(out, "    \"{}\" [{}];", dot_escape(&n.id), attrs.join(", "));
        }
        out.push_str("  }\n\n");
    }

    for e in &graph.edges {
        let mut attrs: Vec<String> = Vec::new();
        match e.edge_type {
            Some(EdgeType::Copy) => attrs.push("style=dashed".to_string()),
            Some(EdgeType::Join) => attrs.push("style=bold".to_string()),
            Some(EdgeType::Transform) | None => {}
        }
        if let Some(ty) = e.edge_type {
            attrs.push(format!("label=\"{}\"", ty.as_str()));
        }
        if highlight.is_edge_faded(e) {
            attrs.push("color=gray85".to_string());
        }
        let line = if attrs.is_empty() {
            format!("  \"{}\" -> \"{}\";\n", dot_escape(&e.from), dot_escape(&e.to))
        } else {
            format!(
                "  \"{}\" -> \"{}\" [{}];\n",
                dot_escape(&e.from),
                dot_escape(&e.to),
                attrs.join(", ")
            )
        };
        out.push_str(&line);
    }

    out.push_str("}\n");
    out
}

// ============================================================================
// SVG
// ============================================================================

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn edge_path(from: Point, to: Point, half_width: f64) -> String {
    let (x1, y1) = (from.x + half_width, from.y);
    let (x2, y2) = (to.x - half_width, to.y);
    let mx = (x1 + x2) / 2.0;
    format!("M {x1:.1} {y1:.1} C {mx:.1} {y1:.1}, {mx:.1} {y2:.1}, {x2:.1} {y2:.1}")
}

/// Element id of an edge inside the SVG, shared with the wave script.
pub fn edge_dom_id(key: &EdgeKey) -> String {
    let ty = key.edge_type.map(EdgeType::as_str).unwrap_or("none");
    format!("e:{}:{}:{}", key.from, key.to, ty)
}

pub fn render_svg(
    graph: &LineageGraph,
    layout: &Layout,
    hover: &HoverState,
    highlight: &Highlight,
) -> String {
    let vp = layout.fit(CANVAS_WIDTH, CANVAS_HEIGHT, CANVAS_PADDING);
    let hw = layout.options.node_width / 2.0;
    let hh = layout.options.node_height / 2.0;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {CANVAS_WIDTH} {CANVAS_HEIGHT}\" class=\"lineage lineage-{}\">",
        layout.engine
    );
    out.push_str("  <defs>\n");
    out.push_str("    <marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"8\" markerHeight=\"8\" orient=\"auto-start-reverse\">\n");
    out.push_str("      <path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"#868e96\"/>\n");
    out.push_str("    </marker>\n");
    out.push_str("  </defs>\n");
    let _ = writeln!(
        out,
        "  <g transform=\"translate({:.2} {:.2}) scale({:.4})\">",
        vp.translate_x, vp.translate_y, vp.scale
    );

    out.push_str("    <g class=\"edges\">\n");
    for e in &graph.edges {
        let (Some(from), Some(to)) = (layout.get(&e.from), layout.get(&e.to)) else {
            continue;
        };
        let mut class = String::from("edge");
        if let Some(ty) = e.edge_type {
            let _ = write!(class, " type-{}", ty.as_str());
        }
        if hover.is_dimmed(e) {
            class.push_str(" dimmed");
        }
        if highlight.is_edge_faded(e) {
            class.push_str(" faded");
        }
        let dash = match e.edge_type {
            Some(EdgeType::Copy) => " stroke-dasharray=\"6 4\"",
            _ => "",
        };
        let width = match e.edge_type {
            Some(EdgeType::Join) => 2.5,
            _ => 1.5,
        };
        let _ = writeln!(
            out,
            "      <path id=\"{}\" class=\"{class}\" d=\"{}\" fill=\"none\" stroke=\"#868e96\" stroke-width=\"{width}\"{dash} marker-end=\"url(#arrow)\"/>",
            xml_escape(&edge_dom_id(&e.key())),
            edge_path(from, to, hw),
        );
    }
    out.push_str("    </g>\n");

    out.push_str("    <g class=\"nodes\">\n");
    for n in &graph.nodes {
        let p = layout.position(&n.id);
        let mut class = format!("node layer-{} status-{}", n.layer, n.status().as_str().to_lowercase());
        if hover.is_active(&n.id, &graph.edges) {
            class.push_str(" active");
        }
        if highlight.is_node_faded(&n.id) {
            class.push_str(" faded");
        }
        if highlight.is_node_highlighted(&n.id) {
            class.push_str(" highlighted");
        }
        let _ = writeln!(out, "      <g id=\"n:{}\" class=\"{class}\">", xml_escape(&n.id));
        let _ = writeln!(
            out,
            "        <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{}\" height=\"{}\" rx=\"10\" fill=\"#ffffff\" stroke=\"{}\" stroke-width=\"2\"/>",
            p.x - hw,
            p.y - hh,
            layout.options.node_width,
            layout.options.node_height,
            layer_color(n.layer)
        );
        let _ = writeln!(
            out,
            "        <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"6\" fill=\"{}\"/>",
            p.x - hw + 16.0,
            p.y,
            status_color(n.status())
        );
        let _ = writeln!(
            out,
            "        <text x=\"{:.1}\" y=\"{:.1}\" font-family=\"Helvetica\" font-size=\"14\">{}</text>",
            p.x - hw + 30.0,
            p.y - 4.0,
            xml_escape(&n.label)
        );
        let subtitle = n.owner.as_deref().or(n.domain.as_deref()).unwrap_or(n.layer.as_str());
        let _ = writeln!(
            out,
            "        <text x=\"{:.1}\" y=\"{:.1}\" font-family=\"Helvetica\" font-size=\"11\" fill=\"#868e96\">{}</text>",
            p.x - hw + 30.0,
            p.y + 14.0,
            xml_escape(subtitle)
        );
        out.push_str("      </g>\n");
    }
    out.push_str("    </g>\n");
    out.push_str("  </g>\n");
    out.push_str("</svg>\n");
    out
}

// ============================================================================
// HTML
// ============================================================================

/// Self-contained page with the SVG and the impact wave, replayed once on load.
pub fn render_html(view: &LineageView, wave: Option<&WavePlan>) -> Result<String> {
    let visible = view.visible();
    let layout = view.layout();
    let svg = render_svg(&visible, &layout, view.hover_state(), view.highlight());
    // `</` is escaped so graph data cannot close the script tag.
    let data = snapshot_json(view, wave, false)?.replace("</", "<\\/");

    let nodes = visible.nodes.len().to_string();
    let edges = visible.edges.len().to_string();
    let error = view.error().map(xml_escape).unwrap_or_default();
    Ok(fill_template(
        include_str!("../templates/lineage.html"),
        &[
            ("SVG", svg.as_str()),
            ("VIEW_JSON", data.as_str()),
            ("NODES_COUNT", nodes.as_str()),
            ("EDGES_COUNT", edges.as_str()),
            ("MODE", layout.engine),
            ("ERROR", error.as_str()),
        ],
    ))
}

/// Substitute `{{KEY}}` slots in one pass over `template`.
///
/// Substituted text is never scanned again, so graph data that happens to
/// contain a slot name comes out verbatim. Unknown slots are kept as is.
fn fill_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let key = &after[..end];
        match slots.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
