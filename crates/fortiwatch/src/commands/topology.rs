//! `topology` handler: tree or edge-list view of the inferred graph.

use std::fmt::Write;

use tabled::Tabled;

use fortiwatch_core::model::{GATEWAY_NODE_ID, NodeKind};
use fortiwatch_core::{FleetSnapshot, TopologyGraph};

use crate::cli::{GlobalOpts, OutputFormat, TopologyArgs, TopologyView};
use crate::error::CliError;
use crate::output::{self, paint_status};

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Via")]
    via: String,
    #[tabled(rename = "Link")]
    link: String,
}

fn without_endpoints(graph: &TopologyGraph) -> TopologyGraph {
    let keep = |id: &str| {
        graph
            .node(id)
            .is_some_and(|n| n.kind != NodeKind::Endpoint)
    };
    TopologyGraph {
        nodes: graph
            .nodes
            .iter()
            .filter(|n| n.kind != NodeKind::Endpoint)
            .cloned()
            .collect(),
        edges: graph
            .edges
            .iter()
            .filter(|e| keep(&e.to))
            .cloned()
            .collect(),
    }
}

/// Indented tree rooted at the gateway.
fn render_tree(graph: &TopologyGraph, color: bool) -> String {
    fn walk(graph: &TopologyGraph, id: &str, depth: usize, color: bool, out: &mut String) {
        for edge in graph.children(id) {
            let Some(node) = graph.node(&edge.to) else {
                continue;
            };
            let status = node
                .status
                .map(|s| format!(" [{}]", paint_status(s, color)))
                .unwrap_or_default();
            let marker = if edge.synthesized { "~" } else { "" };
            let _ = writeln!(
                out,
                "{:indent$}└─ {}{status}  via {}{marker}",
                "",
                node.label,
                edge.via,
                indent = depth * 3
            );
            walk(graph, &node.id, depth + 1, color, out);
        }
    }

    let mut out = String::new();
    let root = graph
        .node(GATEWAY_NODE_ID)
        .map_or(GATEWAY_NODE_ID, |n| n.label.as_str());
    let _ = writeln!(out, "{root}");
    walk(graph, GATEWAY_NODE_ID, 0, color, &mut out);
    out.trim_end().to_owned()
}

pub fn handle(
    snapshot: &FleetSnapshot,
    args: &TopologyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let graph = if args.no_endpoints {
        without_endpoints(&snapshot.topology)
    } else {
        snapshot.topology.clone()
    };

    let out = match (&global.output, args.view) {
        (OutputFormat::Table, TopologyView::Edges) => {
            let rows: Vec<EdgeRow> = graph
                .edges
                .iter()
                .map(|e| EdgeRow {
                    from: e.from.clone(),
                    to: e.to.clone(),
                    via: if e.synthesized {
                        format!("{} (synthesized)", e.via)
                    } else {
                        e.via.clone()
                    },
                    link: e.status.to_string(),
                })
                .collect();
            output::render_table(&rows)
        }
        (format, _) => output::render_single(
            format,
            &graph,
            |g| render_tree(g, color),
            |g| {
                g.nodes
                    .iter()
                    .map(|n| n.id.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
