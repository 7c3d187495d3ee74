//! Diagram Renderer
//!
//! Renders an [`AnalysisResult`] as Mermaid flowchart text. Pure and
//! deterministic: identical input yields byte-identical output.

use std::collections::BTreeSet;
use std::fmt::Write;

use crate::model::{AnalysisResult, Component, ComponentType};

/// Characters with structural meaning in Mermaid flowchart syntax.
const RESERVED: &[char] = &['"', '\'', '`', '[', ']', '{', '}', '(', ')', '<', '>', '#', '|', ';'];

/// Strip reserved characters and collapse whitespace.
pub fn sanitize_label(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "unnamed".to_string()
    } else {
        collapsed
    }
}

fn node_id(index: usize) -> String {
    format!("C{}", index)
}

fn node_shape(component: &Component, id: &str) -> String {
    let label = sanitize_label(&component.name);
    match component.component_type {
        ComponentType::Database => format!("{}[(\"{}\")]", id, label),
        ComponentType::External => format!("{}([\"{}\"])", id, label),
        ComponentType::Queue => format!("{}[[\"{}\"]]", id, label),
        ComponentType::Gateway => format!("{}{{{{\"{}\"}}}}", id, label),
        _ => format!("{}[\"{}\"]", id, label),
    }
}

fn class_style(component_type: ComponentType) -> &'static str {
    match component_type {
        ComponentType::Api => "fill:#dbeafe,stroke:#1d4ed8,color:#1e3a8a",
        ComponentType::Service => "fill:#e0e7ff,stroke:#4338ca,color:#312e81",
        ComponentType::Database => "fill:#dcfce7,stroke:#15803d,color:#14532d",
        ComponentType::Queue => "fill:#fef9c3,stroke:#a16207,color:#713f12",
        ComponentType::Gateway => "fill:#fae8ff,stroke:#a21caf,color:#701a75",
        ComponentType::External => "fill:#fee2e2,stroke:#b91c1c,color:#7f1d1d",
        ComponentType::Frontend => "fill:#cffafe,stroke:#0e7490,color:#164e63",
        ComponentType::Config => "fill:#f3f4f6,stroke:#4b5563,color:#111827",
    }
}

/// Index of the smallest boundary listing each component (first wins on ties).
fn assign_boundaries(analysis: &AnalysisResult) -> Vec<Option<usize>> {
    analysis
        .components
        .iter()
        .map(|component| {
            analysis
                .trust_boundaries
                .iter()
                .enumerate()
                .filter(|(_, b)| b.components.iter().any(|n| n == &component.name))
                .min_by_key(|(i, b)| (b.components.len(), *i))
                .map(|(i, _)| i)
        })
        .collect()
}

/// Render the component graph as a Mermaid `flowchart`.
pub fn render(analysis: &AnalysisResult) -> String {
    let mut out = String::from("flowchart TD\n");
    let assignment = assign_boundaries(analysis);

    // Components outside every boundary sit at the top level.
    for (i, component) in analysis.components.iter().enumerate() {
        if assignment[i].is_none() {
            let _ = writeln!(out, "    {}", node_shape(component, &node_id(i)));
        }
    }

    for (b, boundary) in analysis.trust_boundaries.iter().enumerate() {
        let _ = writeln!(
            out,
            "    subgraph B{} [\"{}\"]",
            b,
            sanitize_label(&boundary.name)
        );
        for (i, component) in analysis.components.iter().enumerate() {
            if assignment[i] == Some(b) {
                let _ = writeln!(out, "        {}", node_shape(component, &node_id(i)));
            }
        }
        out.push_str("    end\n");
    }

    let index_of = |name: &str| analysis.components.iter().position(|c| c.name == name);
    for flow in analysis.valid_flows() {
        if let (Some(from), Some(to)) = (index_of(&flow.from), index_of(&flow.to)) {
            let _ = writeln!(
                out,
                "    {} -->|\"{}\"| {}",
                node_id(from),
                sanitize_label(flow.label()),
                node_id(to)
            );
        }
    }

    let used: BTreeSet<ComponentType> = analysis
        .components
        .iter()
        .map(|c| c.component_type)
        .collect();
    for component_type in &used {
        let _ = writeln!(
            out,
            "    classDef {} {}",
            component_type.as_str(),
            class_style(*component_type)
        );
    }
    for component_type in &used {
        let ids: Vec<String> = analysis
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.component_type == *component_type)
            .map(|(i, _)| node_id(i))
            .collect();
        let _ = writeln!(out, "    class {} {}", ids.join(","), component_type.as_str());
    }

    out
}
