//! MulVAL `AttackGraph.xml` deserialization.
//!
//! MulVAL writes its logical attack graph as a list of vertices (LEAF, OR and
//! AND facts) and a list of arcs. This module provides typed Rust structs that
//! deserialize from that XML using `quick-xml` with serde.

use std::fmt;

use serde::Deserialize;

use crate::error::{MulvalError, Result};

/// Root element: `<attack_graph>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename = "attack_graph")]
pub struct MulvalGraph {
    #[serde(default)]
    pub arcs: Arcs,
    #[serde(default)]
    pub vertices: Vertices,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arcs {
    #[serde(rename = "arc", default)]
    pub arcs: Vec<MulvalArc>,
}

/// An arc as written by MulVAL: `src` is derived from `dst`, so the attack
/// flows from `dst` to `src`.
#[derive(Debug, Clone, Deserialize)]
pub struct MulvalArc {
    pub src: usize,
    pub dst: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vertices {
    #[serde(rename = "vertex", default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vertex {
    pub id: usize,
    pub fact: String,
    pub metric: Option<f64>,
    #[serde(rename = "type")]
    pub vertex_type: String,
}

/// Kind of a MulVAL vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// Primitive fact, true from the start.
    Leaf,
    /// Derived fact, true once any of its rules fires.
    Or,
    /// Rule application, fires once all of its facts hold.
    And,
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf => write!(f, "LEAF"),
            Self::Or => write!(f, "OR"),
            Self::And => write!(f, "AND"),
        }
    }
}

impl Vertex {
    pub fn kind(&self) -> Result<VertexKind> {
        match self.vertex_type.trim().to_uppercase().as_str() {
            "LEAF" => Ok(VertexKind::Leaf),
            "OR" => Ok(VertexKind::Or),
            "AND" => Ok(VertexKind::And),
            _ => Err(MulvalError::UnknownVertexType {
                vertex: self.id,
                kind: self.vertex_type.clone(),
            }),
        }
    }

    /// Whether this vertex stands for a proposition (LEAF or OR).
    pub fn is_fact(&self) -> bool {
        matches!(self.kind(), Ok(VertexKind::Leaf | VertexKind::Or))
    }

    /// The metric as a severity, if it lies in `(0, 10]`.
    pub fn severity(&self) -> Option<f64> {
        self.metric.filter(|m| *m > 0.0 && *m <= 10.0)
    }
}

impl MulvalGraph {
    pub fn vertex_count(&self) -> usize {
        self.vertices.vertices.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.arcs.len()
    }
}

/// Parse MulVAL XML bytes into a structured `MulvalGraph`.
pub fn parse_mulval_xml(xml: &[u8]) -> Result<MulvalGraph> {
    quick_xml::de::from_reader(xml).map_err(|e| MulvalError::XmlParse(format!("{e}")))
}
