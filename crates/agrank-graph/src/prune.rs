//! Dangling-node removal shared by both graph variants.

use crate::topology::NodeId;
use crate::view::GraphView;

/// Per-variant hooks for [`remove_dangling`].
pub(crate) trait Prune: GraphView {
    /// Nodes allowed to have no predecessors.
    fn is_entry(&self, node: NodeId) -> bool;

    /// Nodes allowed to have no successors.
    fn is_terminal_goal(&self, node: NodeId) -> bool;

    /// Variant-specific invalidity.
    fn is_invalid(&self, _node: NodeId) -> bool {
        false
    }

    /// Remove the node and every piece of bookkeeping that mentions it.
    fn remove_node(&mut self, node: NodeId);
}

/// Repeatedly remove nodes that cannot be on an attack path: non-entry nodes
/// without predecessors, non-goal nodes without successors, and nodes the
/// variant declares invalid. Stops when a pass removes nothing.
///
/// Returns the number of removed nodes.
pub(crate) fn remove_dangling<G: Prune>(graph: &mut G) -> usize {
    let mut removed = 0;
    let mut passes = 0;
    loop {
        let dangling: Vec<NodeId> = {
            let topo = graph.topology();
            topo.nodes()
                .filter(|&node| {
                    (topo.in_degree(node) == 0 && !graph.is_entry(node))
                        || (topo.out_degree(node) == 0 && !graph.is_terminal_goal(node))
                        || graph.is_invalid(node)
                })
                .collect()
        };
        if dangling.is_empty() {
            break;
        }
        passes += 1;
        removed += dangling.len();
        for node in dangling {
            graph.remove_node(node);
        }
    }
    tracing::trace!(removed, passes, "Dangling nodes removed");
    removed
}
