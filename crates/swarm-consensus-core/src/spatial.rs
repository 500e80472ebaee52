use crate::agent::Agent;
use rstar::{RTree, RTreeObject, AABB};

/// Position-only record for spatial indexing to avoid cloning full agents.
#[derive(Clone, Debug)]
pub struct AgentLocation {
    pub id: u32,
    pub position: [f64; 2],
}

impl RTreeObject for AgentLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Build an R*-tree from agent positions via bulk_load (O(n log n)).
pub fn build_index(agents: &[Agent]) -> RTree<AgentLocation> {
    let locations: Vec<AgentLocation> = agents
        .iter()
        .map(|a| AgentLocation {
            id: a.id,
            position: a.position(),
        })
        .collect();
    RTree::bulk_load(locations)
}

/// Visit the id of every agent strictly closer than `range` to `center`,
/// excluding `self_id`. The arena is bounded; distances do not wrap.
pub fn for_each_neighbor(
    tree: &RTree<AgentLocation>,
    center: [f64; 2],
    range: f64,
    self_id: u32,
    mut visitor: impl FnMut(u32),
) {
    if range <= 0.0 {
        return;
    }
    let envelope = AABB::from_corners(
        [center[0] - range, center[1] - range],
        [center[0] + range, center[1] + range],
    );
    let r_sq = range * range;
    for loc in tree.locate_in_envelope(&envelope) {
        if loc.id == self_id {
            continue;
        }
        let dx = loc.position[0] - center[0];
        let dy = loc.position[1] - center[1];
        if dx * dx + dy * dy < r_sq {
            visitor(loc.id);
        }
    }
}
