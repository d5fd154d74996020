//! Device hierarchy of a channel.
//!
//! Nodes live in an arena owned by the [`Tree`] and refer to each other by
//! [`NodeId`]. Only channel, rank and bank nodes are materialized, rows and
//! columns are coordinates within a bank.

use crate::{
    request::AddrVec,
    scoreboard::Scoreboard,
    spec::{Level, StandardSpec, State},
};
use smallvec::SmallVec;

pub type NodeId = usize;

/// Node ids from the channel down to a node.
pub type Path = SmallVec<[NodeId; 3]>;

#[derive(Debug, Clone)]
pub struct LevelNode {
    pub level: Level,
    /// Index among its siblings
    pub id: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub state: State,
    /// Latched row of an open bank
    pub open_row: Option<usize>,
    pub scoreboard: Scoreboard,
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<LevelNode>,
}

impl Tree {
    pub const ROOT: NodeId = 0;

    /// Build the hierarchy of channel `channel_id`.
    #[must_use]
    pub fn new(spec: &StandardSpec, channel_id: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(spec, Level::Channel, channel_id, None);
        tree
    }

    fn build(
        &mut self,
        spec: &StandardSpec,
        level: Level,
        id: usize,
        parent: Option<NodeId>,
    ) -> NodeId {
        let node_id = self.nodes.len();
        self.nodes.push(LevelNode {
            level,
            id,
            parent,
            children: Vec::new(),
            state: spec.start(level),
            open_row: None,
            scoreboard: Scoreboard::new(spec.history_depth),
        });
        if let Some(child) = level.child().filter(|child| *child <= Level::LEAF) {
            let children = (0..spec.count(child))
                .map(|child_id| self.build(spec, child, child_id, Some(node_id)))
                .collect();
            self.nodes[node_id].children = children;
        }
        node_id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &LevelNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut LevelNode {
        &mut self.nodes[id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at `level` addressed by `addr`.
    #[must_use]
    pub fn resolve(&self, addr: &AddrVec, level: Level) -> NodeId {
        let mut node = Self::ROOT;
        for child_level in level.issue_level().path().skip(1) {
            let idx = addr[child_level as usize];
            node = self.nodes[node].children[idx];
        }
        node
    }

    /// Nodes from the channel down to `node` (inclusive).
    #[must_use]
    pub fn path(&self, node: NodeId) -> Path {
        let mut path = Path::new();
        let mut current = Some(node);
        while let Some(id) = current {
            path.push(id);
            current = self.nodes[id].parent;
        }
        path.reverse();
        path
    }

    /// Siblings of `node`, excluding the node itself.
    pub fn siblings(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[node]
            .parent
            .into_iter()
            .flat_map(move |parent| self.nodes[parent].children.iter().copied())
            .filter(move |id| *id != node)
    }

    /// Ids of all rank nodes.
    #[must_use]
    pub fn ranks(&self) -> &[NodeId] {
        &self.nodes[Self::ROOT].children
    }
}

#[cfg(test)]
mod tests {
    use super::Tree;
    use crate::spec::{Level, StandardSpec, State};

    #[test]
    fn test_hierarchy_shape() -> color_eyre::eyre::Result<()> {
        let mut spec = StandardSpec::new("WideIO", "WideIO_1Gb", "WideIO_200")?;
        spec.set_channel_number(1)?;
        spec.set_rank_number(2)?;
        let tree = Tree::new(&spec, 0);
        // channel + 2 ranks + 2 * 4 banks
        assert_eq!(tree.len(), 11);
        assert_eq!(tree.ranks().len(), 2);
        assert_eq!(tree.get(Tree::ROOT).state, State::NotApplicable);

        let addr = [0, 1, 2, 100, 3];
        let bank = tree.resolve(&addr, Level::Bank);
        assert_eq!(tree.get(bank).level, Level::Bank);
        assert_eq!(tree.get(bank).id, 2);
        assert_eq!(tree.get(bank).state, State::Closed);
        // rows are coordinates within the bank
        assert_eq!(tree.resolve(&addr, Level::Row), bank);
        assert_eq!(tree.get(tree.resolve(&addr, Level::Rank)).id, 1);

        let path = tree.path(bank);
        assert_eq!(path.len(), 3);
        assert_eq!(path[1], tree.ranks()[1]);
        assert_eq!(tree.get(path[1]).state, State::PowerUp);

        assert_eq!(tree.siblings(bank).count(), 3);
        assert_eq!(tree.siblings(path[1]).collect::<Vec<_>>(), vec![tree.ranks()[0]]);
        assert_eq!(tree.siblings(Tree::ROOT).count(), 0);
        Ok(())
    }
}
