//! Mutable graph IR for one block.
//!
//! Nodes are either statements (one operation, plus its kernel once bound) or
//! arguments (a named value). Edges encode producer→consumer data
//! dependencies. Writes create a fresh argument version per producing
//! statement, so a block graph stays acyclic even when a description reuses a
//! name as both input and output; loop bodies live in their own block graphs
//! rather than as back-edges.

use std::collections::{BTreeSet, HashMap};

use smallvec::SmallVec;

use crate::desc::BlockDesc;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::op::Op;
use crate::workspace::Scope;

/// Index of a node in its graph; ascending ids follow insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Statement node: an operation and, once selection ran, its kernel.
pub struct StmtNode {
    pub op: Box<dyn Op>,
    pub kernel: Option<Box<dyn Kernel>>,
}

impl StmtNode {
    pub fn op_type(&self) -> &str {
        self.op.op_type()
    }
}

/// Argument node: one version of a named value.
pub struct ArgNode {
    pub name: String,
    pub persistable: bool,
}

pub enum NodeKind {
    Stmt(StmtNode),
    Arg(ArgNode),
}

pub struct Node {
    pub kind: NodeKind,
    pub inputs: SmallVec<[NodeId; 4]>,
    pub outputs: SmallVec<[NodeId; 4]>,
}

impl Node {
    pub fn is_stmt(&self) -> bool {
        matches!(self.kind, NodeKind::Stmt(_))
    }

    pub fn as_stmt(&self) -> Option<&StmtNode> {
        match &self.kind {
            NodeKind::Stmt(stmt) => Some(stmt),
            NodeKind::Arg(_) => None,
        }
    }

    pub fn as_stmt_mut(&mut self) -> Option<&mut StmtNode> {
        match &mut self.kind {
            NodeKind::Stmt(stmt) => Some(stmt),
            NodeKind::Arg(_) => None,
        }
    }

    pub fn arg_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Arg(arg) => Some(arg.name.as_str()),
            NodeKind::Stmt(_) => None,
        }
    }
}

/// The IR graph of one block.
pub struct Graph {
    nodes: Vec<Node>,
    /// Latest argument version per name.
    latest: HashMap<String, NodeId>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            latest: HashMap::new(),
        }
    }

    /// Builds the graph for one block from its attached operations.
    ///
    /// Operand names must resolve to a declared block variable, a workspace
    /// variable reachable through `scope`, or an earlier statement's output;
    /// anything else is an IR-integrity failure.
    pub fn from_block(ops: Vec<Box<dyn Op>>, block: &BlockDesc, scope: &Scope) -> Result<Graph> {
        let mut graph = Graph::new();
        for op in ops {
            let op_type = op.op_type().to_string();
            let inputs = op.desc().inputs.clone();
            let outputs = op.desc().outputs.clone();
            let stmt = graph.add_stmt(op);
            for name in &inputs {
                let arg = if let Some(id) = graph.latest.get(name).copied() {
                    id
                } else {
                    let persistable =
                        resolve_persistable(name, block, scope).ok_or_else(|| {
                            Error::ir_integrity(format!(
                                "operand '{name}' of op '{op_type}' does not resolve to a declared variable"
                            ))
                        })?;
                    graph.new_argument_node(name, persistable)
                };
                graph.link(arg, stmt)?;
            }
            for name in &outputs {
                if resolve_persistable(name, block, scope).is_none() {
                    return Err(Error::ir_integrity(format!(
                        "result '{name}' of op '{op_type}' does not resolve to a declared variable"
                    )));
                }
                // A write always opens a new version of the name.
                let arg = graph.new_argument_node(name, false);
                graph.link(stmt, arg)?;
            }
        }
        Ok(graph)
    }

    /// Adds a fresh argument node and makes it the latest version of `name`.
    pub fn new_argument_node(&mut self, name: &str, persistable: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Arg(ArgNode {
                name: name.to_string(),
                persistable,
            }),
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
        });
        self.latest.insert(name.to_string(), id);
        id
    }

    pub fn add_stmt(&mut self, op: Box<dyn Op>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Stmt(StmtNode { op, kernel: None }),
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
        });
        id
    }

    /// Adds the dependency edge `from → to`. Introducing a cycle is fatal.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if from == to || self.reaches(to, from) {
            return Err(Error::ir_integrity(format!(
                "linking node {} to node {} would introduce a cycle",
                from.0, to.0
            )));
        }
        self.nodes[from.0].outputs.push(to);
        self.nodes[to.0].inputs.push(from);
        Ok(())
    }

    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut visited = vec![false; self.nodes.len()];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            stack.extend(self.nodes[id.0].outputs.iter().copied());
        }
        false
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Stable topological order: producers before consumers, ties broken by
    /// insertion order so repeated compilations produce identical output.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.inputs.len()).collect();
        let mut ready: BTreeSet<NodeId> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| NodeId(i))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.iter().next().copied() {
            ready.remove(&id);
            order.push(id);
            for succ in &self.nodes[id.0].outputs {
                indegree[succ.0] -= 1;
                if indegree[succ.0] == 0 {
                    ready.insert(*succ);
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(Error::ir_integrity(
                "graph contains a cycle; topological order does not exist",
            ));
        }
        Ok(order)
    }

    /// Topological order restricted to statement nodes.
    pub fn stmt_topological_order(&self) -> Result<Vec<NodeId>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .filter(|id| self.nodes[id.0].is_stmt())
            .collect())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

fn resolve_persistable(name: &str, block: &BlockDesc, scope: &Scope) -> Option<bool> {
    if let Some(var) = block.var(name) {
        return Some(var.persistable && var.kind == crate::desc::VarKind::Tensor);
    }
    scope.find_var(name).map(|var| {
        let guard = var.read().expect("variable poisoned");
        match &*guard {
            crate::workspace::Variable::Tensor(tensor) => tensor.persistable(),
            crate::workspace::Variable::TensorList(_) => false,
        }
    })
}
