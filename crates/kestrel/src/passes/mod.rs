//! Pass framework: graph-rewriting steps and the pipeline driver.
//!
//! Passes run strictly in pipeline order. Each pass must leave every graph
//! invariant-valid before the next pass runs; there is no rollback, and a
//! violated invariant aborts the compilation. Target applicability is
//! declared per pass as a bound set and an excluded set.

mod control_flow_order;
mod kernel_bind;
mod weight_stage;

pub use control_flow_order::ControlFlowOrderPass;
pub use kernel_bind::KernelBindPass;
pub use weight_stage::WeightStagePass;

use std::time::Instant;

use tracing::debug;

use crate::error::Result;
use crate::graph::Graph;
use crate::kernel::{ContextRegistry, KernelRegistry};
use crate::place::{Place, Target};

/// Collaborators a pass may need while rewriting.
pub struct PassContext<'a> {
    pub place: Place,
    pub kernels: &'a KernelRegistry,
    pub contexts: &'a ContextRegistry,
}

/// One graph-rewriting step of the optimization pipeline.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrites a single block graph.
    fn apply(&self, graph: &mut Graph, cx: &PassContext<'_>) -> Result<()>;

    /// Rewrites the entry graph and every nested block graph. The default
    /// applies [`Pass::apply`] to each graph in block order; passes that must
    /// reason across blocks override this.
    fn apply_all(&self, graphs: &mut [Graph], cx: &PassContext<'_>) -> Result<()> {
        for graph in graphs.iter_mut() {
            self.apply(graph, cx)?;
        }
        Ok(())
    }

    /// Targets this pass applies to; empty means every target.
    fn bound_targets(&self) -> &[Target] {
        &[]
    }

    /// Targets this pass must never run for.
    fn excluded_targets(&self) -> &[Target] {
        &[]
    }

    /// Whether the pass launches kernels at compile time (weight staging).
    fn launches_kernels(&self) -> bool {
        false
    }
}

/// Ordered pass pipeline with target filtering.
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { passes: Vec::new() }
    }

    pub fn add(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Runs every applicable pass in order over all block graphs.
    pub fn run(&self, graphs: &mut [Graph], cx: &PassContext<'_>) -> Result<()> {
        let log_stats = crate::env::pass_stats_enabled();
        for pass in &self.passes {
            if !applicable(pass.as_ref(), cx.place.target) {
                debug!(
                    pass = pass.name(),
                    target = cx.place.target.as_str(),
                    "skipping pass outside its target set"
                );
                continue;
            }
            debug!(
                pass = pass.name(),
                compile_time_launches = pass.launches_kernels(),
                "running pass"
            );
            let start = Instant::now();
            pass.apply_all(graphs, cx)?;
            if log_stats {
                debug!(
                    pass = pass.name(),
                    elapsed_us = start.elapsed().as_micros() as u64,
                    "pass finished"
                );
            }
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
    }
}

fn applicable(pass: &dyn Pass, target: Target) -> bool {
    if pass.excluded_targets().contains(&target) {
        return false;
    }
    let bound = pass.bound_targets();
    bound.is_empty() || bound.contains(&target)
}
