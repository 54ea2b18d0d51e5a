use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kestrel::error::Result;
use kestrel::graph::Graph;
use kestrel::kernel::{ContextRegistry, KernelRegistry};
use kestrel::passes::{Pass, PassContext, Pipeline};
use kestrel::place::{DataLayout, Place, Precision, Target};

struct RecordingPass {
    bound: Vec<Target>,
    excluded: Vec<Target>,
    applied: Arc<AtomicUsize>,
}

impl Pass for RecordingPass {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn apply(&self, _graph: &mut Graph, _cx: &PassContext<'_>) -> Result<()> {
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn bound_targets(&self) -> &[Target] {
        &self.bound
    }

    fn excluded_targets(&self) -> &[Target] {
        &self.excluded
    }
}

fn run_for(target: Target, bound: Vec<Target>, excluded: Vec<Target>) -> usize {
    let applied = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(RecordingPass {
        bound,
        excluded,
        applied: Arc::clone(&applied),
    }));

    let kernels = KernelRegistry::new();
    let contexts = ContextRegistry::new();
    let cx = PassContext {
        place: Place::new(target, Precision::Float, DataLayout::Nchw),
        kernels: &kernels,
        contexts: &contexts,
    };
    let mut graphs = vec![Graph::new()];
    pipeline.run(&mut graphs, &cx).expect("pipeline");
    applied.load(Ordering::SeqCst)
}

#[test]
fn unbounded_pass_applies_to_every_target() {
    assert_eq!(run_for(Target::Host, vec![], vec![]), 1);
    assert_eq!(run_for(Target::Npu, vec![], vec![]), 1);
}

#[test]
fn pass_outside_its_bound_set_is_skipped() {
    assert_eq!(run_for(Target::Host, vec![Target::Npu], vec![]), 0);
    assert_eq!(run_for(Target::Npu, vec![Target::Npu], vec![]), 1);
}

#[test]
fn excluded_target_wins_over_everything() {
    assert_eq!(run_for(Target::Cuda, vec![], vec![Target::Cuda]), 0);
    assert_eq!(
        run_for(Target::Cuda, vec![Target::Cuda], vec![Target::Cuda]),
        0
    );
}

#[test]
fn default_apply_all_visits_every_block_graph() {
    let applied = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::new();
    pipeline.add(Box::new(RecordingPass {
        bound: vec![],
        excluded: vec![],
        applied: Arc::clone(&applied),
    }));

    let kernels = KernelRegistry::new();
    let contexts = ContextRegistry::new();
    let cx = PassContext {
        place: Place::host(),
        kernels: &kernels,
        contexts: &contexts,
    };
    let mut graphs = vec![Graph::new(), Graph::new(), Graph::new()];
    pipeline.run(&mut graphs, &cx).unwrap();
    assert_eq!(applied.load(Ordering::SeqCst), 3);
}
