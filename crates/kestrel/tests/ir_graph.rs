use kestrel::desc::{AttrValue, OpDesc, ProgramDesc, VarDesc, SUB_BLOCK_ATTR};
use kestrel::error::Error;
use kestrel::graph::Graph;
use kestrel::kernel::{ContextRegistry, KernelRegistry};
use kestrel::op::OpRegistry;
use kestrel::passes::{ControlFlowOrderPass, Pass, PassContext};
use kestrel::place::Place;
use kestrel::program::Program;
use kestrel::workspace::Scope;

fn relu_chain_desc() -> ProgramDesc {
    let mut desc = ProgramDesc::new();
    let block = desc.add_block();
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["a"])
            .with_outputs(&["b"]),
    );
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["b"])
            .with_outputs(&["c"]),
    );
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["a"])
            .with_outputs(&["d"]),
    );
    for name in ["a", "b", "c", "d"] {
        block.vars.push(VarDesc::tensor(name));
    }
    desc
}

fn build_graphs(desc: ProgramDesc) -> Vec<Graph> {
    let root = Scope::root();
    let mut program = Program::new(desc, &root).expect("program");
    program.prepare_workspace().expect("workspace");
    program
        .build(&OpRegistry::with_builtin_ops())
        .expect("build");
    program.build_graphs().expect("graphs")
}

#[test]
fn topological_order_visits_every_node_once_with_producers_first() {
    let graphs = build_graphs(relu_chain_desc());
    let graph = &graphs[0];

    let order = graph.topological_order().expect("topological order");
    assert_eq!(order.len(), graph.nodes().len());

    let mut position = vec![usize::MAX; graph.nodes().len()];
    for (pos, id) in order.iter().enumerate() {
        assert_eq!(position[id.0], usize::MAX, "node visited twice");
        position[id.0] = pos;
    }
    for id in order {
        for producer in &graph.node(id).inputs {
            assert!(
                position[producer.0] < position[id.0],
                "producer {} ordered after consumer {}",
                producer.0,
                id.0
            );
        }
    }
}

#[test]
fn topological_order_is_stable_across_rebuilds() {
    let first = build_graphs(relu_chain_desc());
    let second = build_graphs(relu_chain_desc());
    let order_a = first[0].topological_order().unwrap();
    let order_b = second[0].topological_order().unwrap();
    assert_eq!(order_a, order_b);
}

#[test]
fn linking_a_cycle_is_an_ir_integrity_error() {
    let mut graphs = build_graphs(relu_chain_desc());
    let graph = &mut graphs[0];

    // Find the statement consuming "a" and the argument version of "c" it
    // transitively produces; closing that path must fail.
    let first_stmt = graph.stmt_topological_order().unwrap()[0];
    let c_arg = graph
        .node_ids()
        .find(|id| graph.node(*id).arg_name() == Some("c"))
        .expect("argument node for c");

    let err = graph.link(c_arg, first_stmt).unwrap_err();
    assert!(matches!(err, Error::IrIntegrity(_)));
}

fn control_flow_desc(sub_blocks: &[i64]) -> ProgramDesc {
    let mut desc = ProgramDesc::new();
    let entry = desc.add_block();
    for sub in sub_blocks {
        entry.ops.push(
            OpDesc::new("while")
                .with_inputs(&["cond"])
                .with_attr(SUB_BLOCK_ATTR, AttrValue::Int(*sub)),
        );
    }
    entry.vars.push(VarDesc::tensor("cond"));
    for _ in 0..sub_blocks.len() {
        let body = desc.add_block();
        body.ops.push(
            OpDesc::new("relu")
                .with_inputs(&["x"])
                .with_outputs(&["y"]),
        );
        body.vars.push(VarDesc::tensor("x"));
        body.vars.push(VarDesc::tensor("y"));
    }
    desc
}

#[test]
fn control_flow_pass_threads_siblings_in_ascending_sub_block_order() {
    let mut graphs = build_graphs(control_flow_desc(&[3, 1, 2]));
    let node_count_before = graphs[0].nodes().len();

    let kernels = KernelRegistry::new();
    let contexts = ContextRegistry::new();
    let cx = PassContext {
        place: Place::host(),
        kernels: &kernels,
        contexts: &contexts,
    };
    ControlFlowOrderPass
        .apply(&mut graphs[0], &cx)
        .expect("pass");
    let graph = &graphs[0];

    // count - 1 synthetic argument nodes, named after the threaded pair.
    assert_eq!(graph.nodes().len(), node_count_before + 2);
    for name in ["control_flow_op_1_to_2", "control_flow_op_2_to_3"] {
        assert!(
            graph
                .node_ids()
                .any(|id| graph.node(id).arg_name() == Some(name)),
            "missing synthetic argument {name}"
        );
    }

    // Statement order now follows ascending sub_block indices.
    let sub_blocks: Vec<i64> = graph
        .stmt_topological_order()
        .unwrap()
        .into_iter()
        .filter_map(|id| graph.node(id).as_stmt())
        .filter(|stmt| stmt.op_type() == "while")
        .map(|stmt| stmt.op.desc().sub_block().unwrap())
        .collect();
    assert_eq!(sub_blocks, vec![1, 2, 3]);
}

#[test]
fn unresolved_operand_is_an_ir_integrity_error() {
    let mut desc = ProgramDesc::new();
    let block = desc.add_block();
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["ghost"])
            .with_outputs(&["y"]),
    );
    block.vars.push(VarDesc::tensor("y"));

    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    program.prepare_workspace().unwrap();
    program.build(&OpRegistry::with_builtin_ops()).unwrap();
    let err = program.build_graphs().unwrap_err();
    assert!(matches!(err, Error::IrIntegrity(_)));
}
