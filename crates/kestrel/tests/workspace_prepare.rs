use kestrel::desc::{OpDesc, ProgramDesc, VarDesc, VarKind};
use kestrel::error::Error;
use kestrel::op::OpRegistry;
use kestrel::program::Program;
use kestrel::workspace::Scope;

fn desc_with_vars(vars: Vec<VarDesc>) -> ProgramDesc {
    let mut desc = ProgramDesc::new();
    desc.add_block().vars = vars;
    desc
}

#[test]
fn reserved_feed_fetch_are_tensor_lists_and_never_weights() {
    let desc = desc_with_vars(vec![
        VarDesc::tensor_list("feed").persistable(true),
        VarDesc::tensor_list("fetch").persistable(true),
        VarDesc::tensor("w").persistable(true),
        VarDesc::tensor("x"),
    ]);
    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    program.prepare_workspace().unwrap();

    assert_eq!(program.weights(), &["w".to_string()]);
    let feed = root.find_var("feed").expect("feed in root scope");
    assert_eq!(feed.read().unwrap().kind(), VarKind::TensorList);
    let fetch = root.find_var("fetch").expect("fetch in root scope");
    assert_eq!(fetch.read().unwrap().kind(), VarKind::TensorList);
}

#[test]
fn tensor_lists_are_transient_even_when_marked_persistable() {
    let desc = desc_with_vars(vec![VarDesc::tensor_list("history").persistable(true)]);
    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    program.prepare_workspace().unwrap();

    assert!(program.weights().is_empty());
    assert!(program.tmp_vars().contains(&"history".to_string()));
    // Created in the exec scope, not the root.
    assert!(root.find_local("history").is_none());
    let locals = program.exec_scope().unwrap().local_names();
    assert!(locals.contains(&"history".to_string()));
}

#[test]
fn weight_precision_is_applied_from_the_declaration() {
    use kestrel::place::Precision;
    let desc = desc_with_vars(vec![VarDesc::tensor("w")
        .persistable(true)
        .with_precision(Precision::Float)]);
    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    program.prepare_workspace().unwrap();

    let weight = root.find_var("w").unwrap();
    let guard = weight.read().unwrap();
    let tensor = guard.as_tensor().unwrap();
    assert!(tensor.persistable());
    assert_eq!(tensor.precision(), Some(Precision::Float));
}

#[test]
fn unsupported_var_type_aborts_preparation() {
    let mut bad = VarDesc::tensor("strange");
    bad.kind = VarKind::Unsupported;
    let desc = desc_with_vars(vec![bad]);
    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    let err = program.prepare_workspace().unwrap_err();
    assert!(matches!(err, Error::Workspace(_)));
}

#[test]
fn duplicate_prepare_and_duplicate_build_are_fatal() {
    let mut desc = ProgramDesc::new();
    let block = desc.add_block();
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["x"])
            .with_outputs(&["y"]),
    );
    block.vars.push(VarDesc::tensor("x"));
    block.vars.push(VarDesc::tensor("y"));

    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    program.prepare_workspace().unwrap();
    assert!(matches!(
        program.prepare_workspace().unwrap_err(),
        Error::Compile(_)
    ));

    let ops = OpRegistry::with_builtin_ops();
    program.build(&ops).unwrap();
    assert!(matches!(program.build(&ops).unwrap_err(), Error::Compile(_)));
}

#[test]
fn build_requires_a_prepared_workspace() {
    let desc = desc_with_vars(vec![VarDesc::tensor("x")]);
    let root = Scope::root();
    let mut program = Program::new(desc, &root).unwrap();
    let err = program.build(&OpRegistry::with_builtin_ops()).unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
}
