use anyhow::Result;

use kestrel::desc::{AttrValue, OpDesc, ProgramDesc, VarDesc, KERNEL_TYPE_ATTR};
use kestrel::place::{DataLayout, Place, Precision, Target};
use kestrel::tensor::Tensor;
use kestrel::workspace::Scope;
use kestrel::Compiler;

use kestrel_kernels_host::register_host_kernels;

fn host_compiler() -> Compiler {
    let mut compiler = Compiler::new(Place::new(
        Target::Host,
        Precision::Float,
        DataLayout::Nchw,
    ));
    register_host_kernels(compiler.kernels_mut());
    compiler
}

fn straight_line_desc() -> ProgramDesc {
    let mut desc = ProgramDesc::new();
    let block = desc.add_block();
    block.ops.push(
        OpDesc::new("feed")
            .with_inputs(&["feed"])
            .with_outputs(&["x"])
            .with_attr("col", AttrValue::Int(0)),
    );
    block.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["x"])
            .with_outputs(&["y"]),
    );
    block.ops.push(
        OpDesc::new("scale")
            .with_inputs(&["y"])
            .with_outputs(&["z"])
            .with_attr("scale", AttrValue::Float(3.0)),
    );
    block.ops.push(
        OpDesc::new("fetch")
            .with_inputs(&["z"])
            .with_outputs(&["fetch"])
            .with_attr("col", AttrValue::Int(0)),
    );
    block.vars.push(VarDesc::tensor_list("feed").persistable(true));
    block.vars.push(VarDesc::tensor_list("fetch").persistable(true));
    block.vars.push(VarDesc::tensor("x"));
    block.vars.push(VarDesc::tensor("y"));
    block.vars.push(VarDesc::tensor("z"));
    desc
}

#[test]
fn saved_programs_rebuild_with_identical_instruction_lists() -> Result<()> {
    let compiler = host_compiler();
    let root = Scope::root();
    let mut program = compiler.compile(straight_line_desc(), &root)?;
    program.save_op_infos()?;
    program.update_vars()?;

    let saved: ProgramDesc = program.description().read().unwrap().clone();
    for op in &saved.blocks[0].ops {
        assert!(
            op.attr(KERNEL_TYPE_ATTR).is_some(),
            "op '{}' missing its saved kernel signature",
            op.op_type
        );
    }

    // The saved description survives serialization, as used by on-disk caches.
    let json = serde_json::to_string(&saved)?;
    let reloaded: ProgramDesc = serde_json::from_str(&json)?;

    let reload_root = Scope::root();
    let mut rebuilt = compiler.load(reloaded, &reload_root)?;

    assert_eq!(program.instructions().len(), rebuilt.instructions().len());
    for (original, restored) in program.instructions().iter().zip(rebuilt.instructions()) {
        assert_eq!(original.op().op_type(), restored.op().op_type());
        assert_eq!(
            original.kernel().key().to_string(),
            restored.kernel().key().to_string()
        );
    }

    // The rebuilt program still executes.
    {
        let feed = reload_root.find_var("feed").expect("feed variable");
        feed.write()
            .unwrap()
            .as_tensor_list_mut()
            .unwrap()
            .push(Tensor::from_f32(vec![2], &[-2.0, 2.0])?);
    }
    rebuilt.run()?;
    let fetch = reload_root.find_var("fetch").expect("fetch variable");
    let values = fetch.read().unwrap().as_tensor_list().unwrap()[0].f32_data()?;
    assert_eq!(values, vec![0.0, 6.0]);
    Ok(())
}

#[test]
fn update_vars_keeps_only_referenced_declarations() -> Result<()> {
    let mut desc = straight_line_desc();
    desc.blocks[0].vars.push(VarDesc::tensor("orphan"));

    let compiler = host_compiler();
    let root = Scope::root();
    let mut program = compiler.compile(desc, &root)?;
    program.save_op_infos()?;
    program.update_vars()?;

    let saved = program.description();
    let saved = saved.read().unwrap();
    assert!(saved.blocks[0].var("orphan").is_none());
    for name in ["feed", "fetch", "x", "y", "z"] {
        assert!(saved.blocks[0].var(name).is_some(), "missing var '{name}'");
    }
    Ok(())
}
