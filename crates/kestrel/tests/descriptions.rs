use kestrel::desc::{
    AttrValue, OpDesc, ProgramDesc, VarDesc, VarKind, SUB_BLOCK_ATTR,
};
use kestrel::error::Error;
use kestrel::place::{DataLayout, KernelKey, Place, Precision, Target};

#[test]
fn kernel_key_serializes_and_parses_round_trip() {
    let key = KernelKey::new(
        "scale",
        "def",
        Place::new(Target::Host, Precision::Float, DataLayout::Nchw),
    );
    assert_eq!(key.to_string(), "scale/def/host/float/nchw");
    let parsed = KernelKey::parse(&key.to_string()).expect("parse");
    assert_eq!(parsed, key);
}

#[test]
fn malformed_kernel_keys_are_selection_errors() {
    for raw in [
        "",
        "scale",
        "scale/def",
        "scale/def/mars/float/nchw",
        "scale/def/host/float/nchw/extra",
        "scale//host/float/nchw",
    ] {
        let err = KernelKey::parse(raw).unwrap_err();
        assert!(matches!(err, Error::Selection(_)), "accepted '{raw}'");
    }
}

#[test]
fn place_matching_treats_any_as_wildcard() {
    let registered = Place::new(Target::Host, Precision::Any, DataLayout::Any);
    let requested = Place::new(Target::Host, Precision::Float, DataLayout::Nchw);
    assert!(registered.matches(&requested));
    assert!(requested.matches(&registered));

    let cuda = Place::new(Target::Cuda, Precision::Float, DataLayout::Nchw);
    assert!(!registered.matches(&cuda));
    assert!(cuda.matches(&Place::new(Target::Any, Precision::Any, DataLayout::Any)));
}

#[test]
fn program_desc_with_control_flow_round_trips_through_json() {
    let mut desc = ProgramDesc::new();
    let entry = desc.add_block();
    entry.ops.push(
        OpDesc::new("while")
            .with_inputs(&["cond"])
            .with_attr(SUB_BLOCK_ATTR, AttrValue::Int(1))
            .with_attr("note", AttrValue::Str("loop".into()))
            .with_attr("shape", AttrValue::Ints(vec![1, 3]))
            .with_attr("scale", AttrValue::Float(0.5))
            .with_attr("stop_on_nan", AttrValue::Bool(true)),
    );
    entry.vars.push(VarDesc::tensor("cond"));
    entry
        .vars
        .push(VarDesc::tensor("w").persistable(true).with_precision(Precision::Float));
    entry.vars.push(VarDesc::tensor_list("feed").persistable(true));
    let body = desc.add_block();
    body.parent_idx = Some(0);
    body.ops.push(
        OpDesc::new("relu")
            .with_inputs(&["x"])
            .with_outputs(&["x"]),
    );
    body.vars.push(VarDesc::tensor("x"));

    let json = serde_json::to_string(&desc).expect("serialize");
    let reloaded: ProgramDesc = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(reloaded, desc);
}

#[test]
fn unknown_var_type_tags_deserialize_as_unsupported() {
    let kind: VarKind = serde_json::from_str("\"sparse_coo\"").expect("deserialize");
    assert_eq!(kind, VarKind::Unsupported);
}
