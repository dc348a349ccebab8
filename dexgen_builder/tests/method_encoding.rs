//! End-to-end encoding tests over the full build flow.

use dexgen_builder::{BuilderError, DexBuilder, MethodCode, RecordingSink};
use dexgen_core::{MethodIndex, ProtoIndex, Prototype, TypeDescriptor};

fn void_proto() -> Prototype {
    Prototype::new(TypeDescriptor::void(), [])
}

fn recorded_code(dex: &DexBuilder<RecordingSink>, n: usize) -> MethodCode {
    dex.sink().code[n].2.clone()
}

#[test]
fn test_branch_body_encodes_to_expected_words() {
    // const/4 v0, #0; L:; if-eqz v0, L; return-void
    let mut dex = DexBuilder::new(RecordingSink::default());
    {
        let mut class = dex.make_class("com.example.Loop");
        let mut method = class.create_method("spin", void_proto());
        let r0 = method.alloc_register().unwrap();
        let target = method.alloc_label();
        method.build_const4(r0, 0);
        method.bind_label(target);
        method.build_branch_eqz(r0, target);
        method.build_return();
        method.encode().unwrap();
    }
    let code = recorded_code(&dex, 0);
    // The branch sits one unit after the bind point, so its offset field is
    // exactly the code-unit distance back to it: zero.
    assert_eq!(code.units, vec![0x0012, 0x0038, 0x0000, 0x000e]);
    assert_eq!(code.registers, 1);
    assert_eq!(code.ins, 0);
    assert_eq!(code.outs, 0);
}

#[test]
fn test_full_class_flow() {
    let mut dex = DexBuilder::new(RecordingSink::default());
    {
        let mut class = dex.make_class("com.example.Greeter");
        class.set_source_file("Greeter.java");
        let mut method = class.create_method(
            "greet",
            Prototype::new(TypeDescriptor::void(), [TypeDescriptor::int()]),
        );
        let msg = method.alloc_register().unwrap();
        let builder = method.alloc_register().unwrap();
        method.build_const_string(msg, "hello");
        method.build_new(
            builder,
            &TypeDescriptor::from_classname("java.lang.StringBuilder"),
            void_proto(),
            &[],
        );
        method.build_return();
        method.encode().unwrap();
    }

    // const-string v0, string@7; new-instance v1, type@4;
    // invoke-direct {v1}, meth@1; return-void
    let code = recorded_code(&dex, 0);
    assert_eq!(
        code.units,
        vec![0x001a, 0x0007, 0x0122, 0x0004, 0x1070, 0x0001, 0x0001, 0x000e]
    );
    assert_eq!(code.registers, 3);
    assert_eq!(code.ins, 1);
    assert_eq!(code.outs, 1);

    let sink = dex.sink();
    // the class method first, then the constructor declared by build_new
    assert_eq!(sink.methods.len(), 2);
    assert_eq!(sink.methods[0].2, "greet");
    assert_eq!(sink.methods[1].1, "Ljava/lang/StringBuilder;");
    assert_eq!(sink.methods[1].2, "<init>");
    // (int) -> void and the constructor's () -> void
    assert_eq!(
        sink.protos,
        vec![
            (ProtoIndex::new(0), "VI".to_owned()),
            (ProtoIndex::new(1), "V".to_owned()),
        ]
    );
    assert_eq!(sink.source_files.len(), 1);
}

#[test]
fn test_interning_shared_across_method_bodies() {
    let mut dex = DexBuilder::new(RecordingSink::default());
    {
        let mut class = dex.make_class("com.example.Twice");
        for name in ["first", "second"] {
            let mut method = class.create_method(name, void_proto());
            let r0 = method.alloc_register().unwrap();
            method.build_const_string(r0, "shared literal");
            method.build_return();
            method.encode().unwrap();
        }
    }

    let sink = dex.sink();
    let shared: Vec<_> = sink
        .strings
        .iter()
        .filter(|(_, s)| s == "shared literal")
        .collect();
    assert_eq!(shared.len(), 1);

    // both bodies reference the same string index
    let first = recorded_code(&dex, 0);
    let second = recorded_code(&dex, 1);
    assert_eq!(first.units, second.units);
}

#[test]
fn test_calls_into_undeclared_methods_fail_the_build() {
    let mut dex = DexBuilder::new(RecordingSink::default());
    let mut class = dex.make_class("com.example.Broken");
    let mut method = class.create_method("run", void_proto());
    let r0 = method.alloc_register().unwrap();
    method.add_instruction(dexgen_builder::Instruction::invoke_virtual(
        MethodIndex::new(500),
        None,
        r0,
        &[],
    ));
    let err = method.encode().unwrap_err();
    assert!(matches!(err, BuilderError::UnknownSymbol { .. }));
}

#[test]
fn test_image_production_consumes_the_build() {
    let mut dex = DexBuilder::new(RecordingSink::default());
    {
        let mut class = dex.make_class("com.example.Empty");
        let mut method = class.create_method("nothing", void_proto());
        method.build_return();
        method.encode().unwrap();
    }
    // the recording sink assembles nothing; a real container writer would
    // sort and fix up offsets here
    let image = dex.into_image();
    assert!(image.is_empty());
}
