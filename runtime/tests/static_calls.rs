//! Tests running methods of loaded classes: `<clinit>` followed by a second
//! call observing the static fields, invocations between user methods, and
//! exception propagation across frames.

use rstest::rstest;
use smalvm_runtime::{ClassLoader, Emulator, Value, VmConfig, VmError};
use std::collections::HashMap;
use std::path::PathBuf;

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(name)
}

fn emulator_with(files: &[&str]) -> Emulator {
    let mut loader = ClassLoader::new();
    for file in files {
        loader.load_class(testdata(file)).unwrap();
    }
    Emulator::new(loader)
}

fn int_args(values: &[(&str, i32)]) -> HashMap<String, Value> {
    values
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Integer(*value)))
        .collect()
}

#[rstest]
#[case(1, 0, 0, "MK")]
#[case(0, 1, 1, "Key is null or does not exist")]
fn clinit_then_method_reads_the_statics(
    #[case] p0: i32,
    #[case] p1: i32,
    #[case] p2: i32,
    #[case] expected: &str,
) {
    let mut emu = emulator_with(&["full_static_class.smali"]);
    emu.exec_method("com.a.a", "<clinit>", HashMap::new())
        .unwrap();
    assert!(emu.static_field("com.a.a", "k").is_some());

    let result = emu
        .exec_method("com.a.a", "a", int_args(&[("p0", p0), ("p1", p1), ("p2", p2)]))
        .unwrap();
    assert_eq!(emu.value_bytes(result).unwrap(), expected.as_bytes());
}

#[test]
fn without_clinit_the_static_is_null() {
    let mut emu = emulator_with(&["full_static_class.smali"]);
    let result = emu
        .exec_method("com.a.a", "a", int_args(&[("p0", 1), ("p1", 0), ("p2", 0)]))
        .unwrap();
    assert_eq!(
        emu.value_bytes(result).unwrap(),
        b"Key is null or does not exist"
    );
}

#[test]
fn null_byte_array_arguments_take_the_error_branch() {
    let mut emu = emulator_with(&["value_cannot_be_null.smali"]);
    let args: HashMap<String, Value> = [("p0", Value::Null), ("p1", Value::Null), ("p2", Value::Null)]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    let result = emu.exec_method("com.a.b", "a", args).unwrap();
    assert_eq!(emu.value_bytes(result).unwrap(), b"value cannot be null");
}

#[test]
fn recursive_user_invocations() {
    let mut emu = emulator_with(&["invokes.smali"]);
    let result = emu
        .exec_method("com.a.c", "fact", int_args(&[("p0", 5)]))
        .unwrap();
    assert_eq!(result, Value::Integer(120));
}

#[test]
fn callee_exception_is_caught_around_the_invoke() {
    let mut emu = emulator_with(&["invokes.smali"]);
    let result = emu.exec_method("com.a.c", "safe", HashMap::new()).unwrap();
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn callee_exception_escapes_when_unhandled() {
    let mut emu = emulator_with(&["invokes.smali"]);
    let result = emu.exec_method("com.a.c", "boom", HashMap::new());
    assert!(matches!(
        result,
        Err(VmError::UncaughtException { class_name, .. })
            if class_name == "java.lang.NullPointerException"
    ));
}

#[test]
fn unbounded_recursion_overflows_the_frame_stack() {
    let mut loader = ClassLoader::new();
    loader.load_class(testdata("invokes.smali")).unwrap();
    let mut emu = Emulator::with_config(
        loader,
        VmConfig {
            frame_stack_size: 16,
            ..VmConfig::default()
        },
    );
    let result = emu.exec_method("com.a.c", "down", HashMap::new());
    assert!(matches!(result, Err(VmError::StackOverflow(16))));
}

#[test]
fn instance_fields_flow_through_constructor_and_reader() {
    let mut emu = emulator_with(&["point.smali"]);
    let result = emu
        .exec_method("com.a.d", "make", int_args(&[("p0", 3), ("p1", 4)]))
        .unwrap();
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn unknown_class_and_method_are_reported() {
    let mut emu = emulator_with(&["point.smali"]);
    assert!(matches!(
        emu.exec_method("com.a.zz", "x", HashMap::new()),
        Err(VmError::UnknownClass(name)) if name == "com.a.zz"
    ));
    assert!(matches!(
        emu.exec_method("com.a.d", "nope", HashMap::new()),
        Err(VmError::UnknownMethod { .. })
    ));
}

#[test]
fn load_directory_picks_up_every_listing() {
    let mut loader = ClassLoader::new();
    let loaded = loader.load_directory(testdata("")).unwrap();
    assert_eq!(loaded.len(), 4);
    assert!(loader.contains_class("com.a.a"));
    assert!(loader.contains_class("com.a.d"));
}
