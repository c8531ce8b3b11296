//! Scenario tests driving whole method listings through the emulator,
//! mirroring the per-opcode suite of the reference test corpus.

use rstest::rstest;
use smalvm_runtime::{ClassLoader, Emulator, Source, Value, VmConfig, VmError};
use std::collections::HashMap;

fn run(text: &str, args: &[(&str, Value)]) -> (Emulator, Result<Value, VmError>) {
    let mut emu = Emulator::new(ClassLoader::new());
    let args: HashMap<String, Value> = args
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect();
    let result = emu.exec_source(&Source::from(text), args);
    (emu, result)
}

fn run_ok(text: &str, args: &[(&str, Value)]) -> (Emulator, Value) {
    let (emu, result) = run(text, args);
    (emu, result.expect("method should complete"))
}

#[test]
fn returns_a_literal() {
    let (_, result) = run_ok("const/4 v0, 0x5\nreturn v0\n", &[]);
    assert_eq!(result, Value::Integer(5));
}

#[test]
fn void_method_returns_null() {
    let (_, result) = run_ok("nop\nreturn-void\n", &[]);
    assert_eq!(result, Value::Null);
}

#[rstest]
#[case("add-int", 7, 3, 10)]
#[case("sub-int", 7, 3, 4)]
#[case("mul-int", 7, 3, 21)]
#[case("div-int", 7, 3, 2)]
#[case("div-int", -7, 2, -3)]
#[case("rem-int", 7, 3, 1)]
#[case("and-int", 0b1100, 0b1010, 0b1000)]
#[case("or-int", 0b1100, 0b1010, 0b1110)]
#[case("xor-int", 0b1100, 0b1010, 0b0110)]
#[case("shl-int", 1, 5, 32)]
#[case("shr-int", -32, 2, -8)]
#[case("ushr-int", -1, 28, 15)]
fn int_arithmetic(#[case] op: &str, #[case] a: i32, #[case] b: i32, #[case] expected: i32) {
    let source = format!("{} v0, v1, v2\nreturn v0\n", op);
    let (_, result) = run_ok(
        &source,
        &[("v1", Value::Integer(a)), ("v2", Value::Integer(b))],
    );
    assert_eq!(result, Value::Integer(expected));
}

#[rstest]
#[case("add-int/lit8 v0, v1, 0x5", 4, 9)]
#[case("add-int/lit8 v0, v1, -0x1", 4, 3)]
#[case("mul-int/lit16 v0, v1, 0x100", 3, 768)]
#[case("div-int/lit8 v0, v1, 0x2", 9, 4)]
fn int_literal_variants(#[case] line: &str, #[case] a: i32, #[case] expected: i32) {
    let source = format!("{}\nreturn v0\n", line);
    let (_, result) = run_ok(&source, &[("v1", Value::Integer(a))]);
    assert_eq!(result, Value::Integer(expected));
}

#[test]
fn two_addr_variant_accumulates() {
    let (_, result) = run_ok(
        "add-int/2addr v0, v1\nreturn v0\n",
        &[("v0", Value::Integer(40)), ("v1", Value::Integer(2))],
    );
    assert_eq!(result, Value::Integer(2 + 40));
}

#[rstest]
#[case(20, 4, 5)]
#[case(-20, 4, -5)]
#[case(7, -2, -3)]
fn div_int_truncates_toward_zero(#[case] x: i32, #[case] y: i32, #[case] expected: i32) {
    let (_, result) = run_ok(
        "div-int v0, v1, v2\nreturn v0\n",
        &[("v1", Value::Integer(x)), ("v2", Value::Integer(y))],
    );
    assert_eq!(result, Value::Integer(expected));
}

#[test]
fn division_by_zero_surfaces_as_arithmetic_exception() {
    let (_, result) = run(
        "div-int v0, v1, v2\nreturn v0\n",
        &[("v1", Value::Integer(1)), ("v2", Value::Integer(0))],
    );
    assert!(matches!(
        result,
        Err(VmError::UncaughtException { class_name, .. })
            if class_name == "java.lang.ArithmeticException"
    ));
}

#[test]
fn division_by_zero_is_catchable() {
    let source = "\
:try_start_0
div-int v0, v1, v2
:try_end_0
.catch Ljava/lang/ArithmeticException; {:try_start_0 .. :try_end_0} :catch_0
return v0
:catch_0
const/4 v0, -0x1
return v0
";
    let (_, result) = run_ok(
        source,
        &[("v1", Value::Integer(1)), ("v2", Value::Integer(0))],
    );
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn long_arithmetic_and_const_wide() {
    let source = "\
const-wide v0, 0x100000000L
const-wide/16 v1, 0x2
mul-long v0, v0, v1
return-wide v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Long(0x2_0000_0000));
}

#[test]
fn cmp_long_orders() {
    let (_, result) = run_ok(
        "cmp-long v0, v1, v2\nreturn v0\n",
        &[("v1", Value::Long(3)), ("v2", Value::Long(9))],
    );
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn float_arithmetic_reads_const_bits() {
    // 0x40a00000 is 5.0f, 0x40000000 is 2.0f
    let source = "\
const v0, 0x40a00000
const v1, 0x40000000
div-float v0, v0, v1
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Float(2.5));
}

#[rstest]
#[case("cmpl-float", -1)]
#[case("cmpg-float", 1)]
fn nan_biases_comparisons(#[case] op: &str, #[case] expected: i32) {
    // 0x7fc00000 is a float NaN
    let source = format!(
        "const v1, 0x7fc00000\nconst v2, 0x0\n{} v0, v1, v2\nreturn v0\n",
        op
    );
    let (_, result) = run_ok(&source, &[]);
    assert_eq!(result, Value::Integer(expected));
}

#[test]
fn branch_loop_accumulates() {
    let source = "\
const/4 v0, 0x0
const/4 v1, 0x5
:loop_0
if-lez v1, :done_0
add-int v0, v0, v1
add-int/lit8 v1, v1, -0x1
goto :loop_0
:done_0
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(15));
}

#[test]
fn unwritten_register_is_null_and_zero_branches() {
    let source = "\
if-eqz v7, :null_0
const/4 v0, 0x0
return v0
:null_0
const/4 v0, 0x1
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(1));
}

#[rstest]
#[case("neg-int", Value::Integer(5), Value::Integer(-5))]
#[case("not-int", Value::Integer(0), Value::Integer(-1))]
#[case("int-to-byte", Value::Integer(0x181), Value::Integer(-127))]
#[case("int-to-char", Value::Integer(0x41), Value::Char(0x41))]
#[case("int-to-long", Value::Integer(-2), Value::Long(-2))]
#[case("long-to-int", Value::Long(0x1_0000_0001), Value::Integer(1))]
#[case("int-to-double", Value::Integer(3), Value::Double(3.0))]
#[case("double-to-int", Value::Double(3.9), Value::Integer(3))]
fn unary_ops_and_conversions(#[case] op: &str, #[case] input: Value, #[case] expected: Value) {
    let source = format!("{} v0, v1\nreturn v0\n", op);
    let (_, result) = run_ok(&source, &[("v1", input)]);
    assert_eq!(result, expected);
}

#[test]
fn arrays_read_back_what_was_written() {
    let source = "\
const/4 v0, 0x3
new-array v1, v0, [I
const/4 v2, 0x1
const/16 v3, 0x2a
aput v3, v1, v2
aget v0, v1, v2
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn array_length_reports_allocation_size() {
    let source = "\
const/4 v0, 0x4
new-array v1, v0, [B
array-length v0, v1
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(4));
}

#[test]
fn out_of_range_index_is_catchable() {
    let source = "\
const/4 v0, 0x1
new-array v1, v0, [I
const/4 v2, 0x5
:try_start_0
aget v0, v1, v2
:try_end_0
.catch Ljava/lang/ArrayIndexOutOfBoundsException; {:try_start_0 .. :try_end_0} :catch_0
return v0
:catch_0
const/4 v0, -0x1
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn null_array_access_is_a_null_pointer_exception() {
    let (_, result) = run("aget v0, v1, v2\nreturn v0\n", &[("v2", Value::Integer(0))]);
    assert!(matches!(
        result,
        Err(VmError::UncaughtException { class_name, .. })
            if class_name == "java.lang.NullPointerException"
    ));
}

#[test]
fn fill_array_data_decodes_little_endian_words() {
    let source = "\
const/4 v0, 0x2
new-array v1, v0, [I
fill-array-data v1, :array_0
const/4 v2, 0x1
aget v0, v1, v2
return v0
:array_0
.array-data 4
    0x100
    -0x2
.end array-data
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(-2));
}

#[test]
fn filled_new_array_lands_in_the_result_slot() {
    let source = "\
const/4 v0, 0x7
const/4 v1, 0x9
filled-new-array {v0, v1}, [I
move-result-object v2
const/4 v0, 0x0
aget v0, v2, v0
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(7));
}

#[rstest]
#[case(0, 10)]
#[case(1, 20)]
#[case(2, 30)]
#[case(5, 99)]
#[case(-3, 99)]
fn packed_switch_routes_or_falls_through(#[case] input: i32, #[case] expected: i32) {
    let source = "\
packed-switch p0, :pswitch_data_0
const/16 v0, 0x63
return v0
:pswitch_0
const/16 v0, 0xa
return v0
:pswitch_1
const/16 v0, 0x14
return v0
:pswitch_2
const/16 v0, 0x1e
return v0
:pswitch_data_0
.packed-switch 0x0
    :pswitch_0
    :pswitch_1
    :pswitch_2
.end packed-switch
";
    let (_, result) = run_ok(source, &[("p0", Value::Integer(input))]);
    assert_eq!(result, Value::Integer(expected));
}

#[rstest]
#[case(1, 11)]
#[case(16, 22)]
#[case(3, 99)]
fn sparse_switch_matches_exact_keys(#[case] input: i32, #[case] expected: i32) {
    let source = "\
sparse-switch p0, :sswitch_data_0
const/16 v0, 0x63
return v0
:sswitch_0
const/16 v0, 0xb
return v0
:sswitch_1
const/16 v0, 0x16
return v0
:sswitch_data_0
.sparse-switch
    0x1 -> :sswitch_0
    0x10 -> :sswitch_1
.end sparse-switch
";
    let (_, result) = run_ok(source, &[("p0", Value::Integer(input))]);
    assert_eq!(result, Value::Integer(expected));
}

#[test]
fn thrown_exception_round_trips_through_the_handler() {
    let source = "\
:try_start_0
new-instance v0, Ljava/lang/NullPointerException;
invoke-direct {v0}, Ljava/lang/NullPointerException;-><init>()V
throw v0
:try_end_0
.catch Ljava/lang/NullPointerException; {:try_start_0 .. :try_end_0} :handler
const/4 v0, 0x0
return v0
:handler
move-exception v1
const/4 v0, -0x1
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn uncaught_exception_carries_class_and_message() {
    let source = "\
new-instance v0, Ljava/lang/IllegalStateException;
const-string v1, \"boom\"
invoke-direct {v0, v1}, Ljava/lang/IllegalStateException;-><init>(Ljava/lang/String;)V
throw v0
";
    let (_, result) = run(source, &[]);
    match result {
        Err(VmError::UncaughtException {
            class_name,
            message,
        }) => {
            assert_eq!(class_name, "java.lang.IllegalStateException");
            assert_eq!(message.as_deref(), Some("boom"));
        }
        other => panic!("expected an uncaught exception, got {:?}", other),
    }
}

#[test]
fn string_builder_chains_appends() {
    let source = "\
new-instance v0, Ljava/lang/StringBuilder;
invoke-direct {v0}, Ljava/lang/StringBuilder;-><init>()V
const-string v1, \"x=\"
invoke-virtual {v0, v1}, Ljava/lang/StringBuilder;->append(Ljava/lang/String;)Ljava/lang/StringBuilder;
move-result-object v0
const/16 v1, 0x2a
invoke-virtual {v0, v1}, Ljava/lang/StringBuilder;->append(I)Ljava/lang/StringBuilder;
move-result-object v0
invoke-virtual {v0}, Ljava/lang/StringBuilder;->toString()Ljava/lang/String;
move-result-object v0
return-object v0
";
    let (emu, result) = run_ok(source, &[]);
    assert_eq!(emu.value_bytes(result).unwrap(), b"x=42");
}

#[test]
fn string_equality_is_content_but_if_eq_is_identity() {
    let source = "\
const-string v0, \"ab\"
const-string v1, \"ab\"
if-eq v0, v1, :same_ref
invoke-virtual {v0, v1}, Ljava/lang/String;->equals(Ljava/lang/Object;)Z
move-result v2
return v2
:same_ref
const/4 v2, -0x1
return v2
";
    let (_, result) = run_ok(source, &[]);
    // distinct objects, equal content
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn string_char_at_and_length() {
    let source = "\
const-string v0, \"MK\"
const/4 v1, 0x1
invoke-virtual {v0, v1}, Ljava/lang/String;->charAt(I)C
move-result v2
invoke-virtual {v0}, Ljava/lang/String;->length()I
move-result v3
add-int v2, v2, v3
return v2
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer('K' as i32 + 2));
}

#[test]
fn const_string_unescapes() {
    let (emu, result) = run_ok("const-string v0, \"a\\nb\"\nreturn-object v0\n", &[]);
    assert_eq!(emu.value_bytes(result).unwrap(), b"a\nb");
}

#[test]
fn integer_parse_int_with_radix() {
    let source = "\
const-string v0, \"ff\"
const/16 v1, 0x10
invoke-static {v0, v1}, Ljava/lang/Integer;->parseInt(Ljava/lang/String;I)I
move-result v0
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(255));
}

#[test]
fn number_format_exception_is_catchable() {
    let source = "\
const-string v0, \"nope\"
:try_start_0
invoke-static {v0}, Ljava/lang/Integer;->parseInt(Ljava/lang/String;)I
move-result v1
:try_end_0
.catch Ljava/lang/NumberFormatException; {:try_start_0 .. :try_end_0} :catch_0
return v1
:catch_0
const/4 v1, -0x1
return v1
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(-1));
}

#[test]
fn boxing_round_trips() {
    let source = "\
const/16 v0, 0x2a
invoke-static {v0}, Ljava/lang/Integer;->valueOf(I)Ljava/lang/Integer;
move-result-object v1
invoke-virtual {v1}, Ljava/lang/Integer;->intValue()I
move-result v0
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn reflect_array_new_instance() {
    let source = "\
const-class v0, Ljava/lang/String;
const/4 v1, 0x3
invoke-static {v0, v1}, Ljava/lang/reflect/Array;->newInstance(Ljava/lang/Class;I)Ljava/lang/Object;
move-result-object v2
array-length v0, v2
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(3));
}

#[test]
fn string_value_of_renders_primitives() {
    let source = "\
invoke-static {p0}, Ljava/lang/String;->valueOf(I)Ljava/lang/String;
move-result-object v0
return-object v0
";
    let (emu, result) = run_ok(source, &[("p0", Value::Integer(-7))]);
    assert_eq!(emu.value_bytes(result).unwrap(), b"-7");
}

#[test]
fn step_budget_aborts_runaway_loops() {
    let mut emu = Emulator::with_config(
        ClassLoader::new(),
        VmConfig {
            step_budget: Some(10),
            ..VmConfig::default()
        },
    );
    let source = Source::from(":loop_0\ngoto :loop_0\n");
    let result = emu.exec_source(&source, HashMap::new());
    assert!(matches!(result, Err(VmError::StepBudgetExceeded(10))));
}

#[test]
fn unknown_opcodes_are_rejected() {
    let (_, result) = run("frobnicate v0\nreturn v0\n", &[]);
    assert!(matches!(result, Err(VmError::UnknownOpcode { .. })));
}

#[test]
fn throwing_a_null_reference_degrades_to_npe() {
    let (_, result) = run("throw v0\n", &[]);
    assert!(matches!(
        result,
        Err(VmError::UncaughtException { class_name, .. })
            if class_name == "java.lang.NullPointerException"
    ));
}

#[test]
fn monitors_are_no_ops() {
    let source = "\
monitor-enter v0
const/4 v0, 0x1
monitor-exit v0
return v0
";
    let (_, result) = run_ok(source, &[]);
    assert_eq!(result, Value::Integer(1));
}

#[test]
fn stats_count_executed_steps() {
    let (emu, _) = run_ok("const/4 v0, 0x5\nreturn v0\n", &[]);
    assert_eq!(emu.stats().steps, 2);
}
