use assert_cmd::Command;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(name)
}

fn smalvm() -> Command {
    Command::cargo_bin("smalvm").unwrap()
}

#[test]
fn executes_a_parameterless_method() {
    smalvm()
        .args(["-i"])
        .arg(fixture("demo.smali"))
        .args(["-m", "five"])
        .assert()
        .success()
        .stdout("5\n");
}

#[test]
fn binds_parameters_from_the_literal_map() {
    smalvm()
        .args(["-i"])
        .arg(fixture("demo.smali"))
        .args(["-m", "inc", "-p", "{'p0': 41}"])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn string_parameters_reach_the_method() {
    smalvm()
        .args(["-i"])
        .arg(fixture("demo.smali"))
        .args(["-m", "greet", "-p", "{'p0': 'smali'}"])
        .assert()
        .success()
        .stdout("hello smali\n");
}

#[test]
fn malformed_params_exit_with_code_two() {
    smalvm()
        .args(["-i"])
        .arg(fixture("demo.smali"))
        .args(["-m", "inc", "-p", "{'p0': 1 + 1}"])
        .assert()
        .code(2);
}

#[test]
fn vm_errors_exit_with_code_one() {
    smalvm()
        .args(["-i"])
        .arg(fixture("demo.smali"))
        .args(["-m", "missing"])
        .assert()
        .code(1);
}
