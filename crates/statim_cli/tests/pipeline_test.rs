//! Exercises the driver's own `pipeline` module directly (lex through
//! codegen), the same entry points `main` calls, rather than spawning the
//! compiled binary — this workspace never shells out to an assembler or
//! linker, so there is nothing downstream of the generated `.s` text to
//! execute against.

use statim_cli::pipeline;

#[test]
fn compiles_a_trivial_function_to_assembly() {
    let checked = pipeline::check("trivial.stm", "func main() -> i64 { return 0; }").expect("pipeline should succeed");
    let asm = pipeline::codegen(&checked).expect("codegen should succeed");
    let asm = String::from_utf8(asm).expect("assembly should be valid UTF-8");
    assert!(asm.contains("main:"), "{asm}");
    assert!(asm.contains("ret"), "{asm}");
}

#[test]
fn rejects_a_type_error_before_reaching_codegen() {
    let result = pipeline::check("bad.stm", "func main() -> i64 { return \"not an int\"; }");
    assert!(result.is_err(), "a string literal should not type-check against an i64 return");
}

#[test]
fn render_ir_reports_the_lowered_function_without_running_codegen() {
    let checked = pipeline::check("ir.stm", "func add(a: i32, b: i32) -> i32 { return a + b; }").expect("pipeline should succeed");
    let rendered = pipeline::render_ir(&checked);
    assert!(rendered.contains("add"), "{rendered}");
}
