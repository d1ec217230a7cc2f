//! Text IR parsed, printed and compiled end to end.

use ssa_bytecode::bytecode::Instruction;
use ssa_bytecode::compiler::UnitCompiler;
use ssa_bytecode::core::BuildError;
use ssa_bytecode::ir::ValueRef;
use ssa_bytecode::text_ir::{self, ParseError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper to check that output contains every expected line fragment.
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

const COUNTER: &str = r#"
; a loop that counts up to a limit held in a lexical
fn main {
entry:
    %zero = int 0
    setlocal i, %zero
    br ^check
check:
    %i = getlocal i
    %limit = getlexical limit
    %done = lt %i, %limit
    brif %done, ^exit
    %one = int 1
    %next = getlocal i
    %sum = add %next, %one
    setlocal i, %sum
    br ^check
exit:
    %f = function report
    %r = call %f(%i)
    ret %r
}

fn report {
    int 99            ; discarded
    ret
}
"#;

#[test]
fn test_counter_compiles() {
    init_logging();

    let unit = text_ir::parse_unit(COUNTER).unwrap();
    let (compiled, stats) = UnitCompiler::new(&unit).compile_with_stats().unwrap();

    let main = &compiled.functions[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.locals_names, vec!["i".to_string()]);
    let names: Vec<_> = main.basic_blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "check", "exit"]);

    assert_eq!(
        main.basic_blocks[0].instructions,
        vec![
            Instruction::MakeInteger(1, 0),
            Instruction::SetLocal(0, 1),
            Instruction::Branch(1),
        ]
    );
    // %i stays live into the exit block, so it keeps r1 throughout `check`.
    assert_eq!(
        main.basic_blocks[1].instructions,
        vec![
            Instruction::GetLocal(1, 0),
            Instruction::GetLocalLexical(2, "limit".into()),
            Instruction::OpLessThan(3, 1, 2),
            Instruction::BranchIf(2, 3),
            Instruction::MakeInteger(2, 1),
            Instruction::GetLocal(3, 0),
            Instruction::OpAdd(4, 3, 2),
            Instruction::SetLocal(0, 4),
            Instruction::Branch(1),
        ]
    );
    assert_eq!(
        main.basic_blocks[2].instructions,
        vec![
            Instruction::MakeFunction(2, 1),
            Instruction::Call(3, 2, vec![1]),
            Instruction::Return(3),
        ]
    );
    assert_eq!(main.registers, 4);

    let report = &compiled.functions[1];
    assert_eq!(report.registers, 0);
    assert_eq!(
        report.basic_blocks[0].instructions,
        vec![Instruction::MakeInteger(0, 99), Instruction::ReturnNull]
    );

    assert_eq!(stats.functions_compiled, 2);
    assert_eq!(stats.discarded_results, 1);
    assert_eq!(stats.largest_register_file_function, "main");
}

#[test]
fn test_print_lists_addresses_and_dependents() {
    init_logging();

    let unit = text_ir::parse_unit(COUNTER).unwrap();
    let output = text_ir::print(&unit);

    check_output_contains(
        &output,
        &[
            "fn main {",
            "  locals i",
            "entry:",
            "  0000: $1 = MakeInteger(0)",
            "  0001: SetLocal(0, $1)",
            "check:",
            "  0005: $4 = OpLessThan($2, $3)",
            "exit:",
            "  ; $1 -> 0001",
            "  ; $2 -> 0005 0013",
            "fn report {",
            "  ; $1 unused",
        ],
    );
}

#[test]
fn test_shared_operand_records_both_reads() {
    init_logging();

    let unit = text_ir::parse_unit(
        "fn main {\n  %f = getlexical f\n  %x = int 3\n  %r = call %f(%x, %x)\n  ret %r\n}\n",
    )
    .unwrap();
    let main = unit.entry().unwrap();
    assert_eq!(main.value(ValueRef::from_raw(2)).unwrap().dependents(), &[2, 2]);

    let compiled = UnitCompiler::new(&unit).compile().unwrap();
    assert_eq!(
        compiled.functions[0].basic_blocks[0].instructions[2],
        Instruction::Call(3, 1, vec![2, 2])
    );
}

#[test]
fn test_parse_errors_report_line() {
    init_logging();

    let err = text_ir::parse_unit("fn main {\n  ret\n}\nfn main {\n  ret\n}\n").unwrap_err();
    assert_eq!(err.line(), 4);

    let err = text_ir::parse_unit("fn main {\n  %f = function missing\n  ret\n}\n").unwrap_err();
    assert_eq!(
        err,
        ParseError::Build {
            line: 2,
            source: BuildError::FunctionNotFound {
                name: "missing".into()
            },
        }
    );

    let err = text_ir::parse_unit("fn main {\n  br ^nowhere\n}\n").unwrap_err();
    assert_eq!(err.line(), 2);
    assert!(err.to_string().contains("^nowhere"));

    let err = text_ir::parse_unit("fn main {\n  ret %ghost\n}\n").unwrap_err();
    assert!(err.to_string().starts_with("line 2:"));
}

#[test]
fn test_foreign_value_cannot_be_written() {
    init_logging();

    // Value names are scoped per function, so %x is unknown in `other`.
    let err = text_ir::parse_unit(
        "fn main {\n  %x = int 1\n  ret %x\n}\nfn other {\n  ret %x\n}\n",
    )
    .unwrap_err();
    assert_eq!(err.line(), 6);
    assert!(!matches!(err, ParseError::Build { .. }));
}
