//! Register allocation and block numbering properties.

use ssa_bytecode::bytecode::Instruction;
use ssa_bytecode::compiler::{self, BasicBlockFinder, UnitCompiler};
use ssa_bytecode::core::{BuildError, CompileError, CompileStats, RegisterAllocator};
use ssa_bytecode::ir::{FunctionId, InstructionBuilder, UnitBuilder, ValueRef, MAX_LOCALS};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_every_value_allocates_once() {
    init_logging();

    let mut allocator = RegisterAllocator::new();
    let live = ValueRef::from_raw(1);
    let dead = ValueRef::from_raw(2);

    assert_eq!(allocator.allocate(live, &[3]).unwrap(), 1);
    assert_eq!(
        allocator.allocate(live, &[3]),
        Err(CompileError::ValueAlreadyAllocated { value: live })
    );

    assert_eq!(allocator.allocate(dead, &[]).unwrap(), 0);
    assert_eq!(
        allocator.allocate(dead, &[]),
        Err(CompileError::ValueAlreadyAllocated { value: dead })
    );
}

#[test]
fn test_uses_replay_recorded_addresses_exactly_once() {
    init_logging();

    let mut allocator = RegisterAllocator::new();
    let value = ValueRef::from_raw(1);
    assert_eq!(allocator.allocate(value, &[4, 7]).unwrap(), 1);

    assert_eq!(
        allocator.use_value(value, 5),
        Err(CompileError::DependencyNotFound { value, address: 5 })
    );
    assert_eq!(allocator.use_value(value, 7).unwrap(), 1);
    assert_eq!(allocator.live_registers(), 1);
    assert_eq!(allocator.use_value(value, 4).unwrap(), 1);
    assert_eq!(allocator.live_registers(), 0);

    assert_eq!(
        allocator.use_value(value, 4),
        Err(CompileError::ValueNotLive { value })
    );
}

#[test]
fn test_dead_value_is_never_used() {
    init_logging();

    let mut allocator = RegisterAllocator::new();
    let dead = ValueRef::from_raw(1);
    assert_eq!(allocator.allocate(dead, &[]).unwrap(), 0);
    assert_eq!(allocator.registers_required(), 0);
    assert_eq!(
        allocator.use_value(dead, 0),
        Err(CompileError::ValueNotLive { value: dead })
    );
}

#[test]
fn test_freed_slot_is_reused_before_growing() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let a = main.build_make_integer(1).unwrap();
    let b = main.build_make_integer(2).unwrap();
    let x = main.get_or_add_local("x").unwrap();
    main.build_set_local(x, a).unwrap();
    let c = main.build_make_integer(3).unwrap();
    let y = main.get_or_add_local("y").unwrap();
    main.build_set_local(y, b).unwrap();
    main.build_set_local(x, c).unwrap();
    main.build_return_null().unwrap();

    let (compiled, stats) = UnitCompiler::new(&unit).compile_with_stats().unwrap();
    let function = &compiled.functions[0];
    assert_eq!(function.registers, 2);
    assert_eq!(
        function.instructions().cloned().collect::<Vec<_>>(),
        vec![
            Instruction::MakeInteger(1, 1),
            Instruction::MakeInteger(2, 2),
            Instruction::SetLocal(0, 1),
            Instruction::MakeInteger(1, 3),
            Instruction::SetLocal(1, 2),
            Instruction::SetLocal(0, 1),
            Instruction::ReturnNull,
        ]
    );
    assert_eq!(stats.registers_allocated, 3);
    assert_eq!(stats.registers_reused, 1);
    assert_eq!(stats.registers_freed, 3);
}

#[test]
fn test_lowest_free_slot_wins() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let a = main.build_make_integer(1).unwrap();
    let b = main.build_make_integer(2).unwrap();
    let c = main.build_make_integer(3).unwrap();
    main.build_set_local_lexical("c", c).unwrap();
    main.build_set_local_lexical("a", a).unwrap();
    let d = main.build_make_integer(4).unwrap();
    main.build_set_local_lexical("b", b).unwrap();
    main.build_set_local_lexical("d", d).unwrap();
    main.build_return_null().unwrap();

    let compiled = compiler::compile(&unit).unwrap();
    let function = &compiled.functions[0];
    // r1 and r3 are both free when d is allocated.
    assert_eq!(function.basic_blocks[0].instructions[5], Instruction::MakeInteger(1, 4));
    assert_eq!(function.registers, 3);
}

#[test]
fn test_block_ids_follow_creation_order() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let entry = main.entry_block();
    let exit = main.new_named_block("exit");
    let middle = main.new_block();
    main.build_return_null().unwrap();

    let other = unit.new_function("other").unwrap();
    let value = other.build_make_integer(1).unwrap();
    other.build_return(value).unwrap();
    other.push_block(true).unwrap();
    other.build_return_null().unwrap();

    let main = unit.function(FunctionId(0)).unwrap();
    let before = BasicBlockFinder::new(main).unwrap();
    let ids: Vec<_> = [entry, exit, middle]
        .iter()
        .map(|block| before.find(*block).unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    // Compiling another function first does not shift main's numbering.
    let mut stats = CompileStats::new();
    let other = unit.function(FunctionId(1)).unwrap();
    let compiled = compiler::FunctionCompiler::new(other).compile(&mut stats).unwrap();
    assert_eq!(compiled.basic_blocks.len(), 2);

    let after = BasicBlockFinder::new(main).unwrap();
    assert_eq!(after.len(), 3);
    for block in [entry, exit, middle] {
        assert_eq!(after.find(block).unwrap(), before.find(block).unwrap());
    }

    let compiled = compiler::FunctionCompiler::new(main).compile(&mut stats).unwrap();
    let names: Vec<_> = compiled.basic_blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "exit", "anonymous.2"]);
    let ids: Vec<_> = compiled.basic_blocks.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn test_full_local_table_compiles() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    for i in 0..MAX_LOCALS {
        let index = main.get_or_add_local(&format!("l{i}")).unwrap();
        let value = main.build_make_integer(i as i64).unwrap();
        main.build_set_local(index, value).unwrap();
    }
    assert_eq!(
        main.get_or_add_local("overflow"),
        Err(BuildError::TooManyLocals {
            name: "overflow".into()
        })
    );
    main.build_return_null().unwrap();

    let compiled = compiler::compile(&unit).unwrap();
    let function = &compiled.functions[0];
    assert_eq!(function.locals, 255);
    assert_eq!(function.locals_names.len(), MAX_LOCALS);
    assert_eq!(function.registers, 1);
    assert_eq!(
        function.basic_blocks[0].instructions[2 * 254 + 1],
        Instruction::SetLocal(254, 1)
    );
}

#[test]
fn test_foreign_value_is_rejected_at_build_time() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let other = unit.new_function("other").unwrap();
    let foreign = other.build_make_integer(9).unwrap();
    other.build_return(foreign).unwrap();

    let main = unit.new_function("main").unwrap();
    let own = main.build_make_integer(1).unwrap();
    assert_eq!(own.id(), foreign.id());
    assert_ne!(own, foreign);
    assert_eq!(
        main.build_return(foreign),
        Err(BuildError::UnknownValue { value: foreign })
    );
    main.build_return(own).unwrap();

    let compiled = compiler::compile(&unit).unwrap();
    assert_eq!(
        compiled.functions[1].basic_blocks[0].instructions,
        vec![Instruction::MakeInteger(1, 1), Instruction::Return(1)]
    );
}

#[test]
fn test_branches_lower_to_block_ids() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let entry = main.entry_block();
    let body = main.push_block(true).unwrap();
    let exit = main.new_named_block("exit");

    let limit = main.at(body).unwrap().build_make_integer(10).unwrap();
    let zero = main.at(body).unwrap().build_make_integer(0).unwrap();
    let cond = main.at(body).unwrap().build_op_less_than(zero, limit).unwrap();
    main.at(body).unwrap().build_branch_if(exit, cond).unwrap();
    main.at(body).unwrap().build_branch(entry).unwrap();

    let one = main.build_make_integer(1).unwrap();
    let two = main.build_make_integer(2).unwrap();
    let sum = main.build_op_add(one, two).unwrap();
    main.build_return(sum).unwrap();

    let compiled = compiler::compile(&unit).unwrap();
    let function = &compiled.functions[0];
    let names: Vec<_> = function.basic_blocks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["entry", "anonymous.1", "exit"]);
    assert_eq!(function.basic_blocks[0].instructions, vec![Instruction::Branch(1)]);
    assert_eq!(
        function.basic_blocks[1].instructions,
        vec![
            Instruction::MakeInteger(1, 10),
            Instruction::MakeInteger(2, 0),
            Instruction::OpLessThan(3, 2, 1),
            Instruction::BranchIf(2, 3),
            Instruction::Branch(0),
        ]
    );
    assert_eq!(
        function.basic_blocks[2].instructions,
        vec![
            Instruction::MakeInteger(1, 1),
            Instruction::MakeInteger(2, 2),
            Instruction::OpAdd(3, 1, 2),
            Instruction::Return(3),
        ]
    );
    assert_eq!(function.registers, 3);
}

/// Liveness ignores branch edges: `x` is read inside a loop but its slot is
/// handed to `y` after the read, even though the back edge reaches the read
/// again.
#[test]
fn test_liveness_is_linear_across_back_edges() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let x = main.build_make_integer(1).unwrap();
    let header = main.push_block(true).unwrap();
    let a = main.get_or_add_local("a").unwrap();
    main.build_set_local(a, x).unwrap();
    let y = main.build_make_integer(2).unwrap();
    main.build_branch_if(header, y).unwrap();
    main.build_return_null().unwrap();

    let compiled = compiler::compile(&unit).unwrap();
    let function = &compiled.functions[0];
    assert_eq!(function.registers, 1);
    assert_eq!(
        function.basic_blocks[1].instructions,
        vec![
            Instruction::SetLocal(0, 1),
            Instruction::MakeInteger(1, 2),
            Instruction::BranchIf(1, 1),
            Instruction::ReturnNull,
        ]
    );
}

/// Blocks compile in creation order, so a value defined in a block created
/// after the block that reads it is not live yet.
#[test]
fn test_blocks_compile_in_creation_order() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let main = unit.new_function("main").unwrap();
    let reader = main.new_block();
    let definer = main.new_block();
    let entry = main.entry_block();
    main.at(entry).unwrap().build_branch(definer).unwrap();

    let x = main.at(definer).unwrap().build_make_integer(7).unwrap();
    main.at(definer).unwrap().build_branch(reader).unwrap();
    main.at(reader).unwrap().build_return(x).unwrap();

    let err = compiler::compile(&unit).unwrap_err();
    assert_eq!(err.root_cause(), &CompileError::ValueNotLive { value: x });
}

#[test]
fn test_statistics_name_the_largest_register_file() {
    init_logging();

    let mut unit = UnitBuilder::new();
    let small = unit.new_function("small").unwrap();
    small.build_return_null().unwrap();

    let big = unit.new_function("big").unwrap();
    let f = big.build_get_local_lexical("f").unwrap();
    let a = big.build_make_integer(1).unwrap();
    let b = big.build_make_integer(2).unwrap();
    let result = big.build_call(f, &[a, b, a]).unwrap();
    big.build_return(result).unwrap();

    let (_, stats) = UnitCompiler::new(&unit).compile_with_stats().unwrap();
    assert_eq!(stats.functions_compiled, 2);
    assert_eq!(stats.instructions_compiled, 6);
    assert_eq!(stats.instruction_counts["MakeInteger"], 2);
    assert_eq!(stats.largest_register_file, 4);
    assert_eq!(stats.largest_register_file_function, "big");

    let report = stats.to_string();
    assert!(report.contains("Largest register file: big (4 registers)"));
}
