//! End-to-end scenarios: renumber, allocate, and interpret whole programs

use iloc_common::IlocError;
use iloc_ir::regalloc::max_block_pressure;
use iloc_ir::{
    parse_program, verify_register_bound, Cfg, FunctionBody, IlocPass, LocalRegisterAllocator,
    Program, Renumberer,
};
use ivm::Interpreter;
use pretty_assertions::assert_eq;

/// `int a; a = 2 + 3 * 4; return a;`
const ASSIGN: &str = "\
.function int main() locals=4
    loadI 2 => r1
    loadI 3 => r2
    loadI 4 => r3
    mult r2, r3 => r4
    add r1, r4 => r5
    storeAI r5 => bp, -4
    loadAI bp, -4 => r6
    i2i r6 => ret
    return
";

/// `int i; i = 0; while (i < 10) { i = i + 1; } return i;`
const COUNT_LOOP: &str = "\
.function int main() locals=4
    loadI 0 => r1
    storeAI r1 => bp, -4
l1:
    loadAI bp, -4 => r2
    loadI 10 => r3
    cmp_LT r2, r3 => r4
    cbr r4 => l2, l3
l2:
    loadAI bp, -4 => r5
    addI r5, 1 => r6
    storeAI r6 => bp, -4
    jump l1
l3:
    loadAI bp, -4 => r7
    i2i r7 => ret
    return
";

/// Same loop with different register and label numbers
const COUNT_LOOP_RENAMED: &str = "\
.function int main() locals=4
    loadI 0 => r31
    storeAI r31 => bp, -4
l17:
    loadAI bp, -4 => r40
    loadI 10 => r33
    cmp_LT r40, r33 => r35
    cbr r35 => l12, l9
l12:
    loadAI bp, -4 => r36
    addI r36, 1 => r38
    storeAI r38 => bp, -4
    jump l17
l9:
    loadAI bp, -4 => r50
    i2i r50 => ret
    return
";

/// `int add(int a, int b) { return a + b; }  int main() { return add(2, 3); }`
const ADD_CALL: &str = "\
.function int add(int, int) locals=0
    loadAI bp, 8 => r1
    loadAI bp, 12 => r2
    add r1, r2 => r3
    i2i r3 => ret
    return
.function int main() locals=0
    loadI 3 => r5
    loadI 2 => r4
    param r5
    param r4
    call add
    i2i ret => r6
    i2i r6 => ret
    return
";

/// `int sub(int a, int b) { return a - b; }  int main() { return sub(7, 2); }`
const SUB_CALL: &str = "\
.function int sub(int, int) locals=0
    loadAI bp, 8 => r1
    loadAI bp, 12 => r2
    sub r1, r2 => r3
    i2i r3 => ret
    return
.function int main() locals=0
    loadI 2 => r5
    loadI 7 => r4
    param r5
    param r4
    call sub
    i2i ret => r6
    i2i r6 => ret
    return
";

/// Six values live at once in one block
const PRESSURE: &str = "\
.function int main() locals=0
    loadI 1 => r1
    loadI 2 => r2
    loadI 3 => r3
    loadI 4 => r4
    loadI 5 => r5
    loadI 6 => r6
    add r1, r2 => r7
    add r7, r3 => r8
    add r8, r4 => r9
    add r9, r5 => r10
    add r10, r6 => r11
    mult r11, r2 => r12
    i2i r12 => ret
    return
";

/// `int double(int x) { return x * 2; }  int main() { int a = 10; return a + double(4); }`
const LIVE_ACROSS_CALL: &str = "\
.function int double(int) locals=0
    loadAI bp, 8 => r1
    loadI 2 => r2
    mult r1, r2 => r3
    i2i r3 => ret
    return
.function int main() locals=0
    loadI 10 => r4
    loadI 4 => r5
    param r5
    call double
    i2i ret => r6
    add r4, r6 => r7
    i2i r7 => ret
    return
";

/// Recursive factorial of 5
const FACTORIAL: &str = "\
.function int fact(int) locals=0
    loadAI bp, 8 => r1
    loadI 1 => r2
    cmp_LE r1, r2 => r3
    cbr r3 => l1, l2
l1:
    loadI 1 => r4
    i2i r4 => ret
    return
l2:
    loadAI bp, 8 => r5
    loadI 1 => r6
    sub r5, r6 => r7
    param r7
    call fact
    i2i ret => r8
    loadAI bp, 8 => r9
    mult r9, r8 => r10
    i2i r10 => ret
    return
.function int main() locals=0
    loadI 5 => r11
    param r11
    call fact
    i2i ret => r12
    i2i r12 => ret
    return
";

/// Globals and print: `int total; ... print("total=", total);`
const PRINT_GLOBAL: &str = "\
.global total int @0
.function void main() locals=0
    loadI 0 => r1
    loadI 40 => r2
    addI r2, 2 => r3
    storeAI r3 => r1, 0
    print \"total=\"
    loadAI r1, 0 => r4
    print r4
    print \"\\n\"
    loadI 0 => ret
    return
";

fn parse(source: &str) -> Program {
    parse_program(source).unwrap()
}

fn run(program: &Program) -> (Result<i32, IlocError>, String) {
    let mut vm = Interpreter::with_writer(Vec::new());
    let result = vm.process(program);
    (result, String::from_utf8(vm.into_writer()).unwrap())
}

fn run_source(source: &str) -> i32 {
    run(&parse(source)).0.unwrap()
}

fn allocated(source: &str, regs: usize) -> Program {
    let mut program = parse(source);
    LocalRegisterAllocator::with_registers(regs)
        .process(&mut program)
        .unwrap();
    program
}

#[test]
fn test_scenario_results() {
    assert_eq!(run_source(ASSIGN), 14);
    assert_eq!(run_source(COUNT_LOOP), 10);
    assert_eq!(run_source(ADD_CALL), 5);
    assert_eq!(run_source(SUB_CALL), 5);
    assert_eq!(run_source(PRESSURE), 42);
    assert_eq!(run_source(LIVE_ACROSS_CALL), 18);
    assert_eq!(run_source(FACTORIAL), 120);
}

#[test]
fn test_print_output() {
    let (result, output) = run(&parse(PRINT_GLOBAL));
    assert_eq!(result, Ok(0));
    assert_eq!(output, "total=42\n");
}

#[test]
fn test_allocation_preserves_results() {
    let scenarios = [
        ASSIGN,
        COUNT_LOOP,
        ADD_CALL,
        SUB_CALL,
        PRESSURE,
        LIVE_ACROSS_CALL,
        FACTORIAL,
        PRINT_GLOBAL,
    ];
    for source in scenarios {
        let (expected, expected_output) = run(&parse(source));
        for regs in 2..=8 {
            let program = allocated(source, regs);
            verify_register_bound(&program, regs).unwrap();
            let (result, output) = run(&program);
            assert_eq!(result, expected, "budget {} for:\n{}", regs, program);
            assert_eq!(output, expected_output);
        }
    }
}

#[test]
fn test_high_pressure_block_spills() {
    let program = allocated(PRESSURE, 3);
    let listing = program.to_string();

    assert!(listing.contains("// spill r"), "{}", listing);
    assert!(listing.contains("// reload r"), "{}", listing);
    assert!(program.functions[0].local_size > 0);
    assert_eq!(run(&program).0, Ok(42));
}

#[test]
fn test_no_spills_at_block_pressure() {
    // None of these keep a register value alive across a call
    for source in [ASSIGN, COUNT_LOOP, ADD_CALL, PRESSURE, FACTORIAL] {
        let original = parse(source);
        let pressure = original
            .functions
            .iter()
            .flat_map(|f| Cfg::build(&f.instructions()).unwrap().blocks)
            .map(|block| max_block_pressure(&block))
            .max()
            .unwrap_or(0)
            .max(1);

        let mut program = original.clone();
        let stats = LocalRegisterAllocator::with_registers(pressure)
            .process(&mut program)
            .unwrap();
        assert_eq!(stats.spill_stores, 0, "{}", program);
        assert_eq!(stats.spill_loads, 0);
        for (before, after) in original.functions.iter().zip(&program.functions) {
            assert_eq!(before.local_size, after.local_size);
        }
    }
}

#[test]
fn test_values_survive_calls_after_allocation() {
    let program = allocated(LIVE_ACROSS_CALL, 3);
    let main = program.functions.iter().find(|f| f.name() == "main").unwrap();
    let listing = main.to_string();

    assert!(listing.contains("// save r4\n    call double\n"), "{}", listing);
    assert_eq!(main.local_size, 4);
    assert_eq!(run(&program).0, Ok(18));
}

#[test]
fn test_block_bodies_run_like_flat_bodies() {
    let flat = parse(COUNT_LOOP);
    let mut blocks = flat.clone();
    for function in blocks.functions.iter_mut() {
        function.cfg_mut().unwrap();
        assert!(matches!(function.body, FunctionBody::Blocks(_)));
    }

    let mut traced = Interpreter::with_writer(Vec::new()).with_trace(true);
    assert_eq!(traced.process(&flat), Ok(10));
    let flat_trace = traced.into_writer();

    let mut traced = Interpreter::with_writer(Vec::new()).with_trace(true);
    assert_eq!(traced.process(&blocks), Ok(10));
    assert_eq!(traced.into_writer(), flat_trace);
}

#[test]
fn test_renumbering_makes_programs_identical() {
    let mut first = parse(COUNT_LOOP);
    let mut second = parse(COUNT_LOOP_RENAMED);
    assert_ne!(first.to_string(), second.to_string());

    Renumberer::new().process(&mut first).unwrap();
    Renumberer::new().process(&mut second).unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(run(&second).0, Ok(10));
}

#[test]
fn test_renumber_then_allocate() {
    let mut program = parse(FACTORIAL);
    Renumberer::new().process(&mut program).unwrap();
    LocalRegisterAllocator::with_registers(2)
        .process(&mut program)
        .unwrap();
    verify_register_bound(&program, 2).unwrap();
    assert_eq!(run(&program).0, Ok(120));
}

#[test]
fn test_fatal_errors_halt() {
    let (result, _) = run(&parse(
        ".function int main() locals=0
            loadI 1 => r1
            cbr r1 => l4, l5
         l4:
            return",
    ));
    assert_eq!(result, Err(IlocError::UnresolvedLabel(5)));

    let (result, _) = run(&parse(
        ".function int recurse() locals=4000
            call recurse
            return
         .function int main() locals=0
            call recurse
            return",
    ));
    assert!(matches!(result, Err(IlocError::StackOverflow { .. })));
}
