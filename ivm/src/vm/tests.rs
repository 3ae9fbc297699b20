use super::*;
use iloc_ir::parse_program;
use pretty_assertions::assert_eq;

fn run(source: &str) -> (Result<i32, IlocError>, String) {
    let program = parse_program(source).unwrap();
    let mut vm = Interpreter::with_writer(Vec::new());
    let result = vm.process(&program);
    let output = String::from_utf8(vm.into_writer()).unwrap();
    (result, output)
}

#[test]
fn test_return_value_and_print() {
    let (result, output) = run(
        ".function int main() locals=0
            print \"x=\"
            loadI 5 => r1
            print r1
            print \"\\n\"
            i2i r1 => ret
            return",
    );
    assert_eq!(result, Ok(5));
    assert_eq!(output, "x=5\n");
}

#[test]
fn test_globals_are_addressed_from_zero() {
    let program = parse_program(
        ".global x int @0
         .global a int[2] @4
         .function int main() locals=0
            loadI 7 => r1
            loadI 0 => r2
            store r1 => r2
            loadI 9 => r3
            storeAI r3 => r2, 8
            load r2 => r4
            loadAI r2, 8 => r5
            add r4, r5 => r6
            i2i r6 => ret
            return",
    )
    .unwrap();
    let mut vm = Interpreter::with_writer(Vec::new());
    assert_eq!(vm.process(&program), Ok(16));
    assert_eq!(vm.memory.load_word(0), Ok(7));
    assert_eq!(vm.memory.load_word(8), Ok(9));

    vm.dump_state().unwrap();
    let dump = String::from_utf8(vm.into_writer()).unwrap();
    assert!(dump.contains("  global x = 7\n"));
    assert!(dump.contains("  global a = [0,9]\n"));
}

#[test]
fn test_frame_layout_and_stack_unwinding() {
    let program = parse_program(
        ".function int main() locals=8
            loadI 3 => r1
            storeAI r1 => bp, -4
            loadAI bp, -4 => r2
            i2i r2 => ret
            return",
    )
    .unwrap();
    let mut vm = Interpreter::with_writer(Vec::new());
    assert_eq!(vm.process(&program), Ok(3));
    // Return address and saved BP of main sit at the top of memory
    assert_eq!(vm.memory.load_word(STACK_TOP - 4), Ok(RETURN_SENTINEL));
    assert_eq!(vm.memory.load_word(STACK_TOP - 8), Ok(STACK_TOP));
    assert_eq!(vm.memory.load_word(STACK_TOP - 12), Ok(3));
    assert_eq!(vm.sp, STACK_TOP);
    assert_eq!(vm.bp, STACK_TOP);
    assert_eq!(vm.state, VMState::Halted);
}

#[test]
fn test_physical_and_virtual_registers_do_not_alias() {
    let (result, _) = run(
        ".function int main() locals=0
            loadI 1 => r0
            loadI 2 => p0
            add r0, p0 => p1
            i2i p1 => ret
            return",
    );
    assert_eq!(result, Ok(3));
}

#[test]
fn test_arithmetic_wraps() {
    let (result, _) = run(
        ".function int main() locals=0
            loadI 2147483647 => r1
            addI r1, 1 => r2
            i2i r2 => ret
            return",
    );
    assert_eq!(result, Ok(i32::MIN));
}

#[test]
fn test_boolean_ops() {
    let (result, _) = run(
        ".function int main() locals=0
            loadI 3 => r1
            loadI 0 => r2
            and r1, r2 => r3
            or r1, r2 => r4
            not r3 => r5
            cmp_GE r1, r2 => r6
            add r4, r5 => r7
            add r7, r6 => r8
            neg r8 => r9
            i2i r9 => ret
            return",
    );
    assert_eq!(result, Ok(-3));
}

#[test]
fn test_unassigned_register_is_fatal() {
    let (result, _) = run(
        ".function int main() locals=0
            i2i r4 => ret
            return",
    );
    assert_eq!(result, Err(IlocError::UnassignedRegister("r4".to_string())));
}

#[test]
fn test_targets_are_resolved_before_running() {
    let (result, output) = run(
        ".function int main() locals=0
            print \"never\"
            jump l3
            return",
    );
    assert_eq!(result, Err(IlocError::UnresolvedLabel(3)));
    assert_eq!(output, "");

    let (result, _) = run(
        ".function int main() locals=0
            call missing
            return",
    );
    assert_eq!(result, Err(IlocError::UnresolvedCall("missing".to_string())));

    let (result, _) = run(".function int helper() locals=0\n    return");
    assert_eq!(result, Err(IlocError::UnresolvedCall("main".to_string())));

    let (result, _) = run(
        ".function int main() locals=0
         l1:
            nop
         l1:
            return",
    );
    assert_eq!(result, Err(IlocError::DuplicateLabel(1)));
}

#[test]
fn test_stack_overflow() {
    let (result, _) = run(".function int main() locals=70000\n    return");
    assert!(matches!(result, Err(IlocError::StackOverflow { .. })));
}

#[test]
fn test_division_by_zero_and_bad_address() {
    let (result, _) = run(
        ".function int main() locals=0
            loadI 1 => r1
            loadI 0 => r2
            div r1, r2 => r3
            return",
    );
    assert!(matches!(result, Err(IlocError::DivisionByZero { .. })));

    let (result, _) = run(
        ".function int main() locals=0
            loadI 65535 => r1
            load r1 => r2
            return",
    );
    assert_eq!(result, Err(IlocError::MemoryOutOfBounds { address: 65535 }));
}

#[test]
fn test_dump_rejects_global_past_address_range() {
    let mut program = parse_program(
        ".function int main() locals=0
            loadI 0 => ret
            return",
    )
    .unwrap();
    // Second element lands beyond i32::MAX
    program.add_global(Symbol {
        element_size: i32::MAX,
        ..Symbol::global_array("wide", iloc_common::DataType::Int, 2, 4)
    });

    let mut vm = Interpreter::with_writer(Vec::new()).with_trace(true);
    assert_eq!(
        vm.process(&program),
        Err(IlocError::MemoryOutOfBounds { address: 2_147_483_651 })
    );

    // Without tracing the globals are never read
    let mut vm = Interpreter::with_writer(Vec::new());
    assert_eq!(vm.process(&program), Ok(0));
}

#[test]
fn test_wrong_operand_kind_is_fatal() {
    let (result, _) = run(
        ".function int main() locals=0
            loadI 1 => 5
            return",
    );
    assert!(matches!(result, Err(IlocError::InvalidOperand { .. })));
}

#[test]
fn test_unknown_opcode_is_advisory() {
    let program = parse_program(
        ".function int main() locals=0
            frobnicate r1, r2
            print bp
            loadI 4 => ret
            return",
    )
    .unwrap();
    let mut vm = Interpreter::with_writer(Vec::new());
    assert_eq!(vm.process(&program), Ok(4));
    assert_eq!(vm.advisories(), 2);
}

#[test]
fn test_trace_output() {
    let program = parse_program(
        ".function int main() locals=0
            loadI 7 => r1
            i2i r1 => ret
            return",
    )
    .unwrap();
    let mut vm = Interpreter::with_writer(Vec::new()).with_trace(true);
    assert_eq!(vm.process(&program), Ok(7));
    let trace = String::from_utf8(vm.into_writer()).unwrap();

    assert!(trace.starts_with("\nAll code:\n   0: main:\n   1: loadI 7 => r1\n"));
    assert!(trace.contains("Calling main()\n"));
    assert!(trace.contains("Executing: i2i r1 => ret\n"));
    assert!(trace.contains("  ip=3 sp=65528 bp=65528 ret=7\n  registers: { r1=7 }\n"));
    assert!(trace.contains("  stack:\n    65532: -1\n    65528: 65536\n"));
}

#[test]
fn test_process_starts_fresh() {
    let program = parse_program(
        ".function int main() locals=0
            loadI 11 => r1
            i2i r1 => ret
            return",
    )
    .unwrap();
    let mut vm = Interpreter::with_writer(Vec::new());
    assert_eq!(vm.process(&program), Ok(11));
    let steps = vm.steps();
    assert_eq!(vm.process(&program), Ok(11));
    assert_eq!(vm.steps(), steps);
    assert_eq!(vm.registers.len(), 1);
}
