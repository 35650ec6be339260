use quill_ir::builtins::codes;
use quill_ir::bytecode::{Instruction, Opcode, Operand, Program, ProgramBuilder};

use crate::{ErrorCode, StubHost, Value, Vm, VmOptions};

fn op(opcode: Opcode) -> Instruction {
    Instruction::new(opcode)
}

fn int(opcode: Opcode, n: i64) -> Instruction {
    Instruction::with_operand(opcode, Operand::Int(n))
}

fn string(s: &str) -> Instruction {
    Instruction::with_operand(Opcode::Const, Operand::String(s.to_owned()))
}

fn syscall(code: u16) -> Instruction {
    int(Opcode::Syscall, i64::from(code))
}

fn program(code: Vec<Instruction>) -> Program {
    let mut builder = ProgramBuilder::new(code.len());
    for instruction in code {
        builder.emit(instruction).unwrap();
    }
    builder.freeze(0)
}

struct Outcome {
    code: ErrorCode,
    stack: Vec<Value>,
    output: String,
    trace: String,
}

fn run_with(code: Vec<Instruction>, input: &str, options: VmOptions, debug: bool) -> Outcome {
    let program = program(code);
    let mut output = vec![];
    let mut trace = vec![];

    let (code, stack) = {
        let mut vm = Vm::new(&program, options, input.as_bytes(), &mut output, &mut trace);
        let code = vm.run(program.start(), debug);
        (code, vm.stack().to_vec())
    };

    Outcome {
        code,
        stack,
        output: String::from_utf8(output).unwrap(),
        trace: String::from_utf8(trace).unwrap(),
    }
}

fn run(code: Vec<Instruction>) -> Outcome {
    run_with(code, "", VmOptions::default(), false)
}

#[test]
fn arithmetic_and_print() {
    let outcome = run(vec![
        int(Opcode::Enter, 0),
        int(Opcode::Const, 7),
        int(Opcode::Const, 3),
        op(Opcode::SubI),
        int(Opcode::Const, 2),
        op(Opcode::MulI),
        syscall(codes::PRINTLN),
        int(Opcode::Const, -7),
        int(Opcode::Const, 2),
        op(Opcode::ModI),
        syscall(codes::PRINT),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "8\n-1");
    assert_eq!(outcome.stack, vec![Value::Address(0)]);
}

#[test]
fn floats_and_conversion() {
    let outcome = run(vec![
        int(Opcode::Const, 1),
        int(Opcode::Const, 2),
        int(Opcode::IToF, 2),
        op(Opcode::AddF),
        Instruction::with_operand(Opcode::Const, Operand::Float(0.5)),
        op(Opcode::SubF),
        syscall(codes::PRINT),
        Instruction::with_operand(Opcode::Const, Operand::Float(-2.9)),
        syscall(codes::FLOAT_TO_INT),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "2.5");
    assert_eq!(outcome.stack, vec![Value::Int(-2)]);
}

#[test]
fn comparisons_and_logic() {
    let outcome = run(vec![
        int(Opcode::Const, 1),
        int(Opcode::Const, 2),
        op(Opcode::Lt),
        string("b"),
        string("a"),
        op(Opcode::Ge),
        op(Opcode::And),
        op(Opcode::Not),
        string("ab"),
        string("c"),
        op(Opcode::Concat),
        string("abc"),
        op(Opcode::Eq),
        op(Opcode::Or),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.stack, vec![Value::Bool(true)]);
}

#[test]
fn call_and_return_restore_the_frame() {
    let code = vec![
        int(Opcode::Enter, 1),
        int(Opcode::Adjust, 1),
        int(Opcode::Const, 20),
        int(Opcode::Const, 22),
        int(Opcode::Call, 9),
        int(Opcode::Adjust, -2),
        int(Opcode::StoreG, 1),
        int(Opcode::LoadG, 1),
        op(Opcode::Halt),
        // add(a, b)
        int(Opcode::Enter, 0),
        int(Opcode::LoadL, -3),
        int(Opcode::LoadL, -2),
        op(Opcode::AddI),
        int(Opcode::StoreL, -4),
        int(Opcode::Return, 0),
    ];

    let outcome = run_with(code, "", VmOptions::default(), true);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(
        outcome.stack,
        vec![Value::Address(0), Value::Int(42), Value::Int(42)]
    );

    let lines: Vec<_> = outcome.trace.lines().collect();
    assert_eq!(lines.len(), 15);
    assert!(lines[0].starts_with("    0  ENTER #1"), "{}", lines[0]);
    assert!(lines[5].starts_with("    9  ENTER #0"), "{}", lines[5]);
    assert!(lines[5].ends_with("depth=6 base=0"), "{}", lines[5]);
    assert!(lines[6].ends_with("depth=7 base=6"), "{}", lines[6]);
}

#[test]
fn vectors_move_as_blocks() {
    let outcome = run(vec![
        int(Opcode::Enter, 3),
        int(Opcode::AddrG, 1),
        int(Opcode::Const, 4),
        int(Opcode::Const, 5),
        int(Opcode::Const, 6),
        int(Opcode::StoreB, 3),
        int(Opcode::AddrG, 1),
        int(Opcode::Const, 2),
        int(Opcode::Check, 3),
        op(Opcode::AddA),
        op(Opcode::LoadI),
        int(Opcode::AddrG, 2),
        int(Opcode::Const, 9),
        op(Opcode::StoreI),
        int(Opcode::AddrG, 1),
        int(Opcode::LoadB, 3),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(
        outcome.stack,
        vec![
            Value::Address(0),
            Value::Int(4),
            Value::Int(9),
            Value::Int(6),
            Value::Int(6),
            Value::Int(4),
            Value::Int(9),
            Value::Int(6),
        ]
    );
}

#[test]
fn jumps() {
    // Counts down from 3, printing each value.
    let outcome = run(vec![
        int(Opcode::Enter, 1),
        int(Opcode::Const, 3),
        int(Opcode::StoreG, 1),
        int(Opcode::LoadG, 1),
        int(Opcode::Const, 0),
        op(Opcode::Gt),
        int(Opcode::JumpF, 14),
        int(Opcode::LoadG, 1),
        syscall(codes::PRINT),
        int(Opcode::LoadG, 1),
        int(Opcode::Const, 1),
        op(Opcode::SubI),
        int(Opcode::StoreG, 1),
        int(Opcode::Jump, 3),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "321");
}

#[test]
fn reads_one_line_per_value() {
    let code = vec![
        Instruction::with_operand(Opcode::Read, Operand::Char('i')),
        Instruction::with_operand(Opcode::Read, Operand::Char('f')),
        Instruction::with_operand(Opcode::Read, Operand::Char('s')),
        syscall(codes::READ_BOOL),
        op(Opcode::Halt),
    ];

    let outcome = run_with(
        code,
        " 42\n2.5\nhello world\ntrue\n",
        VmOptions::default(),
        false,
    );

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(
        outcome.stack,
        vec![
            Value::Int(42),
            Value::Float(2.5),
            Value::String("hello world".to_owned()),
            Value::Bool(true),
        ]
    );
}

#[test]
fn bad_input_is_an_invalid_operand() {
    let code = || {
        vec![
            Instruction::with_operand(Opcode::Read, Operand::Char('i')),
            op(Opcode::Halt),
        ]
    };

    let outcome = run_with(code(), "forty-two\n", VmOptions::default(), false);
    assert_eq!(outcome.code, ErrorCode::InvalidOperand);

    let outcome = run_with(code(), "", VmOptions::default(), false);
    assert_eq!(outcome.code, ErrorCode::InvalidOperand);
}

#[test]
fn string_builtins() {
    let outcome = run(vec![
        int(Opcode::Enter, 2),
        string("hello"),
        int(Opcode::Const, 1),
        int(Opcode::Const, 3),
        syscall(codes::SUBSTRING),
        syscall(codes::PRINT),
        string("abc"),
        int(Opcode::Const, 2),
        syscall(codes::CHAR_VAL_AT),
        syscall(codes::PRINTLN),
        int(Opcode::Const, 104),
        int(Opcode::StoreG, 1),
        int(Opcode::Const, 105),
        int(Opcode::StoreG, 2),
        int(Opcode::AddrG, 1),
        int(Opcode::Const, 2),
        syscall(codes::BUILD_STRING_FROM_CHARS),
        syscall(codes::PRINT),
        Instruction::with_operand(Opcode::Const, Operand::Bool(true)),
        syscall(codes::TO_STRING),
        syscall(codes::STRLEN),
        op(Opcode::Halt),
    ]);

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "ell99\nhi");
    assert_eq!(outcome.stack.last(), Some(&Value::Int(4)));
}

#[test]
fn host_builtins() {
    let program = program(vec![
        string("colour"),
        string("blue"),
        syscall(codes::SET_VAR_VALUE),
        string("colour"),
        syscall(codes::GET_VAR_VALUE),
        syscall(codes::SHOW_TOAST),
        string("555"),
        string("hi"),
        syscall(codes::SEND_SMS),
        op(Opcode::Halt),
    ]);

    let mut output = vec![];
    let mut vm = Vm::new(
        &program,
        VmOptions::default(),
        "".as_bytes(),
        &mut output,
        Vec::<u8>::new(),
    )
    .with_host(StubHost::default());

    assert_eq!(vm.run(0, false), ErrorCode::None);
    assert_eq!(vm.stack(), &[Value::Bool(true)]);
    assert_eq!(vm.host().vars["colour"], "blue");
    assert_eq!(vm.host().events, vec!["toast blue", "sms 555: hi"]);
}

#[test]
fn handlers_share_the_global_frame() {
    let program = program(vec![
        int(Opcode::Enter, 1),
        int(Opcode::Const, 10),
        int(Opcode::StoreG, 1),
        op(Opcode::Halt),
        // handler
        int(Opcode::LoadG, 1),
        int(Opcode::Const, 1),
        op(Opcode::AddI),
        int(Opcode::StoreG, 1),
        op(Opcode::Halt),
    ]);

    let mut vm = Vm::new(
        &program,
        VmOptions::default(),
        "".as_bytes(),
        Vec::<u8>::new(),
        Vec::<u8>::new(),
    );

    assert_eq!(vm.run(0, false), ErrorCode::None);
    assert_eq!(vm.run(4, false), ErrorCode::None);
    assert_eq!(vm.run(4, false), ErrorCode::None);
    assert_eq!(vm.stack(), &[Value::Address(0), Value::Int(12)]);

    vm.reset();
    assert!(vm.stack().is_empty());
}

fn fault_of(code: Vec<Instruction>) -> ErrorCode {
    run_with(code, "", VmOptions { stack_size: 8 }, false).code
}

#[test]
fn faults_map_to_codes() {
    let cases = vec![
        (vec![int(Opcode::LoadG, 7)], ErrorCode::InvalidAddress),
        (
            vec![int(Opcode::Const, 1), int(Opcode::Const, 0), op(Opcode::DivI)],
            ErrorCode::InvalidOperand,
        ),
        (
            vec![
                int(Opcode::Const, 1),
                Instruction::with_operand(Opcode::Const, Operand::Bool(true)),
                op(Opcode::Eq),
            ],
            ErrorCode::InvalidOperand,
        ),
        (vec![op(Opcode::Const)], ErrorCode::InvalidOpcode),
        (vec![int(Opcode::Jump, 99)], ErrorCode::InvalidOpcode),
        (vec![syscall(99)], ErrorCode::InvalidOpcode),
        (
            vec![int(Opcode::Const, 5), int(Opcode::Check, 3)],
            ErrorCode::IndexOutOfRange,
        ),
        (
            vec![string("abc"), int(Opcode::Const, 3), syscall(codes::CHAR_VAL_AT)],
            ErrorCode::IndexOutOfRange,
        ),
        (
            vec![int(Opcode::Const, 1), int(Opcode::Jump, 0)],
            ErrorCode::StackOverflow,
        ),
        (vec![int(Opcode::Adjust, 9)], ErrorCode::StackOverflow),
        (vec![op(Opcode::AddI)], ErrorCode::StackUnderflow),
        (
            vec![
                int(Opcode::Const, i64::MAX),
                int(Opcode::Const, 1),
                op(Opcode::AddI),
            ],
            ErrorCode::IntegerOverflow,
        ),
        (
            vec![
                Instruction::with_operand(Opcode::Const, Operand::Float(1e300)),
                syscall(codes::FLOAT_TO_INT),
            ],
            ErrorCode::IntegerOverflow,
        ),
        (
            vec![
                int(Opcode::Enter, 1),
                int(Opcode::LoadG, 1),
                int(Opcode::Const, 1),
                op(Opcode::AddI),
            ],
            ErrorCode::NullOperand,
        ),
    ];

    for (code, expected) in cases {
        let listing = program(code.clone()).listing();
        assert_eq!(fault_of(code), expected, "{listing}");
    }
}

#[test]
fn faults_are_traced_in_debug_mode() {
    let code = vec![
        int(Opcode::Const, 1),
        int(Opcode::Const, 0),
        op(Opcode::DivI),
        op(Opcode::Halt),
    ];

    let outcome = run_with(code, "", VmOptions::default(), true);

    assert_eq!(outcome.code, ErrorCode::InvalidOperand);
    assert_eq!(
        outcome.trace.lines().last(),
        Some("fault 2: division by zero at 2")
    );
}
