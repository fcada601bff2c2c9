use std::rc::Rc;

use rem_core::{
    Callable, ExitValue, ProgramImage, RegionId, RemConfig, RemError, RemResult, Value,
    VirtualMachine,
};
use rem_host::MemoryEnvironment;

fn machine_with(env: MemoryEnvironment) -> VirtualMachine {
    let config = RemConfig {
        main_memory_words: 0x400,
        stack_cells: 0x40,
        call_stack_words: 0x40,
        irs_words: 0x40,
        max_env_key_bytes: 64,
    };
    VirtualMachine::new(config, Box::new(env))
}

fn machine() -> VirtualMachine {
    machine_with(MemoryEnvironment::new())
}

#[test]
fn stack_roundtrips_every_value_kind() {
    let mut vm = machine();
    for value in [
        Value::Null,
        Value::Int(-3),
        Value::Float(1.25),
        Value::Pointer(RegionId::Main, 0x20),
        Value::Pointer(RegionId::Irs, 2),
    ] {
        let cell = Rc::new(value.clone());
        vm.stack_push(Rc::clone(&cell)).unwrap();
        let popped = vm.stack_pop().unwrap();
        assert_eq!(*popped, value);
        assert!(Rc::ptr_eq(&popped, &cell));
    }
}

#[test]
fn register_branch_takes_a_negative_displacement() {
    let mut vm = machine();
    vm.load_program(&[
        0x9105_FFFE,           // 0: cvt.int.i $5, -2
        0x7000_0003,           // 1: b.i 3 -> 4
        0x1000_0009,           // 2: exit.i 9
        0x1000_0007,           // 3: exit.i 7
        0x7100_0000 | 5 << 16, // 4: b.r $5 -> 4 - 2 = 2
    ])
    .unwrap();
    assert_eq!(vm.run().unwrap(), ExitValue::Int(9));
}

#[test]
fn absolute_register_branch_accepts_a_main_pointer() {
    let mut vm = machine();
    vm.load_program(&[
        0x9305_0003, // cvt.ptr.i $5, 3
        0x7300_0000 | 5 << 16, // b.abs.r $5
        0x1000_0001, // exit.i 1
        0x1000_0002, // exit.i 2
    ])
    .unwrap();
    assert_eq!(vm.run().unwrap(), ExitValue::Int(2));
}

#[test]
fn relative_register_branch_rejects_pointers() {
    let mut vm = machine();
    vm.load_program(&[0x7100_0000 | 5 << 16]).unwrap();
    vm.write_register(5, Rc::new(Value::Pointer(RegionId::Main, 2)))
        .unwrap();
    assert!(matches!(
        vm.run().unwrap_err(),
        RemError::TypeMismatch { expected: "int", .. }
    ));
}

#[test]
fn load_of_an_integer_variable_is_fatal() {
    let mut env = MemoryEnvironment::new();
    env.define_int("n", 7);
    let mut vm = machine_with(env);

    let mut image = ProgramImage::from_words(vec![
        0x9303_0002, // cvt.ptr.i $3, 2
        0x5105_0300, // load $5, $3
    ]);
    image.push_str("n");
    vm.load_program(&image.words).unwrap();
    assert!(matches!(
        vm.run().unwrap_err(),
        RemError::TypeMismatch { expected: "callable", .. }
    ));
}

struct SetsRegisterTen;

impl Callable for SetsRegisterTen {
    fn invoke(&self, vm: &mut VirtualMachine) -> RemResult<()> {
        vm.write_register(10, Rc::new(Value::Int(7)))
    }
}

#[test]
fn get_of_a_callable_variable_is_fatal() {
    let mut env = MemoryEnvironment::new();
    env.define_callable("f", Rc::new(SetsRegisterTen));
    let mut vm = machine_with(env);

    let mut image = ProgramImage::from_words(vec![
        0x9303_0002, // cvt.ptr.i $3, 2
        0x5005_0300, // get $5, $3
    ]);
    image.push_str("f");
    vm.load_program(&image.words).unwrap();
    assert!(matches!(
        vm.run().unwrap_err(),
        RemError::EnvironmentValueNotInteger(key) if key == "f"
    ));
}

#[test]
fn external_calls_run_synchronously_and_skip_the_call_stack() {
    let mut env = MemoryEnvironment::new();
    env.define_callable("f", Rc::new(SetsRegisterTen));
    let mut vm = machine_with(env);

    let mut image = ProgramImage::from_words(vec![
        0x9303_0004, // cvt.ptr.i $3, 4
        0x5104_0300, // load $4, $3
        0x7704_0000, // call.r $4  (external: no redirect, no call stack)
        0x110A_0000, // exit.r $10
    ]);
    image.push_str("f");
    vm.load_program(&image.words).unwrap();

    assert_eq!(vm.run().unwrap(), ExitValue::Value(Rc::new(Value::Int(7))));
}

#[test]
fn ret_after_an_external_call_underflows_the_call_stack() {
    let mut env = MemoryEnvironment::new();
    env.define_callable("f", Rc::new(SetsRegisterTen));
    let mut vm = machine_with(env);

    let mut image = ProgramImage::from_words(vec![
        0x9303_0004, // cvt.ptr.i $3, 4
        0x5104_0300, // load $4, $3
        0x7704_0000, // call.r $4
        0x4000_0000, // ret: nothing was pushed
    ]);
    image.push_str("f");
    vm.load_program(&image.words).unwrap();

    assert!(matches!(
        vm.run().unwrap_err(),
        RemError::OutOfBoundsAccess { region: RegionId::CallStack, .. }
    ));
}

#[test]
fn conditional_call_fires_only_on_nonzero_comparison() {
    // compare 4 >= 4, then callc into a subroutine that pops the return
    // address marker into $6
    let mut vm = machine();
    vm.load_program(&[
        0x9105_0004, // 0: cvt.int.i $5, 4
        0x8605_0004, // 1: c.gte.i $5, 4
        0x7680_0004, // 2: callc.i 4
        0x1000_0000, // 3: exit.i 0
        0x9106_0001, // 4: cvt.int.i $6, 1
        0x4000_0000, // 5: ret -> 3
    ])
    .unwrap();
    assert_eq!(vm.run().unwrap(), ExitValue::Int(0));
    assert_eq!(*vm.peek_register(6).unwrap(), Value::Int(1));
}
