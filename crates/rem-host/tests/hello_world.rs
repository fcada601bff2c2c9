use rem_core::{ExitValue, ProgramImage, RemConfig, VirtualMachine};
use rem_host::{MemoryEnvironment, Println};

// The canonical demo image: looks up "println" in the environment through
// a string pointer fed via the IRS, calls it with the stack holding a
// pointer to "Hello World", then loops while the IRS depth stays below
// the comparison bound.
fn demo_image(loop_bound: i16) -> ProgramImage {
    let mut image = ProgramImage::from_words(vec![
        0x931E_000E,                        // 00: cvt.ptr.i $PUSH, 0x000E
        0x9303_0004,                        // 01: cvt.ptr.i $3, 0x0004
        0x7F03_000C,                        // 02: call.r $3 [ipush 0x000C]
        0x1000_0000,                        // 03: exit.i 0x0000
        0x9324_001C,                        // 04: cvt.ptr.r $4, $IPOP
        0x5104_0400,                        // 05: load $4, $4
        0x933E_001E,                        // 06: cvt.ptr.r $PUSH, $PUSH
        0x7F04_0006,                        // 07: call.r $4 [ipush 0x0006]
        0x9125_001B,                        // 08: cvt.int.r $5, $IRSP
        0x8205_0000 | loop_bound as u16 as u32, // 09: c.lt.i $5, bound
        0x7F83_000C,                        // 0A: callc.r $3 [ipush 0x000C]
        0x4000_0000,                        // 0B: ret
    ]);
    image.push_str("println"); // 0C
    image.push_str("Hello World"); // 0E

    image
}

#[test]
fn hello_world_invokes_the_host_exactly_once() {
    let (println, output) = Println::capture();
    let mut env = MemoryEnvironment::new();
    env.define_callable("println", println);

    let mut vm = VirtualMachine::new(RemConfig::default(), Box::new(env));
    vm.load_program(&demo_image(1).words).unwrap();

    assert_eq!(vm.run().unwrap(), ExitValue::Int(0));
    assert_eq!(*output.borrow(), vec!["Hello World".to_string()]);
}

#[test]
fn raising_the_loop_bound_prints_repeatedly() {
    let (println, output) = Println::capture();
    let mut env = MemoryEnvironment::new();
    env.define_callable("println", println);

    let mut vm = VirtualMachine::new(RemConfig::default(), Box::new(env));
    vm.load_program(&demo_image(10).words).unwrap();

    assert_eq!(vm.run().unwrap(), ExitValue::Int(0));
    assert_eq!(output.borrow().len(), 10);
}

#[test]
fn reloading_an_image_preserves_the_environment() {
    let (println, output) = Println::capture();
    let mut env = MemoryEnvironment::new();
    env.define_callable("println", println);

    let mut vm = VirtualMachine::new(RemConfig::default(), Box::new(env));
    vm.load_program(&demo_image(1).words).unwrap();
    vm.run().unwrap();

    // the callable survives the reset performed by the second load
    vm.load_program(&demo_image(1).words).unwrap();
    vm.run().unwrap();
    assert_eq!(output.borrow().len(), 2);
}
