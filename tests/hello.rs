use kuro::{
    emulator::{Emulator, Output, TestIo},
    symbolic::Program,
};

fn read_program() -> Program {
    let source = include_str!("hello.kuro");

    Program::parse(source).expect("could not parse hello.kuro")
}

#[test]
fn test_hello_resolve_program() {
    let resolved = read_program().resolve().unwrap();

    assert_eq!(resolved.instructions.len(), 5);
    assert_eq!(resolved.symbol_table.address("greeting"), Some(20));
    assert_eq!(resolved.symbol_table.address("who"), Some(26));
    assert_eq!(resolved.writes.get(&20), Some(&b'H'));
    assert_eq!(resolved.writes.get(&25), Some(&0));
    assert_eq!(resolved.writes.get(&30), Some(&b'd'));
}

#[test]
fn test_hello_emulate_program() {
    let resolved = read_program().resolve().unwrap();
    let mut emulator = Emulator::new(resolved, TestIo::new());

    emulator.run().unwrap();

    assert!(emulator.halted);
    assert_eq!(emulator.program_counter(), 3);
    assert_eq!(emulator.io.text(), "Hello, world\n");
    assert_eq!(emulator.io.output().last(), Some(&Output::Newline));
}
