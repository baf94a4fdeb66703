use kuro::{
    emulator::{Emulator, TestIo, STACK_TOP},
    event::{Event, EventLog},
    instruction::Register,
    symbol_table::Symbol,
    symbolic::Program,
};

use slog::{o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

fn emulator() -> Emulator<TestIo> {
    let program = Program::parse(include_str!("procedures.kuro"))
        .expect("could not parse procedures.kuro");

    Emulator::new(program.resolve().unwrap(), TestIo::new())
}

#[test]
fn test_procedures_routine_indices() {
    let emulator = emulator();
    let table = emulator.symbol_table();

    assert_eq!(table.get("main"), Some(Symbol::Routine(0)));
    assert_eq!(table.get("show"), Some(Symbol::Routine(6)));
    assert_eq!(table.get("countdown"), Some(Symbol::Routine(13)));
    assert_eq!(table.address("message"), Some(30));
}

#[test]
fn test_procedures_emulate_program() {
    let mut emulator = emulator();

    emulator.run().unwrap();

    assert_eq!(emulator.io.text(), "x=3\n9\n321\n");
    assert_eq!(emulator.memory.register(Register::A), 0);
    assert_eq!(emulator.memory.register(Register::B), 9);
    assert_eq!(emulator.stack_pointer(), STACK_TOP);
    assert_eq!(emulator.program_counter(), 5);
}

#[test]
fn test_procedures_register_events() {
    let mut emulator = emulator();
    let log = EventLog::new();

    emulator.add_listener(log.clone());
    emulator.run().unwrap();

    // set by main, cleared by `show` and restored by `rstr`
    assert_eq!(log.register_values(Register::B), vec![9, 0, 9]);

    let calls = log.events().into_iter()
        .filter(|event| matches!(event, Event::Jump { from: 2, .. } | Event::Jump { from: 4, .. }))
        .collect::<Vec<_>>();

    assert_eq!(calls, vec![
        Event::Jump { from: 2, to: 6 },
        Event::Jump { from: 4, to: 13 },
    ]);
}

#[test]
fn test_procedures_with_logger() {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let program = Program::parse(include_str!("procedures.kuro")).unwrap();
    let resolved = program.resolve_with_logger(logger.clone()).unwrap();

    let mut emulator = Emulator::with_logger(resolved, TestIo::new(), logger);
    let mut steps = 0;

    while !emulator.halted {
        println!("{:?}", emulator.current_instruction());
        emulator.step().unwrap();
        steps += 1;
    }

    assert_eq!(emulator.io.text(), "x=3\n9\n321\n");
    assert!(steps > 20);
}
