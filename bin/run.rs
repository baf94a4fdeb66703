use kuro::{
    symbolic,
    parsing::AsLineSpan,
    emulator::{Emulator, StdIo},
    error::{ExecutionError, ResolutionError},
};

use clap::{App, Arg, ArgMatches};
use slog::{o, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

enum Error {
    Parse(symbolic::ParseError),
    Resolution(ResolutionError),
    Execution(ExecutionError),
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IO(e)
    }
}

impl From<symbolic::ParseError> for Error {
    fn from(e: symbolic::ParseError) -> Error {
        Error::Parse(e)
    }
}

impl From<ResolutionError> for Error {
    fn from(e: ResolutionError) -> Error {
        Error::Resolution(e)
    }
}

impl From<ExecutionError> for Error {
    fn from(e: ExecutionError) -> Error {
        Error::Execution(e)
    }
}

fn parse_arguments() -> ArgMatches<'static> {
    App::new("kurorun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility for assembling and executing Kuro programs")
        .arg(Arg::with_name("source")
             .help("File containing assembly source")
             .value_name("SOURCE")
             .required(true)
             .index(1))
        .arg(Arg::with_name("verbose")
             .help("Log every resolution and execution step to the standard error")
             .short("v")
             .long("verbose"))
        .arg(Arg::with_name("seed")
             .help("Seed for the random number generator used by `rand`")
             .short("s")
             .long("seed")
             .value_name("SEED")
             .takes_value(true))
        .arg(Arg::with_name("listing")
             .help("Print the resolved instructions and symbol table before running")
             .long("listing"))
        .get_matches()
}

fn logger(verbose: bool) -> Logger {
    if !verbose {
        return Logger::root(Discard, o!());
    }

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn main() {
    let args = parse_arguments();

    let file_path = match args.value_of("source") {
        Some(path) => path,
        None => return,
    };

    let seed = match args.value_of("seed").map(str::parse::<u64>) {
        None => None,
        Some(Ok(seed)) => Some(seed),
        Some(Err(_)) => {
            eprintln!("Seed must be a non-negative integer");
            std::process::exit(2);
        },
    };

    let source = match std::fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(io) => {
            eprintln!("IO error: {}", io);
            std::process::exit(1);
        },
    };

    let logger = logger(args.is_present("verbose"));

    if let Err(error) = run(&source, seed, args.is_present("listing"), logger) {
        report(file_path, &source, error);
        std::process::exit(1);
    }
}

fn run(source: &str, seed: Option<u64>, listing: bool, logger: Logger) -> Result<(), Error> {
    let program = symbolic::Program::parse(source)?;
    let resolved = program.resolve_with_logger(logger.clone())
        .map_err(|error| {
            if let Some(span) = program.error_span(&error) {
                eprintln!("near {}", span.as_line_span(source).start);
            }

            error
        })?;

    if listing {
        for (index, instruction) in resolved.instructions.iter().enumerate() {
            println!("{:04}. {}", index, instruction);
        }

        for (name, symbol) in resolved.symbol_table.iter() {
            println!("{:<16} {}", name, symbol);
        }

        for (address, data) in &resolved.writes {
            println!("${:<15} {}", address, data);
        }
    }

    let source_map = program.source_map(&resolved).into_line_based(source);
    let mut emulator = Emulator::with_logger(resolved, StdIo, logger);

    if let Some(seed) = seed {
        emulator.seed(seed);
    }

    emulator.run()
        .map_err(|error| {
            if let Some(span) = source_map.get_source_span(error.program_counter as usize) {
                eprintln!("near {}", span.start);
            }

            error
        })?;

    Ok(())
}

fn report(file_path: &str, source: &str, error: Error) {
    match error {
        Error::IO(io) => eprintln!("IO error: {}", io),
        Error::Parse(error) => match error.line_span(source) {
            Some(span) => eprintln!("{}:{}: parse error: {}", file_path, span.start, error),
            None => eprintln!("{}: parse error: {}", file_path, error),
        },
        Error::Resolution(error) => eprintln!("{}: resolution error: {}", file_path, error),
        Error::Execution(error) => eprintln!("{}: execution error: {}", file_path, error),
    }
}
