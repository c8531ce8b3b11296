use clap::Parser;
use smalvm_runtime::{ClassLoader, Emulator, Value, VmConfig, VmError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_log::log::debug;

mod params;

use params::Literal;

#[derive(Parser, Debug)]
#[command(version, about = "Execute a method from a disassembled Smali listing")]
pub struct Args {
    #[arg(short = 'i', long = "input", help = "The smali file to execute")]
    pub input: PathBuf,
    #[arg(short = 'm', long = "method", help = "The name of the method to execute")]
    pub method: String,
    #[arg(
        short = 'p',
        long = "params",
        help = "Argument bindings as a literal map, e.g. \"{'p0': 1, 'p1': 'ab'}\""
    )]
    pub params: Option<String>,
    #[arg(long = "max-steps", help = "Abort after this many executed instructions")]
    pub max_steps: Option<u64>,
}

fn bind_arguments(
    emu: &mut Emulator,
    bindings: Vec<(String, Literal)>,
) -> HashMap<String, Value> {
    let mut registers = HashMap::new();
    for (register, literal) in bindings {
        let value = match literal {
            Literal::Int(v) => match i32::try_from(v) {
                Ok(narrow) => Value::Integer(narrow),
                Err(_) => Value::Long(v),
            },
            Literal::Float(v) => Value::Double(v),
            Literal::Bool(v) => Value::Boolean(v),
            Literal::Str(text) => emu.new_string(&text),
            Literal::Null => Value::Null,
        };
        registers.insert(register, value);
    }
    registers
}

fn run(args: Args) -> Result<(), VmError> {
    let mut loader = ClassLoader::new();
    let class_name = loader.load_class(&args.input)?;

    let config = VmConfig {
        step_budget: args.max_steps,
        ..VmConfig::default()
    };
    let mut emu = Emulator::with_config(loader, config);

    let bindings = match &args.params {
        Some(text) => params::parse_bindings(text).expect("params were validated before"),
        None => Vec::new(),
    };
    let registers = bind_arguments(&mut emu, bindings);

    let result = emu.exec_method(&class_name, &args.method, registers)?;
    println!("{}", emu.render(result)?);
    debug!("{}", emu.stats());
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    debug!("Provided command line arguments: {:?}", args);

    if let Some(text) = &args.params {
        if let Err(error) = params::parse_bindings(text) {
            eprintln!("Malformed -p bindings: {}", error);
            return ExitCode::from(2);
        }
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::from(1)
        }
    }
}
