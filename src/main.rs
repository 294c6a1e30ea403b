//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, ArgMatches, Command};
use fclc::{exec::Machine, ir::Program};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::{
    fs::File,
    io::{self, BufReader, Write},
};

fn main() -> anyhow::Result<()> {
    let args = cli().get_matches();

    // Los valores negativos obligan a aceptar guiones en los enlaces,
    // así que un -v al final llega como si fuera un enlace
    let trailing: u64 = match args.subcommand() {
        Some(("run", run)) => bindings(run).filter_map(verbosity_flag).sum(),
        _ => 0,
    };

    init_logging(args.occurrences_of("verbose") + trailing);

    match args.subcommand() {
        Some(("build", args)) => build(args),
        Some(("run", args)) => run(args),
        _ => bail!("Missing subcommand"),
    }
}

/// Parsing de CLI
fn cli() -> Command<'static> {
    Command::new("FCL compiler")
        .version(crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .multiple_occurrences(true)
                .help("Increase log verbosity (repeatable)"),
        )
        .subcommand(
            Command::new("build")
                .about("Compile a program and print its description")
                .arg(source_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .takes_value(true)
                        .value_name("FILE")
                        .default_value("-")
                        .help("Output file ('-' for stdout)"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Compile a program and execute it")
                .arg(source_arg())
                .arg(
                    Arg::new("limit")
                        .long("step-limit")
                        .takes_value(true)
                        .value_name("STEPS")
                        .help("Abort after executing this many instructions"),
                )
                .arg(
                    Arg::new("bindings")
                        .value_name("NAME VALUE")
                        .multiple_values(true)
                        .allow_hyphen_values(true)
                        .help("Input bindings as name/value pairs"),
                ),
        )
}

fn source_arg() -> Arg<'static> {
    Arg::new("source")
        .required(true)
        .value_name("FILE")
        .help("FCL source file ('-' for stdin)")
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // RUST_LOG tiene precedencia sobre -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn compile(args: &ArgMatches) -> anyhow::Result<Program> {
    // `source` es requerido por clap
    let path = args.value_of("source").unwrap_or("-");

    let result = if path == "-" {
        fclc::compile(io::stdin().lock(), "<stdin>")
    } else {
        let file = File::open(path).with_context(|| format!("Failed to open: {}", path))?;
        fclc::compile(BufReader::new(file), path)
    };

    match result {
        Ok(program) => {
            info!(program = %program.name, "compiled");
            Ok(program)
        }

        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            bail!("Compilation of {} failed", path)
        }
    }
}

fn build(args: &ArgMatches) -> anyhow::Result<()> {
    let program = compile(args)?;

    match args.value_of("output") {
        None | Some("-") => {
            let stdout = io::stdout();
            write!(stdout.lock(), "{}", program).context("Failed to write to stdout")?;
        }

        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write!(file, "{}", program)
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    }

    Ok(())
}

fn run(args: &ArgMatches) -> anyhow::Result<()> {
    let program = compile(args)?;

    let mut machine = Machine::new(&program);
    if let Some(limit) = args.value_of("limit") {
        let limit = limit
            .parse()
            .with_context(|| format!("Bad step limit: {}", limit))?;

        machine = machine.with_step_limit(limit);
    }

    machine.bind(bindings(args).filter(|arg| verbosity_flag(arg).is_none()));

    let outcome = machine
        .run()
        .with_context(|| format!("Execution of {} failed", program.name))?;

    for (variable, value) in outcome.dump() {
        println!("{} = {}", variable, value);
    }

    Ok(())
}

fn bindings<'a>(args: &'a ArgMatches) -> impl Iterator<Item = &'a str> {
    args.values_of("bindings").into_iter().flatten()
}

/// Niveles de verbosidad que aporta un argumento como `-v`, `-vv` o `--verbose`.
fn verbosity_flag(arg: &str) -> Option<u64> {
    if arg == "--verbose" {
        return Some(1);
    }

    match arg.strip_prefix('-') {
        Some(flags) if !flags.is_empty() && flags.bytes().all(|flag| flag == b'v') => {
            Some(flags.len() as u64)
        }

        _ => None,
    }
}
