use pipebind::{bind_program, evaluate, load_program, render_diagnostics, PipebindError};
use std::env;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(PipebindError::Diagnostics(_)) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), PipebindError> {
    let mut debug_trace = env::var("PIPEBIND_DEBUG_TRACE").is_ok_and(|value| value == "1");
    let mut rest = Vec::new();
    for arg in env::args().skip(1) {
        if arg == "--debug-trace" {
            debug_trace = true;
        } else {
            rest.push(arg);
        }
    }
    setup_logging(debug_trace);

    let Some((command, rest)) = rest.split_first() else {
        print_help();
        return Ok(());
    };
    match command.as_str() {
        "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "desugar" => {
            let Some(path) = rest.first() else {
                print_help();
                return Ok(());
            };
            let program = load_program(Path::new(path))?;
            let output = serde_json::to_string_pretty(&program.lowered())?;
            println!("{output}");
            Ok(())
        }
        "bind" => {
            let Some(path) = rest.first() else {
                print_help();
                return Ok(());
            };
            let program = load_program(Path::new(path))?;
            let bound = bind_program(&program);
            let output = serde_json::to_string_pretty(&bound.expr)?;
            println!("{output}");
            if !bound.diagnostics.is_empty() {
                eprintln!("{}", render_diagnostics(path, &bound.diagnostics));
            }
            if bound.has_errors() {
                return Err(PipebindError::Diagnostics(bound.diagnostics));
            }
            Ok(())
        }
        "run" => {
            let Some(path) = rest.first() else {
                print_help();
                return Ok(());
            };
            let program = load_program(Path::new(path))?;
            let bound = bind_program(&program);
            if !bound.diagnostics.is_empty() {
                eprintln!("{}", render_diagnostics(path, &bound.diagnostics));
            }
            if bound.has_errors() {
                return Err(PipebindError::Diagnostics(bound.diagnostics));
            }
            let value = evaluate(&bound.env, &bound.expr)?;
            println!("{value}");
            Ok(())
        }
        _ => {
            print_help();
            Err(PipebindError::InvalidCommand(command.clone()))
        }
    }
}

fn setup_logging(debug_trace: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if debug_trace {
        EnvFilter::new("pipebind=trace")
    } else {
        EnvFilter::try_from_env("PIPEBIND_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);
    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}

fn print_help() {
    println!(
        "pipebind\n\nUSAGE:\n  pipebind [--debug-trace] <COMMAND>\n\nCOMMANDS:\n  desugar <program.json>\n  bind <program.json>\n  run <program.json>\n\n  -h, --help\n\nENVIRONMENT:\n  PIPEBIND_LOG           tracing filter, e.g. `pipebind=debug`\n  PIPEBIND_DEBUG_TRACE=1 same as --debug-trace"
    );
}
