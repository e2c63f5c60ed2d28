///
/// progcall-run - Command-line front end for the progcall runtime
///
/// Provides commands for inspecting and exercising dynamic program calls:
/// - progcall-run encode <NAME>: print the entry point symbol for a name
/// - progcall-run search-path: print the directories modules are searched in
/// - progcall-run resolve <NAME>...: resolve names and report their origin
/// - progcall-run run <PROGRAM> [ARGS]...: call a program, exit with its result
///
/// Settings come from `--config`, then `PROGCALL_*` environment variables,
/// then the command-line flags.
///

use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::{CString, c_void};
use std::path::PathBuf;
use std::process::ExitCode;

use progcall::ffi;
use progcall::{CallError, CallRuntime, CaseFold, DlLoader, Settings, encode_program_name};

#[derive(Parser)]
#[command(name = "progcall-run")]
#[command(author, version, about = "Resolve and run programs from shared modules", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directories to search for modules, separated like PATH
    #[arg(long, global = true)]
    library_path: Option<String>,

    /// Modules to load at startup, separated like PATH
    #[arg(long, global = true)]
    preload: Option<String>,

    /// Log resolution steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Fold {
    Upper,
    Lower,
}

impl From<Fold> for CaseFold {
    fn from(fold: Fold) -> Self {
        match fold {
            Fold::Upper => CaseFold::Upper,
            Fold::Lower => CaseFold::Lower,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the entry point symbol a program name is looked up as
    Encode {
        name: String,

        /// Fold the encoded symbol to one case
        #[arg(long)]
        fold: Option<Fold>,
    },

    /// Print the effective module search path
    SearchPath,

    /// Resolve program names and report where each was found
    Resolve {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Call a program, passing each argument as a NUL-terminated string
    Run {
        program: String,

        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();

    if let Commands::Encode { name, fold } = &cli.command {
        let fold = fold.map(CaseFold::from).unwrap_or_default();
        println!("{}", encode_program_name(name, fold));
        return ExitCode::SUCCESS;
    }

    let settings = match build_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Encode { .. } => ExitCode::SUCCESS,
        Commands::SearchPath => {
            show_search_path(settings);
            ExitCode::SUCCESS
        }
        Commands::Resolve { names } => resolve_names(settings, &names),
        Commands::Run { program, args } => run_program(settings, &program, &args),
    }
}

fn build_settings(cli: &Cli) -> Result<Settings, CallError> {
    let base = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    let mut settings = base.with_overrides(|key| std::env::var(key).ok())?;

    if let Some(path) = &cli.library_path {
        settings.library_path = Some(path.clone());
    }
    if let Some(preload) = &cli.preload {
        settings.preload = Some(preload.clone());
    }
    Ok(settings)
}

fn show_search_path(settings: Settings) {
    let runtime = CallRuntime::init(settings, DlLoader::new());
    for dir in runtime.search_path().dirs() {
        println!("{}", dir);
    }
    let preloaded = runtime.preloaded_paths_string();
    if !preloaded.is_empty() {
        println!("preloaded: {}", preloaded);
    }
    runtime.teardown();
}

fn resolve_names(settings: Settings, names: &[String]) -> ExitCode {
    let mut runtime = CallRuntime::init(settings, DlLoader::new());
    let mut failed = false;

    for name in names {
        match runtime.resolve(name) {
            Ok(entry) => {
                let bare = progcall::encoder::base_name(name);
                let origin = runtime
                    .cache()
                    .get(bare)
                    .and_then(|e| e.path.as_ref())
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(loaded image)".to_string());
                println!("{}\t{:p}\t{}", name, entry.as_ptr(), origin);
            }
            Err(e) if e.is_not_found() => {
                failed = true;
                eprintln!("{}: {}", name, runtime.take_resolve_error());
            }
            Err(e) => {
                failed = true;
                eprintln!("{}: {}", name, e);
            }
        }
    }

    runtime.teardown();
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn run_program(settings: Settings, program: &str, args: &[String]) -> ExitCode {
    let mut storage: Vec<Vec<u8>> = Vec::with_capacity(args.len());
    for arg in args {
        match CString::new(arg.as_str()) {
            Ok(arg) => storage.push(arg.into_bytes_with_nul()),
            Err(_) => {
                eprintln!("Error: argument contains a NUL byte: {:?}", arg);
                return ExitCode::FAILURE;
            }
        }
    }
    let argv: Vec<*mut c_void> = storage.iter_mut().map(|a| a.as_mut_ptr().cast()).collect();

    ffi::install(CallRuntime::init(settings, DlLoader::new()));
    // SAFETY: every argument points at a live NUL-terminated buffer.
    let result = unsafe { ffi::call_installed(program, &argv) };
    if let Some(runtime) = ffi::uninstall() {
        runtime.teardown();
    }

    match result {
        Ok(rc) => ExitCode::from(rc.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "progcall-run",
            "--library-path",
            "/opt/mods",
            "--preload",
            "util",
            "search-path",
        ]);
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.library_path.as_deref(), Some("/opt/mods"));
        assert_eq!(settings.preload.as_deref(), Some("util"));
    }

    #[test]
    fn test_encode_fold_argument() {
        let cli = Cli::parse_from(["progcall-run", "encode", "pay-roll", "--fold", "upper"]);
        match cli.command {
            Commands::Encode { name, fold } => {
                let fold = fold.map(CaseFold::from).unwrap_or_default();
                assert_eq!(encode_program_name(&name, fold), "PAY__ROLL");
            }
            _ => panic!("Expected encode command"),
        }
    }

    #[test]
    fn test_run_collects_trailing_args() {
        let cli = Cli::parse_from(["progcall-run", "run", "PROG", "a", "b"]);
        match cli.command {
            Commands::Run { program, args } => {
                assert_eq!(program, "PROG");
                assert_eq!(args, vec!["a".to_string(), "b".to_string()]);
            }
            _ => panic!("Expected run command"),
        }
    }
}
