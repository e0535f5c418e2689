/// Shared library resolver CLI

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use shared_library_compiler::{
    scan, ClasspathEnvironment, Compiler, CompilerConfiguration, FlowExecution,
    LibraryPathResolver, RunExecution, ScriptClassLoader, SharedLibraryDecorator, SourceUnit,
    StreamListener, WorkspaceConfig,
};
use shared_library_parser::ast_dump::dump_module;

#[derive(Parser, Debug)]
#[command(name = "shlibc")]
#[command(about = "Resolve @SharedLibrary directives in pipeline scripts")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a script and list the shared libraries it requests
    Check {
        /// Pipeline script
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print the checkout directory of a library for a run
    Resolve {
        /// Execution URL, e.g. job/Folder/job/MyJob/34/execution/
        #[arg(long)]
        url: String,

        /// Library name
        #[arg(long)]
        library: String,

        /// Controller home directory
        #[arg(long, env = "JENKINS_HOME", value_name = "DIR")]
        workspace_root: Option<PathBuf>,
    },

    /// Compile a script, loading its shared library into the classpath
    Compile {
        /// Pipeline script
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Execution URL of the run; without it no library is loaded
        #[arg(long)]
        url: Option<String>,

        /// Controller home directory
        #[arg(long, env = "JENKINS_HOME", value_name = "DIR")]
        workspace_root: Option<PathBuf>,
    },

    /// Parse a script and print its syntax tree
    Dump {
        /// Pipeline script
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    match args.command {
        Command::Check { input, format } => check(input, format),
        Command::Resolve { url, library, workspace_root } => {
            let config = WorkspaceConfig { workspace_root };
            let path = LibraryPathResolver::new(config).resolve(&[library], &url)?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Compile { input, url, workspace_root } => {
            compile(input, url, WorkspaceConfig { workspace_root })
        }
        Command::Dump { input } => {
            let module = parse_file(&input)?;
            print!("{}", dump_module(&module));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_file(input: &Path) -> anyhow::Result<shared_library_parser::ModuleNode> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    shared_library_parser::parse(&source)
        .with_context(|| format!("failed to parse {}", input.display()))
}

fn check(input: PathBuf, format: Format) -> anyhow::Result<ExitCode> {
    let module = parse_file(&input)?;
    let outcome = scan(&module);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        Format::Text => {
            if outcome.libraries.is_empty() {
                println!("No shared libraries requested");
            }
            for (i, library) in outcome.libraries.iter().enumerate() {
                let note = if i == 0 { "" } else { " (ignored)" };
                println!("library: {}{}", library, note);
            }
            for diagnostic in &outcome.diagnostics {
                println!("{}: {}", input.display(), diagnostic);
            }
        }
    }

    Ok(if outcome.diagnostics.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn compile(
    input: PathBuf,
    url: Option<String>,
    config: WorkspaceConfig,
) -> anyhow::Result<ExitCode> {
    let mut unit = SourceUnit::from_file(&input)?;

    let class_loader = Arc::new(ScriptClassLoader::new());
    let execution: Option<Arc<dyn FlowExecution>> = url.map(|url| {
        let listener = Arc::new(StreamListener::new(io::stdout()));
        let execution = RunExecution::new(url, listener).class_loader(class_loader.clone());
        Arc::new(execution) as Arc<dyn FlowExecution>
    });

    let decorator = SharedLibraryDecorator::new(config);
    let compiler = Compiler::new(CompilerConfiguration::for_execution(execution, &[&decorator]));

    match compiler.compile(&mut unit) {
        Ok(()) => {
            println!("Compilation successful");
            for entry in class_loader.entries() {
                println!("  classpath: {}", entry.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
