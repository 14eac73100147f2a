use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use twine_lib::context::{CompileContext, CompileOptions};
use twine_lib::environment::StaticEnvironment;
use twine_lib::{compiler, parser};

use std::path::PathBuf;

/// Compiles a Twine script and prints the result
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    script: PathBuf,

    /// YAML file that describes the host environment
    #[arg(short, long)]
    env: Option<PathBuf>,

    /// the name used in error messages, defaults to the script path
    #[arg(long)]
    source_name: Option<String>,

    /// line number of the first line of the script
    #[arg(long, default_value_t = 1)]
    start_line: usize,

    /// name of an argument the script is called with, can be repeated
    #[arg(long = "arg")]
    args: Vec<String>,

    #[arg(short = 't', long)]
    show_tokens: bool,

    #[arg(short = 'a', long)]
    show_ast: bool,

    /// write the compiled program to this file instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new().env().init()?;
    let cli = Cli::parse();

    let src = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("reading {}", cli.script.display()))?;
    let env = match &cli.env {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("parsing environment {}", path.display()))?
        }
        None => StaticEnvironment::default(),
    };
    let options = CompileOptions {
        source_name: Some(
            cli.source_name
                .clone()
                .unwrap_or_else(|| cli.script.display().to_string()),
        ),
        starting_line: cli.start_line,
        main_argument_names: cli.args.clone(),
    };

    let mut ctx = CompileContext::new(&env, options);
    ctx.tokenize(&src)?;
    if cli.show_tokens {
        for token in ctx.tokens() {
            println!("{:<20} {}", token.location.to_string(), token);
        }
        return Ok(());
    }

    parser::build(&mut ctx)?;
    if cli.show_ast {
        println!("{:#?}", ctx.root());
        return Ok(());
    }

    compiler::compile_root(&mut ctx)?;
    let program = ctx.finish()?;
    match &cli.output {
        Some(path) => {
            let bytes = program.to_bytes()?;
            std::fs::write(path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => print!("{}", program),
    }
    Ok(())
}
