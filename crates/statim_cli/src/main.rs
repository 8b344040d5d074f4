//! Command-line driver for the `statim` compiler.
//!
//! Reads each input file, runs it through `statim_cli::pipeline`, and
//! writes the resulting AT&T assembly to `<output>.s`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;

use statim_cli::pipeline;

/// The statim compiler.
#[derive(ClapParser)]
#[command(name = "statim")]
#[command(about = "Compiles statim source files to x86-64 assembly")]
#[command(version = statim_cli::VERSION)]
struct Cli {
    /// Source files to compile.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Name of the emitted assembly file, without the `.s` suffix.
    #[arg(short, long, default_value = "out")]
    output: String,

    /// Increase log verbosity. Repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump the lowered IR instead of compiling to assembly.
    #[arg(long)]
    emit_ir: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(log_level).format_timestamp(None).init();

    if cli.emit_ir {
        let mut rendered = String::new();
        for input in &cli.inputs {
            log::info!("checking {}", input.display());
            let checked = pipeline::check_file(input)?;
            rendered.push_str(&pipeline::render_ir(&checked));
        }
        let ir_path = format!("{}.ir", cli.output);
        fs::write(&ir_path, rendered).with_context(|| format!("writing {ir_path}"))?;
        log::info!("wrote {ir_path}");
        return Ok(());
    }

    let mut assembly = Vec::new();
    for input in &cli.inputs {
        log::info!("compiling {}", input.display());
        let checked = pipeline::check_file(input)?;
        assembly.extend(pipeline::codegen(&checked)?);
    }

    let asm_path = format!("{}.s", cli.output);
    fs::write(&asm_path, assembly).with_context(|| format!("writing {asm_path}"))?;
    log::info!("wrote {asm_path}");

    Ok(())
}
