use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tarn_codegen::CompileOptions;

#[derive(Parser)]
#[command(name = "tarnc")]
#[command(about = "Tarn - compile typed SSA packages to native objects")]
#[command(version)]
struct Cli {
    /// Serialized SSA package to compile
    input: Vec<PathBuf>,

    /// Output object file
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// LLVM target triple (defaults to the host triple)
    #[arg(long)]
    target: Option<String>,

    /// Print the final LLVM IR to stdout after optimization
    #[arg(long = "print-ir")]
    print_ir: bool,

    /// Per-package progress output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Usage mistakes report and leave with a zero status; only real
    // compilation failures exit nonzero.
    let ([input], Some(output)) = (&cli.input[..], &cli.output) else {
        eprintln!("usage: tarnc [--print-ir] [--target <triple>] -o <output> <input>");
        return Ok(());
    };

    let program = tarn_ssa::persist::load_program(input)
        .with_context(|| format!("loading {}", input.display()))?;
    program.validate().context("invalid SSA input")?;

    if cli.verbose {
        let triple = cli
            .target
            .clone()
            .unwrap_or_else(tarn_codegen::host_triple);
        println!("{} {}", "target:".bright_blue().bold(), triple);
        for package in &program.packages {
            println!("{} {}", "package:".bright_blue().bold(), package.path);
            for name in package.sorted_member_names() {
                println!("  member: {}", name);
            }
        }
    }

    let options = CompileOptions {
        target: cli.target.clone(),
        print_ir: cli.print_ir,
        ..CompileOptions::default()
    };
    tarn_codegen::compile(&program, output, &options)
        .with_context(|| format!("compiling {}", input.display()))?;

    if cli.verbose {
        println!(
            "{} wrote {}",
            "success:".bright_green().bold(),
            output.display()
        );
    }

    Ok(())
}
