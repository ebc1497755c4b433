//! Command-line front end for the codebench grading engine.
//!
//! Provides subcommands:
//! - grade: Grade solutions against a problem set
//! - validate: Check a problem set against grader requirements
//! - graders: List known grader identifiers
//! - halstead: Halstead difficulty of a source file

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codebench_core::AppConfig;
use codebench_eval::grader::halstead::OperatorLexicon;
use codebench_eval::{
    load_problems, load_solutions, GraderKind, GraderRegistry, GradingReport, ProblemDefinition,
    PythonExecutor,
};

#[derive(Parser)]
#[command(name = "codebench")]
#[command(about = "Grade generated code for correctness, speed, memory and quality", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON logs instead of console logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade solutions against a problem set
    Grade {
        /// Directory of problem definition JSON files
        #[arg(short, long)]
        problems: PathBuf,

        /// Solutions JSON file or directory
        #[arg(short, long)]
        solutions: PathBuf,

        /// Graders to run (unknown names fall back to correctness)
        #[arg(short, long, num_args = 1.., default_value = "correctness")]
        grader: Vec<String>,

        /// Only grade solutions from this model
        #[arg(short, long)]
        model: Option<String>,

        /// Only grade problems carrying at least one of these tags
        #[arg(short, long, num_args = 1..)]
        tag: Vec<String>,

        /// Write the full report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check problem definitions and grader capabilities
    Validate {
        /// Directory of problem definition JSON files
        #[arg(short, long)]
        problems: PathBuf,

        /// Graders whose capability check should run
        #[arg(short, long, num_args = 1..)]
        grader: Vec<String>,
    },

    /// List known graders
    Graders,

    /// Print the Halstead difficulty of a source file
    Halstead {
        /// Source file to measure
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    if cli.json_logs {
        codebench_core::logging::init_logging();
    } else {
        codebench_core::logging::init_console_logging(&config.log_level);
    }

    match cli.command {
        Commands::Grade {
            problems,
            solutions,
            grader,
            model,
            tag,
            output,
        } => run_grade(
            config,
            &problems,
            &solutions,
            &grader,
            model.as_deref(),
            &tag,
            output.as_deref(),
        )?,

        Commands::Validate { problems, grader } => run_validate(config, &problems, &grader)?,

        Commands::Graders => list_graders(),

        Commands::Halstead { file } => show_halstead(&config, &file)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::from_file(path)?),
        None => Ok(AppConfig::default()),
    }
}

fn build_registry(config: AppConfig) -> anyhow::Result<GraderRegistry> {
    let executor = PythonExecutor::from_config(&config.executor)?;
    Ok(GraderRegistry::new(Arc::new(executor), config))
}

fn run_grade(
    config: AppConfig,
    problems_dir: &Path,
    solutions_path: &Path,
    graders: &[String],
    model: Option<&str>,
    tags: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut problems = load_problems(problems_dir)?;
    retain_tagged(&mut problems, tags);
    if problems.is_empty() {
        anyhow::bail!("No problems tagged {}", tags.join(", "));
    }
    let mut solutions = load_solutions(solutions_path)?;
    if let Some(model) = model {
        solutions.retain(|s| s.model_identifier == model);
    }
    if solutions.is_empty() {
        anyhow::bail!("No solutions to grade");
    }

    println!("{}", "Grading".bold().cyan());
    println!("  Problems: {}", problems.len());
    println!("  Solutions: {}", solutions.len());
    println!("  Graders: {}", graders.join(", "));
    println!();

    let registry = build_registry(config)?;
    let pb = ProgressBar::new(graders.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut report = GradingReport::new();
    for grader in registry.resolve(graders) {
        pb.set_message(grader.identifier());
        match registry.run_grader(grader.as_ref(), &problems, &solutions) {
            Some(output) => report.add_output(output),
            None => {
                pb.println(format!(
                    "{} {} cannot grade this problem set",
                    "✗".red(),
                    grader.identifier()
                ));
                report.add_skipped(grader.identifier());
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    report.print_summary(&problems);

    if let Some(path) = output {
        report.save_json(path)?;
        println!("{} Report written to {}", "✓".green(), path.display());
    }
    Ok(())
}

/// Keep problems carrying any of `tags`; an empty filter keeps everything.
fn retain_tagged(problems: &mut Vec<ProblemDefinition>, tags: &[String]) {
    if !tags.is_empty() {
        problems.retain(|p| p.tags.iter().any(|t| tags.contains(t)));
    }
}

fn run_validate(config: AppConfig, problems_dir: &Path, graders: &[String]) -> anyhow::Result<()> {
    let problems = load_problems(problems_dir)?;
    let mut invalid = 0usize;

    for problem in &problems {
        match problem.validate() {
            Ok(()) => println!("{} {}", "✓".green(), problem.identifier),
            Err(e) => {
                invalid += 1;
                println!("{} {}", "✗".red(), e);
            }
        }
    }

    if !graders.is_empty() {
        println!();
        let registry = build_registry(config)?;
        for grader in registry.resolve(graders) {
            if grader.can_grade(&problems) {
                println!("{} {} can grade this set", "✓".green(), grader.identifier());
            } else {
                println!("{} {} cannot grade this set", "✗".red(), grader.identifier());
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} problems are invalid", invalid, problems.len());
    }
    Ok(())
}

fn list_graders() {
    println!("{}", "Available graders".bold().cyan());
    println!("{}", "─".repeat(50));
    for kind in GraderKind::ALL {
        println!("  {:<15} {}", kind.identifier().bold(), kind.description());
    }
    println!("{}", "─".repeat(50));
    println!("Unknown names fall back to {}.", GraderKind::Correctness);
}

fn show_halstead(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(file)?;
    let metrics = OperatorLexicon::new(config.halstead.operators.iter().cloned()).measure(&code);
    println!("{}", file.display().to_string().bold());
    println!("  Unique operators: {}", metrics.unique_operators);
    println!("  Operands: {}", metrics.operand_count);
    println!("  Unique operands: {}", metrics.unique_operands);
    println!("  Difficulty: {:.4}", metrics.difficulty());
    Ok(())
}
