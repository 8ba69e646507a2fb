//! CLI: `jig [OPTIONS] [RECIPE] [ARGS]...`
//!
//! Modes (list, show, dump, plan, check, init, completions) are mutually
//! exclusive flags; with none of them the named recipe runs.

use crate::core::error::{Error, ResolutionError};
use crate::core::executor::{self, ExecuteOptions};
use crate::core::{binder, parser, planner, resolver, types};
use crate::journal::{hasher, EventLog};
use crate::transport::local::LocalTransport;
use clap::{ArgAction, ArgGroup, CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "jig",
    version,
    about = "Run named recipes of shell commands, prerequisites first",
    group(ArgGroup::new("mode").args(["list", "show", "dump", "plan", "check", "init", "completions"]))
)]
pub struct Cli {
    /// Definition file (default: search upward for Jigfile)
    #[arg(short, long, env = "JIG_FILE", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// List public recipes
    #[arg(short, long)]
    pub list: bool,

    /// Print one recipe's definition
    #[arg(long, value_name = "RECIPE")]
    pub show: Option<String>,

    /// Serialize the parsed recipe store
    #[arg(long)]
    pub dump: bool,

    /// Format for --dump
    #[arg(long, value_enum, default_value_t = DumpFormat::Json)]
    pub dump_format: DumpFormat,

    /// Print the execution plan without running it
    #[arg(long)]
    pub plan: bool,

    /// Validate every recipe and prerequisite in the file
    #[arg(long)]
    pub check: bool,

    /// Echo every command without running anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not echo commands before running them
    #[arg(short, long)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Append a JSONL journal of the run to PATH
    #[arg(long, env = "JIG_EVENT_LOG", value_name = "PATH")]
    pub event_log: Option<PathBuf>,

    /// Write a starter Jigfile in the current directory
    #[arg(long)]
    pub init: bool,

    /// Print shell completions
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<clap_complete::Shell>,

    /// Recipe to run, followed by its arguments (passed through untouched)
    #[arg(value_name = "RECIPE", trailing_var_arg = true, num_args = 0..)]
    pub invocation: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    Json,
    Yaml,
}

/// Dispatch a parsed command line. Returns the process exit code.
pub fn dispatch(cli: Cli) -> Result<i32, Error> {
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "jig", &mut std::io::stdout());
        return Ok(0);
    }
    if cli.init {
        let dir = std::env::current_dir()?;
        cmd_init(&dir)?;
        return Ok(0);
    }

    let path = match cli.file {
        Some(ref p) => p.clone(),
        None => parser::find_definition(&std::env::current_dir()?)?,
    };
    let (source, store) = parser::parse_file(&path)?;

    if cli.check {
        cmd_check(&path, &store)?;
        return Ok(0);
    }
    if let Some(ref name) = cli.show {
        print!("{}", show_text(&store, name)?);
        return Ok(0);
    }
    if cli.dump {
        println!("{}", dump_text(&store, cli.dump_format)?);
        return Ok(0);
    }

    let Some((recipe, args)) = cli.invocation.split_first() else {
        if cli.plan {
            return Err(Error::Usage("--plan needs a recipe name".to_string()));
        }
        print!("{}", list_text(&store));
        return Ok(0);
    };
    if cli.list {
        print!("{}", list_text(&store));
        return Ok(0);
    }

    let invocation = types::Invocation::new(recipe.clone(), args.to_vec());
    let plan = planner::plan(&store, &invocation)?;

    if cli.plan {
        for line in planner::describe(&plan) {
            println!("{}", line);
        }
        return Ok(0);
    }

    Ok(cmd_run(&cli, &store, &source, &plan, &invocation))
}

fn cmd_run(
    cli: &Cli,
    store: &types::RecipeStore,
    source: &str,
    plan: &types::ExecutionPlan,
    invocation: &types::Invocation,
) -> i32 {
    let journal = match cli.event_log {
        Some(ref p) if !cli.dry_run => Some(EventLog::new(p)),
        _ => None,
    };
    if let Some(ref j) = journal {
        j.record(types::RunEvent::RunStarted {
            run_id: j.run_id().to_string(),
            recipe: invocation.recipe.clone(),
            args: invocation.args.clone(),
            source_hash: hasher::hash_source(source),
            jig_version: env!("CARGO_PKG_VERSION").to_string(),
        });
    }

    let mut transport = LocalTransport::from_settings(&store.settings);
    let options = ExecuteOptions {
        dry_run: cli.dry_run,
        quiet: cli.quiet,
        journal: journal.as_ref(),
    };
    let result = executor::execute(plan, &mut transport, &options);
    if let Some(ref failure) = result.failure {
        eprintln!("error: {}", failure);
    }
    result.exit_code()
}

const STARTER: &str = r#"# Run the default checks
check: lint test

# Lint the sources
lint:
    @echo "linting"

# Run the tests, forwarding extra arguments
[positional-arguments]
test:
    @echo "testing"

# Greet someone
greet name greeting="hello":
    echo {{greeting}} {{name}}
"#;

fn cmd_init(dir: &Path) -> Result<(), Error> {
    let path = dir.join(parser::DEFINITION_NAMES[0]);
    if path.exists() {
        return Err(Error::Usage(format!("{} already exists", path.display())));
    }
    std::fs::write(&path, STARTER)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Validate every recipe: prerequisites exist, no cycles, and every
/// prerequisite can be bound without arguments.
fn cmd_check(path: &Path, store: &types::RecipeStore) -> Result<(), Error> {
    let errors = check_errors(store);
    if errors.is_empty() {
        println!("OK: {} ({} recipes)", path.display(), store.len());
        return Ok(());
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(Error::Invalid(errors.len()))
}

fn check_errors(store: &types::RecipeStore) -> Vec<Error> {
    let mut errors: Vec<Error> = resolver::validate(store)
        .into_iter()
        .map(Error::from)
        .collect();

    let mut reported: Vec<&str> = Vec::new();
    for recipe in store.recipes.values() {
        for prereq in &recipe.prerequisites {
            let Some(dep) = store.get(prereq) else {
                continue;
            };
            if reported.contains(&dep.name.as_str()) {
                continue;
            }
            if let Err(e) = binder::bind(dep, &[]) {
                reported.push(&dep.name);
                errors.push(e.into());
            }
        }
    }
    errors
}

/// Listing of public recipes with their signatures and doc comments.
pub fn list_text(store: &types::RecipeStore) -> String {
    let rows: Vec<(String, Option<&str>)> = store
        .public_recipes()
        .map(|r| (r.signature(), r.doc.as_deref()))
        .collect();
    let width = rows.iter().map(|(s, _)| s.len()).max().unwrap_or(0);

    let mut out = String::from("Available recipes:\n");
    for (signature, doc) in rows {
        match doc {
            Some(doc) => out.push_str(&format!("    {:<width$} # {}\n", signature, doc)),
            None => out.push_str(&format!("    {}\n", signature)),
        }
    }
    out
}

/// A recipe rendered back in definition syntax.
pub fn show_text(store: &types::RecipeStore, name: &str) -> Result<String, Error> {
    let recipe = store.get(name).ok_or_else(|| ResolutionError::UnknownRecipe {
        name: name.to_string(),
        required_by: None,
    })?;

    let mut out = String::new();
    if let Some(ref doc) = recipe.doc {
        out.push_str(&format!("# {}\n", doc));
    }
    if recipe.private {
        out.push_str("[private]\n");
    }
    if recipe.positional {
        out.push_str("[positional-arguments]\n");
    }

    let mut header = vec![recipe.name.clone()];
    header.extend(recipe.parameters.iter().map(types::Parameter::header_form));
    if let Some(ref v) = recipe.variadic {
        header.push(format!("*{}", v));
    }
    out.push_str(&header.join(" "));
    out.push(':');
    for prereq in &recipe.prerequisites {
        out.push(' ');
        out.push_str(prereq);
    }
    out.push('\n');

    for line in &recipe.lines {
        let prefix = if line.echo { "" } else { "@" };
        out.push_str(&format!("    {}{}\n", prefix, line.text));
    }
    Ok(out)
}

fn dump_text(store: &types::RecipeStore, format: DumpFormat) -> Result<String, Error> {
    Ok(match format {
        DumpFormat::Json => serde_json::to_string_pretty(store)?,
        DumpFormat::Yaml => serde_yaml_ng::to_string(store)?,
    })
}
