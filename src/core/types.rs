//! Recipe store types: the store, plans and run results.
//!
//! The store is built once per invocation by [`super::parser::parse`] and is
//! immutable afterwards. Everything downstream (resolver, binder, planner,
//! executor) borrows it explicitly.

use super::template::Template;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Recipe store
// ============================================================================

/// All recipes parsed from one definition source, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeStore {
    /// Store-wide settings from `set` directives
    pub settings: Settings,

    /// Recipes keyed by name (order-preserving)
    pub recipes: IndexMap<String, Recipe>,
}

impl RecipeStore {
    /// Look up a recipe by name.
    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    /// Number of recipes in the store.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipes shown by `--list` (private ones are hidden).
    pub fn public_recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values().filter(|r| !r.private)
    }
}

/// Store-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Forward trailing arguments raw for recipes that declare no parameters
    pub positional_arguments: bool,

    /// Program and leading arguments used to run each command line
    pub shell: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            positional_arguments: false,
            shell: default_shell(),
        }
    }
}

fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string()]
}

// ============================================================================
// Recipes
// ============================================================================

/// A named, ordered group of command lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    /// Unique recipe name
    pub name: String,

    /// Doc comment from the line directly above the header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    /// Declared parameters, in binding order
    pub parameters: Vec<Parameter>,

    /// Trailing `*name` parameter that takes all remaining arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variadic: Option<String>,

    /// Recipes that must run first
    pub prerequisites: Vec<String>,

    /// Command lines, in execution order
    pub lines: Vec<CommandLine>,

    /// Trailing arguments are forwarded raw instead of bound to parameters
    pub positional: bool,

    /// Hidden from listings
    pub private: bool,

    /// 1-based line number of the header
    pub line: usize,
}

impl Recipe {
    /// Smallest number of trailing arguments this recipe accepts.
    pub fn min_arguments(&self) -> usize {
        self.parameters.iter().filter(|p| p.default.is_none()).count()
    }

    /// Largest number of trailing arguments, `None` when unbounded.
    pub fn max_arguments(&self) -> Option<usize> {
        if self.positional || self.variadic.is_some() {
            None
        } else {
            Some(self.parameters.len())
        }
    }

    /// Whether any line references the forwarded argument list explicitly.
    pub fn interpolates_forwarded(&self) -> bool {
        self.lines.iter().any(|l| l.template.has_forwarded())
    }

    /// One-line signature for listings, e.g. `serve host="0.0.0.0" *flags`.
    pub fn signature(&self) -> String {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.parameters.iter().map(Parameter::header_form));
        if let Some(ref v) = self.variadic {
            parts.push(format!("*{}", v));
        }
        if self.positional {
            parts.push("[args...]".to_string());
        }
        parts.join(" ")
    }
}

/// A declared recipe parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    /// The parameter as written in a recipe header. Defaults are quoted
    /// verbatim; single quotes are used when the value holds a `"`.
    pub fn header_form(&self) -> String {
        match self.default {
            Some(ref d) if d.contains('"') => format!("{}='{}'", self.name, d),
            Some(ref d) => format!("{}=\"{}\"", self.name, d),
            None => self.name.clone(),
        }
    }
}

/// One command line of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    /// Source text after indentation and the `@` prefix are stripped
    pub text: String,

    /// Echo the rendered line before running it
    pub echo: bool,

    /// 1-based line number in the definition source
    pub line: usize,

    #[serde(skip)]
    pub template: Template,
}

// ============================================================================
// Invocation and plan
// ============================================================================

/// A request to run one recipe with trailing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub recipe: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(recipe: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            recipe: recipe.into(),
            args,
        }
    }
}

/// A value bound to a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Single(String),
    Variadic(Vec<String>),
}

/// Parameter bindings for one recipe in a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    /// Named parameter values, in declaration order
    pub values: IndexMap<String, BoundValue>,

    /// Raw forwarded arguments (positional-forwarding mode only)
    pub forwarded: Option<Vec<String>>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.get(name)
    }
}

/// One recipe of an execution plan, bound and rendered.
#[derive(Debug, Clone)]
pub struct PlanStep<'a> {
    pub recipe: &'a Recipe,
    pub bindings: Bindings,
    pub commands: Vec<RenderedCommand>,
}

/// A command line with parameters substituted, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub command: String,
    pub echo: bool,
    pub line: usize,
}

/// Deduplicated, dependency-ordered recipes for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionPlan<'a> {
    /// The invoked recipe (always the last step)
    pub root: String,

    pub steps: Vec<PlanStep<'a>>,
}

impl ExecutionPlan<'_> {
    /// Recipe names in execution order.
    pub fn recipe_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.recipe.name.as_str()).collect()
    }

    /// Total number of command lines across all steps.
    pub fn line_count(&self) -> usize {
        self.steps.iter().map(|s| s.commands.len()).sum()
    }
}

// ============================================================================
// Execution result
// ============================================================================

/// Per-plan state machine. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running {
        recipe_index: usize,
        line_index: usize,
    },
    Succeeded,
    Failed {
        recipe_index: usize,
        line_index: usize,
        status: ExitStatus,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT-STARTED"),
            Self::Running {
                recipe_index,
                line_index,
            } => write!(f, "RUNNING({}, {})", recipe_index, line_index),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed {
                recipe_index,
                line_index,
                status,
            } => write!(f, "FAILED({}, {}, {})", recipe_index, line_index, status),
        }
    }
}

/// How a command line ended unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited with a non-zero code
    Code(i32),
    /// Killed by a signal
    Signal(i32),
    /// `jig` itself received an interrupt while the line ran
    Interrupted(i32),
    /// The shell could not be launched
    SpawnFailed,
}

impl ExitStatus {
    /// Process exit code `jig` reports for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Code(c) => *c,
            Self::Signal(s) | Self::Interrupted(s) => 128 + s,
            Self::SpawnFailed => 127,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(c) => write!(f, "exit code {}", c),
            Self::Signal(s) => write!(f, "killed by signal {}", s),
            Self::Interrupted(s) => write!(f, "interrupted by signal {}", s),
            Self::SpawnFailed => write!(f, "could not spawn shell"),
        }
    }
}

/// The failing line of a failed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub recipe: String,
    pub recipe_index: usize,
    pub line_index: usize,
    /// 1-based line number of the failing command in the definition source
    pub source_line: usize,
    pub status: ExitStatus,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recipe '{}' failed on line {}: {}",
            self.recipe, self.source_line, self.status
        )
    }
}

/// Outcome of executing a plan.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Terminal state
    pub state: RunState,

    /// The failing line, when `state` is `Failed`
    pub failure: Option<ExecutionFailure>,

    /// Command lines that ran to completion (including the failing one)
    pub lines_run: usize,

    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.state == RunState::Succeeded
    }

    /// Process exit code for this result: 0 on success, otherwise derived
    /// from the failing line.
    pub fn exit_code(&self) -> i32 {
        match &self.failure {
            None => 0,
            Some(f) => match f.status.exit_code() {
                0 => 1,
                code => code,
            },
        }
    }
}

// ============================================================================
// Run journal events
// ============================================================================

/// Event for the JSONL run journal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        recipe: String,
        args: Vec<String>,
        source_hash: String,
        jig_version: String,
    },
    RecipeStarted {
        run_id: String,
        recipe: String,
    },
    LineFinished {
        run_id: String,
        recipe: String,
        line: usize,
        exit_code: i32,
        duration_seconds: f64,
    },
    RunCompleted {
        run_id: String,
        success: bool,
        lines_run: usize,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

// ============================================================================
// Tests
// ============================================================================
