//! Error taxonomy. Everything here is raised before any process launches;
//! a failing command line is reported through `ExecutionResult` instead.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for errors raised before any command line runs.
pub const EXIT_DEFINITION_ERROR: i32 = 2;

/// Malformed definition source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: recipe '{name}' is already defined on line {first}")]
    DuplicateRecipe {
        name: String,
        line: usize,
        first: usize,
    },

    #[error("line {line}: command line is not indented under any recipe header")]
    OrphanCommand { line: usize },

    #[error("line {line}: recipe '{recipe}' has malformed prerequisite '{token}'")]
    MalformedPrerequisite {
        recipe: String,
        token: String,
        line: usize,
    },

    #[error("line {line}: malformed recipe header: {message}")]
    MalformedHeader { line: usize, message: String },

    #[error("line {line}: recipe '{recipe}' declares parameter '{parameter}' twice")]
    DuplicateParameter {
        recipe: String,
        parameter: String,
        line: usize,
    },

    #[error(
        "line {line}: recipe '{recipe}' parameter '{parameter}' has no default but follows one that does"
    )]
    RequiredAfterDefault {
        recipe: String,
        parameter: String,
        line: usize,
    },

    #[error("line {line}: unknown setting '{name}'")]
    UnknownSetting { name: String, line: usize },

    #[error("line {line}: invalid value for setting '{name}': {message}")]
    InvalidSetting {
        name: String,
        message: String,
        line: usize,
    },

    #[error("line {line}: unknown attribute '[{name}]'")]
    UnknownAttribute { name: String, line: usize },

    #[error("line {line}: attribute is not followed by a recipe header")]
    DanglingAttribute { line: usize },

    #[error("line {line}: {source}")]
    Template {
        line: usize,
        #[source]
        source: TemplateError,
    },
}

impl ParseError {
    /// 1-based source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            Self::DuplicateRecipe { line, .. }
            | Self::OrphanCommand { line }
            | Self::MalformedPrerequisite { line, .. }
            | Self::MalformedHeader { line, .. }
            | Self::DuplicateParameter { line, .. }
            | Self::RequiredAfterDefault { line, .. }
            | Self::UnknownSetting { line, .. }
            | Self::InvalidSetting { line, .. }
            | Self::UnknownAttribute { line, .. }
            | Self::DanglingAttribute { line }
            | Self::Template { line, .. } => *line,
        }
    }
}

/// Malformed `{{...}}` placeholder in a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed '{{{{' at column {column}")]
    Unclosed { column: usize },

    #[error("empty placeholder at column {column}")]
    Empty { column: usize },

    #[error("recipe '{recipe}' has no parameter named '{name}'")]
    UnknownVariable { recipe: String, name: String },

    #[error("recipe '{recipe}' uses '{{{{@}}}}' but does not forward positional arguments")]
    ForwardedOutsidePositional { recipe: String },
}

/// Prerequisite expansion failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("{}", unknown_recipe_message(.name, .required_by.as_deref()))]
    UnknownRecipe {
        name: String,
        required_by: Option<String>,
    },

    #[error("dependency cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

fn unknown_recipe_message(name: &str, required_by: Option<&str>) -> String {
    match required_by {
        Some(parent) => format!("recipe '{}' depends on unknown recipe '{}'", parent, name),
        None => format!("unknown recipe '{}'", name),
    }
}

/// Argument binding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("recipe '{recipe}' requires argument '{parameter}' (got {got}, needs at least {needed})")]
    MissingArgument {
        recipe: String,
        parameter: String,
        got: usize,
        needed: usize,
    },

    #[error("recipe '{recipe}' takes at most {max} argument(s) but got {got}")]
    TooManyArguments {
        recipe: String,
        max: usize,
        got: usize,
    },
}

/// Crate-level error surfaced to the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("no Jigfile found in {} or any parent directory", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialize error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("{0}")]
    Usage(String),

    #[error("{0} validation error(s)")]
    Invalid(usize),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        EXIT_DEFINITION_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_messages() {
        let e = ParseError::DuplicateRecipe {
            name: "build".to_string(),
            line: 7,
            first: 2,
        };
        assert_eq!(
            e.to_string(),
            "line 7: recipe 'build' is already defined on line 2"
        );
        assert_eq!(e.line(), 7);

        let e = ParseError::OrphanCommand { line: 1 };
        assert!(e.to_string().contains("not indented under any recipe"));
    }

    #[test]
    fn test_template_error_braces() {
        let e = TemplateError::Unclosed { column: 4 };
        assert_eq!(e.to_string(), "unclosed '{{' at column 4");
        let e = TemplateError::ForwardedOutsidePositional {
            recipe: "lint".to_string(),
        };
        assert!(e.to_string().contains("'{{@}}'"));
    }

    #[test]
    fn test_resolution_error_messages() {
        let e = ResolutionError::UnknownRecipe {
            name: "ghost".to_string(),
            required_by: Some("build".to_string()),
        };
        assert_eq!(
            e.to_string(),
            "recipe 'build' depends on unknown recipe 'ghost'"
        );

        let e = ResolutionError::UnknownRecipe {
            name: "ghost".to_string(),
            required_by: None,
        };
        assert_eq!(e.to_string(), "unknown recipe 'ghost'");

        let e = ResolutionError::Cycle {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(e.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_bind_error_messages() {
        let e = BindError::TooManyArguments {
            recipe: "lint".to_string(),
            max: 0,
            got: 2,
        };
        assert_eq!(
            e.to_string(),
            "recipe 'lint' takes at most 0 argument(s) but got 2"
        );
    }

    #[test]
    fn test_error_exit_code() {
        let e = Error::from(BindError::MissingArgument {
            recipe: "serve".to_string(),
            parameter: "port".to_string(),
            got: 0,
            needed: 1,
        });
        assert_eq!(e.exit_code(), EXIT_DEFINITION_ERROR);
        assert!(e.to_string().contains("requires argument 'port'"));
    }
}
