//! Definition source parsing.
//!
//! A definition source is a sequence of blocks:
//! - `# text` directly above a header becomes the recipe's doc comment
//! - `set NAME [VALUE...]` sets a store-wide option
//! - `[attr, attr]` applies attributes to the next header
//! - `NAME [PARAM | PARAM=DEFAULT | *VARIADIC]... : [PREREQ]...` opens a recipe
//! - indented lines below a header are its command lines (`@` = no echo)

use super::error::{Error, ParseError, TemplateError};
use super::template::Template;
use super::types::*;
use indexmap::IndexMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// File names searched for, in order, when no `--file` is given.
pub const DEFINITION_NAMES: [&str; 3] = ["Jigfile", "jigfile", ".jigfile"];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier regex"));

fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// Find a definition file in `start` or the nearest ancestor directory.
pub fn find_definition(start: &Path) -> Result<PathBuf, Error> {
    for dir in start.ancestors() {
        for name in DEFINITION_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "found definition file");
                return Ok(candidate);
            }
        }
    }
    Err(Error::NotFound(start.to_path_buf()))
}

/// Read a definition file from disk. Returns the source alongside the store
/// so callers can fingerprint it.
pub fn parse_file(path: &Path) -> Result<(String, RecipeStore), Error> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let store = parse(&source).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok((source, store))
}

/// Parse a definition source into a recipe store.
pub fn parse(source: &str) -> Result<RecipeStore, ParseError> {
    let mut parser = Parser::default();
    for (idx, raw) in source.lines().enumerate() {
        parser.line(idx + 1, raw.trim_end_matches('\r'))?;
    }
    let store = parser.finish()?;
    tracing::debug!(
        recipes = store.len(),
        positional = store.settings.positional_arguments,
        "parsed definition source"
    );
    Ok(store)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Private,
    PositionalArguments,
}

#[derive(Default)]
struct Parser {
    settings: Settings,
    recipes: IndexMap<String, Recipe>,
    current: Option<Recipe>,
    pending_doc: Option<String>,
    pending_attrs: Vec<(Attribute, usize)>,
}

impl Parser {
    fn line(&mut self, number: usize, raw: &str) -> Result<(), ParseError> {
        if raw.trim().is_empty() {
            self.pending_doc = None;
            return Ok(());
        }

        if raw.starts_with(' ') || raw.starts_with('\t') {
            return self.command_line(number, raw.trim());
        }

        if let Some(comment) = raw.strip_prefix('#') {
            if !comment.starts_with('!') {
                self.pending_doc = Some(comment.trim().to_string());
            }
            return Ok(());
        }

        self.close_recipe();

        if let Some(rest) = raw.strip_prefix("set ") {
            self.reject_pending_attrs()?;
            self.pending_doc = None;
            return self.setting(number, rest);
        }

        if raw.starts_with('[') {
            return self.attributes(number, raw.trim());
        }

        self.header(number, raw)
    }

    fn command_line(&mut self, number: usize, text: &str) -> Result<(), ParseError> {
        let recipe = self
            .current
            .as_mut()
            .ok_or(ParseError::OrphanCommand { line: number })?;
        let (echo, text) = match text.strip_prefix('@') {
            Some(rest) => (false, rest.trim_start()),
            None => (true, text),
        };
        let template = Template::parse(text).map_err(|source| ParseError::Template {
            line: number,
            source,
        })?;
        recipe.lines.push(CommandLine {
            text: text.to_string(),
            echo,
            line: number,
            template,
        });
        Ok(())
    }

    fn setting(&mut self, number: usize, rest: &str) -> Result<(), ParseError> {
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let values: Vec<String> = tokens.map(str::to_string).collect();

        match name {
            "positional-arguments" => {
                self.settings.positional_arguments = match values.as_slice() {
                    [] => true,
                    [v] if v == "true" => true,
                    [v] if v == "false" => false,
                    _ => {
                        return Err(ParseError::InvalidSetting {
                            name: name.to_string(),
                            message: "expected 'true' or 'false'".to_string(),
                            line: number,
                        })
                    }
                };
            }
            "shell" => {
                if values.is_empty() {
                    return Err(ParseError::InvalidSetting {
                        name: name.to_string(),
                        message: "expected a program name".to_string(),
                        line: number,
                    });
                }
                self.settings.shell = values;
            }
            _ => {
                return Err(ParseError::UnknownSetting {
                    name: name.to_string(),
                    line: number,
                })
            }
        }
        Ok(())
    }

    fn attributes(&mut self, number: usize, text: &str) -> Result<(), ParseError> {
        let inner = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(|| ParseError::MalformedHeader {
                line: number,
                message: format!("unterminated attribute list '{}'", text),
            })?;
        for name in inner.split(',').map(str::trim) {
            let attr = match name {
                "private" => Attribute::Private,
                "positional-arguments" => Attribute::PositionalArguments,
                _ => {
                    return Err(ParseError::UnknownAttribute {
                        name: name.to_string(),
                        line: number,
                    })
                }
            };
            self.pending_attrs.push((attr, number));
        }
        Ok(())
    }

    fn header(&mut self, number: usize, raw: &str) -> Result<(), ParseError> {
        let malformed = |message: String| ParseError::MalformedHeader {
            line: number,
            message,
        };

        let colon = find_unquoted_colon(raw)
            .ok_or_else(|| malformed(format!("expected ':' in '{}'", raw.trim())))?;
        let left = split_words(&raw[..colon]).map_err(&malformed)?;
        let right = &raw[colon + 1..];

        let (name, params) = left
            .split_first()
            .ok_or_else(|| malformed("missing recipe name".to_string()))?;
        if !is_identifier(name) {
            return Err(malformed(format!("invalid recipe name '{}'", name)));
        }

        let mut recipe = Recipe {
            name: name.clone(),
            doc: self.pending_doc.take(),
            parameters: Vec::new(),
            variadic: None,
            prerequisites: Vec::new(),
            lines: Vec::new(),
            positional: false,
            private: false,
            line: number,
        };

        for (attr, _) in self.pending_attrs.drain(..) {
            match attr {
                Attribute::Private => recipe.private = true,
                Attribute::PositionalArguments => recipe.positional = true,
            }
        }

        for token in params {
            if recipe.variadic.is_some() {
                return Err(malformed(format!(
                    "parameter '{}' follows variadic parameter",
                    token
                )));
            }
            let param = parse_parameter(token).map_err(&malformed)?;
            let taken = recipe.parameters.iter().any(|p| p.name == param.name());
            if taken {
                return Err(ParseError::DuplicateParameter {
                    recipe: recipe.name.clone(),
                    parameter: param.name().to_string(),
                    line: number,
                });
            }
            match param {
                ParsedParameter::Variadic(v) => recipe.variadic = Some(v),
                ParsedParameter::Named(p) => {
                    let after_default = recipe.parameters.iter().any(|q| q.default.is_some());
                    if after_default && p.default.is_none() {
                        return Err(ParseError::RequiredAfterDefault {
                            recipe: recipe.name.clone(),
                            parameter: p.name,
                            line: number,
                        });
                    }
                    recipe.parameters.push(p);
                }
            }
        }

        if recipe.positional && (!recipe.parameters.is_empty() || recipe.variadic.is_some()) {
            return Err(malformed(format!(
                "recipe '{}' forwards positional arguments and cannot declare parameters",
                recipe.name
            )));
        }

        for token in right.split_whitespace() {
            if !is_identifier(token) {
                return Err(ParseError::MalformedPrerequisite {
                    recipe: recipe.name.clone(),
                    token: token.to_string(),
                    line: number,
                });
            }
            recipe.prerequisites.push(token.to_string());
        }

        if let Some(existing) = self.recipes.get(&recipe.name) {
            return Err(ParseError::DuplicateRecipe {
                name: recipe.name,
                line: number,
                first: existing.line,
            });
        }

        self.current = Some(recipe);
        Ok(())
    }

    fn close_recipe(&mut self) {
        if let Some(recipe) = self.current.take() {
            self.recipes.insert(recipe.name.clone(), recipe);
        }
    }

    fn reject_pending_attrs(&self) -> Result<(), ParseError> {
        match self.pending_attrs.first() {
            Some((_, line)) => Err(ParseError::DanglingAttribute { line: *line }),
            None => Ok(()),
        }
    }

    fn finish(mut self) -> Result<RecipeStore, ParseError> {
        self.close_recipe();
        self.reject_pending_attrs()?;

        let global = self.settings.positional_arguments;
        for recipe in self.recipes.values_mut() {
            if global && recipe.parameters.is_empty() && recipe.variadic.is_none() {
                recipe.positional = true;
            }
            check_placeholders(recipe)?;
        }

        Ok(RecipeStore {
            settings: self.settings,
            recipes: self.recipes,
        })
    }
}

/// Every placeholder must name a declared parameter; `{{@}}` needs forwarding.
fn check_placeholders(recipe: &Recipe) -> Result<(), ParseError> {
    for line in &recipe.lines {
        for name in line.template.variables() {
            let declared = recipe.parameters.iter().any(|p| p.name == name)
                || recipe.variadic.as_deref() == Some(name);
            if !declared {
                return Err(ParseError::Template {
                    line: line.line,
                    source: TemplateError::UnknownVariable {
                        recipe: recipe.name.clone(),
                        name: name.to_string(),
                    },
                });
            }
        }
        if line.template.has_forwarded() && !recipe.positional {
            return Err(ParseError::Template {
                line: line.line,
                source: TemplateError::ForwardedOutsidePositional {
                    recipe: recipe.name.clone(),
                },
            });
        }
    }
    Ok(())
}

enum ParsedParameter {
    Named(Parameter),
    Variadic(String),
}

impl ParsedParameter {
    fn name(&self) -> &str {
        match self {
            Self::Named(p) => &p.name,
            Self::Variadic(v) => v,
        }
    }
}

fn parse_parameter(token: &str) -> Result<ParsedParameter, String> {
    if let Some(name) = token.strip_prefix('*') {
        if !is_identifier(name) {
            return Err(format!("invalid variadic parameter '{}'", token));
        }
        return Ok(ParsedParameter::Variadic(name.to_string()));
    }

    let (name, default) = match token.split_once('=') {
        Some((n, d)) => (n, Some(unquote(d))),
        None => (token, None),
    };
    if !is_identifier(name) {
        return Err(format!("invalid parameter name '{}'", name));
    }
    Ok(ParsedParameter::Named(Parameter {
        name: name.to_string(),
        default,
    }))
}

fn unquote(value: &str) -> String {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Byte offset of the first `:` outside single or double quotes.
fn find_unquoted_colon(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ':') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on whitespace outside quotes; quotes are kept in the words.
fn split_words(s: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) => {
                word.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                word.push(c);
            }
        }
    }
    if quote.is_some() {
        return Err(format!("unterminated quote in '{}'", s.trim()));
    }
    if !word.is_empty() {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOYDB: &str = r#"
set shell bash -c

# Run the test suite
test *args:
    pytest {{args}}

# Format and lint
lint:
    ruff format .
    ruff check --fix .

# Open a shell with the app loaded
[positional-arguments]
shell:
    python -i -c "from toydb import ToyDB" {{@}}

typecheck:
    mypy toydb

# Start the development server
serve host="127.0.0.1" port="8000": lint
    @echo "serving on {{host}}:{{port}}"
    uvicorn toydb.app:app --reload --host {{host}} --port {{port}}
"#;

    #[test]
    fn test_parse_toydb() {
        let store = parse(TOYDB).unwrap();
        assert_eq!(store.settings.shell, vec!["bash", "-c"]);
        let names: Vec<_> = store.recipes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["test", "lint", "shell", "typecheck", "serve"]);

        let test = &store.recipes["test"];
        assert_eq!(test.doc.as_deref(), Some("Run the test suite"));
        assert_eq!(test.variadic.as_deref(), Some("args"));
        assert!(!test.positional);

        let lint = &store.recipes["lint"];
        assert_eq!(lint.lines.len(), 2);
        assert_eq!(lint.lines[1].text, "ruff check --fix .");
        assert_eq!(lint.lines[1].line, 11);

        assert!(store.recipes["shell"].positional);
        assert!(store.recipes["typecheck"].doc.is_none());

        let serve = &store.recipes["serve"];
        assert_eq!(serve.prerequisites, vec!["lint"]);
        assert_eq!(serve.parameters.len(), 2);
        assert_eq!(serve.parameters[0].default.as_deref(), Some("127.0.0.1"));
        assert!(!serve.lines[0].echo);
        assert!(serve.lines[1].echo);
    }

    #[test]
    fn test_parse_deterministic() {
        assert_eq!(parse(TOYDB).unwrap(), parse(TOYDB).unwrap());
    }

    #[test]
    fn test_parse_empty_source() {
        let store = parse("").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.settings, Settings::default());
    }

    #[test]
    fn test_parse_empty_body() {
        let store = parse("all: build test\nbuild:\n  echo b\ntest:\n  echo t\n").unwrap();
        assert!(store.recipes["all"].lines.is_empty());
        assert_eq!(store.recipes["all"].prerequisites, vec!["build", "test"]);
    }

    #[test]
    fn test_parse_blank_lines_inside_body() {
        let store = parse("build:\n    echo one\n\n    echo two\n").unwrap();
        assert_eq!(store.recipes["build"].lines.len(), 2);
    }

    #[test]
    fn test_parse_tab_indent() {
        let store = parse("build:\n\techo tab\n").unwrap();
        assert_eq!(store.recipes["build"].lines[0].text, "echo tab");
    }

    #[test]
    fn test_parse_crlf() {
        let store = parse("build:\r\n    echo ok\r\n").unwrap();
        assert_eq!(store.recipes["build"].lines[0].text, "echo ok");
    }

    #[test]
    fn test_duplicate_recipe() {
        let err = parse("a:\n  echo 1\na:\n  echo 2\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateRecipe {
                name: "a".to_string(),
                line: 3,
                first: 1,
            }
        );
    }

    #[test]
    fn test_orphan_command() {
        let err = parse("    echo nobody\n").unwrap_err();
        assert_eq!(err, ParseError::OrphanCommand { line: 1 });
    }

    #[test]
    fn test_orphan_after_setting() {
        let err = parse("a:\n  echo a\nset positional-arguments\n  echo lost\n").unwrap_err();
        assert_eq!(err, ParseError::OrphanCommand { line: 4 });
    }

    #[test]
    fn test_malformed_prerequisite() {
        let err = parse("build: compile, test\n  echo\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedPrerequisite {
                recipe: "build".to_string(),
                token: "compile,".to_string(),
                line: 1,
            }
        );
    }

    #[test]
    fn test_header_without_colon() {
        let err = parse("build\n  echo\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 1, .. }));
    }

    #[test]
    fn test_invalid_recipe_name() {
        let err = parse("9lives:\n  echo\n").unwrap_err();
        assert!(err.to_string().contains("invalid recipe name"));
    }

    #[test]
    fn test_quoted_default_with_colon_and_space() {
        let store = parse("serve addr=\"0.0.0.0:80\" greeting='hi there':\n  echo\n").unwrap();
        let params = &store.recipes["serve"].parameters;
        assert_eq!(params[0].default.as_deref(), Some("0.0.0.0:80"));
        assert_eq!(params[1].default.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse("serve host=\"oops:\n  echo\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { .. }));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = parse("a x x:\n  echo\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateParameter { .. }));
        let err = parse("a x *x:\n  echo\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_required_after_default() {
        let err = parse("a x=1 y:\n  echo\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::RequiredAfterDefault {
                recipe: "a".to_string(),
                parameter: "y".to_string(),
                line: 1,
            }
        );
    }

    #[test]
    fn test_variadic_must_be_last() {
        let err = parse("a *rest x:\n  echo\n").unwrap_err();
        assert!(err.to_string().contains("follows variadic"));
    }

    #[test]
    fn test_unknown_setting() {
        let err = parse("set dotenv-load\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownSetting { line: 1, .. }));
    }

    #[test]
    fn test_shell_setting_needs_program() {
        let err = parse("set shell\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidSetting { .. }));
    }

    #[test]
    fn test_positional_setting_values() {
        assert!(!parse("set positional-arguments false\n").unwrap().settings.positional_arguments);
        assert!(parse("set positional-arguments true\n").unwrap().settings.positional_arguments);
        assert!(parse("set positional-arguments maybe\n").is_err());
    }

    #[test]
    fn test_global_positional_applies_to_parameterless() {
        let store = parse(
            "set positional-arguments\nfmt:\n  ruff format {{@}}\nserve port:\n  run {{port}}\n",
        )
        .unwrap();
        assert!(store.recipes["fmt"].positional);
        assert!(!store.recipes["serve"].positional);
    }

    #[test]
    fn test_global_positional_declared_late() {
        let store = parse("fmt:\n  ruff format {{@}}\nset positional-arguments\n").unwrap();
        assert!(store.recipes["fmt"].positional);
    }

    #[test]
    fn test_unknown_attribute() {
        let err = parse("[parallel]\na:\n  echo\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownAttribute { line: 1, .. }));
    }

    #[test]
    fn test_dangling_attribute() {
        let err = parse("a:\n  echo\n[private]\n").unwrap_err();
        assert_eq!(err, ParseError::DanglingAttribute { line: 3 });
    }

    #[test]
    fn test_private_attribute() {
        let store = parse("[private]\n_setup:\n  echo\nbuild: _setup\n  echo\n").unwrap();
        assert!(store.recipes["_setup"].private);
        assert_eq!(store.public_recipes().count(), 1);
    }

    #[test]
    fn test_positional_attribute_rejects_parameters() {
        let err = parse("[positional-arguments]\na x:\n  echo\n").unwrap_err();
        assert!(err.to_string().contains("cannot declare parameters"));
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = parse("a x:\n  echo {{y}}\n").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("no parameter named 'y'"));
    }

    #[test]
    fn test_forwarded_placeholder_needs_positional() {
        let err = parse("a:\n  echo {{@}}\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Template {
                source: TemplateError::ForwardedOutsidePositional { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_doc_comment_reset_by_blank_line() {
        let store = parse("# not a doc\n\na:\n  echo\n").unwrap();
        assert!(store.recipes["a"].doc.is_none());
    }

    #[test]
    fn test_shebang_ignored() {
        let store = parse("#!/usr/bin/env jig\na:\n  echo\n").unwrap();
        assert!(store.recipes["a"].doc.is_none());
    }

    #[test]
    fn test_find_definition_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Jigfile"), "a:\n  echo\n").unwrap();
        let nested = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_definition(&nested).unwrap();
        assert_eq!(found, dir.path().join("Jigfile"));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Jigfile");
        std::fs::write(&path, "build:\n  echo ok\n").unwrap();
        let (source, store) = parse_file(&path).unwrap();
        assert!(source.contains("echo ok"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_parse_file_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Jigfile");
        std::fs::write(&path, "  orphan\n").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("Jigfile"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/nonexistent/Jigfile")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
