//! Command line templates: `{{name}}` placeholders resolved against bindings.
//!
//! A template is tokenized once, at parse time, into literal text and tagged
//! placeholders. Rendering only ever substitutes bound values for those
//! tokens; nothing else in the line is interpreted.
//!
//! - `{{name}}`: a named or variadic parameter
//! - `{{@}}`: the forwarded positional argument list
//! - `{{{{`: a literal `{{`

use super::error::TemplateError;
use super::types::{BoundValue, Bindings};

/// One token of a parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Variable(String),
    Forwarded,
}

/// A tokenized command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    fragments: Vec<Fragment>,
}

impl Template {
    /// Tokenize a command line.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut fragments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 2..];

            if let Some(stripped) = after.strip_prefix("{{") {
                literal.push_str("{{");
                offset += open + 4;
                rest = stripped;
                continue;
            }

            let close = after.find("}}").ok_or(TemplateError::Unclosed {
                column: offset + open + 1,
            })?;
            let key = after[..close].trim();
            if key.is_empty() {
                return Err(TemplateError::Empty {
                    column: offset + open + 1,
                });
            }

            if !literal.is_empty() {
                fragments.push(Fragment::Text(std::mem::take(&mut literal)));
            }
            fragments.push(if key == "@" {
                Fragment::Forwarded
            } else {
                Fragment::Variable(key.to_string())
            });

            offset += open + 2 + close + 2;
            rest = &after[close + 2..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            fragments.push(Fragment::Text(literal));
        }
        Ok(Self { fragments })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Names of every `{{name}}` placeholder, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Variable(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_forwarded(&self) -> bool {
        self.fragments.iter().any(|f| *f == Fragment::Forwarded)
    }

    /// Substitute bound values. Unbound names render as an empty string;
    /// the parser rejects placeholders that do not name a parameter.
    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(t) => out.push_str(t),
                Fragment::Variable(name) => match bindings.get(name) {
                    Some(BoundValue::Single(v)) => out.push_str(v),
                    Some(BoundValue::Variadic(vs)) => out.push_str(&join_quoted(vs)),
                    None => {}
                },
                Fragment::Forwarded => {
                    if let Some(ref args) = bindings.forwarded {
                        out.push_str(&join_quoted(args));
                    }
                }
            }
        }
        out
    }
}

/// Join arguments into one shell word list, quoting where needed.
pub fn join_quoted(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote one argument for a POSIX shell so it stays a single word.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '+' | '@' | '%')
        });
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        let values: IndexMap<String, BoundValue> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), BoundValue::Single(v.to_string())))
            .collect();
        Bindings {
            values,
            forwarded: None,
        }
    }

    #[test]
    fn test_parse_plain_text() {
        let t = Template::parse("echo hello").unwrap();
        assert_eq!(t.fragments(), &[Fragment::Text("echo hello".to_string())]);
        assert_eq!(t.render(&Bindings::default()), "echo hello");
    }

    #[test]
    fn test_render_named() {
        let t = Template::parse("uvicorn app:app --host {{host}} --port {{ port }}").unwrap();
        let vars: Vec<_> = t.variables().collect();
        assert_eq!(vars, vec!["host", "port"]);
        let out = t.render(&bindings(&[("host", "0.0.0.0"), ("port", "8000")]));
        assert_eq!(out, "uvicorn app:app --host 0.0.0.0 --port 8000");
    }

    #[test]
    fn test_named_values_are_verbatim() {
        let t = Template::parse("echo {{msg}}").unwrap();
        let out = t.render(&bindings(&[("msg", "a b; c")]));
        assert_eq!(out, "echo a b; c");
    }

    #[test]
    fn test_render_variadic_quoted() {
        let t = Template::parse("pytest {{args}}").unwrap();
        let mut b = Bindings::default();
        b.values.insert(
            "args".to_string(),
            BoundValue::Variadic(vec!["-k".to_string(), "foo and bar".to_string()]),
        );
        assert_eq!(t.render(&b), "pytest -k 'foo and bar'");
    }

    #[test]
    fn test_render_forwarded() {
        let t = Template::parse("ruff check {{@}} .").unwrap();
        assert!(t.has_forwarded());
        let b = Bindings {
            values: IndexMap::new(),
            forwarded: Some(vec!["--fix".to_string()]),
        };
        assert_eq!(t.render(&b), "ruff check --fix .");
    }

    #[test]
    fn test_escaped_braces() {
        let t = Template::parse("echo '{{{{not a var}}'").unwrap();
        assert_eq!(t.variables().count(), 0);
        assert_eq!(t.render(&Bindings::default()), "echo '{{not a var}}'");
    }

    #[test]
    fn test_unclosed() {
        let err = Template::parse("echo {{name").unwrap_err();
        assert_eq!(err, TemplateError::Unclosed { column: 6 });
    }

    #[test]
    fn test_empty_placeholder() {
        let err = Template::parse("echo {{  }}").unwrap_err();
        assert_eq!(err, TemplateError::Empty { column: 6 });
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("simple"), "simple");
        assert_eq!(shell_quote("path/to/file.py"), "path/to/file.py");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
