//! Heuristic Interpreters for languages the engine cannot execute
//!
//! Each language contributes a [`scan::Grammar`] table; the scanning and
//! rendering logic is shared.

mod cpp;
mod java;
mod python;
mod scan;
mod terms;

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Context;

use crate::budget::Budget;
use crate::result::PartialResult;
use scan::Grammar;

pub(crate) use terms::unescape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Java,
    /// C and C++ share one grammar
    Cpp,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }

    fn grammar(self) -> &'static Result<Grammar, regex::Error> {
        static PYTHON: OnceLock<Result<Grammar, regex::Error>> = OnceLock::new();
        static JAVA: OnceLock<Result<Grammar, regex::Error>> = OnceLock::new();
        static CPP: OnceLock<Result<Grammar, regex::Error>> = OnceLock::new();
        match self {
            Language::Python => PYTHON.get_or_init(python::grammar),
            Language::Java => JAVA.get_or_init(java::grammar),
            Language::Cpp => CPP.get_or_init(cpp::grammar),
        }
    }
}

/// Scans `source` with the grammar of `language`
pub fn interpret(
    language: Language,
    source: &str,
    stdin: &str,
    limit: Duration,
) -> anyhow::Result<PartialResult> {
    let budget = Budget::start(limit);
    let grammar = language
        .grammar()
        .as_ref()
        .map_err(Clone::clone)
        .with_context(|| format!("Invalid {} grammar", language.name()))?;
    Ok(scan::scan(grammar, source, stdin, budget))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::DEFAULT_TIME_LIMIT;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_grammar_compiles() {
        for language in [Language::Python, Language::Java, Language::Cpp] {
            assert!(language.grammar().is_ok(), "{}", language.name());
        }
    }

    #[test]
    fn test_interpret_times_out_on_zero_budget() {
        let result = interpret(Language::Python, "print('x')\n", "", Duration::ZERO).unwrap();
        assert_eq!(result.output.as_deref(), Some(""));
        assert_eq!(
            result.error.as_deref(),
            Some("Execution timed out after 0 seconds")
        );
    }

    #[test]
    fn test_interpret_python() {
        let result = interpret(Language::Python, "print('hi')\n", "", DEFAULT_TIME_LIMIT).unwrap();
        assert_eq!(result.output.as_deref(), Some("hi\n"));
    }
}
