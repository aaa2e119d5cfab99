//! Generic Pattern Matcher: the fallback for unrecognized language tags
//!
//! An ordered table of print idioms from common language families is applied
//! to the whole source. Each idiom captures one quoted literal. Matches are
//! reported idiom by idiom, so output follows table order rather than source
//! order.

use std::ops::Range;
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::Context;
use regex::Regex;

use crate::heuristic::unescape;
use crate::result::{PartialResult, Status};

/// A double- or single-quoted literal on one line
const LITERAL: &str = r#"(?:"(?P<double>(?:[^"\\\n]|\\.)*)"|'(?P<single>(?:[^'\\\n]|\\.)*)')"#;

/// Idiom prefixes, in priority order; each is followed by [`LITERAL`]
const IDIOMS: &[(&str, &str)] = &[
    ("echo", r"\becho\s+"),
    ("puts", r"(?:^|[^.\w])puts\s*\(?\s*"),
    ("println!", r"\bprintln!\s*\(\s*"),
    ("fmt.Println", r"\bfmt\.Print(?:ln|f)?\s*\(\s*"),
    ("Console.WriteLine", r"\bConsole\.Write(?:Line)?\s*\(\s*"),
    ("console.log", r"\bconsole\.log\s*\(\s*"),
    ("System.out.println", r"\bSystem\.out\.print(?:ln)?\s*\(\s*"),
    ("println", r"(?:^|[^.\w])println\s*\(?\s*"),
    ("print", r"(?:^|[^.\w])print\s*\(?\s*"),
    ("printf", r"(?:^|[^.\w])printf\s*\(?\s*"),
    ("say", r"(?:^|[^.\w])say\s+"),
    ("Write-Host", r"\bWrite-Host\s+"),
    ("IO.puts", r"\bIO\.puts\s*\(?\s*"),
    ("putStrLn", r"\bputStrLn\s+\(?\s*"),
];

struct Idiom {
    name: &'static str,
    pattern: Regex,
}

fn idioms() -> &'static Result<Vec<Idiom>, regex::Error> {
    static IDIOM_TABLE: OnceLock<Result<Vec<Idiom>, regex::Error>> = OnceLock::new();
    IDIOM_TABLE.get_or_init(|| {
        IDIOMS
            .iter()
            .map(|&(name, prefix)| -> Result<Idiom, regex::Error> {
                Ok(Idiom {
                    name,
                    pattern: Regex::new(&format!("(?m){prefix}{LITERAL}"))?,
                })
            })
            .collect()
    })
}

/// Collects every literal printed by a known idiom in `source`
///
/// `language` is the caller's original tag and only appears in the
/// diagnostic shown when nothing matched.
pub fn simulate(language: &str, source: &str, stdin: &str) -> anyhow::Result<PartialResult> {
    let started = Instant::now();
    let idioms = idioms()
        .as_ref()
        .map_err(Clone::clone)
        .context("Invalid idiom table")?;

    let mut claimed: Vec<Range<usize>> = Vec::new();
    let mut output = String::new();
    for idiom in idioms {
        for caps in idiom.pattern.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let range = whole.range();
            if claimed
                .iter()
                .any(|c| c.start < range.end && range.start < c.end)
            {
                continue;
            }
            let Some(body) = caps.name("double").or_else(|| caps.name("single")) else {
                continue;
            };
            log::trace!("Idiom {} matched at {range:?}", idiom.name);
            claimed.push(range);
            let text = unescape(body.as_str());
            output.push_str(text.strip_suffix('\n').unwrap_or(&text));
            output.push('\n');
        }
    }

    if claimed.is_empty() {
        output = diagnostic(language, source, stdin);
    }

    Ok(PartialResult {
        memory: Some((source.len() + output.len()) as u64),
        output: Some(output),
        error: Some(String::new()),
        exit_code: Some(0),
        execution_time: Some(started.elapsed().as_secs_f64()),
        status: Some(Status::simulated()),
    })
}

fn diagnostic(language: &str, source: &str, stdin: &str) -> String {
    format!(
        "No output statements recognized for language '{language}'.\n\
         Input provided: {}\n\
         Source length: {} characters",
        if stdin.trim().is_empty() { "no" } else { "yes" },
        source.chars().count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(source: &str) -> String {
        simulate("mystery", source, "")
            .unwrap()
            .output
            .unwrap_or_default()
    }

    #[test]
    fn test_idioms_from_several_families() {
        assert_eq!(output("#!/bin/sh\necho \"hello\"\n"), "hello\n");
        assert_eq!(output("fn main() { println!(\"hi {}\", 1); }"), "hi {}\n");
        assert_eq!(output("fmt.Println(\"go\")"), "go\n");
        assert_eq!(output("Write-Host 'ps'"), "ps\n");
        assert_eq!(output("IO.puts \"elixir\""), "elixir\n");
        assert_eq!(output("main = putStrLn \"haskell\""), "haskell\n");
    }

    #[test]
    fn test_output_is_grouped_by_idiom() {
        let source = "print(\"second\")\necho \"first\"\nprint('third')\n";
        assert_eq!(output(source), "first\nsecond\nthird\n");
    }

    #[test]
    fn test_overlapping_match_is_claimed_once() {
        assert_eq!(output("echo \"puts 'x'\""), "puts 'x'\n");
        assert_eq!(output("System.out.println(\"jvm\");"), "jvm\n");
    }

    #[test]
    fn test_no_match_reports_diagnostic() {
        let result = simulate("brainfuck", "++[>+<-]", "5\n").unwrap();
        assert_eq!(
            result.output.as_deref(),
            Some(
                "No output statements recognized for language 'brainfuck'.\n\
                 Input provided: yes\n\
                 Source length: 8 characters"
            )
        );
        assert_eq!(result.status, Some(Status::simulated()));
        assert_eq!(result.exit_code, Some(0));
    }
}
