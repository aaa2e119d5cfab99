//! Line scanner shared by every heuristic language
//!
//! Each statement is tried, in order, as a print, a literal assignment and a
//! simulated input call. Everything else is skipped without complaint.

use regex::{Captures, Regex};

use super::terms::{self, Literal, Style, Vars};
use crate::budget::Budget;
use crate::result::{PartialResult, Status};
use crate::stdin::StdinQueue;

/// Recognizers and rendering rules for one language
pub struct Grammar {
    /// Line comment marker
    pub comment: &'static str,
    /// Whether a line holds `;`-terminated statements that may share a line
    pub semicolons: bool,
    /// Statements ignored outright (`#include`, `import`)
    pub skip: Regex,
    pub prints: Vec<PrintRule>,
    /// `name = value` with capture groups `name`, `value` and optionally `type`
    pub assignment: Regex,
    pub inputs: Vec<InputRule>,
    pub style: Style,
    /// Entry point whose absence is reported as a warning
    pub entry_point: Option<EntryPoint>,
    /// First capture group names the program in the no-output message
    pub program_name: Option<Regex>,
    /// Message shown when nothing was printed
    pub no_output: fn(Option<&str>) -> String,
}

pub struct EntryPoint {
    pub pattern: Regex,
    pub warning: &'static str,
}

pub struct PrintRule {
    /// Captures the argument list as `args`
    pub pattern: Regex,
    /// printf-style: the first argument is a format string
    pub format: bool,
}

pub struct InputRule {
    pub pattern: Regex,
    /// Variables bound by one matched input statement, in read order
    pub slots: fn(&Captures<'_>) -> Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: Option<String>,
    /// Unrendered prompt argument, echoed before the consumed line
    pub prompt: Option<String>,
    pub conversion: Conversion,
}

/// How a consumed stdin line becomes a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Line,
    Token,
    /// First token, numeric when it parses as a number (`cin >> x`)
    Value,
    Int,
    Float,
}

struct Scanner<'g> {
    grammar: &'g Grammar,
    vars: Vars,
    stdin: StdinQueue,
    output: String,
}

/// Scans `source` line by line and synthesizes the program's transcript
pub fn scan(grammar: &Grammar, source: &str, stdin: &str, budget: Budget) -> PartialResult {
    let mut scanner = Scanner {
        grammar,
        vars: Vars::new(),
        stdin: StdinQueue::new(stdin),
        output: String::new(),
    };

    let mut timed_out = false;
    for line in source.lines() {
        if budget.exceeded() {
            timed_out = true;
            break;
        }
        scanner.line(line);
    }

    let warning = grammar
        .entry_point
        .as_ref()
        .filter(|entry| !entry.pattern.is_match(source))
        .map(|entry| entry.warning.to_string());
    let Scanner { vars, output, .. } = scanner;
    let memory = source.len()
        + output.len()
        + vars.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>();
    let output = if output.is_empty() && !timed_out {
        let name = grammar
            .program_name
            .as_ref()
            .and_then(|pattern| pattern.captures(source))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        (grammar.no_output)(name)
    } else {
        output
    };

    let result = PartialResult {
        output: Some(output),
        error: warning.clone(),
        execution_time: Some(budget.elapsed().as_secs_f64()),
        memory: Some(memory as u64),
        status: Some(Status::success()),
        exit_code: Some(0),
    };
    if timed_out {
        let message = match warning {
            Some(warning) => format!("{warning}\n{}", budget.timeout_message()),
            None => budget.timeout_message(),
        };
        return result.fail(message);
    }
    result
}

impl Scanner<'_> {
    fn line(&mut self, line: &str) {
        let line = match terms::find_outside_quotes(line, self.grammar.comment) {
            Some(i) => &line[..i],
            None => line,
        };
        if self.grammar.semicolons {
            for statement in split_statements(line) {
                self.statement(statement.trim());
            }
        } else {
            let statement = line.trim();
            self.statement(statement.strip_suffix(';').unwrap_or(statement).trim_end());
        }
    }

    fn statement(&mut self, statement: &str) {
        if statement.is_empty() || self.grammar.skip.is_match(statement) {
            return;
        }
        if self.print(statement) || self.assign(statement) || self.input(statement) {
            return;
        }
        // an assignment we cannot evaluate leaves the variable unknown
        if let Some(caps) = self.grammar.assignment.captures(statement) {
            self.vars.remove(&caps["name"]);
        }
    }

    fn print(&mut self, statement: &str) -> bool {
        let grammar = self.grammar;
        for rule in &grammar.prints {
            let Some(caps) = rule.pattern.captures(statement) else {
                continue;
            };
            let args = caps.name("args").map_or("", |m| m.as_str());
            let rendered = if rule.format {
                terms::render_format(args, &self.vars, &grammar.style)
            } else {
                terms::render_args(args, &self.vars, &grammar.style)
            };
            match rendered {
                Some(text) => self.emit(&text),
                None => log::debug!("Skipping print with unresolved arguments: {statement}"),
            }
            return true;
        }
        false
    }

    fn assign(&mut self, statement: &str) -> bool {
        let grammar = self.grammar;
        let Some(caps) = grammar.assignment.captures(statement) else {
            return false;
        };
        let Some(mut value) = terms::resolve_value(&caps["value"], &self.vars, &grammar.style)
        else {
            return false;
        };
        let floating = caps
            .name("type")
            .is_some_and(|t| matches!(t.as_str(), "double" | "float"));
        if let Literal::Number(text) = &mut value {
            if floating && grammar.style.float_point && !text.contains(['.', 'e', 'E']) {
                text.push_str(".0");
            }
        }
        self.vars.insert(caps["name"].to_string(), value);
        true
    }

    fn input(&mut self, statement: &str) -> bool {
        let grammar = self.grammar;
        let Some((rule, caps)) = grammar
            .inputs
            .iter()
            .find_map(|rule| rule.pattern.captures(statement).map(|caps| (rule, caps)))
        else {
            return false;
        };

        for slot in (rule.slots)(&caps) {
            let prompt = slot
                .prompt
                .as_deref()
                .and_then(|p| terms::resolve_value(p, &self.vars, &grammar.style))
                .map(|p| p.render(&grammar.style))
                .unwrap_or_default();
            let line = self.stdin.pop();
            match &line {
                Some(line) => self.emit(&format!("{prompt}{line}")),
                None if !prompt.is_empty() => self.emit(&prompt),
                None => {}
            }
            if let Some(name) = slot.name {
                let value = convert(line.as_deref().unwrap_or(""), slot.conversion, &grammar.style);
                self.vars.insert(name, value);
            }
        }
        true
    }

    /// Appends one transcript line; a trailing newline in `text` is not doubled
    fn emit(&mut self, text: &str) {
        self.output.push_str(text.strip_suffix('\n').unwrap_or(text));
        self.output.push('\n');
    }
}

/// Splits a line at top-level `;`, `{` and `}`
fn split_statements(line: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ';' | '{' | '}' if depth == 0 => {
                statements.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&line[start..]);
    statements
}

fn convert(line: &str, conversion: Conversion, style: &Style) -> Literal {
    let token = line.split_whitespace().next().unwrap_or("");
    match conversion {
        Conversion::Line => Literal::Text(line.to_string()),
        Conversion::Token => Literal::Text(token.to_string()),
        Conversion::Value if token.parse::<f64>().is_ok_and(f64::is_finite) => {
            Literal::Number(token.to_string())
        }
        Conversion::Value => Literal::Text(token.to_string()),
        Conversion::Int => match token.parse::<i64>() {
            Ok(n) => Literal::Number(n.to_string()),
            Err(_) => Literal::Text(token.to_string()),
        },
        Conversion::Float => match token.parse::<f64>() {
            Ok(n) if style.float_point && n.is_finite() && n.fract() == 0.0 => {
                Literal::Number(format!("{n:.1}"))
            }
            Ok(n) => Literal::Number(n.to_string()),
            Err(_) => Literal::Text(token.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_statements() {
        assert_eq!(
            split_statements(r#"int main() { cout << "a;b" << endl; return 0; }"#),
            vec!["int main() ", r#" cout << "a;b" << endl"#, " return 0", " ", ""]
        );
        assert_eq!(
            split_statements("for (int i = 0; i < 3; i++) {"),
            vec!["for (int i = 0; i < 3; i++) ", ""]
        );
    }

    #[test]
    fn test_convert() {
        let style = Style {
            true_text: "true",
            false_text: "false",
            null_text: "null",
            separator: None,
            line_breaks: &[],
            wrappers: &[],
            fstrings: false,
            float_point: true,
        };
        assert_eq!(convert(" 42 rest", Conversion::Int, &style), Literal::Number("42".to_string()));
        assert_eq!(convert("3", Conversion::Float, &style), Literal::Number("3.0".to_string()));
        assert_eq!(convert("a b", Conversion::Token, &style), Literal::Text("a".to_string()));
        assert_eq!(convert("a b", Conversion::Line, &style), Literal::Text("a b".to_string()));
        assert_eq!(convert("x", Conversion::Int, &style), Literal::Text("x".to_string()));
        assert_eq!(convert("12 x", Conversion::Value, &style), Literal::Number("12".to_string()));
        assert_eq!(convert("ab", Conversion::Value, &style), Literal::Text("ab".to_string()));
    }
}
