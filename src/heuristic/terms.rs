//! Rendering of print arguments and literal values
//!
//! A term is one operand of a print statement: a quoted literal, a number,
//! a boolean, a known variable or a conversion wrapper around one of those.
//! Anything else is unresolvable, and a print containing an unresolvable
//! term is skipped entirely.

use std::collections::HashMap;

/// Last value recorded for a variable
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    /// Numeric literal kept in the form the language would print it
    Number(String),
    Bool(bool),
    Null,
}

pub type Vars = HashMap<String, Literal>;

/// Largest width or precision a format directive may request
const MAX_FORMAT_FIELD: usize = 100;

/// Parses a width or precision field, rejecting values past the cap
fn format_field(digits: &str) -> Option<usize> {
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse::<usize>().ok().filter(|&n| n <= MAX_FORMAT_FIELD)
}

/// Language-specific rendering rules
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub true_text: &'static str,
    pub false_text: &'static str,
    pub null_text: &'static str,
    /// Top-level argument separator and the text placed between rendered parts
    pub separator: Option<(&'static str, &'static str)>,
    /// Bare words that print as a line break (`endl`)
    pub line_breaks: &'static [&'static str],
    /// Single-argument calls rendered as their argument (`str(x)`)
    pub wrappers: &'static [&'static str],
    /// Whether `f"..."` interpolation is recognized
    pub fstrings: bool,
    /// Whether integral floating values print with a trailing `.0`
    pub float_point: bool,
}

impl Literal {
    pub fn render(&self, style: &Style) -> String {
        match self {
            Literal::Text(text) | Literal::Number(text) => text.clone(),
            Literal::Bool(true) => style.true_text.to_string(),
            Literal::Bool(false) => style.false_text.to_string(),
            Literal::Null => style.null_text.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Number(text) | Literal::Text(text) => text.trim().parse().ok(),
            Literal::Bool(b) => Some(f64::from(u8::from(*b))),
            Literal::Null => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Literal::Text(text) | Literal::Number(text) => text.len(),
            _ => 8,
        }
    }
}

/// Splits `text` on `separator` where it appears outside quotes and brackets
pub fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    let mut iter = text.char_indices();

    while let Some((i, c)) = iter.next() {
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
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && text[i..].starts_with(separator) => {
                parts.push(&text[start..i]);
                start = i + separator.len();
                for _ in 1..separator.chars().count() {
                    iter.next();
                }
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte offset of `marker` outside any quoted literal
pub fn find_outside_quotes(text: &str, marker: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
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
        if c == '"' || c == '\'' {
            quote = Some(c);
        } else if text[i..].starts_with(marker) {
            return Some(i);
        }
    }
    None
}

/// Decodes backslash escapes inside a quoted literal
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('"' | '\'' | '\\')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Body of a complete `"..."` or `'...'` literal
fn quoted(term: &str) -> Option<&str> {
    let first = term.chars().next()?;
    if !matches!(first, '"' | '\'') || term.len() < 2 || !term.ends_with(first) {
        return None;
    }
    let body = &term[1..term.len() - 1];
    // the closing quote must not be escaped or appear early
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == first {
            return None;
        }
    }
    (!escaped).then_some(body)
}

fn is_identifier(term: &str) -> bool {
    let mut chars = term.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Normalizes a numeric literal to the digits the program would print
fn number(term: &str) -> Option<String> {
    let (sign, digits) = match term.strip_prefix('-') {
        Some(rest) => ("-", rest.trim_start()),
        None => ("", term),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let hex = hex.trim_end_matches(['L', 'l', 'u', 'U']).replace(['_', '\''], "");
        return i64::from_str_radix(&hex, 16).ok().map(|n| format!("{sign}{n}"));
    }
    let digits = digits.trim_end_matches(['L', 'l', 'f', 'F', 'd', 'D', 'u', 'U']);
    let digits = digits.replace(['_', '\''], "");
    let valid = digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits.parse::<f64>().is_ok();
    valid.then(|| format!("{sign}{digits}"))
}

/// Resolves one term to a value, or `None` when it cannot be known
pub fn resolve_value(term: &str, vars: &Vars, style: &Style) -> Option<Literal> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    if let Some(body) = quoted(term) {
        return Some(Literal::Text(unescape(body)));
    }
    if style.fstrings {
        if let Some(rest) = term.strip_prefix(['f', 'F']) {
            if let Some(body) = quoted(rest) {
                return interpolate(&unescape(body), vars, style).map(Literal::Text);
            }
        }
    }
    if let Some(n) = number(term) {
        return Some(Literal::Number(n));
    }
    match term {
        "true" | "True" => return Some(Literal::Bool(true)),
        "false" | "False" => return Some(Literal::Bool(false)),
        "null" | "None" | "nullptr" | "NULL" => return Some(Literal::Null),
        _ => {}
    }
    if let Some(inner) = term.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return resolve_value(inner, vars, style);
    }
    for wrapper in style.wrappers {
        if let Some(inner) = term
            .strip_prefix(wrapper)
            .and_then(|t| t.trim_start().strip_prefix('('))
            .and_then(|t| t.strip_suffix(')'))
        {
            let value = resolve_value(inner, vars, style)?;
            return Some(Literal::Text(value.render(style)));
        }
    }
    if is_identifier(term) {
        return vars.get(term).cloned();
    }
    None
}

/// Renders a whole print argument list
///
/// Parts split on the language separator are joined with its join text;
/// within a part, `+` concatenates.
pub fn render_args(args: &str, vars: &Vars, style: &Style) -> Option<String> {
    let args = args.trim();
    if args.is_empty() {
        return Some(String::new());
    }
    let (parts, mut joiner) = match style.separator {
        Some((separator, join)) => (split_top_level(args, separator), join.to_string()),
        None => (vec![args], String::new()),
    };

    let mut rendered = Vec::with_capacity(parts.len());
    for part in parts {
        let part = part.trim();
        if let Some((key, value)) = keyword_argument(part) {
            match key {
                "sep" => joiner = resolve_value(value, vars, style)?.render(style),
                "end" | "file" | "flush" => {}
                _ => return None,
            }
            continue;
        }
        if style.line_breaks.contains(&part) {
            rendered.push("\n".to_string());
            continue;
        }
        let mut value: Option<Literal> = None;
        for piece in split_top_level(part, "+") {
            let right = resolve_value(piece, vars, style)?;
            value = Some(match value {
                Some(left) => plus(left, right, style),
                None => right,
            });
        }
        rendered.push(value.map(|v| v.render(style)).unwrap_or_default());
    }
    Some(rendered.join(&joiner))
}

/// `+` evaluated left to right: numbers add, anything else concatenates
fn plus(left: Literal, right: Literal, style: &Style) -> Literal {
    if let (Literal::Number(a), Literal::Number(b)) = (&left, &right) {
        if let (Ok(a), Ok(b)) = (a.parse::<i64>(), b.parse::<i64>()) {
            if let Some(sum) = a.checked_add(b) {
                return Literal::Number(sum.to_string());
            }
        }
        if let (Ok(a), Ok(b)) = (a.parse::<f64>(), b.parse::<f64>()) {
            let sum = a + b;
            return Literal::Number(if style.float_point && sum.is_finite() && sum.fract() == 0.0 {
                format!("{sum:.1}")
            } else {
                sum.to_string()
            });
        }
    }
    Literal::Text(format!("{}{}", left.render(style), right.render(style)))
}

/// `name=value` keyword arguments, as in Python's `print(..., sep="")`
fn keyword_argument(part: &str) -> Option<(&str, &str)> {
    let (key, value) = part.split_once('=')?;
    let key = key.trim();
    (is_identifier(key) && !value.starts_with('=')).then_some((key, value))
}

/// Substitutes `{name}` regions of an interpolated string
fn interpolate(template: &str, vars: &Vars, style: &Style) -> Option<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut region = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    region.push(c);
                }
                let (name, spec) = region.split_once(':').unwrap_or((&region, ""));
                let value = resolve_value(name, vars, style)?;
                out.push_str(&apply_format_spec(&value, spec, style)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Applies the `.Nf` precision of a format spec; other specs are ignored
fn apply_format_spec(value: &Literal, spec: &str, style: &Style) -> Option<String> {
    let precision = match spec.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
        Some(digits) => Some(format_field(digits)?),
        None => None,
    };
    Some(match (precision, value.as_f64()) {
        (Some(precision), Some(n)) => format!("{n:.precision$}"),
        _ => value.render(style),
    })
}

/// Renders a printf-style call: the first term is the format string
pub fn render_format(args: &str, vars: &Vars, style: &Style) -> Option<String> {
    let terms = split_top_level(args, ",");
    let (format, rest) = terms.split_first()?;
    let Literal::Text(format) = resolve_value(format, vars, style)? else {
        return None;
    };
    let mut values = Vec::with_capacity(rest.len());
    for term in rest {
        values.push(resolve_value(term, vars, style)?);
    }
    let mut values = values.into_iter();

    let mut out = String::new();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut flags = String::new();
        while let Some(&f) = chars.peek() {
            if !matches!(f, '-' | '+' | ' ' | '0' | '#') {
                break;
            }
            flags.push(f);
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            precision = Some(format_field(&digits)?);
        }
        while matches!(chars.peek(), Some('l' | 'h' | 'z')) {
            chars.next();
        }
        let Some(conversion) = chars.next() else {
            out.push('%');
            break;
        };
        let text = match conversion {
            '%' => "%".to_string(),
            'n' => "\n".to_string(),
            'd' | 'i' | 'u' => format!("{}", values.next()?.as_f64()?.trunc() as i64),
            'f' | 'F' => format!("{:.*}", precision.unwrap_or(6), values.next()?.as_f64()?),
            'e' | 'E' => format!("{:.*e}", precision.unwrap_or(6), values.next()?.as_f64()?),
            'x' => format!("{:x}", values.next()?.as_f64()? as i64),
            'X' => format!("{:X}", values.next()?.as_f64()? as i64),
            'c' => match values.next()? {
                Literal::Number(code) => {
                    char::from_u32(code.parse::<u32>().ok()?).map(String::from)?
                }
                other => other.render(style).chars().take(1).collect(),
            },
            's' | 'g' | 'G' | 'b' => {
                let text = values.next()?.render(style);
                match precision {
                    Some(p) if conversion == 's' => text.chars().take(p).collect(),
                    _ => text,
                }
            }
            _ => return None,
        };
        let width = format_field(&width)?;
        let pad = width.saturating_sub(text.chars().count());
        if flags.contains('-') {
            out.push_str(&text);
            out.push_str(&" ".repeat(pad));
        } else if flags.contains('0') && conversion != 's' {
            let (sign, digits) = match text.strip_prefix('-') {
                Some(digits) => ("-", digits),
                None => ("", text.as_str()),
            };
            out.push_str(sign);
            out.push_str(&"0".repeat(pad));
            out.push_str(digits);
        } else {
            out.push_str(&" ".repeat(pad));
            out.push_str(&text);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLE: Style = Style {
        true_text: "True",
        false_text: "False",
        null_text: "None",
        separator: Some((",", " ")),
        line_breaks: &[],
        wrappers: &["str"],
        fstrings: true,
        float_point: true,
    };

    fn vars() -> Vars {
        let mut vars = Vars::new();
        vars.insert("name".to_string(), Literal::Text("Ann".to_string()));
        vars.insert("n".to_string(), Literal::Number("3".to_string()));
        vars
    }

    #[test]
    fn test_split_respects_quotes_and_brackets() {
        assert_eq!(
            split_top_level(r#""a, b", f(1, 2), 'c\'d'"#, ","),
            vec![r#""a, b""#, " f(1, 2)", r#" 'c\'d'"#]
        );
        assert_eq!(split_top_level("a << \"<<\" << b", "<<"), vec!["a ", " \"<<\" ", " b"]);
    }

    #[test]
    fn test_resolve_literals_and_variables() {
        let vars = vars();
        assert_eq!(
            resolve_value(r#""tab\there""#, &vars, &STYLE),
            Some(Literal::Text("tab\there".to_string()))
        );
        assert_eq!(
            resolve_value("1_000", &vars, &STYLE),
            Some(Literal::Number("1000".to_string()))
        );
        assert_eq!(resolve_value("-2.5", &vars, &STYLE), Some(Literal::Number("-2.5".to_string())));
        assert_eq!(resolve_value("True", &vars, &STYLE), Some(Literal::Bool(true)));
        assert_eq!(resolve_value("str(n)", &vars, &STYLE), Some(Literal::Text("3".to_string())));
        assert_eq!(resolve_value("unknown", &vars, &STYLE), None);
        assert_eq!(resolve_value("n * 2", &vars, &STYLE), None);
    }

    #[test]
    fn test_render_args_joins_and_concatenates() {
        let vars = vars();
        assert_eq!(
            render_args(r#""Hi", name + "!", n"#, &vars, &STYLE),
            Some("Hi Ann! 3".to_string())
        );
        assert_eq!(
            render_args(r#""a", "b", sep="-""#, &vars, &STYLE),
            Some("a-b".to_string())
        );
        assert_eq!(render_args(r#""a", missing"#, &vars, &STYLE), None);
        assert_eq!(render_args("n + 4, 1.5 + n", &vars, &STYLE), Some("7 4.5".to_string()));
    }

    #[test]
    fn test_fstring_interpolation() {
        let vars = vars();
        assert_eq!(
            render_args(r#"f"Hello {name}, {{n}} is {n:.2f}""#, &vars, &STYLE),
            Some("Hello Ann, {n} is 3.00".to_string())
        );
        assert_eq!(render_args(r#"f"{nope}""#, &vars, &STYLE), None);
    }

    #[test]
    fn test_printf_rendering() {
        let vars = vars();
        assert_eq!(
            render_format(r#""%s has %d items (%.2f%%)\n", name, n, 12.5"#, &vars, &STYLE),
            Some("Ann has 3 items (12.50%)\n".to_string())
        );
        assert_eq!(
            render_format(r#""[%5s|%-4d|%03d]", "ab", 7, 5"#, &vars, &STYLE),
            Some("[   ab|7   |005]".to_string())
        );
        assert_eq!(render_format(r#""%d", name"#, &vars, &STYLE), None);
    }

    #[test]
    fn test_oversized_format_fields_skip_the_print() {
        let vars = vars();
        assert_eq!(
            render_format(r#""%100d|", 1"#, &vars, &STYLE).map(|s| s.len()),
            Some(101)
        );
        assert_eq!(render_format(r#""%999999999999999d", 1"#, &vars, &STYLE), None);
        assert_eq!(render_format(r#""%.101f", 1.5"#, &vars, &STYLE), None);
        assert_eq!(
            render_format(r#""%99999999999999999999999s", "x""#, &vars, &STYLE),
            None
        );
        assert_eq!(render_args(r#"f"{n:.999999999999999f}""#, &vars, &STYLE), None);
        assert_eq!(
            render_args(r#"f"{n:.3f}""#, &vars, &STYLE),
            Some("3.000".to_string())
        );
    }
}
