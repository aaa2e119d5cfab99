//! Tokenizer for the JavaScript subset
//!
//! Produces a flat [`Token`] list. Every token remembers the line it started
//! on so the parser can apply automatic semicolon insertion and report
//! readable syntax errors.

use super::JsError;

/// Punctuators, longest first so greedy matching picks `===` before `==`
const PUNCTUATORS: &[&str] = &[
    ">>>", "===", "!==", "**=", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "?.",
    "++", "--", "+=", "-=", "*=", "/=", "%=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]",
    ";", ",", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    Text(String),
    Code(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Template(Vec<TemplateChunk>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, JsError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> JsError {
        JsError::Syntax {
            message: message.into(),
            line: self.line,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, JsError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek() else {
                tokens.push(Token { tok: Tok::Eof, line });
                return Ok(tokens);
            };

            let starts_number = c.is_ascii_digit()
                || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()));
            let tok = if starts_number {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.bump();
                Tok::Str(self.string(c)?)
            } else if c == '`' {
                self.bump();
                self.template()?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                let mut ident = String::new();
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Tok::Ident(ident)
            } else {
                self.punctuator()?
            };
            tokens.push(Token { tok, line });
        }
    }

    fn skip_trivia(&mut self) -> Result<(), JsError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error("Unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<Tok, JsError> {
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_digit(radix) {
                        digits.push(c);
                    } else if c != '_' {
                        break;
                    }
                    self.bump();
                }
                return u64::from_str_radix(&digits, radix)
                    .map(|n| Tok::Num(n as f64))
                    .map_err(|_| self.error("Invalid number literal"));
            }
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '_' => {}
                '.' if !seen_dot && !seen_exp => {
                    seen_dot = true;
                    text.push(c);
                }
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    text.push(c);
                    if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                        self.bump();
                        text.push(sign);
                    }
                }
                _ => break,
            }
            self.bump();
        }
        text.parse::<f64>()
            .map(Tok::Num)
            .map_err(|_| self.error(format!("Invalid number literal '{text}'")))
    }

    fn escape(&mut self) -> Result<Option<char>, JsError> {
        let Some(c) = self.bump() else {
            return Err(self.error("Unterminated string literal"));
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            // line continuation
            '\n' => return Ok(None),
            'x' => {
                let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                self.code_point(&hex)?
            }
            'u' => {
                let hex = if self.peek() == Some('{') {
                    self.bump();
                    let mut hex = String::new();
                    while let Some(c) = self.bump() {
                        if c == '}' {
                            break;
                        }
                        hex.push(c);
                    }
                    hex
                } else {
                    (0..4).filter_map(|_| self.bump()).collect()
                };
                self.code_point(&hex)?
            }
            other => other,
        };
        Ok(Some(decoded))
    }

    fn code_point(&self, hex: &str) -> Result<char, JsError> {
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("Invalid escape sequence"))
    }

    fn string(&mut self, quote: char) -> Result<String, JsError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => {
                    if let Some(c) = self.escape()? {
                        value.push(c);
                    }
                }
                Some(c) if c == quote => return Ok(value),
                Some('\n') | None => return Err(self.error("Unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<Tok, JsError> {
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some('\\') => {
                    if let Some(c) = self.escape()? {
                        text.push(c);
                    }
                }
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    chunks.push(TemplateChunk::Code(self.template_code()?));
                }
                Some(c) => text.push(c),
                None => return Err(self.error("Unterminated template literal")),
            }
        }
        if !text.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(Tok::Template(chunks))
    }

    /// Collects the raw source of a `${...}` substitution
    fn template_code(&mut self) -> Result<String, JsError> {
        let mut code = String::new();
        let mut depth = 0usize;
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("Unterminated template substitution"));
            };
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(code),
                '}' => depth -= 1,
                '"' | '\'' | '`' => {
                    code.push(c);
                    while let Some(inner) = self.bump() {
                        code.push(inner);
                        if inner == '\\' {
                            if let Some(escaped) = self.bump() {
                                code.push(escaped);
                            }
                        } else if inner == c {
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
            code.push(c);
        }
    }

    fn punctuator(&mut self) -> Result<Tok, JsError> {
        for punct in PUNCTUATORS {
            let len = punct.chars().count();
            let matches = punct
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if !matches {
                continue;
            }
            // `a?.5:1` is a conditional, not optional chaining
            if *punct == "?." && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            for _ in 0..len {
                self.bump();
            }
            return Ok(Tok::Punct(punct));
        }
        let c = self.peek().unwrap_or_default();
        Err(self.error(format!("Invalid or unexpected token '{c}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_greedy_punctuators() {
        assert_eq!(
            kinds("a === b"),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("==="),
                Tok::Ident("b".into()),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_numbers_and_strings() {
        assert_eq!(
            kinds(r#"0x1F 1_000 .5 2e3 'a\tb'"#),
            vec![
                Tok::Num(31.0),
                Tok::Num(1000.0),
                Tok::Num(0.5),
                Tok::Num(2000.0),
                Tok::Str("a\tb".into()),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_template_chunks() {
        let toks = kinds("`Hi ${name + '}'}!`");
        assert_eq!(
            toks[0],
            Tok::Template(vec![
                TemplateChunk::Text("Hi ".into()),
                TemplateChunk::Code("name + '}'".into()),
                TemplateChunk::Text("!".into()),
            ])
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("// one\nx /* two\n */ y").unwrap();
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        assert!(matches!(tokenize("'abc"), Err(JsError::Syntax { .. })));
    }
}
