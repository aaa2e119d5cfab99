//! Recursive-descent parser for the JavaScript subset
//!
//! Statements are parsed by dispatching on the leading keyword; expressions
//! use precedence climbing for binary operators. Semicolons are optional
//! wherever a line break or closing brace makes the statement end obvious.

use std::rc::Rc;

use super::JsError;
use super::ast::*;
use super::lexer::{TemplateChunk, Tok, Token, tokenize};
use super::value::format_number;

/// Deepest statement/expression nesting accepted before giving up
const MAX_NESTING: usize = 200;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "delete", "do", "else",
    "extends", "false", "finally", "for", "function", "if", "import", "export", "in",
    "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "yield",
];

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, JsError> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut program = Vec::new();
    while !parser.at_eof() {
        program.push(parser.statement()?);
    }
    Ok(program)
}

#[derive(Clone, Copy)]
enum Infix {
    Binary(BinOp),
    Logical(LogicalOp),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    /// Set while parsing a `for (...)` initializer, where `in` starts a for-in loop
    no_in: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            no_in: false,
        }
    }

    // ===== token helpers =====

    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .or_else(|| self.tokens.last())
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line)
    }

    fn prev_line(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.line)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Tok::Punct(p) if *p == punct)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), JsError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self) -> Result<String, JsError> {
        match self.peek() {
            Tok::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Any identifier, reserved words included, as used after `.`
    fn property_name(&mut self) -> Result<String, JsError> {
        match self.advance() {
            Tok::Ident(name) => Ok(name),
            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> JsError {
        JsError::Syntax {
            message: message.into(),
            line: self.line(),
        }
    }

    fn unexpected(&self) -> JsError {
        match self.peek() {
            Tok::Eof => self.error("Unexpected end of input"),
            Tok::Num(n) => self.error(format!("Unexpected number '{}'", format_number(*n))),
            Tok::Str(_) | Tok::Template(_) => self.error("Unexpected string"),
            Tok::Ident(name) => self.error(format!("Unexpected token '{name}'")),
            Tok::Punct(p) => self.error(format!("Unexpected token '{p}'")),
        }
    }

    fn consume_semicolon(&mut self) -> Result<(), JsError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() {
            return Ok(());
        }
        if self.line() > self.prev_line() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("Maximum nesting depth exceeded"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    // ===== statements =====

    fn statement(&mut self) -> Result<Stmt, JsError> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> Result<Stmt, JsError> {
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }

        let Tok::Ident(word) = self.peek().clone() else {
            return self.expression_statement();
        };

        match word.as_str() {
            "let" | "const" | "var" => {
                let decl = self.declaration()?;
                self.consume_semicolon()?;
                Ok(decl)
            }
            "async" if matches!(self.peek_at(1), Tok::Ident(w) if w == "function") => {
                self.advance();
                self.statement_inner()
            }
            "function" => {
                self.advance();
                let def = self.function_rest()?;
                if def.name.is_none() {
                    return Err(self.error("Function statements require a function name"));
                }
                Ok(Stmt::Function(Rc::new(def)))
            }
            "class" => Ok(Stmt::Class(Rc::new(self.class()?))),
            "if" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                let consequent = Box::new(self.statement()?);
                let alternate = if self.eat_keyword("else") {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If(test, consequent, alternate))
            }
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                Ok(Stmt::While(test, Box::new(self.statement()?)))
            }
            "do" => {
                self.advance();
                let body = Box::new(self.statement()?);
                if !self.eat_keyword("while") {
                    return Err(self.unexpected());
                }
                self.expect_punct("(")?;
                let test = self.expression()?;
                self.expect_punct(")")?;
                self.eat_punct(";");
                Ok(Stmt::DoWhile(body, test))
            }
            "for" => self.for_statement(),
            "return" => {
                self.advance();
                let value = if self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.line() > self.prev_line()
                {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value))
            }
            "break" | "continue" => {
                self.advance();
                self.consume_semicolon()?;
                Ok(if word == "break" {
                    Stmt::Break
                } else {
                    Stmt::Continue
                })
            }
            "throw" => {
                self.advance();
                let value = self.expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value))
            }
            "try" => self.try_statement(),
            "switch" => self.switch_statement(),
            "import" | "export" => Err(self.error("Modules are not supported")),
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> Result<Stmt, JsError> {
        let expr = self.expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, JsError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn decl_kind(&mut self) -> Option<DeclKind> {
        let kind = match self.peek() {
            Tok::Ident(w) if w == "let" => DeclKind::Let,
            Tok::Ident(w) if w == "const" => DeclKind::Const,
            Tok::Ident(w) if w == "var" => DeclKind::Var,
            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    fn declaration(&mut self) -> Result<Stmt, JsError> {
        let kind = self.decl_kind().ok_or_else(|| self.unexpected())?;
        let first = self.binding_pattern()?;
        self.declarators(kind, first)
    }

    /// Parses the remaining declarators once the first binding is known
    fn declarators(&mut self, kind: DeclKind, first: Pattern) -> Result<Stmt, JsError> {
        let mut decls = Vec::new();
        let mut pattern = first;
        loop {
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            if init.is_none() && kind == DeclKind::Const {
                return Err(self.error("Missing initializer in const declaration"));
            }
            decls.push((pattern, init));
            if !self.eat_punct(",") {
                break;
            }
            pattern = self.binding_pattern()?;
        }
        Ok(Stmt::Decl { kind, decls })
    }

    fn binding_pattern(&mut self) -> Result<Pattern, JsError> {
        if self.eat_punct("[") {
            let mut elements = Vec::new();
            while !self.eat_punct("]") {
                if self.eat_punct(",") {
                    elements.push(None);
                    continue;
                }
                elements.push(Some(self.binding_pattern()?));
                if !self.is_punct("]") {
                    self.expect_punct(",")?;
                }
            }
            return Ok(Pattern::Array(elements));
        }
        if self.eat_punct("{") {
            let mut props = Vec::new();
            while !self.eat_punct("}") {
                let key = self.property_name()?;
                let target = if self.eat_punct(":") {
                    self.binding_pattern()?
                } else {
                    Pattern::Ident(key.clone())
                };
                props.push((key, target));
                if !self.is_punct("}") {
                    self.expect_punct(",")?;
                }
            }
            return Ok(Pattern::Object(props));
        }
        Ok(Pattern::Ident(self.expect_ident()?))
    }

    fn for_statement(&mut self) -> Result<Stmt, JsError> {
        self.advance();
        self.expect_punct("(")?;

        let init = if self.is_punct(";") {
            None
        } else if let Some(kind) = self.decl_kind() {
            let pattern = self.binding_pattern()?;
            if let Some(stmt) = self.for_each_tail(kind, pattern.clone())? {
                return Ok(stmt);
            }
            self.no_in = true;
            let decl = self.declarators(kind, pattern);
            self.no_in = false;
            Some(Box::new(decl?))
        } else {
            self.no_in = true;
            let expr = self.expression();
            self.no_in = false;
            let expr = expr?;
            if let Expr::Ident(name) = &expr {
                if let Some(stmt) =
                    self.for_each_tail(DeclKind::Let, Pattern::Ident(name.clone()))?
                {
                    return Ok(stmt);
                }
            }
            Some(Box::new(Stmt::Expr(expr)))
        };

        self.expect_punct(";")?;
        let test = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;
        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Finishes `for (x of ...)` / `for (x in ...)` when the header is one
    fn for_each_tail(&mut self, kind: DeclKind, pattern: Pattern) -> Result<Option<Stmt>, JsError> {
        let of = if self.eat_keyword("of") {
            true
        } else if self.eat_keyword("in") {
            false
        } else {
            return Ok(None);
        };
        let subject = self.expression()?;
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Some(if of {
            Stmt::ForOf {
                kind,
                pattern,
                iterable: subject,
                body,
            }
        } else {
            Stmt::ForIn {
                kind,
                pattern,
                object: subject,
                body,
            }
        }))
    }

    fn try_statement(&mut self) -> Result<Stmt, JsError> {
        self.advance();
        let block = self.block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.binding_pattern()?);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }
        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn switch_statement(&mut self) -> Result<Stmt, JsError> {
        self.advance();
        self.expect_punct("(")?;
        let discriminant = self.expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.eat_punct("}") {
            let test = if self.eat_keyword("case") {
                Some(self.expression()?)
            } else if self.eat_keyword("default") {
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect_punct(":")?;
            let mut body = Vec::new();
            while !self.is_keyword("case") && !self.is_keyword("default") && !self.is_punct("}") {
                if self.at_eof() {
                    return Err(self.unexpected());
                }
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(Stmt::Switch(discriminant, cases))
    }

    // ===== functions and classes =====

    /// Parses what follows the `function` keyword
    fn function_rest(&mut self) -> Result<FunctionDef, JsError> {
        let name = match self.peek() {
            Tok::Ident(_) => Some(self.expect_ident()?),
            _ => None,
        };
        let params = self.params()?;
        let body = Body::Block(self.block()?);
        Ok(FunctionDef {
            name,
            params,
            body,
            is_arrow: false,
        })
    }

    fn params(&mut self) -> Result<Vec<Param>, JsError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            let rest = self.eat_punct("...");
            let pattern = self.binding_pattern()?;
            let default = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            params.push(Param {
                pattern,
                default,
                rest,
            });
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        Ok(params)
    }

    fn class(&mut self) -> Result<ClassDef, JsError> {
        self.advance();
        let name = self.expect_ident()?;
        if self.is_keyword("extends") {
            return Err(self.error("Class inheritance is not supported"));
        }
        self.expect_punct("{")?;

        let mut class = ClassDef {
            name,
            constructor: None,
            methods: Vec::new(),
            statics: Vec::new(),
        };
        while !self.eat_punct("}") {
            if self.eat_punct(";") {
                continue;
            }
            let is_static =
                self.is_keyword("static") && !matches!(self.peek_at(1), Tok::Punct("("));
            if is_static {
                self.advance();
            }
            let method_name = match self.advance() {
                Tok::Ident(name) | Tok::Str(name) => name,
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected());
                }
            };
            let params = self.params()?;
            let body = Body::Block(self.block()?);
            let def = Rc::new(FunctionDef {
                name: Some(method_name.clone()),
                params,
                body,
                is_arrow: false,
            });
            if is_static {
                class.statics.push((method_name, def));
            } else if method_name == "constructor" {
                class.constructor = Some(def);
            } else {
                class.methods.push((method_name, def));
            }
        }
        Ok(class)
    }

    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Tok::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                matches!(self.peek_at(1), Tok::Punct("=>"))
            }
            Tok::Punct("(") => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match self.peek_at(offset) {
                        Tok::Punct("(" | "[" | "{") => depth += 1,
                        Tok::Punct(")" | "]" | "}") => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                return matches!(self.peek_at(offset + 1), Tok::Punct("=>"));
                            }
                        }
                        Tok::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr, JsError> {
        let params = if self.is_punct("(") {
            self.params()?
        } else {
            vec![Param {
                pattern: Pattern::Ident(self.expect_ident()?),
                default: None,
                rest: false,
            }]
        };
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            Body::Block(self.block()?)
        } else {
            Body::Expr(self.assignment()?)
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
        })))
    }

    // ===== expressions =====

    fn expression(&mut self) -> Result<Expr, JsError> {
        let first = self.assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat_punct(",") {
            exprs.push(self.assignment()?);
        }
        Ok(Expr::Sequence(exprs))
    }

    fn assignment(&mut self) -> Result<Expr, JsError> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> Result<Expr, JsError> {
        if self.is_keyword("async") && !matches!(self.peek_at(1), Tok::Punct("=>")) {
            let next_is_arrow = {
                self.pos += 1;
                let ahead = self.arrow_ahead();
                self.pos -= 1;
                ahead
            };
            if next_is_arrow {
                self.advance();
            }
        }
        if self.arrow_ahead() {
            return self.arrow();
        }

        let target = self.conditional()?;
        let op = match self.peek() {
            Tok::Punct("=") => None,
            Tok::Punct("+=") => Some(BinOp::Add),
            Tok::Punct("-=") => Some(BinOp::Sub),
            Tok::Punct("*=") => Some(BinOp::Mul),
            Tok::Punct("/=") => Some(BinOp::Div),
            Tok::Punct("%=") => Some(BinOp::Mod),
            Tok::Punct("**=") => Some(BinOp::Pow),
            _ => return Ok(target),
        };
        let valid_target = match &target {
            Expr::Ident(_) | Expr::Member { .. } => true,
            Expr::Array(_) | Expr::Object(_) => op.is_none(),
            _ => false,
        };
        if !valid_target {
            return Err(self.error("Invalid left-hand side in assignment"));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, JsError> {
        let test = self.binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let no_in = std::mem::replace(&mut self.no_in, false);
        let consequent = self.assignment();
        self.no_in = no_in;
        let consequent = consequent?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
        ))
    }

    fn infix(&self) -> Option<(Infix, u8)> {
        use BinOp::*;
        let found = match self.peek() {
            Tok::Punct("??") => (Infix::Logical(LogicalOp::Nullish), 1),
            Tok::Punct("||") => (Infix::Logical(LogicalOp::Or), 2),
            Tok::Punct("&&") => (Infix::Logical(LogicalOp::And), 3),
            Tok::Punct("|") => (Infix::Binary(BitOr), 4),
            Tok::Punct("^") => (Infix::Binary(BitXor), 5),
            Tok::Punct("&") => (Infix::Binary(BitAnd), 6),
            Tok::Punct("==") => (Infix::Binary(Eq), 7),
            Tok::Punct("!=") => (Infix::Binary(Ne), 7),
            Tok::Punct("===") => (Infix::Binary(StrictEq), 7),
            Tok::Punct("!==") => (Infix::Binary(StrictNe), 7),
            Tok::Punct("<") => (Infix::Binary(Lt), 8),
            Tok::Punct("<=") => (Infix::Binary(Le), 8),
            Tok::Punct(">") => (Infix::Binary(Gt), 8),
            Tok::Punct(">=") => (Infix::Binary(Ge), 8),
            Tok::Ident(w) if w == "instanceof" => (Infix::Binary(InstanceOf), 8),
            Tok::Ident(w) if w == "in" && !self.no_in => (Infix::Binary(In), 8),
            Tok::Punct("<<") => (Infix::Binary(Shl), 9),
            Tok::Punct(">>") => (Infix::Binary(Shr), 9),
            Tok::Punct(">>>") => (Infix::Binary(UShr), 9),
            Tok::Punct("+") => (Infix::Binary(Add), 10),
            Tok::Punct("-") => (Infix::Binary(Sub), 10),
            Tok::Punct("*") => (Infix::Binary(Mul), 11),
            Tok::Punct("/") => (Infix::Binary(Div), 11),
            Tok::Punct("%") => (Infix::Binary(Mod), 11),
            Tok::Punct("**") => (Infix::Binary(Pow), 12),
            _ => return None,
        };
        Some(found)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, JsError> {
        let mut left = self.unary()?;
        while let Some((op, prec)) = self.infix() {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right_assoc = matches!(op, Infix::Binary(BinOp::Pow));
            let right = self.nested(|p| p.binary(if right_assoc { prec } else { prec + 1 }))?;
            left = match op {
                Infix::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right)),
                Infix::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, JsError> {
        let op = match self.peek() {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Punct("~") => Some(UnaryOp::BitNot),
            Tok::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            Tok::Ident(w) if w == "void" => Some(UnaryOp::Void),
            Tok::Ident(w) if w == "delete" => Some(UnaryOp::Delete),
            Tok::Punct(p @ ("++" | "--")) => {
                let increment = *p == "++";
                self.advance();
                let target = self.nested(Self::unary)?;
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            Tok::Ident(w) if w == "await" => {
                self.advance();
                return self.nested(Self::unary);
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let operand = self.nested(Self::unary)?;
                Ok(Expr::Unary(op, Box::new(operand)))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, JsError> {
        let expr = self.call_member()?;
        let increment = match self.peek() {
            Tok::Punct("++") => true,
            Tok::Punct("--") => false,
            _ => return Ok(expr),
        };
        if self.line() > self.prev_line() {
            return Ok(expr);
        }
        self.advance();
        Ok(Expr::Update {
            increment,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn call_member(&mut self) -> Result<Expr, JsError> {
        let mut expr = if self.is_keyword("new") {
            self.new_expression()?
        } else {
            self.primary()?
        };
        loop {
            if self.eat_punct(".") {
                let name = self.property_name()?;
                expr = member(expr, Key::Named(name), false);
            } else if self.eat_punct("?.") {
                if self.is_punct("(") {
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        optional: true,
                    };
                } else if self.eat_punct("[") {
                    let key = self.expression()?;
                    self.expect_punct("]")?;
                    expr = member(expr, Key::Computed(Box::new(key)), true);
                } else {
                    let name = self.property_name()?;
                    expr = member(expr, Key::Named(name), true);
                }
            } else if self.eat_punct("[") {
                let key = self.expression()?;
                self.expect_punct("]")?;
                expr = member(expr, Key::Computed(Box::new(key)), false);
            } else if self.is_punct("(") {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: false,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn new_expression(&mut self) -> Result<Expr, JsError> {
        self.advance();
        let mut callee = self.nested(Self::primary)?;
        loop {
            if self.eat_punct(".") {
                let name = self.property_name()?;
                callee = member(callee, Key::Named(name), false);
            } else if self.eat_punct("[") {
                let key = self.expression()?;
                self.expect_punct("]")?;
                callee = member(callee, Key::Computed(Box::new(key)), false);
            } else {
                break;
            }
        }
        let args = if self.is_punct("(") {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn arguments(&mut self) -> Result<Vec<(bool, Expr)>, JsError> {
        self.expect_punct("(")?;
        let no_in = std::mem::replace(&mut self.no_in, false);
        let mut args = Vec::new();
        let result = loop {
            if self.eat_punct(")") {
                break Ok(());
            }
            let spread = self.eat_punct("...");
            match self.assignment() {
                Ok(arg) => args.push((spread, arg)),
                Err(e) => break Err(e),
            }
            if !self.is_punct(")") {
                if let Err(e) = self.expect_punct(",") {
                    break Err(e);
                }
            }
        };
        self.no_in = no_in;
        result.map(|_| args)
    }

    fn primary(&mut self) -> Result<Expr, JsError> {
        match self.peek().clone() {
            Tok::Num(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Tok::Template(chunks) => {
                self.advance();
                self.template(chunks)
            }
            Tok::Punct("(") => {
                self.advance();
                let no_in = std::mem::replace(&mut self.no_in, false);
                let expr = self.expression();
                self.no_in = no_in;
                let expr = expr?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => self.array_literal(),
            Tok::Punct("{") => self.object_literal(),
            Tok::Ident(word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Undefined)
                }
                "this" => {
                    self.advance();
                    Ok(Expr::This)
                }
                "async" if matches!(self.peek_at(1), Tok::Ident(w) if w == "function") => {
                    self.advance();
                    self.primary()
                }
                "function" => {
                    self.advance();
                    Ok(Expr::Function(Rc::new(self.function_rest()?)))
                }
                "class" => Ok(Expr::Class(Rc::new(self.class()?))),
                "super" => Err(self.error("'super' is not supported")),
                _ => Ok(Expr::Ident(self.expect_ident()?)),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn template(&mut self, chunks: Vec<TemplateChunk>) -> Result<Expr, JsError> {
        let mut pieces = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match chunk {
                TemplateChunk::Text(text) => pieces.push(TemplatePiece::Text(text)),
                TemplateChunk::Code(code) => {
                    let mut inner = Parser::new(tokenize(&code)?);
                    inner.depth = self.depth;
                    let expr = inner.expression()?;
                    if !inner.at_eof() {
                        return Err(inner.unexpected());
                    }
                    pieces.push(TemplatePiece::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(pieces))
    }

    fn array_literal(&mut self) -> Result<Expr, JsError> {
        self.advance();
        let mut elements = Vec::new();
        while !self.eat_punct("]") {
            if self.eat_punct(",") {
                elements.push((false, Expr::Undefined));
                continue;
            }
            let spread = self.eat_punct("...");
            elements.push((spread, self.assignment()?));
            if !self.is_punct("]") {
                self.expect_punct(",")?;
            }
        }
        Ok(Expr::Array(elements))
    }

    fn object_literal(&mut self) -> Result<Expr, JsError> {
        self.advance();
        let mut props = Vec::new();
        while !self.eat_punct("}") {
            if self.eat_punct("...") {
                props.push(PropDef::Spread(self.assignment()?));
            } else {
                if self.is_keyword("async") && !matches!(self.peek_at(1), Tok::Punct(_)) {
                    self.advance();
                }
                let key = match self.advance() {
                    Tok::Ident(name) | Tok::Str(name) => Key::Named(name),
                    Tok::Num(n) => Key::Named(format_number(n)),
                    Tok::Punct("[") => {
                        let key = self.assignment()?;
                        self.expect_punct("]")?;
                        Key::Computed(Box::new(key))
                    }
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected());
                    }
                };

                if self.is_punct("(") {
                    let name = match &key {
                        Key::Named(name) => Some(name.clone()),
                        Key::Computed(_) => None,
                    };
                    let params = self.params()?;
                    let body = Body::Block(self.block()?);
                    let def = FunctionDef {
                        name,
                        params,
                        body,
                        is_arrow: false,
                    };
                    props.push(PropDef::Init(key, Expr::Function(Rc::new(def))));
                } else if self.eat_punct(":") {
                    props.push(PropDef::Init(key, self.assignment()?));
                } else {
                    let Key::Named(name) = key else {
                        return Err(self.unexpected());
                    };
                    props.push(PropDef::Init(Key::Named(name.clone()), Expr::Ident(name)));
                }
            }
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(Expr::Object(props))
    }
}

fn member(object: Expr, key: Key, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        key,
        optional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        match parse_program(source).unwrap().remove(0) {
            Stmt::Expr(expr) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let parsed = expr("1 + 2 * 3");
        assert_eq!(
            parsed,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0)),
                )),
            )
        );
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let Expr::Binary(BinOp::Pow, left, _) = expr("2 ** 3 ** 2") else {
            panic!("expected power");
        };
        assert_eq!(*left, Expr::Number(2.0));
    }

    #[test]
    fn test_arrow_functions() {
        let Expr::Function(def) = expr("(a, b = 2) => a + b") else {
            panic!("expected arrow");
        };
        assert!(def.is_arrow);
        assert_eq!(def.params.len(), 2);
        assert!(matches!(def.body, Body::Expr(_)));

        let Expr::Function(def) = expr("x => { return x }") else {
            panic!("expected arrow");
        };
        assert!(matches!(def.body, Body::Block(_)));
    }

    #[test]
    fn test_optional_semicolons() {
        let program = parse_program("let a = 1\nlet b = 2\nconsole.log(a + b)").unwrap();
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_return_on_own_line_returns_nothing() {
        let program = parse_program("function f() {\n return\n 1\n}").unwrap();
        let Stmt::Function(def) = &program[0] else {
            panic!("expected function");
        };
        let Body::Block(body) = &def.body else {
            panic!("expected block body");
        };
        assert_eq!(body[0], Stmt::Return(None));
    }

    #[test]
    fn test_for_of_and_classic_for() {
        let program = parse_program(
            "for (const x of [1, 2]) {}\nfor (let i = 0; i < 3; i++) {}\nfor (const k in o) {}",
        )
        .unwrap();
        assert!(matches!(program[0], Stmt::ForOf { .. }));
        assert!(matches!(program[1], Stmt::For { .. }));
        assert!(matches!(program[2], Stmt::ForIn { .. }));
    }

    #[test]
    fn test_class_members() {
        let program = parse_program(
            "class P { constructor(x) { this.x = x } get() { return this.x } static make() { return new P(1) } }",
        )
        .unwrap();
        let Stmt::Class(class) = &program[0] else {
            panic!("expected class");
        };
        assert!(class.constructor.is_some());
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.statics.len(), 1);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse_program("let = 5"), Err(JsError::Syntax { .. })));
        assert!(matches!(parse_program("a b"), Err(JsError::Syntax { .. })));
        assert!(matches!(parse_program("const x;"), Err(JsError::Syntax { .. })));
        assert!(matches!(parse_program("1 = 2"), Err(JsError::Syntax { .. })));
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse_program(&source), Err(JsError::Syntax { .. })));
    }
}
