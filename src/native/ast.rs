// Syntax tree for the JavaScript subset

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// Binding target of a declaration, parameter or `catch` clause
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Array(Vec<Option<Pattern>>),
    Object(Vec<(String, Pattern)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropDef {
    Init(Key, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePiece {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Body,
    pub is_arrow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub constructor: Option<Rc<FunctionDef>>,
    pub methods: Vec<(String, Rc<FunctionDef>)>,
    pub statics: Vec<(String, Rc<FunctionDef>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePiece>),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    /// Elements flagged `true` are spread
    Array(Vec<(bool, Expr)>),
    Object(Vec<PropDef>),
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Unary(UnaryOp, Box<Expr>),
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign {
        op: Option<BinOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Member {
        object: Box<Expr>,
        key: Key,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<(bool, Expr)>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<(bool, Expr)>,
    },
    Sequence(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Decl {
        kind: DeclKind,
        decls: Vec<(Pattern, Option<Expr>)>,
    },
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Return(Option<Expr>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    DoWhile(Box<Stmt>, Expr),
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: DeclKind,
        pattern: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        kind: DeclKind,
        pattern: Pattern,
        object: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch(Expr, Vec<SwitchCase>),
    Block(Vec<Stmt>),
    Empty,
}

impl Stmt {
    /// Whether a block containing this statement needs its own scope
    pub fn declares_lexically(&self) -> bool {
        matches!(
            self,
            Stmt::Decl { .. } | Stmt::Function(_) | Stmt::Class(_)
        )
    }
}
