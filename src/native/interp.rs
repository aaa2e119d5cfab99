//! Tree-walking evaluation of statements and expressions
//!
//! Builtin functions and methods live in `builtins.rs` as a second
//! `impl Interpreter` block. Every loop iteration and every call is a
//! checkpoint against the time budget, so a runaway loop ends with a timeout
//! fault instead of hanging the worker.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::{Rc, Weak};

use super::JsError;
use super::ast::*;
use super::builtins::GLOBALS;
use super::console::{Channel, Console};
use super::value::{Env, Function, Items, Object, Scope, Value, format_number};
use crate::budget::Budget;
use crate::stdin::StdinQueue;

/// Deepest JavaScript call stack accepted before a `RangeError`
const MAX_CALL_DEPTH: usize = 500;

/// Longest string the interpreter will build
pub(super) const MAX_STRING_LEN: usize = 1 << 24;

/// Largest array the interpreter will grow
pub(super) const MAX_ARRAY_LEN: usize = 1 << 22;

pub(super) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Weak handles to everything allocated during a run
///
/// Closures capture their scope and scopes hold closures, so `Rc` cycles are
/// the norm. On drop every tracked container is emptied, which breaks those
/// cycles and lets the whole heap go when the run ends.
#[derive(Default)]
struct Heap {
    scopes: Vec<Weak<Scope>>,
    arrays: Vec<Weak<RefCell<Items>>>,
    objects: Vec<Weak<RefCell<Object>>>,
    bytes: u64,
    next_prune: usize,
}

impl Heap {
    fn charge(&mut self, bytes: usize) {
        self.bytes = self.bytes.saturating_add(bytes as u64);
    }

    fn maybe_prune(&mut self) {
        let tracked = self.scopes.len() + self.arrays.len() + self.objects.len();
        if tracked < self.next_prune {
            return;
        }
        self.scopes.retain(|w| w.strong_count() > 0);
        self.arrays.retain(|w| w.strong_count() > 0);
        self.objects.retain(|w| w.strong_count() > 0);
        let live = self.scopes.len() + self.arrays.len() + self.objects.len();
        self.next_prune = (live * 2).max(4096);
    }

    fn release(&mut self) {
        for scope in self.scopes.drain(..).filter_map(|w| w.upgrade()) {
            scope.clear();
        }
        for array in self.arrays.drain(..).filter_map(|w| w.upgrade()) {
            let items = std::mem::take(&mut *array.borrow_mut());
            drop(items);
        }
        for object in self.objects.drain(..).filter_map(|w| w.upgrade()) {
            let object = std::mem::take(&mut *object.borrow_mut());
            drop(object);
        }
    }
}

struct Timer {
    id: u32,
    due: f64,
    seq: u64,
    callback: Value,
    args: Vec<Value>,
    interval: Option<f64>,
}

/// Timers run after the main script on a virtual clock; nothing sleeps
#[derive(Default)]
pub(super) struct Timers {
    pending: Vec<Timer>,
    now: f64,
    next_id: u32,
    seq: u64,
}

pub struct Interpreter {
    globals: Env,
    pub(super) console: Console,
    pub(super) stdin: StdinQueue,
    pub(super) timers: Timers,
    pub(super) rng_state: u64,
    budget: Budget,
    call_depth: usize,
    heap: Heap,
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.timers.pending.clear();
        self.heap.release();
        self.globals.clear();
    }
}

impl Interpreter {
    pub fn new(stdin: &str, budget: Budget) -> Self {
        let globals = Scope::new(None);
        for &name in GLOBALS {
            globals.declare(name, Value::Function(Rc::new(Function::Native(name))), false);
        }
        globals.declare("NaN", Value::Number(f64::NAN), false);
        globals.declare("Infinity", Value::Number(f64::INFINITY), false);

        Self {
            globals,
            console: Console::default(),
            stdin: StdinQueue::new(stdin),
            timers: Timers::default(),
            rng_state: 0x2545_f491_4f6c_dd1d,
            budget,
            call_depth: 0,
            heap: Heap::default(),
        }
    }

    /// Runs a parsed program, then drains any scheduled timers
    pub fn run(&mut self, program: &[Stmt]) -> Result<(), JsError> {
        let globals = self.globals.clone();
        self.exec_stmts(program, &globals)?;
        self.run_timers()
    }

    pub fn take_output(&mut self) -> String {
        log::debug!(
            "Captured {} log, {} info, {} warn, {} error lines",
            self.console.count(Channel::Log),
            self.console.count(Channel::Info),
            self.console.count(Channel::Warn),
            self.console.count(Channel::Error),
        );
        self.console.take()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.heap.bytes
    }

    // ===== allocation =====

    pub(super) fn child_scope(&mut self, parent: &Env) -> Env {
        let scope = Scope::new(Some(parent.clone()));
        self.track_scope(&scope);
        scope
    }

    fn track_scope(&mut self, scope: &Env) {
        self.heap.charge(64);
        self.heap.scopes.push(Rc::downgrade(scope));
        self.heap.maybe_prune();
    }

    pub(super) fn alloc_array(&mut self, items: Vec<Value>) -> Value {
        self.heap.charge(32 + items.len() * 16);
        let array = Rc::new(RefCell::new(Items(items)));
        self.heap.arrays.push(Rc::downgrade(&array));
        self.heap.maybe_prune();
        Value::Array(array)
    }

    pub(super) fn alloc_object(&mut self, object: Object) -> Value {
        self.heap.charge(64 + object.entries.len() * 48);
        let object = Rc::new(RefCell::new(object));
        self.heap.objects.push(Rc::downgrade(&object));
        self.heap.maybe_prune();
        Value::Object(object)
    }

    pub(super) fn alloc_string(&mut self, text: String) -> Result<Value, JsError> {
        if text.len() > MAX_STRING_LEN {
            return Err(JsError::Range("Invalid string length".to_string()));
        }
        self.heap.charge(text.len());
        Ok(Value::from(text))
    }

    /// Registers an array or object built elsewhere so the run frees it
    pub(super) fn track(&mut self, value: &Value) {
        match value {
            Value::Array(array) => {
                self.heap.charge(32 + array.borrow().len() * 16);
                self.heap.arrays.push(Rc::downgrade(array));
            }
            Value::Object(object) => {
                self.heap.charge(64 + object.borrow().entries.len() * 48);
                self.heap.objects.push(Rc::downgrade(object));
            }
            _ => return,
        }
        self.heap.maybe_prune();
    }

    pub(super) fn error_value(&mut self, name: &str, message: &str) -> Value {
        self.alloc_object(Object::error(name, message))
    }

    fn make_closure(&mut self, def: &Rc<FunctionDef>, env: &Env) -> Value {
        self.heap.charge(48);
        Value::Function(Rc::new(Function::Closure {
            def: def.clone(),
            env: env.clone(),
        }))
    }

    pub(super) fn checkpoint(&self) -> Result<(), JsError> {
        if self.budget.exceeded() {
            Err(JsError::Timeout(self.budget.timeout_message()))
        } else {
            Ok(())
        }
    }

    /// Converts a fault into the value a `catch` clause receives
    ///
    /// Timeouts are not catchable and come back as `Err`.
    fn catchable(&mut self, error: JsError) -> Result<Value, JsError> {
        match error {
            JsError::Thrown(value) => Ok(value),
            JsError::Reference(message) => Ok(self.error_value("ReferenceError", &message)),
            JsError::Type(message) => Ok(self.error_value("TypeError", &message)),
            JsError::Range(message) => Ok(self.error_value("RangeError", &message)),
            JsError::Syntax { message, .. } => Ok(self.error_value("SyntaxError", &message)),
            timeout @ JsError::Timeout(_) => Err(timeout),
        }
    }

    // ===== statements =====

    pub(super) fn exec_stmts(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow, JsError> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let closure = self.make_closure(def, env);
                    env.declare(name, closure, true);
                }
            }
        }
        for stmt in stmts {
            let flow = self.exec_stmt(stmt, env)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow, JsError> {
        if stmts.iter().any(Stmt::declares_lexically) {
            let scope = self.child_scope(env);
            self.exec_stmts(stmts, &scope)
        } else {
            self.exec_stmts(stmts, env)
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, JsError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl { kind, decls } => {
                for (pattern, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr, env)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(pattern, value, env, *kind != DeclKind::Const)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Class(def) => {
                let class = self.make_class(def, env);
                env.declare(&def.name, class, true);
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If(test, consequent, alternate) => {
                if self.eval(test, env)?.truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(test, body) => {
                loop {
                    self.checkpoint()?;
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                    match self.exec_stmt(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile(body, test) => {
                loop {
                    self.checkpoint()?;
                    match self.exec_stmt(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, env),
            Stmt::ForOf {
                kind,
                pattern,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, env)?;
                let items = self.iterate(&iterable)?;
                self.exec_for_each(*kind, pattern, items, body, env)
            }
            Stmt::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                let object = self.eval(object, env)?;
                let keys = own_keys(&object).into_iter().map(Value::from).collect();
                self.exec_for_each(*kind, pattern, keys, body, env)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, env)?;
                Err(JsError::Thrown(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(
                block,
                param.as_ref(),
                handler.as_deref(),
                finalizer.as_deref(),
                env,
            ),
            Stmt::Switch(discriminant, cases) => self.exec_switch(discriminant, cases, env),
            Stmt::Block(stmts) => self.exec_block(stmts, env),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        env: &Env,
    ) -> Result<Flow, JsError> {
        let mut scope = self.child_scope(env);
        if let Some(init) = init {
            self.exec_stmt(init, &scope)?;
        }
        // `let` bindings get a fresh copy per iteration so closures see their own value
        let per_iteration = matches!(
            init,
            Some(Stmt::Decl {
                kind: DeclKind::Let,
                ..
            })
        );

        loop {
            self.checkpoint()?;
            if let Some(test) = test {
                if !self.eval(test, &scope)?.truthy() {
                    break;
                }
            }
            match self.exec_stmt(body, &scope)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if per_iteration {
                scope = scope.snapshot(env);
                self.track_scope(&scope);
            }
            if let Some(update) = update {
                self.eval(update, &scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for_each(
        &mut self,
        kind: DeclKind,
        pattern: &Pattern,
        items: Vec<Value>,
        body: &Stmt,
        env: &Env,
    ) -> Result<Flow, JsError> {
        for item in items {
            self.checkpoint()?;
            let scope = self.child_scope(env);
            self.bind_pattern(pattern, item, &scope, kind != DeclKind::Const)?;
            match self.exec_stmt(body, &scope)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&Pattern>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        env: &Env,
    ) -> Result<Flow, JsError> {
        let result = match (self.exec_block(block, env), handler) {
            (Err(error), Some(handler)) => {
                let value = self.catchable(error)?;
                let scope = self.child_scope(env);
                match param {
                    Some(param) => self
                        .bind_pattern(param, value, &scope, true)
                        .and_then(|()| self.exec_stmts(handler, &scope)),
                    None => self.exec_stmts(handler, &scope),
                }
            }
            (result, _) => result,
        };

        if let Some(finalizer) = finalizer {
            if matches!(result, Err(JsError::Timeout(_))) {
                return result;
            }
            let flow = self.exec_block(finalizer, env)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        result
    }

    fn exec_switch(
        &mut self,
        discriminant: &Expr,
        cases: &[SwitchCase],
        env: &Env,
    ) -> Result<Flow, JsError> {
        let value = self.eval(discriminant, env)?;
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, env)?.strict_equals(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|c| c.test.is_none())) else {
            return Ok(Flow::Normal);
        };

        let scope = self.child_scope(env);
        for case in &cases[start..] {
            match self.exec_stmts(&case.body, &scope)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    // ===== bindings =====

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        env: &Env,
        mutable: bool,
    ) -> Result<(), JsError> {
        match pattern {
            Pattern::Ident(name) => {
                env.declare(name, value, mutable);
                Ok(())
            }
            Pattern::Array(elements) => {
                let items = self.iterate(&value)?;
                for (i, element) in elements.iter().enumerate() {
                    if let Some(element) = element {
                        let item = items.get(i).cloned().unwrap_or(Value::Undefined);
                        self.bind_pattern(element, item, env, mutable)?;
                    }
                }
                Ok(())
            }
            Pattern::Object(props) => {
                if value.is_nullish() {
                    return Err(JsError::Type(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                for (key, target) in props {
                    let item = self.get_member(&value, key)?;
                    self.bind_pattern(target, item, env, mutable)?;
                }
                Ok(())
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), JsError> {
        match target {
            Expr::Ident(name) => {
                if !env.assign(name, value.clone())? {
                    // sloppy-mode scripts create a global on first assignment
                    self.globals.declare(name, value, true);
                }
                Ok(())
            }
            Expr::Member { object, key, .. } => {
                let object = self.eval(object, env)?;
                let key = self.property_key(key, env)?;
                self.set_member(&object, &key, value)
            }
            Expr::Array(elements) => {
                let items = self.iterate(&value)?;
                for (i, (spread, element)) in elements.iter().enumerate() {
                    if *spread {
                        let rest = items.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                        let rest = self.alloc_array(rest);
                        return self.assign_to(element, rest, env);
                    }
                    let item = items.get(i).cloned().unwrap_or(Value::Undefined);
                    self.assign_to(element, item, env)?;
                }
                Ok(())
            }
            Expr::Object(props) => {
                for prop in props {
                    if let PropDef::Init(key, element) = prop {
                        let key = self.property_key(key, env)?;
                        let item = self.get_member(&value, &key)?;
                        self.assign_to(element, item, env)?;
                    }
                }
                Ok(())
            }
            _ => Err(JsError::Syntax {
                message: "Invalid left-hand side in assignment".to_string(),
                line: 0,
            }),
        }
    }

    fn property_key(&mut self, key: &Key, env: &Env) -> Result<String, JsError> {
        match key {
            Key::Named(name) => Ok(name.clone()),
            Key::Computed(expr) => Ok(self.eval(expr, env)?.to_property_key()),
        }
    }

    pub(super) fn iterate(&mut self, value: &Value) -> Result<Vec<Value>, JsError> {
        match value {
            Value::Array(items) => Ok(items.borrow().to_vec()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            other => Err(JsError::Type(format!(
                "{} is not iterable",
                describe(other)
            ))),
        }
    }

    // ===== expressions =====

    pub(super) fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, JsError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::This => Ok(env.lookup("this").unwrap_or(Value::Undefined)),
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| JsError::Reference(format!("{name} is not defined"))),
            Expr::Template(pieces) => {
                let mut text = String::new();
                for piece in pieces {
                    match piece {
                        TemplatePiece::Text(chunk) => text.push_str(chunk),
                        TemplatePiece::Expr(expr) => {
                            text.push_str(&self.eval(expr, env)?.to_text()?)
                        }
                    }
                }
                self.alloc_string(text)
            }
            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for (spread, element) in elements {
                    let value = self.eval(element, env)?;
                    if *spread {
                        items.extend(self.iterate(&value)?);
                    } else {
                        items.push(value);
                    }
                }
                Ok(self.alloc_array(items))
            }
            Expr::Object(props) => {
                let mut object = Object::default();
                for prop in props {
                    match prop {
                        PropDef::Init(key, value) => {
                            let key = self.property_key(key, env)?;
                            let value = self.eval(value, env)?;
                            object.set(&key, value);
                        }
                        PropDef::Spread(source) => {
                            let source = self.eval(source, env)?;
                            for key in own_keys(&source) {
                                let value = self.get_member(&source, &key)?;
                                object.set(&key, value);
                            }
                        }
                    }
                }
                Ok(self.alloc_object(object))
            }
            Expr::Function(def) => Ok(self.make_closure(def, env)),
            Expr::Class(def) => Ok(self.make_class(def, env)),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, env),
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, env)?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_to(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Assign { op, target, value } => {
                let value = match op {
                    None => self.eval(value, env)?,
                    Some(op) => {
                        let current = self.eval(target, env)?;
                        let rhs = self.eval(value, env)?;
                        self.binary(*op, &current, &rhs)?
                    }
                };
                self.assign_to(target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Member {
                object,
                key,
                optional,
            } => {
                let object = self.eval(object, env)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.property_key(key, env)?;
                self.get_member(&object, &key)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, env),
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                self.construct(&constructor, args, &callee_label(callee))
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, env: &Env) -> Result<Value, JsError> {
        match op {
            UnaryOp::TypeOf => {
                let value = match operand {
                    Expr::Ident(name) => env.lookup(name).unwrap_or(Value::Undefined),
                    other => self.eval(other, env)?,
                };
                Ok(Value::from(value.type_of()))
            }
            UnaryOp::Delete => {
                if let Expr::Member { object, key, .. } = operand {
                    let object = self.eval(object, env)?;
                    let key = self.property_key(key, env)?;
                    if let Value::Object(object) = object {
                        object.borrow_mut().remove(&key);
                    }
                }
                Ok(Value::Bool(true))
            }
            UnaryOp::Void => {
                self.eval(operand, env)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Neg => Ok(Value::Number(-self.eval(operand, env)?.to_number())),
            UnaryOp::Plus => Ok(Value::Number(self.eval(operand, env)?.to_number())),
            UnaryOp::Not => Ok(Value::Bool(!self.eval(operand, env)?.truthy())),
            UnaryOp::BitNot => Ok(Value::Number(f64::from(!to_int32(
                self.eval(operand, env)?.to_number(),
            )))),
        }
    }

    fn eval_args(&mut self, args: &[(bool, Expr)], env: &Env) -> Result<Vec<Value>, JsError> {
        let mut values = Vec::with_capacity(args.len());
        for (spread, arg) in args {
            let value = self.eval(arg, env)?;
            if *spread {
                values.extend(self.iterate(&value)?);
            } else {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[(bool, Expr)],
        optional: bool,
        env: &Env,
    ) -> Result<Value, JsError> {
        let (function, this) = match callee {
            Expr::Member {
                object,
                key,
                optional: optional_member,
            } => {
                let object = self.eval(object, env)?;
                if *optional_member && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let key = self.property_key(key, env)?;
                let function = self.get_member(&object, &key)?;
                (function, Some(object))
            }
            other => (self.eval(other, env)?, None),
        };
        if optional && function.is_nullish() {
            return Ok(Value::Undefined);
        }
        if !matches!(function, Value::Function(_)) {
            return Err(JsError::Type(format!(
                "{} is not a function",
                callee_label(callee)
            )));
        }
        let args = self.eval_args(args, env)?;
        self.call_value(&function, this, args)
    }

    pub(super) fn call_value(
        &mut self,
        function: &Value,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        let Value::Function(function) = function else {
            return Err(JsError::Type(format!(
                "{} is not a function",
                describe(function)
            )));
        };
        self.checkpoint()?;
        match &**function {
            Function::Closure { def, env } => self.call_closure(def, env, this, args),
            Function::Native(path) => self.call_native(path, args),
            Function::Method { receiver, name } => self.call_method(receiver, name, args),
            Function::Class { def, .. } => Err(JsError::Type(format!(
                "Class constructor {} cannot be invoked without 'new'",
                def.name
            ))),
        }
    }

    fn call_closure(
        &mut self,
        def: &Rc<FunctionDef>,
        env: &Env,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(JsError::Range(
                "Maximum call stack size exceeded".to_string(),
            ));
        }
        self.call_depth += 1;
        let result = self.invoke(def, env, this, args);
        self.call_depth -= 1;
        result
    }

    fn invoke(
        &mut self,
        def: &FunctionDef,
        env: &Env,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, JsError> {
        let scope = self.child_scope(env);
        if !def.is_arrow {
            scope.declare("this", this.unwrap_or(Value::Undefined), false);
            let arguments = self.alloc_array(args.clone());
            scope.declare("arguments", arguments, true);
        }
        for (i, param) in def.params.iter().enumerate() {
            let value = if param.rest {
                let rest = args.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                self.alloc_array(rest)
            } else {
                args.get(i).cloned().unwrap_or(Value::Undefined)
            };
            let value = match (&param.default, value) {
                (Some(default), Value::Undefined) => self.eval(default, &scope)?,
                (_, value) => value,
            };
            self.bind_pattern(&param.pattern, value, &scope, true)?;
        }
        match &def.body {
            Body::Expr(expr) => self.eval(expr, &scope),
            Body::Block(stmts) => match self.exec_stmts(stmts, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn make_class(&mut self, def: &Rc<ClassDef>, env: &Env) -> Value {
        self.heap.charge(64);
        Value::Function(Rc::new(Function::Class {
            def: def.clone(),
            env: env.clone(),
        }))
    }

    fn construct(
        &mut self,
        constructor: &Value,
        args: Vec<Value>,
        label: &str,
    ) -> Result<Value, JsError> {
        let not_constructor = || JsError::Type(format!("{label} is not a constructor"));
        let Value::Function(function) = constructor else {
            return Err(not_constructor());
        };
        self.checkpoint()?;
        match &**function {
            Function::Class { def, env } => {
                let mut object = Object::instance(Some(def.name.clone()));
                for (name, method) in &def.methods {
                    let method = self.make_closure(method, env);
                    object.hidden.push((name.clone(), method));
                }
                let this = self.alloc_object(object);
                if let Some(ctor) = &def.constructor {
                    self.call_closure(ctor, env, Some(this.clone()), args)?;
                }
                Ok(this)
            }
            Function::Closure { def, env } if !def.is_arrow => {
                let this = self.alloc_object(Object::instance(def.name.clone()));
                let returned = self.call_closure(def, env, Some(this.clone()), args)?;
                Ok(match returned {
                    Value::Object(_) | Value::Array(_) => returned,
                    _ => this,
                })
            }
            Function::Native(path) => self.construct_native(path, args),
            _ => Err(not_constructor()),
        }
    }

    // ===== members =====

    pub(super) fn get_member(&mut self, object: &Value, key: &str) -> Result<Value, JsError> {
        let method = |receiver: &Value| {
            Value::Function(Rc::new(Function::Method {
                receiver: receiver.clone(),
                name: key.to_string(),
            }))
        };
        let value = match object {
            Value::Undefined | Value::Null => {
                return Err(JsError::Type(format!(
                    "Cannot read properties of {} (reading '{key}')",
                    object.to_js_string()
                )));
            }
            Value::Str(s) => {
                if key == "length" {
                    Value::Number(s.chars().count() as f64)
                } else if let Some(index) = array_index(key) {
                    s.chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::from(c.to_string()))
                } else if super::builtins::STRING_METHODS.contains(&key) {
                    method(object)
                } else {
                    Value::Undefined
                }
            }
            Value::Array(items) => {
                if key == "length" {
                    Value::Number(items.borrow().len() as f64)
                } else if let Some(index) = array_index(key) {
                    items
                        .borrow()
                        .get(index)
                        .cloned()
                        .unwrap_or(Value::Undefined)
                } else if super::builtins::ARRAY_METHODS.contains(&key) {
                    method(object)
                } else {
                    Value::Undefined
                }
            }
            Value::Number(_) => {
                if super::builtins::NUMBER_METHODS.contains(&key) {
                    method(object)
                } else {
                    Value::Undefined
                }
            }
            Value::Bool(_) => {
                if key == "toString" {
                    method(object)
                } else {
                    Value::Undefined
                }
            }
            Value::Object(inner) => {
                let found = inner.borrow().get(key).cloned();
                match found {
                    Some(value) => value,
                    None if super::builtins::OBJECT_METHODS.contains(&key) => method(object),
                    None => Value::Undefined,
                }
            }
            Value::Function(function) => match &**function {
                Function::Native(path) => {
                    super::builtins::native_member(path, key).unwrap_or(Value::Undefined)
                }
                Function::Class { def, env } => {
                    match def.statics.iter().find(|(name, _)| name == key) {
                        Some((_, method)) => self.make_closure(method, env),
                        None if key == "name" => Value::from(def.name.as_str()),
                        None => Value::Undefined,
                    }
                }
                other if key == "name" => Value::from(other.name()),
                _ => Value::Undefined,
            },
        };
        Ok(value)
    }

    pub(super) fn set_member(
        &mut self,
        object: &Value,
        key: &str,
        value: Value,
    ) -> Result<(), JsError> {
        match object {
            Value::Undefined | Value::Null => Err(JsError::Type(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_js_string()
            ))),
            Value::Array(items) => {
                if let Some(index) = array_index(key) {
                    if index >= MAX_ARRAY_LEN {
                        return Err(JsError::Range("Invalid array length".to_string()));
                    }
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        self.heap.charge((index + 1 - items.len()) * 16);
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                } else if key == "length" {
                    let length = value.to_number();
                    if length < 0.0 || length.fract() != 0.0 || length as usize > MAX_ARRAY_LEN {
                        return Err(JsError::Range("Invalid array length".to_string()));
                    }
                    items.borrow_mut().resize(length as usize, Value::Undefined);
                }
                Ok(())
            }
            Value::Object(inner) => {
                inner.borrow_mut().set(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    // ===== operators =====

    pub(super) fn binary(
        &mut self,
        op: BinOp,
        left: &Value,
        right: &Value,
    ) -> Result<Value, JsError> {
        let number = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
        let int32 = |f: fn(i32, i32) -> i32| {
            Value::Number(f64::from(f(
                to_int32(left.to_number()),
                to_int32(right.to_number()),
            )))
        };
        let value = match op {
            BinOp::Add => {
                let (left, right) = (concat_operand(left)?, concat_operand(right)?);
                if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                    let mut text = left.to_js_string();
                    text.push_str(&right.to_js_string());
                    return self.alloc_string(text);
                }
                Value::Number(left.to_number() + right.to_number())
            }
            BinOp::Sub => number(|a, b| a - b),
            BinOp::Mul => number(|a, b| a * b),
            BinOp::Div => number(|a, b| a / b),
            BinOp::Mod => number(|a, b| a % b),
            BinOp::Pow => number(|a, b| if b.is_nan() { f64::NAN } else { a.powf(b) }),
            BinOp::Eq => Value::Bool(left.loose_equals(right)),
            BinOp::Ne => Value::Bool(!left.loose_equals(right)),
            BinOp::StrictEq => Value::Bool(left.strict_equals(right)),
            BinOp::StrictNe => Value::Bool(!left.strict_equals(right)),
            BinOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
            BinOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
            BinOp::Le => Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinOp::Ge => Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinOp::BitAnd => int32(|a, b| a & b),
            BinOp::BitOr => int32(|a, b| a | b),
            BinOp::BitXor => int32(|a, b| a ^ b),
            BinOp::Shl => int32(|a, b| a.wrapping_shl(b as u32 & 31)),
            BinOp::Shr => int32(|a, b| a.wrapping_shr(b as u32 & 31)),
            BinOp::UShr => {
                let a = to_int32(left.to_number()) as u32;
                let b = to_int32(right.to_number()) as u32 & 31;
                Value::Number(f64::from(a >> b))
            }
            BinOp::In => {
                let key = left.to_property_key();
                match right {
                    Value::Object(object) => Value::Bool(object.borrow().get(&key).is_some()),
                    Value::Array(items) => Value::Bool(
                        key == "length"
                            || array_index(&key).is_some_and(|i| i < items.borrow().len()),
                    ),
                    other => {
                        return Err(JsError::Type(format!(
                            "Cannot use 'in' operator to search for '{key}' in {}",
                            other.to_js_string()
                        )));
                    }
                }
            }
            BinOp::InstanceOf => Value::Bool(instance_of(left, right)?),
        };
        Ok(value)
    }

    // ===== timers =====

    pub(super) fn schedule(
        &mut self,
        callback: Value,
        delay: f64,
        args: Vec<Value>,
        repeat: bool,
    ) -> u32 {
        let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
        self.timers.next_id += 1;
        self.timers.seq += 1;
        let id = self.timers.next_id;
        self.timers.pending.push(Timer {
            id,
            due: self.timers.now + delay,
            seq: self.timers.seq,
            callback,
            args,
            interval: repeat.then_some(delay.max(1.0)),
        });
        id
    }

    pub(super) fn cancel_timer(&mut self, id: u32) {
        self.timers.pending.retain(|t| t.id != id);
    }

    fn run_timers(&mut self) -> Result<(), JsError> {
        loop {
            let next = self
                .timers
                .pending
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.due
                        .partial_cmp(&b.due)
                        .unwrap_or(Ordering::Equal)
                        .then(a.seq.cmp(&b.seq))
                })
                .map(|(i, _)| i);
            let Some(index) = next else {
                return Ok(());
            };
            self.checkpoint()?;
            let timer = self.timers.pending.swap_remove(index);
            self.timers.now = timer.due;
            let callback = timer.callback.clone();
            let args = timer.args.clone();
            if let Some(interval) = timer.interval {
                self.timers.seq += 1;
                self.timers.pending.push(Timer {
                    due: timer.due + interval,
                    seq: self.timers.seq,
                    ..timer
                });
            }
            self.call_value(&callback, None, args)?;
        }
    }
}

pub(super) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() % 4_294_967_296.0) as i64 as i32
}

/// Canonical array index, so `"01"` stays a plain property name
pub(super) fn array_index(key: &str) -> Option<usize> {
    key.parse::<usize>()
        .ok()
        .filter(|i| i.to_string() == key)
}

/// Enumerable keys in `for...in` / `Object.keys` order
pub(super) fn own_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object
            .borrow()
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect(),
        Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        Value::Str(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// `to_primitive` for `+`, failing on arrays nested too deeply to join
fn concat_operand(value: &Value) -> Result<Value, JsError> {
    match value {
        Value::Array(_) => Ok(Value::from(value.to_text()?)),
        other => Ok(other.to_primitive()),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.to_primitive(), right.to_primitive()) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn instance_of(value: &Value, constructor: &Value) -> Result<bool, JsError> {
    let Value::Function(function) = constructor else {
        return Err(JsError::Type(
            "Right-hand side of 'instanceof' is not callable".to_string(),
        ));
    };
    let class_name = match value {
        Value::Object(object) => object.borrow().class_name.clone(),
        _ => None,
    };
    let is_error = matches!(value, Value::Object(o) if o.borrow().is_error);
    Ok(match &**function {
        Function::Class { def, .. } => class_name.as_deref() == Some(def.name.as_str()),
        Function::Closure { def, .. } => {
            def.name.is_some() && class_name.as_deref() == def.name.as_deref()
        }
        Function::Native("Error") => is_error,
        Function::Native(name) if name.ends_with("Error") => {
            is_error && class_name.as_deref() == Some(*name)
        }
        Function::Native("Array") => matches!(value, Value::Array(_)),
        Function::Native("Object") => {
            matches!(value, Value::Object(_) | Value::Array(_) | Value::Function(_))
        }
        _ => false,
    })
}

/// Short description of a value for error messages
fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{s}\""),
        Value::Function(f) => f.name(),
        Value::Array(_) | Value::Object(_) => value.type_of().to_string(),
        other => other.to_js_string(),
    }
}

/// Source-like label for the callee of a failed call
fn callee_label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object,
            key: Key::Named(name),
            ..
        } => format!("{}.{name}", callee_label(object)),
        Expr::Member { object, .. } => format!("{}[...]", callee_label(object)),
        Expr::Call { callee, .. } => format!("{}(...)", callee_label(callee)),
        Expr::This => "this".to_string(),
        Expr::Number(n) => format_number(*n),
        _ => "expression".to_string(),
    }
}
