//! Native Evaluator: runs JavaScript snippets in-process
//!
//! The snippet is tokenized, parsed and walked by an interpreter that owns
//! its console transcript, stdin queue and time budget. Nothing is shared
//! between runs.

mod ast;
mod builtins;
mod console;
mod interp;
mod lexer;
mod parser;
mod value;

use std::time::Duration;

use anyhow::{Context, anyhow};

use crate::budget::Budget;
use crate::result::{PartialResult, Status};
use interp::Interpreter;
use value::Value;

/// Stack reserved for the evaluator thread; deep recursion in the tree walker
/// needs far more than the default 2 MiB
const EVALUATOR_STACK_SIZE: usize = 64 * 1024 * 1024;

/// A fault raised while parsing or running a snippet
#[derive(Debug, thiserror::Error)]
pub enum JsError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { message: String, line: usize },
    #[error("ReferenceError: {0}")]
    Reference(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("RangeError: {0}")]
    Range(String),
    /// A value thrown by the snippet and never caught
    #[error("{}", .0.uncaught())]
    Thrown(Value),
    #[error("{0}")]
    Timeout(String),
}

/// Evaluates `source` with `stdin` available to `prompt()`
///
/// Faults raised by the snippet come back as a code-error result. `Err` means
/// the evaluator itself failed (thread spawn, panic) and is left to the caller
/// to downgrade.
pub fn evaluate(source: &str, stdin: &str, limit: Duration) -> anyhow::Result<PartialResult> {
    let budget = Budget::start(limit);
    let source = source.to_owned();
    let stdin = stdin.to_owned();

    let handle = std::thread::Builder::new()
        .name("coderun-native".to_string())
        .stack_size(EVALUATOR_STACK_SIZE)
        .spawn(move || run_snippet(&source, &stdin, budget))
        .context("Failed to spawn evaluator thread")?;

    handle
        .join()
        .map_err(|_| anyhow!("Native evaluator panicked"))
}

fn run_snippet(source: &str, stdin: &str, budget: Budget) -> PartialResult {
    let mut interpreter = Interpreter::new(stdin, budget);
    let outcome = parser::parse_program(source).and_then(|program| interpreter.run(&program));

    let output = interpreter.take_output();
    let memory = source.len() as u64 + interpreter.allocated_bytes() + output.len() as u64;
    let partial = PartialResult {
        output: Some(output),
        error: Some(String::new()),
        exit_code: Some(0),
        execution_time: Some(budget.elapsed().as_secs_f64()),
        memory: Some(memory),
        status: Some(Status::success()),
    };

    match outcome {
        Ok(()) => partial,
        Err(error) => {
            log::debug!("Snippet raised: {error}");
            partial.fail(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::DEFAULT_TIME_LIMIT;
    use crate::result::STATUS_ERROR;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> PartialResult {
        run_with_stdin(source, "")
    }

    fn run_with_stdin(source: &str, stdin: &str) -> PartialResult {
        evaluate(source, stdin, DEFAULT_TIME_LIMIT).expect("evaluator should not fail")
    }

    fn output(source: &str) -> String {
        let result = run(source);
        assert_eq!(result.error.as_deref(), Some(""), "unexpected fault");
        result.output.unwrap_or_default()
    }

    fn error(source: &str) -> String {
        let result = run(source);
        assert_eq!(result.status.as_ref().map(|s| s.id), Some(STATUS_ERROR));
        assert_eq!(result.exit_code, Some(1));
        result.error.unwrap_or_default()
    }

    #[test]
    fn test_sequential_prints() {
        assert_eq!(output("console.log('A');\nconsole.log('B');"), "A\nB\n");
    }

    #[test]
    fn test_console_formatting() {
        let source = r#"
            console.log(1, 'two', [1, 2, 3], { a: 1, b: 'x' });
            console.log(0.1 + 0.2, 10 / 4, 7 / 7);
            console.log([[1, [2, [3, [4]]]]]);
            console.log(null, undefined, true);
        "#;
        assert_eq!(
            output(source),
            "1 two [ 1, 2, 3 ] { a: 1, b: 'x' }\n\
             0.30000000000000004 2.5 1\n\
             [ [ 1, [ 2, [Array] ] ] ]\n\
             null undefined true\n"
        );
    }

    #[test]
    fn test_all_channels_share_transcript() {
        let source = "console.info('i'); console.warn('w'); console.error('e'); console.log('l');";
        assert_eq!(output(source), "i\nw\ne\nl\n");
    }

    #[test]
    fn test_closures_capture_per_iteration_bindings() {
        let source = r#"
            const fns = [];
            for (let i = 0; i < 3; i++) {
                fns.push(() => i);
            }
            console.log(fns.map(f => f()).join(','));

            function counter() {
                let n = 0;
                return { next: () => ++n };
            }
            const c = counter();
            c.next();
            console.log(c.next());
        "#;
        assert_eq!(output(source), "0,1,2\n2\n");
    }

    #[test]
    fn test_recursion_and_control_flow() {
        let source = r#"
            function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
            let out = [];
            for (const n of [5, 10]) out.push(fib(n));
            let i = 0;
            while (true) { if (++i > 3) break; }
            do { i--; } while (i > 0);
            switch (i) {
                case 0: out.push('zero');
                case 1: out.push('fell'); break;
                default: out.push('never');
            }
            console.log(out.join(' '));
        "#;
        assert_eq!(output(source), "5 55 zero fell\n");
    }

    #[test]
    fn test_classes_and_destructuring() {
        let source = r#"
            class Point {
                constructor(x, y) { this.x = x; this.y = y; }
                sum() { return this.x + this.y; }
                static origin() { return new Point(0, 0); }
            }
            const p = new Point(2, 3);
            console.log(p.sum(), Point.origin().sum(), p instanceof Point);
            console.log(p);
            const { x, y: [a, b] } = { x: 1, y: [2, 3] };
            const [first, , third] = [1, 2, 3];
            console.log(x + a + b, first, third);
        "#;
        assert_eq!(
            output(source),
            "5 0 true\nPoint { x: 2, y: 3 }\n6 1 3\n"
        );
    }

    #[test]
    fn test_builtins() {
        let source = r#"
            console.log(`sum=${1 + 2}`, 'abc'.toUpperCase(), ' pad '.trim().padStart(5, '*'));
            console.log([3, 1, 2].sort(), [10, 9, 1].sort((a, b) => a - b));
            console.log(JSON.stringify({ a: [1, 2], b: 'x', c: undefined }));
            console.log(Math.max(1, 5, 3), Math.round(2.5), parseInt('42px'), (3.14159).toFixed(2));
            console.log(Object.keys({ k: 1, j: 2 }), Array.from({ length: 3 }, (_, i) => i * i));
            console.log([1, 2, 3, 4].filter(n => n % 2 === 0).reduce((acc, n) => acc + n, 0));
        "#;
        assert_eq!(
            output(source),
            "sum=3 ABC **pad\n\
             [ 1, 2, 3 ] [ 1, 9, 10 ]\n\
             {\"a\":[1,2],\"b\":\"x\"}\n\
             5 3 42 3.14\n\
             [ 'k', 'j' ] [ 0, 1, 4 ]\n\
             6\n"
        );
    }

    #[test]
    fn test_try_catch_finally() {
        let source = r#"
            try {
                null.x;
            } catch (e) {
                console.log(e.name + ': ' + e.message);
            } finally {
                console.log('done');
            }
            try { throw new RangeError('custom'); } catch ({ message }) { console.log(message); }
        "#;
        assert_eq!(
            output(source),
            "TypeError: Cannot read properties of null (reading 'x')\ndone\ncustom\n"
        );
    }

    #[test]
    fn test_uncaught_fault_keeps_prior_output() {
        let result = run("console.log('before');\nthrow new Error('boom');\nconsole.log('after');");
        assert_eq!(result.output.as_deref(), Some("before\n"));
        assert_eq!(result.error.as_deref(), Some("Error: boom"));
        assert_eq!(result.status, Some(Status::code_error()));
    }

    #[test]
    fn test_fault_descriptions() {
        assert_eq!(error("throw 'oops';"), "Uncaught 'oops'");
        assert_eq!(error("missing();"), "ReferenceError: missing is not defined");
        assert_eq!(error("const k = 1; k = 2;"), "TypeError: Assignment to constant variable.");
        assert!(error("let = ;").starts_with("SyntaxError:"));
    }

    #[test]
    fn test_runaway_recursion_is_a_range_error() {
        assert_eq!(
            error("function f() { return f(); }\nf();"),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn test_prompt_pops_and_echoes_stdin() {
        let source = r#"
            const name = prompt('Name?');
            const age = Number(prompt());
            console.log(`Hi ${name}, next year ${age + 1}`);
            console.log(prompt());
        "#;
        let result = run_with_stdin(source, "Ann\n41\n");
        assert_eq!(
            result.output.as_deref(),
            Some("Ann\n41\nHi Ann, next year 42\nnull\n")
        );
    }

    #[test]
    fn test_timers_run_after_main_script() {
        let source = r#"
            setTimeout(() => console.log('late'), 20);
            setTimeout((who) => console.log('soon', who), 5, 'me');
            const id = setTimeout(() => console.log('never'), 1);
            clearTimeout(id);
            let ticks = 0;
            const t = setInterval(() => { if (++ticks === 3) clearInterval(t); }, 1);
            console.log('now');
        "#;
        assert_eq!(output(source), "now\nsoon me\nlate\n");
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let result = evaluate("while (true) {}", "", Duration::from_millis(50)).unwrap();
        assert_eq!(
            result.error.as_deref(),
            Some("Execution timed out after 0.050 seconds")
        );
        assert_eq!(result.status, Some(Status::code_error()));
    }

    #[test]
    fn test_timeout_is_not_catchable() {
        let source = "try { for (;;) {} } catch (e) { console.log('caught'); } finally { console.log('finally'); }";
        let result = evaluate(source, "", Duration::from_millis(50)).unwrap();
        assert_eq!(result.output.as_deref(), Some(""));
        assert!(result.error.unwrap_or_default().contains("timed out"));
    }

    #[test]
    fn test_deeply_nested_values_are_freed() {
        let source = r#"
            let a = [];
            for (let i = 0; i < 1000000; i++) { a = [a]; }
            a = null;
            let o = {};
            for (let i = 0; i < 200000; i++) { o = { next: o }; }
            o = null;
            let f = () => 0;
            for (let i = 0; i < 200000; i++) { const g = f; f = () => g(); }
            f = null;
            console.log('ok');
        "#;
        let result = evaluate(source, "", Duration::from_secs(120)).unwrap();
        assert_eq!(result.error.as_deref(), Some(""));
        assert_eq!(result.output.as_deref(), Some("ok\n"));
    }

    #[test]
    fn test_deep_nesting_limits_serialization() {
        let nest = |body: &str| {
            format!("let a = [];\nfor (let i = 0; i < 5000; i++) {{ a = [a]; }}\n{body}")
        };
        assert_eq!(
            error(&nest("JSON.stringify(a);")),
            "RangeError: Maximum call stack size exceeded"
        );
        assert_eq!(
            error(&nest("String(a);")),
            "RangeError: Maximum call stack size exceeded"
        );
        assert_eq!(
            error(&nest("console.log('' + a);")),
            "RangeError: Maximum call stack size exceeded"
        );
        assert_eq!(
            error(&nest("a.flat(Infinity);")),
            "RangeError: Maximum call stack size exceeded"
        );
        assert_eq!(output(&nest("console.log(+a);")), "0\n");
        let caught = "try { let a = []; for (let i = 0; i < 5000; i++) a = [a]; a.join(); }\n\
                      catch (e) { console.log(e.name); }";
        assert_eq!(output(caught), "RangeError\n");
    }

    #[test]
    fn test_oversized_repeat_is_rejected() {
        assert_eq!(
            error("'x'.repeat(1e9);"),
            "RangeError: Invalid string length"
        );
    }

    #[test]
    fn test_memory_estimate_is_deterministic() {
        let source = "const xs = []; for (let i = 0; i < 100; i++) xs.push({ i }); console.log(xs.length);";
        let first = run(source).memory;
        assert!(first.unwrap_or(0) > source.len() as u64);
        assert_eq!(first, run(source).memory);
    }
}
