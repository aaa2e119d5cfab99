use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use coderun::engine::{Engine, EngineConfig, ExecutionRequest};
use coderun::result::{COMPLETED_MESSAGE, NO_CODE_MESSAGE, Status};

fn engine() -> Engine {
    Engine::new(EngineConfig {
        response_delay_ms: 0,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_empty_source_is_no_code() {
    for source in ["", "   \n\t  "] {
        let result = engine().execute(source, "python", "").await;
        assert_eq!(result.output, NO_CODE_MESSAGE);
        assert_eq!(result.status, Status::no_code());
        assert_eq!(result.exit_code, 0);
    }
}

#[tokio::test]
async fn test_native_sequential_output() {
    let result = engine()
        .execute("console.log('A');\nconsole.log('B');", "javascript", "")
        .await;
    assert_eq!(result.output, "A\nB\n");
    assert_eq!(result.error, "");
    assert_eq!(result.status, Status::success());
}

#[tokio::test]
async fn test_blank_language_defaults_to_native() {
    let result = engine().execute("console.log(1 + 1)", "  ", "").await;
    assert_eq!(result.output, "2\n");
}

#[tokio::test]
async fn test_language_tags_are_case_insensitive() {
    let result = engine().execute("print('hi')", " PY ", "").await;
    assert_eq!(result.output, "hi\n");

    let result = engine()
        .execute("int main() { std::cout << 42 << std::endl; }", "C++", "")
        .await;
    assert_eq!(result.output, "42\n");
}

#[tokio::test]
async fn test_native_fault_keeps_partial_output() {
    let result = engine()
        .execute("console.log('ok');\nnull.boom;", "js", "")
        .await;
    assert_eq!(result.output, "ok\n");
    assert_eq!(
        result.error,
        "TypeError: Cannot read properties of null (reading 'boom')"
    );
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.status, Status::code_error());
}

#[tokio::test]
async fn test_heuristic_python_assignment_and_print() {
    let source = "x = 5\nname = 'Ada'\nprint(x)\nprint(f\"Hello {name}\")\n";
    let result = engine().execute(source, "python", "").await;
    assert_eq!(result.output, "5\nHello Ada\n");
    assert_eq!(result.status, Status::success());
}

#[tokio::test]
async fn test_heuristic_input_uses_stdin() {
    let source = "name = input('Who? ')\nprint('Hi ' + name)\n";
    let result = engine().execute(source, "python", "Grace\n").await;
    assert_eq!(result.output, "Who? Grace\nHi Grace\n");
}

#[tokio::test]
async fn test_java_missing_main_warns_but_succeeds() {
    let result = engine()
        .execute("System.out.println(\"loose\");", "java", "")
        .await;
    assert_eq!(result.output, "loose\n");
    assert!(result.error.starts_with("Warning:"));
    assert_eq!(result.status, Status::success());
}

#[tokio::test]
async fn test_unknown_language_uses_generic_matcher() {
    let result = engine().execute("echo \"hello\"", "bash", "").await;
    assert_eq!(result.output, "hello\n");
    assert_eq!(result.status, Status::simulated());

    let result = engine().execute("10 GOTO 10", "Basic", "").await;
    assert!(result.output.contains("'Basic'"));
    assert!(result.output.contains("Input provided: no"));
    assert_eq!(result.status, Status::simulated());
}

#[tokio::test]
async fn test_oversized_format_width_skips_only_that_print() {
    let source = "int main() {\n\
                  printf(\"%999999999999999d\\n\", 1);\n\
                  printf(\"%5d|\\n\", 42);\n}\n";
    let result = engine().execute(source, "cpp", "").await;
    assert_eq!(result.output, "   42|\n");
    assert_eq!(result.status, Status::success());

    let source = "x = 2.5\nprint(f\"{x:.999999999999999f}\")\nprint(f\"{x:.2f}\")\n";
    let result = engine().execute(source, "python", "").await;
    assert_eq!(result.output, "2.50\n");
    assert_eq!(result.status, Status::success());
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let engine = Engine::new(EngineConfig {
        time_limit_ms: 100,
        response_delay_ms: 0,
    });
    let started = Instant::now();
    let result = engine.execute("while (true) {}", "js", "").await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.error, "Execution timed out after 0.100 seconds");
    assert_eq!(result.status, Status::code_error());
}

#[tokio::test]
async fn test_run_request_defaults_missing_fields() {
    let request: ExecutionRequest =
        serde_json::from_str(r#"{"source": "console.log('x')"}"#).unwrap();
    let result = engine().run(request).await;
    assert_eq!(result.output, "x\n");
}

#[tokio::test]
async fn test_repeated_runs_are_independent() {
    let source = "let n = 0; n++; console.log(n);";
    let first = engine().execute(source, "js", "").await;
    let second = engine().execute(source, "js", "").await;
    assert_eq!(first.output, second.output);
    assert_eq!(first.memory, second.memory);
    assert_eq!(first.status, second.status);
}

#[tokio::test]
async fn test_response_delay_is_applied() {
    let engine = Engine::new(EngineConfig {
        response_delay_ms: 50,
        ..Default::default()
    });
    let started = Instant::now();
    engine.execute("console.log(1)", "js", "").await;
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_completed_result_shape() {
    let result = coderun::ExecutionResult::completed();
    assert_eq!(result.output, COMPLETED_MESSAGE);
    assert_eq!(result.status, Status::completed());
    assert_eq!(result.error, "");
}
