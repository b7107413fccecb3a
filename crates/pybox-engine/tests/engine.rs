//! Integration tests for pybox-engine.
//!
//! These tests require a `python3` interpreter on `PATH` (or at
//! `PYBOX_INTERPRETER`). Tests skip themselves with a note when none is
//! found, so the suite stays green on hosts without a runtime.

use pybox_engine::{EngineConfig, FaultKind, Gateway};
use std::time::Duration;

fn test_config() -> EngineConfig {
    let mut builder = EngineConfig::builder().timeout(Duration::from_secs(20));
    if let Ok(path) = std::env::var("PYBOX_INTERPRETER") {
        builder = builder.interpreter(path);
    }
    builder.build().expect("valid test config")
}

/// Returns a gateway, or `None` (with a note) when no interpreter exists.
fn gateway() -> Option<Gateway> {
    let config = test_config();
    if config.resolved_interpreter().is_none() {
        eprintln!("Skipping test: python3 not found");
        eprintln!("Set PYBOX_INTERPRETER or install python3");
        return None;
    }
    Some(Gateway::new(config))
}

#[tokio::test]
async fn test_basic_print() {
    let Some(gateway) = gateway() else { return };
    let result = gateway.execute(r#"print("Hello, World!")"#).await;
    assert!(result.contains("Hello, World!"));
}

#[tokio::test]
async fn test_arithmetic_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
x = 10 + 20
y = x * 2
print(f"Result: {y}")
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("60"));
}

#[tokio::test]
async fn test_list_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
numbers = [1, 2, 3, 4, 5]
squared = [n**2 for n in numbers]
print(squared)
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("[1, 4, 9, 16, 25]"));
}

#[tokio::test]
async fn test_import_standard_library() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
import math
result = math.sqrt(16)
print(f"Square root of 16: {result}")
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("4.0"));
}

#[tokio::test]
async fn test_json_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
import json
data = {"name": "Test", "value": 42}
json_str = json.dumps(data)
parsed = json.loads(json_str)
print(parsed['name'], parsed['value'])
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("Test"));
    assert!(result.contains("42"));
}

#[tokio::test]
async fn test_datetime_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
from datetime import datetime
now = datetime(2024, 1, 1, 12, 0, 0)
print(f"Date: {now.strftime('%Y-%m-%d')}")
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("2024-01-01"));
}

#[tokio::test]
async fn test_function_definition() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
def fibonacci(n):
    if n <= 1:
        return n
    return fibonacci(n-1) + fibonacci(n-2)

result = [fibonacci(i) for i in range(8)]
print(result)
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("[0, 1, 1, 2, 3, 5, 8, 13]"));
}

#[tokio::test]
async fn test_handled_exception_stays_in_output() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
try:
    x = 1 / 0
except ZeroDivisionError as e:
    print(f"Caught error: {e}")
"#;
    let execution = gateway.run(code).await;
    // The program handled the error itself: no fault, and the program's own
    // message is ordinary output.
    assert!(execution.success());
    assert!(execution.output.to_lowercase().contains("caught error"));
    assert!(execution.output.contains("division by zero"));
}

#[tokio::test]
async fn test_multiline_output_order() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
for i in range(5):
    print(f"Line {i}")
"#;
    let result = gateway.execute(code).await;
    let positions: Vec<usize> = (0..5)
        .map(|i| {
            result
                .find(&format!("Line {i}"))
                .unwrap_or_else(|| panic!("missing Line {i} in {result:?}"))
        })
        .collect();
    for pair in positions.windows(2) {
        assert!(pair[0] < pair[1], "output out of order: {result:?}");
    }
}

#[tokio::test]
async fn test_optional_library_guarded_import() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
try:
    import numpy as np
    arr = np.array([1, 2, 3, 4, 5])
    print(f"Mean: {arr.mean()}")
    print(f"Sum: {arr.sum()}")
except ImportError:
    print("NumPy not available")
"#;
    let execution = gateway.run(code).await;
    // Whether or not numpy is installed, the guarded import never faults.
    assert!(execution.success());
    assert!(
        (execution.output.contains("Mean:") && execution.output.contains("Sum:"))
            || execution.output.contains("not available")
    );
}

#[tokio::test]
async fn test_string_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
text = "hello world"
print(text.upper())
print(text.capitalize())
print(text.replace("world", "python"))
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("HELLO WORLD"));
    assert!(result.contains("Hello world"));
    assert!(result.contains("hello python"));
}

#[tokio::test]
async fn test_dictionary_operations() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
data = {"a": 1, "b": 2, "c": 3}
for key, value in data.items():
    print(f"{key}: {value}")
"#;
    let result = gateway.execute(code).await;
    assert!(result.contains("a: 1"));
    assert!(result.contains("b: 2"));
    assert!(result.contains("c: 3"));
}

#[tokio::test]
async fn test_empty_source_succeeds() {
    let Some(gateway) = gateway() else { return };
    let execution = gateway.run("").await;
    assert!(execution.success());
    assert_eq!(execution.output, "");
}

#[tokio::test]
async fn test_comment_only_source_succeeds() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
# This is a comment
# Another comment
"#;
    let execution = gateway.run(code).await;
    assert!(execution.success());
    assert_eq!(execution.output, "");
}

#[tokio::test]
async fn test_syntax_error_yields_diagnostic() {
    let Some(gateway) = gateway() else { return };
    // Unclosed string literal.
    let execution = gateway.run("print('hello").await;
    let fault = execution.fault.as_ref().expect("unparseable source faults");
    assert_eq!(fault.kind, FaultKind::Parse);
    assert!(fault.message.contains("SyntaxError"));

    let result = execution.into_text();
    assert!(!result.is_empty());
}

#[tokio::test]
async fn test_unhandled_exception_keeps_partial_output() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
print("before the fault")
x = 1 / 0
print("after the fault")
"#;
    let execution = gateway.run(code).await;
    let fault = execution.fault.as_ref().expect("unhandled error faults");
    assert_eq!(fault.kind, FaultKind::Runtime);
    assert!(fault.message.contains("ZeroDivisionError"));

    let result = execution.into_text();
    assert!(result.contains("before the fault"));
    assert!(!result.contains("after the fault"));
    assert!(result.contains("division by zero"));
}

#[tokio::test]
async fn test_missing_name_yields_runtime_diagnostic() {
    let Some(gateway) = gateway() else { return };
    let execution = gateway.run("print(undefined_name)").await;
    let fault = execution.fault.as_ref().expect("missing name faults");
    assert_eq!(fault.kind, FaultKind::Runtime);
    assert!(fault.message.contains("NameError"));
}

#[tokio::test]
async fn test_sys_exit_is_not_a_fault() {
    let Some(gateway) = gateway() else { return };
    let code = r#"
import sys
print("done")
sys.exit(3)
"#;
    let execution = gateway.run(code).await;
    assert!(execution.success());
    assert!(execution.output.contains("done"));
}

#[tokio::test]
async fn test_concurrent_invocations_do_not_share_bindings() {
    let Some(gateway) = gateway() else { return };
    let gateway = std::sync::Arc::new(gateway);

    let writer = {
        let gateway = gateway.clone();
        async move {
            gateway
                .run("leaked_binding = 'secret'\nprint('bound')")
                .await
        }
    };
    let reader = {
        let gateway = gateway.clone();
        async move { gateway.run("print(leaked_binding)").await }
    };

    let (wrote, read) = tokio::join!(writer, reader);

    assert!(wrote.success());
    assert!(wrote.output.contains("bound"));

    // The second invocation must not see the first one's namespace.
    let fault = read.fault.as_ref().expect("binding must not leak");
    assert_eq!(fault.kind, FaultKind::Runtime);
    assert!(fault.message.contains("NameError"));
}

#[tokio::test]
async fn test_deadline_kill_preserves_partial_output() {
    let config = {
        let mut builder = EngineConfig::builder().timeout(Duration::from_secs(2));
        if let Ok(path) = std::env::var("PYBOX_INTERPRETER") {
            builder = builder.interpreter(path);
        }
        builder.build().expect("valid test config")
    };
    if config.resolved_interpreter().is_none() {
        eprintln!("Skipping test: python3 not found");
        return;
    }
    let gateway = Gateway::new(config);

    let code = r#"
import time
print("before sleep")
time.sleep(60)
print("after sleep")
"#;
    let execution = gateway.run(code).await;
    let fault = execution.fault.as_ref().expect("deadline expiry faults");
    assert_eq!(fault.kind, FaultKind::Resource);
    assert!(fault.message.contains("time limit exceeded"));
    assert!(execution.output.contains("before sleep"));
    assert!(!execution.output.contains("after sleep"));
}

#[tokio::test]
async fn test_every_outcome_is_a_string() {
    let Some(gateway) = gateway() else { return };
    for source in ["", "print(1)", "print('hello", "1 / 0", "# nothing"] {
        let result = gateway.execute(source).await;
        // Some of these have empty output, none are absent; faulting ones
        // must carry diagnostic text.
        if source.contains('/') || source.contains("'hello") {
            assert!(!result.is_empty(), "fault for {source:?} lost its diagnostic");
        }
    }
}
