//! Common test utilities and macros

use std::path::Path;

use namevm::value::Value;

/// Expected outcome of running a fixture program: the final data stack
/// (top-down), an exact error message, or a regex the error message
/// must match.
#[derive(Debug)]
pub enum TestResult {
    Stack(Vec<Value>),
    Error(String),
    ErrorRegex(String),
}

impl PartialEq for TestResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TestResult::Stack(a), TestResult::Stack(b)) => a == b,
            (TestResult::Error(a), TestResult::Error(b)) => a == b,
            (TestResult::ErrorRegex(pattern), TestResult::Error(msg)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            (TestResult::Error(msg), TestResult::ErrorRegex(pattern)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            _ => false,
        }
    }
}

/// Compiles and runs one fixture file, reporting the final `"data"`
/// stack or the failure message.
pub fn run_program_test(input_file: &Path) -> TestResult {
    let source = match std::fs::read_to_string(input_file) {
        Ok(s) => s,
        Err(e) => return TestResult::Error(format!("reading fixture failed: {e}")),
    };

    match namevm::run_source(&source) {
        Ok(vm) => {
            let stack = vm
                .env()
                .stack("data")
                .expect("default data stack always exists")
                .iter()
                .cloned()
                .collect();
            TestResult::Stack(stack)
        }
        Err(e) => TestResult::Error(e.to_string()),
    }
}

#[macro_export]
macro_rules! check_program {
    ($test_name:ident, input=$input_file:expr, result=$expected:expr) => {
        #[test]
        fn $test_name() {
            let input_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("tests")
                .join("inputs")
                .join($input_file);

            let result = crate::common::run_program_test(&input_path);
            assert_eq!(result, $expected);
        }
    };
}
