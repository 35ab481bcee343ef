//! Assertions shared by the crate's unit tests

use super::{CacheFieldError, CacheFieldResult, ErrorKind};
use crate::queue::TaskFailure;

/// The error of a result that had to fail
#[track_caller]
pub fn expect_failure<T>(result: CacheFieldResult<T>) -> CacheFieldError {
    match result {
        Err(error) => error,
        Ok(_) => panic!("operation succeeded, an error was expected"),
    }
}

/// Fails unless `result` is an error of kind `expected`; returns the error
#[track_caller]
pub fn assert_error_kind<T>(result: CacheFieldResult<T>, expected: ErrorKind) -> CacheFieldError {
    let error = expect_failure(result);
    assert_eq!(error.kind(), expected, "unexpected error kind ({}): {error}", error.kind().code());
    error
}

/// Fails unless `result` is an error whose message mentions `needle`
#[track_caller]
pub fn assert_error_contains<T>(result: CacheFieldResult<T>, needle: &str) -> CacheFieldError {
    let error = expect_failure(result);
    let message = error.to_string();
    assert!(message.contains(needle), "'{needle}' not found in: {message}");
    error
}

/// Fails unless a reported task failure is about `cached_field` and of kind `expected`
#[track_caller]
pub fn assert_task_failure(failure: &TaskFailure, cached_field: &str, expected: ErrorKind) {
    assert_eq!(failure.cached_field, cached_field);
    assert_eq!(failure.error.kind(), expected, "unexpected task failure: {}", failure.error);
}
