//! Runtime invariant checks with a per-thread record for contract tests.
//!
//! ```rust,ignore
//! assert_invariant!(state.handle.is_none(), "At most one device handle is open");
//!
//! #[test]
//! fn contract_single_handle() {
//!     // ... drive a capturer ...
//!     contract_test("single handle", &["At most one device handle is open"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static CHECKED: RefCell<HashMap<&'static str, u64>> = RefCell::new(HashMap::new());
}

/// Checks `condition`, recording that `invariant` was exercised on this thread.
///
/// # Panics
/// Panics when the condition does not hold.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $invariant:expr) => {
        $crate::invariants::check($condition, $invariant, module_path!())
    };
}

#[doc(hidden)]
pub fn check(condition: bool, invariant: &'static str, context: &str) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(invariant).or_insert(0) += 1;
    });

    if !condition {
        panic!("INVARIANT VIOLATION [{}]: {}", context, invariant);
    }
}

/// How many times `invariant` was checked on the current thread.
pub fn times_checked(invariant: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(invariant).copied().unwrap_or(0))
}

/// Panics unless every invariant in `required` was checked on this thread.
pub fn contract_test(name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|invariant| times_checked(invariant) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: never checked:\n  - {}",
            name,
            missing.join("\n  - ")
        );
    }
}

pub fn reset() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
