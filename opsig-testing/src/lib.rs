//! Internal testing utilities for the opsig crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe, catch_unwind};

/// Utility for writing parametrized (aka. table-driven) tests.
///
/// To write a table-driven test, define a struct (conventionally named
/// `Case`) holding the inputs and expectations for one case, build a
/// collection of cases and call [`test_each`](TestCases::test_each) with the
/// assertion function:
///
/// ```
/// use opsig_testing::TestCases;
///
/// // Add #[test] attribute
/// fn test_square() {
///   #[derive(Debug)]
///   struct Case {
///     input: i32,
///     expected: i32,
///   }
///
///   let cases = [
///     Case { input: 3, expected: 9 },
///     Case { input: -2, expected: 4 },
///   ];
///
///   cases.test_each(|&Case { input, expected }| {
///     assert_eq!(input * input, expected);
///   });
/// }
/// # test_square();
/// ```
///
/// Unlike a bare `for` loop over the cases, every case runs even if an
/// earlier one fails. Failing cases are reported together at the end with
/// their index and debug representation, so one broken entry in a long table
/// does not hide the rest.
///
/// Cases and the test function must be unwind safe. For cases that are not,
/// either simplify the offending field or wrap it in
/// [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Run `test` against every case, then panic with details of all failing
    /// cases if any panicked.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes cases to
    /// the test function by value.
    ///
    /// Each case is formatted to a string up front so its debug
    /// representation is still available if the test panics.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let mut failures = Vec::new();
        for (index, case) in self.into_iter().enumerate() {
            if catch_unwind(|| test(&case)).is_err() {
                failures.push(format!("case {}: {:?}", index, case));
            }
        }
        if !failures.is_empty() {
            panic!(
                "{} test cases failed:\n{}",
                failures.len(),
                failures.join("\n")
            );
        }
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for (index, case) in self.into_iter().enumerate() {
            let case_str = format!("case {}: {:?}", index, case);
            let test = &test;
            if catch_unwind(move || test(case)).is_err() {
                failures.push(case_str);
            }
        }
        if !failures.is_empty() {
            panic!(
                "{} test cases failed:\n{}",
                failures.len(),
                failures.join("\n")
            );
        }
    }
}
