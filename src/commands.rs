mod diff;

pub use diff::run_diff;
pub use test::run_test;
