//! Cross-crate scenario tests for Homestead. The scenarios live in `tests/`.
