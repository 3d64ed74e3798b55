//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a rustup channel or dated nightly name
    pub fn channel_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("stable".to_string()),
            Just("beta".to_string()),
            (2018u32..2030, 1u32..13, 1u32..29)
                .prop_map(|(y, m, d)| format!("nightly-{y}-{m:02}-{d:02}")),
            (1u32..2, 40u32..90, 0u32..5).prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}")),
        ]
    }

    /// Generate a rustup component name
    pub fn component_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{1,10}(-[a-z]{2,8})?"
    }

    /// Generate a Debian package name
    pub fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9+.-]{1,20}"
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_channel_name_has_no_whitespace(name in channel_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains(char::is_whitespace));
        }

        #[test]
        fn prop_component_name_valid(name in component_name()) {
            prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }

        #[test]
        fn prop_package_name_starts_with_letter(name in package_name()) {
            prop_assert!(name.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
        }
    }
}
