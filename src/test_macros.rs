//! Test DSL for command parsing and output rendering.
//!
//! Every command's `cli_tests.rs` is a list of these declarations. Command
//! lines are written in full, starting with the subcommand name.

/// Parse a full command line and unwrap the expected [`Command`] variant.
///
/// [`Command`]: crate::commands::Command
#[macro_export]
macro_rules! parse_cmd {
    ($variant:ident, [$($arg:expr),+ $(,)?]) => {{
        use clap::Parser;
        let args = $crate::cli::Args::try_parse_from(["datasource_engine", $($arg),+])
            .unwrap_or_else(|e| panic!("command line should parse: {e}"));
        match args.command {
            $crate::commands::Command::$variant(cmd) => cmd,
            other => panic!(concat!("expected ", stringify!($variant), ", got {:?}"), other),
        }
    }};
}

/// Parse a command line and compare fields of the parsed command.
///
/// Fields may be dotted to reach flattened argument groups (`read.sort`).
///
/// ```ignore
/// cli_parse_test! {
///     test_name: test_with_limit,
///     args: ["find-many", "customers", "--limit", "50"],
///     variant: FindMany,
///     expect: { limit: Some(50), read.sort: None },
/// }
/// ```
#[macro_export]
macro_rules! cli_parse_test {
    (
        test_name: $test_name:ident,
        args: [$($arg:literal),+ $(,)?],
        variant: $variant:ident,
        expect: { $($($field:ident).+ : $expected:expr),+ $(,)? } $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            let cmd = $crate::parse_cmd!($variant, [$($arg),+]);
            $(
                assert_eq!(cmd.$($field).+, $expected, stringify!($($field).+));
            )+
        }
    };
}

/// Assert a command line is rejected, optionally checking the message.
///
/// ```ignore
/// cli_reject_test! {
///     test_name: test_requires_table,
///     args: ["find-many"],
///     mentions: "<TABLE>",
/// }
/// ```
#[macro_export]
macro_rules! cli_reject_test {
    (
        test_name: $test_name:ident,
        args: [$($arg:literal),+ $(,)?]
        $(, mentions: $needle:literal)? $(,)?
    ) => {
        #[rstest]
        fn $test_name() {
            use clap::Parser;
            let result = $crate::cli::Args::try_parse_from(["datasource_engine", $($arg),+]);
            assert!(result.is_err(), "command line should be rejected");
            $(
                let message = result.err().map(|e| e.to_string()).unwrap_or_default();
                assert!(message.contains($needle), "error should mention {}: {}", $needle, message);
            )?
        }
    };
}

/// Render a fixture in `Table` or `Toon` format and look for substrings.
#[macro_export]
macro_rules! output_contains_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident: $fixture_type:ty,
        format: $format:ident,
        contains: [$($needle:literal),* $(,)?] $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use $crate::output::{OutputFormat, Outputable};
            let output = $fixture.format(OutputFormat::$format);
            $(
                assert!(output.contains($needle), "{:?} output lacks {:?}:\n{}", OutputFormat::$format, $needle, output);
            )*
        }
    };
}

/// Render a fixture as JSON and compare values at JSON pointers.
#[macro_export]
macro_rules! output_json_test {
    (
        test_name: $test_name:ident,
        fixture: $fixture:ident: $fixture_type:ty,
        pointers: { $($pointer:literal => $expected:expr),* $(,)? } $(,)?
    ) => {
        #[rstest]
        fn $test_name($fixture: $fixture_type) {
            use $crate::output::{OutputFormat, Outputable};
            let parsed: serde_json::Value = serde_json::from_str(&$fixture.format(OutputFormat::Json))
                .expect("JSON output should parse");
            $(
                assert_eq!(parsed.pointer($pointer), Some(&$expected), "at {}", $pointer);
            )*
        }
    };
}
