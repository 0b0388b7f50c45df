//! CLI parsing tests for truncate command using the test DSL.

#[cfg(test)]
mod tests {
    use rstest::rstest;

    crate::cli_reject_test! {
        test_name: test_requires_table,
        args: ["truncate"],
        mentions: "<TABLE>",
    }

    #[rstest]
    #[case(&["truncate", "audit_log"], false)]
    #[case(&["truncate", "audit_log", "--yes"], true)]
    fn test_yes_flag(#[case] line: &[&str], #[case] expected: bool) {
        use clap::Parser;
        let args = crate::cli::Args::try_parse_from(
            std::iter::once("datasource_engine").chain(line.iter().copied()),
        )
        .unwrap();
        match args.command {
            crate::commands::Command::Truncate(cmd) => assert_eq!(cmd.yes, expected),
            other => panic!("expected Truncate, got {other:?}"),
        }
    }
}
