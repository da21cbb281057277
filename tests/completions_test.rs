#![cfg(feature = "cli")]
//! Tests for the `xdbf` command definition and its generated completions.

use clap::{CommandFactory, Parser};
use dbf::cli::app::{Cli, Commands};

fn generate_completions(shell: clap_complete::Shell) -> String {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "xdbf", &mut buf);
    String::from_utf8(buf).expect("completions should be valid UTF-8")
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn bash_completions_offer_table_options() {
    let output = generate_completions(clap_complete::Shell::Bash);
    for word in ["info", "records", "count", "dump", "completions"] {
        assert!(output.contains(word), "missing subcommand {}", word);
    }
    for flag in ["--member", "--memo", "--ignore-missing-memo", "--convert-float"] {
        assert!(output.contains(flag), "missing flag {}", flag);
    }
}

#[test]
fn zsh_and_fish_completions_offer_archive_member() {
    for shell in [clap_complete::Shell::Zsh, clap_complete::Shell::Fish] {
        let output = generate_completions(shell);
        assert!(output.contains("xdbf"));
        assert!(output.contains("member"));
        assert!(output.contains("case-sensitive"));
    }
}

#[test]
fn powershell_completions_are_valid() {
    let output = generate_completions(clap_complete::Shell::PowerShell);
    assert!(output.contains("xdbf"));
    assert!(output.contains("--row"));
}

#[test]
fn records_arguments_parse() {
    let cli = Cli::try_parse_from([
        "xdbf",
        "records",
        "data.zip",
        "--member",
        "people.dbf",
        "--memo",
        "people.fpt",
        "-c",
        "NAME,AGE",
        "-n",
        "5",
    ])
    .unwrap();
    match cli.command {
        Commands::Records {
            open,
            columns,
            limit,
            deleted,
            ..
        } => {
            assert_eq!(open.file, "data.zip");
            assert_eq!(open.member.as_deref(), Some("people.dbf"));
            assert_eq!(open.memo.as_deref(), Some("people.fpt"));
            assert_eq!(columns, Some(vec!["NAME".to_string(), "AGE".to_string()]));
            assert_eq!(limit, Some(5));
            assert!(!deleted);
        }
        _ => panic!("expected the records subcommand"),
    }
}

#[test]
fn dump_rejects_negative_row() {
    assert!(Cli::try_parse_from(["xdbf", "dump", "t.dbf", "--row", "-1"]).is_err());
}
