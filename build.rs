use clap::{Command, CommandFactory};
use clap_complete::{Generator, Shell};
use clap_mangen::Man;
use std::path::{Path, PathBuf};

// The CLI definition is shared with the library crate.
include!("src/cli/app.rs");

const BIN: &str = "xdbf";

fn render_man(cmd: Command, file: &Path) {
    let mut buf = Vec::new();
    Man::new(cmd).render(&mut buf).unwrap();
    std::fs::write(file, buf).unwrap();
}

fn main() {
    let out_dir =
        PathBuf::from(std::env::var("OUT_DIR").unwrap_or_else(|_| "target/man".to_string()));
    let man_dir = out_dir.join("man");
    let completions_dir = out_dir.join("completions");
    std::fs::create_dir_all(&man_dir).unwrap();
    std::fs::create_dir_all(&completions_dir).unwrap();

    let cmd = Cli::command().name(BIN);

    // xdbf.1 plus xdbf-<sub>.1 for info, records, count and dump
    render_man(cmd.clone(), &man_dir.join(format!("{}.1", BIN)));
    for sub in cmd.get_subcommands().filter(|s| s.get_name() != "completions") {
        let page = man_dir.join(format!("{}-{}.1", BIN, sub.get_name()));
        render_man(sub.clone(), &page);
    }

    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
        let mut cmd = cmd.clone();
        let mut buf = Vec::new();
        clap_complete::generate(shell, &mut cmd, BIN, &mut buf);
        std::fs::write(completions_dir.join(shell.file_name(BIN)), buf).unwrap();
    }

    println!("cargo:rerun-if-changed=src/cli/app.rs");
}
