//! Interactive confirmation on stdin.

use colored::Colorize;
use indicatif::ProgressBar;
use scos_core::Confirm;
use std::io::{self, Write};

/// `[y/N]` prompt; anything but `y`/`yes` is a no.
pub struct StdinConfirm {
    progress: Option<ProgressBar>,
}

impl StdinConfirm {
    pub fn new(progress: Option<ProgressBar>) -> Self {
        Self { progress }
    }
}

fn ask(prompt: &str) -> bool {
    print!("{} {} [y/N]: ", "?".yellow().bold(), prompt);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    is_yes(&input)
}

fn is_yes(input: &str) -> bool {
    let answer = input.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        match &self.progress {
            Some(pb) => pb.suspend(|| ask(prompt)),
            None => ask(prompt),
        }
    }
}
