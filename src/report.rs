//! Console reporting: colored/emoji status lines and confirmation prompts.
//!
//! Human-facing output goes to stdout; a parallel `tracing` stream carries
//! the same events for log capture. Color is disabled by `--no-color` or
//! the `NO_COLOR` environment variable.

use crate::Result;
use colored::Colorize;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Formats command output for humans.
#[derive(Debug, Clone)]
pub struct Reporter {
    use_color: bool,
}

impl Reporter {
    pub fn new(use_color: bool) -> Self {
        let use_color = use_color && std::env::var_os("NO_COLOR").is_none();
        Self { use_color }
    }

    /// Banner used at the top of a command run.
    pub fn header(&self, text: &str) {
        let bar = "=".repeat(60);
        let centered = format!("{:^60}", text);
        if self.use_color {
            println!("\n{}", bar.blue().bold());
            println!("{}", centered.blue().bold());
            println!("{}", bar.blue().bold());
        } else {
            println!("\n{bar}\n{centered}\n{bar}");
        }
    }

    /// Section divider within a command run.
    pub fn section(&self, text: &str) {
        let title = format!("📋 {text}");
        if self.use_color {
            println!("\n{}", title.bold());
        } else {
            println!("\n{title}");
        }
        println!("{}", "-".repeat(40));
    }

    pub fn success(&self, text: &str) {
        info!(target: "pavectl", "{text}");
        let line = format!("✅ {text}");
        if self.use_color {
            println!("{}", line.green());
        } else {
            println!("{line}");
        }
    }

    pub fn warning(&self, text: &str) {
        warn!(target: "pavectl", "{text}");
        let line = format!("⚠️  {text}");
        if self.use_color {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }

    pub fn error(&self, text: &str) {
        error!(target: "pavectl", "{text}");
        let line = format!("❌ {text}");
        if self.use_color {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }

    pub fn info(&self, text: &str) {
        info!(target: "pavectl", "{text}");
        let line = format!("ℹ️  {text}");
        if self.use_color {
            println!("{}", line.blue());
        } else {
            println!("{line}");
        }
    }

    /// Status line with an arbitrary leading icon.
    pub fn status(&self, icon: &str, text: &str) {
        info!(target: "pavectl", "{text}");
        println!("{icon} {text}");
    }

    /// Unadorned line.
    pub fn plain(&self, text: &str) {
        println!("{text}");
    }

    pub fn blank(&self) {
        println!();
    }

    /// Asks a y/N question; anything but `y`/`Y` declines.
    pub async fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = self.ask(prompt).await?;
        Ok(accepts_yes(&answer))
    }

    /// Asks a question that must be answered with the literal word `yes`.
    pub async fn confirm_destruction(&self, prompt: &str) -> Result<bool> {
        let answer = self.ask(prompt).await?;
        Ok(accepts_word(&answer, "yes"))
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        use std::io::Write;
        print!("{prompt}");
        std::io::stdout().flush()?;

        let mut line = String::new();
        let mut reader = BufReader::new(stdin());
        reader.read_line(&mut line).await?;
        Ok(line)
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn accepts_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

fn accepts_word(answer: &str, word: &str) -> bool {
    answer.trim().eq_ignore_ascii_case(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_yes() {
        assert!(accepts_yes("y\n"));
        assert!(accepts_yes("Y\n"));
        assert!(!accepts_yes("yes\n"));
        assert!(!accepts_yes("n\n"));
        assert!(!accepts_yes("\n"));
    }

    #[test]
    fn test_accepts_exact_word() {
        assert!(accepts_word("yes\n", "yes"));
        assert!(accepts_word("YES\n", "yes"));
        assert!(!accepts_word("y\n", "yes"));
        assert!(!accepts_word("no\n", "yes"));
    }
}
