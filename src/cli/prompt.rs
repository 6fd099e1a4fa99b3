//! Confirmation prompts using rustyline

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Ask a yes/no question; anything but `y`/`yes` is a no
///
/// Ctrl-C and Ctrl-D count as no.
pub fn confirm(question: &str) -> Result<bool> {
    let mut editor = DefaultEditor::new()?;
    match editor.readline(&format!("{} [y/N]: ", question)) {
        Ok(line) => Ok(is_affirmative(&line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yep"));
    }
}
