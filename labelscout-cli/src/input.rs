//! Reading saved replies from a file or stdin.

use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Input problems that map onto EX_NOINPUT.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no <url>...</url> payload found")]
    NoUrl,
}

/// Whether `path` means stdin.
pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read the whole input as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, InputError> {
    let read_error = |source| InputError::Read {
        path: path.to_path_buf(),
        source,
    };

    if is_stdin(path) {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(read_error)?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).map_err(read_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_is_stdin() {
        assert!(is_stdin(Path::new("-")));
        assert!(!is_stdin(Path::new("reply.txt")));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = read_text(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, InputError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
