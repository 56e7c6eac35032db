//! Git output parsing helpers.

use std::process::Output;

use super::types::WorkingCopyStatus;

/// Formats a git error with both stdout and stderr for better debugging.
pub fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Parses `git status --porcelain` output into untracked and modified paths.
pub fn parse_porcelain_status(text: &str) -> WorkingCopyStatus {
    let mut status = WorkingCopyStatus::default();

    for line in text.lines() {
        if line.len() < 4 || line.starts_with("##") {
            continue;
        }

        let path = line[3..].trim();
        // renames are reported as "old -> new"
        let path = path.rsplit(" -> ").next().unwrap_or(path).to_string();

        if line.starts_with("??") {
            status.untracked.push(path);
        } else {
            status.modified.push(path);
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_porcelain_status() {
        let text = "?? content/maps/dm-deck16.yml\n M content/index.yml\nR  a.yml -> b.yml\n";
        let status = parse_porcelain_status(text);
        assert_eq!(status.untracked, vec!["content/maps/dm-deck16.yml"]);
        assert_eq!(status.modified, vec!["content/index.yml", "b.yml"]);
        assert!(!status.is_clean());
    }

    #[test]
    fn test_parse_porcelain_status_clean() {
        let status = parse_porcelain_status("## master...origin/master\n");
        assert!(status.is_clean());
    }

    #[cfg(unix)]
    mod unix_tests {
        use super::*;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        fn make_output(status_code: i32, stdout: &[u8], stderr: &[u8]) -> Output {
            Output {
                status: ExitStatus::from_raw(status_code << 8),
                stdout: stdout.to_vec(),
                stderr: stderr.to_vec(),
            }
        }

        #[test]
        fn test_format_git_error_empty_output() {
            let output = make_output(1, b"", b"");
            assert_eq!(format_git_error(&output), "Command failed with exit code 1");
        }

        #[test]
        fn test_format_git_error_both() {
            let output = make_output(1, b"some output", b"some error");
            assert_eq!(format_git_error(&output), "some error\nsome output");
        }
    }
}
