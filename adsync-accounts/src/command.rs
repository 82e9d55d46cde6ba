//! External account-administration commands.
//!
//! Structural changes (create/delete user or group) are delegated to the
//! system tools. Argument lists are built from the option maps in sorted key
//! order so the same config always produces the same command line.

use std::collections::BTreeMap;
use std::process::Command;

use adsync_core::{NewAccount, DISPLAY_NAME_PLACEHOLDER, USERNAME_PLACEHOLDER};

use crate::error::{io_err, AccountError};

/// Executes (or pretends to execute) one administration command.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<(), AccountError>;
}

/// Runs the command and fails on a non-zero exit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), AccountError> {
        let command = render(program, args);
        tracing::debug!(command = %command, "running account command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| io_err(program, e))?;

        if output.status.success() {
            return Ok(());
        }

        Err(AccountError::Command {
            command,
            status: output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Dry-run runner: prints the command line instead of executing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoCommandRunner;

impl CommandRunner for EchoCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), AccountError> {
        let command = render(program, args);
        tracing::info!(command = %command, "[dry-run] would run");
        println!("{command}");
        Ok(())
    }
}

/// `useradd` arguments for `account`: options in key order, username last.
pub fn useradd_args(options: &BTreeMap<String, String>, account: &NewAccount) -> Vec<String> {
    let comment = sanitize_comment(&account.display_name);
    let mut args = Vec::with_capacity(options.len() * 2 + 1);
    for (option, value) in options {
        args.push(option.clone());
        if !value.is_empty() {
            args.push(value.replace(DISPLAY_NAME_PLACEHOLDER, &comment));
        }
    }
    args.push(account.username.clone());
    args
}

/// `groupadd` arguments: options in key order, group name last.
pub fn groupadd_args(options: &BTreeMap<String, String>, name: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(options.len() * 2 + 1);
    for (option, value) in options {
        args.push(option.clone());
        if !value.is_empty() {
            args.push(value.clone());
        }
    }
    args.push(name.to_string());
    args
}

/// Post-creation hook arguments with the placeholders filled in.
pub fn post_create_args(args: &[String], account: &NewAccount) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace(USERNAME_PLACEHOLDER, &account.username)
                .replace(DISPLAY_NAME_PLACEHOLDER, &account.display_name)
        })
        .collect()
}

/// The comment field cannot hold the record delimiter or line breaks.
fn sanitize_comment(display_name: &str) -> String {
    display_name
        .chars()
        .map(|c| if c == ':' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Human-readable command line for logs and dry-run output.
pub fn render(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn account() -> NewAccount {
        NewAccount {
            username: "alice@example.com".to_string(),
            display_name: "Alice Liddell".to_string(),
        }
    }

    #[test]
    fn post_create_args_substitute_both_placeholders() {
        let args = vec![
            "--user=$USERNAME".to_string(),
            "$DISPLAY_NAME".to_string(),
            "fixed".to_string(),
        ];
        assert_eq!(
            post_create_args(&args, &account()),
            vec!["--user=alice@example.com", "Alice Liddell", "fixed"]
        );
    }

    #[test]
    fn useradd_args_are_sorted_and_substitute_display_name() {
        let opts = options(&[
            ("-m", ""),
            ("-g", "adsync"),
            ("-c", DISPLAY_NAME_PLACEHOLDER),
            ("-s", "/bin/bash"),
        ]);
        let args = useradd_args(&opts, &account());
        assert_eq!(
            args,
            vec![
                "-c",
                "Alice Liddell",
                "-g",
                "adsync",
                "-m",
                "-s",
                "/bin/bash",
                "alice@example.com"
            ]
        );
    }

    #[test]
    fn display_name_cannot_break_record_format() {
        let opts = options(&[("-c", DISPLAY_NAME_PLACEHOLDER)]);
        let user = NewAccount {
            username: "eve".to_string(),
            display_name: "Eve: the\nIntruder".to_string(),
        };
        let args = useradd_args(&opts, &user);
        assert_eq!(args[1], "Eve  the Intruder");
    }

    #[test]
    fn groupadd_args_end_with_group_name() {
        let opts = options(&[("-r", ""), ("-K", "GID_MIN=1500")]);
        assert_eq!(
            groupadd_args(&opts, "adsync"),
            vec!["-K", "GID_MIN=1500", "-r", "adsync"]
        );
        assert_eq!(groupadd_args(&BTreeMap::new(), "adsync"), vec!["adsync"]);
    }

    #[test]
    fn render_quotes_arguments_with_spaces() {
        let args = vec!["-c".to_string(), "Alice Liddell".to_string(), "alice".to_string()];
        assert_eq!(render("useradd", &args), "useradd -c 'Alice Liddell' alice");
    }

    #[test]
    fn echo_runner_never_fails() {
        let runner = EchoCommandRunner;
        runner
            .run("userdel", &["-r".to_string(), "ghost".to_string()])
            .expect("echo succeeds");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_non_zero_exit() {
        let err = SystemCommandRunner
            .run("false", &[])
            .expect_err("false exits non-zero");
        assert!(
            matches!(err, AccountError::Command { ref status, .. } if status == "1"),
            "got: {err}"
        );
    }

    #[test]
    fn system_runner_reports_missing_program() {
        let err = SystemCommandRunner
            .run("adsync-definitely-not-a-program", &[])
            .expect_err("spawn fails");
        assert!(matches!(err, AccountError::Io { .. }), "got: {err}");
    }
}
