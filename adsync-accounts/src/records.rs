//! Colon-delimited identity records.
//!
//! ## Rewrite protocol
//!
//! 1. Open the file read/write and read it whole.
//! 2. Build the new content in memory; lines that are not edited are copied
//!    verbatim, line endings included.
//! 3. Seek to 0, truncate, write, sync.
//!
//! The file keeps its inode, owner and mode; readers may briefly observe the
//! truncated file.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use indexmap::IndexMap;

use adsync_core::{LocalAccount, LocalGroup, SHADOW_MARKER};

use crate::error::{io_err, AccountError};

pub const DELIMITER: char = ':';
pub const ACCOUNT_FIELDS: usize = 7;
pub const GROUP_FIELDS: usize = 4;
pub const SECRET_MIN_FIELDS: usize = 2;

/// Hash fields that mean "no password": `useradd` writes `!`, some
/// distributions `!!`, system accounts carry `*`.
const UNSET_HASHES: [&str; 4] = ["", "!", "!!", "*"];

/// Result of editing one field of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    /// No record for the name.
    Missing,
    /// The record exists and the editor declined to change it.
    Unchanged,
    /// New file content.
    Changed(String),
}

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

pub fn read_file(path: &Path) -> Result<String, AccountError> {
    std::fs::read_to_string(path).map_err(|e| io_err(path, e))
}

/// Parse the account file. Blank lines are skipped; any other line without
/// exactly seven fields fails the whole parse.
pub fn parse_accounts(
    path: &Path,
    contents: &str,
) -> Result<IndexMap<String, LocalAccount>, AccountError> {
    let mut accounts = IndexMap::new();
    for (index, fields) in records(path, contents, |n| n == ACCOUNT_FIELDS, "7")? {
        let account = LocalAccount {
            username: fields[0].to_string(),
            has_password: fields[1] == SHADOW_MARKER,
            password_set: false,
            uid: fields[2].to_string(),
            gid: fields[3].to_string(),
            comment: fields[4].to_string(),
            home_dir: fields[5].to_string(),
            shell: fields[6].to_string(),
        };
        if accounts.contains_key(&account.username) {
            tracing::warn!(
                path = %path.display(),
                line = index + 1,
                user = %account.username,
                "duplicate account record ignored",
            );
            continue;
        }
        accounts.insert(account.username.clone(), account);
    }
    Ok(accounts)
}

/// Parse the group file. Empty member entries are dropped.
pub fn parse_groups(
    path: &Path,
    contents: &str,
) -> Result<IndexMap<String, LocalGroup>, AccountError> {
    let mut groups = IndexMap::new();
    for (index, fields) in records(path, contents, |n| n == GROUP_FIELDS, "4")? {
        let group = LocalGroup {
            name: fields[0].to_string(),
            gid: fields[2].to_string(),
            members: fields[3]
                .split(',')
                .map(str::trim)
                .filter(|member| !member.is_empty())
                .map(str::to_string)
                .collect(),
        };
        if groups.contains_key(&group.name) {
            tracing::warn!(
                path = %path.display(),
                line = index + 1,
                group = %group.name,
                "duplicate group record ignored",
            );
            continue;
        }
        groups.insert(group.name.clone(), group);
    }
    Ok(groups)
}

/// Parse the secrets file into username → hash field. The first record for a
/// name wins.
pub fn parse_secrets(
    path: &Path,
    contents: &str,
) -> Result<IndexMap<String, String>, AccountError> {
    let mut secrets = IndexMap::new();
    for (_, fields) in records(path, contents, |n| n >= SECRET_MIN_FIELDS, "at least 2")? {
        secrets
            .entry(fields[0].to_string())
            .or_insert_with(|| fields[1].to_string());
    }
    Ok(secrets)
}

/// Whether a stored hash field can authenticate anyone. An administrator
/// lock (`!` in front of a real hash) still counts as set.
pub fn is_usable_hash(hash: &str) -> bool {
    !UNSET_HASHES.contains(&hash)
}

/// Split non-blank lines into fields, checking the field count.
fn records<'a>(
    path: &Path,
    contents: &'a str,
    count_ok: impl Fn(usize) -> bool,
    expected: &str,
) -> Result<Vec<(usize, Vec<&'a str>)>, AccountError> {
    let mut out = Vec::new();
    for (index, piece) in contents.split_inclusive('\n').enumerate() {
        let (body, _) = split_ending(piece);
        if body.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = body.split(DELIMITER).collect();
        if !count_ok(fields.len()) || fields[0].is_empty() {
            return Err(AccountError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: format!("expected {expected} fields, found {}", fields.len()),
            });
        }
        out.push((index, fields));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// Edit field `index` of the first record named `name`.
///
/// `edit` receives the current value and returns the replacement, or `None`
/// to leave the record alone. Every other byte of `contents` is preserved.
pub fn edit_field<F>(contents: &str, name: &str, index: usize, edit: F) -> FieldEdit
where
    F: FnOnce(&str) -> Option<String>,
{
    let mut edit = Some(edit);
    let mut found = false;
    let mut changed = false;
    let mut out = String::with_capacity(contents.len() + 128);

    for piece in contents.split_inclusive('\n') {
        let (body, ending) = split_ending(piece);
        let fields: Vec<&str> = body.split(DELIMITER).collect();
        if found || fields[0] != name || fields.len() <= index {
            out.push_str(piece);
            continue;
        }
        found = true;

        let replacement = edit.take().and_then(|f| f(fields[index]));
        match replacement {
            Some(value) => {
                let line = fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| if i == index { value.as_str() } else { *field })
                    .collect::<Vec<_>>()
                    .join(":");
                out.push_str(&line);
                out.push_str(ending);
                changed = true;
            }
            None => out.push_str(piece),
        }
    }

    match (found, changed) {
        (false, _) => FieldEdit::Missing,
        (true, false) => FieldEdit::Unchanged,
        (true, true) => FieldEdit::Changed(out),
    }
}

/// Append `line` as a new record, adding a separator newline if needed.
pub fn append_record(contents: &str, line: &str) -> String {
    let mut out = String::with_capacity(contents.len() + line.len() + 2);
    out.push_str(contents);
    if !contents.is_empty() && !contents.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    out
}

/// Read-modify-write `path` in place. `rewrite` returns `None` when nothing
/// should be written. Returns whether the file was rewritten.
pub fn rewrite_in_place<F>(path: &Path, rewrite: F) -> Result<bool, AccountError>
where
    F: FnOnce(&str) -> Result<Option<String>, AccountError>,
{
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| io_err(path, e))?;

    let Some(updated) = rewrite(&contents)? else {
        return Ok(false);
    };

    file.seek(SeekFrom::Start(0)).map_err(|e| io_err(path, e))?;
    file.set_len(0).map_err(|e| io_err(path, e))?;
    file.write_all(updated.as_bytes())
        .map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))?;
    Ok(true)
}

fn split_ending(piece: &str) -> (&str, &str) {
    if let Some(body) = piece.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = piece.strip_suffix('\n') {
        (body, "\n")
    } else {
        (piece, "")
    }
}
