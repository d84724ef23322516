//! Parsing of `git status --porcelain` and `hg status` listings.
//!
//! One table-driven line engine ([`StatusParser`]) does the work; each dialect
//! plugs in a [`StatusGrammar`] describing its code columns, code table,
//! header lines and path syntax. Parsing never fails: lines that don't fit
//! the grammar are skipped and unknown codes read as [`FileState::Unmodified`].

use crate::dialect::Dialect;
use std::fmt;
use tracing::debug;

/// Version-control state of one column of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileState {
    #[default]
    Unmodified,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    UpdatedButUnmerged,
    Untracked,
    Ignored,
    /// git `T`: file type changed (e.g. regular file to symlink)
    TypeChanged,
    /// hg `!`: tracked but gone from disk without `hg remove`
    Missing,
}

impl FileState {
    /// True for states that represent a pending change to a tracked file
    pub fn is_change(self) -> bool {
        !matches!(
            self,
            FileState::Unmodified | FileState::Untracked | FileState::Ignored
        )
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileState::Unmodified => "unmodified",
            FileState::Modified => "modified",
            FileState::Added => "added",
            FileState::Deleted => "deleted",
            FileState::Renamed => "renamed",
            FileState::Copied => "copied",
            FileState::UpdatedButUnmerged => "unmerged",
            FileState::Untracked => "untracked",
            FileState::Ignored => "ignored",
            FileState::TypeChanged => "typechange",
            FileState::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// One file from a status listing.
///
/// `name2` is only set for renames and copies, where `name1` is the source
/// and `name2` the destination.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileStatus {
    pub name1: String,
    pub name2: String,
    /// Index (staged) column
    pub file_state1: FileState,
    /// Working-tree column
    pub file_state2: FileState,
}

impl FileStatus {
    pub fn is_untracked(&self) -> bool {
        self.file_state1 == FileState::Untracked && self.file_state2 == FileState::Untracked
    }

    pub fn is_ignored(&self) -> bool {
        self.file_state1 == FileState::Ignored && self.file_state2 == FileState::Ignored
    }

    pub fn is_rename_or_copy(&self) -> bool {
        !self.name2.is_empty()
    }

    pub fn has_staged_change(&self) -> bool {
        self.file_state1.is_change()
    }

    pub fn has_worktree_change(&self) -> bool {
        self.file_state2.is_change()
    }

    /// Path of the file as it is now
    pub fn current_path(&self) -> &str {
        if self.name2.is_empty() {
            &self.name1
        } else {
            &self.name2
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<10} {}", self.file_state1, self.file_state2, self.name1)?;
        if !self.name2.is_empty() {
            write!(f, " -> {}", self.name2)?;
        }
        Ok(())
    }
}

/// Line grammar of one dialect's status output
pub trait StatusGrammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Number of status-code characters before the separating space
    fn code_columns(&self) -> usize;

    fn code_table(&self) -> &'static [(char, FileState)];

    fn state_for(&self, code: char) -> FileState {
        self.code_table()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, state)| *state)
            .unwrap_or_default()
    }

    /// Lines that carry no file, such as branch summaries
    fn is_header(&self, _line: &str) -> bool {
        false
    }

    /// If `line` names the copy source of the previous record, return it
    fn copy_source<'a>(&self, _line: &'a str) -> Option<&'a str> {
        None
    }

    /// Split the path part of a line into `(name1, name2)`
    fn split_names(&self, rest: &str) -> (String, String) {
        (rest.to_string(), String::new())
    }
}

const GIT_CODES: &[(char, FileState)] = &[
    (' ', FileState::Unmodified),
    ('M', FileState::Modified),
    ('A', FileState::Added),
    ('D', FileState::Deleted),
    ('R', FileState::Renamed),
    ('C', FileState::Copied),
    ('U', FileState::UpdatedButUnmerged),
    ('?', FileState::Untracked),
    ('!', FileState::Ignored),
    ('T', FileState::TypeChanged),
];

const HG_CODES: &[(char, FileState)] = &[
    ('C', FileState::Unmodified),
    ('M', FileState::Modified),
    ('A', FileState::Added),
    ('R', FileState::Deleted),
    ('!', FileState::Missing),
    ('?', FileState::Untracked),
    ('I', FileState::Ignored),
];

const RENAME_SEPARATOR: &str = " -> ";

/// `git status --porcelain` (v1): `XY PATH` or `XY ORIG -> PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitGrammar;

impl StatusGrammar for GitGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Git
    }

    fn code_columns(&self) -> usize {
        2
    }

    fn code_table(&self) -> &'static [(char, FileState)] {
        GIT_CODES
    }

    fn is_header(&self, line: &str) -> bool {
        line.starts_with("##")
    }

    fn split_names(&self, rest: &str) -> (String, String) {
        if rest.starts_with('"') {
            if let Some((first, tail)) = unquote_prefix(rest) {
                if tail.is_empty() {
                    return (first, String::new());
                }
                if let Some(dest) = tail.strip_prefix(RENAME_SEPARATOR) {
                    return (first, unquote_or_raw(dest));
                }
            }
        }

        match rest.split_once(RENAME_SEPARATOR) {
            Some((source, dest)) => (unquote_or_raw(source), unquote_or_raw(dest)),
            None => (unquote_or_raw(rest), String::new()),
        }
    }
}

/// `hg status [-C]`: `X PATH`, with copy sources on indented lines
#[derive(Debug, Clone, Copy, Default)]
pub struct HgGrammar;

impl StatusGrammar for HgGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Hg
    }

    fn code_columns(&self) -> usize {
        1
    }

    fn code_table(&self) -> &'static [(char, FileState)] {
        HG_CODES
    }

    fn copy_source<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.strip_prefix("  ").filter(|source| !source.is_empty())
    }
}

/// Table-driven status parser for one dialect
pub struct StatusParser {
    grammar: Box<dyn StatusGrammar>,
}

impl StatusParser {
    pub fn new(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Git => Self::with_grammar(Box::new(GitGrammar)),
            Dialect::Hg => Self::with_grammar(Box::new(HgGrammar)),
        }
    }

    pub fn with_grammar(grammar: Box<dyn StatusGrammar>) -> Self {
        Self { grammar }
    }

    pub fn dialect(&self) -> Dialect {
        self.grammar.dialect()
    }

    /// Parse a full status listing into records, in input order
    pub fn parse_files(&self, text: &str) -> Vec<FileStatus> {
        let mut files: Vec<FileStatus> = Vec::new();

        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || self.grammar.is_header(line) {
                continue;
            }

            if let Some(source) = self.grammar.copy_source(line) {
                match files.last_mut() {
                    Some(last) if last.file_state2 == FileState::Added && last.name2.is_empty() => {
                        last.name2 = std::mem::replace(&mut last.name1, source.to_string());
                        last.file_state1 = FileState::Copied;
                    }
                    _ => debug!(line, "copy source without a preceding added file"),
                }
                continue;
            }

            match self.parse_line(line) {
                Some(file) => files.push(file),
                None => debug!(line, "skipping non-status line"),
            }
        }

        files
    }

    fn parse_line(&self, line: &str) -> Option<FileStatus> {
        let mut chars = line.char_indices();
        let mut codes = Vec::with_capacity(2);
        for _ in 0..self.grammar.code_columns() {
            let (_, code) = chars.next()?;
            codes.push(code);
        }

        let (space_at, space) = chars.next()?;
        if space != ' ' {
            return None;
        }
        let rest = &line[space_at + 1..];
        if rest.is_empty() {
            return None;
        }

        let (file_state1, file_state2) = match codes.as_slice() {
            [index, worktree] => (self.grammar.state_for(*index), self.grammar.state_for(*worktree)),
            [single] => {
                let state = self.grammar.state_for(*single);
                (state, state)
            }
            _ => return None,
        };

        let (name1, name2) = self.grammar.split_names(rest);
        if name1.is_empty() {
            return None;
        }

        Some(FileStatus {
            name1,
            name2,
            file_state1,
            file_state2,
        })
    }
}

/// Parse `text` with the grammar of `dialect`
pub fn parse_files(dialect: Dialect, text: &str) -> Vec<FileStatus> {
    StatusParser::new(dialect).parse_files(text)
}

fn unquote_or_raw(s: &str) -> String {
    if s.starts_with('"') {
        if let Some((unquoted, tail)) = unquote_prefix(s) {
            if tail.is_empty() {
                return unquoted;
            }
        }
    }
    s.to_string()
}

/// Decode a leading C-style quoted string as git writes paths with unusual
/// characters. Returns the decoded text and whatever follows the closing quote.
fn unquote_prefix(s: &str) -> Option<(String, &str)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 1;
    loop {
        match *bytes.get(i)? {
            b'"' => {
                let decoded = String::from_utf8(out)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
                return Some((decoded, &s[i + 1..]));
            }
            b'\\' => {
                let escape = *bytes.get(i + 1)?;
                let (byte, width) = match escape {
                    b'0'..=b'7' => {
                        let digits = bytes.get(i + 1..i + 4)?;
                        let mut value: u32 = 0;
                        for d in digits {
                            if !(b'0'..=b'7').contains(d) {
                                return None;
                            }
                            value = value * 8 + u32::from(d - b'0');
                        }
                        (u8::try_from(value).ok()?, 4)
                    }
                    b'a' => (0x07, 2),
                    b'b' => (0x08, 2),
                    b't' => (b'\t', 2),
                    b'n' => (b'\n', 2),
                    b'v' => (0x0b, 2),
                    b'f' => (0x0c, 2),
                    b'r' => (b'\r', 2),
                    b'"' => (b'"', 2),
                    b'\\' => (b'\\', 2),
                    _ => return None,
                };
                out.push(byte);
                i += width;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git(text: &str) -> Vec<FileStatus> {
        parse_files(Dialect::Git, text)
    }

    fn hg(text: &str) -> Vec<FileStatus> {
        parse_files(Dialect::Hg, text)
    }

    #[test]
    fn test_empty_input() {
        assert!(git("").is_empty());
        assert!(hg("").is_empty());
        assert!(git("\n\n   \r\n").is_empty());
    }

    #[test]
    fn test_git_staged_modification() {
        let files = git("M  file.txt");
        assert_eq!(
            files,
            vec![FileStatus {
                name1: "file.txt".to_string(),
                name2: String::new(),
                file_state1: FileState::Modified,
                file_state2: FileState::Unmodified,
            }]
        );
        assert!(files[0].has_staged_change());
        assert!(!files[0].has_worktree_change());
    }

    #[test]
    fn test_git_worktree_modification() {
        let files = git(" M src/lib.rs\n");
        assert_eq!(files[0].file_state1, FileState::Unmodified);
        assert_eq!(files[0].file_state2, FileState::Modified);
        assert_eq!(files[0].name1, "src/lib.rs");
    }

    #[test]
    fn test_git_rename() {
        let files = git("R  old.txt -> new.txt");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name1, "old.txt");
        assert_eq!(files[0].name2, "new.txt");
        assert_eq!(files[0].file_state1, FileState::Renamed);
        assert!(files[0].is_rename_or_copy());
        assert_eq!(files[0].current_path(), "new.txt");
    }

    #[test]
    fn test_git_copy_with_worktree_edit() {
        let files = git("CM a.rs -> b.rs");
        assert_eq!(files[0].file_state1, FileState::Copied);
        assert_eq!(files[0].file_state2, FileState::Modified);
        assert_eq!((files[0].name1.as_str(), files[0].name2.as_str()), ("a.rs", "b.rs"));
    }

    #[test]
    fn test_git_untracked_and_ignored_fill_both_slots() {
        let files = git("?? notes.md\n!! target/\n");
        assert!(files[0].is_untracked());
        assert_eq!(files[0].file_state1, files[0].file_state2);
        assert!(files[1].is_ignored());
        assert_eq!(files[1].name1, "target/");
    }

    #[test]
    fn test_git_unmerged_combinations() {
        let files = git("UU both.txt\nAA added.txt\nDU gone.txt\n");
        assert_eq!(files[0].file_state1, FileState::UpdatedButUnmerged);
        assert_eq!(files[0].file_state2, FileState::UpdatedButUnmerged);
        assert_eq!(files[1].file_state1, FileState::Added);
        assert_eq!(files[2].file_state1, FileState::Deleted);
        assert_eq!(files[2].file_state2, FileState::UpdatedButUnmerged);
    }

    #[test]
    fn test_git_branch_header_skipped() {
        let files = git("## main...origin/main [ahead 1]\n D removed.txt\nT  link\n");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_state2, FileState::Deleted);
        assert_eq!(files[1].file_state1, FileState::TypeChanged);
    }

    #[test]
    fn test_git_quoted_paths() {
        let files = git("?? \"with space.txt\"\nA  \"caf\\303\\251.txt\"\n");
        assert_eq!(files[0].name1, "with space.txt");
        assert_eq!(files[1].name1, "café.txt");
    }

    #[test]
    fn test_git_quoted_rename_containing_separator() {
        let files = git("R  \"a -> b.txt\" -> \"tab\\there.txt\"");
        assert_eq!(files[0].name1, "a -> b.txt");
        assert_eq!(files[0].name2, "tab\there.txt");
    }

    #[test]
    fn test_git_malformed_quote_kept_raw() {
        let files = git("?? \"unterminated\n?? \"bad\\q\"\n");
        assert_eq!(files[0].name1, "\"unterminated");
        assert_eq!(files[1].name1, "\"bad\\q\"");
    }

    #[test]
    fn test_git_unknown_codes_degrade_to_unmodified() {
        let files = git("XZ mystery.bin");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_state1, FileState::Unmodified);
        assert_eq!(files[0].file_state2, FileState::Unmodified);
        assert_eq!(files[0].name1, "mystery.bin");
    }

    #[test]
    fn test_git_non_status_lines_skipped() {
        let files = git("fatal: not a git repository\nM\nMM \nM  kept.txt\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name1, "kept.txt");
    }

    #[test]
    fn test_crlf_line_endings() {
        let files = git("M  a.txt\r\n?? b.txt\r\n");
        assert_eq!(files[0].name1, "a.txt");
        assert_eq!(files[1].name1, "b.txt");
    }

    #[test]
    fn test_hg_single_column_fills_both_slots() {
        let files = hg("M a.txt\nA b.txt\nR c.txt\n! d.txt\n? e.txt\nI f.txt\nC g.txt\n");
        let states: Vec<_> = files.iter().map(|f| (f.file_state1, f.file_state2)).collect();
        assert_eq!(
            states,
            vec![
                (FileState::Modified, FileState::Modified),
                (FileState::Added, FileState::Added),
                (FileState::Deleted, FileState::Deleted),
                (FileState::Missing, FileState::Missing),
                (FileState::Untracked, FileState::Untracked),
                (FileState::Ignored, FileState::Ignored),
                (FileState::Unmodified, FileState::Unmodified),
            ]
        );
        assert!(files.iter().all(|f| f.name2.is_empty()));
    }

    #[test]
    fn test_hg_copy_source_folds_into_previous_record() {
        let files = hg("A copy.txt\n  original.txt\nM other.txt\n");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name1, "original.txt");
        assert_eq!(files[0].name2, "copy.txt");
        assert_eq!(files[0].file_state1, FileState::Copied);
        assert_eq!(files[0].file_state2, FileState::Added);
        assert_eq!(files[1].name1, "other.txt");
    }

    #[test]
    fn test_hg_orphan_copy_source_skipped() {
        assert!(hg("  original.txt\n").is_empty());
        let files = hg("M changed.txt\n  stray.txt\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name1, "changed.txt");
        assert!(files[0].name2.is_empty());
    }

    #[test]
    fn test_hg_does_not_split_arrows() {
        let files = hg("? weird -> name");
        assert_eq!(files[0].name1, "weird -> name");
        assert!(files[0].name2.is_empty());
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = [
            "\u{0}\u{1}\u{2}",
            "é",
            "éé",
            "éé é",
            "日本語のテキスト",
            "\"",
            "?? \"\\",
            "?? \"\\77",
            "?? \"\\777\"",
            "R  -> ",
            "R   -> b",
            "\t\t\t",
            "M",
            "M ",
        ];
        for input in inputs {
            let _ = git(input);
            let _ = hg(input);
        }
        let files = git("éé é");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name1, "é");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let text = "## main\nM  a\n?? b\nR  c -> d\n";
        assert_eq!(git(text), git(text));
        let parser = StatusParser::new(Dialect::Hg);
        assert_eq!(parser.parse_files("A x\n  y\n"), parser.parse_files("A x\n  y\n"));
        assert_eq!(parser.dialect(), Dialect::Hg);
    }

    #[test]
    fn test_display() {
        let file = FileStatus {
            name1: "old".to_string(),
            name2: "new".to_string(),
            file_state1: FileState::Renamed,
            file_state2: FileState::Unmodified,
        };
        let shown = file.to_string();
        assert!(shown.starts_with("renamed"));
        assert!(shown.ends_with("old -> new"));
    }
}
