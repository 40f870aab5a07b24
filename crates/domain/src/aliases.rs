//! `HOSTALIASES` file: `alias canonical-name` per line, consulted for single-label names.

use crate::errors::DomainError;
use crate::wire::name::{names_eq, trim_root};
use std::path::Path;

/// Environment variable naming the alias file.
pub const HOSTALIASES_ENV: &str = "HOSTALIASES";

#[derive(Debug, Clone, Default)]
pub struct HostAliases {
    entries: Vec<(String, String)>,
}

impl HostAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DomainError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Lines with fewer than two words are skipped; extra words are ignored.
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .filter_map(|line| {
                let mut words = line.split('#').next().unwrap_or("").split_whitespace();
                let alias = words.next()?;
                let target = words.next()?;
                Some((alias.to_string(), trim_root(target).to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn add(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.entries.push((alias.into(), target.into()));
    }

    /// First target listed for `name`, compared case-insensitively.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(alias, _)| names_eq(alias, name))
            .map(|(_, target)| target.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_short_lines() {
        let aliases = HostAliases::parse("# mine\nwiki  wiki.corp.example.\nlonely\nMail mx.example # primary\n");
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases.lookup("wiki"), Some("wiki.corp.example"));
        assert_eq!(aliases.lookup("MAIL"), Some("mx.example"));
        assert_eq!(aliases.lookup("lonely"), None);
    }
}
