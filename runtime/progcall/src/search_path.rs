///
/// # Module Search Path
///
/// An ordered list of existing directories built once from a path-separator
/// delimited string. Order is search order. Entries naming anything other
/// than an existing directory are dropped silently, and a directory listed
/// twice keeps only its first position.
///

use std::path::{Path, PathBuf};

use crate::settings::PATH_SEPARATOR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<String>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(path_list: &str) -> Self {
        Self::parse_with_separator(path_list, PATH_SEPARATOR)
    }

    pub fn parse_with_separator(path_list: &str, separator: char) -> Self {
        let mut dirs: Vec<String> = Vec::new();

        for token in path_list.split(separator) {
            if token.is_empty() || !Path::new(token).is_dir() {
                continue;
            }
            if dirs.iter().any(|d| d == token) {
                continue;
            }
            dirs.push(token.to_string());
        }

        Self { dirs }
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// `dir/<file_name>` for every entry, in search order.
    pub fn candidates<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.dirs.iter().map(move |dir| Path::new(dir).join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn s(p: &Path) -> String {
        p.to_string_lossy().into_owned()
    }

    #[test]
    fn test_dedup_and_drop_missing() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let missing = temp.path().join("missing");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();

        let list = [s(&a), s(&a), s(&missing), s(&b)].join(&PATH_SEPARATOR.to_string());
        let path = SearchPath::parse(&list);

        assert_eq!(path.dirs(), &[s(&a), s(&b)]);
    }

    #[test]
    fn test_files_are_not_directories() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let path = SearchPath::parse(&s(&file));
        assert!(path.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("z");
        let second = temp.path().join("a");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let list = format!("{}{}{}", s(&first), PATH_SEPARATOR, s(&second));
        let path = SearchPath::parse(&list);

        assert_eq!(path.len(), 2);
        assert_eq!(path.dirs()[0], s(&first));
        assert_eq!(path.dirs()[1], s(&second));
    }

    #[test]
    fn test_candidates() {
        let temp = TempDir::new().unwrap();
        let path = SearchPath::parse(&s(temp.path()));

        let candidates: Vec<PathBuf> = path.candidates("PROG.so").collect();
        assert_eq!(candidates, vec![temp.path().join("PROG.so")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(SearchPath::parse_with_separator("", ':').is_empty());
        assert!(SearchPath::parse_with_separator("::", ':').is_empty());
    }
}
