use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub fn get_version_string() -> String {
    format!("{}-{}", env!("GIT_COUNT"), env!("GIT_HASH"))
}

/// Ordered list of directories searched for helper executables: the
/// configured prefix first, then the entries of a `PATH`-style value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    directories: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(prefix: Vec<PathBuf>, path_var: Option<&OsStr>) -> Self {
        let mut directories = prefix;
        if let Some(path_var) = path_var {
            directories.extend(std::env::split_paths(path_var).filter(|p| !p.as_os_str().is_empty()));
        }
        SearchPath { directories }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// First candidate that is a regular file with an execute bit set.
    pub fn find(&self, filename: &str) -> Option<PathBuf> {
        self.directories
            .iter()
            .map(|dir| dir.join(filename))
            .find(|candidate| is_executable(candidate))
    }
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self
            .directories
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        f.write_str(&joined.join(":"))
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn prefix_comes_before_path_var() {
        let search = SearchPath::new(
            vec![PathBuf::from("/opt/vmware/bin")],
            Some(OsStr::new("/usr/bin:/bin")),
        );
        assert_eq!(
            search.directories(),
            &[
                PathBuf::from("/opt/vmware/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin")
            ]
        );
        assert_eq!(search.to_string(), "/opt/vmware/bin:/usr/bin:/bin");
    }

    #[test]
    fn empty_entries_are_dropped() {
        let search = SearchPath::new(Vec::new(), Some(OsStr::new("/usr/bin::")));
        assert_eq!(search.directories(), &[PathBuf::from("/usr/bin")]);
        assert!(SearchPath::new(Vec::new(), None).directories().is_empty());
    }

    #[test]
    fn first_match_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(second.path(), "vmware-rpctool", 0o755);
        let expected = touch(first.path(), "vmware-rpctool", 0o755);

        let search = SearchPath::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            None,
        );
        assert_eq!(search.find("vmware-rpctool"), Some(expected));
    }

    #[test]
    fn non_executable_files_are_skipped() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(first.path(), "vmware-rpctool", 0o644);
        let expected = touch(second.path(), "vmware-rpctool", 0o700);

        let search = SearchPath::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            None,
        );
        assert_eq!(search.find("vmware-rpctool"), Some(expected));
    }

    #[test]
    fn directories_do_not_match() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("vmware-rpctool")).unwrap();
        let search = SearchPath::new(vec![dir.path().to_path_buf()], None);
        assert_eq!(search.find("vmware-rpctool"), None);
    }
}
