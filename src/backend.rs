//! Collaborators backed by the local machine.
//!
//! There is no window here: dropped paths arrive on the command line, and
//! the picker dialogs are answered from flags and configuration.

use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use ncmdrop_queue::backend::{Dialogs, Dumper, Enumerator, Notifier};
use ncmdrop_queue::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::pin::pin;
use tokio::fs;

/// Whether `path` ends in one of `extensions`, ignoring case.
fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn into_string(path: PathBuf) -> Option<String> {
    match path.into_os_string().into_string() {
        Ok(path) => Some(path),
        Err(path) => {
            tracing::warn!(path = ?path, "Skipping path that is not valid UTF-8");
            None
        },
    }
}

/// Expands dropped paths by walking the local filesystem.
pub struct LocalEnumerator {
    extensions: Vec<String>,
}

impl LocalEnumerator {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// Lazily yield every matching file at or below `root`.
    ///
    /// Files come out in path order, each directory's entries sorted by name
    /// and visited depth first. Only a missing or unreadable `root` is an
    /// error; unreadable subdirectories are logged and skipped. Symlinked
    /// directories are not followed.
    pub fn walk(&self, root: PathBuf) -> impl Stream<Item = Result<PathBuf>> + Send + '_ {
        stream! {
            let metadata = match fs::metadata(&root).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(path = %root.display(), error = %err, "Cannot stat dropped path");
                    yield Err(exn::Exn::from(ErrorKind::Enumeration(root.display().to_string())));
                    return;
                },
            };
            if !metadata.is_dir() {
                if has_extension(&root, &self.extensions) {
                    yield Ok(root);
                }
                return;
            }

            // The flag marks paths already known to be directories.
            let mut pending = vec![(root, true)];
            while let Some((path, known_dir)) = pending.pop() {
                let is_dir = known_dir || match fs::symlink_metadata(&path).await {
                    Ok(metadata) => metadata.is_dir(),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                        continue;
                    },
                };
                if !is_dir {
                    if has_extension(&path, &self.extensions) {
                        yield Ok(path);
                    }
                    continue;
                }

                let mut entries = match fs::read_dir(&path).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable directory");
                        continue;
                    },
                };
                let mut children = Vec::new();
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => children.push(entry.path()),
                        Ok(None) => break,
                        Err(err) => {
                            tracing::warn!(path = %path.display(), error = %err, "Directory listing cut short");
                            break;
                        },
                    }
                }
                // Descending, so the smallest name is popped first.
                children.sort_unstable_by(|a, b| b.cmp(a));
                pending.extend(children.into_iter().map(|child| (child, false)));
            }
        }
    }
}

#[async_trait]
impl Enumerator for LocalEnumerator {
    async fn enumerate(&self, path: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut walk = pin!(self.walk(PathBuf::from(path)));
        while let Some(file) = walk.next().await {
            files.extend(into_string(file?));
        }
        Ok(files)
    }
}

/// Decodes NCM files on the blocking thread pool.
pub struct NcmDumper;

#[async_trait]
impl Dumper for NcmDumper {
    async fn dump(&self, file: &str, output_dir: &str) -> Result<()> {
        let (input, output) = (PathBuf::from(file), PathBuf::from(output_dir));
        let dumped = tokio::task::spawn_blocking(move || ncmdrop_ncm::dump(&input, &output))
            .await
            .or_raise(|| ErrorKind::Dump(file.to_string()))?
            .or_raise(|| ErrorKind::Dump(file.to_string()))?;
        tracing::info!(
            file,
            audio = %dumped.audio.display(),
            cover = dumped.cover.is_some(),
            "Dumped"
        );
        Ok(())
    }
}

/// Picker dialogs with answers fixed up front.
///
/// The file picker is treated as dismissed when no files were given, and
/// otherwise only offers files with an accepted extension, as a native
/// picker's filter would.
pub struct PresetDialogs {
    files: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl PresetDialogs {
    pub fn new(files: Vec<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        Self { files, output_dir }
    }
}

#[async_trait]
impl Dialogs for PresetDialogs {
    async fn pick_files(&self, extensions: &[String]) -> Option<Vec<String>> {
        if self.files.is_empty() {
            return None;
        }
        let picked = self
            .files
            .iter()
            .filter(|file| {
                let accepted = has_extension(file, extensions);
                if !accepted {
                    tracing::warn!(file = %file.display(), "Ignoring file with an unexpected extension");
                }
                accepted
            })
            .filter_map(|file| into_string(file.clone()))
            .collect();
        Some(picked)
    }

    async fn pick_directory(&self) -> Option<String> {
        self.output_dir.clone().and_then(into_string)
    }
}

/// Prints the completion message on stdout.
pub struct LogNotifier;

impl LogNotifier {
    fn line(text: &str, title: &str) -> String {
        format!("{title}: {text}")
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str, title: &str) {
        tracing::debug!(title, "{text}");
        println!("{}", Self::line(text, title));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs as std_fs;

    fn extensions() -> Vec<String> {
        vec!["ncm".to_string()]
    }

    fn touch(root: &Path, relative: &str) -> String {
        let path = root.join(relative);
        std_fs::create_dir_all(path.parent().unwrap()).unwrap();
        std_fs::write(&path, b"").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[rstest]
    #[case("a.ncm", true)]
    #[case("A.NcM", true)]
    #[case("a.ncm.mp3", false)]
    #[case("ncm", false)]
    #[case(".ncm", false)]
    fn test_has_extension(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(has_extension(Path::new(path), &extensions()), expected);
    }

    #[tokio::test]
    async fn test_enumerate_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.ncm");
        let a_inner = touch(dir.path(), "a/z.NCM");
        let a_deep = touch(dir.path(), "a/deep/x.ncm");
        touch(dir.path(), "a/cover.jpg");
        let c = touch(dir.path(), "c.ncm");
        std_fs::create_dir(dir.path().join("empty")).unwrap();

        let enumerator = LocalEnumerator::new(extensions());
        let files = enumerator.enumerate(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(files, vec![a_deep, a_inner, b, c]);
    }

    #[tokio::test]
    async fn test_enumerate_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let song = touch(dir.path(), "song.ncm");
        let other = touch(dir.path(), "song.flac");
        let enumerator = LocalEnumerator::new(extensions());
        assert_eq!(enumerator.enumerate(&song).await.unwrap(), vec![song.clone()]);
        assert!(enumerator.enumerate(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enumerate_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = LocalEnumerator::new(extensions()).enumerate(missing.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Enumeration(_)));
    }

    #[tokio::test]
    async fn test_dumper_wraps_decoder_errors() {
        let dir = tempfile::tempdir().unwrap();
        let fake = touch(dir.path(), "fake.ncm");
        let err = NcmDumper.dump(&fake, dir.path().to_str().unwrap()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Dump(fake));
    }

    #[tokio::test]
    async fn test_preset_dialogs() {
        let dialogs = PresetDialogs::new(
            vec![PathBuf::from("/music/one.ncm"), PathBuf::from("/music/two.mp3")],
            Some(PathBuf::from("/out")),
        );
        assert_eq!(dialogs.pick_files(&extensions()).await, Some(vec!["/music/one.ncm".to_string()]));
        assert_eq!(dialogs.pick_directory().await.as_deref(), Some("/out"));

        let dismissed = PresetDialogs::new(vec![], None);
        assert_eq!(dismissed.pick_files(&extensions()).await, None);
        assert_eq!(dismissed.pick_directory().await, None);
    }

    #[tokio::test]
    async fn test_notifier_line() {
        assert_eq!(LogNotifier::line("All files have been dumped.", "Done"), "Done: All files have been dumped.");
        LogNotifier.notify("All files have been dumped.", "Done").await;
    }
}
