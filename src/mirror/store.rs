use crate::mirror::gc;
use crate::mirror::index::{content_hash, ContentHashIndex, RedirectAliasIndex};
use crate::mirror::path::filename_for_url;
use crate::mirror::{MirrorError, MirrorStats};
use chrono::{DateTime, FixedOffset, Local, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use url::Url;

/// Sentinel file recording when the last full run started
pub const ARCHIVE_MARKER: &str = ".archive";

/// What [`MirrorStore::save`] did with a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The body was written to disk
    Written,

    /// The file was hard-linked to an earlier file with identical content
    Linked,

    /// The file on disk was already up to date
    Skipped,
}

/// Content-addressed mirror directory
///
/// One store covers one run: its checksum index, alias index and the set of
/// files seen start out empty, while the directory itself persists between
/// runs.
#[derive(Debug)]
pub struct MirrorStore {
    root: PathBuf,
    hashes: ContentHashIndex,
    aliases: RedirectAliasIndex,

    /// Saved URL -> (file path, media type)
    saved: HashMap<String, (PathBuf, Option<String>)>,

    files_seen: HashSet<PathBuf>,
    stats: MirrorStats,
    track_trailing_slash_redirects: bool,
}

impl MirrorStore {
    /// Opens (and creates, if needed) the mirror directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self, MirrorError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| MirrorError::CreateDir {
            path: root.to_path_buf(),
            source,
        })?;
        let root = fs::canonicalize(root).map_err(|source| MirrorError::Read {
            path: root.to_path_buf(),
            source,
        })?;

        Ok(Self {
            root,
            hashes: ContentHashIndex::default(),
            aliases: RedirectAliasIndex::default(),
            saved: HashMap::new(),
            files_seen: HashSet::new(),
            stats: MirrorStats::default(),
            track_trailing_slash_redirects: false,
        })
    }

    /// Also alias `/dir` to `/dir/` when the server adds a trailing slash
    pub fn set_track_trailing_slash_redirects(&mut self, track: bool) {
        self.track_trailing_slash_redirects = track;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> MirrorStats {
        self.stats
    }

    pub fn files_seen(&self) -> &HashSet<PathBuf> {
        &self.files_seen
    }

    pub fn hashes(&self) -> &ContentHashIndex {
        &self.hashes
    }

    pub fn aliases(&self) -> &RedirectAliasIndex {
        &self.aliases
    }

    /// Returns the absolute file path for a URL
    pub fn path_for(&self, url: &Url, content_type: Option<&str>) -> PathBuf {
        let name = filename_for_url(url, content_type);
        self.root.join(name.trim_start_matches('/'))
    }

    /// Writes the `.archive` sentinel with the run's start time
    pub fn write_archive_marker(&self, started: DateTime<Local>) -> Result<(), MirrorError> {
        let path = self.root.join(ARCHIVE_MARKER);
        fs::write(&path, started.format("%Y-%m-%d %H:%M").to_string())
            .map_err(|source| MirrorError::Write { path, source })
    }

    /// Records that `from` redirected to `to`
    ///
    /// Both URLs must be on the mirrored host. If `to` was already saved in
    /// this run, the alias is created right away; otherwise it is created when
    /// `to` is saved. Returns false when the redirect is not tracked.
    pub fn record_redirect(&mut self, from: &Url, to: &Url) -> bool {
        if from == to {
            return false;
        }
        if !self.track_trailing_slash_redirects && is_trailing_slash_redirect(from, to) {
            tracing::debug!("Not aliasing trailing slash redirect {} -> {}", from, to);
            return false;
        }

        self.aliases.record(from, to);

        if let Some((canonical, content_type)) = self.saved.get(to.as_str()).cloned() {
            self.create_aliases(to, content_type.as_deref(), &canonical);
        }
        true
    }

    /// Saves a document and refreshes the aliases pointing at it
    ///
    /// # Write Decision
    ///
    /// 1. If the file exists, `Last-Modified` is not newer than its mtime and
    ///    the size matches, the write is skipped
    /// 2. Otherwise, if the existing file has the same checksum, it is skipped
    /// 3. Otherwise, if an earlier path of this run holds identical content,
    ///    the file becomes a hard link to it
    /// 4. Otherwise the body is written
    ///
    /// After a write or link the mtime is set to `Last-Modified`, if given.
    pub fn save(
        &mut self,
        url: &Url,
        content_type: Option<&str>,
        body: &[u8],
        last_modified: Option<DateTime<FixedOffset>>,
    ) -> Result<SaveOutcome, MirrorError> {
        let path = self.path_for(url, content_type);
        self.files_seen.insert(path.clone());
        self.saved.insert(
            url.as_str().to_string(),
            (path.clone(), content_type.map(str::to_string)),
        );

        let outcome = self.save_file(&path, body, last_modified);
        match &outcome {
            Ok(SaveOutcome::Written) => self.stats.written += 1,
            Ok(SaveOutcome::Linked) => self.stats.linked += 1,
            Ok(SaveOutcome::Skipped) => self.stats.skipped += 1,
            Err(_) => self.stats.errors += 1,
        }

        self.create_aliases(url, content_type, &path);
        outcome
    }

    /// Deletes every file of earlier runs that this run did not reach
    pub fn collect_garbage(&mut self) -> Result<Vec<PathBuf>, MirrorError> {
        let deleted = gc::collect_garbage(&self.root, &self.files_seen)?;
        self.stats.deleted += deleted.len();
        Ok(deleted)
    }

    fn save_file(
        &mut self,
        path: &Path,
        body: &[u8],
        last_modified: Option<DateTime<FixedOffset>>,
    ) -> Result<SaveOutcome, MirrorError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| MirrorError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let hash = content_hash(body);
        let link_source = {
            let paths = self.hashes.register(&hash, path);
            paths
                .first()
                .filter(|first| paths.len() > 1 && first.as_path() != path && first.exists())
                .cloned()
        };

        if is_unchanged(path, body, &hash, last_modified)? {
            tracing::info!("File already exists: {}", path.display());
            if let Some(modified) = last_modified {
                set_mtime(path, modified);
            }
            return Ok(SaveOutcome::Skipped);
        }

        // Replace rather than truncate, so hard-linked siblings keep their content
        remove_existing(path)?;

        let outcome = match link_source {
            Some(source) => match fs::hard_link(&source, path) {
                Ok(()) => {
                    tracing::info!(
                        "{} created as link to {} because of identical content",
                        path.display(),
                        source.display()
                    );
                    SaveOutcome::Linked
                }
                Err(e) => {
                    let error = MirrorError::Link {
                        path: path.to_path_buf(),
                        target: source,
                        source: e,
                    };
                    tracing::warn!("{}; writing content instead", error);
                    write_file(path, body)?;
                    SaveOutcome::Written
                }
            },
            None => {
                write_file(path, body)?;
                tracing::info!("File saved: {}", path.display());
                SaveOutcome::Written
            }
        };

        if let Some(modified) = last_modified {
            set_mtime(path, modified);
        }
        Ok(outcome)
    }

    fn create_aliases(&mut self, target: &Url, content_type: Option<&str>, canonical: &Path) {
        let aliases = self.aliases.get(target).to_vec();
        for alias in aliases {
            let alias_path = self.path_for(&alias, content_type);
            if alias_path == canonical {
                continue;
            }
            // Never replace a directory holding files of this run
            if self
                .files_seen
                .iter()
                .any(|seen| seen != &alias_path && seen.starts_with(&alias_path))
            {
                tracing::debug!(
                    "Not aliasing {} to {}: directory holds mirrored files",
                    alias_path.display(),
                    canonical.display()
                );
                continue;
            }
            self.files_seen.insert(alias_path.clone());

            match link_alias(&alias_path, canonical) {
                Ok(true) => {
                    self.stats.symlinked += 1;
                    tracing::info!(
                        "{} created as symlink to {} because of redirect",
                        alias_path.display(),
                        canonical.display()
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    self.stats.errors += 1;
                    tracing::warn!("Inconsistent alias {}: {}", alias_path.display(), e);
                }
            }
        }
    }
}

/// True for `/dir` -> `/dir/` on the same host and query
fn is_trailing_slash_redirect(from: &Url, to: &Url) -> bool {
    from.host_str() == to.host_str()
        && from.query() == to.query()
        && to.path().strip_suffix('/') == Some(from.path())
}

fn is_unchanged(
    path: &Path,
    body: &[u8],
    hash: &str,
    last_modified: Option<DateTime<FixedOffset>>,
) -> Result<bool, MirrorError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(MirrorError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !meta.is_file() {
        return Ok(false);
    }

    if let (Some(modified), Ok(mtime)) = (last_modified, meta.modified()) {
        let mtime = DateTime::<Utc>::from(mtime);
        if modified.timestamp() <= mtime.timestamp() && meta.len() == body.len() as u64 {
            return Ok(true);
        }
    }

    let existing = fs::read(path).map_err(|source| MirrorError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let unchanged = content_hash(&existing) == hash;
    if unchanged {
        tracing::debug!("{} not saved because checksum has not changed", path.display());
    }
    Ok(unchanged)
}

fn remove_existing(path: &Path) -> Result<(), MirrorError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path).map_err(|source| MirrorError::Remove {
            path: path.to_path_buf(),
            source,
        }),
        _ => Ok(()),
    }
}

fn write_file(path: &Path, body: &[u8]) -> Result<(), MirrorError> {
    fs::write(path, body).map_err(|source| MirrorError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    let actual = fs::metadata(path)
        .map_err(|source| MirrorError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if actual != body.len() as u64 {
        return Err(MirrorError::ShortWrite {
            path: path.to_path_buf(),
            expected: body.len() as u64,
            actual,
        });
    }
    Ok(())
}

fn set_mtime(path: &Path, modified: DateTime<FixedOffset>) {
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(SystemTime::from(modified)));
    if let Err(e) = result {
        tracing::warn!("Could not set modification time of {}: {}", path.display(), e);
    }
}

/// Points `alias` at `canonical` with a relative symlink
///
/// Returns false if the correct symlink was already in place.
fn link_alias(alias: &Path, canonical: &Path) -> Result<bool, MirrorError> {
    let Some(parent) = alias.parent() else {
        return Ok(false);
    };
    let target = pathdiff::diff_paths(canonical, parent).unwrap_or_else(|| canonical.to_path_buf());

    let remove_error = |source| MirrorError::Remove {
        path: alias.to_path_buf(),
        source,
    };
    match fs::symlink_metadata(alias) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(alias).ok().as_deref() == Some(target.as_path()) {
                return Ok(false);
            }
            fs::remove_file(alias).map_err(remove_error)?;
        }
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(alias).map_err(remove_error)?,
        Ok(_) => fs::remove_file(alias).map_err(remove_error)?,
        Err(_) => {}
    }

    fs::create_dir_all(parent).map_err(|source| MirrorError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;
    symlink(&target, alias).map_err(|source| MirrorError::Symlink {
        path: alias.to_path_buf(),
        source,
    })?;
    Ok(true)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
