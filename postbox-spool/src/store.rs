//! The on-disk message store: one directory per message state.

use std::{
    io,
    path::{Path, PathBuf},
};

use postbox_common::internal;
use serde::Deserialize;
use tokio::fs;

use crate::{
    error::{ComposeError, Result, SpoolError, ValidationError},
    message::{Email, MessageId},
};

/// Directory name for messages awaiting delivery.
const PENDING_DIR: &str = "outbox";
/// Directory name for delivered messages.
const SENT_DIR: &str = "sent";
/// Directory name for messages whose delivery failed.
const FAILED_DIR: &str = "failed";
/// Prefix for in-progress writes, excluded from enumeration.
const TMP_PREFIX: &str = ".tmp_";
/// Suffix a file must carry to count as a stored message.
const MESSAGE_SUFFIX: &str = ".eml";

/// Terminal classification of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The relay accepted the message.
    Sent,
    /// Delivery was attempted and failed.
    Failed,
}

impl Disposition {
    const fn dir_name(self) -> &'static str {
        match self {
            Self::Sent => SENT_DIR,
            Self::Failed => FAILED_DIR,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Owns the three state directories under a configured root and the
/// atomic transitions of messages between them.
///
/// Layout: `<root>/outbox` (pending), `<root>/sent`, `<root>/failed`.
/// A message exists in exactly one of the three at any time; transitions
/// are single renames, so there is no window in which a message is in
/// two places or in neither.
///
/// # Atomicity
///
/// Deposits write to a `.tmp_`-prefixed file first and rename into place
/// once complete, so a watcher on the pending directory never observes a
/// partial message.
#[derive(Debug, Clone)]
pub struct MessageStore {
    root: PathBuf,
    default_sender: Option<String>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/spool/postbox"),
            default_sender: None,
        }
    }
}

// Custom Deserialize implementation with root validation
impl<'de> Deserialize<'de> for MessageStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct MessageStoreHelper {
            root: PathBuf,
            #[serde(default)]
            default_sender: Option<String>,
        }

        let helper = MessageStoreHelper::deserialize(deserializer)?;
        Self::validate_root(&helper.root).map_err(serde::de::Error::custom)?;

        Ok(Self {
            root: helper.root,
            default_sender: helper.default_sender,
        })
    }
}

impl MessageStore {
    /// Create a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root fails validation; see
    /// [`Self::validate_root`] for the rules.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        Self::validate_root(&root)?;

        Ok(Self {
            root,
            default_sender: None,
        })
    }

    /// Set the sender applied to deposited emails that carry none.
    #[must_use]
    pub fn with_default_sender(mut self, sender: impl Into<String>) -> Self {
        self.default_sender = Some(sender.into());
        self
    }

    /// Validate an outbox root.
    ///
    /// Rejects paths containing `..` components, relative paths, and
    /// paths inside sensitive system directories.
    fn validate_root(root: &Path) -> std::result::Result<(), ValidationError> {
        for component in root.components() {
            if component == std::path::Component::ParentDir {
                return Err(ValidationError::ParentComponent(root.to_path_buf()));
            }
        }

        if !root.is_absolute() {
            return Err(ValidationError::NotAbsolute(root.to_path_buf()));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        for prefix in sensitive_prefixes {
            if root.starts_with(prefix) {
                return Err(ValidationError::SystemDirectory {
                    prefix,
                    path: root.to_path_buf(),
                });
            }
        }

        Ok(())
    }

    /// The directory holding messages awaiting delivery.
    #[must_use]
    pub fn pending_dir(&self) -> PathBuf {
        self.root.join(PENDING_DIR)
    }

    /// The directory holding delivered messages.
    #[must_use]
    pub fn sent_dir(&self) -> PathBuf {
        self.root.join(SENT_DIR)
    }

    /// The directory holding messages whose delivery failed.
    #[must_use]
    pub fn failed_dir(&self) -> PathBuf {
        self.root.join(FAILED_DIR)
    }

    /// The configured root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the store.
    ///
    /// Creates the three state directories if absent (with permissive
    /// mode, matching a world-writable spool convention) and removes
    /// stale temporary files left behind by interrupted deposits.
    /// Idempotent; call during application startup to fail fast on
    /// permission problems.
    ///
    /// # Errors
    ///
    /// - If a state directory cannot be created
    /// - If a state path exists but is not a directory
    pub fn init(&self) -> Result<()> {
        internal!("Initialising message store at {}", self.root.display());

        for dir in [self.pending_dir(), self.sent_dir(), self.failed_dir()] {
            ensure_directory(&dir)?;
        }

        self.cleanup_stale_temp_files()?;

        Ok(())
    }

    /// Remove `.tmp_` leftovers from incomplete deposits.
    ///
    /// Called during `init()`; a crash between the temporary write and
    /// the rename leaves debris that would otherwise accumulate. Live
    /// writers are unaffected because enumeration skips the prefix
    /// anyway.
    fn cleanup_stale_temp_files(&self) -> Result<()> {
        let entries = std::fs::read_dir(self.pending_dir())?;
        let mut cleaned = 0;

        for entry in entries {
            let entry = entry?;
            let filename = entry.file_name();

            if filename.to_string_lossy().starts_with(TMP_PREFIX) {
                std::fs::remove_file(entry.path())?;
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} stale temporary files from the outbox"
            );
        }

        Ok(())
    }

    /// List the messages currently awaiting delivery.
    ///
    /// Only files ending in `.eml` count; temporary files are skipped.
    /// Enumeration order is whatever the directory yields.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending directory cannot be read.
    pub async fn list_pending(&self) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(self.pending_dir()).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name();
            let name = filename.to_string_lossy();

            if name.ends_with(MESSAGE_SUFFIX) && !name.starts_with(TMP_PREFIX) {
                paths.push(entry.path());
            }
        }

        internal!(level = DEBUG, "Found {} pending messages", paths.len());

        Ok(paths)
    }

    /// Atomically reclassify a message into `sent` or `failed`.
    ///
    /// The basename is preserved; only the containing directory changes.
    /// Returns the message's new path.
    ///
    /// # Errors
    ///
    /// Fails if the source no longer exists (it raced with an external
    /// deleter) or the rename itself fails. Either way the error carries
    /// the message path for diagnosis.
    pub async fn move_to(&self, path: &Path, state: Disposition) -> Result<PathBuf> {
        let basename = path.file_name().ok_or_else(|| SpoolError::Move {
            path: path.to_path_buf(),
            state,
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no basename"),
        })?;

        let target = self.root.join(state.dir_name()).join(basename);

        fs::rename(path, &target)
            .await
            .map_err(|source| SpoolError::Move {
                path: path.to_path_buf(),
                state,
                source,
            })?;

        internal!(level = DEBUG, "Moved {} to {state}", path.display());

        Ok(target)
    }

    /// Serialize an email into the pending directory.
    ///
    /// The sender is the email's own if set, else the store's configured
    /// default. Content is written to a temporary file and renamed into
    /// place, so the watcher never observes a partial message.
    ///
    /// # Errors
    ///
    /// - If no sender can be resolved
    /// - If the write or rename fails
    pub async fn deposit(&self, email: &Email) -> Result<MessageId> {
        let sender = email
            .sender()
            .or(self.default_sender.as_deref())
            .ok_or(ComposeError::MissingSender)?;

        let id = MessageId::generate();
        let filename = id.filename();
        let pending = self.pending_dir();
        let final_path = pending.join(&filename);

        if fs::try_exists(&final_path).await.unwrap_or(false) {
            return Err(SpoolError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("message id collision: {id}"),
            )));
        }

        let temp_path = pending.join(format!("{TMP_PREFIX}{filename}"));

        fs::write(&temp_path, email.to_rfc5322(sender)).await?;
        fs::rename(&temp_path, &final_path).await?;

        internal!(level = DEBUG, "Deposited message {id} into the outbox");

        Ok(id)
    }
}

/// Create `path` (and parents) if absent.
///
/// New directories get mode `0o777` before umask on Unix, the
/// traditional world-writable spool arrangement that lets unprivileged
/// producers deposit messages.
fn ensure_directory(path: &Path) -> Result<()> {
    if path.try_exists()? {
        if path.is_dir() {
            return Ok(());
        }
        return Err(ValidationError::NotADirectory(path.to_path_buf()).into());
    }

    internal!("{} does not exist, creating...", path.display());

    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }

    builder.create(path)?;

    Ok(())
}
