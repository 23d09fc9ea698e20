use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::config::settings::Settings;
use crate::models::comment::Comment;
use crate::models::ticket::TicketRef;

type CommentMap = BTreeMap<String, Vec<Comment>>;

/// Durable cache of optimistically-written comments, keyed by ticket
/// reference. The whole map is one JSON blob; every append reads it,
/// mutates it, and rewrites it. Storage failures are logged and swallowed:
/// the store must never be the reason a user-facing operation fails.
pub struct LocalCommentStore {
    path: PathBuf,
    // The runtime is multi-threaded, so the read-modify-write cycle needs
    // serializing; interleaved appends would lose updates.
    lock: Mutex<()>,
}

impl LocalCommentStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(Settings::store_path()?))
    }

    /// Comments recorded for a ticket, oldest first. Absent ticket, absent
    /// file, and unparseable file all read as empty.
    pub fn load(&self, ticket: &TicketRef) -> Vec<Comment> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_map()
            .remove(ticket.as_str())
            .unwrap_or_default()
    }

    pub fn append(&self, ticket: &TicketRef, comment: Comment) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map();
        map.entry(ticket.as_str().to_string())
            .or_default()
            .push(comment);
        if let Err(err) = self.write_map(&map) {
            warn!(path = %self.path.display(), error = %err, "could not persist local comment");
        }
    }

    fn read_map(&self) -> CommentMap {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return CommentMap::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read local comment store");
                return CommentMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "local comment store is corrupt, treating as empty");
                CommentMap::new()
            }
        }
    }

    fn write_map(&self, map: &CommentMap) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_string(map)?;
        std::fs::write(&self.path, blob)?;
        Ok(())
    }
}
