//! Restricted read-only access to packaged block resources.
//!
//! # Invariants
//! - Only paths under `public/` are served.
//! - A path with any dot-prefixed segment (`/.`) is refused, which covers
//!   both `..` traversal and hidden files.
//! - Refusals are logged with the path; file contents never are.

use crate::error::{ResourceError, ResourceResult};
use log::warn;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;

pub const PUBLIC_PREFIX: &str = "public/";

/// Rejects any `uri` outside the public resource area.
pub fn check_local_resource_path(uri: &str) -> ResourceResult<()> {
    let reason = if !uri.starts_with(PUBLIC_PREFIX) {
        Some("only public/ resources may be opened")
    } else if uri.contains("/.") {
        Some("dot-prefixed path segments are not allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => {
            warn!(
                "event=resource_open module=resources status=denied path={:?}",
                uri
            );
            Err(ResourceError::Disallowed {
                path: uri.to_string(),
                reason,
            })
        }
        None => Ok(()),
    }
}

/// Package-relative file lookup for one block class.
pub trait LocalResources: Send + Sync {
    fn open(&self, path: &str) -> ResourceResult<Box<dyn Read + Send>>;
}

/// Resources served from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LocalResources for DirectoryResources {
    fn open(&self, path: &str) -> ResourceResult<Box<dyn Read + Send>> {
        check_local_resource_path(path)?;
        match File::open(self.root.join(path)) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ResourceError::NotFound(path.to_string()))
            }
            Err(source) => Err(ResourceError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
