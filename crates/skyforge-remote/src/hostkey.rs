//! Host key verification
//!
//! Replaces blind host-key acceptance with an explicit policy backed by a
//! small known-hosts store. The store keeps one `host fingerprint` line per
//! host; only this daemon reads it, so the OpenSSH known_hosts format is
//! not needed.

use crate::error::{RemoteError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// How presented host keys are judged.
#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    /// Verify against the store; an unknown host is an error.
    KnownHosts(PathBuf),
    /// Record the fingerprint on first contact; a changed key is still fatal.
    TrustOnFirstUse(PathBuf),
    /// Accept anything. For throwaway test environments only.
    InsecureAcceptAny,
}

impl HostKeyPolicy {
    /// Judge `fingerprint` as presented by `host`.
    pub fn verify(&self, host: &str, fingerprint: &str) -> Result<()> {
        match self {
            HostKeyPolicy::KnownHosts(path) => {
                let store = KnownHostsStore::new(path);
                match store.lookup(host)? {
                    Some(known) if known == fingerprint => Ok(()),
                    Some(known) => Err(RemoteError::HostKeyMismatch {
                        host: host.to_string(),
                        known,
                        presented: fingerprint.to_string(),
                    }),
                    None => Err(RemoteError::UnknownHostKey {
                        host: host.to_string(),
                        fingerprint: fingerprint.to_string(),
                    }),
                }
            }
            HostKeyPolicy::TrustOnFirstUse(path) => {
                let store = KnownHostsStore::new(path);
                match store.lookup(host)? {
                    Some(known) if known == fingerprint => Ok(()),
                    Some(known) => Err(RemoteError::HostKeyMismatch {
                        host: host.to_string(),
                        known,
                        presented: fingerprint.to_string(),
                    }),
                    None => {
                        tracing::warn!(%host, %fingerprint, "recording host key on first contact");
                        store.record(host, fingerprint)?;
                        Ok(())
                    }
                }
            }
            HostKeyPolicy::InsecureAcceptAny => {
                tracing::warn!(%host, "host key verification disabled");
                Ok(())
            }
        }
    }
}

/// File-backed fingerprint store.
pub struct KnownHostsStore {
    path: PathBuf,
}

impl KnownHostsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Find the stored fingerprint for `host`, if any.
    pub fn lookup(&self, host: &str) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            if fields.next() == Some(host) {
                if let Some(fingerprint) = fields.next() {
                    return Ok(Some(fingerprint.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Append a `host fingerprint` entry.
    pub fn record(&self, host: &str, fingerprint: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut contents = if self.path.exists() {
            fs::read_to_string(&self.path)?
        } else {
            String::new()
        };
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&format!("{host} {fingerprint}\n"));
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("known_hosts")
    }

    #[test]
    fn record_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnownHostsStore::new(store_path(&dir));

        store.record("203.0.113.5", "SHA256:abc").unwrap();
        store.record("203.0.113.6", "SHA256:def").unwrap();

        assert_eq!(
            store.lookup("203.0.113.5").unwrap().as_deref(),
            Some("SHA256:abc")
        );
        assert_eq!(store.lookup("203.0.113.9").unwrap(), None);
    }

    #[test]
    fn known_hosts_rejects_unknown_host() {
        let dir = tempfile::tempdir().unwrap();
        let policy = HostKeyPolicy::KnownHosts(store_path(&dir));

        let err = policy.verify("203.0.113.5", "SHA256:abc").unwrap_err();
        assert!(matches!(err, RemoteError::UnknownHostKey { .. }));
    }

    #[test]
    fn known_hosts_accepts_matching_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        KnownHostsStore::new(&path)
            .record("203.0.113.5", "SHA256:abc")
            .unwrap();

        let policy = HostKeyPolicy::KnownHosts(path);
        policy.verify("203.0.113.5", "SHA256:abc").unwrap();
    }

    #[test]
    fn changed_key_is_fatal_under_every_store_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        KnownHostsStore::new(&path)
            .record("203.0.113.5", "SHA256:abc")
            .unwrap();

        for policy in [
            HostKeyPolicy::KnownHosts(path.clone()),
            HostKeyPolicy::TrustOnFirstUse(path.clone()),
        ] {
            let err = policy.verify("203.0.113.5", "SHA256:zzz").unwrap_err();
            assert!(matches!(err, RemoteError::HostKeyMismatch { .. }));
        }
    }

    #[test]
    fn trust_on_first_use_records_and_pins() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_path(&dir);
        let policy = HostKeyPolicy::TrustOnFirstUse(path.clone());

        policy.verify("203.0.113.5", "SHA256:abc").unwrap();
        // Second contact with the same key passes, a different key does not.
        policy.verify("203.0.113.5", "SHA256:abc").unwrap();
        assert!(policy.verify("203.0.113.5", "SHA256:zzz").is_err());
    }

    #[test]
    fn accept_any_accepts() {
        HostKeyPolicy::InsecureAcceptAny
            .verify("203.0.113.5", "SHA256:whatever")
            .unwrap();
    }
}
