//! Media loaders: background fetching of manifest-referenced resources.
//!
//! A loader starts a fetch and reports the outcome on the shared
//! [`MediaEventQueue`]; it never touches playback state. The HTTP loader
//! talks to the broadcast server (`GET /generated/<file>`,
//! `GET /media/<file>`); the filesystem loader serves the same layout from a
//! local directory. Each outstanding fetch runs on its own named thread —
//! fetch counts are bounded by the manifest, not by user input.

use std::io;
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::Sender;
use log::{debug, trace};

use crate::core::events::MediaEvent;
use crate::core::manifest::{ManifestError, MediaRef, RawManifest};

/// Starts asynchronous loads for media resources.
pub trait MediaLoader: Send {
    /// Begin fetching `media`; the completion (tagged with `token`) lands on
    /// `tx` and is drained on a later tick.
    fn request(&self, id: &str, media: &MediaRef, token: u64, tx: Sender<MediaEvent>);
}

/// Join a server base URL with a manifest resource path.
fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

// ========== HTTP ==========

/// Fetches resources from the broadcast server with `ureq`.
pub struct HttpLoader {
    base: String,
    agent: ureq::Agent,
}

impl HttpLoader {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            agent: ureq::agent(),
        }
    }
}

impl MediaLoader for HttpLoader {
    fn request(&self, id: &str, media: &MediaRef, token: u64, tx: Sender<MediaEvent>) {
        let url = join_url(&self.base, &media.source_path);
        let id = id.to_string();
        let agent = self.agent.clone();
        trace!("fetch #{} {} -> {}", token, id, url);

        let spawn_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("nexcast-fetch-{}", token))
            .spawn(move || {
                let event = match agent.get(&url).call() {
                    Ok(resp) => {
                        // Drain the body so the element is fully buffered
                        // before it is reported ready.
                        let mut reader = resp.into_reader();
                        match io::copy(&mut reader, &mut io::sink()) {
                            Ok(bytes) => {
                                debug!("fetched {} ({} bytes)", id, bytes);
                                MediaEvent::Loaded { id, token }
                            }
                            Err(e) => MediaEvent::Failed {
                                id,
                                token,
                                reason: format!("body read failed: {}", e),
                            },
                        }
                    }
                    Err(ureq::Error::Status(code, _)) => MediaEvent::Failed {
                        id,
                        token,
                        reason: format!("HTTP {}", code),
                    },
                    Err(e) => MediaEvent::Failed {
                        id,
                        token,
                        reason: format!("transport error: {}", e),
                    },
                };
                // The session may already be gone; a dead queue is fine.
                let _ = tx.send(event);
            });
        if let Err(e) = spawned {
            let _ = spawn_tx.send(MediaEvent::Failed {
                id: media.source_path.clone(),
                token,
                reason: format!("spawn failed: {}", e),
            });
        }
    }
}

/// Fetch and parse the manifest from `GET <base>/api/news/manifest`.
/// Non-2xx responses map to [`ManifestError::Http`].
pub fn fetch_manifest(base: &str) -> Result<RawManifest, ManifestError> {
    let url = join_url(base, "api/news/manifest");
    debug!("fetching manifest: {}", url);
    match ureq::agent().get(&url).call() {
        Ok(resp) => {
            let body = resp.into_string().map_err(ManifestError::Io)?;
            Ok(serde_json::from_str(&body)?)
        }
        Err(ureq::Error::Status(code, _)) => Err(ManifestError::Http(code)),
        Err(e) => Err(ManifestError::Io(io::Error::new(io::ErrorKind::Other, e))),
    }
}

// ========== Filesystem ==========

/// Serves the server's `generated/` + `media/` layout from a local root.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaLoader for FsLoader {
    fn request(&self, id: &str, media: &MediaRef, token: u64, tx: Sender<MediaEvent>) {
        let path = self.root.join(media.source_path.trim_start_matches('/'));
        let id = id.to_string();
        let spawn_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("nexcast-fetch-{}", token))
            .spawn(move || {
                let event = match std::fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => {
                        debug!("loaded {} ({} bytes)", id, meta.len());
                        MediaEvent::Loaded { id, token }
                    }
                    Ok(_) => MediaEvent::Failed {
                        id,
                        token,
                        reason: format!("not a file: {}", path.display()),
                    },
                    Err(e) => MediaEvent::Failed {
                        id,
                        token,
                        reason: format!("{}: {}", path.display(), e),
                    },
                };
                let _ = tx.send(event);
            });
        if let Err(e) = spawned {
            let _ = spawn_tx.send(MediaEvent::Failed {
                id: media.source_path.clone(),
                token,
                reason: format!("spawn failed: {}", e),
            });
        }
    }
}

// ========== Test / smoke-run loaders ==========

/// Completes every request immediately. For tests and offline smoke runs.
pub struct InstantLoader;

impl MediaLoader for InstantLoader {
    fn request(&self, id: &str, _media: &MediaRef, token: u64, tx: Sender<MediaEvent>) {
        let _ = tx.send(MediaEvent::Loaded {
            id: id.to_string(),
            token,
        });
    }
}

/// Never completes a request. For load-timeout tests.
pub struct NullLoader;

impl MediaLoader for NullLoader {
    fn request(&self, id: &str, _media: &MediaRef, _token: u64, _tx: Sender<MediaEvent>) {
        trace!("null loader: dropping request for {}", id);
    }
}
