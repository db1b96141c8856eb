//! linkdrop - A self-hosted file drop-box
//!
//! Administrators hand out time- and use-limited links that let anonymous
//! clients upload into, or download from, one directory:
//! - Upload and download links with atomically consumed use counts
//! - redb embedded database for links and admin sessions
//! - Upload validation by extension, declared and sniffed MIME type
//! - Server-rendered admin pages behind static or Google sign-in

pub mod api;
pub mod auth;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod links;
pub mod paths;
pub mod sniff;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use auth::{LoginMethod, SessionGate};
use catalog::DirectoryCatalog;
use clock::{Clock, TokenSource};
use config::Config;
use ingest::UploadPipeline;
use links::LinkService;
use storage::{Database, LinkKind};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionGate,
    pub uploads: LinkService,
    pub downloads: LinkService,
    pub ingest: UploadPipeline,
    pub catalog: Arc<DirectoryCatalog>,
    pub login: LoginMethod,
}

impl AppState {
    /// Wire every service to the same store, clock and token source.
    pub fn new(
        config: Config,
        db: Database,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
        login: LoginMethod,
    ) -> Result<Self, std::io::Error> {
        let catalog = Arc::new(DirectoryCatalog::new(
            &config.upload.storage_root,
            config.upload.max_file_size,
        )?);

        Ok(Self {
            sessions: SessionGate::new(
                db.clone(),
                Arc::clone(&clock),
                Arc::clone(&tokens),
                config.session.clone(),
            ),
            uploads: LinkService::new(
                LinkKind::Upload,
                db.clone(),
                Arc::clone(&clock),
                Arc::clone(&tokens),
                Arc::clone(&catalog),
            ),
            downloads: LinkService::new(
                LinkKind::Download,
                db.clone(),
                Arc::clone(&clock),
                Arc::clone(&tokens),
                Arc::clone(&catalog),
            ),
            ingest: UploadPipeline::new(
                config.upload.clone(),
                db.clone(),
                Arc::clone(&clock),
                tokens,
            ),
            catalog,
            login,
            clock,
            db,
            config,
        })
    }
}
