//! Plugin repository: the published versions of one plugin

use dp_core::{Address, Hash, Tag};
use dp_ledger::{Footprint, Journal};
use dp_permissions::{PermissionDiffEngine, PermissionError, PermissionId, PermissionManager};
use dp_plugin::SharedSetupHandler;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, Result};
use crate::version::{VersionArena, VersionRecord};

lazy_static! {
    /// Allows publishing versions and editing release metadata
    pub static ref MAINTAINER_PERMISSION_ID: PermissionId =
        PermissionId::named("MAINTAINER_PERMISSION");
}

/// Footprint category used for repository notifications
pub const REPO_CATEGORY: &str = "plugin_repo";

/// Repository notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    VersionCreated {
        repo: Address,
        tag: Tag,
        setup_handler: Address,
        build_metadata: Vec<u8>,
    },
    ReleaseMetadataUpdated {
        repo: Address,
        release: u8,
        metadata: Vec<u8>,
    },
}

impl RegistryEvent {
    fn to_footprint(&self) -> Footprint {
        match self {
            RegistryEvent::VersionCreated {
                repo,
                tag,
                setup_handler,
                build_metadata,
            } => Footprint::new(
                REPO_CATEGORY,
                "version_created",
                serde_json::json!({
                    "repo": repo,
                    "release": tag.release,
                    "build": tag.build,
                    "setup_handler": setup_handler,
                    "build_metadata": hex::encode(build_metadata),
                }),
            ),
            RegistryEvent::ReleaseMetadataUpdated {
                repo,
                release,
                metadata,
            } => Footprint::new(
                REPO_CATEGORY,
                "release_metadata_updated",
                serde_json::json!({
                    "repo": repo,
                    "release": release,
                    "metadata": hex::encode(metadata),
                }),
            ),
        }
    }
}

/// Hook handler type
pub type RegistryHook = Arc<dyn Fn(&RegistryEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    arena: VersionArena,
    handlers: HashMap<Address, SharedSetupHandler>,
    release_metadata: BTreeMap<u8, Vec<u8>>,
}

/// Versioned repository of one plugin
pub struct VersionRegistry {
    address: Address,
    state: RwLock<RegistryState>,
    permissions: RwLock<PermissionManager>,
    hooks: RwLock<Vec<RegistryHook>>,
    journal: Option<Arc<Journal>>,
}

impl VersionRegistry {
    /// Create a repository at `address`. `maintainer` receives both
    /// `ROOT_PERMISSION` and `MAINTAINER_PERMISSION` on it.
    pub fn new(address: Address, maintainer: Address, engine: PermissionDiffEngine) -> Result<Self> {
        let mut permissions = PermissionManager::new(address, maintainer, engine);
        permissions.grant(maintainer, address, maintainer, *MAINTAINER_PERMISSION_ID)?;

        Ok(Self {
            address,
            state: RwLock::new(RegistryState::default()),
            permissions: RwLock::new(permissions),
            hooks: RwLock::new(Vec::new()),
            journal: None,
        })
    }

    /// Record notifications in an audit journal
    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Register a hook for repository events
    pub async fn register_hook(&self, handler: RegistryHook) {
        self.hooks.write().await.push(handler);
    }

    async fn emit_event(&self, event: RegistryEvent) {
        for hook in self.hooks.read().await.iter() {
            if let Err(e) = hook(&event) {
                warn!("Registry hook error: {}", e);
            }
        }

        if let Some(ref journal) = self.journal {
            if let Err(e) = journal.append(event.to_footprint()).await {
                warn!("Failed to record registry footprint: {}", e);
            }
        }
    }

    async fn require_maintainer(&self, caller: Address) -> Result<()> {
        let permissions = self.permissions.read().await;
        if permissions.is_granted(self.address, caller, *MAINTAINER_PERMISSION_ID, &[]) {
            return Ok(());
        }
        Err(PermissionError::Unauthorized {
            where_: self.address,
            who: caller,
            permission_id: *MAINTAINER_PERMISSION_ID,
        }
        .into())
    }

    pub async fn is_maintainer(&self, who: Address) -> bool {
        self.permissions
            .read()
            .await
            .is_granted(self.address, who, *MAINTAINER_PERMISSION_ID, &[])
    }

    /// Let `who` publish versions. Caller needs `ROOT_PERMISSION` on the repo.
    pub async fn grant_maintainer(&self, caller: Address, who: Address) -> Result<()> {
        let mut permissions = self.permissions.write().await;
        permissions.grant(caller, self.address, who, *MAINTAINER_PERMISSION_ID)?;
        Ok(())
    }

    pub async fn revoke_maintainer(&self, caller: Address, who: Address) -> Result<()> {
        let mut permissions = self.permissions.write().await;
        permissions.revoke(caller, self.address, who, *MAINTAINER_PERMISSION_ID)?;
        Ok(())
    }

    /// Publish the next build of `release` backed by `setup_handler`.
    ///
    /// `release` must be the latest release or the one right after it. The
    /// first build of a release must carry release metadata.
    pub async fn create_version(
        &self,
        caller: Address,
        release: u8,
        setup_handler: SharedSetupHandler,
        build_metadata: Vec<u8>,
        release_metadata: Vec<u8>,
    ) -> Result<VersionRecord> {
        self.require_maintainer(caller).await?;

        if release == 0 {
            return Err(RegistryError::ReleaseZeroNotAllowed);
        }
        let handler_address = setup_handler.address();
        if handler_address.is_zero() {
            return Err(RegistryError::InvalidSetupHandler(handler_address));
        }

        let record = {
            let mut state = self.state.write().await;

            let latest = state.arena.latest_release();
            if release != latest && u16::from(release) != u16::from(latest) + 1 {
                return Err(RegistryError::InvalidReleaseIncrement {
                    latest,
                    attempted: release,
                });
            }
            if state.arena.build_count(release) == 0 && release_metadata.is_empty() {
                return Err(RegistryError::EmptyReleaseMetadata);
            }

            let record = state
                .arena
                .insert(release, handler_address, build_metadata, release_metadata.clone())?
                .clone();
            state.handlers.insert(handler_address, setup_handler);
            if !release_metadata.is_empty() {
                state.release_metadata.insert(release, release_metadata.clone());
            }
            record
        };

        info!(
            repo = %self.address,
            tag = %record.tag,
            setup_handler = %handler_address,
            "Created plugin version"
        );

        self.emit_event(RegistryEvent::VersionCreated {
            repo: self.address,
            tag: record.tag,
            setup_handler: handler_address,
            build_metadata: record.build_metadata.clone(),
        })
        .await;
        if !release_metadata.is_empty() {
            self.emit_event(RegistryEvent::ReleaseMetadataUpdated {
                repo: self.address,
                release,
                metadata: release_metadata,
            })
            .await;
        }

        Ok(record)
    }

    /// Replace the metadata of an existing release
    pub async fn update_release_metadata(&self, caller: Address, release: u8, metadata: Vec<u8>) -> Result<()> {
        self.require_maintainer(caller).await?;

        if release == 0 {
            return Err(RegistryError::ReleaseZeroNotAllowed);
        }
        {
            let mut state = self.state.write().await;
            if release > state.arena.latest_release() {
                return Err(RegistryError::ReleaseDoesNotExist(release));
            }
            if metadata.is_empty() {
                return Err(RegistryError::EmptyReleaseMetadata);
            }
            state.release_metadata.insert(release, metadata.clone());
        }

        debug!(repo = %self.address, release, "Updated release metadata");
        self.emit_event(RegistryEvent::ReleaseMetadataUpdated {
            repo: self.address,
            release,
            metadata,
        })
        .await;
        Ok(())
    }

    pub async fn get_version(&self, tag: Tag) -> Result<VersionRecord> {
        self.get_version_by_hash(tag.hash()).await
    }

    pub async fn get_version_by_hash(&self, tag_hash: Hash) -> Result<VersionRecord> {
        self.state
            .read()
            .await
            .arena
            .get(&tag_hash)
            .cloned()
            .ok_or(RegistryError::VersionHashDoesNotExist(tag_hash))
    }

    /// Highest build of `release`
    pub async fn get_latest_version(&self, release: u8) -> Result<VersionRecord> {
        let state = self.state.read().await;
        let build = state.arena.build_count(release);
        if build == 0 {
            return Err(RegistryError::ReleaseDoesNotExist(release));
        }
        let tag = Tag::new(release, build);
        state
            .arena
            .get_tag(&tag)
            .cloned()
            .ok_or(RegistryError::VersionHashDoesNotExist(tag.hash()))
    }

    /// Version published with `setup_handler`
    pub async fn get_latest_version_for_handler(&self, setup_handler: Address) -> Result<VersionRecord> {
        self.state
            .read()
            .await
            .arena
            .by_handler(&setup_handler)
            .cloned()
            .ok_or(RegistryError::SetupHandlerNotPublished(setup_handler))
    }

    pub async fn build_count(&self, release: u8) -> u16 {
        self.state.read().await.arena.build_count(release)
    }

    pub async fn latest_release(&self) -> u8 {
        self.state.read().await.arena.latest_release()
    }

    pub async fn release_metadata(&self, release: u8) -> Option<Vec<u8>> {
        self.state.read().await.release_metadata.get(&release).cloned()
    }

    pub async fn setup_handler(&self, address: Address) -> Option<SharedSetupHandler> {
        self.state.read().await.handlers.get(&address).cloned()
    }

    /// Version record and setup handler published under `tag`
    pub async fn resolve(&self, tag: Tag) -> Result<(VersionRecord, SharedSetupHandler)> {
        let state = self.state.read().await;
        let record = state
            .arena
            .get_tag(&tag)
            .cloned()
            .ok_or(RegistryError::VersionHashDoesNotExist(tag.hash()))?;
        let handler = state
            .handlers
            .get(&record.setup_handler)
            .cloned()
            .ok_or(RegistryError::InvalidSetupHandler(record.setup_handler))?;
        Ok((record, handler))
    }

    /// All versions ordered by tag
    pub async fn versions(&self) -> Vec<VersionRecord> {
        self.state
            .read()
            .await
            .arena
            .records()
            .into_iter()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionRegistry")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dp_core::AddressSpace;
    use dp_permissions::MultiTargetPermission;
    use dp_plugin::{PreparedInstallation, SetupHandler, SetupPayload};
    use dp_ledger::RetentionPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NamedHandler(Address);

    #[async_trait]
    impl SetupHandler for NamedHandler {
        fn address(&self) -> Address {
            self.0
        }

        fn implementation(&self) -> Address {
            self.0
        }

        async fn prepare_installation(&self, _: Address, _: &[u8]) -> anyhow::Result<PreparedInstallation> {
            Err(anyhow::anyhow!("not used"))
        }

        async fn prepare_uninstallation(&self, _: Address, _: &SetupPayload) -> anyhow::Result<Vec<MultiTargetPermission>> {
            Ok(Vec::new())
        }
    }

    fn handler(label: &str) -> SharedSetupHandler {
        Arc::new(NamedHandler(Address::derive(label)))
    }

    fn registry() -> (VersionRegistry, Address) {
        let maintainer = Address::derive("maintainer");
        let engine = PermissionDiffEngine::new(Arc::new(AddressSpace::new()));
        let repo = VersionRegistry::new(Address::derive("repo"), maintainer, engine).unwrap();
        (repo, maintainer)
    }

    #[tokio::test]
    async fn test_create_version_and_reject_reused_handler() {
        let (repo, m) = registry();
        let h1 = handler("h1");

        let record = repo
            .create_version(m, 1, h1.clone(), b"build".to_vec(), b"release".to_vec())
            .await
            .unwrap();
        assert_eq!(record.tag, Tag::new(1, 1));
        assert_eq!(repo.build_count(1).await, 1);

        let err = repo
            .create_version(m, 1, h1.clone(), Vec::new(), b"release".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::PluginSetupAlreadyInPreviousRelease(h1.address()));
        assert_eq!(repo.build_count(1).await, 1);
    }

    #[tokio::test]
    async fn test_release_sequencing() {
        let (repo, m) = registry();

        assert_eq!(
            repo.create_version(m, 0, handler("h0"), Vec::new(), b"r".to_vec()).await,
            Err(RegistryError::ReleaseZeroNotAllowed)
        );
        assert_eq!(
            repo.create_version(m, 2, handler("h1"), Vec::new(), b"r".to_vec()).await,
            Err(RegistryError::InvalidReleaseIncrement { latest: 0, attempted: 2 })
        );

        repo.create_version(m, 1, handler("h1"), Vec::new(), b"r1".to_vec()).await.unwrap();
        repo.create_version(m, 1, handler("h2"), Vec::new(), Vec::new()).await.unwrap();
        repo.create_version(m, 2, handler("h3"), Vec::new(), b"r2".to_vec()).await.unwrap();

        assert_eq!(repo.latest_release().await, 2);
        assert_eq!(repo.get_latest_version(1).await.unwrap().tag, Tag::new(1, 2));
        assert_eq!(
            repo.create_version(m, 4, handler("h4"), Vec::new(), b"r".to_vec()).await,
            Err(RegistryError::InvalidReleaseIncrement { latest: 2, attempted: 4 })
        );
        assert_eq!(
            repo.create_version(m, 1, handler("h5"), Vec::new(), Vec::new()).await,
            Err(RegistryError::InvalidReleaseIncrement { latest: 2, attempted: 1 })
        );
    }

    #[tokio::test]
    async fn test_first_build_requires_release_metadata() {
        let (repo, m) = registry();
        assert_eq!(
            repo.create_version(m, 1, handler("h1"), Vec::new(), Vec::new()).await,
            Err(RegistryError::EmptyReleaseMetadata)
        );
    }

    #[tokio::test]
    async fn test_zero_handler_rejected() {
        let (repo, m) = registry();
        let zero: SharedSetupHandler = Arc::new(NamedHandler(Address::ZERO));
        assert_eq!(
            repo.create_version(m, 1, zero, Vec::new(), b"r".to_vec()).await,
            Err(RegistryError::InvalidSetupHandler(Address::ZERO))
        );
    }

    #[tokio::test]
    async fn test_only_maintainers_publish() {
        let (repo, m) = registry();
        let outsider = Address::derive("outsider");

        let err = repo
            .create_version(outsider, 1, handler("h1"), Vec::new(), b"r".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Permission(PermissionError::Unauthorized { .. })
        ));

        repo.grant_maintainer(m, outsider).await.unwrap();
        assert!(repo.is_maintainer(outsider).await);
        repo.create_version(outsider, 1, handler("h1"), Vec::new(), b"r".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lookups_report_missing_versions() {
        let (repo, m) = registry();
        let h1 = handler("h1");
        repo.create_version(m, 1, h1.clone(), b"b".to_vec(), b"r".to_vec()).await.unwrap();

        let by_handler = repo.get_latest_version_for_handler(h1.address()).await.unwrap();
        assert_eq!(by_handler.tag, Tag::new(1, 1));
        assert_eq!(repo.get_version_by_hash(Tag::new(1, 1).hash()).await.unwrap(), by_handler);

        let missing = Tag::new(1, 2);
        assert_eq!(
            repo.get_version(missing).await,
            Err(RegistryError::VersionHashDoesNotExist(missing.hash()))
        );
        assert_eq!(repo.get_latest_version(3).await, Err(RegistryError::ReleaseDoesNotExist(3)));

        let unpublished = Address::derive("unpublished-setup");
        let err = repo.get_latest_version_for_handler(unpublished).await.unwrap_err();
        assert_eq!(err, RegistryError::SetupHandlerNotPublished(unpublished));
        assert!(err.is_not_found());

        let (record, resolved) = repo.resolve(Tag::new(1, 1)).await.unwrap();
        assert_eq!(record.setup_handler, resolved.address());
    }

    #[tokio::test]
    async fn test_update_release_metadata() {
        let (repo, m) = registry();
        repo.create_version(m, 1, handler("h1"), Vec::new(), b"r1".to_vec()).await.unwrap();

        repo.update_release_metadata(m, 1, b"r1-new".to_vec()).await.unwrap();
        assert_eq!(repo.release_metadata(1).await, Some(b"r1-new".to_vec()));

        assert_eq!(
            repo.update_release_metadata(m, 2, b"x".to_vec()).await,
            Err(RegistryError::ReleaseDoesNotExist(2))
        );
        assert_eq!(
            repo.update_release_metadata(m, 1, Vec::new()).await,
            Err(RegistryError::EmptyReleaseMetadata)
        );
    }

    #[tokio::test]
    async fn test_events_reach_hooks_and_journal() {
        let journal = Arc::new(Journal::in_memory(RetentionPolicy::default()));
        let (repo, m) = registry();
        let repo = repo.with_journal(journal.clone());

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        repo.register_hook(Arc::new(move |_event: &RegistryEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .await;

        repo.create_version(m, 1, handler("h1"), Vec::new(), b"r".to_vec()).await.unwrap();

        // version created + release metadata
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let events = journal.events_in(REPO_CATEGORY).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "version_created");
        journal.verify_chain().await.unwrap();
    }
}
