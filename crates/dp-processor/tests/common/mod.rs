//! Shared fixtures: a test plugin, its setup handler and a wired-up world
#![allow(dead_code)]

use async_trait::async_trait;
use dp_core::{Address, AddressSpace, ContentHasher, Hash, PluginSetupRef, Tag};
use dp_ledger::{Journal, RetentionPolicy};
use dp_permissions::{
    MultiTargetPermission, PermissionDiffEngine, PermissionId, EXECUTE_PERMISSION_ID, ROOT_PERMISSION_ID,
};
use dp_plugin::{
    PluginInstance, PreparedInstallation, PreparedSetupData, PreparedUpdate, SetupHandler, SetupPayload,
};
use dp_processor::{
    ApplyInstallationParams, Dao, InstallationProposal, PrepareInstallationParams, ProcessorConfig, SetupProcessor,
};
use dp_registry::{RepoDirectory, VersionRegistry};
use std::any::Any;
use std::sync::Arc;

/// Installation payload producing a plugin that refuses upgrades
pub const FROZEN: &[u8] = b"frozen";
/// Installation payload the handler rejects
pub const FAIL: &[u8] = b"fail";
/// Uninstall payload that makes the handler ask for a grant
pub const GRANT_ON_UNINSTALL: &[u8] = b"grant";

pub const V1: Tag = Tag::new(1, 1);
pub const V2: Tag = Tag::new(1, 2);
/// Build whose implementation makes every upgrade revert
pub const BROKEN: Tag = Tag::new(1, 3);

pub fn update_permission() -> PermissionId {
    PermissionId::named("TEST_UPDATE_PERMISSION")
}

pub fn broken_implementation() -> Address {
    Address::derive("broken-impl")
}

pub fn plugin_address(dao: Address, data: &[u8]) -> Address {
    Address::from_hash(&ContentHasher::new("test.plugin").address(&dao).bytes(data).finish())
}

pub fn helper(label: &str) -> Address {
    Address::derive(&format!("{}-helper", label))
}

pub struct TestPlugin {
    address: Address,
    implementation: Address,
    upgradeable: bool,
    pub initialized_for: Option<Address>,
    pub uninstalled: bool,
    pub upgrades: Vec<(Address, Vec<u8>)>,
}

#[async_trait]
impl PluginInstance for TestPlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        "test-plugin"
    }

    fn implementation(&self) -> Address {
        self.implementation
    }

    fn is_upgradeable(&self) -> bool {
        self.upgradeable
    }

    async fn initialize(&mut self, dao: Address) -> anyhow::Result<()> {
        self.initialized_for = Some(dao);
        Ok(())
    }

    async fn upgrade(&mut self, implementation: Address, init_data: &[u8]) -> anyhow::Result<()> {
        if implementation == broken_implementation() {
            anyhow::bail!("upgrade to {} reverted", implementation);
        }
        self.implementation = implementation;
        self.upgrades.push((implementation, init_data.to_vec()));
        Ok(())
    }

    async fn uninstall(&mut self, _dao: Address) -> anyhow::Result<()> {
        self.uninstalled = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct TestHandler {
    address: Address,
    implementation: Address,
    helpers: Vec<Address>,
}

impl TestHandler {
    pub fn new(label: &str) -> Self {
        Self::with_implementation(label, Address::derive(&format!("{}-impl", label)))
    }

    pub fn with_implementation(label: &str, implementation: Address) -> Self {
        Self {
            address: Address::derive(&format!("{}-setup", label)),
            implementation,
            helpers: vec![helper(label)],
        }
    }
}

#[async_trait]
impl SetupHandler for TestHandler {
    fn address(&self) -> Address {
        self.address
    }

    fn implementation(&self) -> Address {
        self.implementation
    }

    async fn prepare_installation(&self, dao: Address, data: &[u8]) -> anyhow::Result<PreparedInstallation> {
        if data == FAIL {
            anyhow::bail!("installation payload rejected");
        }
        let plugin = plugin_address(dao, data);
        Ok(PreparedInstallation {
            plugin: Box::new(TestPlugin {
                address: plugin,
                implementation: self.implementation,
                upgradeable: data != FROZEN,
                initialized_for: None,
                uninstalled: false,
                upgrades: Vec::new(),
            }),
            prepared_setup_data: PreparedSetupData::new(
                self.helpers.clone(),
                vec![MultiTargetPermission::grant(dao, plugin, *EXECUTE_PERMISSION_ID)],
            ),
        })
    }

    async fn prepare_update(
        &self,
        dao: Address,
        _current_build: u16,
        payload: &SetupPayload,
    ) -> anyhow::Result<PreparedUpdate> {
        Ok(PreparedUpdate {
            init_data: b"migrate".to_vec(),
            prepared_setup_data: PreparedSetupData::new(
                payload.current_helpers.clone(),
                vec![MultiTargetPermission::grant(dao, payload.plugin, update_permission())],
            ),
        })
    }

    async fn prepare_uninstallation(
        &self,
        dao: Address,
        payload: &SetupPayload,
    ) -> anyhow::Result<Vec<MultiTargetPermission>> {
        if payload.data == GRANT_ON_UNINSTALL {
            return Ok(vec![MultiTargetPermission::grant(dao, payload.plugin, *EXECUTE_PERMISSION_ID)]);
        }
        Ok(vec![MultiTargetPermission::revoke(dao, payload.plugin, *EXECUTE_PERMISSION_ID)])
    }
}

/// A DAO, a repository with three builds and a processor with ROOT on the DAO
pub struct World {
    pub processor: Arc<SetupProcessor>,
    pub dao: Arc<Dao>,
    pub engine: PermissionDiffEngine,
    pub repo: Arc<VersionRegistry>,
    pub journal: Arc<Journal>,
    pub space: Arc<AddressSpace>,
}

impl World {
    pub async fn new() -> Self {
        let journal = Arc::new(Journal::in_memory(RetentionPolicy::unbounded()));
        Self::build(ProcessorConfig::default(), journal).await
    }

    pub async fn build(config: ProcessorConfig, journal: Arc<Journal>) -> Self {
        let processor = |repos| SetupProcessor::new(&config, repos).with_journal(journal.clone());
        Self::assemble(processor, journal.clone()).await
    }

    pub async fn assemble(
        processor: impl FnOnce(Arc<RepoDirectory>) -> SetupProcessor,
        journal: Arc<Journal>,
    ) -> Self {
        dp_core::telemetry::init_test_tracing();
        let space = Arc::new(AddressSpace::new());
        let engine = PermissionDiffEngine::new(space.clone());
        let maintainer = Address::derive("maintainer");

        let repo = Arc::new(
            VersionRegistry::new(Address::derive("repo"), maintainer, engine.clone())
                .unwrap()
                .with_journal(journal.clone()),
        );
        repo.create_version(maintainer, 1, Arc::new(TestHandler::new("v1")), b"v1".to_vec(), b"release-1".to_vec())
            .await
            .unwrap();
        repo.create_version(maintainer, 1, Arc::new(TestHandler::new("v2")), b"v2".to_vec(), Vec::new())
            .await
            .unwrap();
        repo.create_version(
            maintainer,
            1,
            Arc::new(TestHandler::with_implementation("v3", broken_implementation())),
            b"v3".to_vec(),
            Vec::new(),
        )
        .await
        .unwrap();

        let repos = Arc::new(RepoDirectory::new());
        repos.register(repo.clone()).await.unwrap();
        let processor = Arc::new(processor(repos));

        let dao_address = Address::derive("dao");
        let dao = Arc::new(Dao::new(dao_address, dao_address, engine.clone()));
        dao.grant(dao_address, dao_address, processor.address(), *ROOT_PERMISSION_ID)
            .await
            .unwrap();
        processor.register_dao(dao.clone()).await.unwrap();

        Self {
            processor,
            dao,
            engine,
            repo,
            journal,
            space,
        }
    }

    pub fn maintainer(&self) -> Address {
        Address::derive("maintainer")
    }

    pub fn setup_ref(&self, tag: Tag) -> PluginSetupRef {
        PluginSetupRef::new(tag, self.repo.address())
    }

    /// The DAO applies its own setups
    pub fn caller(&self) -> Address {
        self.dao.address()
    }

    pub async fn prepare_install(&self, data: &[u8]) -> InstallationProposal {
        self.processor
            .prepare_installation(
                &self.dao,
                PrepareInstallationParams {
                    setup_ref: self.setup_ref(V1),
                    data: data.to_vec(),
                },
            )
            .await
            .unwrap()
    }

    /// Prepare and apply an installation at `V1`
    pub async fn install(&self, data: &[u8]) -> (InstallationProposal, Hash) {
        let proposal = self.prepare_install(data).await;
        let applied = self
            .processor
            .apply_installation(
                &self.dao,
                self.caller(),
                ApplyInstallationParams::from_proposal(self.setup_ref(V1), &proposal),
            )
            .await
            .unwrap();
        (proposal, applied)
    }

    /// Payload describing a plugin installed at `V1`
    pub fn payload(&self, plugin: Address) -> SetupPayload {
        SetupPayload::new(plugin, vec![helper("v1")], Vec::new())
    }

    /// Run `f` against the installed test plugin
    pub async fn inspect<R>(&self, plugin: Address, f: impl FnOnce(&TestPlugin) -> R) -> Option<R> {
        let shared = self.dao.plugin(plugin).await?;
        let guard = shared.read().await;
        guard.as_any().downcast_ref::<TestPlugin>().map(f)
    }
}
