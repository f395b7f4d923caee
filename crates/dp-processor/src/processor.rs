//! The setup processor state machine
//!
//! Every transition is two-phase. `prepare_*` asks the version's setup
//! handler what the change looks like, validates it and records the
//! content-addressed prepared id. `apply_*` recomputes the id from the
//! caller's parameters, requires it to be live, applies the permission diff
//! and runs the plugin hook. Either every effect of an apply lands or none
//! does.
//!
//! DAOs are registered once; every transition must be handed the registered
//! instance.

use dp_core::{Address, Hash};
use dp_ledger::Journal;
use dp_permissions::{hash_permissions, MultiTargetPermission, OperationScope, PermissionId, PermissionManager};
use dp_plugin::{hash_helpers, PreparedInstallation, PreparedSetupData, PreparedUpdate};
use dp_registry::RepoDirectory;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::dao::{Dao, DaoDirectory};
use crate::error::{ProcessorError, Result};
use crate::events::{HookHandler, SetupEvent};
use crate::gate::{
    AuthorizationGate, DaoPermissionGate, APPLY_INSTALLATION_PERMISSION_ID, APPLY_UNINSTALLATION_PERMISSION_ID,
    APPLY_UPDATE_PERMISSION_ID,
};
use crate::ids::{applied_setup_id, installation_id, prepared_setup_id, PreparationType, PreparedSetupFields};
use crate::params::{
    ApplyInstallationParams, ApplyUninstallationParams, ApplyUpdateParams, InstallationProposal,
    PrepareInstallationParams, PrepareUninstallationParams, PrepareUpdateParams, UninstallationProposal,
    UpdateProposal,
};
use crate::state::{AppliedSetup, InstallationRecord, InstallationState};

#[derive(Default)]
struct ProcessorState {
    /// Advanced by every committed transition
    sequence: u64,
    installations: HashMap<Hash, InstallationRecord>,
}

impl ProcessorState {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn current(&self, installation_id: &Hash) -> Option<AppliedSetup> {
        self.installations
            .get(installation_id)
            .and_then(|record| record.current.clone())
    }

    fn is_live(&self, installation_id: &Hash, prepared_setup_id: &Hash) -> bool {
        self.installations
            .get(installation_id)
            .is_some_and(|record| record.is_live(prepared_setup_id))
    }

    /// Fail unless the setup in force is still `snapshot`
    fn ensure_current(&self, installation_id: &Hash, dao: Address, plugin: Address, snapshot: &AppliedSetup) -> Result<()> {
        let current = self
            .current(installation_id)
            .ok_or(ProcessorError::PluginNotInstalled { dao, plugin })?;
        if current.applied_setup_id != snapshot.applied_setup_id {
            return Err(ProcessorError::InvalidAppliedSetupId {
                current: current.applied_setup_id,
                stated: snapshot.applied_setup_id,
            });
        }
        Ok(())
    }

    /// Record a proposal at the next sequence
    fn prepare(&mut self, installation_id: Hash, prepared_setup_id: Hash) -> Result<&mut InstallationRecord> {
        let sequence = self.sequence + 1;
        let record = self.installations.entry(installation_id).or_default();
        if !record.prepare(prepared_setup_id, sequence) {
            return Err(ProcessorError::SetupAlreadyPrepared(prepared_setup_id));
        }
        self.sequence = sequence;
        Ok(record)
    }
}

fn handler_failed(handler: Address) -> impl FnOnce(anyhow::Error) -> ProcessorError {
    move |e| ProcessorError::SetupHandlerFailed {
        handler,
        reason: format!("{:#}", e),
    }
}

fn rejected<T>(operation: &'static str, dao: Address, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        warn!(operation, dao = %dao, kind = ?e.kind(), "Setup call rejected: {}", e);
    }
    result
}

/// Orchestrates prepare and apply of plugin installations, updates and
/// uninstallations
pub struct SetupProcessor {
    address: Address,
    repos: Arc<RepoDirectory>,
    daos: DaoDirectory,
    gate: Arc<dyn AuthorizationGate>,
    state: RwLock<ProcessorState>,
    hooks: RwLock<Vec<HookHandler>>,
    journal: Option<Arc<Journal>>,
}

impl SetupProcessor {
    /// Processor acting as `config.address`, authorizing applies through
    /// each DAO's permission store
    pub fn new(config: &ProcessorConfig, repos: Arc<RepoDirectory>) -> Self {
        Self {
            address: config.address,
            repos,
            daos: DaoDirectory::new(),
            gate: Arc::new(DaoPermissionGate::new(config.address)),
            state: RwLock::new(ProcessorState::default()),
            hooks: RwLock::new(Vec::new()),
            journal: None,
        }
    }

    /// Like [`SetupProcessor::new`], with the journal the config describes
    pub async fn from_config(config: &ProcessorConfig, repos: Arc<RepoDirectory>) -> dp_core::Result<Self> {
        let journal = config.open_journal().await?;
        Ok(Self::new(config, repos).with_journal(journal))
    }

    pub fn with_gate(mut self, gate: Arc<dyn AuthorizationGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Record notifications in an audit journal
    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn repos(&self) -> &Arc<RepoDirectory> {
        &self.repos
    }

    pub fn journal(&self) -> Option<&Arc<Journal>> {
        self.journal.as_ref()
    }

    /// Serve `dao`. Transitions only accept this exact instance afterwards.
    pub async fn register_dao(&self, dao: Arc<Dao>) -> Result<()> {
        self.daos.register(dao).await
    }

    pub async fn dao(&self, address: Address) -> Option<Arc<Dao>> {
        self.daos.get(address).await
    }

    /// Register a hook for setup events
    pub async fn register_hook(&self, handler: HookHandler) {
        self.hooks.write().await.push(handler);
    }

    async fn emit_event(&self, event: SetupEvent) {
        for hook in self.hooks.read().await.iter() {
            if let Err(e) = hook(&event) {
                warn!("Hook error: {}", e);
            }
        }

        if let Some(ref journal) = self.journal {
            if let Err(e) = journal.append(event.to_footprint()).await {
                warn!("Failed to record setup footprint: {}", e);
            }
        }
    }

    /// Sequence of the last committed transition
    pub async fn sequence(&self) -> u64 {
        self.state.read().await.sequence
    }

    /// Setup in force for `plugin` in `dao`, `None` unless installed
    pub async fn installation_state(&self, dao: Address, plugin: Address) -> Option<InstallationState> {
        let id = installation_id(dao, plugin);
        self.state
            .read()
            .await
            .installations
            .get(&id)
            .and_then(|record| record.state(dao, plugin, id))
    }

    /// Number of live proposals for `plugin` in `dao`
    pub async fn pending_proposals(&self, dao: Address, plugin: Address) -> usize {
        self.state
            .read()
            .await
            .installations
            .get(&installation_id(dao, plugin))
            .map_or(0, |record| record.pending())
    }

    /// Check that a proposal can still be applied
    pub async fn validate_prepared_setup_id(&self, installation_id: Hash, prepared_setup_id: Hash) -> Result<()> {
        if self.state.read().await.is_live(&installation_id, &prepared_setup_id) {
            Ok(())
        } else {
            Err(ProcessorError::SetupNotApplicable(prepared_setup_id))
        }
    }

    async fn authorize(&self, dao: &Dao, caller: Address, permission_id: PermissionId) -> Result<()> {
        if self.gate.is_authorized(dao, caller, permission_id).await {
            return Ok(());
        }
        Err(ProcessorError::SetupApplicationUnauthorized {
            dao: dao.address(),
            caller,
            permission_id,
        })
    }

    async fn validate_permissions(&self, dao: &Dao, ops: &[MultiTargetPermission], scope: OperationScope) -> Result<()> {
        dao.permission_store().read().await.engine().validate(ops, scope)?;
        Ok(())
    }

    /// Apply `ops` to a copy of `current`, or `None` when there is nothing to apply
    fn stage_permissions(
        &self,
        current: &PermissionManager,
        ops: &[MultiTargetPermission],
        scope: OperationScope,
    ) -> Result<Option<PermissionManager>> {
        if ops.is_empty() {
            return Ok(None);
        }
        let mut staged = current.clone();
        staged.apply_batch(self.address, ops, scope)?;
        Ok(Some(staged))
    }

    // Installation

    pub async fn prepare_installation(
        &self,
        dao: &Dao,
        params: PrepareInstallationParams,
    ) -> Result<InstallationProposal> {
        let result = self.try_prepare_installation(dao, params).await;
        rejected("prepare_installation", dao.address(), result)
    }

    async fn try_prepare_installation(
        &self,
        dao: &Dao,
        params: PrepareInstallationParams,
    ) -> Result<InstallationProposal> {
        self.daos.verify(dao).await?;
        let dao_address = dao.address();
        let (_, handler) = self.repos.resolve(&params.setup_ref).await?;

        let PreparedInstallation {
            plugin,
            prepared_setup_data,
        } = handler
            .prepare_installation(dao_address, &params.data)
            .await
            .map_err(handler_failed(handler.address()))?;
        let plugin_address = plugin.address();

        self.validate_permissions(dao, &prepared_setup_data.permissions, OperationScope::Any)
            .await?;

        let installation_id = installation_id(dao_address, plugin_address);
        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: params.setup_ref,
            permissions_hash: prepared_setup_data.permissions_hash(),
            helpers_hash: prepared_setup_data.helpers_hash(),
            init_data: &[],
            preparation: PreparationType::Installation,
            current_applied_setup_id: None,
        });

        {
            let mut state = self.state.write().await;
            if state.current(&installation_id).is_some() {
                return Err(ProcessorError::PluginAlreadyInstalled {
                    dao: dao_address,
                    plugin: plugin_address,
                });
            }
            state
                .prepare(installation_id, prepared_setup_id)?
                .hold_deployment(prepared_setup_id, Arc::new(RwLock::new(plugin)));
        }

        info!(
            dao = %dao_address,
            plugin = %plugin_address,
            setup = %params.setup_ref,
            id = %prepared_setup_id.short(),
            "Prepared installation"
        );
        self.emit_event(SetupEvent::InstallationPrepared {
            dao: dao_address,
            plugin: plugin_address,
            setup_ref: params.setup_ref,
            prepared_setup_id,
            prepared_setup_data: prepared_setup_data.clone(),
        })
        .await;

        Ok(InstallationProposal {
            plugin: plugin_address,
            prepared_setup_data,
            prepared_setup_id,
        })
    }

    /// Apply a prepared installation, returning the applied setup id
    pub async fn apply_installation(
        &self,
        dao: &Dao,
        caller: Address,
        params: ApplyInstallationParams,
    ) -> Result<Hash> {
        let result = self.try_apply_installation(dao, caller, params).await;
        rejected("apply_installation", dao.address(), result)
    }

    async fn try_apply_installation(
        &self,
        dao: &Dao,
        caller: Address,
        params: ApplyInstallationParams,
    ) -> Result<Hash> {
        self.daos.verify(dao).await?;
        self.authorize(dao, caller, *APPLY_INSTALLATION_PERMISSION_ID).await?;

        let dao_address = dao.address();
        let installation_id = installation_id(dao_address, params.plugin);
        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: params.setup_ref,
            permissions_hash: hash_permissions(&params.permissions),
            helpers_hash: params.helpers_hash,
            init_data: &[],
            preparation: PreparationType::Installation,
            current_applied_setup_id: None,
        });

        let mut state = self.state.write().await;
        let plugin = state
            .installations
            .get(&installation_id)
            .filter(|record| record.is_live(&prepared_setup_id))
            .and_then(|record| record.deployment(&prepared_setup_id))
            .ok_or(ProcessorError::SetupNotApplicable(prepared_setup_id))?;

        {
            let mut permissions = dao.permission_store().write().await;
            let staged = self.stage_permissions(&permissions, &params.permissions, OperationScope::Any)?;
            plugin
                .write()
                .await
                .initialize(dao_address)
                .await
                .map_err(|e| ProcessorError::PluginInitializationFailed {
                    plugin: params.plugin,
                    reason: format!("{:#}", e),
                })?;
            if let Some(staged) = staged {
                *permissions = staged;
            }
        }
        dao.attach(params.plugin, plugin).await;

        let sequence = state.next_sequence();
        let applied_setup_id = applied_setup_id(dao_address, params.plugin, prepared_setup_id);
        state.installations.entry(installation_id).or_default().applied(
            sequence,
            Some(AppliedSetup {
                applied_setup_id,
                setup_ref: params.setup_ref,
                helpers_hash: params.helpers_hash,
            }),
        );
        drop(state);

        info!(
            dao = %dao_address,
            plugin = %params.plugin,
            applied = %applied_setup_id.short(),
            sequence,
            "Applied installation"
        );
        self.emit_event(SetupEvent::InstallationApplied {
            dao: dao_address,
            plugin: params.plugin,
            prepared_setup_id,
            applied_setup_id,
        })
        .await;

        Ok(applied_setup_id)
    }

    // Update

    pub async fn prepare_update(&self, dao: &Dao, params: PrepareUpdateParams) -> Result<UpdateProposal> {
        let result = self.try_prepare_update(dao, params).await;
        rejected("prepare_update", dao.address(), result)
    }

    async fn try_prepare_update(&self, dao: &Dao, params: PrepareUpdateParams) -> Result<UpdateProposal> {
        self.daos.verify(dao).await?;
        let dao_address = dao.address();
        let plugin_address = params.setup_payload.plugin;
        let installation_id = installation_id(dao_address, plugin_address);
        let current_ref = params.current_setup_ref();
        let new_ref = params.new_setup_ref();

        let current = self
            .state
            .read()
            .await
            .current(&installation_id)
            .ok_or(ProcessorError::PluginNotInstalled {
                dao: dao_address,
                plugin: plugin_address,
            })?;
        if current.setup_ref != current_ref {
            return Err(ProcessorError::CurrentVersionMismatch {
                recorded: current.setup_ref,
                stated: current_ref,
            });
        }
        let helpers_hash = hash_helpers(&params.setup_payload.current_helpers);
        if helpers_hash != current.helpers_hash {
            return Err(ProcessorError::CurrentHelpersMismatch {
                expected: current.helpers_hash,
                actual: helpers_hash,
            });
        }

        let (current_version, _) = self.repos.resolve(&current_ref).await?;
        let (_, new_handler) = self.repos.resolve(&new_ref).await?;
        if !new_handler.supports_update(current_ref.version_tag, new_ref.version_tag) {
            return Err(ProcessorError::InvalidUpdateVersion {
                current: current_ref.version_tag,
                new: new_ref.version_tag,
            });
        }

        let update = if current_version.setup_handler == new_handler.address() {
            debug!(plugin = %plugin_address, "Same setup handler, skipping prepare_update");
            PreparedUpdate {
                init_data: Vec::new(),
                prepared_setup_data: PreparedSetupData::new(params.setup_payload.current_helpers.clone(), Vec::new()),
            }
        } else {
            let plugin = dao.plugin(plugin_address).await.ok_or(ProcessorError::PluginNotInstalled {
                dao: dao_address,
                plugin: plugin_address,
            })?;
            if !plugin.read().await.is_upgradeable() {
                return Err(ProcessorError::PluginNonupgradeable(plugin_address));
            }

            let update = new_handler
                .prepare_update(dao_address, current_ref.version_tag.build, &params.setup_payload)
                .await
                .map_err(handler_failed(new_handler.address()))?;
            self.validate_permissions(dao, &update.prepared_setup_data.permissions, OperationScope::Any)
                .await?;
            update
        };

        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: new_ref,
            permissions_hash: update.prepared_setup_data.permissions_hash(),
            helpers_hash: update.prepared_setup_data.helpers_hash(),
            init_data: &update.init_data,
            preparation: PreparationType::Update,
            current_applied_setup_id: Some(current.applied_setup_id),
        });
        {
            let mut state = self.state.write().await;
            state.ensure_current(&installation_id, dao_address, plugin_address, &current)?;
            state.prepare(installation_id, prepared_setup_id)?;
        }

        info!(
            dao = %dao_address,
            plugin = %plugin_address,
            from = %current_ref.version_tag,
            to = %new_ref.version_tag,
            id = %prepared_setup_id.short(),
            "Prepared update"
        );
        self.emit_event(SetupEvent::UpdatePrepared {
            dao: dao_address,
            plugin: plugin_address,
            setup_ref: new_ref,
            prepared_setup_id,
            init_data: update.init_data.clone(),
            prepared_setup_data: update.prepared_setup_data.clone(),
        })
        .await;

        Ok(UpdateProposal {
            init_data: update.init_data,
            prepared_setup_data: update.prepared_setup_data,
            prepared_setup_id,
        })
    }

    /// Apply a prepared update, returning the new applied setup id
    pub async fn apply_update(&self, dao: &Dao, caller: Address, params: ApplyUpdateParams) -> Result<Hash> {
        let result = self.try_apply_update(dao, caller, params).await;
        rejected("apply_update", dao.address(), result)
    }

    async fn try_apply_update(&self, dao: &Dao, caller: Address, params: ApplyUpdateParams) -> Result<Hash> {
        self.daos.verify(dao).await?;
        self.authorize(dao, caller, *APPLY_UPDATE_PERMISSION_ID).await?;

        let dao_address = dao.address();
        let installation_id = installation_id(dao_address, params.plugin);

        let mut state = self.state.write().await;
        let current = state
            .current(&installation_id)
            .ok_or(ProcessorError::PluginNotInstalled {
                dao: dao_address,
                plugin: params.plugin,
            })?;
        if current.applied_setup_id != params.current_applied_setup_id {
            return Err(ProcessorError::InvalidAppliedSetupId {
                current: current.applied_setup_id,
                stated: params.current_applied_setup_id,
            });
        }

        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: params.setup_ref,
            permissions_hash: hash_permissions(&params.permissions),
            helpers_hash: params.helpers_hash,
            init_data: &params.init_data,
            preparation: PreparationType::Update,
            current_applied_setup_id: Some(current.applied_setup_id),
        });
        if !state.is_live(&installation_id, &prepared_setup_id) {
            return Err(ProcessorError::SetupNotApplicable(prepared_setup_id));
        }

        let (_, handler) = self.repos.resolve(&params.setup_ref).await?;
        let plugin = dao.plugin(params.plugin).await.ok_or(ProcessorError::PluginNotInstalled {
            dao: dao_address,
            plugin: params.plugin,
        })?;

        {
            let mut permissions = dao.permission_store().write().await;
            let staged = self.stage_permissions(&permissions, &params.permissions, OperationScope::Any)?;

            let implementation = handler.implementation();
            let mut instance = plugin.write().await;
            if instance.implementation() != implementation {
                instance
                    .upgrade(implementation, &params.init_data)
                    .await
                    .map_err(|e| ProcessorError::PluginProxyUpgradeFailed {
                        plugin: params.plugin,
                        implementation,
                        reason: format!("{:#}", e),
                    })?;
            }

            if let Some(staged) = staged {
                *permissions = staged;
            }
        }

        let sequence = state.next_sequence();
        let applied_setup_id = applied_setup_id(dao_address, params.plugin, prepared_setup_id);
        state.installations.entry(installation_id).or_default().applied(
            sequence,
            Some(AppliedSetup {
                applied_setup_id,
                setup_ref: params.setup_ref,
                helpers_hash: params.helpers_hash,
            }),
        );
        drop(state);

        info!(
            dao = %dao_address,
            plugin = %params.plugin,
            version = %params.setup_ref.version_tag,
            applied = %applied_setup_id.short(),
            sequence,
            "Applied update"
        );
        self.emit_event(SetupEvent::UpdateApplied {
            dao: dao_address,
            plugin: params.plugin,
            prepared_setup_id,
            applied_setup_id,
        })
        .await;

        Ok(applied_setup_id)
    }

    // Uninstallation

    pub async fn prepare_uninstallation(
        &self,
        dao: &Dao,
        params: PrepareUninstallationParams,
    ) -> Result<UninstallationProposal> {
        let result = self.try_prepare_uninstallation(dao, params).await;
        rejected("prepare_uninstallation", dao.address(), result)
    }

    async fn try_prepare_uninstallation(
        &self,
        dao: &Dao,
        params: PrepareUninstallationParams,
    ) -> Result<UninstallationProposal> {
        self.daos.verify(dao).await?;
        let dao_address = dao.address();
        let plugin_address = params.setup_payload.plugin;
        let installation_id = installation_id(dao_address, plugin_address);

        let current = self
            .state
            .read()
            .await
            .current(&installation_id)
            .ok_or(ProcessorError::PluginNotInstalled {
                dao: dao_address,
                plugin: plugin_address,
            })?;
        if current.setup_ref != params.setup_ref {
            return Err(ProcessorError::CurrentVersionMismatch {
                recorded: current.setup_ref,
                stated: params.setup_ref,
            });
        }
        let helpers_hash = hash_helpers(&params.setup_payload.current_helpers);
        if helpers_hash != current.helpers_hash {
            return Err(ProcessorError::CurrentHelpersMismatch {
                expected: current.helpers_hash,
                actual: helpers_hash,
            });
        }

        let (_, handler) = self.repos.resolve(&params.setup_ref).await?;
        let permissions = handler
            .prepare_uninstallation(dao_address, &params.setup_payload)
            .await
            .map_err(handler_failed(handler.address()))?;
        self.validate_permissions(dao, &permissions, OperationScope::RevokeOnly)
            .await?;

        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: params.setup_ref,
            permissions_hash: hash_permissions(&permissions),
            helpers_hash: current.helpers_hash,
            init_data: &[],
            preparation: PreparationType::Uninstallation,
            current_applied_setup_id: Some(current.applied_setup_id),
        });
        {
            let mut state = self.state.write().await;
            state.ensure_current(&installation_id, dao_address, plugin_address, &current)?;
            state.prepare(installation_id, prepared_setup_id)?;
        }

        info!(
            dao = %dao_address,
            plugin = %plugin_address,
            id = %prepared_setup_id.short(),
            "Prepared uninstallation"
        );
        self.emit_event(SetupEvent::UninstallationPrepared {
            dao: dao_address,
            plugin: plugin_address,
            setup_ref: params.setup_ref,
            prepared_setup_id,
            permissions: permissions.clone(),
        })
        .await;

        Ok(UninstallationProposal {
            permissions,
            prepared_setup_id,
        })
    }

    pub async fn apply_uninstallation(
        &self,
        dao: &Dao,
        caller: Address,
        params: ApplyUninstallationParams,
    ) -> Result<()> {
        let result = self.try_apply_uninstallation(dao, caller, params).await;
        rejected("apply_uninstallation", dao.address(), result)
    }

    async fn try_apply_uninstallation(
        &self,
        dao: &Dao,
        caller: Address,
        params: ApplyUninstallationParams,
    ) -> Result<()> {
        self.daos.verify(dao).await?;
        self.authorize(dao, caller, *APPLY_UNINSTALLATION_PERMISSION_ID).await?;

        let dao_address = dao.address();
        let installation_id = installation_id(dao_address, params.plugin);

        let mut state = self.state.write().await;
        let current = state
            .current(&installation_id)
            .ok_or(ProcessorError::PluginNotInstalled {
                dao: dao_address,
                plugin: params.plugin,
            })?;
        if current.applied_setup_id != params.current_applied_setup_id {
            return Err(ProcessorError::InvalidAppliedSetupId {
                current: current.applied_setup_id,
                stated: params.current_applied_setup_id,
            });
        }

        let prepared_setup_id = prepared_setup_id(&PreparedSetupFields {
            installation_id,
            setup_ref: params.setup_ref,
            permissions_hash: hash_permissions(&params.permissions),
            helpers_hash: current.helpers_hash,
            init_data: &[],
            preparation: PreparationType::Uninstallation,
            current_applied_setup_id: Some(current.applied_setup_id),
        });
        if !state.is_live(&installation_id, &prepared_setup_id) {
            return Err(ProcessorError::SetupNotApplicable(prepared_setup_id));
        }

        let plugin = dao.plugin(params.plugin).await.ok_or(ProcessorError::PluginNotInstalled {
            dao: dao_address,
            plugin: params.plugin,
        })?;
        {
            let mut permissions = dao.permission_store().write().await;
            let staged = self.stage_permissions(&permissions, &params.permissions, OperationScope::RevokeOnly)?;
            plugin
                .write()
                .await
                .uninstall(dao_address)
                .await
                .map_err(|e| ProcessorError::PluginUninstallFailed {
                    plugin: params.plugin,
                    reason: format!("{:#}", e),
                })?;
            if let Some(staged) = staged {
                *permissions = staged;
            }
        }
        dao.detach(params.plugin).await;

        let sequence = state.next_sequence();
        state
            .installations
            .entry(installation_id)
            .or_default()
            .applied(sequence, None);
        drop(state);

        info!(dao = %dao_address, plugin = %params.plugin, sequence, "Applied uninstallation");
        self.emit_event(SetupEvent::UninstallationApplied {
            dao: dao_address,
            plugin: params.plugin,
            prepared_setup_id,
        })
        .await;

        Ok(())
    }
}

impl std::fmt::Debug for SetupProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupProcessor")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
