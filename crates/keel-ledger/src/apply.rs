//! Applying transitions to the registry.
//!
//! The entry-level transforms (`update_deployment`, `close_deployment`,
//! `set_group_state`) are pure: they take the stored entry and return its
//! successor, or reject the transition. [`Applier`] wires them to the store,
//! the certificate authority and the write gate.

use std::sync::Arc;

use tracing::{info, warn};

use keel_cert::{CertificateAuthority, WriteGate};
use keel_core::{
    DeploymentId, DeploymentState, GroupId, GroupSpec, GroupState, Owner, groups_version,
    validate_groups,
};
use keel_state::{Deployment, DeploymentEntry, Group, StateError, StateStore};

use crate::error::TransitionError;
use crate::transition::{Outcome, Transition};

/// Group-level state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Close,
    Pause,
    Start,
}

impl GroupAction {
    pub fn name(&self) -> &'static str {
        match self {
            GroupAction::Close => "close",
            GroupAction::Pause => "pause",
            GroupAction::Start => "start",
        }
    }

    fn target(&self, from: GroupState) -> Option<GroupState> {
        match (self, from) {
            (GroupAction::Close, GroupState::Open | GroupState::Paused) => Some(GroupState::Closed),
            (GroupAction::Pause, GroupState::Open) => Some(GroupState::Paused),
            (GroupAction::Start, GroupState::Paused) => Some(GroupState::Open),
            _ => None,
        }
    }
}

fn require_active(entry: &DeploymentEntry) -> Result<(), TransitionError> {
    match entry.deployment.state {
        DeploymentState::Active => Ok(()),
        state => Err(TransitionError::InvalidTransition(format!(
            "deployment {} is {state}",
            entry.id()
        ))),
    }
}

fn require_owner(signer: &Owner, owner: &Owner) -> Result<(), TransitionError> {
    if signer == owner {
        Ok(())
    } else {
        Err(TransitionError::Unauthorized(format!(
            "{signer} cannot modify deployments of {owner}"
        )))
    }
}

/// Build the entry of a new deployment; gseq is assigned `1..=N` in order.
pub fn new_deployment(id: DeploymentId, groups: &[GroupSpec], height: u64) -> DeploymentEntry {
    DeploymentEntry {
        deployment: Deployment {
            deployment_id: id.clone(),
            state: DeploymentState::Active,
            version: groups_version(groups),
            created_at: height,
            updated_at: height,
        },
        groups: groups
            .iter()
            .zip(1u32..)
            .map(|(spec, gseq)| Group {
                group_id: id.group(gseq),
                state: GroupState::Open,
                group_spec: spec.clone(),
                created_at: height,
            })
            .collect(),
    }
}

/// Replace the group specs of an active deployment.
///
/// Returns `None` when `groups` hash to the current version.
pub fn update_deployment(
    mut entry: DeploymentEntry,
    groups: &[GroupSpec],
    height: u64,
) -> Result<Option<DeploymentEntry>, TransitionError> {
    require_active(&entry)?;
    validate_groups(groups)?;
    if groups.len() != entry.groups.len() {
        return Err(TransitionError::InvalidMessage(format!(
            "deployment {} has {} groups, update carries {}",
            entry.id(),
            entry.groups.len(),
            groups.len()
        )));
    }
    let version = groups_version(groups);
    if version == entry.deployment.version {
        return Ok(None);
    }
    for (group, spec) in entry.groups.iter_mut().zip(groups) {
        group.group_spec = spec.clone();
    }
    entry.deployment.version = version;
    entry.deployment.updated_at = height;
    Ok(Some(entry))
}

/// Close an active deployment together with every group still open.
pub fn close_deployment(
    mut entry: DeploymentEntry,
    height: u64,
) -> Result<DeploymentEntry, TransitionError> {
    require_active(&entry)?;
    entry.deployment.state = DeploymentState::Closed;
    entry.deployment.updated_at = height;
    for group in &mut entry.groups {
        group.state = GroupState::Closed;
    }
    Ok(entry)
}

/// Move one group of an active deployment to its next state.
pub fn set_group_state(
    mut entry: DeploymentEntry,
    gseq: u32,
    action: GroupAction,
    height: u64,
) -> Result<DeploymentEntry, TransitionError> {
    require_active(&entry)?;
    let id = entry.id().group(gseq);
    let group = entry
        .groups
        .iter_mut()
        .find(|g| g.group_id.gseq == gseq)
        .ok_or_else(|| TransitionError::NotFound(format!("group {id}")))?;
    let next = action.target(group.state).ok_or_else(|| {
        TransitionError::InvalidTransition(format!(
            "cannot {} group {id} while it is {}",
            action.name(),
            group.state
        ))
    })?;
    group.state = next;
    entry.deployment.updated_at = height;
    Ok(entry)
}

/// Applies transitions against the registry. Owned by the ledger writer.
pub struct Applier {
    store: StateStore,
    authority: CertificateAuthority,
    gate: Arc<dyn WriteGate>,
}

impl Applier {
    pub fn new(store: StateStore, authority: CertificateAuthority) -> Self {
        let gate = Arc::new(authority.clone());
        Self {
            store,
            authority,
            gate,
        }
    }

    /// Replace the write gate consulted before creates and updates.
    pub fn with_gate(mut self, gate: Arc<dyn WriteGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Apply one transition at `height`. Nothing is written on error.
    pub fn apply(&self, transition: &Transition, height: u64) -> Result<Outcome, TransitionError> {
        let outcome = match transition {
            Transition::GenerateCertificate { owner, overwrite } => {
                let (certificate, record) = self.authority.generate(owner, *overwrite, height)?;
                Outcome::CertificateGenerated {
                    record,
                    certificate,
                }
            }
            Transition::PublishCertificate { owner } => Outcome::CertificateUpdated {
                record: self.authority.publish(owner, height)?,
            },
            Transition::RevokeCertificate { owner } => Outcome::CertificateUpdated {
                record: self.authority.revoke(owner, height)?,
            },
            Transition::CreateDeployment {
                signer,
                dseq,
                groups,
            } => self.create(signer, *dseq, groups, height)?,
            Transition::UpdateDeployment { signer, id, groups } => {
                require_owner(signer, &id.owner)?;
                validate_groups(groups)?;
                self.gate.authorize_write(signer)?;
                let current = self.store.get_deployment(id)?;
                match update_deployment(current.clone(), groups, height)? {
                    Some(entry) => {
                        self.store.replace_deployment(&entry, height)?;
                        Outcome::DeploymentUpdated {
                            entry,
                            changed: true,
                        }
                    }
                    None => Outcome::DeploymentUpdated {
                        entry: current,
                        changed: false,
                    },
                }
            }
            Transition::CloseDeployment { signer, id } => {
                require_owner(signer, &id.owner)?;
                let entry = close_deployment(self.store.get_deployment(id)?, height)?;
                self.store.replace_deployment(&entry, height)?;
                Outcome::DeploymentClosed { entry }
            }
            Transition::CloseGroup { signer, id } => {
                self.group(signer, id, GroupAction::Close, height)?
            }
            Transition::PauseGroup { signer, id } => {
                self.group(signer, id, GroupAction::Pause, height)?
            }
            Transition::StartGroup { signer, id } => {
                self.group(signer, id, GroupAction::Start, height)?
            }
        };
        Ok(outcome)
    }

    fn create(
        &self,
        signer: &Owner,
        dseq: Option<u64>,
        groups: &[GroupSpec],
        height: u64,
    ) -> Result<Outcome, TransitionError> {
        validate_groups(groups)?;
        if dseq == Some(0) {
            return Err(TransitionError::InvalidMessage(
                "dseq must be positive".to_string(),
            ));
        }
        self.gate.authorize_write(signer)?;

        let last = self.store.last_dseq(signer)?;
        let dseq = match dseq {
            Some(dseq) => {
                // Existing ids resolve to DuplicateKey ahead of the ordering check.
                let id = DeploymentId::new(signer.clone(), dseq);
                match self.store.get_deployment(&id) {
                    Ok(_) => return Err(TransitionError::DuplicateKey(format!("deployment {id}"))),
                    Err(StateError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                if dseq < last {
                    return Err(TransitionError::InvalidMessage(format!(
                        "dseq {dseq} is below the last assigned dseq {last} for {signer}"
                    )));
                }
                dseq
            }
            None => last + 1,
        };
        let entry = new_deployment(DeploymentId::new(signer.clone(), dseq), groups, height);
        self.store.create_deployment(&entry, height)?;
        info!(id = %entry.id(), groups = entry.groups.len(), height, "deployment created");
        Ok(Outcome::DeploymentCreated { entry })
    }

    fn group(
        &self,
        signer: &Owner,
        id: &GroupId,
        action: GroupAction,
        height: u64,
    ) -> Result<Outcome, TransitionError> {
        require_owner(signer, &id.owner)?;
        let current = self.store.get_deployment(&id.deployment_id())?;
        let entry = set_group_state(current, id.gseq, action, height).inspect_err(|e| {
            warn!(%id, action = action.name(), error = %e, "group transition rejected");
        })?;
        self.store.replace_deployment(&entry, height)?;
        let group = entry
            .group(id.gseq)
            .cloned()
            .ok_or_else(|| TransitionError::NotFound(format!("group {id}")))?;
        Ok(Outcome::GroupUpdated { group })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_cert::{CertError, CertificateOptions};
    use keel_core::{PlacementRequirements, ResourceUnit};

    const ALICE: &str = "keel1alice000";
    const BOB: &str = "keel1bob00000";

    fn owner(s: &str) -> Owner {
        Owner::parse(s).unwrap()
    }

    fn spec(name: &str, count: u32) -> GroupSpec {
        GroupSpec {
            name: name.to_string(),
            requirements: PlacementRequirements::default(),
            resources: vec![ResourceUnit {
                cpu_millis: 250,
                memory_bytes: 256 * 1024 * 1024,
                storage_bytes: 0,
                count,
            }],
        }
    }

    /// Lets every signer through.
    struct OpenGate;

    impl WriteGate for OpenGate {
        fn authorize_write(&self, _signer: &Owner) -> Result<(), CertError> {
            Ok(())
        }
    }

    fn applier() -> Applier {
        let store = StateStore::open_in_memory().unwrap();
        let authority = CertificateAuthority::new(store.clone(), CertificateOptions::default());
        Applier::new(store, authority)
    }

    fn open_applier() -> Applier {
        applier().with_gate(Arc::new(OpenGate))
    }

    fn create(applier: &Applier, who: &str, dseq: Option<u64>, height: u64) -> DeploymentEntry {
        let transition = Transition::CreateDeployment {
            signer: owner(who),
            dseq,
            groups: vec![spec("web", 1), spec("db", 1)],
        };
        match applier.apply(&transition, height).unwrap() {
            Outcome::DeploymentCreated { entry } => entry,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn new_deployment_assigns_gseq_in_order() {
        let id = DeploymentId::new(owner(ALICE), 3);
        let entry = new_deployment(id, &[spec("a", 1), spec("b", 1), spec("c", 1)], 9);
        let gseqs: Vec<u32> = entry.groups.iter().map(|g| g.group_id.gseq).collect();
        assert_eq!(gseqs, vec![1, 2, 3]);
        assert_eq!(entry.groups[1].group_spec.name, "b");
        assert_eq!(entry.deployment.created_at, 9);
    }

    #[test]
    fn close_closes_every_group() {
        let entry = new_deployment(DeploymentId::new(owner(ALICE), 1), &[spec("a", 1)], 1);
        let entry = set_group_state(entry, 1, GroupAction::Pause, 2).unwrap();
        let closed = close_deployment(entry, 3).unwrap();
        assert_eq!(closed.deployment.state, DeploymentState::Closed);
        assert!(closed.groups.iter().all(|g| g.state == GroupState::Closed));
        assert!(matches!(
            close_deployment(closed, 4),
            Err(TransitionError::InvalidTransition(_))
        ));
    }

    #[test]
    fn group_state_machine() {
        let entry = new_deployment(DeploymentId::new(owner(ALICE), 1), &[spec("a", 1)], 1);
        assert!(matches!(
            set_group_state(entry.clone(), 1, GroupAction::Start, 2),
            Err(TransitionError::InvalidTransition(_))
        ));
        let paused = set_group_state(entry.clone(), 1, GroupAction::Pause, 2).unwrap();
        assert_eq!(paused.groups[0].state, GroupState::Paused);
        let started = set_group_state(paused, 1, GroupAction::Start, 3).unwrap();
        assert_eq!(started.groups[0].state, GroupState::Open);
        assert!(matches!(
            set_group_state(entry, 2, GroupAction::Close, 2),
            Err(TransitionError::NotFound(_))
        ));
    }

    #[test]
    fn update_with_same_version_is_unchanged() {
        let groups = [spec("a", 1)];
        let entry = new_deployment(DeploymentId::new(owner(ALICE), 1), &groups, 1);
        assert!(update_deployment(entry.clone(), &groups, 2).unwrap().is_none());

        let updated = update_deployment(entry.clone(), &[spec("a", 3)], 2)
            .unwrap()
            .unwrap();
        assert_ne!(updated.deployment.version, entry.deployment.version);
        assert_eq!(updated.groups[0].group_spec.resources[0].count, 3);
        assert_eq!(updated.deployment.updated_at, 2);

        assert!(matches!(
            update_deployment(entry, &[spec("a", 1), spec("b", 1)], 2),
            Err(TransitionError::InvalidMessage(_))
        ));
    }

    #[test]
    fn create_requires_published_certificate() {
        let applier = applier();
        let transition = Transition::CreateDeployment {
            signer: owner(ALICE),
            dseq: None,
            groups: vec![spec("web", 1)],
        };
        assert!(matches!(
            applier.apply(&transition, 1),
            Err(TransitionError::Unauthorized(_))
        ));

        let generate = Transition::GenerateCertificate {
            owner: owner(ALICE),
            overwrite: false,
        };
        applier.apply(&generate, 1).unwrap();
        assert!(matches!(
            applier.apply(&transition, 2),
            Err(TransitionError::Unauthorized(_))
        ));

        let publish = Transition::PublishCertificate { owner: owner(ALICE) };
        applier.apply(&publish, 2).unwrap();
        assert!(applier.apply(&transition, 3).is_ok());
    }

    #[test]
    fn publish_before_generate_is_not_generated() {
        let applier = applier();
        let publish = Transition::PublishCertificate { owner: owner(ALICE) };
        assert!(matches!(
            applier.apply(&publish, 1),
            Err(TransitionError::Certificate(CertError::NotGenerated(_)))
        ));
    }

    #[test]
    fn create_assigns_next_dseq() {
        let applier = open_applier();
        assert_eq!(create(&applier, ALICE, None, 1).id().dseq, 1);
        assert_eq!(create(&applier, ALICE, Some(10), 2).id().dseq, 10);
        assert_eq!(create(&applier, ALICE, None, 3).id().dseq, 11);
        assert_eq!(create(&applier, BOB, None, 4).id().dseq, 1);
    }

    #[test]
    fn explicit_dseq_never_goes_backwards() {
        let applier = open_applier();
        create(&applier, ALICE, Some(10), 1);
        let backwards = Transition::CreateDeployment {
            signer: owner(ALICE),
            dseq: Some(3),
            groups: vec![spec("web", 1)],
        };
        assert!(matches!(
            applier.apply(&backwards, 2),
            Err(TransitionError::InvalidMessage(_))
        ));
        assert!(matches!(
            applier.store().get_deployment(&DeploymentId::new(owner(ALICE), 3)),
            Err(StateError::NotFound(_))
        ));
        assert_eq!(applier.store().last_dseq(&owner(ALICE)).unwrap(), 10);

        // Another owner's sequence is independent.
        assert_eq!(create(&applier, BOB, Some(3), 2).id().dseq, 3);
        assert_eq!(create(&applier, ALICE, Some(12), 3).id().dseq, 12);
    }

    #[test]
    fn create_rejects_bad_messages() {
        let applier = open_applier();
        let empty = Transition::CreateDeployment {
            signer: owner(ALICE),
            dseq: None,
            groups: vec![],
        };
        assert!(matches!(
            applier.apply(&empty, 1),
            Err(TransitionError::InvalidMessage(_))
        ));
        let zero = Transition::CreateDeployment {
            signer: owner(ALICE),
            dseq: Some(0),
            groups: vec![spec("web", 1)],
        };
        assert!(matches!(
            applier.apply(&zero, 1),
            Err(TransitionError::InvalidMessage(_))
        ));
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let applier = open_applier();
        create(&applier, ALICE, Some(5), 1);
        let again = Transition::CreateDeployment {
            signer: owner(ALICE),
            dseq: Some(5),
            groups: vec![spec("web", 1)],
        };
        assert!(matches!(
            applier.apply(&again, 2),
            Err(TransitionError::DuplicateKey(_))
        ));
    }

    #[test]
    fn only_the_owner_may_mutate() {
        let applier = open_applier();
        let entry = create(&applier, ALICE, None, 1);
        let close = Transition::CloseDeployment {
            signer: owner(BOB),
            id: entry.id().clone(),
        };
        assert!(matches!(
            applier.apply(&close, 2),
            Err(TransitionError::Unauthorized(_))
        ));
        let pause = Transition::PauseGroup {
            signer: owner(BOB),
            id: entry.id().group(1),
        };
        assert!(matches!(
            applier.apply(&pause, 2),
            Err(TransitionError::Unauthorized(_))
        ));
    }

    #[test]
    fn group_transitions_persist() {
        let applier = open_applier();
        let entry = create(&applier, ALICE, None, 1);
        let pause = Transition::PauseGroup {
            signer: owner(ALICE),
            id: entry.id().group(2),
        };
        match applier.apply(&pause, 2).unwrap() {
            Outcome::GroupUpdated { group } => assert_eq!(group.state, GroupState::Paused),
            other => panic!("unexpected outcome {other:?}"),
        }
        let stored = applier.store().get_group(&entry.id().group(2)).unwrap();
        assert_eq!(stored.state, GroupState::Paused);
        assert_eq!(
            applier.store().get_group(&entry.id().group(1)).unwrap().state,
            GroupState::Open
        );
    }

    #[test]
    fn close_missing_deployment_is_not_found() {
        let applier = open_applier();
        let close = Transition::CloseDeployment {
            signer: owner(ALICE),
            id: DeploymentId::new(owner(ALICE), 249),
        };
        assert!(matches!(
            applier.apply(&close, 1),
            Err(TransitionError::NotFound(_))
        ));
    }
}
