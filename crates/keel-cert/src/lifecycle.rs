//! Certificate state machine.
//!
//! All ordering rules live in [`transition`]; callers never inspect a
//! status to decide whether an action is allowed.

use keel_core::Owner;
use keel_state::CertificateStatus;

use crate::error::CertError;

/// An action requested against an owner's certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertAction {
    Generate { overwrite: bool },
    Publish,
    Revoke,
}

impl CertAction {
    pub fn name(&self) -> &'static str {
        match self {
            CertAction::Generate { .. } => "generate",
            CertAction::Publish => "publish",
            CertAction::Revoke => "revoke",
        }
    }
}

/// Compute the status reached by applying `action` to `current`.
///
/// `None` stands for "no certificate".
pub fn transition(
    owner: &Owner,
    current: Option<CertificateStatus>,
    action: CertAction,
) -> Result<CertificateStatus, CertError> {
    use CertificateStatus::*;

    match (current, action) {
        (None | Some(Revoked), CertAction::Generate { .. }) => Ok(Generated),
        (Some(Generated | Published), CertAction::Generate { overwrite: true }) => Ok(Generated),
        (Some(status @ (Generated | Published)), CertAction::Generate { overwrite: false }) => {
            Err(CertError::AlreadyExists {
                owner: owner.clone(),
                status,
            })
        }
        (Some(Generated), CertAction::Publish) => Ok(Published),
        (Some(Published), CertAction::Revoke) => Ok(Revoked),
        (None, CertAction::Publish | CertAction::Revoke) => {
            Err(CertError::NotGenerated(owner.clone()))
        }
        (Some(from), action) => Err(CertError::InvalidTransition {
            owner: owner.clone(),
            from,
            action: action.name(),
        }),
    }
}

/// Admit a write only for an owner whose certificate is published.
pub fn authorize(owner: &Owner, current: Option<CertificateStatus>) -> Result<(), CertError> {
    let reason = match current {
        Some(CertificateStatus::Published) => return Ok(()),
        None => "no client certificate".to_string(),
        Some(status) => format!("client certificate is {status}, not published"),
    };
    Err(CertError::Unauthorized {
        owner: owner.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use CertificateStatus::*;

    fn owner() -> Owner {
        Owner::parse("keel1alice000").unwrap()
    }

    const GENERATE: CertAction = CertAction::Generate { overwrite: false };
    const OVERWRITE: CertAction = CertAction::Generate { overwrite: true };

    #[test]
    fn happy_path_generate_publish_revoke() {
        let generated = transition(&owner(), None, GENERATE).unwrap();
        assert_eq!(generated, Generated);
        let published = transition(&owner(), Some(generated), CertAction::Publish).unwrap();
        assert_eq!(published, Published);
        let revoked = transition(&owner(), Some(published), CertAction::Revoke).unwrap();
        assert_eq!(revoked, Revoked);
    }

    #[test]
    fn publish_before_generate_is_not_generated() {
        assert!(matches!(
            transition(&owner(), None, CertAction::Publish),
            Err(CertError::NotGenerated(_))
        ));
        assert!(matches!(
            transition(&owner(), None, CertAction::Revoke),
            Err(CertError::NotGenerated(_))
        ));
    }

    #[test]
    fn regenerate_requires_overwrite() {
        for status in [Generated, Published] {
            assert!(matches!(
                transition(&owner(), Some(status), GENERATE),
                Err(CertError::AlreadyExists { .. })
            ));
            assert_eq!(transition(&owner(), Some(status), OVERWRITE).unwrap(), Generated);
        }
    }

    #[test]
    fn revoked_owner_may_generate_again() {
        assert_eq!(transition(&owner(), Some(Revoked), GENERATE).unwrap(), Generated);
    }

    #[test]
    fn out_of_order_actions_are_invalid() {
        let cases = [
            (Published, CertAction::Publish),
            (Revoked, CertAction::Publish),
            (Generated, CertAction::Revoke),
            (Revoked, CertAction::Revoke),
        ];
        for (from, action) in cases {
            assert!(
                matches!(
                    transition(&owner(), Some(from), action),
                    Err(CertError::InvalidTransition { .. })
                ),
                "{from} / {action:?}"
            );
        }
    }

    #[test]
    fn only_published_authorizes() {
        assert!(authorize(&owner(), Some(Published)).is_ok());
        for current in [None, Some(Generated), Some(Revoked)] {
            assert!(matches!(
                authorize(&owner(), current),
                Err(CertError::Unauthorized { .. })
            ));
        }
    }
}
