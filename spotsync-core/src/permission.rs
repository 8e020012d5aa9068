//! Privilege check guarding administrative operations.
//!
//! Authentication happens elsewhere; this module only inspects the role of
//! an already established caller and refuses when none is present.

use thiserror::Error;

/// Role granted to a caller by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Role {
    /// Ordinary end user.
    User,
    /// Operator allowed to run administrative operations.
    Admin,
}

/// Identity of the party invoking an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Opaque caller identifier.
    pub id: String,
    /// Granted role.
    pub role: Role,
}

impl Caller {
    /// Build an administrator caller.
    #[must_use]
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Admin,
        }
    }

    /// Build an ordinary caller.
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
        }
    }
}

/// Errors returned by [`authorise`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// No caller identity accompanied the request.
    #[error("administrative operations require an authenticated caller")]
    Unauthenticated,
    /// The caller lacks the administrator role.
    #[error("caller {caller} is not an administrator")]
    Forbidden {
        /// Identifier of the rejected caller.
        caller: String,
    },
}

/// Require an administrator caller.
///
/// # Examples
/// ```
/// use spotsync_core::{Caller, PermissionError, authorise};
///
/// assert!(authorise(Some(&Caller::admin("ops"))).is_ok());
/// assert_eq!(authorise(None), Err(PermissionError::Unauthenticated));
/// ```
pub fn authorise(caller: Option<&Caller>) -> Result<&Caller, PermissionError> {
    let caller = caller.ok_or(PermissionError::Unauthenticated)?;
    if caller.role == Role::Admin {
        Ok(caller)
    } else {
        Err(PermissionError::Forbidden {
            caller: caller.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rejects_ordinary_users() {
        let caller = Caller::user("rider");
        assert_eq!(
            authorise(Some(&caller)),
            Err(PermissionError::Forbidden {
                caller: "rider".into()
            })
        );
    }
}
