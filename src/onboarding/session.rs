//! Session entry context — the one-shot input that can pin a role.
//!
//! A deep link (`?role=agent&lock=1`) or an ephemeral session value can
//! carry a role token for the new account. The hint is explicit input to
//! the machine's constructor, read once at entry resolution and never
//! re-read mid-flow.

use crate::roles::Role;

/// The authenticated identity handed to the engine by the identity
/// provider. The engine never manages credentials; it only consumes the
/// resulting subject id and email.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// A role token from the entry context.
///
/// `lock` pins the role for the onboarding session: role selection is
/// disabled and the ChooseRole step is bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHint {
    pub role: Role,
    pub lock: bool,
}

/// Per-session entry context, consumed once by entry resolution.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub entry_hint: Option<EntryHint>,
}

impl SessionContext {
    /// No entry hint — resume from whatever the account already stores.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_hint(role: Role, lock: bool) -> Self {
        Self {
            entry_hint: Some(EntryHint { role, lock }),
        }
    }

    /// Parse a deep-link query string such as `role=agent&lock=1`.
    ///
    /// A role hint without an explicit lock flag pins the role; `lock=0`
    /// opts out and only pre-selects it.
    pub fn from_query(query: &str) -> Self {
        let mut role = None;
        let mut lock = true;
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "role" => role = value.parse::<Role>().ok(),
                "lock" => lock = !matches!(value, "0" | "false"),
                _ => {}
            }
        }
        Self {
            entry_hint: role.map(|role| EntryHint { role, lock }),
        }
    }
}
