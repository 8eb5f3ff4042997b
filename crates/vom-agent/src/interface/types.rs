//! Interface attribute types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    #[default]
    Down,
    Up,
}

impl AdminState {
    pub fn is_up(&self) -> bool {
        *self == AdminState::Up
    }
}

impl From<bool> for AdminState {
    fn from(up: bool) -> Self {
        if up {
            AdminState::Up
        } else {
            AdminState::Down
        }
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_state() {
        assert_eq!(AdminState::from(true), AdminState::Up);
        assert!(!AdminState::default().is_up());
        assert_eq!(AdminState::Up.to_string(), "up");
    }
}
