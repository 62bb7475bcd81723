use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Coordinator = 2,
    Teacher = 3,
    Student = 4,
    System = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Coordinator),
            3 => Some(Role::Teacher),
            4 => Some(Role::Student),
            5 => Some(Role::System),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to mark attendance
    pub fn can_mark(self) -> bool {
        matches!(self, Role::Admin | Role::Coordinator | Role::Teacher)
    }
}
