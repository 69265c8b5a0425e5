//! Actors and the roles they act under.
//!
//! Authentication happens upstream; the engine only checks that an actor's
//! role is allowed on the edge being taken.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of the user (or system process) acting on a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Institutional role an actor holds for the duration of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// School staff; creates and cancels requests.
    School,
    /// Regional directorate; validates requests from its schools.
    Dre,
    /// Central administration; authorizes, denies or questions.
    Codae,
    /// Contracted catering company.
    Vendor,
    /// Background jobs.
    System,
    /// Operators allowed to force a state through an audited override.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::School => "school",
            Role::Dre => "dre",
            Role::Codae => "codae",
            Role::Vendor => "vendor",
            Role::System => "system",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The actor used by background sweeps.
    pub fn system() -> Self {
        Self::new("system", Role::System)
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
