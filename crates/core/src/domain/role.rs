// Endpoint Role

use std::fmt;

/// What an endpoint does on each operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Publish the endpoint's payload to its queue
    Publish,
    /// Fetch at most one message from its queue without waiting
    Consume,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Publish, Role::Consume];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Publish => "publish",
            Role::Consume => "consume",
        }
    }

    /// Prefix used in endpoint identities ("Publisher-0-1")
    pub fn endpoint_label(&self) -> &'static str {
        match self {
            Role::Publish => "Publisher",
            Role::Consume => "Consumer",
        }
    }

    /// Short worker tag used in iteration logs ("P[0]", "C[3]")
    pub fn worker_tag(&self) -> char {
        match self {
            Role::Publish => 'P',
            Role::Consume => 'C',
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
