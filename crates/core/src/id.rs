//! Identifier newtypes.
//!
//! All ids are UUID-backed. Newtypes keep the different id spaces (turns,
//! sessions, conversations, messages) from being mixed up at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(
    /// Identifier of one embedded turn (anchored on a user message).
    TurnId
);
uuid_id!(
    /// Identifier of a chat session (ordered thread of finalized turns).
    SessionId
);
uuid_id!(
    /// Identifier of an archived source conversation.
    ConversationId
);
uuid_id!(
    /// Identifier of a single stored message.
    MessageId
);
