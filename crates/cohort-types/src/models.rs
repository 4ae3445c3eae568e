use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted string is not a known enum value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Enums persisted as TEXT columns. Each gets `as_str`, `Display` and `FromStr`
/// with the same lowercase spelling serde uses on the wire.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// The fixed set of reactions shared by posts, comments and messages.
    ReactionKind {
        Like => "like",
        Dislike => "dislike",
        Heart => "heart",
        Angry => "angry",
        Laugh => "laugh",
        Wow => "wow",
        Sad => "sad",
    }
}

text_enum! {
    /// What a reaction is attached to. Each target has its own table.
    ReactionTarget {
        Post => "post",
        Comment => "comment",
        Message => "message",
    }
}

text_enum! {
    ConversationType {
        Private => "private",
        Group => "group",
    }
}

text_enum! {
    Role {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    NotificationKind {
        PostComment => "post_comment",
        CommentReply => "comment_reply",
        PostReaction => "post_reaction",
        CommentReaction => "comment_reaction",
    }
}

text_enum! {
    ReportTargetType {
        Post => "post",
        Comment => "comment",
        Message => "message",
        User => "user",
    }
}

text_enum! {
    ReportStatus {
        Pending => "pending",
        Resolved => "resolved",
        Dismissed => "dismissed",
    }
}

text_enum! {
    /// Moderation state of a gallery memory submission.
    SubmissionStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Outcome of a reaction toggle.
    ReactionAction {
        Added => "added",
        Removed => "removed",
        Updated => "updated",
    }
}

text_enum! {
    DeleteScope {
        Me => "me",
        Everyone => "everyone",
    }
}
