//! Value objects of the quiz domain.
//!
//! Identifiers are validated at construction time so that the rest of the
//! domain never sees a zero or negative id.

use std::{fmt, str::FromStr};

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};

use super::error::ValueObjectError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Create a new id, rejecting zero and negative values
            pub fn new(value: i64) -> Result<Self, ValueObjectError> {
                if value <= 0 {
                    return Err(ValueObjectError::NonPositiveId {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(value))
            }

            /// Get the raw value
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValueObjectError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ValueObjectError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<i64>().map_err(|_| ValueObjectError::NotANumber {
                    kind: $kind,
                    raw: s.to_string(),
                })?;
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Session (room) identifier. One live quiz instance.
    SessionId,
    "session_id"
);
numeric_id!(
    /// Participant row identifier
    ParticipantId,
    "participant_id"
);
numeric_id!(
    /// Question identifier
    QuestionId,
    "question_id"
);
numeric_id!(
    /// Quiz identifier
    QuizId,
    "quiz_id"
);
numeric_id!(
    /// User identifier, issued by the session setup endpoints
    UserId,
    "user_id"
);

impl UserId {
    /// Synthesize an identity for a user who did not provide one.
    ///
    /// Uniformly random over the positive 63-bit range.
    pub fn anonymous() -> Self {
        Self(rand::thread_rng().gen_range(1..=i64::MAX))
    }
}

/// Characters a join code is drawn from
pub const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a join code
pub const JOIN_CODE_LENGTH: usize = 6;

/// Human-shareable room code (6 uppercase alphanumeric characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinCode(String);

impl JoinCode {
    /// Parse a code typed by a user: surrounding whitespace is ignored and
    /// lowercase letters are accepted.
    pub fn parse(raw: &str) -> Result<Self, ValueObjectError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.len() != JOIN_CODE_LENGTH
            || !normalized.bytes().all(|b| JOIN_CODE_CHARSET.contains(&b))
        {
            return Err(ValueObjectError::InvalidJoinCode(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JoinCode {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JoinCode> for String {
    fn from(code: JoinCode) -> Self {
        code.0
    }
}

impl fmt::Display for JoinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Factory for fresh join codes
pub struct JoinCodeFactory;

impl JoinCodeFactory {
    /// Draw a random code. Uniqueness is checked by the caller against storage.
    pub fn generate() -> JoinCode {
        let mut rng = rand::thread_rng();
        let code = (0..JOIN_CODE_LENGTH)
            .map(|_| JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())] as char)
            .collect();
        JoinCode(code)
    }
}

/// Opaque identifier of one live socket connection (32 hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of this server process on the broadcast backbone.
///
/// `server-{unix seconds}-{8 random alphanumerics}`, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(String);

impl ServerId {
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self(format!("server-{}-{}", Utc::now().timestamp(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allowed per-question time limits, in seconds
pub const ALLOWED_TIME_LIMITS: [u32; 5] = [5, 10, 20, 45, 80];

/// Time given to answer a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TimeLimit(u32);

impl TimeLimit {
    pub fn from_secs(secs: u32) -> Result<Self, ValueObjectError> {
        if !ALLOWED_TIME_LIMITS.contains(&secs) {
            return Err(ValueObjectError::InvalidTimeLimit(secs));
        }
        Ok(Self(secs))
    }

    pub fn secs(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.0))
    }
}

impl TryFrom<u32> for TimeLimit {
    type Error = ValueObjectError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_secs(value)
    }
}

impl From<TimeLimit> for u32 {
    fn from(limit: TimeLimit) -> Self {
        limit.0
    }
}
