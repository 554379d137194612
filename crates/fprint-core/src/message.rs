//! Native sensor messages and their typed form
//!
//! A capability provider reports hardware events as a tagged record with a
//! numeric message type. [`Notification::decode`] turns that record into a
//! typed notification; a message type outside the known set is a protocol
//! violation that the caller logs and drops.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::HardwareAuthToken;

/// Native message categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Error,
    Acquired,
    TemplateEnrolling,
    TemplateRemoved,
    Authenticated,
    TemplateEnumerating,
}

impl MessageType {
    pub const fn code(self) -> i32 {
        match self {
            MessageType::Error => -1,
            MessageType::Acquired => 1,
            MessageType::TemplateEnrolling => 3,
            MessageType::TemplateRemoved => 4,
            MessageType::Authenticated => 5,
            MessageType::TemplateEnumerating => 6,
        }
    }
}

impl TryFrom<i32> for MessageType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(MessageType::Error),
            1 => Ok(MessageType::Acquired),
            3 => Ok(MessageType::TemplateEnrolling),
            4 => Ok(MessageType::TemplateRemoved),
            5 => Ok(MessageType::Authenticated),
            6 => Ok(MessageType::TemplateEnumerating),
            other => Err(Error::ProtocolViolation { msg_type: other }),
        }
    }
}

/// Template identity as reported by the module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finger {
    /// Template id; zero means "no template"
    pub fid: i32,
    /// Group (user) the template belongs to
    pub gid: i32,
}

/// A native message as delivered by the module
///
/// Fields not meaningful for a given `msg_type` are left at their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub msg_type: i32,
    /// Error or acquisition code
    pub code: i32,
    pub finger: Finger,
    /// Samples remaining (enrolling) or templates remaining (removed, enumerating)
    pub remaining: u32,
    pub hat: Option<HardwareAuthToken>,
}

impl RawMessage {
    pub fn error(code: i32) -> Self {
        Self {
            msg_type: MessageType::Error.code(),
            code,
            ..Default::default()
        }
    }

    pub fn acquired(info: i32) -> Self {
        Self {
            msg_type: MessageType::Acquired.code(),
            code: info,
            ..Default::default()
        }
    }

    pub fn enrolling(fid: i32, gid: i32, samples_remaining: u32) -> Self {
        Self {
            msg_type: MessageType::TemplateEnrolling.code(),
            finger: Finger { fid, gid },
            remaining: samples_remaining,
            ..Default::default()
        }
    }

    pub fn removed(fid: i32, gid: i32, remaining_templates: u32) -> Self {
        Self {
            msg_type: MessageType::TemplateRemoved.code(),
            finger: Finger { fid, gid },
            remaining: remaining_templates,
            ..Default::default()
        }
    }

    pub fn authenticated(fid: i32, gid: i32, hat: Option<HardwareAuthToken>) -> Self {
        Self {
            msg_type: MessageType::Authenticated.code(),
            finger: Finger { fid, gid },
            hat,
            ..Default::default()
        }
    }

    pub fn enumerating(fid: i32, gid: i32, remaining_templates: u32) -> Self {
        Self {
            msg_type: MessageType::TemplateEnumerating.code(),
            finger: Finger { fid, gid },
            remaining: remaining_templates,
            ..Default::default()
        }
    }
}

/// Typed hardware event, still carrying native codes
///
/// Ephemeral: produced and consumed within a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error { code: i32 },
    Acquired { info: i32 },
    EnrollProgress { template_id: i32, remaining: u32 },
    Authenticated { template_id: i32, hat: Option<HardwareAuthToken> },
    AuthenticationFailed,
    EnrollmentsRemoved { ids: Vec<i32>, remaining: u32 },
    EnrollmentsEnumerated { ids: Vec<i32>, remaining: u32 },
}

impl Notification {
    /// Decode a native message
    ///
    /// An authenticated message without a template id is a rejected match.
    pub fn decode(raw: RawMessage) -> Result<Self> {
        let notification = match MessageType::try_from(raw.msg_type)? {
            MessageType::Error => Notification::Error { code: raw.code },
            MessageType::Acquired => Notification::Acquired { info: raw.code },
            MessageType::TemplateEnrolling => Notification::EnrollProgress {
                template_id: raw.finger.fid,
                remaining: raw.remaining,
            },
            MessageType::TemplateRemoved => Notification::EnrollmentsRemoved {
                ids: template_ids(raw.finger.fid),
                remaining: raw.remaining,
            },
            MessageType::Authenticated if raw.finger.fid == 0 => {
                Notification::AuthenticationFailed
            }
            MessageType::Authenticated => Notification::Authenticated {
                template_id: raw.finger.fid,
                hat: raw.hat,
            },
            MessageType::TemplateEnumerating => Notification::EnrollmentsEnumerated {
                ids: template_ids(raw.finger.fid),
                remaining: raw.remaining,
            },
        };
        Ok(notification)
    }
}

fn template_ids(fid: i32) -> Vec<i32> {
    if fid == 0 {
        Vec::new()
    } else {
        vec![fid]
    }
}
