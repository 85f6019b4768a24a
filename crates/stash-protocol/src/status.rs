use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::StashMessage;

/// Message sent in place of any internal failure detail.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Outcome categories reported to callers. Values follow gRPC numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Code {
    Ok = 0,
    InvalidArgument = 3,
    NotFound = 5,
    AlreadyExists = 6,
    Internal = 13,
}

impl Code {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            3 => Some(Self::InvalidArgument),
            5 => Some(Self::NotFound),
            6 => Some(Self::AlreadyExists),
            13 => Some(Self::Internal),
            _ => None,
        }
    }

    /// HTTP status used when the code is reported before any response frame.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::InvalidArgument => 400,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// A code plus a caller-safe message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    /// Internal failure. Detail never leaves the server.
    pub fn internal() -> Self {
        Self::new(Code::Internal, INTERNAL_ERROR_MESSAGE)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_message(&self) -> StashMessage {
        StashMessage::Error {
            code: self.code.as_u32(),
            message: self.message.clone(),
        }
    }

    /// Interpret an `Error` frame. Unknown codes are read as internal.
    pub fn from_message(msg: &StashMessage) -> Option<Self> {
        match msg {
            StashMessage::Error { code, message } => Some(Self::new(
                Code::from_u32(*code).unwrap_or(Code::Internal),
                message.clone(),
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}
