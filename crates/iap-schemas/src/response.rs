use std::fmt;

use serde::{Deserialize, Serialize};

/// Response codes reported by the purchasing backend.
///
/// Raw integer values follow the platform contract; anything unrecognised is
/// kept verbatim in `Other` so it can still be reported upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCode {
    ServiceTimeout,
    FeatureNotSupported,
    ServiceDisconnected,
    Ok,
    UserCanceled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
    Other(i32),
}

impl ResponseCode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -3 => ResponseCode::ServiceTimeout,
            -2 => ResponseCode::FeatureNotSupported,
            -1 => ResponseCode::ServiceDisconnected,
            0 => ResponseCode::Ok,
            1 => ResponseCode::UserCanceled,
            2 => ResponseCode::ServiceUnavailable,
            3 => ResponseCode::BillingUnavailable,
            4 => ResponseCode::ItemUnavailable,
            5 => ResponseCode::DeveloperError,
            6 => ResponseCode::Error,
            7 => ResponseCode::ItemAlreadyOwned,
            8 => ResponseCode::ItemNotOwned,
            12 => ResponseCode::NetworkError,
            other => ResponseCode::Other(other),
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            ResponseCode::ServiceTimeout => -3,
            ResponseCode::FeatureNotSupported => -2,
            ResponseCode::ServiceDisconnected => -1,
            ResponseCode::Ok => 0,
            ResponseCode::UserCanceled => 1,
            ResponseCode::ServiceUnavailable => 2,
            ResponseCode::BillingUnavailable => 3,
            ResponseCode::ItemUnavailable => 4,
            ResponseCode::DeveloperError => 5,
            ResponseCode::Error => 6,
            ResponseCode::ItemAlreadyOwned => 7,
            ResponseCode::ItemNotOwned => 8,
            ResponseCode::NetworkError => 12,
            ResponseCode::Other(raw) => *raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::ServiceTimeout => "SERVICE_TIMEOUT",
            ResponseCode::FeatureNotSupported => "FEATURE_NOT_SUPPORTED",
            ResponseCode::ServiceDisconnected => "SERVICE_DISCONNECTED",
            ResponseCode::Ok => "OK",
            ResponseCode::UserCanceled => "USER_CANCELED",
            ResponseCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ResponseCode::BillingUnavailable => "BILLING_UNAVAILABLE",
            ResponseCode::ItemUnavailable => "ITEM_UNAVAILABLE",
            ResponseCode::DeveloperError => "DEVELOPER_ERROR",
            ResponseCode::Error => "ERROR",
            ResponseCode::ItemAlreadyOwned => "ITEM_ALREADY_OWNED",
            ResponseCode::ItemNotOwned => "ITEM_NOT_OWNED",
            ResponseCode::NetworkError => "NETWORK_ERROR",
            ResponseCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any non-OK answer from the backend, with its raw code and message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code} (raw={}): {message}", .code.raw())]
pub struct BackendFailure {
    pub code: ResponseCode,
    pub message: String,
}

impl BackendFailure {
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn disconnected() -> Self {
        Self::new(ResponseCode::ServiceDisconnected, "service disconnected")
    }

    pub fn raw_code(&self) -> i32 {
        self.code.raw()
    }

    /// `true` when the failure means the transport to the backend is gone.
    pub fn is_disconnect(&self) -> bool {
        self.code == ResponseCode::ServiceDisconnected
    }
}
