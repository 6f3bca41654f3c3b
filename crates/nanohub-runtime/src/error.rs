// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types of the runtime.
//!
//! Each request path has its own enum. Nanoapps never see these directly: the
//! `From` impls at the bottom fold them into [`ApiError`].

use nanohub_core::sensor::{SensorHandle, SensorType};
use nanohub_core::{ApiError, AppId, InstanceId, TimerHandle};

/// Errors from posting an event to the loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostEventError {
    /// The loop was stopped.
    #[error("event loop is not running")]
    NotRunning,
    /// Every event of the pool is live.
    #[error("event pool exhausted ({capacity} events live)")]
    PoolExhausted {
        /// Size of the pool.
        capacity: usize,
    },
    /// The dispatch queue is full.
    #[error("dispatch queue is full")]
    QueueFull,
}

/// Errors from loading a nanoapp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartNanoappError {
    /// A nanoapp with the same app id is already running.
    #[error("app 0x{app_id:016x} already exists as instance {existing}")]
    DuplicateAppId {
        /// The app id being loaded.
        app_id: AppId,
        /// The running instance.
        existing: InstanceId,
    },
    /// The nanoapp table is full.
    #[error("cannot load more than {max} nanoapps")]
    TooManyNanoapps {
        /// Table capacity.
        max: usize,
    },
    /// The nanoapp's `start` returned false.
    #[error("app 0x{app_id:016x} failed to start")]
    StartFailed {
        /// The app id being loaded.
        app_id: AppId,
    },
}

/// Errors from the timer pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The timer queue is full.
    #[error("too many timers")]
    TooManyTimers,
    /// No pending timer has this handle.
    #[error("no timer with handle {0}")]
    NotFound(TimerHandle),
    /// The timer belongs to another nanoapp.
    #[error("timer {0} is owned by another nanoapp")]
    NotOwner(TimerHandle),
    /// The system timer refused to arm.
    #[error("failed to arm the system timer")]
    ArmFailed,
}

/// Errors from configuring a sensor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorRequestError {
    /// The handle does not name a known sensor type.
    #[error("invalid sensor handle {0}")]
    InvalidHandle(SensorHandle),
    /// The platform does not expose this sensor.
    #[error("sensor {0} is not present")]
    NotPresent(SensorType),
    /// The request does not match the sensor's capabilities.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    /// The platform rejected the merged request.
    #[error("platform rejected the request for {0}")]
    PlatformRejected(SensorType),
}

/// Errors from the wifi request manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WifiRequestError {
    /// The scan monitor transition queue is full.
    #[error("too many scan monitor state transitions")]
    TooManyTransitions,
    /// The platform did not accept the call.
    #[error("wifi platform rejected the request")]
    PlatformRejected,
    /// An active scan is already in flight.
    #[error("an active scan request is already in flight")]
    ScanInFlight,
    /// The nanoapp is not loaded.
    #[error("nanoapp {0} does not exist")]
    UnknownNanoapp(InstanceId),
    /// The result event could not be posted.
    #[error(transparent)]
    Post(#[from] PostEventError),
}

/// Errors from the GNSS request manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GnssRequestError {
    /// The location session transition queue is full.
    #[error("too many location session transitions")]
    TooManyTransitions,
    /// The platform did not accept the call.
    #[error("gnss platform rejected the request")]
    PlatformRejected,
    /// The nanoapp is not loaded.
    #[error("nanoapp {0} does not exist")]
    UnknownNanoapp(InstanceId),
    /// The result event could not be posted.
    #[error(transparent)]
    Post(#[from] PostEventError),
}

/// Errors from the WWAN request manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WwanRequestError {
    /// A cell info request is already in flight.
    #[error("a cell info request is already in flight")]
    RequestInFlight,
    /// The platform did not accept the call.
    #[error("wwan platform rejected the request")]
    PlatformRejected,
}

/// Errors from validating a [`crate::RuntimeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A capacity was zero.
    #[error("{field} must be greater than zero")]
    ZeroCapacity {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl From<PostEventError> for ApiError {
    fn from(err: PostEventError) -> Self {
        match err {
            PostEventError::NotRunning => ApiError::NotRunning,
            other => ApiError::OutOfCapacity(other.to_string()),
        }
    }
}

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::TooManyTimers => ApiError::OutOfCapacity(err.to_string()),
            TimerError::NotFound(_) | TimerError::NotOwner(_) => {
                ApiError::InvalidArgument(err.to_string())
            }
            TimerError::ArmFailed => ApiError::Rejected(err.to_string()),
        }
    }
}

impl From<SensorRequestError> for ApiError {
    fn from(err: SensorRequestError) -> Self {
        match err {
            SensorRequestError::InvalidHandle(_) | SensorRequestError::InvalidRequest(_) => {
                ApiError::InvalidArgument(err.to_string())
            }
            SensorRequestError::NotPresent(_) => ApiError::NotSupported(err.to_string()),
            SensorRequestError::PlatformRejected(_) => ApiError::Rejected(err.to_string()),
        }
    }
}

impl From<WifiRequestError> for ApiError {
    fn from(err: WifiRequestError) -> Self {
        match err {
            WifiRequestError::TooManyTransitions => ApiError::OutOfCapacity(err.to_string()),
            WifiRequestError::PlatformRejected => ApiError::Rejected(err.to_string()),
            WifiRequestError::ScanInFlight => ApiError::Busy(err.to_string()),
            WifiRequestError::UnknownNanoapp(_) => ApiError::InvalidContext,
            WifiRequestError::Post(post) => post.into(),
        }
    }
}

impl From<GnssRequestError> for ApiError {
    fn from(err: GnssRequestError) -> Self {
        match err {
            GnssRequestError::TooManyTransitions => ApiError::OutOfCapacity(err.to_string()),
            GnssRequestError::PlatformRejected => ApiError::Rejected(err.to_string()),
            GnssRequestError::UnknownNanoapp(_) => ApiError::InvalidContext,
            GnssRequestError::Post(post) => post.into(),
        }
    }
}

impl From<WwanRequestError> for ApiError {
    fn from(err: WwanRequestError) -> Self {
        match err {
            WwanRequestError::RequestInFlight => ApiError::Busy(err.to_string()),
            WwanRequestError::PlatformRejected => ApiError::Rejected(err.to_string()),
        }
    }
}
