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

//! Sensor vocabulary shared by nanoapps, the runtime, and sensor backends.

use crate::event::{EventType, EVENT_SENSOR_DATA_BASE};
use crate::time::Nanoseconds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The sensor types known to the runtime, with their API numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SensorType {
    /// Three-axis accelerometer.
    Accelerometer = 1,
    /// Instant motion detector (one-shot).
    InstantMotion = 2,
    /// Stationary detector (one-shot).
    StationaryDetect = 3,
    /// Three-axis gyroscope.
    Gyroscope = 6,
    /// Three-axis magnetometer.
    GeomagneticField = 8,
    /// Barometer.
    Pressure = 10,
    /// Ambient light (on-change).
    Light = 12,
    /// Proximity (on-change).
    Proximity = 13,
    /// Uncalibrated gyroscope.
    UncalibratedGyroscope = 54,
    /// Uncalibrated accelerometer.
    UncalibratedAccelerometer = 55,
    /// Accelerometer die temperature.
    AccelerometerTemperature = 56,
    /// Gyroscope die temperature.
    GyroscopeTemperature = 57,
    /// Uncalibrated magnetometer.
    UncalibratedGeomagneticField = 58,
}

impl SensorType {
    /// Every known sensor type.
    pub const ALL: [SensorType; 13] = [
        SensorType::Accelerometer,
        SensorType::InstantMotion,
        SensorType::StationaryDetect,
        SensorType::Gyroscope,
        SensorType::GeomagneticField,
        SensorType::Pressure,
        SensorType::Light,
        SensorType::Proximity,
        SensorType::UncalibratedGyroscope,
        SensorType::UncalibratedAccelerometer,
        SensorType::AccelerometerTemperature,
        SensorType::GyroscopeTemperature,
        SensorType::UncalibratedGeomagneticField,
    ];

    /// Maps an API sensor type value. Returns `None` for unknown values.
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == raw)
    }

    /// The API sensor type value.
    pub fn as_raw(self) -> u8 {
        self as u8
    }

    /// A short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            SensorType::Accelerometer => "Accelerometer",
            SensorType::InstantMotion => "Instant Motion",
            SensorType::StationaryDetect => "Stationary Detect",
            SensorType::Gyroscope => "Gyroscope",
            SensorType::GeomagneticField => "Geomagnetic Field",
            SensorType::Pressure => "Pressure",
            SensorType::Light => "Light",
            SensorType::Proximity => "Proximity",
            SensorType::UncalibratedGyroscope => "Uncal Gyroscope",
            SensorType::UncalibratedAccelerometer => "Uncal Accelerometer",
            SensorType::AccelerometerTemperature => "Accelerometer Temp",
            SensorType::GyroscopeTemperature => "Gyroscope Temp",
            SensorType::UncalibratedGeomagneticField => "Uncal Geomagnetic Field",
        }
    }

    /// One-shot sensors fire once per request and only accept one-shot modes.
    pub fn is_one_shot(self) -> bool {
        matches!(self, SensorType::InstantMotion | SensorType::StationaryDetect)
    }

    /// On-change sensors only report when the value changes; the runtime caches
    /// their last sample for new subscribers.
    pub fn is_on_change(self) -> bool {
        matches!(self, SensorType::Light | SensorType::Proximity)
    }

    /// The layout of the samples this sensor produces.
    pub fn sample_type(self) -> SensorSampleType {
        match self {
            SensorType::Accelerometer
            | SensorType::Gyroscope
            | SensorType::GeomagneticField
            | SensorType::UncalibratedAccelerometer
            | SensorType::UncalibratedGyroscope
            | SensorType::UncalibratedGeomagneticField => SensorSampleType::ThreeAxis,
            SensorType::Pressure
            | SensorType::Light
            | SensorType::AccelerometerTemperature
            | SensorType::GyroscopeTemperature => SensorSampleType::Float,
            SensorType::InstantMotion | SensorType::StationaryDetect => {
                SensorSampleType::Occurrence
            }
            SensorType::Proximity => SensorSampleType::Byte,
        }
    }

    /// The event type of this sensor's sample events.
    pub fn sample_event_type(self) -> EventType {
        EVENT_SENSOR_DATA_BASE + EventType::from(self.as_raw())
    }

    /// Inverse of [`SensorType::sample_event_type`].
    pub fn from_sample_event_type(event_type: EventType) -> Option<Self> {
        event_type
            .checked_sub(EVENT_SENSOR_DATA_BASE)
            .and_then(|raw| u8::try_from(raw).ok())
            .and_then(Self::from_raw)
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout of a sensor's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorSampleType {
    /// x/y/z floats.
    ThreeAxis,
    /// A single float.
    Float,
    /// A single byte.
    Byte,
    /// A timestamp only.
    Occurrence,
}

/// The mode of a sensor request.
///
/// Variants are declared in ascending priority, so `Ord` gives the merge order
/// `Off < PassiveOneShot < PassiveContinuous < ActiveOneShot < ActiveContinuous`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SensorMode {
    /// No request.
    #[default]
    Off,
    /// Receive samples produced for other clients, one-shot.
    PassiveOneShot,
    /// Receive samples produced for other clients, continuously.
    PassiveContinuous,
    /// Power the sensor for a single sample.
    ActiveOneShot,
    /// Power the sensor continuously.
    ActiveContinuous,
}

impl SensorMode {
    /// Maps an API configure-mode value (`DONE = 0`, `PASSIVE_CONTINUOUS = 2`,
    /// `CONTINUOUS = 3`, `PASSIVE_ONE_SHOT = 4`, `ONE_SHOT = 5`).
    /// Unknown values map to [`SensorMode::Off`], which has no power impact.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            3 => SensorMode::ActiveContinuous,
            5 => SensorMode::ActiveOneShot,
            2 => SensorMode::PassiveContinuous,
            4 => SensorMode::PassiveOneShot,
            _ => SensorMode::Off,
        }
    }

    /// `true` for the two continuous modes.
    pub fn is_continuous(self) -> bool {
        matches!(
            self,
            SensorMode::ActiveContinuous | SensorMode::PassiveContinuous
        )
    }

    /// `true` for the two one-shot modes.
    pub fn is_one_shot(self) -> bool {
        matches!(self, SensorMode::ActiveOneShot | SensorMode::PassiveOneShot)
    }

    /// `true` for the two active modes.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SensorMode::ActiveContinuous | SensorMode::ActiveOneShot
        )
    }
}

/// Opaque handle a nanoapp uses to address a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorHandle(pub u32);

impl SensorHandle {
    /// The handle of a sensor type.
    pub fn from_sensor_type(sensor_type: SensorType) -> Self {
        Self(u32::from(sensor_type.as_raw()))
    }

    /// The sensor type this handle addresses, if valid.
    pub fn sensor_type(self) -> Option<SensorType> {
        u8::try_from(self.0).ok().and_then(SensorType::from_raw)
    }
}

impl fmt::Display for SensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static information about a sensor, as returned to nanoapps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    /// Platform name of the sensor.
    pub name: String,
    /// Sensor type.
    pub sensor_type: SensorType,
    /// See [`SensorType::is_on_change`].
    pub is_on_change: bool,
    /// See [`SensorType::is_one_shot`].
    pub is_one_shot: bool,
    /// Shortest supported interval; [`Nanoseconds::DEFAULT`] for one-shot sensors.
    pub min_interval: Nanoseconds,
}

/// Readings carried by a sample event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorReadings {
    /// x/y/z triples.
    ThreeAxis(Vec<[f32; 3]>),
    /// Scalar readings.
    Float(Vec<f32>),
    /// Byte readings, e.g. near/far.
    Byte(Vec<u8>),
    /// Occurrence timestamps, relative to the base timestamp.
    Occurrence(Vec<Nanoseconds>),
}

impl SensorReadings {
    /// Number of readings.
    pub fn len(&self) -> usize {
        match self {
            SensorReadings::ThreeAxis(v) => v.len(),
            SensorReadings::Float(v) => v.len(),
            SensorReadings::Byte(v) => v.len(),
            SensorReadings::Occurrence(v) => v.len(),
        }
    }

    /// `true` when there are no readings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The payload of a sensor sample event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSampleData {
    /// Handle of the sensor that produced the samples.
    pub sensor_handle: SensorHandle,
    /// Timestamp of the first reading.
    pub base_timestamp: Nanoseconds,
    /// The readings.
    pub readings: SensorReadings,
}
