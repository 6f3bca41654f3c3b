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

use nanohub_core::gnss::GnssLocationEvent;
use nanohub_core::pal::{
    GnssPal, GnssPalCallbacks, SensorPal, SensorPalCallbacks, WifiPal, WifiPalCallbacks, WwanPal,
    WwanPalCallbacks,
};
use nanohub_core::sensor::{SensorMode, SensorSampleData, SensorType};
use nanohub_core::wifi::{WifiScanEvent, WifiScanParams};
use nanohub_core::wwan::CellInfoResult;
use nanohub_core::{ErrorCode, Nanoseconds};
use nanohub_infra::sim::{SimGnssPal, SimSensorPal, SimWifiPal, SimWwanPal};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every callback as a short string.
#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl SensorPalCallbacks for Recorder {
    fn sensor_data(
        &self,
        sensor_type: SensorType,
        _data: SensorSampleData,
    ) -> Result<(), SensorSampleData> {
        self.push(format!("sample {sensor_type}"));
        Ok(())
    }
}

impl WifiPalCallbacks for Recorder {
    fn scan_monitor_status_change(&self, enabled: bool, error_code: ErrorCode) {
        self.push(format!("monitor {enabled} {error_code:?}"));
    }

    fn scan_response(&self, pending: bool, error_code: ErrorCode) {
        self.push(format!("response {pending} {error_code:?}"));
    }

    fn scan_event(&self, event: WifiScanEvent) -> Result<(), WifiScanEvent> {
        self.push(format!("scan {}", event.result_total));
        Ok(())
    }
}

impl GnssPalCallbacks for Recorder {
    fn location_status_change(&self, enabled: bool, error_code: ErrorCode) {
        self.push(format!("session {enabled} {error_code:?}"));
    }

    fn location_event(&self, _event: GnssLocationEvent) -> Result<(), GnssLocationEvent> {
        self.push("location".to_string());
        Ok(())
    }
}

impl WwanPalCallbacks for Recorder {
    fn cell_info_result(&self, result: CellInfoResult) -> Result<(), CellInfoResult> {
        self.push(format!("cells {}", result.cells.len()));
        Ok(())
    }
}

/// A runtime that never takes ownership of delivered buffers.
struct Refuser;

impl SensorPalCallbacks for Refuser {
    fn sensor_data(
        &self,
        _sensor_type: SensorType,
        data: SensorSampleData,
    ) -> Result<(), SensorSampleData> {
        Err(data)
    }
}

impl WwanPalCallbacks for Refuser {
    fn cell_info_result(&self, result: CellInfoResult) -> Result<(), CellInfoResult> {
        Err(result)
    }
}

#[test]
fn sensor_backend_records_only_accepted_requests() {
    let mut pal = SimSensorPal::with_default_sensors();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    assert!(pal.open(recorder.clone()));
    assert_eq!(pal.sensors().len(), 5);

    let interval = Nanoseconds::from_millis(20);
    assert!(pal.set_request(SensorType::Gyroscope, SensorMode::ActiveContinuous, interval, Nanoseconds(0)));
    control.set_accept(false);
    assert!(!pal.set_request(SensorType::Gyroscope, SensorMode::Off, interval, Nanoseconds(0)));

    assert_eq!(control.request_count(), 2);
    assert_eq!(
        control.last_request(SensorType::Gyroscope),
        Some((SensorMode::ActiveContinuous, interval, Nanoseconds(0)))
    );
    assert_eq!(control.last_request(SensorType::Light), None);
}

#[test]
fn closed_backends_drop_emitted_data() {
    let mut pal = SimSensorPal::with_default_sensors();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    pal.open(recorder.clone());
    pal.close();
    assert!(!control.is_open());

    let data = SensorSampleData {
        sensor_handle: nanohub_core::sensor::SensorHandle::from_sensor_type(SensorType::Light),
        base_timestamp: Nanoseconds(0),
        readings: nanohub_core::sensor::SensorReadings::Float(vec![1.0]),
    };
    assert!(!control.emit(SensorType::Light, data));
    assert!(recorder.take().is_empty());
}

#[test]
fn wifi_backend_auto_completes_in_order() {
    let mut pal = SimWifiPal::new();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    pal.open(recorder.clone());

    assert!(pal.configure_scan_monitor(true));
    assert!(pal.request_scan(&WifiScanParams::default()));
    assert_eq!(
        recorder.take(),
        vec!["monitor true None", "response true None", "scan 0"]
    );
    assert!(control.monitor_enabled());
    assert_eq!(control.scan_monitor_calls(), vec![true]);
    assert_eq!(control.scan_request_count(), 1);
}

#[test]
fn wifi_backend_waits_when_told_to() {
    let mut pal = SimWifiPal::new();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    pal.open(recorder.clone());
    control.set_auto_complete(false);

    assert!(pal.configure_scan_monitor(true));
    assert!(recorder.take().is_empty());
    assert!(!control.monitor_enabled());

    assert!(control.complete_scan_monitor(true, ErrorCode::Busy));
    assert_eq!(recorder.take(), vec!["monitor true Busy"]);
    assert!(!control.monitor_enabled());
}

#[test]
fn gnss_backend_tracks_session_state() {
    let mut pal = SimGnssPal::new();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    pal.open(recorder.clone());

    assert!(pal.control_location_session(true, Duration::from_secs(1)));
    assert!(control.session_enabled());
    control.set_accept(false);
    assert!(!pal.control_location_session(false, Duration::MAX));
    assert!(control.session_enabled());

    assert_eq!(
        control.session_calls(),
        vec![(true, Duration::from_secs(1)), (false, Duration::MAX)]
    );
    assert_eq!(recorder.take(), vec!["session true None"]);
}

#[test]
fn wwan_backend_reports_configured_cells() {
    let mut pal = SimWwanPal::new();
    let control = pal.control();
    let recorder = Arc::new(Recorder::default());
    pal.open(recorder.clone());

    assert!(pal.request_cell_info());
    assert_eq!(recorder.take(), vec!["cells 0"]);
    assert_eq!(control.request_count(), 1);
}

#[test]
fn refused_buffers_count_as_released() {
    let mut sensors = SimSensorPal::with_default_sensors();
    let sensor_control = sensors.control();
    sensors.open(Arc::new(Refuser));
    let data = SensorSampleData {
        sensor_handle: nanohub_core::sensor::SensorHandle::from_sensor_type(SensorType::Gyroscope),
        base_timestamp: Nanoseconds(0),
        readings: nanohub_core::sensor::SensorReadings::Float(vec![0.5]),
    };
    assert!(sensor_control.emit(SensorType::Gyroscope, data));
    assert_eq!(sensor_control.released_count(), 1);

    let mut wwan = SimWwanPal::new();
    let wwan_control = wwan.control();
    wwan.open(Arc::new(Refuser));
    assert!(wwan.request_cell_info());
    assert_eq!(wwan_control.released_count(), 1);
}
