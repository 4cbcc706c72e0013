//! Thermometer readings returned by `/data/thermodocks`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One body temperature reading.
///
/// `updatedDate` on the wire is the measurement time in epoch milliseconds.
/// Every field tolerates being absent so one incomplete record does not
/// fail the whole list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thermodock {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(
        rename = "updatedDate",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub measurement_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub activity_status: i32,
    #[serde(default)]
    pub mood: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub body_temperature: f32,
    #[serde(default)]
    pub body_temperature_target_min: f32,
    #[serde(default)]
    pub body_temperature_target_max: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_serial_id: Option<String>,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_provider_json() {
        let json = r#"[{
            "id": "0b6f3c7e-1111-4c1e-9a55-8f3a4c6e2d10",
            "active": true,
            "updatedDate": 1709287200000,
            "version": 2,
            "activityStatus": 1,
            "mood": 0,
            "note": "after run",
            "bodyTemperature": 37.4,
            "bodyTemperatureTargetMin": 36.0,
            "bodyTemperatureTargetMax": 37.5,
            "moduleSerialId": "TD-0042"
        }]"#;
        let readings: Vec<Thermodock> = serde_json::from_str(json).unwrap();
        assert_eq!(readings.len(), 1);
        let r = &readings[0];
        assert_eq!(r.id, "0b6f3c7e-1111-4c1e-9a55-8f3a4c6e2d10");
        assert_eq!(
            r.measurement_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(r.body_temperature, 37.4);
        assert_eq!(r.module_serial_id.as_deref(), Some("TD-0042"));
    }

    #[test]
    fn optional_fields_default() {
        let json = r#"{"id":"x","updatedDate":0,"bodyTemperature":36.6}"#;
        let r: Thermodock = serde_json::from_str(json).unwrap();
        assert!(r.active);
        assert_eq!(r.version, 0);
        assert!(r.note.is_none());
        assert_eq!(r.measurement_date.map(|d| d.timestamp_millis()), Some(0));
    }

    #[test]
    fn serializes_back_to_wire_names() {
        let json = r#"{"id":"x","updatedDate":1000,"bodyTemperature":36.6}"#;
        let r: Thermodock = serde_json::from_str(json).unwrap();
        let out = serde_json::to_value(&r).unwrap();
        assert_eq!(out["updatedDate"], 1000);
        assert!(out.get("bodyTemperature").is_some());
        assert!(out.get("note").is_none());
    }

    #[test]
    fn incomplete_record_does_not_drop_the_list() {
        let json = r#"[
            {"active":true},
            {"id":"b","updatedDate":1000,"bodyTemperature":36.9}
        ]"#;
        let readings: Vec<Thermodock> = serde_json::from_str(json).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].id, "");
        assert!(readings[0].measurement_date.is_none());
        assert_eq!(readings[0].body_temperature, 0.0);
        assert_eq!(readings[1].id, "b");

        let out = serde_json::to_value(&readings[0]).unwrap();
        assert!(out.get("updatedDate").is_none());
    }
}
