use crate::{
    calibration,
    error::DecodeError,
    reading::{BRIDGE_SENSOR, PRESSURE_MT, SensorReading},
    wind,
};
use std::collections::HashMap;

/// Form-decoded upload body. The first occurrence of a key wins and empty
/// values count as absent.
struct Values(HashMap<String, String>);

impl Values {
    fn parse(payload: &str) -> Result<Self, DecodeError> {
        // form_urlencoded passes broken escapes through as text
        if let Some(escape) = invalid_escape(payload) {
            return Err(DecodeError::InvalidEscape(escape.to_string()));
        }

        let mut map = HashMap::new();
        for (key, value) in form_urlencoded::parse(payload.as_bytes()) {
            map.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Ok(Values(map))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// First `%` escape in `payload` that is not followed by two hex digits.
fn invalid_escape(payload: &str) -> Option<&str> {
    let bytes = payload.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'%')
        .map(|(i, _)| i)
        .find(|&i| {
            !bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
        })
        .map(|i| payload.get(i..payload.len().min(i + 3)).unwrap_or("%"))
}

/// Decode a bridge upload body (`id=...&mt=...&...`) into a reading.
pub fn decode(payload: &str) -> Result<SensorReading, DecodeError> {
    let values = Values::parse(payload)?;

    let mt = values.get("mt").ok_or(DecodeError::MissingField("mt"))?;
    let bridge_id = values.get("id").ok_or(DecodeError::MissingField("id"))?;

    let mut reading = SensorReading::new();
    reading.bridge_id = bridge_id.to_string();
    reading.mt = mt.to_string();

    if mt == PRESSURE_MT {
        reading.sensor = Some(BRIDGE_SENSOR.to_string());
        reading.pressure_pa = Some(calibration::compensate(|k| values.get(k))?);
        return Ok(reading);
    }

    reading.sensor = values.get("sensor").map(str::to_string);
    reading.temperature_c = values.get("temperature").map(temperature).transpose()?;
    reading.humidity = values.get("humidity").map(humidity).transpose()?;
    reading.rainfall_mm = values.get("rainfall").map(rainfall).transpose()?;
    reading.wind_kmh = values.get("windspeed").map(windspeed).transpose()?;
    reading.wind_direction = values.get("winddir").map(wind_direction).transpose()?;
    reading.battery = values.get("battery").map(str::to_string);
    reading.signal_rssi = values.get("rssi").map(signal_quality).transpose()?;

    Ok(reading)
}

/// Canonical JSON form of a reading.
pub fn encode(reading: &SensorReading) -> Result<String, serde_json::Error> {
    serde_json::to_string(reading)
}

/// Inverse of [`encode`].
pub fn parse(json: &str) -> Result<SensorReading, serde_json::Error> {
    serde_json::from_str(json)
}

fn malformed(field: &'static str, value: &str) -> DecodeError {
    DecodeError::MalformedField {
        field,
        value: value.to_string(),
    }
}

/// Parse `value` with `head` leading and `tail` trailing characters dropped.
fn digits(field: &'static str, value: &str, head: usize, tail: usize) -> Result<i64, DecodeError> {
    value
        .len()
        .checked_sub(tail)
        .filter(|end| *end >= head)
        .and_then(|end| value.get(head..end))
        .and_then(|slice| slice.parse::<i64>().ok())
        .ok_or_else(|| malformed(field, value))
}

// AXYYZZZZZZ: X.Y °C, sign included in X. Only 2 decimals are kept, the
// third one rounds.
pub(crate) fn temperature(value: &str) -> Result<f32, DecodeError> {
    let t = digits("temperature", value, 1, 3)?;
    let t = t.checked_add(5).ok_or_else(|| malformed("temperature", value))?;
    Ok((t / 10) as f32 / 100.0)
}

// AXXXY: X.Y %
pub(crate) fn humidity(value: &str) -> Result<f32, DecodeError> {
    let h = digits("humidity", value, 1, 0)?;
    Ok(h as f32 / 10.0)
}

// AXXXXYYY: X.Y mm
pub(crate) fn rainfall(value: &str) -> Result<f32, DecodeError> {
    let r = digits("rainfall", value, 1, 0)?;
    Ok(r as f32 / 1000.0)
}

// AXXXXXXYYY: X.Y mm/s, km/h is X * 36 / 10000. Two decimals, +50 rounds.
pub(crate) fn windspeed(value: &str) -> Result<f32, DecodeError> {
    let w = digits("windspeed", value, 1, 3)?;
    let scaled = w
        .checked_mul(36)
        .and_then(|w| w.checked_add(50))
        .ok_or_else(|| malformed("windspeed", value))?;
    Ok((scaled / 100) as f32 / 100.0)
}

pub(crate) fn wind_direction(value: &str) -> Result<f32, DecodeError> {
    wind::bearing(value).ok_or_else(|| DecodeError::UnknownWindDirection(value.to_string()))
}

// 0 to 4 bars, turned into a percentage.
pub(crate) fn signal_quality(value: &str) -> Result<i64, DecodeError> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|bars| bars.checked_mul(25))
        .ok_or_else(|| malformed("rssi", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoefficientError;
    use chrono::SubsecRound;

    const WEATHER: &str = "id=24C86E0449A0&sensor=00015&mt=5N1x31&windspeed=A001660000\
        &winddir=A&rainfall=A0000000&battery=normal&rssi=3";

    const PRESSURE: &str = "id=24C86E0449A0&mt=pressure&C1=4E8A&C2=0DCD&C3=0188&C4=0AA6\
        &C5=82DA&C6=1A8E&C7=09C4&A=1A&B=0A&C=06&D=09&PR=6A47&TR=8187";

    #[test]
    fn test_field_rules() {
        assert_eq!(temperature("A234000"), Ok(0.23));
        assert_eq!(temperature("A-0234000"), Ok(-0.22));
        assert_eq!(humidity("A455"), Ok(45.5));
        assert_eq!(rainfall("A1234"), Ok(1.234));
        assert_eq!(windspeed("A1000000"), Ok(3.6));
        assert_eq!(wind_direction("5"), Ok(0.0));
        assert_eq!(wind_direction("A"), Ok(225.0));
        assert_eq!(signal_quality("2"), Ok(50));
    }

    #[test]
    fn test_unknown_wind_direction() {
        assert_eq!(
            wind_direction("Z"),
            Err(DecodeError::UnknownWindDirection("Z".to_string()))
        );
    }

    #[test]
    fn test_short_values_are_malformed() {
        assert_eq!(
            temperature("A12"),
            Err(DecodeError::MalformedField {
                field: "temperature",
                value: "A12".to_string()
            })
        );
        assert!(matches!(
            windspeed("A"),
            Err(DecodeError::MalformedField { field: "windspeed", .. })
        ));
        assert!(matches!(
            humidity("A"),
            Err(DecodeError::MalformedField { field: "humidity", .. })
        ));
        assert!(matches!(
            rainfall("Ax12"),
            Err(DecodeError::MalformedField { field: "rainfall", .. })
        ));
    }

    #[test]
    fn test_decode_weather_report() {
        let reading = decode(WEATHER).unwrap();

        assert_eq!(reading.bridge_id(), "24C86E0449A0");
        assert_eq!(reading.mt(), "5N1x31");
        assert_eq!(reading.sensor(), Some("00015"));
        assert_eq!(reading.wind_kmh(), Some(5.98));
        assert_eq!(reading.wind_direction(), Some(225.0));
        assert_eq!(reading.rainfall_mm(), Some(0.0));
        assert_eq!(reading.battery(), Some("normal"));
        assert_eq!(reading.signal_rssi(), Some(75));
        assert_eq!(reading.temperature_c(), None);
        assert_eq!(reading.humidity(), None);
        assert_eq!(reading.pressure_pa(), None);
    }

    #[test]
    fn test_decode_only_required_fields() {
        let reading = decode("mt=tower&id=24C86E0449A0").unwrap();

        assert_eq!(reading.sensor(), None);
        assert_eq!(reading.battery(), None);
        assert_eq!(reading.signal_rssi(), None);
        assert_eq!(reading.temperature_c(), None);

        let json: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&reading.to_json().unwrap()).unwrap();
        let keys: Vec<&str> = json.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["uuid", "timestamp", "bridge_id", "mt"] {
            assert!(keys.contains(&key));
        }
    }

    #[test]
    fn test_empty_optional_values_are_absent() {
        let reading = decode("mt=tower&id=b&temperature=&rssi=").unwrap();
        assert_eq!(reading.temperature_c(), None);
        assert_eq!(reading.signal_rssi(), None);
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(decode("id=b"), Err(DecodeError::MissingField("mt")));
        assert_eq!(decode("mt=tower"), Err(DecodeError::MissingField("id")));
        assert_eq!(decode("mt=&id="), Err(DecodeError::MissingField("mt")));
        // checked before anything else
        assert_eq!(
            decode("winddir=Z&id=b"),
            Err(DecodeError::MissingField("mt"))
        );
    }

    #[test]
    fn test_first_malformed_field_wins() {
        let err = decode("mt=tower&id=b&rssi=x&winddir=Z&humidity=Ay").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MalformedField { field: "humidity", .. }
        ));

        let err = decode("mt=tower&id=b&rssi=x&winddir=Z").unwrap_err();
        assert_eq!(err, DecodeError::UnknownWindDirection("Z".to_string()));
    }

    #[test]
    fn test_first_value_of_repeated_key_wins() {
        let reading = decode("mt=tower&id=first&id=second").unwrap();
        assert_eq!(reading.bridge_id(), "first");
    }

    #[test]
    fn test_broken_escape_fails_whole_payload() {
        assert_eq!(
            decode("mt=tower&id=b&humidity=%zz"),
            Err(DecodeError::InvalidEscape("%zz".to_string()))
        );
        assert_eq!(
            decode("mt=tower&id=b&battery=low%2"),
            Err(DecodeError::InvalidEscape("%2".to_string()))
        );
        // reported before the required keys are looked at
        assert_eq!(
            decode("id=b%"),
            Err(DecodeError::InvalidEscape("%".to_string()))
        );
        assert!(decode("mt=tower&id=b&battery=100%25").is_ok());
    }

    #[test]
    fn test_percent_decoding() {
        let reading = decode("mt=tower&id=b&battery=low%20power+now").unwrap();
        assert_eq!(reading.battery(), Some("low power now"));
    }

    #[test]
    fn test_decode_pressure() {
        let reading = decode(PRESSURE).unwrap();

        assert_eq!(reading.sensor(), Some(BRIDGE_SENSOR));
        assert_eq!(reading.pressure_pa(), Some(57629));
        assert!(reading.is_pressure());
    }

    #[test]
    fn test_pressure_ignores_generic_fields() {
        let payload = format!("{PRESSURE}&sensor=00015&temperature=A234000&rssi=4");
        let reading = decode(&payload).unwrap();

        assert_eq!(reading.sensor(), Some(BRIDGE_SENSOR));
        assert_eq!(reading.temperature_c(), None);
        assert_eq!(reading.signal_rssi(), None);
    }

    #[test]
    fn test_incomplete_pressure_fails() {
        let payload = PRESSURE.replace("&PR=6A47", "");
        assert_eq!(
            decode(&payload),
            Err(DecodeError::Coefficient(CoefficientError::Missing("PR")))
        );

        let payload = PRESSURE.replace("C4=0AA6", "C4=0AG6");
        assert!(matches!(
            decode(&payload),
            Err(DecodeError::Coefficient(CoefficientError::Malformed { key: "C4", .. }))
        ));
    }

    #[test]
    fn test_decode_is_repeatable() {
        let a = decode(WEATHER).unwrap();
        let b = decode(WEATHER).unwrap();

        assert_ne!(a.uuid(), b.uuid());

        let mut b = b;
        b.uuid = a.uuid;
        b.timestamp = a.timestamp;
        assert_eq!(a, b);
    }

    #[test]
    fn test_json_round_trip() {
        let reading = decode(WEATHER).unwrap();
        let json = encode(&reading).unwrap();
        let parsed = parse(&json).unwrap();

        assert_eq!(encode(&parsed).unwrap(), json);
        assert_eq!(parsed.uuid(), reading.uuid());
        assert_eq!(parsed.timestamp(), reading.timestamp().trunc_subsecs(0));
        assert_eq!(parsed.wind_kmh(), reading.wind_kmh());
    }

    #[test]
    fn test_canonical_json_shape() {
        let json = r#"{"uuid":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","timestamp":"2024-03-01T12:30:05Z","bridge_id":"24C86E0449A0","sensor":"bridge","mt":"pressure","pressure_pa":101325}"#;
        let reading = parse(json).unwrap();

        assert_eq!(reading.pressure_pa(), Some(101325));
        assert_eq!(reading.battery(), None);
        assert_eq!(encode(&reading).unwrap(), json);
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let json = r#"{"uuid":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","timestamp":"2024-03-01T12:30:05Z","bridge_id":"b","mt":"tower","dew_point":3.1}"#;
        assert!(parse(json).is_err());
    }

    #[test]
    fn test_parse_truncates_fractional_seconds_on_encode() {
        let json = r#"{"uuid":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","timestamp":"2024-03-01T12:30:05.750+01:00","bridge_id":"b","mt":"tower"}"#;
        let reading = parse(json).unwrap();

        assert!(encode(&reading).unwrap().contains(r#""timestamp":"2024-03-01T11:30:05Z""#));
    }
}
