//! Display metadata for known measurement types.

/// Human-facing metadata for a measurement type.
pub struct MeasurementInfo {
    pub label: &'static str,
    /// Suffix appended directly after the numeric value (may carry its own
    /// leading space, e.g. `" dBm"`).
    pub unit: Option<&'static str>,
}

/// Lookup table for the measurement types the sensors commonly publish.
/// Unknown measurements still work everywhere, they just render without a
/// unit.
pub fn measurement_info(measurement: &str) -> Option<&'static MeasurementInfo> {
    const fn info(label: &'static str, unit: Option<&'static str>) -> MeasurementInfo {
        MeasurementInfo { label, unit }
    }

    static TABLE: &[(&str, MeasurementInfo)] = &[
        ("bri", info("Brightness", Some("%"))),
        ("connected", info("Connected", None)),
        ("hue", info("Hue", Some("°"))),
        ("hum", info("Humidity", Some("%"))),
        ("lux", info("Lux", Some(" lux"))),
        ("on", info("On (enabled)", None)),
        ("rssi", info("RSSI", Some(" dBm"))),
        ("sat", info("Saturation", Some("%"))),
        ("temp", info("Temperature", Some("°C"))),
    ];

    TABLE
        .iter()
        .find(|(name, _)| *name == measurement)
        .map(|(_, info)| info)
}

/// Renders a value with the unit of its measurement type, falling back to
/// `"<value> (<measurement>)"` for unknown types.
pub fn type_value(measurement: &str, value: f64) -> String {
    match measurement_info(measurement) {
        Some(MeasurementInfo {
            unit: Some(unit), ..
        }) => format!("{value}{unit}"),
        Some(_) => format!("{value}"),
        None => format!("{value} ({measurement})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_measurement_gets_unit() {
        assert_eq!(type_value("temp", 21.5), "21.5°C");
        assert_eq!(type_value("rssi", -70.0), "-70 dBm");
    }

    #[test]
    fn unitless_measurement_is_bare() {
        assert_eq!(type_value("connected", 2.0), "2");
    }

    #[test]
    fn unknown_measurement_is_annotated() {
        assert_eq!(type_value("co2", 412.0), "412 (co2)");
    }

    #[test]
    fn values_keep_their_natural_text_form() {
        assert_eq!(type_value("temp", 42.0), "42°C");
        assert_eq!(type_value("temp", 42.25), "42.25°C");
    }
}
