/// Wind rose codes reported by the 5-in-1 sensor, clockwise from north in
/// 22.5° steps.
pub const WIND_ROSE: [(&str, f32); 16] = [
    ("5", 0.0),
    ("7", 22.5),
    ("3", 45.0),
    ("1", 67.5),
    ("9", 90.0),
    ("B", 112.5),
    ("F", 135.0),
    ("D", 157.5),
    ("C", 180.0),
    ("E", 202.5),
    ("A", 225.0),
    ("8", 247.5),
    ("0", 270.0),
    ("2", 292.5),
    ("6", 315.0),
    ("4", 337.5),
];

/// Look up the compass bearing, in degrees, for a wind rose code.
pub fn bearing(code: &str) -> Option<f32> {
    WIND_ROSE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, degrees)| *degrees)
}
