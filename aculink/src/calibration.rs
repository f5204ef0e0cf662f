use crate::error::CoefficientError;

/// Keys of the pressure message, in the order they are validated.
pub const PRESSURE_KEYS: [&str; 13] = [
    "A", "B", "C", "C1", "C2", "C3", "C4", "C5", "C6", "C7", "D", "PR", "TR",
];

/// Factory calibration words and raw ADC readings of the bridge's
/// barometric sensor, as reported in a `mt=pressure` message.
///
/// `C1`..`C7` and `A`..`D` are calibration constants, `PR` is the raw
/// pressure reading and `TR` the raw temperature reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientSet {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub c1: u64,
    pub c2: u64,
    pub c3: u64,
    pub c4: u64,
    pub c5: u64,
    pub c6: u64,
    pub c7: u64,
    pub d: u64,
    pub pr: u64,
    pub tr: u64,
}

impl CoefficientSet {
    /// Build the set from a key lookup. Every key must resolve to a
    /// non-empty hexadecimal string, the first missing or malformed key
    /// (in [`PRESSURE_KEYS`] order) fails the whole set.
    pub fn from_lookup<'a, F>(lookup: F) -> Result<Self, CoefficientError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut words = [0u64; 13];
        for (word, key) in words.iter_mut().zip(PRESSURE_KEYS) {
            let raw = lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(CoefficientError::Missing(key))?;
            *word = u64::from_str_radix(raw, 16).map_err(|_| CoefficientError::Malformed {
                key,
                value: raw.to_string(),
            })?;
        }

        let [a, b, c, c1, c2, c3, c4, c5, c6, c7, d, pr, tr] = words;
        Ok(Self {
            a,
            b,
            c,
            c1,
            c2,
            c3,
            c4,
            c5,
            c6,
            c7,
            d,
            pr,
            tr,
        })
    }

    /// Second order compensated pressure, in pascals.
    ///
    /// Intermediate values are kept in `f64`; only the final value is
    /// truncated toward zero.
    pub fn compensate(&self) -> i64 {
        let a = self.a as f64;
        let b = self.b as f64;
        let c = self.c as f64;
        let c1 = self.c1 as f64;
        let c2 = self.c2 as f64;
        let c3 = self.c3 as f64;
        let c4 = self.c4 as f64;
        let c5 = self.c5 as f64;
        let c7 = self.c7 as f64;
        let pr = self.pr as f64;
        let tr = self.tr as f64;

        let coef = if tr >= c5 { a } else { b };

        let dut_part = (tr - c5) / 128.0;
        let dut = tr - c5 - (dut_part * dut_part * coef / 2f64.powf(c));
        let off = (c2 + (c4 - 1024.0) * dut / 16384.0) * 4.0;
        let sens = c1 + c3 * dut / 1024.0;
        let x = sens * (pr - 7168.0) / 16384.0 - off;
        let p = (x * 100.0 / 32.0) + (c7 * 10.0);

        p as i64
    }
}

/// Parse the coefficient set through `lookup` and compensate it.
pub fn compensate<'a, F>(lookup: F) -> Result<i64, CoefficientError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    CoefficientSet::from_lookup(lookup).map(|set| set.compensate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("A", "1a"),
            ("B", "0a"),
            ("C", "06"),
            ("C1", "4e8a"),
            ("C2", "0dcd"),
            ("C3", "0188"),
            ("C4", "0aa6"),
            ("C5", "82da"),
            ("C6", "1a8e"),
            ("C7", "09c4"),
            ("D", "09"),
            ("PR", "6a47"),
            ("TR", "8187"),
        ])
    }

    #[test]
    fn test_all_zero_coefficients() {
        let zeros: HashMap<&str, &str> = PRESSURE_KEYS.iter().map(|k| (*k, "0")).collect();
        assert_eq!(compensate(|k| zeros.get(k).copied()), Ok(0));
    }

    #[test]
    fn test_cold_branch_uses_b() {
        // TR < C5
        let values = sample();
        assert_eq!(compensate(|k| values.get(k).copied()), Ok(57629));
    }

    #[test]
    fn test_warm_branch_uses_a() {
        let mut values = sample();
        values.insert("TR", "8400");
        assert_eq!(compensate(|k| values.get(k).copied()), Ok(57733));
    }

    #[test]
    fn test_only_c7_contributes_when_sensor_is_idle() {
        let mut values: HashMap<&str, &str> = PRESSURE_KEYS.iter().map(|k| (*k, "0")).collect();
        values.insert("C7", "2710");
        assert_eq!(compensate(|k| values.get(k).copied()), Ok(100_000));
    }

    #[test]
    fn test_missing_coefficient() {
        for key in PRESSURE_KEYS {
            let mut values = sample();
            values.remove(key);
            assert_eq!(
                compensate(|k| values.get(k).copied()),
                Err(CoefficientError::Missing(key))
            );
        }
    }

    #[test]
    fn test_empty_coefficient_is_missing() {
        let mut values = sample();
        values.insert("PR", "");
        assert_eq!(
            compensate(|k| values.get(k).copied()),
            Err(CoefficientError::Missing("PR"))
        );
    }

    #[test]
    fn test_malformed_coefficient() {
        let mut values = sample();
        values.insert("C3", "zz");
        assert_eq!(
            compensate(|k| values.get(k).copied()),
            Err(CoefficientError::Malformed {
                key: "C3",
                value: "zz".to_string()
            })
        );
    }

    #[test]
    fn test_missing_reported_in_key_order() {
        let mut values = sample();
        values.remove("TR");
        values.remove("C2");
        assert_eq!(
            compensate(|k| values.get(k).copied()),
            Err(CoefficientError::Missing("C2"))
        );
    }
}
