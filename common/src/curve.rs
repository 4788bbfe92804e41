use thiserror::Error;

/// IVT490 NTC breakpoints as (ohm, degrees C), coldest first.
const IVT490_NTC: [(f32, f32); 27] = [
    (154_300.0, -40.0),
    (111_700.0, -35.0),
    (81_700.0, -30.0),
    (60_500.0, -25.0),
    (45_100.0, -20.0),
    (33_950.0, -15.0),
    (25_800.0, -10.0),
    (19_770.0, -5.0),
    (15_280.0, 0.0),
    (11_900.0, 5.0),
    (9_330.0, 10.0),
    (7_370.0, 15.0),
    (5_870.0, 20.0),
    (4_700.0, 25.0),
    (3_490.0, 30.0),
    (3_070.0, 35.0),
    (2_510.0, 40.0),
    (2_055.0, 45.0),
    (1_696.0, 50.0),
    (1_405.0, 55.0),
    (1_170.0, 60.0),
    (980.0, 65.0),
    (824.0, 70.0),
    (696.0, 75.0),
    (590.0, 80.0),
    (503.0, 85.0),
    (430.0, 90.0),
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve needs at least two breakpoints, got {0}")]
    TooFewPoints(usize),
    #[error("breakpoint {index} is not finite")]
    NotFinite { index: usize },
    #[error("breakpoint {index} breaks ordering (temperature must rise while resistance falls)")]
    NotMonotonic { index: usize },
}

/// Piecewise-linear thermistor curve.
///
/// Resistance falls as temperature rises, so the resistance axis is kept
/// negated. Both axes are then ascending and one interpolation routine
/// serves lookups in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTable {
    neg_resistances: Vec<f32>,
    temperatures: Vec<f32>,
}

impl CurveTable {
    /// Builds a table from (resistance, temperature) breakpoints ordered from
    /// coldest to hottest.
    pub fn new(points: &[(f32, f32)]) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }

        for (index, (resistance, temperature)) in points.iter().enumerate() {
            if !resistance.is_finite() || !temperature.is_finite() {
                return Err(CurveError::NotFinite { index });
            }
        }

        for (index, pair) in points.windows(2).enumerate() {
            let (r0, t0) = pair[0];
            let (r1, t1) = pair[1];
            if t1 <= t0 || r1 >= r0 {
                return Err(CurveError::NotMonotonic { index: index + 1 });
            }
        }

        Ok(Self {
            neg_resistances: points.iter().map(|(r, _)| -r).collect(),
            temperatures: points.iter().map(|(_, t)| *t).collect(),
        })
    }

    pub fn ivt490_ntc() -> Self {
        Self {
            neg_resistances: IVT490_NTC.iter().map(|(r, _)| -r).collect(),
            temperatures: IVT490_NTC.iter().map(|(_, t)| *t).collect(),
        }
    }

    pub fn temperature_of(&self, resistance: f32) -> f32 {
        interpolate(-resistance, &self.neg_resistances, &self.temperatures)
    }

    pub fn resistance_of(&self, temperature: f32) -> f32 {
        -interpolate(temperature, &self.temperatures, &self.neg_resistances)
    }

    pub fn min_temperature(&self) -> f32 {
        self.temperatures[0]
    }

    pub fn max_temperature(&self) -> f32 {
        self.temperatures[self.temperatures.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }
}

// `xs` must be strictly ascending; values outside it clamp to the endpoints.
fn interpolate(x: f32, xs: &[f32], ys: &[f32]) -> f32 {
    if x.is_nan() {
        return f32::NAN;
    }

    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }

    let upper = xs.partition_point(|&bound| bound < x);
    if xs[upper] == x {
        return ys[upper];
    }

    let lower = upper - 1;
    (x - xs[lower]) * (ys[upper] - ys[lower]) / (xs[upper] - xs[lower]) + ys[lower]
}

/// Feed temperature the heat pump targets for a given outdoor temperature.
pub fn heating_curve(slope: f32, outdoor_temperature: f32) -> f32 {
    20.0 + (-0.16 * slope) * (outdoor_temperature - 20.0)
}

/// Outdoor temperature that makes the heat pump target `feed_temperature`.
pub fn inverse_heating_curve(slope: f32, feed_temperature: f32) -> f32 {
    (feed_temperature - 20.0) / (-0.16 * slope) + 20.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, tolerance: f32) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn breakpoints_map_exactly() {
        let table = CurveTable::ivt490_ntc();

        assert_eq!(table.resistance_of(20.0), 5_870.0);
        assert_eq!(table.temperature_of(5_870.0), 20.0);
        assert_eq!(table.resistance_of(-40.0), 154_300.0);
        assert_eq!(table.temperature_of(430.0), 90.0);
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let table = CurveTable::ivt490_ntc();

        // Halfway between 20 C (5870) and 25 C (4700).
        assert!(approx(table.resistance_of(22.5), 5_285.0, 0.01));
        assert!(approx(table.temperature_of(5_285.0), 22.5, 0.001));
    }

    #[test]
    fn clamps_outside_domain() {
        let table = CurveTable::ivt490_ntc();

        assert_eq!(table.temperature_of(f32::MAX), -40.0);
        assert_eq!(table.temperature_of(1_000_000.0), -40.0);
        assert_eq!(table.temperature_of(10.0), 90.0);
        assert_eq!(table.resistance_of(-60.0), 154_300.0);
        assert_eq!(table.resistance_of(120.0), 430.0);
    }

    #[test]
    fn resistance_strictly_decreases_with_temperature() {
        let table = CurveTable::ivt490_ntc();
        let mut previous = table.resistance_of(-40.0);
        let mut t = -39.5;

        while t <= 90.0 {
            let r = table.resistance_of(t);
            assert!(r < previous, "resistance at {t} ({r}) not below {previous}");
            previous = r;
            t += 0.5;
        }
    }

    #[test]
    fn round_trip_stays_within_one_step() {
        let table = CurveTable::ivt490_ntc();
        let mut t = -40.0;

        while t <= 90.0 {
            let r = table.resistance_of(t);
            let back = table.resistance_of(table.temperature_of(r));
            // One table step spans at most 42600 ohm (-40..-35); the round
            // trip itself should be far tighter than that.
            assert!(approx(back, r, r * 1e-4 + 0.5), "t={t} r={r} back={back}");
            t += 0.25;
        }
    }

    #[test]
    fn nan_propagates() {
        let table = CurveTable::ivt490_ntc();
        assert!(table.temperature_of(f32::NAN).is_nan());
        assert!(table.resistance_of(f32::NAN).is_nan());
    }

    #[test]
    fn rejects_unordered_breakpoints() {
        assert_eq!(
            CurveTable::new(&[(100.0, 0.0)]),
            Err(CurveError::TooFewPoints(1))
        );
        assert_eq!(
            CurveTable::new(&[(100.0, 0.0), (200.0, 10.0)]),
            Err(CurveError::NotMonotonic { index: 1 })
        );
        assert_eq!(
            CurveTable::new(&[(200.0, 10.0), (100.0, 10.0)]),
            Err(CurveError::NotMonotonic { index: 1 })
        );
        assert_eq!(
            CurveTable::new(&[(200.0, 0.0), (f32::NAN, 10.0)]),
            Err(CurveError::NotFinite { index: 1 })
        );
    }

    #[test]
    fn custom_table_matches_builtin() {
        let table = CurveTable::new(&IVT490_NTC).unwrap();
        assert_eq!(table, CurveTable::ivt490_ntc());
        assert_eq!(table.len(), 27);
        assert_eq!(table.min_temperature(), -40.0);
        assert_eq!(table.max_temperature(), 90.0);
    }

    #[test]
    fn heating_curve_inverts() {
        let slope = 4.0;
        let feed = heating_curve(slope, -5.0);

        assert!(approx(feed, 36.0, 1e-4));
        assert!(approx(inverse_heating_curve(slope, feed), -5.0, 1e-4));
        assert!(approx(inverse_heating_curve(slope, 20.0), 20.0, 1e-6));
    }
}
