//! Measurement units and violation determination.
//!
//! CCR tables report levels and limits in whatever unit the row declares.
//! Mass concentrations are normalized to parts per billion before any
//! comparison; other recognised units (radioactivity, turbidity, fibres)
//! are canonical on their own and are never converted into each other.
//! Units we do not recognise are kept verbatim so nothing is dropped, but
//! any comparison involving them yields [`Violation::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Relative tolerance applied when comparing normalized values, so that
/// scaling artefacts (e.g. `0.015 * 1000 = 15.000000000000002`) do not turn
/// an equal level into an exceedance.
const COMPARE_EPSILON: f64 = 1e-9;

/// A unit as written in a report table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Unit {
    /// Parts per million.
    Ppm,
    /// Parts per billion.
    Ppb,
    /// Parts per trillion.
    Ppt,
    /// Parts per quadrillion.
    Ppq,
    /// Milligrams per litre (equivalent to ppm in water).
    MgPerL,
    /// Micrograms per litre (equivalent to ppb in water).
    UgPerL,
    /// Nanograms per litre (equivalent to ppt in water).
    NgPerL,
    /// Picocuries per litre.
    PciPerL,
    /// Millirems per year.
    MremPerYear,
    /// Nephelometric turbidity units.
    Ntu,
    /// Million fibres per litre.
    Mfl,
    /// Percentage of samples (turbidity, coliform positives).
    Percent,
    /// A unit we do not know how to normalize, preserved as written.
    Unrecognized(String),
}

/// The unit a value is expressed in after normalization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
pub enum CanonicalUnit {
    /// Parts per billion (all mass concentrations).
    #[strum(serialize = "ppb")]
    Ppb,
    /// Picocuries per litre.
    #[strum(serialize = "pCi/L")]
    PciPerL,
    /// Millirems per year.
    #[strum(serialize = "mrem/yr")]
    MremPerYear,
    /// Nephelometric turbidity units.
    #[strum(serialize = "NTU")]
    Ntu,
    /// Million fibres per litre.
    #[strum(serialize = "MFL")]
    Mfl,
    /// Percentage.
    #[strum(serialize = "%")]
    Percent,
}

impl Unit {
    /// Parses a unit cell. Matching ignores case and internal whitespace.
    /// Anything not in the conversion table is returned as
    /// [`Unit::Unrecognized`] with the original (trimmed) text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let key: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "ppm" => Self::Ppm,
            "ppb" => Self::Ppb,
            "ppt" => Self::Ppt,
            "ppq" => Self::Ppq,
            "mg/l" => Self::MgPerL,
            "ug/l" | "µg/l" | "μg/l" => Self::UgPerL,
            "ng/l" => Self::NgPerL,
            "pci/l" => Self::PciPerL,
            "mrem/yr" | "mrem/year" | "mrem" => Self::MremPerYear,
            "ntu" => Self::Ntu,
            "mfl" => Self::Mfl,
            "%" | "percent" => Self::Percent,
            _ => Self::Unrecognized(trimmed.to_string()),
        }
    }

    /// Returns the canonical unit and the factor that converts a value in
    /// this unit into it, or `None` for unrecognized units.
    #[must_use]
    pub const fn normalization(&self) -> Option<(CanonicalUnit, f64)> {
        match self {
            Self::Ppm | Self::MgPerL => Some((CanonicalUnit::Ppb, 1_000.0)),
            Self::Ppb | Self::UgPerL => Some((CanonicalUnit::Ppb, 1.0)),
            Self::Ppt | Self::NgPerL => Some((CanonicalUnit::Ppb, 0.001)),
            Self::Ppq => Some((CanonicalUnit::Ppb, 0.000_001)),
            Self::PciPerL => Some((CanonicalUnit::PciPerL, 1.0)),
            Self::MremPerYear => Some((CanonicalUnit::MremPerYear, 1.0)),
            Self::Ntu => Some((CanonicalUnit::Ntu, 1.0)),
            Self::Mfl => Some((CanonicalUnit::Mfl, 1.0)),
            Self::Percent => Some((CanonicalUnit::Percent, 1.0)),
            Self::Unrecognized(_) => None,
        }
    }

    /// Whether values in this unit can be normalized.
    #[must_use]
    pub const fn is_normalized(&self) -> bool {
        self.normalization().is_some()
    }

    /// The spelling used when writing this unit back out.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ppm => "ppm",
            Self::Ppb => "ppb",
            Self::Ppt => "ppt",
            Self::Ppq => "ppq",
            Self::MgPerL => "mg/L",
            Self::UgPerL => "ug/L",
            Self::NgPerL => "ng/L",
            Self::PciPerL => "pCi/L",
            Self::MremPerYear => "mrem/yr",
            Self::Ntu => "NTU",
            Self::Mfl => "MFL",
            Self::Percent => "%",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Unit {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Unrecognized(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl From<CanonicalUnit> for Unit {
    fn from(unit: CanonicalUnit) -> Self {
        match unit {
            CanonicalUnit::Ppb => Self::Ppb,
            CanonicalUnit::PciPerL => Self::PciPerL,
            CanonicalUnit::MremPerYear => Self::MremPerYear,
            CanonicalUnit::Ntu => Self::Ntu,
            CanonicalUnit::Mfl => Self::Mfl,
            CanonicalUnit::Percent => Self::Percent,
        }
    }
}

/// A numeric value paired with the unit it was reported in.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    /// The value as written.
    pub value: f64,
    /// The unit the value is expressed in.
    pub unit: Unit,
}

/// A value converted to its [`CanonicalUnit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedQuantity {
    /// The converted value.
    pub value: f64,
    /// The canonical unit.
    pub unit: CanonicalUnit,
}

impl Quantity {
    /// Creates a quantity.
    #[must_use]
    pub const fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Converts to the canonical unit, or `None` if the unit is not
    /// recognised. Normalizing an already-canonical quantity returns the
    /// same value.
    #[must_use]
    pub fn normalized(&self) -> Option<NormalizedQuantity> {
        let (unit, factor) = self.unit.normalization()?;
        Some(NormalizedQuantity {
            value: self.value * factor,
            unit,
        })
    }
}

impl From<NormalizedQuantity> for Quantity {
    fn from(q: NormalizedQuantity) -> Self {
        Self {
            value: q.value,
            unit: q.unit.into(),
        }
    }
}

/// Whether a measured level violates its regulatory limit.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Violation {
    /// The normalized level strictly exceeds the normalized limit.
    Yes,
    /// The normalized level does not exceed the normalized limit.
    No,
    /// The comparison could not be made (missing level or limit,
    /// unrecognised unit, or incompatible units).
    #[default]
    Unknown,
}

impl Violation {
    /// Compares a level against a limit after normalizing both.
    ///
    /// Never infers [`Violation::No`] from missing information: a missing
    /// side, an unrecognised unit or a dimension mismatch all yield
    /// [`Violation::Unknown`].
    #[must_use]
    pub fn determine(level: Option<&Quantity>, limit: Option<&Quantity>) -> Self {
        let (Some(level), Some(limit)) = (level, limit) else {
            return Self::Unknown;
        };
        let (Some(level), Some(limit)) = (level.normalized(), limit.normalized()) else {
            return Self::Unknown;
        };
        if level.unit != limit.unit {
            return Self::Unknown;
        }

        let tolerance = limit.value.abs() * COMPARE_EPSILON;
        if level.value > limit.value + tolerance {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: f64, unit: &str) -> Quantity {
        Quantity::new(value, Unit::parse(unit))
    }

    #[test]
    fn parses_units_case_and_space_insensitively() {
        assert_eq!(Unit::parse("PPM"), Unit::Ppm);
        assert_eq!(Unit::parse(" mg / L "), Unit::MgPerL);
        assert_eq!(Unit::parse("pCi/L"), Unit::PciPerL);
        assert_eq!(Unit::parse("mrem"), Unit::MremPerYear);
        assert_eq!(
            Unit::parse(" grains/gal "),
            Unit::Unrecognized("grains/gal".to_string())
        );
    }

    #[test]
    fn ppm_normalizes_to_ppb() {
        let n = q(0.5, "ppm").normalized().unwrap();
        assert_eq!(n.unit, CanonicalUnit::Ppb);
        assert!((n.value - 500.0).abs() < 1e-9);
    }

    #[test]
    fn normalization_is_idempotent() {
        for value in [0.001, 0.015, 1.0, 2.5, 10.0, 123.456] {
            for unit in ["ppm", "ppb", "ppt", "mg/l", "pci/l", "ntu"] {
                let once = q(value, unit).normalized().unwrap();
                let twice = Quantity::from(once).normalized().unwrap();
                assert_eq!(once, twice, "{value} {unit}");
            }
        }
    }

    #[test]
    fn ppm_level_matches_ppb_limit_comparison() {
        let limit_ppb = q(10.0, "ppb");
        for level in [0.001, 0.005, 0.009_999, 0.01, 0.010_001, 0.02, 1.5, 700.0] {
            let via_ppm = Violation::determine(Some(&q(level, "ppm")), Some(&limit_ppb));
            let direct = Violation::determine(Some(&q(level * 1_000.0, "ppb")), Some(&limit_ppb));
            assert_eq!(via_ppm, direct, "level {level} ppm");
        }
    }

    #[test]
    fn equal_level_is_not_a_violation() {
        assert_eq!(
            Violation::determine(Some(&q(0.015, "ppm")), Some(&q(15.0, "ppb"))),
            Violation::No
        );
    }

    #[test]
    fn exceeding_level_is_a_violation() {
        assert_eq!(
            Violation::determine(Some(&q(12.0, "ppb")), Some(&q(10.0, "ppb"))),
            Violation::Yes
        );
    }

    #[test]
    fn missing_limit_is_unknown() {
        assert_eq!(
            Violation::determine(Some(&q(1.0, "ppb")), None),
            Violation::Unknown
        );
        assert_eq!(
            Violation::determine(None, Some(&q(1.0, "ppb"))),
            Violation::Unknown
        );
    }

    #[test]
    fn unrecognized_or_mismatched_units_are_unknown() {
        assert_eq!(
            Violation::determine(Some(&q(5.0, "ppb")), Some(&q(1.0, "grains"))),
            Violation::Unknown
        );
        assert_eq!(
            Violation::determine(Some(&q(5.0, "pCi/L")), Some(&q(1.0, "ppb"))),
            Violation::Unknown
        );
    }

    #[test]
    fn unit_serializes_as_written() {
        let json = serde_json::to_string(&Unit::Unrecognized("grains/gal".into())).unwrap();
        assert_eq!(json, "\"grains/gal\"");
        let back: Unit = serde_json::from_str("\"pCi/L\"").unwrap();
        assert_eq!(back, Unit::PciPerL);
    }
}
