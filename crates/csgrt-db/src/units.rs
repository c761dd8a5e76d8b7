//! Length units recorded in the ident record.

/// Database length unit. Base unit is the millimeter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    /// Millimeters.
    #[default]
    Mm,
    /// Centimeters.
    Cm,
    /// Meters.
    M,
    /// Inches.
    In,
    /// Feet.
    Ft,
}

impl Units {
    /// Code stored on disk.
    pub fn code(self) -> u32 {
        match self {
            Units::Mm => 1,
            Units::Cm => 2,
            Units::M => 3,
            Units::In => 4,
            Units::Ft => 5,
        }
    }

    /// Decode an on-disk unit code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Units::Mm),
            2 => Some(Units::Cm),
            3 => Some(Units::M),
            4 => Some(Units::In),
            5 => Some(Units::Ft),
            _ => None,
        }
    }

    /// Millimeters per unit (local to base conversion factor).
    pub fn to_mm(self) -> f64 {
        match self {
            Units::Mm => 1.0,
            Units::Cm => 10.0,
            Units::M => 1000.0,
            Units::In => 25.4,
            Units::Ft => 304.8,
        }
    }

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Units::Mm => "mm",
            Units::Cm => "cm",
            Units::M => "m",
            Units::In => "in",
            Units::Ft => "ft",
        }
    }

    /// Parse a short name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mm" => Some(Units::Mm),
            "cm" => Some(Units::Cm),
            "m" => Some(Units::M),
            "in" => Some(Units::In),
            "ft" => Some(Units::Ft),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_codes_round_trip() {
        for u in [Units::Mm, Units::Cm, Units::M, Units::In, Units::Ft] {
            assert_eq!(Units::from_code(u.code()), Some(u));
            assert_eq!(Units::from_name(u.name()), Some(u));
        }
        assert_eq!(Units::from_code(0), None);
    }

    #[test]
    fn test_inch_factor() {
        assert_relative_eq!(Units::In.to_mm(), 25.4);
    }
}
