use crate::error::FabError;

/// Unit system of the numbers in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Millimeters,
    Inches,
}

impl Units {
    /// Multiplier that converts a value in these units to millimeters.
    pub fn factor(self) -> f64 {
        match self {
            Units::Millimeters => 1.0,
            Units::Inches => 25.4,
        }
    }
}

/// Which side of an implied-decimal token has its zeros omitted, named by the
/// side that must be padded to restore the full width.
///
/// Gerber `FSL` and Excellon `TZ` omit leading zeros (`PadLeft`); Gerber `FST`
/// and Excellon `LZ` omit trailing zeros (`PadRight`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroPolicy {
    #[default]
    PadLeft,
    PadRight,
}

/// Converts coordinate tokens into millimeters.
///
/// The digit widths, units and zero policy may only change until the first
/// token has been interpreted; after that the format is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateFormat {
    integer_digits: u8,
    decimal_digits: u8,
    units: Units,
    zeros: ZeroPolicy,
    used: bool,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        // Common default: 2.4 format (FSLAX24Y24)
        Self::new(2, 4)
    }
}

impl CoordinateFormat {
    pub fn new(integer_digits: u8, decimal_digits: u8) -> Self {
        Self {
            integer_digits,
            decimal_digits,
            units: Units::Millimeters,
            zeros: ZeroPolicy::PadLeft,
            used: false,
        }
    }

    pub fn integer_digits(&self) -> u8 {
        self.integer_digits
    }

    pub fn decimal_digits(&self) -> u8 {
        self.decimal_digits
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn zero_policy(&self) -> ZeroPolicy {
        self.zeros
    }

    /// Whether any token has been interpreted with this format yet.
    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn configure_format(&mut self, integer_digits: u8, decimal_digits: u8) -> Result<(), FabError> {
        if (integer_digits, decimal_digits) == (self.integer_digits, self.decimal_digits) {
            return Ok(());
        }
        self.ensure_unused("coordinate format")?;
        let total = integer_digits as u32 + decimal_digits as u32;
        if total == 0 || total > 18 {
            return Err(FabError::Format(format!(
                "unusable digit widths {integer_digits}.{decimal_digits}"
            )));
        }
        self.integer_digits = integer_digits;
        self.decimal_digits = decimal_digits;
        Ok(())
    }

    pub fn configure_units(&mut self, units: Units) -> Result<(), FabError> {
        if units == self.units {
            return Ok(());
        }
        self.ensure_unused("units")?;
        self.units = units;
        Ok(())
    }

    pub fn configure_trailing_zeros(&mut self, zeros: ZeroPolicy) -> Result<(), FabError> {
        if zeros == self.zeros {
            return Ok(());
        }
        self.ensure_unused("zero suppression")?;
        self.zeros = zeros;
        Ok(())
    }

    fn ensure_unused(&self, what: &str) -> Result<(), FabError> {
        if self.used {
            return Err(FabError::Format(format!(
                "cannot reconfigure {what} after the first coordinate"
            )));
        }
        Ok(())
    }

    /// Interpret a coordinate token, e.g. `-012345` or `1.25`, as millimeters.
    ///
    /// Tokens without a decimal point are implied-decimal fixed point: they are
    /// padded to the configured width according to the zero policy and the
    /// last `decimal_digits` digits become the fraction.
    pub fn parse_fixed(&mut self, token: &str) -> Result<f64, FabError> {
        let token = token.trim();
        if token.contains('.') {
            return self.parse_float(token);
        }

        let (negative, digits) = match token.as_bytes().first() {
            Some(b'-') => (true, &token[1..]),
            Some(b'+') => (false, &token[1..]),
            _ => (false, token),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FabError::Format(format!("bad coordinate: {token:?}")));
        }

        let total = (self.integer_digits + self.decimal_digits) as usize;
        if digits.len() > total {
            return Err(FabError::Format(format!(
                "coordinate {token} has {} digits, format allows {total}",
                digits.len()
            )));
        }

        let padding = "0".repeat(total - digits.len());
        let padded = match self.zeros {
            ZeroPolicy::PadLeft => format!("{padding}{digits}"),
            ZeroPolicy::PadRight => format!("{digits}{padding}"),
        };
        let (int_part, frac_part) = padded.split_at(self.integer_digits as usize);
        let int_part = if int_part.is_empty() { "0" } else { int_part };
        let magnitude: f64 = format!("{int_part}.{frac_part}")
            .parse()
            .map_err(|_| FabError::Format(format!("bad coordinate: {token:?}")))?;

        self.used = true;
        let value = if negative { -magnitude } else { magnitude };
        Ok(self.to_fixed(value))
    }

    /// Interpret an explicit decimal number, e.g. `0.0254`, as millimeters.
    pub fn parse_float(&mut self, token: &str) -> Result<f64, FabError> {
        let token = token.trim();
        let value: f64 = token
            .parse()
            .map_err(|_| FabError::Format(format!("bad number: {token:?}")))?;
        if !value.is_finite() {
            return Err(FabError::Format(format!("bad number: {token:?}")));
        }
        self.used = true;
        Ok(self.to_fixed(value))
    }

    /// Scale a value in file units to millimeters.
    pub fn to_fixed(&self, value: f64) -> f64 {
        value * self.units.factor()
    }
}
