//! Internal module for validating JSON numbers

#[derive(PartialEq, Clone, Copy)]
enum State {
    Start,
    Minus,
    IntZero,
    IntNonZero,
    DecimalPoint,
    DecimalDigit,
    ExpE,
    ExpSign,
    ExpDigit,
}

impl State {
    fn next(self, byte: u8) -> Option<State> {
        use State::*;

        let next = match (self, byte) {
            (Start, b'-') => Minus,
            (ExpE, b'-' | b'+') => ExpSign,
            (Start | Minus, b'0') => IntZero,
            (Start | Minus | IntNonZero, b'0'..=b'9') => IntNonZero,
            (IntZero | IntNonZero, b'.') => DecimalPoint,
            (DecimalPoint | DecimalDigit, b'0'..=b'9') => DecimalDigit,
            (IntZero | IntNonZero | DecimalDigit, b'e' | b'E') => ExpE,
            (ExpE | ExpSign | ExpDigit, b'0'..=b'9') => ExpDigit,
            _ => return None,
        };
        Some(next)
    }

    fn is_final(self) -> bool {
        matches!(
            self,
            State::IntZero | State::IntNonZero | State::DecimalDigit | State::ExpDigit
        )
    }
}

/// Checks whether `value` is a complete number as defined by the JSON specification
///
/// Leading `+`, leading zeros (`01`), missing digits (`1.`, `1e`) and non-finite
/// values such as `NaN` are rejected.
pub(crate) fn is_valid_json_number(value: &str) -> bool {
    let mut state = State::Start;
    for byte in value.bytes() {
        match state.next(byte) {
            Some(next) => state = next,
            None => return false,
        }
    }
    state.is_final()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_numbers() {
        for number in [
            "0", "-0", "1", "-1", "1234", "0.5", "-0.5", "1.25e10", "1E+2", "1e-2", "100e-10",
            "6.070e+010",
        ] {
            assert_eq!(
                true,
                is_valid_json_number(number),
                "Expected to be valid JSON number: {number}"
            );
        }
    }

    #[test]
    fn invalid_numbers() {
        for number in [
            "", "-", "+1", "01", "-01", "1.", ".5", "1e", "1e+", "12a", "NaN", "Infinity", "1.2.3",
            "--1", " 1",
        ] {
            assert_eq!(
                false,
                is_valid_json_number(number),
                "Expected to be invalid JSON number: {number}"
            );
        }
    }
}
