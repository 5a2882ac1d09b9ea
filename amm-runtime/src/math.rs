use alloy::primitives::U256;

use crate::error::AmmError;

/// Integer square root, rounded down (Babylonian method).
pub fn sqrt(y: U256) -> U256 {
    if y > U256::from(3u8) {
        let mut z = y;
        let mut x = y / U256::from(2u8) + U256::from(1u8);
        while x < z {
            z = x;
            x = (y / x + x) / U256::from(2u8);
        }
        z
    } else if !y.is_zero() {
        U256::from(1u8)
    } else {
        U256::ZERO
    }
}

/// `floor(a * b / denominator)`, failing on overflow or a zero denominator.
pub fn mul_div_floor(a: U256, b: U256, denominator: U256) -> Result<U256, AmmError> {
    if denominator.is_zero() {
        return Err(AmmError::Overflow("division by zero".into()));
    }
    let product = a
        .checked_mul(b)
        .ok_or_else(|| AmmError::Overflow(format!("{a} * {b}")))?;
    Ok(product / denominator)
}

/// Amount of B equal in value to `amount_a` at the current reserve ratio.
pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256, AmmError> {
    mul_div_floor(amount_a, reserve_b, reserve_a)
}
