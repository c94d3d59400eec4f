//! Binary operators over runtime values, following Python's numeric rules.

use std::convert::TryFrom;

use crate::{
    runtime::{
        RuntimeError::{self, DivisionByZero, NegativeShift, Overflow, TypeMismatch},
        Value::{self, FloatValue, IntValue, ListValue, StringValue},
    },
    syntax::tree::BinOp,
};

/// Upper bound on the length of a repeated string or list.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

pub fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (IntValue(l), IntValue(r)) => int_op(op, l, r),
        (IntValue(l), FloatValue(r)) => float_op(op, l as f64, r),
        (FloatValue(l), IntValue(r)) => float_op(op, l, r as f64),
        (FloatValue(l), FloatValue(r)) => float_op(op, l, r),

        (StringValue(mut l), StringValue(r)) if op == BinOp::Add => {
            l.push_str(r.as_str());
            Ok(StringValue(l))
        }
        (ListValue(mut l), ListValue(r)) if op == BinOp::Add => {
            l.extend(r);
            Ok(ListValue(l))
        }

        (StringValue(s), IntValue(n)) | (IntValue(n), StringValue(s)) if op == BinOp::Mul => {
            let n = repeat_count(s.len(), n)?;
            Ok(StringValue(s.repeat(n)))
        }
        (ListValue(items), IntValue(n)) | (IntValue(n), ListValue(items)) if op == BinOp::Mul => {
            let n = repeat_count(items.len(), n)?;
            let mut repeated = Vec::with_capacity(items.len() * n);
            for _ in 0..n {
                repeated.extend(items.iter().cloned());
            }
            Ok(ListValue(repeated))
        }

        (lhs, rhs) => Err(TypeMismatch {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        }),
    }
}

// an empty sequence repeats to itself, however large `n` is
fn repeat_count(len: usize, n: i64) -> Result<usize, RuntimeError> {
    if n <= 0 || len == 0 {
        return Ok(0);
    }
    let n = n as usize;
    match len.checked_mul(n) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(n),
        _ => Err(Overflow("sequence repetition")),
    }
}

fn int_op(op: BinOp, l: i64, r: i64) -> Result<Value, RuntimeError> {
    let overflow = || Overflow(op.symbol());
    let value = match op {
        BinOp::Add => l.checked_add(r).ok_or_else(overflow)?,
        BinOp::Sub => l.checked_sub(r).ok_or_else(overflow)?,
        BinOp::Mul => l.checked_mul(r).ok_or_else(overflow)?,
        BinOp::Div => {
            if r == 0 {
                return Err(DivisionByZero("division by zero"));
            }
            return Ok(FloatValue(l as f64 / r as f64));
        }
        BinOp::FloorDiv => {
            if r == 0 {
                return Err(DivisionByZero("integer division or modulo by zero"));
            }
            floor_div(l, r).ok_or_else(overflow)?
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(DivisionByZero("integer division or modulo by zero"));
            }
            floor_mod(l, r)
        }
        BinOp::Pow => return int_pow(l, r),
        BinOp::Shl => {
            if r < 0 {
                return Err(NegativeShift);
            }
            if l == 0 {
                0
            } else {
                let shifted = if r >= 64 { None } else { l.checked_shl(r as u32) };
                match shifted {
                    // shifting must be reversible, or bits were lost
                    Some(v) if v >> r == l => v,
                    _ => return Err(overflow()),
                }
            }
        }
        BinOp::Shr => {
            if r < 0 {
                return Err(NegativeShift);
            }
            l >> r.min(63)
        }
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
    };
    Ok(IntValue(value))
}

fn floor_div(l: i64, r: i64) -> Option<i64> {
    let q = l.checked_div(r)?;
    if (l % r != 0) && ((l < 0) != (r < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

// the result takes the sign of the divisor
fn floor_mod(l: i64, r: i64) -> i64 {
    if r == -1 {
        return 0;
    }
    let m = l % r;
    if m != 0 && ((m < 0) != (r < 0)) {
        m + r
    } else {
        m
    }
}

fn int_pow(l: i64, r: i64) -> Result<Value, RuntimeError> {
    if r < 0 {
        if l == 0 {
            return Err(DivisionByZero("0 cannot be raised to a negative power"));
        }
        return Ok(FloatValue((l as f64).powf(r as f64)));
    }
    let exp = u32::try_from(r).map_err(|_| Overflow("**"))?;
    l.checked_pow(exp).map(IntValue).ok_or(Overflow("**"))
}

fn float_op(op: BinOp, l: f64, r: f64) -> Result<Value, RuntimeError> {
    let value = match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => {
            if r == 0.0 {
                return Err(DivisionByZero("float division by zero"));
            }
            l / r
        }
        BinOp::FloorDiv => {
            if r == 0.0 {
                return Err(DivisionByZero("float floor division by zero"));
            }
            (l / r).floor()
        }
        BinOp::Mod => {
            if r == 0.0 {
                return Err(DivisionByZero("float modulo"));
            }
            let m = l % r;
            if m != 0.0 && ((m < 0.0) != (r < 0.0)) {
                m + r
            } else {
                m
            }
        }
        BinOp::Pow => {
            if l == 0.0 && r < 0.0 {
                return Err(DivisionByZero("0.0 cannot be raised to a negative power"));
            }
            l.powf(r)
        }
        _ => {
            return Err(TypeMismatch {
                op: op.symbol(),
                lhs: "float",
                rhs: "float",
            })
        }
    };
    if value.is_finite() || !l.is_finite() || !r.is_finite() {
        Ok(FloatValue(value))
    } else {
        Err(Overflow(op.symbol()))
    }
}
