use cif::rules::{BinaryOperator, Expr};

use crate::error::RuleEvaluationError;

/// Evaluate `expr`, reading field references through `operand`.
///
/// Every intermediate result must be finite; an overflow or NaN stops the
/// evaluation with [`RuleEvaluationError::NonFinite`].
pub fn evaluate(
    expr: &Expr,
    operand: &dyn Fn(&str) -> Result<f64, RuleEvaluationError>,
) -> Result<f64, RuleEvaluationError> {
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::Field { name, .. } => operand(name)?,
        Expr::Neg(inner) => -evaluate(inner, operand)?,
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, operand)?;
            let r = evaluate(right, operand)?;
            match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Sub => l - r,
                BinaryOperator::Mul => l * r,
                BinaryOperator::Div => {
                    if r == 0.0 {
                        return Err(RuleEvaluationError::DivisionByZero);
                    }
                    l / r
                }
            }
        }
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RuleEvaluationError::NonFinite)
    }
}

/// Format a calculated value in its shortest round-trip form. Integral
/// values keep one decimal (`1.0`); very small or very large magnitudes use
/// an exponent (`3.3333333333333335e-13`, `1e21`).
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0.0".to_string();
    }
    let magnitude = n.abs();
    if magnitude < 1e-4 || magnitude >= 1e15 {
        return format!("{:e}", n);
    }
    let mut s = format!("{}", n);
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}
