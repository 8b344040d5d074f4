//! Binary operator precedence table, grounded in
//! `original_source/stmc/source/parser/ParseExpr.cpp`'s
//! `get_binary_oper_precedence`. The climbing algorithm in `parser.rs`
//! mirrors the original's `parse_binary_operator` exactly, including its
//! uniform treatment of `Assign` as just another left-binding operator
//! (there is no separate right-associative pass) — see `DESIGN.md` for why
//! this is preserved rather than "fixed".

use crate::ast::BinaryOperator;

pub fn precedence(op: BinaryOperator) -> i32 {
    use BinaryOperator::*;
    match op {
        Mul | Div | Rem => 11,
        Add | Sub => 10,
        Shl | Shr => 9,
        Lt | Le | Gt | Ge => 8,
        Eq | Ne => 7,
        And => 6,
        Or => 5,
        Xor => 4,
        LogicalAnd => 3,
        LogicalOr => 2,
        Assign => 1,
    }
}
