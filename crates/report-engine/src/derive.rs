use serde::{Deserialize, Serialize};

use crate::Predicate;
use report_model::{PipelineError, Table, Value};

/// Arithmetic expression over the columns of a single row.
///
/// This is the data form of the repeated per-page business formulas
/// ("shortfall = target − billed", "amount = shortfall × rate"): the formula
/// and its exclusion rule travel as configuration, so policy variations
/// between pages never touch the pipeline implementation.
///
/// Expressions evaluate over numbers. A null or non-numeric operand makes
/// the whole expression null, as does division by zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Column { column: String },
    Literal { value: f64 },
    Add { left: Box<Expr>, right: Box<Expr> },
    Sub { left: Box<Expr>, right: Box<Expr> },
    Mul { left: Box<Expr>, right: Box<Expr> },
    Div { left: Box<Expr>, right: Box<Expr> },
    Neg { inner: Box<Expr> },
}

impl Expr {
    pub fn col(column: impl Into<String>) -> Self {
        Expr::Column {
            column: column.into(),
        }
    }

    pub fn number(value: f64) -> Self {
        Expr::Literal { value }
    }

    pub fn neg(self) -> Self {
        Expr::Neg {
            inner: Box::new(self),
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column { column } => out.push(column),
            Expr::Literal { .. } => {}
            Expr::Add { left, right }
            | Expr::Sub { left, right }
            | Expr::Mul { left, right }
            | Expr::Div { left, right } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Neg { inner } => inner.collect_columns(out),
        }
    }

    fn eval(&self, table: &Table, row: &[Value]) -> Option<f64> {
        match self {
            Expr::Column { column } => table
                .column_index(column)
                .and_then(|idx| row.get(idx))
                .and_then(Value::as_f64),
            Expr::Literal { value } => Some(*value),
            Expr::Add { left, right } => Some(left.eval(table, row)? + right.eval(table, row)?),
            Expr::Sub { left, right } => Some(left.eval(table, row)? - right.eval(table, row)?),
            Expr::Mul { left, right } => Some(left.eval(table, row)? * right.eval(table, row)?),
            Expr::Div { left, right } => {
                let divisor = right.eval(table, row)?;
                if divisor == 0.0 {
                    None
                } else {
                    Some(left.eval(table, row)? / divisor)
                }
            }
            Expr::Neg { inner } => Some(-inner.eval(table, row)?),
        }
    }
}

macro_rules! expr_binop {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant {
                    left: Box::new(self),
                    right: Box::new(rhs),
                }
            }
        }
    };
}

expr_binop!(Add, add, Add);
expr_binop!(Sub, sub, Sub);
expr_binop!(Mul, mul, Mul);
expr_binop!(Div, div, Div);

/// Computes `column` as `expr` for every row, writing `default` instead for
/// rows matched by `exclusion`.
///
/// Overwrites an existing column of that name, otherwise appends one on the
/// right. Deterministic: identical inputs produce identical values (the
/// column is recomputed wholesale, so re-deriving is overwrite, not
/// accumulation).
pub fn derive(
    table: &Table,
    column: &str,
    expr: &Expr,
    exclusion: Option<&Predicate>,
    default: Value,
) -> Result<Table, PipelineError> {
    let mut columns = Vec::new();
    expr.collect_columns(&mut columns);
    for referenced in columns {
        table.require_column("derive", referenced)?;
    }
    if let Some(exclusion) = exclusion {
        exclusion.validate("derive", table)?;
    }

    let mut values: Vec<Value> = Vec::with_capacity(table.row_count());
    for row in table.rows() {
        let excluded = exclusion.is_some_and(|p| p.matches(table, row));
        if excluded {
            values.push(default.clone());
        } else {
            values.push(match expr.eval(table, row) {
                Some(n) => Value::Number(n),
                None => Value::Null,
            });
        }
    }
    table.with_column(column, values)
}
