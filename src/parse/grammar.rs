use winnow::ascii::{dec_int, till_line_ending};
use winnow::combinator::{alt, cut_err, delimited, not, opt, preceded, repeat, separated};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::{ArithOp, CompareOp, Expr, Value};

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_ascii_whitespace()).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Identifiers ------------------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Match `word` only when not followed by an identifier character, so that
/// `ANDy` parses as an identifier rather than the `AND` operator.
fn keyword<'i>(word: &'static str) -> impl Parser<&'i str, &'i str, winnow::error::ErrMode<winnow::error::ContextError>> {
    (
        word,
        not(take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_'
        })),
    )
        .take()
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn float_literal(input: &mut &str) -> ModalResult<f64> {
    // Only match floats that contain a decimal point
    (
        take_while(1.., |c: char| c.is_ascii_digit()),
        '.',
        take_while(1.., |c: char| c.is_ascii_digit()),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn literal(input: &mut &str) -> ModalResult<Value> {
    alt((
        string_literal.map(Value::String),
        keyword("true").value(Value::Bool(true)),
        keyword("false").value(Value::Bool(false)),
        keyword("null").value(Value::Null),
        float_literal.map(Value::Float),
        dec_int::<_, i64, _>.map(Value::Int),
    ))
    .context(StrContext::Expected(StrContextValue::Description("value")))
    .parse_next(input)
}

// -- Operators --------------------------------------------------------------

fn compare_op(input: &mut &str) -> ModalResult<CompareOp> {
    ws.parse_next(input)?;
    alt((
        ">=".value(CompareOp::Gte),
        ">".value(CompareOp::Gt),
        "<=".value(CompareOp::Lte),
        "<".value(CompareOp::Lt),
        "==".value(CompareOp::Eq),
        "!=".value(CompareOp::Neq),
    ))
    .parse_next(input)
}

// -- Expressions ------------------------------------------------------------
// Precedence, loose to tight:
//   OR < AND < NOT < comparison < additive < multiplicative < unary minus
//   < postfix member access < primary

fn primary(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        delimited('(', expr, (ws, cut_err(')'))),
        literal.map(Expr::Literal),
        call_or_ident,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn call_or_ident(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    let args: Option<Vec<Expr>> = opt(delimited(
        (ws, '('),
        separated(0.., expr, (ws, ',')),
        (ws, cut_err(')')),
    ))
    .parse_next(input)?;
    match args {
        Some(args) => Ok(Expr::Call {
            name: name.to_owned(),
            args,
        }),
        None => Ok(Expr::Ident(name.to_owned())),
    }
}

fn postfix(input: &mut &str) -> ModalResult<Expr> {
    let base = primary(input)?;
    let fields: Vec<&str> = repeat(0.., preceded('.', cut_err(ident))).parse_next(input)?;
    Ok(fields
        .into_iter()
        .fold(base, |acc, f| Expr::Member(Box::new(acc), f.to_owned())))
}

fn unary_minus(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt('-').parse_next(input)?.is_some() {
        let inner = cut_err(unary_minus).parse_next(input)?;
        Ok(Expr::Neg(Box::new(inner)))
    } else {
        postfix(input)
    }
}

fn multiplicative(input: &mut &str) -> ModalResult<Expr> {
    let first = unary_minus(input)?;
    let rest: Vec<(ArithOp, Expr)> = repeat(
        0..,
        (
            preceded(
                ws,
                alt((
                    '*'.value(ArithOp::Mul),
                    '/'.value(ArithOp::Div),
                    '%'.value(ArithOp::Rem),
                )),
            ),
            cut_err(unary_minus),
        ),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| Expr::Arith {
        lhs: Box::new(acc),
        op,
        rhs: Box::new(rhs),
    }))
}

fn additive(input: &mut &str) -> ModalResult<Expr> {
    let first = multiplicative(input)?;
    let rest: Vec<(ArithOp, Expr)> = repeat(
        0..,
        (
            preceded(
                ws,
                alt(('+'.value(ArithOp::Add), '-'.value(ArithOp::Sub))),
            ),
            cut_err(multiplicative),
        ),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| Expr::Arith {
        lhs: Box::new(acc),
        op,
        rhs: Box::new(rhs),
    }))
}

fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let lhs = additive(input)?;
    if let Some(op) = opt(compare_op).parse_next(input)? {
        let rhs = cut_err(additive).parse_next(input)?;
        Ok(Expr::Compare {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    } else {
        Ok(lhs)
    }
}

fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    if opt(alt((keyword("NOT"), keyword("not"), "!".take())))
        .parse_next(input)?
        .is_some()
    {
        let inner = cut_err(not_expr).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        comparison(input)
    }
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = not_expr(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded(
            (ws, alt((keyword("AND"), keyword("and"), "&&".take()))),
            cut_err(not_expr),
        ),
    )
    .parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::And(Box::new(acc), Box::new(r))))
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr(input)?;
    let rest: Vec<Expr> = repeat(
        0..,
        preceded(
            (ws, alt((keyword("OR"), keyword("or"), "||".take()))),
            cut_err(and_expr),
        ),
    )
    .parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, r| Expr::Or(Box::new(acc), Box::new(r))))
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    or_expr(input)
}

// -- Top-level parser -------------------------------------------------------

pub fn parse_expression(input: &mut &str) -> ModalResult<Expr> {
    let parsed = expr.parse_next(input)?;
    ws.parse_next(input)?;
    Ok(parsed)
}
