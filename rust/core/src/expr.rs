// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Breaking-threshold formula compiler using nom
//!
//! Formulas are restricted to arithmetic over a fixed variable set:
//!
//! | variable | meaning |
//! |---|---|
//! | `a` | contact area in mm² |
//! | `h` | contact height in mm |
//! | `w` | contact width in mm |
//! | `x`, `y`, `z` | connection location in m |
//!
//! Supported syntax: numeric literals, `+ - * / ^`, unary minus,
//! parentheses and the functions `min`, `max` (two or more arguments),
//! `pow` (two), `sqrt` and `abs` (one). Formulas are compiled once when the
//! group table is built, so a malformed formula is rejected before a run.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{Error, Result};

/// Variable bindings for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vars {
    pub a: f64,
    pub h: f64,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Var {
    A,
    H,
    W,
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Min,
    Max,
    Pow,
    Sqrt,
    Abs,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Func::Min),
            "max" => Some(Func::Max),
            "pow" => Some(Func::Pow),
            "sqrt" => Some(Func::Sqrt),
            "abs" => Some(Func::Abs),
            _ => None,
        }
    }

    fn arity_ok(self, n: usize) -> bool {
        match self {
            Func::Min | Func::Max => n >= 2,
            Func::Pow => n == 2,
            Func::Sqrt | Func::Abs => n == 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(Var),
    Neg(Box<Node>),
    Bin(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, v: &Vars) -> f64 {
        match self {
            Node::Num(n) => *n,
            Node::Var(var) => match var {
                Var::A => v.a,
                Var::H => v.h,
                Var::W => v.w,
                Var::X => v.x,
                Var::Y => v.y,
                Var::Z => v.z,
            },
            Node::Neg(inner) => -inner.eval(v),
            Node::Bin(op, l, r) => {
                let (l, r) = (l.eval(v), r.eval(v));
                match op {
                    Op::Add => l + r,
                    Op::Sub => l - r,
                    Op::Mul => l * r,
                    Op::Div => l / r,
                    Op::Pow => l.powf(r),
                }
            }
            Node::Call(func, args) => {
                let mut vals = args.iter().map(|a| a.eval(v));
                match func {
                    Func::Min => vals.fold(f64::INFINITY, f64::min),
                    Func::Max => vals.fold(f64::NEG_INFINITY, f64::max),
                    Func::Pow => {
                        let base = vals.next().unwrap_or(f64::NAN);
                        let exp = vals.next().unwrap_or(f64::NAN);
                        base.powf(exp)
                    }
                    Func::Sqrt => vals.next().unwrap_or(f64::NAN).sqrt(),
                    Func::Abs => vals.next().unwrap_or(f64::NAN).abs(),
                }
            }
        }
    }

    /// Returns the first function call with a wrong argument count.
    fn bad_call(&self) -> Option<(Func, usize)> {
        match self {
            Node::Num(_) | Node::Var(_) => None,
            Node::Neg(inner) => inner.bad_call(),
            Node::Bin(_, l, r) => l.bad_call().or_else(|| r.bad_call()),
            Node::Call(func, args) => {
                if !func.arity_ok(args.len()) {
                    return Some((*func, args.len()));
                }
                args.iter().find_map(Node::bad_call)
            }
        }
    }
}

/// A compiled threshold formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    /// Compiles a formula, rejecting unknown identifiers, bad arity and
    /// trailing input.
    pub fn compile(source: &str) -> Result<Self> {
        let root = match all_consuming(delimited(multispace0, expr, multispace0))(source) {
            Ok((_, root)) => root,
            Err(e) => {
                let rest = match &e {
                    nom::Err::Error(err) | nom::Err::Failure(err) => err.input,
                    nom::Err::Incomplete(_) => "",
                };
                let offset = source.len() - rest.len();
                return Err(Error::Expression {
                    formula: source.to_string(),
                    message: format!("unexpected input at offset {}", offset),
                });
            }
        };

        if let Some((func, n)) = root.bad_call() {
            return Err(Error::Expression {
                formula: source.to_string(),
                message: format!("{:?} called with {} argument(s)", func, n),
            });
        }

        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// A formula that always evaluates to `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            source: format!("{}", value),
            root: Node::Num(value),
        }
    }

    /// Evaluates the formula. The result may be non-finite (division by zero,
    /// `sqrt` of a negative value); callers decide how to recover.
    pub fn eval(&self, vars: &Vars) -> f64 {
        self.root.eval(vars)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::str::FromStr for Expr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expr::compile(s)
    }
}

/// Parse a number: 5, 0.5, .5, 1., 2.5e-3
fn number(input: &str) -> IResult<&str, Node> {
    map_res(
        recognize(tuple((
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Node::Num),
    )(input)
}

/// Parse an identifier: a variable or a function call
fn identifier(input: &str) -> IResult<&str, Node> {
    let (rest, name) = take_while1(|c: char| c.is_ascii_alphabetic() || c == '_')(input)?;
    let (rest, args) = opt(delimited(
        preceded(multispace0, char('(')),
        separated_list1(char(','), expr),
        char(')'),
    ))(rest)?;

    let fail = || nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Tag));

    match args {
        Some(args) => {
            let func = Func::from_name(name).ok_or_else(fail)?;
            Ok((rest, Node::Call(func, args)))
        }
        None => {
            let var = match name {
                "a" => Var::A,
                "h" => Var::H,
                "w" => Var::W,
                "x" => Var::X,
                "y" => Var::Y,
                "z" => Var::Z,
                _ => return Err(fail()),
            };
            Ok((rest, Node::Var(var)))
        }
    }
}

fn atom(input: &str) -> IResult<&str, Node> {
    delimited(
        multispace0,
        alt((
            number,
            identifier,
            delimited(char('('), expr, char(')')),
        )),
        multispace0,
    )(input)
}

/// Right-associative power: 2^3^2 = 2^(3^2)
fn power(input: &str) -> IResult<&str, Node> {
    let (input, base) = atom(input)?;
    let (input, exp) = opt(preceded(char('^'), factor))(input)?;
    Ok((
        input,
        match exp {
            Some(exp) => Node::Bin(Op::Pow, Box::new(base), Box::new(exp)),
            None => base,
        },
    ))
}

/// Unary minus binds looser than `^`: -2^2 = -(2^2)
fn factor(input: &str) -> IResult<&str, Node> {
    alt((
        map(
            preceded(delimited(multispace0, char('-'), multispace0), factor),
            |n| Node::Neg(Box::new(n)),
        ),
        power,
    ))(input)
}

fn term(input: &str) -> IResult<&str, Node> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(
        alt((value(Op::Mul, char('*')), value(Op::Div, char('/')))),
        factor,
    ))(input)?;
    Ok((input, fold_left(first, rest)))
}

fn expr(input: &str) -> IResult<&str, Node> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        alt((value(Op::Add, char('+')), value(Op::Sub, char('-')))),
        term,
    ))(input)?;
    Ok((input, fold_left(first, rest)))
}

fn fold_left(first: Node, rest: Vec<(Op, Node)>) -> Node {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| Node::Bin(op, Box::new(acc), Box::new(rhs)))
}
