use crate::traits::{Scalar, ScalarOde};
use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected ')'")]
    MissingParen,
    #[error("unknown variable or parameter: {0}")]
    UnknownSymbol(String),
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("parameter count mismatch: {names} names, {values} values")]
    ParamMismatch { names: usize, values: usize },
    #[error("parameter index {0} is out of range")]
    UnknownParamIndex(usize),
    #[error("evaluation stack underflow")]
    StackUnderflow,
}

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the independent variable `x`.
    LoadX,
    /// Pushes the dependent variable `y`.
    LoadY,
    /// Pushes the value of a parameter (by index) onto the stack.
    LoadParam(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
    /// Pops top value (a), pushes -a.
    Neg,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based Virtual Machine for evaluating right-hand sides.
///
/// The VM is stateless; `execute` takes the bytecode, the current `(x, y)`,
/// the parameter vector and a scratch stack.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        x: T,
        y: T,
        params: &[T],
        stack: &mut Vec<T>,
    ) -> Result<T, ExpressionError> {
        stack.clear();

        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(val) => T::constant(val),
                OpCode::LoadX => x,
                OpCode::LoadY => y,
                OpCode::LoadParam(idx) => *params
                    .get(idx)
                    .ok_or(ExpressionError::UnknownParamIndex(idx))?,
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    let b = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
                    let a = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
                    match op {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => pow(a, b),
                    }
                }
                unary => {
                    let a = stack.pop().ok_or(ExpressionError::StackUnderflow)?;
                    match unary {
                        OpCode::Sin => a.sin(),
                        OpCode::Cos => a.cos(),
                        OpCode::Tan => a.tan(),
                        OpCode::Exp => a.exp(),
                        OpCode::Ln => a.ln(),
                        OpCode::Sqrt => a.sqrt(),
                        OpCode::Abs => a.abs(),
                        _ => -a,
                    }
                }
            };
            stack.push(value);
        }

        stack.pop().ok_or(ExpressionError::StackUnderflow)
    }
}

/// Integer exponents go through `powi` so that negative bases stay real.
fn pow<T: Scalar>(base: T, exponent: T) -> T {
    let rounded = exponent.round();
    if rounded == exponent && rounded.abs() <= T::constant(i32::MAX as f64) {
        if let Some(n) = rounded.to_i32() {
            return base.powi(n);
        }
    }
    base.powf(exponent)
}

// --- AST & Parser ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, ^
    Unary(char, Box<Expr>),
    Call(String, Box<Expr>), // functions like sin(x)
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// `x` and `y` are reserved; every other identifier must be a declared parameter.
pub struct Compiler {
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(param_names: &[String]) -> Self {
        let param_map = param_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { param_map }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        self.compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => match name.as_str() {
                "x" => ops.push(OpCode::LoadX),
                "y" => ops.push(OpCode::LoadY),
                "pi" => ops.push(OpCode::LoadConst(std::f64::consts::PI)),
                _ => {
                    let idx = self
                        .param_map
                        .get(name)
                        .ok_or_else(|| ExpressionError::UnknownSymbol(name.clone()))?;
                    ops.push(OpCode::LoadParam(*idx));
                }
            },
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops)?;
                self.compile_recursive(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => return Err(ExpressionError::UnexpectedToken(other.to_string())),
                });
            }
            Expr::Unary(op, operand) => {
                self.compile_recursive(operand, ops)?;
                match op {
                    '-' => ops.push(OpCode::Neg),
                    '+' => {}
                    other => return Err(ExpressionError::UnexpectedToken(other.to_string())),
                }
            }
            Expr::Call(func, arg) => {
                self.compile_recursive(arg, ops)?;
                ops.push(match func.as_str() {
                    "sin" => OpCode::Sin,
                    "cos" => OpCode::Cos,
                    "tan" => OpCode::Tan,
                    "exp" => OpCode::Exp,
                    "ln" | "log" => OpCode::Ln,
                    "sqrt" => OpCode::Sqrt,
                    "abs" => OpCode::Abs,
                    _ => return Err(ExpressionError::UnknownFunction(func.clone())),
                });
            }
        }
        Ok(())
    }
}

// --- Simple Parser ---

/// Parses a string expression into an AST. Trailing input is rejected.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else if (d == 'e' || d == 'E') && !num_str.contains(['e', 'E']) {
                    // Scientific notation: 1e6, 2.5E-3
                    num_str.push(d);
                    chars.next();
                    if let Some(&sign) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            num_str.push(sign);
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let value = num_str
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(ExpressionError::UnexpectedCharacter(other)),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_term()?;

        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some('+'),
            Some(Token::Minus) => Some('-'),
            _ => None,
        } {
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;

        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some('*'),
            Some(Token::Slash) => Some('/'),
            _ => None,
        } {
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Unary minus binds looser than '^': -x^2 == -(x^2).
    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary('-', Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // Right associative: 2^3^2 == 2^(3^2).
    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::MissingParen),
        }
    }
}

// --- CompiledOde ---

/// A right-hand side `f(x, y)` compiled from a string, with named parameters.
#[derive(Debug)]
pub struct CompiledOde<T: Scalar = f64> {
    pub source: String,
    pub bytecode: Bytecode,
    pub params: Vec<T>,
    pub param_names: Vec<String>,
    // Interior mutability for the VM stack to avoid allocation per slope.
    // Note: This makes the ODE !Sync.
    stack: RefCell<Vec<T>>,
}

impl<T: Scalar> CompiledOde<T> {
    pub fn new(source: &str, param_names: &[String], params: Vec<T>) -> Result<Self, ExpressionError> {
        if param_names.len() != params.len() {
            return Err(ExpressionError::ParamMismatch {
                names: param_names.len(),
                values: params.len(),
            });
        }
        let expr = parse(source)?;
        let bytecode = Compiler::new(param_names).compile(&expr)?;
        Ok(Self {
            source: source.to_string(),
            bytecode,
            params,
            param_names: param_names.to_vec(),
            stack: RefCell::new(Vec::with_capacity(32)),
        })
    }

    /// Compiles an expression that only uses `x` and `y`.
    pub fn from_source(source: &str) -> Result<Self, ExpressionError> {
        Self::new(source, &[], Vec::new())
    }

    pub fn evaluate(&self, x: T, y: T) -> Result<T, ExpressionError> {
        let mut stack = self.stack.borrow_mut();
        VM::execute(&self.bytecode, x, y, &self.params, &mut stack)
    }

    pub fn set_param(&mut self, name: &str, value: T) -> Result<(), ExpressionError> {
        let idx = self
            .param_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ExpressionError::UnknownSymbol(name.to_string()))?;
        self.params[idx] = value;
        Ok(())
    }
}

impl<T: Scalar> ScalarOde<T> for CompiledOde<T> {
    /// Evaluation failures surface as NaN, which the steppers reject as
    /// `OdeError::NonFiniteSlope`. The underlying `ExpressionError` is only
    /// reported through `log::error!`; call `evaluate` directly to get it.
    fn slope(&self, x: T, y: T) -> T {
        self.evaluate(x, y).unwrap_or_else(|err| {
            log::error!("Failed to evaluate '{}': {}", self.source, err);
            T::nan()
        })
    }
}
