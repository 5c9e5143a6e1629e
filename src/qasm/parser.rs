//! OpenQASM 2.0 parser.
//!
//! Parsing and validation happen in one pass. Gate applications are expanded
//! on the spot into `U`/`CX` primitives, so the resulting [`Circuit`] holds
//! nothing but simulator operations. `qelib1.inc` is the only include
//! file; its definitions are bundled with the crate.

use std::f64::consts::PI;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::Limits;
use super::lexer::{Token, TokenKind, tokenize};
use super::simulator::{Circuit, ClassicalRegister, Condition, Instruction, Op, u_matrix};
use crate::executor::{ExecError, ExecResult};

const QELIB1: &str = include_str!("qelib1.inc");

/// Deepest nesting of parentheses, unary signs or `^` in one expression.
const MAX_EXPR_DEPTH: usize = 128;

/// Most operators and function calls in one expression.
const MAX_EXPR_NODES: usize = 1024;

/// Deepest chain of gate definitions calling earlier definitions.
const MAX_GATE_DEPTH: usize = 64;

/// Most classical bits a circuit may declare.
const MAX_CLBITS: usize = 4096;

/// Widest classical register an `if` can compare against.
const MAX_CONDITION_BITS: usize = 64;

/// Parse OpenQASM 2.0 source into a flattened circuit.
///
/// Fails if the circuit exceeds `limits`, before any of it is simulated.
pub fn parse_program(source: &str, limits: Limits) -> ExecResult<Circuit> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut builder = Builder::new(limits);

    parser.header()?;
    while !parser.at_end() {
        parser.statement(&mut builder)?;
    }
    Ok(builder.finish())
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "exp" => Self::Exp,
            "ln" => Self::Ln,
            "sqrt" => Self::Sqrt,
            _ => return None,
        })
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Sqrt => x.sqrt(),
        }
    }
}

/// Parameter expression. `Param` indexes the enclosing gate's parameters.
#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Param(usize),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    fn eval(&self, params: &[f64]) -> f64 {
        match self {
            Expr::Num(x) => *x,
            Expr::Param(i) => params[*i],
            Expr::Neg(e) => -e.eval(params),
            Expr::Binary(op, l, r) => {
                let (l, r) = (l.eval(params), r.eval(params));
                match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Pow => l.powf(r),
                }
            }
            Expr::Call(f, e) => f.apply(e.eval(params)),
        }
    }
}

#[derive(Debug, Clone)]
enum Callee {
    U,
    Cx,
    Defined(String),
}

/// One statement in a gate body. `qubits` index the gate's formal arguments.
#[derive(Debug)]
struct GateCall {
    callee: Callee,
    params: Vec<Expr>,
    qubits: Vec<usize>,
}

#[derive(Debug)]
struct GateDef {
    num_params: usize,
    num_qubits: usize,
    /// Longest chain of definitions below this one, counting itself.
    depth: usize,
    body: Vec<GateCall>,
}

#[derive(Debug)]
struct QuantumRegister {
    name: String,
    offset: usize,
    size: usize,
}

/// A gate or measurement operand, `name` or `name[index]`.
struct Arg {
    name: String,
    index: Option<u64>,
    line: usize,
}

struct Builder {
    limits: Limits,
    /// Gate applications and primitives produced so far.
    expanded: usize,
    num_qubits: usize,
    num_clbits: usize,
    qregs: Vec<QuantumRegister>,
    cregs: Vec<ClassicalRegister>,
    gates: FxHashMap<String, Rc<GateDef>>,
    instructions: Vec<Instruction>,
    included: bool,
}

impl Builder {
    fn new(limits: Limits) -> Self {
        Self {
            limits,
            expanded: 0,
            num_qubits: 0,
            num_clbits: 0,
            qregs: Vec::new(),
            cregs: Vec::new(),
            gates: FxHashMap::default(),
            instructions: Vec::new(),
            included: false,
        }
    }

    fn finish(self) -> Circuit {
        Circuit {
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            cregs: self.cregs,
            instructions: self.instructions,
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.qregs.iter().any(|r| r.name == name) || self.cregs.iter().any(|r| r.name == name)
    }

    fn declare(&mut self, quantum: bool, name: String, size: u64, line: usize) -> ExecResult<()> {
        if self.is_declared(&name) {
            return Err(ExecError::parse(
                line,
                format!("register '{name}' is already declared"),
            ));
        }
        if size == 0 {
            return Err(ExecError::parse(
                line,
                format!("register '{name}' must have a positive size"),
            ));
        }
        let size = usize::try_from(size)
            .map_err(|_| ExecError::parse(line, format!("register '{name}' is too large")))?;

        if quantum {
            let total = self.num_qubits.saturating_add(size);
            if total > self.limits.max_qubits {
                return Err(ExecError::parse(
                    line,
                    format!(
                        "circuit needs {total} qubits, at most {} are supported",
                        self.limits.max_qubits
                    ),
                ));
            }
            self.qregs.push(QuantumRegister {
                name,
                offset: self.num_qubits,
                size,
            });
            self.num_qubits = total;
        } else {
            let total = self.num_clbits.saturating_add(size);
            if total > MAX_CLBITS {
                return Err(ExecError::parse(
                    line,
                    format!(
                        "circuit needs {total} classical bits, at most {MAX_CLBITS} are supported"
                    ),
                ));
            }
            self.cregs.push(ClassicalRegister {
                name,
                offset: self.num_clbits,
                size,
            });
            self.num_clbits = total;
        }
        Ok(())
    }

    fn qubits(&self, arg: &Arg) -> ExecResult<Vec<usize>> {
        let reg = self
            .qregs
            .iter()
            .find(|r| r.name == arg.name)
            .ok_or_else(|| {
                ExecError::parse(arg.line, format!("unknown quantum register '{}'", arg.name))
            })?;
        select(&arg.name, reg.offset, reg.size, arg)
    }

    fn clbits(&self, arg: &Arg) -> ExecResult<Vec<usize>> {
        let reg = self.creg(&arg.name, arg.line)?;
        select(&arg.name, reg.offset, reg.size, arg)
    }

    fn creg(&self, name: &str, line: usize) -> ExecResult<&ClassicalRegister> {
        self.cregs
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ExecError::parse(line, format!("unknown classical register '{name}'")))
    }

    /// Resolve a gate name to its callee and `(params, qubits)` arity.
    fn callee(&self, name: &str, line: usize) -> ExecResult<(Callee, usize, usize)> {
        match name {
            "U" => Ok((Callee::U, 3, 1)),
            "CX" => Ok((Callee::Cx, 0, 2)),
            _ => {
                let def = self
                    .gates
                    .get(name)
                    .ok_or_else(|| ExecError::parse(line, format!("unknown gate '{name}'")))?;
                Ok((Callee::Defined(name.to_string()), def.num_params, def.num_qubits))
            }
        }
    }

    fn gate_depth(&self, callee: &Callee) -> usize {
        match callee {
            Callee::Defined(name) => self.gates.get(name).map_or(0, |def| def.depth),
            Callee::U | Callee::Cx => 0,
        }
    }

    /// Count one unit of expansion against the instruction budget.
    fn charge(&mut self) -> ExecResult<()> {
        self.expanded += 1;
        if self.expanded > self.limits.max_instructions {
            return Err(ExecError::Invalid(format!(
                "circuit expands to more than {} operations",
                self.limits.max_instructions
            )));
        }
        Ok(())
    }

    fn push(&mut self, op: Op, condition: Option<Condition>) -> ExecResult<()> {
        self.charge()?;
        self.instructions.push(Instruction { op, condition });
        Ok(())
    }

    /// Expand a gate application down to primitives.
    fn emit(
        &mut self,
        callee: &Callee,
        params: &[f64],
        qubits: &[usize],
        condition: Option<Condition>,
        line: usize,
    ) -> ExecResult<()> {
        match callee {
            Callee::U => {
                if let Some(bad) = params.iter().find(|p| !p.is_finite()) {
                    return Err(ExecError::parse(
                        line,
                        format!("gate parameter evaluates to {bad}"),
                    ));
                }
                self.push(
                    Op::Unitary {
                        qubit: qubits[0],
                        matrix: u_matrix(params[0], params[1], params[2]),
                    },
                    condition,
                )
            }
            Callee::Cx => self.push(
                Op::Cx {
                    control: qubits[0],
                    target: qubits[1],
                },
                condition,
            ),
            Callee::Defined(name) => {
                // Empty bodies still cost one unit, so deep chains of them stay bounded.
                self.charge()?;
                let Some(def) = self.gates.get(name).cloned() else {
                    return Ok(());
                };
                for call in &def.body {
                    let inner: Vec<f64> = call.params.iter().map(|e| e.eval(params)).collect();
                    let targets: Vec<usize> = call.qubits.iter().map(|&i| qubits[i]).collect();
                    self.emit(&call.callee, &inner, &targets, condition, line)?;
                }
                Ok(())
            }
        }
    }
}

fn select(name: &str, offset: usize, size: usize, arg: &Arg) -> ExecResult<Vec<usize>> {
    match arg.index {
        None => Ok((offset..offset + size).collect()),
        Some(i) if (i as usize) < size => Ok(vec![offset + i as usize]),
        Some(i) => Err(ExecError::parse(
            arg.line,
            format!("index {i} out of range for register '{name}' of size {size}"),
        )),
    }
}

/// Expand register operands into one operand list per application.
///
/// Whole registers must all have the same size; single bits are repeated.
fn broadcast(operands: &[Vec<usize>], args: &[Arg], line: usize) -> ExecResult<Vec<Vec<usize>>> {
    let mut width = None;
    for (operand, arg) in operands.iter().zip(args) {
        if arg.index.is_none() {
            match width {
                None => width = Some(operand.len()),
                Some(w) if w != operand.len() => {
                    return Err(ExecError::parse(line, "register sizes do not match"));
                }
                Some(_) => {}
            }
        }
    }

    let applications = (0..width.unwrap_or(1))
        .map(|k| {
            operands
                .iter()
                .zip(args)
                .map(|(operand, arg)| if arg.index.is_none() { operand[k] } else { operand[0] })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    for qubits in &applications {
        let distinct: FxHashSet<_> = qubits.iter().collect();
        if distinct.len() != qubits.len() {
            return Err(ExecError::parse(line, "duplicate qubit arguments"));
        }
    }
    Ok(applications)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current expression nesting depth.
    depth: usize,
    /// Nodes built for the expression being parsed.
    nodes: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn next(&mut self) -> ExecResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ExecError::parse(self.line(), "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ExecResult<()> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(ExecError::parse(
                token.line,
                format!("expected {kind}, found {}", token.kind),
            ))
        }
    }

    fn ident(&mut self) -> ExecResult<String> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(ExecError::parse(
                token.line,
                format!("expected identifier, found {other}"),
            )),
        }
    }

    fn int(&mut self) -> ExecResult<u64> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Int(n) => Ok(n),
            other => Err(ExecError::parse(
                token.line,
                format!("expected integer, found {other}"),
            )),
        }
    }

    fn header(&mut self) -> ExecResult<()> {
        let line = self.line();
        if !matches!(self.peek(), Some(TokenKind::Ident(kw)) if kw == "OPENQASM") {
            return Err(ExecError::parse(line, "missing 'OPENQASM 2.0;' header"));
        }
        self.pos += 1;
        let token = self.next()?;
        let version = match token.kind {
            TokenKind::Real(v) => v,
            TokenKind::Int(v) => v as f64,
            other => {
                return Err(ExecError::parse(
                    token.line,
                    format!("expected version number, found {other}"),
                ));
            }
        };
        if version.trunc() != 2.0 {
            return Err(ExecError::parse(
                token.line,
                format!("unsupported OpenQASM version {version}"),
            ));
        }
        self.expect(TokenKind::Semi)
    }

    fn statement(&mut self, b: &mut Builder) -> ExecResult<()> {
        let token = self.next()?;
        let line = token.line;
        let keyword = match token.kind {
            TokenKind::Ident(keyword) => keyword,
            other => return Err(ExecError::parse(line, format!("unexpected {other}"))),
        };

        match keyword.as_str() {
            "include" => self.include(b, line),
            "qreg" | "creg" => {
                let name = self.ident()?;
                self.expect(TokenKind::LBracket)?;
                let size = self.int()?;
                self.expect(TokenKind::RBracket)?;
                self.expect(TokenKind::Semi)?;
                b.declare(keyword == "qreg", name, size, line)
            }
            "gate" => self.gate_definition(b, line),
            "opaque" => Err(ExecError::parse(line, "opaque gates are not supported")),
            "barrier" => {
                for arg in self.arguments()? {
                    b.qubits(&arg)?;
                }
                self.expect(TokenKind::Semi)
            }
            "if" => {
                self.expect(TokenKind::LParen)?;
                let creg = self.ident()?;
                self.expect(TokenKind::EqEq)?;
                let value = self.int()?;
                self.expect(TokenKind::RParen)?;
                let index = b
                    .cregs
                    .iter()
                    .position(|r| r.name == creg)
                    .ok_or_else(|| {
                        ExecError::parse(line, format!("unknown classical register '{creg}'"))
                    })?;
                if b.cregs[index].size > MAX_CONDITION_BITS {
                    return Err(ExecError::parse(
                        line,
                        format!(
                            "cannot compare register '{creg}' wider than {MAX_CONDITION_BITS} bits"
                        ),
                    ));
                }
                let op_line = self.line();
                let op = self.ident()?;
                if op == "barrier" || op == "if" {
                    return Err(ExecError::parse(
                        op_line,
                        format!("'{op}' cannot be conditioned"),
                    ));
                }
                let condition = Condition {
                    creg: index,
                    value,
                };
                self.operation(b, op, op_line, Some(condition))
            }
            "OPENQASM" => Err(ExecError::parse(line, "unexpected second header")),
            _ => self.operation(b, keyword, line, None),
        }
    }

    fn include(&mut self, b: &mut Builder, line: usize) -> ExecResult<()> {
        let token = self.next()?;
        let TokenKind::Str(file) = token.kind else {
            return Err(ExecError::parse(line, "expected file name after 'include'"));
        };
        self.expect(TokenKind::Semi)?;
        if file != "qelib1.inc" {
            return Err(ExecError::parse(line, format!("cannot include '{file}'")));
        }
        if !b.included {
            b.included = true;
            let mut library = Parser::new(tokenize(QELIB1)?);
            while !library.at_end() {
                library.statement(b)?;
            }
        }
        Ok(())
    }

    /// `measure`, `reset`, or a gate application.
    fn operation(
        &mut self,
        b: &mut Builder,
        name: String,
        line: usize,
        condition: Option<Condition>,
    ) -> ExecResult<()> {
        match name.as_str() {
            "measure" => {
                let qarg = self.argument()?;
                self.expect(TokenKind::Arrow)?;
                let carg = self.argument()?;
                self.expect(TokenKind::Semi)?;

                let qubits = b.qubits(&qarg)?;
                let clbits = b.clbits(&carg)?;
                if qarg.index.is_some() != carg.index.is_some() || qubits.len() != clbits.len() {
                    return Err(ExecError::parse(line, "measure operands do not match in size"));
                }
                for (qubit, clbit) in qubits.into_iter().zip(clbits) {
                    b.push(Op::Measure { qubit, clbit }, condition)?;
                }
                Ok(())
            }
            "reset" => {
                let arg = self.argument()?;
                self.expect(TokenKind::Semi)?;
                for qubit in b.qubits(&arg)? {
                    b.push(Op::Reset { qubit }, condition)?;
                }
                Ok(())
            }
            _ => {
                let (callee, num_params, num_qubits) = b.callee(&name, line)?;
                let exprs = self.parameters(None)?;
                let args = self.arguments()?;
                self.expect(TokenKind::Semi)?;

                check_arity(&name, num_params, exprs.len(), num_qubits, args.len(), line)?;
                let params: Vec<f64> = exprs.iter().map(|e| e.eval(&[])).collect();
                if let Some(bad) = params.iter().find(|p| !p.is_finite()) {
                    return Err(ExecError::parse(
                        line,
                        format!("gate parameter evaluates to {bad}"),
                    ));
                }
                let operands = args
                    .iter()
                    .map(|a| b.qubits(a))
                    .collect::<ExecResult<Vec<_>>>()?;
                for qubits in broadcast(&operands, &args, line)? {
                    b.emit(&callee, &params, &qubits, condition, line)?;
                }
                Ok(())
            }
        }
    }

    fn gate_definition(&mut self, b: &mut Builder, line: usize) -> ExecResult<()> {
        let name = self.ident()?;
        if name == "U" || name == "CX" || b.gates.contains_key(&name) {
            return Err(ExecError::parse(line, format!("gate '{name}' is already defined")));
        }

        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) && !self.eat(&TokenKind::RParen) {
            params = self.identifiers()?;
            self.expect(TokenKind::RParen)?;
        }
        let qargs = self.identifiers()?;
        for names in [&params, &qargs] {
            let distinct: FxHashSet<_> = names.iter().collect();
            if distinct.len() != names.len() {
                return Err(ExecError::parse(
                    line,
                    format!("duplicate argument names in gate '{name}'"),
                ));
            }
        }

        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        let mut depth = 1;
        while !self.eat(&TokenKind::RBrace) {
            let stmt_line = self.line();
            let callee_name = self.ident()?;
            if callee_name == "barrier" {
                self.formal_qubits(&qargs)?;
                self.expect(TokenKind::Semi)?;
                continue;
            }
            let (callee, num_params, num_qubits) = b.callee(&callee_name, stmt_line)?;
            let exprs = self.parameters(Some(params.as_slice()))?;
            let qubits = self.formal_qubits(&qargs)?;
            self.expect(TokenKind::Semi)?;

            check_arity(
                &callee_name,
                num_params,
                exprs.len(),
                num_qubits,
                qubits.len(),
                stmt_line,
            )?;
            let distinct: FxHashSet<_> = qubits.iter().collect();
            if distinct.len() != qubits.len() {
                return Err(ExecError::parse(stmt_line, "duplicate qubit arguments"));
            }
            depth = depth.max(b.gate_depth(&callee) + 1);
            if depth > MAX_GATE_DEPTH {
                return Err(ExecError::parse(
                    stmt_line,
                    format!("gate '{name}' nests more than {MAX_GATE_DEPTH} definitions deep"),
                ));
            }
            body.push(GateCall {
                callee,
                params: exprs,
                qubits,
            });
        }

        b.gates.insert(
            name,
            Rc::new(GateDef {
                num_params: params.len(),
                num_qubits: qargs.len(),
                depth,
                body,
            }),
        );
        Ok(())
    }

    fn identifiers(&mut self) -> ExecResult<Vec<String>> {
        let mut names = vec![self.ident()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    /// Qubit operands inside a gate body: bare formal argument names.
    fn formal_qubits(&mut self, qargs: &[String]) -> ExecResult<Vec<usize>> {
        let line = self.line();
        let names = self.identifiers()?;
        if self.peek() == Some(&TokenKind::LBracket) {
            return Err(ExecError::parse(
                line,
                "indexed operands are not allowed in gate bodies",
            ));
        }
        names
            .iter()
            .map(|n| {
                qargs
                    .iter()
                    .position(|q| q == n)
                    .ok_or_else(|| ExecError::parse(line, format!("unknown gate argument '{n}'")))
            })
            .collect()
    }

    fn argument(&mut self) -> ExecResult<Arg> {
        let line = self.line();
        let name = self.ident()?;
        let index = if self.eat(&TokenKind::LBracket) {
            let i = self.int()?;
            self.expect(TokenKind::RBracket)?;
            Some(i)
        } else {
            None
        };
        Ok(Arg { name, index, line })
    }

    fn arguments(&mut self) -> ExecResult<Vec<Arg>> {
        let mut args = vec![self.argument()?];
        while self.eat(&TokenKind::Comma) {
            args.push(self.argument()?);
        }
        Ok(args)
    }

    /// Optional `( expr, … )` list. `scope` holds the names that may appear
    /// as variables; `None` means only constants are allowed.
    fn parameters(&mut self, scope: Option<&[String]>) -> ExecResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        if self.eat(&TokenKind::LParen) && !self.eat(&TokenKind::RParen) {
            exprs.push(self.parameter(scope)?);
            while self.eat(&TokenKind::Comma) {
                exprs.push(self.parameter(scope)?);
            }
            self.expect(TokenKind::RParen)?;
        }
        Ok(exprs)
    }

    fn parameter(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        self.nodes = 0;
        self.expr(scope)
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_EXPR_DEPTH`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ExecResult<T>) -> ExecResult<T> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(ExecError::parse(self.line(), "expression nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Account for one operator node, failing past [`MAX_EXPR_NODES`].
    fn node(&mut self) -> ExecResult<()> {
        self.nodes += 1;
        if self.nodes > MAX_EXPR_NODES {
            return Err(ExecError::parse(self.line(), "expression is too long"));
        }
        Ok(())
    }

    fn expr(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        let mut lhs = self.term(scope)?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            self.node()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.term(scope)?));
        }
    }

    fn term(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        let mut lhs = self.power(scope)?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            self.node()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.power(scope)?));
        }
    }

    fn power(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        let base = self.unary(scope)?;
        if self.eat(&TokenKind::Caret) {
            self.node()?;
            let exponent = self.nested(|p| p.power(scope))?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn unary(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        if self.eat(&TokenKind::Minus) {
            self.node()?;
            return Ok(Expr::Neg(Box::new(self.nested(|p| p.unary(scope))?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.nested(|p| p.unary(scope));
        }
        self.primary(scope)
    }

    fn primary(&mut self, scope: Option<&[String]>) -> ExecResult<Expr> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Int(n) => Ok(Expr::Num(n as f64)),
            TokenKind::Real(x) => Ok(Expr::Num(x)),
            TokenKind::LParen => {
                let inner = self.nested(|p| p.expr(scope))?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) if name == "pi" => Ok(Expr::Num(PI)),
            TokenKind::Ident(name) => {
                if let Some(func) = Func::from_name(&name) {
                    self.node()?;
                    self.expect(TokenKind::LParen)?;
                    let arg = self.nested(|p| p.expr(scope))?;
                    self.expect(TokenKind::RParen)?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                scope
                    .and_then(|names| names.iter().position(|p| *p == name))
                    .map(Expr::Param)
                    .ok_or_else(|| {
                        ExecError::parse(token.line, format!("unknown parameter '{name}'"))
                    })
            }
            other => Err(ExecError::parse(
                token.line,
                format!("expected expression, found {other}"),
            )),
        }
    }
}

fn check_arity(
    name: &str,
    num_params: usize,
    got_params: usize,
    num_qubits: usize,
    got_qubits: usize,
    line: usize,
) -> ExecResult<()> {
    if num_params != got_params {
        return Err(ExecError::parse(
            line,
            format!("gate '{name}' takes {num_params} parameters, got {got_params}"),
        ));
    }
    if num_qubits != got_qubits {
        return Err(ExecError::parse(
            line,
            format!("gate '{name}' takes {num_qubits} qubits, got {got_qubits}"),
        ));
    }
    Ok(())
}
