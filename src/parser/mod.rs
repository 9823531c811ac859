//! Grammar-driven frontend: source text to a frozen [`AirSchema`].
//!
//! A generic S-expression grammar (see `sexpr.pest`) produces the surface
//! tree; the builder below classifies atoms, resolves references through the
//! execution contexts and drives the schema construction API. All builder
//! errors carry the source location of the offending node.

use pest::iterators::Pair;
use pest::Parser;

use crate::field::Felt;
use crate::ir::{
    BinaryOp, CompileError, Dimensions, Expression, LoadSource, ProcedureKind, StoreOperation,
    UnaryOp, Value,
};
use crate::schema::{
    AirSchema, CyclicRegister, CyclicSource, ExportDeclaration, FunctionContext, Initializer,
    InputKind, InputRegister, InputScope, MaskRegister, PrngSequence, ProcedureContext, Reference,
    StaticRegister, StaticRegisterSet,
};

#[derive(pest_derive::Parser)]
#[grammar = "parser/sexpr.pest"]
struct SexprParser;

/// Compiles AIR assembly source text into a frozen schema.
pub fn compile(source: &str) -> Result<AirSchema, CompileError> {
    let root = parse_tree(source)?;
    build_module(&root)
}

struct SExpr {
    node: Node,
    line: usize,
    column: usize,
}

enum Node {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    fn as_atom(&self) -> Option<&str> {
        match &self.node {
            Node::Atom(text) => Some(text),
            Node::List(_) => None,
        }
    }

    fn as_list(&self) -> Option<&[SExpr]> {
        match &self.node {
            Node::List(items) => Some(items),
            Node::Atom(_) => None,
        }
    }

    fn error(&self, detail: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            line: self.line,
            column: self.column,
            detail: detail.into(),
        }
    }
}

fn parse_tree(source: &str) -> Result<SExpr, CompileError> {
    let mut pairs = SexprParser::parse(Rule::file, source).map_err(|error| {
        let (line, column) = match error.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        CompileError::Syntax {
            line,
            column,
            detail: error.variant.message().to_string(),
        }
    })?;
    let file = pairs.next().expect("grammar yields exactly one file node");
    let sexpr = file
        .into_inner()
        .next()
        .expect("file wraps the module expression");
    Ok(convert(sexpr))
}

fn convert(pair: Pair<'_, Rule>) -> SExpr {
    let (line, column) = pair.as_span().start_pos().line_col();
    match pair.as_rule() {
        Rule::sexpr => convert(pair.into_inner().next().expect("sexpr wraps one node")),
        Rule::list => SExpr {
            node: Node::List(pair.into_inner().map(convert).collect()),
            line,
            column,
        },
        Rule::atom => SExpr {
            node: Node::Atom(pair.as_str().to_string()),
            line,
            column,
        },
        rule => unreachable!("unexpected grammar rule {rule:?}"),
    }
}

fn parse_u64(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_i64(text: &str) -> Option<i64> {
    if let Some(rest) = text.strip_prefix('-') {
        parse_u64(rest).and_then(|value| i64::try_from(value).ok()).map(|value| -value)
    } else {
        parse_u64(text).and_then(|value| i64::try_from(value).ok())
    }
}

fn expect_list<'a>(expr: &'a SExpr, what: &str) -> Result<&'a [SExpr], CompileError> {
    expr.as_list()
        .ok_or_else(|| expr.error(format!("expected a {what} list")))
}

fn expect_keyword<'a>(items: &'a [SExpr], parent: &SExpr) -> Result<&'a str, CompileError> {
    items
        .first()
        .and_then(SExpr::as_atom)
        .ok_or_else(|| parent.error("expected a keyword"))
}

fn expect_integer(expr: &SExpr, what: &str) -> Result<u64, CompileError> {
    expr.as_atom()
        .and_then(parse_u64)
        .ok_or_else(|| expr.error(format!("expected a {what}")))
}

fn expect_index(expr: &SExpr, what: &str) -> Result<usize, CompileError> {
    Ok(expect_integer(expr, what)? as usize)
}

fn felt(expr: &SExpr, modulus: u64) -> Result<Felt, CompileError> {
    let value = expect_integer(expr, "field element")?;
    if value >= modulus {
        return Err(expr.error(format!("literal {value} exceeds the field modulus")));
    }
    Ok(Felt(value))
}

fn reference(expr: &SExpr) -> Result<Reference, CompileError> {
    let text = expr
        .as_atom()
        .ok_or_else(|| expr.error("expected an index or a $handle"))?;
    if let Some(handle) = text.strip_prefix('$') {
        return Ok(Reference::Handle(handle.to_string()));
    }
    parse_u64(text)
        .map(|value| Reference::Index(value as usize))
        .ok_or_else(|| expr.error("expected an index or a $handle"))
}

fn optional_handle(items: &[SExpr], cursor: &mut usize) -> Option<String> {
    let handle = items
        .get(*cursor)
        .and_then(SExpr::as_atom)
        .and_then(|text| text.strip_prefix('$'))
        .map(str::to_string);
    if handle.is_some() {
        *cursor += 1;
    }
    handle
}

/// Parses trailing `scalar | vector n | matrix r c` type words.
fn parse_dims(items: &[SExpr], cursor: usize, parent: &SExpr) -> Result<Dimensions, CompileError> {
    let keyword = items
        .get(cursor)
        .and_then(SExpr::as_atom)
        .ok_or_else(|| parent.error("expected a type declaration"))?;
    let dims = match keyword {
        "scalar" => Dimensions::Scalar,
        "vector" => {
            let length = items
                .get(cursor + 1)
                .ok_or_else(|| parent.error("vector type requires a length"))?;
            Dimensions::Vector(expect_index(length, "vector length")?)
        }
        "matrix" => {
            let rows = items
                .get(cursor + 1)
                .ok_or_else(|| parent.error("matrix type requires row and column counts"))?;
            let cols = items
                .get(cursor + 2)
                .ok_or_else(|| parent.error("matrix type requires row and column counts"))?;
            Dimensions::Matrix(
                expect_index(rows, "matrix row count")?,
                expect_index(cols, "matrix column count")?,
            )
        }
        other => return Err(parent.error(format!("unknown type keyword '{other}'"))),
    };
    Ok(dims)
}

fn build_module(root: &SExpr) -> Result<AirSchema, CompileError> {
    let items = expect_list(root, "module")?;
    if expect_keyword(items, root)? != "module" {
        return Err(root.error("source must start with a module declaration"));
    }

    let field_decl = items
        .get(1)
        .ok_or_else(|| root.error("module requires a field declaration"))?;
    let field_items = expect_list(field_decl, "field")?;
    let modulus = match field_items {
        [keyword, prime, value]
            if keyword.as_atom() == Some("field") && prime.as_atom() == Some("prime") =>
        {
            expect_integer(value, "field modulus")?
        }
        _ => return Err(field_decl.error("expected (field prime <modulus>)")),
    };
    let mut schema = AirSchema::new(modulus)?;
    let mut exports = Vec::new();

    for item in &items[2..] {
        let decl = expect_list(item, "declaration")?;
        match expect_keyword(decl, item)? {
            "const" => {
                let (value, handle) = build_const(decl, item, modulus)?;
                schema.add_constant(value, handle)?;
            }
            "static" => {
                let registers = build_registers(decl, modulus)?;
                schema.set_static_registers(registers)?;
            }
            "function" => {
                let function = build_function(&schema, decl, item, modulus)?;
                schema.add_function(function)?;
            }
            "transition" => {
                let procedure =
                    build_procedure(&schema, ProcedureKind::Transition, decl, item, modulus)?;
                schema.set_transition_function(procedure)?;
            }
            "evaluation" => {
                let procedure =
                    build_procedure(&schema, ProcedureKind::Evaluation, decl, item, modulus)?;
                schema.set_constraint_evaluator(procedure)?;
            }
            "export" => exports.push(build_export(decl, item, modulus)?),
            other => return Err(item.error(format!("unknown declaration '{other}'"))),
        }
    }

    schema.set_exports(exports)?;
    Ok(schema)
}

fn build_const(
    items: &[SExpr],
    parent: &SExpr,
    modulus: u64,
) -> Result<(Value, Option<String>), CompileError> {
    let mut cursor = 1;
    let handle = optional_handle(items, &mut cursor);
    let keyword = items
        .get(cursor)
        .and_then(SExpr::as_atom)
        .ok_or_else(|| parent.error("constant requires a type keyword"))?;
    let value = match keyword {
        "scalar" => {
            let cell = items
                .get(cursor + 1)
                .ok_or_else(|| parent.error("scalar constant requires a value"))?;
            Value::Scalar(felt(cell, modulus)?)
        }
        "vector" => {
            let cells = items[cursor + 1..]
                .iter()
                .map(|cell| felt(cell, modulus))
                .collect::<Result<Vec<_>, _>>()?;
            Value::vector(cells)?
        }
        "matrix" => {
            let rows = items[cursor + 1..]
                .iter()
                .map(|row| {
                    expect_list(row, "matrix row")?
                        .iter()
                        .map(|cell| felt(cell, modulus))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::matrix(rows)?
        }
        other => return Err(parent.error(format!("unknown constant type '{other}'"))),
    };
    Ok((value, handle))
}

fn build_registers(items: &[SExpr], modulus: u64) -> Result<StaticRegisterSet, CompileError> {
    let mut registers = Vec::with_capacity(items.len() - 1);
    for item in &items[1..] {
        let decl = expect_list(item, "static register")?;
        let register = match expect_keyword(decl, item)? {
            "input" => StaticRegister::Input(build_input(decl, item)?),
            "mask" => StaticRegister::Mask(build_mask(decl, item)?),
            "cycle" => StaticRegister::Cyclic(build_cycle(decl, item, modulus)?),
            other => return Err(item.error(format!("unknown register kind '{other}'"))),
        };
        registers.push(register);
    }
    StaticRegisterSet::new(registers)
}

fn build_input(items: &[SExpr], parent: &SExpr) -> Result<InputRegister, CompileError> {
    let mut cursor = 1;
    let scope = match items.get(cursor).and_then(SExpr::as_atom) {
        Some("secret") => InputScope::Secret,
        Some("public") => InputScope::Public,
        _ => return Err(parent.error("input register requires a secret or public scope")),
    };
    cursor += 1;

    let binary = items.get(cursor).and_then(SExpr::as_atom) == Some("binary");
    if binary {
        cursor += 1;
    }

    let kind = match items.get(cursor) {
        Some(shape) if shape.as_atom() == Some("scalar") => InputKind::Scalar,
        Some(shape) if shape.as_atom() == Some("vector") => InputKind::Vector,
        Some(shape) => {
            let inner = expect_list(shape, "input shape")?;
            match inner {
                [keyword, parent_ix] if keyword.as_atom() == Some("parent") => InputKind::Nested {
                    parent: expect_index(parent_ix, "parent register index")?,
                },
                _ => return Err(shape.error("expected scalar, vector or (parent k)")),
            }
        }
        None => return Err(parent.error("input register requires a shape")),
    };
    cursor += 1;

    let mut steps = None;
    let mut shift = 0i64;
    for item in &items[cursor..] {
        let option = expect_list(item, "input option")?;
        match expect_keyword(option, item)? {
            "steps" => {
                let value = option
                    .get(1)
                    .ok_or_else(|| item.error("steps option requires a value"))?;
                steps = Some(expect_index(value, "steps value")?);
            }
            "shift" => {
                let value = option
                    .get(1)
                    .and_then(SExpr::as_atom)
                    .and_then(parse_i64)
                    .ok_or_else(|| item.error("shift option requires a signed value"))?;
                shift = value;
            }
            other => return Err(item.error(format!("unknown input option '{other}'"))),
        }
    }

    Ok(InputRegister {
        scope,
        binary,
        kind,
        steps,
        shift,
    })
}

fn build_mask(items: &[SExpr], parent: &SExpr) -> Result<MaskRegister, CompileError> {
    let mut cursor = 1;
    let inverted = items.get(cursor).and_then(SExpr::as_atom) == Some("inverted");
    if inverted {
        cursor += 1;
    }
    let source_decl = items
        .get(cursor)
        .ok_or_else(|| parent.error("mask register requires an (input k) source"))?;
    let source_items = expect_list(source_decl, "mask source")?;
    let source = match source_items {
        [keyword, index] if keyword.as_atom() == Some("input") => {
            expect_index(index, "mask source index")?
        }
        _ => return Err(source_decl.error("expected (input k)")),
    };
    Ok(MaskRegister { source, inverted })
}

fn build_cycle(
    items: &[SExpr],
    parent: &SExpr,
    modulus: u64,
) -> Result<CyclicRegister, CompileError> {
    let source = match items.get(1) {
        Some(first) if first.as_list().is_some() => {
            let prng = expect_list(first, "prng sequence")?;
            match prng {
                [keyword, method, seed, count] if keyword.as_atom() == Some("prng") => {
                    if method.as_atom() != Some("sha256") {
                        return Err(method.error("only the sha256 prng method is supported"));
                    }
                    CyclicSource::Prng(PrngSequence {
                        seed: expect_integer(seed, "prng seed")?,
                        count: expect_index(count, "prng count")?,
                    })
                }
                _ => return Err(first.error("expected (prng sha256 <seed> <count>)")),
            }
        }
        Some(_) => {
            let values = items[1..]
                .iter()
                .map(|cell| felt(cell, modulus))
                .collect::<Result<Vec<_>, _>>()?;
            CyclicSource::Literal(values)
        }
        None => return Err(parent.error("cyclic register requires values")),
    };
    Ok(CyclicRegister { source })
}

/// Load, store and call resolution shared by procedure and function bodies.
trait ExprScope {
    fn load(&self, source: LoadSource, reference: Reference) -> Result<Expression, CompileError>;
    fn store(
        &self,
        reference: Reference,
        value: Expression,
    ) -> Result<StoreOperation, CompileError>;
    fn call(&self, reference: Reference, args: Vec<Expression>)
        -> Result<Expression, CompileError>;
}

impl ExprScope for ProcedureContext<'_> {
    fn load(&self, source: LoadSource, reference: Reference) -> Result<Expression, CompileError> {
        self.build_load(source, reference)
    }

    fn store(
        &self,
        reference: Reference,
        value: Expression,
    ) -> Result<StoreOperation, CompileError> {
        self.build_store(reference, value)
    }

    fn call(
        &self,
        reference: Reference,
        args: Vec<Expression>,
    ) -> Result<Expression, CompileError> {
        self.build_call(reference, args)
    }
}

impl ExprScope for FunctionContext<'_> {
    fn load(&self, source: LoadSource, reference: Reference) -> Result<Expression, CompileError> {
        self.build_load(source, reference)
    }

    fn store(
        &self,
        reference: Reference,
        value: Expression,
    ) -> Result<StoreOperation, CompileError> {
        self.build_store(reference, value)
    }

    fn call(
        &self,
        reference: Reference,
        args: Vec<Expression>,
    ) -> Result<Expression, CompileError> {
        self.build_call(reference, args)
    }
}

fn binary_op(keyword: &str) -> Option<BinaryOp> {
    match keyword {
        "add" => Some(BinaryOp::Add),
        "sub" => Some(BinaryOp::Sub),
        "mul" => Some(BinaryOp::Mul),
        "div" => Some(BinaryOp::Div),
        "exp" => Some(BinaryOp::Exp),
        "prod" => Some(BinaryOp::Prod),
        _ => None,
    }
}

fn load_source(keyword: &str) -> Option<LoadSource> {
    match keyword {
        "load.const" => Some(LoadSource::Const),
        "load.local" => Some(LoadSource::Local),
        "load.param" => Some(LoadSource::Param),
        "load.trace" => Some(LoadSource::Trace),
        "load.static" => Some(LoadSource::Static),
        _ => None,
    }
}

fn build_expression(
    expr: &SExpr,
    scope: &dyn ExprScope,
    modulus: u64,
) -> Result<Expression, CompileError> {
    if expr.as_atom().is_some() {
        return Ok(Expression::literal(Value::Scalar(felt(expr, modulus)?)));
    }
    let items = expect_list(expr, "expression")?;
    let keyword = expect_keyword(items, expr)?;

    if let Some(op) = binary_op(keyword) {
        if items.len() != 3 {
            return Err(expr.error(format!("{keyword} requires exactly two operands")));
        }
        let lhs = build_expression(&items[1], scope, modulus)?;
        let rhs = build_expression(&items[2], scope, modulus)?;
        return Expression::binary(op, lhs, rhs);
    }
    if keyword == "neg" || keyword == "inv" {
        if items.len() != 2 {
            return Err(expr.error(format!("{keyword} requires exactly one operand")));
        }
        let op = if keyword == "neg" {
            UnaryOp::Neg
        } else {
            UnaryOp::Inv
        };
        let operand = build_expression(&items[1], scope, modulus)?;
        return Ok(Expression::unary(op, operand));
    }
    if let Some(source) = load_source(keyword) {
        if items.len() != 2 {
            return Err(expr.error(format!("{keyword} requires a reference")));
        }
        return scope.load(source, reference(&items[1])?);
    }

    match keyword {
        "vector" => {
            let literal = items[1..]
                .iter()
                .all(|item| item.as_atom().and_then(parse_u64).is_some());
            if literal && items.len() > 1 {
                let cells = items[1..]
                    .iter()
                    .map(|cell| felt(cell, modulus))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::literal(Value::vector(cells)?))
            } else {
                let elements = items[1..]
                    .iter()
                    .map(|item| build_expression(item, scope, modulus))
                    .collect::<Result<Vec<_>, _>>()?;
                Expression::make_vector(elements)
            }
        }
        "matrix" => {
            let rows: Vec<&[SExpr]> = items[1..]
                .iter()
                .map(|row| expect_list(row, "matrix row"))
                .collect::<Result<Vec<_>, _>>()?;
            let literal = rows
                .iter()
                .flat_map(|row| row.iter())
                .all(|cell| cell.as_atom().and_then(parse_u64).is_some());
            if literal && !rows.is_empty() {
                let cells = rows
                    .iter()
                    .map(|row| row.iter().map(|cell| felt(cell, modulus)).collect())
                    .collect::<Result<Vec<Vec<_>>, _>>()?;
                Ok(Expression::literal(Value::matrix(cells)?))
            } else {
                let cells = rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|cell| build_expression(cell, scope, modulus))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Expression::make_matrix(cells)
            }
        }
        "get" => {
            if items.len() != 3 {
                return Err(expr.error("get requires a source and an index"));
            }
            let source = build_expression(&items[1], scope, modulus)?;
            Expression::get_element(source, expect_index(&items[2], "element index")?)
        }
        "slice" => {
            if items.len() != 4 {
                return Err(expr.error("slice requires a source and two bounds"));
            }
            let source = build_expression(&items[1], scope, modulus)?;
            Expression::slice(
                source,
                expect_index(&items[2], "slice start")?,
                expect_index(&items[3], "slice end")?,
            )
        }
        "call" => {
            if items.len() < 2 {
                return Err(expr.error("call requires a function reference"));
            }
            let args = items[2..]
                .iter()
                .map(|item| build_expression(item, scope, modulus))
                .collect::<Result<Vec<_>, _>>()?;
            scope.call(reference(&items[1])?, args)
        }
        other => Err(expr.error(format!("unknown operation '{other}'"))),
    }
}

fn slot_decl(items: &[SExpr], parent: &SExpr) -> Result<(Dimensions, Option<String>), CompileError> {
    let mut cursor = 1;
    let handle = optional_handle(items, &mut cursor);
    let dims = parse_dims(items, cursor, parent)?;
    Ok((dims, handle))
}

fn is_decl(expr: &SExpr, keyword: &str) -> bool {
    expr.as_list()
        .and_then(|items| items.first())
        .and_then(SExpr::as_atom)
        == Some(keyword)
}

fn build_procedure(
    schema: &AirSchema,
    kind: ProcedureKind,
    items: &[SExpr],
    parent: &SExpr,
    modulus: u64,
) -> Result<crate::ir::Procedure, CompileError> {
    let mut cursor = 1;

    let span_decl = items
        .get(cursor)
        .ok_or_else(|| parent.error("procedure requires a span declaration"))?;
    let span_items = expect_list(span_decl, "span")?;
    let span = match span_items {
        [keyword, value] if keyword.as_atom() == Some("span") => {
            expect_index(value, "span value")?
        }
        _ => return Err(span_decl.error("expected (span <n>)")),
    };
    if span != kind.span() {
        return Err(span_decl.error(format!(
            "{} procedures have span {}, got {span}",
            kind.keyword(),
            kind.span()
        )));
    }
    cursor += 1;

    let result_decl = items
        .get(cursor)
        .ok_or_else(|| parent.error("procedure requires a result declaration"))?;
    let result_items = expect_list(result_decl, "result")?;
    let width = match result_items {
        [keyword, vector, value]
            if keyword.as_atom() == Some("result") && vector.as_atom() == Some("vector") =>
        {
            expect_index(value, "result width")?
        }
        _ => return Err(result_decl.error("expected (result vector <width>)")),
    };
    cursor += 1;

    let mut ctx = ProcedureContext::new(kind, schema, width)?;
    while items.get(cursor).is_some_and(|item| is_decl(item, "local")) {
        let decl = expect_list(&items[cursor], "local")?;
        let (dims, handle) = slot_decl(decl, &items[cursor])?;
        ctx.add_local(dims, handle)?;
        cursor += 1;
    }

    let mut stores = Vec::new();
    while items
        .get(cursor)
        .is_some_and(|item| is_decl(item, "store.local"))
    {
        let decl = expect_list(&items[cursor], "store")?;
        stores.push(build_store(decl, &items[cursor], &ctx, modulus)?);
        cursor += 1;
    }

    let result = match items.get(cursor) {
        Some(result) if cursor + 1 == items.len() => build_expression(result, &ctx, modulus)?,
        _ => return Err(parent.error("procedure requires exactly one result expression")),
    };
    ctx.into_procedure(stores, result)
}

fn build_store(
    items: &[SExpr],
    parent: &SExpr,
    scope: &dyn ExprScope,
    modulus: u64,
) -> Result<StoreOperation, CompileError> {
    match items {
        [_, target, value] => {
            let value = build_expression(value, scope, modulus)?;
            scope.store(reference(target)?, value)
        }
        _ => Err(parent.error("expected (store.local <ref> <expression>)")),
    }
}

fn build_function(
    schema: &AirSchema,
    items: &[SExpr],
    parent: &SExpr,
    modulus: u64,
) -> Result<crate::ir::AirFunction, CompileError> {
    let mut cursor = 1;
    let handle = optional_handle(items, &mut cursor);

    let result_decl = items
        .get(cursor)
        .ok_or_else(|| parent.error("function requires a result declaration"))?;
    let result_items = expect_list(result_decl, "result")?;
    if result_items.first().and_then(SExpr::as_atom) != Some("result") {
        return Err(result_decl.error("expected (result <type>)"));
    }
    let result_dims = parse_dims(result_items, 1, result_decl)?;
    cursor += 1;

    let mut ctx = FunctionContext::new(schema);
    while items.get(cursor).is_some_and(|item| is_decl(item, "param")) {
        let decl = expect_list(&items[cursor], "param")?;
        let (dims, param_handle) = slot_decl(decl, &items[cursor])?;
        ctx.add_param(dims, param_handle)?;
        cursor += 1;
    }
    while items.get(cursor).is_some_and(|item| is_decl(item, "local")) {
        let decl = expect_list(&items[cursor], "local")?;
        let (dims, local_handle) = slot_decl(decl, &items[cursor])?;
        ctx.add_local(dims, local_handle)?;
        cursor += 1;
    }

    let mut stores = Vec::new();
    while items
        .get(cursor)
        .is_some_and(|item| is_decl(item, "store.local"))
    {
        let decl = expect_list(&items[cursor], "store")?;
        stores.push(build_store(decl, &items[cursor], &ctx, modulus)?);
        cursor += 1;
    }

    let result = match items.get(cursor) {
        Some(result) if cursor + 1 == items.len() => build_expression(result, &ctx, modulus)?,
        _ => return Err(parent.error("function requires exactly one result expression")),
    };
    if result.dims() != result_dims {
        return Err(CompileError::UnexpectedShape {
            context: "function result",
            expected: result_dims,
            actual: result.dims(),
        });
    }
    Ok(ctx.into_function(handle, stores, result))
}

fn build_export(
    items: &[SExpr],
    parent: &SExpr,
    modulus: u64,
) -> Result<ExportDeclaration, CompileError> {
    let name = items
        .get(1)
        .and_then(SExpr::as_atom)
        .ok_or_else(|| parent.error("export requires a name"))?;
    let mut initializer = None;
    let mut cycle_length = None;
    for item in &items[2..] {
        let option = expect_list(item, "export option")?;
        match expect_keyword(option, item)? {
            "init" => {
                let value = option
                    .get(1)
                    .ok_or_else(|| item.error("init option requires a value"))?;
                initializer = Some(match value.as_atom() {
                    Some("seed") => Initializer::Seed,
                    Some(_) => return Err(value.error("expected seed or (vector ...)")),
                    None => {
                        let vector = expect_list(value, "init vector")?;
                        match vector.first().and_then(SExpr::as_atom) {
                            Some("vector") => Initializer::Literal(
                                vector[1..]
                                    .iter()
                                    .map(|cell| felt(cell, modulus))
                                    .collect::<Result<Vec<_>, _>>()?,
                            ),
                            _ => return Err(value.error("expected seed or (vector ...)")),
                        }
                    }
                });
            }
            "steps" => {
                let value = option
                    .get(1)
                    .ok_or_else(|| item.error("steps option requires a value"))?;
                cycle_length = Some(expect_index(value, "steps value")?);
            }
            other => return Err(item.error(format!("unknown export option '{other}'"))),
        }
    }
    let cycle_length =
        cycle_length.ok_or_else(|| parent.error("export requires a (steps n) option"))?;
    ExportDeclaration::new(name, cycle_length, initializer)
}
