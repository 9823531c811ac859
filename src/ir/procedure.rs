//! Procedure and function bodies: locals, ordered stores, result expression.

use super::{CompileError, Dimensions, Expression};

/// Role of a procedure within the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    /// Advances the execution trace by one row.
    Transition,
    /// Measures the deviation of a witness trace from the transition
    /// relation; sees the current and the next row.
    Evaluation,
}

impl ProcedureKind {
    /// Number of consecutive trace rows visible to the procedure.
    pub const fn span(self) -> usize {
        match self {
            ProcedureKind::Transition => 1,
            ProcedureKind::Evaluation => 2,
        }
    }

    /// Returns the source-language keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            ProcedureKind::Transition => "transition",
            ProcedureKind::Evaluation => "evaluation",
        }
    }
}

/// Declared local slot of a procedure or function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    /// Shape of the stored value.
    pub dims: Dimensions,
    /// Optional handle used during construction; resolved before freeze.
    pub handle: Option<String>,
}

/// Declared parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Shape of the argument.
    pub dims: Dimensions,
    /// Optional handle used during construction; resolved before freeze.
    pub handle: Option<String>,
}

/// Write of an expression into a local slot; stores execute in declared
/// order before the result expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOperation {
    /// Resolved local slot index.
    pub target: usize,
    /// Stored expression; its shape matches the slot declaration.
    pub value: Expression,
}

/// Transition or evaluation procedure of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    kind: ProcedureKind,
    width: usize,
    locals: Vec<LocalSlot>,
    stores: Vec<StoreOperation>,
    result: Expression,
}

impl Procedure {
    /// Assembles a procedure, checking the result shape against the width.
    pub fn new(
        kind: ProcedureKind,
        width: usize,
        locals: Vec<LocalSlot>,
        stores: Vec<StoreOperation>,
        result: Expression,
    ) -> Result<Self, CompileError> {
        if width == 0 {
            return Err(CompileError::Structure(
                "procedure width must be strictly positive",
            ));
        }
        if result.dims() != Dimensions::Vector(width) {
            return Err(CompileError::UnexpectedShape {
                context: "procedure result",
                expected: Dimensions::Vector(width),
                actual: result.dims(),
            });
        }
        Ok(Self {
            kind,
            width,
            locals,
            stores,
            result,
        })
    }

    /// Returns the procedure role.
    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    /// Number of visible trace rows.
    pub fn span(&self) -> usize {
        self.kind.span()
    }

    /// Width of the result vector (and of the execution trace).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Declared local slots.
    pub fn locals(&self) -> &[LocalSlot] {
        &self.locals
    }

    /// Ordered store operations.
    pub fn stores(&self) -> &[StoreOperation] {
        &self.stores
    }

    /// Terminal result expression.
    pub fn result(&self) -> &Expression {
        &self.result
    }
}

/// Named, reusable subroutine callable from procedures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirFunction {
    handle: Option<String>,
    params: Vec<Parameter>,
    locals: Vec<LocalSlot>,
    stores: Vec<StoreOperation>,
    result: Expression,
}

impl AirFunction {
    /// Assembles a function body.
    pub fn new(
        handle: Option<String>,
        params: Vec<Parameter>,
        locals: Vec<LocalSlot>,
        stores: Vec<StoreOperation>,
        result: Expression,
    ) -> Self {
        Self {
            handle,
            params,
            locals,
            stores,
            result,
        }
    }

    /// Optional handle of the function.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    /// Declared parameters.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Declared local slots.
    pub fn locals(&self) -> &[LocalSlot] {
        &self.locals
    }

    /// Ordered store operations.
    pub fn stores(&self) -> &[StoreOperation] {
        &self.stores
    }

    /// Result expression.
    pub fn result(&self) -> &Expression {
        &self.result
    }

    /// Shape of the result expression.
    pub fn result_dims(&self) -> Dimensions {
        self.result.dims()
    }
}
