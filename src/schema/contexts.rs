//! Execution contexts: symbol tables used while building procedure and
//! function bodies.
//!
//! Contexts resolve handle or index references into stable numeric indices
//! at build time and reject out-of-range or type-mismatched accesses, so
//! the finished IR never looks anything up by string.

use crate::ir::{
    AirFunction, CompileError, Dimensions, Expression, LoadSource, LocalSlot, Parameter,
    Procedure, ProcedureKind, StoreOperation,
};

use super::AirSchema;

/// Symbol reference as written in the source: numeric or `$handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Zero-based numeric index.
    Index(usize),
    /// Handle without the `$` sigil.
    Handle(String),
}

impl From<usize> for Reference {
    fn from(index: usize) -> Self {
        Reference::Index(index)
    }
}

impl From<&str> for Reference {
    fn from(handle: &str) -> Self {
        Reference::Handle(handle.to_string())
    }
}

impl Reference {
    fn describe(&self) -> String {
        match self {
            Reference::Index(index) => index.to_string(),
            Reference::Handle(handle) => format!("${handle}"),
        }
    }
}

fn resolve<'a>(
    reference: &Reference,
    what: &'static str,
    count: usize,
    handle_of: impl Fn(usize) -> Option<&'a str>,
) -> Result<usize, CompileError> {
    match reference {
        Reference::Index(index) => {
            if *index >= count {
                return Err(CompileError::IndexOutOfRange {
                    what,
                    index: *index,
                    limit: count,
                });
            }
            Ok(*index)
        }
        Reference::Handle(handle) => (0..count)
            .find(|ix| handle_of(*ix) == Some(handle.as_str()))
            .ok_or_else(|| CompileError::UndefinedReference {
                what,
                reference: reference.describe(),
            }),
    }
}

fn check_duplicate<'a>(
    handle: &Option<String>,
    existing: impl Iterator<Item = Option<&'a str>>,
) -> Result<(), CompileError> {
    if let Some(handle) = handle {
        for previous in existing.flatten() {
            if previous == handle {
                return Err(CompileError::DuplicateHandle {
                    handle: handle.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Builder context for the transition and evaluation procedures.
#[derive(Debug)]
pub struct ProcedureContext<'a> {
    schema: &'a AirSchema,
    kind: ProcedureKind,
    width: usize,
    locals: Vec<LocalSlot>,
}

impl<'a> ProcedureContext<'a> {
    /// Creates a context for the given procedure role and trace width.
    pub fn new(
        kind: ProcedureKind,
        schema: &'a AirSchema,
        width: usize,
    ) -> Result<Self, CompileError> {
        if width == 0 {
            return Err(CompileError::Structure(
                "procedure width must be strictly positive",
            ));
        }
        Ok(Self {
            schema,
            kind,
            width,
            locals: Vec::new(),
        })
    }

    /// Number of visible trace rows.
    pub fn span(&self) -> usize {
        self.kind.span()
    }

    /// Declares a local slot and returns its index.
    pub fn add_local(
        &mut self,
        dims: Dimensions,
        handle: Option<String>,
    ) -> Result<usize, CompileError> {
        check_duplicate(&handle, self.locals.iter().map(|slot| slot.handle.as_deref()))?;
        self.locals.push(LocalSlot { dims, handle });
        Ok(self.locals.len() - 1)
    }

    /// Builds a resolved load expression for this procedure.
    pub fn build_load(
        &self,
        source: LoadSource,
        reference: Reference,
    ) -> Result<Expression, CompileError> {
        match source {
            LoadSource::Const => build_const_load(self.schema, &reference),
            LoadSource::Local => {
                let index = resolve(&reference, "local slot", self.locals.len(), |ix| {
                    self.locals[ix].handle.as_deref()
                })?;
                Ok(Expression::load(source, index, self.locals[index].dims))
            }
            LoadSource::Param => Err(CompileError::Structure(
                "procedures have no parameters to load",
            )),
            LoadSource::Trace => {
                let index = resolve(&reference, "trace row offset", self.span(), |_| None)?;
                Ok(Expression::load(source, index, Dimensions::Vector(self.width)))
            }
            LoadSource::Static => {
                let count = self.schema.static_registers().len();
                let index = resolve(&reference, "static register", count, |_| None)?;
                Ok(Expression::load(source, index, Dimensions::Scalar))
            }
        }
    }

    /// Builds a store into a local slot, checking the stored shape.
    pub fn build_store(
        &self,
        reference: Reference,
        value: Expression,
    ) -> Result<StoreOperation, CompileError> {
        build_store(&self.locals, reference, value)
    }

    /// Builds a call to a schema function, checking the argument shapes.
    pub fn build_call(
        &self,
        reference: Reference,
        args: Vec<Expression>,
    ) -> Result<Expression, CompileError> {
        build_call(self.schema.functions(), reference, args)
    }

    /// Finishes the context into a procedure body.
    pub fn into_procedure(
        self,
        stores: Vec<StoreOperation>,
        result: Expression,
    ) -> Result<Procedure, CompileError> {
        Procedure::new(self.kind, self.width, self.locals, stores, result)
    }
}

/// Builder context for reusable schema functions.
#[derive(Debug)]
pub struct FunctionContext<'a> {
    schema: &'a AirSchema,
    params: Vec<Parameter>,
    locals: Vec<LocalSlot>,
}

impl<'a> FunctionContext<'a> {
    /// Creates an empty function context.
    pub fn new(schema: &'a AirSchema) -> Self {
        Self {
            schema,
            params: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Declares a parameter and returns its index.
    pub fn add_param(
        &mut self,
        dims: Dimensions,
        handle: Option<String>,
    ) -> Result<usize, CompileError> {
        check_duplicate(&handle, self.params.iter().map(|param| param.handle.as_deref()))?;
        self.params.push(Parameter { dims, handle });
        Ok(self.params.len() - 1)
    }

    /// Declares a local slot and returns its index.
    pub fn add_local(
        &mut self,
        dims: Dimensions,
        handle: Option<String>,
    ) -> Result<usize, CompileError> {
        check_duplicate(&handle, self.locals.iter().map(|slot| slot.handle.as_deref()))?;
        self.locals.push(LocalSlot { dims, handle });
        Ok(self.locals.len() - 1)
    }

    /// Builds a resolved load expression for this function.
    ///
    /// Functions are pure: trace and static loads are rejected, keeping the
    /// bodies reusable from both procedures.
    pub fn build_load(
        &self,
        source: LoadSource,
        reference: Reference,
    ) -> Result<Expression, CompileError> {
        match source {
            LoadSource::Const => build_const_load(self.schema, &reference),
            LoadSource::Local => {
                let index = resolve(&reference, "local slot", self.locals.len(), |ix| {
                    self.locals[ix].handle.as_deref()
                })?;
                Ok(Expression::load(source, index, self.locals[index].dims))
            }
            LoadSource::Param => {
                let index = resolve(&reference, "parameter", self.params.len(), |ix| {
                    self.params[ix].handle.as_deref()
                })?;
                Ok(Expression::load(source, index, self.params[index].dims))
            }
            LoadSource::Trace | LoadSource::Static => Err(CompileError::Structure(
                "functions cannot read trace or static registers",
            )),
        }
    }

    /// Builds a store into a local slot, checking the stored shape.
    pub fn build_store(
        &self,
        reference: Reference,
        value: Expression,
    ) -> Result<StoreOperation, CompileError> {
        build_store(&self.locals, reference, value)
    }

    /// Builds a call to an earlier-declared schema function.
    pub fn build_call(
        &self,
        reference: Reference,
        args: Vec<Expression>,
    ) -> Result<Expression, CompileError> {
        build_call(self.schema.functions(), reference, args)
    }

    /// Finishes the context into a function body.
    pub fn into_function(
        self,
        handle: Option<String>,
        stores: Vec<StoreOperation>,
        result: Expression,
    ) -> AirFunction {
        AirFunction::new(handle, self.params, self.locals, stores, result)
    }
}

fn build_const_load(schema: &AirSchema, reference: &Reference) -> Result<Expression, CompileError> {
    let index = resolve(reference, "constant", schema.constants().len(), |ix| {
        schema.constant_handle(ix)
    })?;
    let dims = schema.constants()[index].dims();
    Ok(Expression::load(LoadSource::Const, index, dims))
}

fn build_store(
    locals: &[LocalSlot],
    reference: Reference,
    value: Expression,
) -> Result<StoreOperation, CompileError> {
    let index = resolve(&reference, "local slot", locals.len(), |ix| {
        locals[ix].handle.as_deref()
    })?;
    if value.dims() != locals[index].dims {
        return Err(CompileError::UnexpectedShape {
            context: "stored value",
            expected: locals[index].dims,
            actual: value.dims(),
        });
    }
    Ok(StoreOperation {
        target: index,
        value,
    })
}

fn build_call(
    functions: &[AirFunction],
    reference: Reference,
    args: Vec<Expression>,
) -> Result<Expression, CompileError> {
    let index = resolve(&reference, "function", functions.len(), |ix| {
        functions[ix].handle()
    })?;
    let function = &functions[index];
    if args.len() != function.params().len() {
        return Err(CompileError::Arity {
            context: "call arguments",
            expected: function.params().len(),
            actual: args.len(),
        });
    }
    for (arg, param) in args.iter().zip(function.params()) {
        if arg.dims() != param.dims {
            return Err(CompileError::UnexpectedShape {
                context: "call argument",
                expected: param.dims,
                actual: arg.dims(),
            });
        }
    }
    Ok(Expression::call(index, args, function.result_dims()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Value;

    fn schema() -> AirSchema {
        let mut schema = AirSchema::new(96769).unwrap();
        schema
            .add_constant(Value::Scalar(crate::field::Felt(3)), Some("alpha".into()))
            .unwrap();
        schema
    }

    #[test]
    fn handles_resolve_to_stable_indices() {
        let schema = schema();
        let ctx = ProcedureContext::new(ProcedureKind::Transition, &schema, 1).unwrap();
        let by_handle = ctx
            .build_load(LoadSource::Const, Reference::from("alpha"))
            .unwrap();
        let by_index = ctx.build_load(LoadSource::Const, Reference::from(0)).unwrap();
        assert_eq!(by_handle, by_index);
    }

    #[test]
    fn trace_offsets_are_bounded_by_the_span() {
        let schema = schema();
        let transition = ProcedureContext::new(ProcedureKind::Transition, &schema, 1).unwrap();
        assert!(transition
            .build_load(LoadSource::Trace, Reference::from(0))
            .is_ok());
        let err = transition
            .build_load(LoadSource::Trace, Reference::from(1))
            .unwrap_err();
        assert!(matches!(err, CompileError::IndexOutOfRange { .. }));

        let evaluation = ProcedureContext::new(ProcedureKind::Evaluation, &schema, 1).unwrap();
        assert!(evaluation
            .build_load(LoadSource::Trace, Reference::from(1))
            .is_ok());
    }

    #[test]
    fn stores_check_the_declared_shape() {
        let schema = schema();
        let mut ctx = ProcedureContext::new(ProcedureKind::Transition, &schema, 2).unwrap();
        ctx.add_local(Dimensions::Scalar, None).unwrap();
        let row = ctx.build_load(LoadSource::Trace, Reference::from(0)).unwrap();
        let err = ctx.build_store(Reference::from(0), row).unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedShape { .. }));
    }

    #[test]
    fn duplicate_local_handles_are_rejected() {
        let schema = schema();
        let mut ctx = ProcedureContext::new(ProcedureKind::Transition, &schema, 1).unwrap();
        ctx.add_local(Dimensions::Scalar, Some("acc".into())).unwrap();
        let err = ctx
            .add_local(Dimensions::Scalar, Some("acc".into()))
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateHandle { .. }));
    }

    #[test]
    fn functions_cannot_touch_the_trace() {
        let schema = schema();
        let ctx = FunctionContext::new(&schema);
        let err = ctx
            .build_load(LoadSource::Trace, Reference::from(0))
            .unwrap_err();
        assert!(matches!(err, CompileError::Structure(_)));
    }
}
