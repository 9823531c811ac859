//! Static register bank: input, mask and cyclic registers.
//!
//! Registers are declared in a fixed order (inputs, then masks, then
//! cyclic) and materialized into trace columns once concrete inputs and a
//! target trace length are known. Input registers track which cells hold
//! natively supplied values so that mask registers can read the metadata
//! instead of re-deriving it.

use crate::field::{Felt, PrimeField};
use crate::hash;
use crate::ir::CompileError;

/// Visibility of an input register's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScope {
    /// Values are part of the prover's witness.
    Secret,
    /// Values are known to the verifier.
    Public,
}

impl InputScope {
    /// Returns the source-language keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            InputScope::Secret => "secret",
            InputScope::Public => "public",
        }
    }
}

/// Declared layout of an input register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Exactly one value per instance.
    Scalar,
    /// A flat power-of-two sequence of values.
    Vector,
    /// Values nest inside the cells of an ancestor input register.
    Nested {
        /// Index of the parent input register.
        parent: usize,
    },
}

/// Input-driven static register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRegister {
    /// Visibility of the supplied values.
    pub scope: InputScope,
    /// Restricts values to `{0, 1}` when set.
    pub binary: bool,
    /// Declared layout.
    pub kind: InputKind,
    /// Lower bound on the trace span covered by the register's cycle.
    pub steps: Option<usize>,
    /// Signed rotation applied to the materialized column.
    pub shift: i64,
}

/// Derived register exposing where an input register holds native values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRegister {
    /// Index of the observed input register.
    pub source: usize,
    /// Emit `0` at native cells instead of `1`.
    pub inverted: bool,
}

/// Deterministic pseudo-random value sequence for a cyclic register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrngSequence {
    /// Seed hashed in front of the block counter.
    pub seed: u64,
    /// Number of derived field elements; the register's period.
    pub count: usize,
}

/// Value source of a cyclic register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CyclicSource {
    /// Literal period values.
    Literal(Vec<Felt>),
    /// sha256 counter-mode expansion.
    Prng(PrngSequence),
}

/// Periodic static register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicRegister {
    /// Period values or their PRNG recipe.
    pub source: CyclicSource,
}

/// One static register declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticRegister {
    /// Input-driven column.
    Input(InputRegister),
    /// Mask over an input column.
    Mask(MaskRegister),
    /// Periodic column.
    Cyclic(CyclicRegister),
}

/// Concrete input values for one input register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    /// Flat sequence for scalar and vector registers.
    Flat(Vec<Felt>),
    /// Nested sequences for `(parent k)` registers.
    Nested(Vec<InputValue>),
}

/// Flattened input arities, recoverable by prover and verifier alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    counts: Vec<usize>,
}

impl InputDescriptor {
    /// Total flattened value count per input register, in register order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
}

/// Materialized register columns over the execution domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTraces {
    /// One column per register, in register order.
    pub columns: Vec<Vec<Felt>>,
    /// Indices of the secret input registers.
    pub secret_indices: Vec<usize>,
    /// Flattened input arities observed during materialization.
    pub descriptor: InputDescriptor,
}

impl RegisterTraces {
    /// Returns the secret input columns, in register order.
    pub fn secret_columns(&self) -> Vec<&[Felt]> {
        self.secret_indices
            .iter()
            .map(|ix| self.columns[*ix].as_slice())
            .collect()
    }
}

/// Ordered bank of static registers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticRegisterSet {
    registers: Vec<StaticRegister>,
    num_inputs: usize,
}

impl StaticRegisterSet {
    /// Creates the bank, validating the declaration order and references.
    pub fn new(registers: Vec<StaticRegister>) -> Result<Self, CompileError> {
        let mut num_inputs = 0;
        let mut num_masks = 0;
        let mut num_cyclic = 0;
        for (ix, register) in registers.iter().enumerate() {
            match register {
                StaticRegister::Input(input) => {
                    if num_masks > 0 || num_cyclic > 0 {
                        return Err(CompileError::Structure(
                            "input registers must precede mask and cyclic registers",
                        ));
                    }
                    if let Some(steps) = input.steps {
                        if steps == 0 || !steps.is_power_of_two() {
                            return Err(CompileError::Structure(
                                "input register steps must be a power of two",
                            ));
                        }
                    }
                    if let InputKind::Nested { parent } = input.kind {
                        if parent >= ix {
                            return Err(CompileError::IndexOutOfRange {
                                what: "parent input register",
                                index: parent,
                                limit: ix,
                            });
                        }
                    }
                    num_inputs += 1;
                }
                StaticRegister::Mask(mask) => {
                    if num_cyclic > 0 {
                        return Err(CompileError::Structure(
                            "mask registers must precede cyclic registers",
                        ));
                    }
                    if mask.source >= num_inputs {
                        return Err(CompileError::IndexOutOfRange {
                            what: "mask source register",
                            index: mask.source,
                            limit: num_inputs,
                        });
                    }
                    num_masks += 1;
                }
                StaticRegister::Cyclic(cyclic) => {
                    let period = match &cyclic.source {
                        CyclicSource::Literal(values) => values.len(),
                        CyclicSource::Prng(sequence) => sequence.count,
                    };
                    if period == 0 || !period.is_power_of_two() {
                        return Err(CompileError::Structure(
                            "cyclic register period must be a power of two",
                        ));
                    }
                    num_cyclic += 1;
                }
            }
        }
        Ok(Self {
            registers,
            num_inputs,
        })
    }

    /// Returns all registers in declaration order.
    pub fn registers(&self) -> &[StaticRegister] {
        &self.registers
    }

    /// Returns the number of registers.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` when the bank is empty.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Returns the number of input registers.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Indices of the secret input registers.
    pub fn secret_indices(&self) -> Vec<usize> {
        self.registers
            .iter()
            .enumerate()
            .filter_map(|(ix, register)| match register {
                StaticRegister::Input(input) if input.scope == InputScope::Secret => Some(ix),
                _ => None,
            })
            .collect()
    }

    /// Minimum trace length implied by the declared cycles; the enclosing
    /// export's cycle length must not undercut it.
    pub fn min_trace_length(&self) -> usize {
        let mut min = 1;
        for register in &self.registers {
            let implied = match register {
                StaticRegister::Input(input) => input.steps.unwrap_or(1),
                StaticRegister::Mask(_) => 1,
                StaticRegister::Cyclic(cyclic) => match &cyclic.source {
                    CyclicSource::Literal(values) => values.len(),
                    CyclicSource::Prng(sequence) => sequence.count,
                },
            };
            min = min.max(implied);
        }
        min
    }

    /// Validates concrete inputs and returns their flattened arities.
    pub fn describe_inputs(&self, inputs: &[InputValue]) -> Result<InputDescriptor, CompileError> {
        if inputs.len() != self.num_inputs {
            return Err(CompileError::Arity {
                context: "input register values",
                expected: self.num_inputs,
                actual: inputs.len(),
            });
        }
        let mut counts = Vec::with_capacity(self.num_inputs);
        for (ix, value) in inputs.iter().enumerate() {
            let register = match &self.registers[ix] {
                StaticRegister::Input(input) => input,
                _ => unreachable!("inputs precede every other register kind"),
            };
            let flattened = flatten_input(register, value, &counts, ix)?;
            counts.push(flattened.len());
        }
        Ok(InputDescriptor { counts })
    }

    /// Materializes the registers visible to a verifier: public input
    /// columns from the supplied values, mask columns from the recorded
    /// arities, cyclic columns from their formula. Secret input registers
    /// yield `None`; their values arrive per evaluation point instead.
    ///
    /// `public_inputs` holds one entry per **public** input register, in
    /// register order.
    pub fn materialize_public(
        &self,
        field: &PrimeField,
        descriptor: &InputDescriptor,
        public_inputs: &[InputValue],
        trace_length: usize,
    ) -> Result<Vec<Option<Vec<Felt>>>, CompileError> {
        if descriptor.counts.len() != self.num_inputs {
            return Err(CompileError::Arity {
                context: "input shape descriptor",
                expected: self.num_inputs,
                actual: descriptor.counts.len(),
            });
        }
        let num_public = self
            .registers
            .iter()
            .filter(|register| {
                matches!(register, StaticRegister::Input(input) if input.scope == InputScope::Public)
            })
            .count();
        if public_inputs.len() != num_public {
            return Err(CompileError::Arity {
                context: "public input register values",
                expected: num_public,
                actual: public_inputs.len(),
            });
        }

        let mut next_public = 0;
        let mut columns = Vec::with_capacity(self.registers.len());
        for (ix, register) in self.registers.iter().enumerate() {
            let column = match register {
                StaticRegister::Input(input) => match input.scope {
                    InputScope::Secret => None,
                    InputScope::Public => {
                        let value = &public_inputs[next_public];
                        next_public += 1;
                        let values =
                            flatten_input(input, value, &descriptor.counts[..ix], ix)?;
                        if values.len() != descriptor.counts[ix] {
                            return Err(CompileError::Arity {
                                context: "public input value count",
                                expected: descriptor.counts[ix],
                                actual: values.len(),
                            });
                        }
                        let (column, _) =
                            materialize_input(input, &values, trace_length, field)?;
                        Some(column)
                    }
                },
                StaticRegister::Mask(mask) => {
                    let (source, count) = match &self.registers[mask.source] {
                        StaticRegister::Input(input) => (input, descriptor.counts[mask.source]),
                        _ => unreachable!("mask sources are validated to be inputs"),
                    };
                    if count == 0 || count > trace_length {
                        return Err(CompileError::Arity {
                            context: "input values per trace cycle",
                            expected: trace_length,
                            actual: count,
                        });
                    }
                    let (period, offset) = mask_pattern(trace_length / count, source.shift);
                    Some(
                        (0..trace_length)
                            .map(|step| {
                                if (step % period == offset) != mask.inverted {
                                    Felt::ONE
                                } else {
                                    Felt::ZERO
                                }
                            })
                            .collect(),
                    )
                }
                StaticRegister::Cyclic(cyclic) => {
                    let values = cyclic_values(field, &cyclic.source);
                    Some((0..trace_length).map(|step| values[step % values.len()]).collect())
                }
            };
            columns.push(column);
        }
        Ok(columns)
    }

    /// Materializes every register into a column of `trace_length` cells.
    pub fn materialize(
        &self,
        field: &PrimeField,
        inputs: &[InputValue],
        trace_length: usize,
    ) -> Result<RegisterTraces, CompileError> {
        let descriptor = self.describe_inputs(inputs)?;
        let mut columns: Vec<Vec<Felt>> = Vec::with_capacity(self.registers.len());
        let mut native_flags: Vec<Vec<bool>> = Vec::with_capacity(self.num_inputs);

        for (ix, register) in self.registers.iter().enumerate() {
            let column = match register {
                StaticRegister::Input(input) => {
                    let values =
                        flatten_input(input, &inputs[ix], &descriptor.counts[..ix], ix)?;
                    let (column, native) =
                        materialize_input(input, &values, trace_length, field)?;
                    native_flags.push(native);
                    column
                }
                StaticRegister::Mask(mask) => {
                    let native = &native_flags[mask.source];
                    native
                        .iter()
                        .map(|is_native| {
                            if *is_native != mask.inverted {
                                Felt::ONE
                            } else {
                                Felt::ZERO
                            }
                        })
                        .collect()
                }
                StaticRegister::Cyclic(cyclic) => {
                    let values = cyclic_values(field, &cyclic.source);
                    (0..trace_length).map(|step| values[step % values.len()]).collect()
                }
            };
            columns.push(column);
        }

        Ok(RegisterTraces {
            columns,
            secret_indices: self.secret_indices(),
            descriptor,
        })
    }
}

/// Expands a cyclic source into its period values.
pub fn cyclic_values(field: &PrimeField, source: &CyclicSource) -> Vec<Felt> {
    match source {
        CyclicSource::Literal(values) => values.clone(),
        CyclicSource::Prng(sequence) => hash::prng_sequence(field, sequence.seed, sequence.count),
    }
}

/// Returns the native-cell pattern of an input register as a
/// `(period, offset)` pair: the mask column is `1` (before inversion)
/// exactly at cells congruent to `offset` modulo `period`.
pub fn mask_pattern(stride: usize, shift: i64) -> (usize, usize) {
    // The unshifted column is native exactly at multiples of the stride, so
    // the mask is periodic with the stride as its period. The rotation moves
    // the native offset within one period.
    let offset = shift.rem_euclid(stride as i64) as usize;
    (stride, offset)
}

fn flatten_input(
    register: &InputRegister,
    value: &InputValue,
    earlier_counts: &[usize],
    register_ix: usize,
) -> Result<Vec<Felt>, CompileError> {
    let values = match (register.kind, value) {
        (InputKind::Scalar, InputValue::Flat(values)) => {
            if values.len() != 1 {
                return Err(CompileError::Arity {
                    context: "scalar input register values",
                    expected: 1,
                    actual: values.len(),
                });
            }
            values.clone()
        }
        (InputKind::Vector, InputValue::Flat(values)) => values.clone(),
        (InputKind::Nested { parent }, InputValue::Nested(groups)) => {
            let parent_count = earlier_counts.get(parent).copied().ok_or(
                CompileError::IndexOutOfRange {
                    what: "parent input register",
                    index: parent,
                    limit: register_ix,
                },
            )?;
            if groups.len() != parent_count {
                return Err(CompileError::Arity {
                    context: "nested input groups",
                    expected: parent_count,
                    actual: groups.len(),
                });
            }
            let mut flattened = Vec::new();
            let mut group_len = None;
            for group in groups {
                let values = match group {
                    InputValue::Flat(values) => values,
                    InputValue::Nested(_) => {
                        return Err(CompileError::Structure(
                            "nested input groups must contain flat sequences",
                        ))
                    }
                };
                match group_len {
                    None => group_len = Some(values.len()),
                    Some(expected) if expected != values.len() => {
                        return Err(CompileError::Arity {
                            context: "nested input group length",
                            expected,
                            actual: values.len(),
                        })
                    }
                    Some(_) => {}
                }
                flattened.extend_from_slice(values);
            }
            flattened
        }
        (_, _) => {
            return Err(CompileError::Structure(
                "input value nesting does not match the register declaration",
            ))
        }
    };
    if values.is_empty() || !values.len().is_power_of_two() {
        return Err(CompileError::Structure(
            "input value count must be a non-zero power of two",
        ));
    }
    if register.binary && values.iter().any(|value| value.as_u64() > 1) {
        return Err(CompileError::Structure(
            "binary input register received a value outside {0, 1}",
        ));
    }
    Ok(values)
}

fn materialize_input(
    register: &InputRegister,
    values: &[Felt],
    trace_length: usize,
    field: &PrimeField,
) -> Result<(Vec<Felt>, Vec<bool>), CompileError> {
    for value in values {
        if value.as_u64() >= field.modulus() {
            return Err(CompileError::Structure(
                "input value exceeds the field modulus",
            ));
        }
    }
    if values.len() > trace_length {
        return Err(CompileError::Arity {
            context: "input values per trace cycle",
            expected: trace_length,
            actual: values.len(),
        });
    }
    let stride = trace_length / values.len();

    // Native values sit at stride boundaries; the cells in between repeat
    // the last defined value.
    let mut column = vec![Felt::ZERO; trace_length];
    let mut native = vec![false; trace_length];
    for (slot, value) in values.iter().enumerate() {
        let start = slot * stride;
        for cell in column.iter_mut().skip(start).take(stride) {
            *cell = *value;
        }
        native[start] = true;
    }

    if register.shift != 0 {
        column = rotate(&column, register.shift);
        native = rotate(&native, register.shift);
    }
    Ok((column, native))
}

/// Rotates a column so that shifted cell `i` reads unshifted cell
/// `(i - shift) mod len`.
fn rotate<T: Copy>(cells: &[T], shift: i64) -> Vec<T> {
    let len = cells.len() as i64;
    (0..cells.len())
        .map(|ix| {
            let source = (ix as i64 - shift).rem_euclid(len) as usize;
            cells[source]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> PrimeField {
        PrimeField::new(96769).unwrap()
    }

    fn mimc_bank() -> StaticRegisterSet {
        StaticRegisterSet::new(vec![
            StaticRegister::Input(InputRegister {
                scope: InputScope::Secret,
                binary: false,
                kind: InputKind::Vector,
                steps: Some(16),
                shift: -1,
            }),
            StaticRegister::Mask(MaskRegister {
                source: 0,
                inverted: true,
            }),
            StaticRegister::Cyclic(CyclicRegister {
                source: CyclicSource::Prng(PrngSequence {
                    seed: 0x4d69_4d43,
                    count: 16,
                }),
            }),
        ])
        .unwrap()
    }

    fn felts(values: &[u64]) -> Vec<Felt> {
        values.iter().copied().map(Felt).collect()
    }

    #[test]
    fn declaration_order_is_enforced() {
        let err = StaticRegisterSet::new(vec![
            StaticRegister::Cyclic(CyclicRegister {
                source: CyclicSource::Literal(felts(&[1, 2])),
            }),
            StaticRegister::Input(InputRegister {
                scope: InputScope::Public,
                binary: false,
                kind: InputKind::Vector,
                steps: None,
                shift: 0,
            }),
        ])
        .unwrap_err();
        assert!(matches!(err, CompileError::Structure(_)));
    }

    #[test]
    fn mask_sources_must_reference_inputs() {
        let err = StaticRegisterSet::new(vec![StaticRegister::Mask(MaskRegister {
            source: 0,
            inverted: false,
        })])
        .unwrap_err();
        assert!(matches!(err, CompileError::IndexOutOfRange { .. }));
    }

    #[test]
    fn input_values_spread_at_stride_and_repeat() {
        let bank = StaticRegisterSet::new(vec![StaticRegister::Input(InputRegister {
            scope: InputScope::Public,
            binary: false,
            kind: InputKind::Vector,
            steps: None,
            shift: 0,
        })])
        .unwrap();
        let traces = bank
            .materialize(&field(), &[InputValue::Flat(felts(&[3, 4, 5, 6]))], 16)
            .unwrap();
        let column = &traces.columns[0];
        assert_eq!(&column[0..4], felts(&[3, 3, 3, 3]).as_slice());
        assert_eq!(&column[4..8], felts(&[4, 4, 4, 4]).as_slice());
        assert_eq!(&column[12..16], felts(&[6, 6, 6, 6]).as_slice());
        assert_eq!(traces.descriptor.counts(), &[4]);
    }

    #[test]
    fn shift_rotates_values_and_native_metadata() {
        let traces = mimc_bank()
            .materialize(&field(), &[InputValue::Flat(felts(&[3, 4, 5, 6]))], 16)
            .unwrap();
        let input = &traces.columns[0];
        // shift -1: cell i reads unshifted cell (i + 1) mod 16.
        assert_eq!(input[3], Felt(4));
        assert_eq!(input[7], Felt(5));
        assert_eq!(input[11], Felt(6));
        assert_eq!(input[15], Felt(3));

        // The inverted mask is zero exactly at the rotated native cells.
        let mask = &traces.columns[1];
        for step in 0..16 {
            let expected = if step % 4 == 3 { Felt::ZERO } else { Felt::ONE };
            assert_eq!(mask[step], expected, "mask mismatch at step {step}");
        }
    }

    #[test]
    fn prng_cycle_repeats_its_period() {
        let field = field();
        let traces = mimc_bank()
            .materialize(&field, &[InputValue::Flat(felts(&[3, 4, 5, 6]))], 16)
            .unwrap();
        let expected = crate::hash::prng_sequence(&field, 0x4d69_4d43, 16);
        assert_eq!(traces.columns[2], expected);
    }

    #[test]
    fn secret_columns_are_reported_separately() {
        let traces = mimc_bank()
            .materialize(&field(), &[InputValue::Flat(felts(&[3, 4, 5, 6]))], 16)
            .unwrap();
        assert_eq!(traces.secret_indices, vec![0]);
        assert_eq!(traces.secret_columns().len(), 1);
    }

    #[test]
    fn nested_inputs_follow_the_parent_arity() {
        let bank = StaticRegisterSet::new(vec![
            StaticRegister::Input(InputRegister {
                scope: InputScope::Public,
                binary: false,
                kind: InputKind::Vector,
                steps: None,
                shift: 0,
            }),
            StaticRegister::Input(InputRegister {
                scope: InputScope::Public,
                binary: true,
                kind: InputKind::Nested { parent: 0 },
                steps: None,
                shift: 0,
            }),
        ])
        .unwrap();
        let inputs = vec![
            InputValue::Flat(felts(&[7, 9])),
            InputValue::Nested(vec![
                InputValue::Flat(felts(&[1, 0])),
                InputValue::Flat(felts(&[0, 1])),
            ]),
        ];
        let descriptor = bank.describe_inputs(&inputs).unwrap();
        assert_eq!(descriptor.counts(), &[2, 4]);

        let short = vec![
            InputValue::Flat(felts(&[7, 9])),
            InputValue::Nested(vec![InputValue::Flat(felts(&[1, 0]))]),
        ];
        let err = bank.describe_inputs(&short).unwrap_err();
        assert!(matches!(err, CompileError::Arity { .. }));
    }

    #[test]
    fn binary_registers_reject_non_bits() {
        let bank = StaticRegisterSet::new(vec![StaticRegister::Input(InputRegister {
            scope: InputScope::Public,
            binary: true,
            kind: InputKind::Vector,
            steps: None,
            shift: 0,
        })])
        .unwrap();
        let err = bank
            .describe_inputs(&[InputValue::Flat(felts(&[0, 2]))])
            .unwrap_err();
        assert!(matches!(err, CompileError::Structure(_)));
    }
}
