//! Code builder - stack-machine instruction construction and deferred patching
//!
//! One builder per code entry, never shared: compilation of independent
//! entries is embarrassingly parallel and no entry's in-progress buffer is
//! observable from another. Instructions live in an append-only buffer and
//! are addressed through opaque [`InstrRef`] handles; operands that cannot be
//! known until the full scope tree and call graph exist (variable and
//! function references, string constants, branch-offset deltas) are created
//! pending and patched exactly once.
//!
//! The instruction vocabulary here is *consumed* from the target virtual
//! machine, not designed: opcodes, scalar widths, and instance qualifiers
//! mirror the engine's pre-defined instruction set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::compiler::builtins::BuiltinTable;
use crate::compiler::scope::{FunctionEntry, ScopeId};
use crate::error::{Error, Result};

/// Opaque handle to one instruction in a builder's append-only buffer
///
/// Valid only for the builder that produced it; handles are never aliased
/// across code entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstrRef(usize);

/// Scalar widths and reference kinds of the target stack machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 64-bit float
    Double,
    /// 32-bit float
    Float,
    /// 32-bit integer
    Int32,
    /// 64-bit integer
    Int64,
    /// Boolean
    Boolean,
    /// Dynamically typed variable slot
    Variable,
    /// String reference
    String,
    /// 16-bit integer embedded in the instruction word
    Int16,
}

/// Comparison codes carried by compare and comparison-coded branch forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Equal
    Eq,
    /// Not equal
    Neq,
    /// Greater than or equal
    Gte,
    /// Greater than
    Gt,
}

/// Instance qualifiers for variable access
///
/// The qualifier stored on a variable reference and the one stored on the
/// instruction differ for dot-qualified access, where the instruction
/// evaluates its target from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    /// The current instance
    OwnSelf,
    /// The other instance in a collision/with pair
    Other,
    /// Every active instance
    All,
    /// No instance
    NoOne,
    /// Global scope
    Global,
    /// Engine-defined builtin scope
    Builtin,
    /// Function-local slot
    Local,
    /// Target evaluated from the top of the stack
    StackTop,
    /// Argument slot
    Argument,
    /// Per-definition static slot
    Static,
}

/// Target stack-machine opcodes (pre-defined by the engine VM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Convert the top of stack between data types
    Conv,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Remainder
    Rem,
    /// Modulo
    Mod,
    /// Add
    Add,
    /// Subtract
    Sub,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Negate
    Neg,
    /// Bitwise/logical not
    Not,
    /// Shift left
    Shl,
    /// Shift right
    Shr,
    /// Compare with a comparison code
    Cmp,
    /// Pop into a variable reference
    Pop,
    /// Pop and discard
    Popz,
    /// Duplicate stack data
    Dup,
    /// Push a value or reference
    Push,
    /// Unconditional branch
    Branch,
    /// Branch if true
    BranchTrue,
    /// Branch if false
    BranchFalse,
    /// Enter a with-block instance environment
    PushEnv,
    /// Leave a with-block instance environment
    PopEnv,
    /// Call a fixed-arity function
    Call,
    /// Call the function value on the stack
    CallVariable,
    /// Return with a value
    Ret,
    /// Exit the code entry early
    Exit,
    /// Extended operation selected by a signal value
    Break,
}

/// A deferred variable reference bound by [`CodeBuilder::patch_variable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariablePatch {
    /// Declared variable name
    pub name: String,
    /// Instance qualifier of the variable itself
    pub variable_instance: InstanceKind,
    /// Instance qualifier stored on the instruction; differs from
    /// `variable_instance` for dot-qualified access
    pub instruction_instance: InstanceKind,
    /// Builtin-vs-user classification
    pub is_builtin: bool,
    /// Preserve the instance type through chained dot access
    pub keep_instance_type: bool,
}

/// A deferred function reference bound by [`CodeBuilder::patch_function`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRef {
    /// Reference by declaring scope and name, with an optionally known
    /// builtin the name maps onto
    Named {
        /// Scope the reference was made from
        scope: ScopeId,
        /// Function name
        name: String,
        /// Known builtin target, if any
        builtin: Option<String>,
    },
    /// Reference directly by an already resolved entry
    Entry(FunctionEntry),
}

/// Operand payload of one instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Awaiting exactly one patch
    Pending,
    /// 16-bit immediate embedded in the instruction word
    Int16(i16),
    /// 32-bit immediate
    Int32(i32),
    /// 64-bit immediate
    Int64(i64),
    /// Double immediate
    Double(f64),
    /// Duplication size, plus the second size of the two-operand form
    DupSizes(u8, Option<u8>),
    /// Alternate swap size of the pop-with-swap form
    SwapSize(u8),
    /// Magic marker for the early with-loop exit
    PopenvExitMagic,
    /// Resolved variable reference
    Variable(VariablePatch),
    /// Resolved function reference
    Function(FunctionRef),
    /// Resolved string constant
    StringConst(String),
}

/// One emitted instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte address within this code entry
    pub address: u32,
    /// Opcode
    pub opcode: Opcode,
    /// Primary data type, if the form carries one
    pub type1: Option<DataType>,
    /// Secondary data type for two-type forms
    pub type2: Option<DataType>,
    /// Comparison code for compare and comparison-coded branch forms
    pub comparison: Option<ComparisonKind>,
    /// Instance qualifier stored on the instruction
    pub instance: Option<InstanceKind>,
    /// Operand payload
    pub operand: Operand,
    /// Argument count for call forms
    pub argument_count: Option<usize>,
}

impl Instruction {
    /// Encoded size in bytes: one 4-byte word plus the operand's extension
    ///
    /// Branch offsets, 16-bit immediates, sizes, and comparison codes are
    /// embedded in the instruction word; references and wider immediates
    /// extend it.
    pub fn size(&self) -> u32 {
        let extra = match &self.operand {
            Operand::Int32(_) | Operand::StringConst(_) => 4,
            Operand::Int64(_) | Operand::Double(_) => 8,
            Operand::Variable(_) | Operand::Function(_) | Operand::Pending => 4,
            _ => 0,
        };
        4 + extra
    }
}

/// Per-code-entry instruction builder
///
/// Owns the append-only instruction buffer and the name sets needed to
/// classify bare identifiers before resolution completes. Shares only the
/// read-only builtin table with other entries.
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    next_address: u32,
    builtins: Arc<BuiltinTable>,
    /// Global script names known before compilation of this entry
    global_functions: HashSet<String>,
    /// Names that a function patch may still create during patching
    creatable_functions: HashSet<String>,
}

impl CodeBuilder {
    /// Creates a builder for one code entry over a shared builtin table
    pub fn new(builtins: Arc<BuiltinTable>) -> Self {
        CodeBuilder {
            instructions: Vec::new(),
            next_address: 0,
            builtins,
            global_functions: HashSet::new(),
            creatable_functions: HashSet::new(),
        }
    }

    /// Byte address the next emitted instruction will receive
    pub fn current_address(&self) -> u32 {
        self.next_address
    }

    /// Number of instructions emitted so far
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if nothing has been emitted yet
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Read access to an emitted instruction
    pub fn instruction(&self, r: InstrRef) -> &Instruction {
        &self.instructions[r.0]
    }

    /// Registers a global script name known ahead of compilation
    pub fn register_global_function(&mut self, name: impl Into<String>) {
        self.global_functions.insert(name.into());
    }

    /// Whether a bare name could resolve to *some* global function
    ///
    /// True for engine builtins, known global scripts, and names a pending
    /// function patch may still create. Used to disambiguate identifier kinds
    /// before full resolution completes.
    pub fn is_global_function_name(&self, name: &str) -> bool {
        self.builtins.is_global_function(name)
            || self.global_functions.contains(name)
            || self.creatable_functions.contains(name)
    }

    fn emit(&mut self, instruction: Instruction) -> InstrRef {
        let mut instruction = instruction;
        instruction.address = self.next_address;
        self.next_address += instruction.size();
        let r = InstrRef(self.instructions.len());
        self.instructions.push(instruction);
        r
    }

    fn bare(opcode: Opcode) -> Instruction {
        Instruction {
            address: 0,
            opcode,
            type1: None,
            type2: None,
            comparison: None,
            instance: None,
            operand: Operand::None,
            argument_count: None,
        }
    }

    // =========================================================================
    // IMMEDIATE PUSHES (one form per scalar width)
    // =========================================================================

    /// Pushes a 16-bit immediate
    pub fn push_int16(&mut self, value: i16) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::Int16);
        i.operand = Operand::Int16(value);
        self.emit(i)
    }

    /// Pushes a 32-bit immediate
    pub fn push_int32(&mut self, value: i32) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::Int32);
        i.operand = Operand::Int32(value);
        self.emit(i)
    }

    /// Pushes a 64-bit immediate
    pub fn push_int64(&mut self, value: i64) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::Int64);
        i.operand = Operand::Int64(value);
        self.emit(i)
    }

    /// Pushes a double immediate
    pub fn push_double(&mut self, value: f64) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::Double);
        i.operand = Operand::Double(value);
        self.emit(i)
    }

    /// Pushes a string constant to be patched later
    pub fn push_string_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::String);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Pushes a variable reference to be patched later
    pub fn push_variable_unpatched(&mut self, instance: InstanceKind) -> InstrRef {
        let mut i = Self::bare(Opcode::Push);
        i.type1 = Some(DataType::Variable);
        i.instance = Some(instance);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    // =========================================================================
    // ARITHMETIC, CONVERSION, COMPARISON
    // =========================================================================

    /// Emits a zero-operand instruction with no types (exit, swap-free forms)
    pub fn simple(&mut self, opcode: Opcode) -> InstrRef {
        self.emit(Self::bare(opcode))
    }

    /// Emits a single-type instruction (neg, not, ret, popz)
    pub fn typed(&mut self, opcode: Opcode, ty: DataType) -> InstrRef {
        let mut i = Self::bare(opcode);
        i.type1 = Some(ty);
        self.emit(i)
    }

    /// Emits a two-type instruction (conv, add, mul, ...)
    pub fn typed2(&mut self, opcode: Opcode, type1: DataType, type2: DataType) -> InstrRef {
        let mut i = Self::bare(opcode);
        i.type1 = Some(type1);
        i.type2 = Some(type2);
        self.emit(i)
    }

    /// Emits a compare instruction carrying a comparison code
    pub fn compare(&mut self, kind: ComparisonKind, type1: DataType, type2: DataType) -> InstrRef {
        let mut i = Self::bare(Opcode::Cmp);
        i.type1 = Some(type1);
        i.type2 = Some(type2);
        i.comparison = Some(kind);
        self.emit(i)
    }

    // =========================================================================
    // STACK SHUFFLING
    // =========================================================================

    /// Duplicates `size` stack slots
    pub fn dup(&mut self, ty: DataType, size: u8) -> InstrRef {
        let mut i = Self::bare(Opcode::Dup);
        i.type1 = Some(ty);
        i.operand = Operand::DupSizes(size, None);
        self.emit(i)
    }

    /// Two-size duplicate form used for dot-qualified store rewrites
    pub fn dup2(&mut self, ty: DataType, size: u8, second_size: u8) -> InstrRef {
        let mut i = Self::bare(Opcode::Dup);
        i.type1 = Some(ty);
        i.operand = Operand::DupSizes(size, Some(second_size));
        self.emit(i)
    }

    /// Pop form carrying an alternate swap size instead of a reference
    pub fn pop_swap(&mut self, size: u8) -> InstrRef {
        let mut i = Self::bare(Opcode::Pop);
        i.operand = Operand::SwapSize(size);
        self.emit(i)
    }

    /// Pops and discards a value of the given type
    pub fn pop_discard(&mut self, ty: DataType) -> InstrRef {
        let mut i = Self::bare(Opcode::Popz);
        i.type1 = Some(ty);
        self.emit(i)
    }

    /// Pops into a variable reference to be patched later
    pub fn pop_variable_unpatched(
        &mut self,
        type1: DataType,
        type2: DataType,
        instance: InstanceKind,
    ) -> InstrRef {
        let mut i = Self::bare(Opcode::Pop);
        i.type1 = Some(type1);
        i.type2 = Some(type2);
        i.instance = Some(instance);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    // =========================================================================
    // BRANCHES AND WITH-ENVIRONMENTS
    // =========================================================================

    /// Emits an unconditional branch with a pending offset
    pub fn branch_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::Branch);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Emits a branch-if-true with a pending offset
    pub fn branch_true_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::BranchTrue);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Emits a branch-if-false with a pending offset
    pub fn branch_false_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::BranchFalse);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Comparison-coded conditional branch with a pending offset
    pub fn branch_comparison_unpatched(&mut self, kind: ComparisonKind) -> InstrRef {
        let mut i = Self::bare(Opcode::BranchTrue);
        i.comparison = Some(kind);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Enters a with-block environment; offset patched once the block ends
    pub fn push_env_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::PushEnv);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Leaves a with-block environment; offset patched to the loop head
    pub fn pop_env_unpatched(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::PopEnv);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Early with-loop exit marker (`popenv` with the magic exit operand)
    pub fn pop_env_exit(&mut self) -> InstrRef {
        let mut i = Self::bare(Opcode::PopEnv);
        i.operand = Operand::PopenvExitMagic;
        self.emit(i)
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Fixed-arity call whose target is patched later
    pub fn call_unpatched(&mut self, argument_count: usize) -> InstrRef {
        let mut i = Self::bare(Opcode::Call);
        i.type1 = Some(DataType::Int32);
        i.argument_count = Some(argument_count);
        i.operand = Operand::Pending;
        self.emit(i)
    }

    /// Fixed-arity call to an already resolved entry
    pub fn call(&mut self, entry: FunctionEntry, argument_count: usize) -> InstrRef {
        let mut i = Self::bare(Opcode::Call);
        i.type1 = Some(DataType::Int32);
        i.argument_count = Some(argument_count);
        i.operand = Operand::Function(FunctionRef::Entry(entry));
        self.emit(i)
    }

    /// Indirect call of the function value on the stack
    pub fn call_variable(&mut self, argument_count: usize) -> InstrRef {
        let mut i = Self::bare(Opcode::CallVariable);
        i.type1 = Some(DataType::Variable);
        i.argument_count = Some(argument_count);
        self.emit(i)
    }

    /// Returns the top of stack from the code entry
    pub fn ret(&mut self, ty: DataType) -> InstrRef {
        self.typed(Opcode::Ret, ty)
    }

    /// Exits the code entry without a value
    pub fn exit(&mut self) -> InstrRef {
        self.simple(Opcode::Exit)
    }

    /// Extended operation selected by a 16-bit signal embedded in the word
    pub fn break_signal(&mut self, signal: i16) -> InstrRef {
        let mut i = Self::bare(Opcode::Break);
        i.type1 = Some(DataType::Int16);
        i.operand = Operand::Int16(signal);
        self.emit(i)
    }

    // =========================================================================
    // PATCHING
    // =========================================================================

    fn pending_slot(&mut self, r: InstrRef) -> Result<&mut Instruction> {
        let instruction = &mut self.instructions[r.0];
        if instruction.operand != Operand::Pending {
            return Err(Error::compiler(format!(
                "instruction at address {} was already patched",
                instruction.address
            )));
        }
        Ok(instruction)
    }

    /// Binds a pending variable reference
    pub fn patch_variable(&mut self, r: InstrRef, patch: VariablePatch) -> Result<()> {
        let instruction = self.pending_slot(r)?;
        instruction.instance = Some(patch.instruction_instance);
        instruction.operand = Operand::Variable(patch);
        Ok(())
    }

    /// Binds a pending function reference
    ///
    /// A by-name reference also marks the name as creatable during patching,
    /// which feeds [`CodeBuilder::is_global_function_name`].
    pub fn patch_function(&mut self, r: InstrRef, function: FunctionRef) -> Result<()> {
        if let FunctionRef::Named { name, .. } = &function {
            self.creatable_functions.insert(name.clone());
        }
        let instruction = self.pending_slot(r)?;
        instruction.operand = Operand::Function(function);
        Ok(())
    }

    /// Binds a pending string constant
    pub fn patch_string(&mut self, r: InstrRef, value: impl Into<String>) -> Result<()> {
        let instruction = self.pending_slot(r)?;
        instruction.operand = Operand::StringConst(value.into());
        Ok(())
    }

    /// Binds a pending plain integer; reused for branch-offset deltas
    pub fn patch_int(&mut self, r: InstrRef, value: i32) -> Result<()> {
        let instruction = self.pending_slot(r)?;
        instruction.operand = Operand::Int32(value);
        Ok(())
    }

    /// Patches a pending branch to land on `target_address`
    pub fn patch_branch_to(&mut self, r: InstrRef, target_address: u32) -> Result<()> {
        let from = self.instructions[r.0].address;
        self.patch_int(r, target_address as i32 - from as i32)
    }

    // =========================================================================
    // ID GENERATORS
    // =========================================================================

    /// Unique non-negative id for a compiler-synthesized try/catch local
    ///
    /// The internal index is already unique per entry, so it is echoed.
    pub fn generate_try_variable_id(&self, internal_index: u32) -> u32 {
        internal_index
    }

    /// Array copy-on-write ownership id, wrapped to the unsigned 31-bit range
    ///
    /// The mathematical id folds the variable name (when present) into the
    /// owning function id, offset by one for dot-qualified access; the result
    /// is reduced mod 2^31 and is therefore always non-negative.
    pub fn generate_array_owner_id(
        &self,
        variable_name: Option<&str>,
        function_id: i64,
        is_dot: bool,
    ) -> i32 {
        let mut id = function_id;
        if let Some(name) = variable_name {
            for b in name.bytes() {
                id = id.wrapping_mul(31).wrapping_add(i64::from(b));
            }
        }
        if is_dot {
            id = id.wrapping_add(1);
        }
        (id & 0x7fff_ffff) as i32
    }

    /// Consumes the builder, verifying every pending operand was patched
    ///
    /// The returned sequence is ready for serialization by an external
    /// container writer.
    pub fn finish(self) -> Result<Vec<Instruction>> {
        for instruction in &self.instructions {
            if instruction.operand == Operand::Pending {
                return Err(Error::compiler(format!(
                    "unpatched {:?} instruction at address {}",
                    instruction.opcode, instruction.address
                )));
            }
        }
        Ok(self.instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::builtins::BuiltinTable;

    fn builder() -> CodeBuilder {
        CodeBuilder::new(Arc::new(BuiltinTable::with_defaults()))
    }

    #[test]
    fn test_addresses_advance_by_size() {
        let mut b = builder();
        b.push_int16(3); // 4 bytes
        b.push_int32(70000); // 8 bytes
        b.push_double(1.5); // 12 bytes
        assert_eq!(b.current_address(), 24);

        let r = b.push_int64(1);
        assert_eq!(b.instruction(r).address, 24);
    }

    #[test]
    fn test_branch_patch_binds_offset_delta() {
        let mut b = builder();
        b.push_int16(0);
        let jump = b.branch_false_unpatched();
        b.push_int16(1);
        let target = b.current_address();
        b.exit();

        b.patch_branch_to(jump, target).unwrap();
        assert_eq!(
            b.instruction(jump).operand,
            Operand::Int32(target as i32 - b.instruction(jump).address as i32)
        );
    }

    #[test]
    fn test_patch_exactly_once() {
        let mut b = builder();
        let r = b.branch_unpatched();
        b.patch_int(r, 8).unwrap();
        assert!(b.patch_int(r, 12).is_err());
    }

    #[test]
    fn test_patch_rejects_already_concrete_operand() {
        let mut b = builder();
        let r = b.push_int32(5);
        assert!(b.patch_int(r, 9).is_err());
    }

    #[test]
    fn test_variable_patch_sets_instruction_instance() {
        let mut b = builder();
        let r = b.push_variable_unpatched(InstanceKind::OwnSelf);
        b.patch_variable(
            r,
            VariablePatch {
                name: "hp".to_string(),
                variable_instance: InstanceKind::OwnSelf,
                instruction_instance: InstanceKind::StackTop,
                is_builtin: false,
                keep_instance_type: true,
            },
        )
        .unwrap();

        let i = b.instruction(r);
        assert_eq!(i.instance, Some(InstanceKind::StackTop));
        match &i.operand {
            Operand::Variable(v) => {
                assert_eq!(v.variable_instance, InstanceKind::OwnSelf);
                assert!(v.keep_instance_type);
            }
            other => panic!("unexpected operand {:?}", other),
        }
    }

    #[test]
    fn test_finish_rejects_pending_operands() {
        let mut b = builder();
        b.branch_unpatched();
        assert!(b.finish().is_err());

        let mut b = builder();
        let r = b.branch_unpatched();
        b.patch_int(r, 4).unwrap();
        assert_eq!(b.finish().unwrap().len(), 1);
    }

    #[test]
    fn test_try_variable_id_echoes_index() {
        let b = builder();
        assert_eq!(b.generate_try_variable_id(0), 0);
        assert_eq!(b.generate_try_variable_id(41), 41);
    }

    #[test]
    fn test_array_owner_id_wraps_at_31_bits() {
        let b = builder();
        assert_eq!(b.generate_array_owner_id(None, 5, false), 5);
        assert_eq!(b.generate_array_owner_id(None, 5, true), 6);
        assert_eq!(b.generate_array_owner_id(None, (1i64 << 31) + 5, false), 5);
        assert_eq!(b.generate_array_owner_id(None, (1i64 << 31) - 1, true), 0);
        assert!(b.generate_array_owner_id(Some("grid"), -17, true) >= 0);
    }

    #[test]
    fn test_is_global_function_name_sources() {
        let mut b = builder();
        assert!(b.is_global_function_name("array_length")); // builtin default
        assert!(!b.is_global_function_name("scr_attack"));

        b.register_global_function("scr_attack");
        assert!(b.is_global_function_name("scr_attack"));

        // A by-name patch makes the name creatable during patching.
        let r = b.call_unpatched(0);
        b.patch_function(
            r,
            FunctionRef::Named {
                scope: crate::compiler::scope::ScopeArena::new().root(),
                name: "scr_late".to_string(),
                builtin: None,
            },
        )
        .unwrap();
        assert!(b.is_global_function_name("scr_late"));
    }

    #[test]
    fn test_break_signal_embeds_in_the_word() {
        let mut b = builder();
        let r = b.break_signal(-5);
        let i = b.instruction(r);
        assert_eq!(i.opcode, Opcode::Break);
        assert_eq!(i.operand, Operand::Int16(-5));
        assert_eq!(i.size(), 4);
    }

    #[test]
    fn test_early_with_exit_marker() {
        let mut b = builder();
        let r = b.pop_env_exit();
        assert_eq!(b.instruction(r).operand, Operand::PopenvExitMagic);
        // Marker carries no pending slot, so finish accepts it as-is.
        assert!(b.finish().is_ok());
    }
}
