//! In-memory host implementation.
//!
//! [`StaticHost`] implements [`BinaryView`] over plain data. It backs the
//! test suites and lets callers translate programs that were exported from
//! an analysis engine ahead of time.

use std::collections::{BTreeMap, HashMap};

use crate::{
    BinaryView, BlockRange, CallingConventionInfo, HostFunction, LlilExpr, LlilInstruction,
    Section, SectionSemantics, Segment, TypeDescriptor, Variable,
};

/// A function held by a [`StaticHost`].
#[derive(Debug, Clone)]
pub struct StaticFunction {
    pub name: String,
    pub start: u64,
    pub function_type: TypeDescriptor,
    pub return_type: TypeDescriptor,
    pub calling_convention: CallingConventionInfo,
    pub return_registers: Vec<String>,
    pub parameters: Vec<Variable>,
    pub blocks: Vec<BlockRange>,
    pub lifted: HashMap<u64, LlilExpr>,
    pub instructions: Vec<LlilInstruction>,
    pub variadic: bool,
}

impl StaticFunction {
    /// Creates a `void f(void)` function using System V.
    pub fn new(name: &str, start: u64) -> Self {
        let mut func = Self {
            name: name.to_string(),
            start,
            function_type: TypeDescriptor::void(),
            return_type: TypeDescriptor::void(),
            calling_convention: CallingConventionInfo::sysv(),
            return_registers: vec!["rax".to_string()],
            parameters: Vec::new(),
            blocks: Vec::new(),
            lifted: HashMap::new(),
            instructions: Vec::new(),
            variadic: false,
        };
        func.refresh_type();
        func
    }

    fn refresh_type(&mut self) {
        self.function_type = TypeDescriptor::function(
            self.return_type.clone(),
            self.parameters.iter().map(|p| p.ty.clone()).collect(),
            self.variadic,
        );
    }

    pub fn with_parameter(mut self, var: Variable) -> Self {
        self.parameters.push(var);
        self.refresh_type();
        self
    }

    pub fn with_return_type(mut self, ty: TypeDescriptor) -> Self {
        self.return_type = ty;
        self.refresh_type();
        self
    }

    pub fn with_variadic(mut self) -> Self {
        self.variadic = true;
        self.refresh_type();
        self
    }

    pub fn with_calling_convention(mut self, cc: CallingConventionInfo) -> Self {
        self.calling_convention = cc;
        self
    }

    pub fn with_return_registers(mut self, regs: &[&str]) -> Self {
        self.return_registers = regs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_block(mut self, start: u64, end: u64) -> Self {
        self.blocks.push(BlockRange::new(start, end));
        self
    }

    /// Adds an instruction. Its expression also becomes the lifted IL at
    /// its address.
    pub fn with_instruction(mut self, insn: LlilInstruction) -> Self {
        self.lifted.insert(insn.address, insn.expr.clone());
        self.instructions.push(insn);
        self
    }

    /// Sets the lifted IL at an address without a low-level instruction.
    pub fn with_lifted_il(mut self, addr: u64, expr: LlilExpr) -> Self {
        self.lifted.insert(addr, expr);
        self
    }
}

impl HostFunction for StaticFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> u64 {
        self.start
    }

    fn function_type(&self) -> &TypeDescriptor {
        &self.function_type
    }

    fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    fn calling_convention(&self) -> &CallingConventionInfo {
        &self.calling_convention
    }

    fn return_registers(&self) -> &[String] {
        &self.return_registers
    }

    fn parameter_vars(&self) -> &[Variable] {
        &self.parameters
    }

    fn basic_blocks(&self) -> &[BlockRange] {
        &self.blocks
    }

    fn lifted_il_at(&self, addr: u64) -> Option<&LlilExpr> {
        self.lifted.get(&addr)
    }

    fn low_level_il(&self) -> &[LlilInstruction] {
        &self.instructions
    }
}

/// A binary view over plain data.
#[derive(Debug, Clone)]
pub struct StaticHost {
    architecture: String,
    platform: String,
    stack_pointer: String,
    registers: HashMap<i64, String>,
    functions: BTreeMap<u64, StaticFunction>,
    bytes: BTreeMap<u64, u8>,
    segments: Vec<Segment>,
    sections: Vec<Section>,
    types_by_id: HashMap<String, TypeDescriptor>,
    types_by_name: HashMap<String, TypeDescriptor>,
}

impl StaticHost {
    pub fn new(architecture: &str, platform: &str) -> Self {
        let stack_pointer = match architecture {
            "x86_64" => "rsp",
            "x86" => "esp",
            _ => "sp",
        };
        Self {
            architecture: architecture.to_string(),
            platform: platform.to_string(),
            stack_pointer: stack_pointer.to_string(),
            registers: HashMap::new(),
            functions: BTreeMap::new(),
            bytes: BTreeMap::new(),
            segments: Vec::new(),
            sections: Vec::new(),
            types_by_id: HashMap::new(),
            types_by_name: HashMap::new(),
        }
    }

    /// An x86-64 Linux view.
    pub fn linux_x86_64() -> Self {
        Self::new("x86_64", "linux-x86_64")
    }

    pub fn add_register(&mut self, storage: i64, name: &str) -> &mut Self {
        self.registers.insert(storage, name.to_string());
        self
    }

    pub fn add_function(&mut self, func: StaticFunction) -> &mut Self {
        self.functions.insert(func.start, func);
        self
    }

    /// Maps `data` at `addr`.
    pub fn map_bytes(&mut self, addr: u64, data: &[u8]) -> &mut Self {
        for (i, byte) in data.iter().enumerate() {
            self.bytes.insert(addr + i as u64, *byte);
        }
        self
    }

    pub fn add_segment(
        &mut self,
        start: u64,
        end: u64,
        readable: bool,
        writable: bool,
        executable: bool,
    ) -> &mut Self {
        self.segments.push(Segment {
            start,
            end,
            readable,
            writable,
            executable,
        });
        self
    }

    pub fn add_section(&mut self, name: &str, start: u64, end: u64, semantics: SectionSemantics) -> &mut Self {
        self.sections.push(Section {
            name: name.to_string(),
            start,
            end,
            semantics,
        });
        self
    }

    /// Registers a named type, optionally under a stable id as well.
    pub fn register_type(&mut self, name: &str, id: Option<&str>, ty: TypeDescriptor) -> &mut Self {
        if let Some(id) = id {
            self.types_by_id.insert(id.to_string(), ty.clone());
        }
        self.types_by_name.insert(name.to_string(), ty);
        self
    }
}

impl BinaryView for StaticHost {
    type Function = StaticFunction;

    fn architecture_name(&self) -> &str {
        &self.architecture
    }

    fn platform_name(&self) -> &str {
        &self.platform
    }

    fn stack_pointer(&self) -> &str {
        &self.stack_pointer
    }

    fn register_name(&self, storage: i64) -> Option<&str> {
        self.registers.get(&storage).map(|s| s.as_str())
    }

    fn function_at(&self, addr: u64) -> Option<&StaticFunction> {
        self.functions.get(&addr)
    }

    fn functions_containing(&self, addr: u64) -> Vec<&StaticFunction> {
        self.functions.values().filter(|f| f.contains(addr)).collect()
    }

    fn functions(&self) -> Box<dyn Iterator<Item = &StaticFunction> + '_> {
        Box::new(self.functions.values())
    }

    fn read_u8(&self, addr: u64) -> Option<u8> {
        self.bytes.get(&addr).copied()
    }

    fn segment_at(&self, addr: u64) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(addr))
    }

    fn sections_at(&self, addr: u64) -> Vec<&Section> {
        self.sections.iter().filter(|s| s.contains(addr)).collect()
    }

    fn type_by_id(&self, id: &str) -> Option<&TypeDescriptor> {
        self.types_by_id.get(id)
    }

    fn type_by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types_by_name.get(name)
    }
}
