use cva6_core::common::{INST_BYTES, OpClass, RegId};
use cva6_core::config::{Config, FuDescription, FuPoolConfig};
use cva6_core::core::inst::StaticInst;
use cva6_core::soc::{MemoryConfig, Program, ThreadProgram};

/// Fluent builder for a single thread's instruction stream.
pub struct ProgramBuilder {
    entry: u64,
    insts: Vec<StaticInst>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::at(0)
    }

    pub fn at(entry: u64) -> Self {
        Self {
            entry,
            insts: Vec::new(),
        }
    }

    /// Address the next instruction lands on.
    pub fn pc(&self) -> u64 {
        self.entry + INST_BYTES * self.insts.len() as u64
    }

    pub fn inst(mut self, inst: StaticInst) -> Self {
        self.insts.push(inst);
        self
    }

    /// `n` independent integer instructions.
    pub fn alus(mut self, n: usize) -> Self {
        self.insts
            .extend(std::iter::repeat_n(StaticInst::new(OpClass::IntAlu), n));
        self
    }

    /// An integer instruction writing `dest` from `srcs`.
    pub fn alu(self, dest: u16, srcs: &[u16]) -> Self {
        let srcs: Vec<RegId> = srcs.iter().map(|&r| RegId::int(r)).collect();
        self.inst(
            StaticInst::new(OpClass::IntAlu)
                .with_dests(&[RegId::int(dest)])
                .with_srcs(&srcs),
        )
    }

    pub fn load(self, dest: u16, addr: u64, size: u8) -> Self {
        self.inst(StaticInst::load(RegId::int(dest), addr, size))
    }

    pub fn store(self, addr: u64, size: u8, data: u64) -> Self {
        self.inst(StaticInst::store(addr, size, data))
    }

    pub fn branch(self, taken: bool, target: u64) -> Self {
        self.inst(StaticInst::branch(taken, target))
    }

    /// Fills with integer instructions up to (not including) `pc`.
    pub fn pad_to(mut self, pc: u64) -> Self {
        while self.pc() < pc {
            self = self.alus(1);
        }
        self
    }

    pub fn thread(self) -> ThreadProgram {
        ThreadProgram::new(self.entry, self.insts)
    }

    pub fn build(self) -> Program {
        Program {
            threads: vec![self.thread()],
        }
    }
}

/// Two single-cycle integer units and a single-cycle memory unit.
pub fn unit_latency_pool() -> FuPoolConfig {
    FuPoolConfig::new(vec![
        FuDescription::new("IntA", &[OpClass::IntAlu], 1),
        FuDescription::new("IntB", &[OpClass::IntAlu], 1),
        FuDescription::new("Mem", &[OpClass::MemRead, OpClass::MemWrite], 1),
    ])
}

/// Default configuration with [`unit_latency_pool`].
pub fn unit_latency_config() -> Config {
    Config {
        execute_func_units: unit_latency_pool(),
        ..Config::default()
    }
}

/// A memory whose instruction fetches return in the same cycle.
pub fn instant_fetch_memory() -> MemoryConfig {
    MemoryConfig {
        fetch_latency: 0,
        ..MemoryConfig::default()
    }
}
