//! VU0 micro instruction decoding, dispatch and dependency analysis.
//!
//! Instructions are dispatched through two-tier tables built from a single mnemonic list
//! (see [`opcodes`]). The same tables are instantiated once with execution handlers and once
//! with register usage analyzers, so both paths always agree on what a word means.
pub mod decode;
pub mod ins;
pub mod opcodes;
pub mod table;
pub mod usage;

use opcodes::ExecFn;
use table::Tables;
use tracing::{debug, info, warn};
use util::boxed_array;

pub use decode::{Decoded, Pipeline, analyze, mnemonic};
pub use ins::{Dest, Ins};
pub use opcodes::{Execute, Mnemonic};
pub use usage::RegUsage;

pub const MICRO_MEM_LEN: usize = 4 * bytesize::KIB as usize;
pub const DATA_MEM_LEN: usize = 4 * bytesize::KIB as usize;

/// Micro memory length in 32-bit words.
pub const MICRO_WORDS: usize = MICRO_MEM_LEN / 4;
/// Number of instruction pairs in micro memory.
pub const MICRO_PAIRS: u16 = (MICRO_WORDS / 2) as u16;
/// Data memory length in quadwords.
pub const DATA_QWORDS: usize = DATA_MEM_LEN / 16;

/// Cycles executed per slice while finishing a micro program.
pub const RUN_CYCLES: u64 = 512 * 12;
/// Slices given to a micro program to finish before it is forcibly stopped.
pub const FINISH_ATTEMPTS: u32 = 32;

/// Architectural state of VU0 visible to instruction handlers.
pub struct State {
    pub vf: [[u32; 4]; 32],
    pub vi: [u16; 16],
    pub acc: [u32; 4],
    pub q: u32,
    pub p: u32,
    pub i: u32,
    pub r: u32,
    pub status: u32,
    pub mac: u32,
    pub clip: u32,
    pub data: Box<[[u32; 4]; DATA_QWORDS]>,
    /// Pair currently executing.
    pub tpc: u16,
    /// Branch target requested by the current instruction. Taken after the delay slot.
    pub branch: Option<u16>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            vf: [[0; 4]; 32],
            vi: [0; 16],
            acc: [0; 4],
            q: 0,
            p: 0,
            i: 0,
            r: 0,
            status: 0,
            mac: 0,
            clip: 0,
            data: boxed_array([0; 4]),
            tpc: 0,
            branch: None,
        }
    }
}

/// An [`Execute`] implementation that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopExecutor;

impl Execute for NopExecutor {
    fn fallback(&mut self, _: &mut State, _: Mnemonic, _: Ins) {}
}

/// VU0 in micro mode: fetches instruction pairs and dispatches them to `E`.
pub struct Vu0<E: Execute> {
    pub executor: E,
    pub state: State,
    pub micro: Box<[u32; MICRO_WORDS]>,
    tables: Box<Tables<ExecFn<E>>>,
    running: bool,
    ending: bool,
    delayed_branch: Option<u16>,
    cycle: u64,
}

impl<E: Execute> Vu0<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            state: State::default(),
            micro: boxed_array(0),
            tables: Tables::exec(),
            running: false,
            ending: false,
            delayed_branch: None,
            cycle: 0,
        }
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Total cycles executed.
    #[inline(always)]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Starts the micro program at pair `addr`.
    pub fn start(&mut self, addr: u16) {
        self.state.tpc = addr % MICRO_PAIRS;
        self.ending = false;
        self.delayed_branch = None;
        self.running = true;

        info!(tpc = self.state.tpc, "starting micro program");
    }

    /// Continues the micro program at the current TPC.
    pub fn resume(&mut self) {
        self.ending = false;
        self.running = true;
        debug!(tpc = self.state.tpc, "continuing micro program");
    }

    /// Executes a single instruction pair.
    pub fn step(&mut self) {
        let index = self.state.tpc as usize * 2;
        let lower = Ins::new(self.micro[index]);
        let upper = Ins::new(self.micro[index + 1]);
        let branch = self.delayed_branch.take();
        let end = self.ending;

        let upper_exec = self.tables.decode(upper, Pipeline::Upper).handler;
        upper_exec(&mut self.executor, &mut self.state, upper);

        if upper.immediate() {
            self.state.i = lower.code();
        } else {
            let lower_exec = self.tables.decode(lower, Pipeline::Lower).handler;
            lower_exec(&mut self.executor, &mut self.state, lower);
        }

        self.delayed_branch = self.state.branch.take();
        self.state.tpc = match branch {
            Some(target) => target % MICRO_PAIRS,
            None => (self.state.tpc + 1) % MICRO_PAIRS,
        };
        self.cycle += 1;

        if end {
            self.running = false;
            self.ending = false;
            debug!(tpc = self.state.tpc, "micro program ended");
        } else if upper.end() {
            self.ending = true;
        }
    }

    /// Executes for at most `cycles` cycles or until the program ends. Returns the cycles taken.
    pub fn execute(&mut self, cycles: u64) -> u64 {
        let start = self.cycle;
        while self.running && self.cycle - start < cycles {
            self.step();
        }

        self.cycle - start
    }

    /// Runs the current micro program to its end. Returns the cycles taken.
    pub fn finish(&mut self) -> u64 {
        let start = self.cycle;
        for _ in 0..FINISH_ATTEMPTS {
            if !self.running {
                break;
            }

            self.execute(RUN_CYCLES);
        }

        if self.running {
            warn!(
                tpc = self.state.tpc,
                "micro program did not finish, forcing it to stop"
            );
            self.running = false;
        }

        self.cycle - start
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const NOP: u32 = 0x0000_02FF;
    const NOP_END: u32 = 0x4000_02FF;
    const NOP_IMM: u32 = 0x8000_02FF;
    const MOVE: u32 = 0x8000_033C;

    #[derive(Default)]
    struct Recorder {
        ops: Vec<(u16, Mnemonic)>,
    }

    impl Execute for Recorder {
        fn fallback(&mut self, state: &mut State, op: Mnemonic, _: Ins) {
            self.ops.push((state.tpc, op));
        }

        fn b(&mut self, state: &mut State, ins: Ins) {
            self.fallback(state, Mnemonic::B, ins);
            state.branch = Some(state.tpc.wrapping_add_signed(1 + ins.imm11() as i16));
        }
    }

    fn load(vu: &mut Vu0<Recorder>, program: &[(u32, u32)]) {
        for (i, &(upper, lower)) in program.iter().enumerate() {
            vu.micro[i * 2] = lower;
            vu.micro[i * 2 + 1] = upper;
        }
    }

    #[test]
    fn end_bit_runs_delay_slot() {
        let mut vu = Vu0::new(Recorder::default());
        load(&mut vu, &[(NOP, MOVE), (NOP_END, MOVE), (NOP, MOVE), (NOP, MOVE)]);

        vu.start(0);
        let cycles = vu.finish();

        assert_eq!(cycles, 3);
        assert_eq!(vu.state.tpc, 3);
        assert!(!vu.is_running());
        assert_eq!(vu.executor.ops.len(), 6);
        assert!(vu.executor.ops.iter().all(|&(tpc, _)| tpc < 3));
    }

    #[test]
    fn immediate_bit_loads_i() {
        let mut vu = Vu0::new(Recorder::default());
        load(&mut vu, &[(NOP_IMM | 0x4000_0000, 0x3F80_0000), (NOP, MOVE)]);

        vu.start(0);
        vu.finish();

        assert_eq!(vu.state.i, 0x3F80_0000);
        assert_eq!(
            vu.executor.ops,
            vec![(0, Mnemonic::Nop), (1, Mnemonic::Nop), (1, Mnemonic::Move)]
        );
    }

    #[test]
    fn branch_after_delay_slot() {
        let mut vu = Vu0::new(Recorder::default());
        load(
            &mut vu,
            &[
                (NOP, 0x4000_0002),
                (NOP, MOVE),
                (NOP, MOVE),
                (NOP_END, MOVE),
                (NOP, MOVE),
            ],
        );

        vu.start(0);
        vu.finish();

        let visited: Vec<u16> = vu
            .executor
            .ops
            .iter()
            .filter(|(_, op)| !op.is_upper())
            .map(|&(tpc, _)| tpc)
            .collect();

        assert_eq!(visited, vec![0, 1, 3, 4]);
    }

    #[test]
    fn endless_program_is_stopped() {
        let mut vu = Vu0::new(NopExecutor);
        vu.micro[0] = 0x4000_07FF;
        vu.micro[1] = NOP;
        vu.micro[2] = MOVE;
        vu.micro[3] = NOP;

        vu.start(0);
        let cycles = vu.finish();

        assert!(!vu.is_running());
        assert_eq!(cycles, FINISH_ATTEMPTS as u64 * RUN_CYCLES);
    }
}
