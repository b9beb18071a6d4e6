/// Collection of counter registers and associated read logic.
///
/// > RISC-V ISAs provide a set of up to 32×64-bit performance counters and timers that are
/// > accessible via unprivileged XLEN read-only CSR registers 0xC00–0xC1F (with the upper 32
/// > bits accessed via CSR registers 0xC80–0xC9F on RV32). The first three of these (CYCLE,
/// > TIME, and INSTRET) have dedicated functions (cycle count, real-time clock, and
/// > instructions-retired respectively), while the remaining counters, if implemented, provide
/// > programmable event counting.
///
/// The simulated clock ticks once per executed step, so `time` reads the same as `cycle`. This
/// keeps runs reproducible.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Counters {
    cycle: u64,
    instret: u64,
}

/// Selects one 32-bit half of a counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Counter {
    Cycle,
    Time,
    Instret,
    CycleH,
    TimeH,
    InstretH,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_cycle(&mut self) {
        self.cycle = self.cycle.wrapping_add(1);
    }

    /// Count one retired instruction. Instructions that trap do not retire.
    pub fn increment_instret(&mut self) {
        self.instret = self.instret.wrapping_add(1);
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn time(&self) -> u64 {
        self.cycle
    }

    pub fn instret(&self) -> u64 {
        self.instret
    }

    /// Returns the 32-bit view of a counter, as seen through its CSR.
    pub fn read(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Cycle => self.cycle as u32,
            Counter::Time => self.time() as u32,
            Counter::Instret => self.instret as u32,
            Counter::CycleH => (self.cycle >> 32) as u32,
            Counter::TimeH => (self.time() >> 32) as u32,
            Counter::InstretH => (self.instret >> 32) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halves() {
        let mut counters = Counters {
            cycle: u32::MAX as u64,
            instret: 7,
        };
        assert_eq!(u32::MAX, counters.read(Counter::Cycle));
        assert_eq!(0, counters.read(Counter::CycleH));
        counters.increment_cycle();
        assert_eq!(0, counters.read(Counter::Cycle));
        assert_eq!(1, counters.read(Counter::CycleH));
        assert_eq!(1, counters.read(Counter::TimeH));
        counters.increment_instret();
        assert_eq!(8, counters.read(Counter::Instret));
        assert_eq!(0, counters.read(Counter::InstretH));
    }
}
