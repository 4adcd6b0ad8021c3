use std::collections::{HashMap, VecDeque};

use crate::{PortIo, Stall};

/// Port I/O double that replays queued register values and records every write.
///
/// A port with an empty queue returns its sticky value, or 0xFF (floating bus) when none is set.
#[derive(Debug, Default)]
pub(crate) struct ScriptedIo {
    queued: HashMap<u16, VecDeque<u8>>,
    sticky: HashMap<u16, u8>,
    words: VecDeque<u16>,
    read_counts: HashMap<u16, usize>,
    pub writes: Vec<(u16, u8)>,
    pub word_writes: Vec<(u16, u16)>,
}

impl ScriptedIo {
    pub fn set(&mut self, port: u16, value: u8) {
        self.sticky.insert(port, value);
    }

    pub fn queue(&mut self, port: u16, values: &[u8]) {
        self.queued.entry(port).or_default().extend(values);
    }

    pub fn queue_words(&mut self, words: &[u16]) {
        self.words.extend(words);
    }

    pub fn reads_of(&self, port: u16) -> usize {
        self.read_counts.get(&port).copied().unwrap_or(0)
    }

    pub fn writes_to(&self, port: u16) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(p, _)| *p == port)
            .map(|&(_, v)| v)
            .collect()
    }
}

impl PortIo for ScriptedIo {
    fn read_u8(&mut self, port: u16) -> u8 {
        *self.read_counts.entry(port).or_default() += 1;
        if let Some(value) = self.queued.get_mut(&port).and_then(VecDeque::pop_front) {
            return value;
        }
        self.sticky.get(&port).copied().unwrap_or(0xFF)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.writes.push((port, value));
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        *self.read_counts.entry(port).or_default() += 1;
        self.words.pop_front().unwrap_or(0xFFFF)
    }

    fn write_u16(&mut self, port: u16, value: u16) {
        self.word_writes.push((port, value));
    }
}

#[derive(Debug, Default)]
pub(crate) struct CountingStall {
    pub calls: usize,
    pub total_us: u64,
}

impl Stall for CountingStall {
    fn stall(&mut self, us: u64) {
        self.calls += 1;
        self.total_us += us;
    }
}
