//! Shared fixtures for the boot flow tests: a boot image builder, a board
//! that records every register write and a boot device that records every
//! payload copy, both into one ordered event log.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use fsbl::cpu::{CpuId, DeviceId, ExecState};
use fsbl::image::atf::AtfHandoffParams;
use fsbl::image::checksum::seal;
use fsbl::image::partition::{PartitionAttributes, PartitionHeader};
use fsbl::image::{BootDevice, ImageSource, IoError, SliceImage};
use fsbl::platform::Platform;
use fsbl::platform::sim::SimPlatform;

/// Byte offset of the image header table in built images
pub const IHT_OFFSET: u32 = 0x100;
/// Byte offset of the first partition header
pub const FIRST_HEADER: u32 = 0x200;
/// Byte offset of the first payload
pub const FIRST_PAYLOAD: u32 = 0x1000;

/// Something the boot flow did, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Register write
    Write(u32, u32),
    /// Payload copy from the boot device
    Load { src: u32, dest: u64, len: u32 },
    /// Boot device shut down
    DeviceReleased,
}

/// Ordered log shared by board and device
pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// One partition of a built image
#[derive(Debug, Clone, Copy)]
pub struct Part {
    pub cpu: CpuId,
    pub device: DeviceId,
    pub load: u64,
    pub exec: u64,
    pub words: u32,
    pub exec_state: ExecState,
    pub extra_attributes: u32,
}

impl Part {
    /// PS partition for `cpu`, loaded and started at `address`
    pub fn ps(cpu: CpuId, address: u64) -> Self {
        Self {
            cpu,
            device: DeviceId::Ps,
            load: address,
            exec: address,
            words: 0x40,
            exec_state: ExecState::Aarch64,
            extra_attributes: 0,
        }
    }

    /// The boot loader's own partition
    pub fn fsbl() -> Self {
        Self::ps(CpuId::None, 0xFFFC_0000)
    }
}

/// Boot image builder
#[derive(Debug, Default)]
pub struct ImageBuilder {
    parts: Vec<Part>,
    corrupt_iht: bool,
}

impl ImageBuilder {
    /// Image holding only the boot loader partition
    pub fn new() -> Self {
        Self {
            parts: vec![Part::fsbl()],
            corrupt_iht: false,
        }
    }

    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Break the image header table checksum
    pub fn corrupt_iht(mut self) -> Self {
        self.corrupt_iht = true;
        self
    }

    /// Partition headers as they will appear in the image
    pub fn headers(&self) -> Vec<PartitionHeader> {
        let mut data = FIRST_PAYLOAD;
        let count = self.parts.len() as u32;
        self.parts
            .iter()
            .enumerate()
            .map(|(n, part)| {
                let n = n as u32;
                let next = if n + 1 < count {
                    (FIRST_HEADER + 0x40 * (n + 1)) / 4
                } else {
                    0
                };
                let mut words = PartitionHeader {
                    encrypted_len: part.words,
                    unencrypted_len: part.words,
                    total_len: part.words,
                    next_offset: next,
                    exec_address: part.exec,
                    load_address: part.load,
                    data_offset: data / 4,
                    attributes: PartitionAttributes(
                        part.cpu.attr_value()
                            | part.device.attr_value()
                            | part.exec_state.attr_value()
                            | part.extra_attributes,
                    ),
                    ..PartitionHeader::default()
                }
                .to_words();
                seal(&mut words);
                data += part.words * 4;
                PartitionHeader::from_words(&words)
            })
            .collect()
    }

    pub fn build(&self) -> Vec<u8> {
        let headers = self.headers();
        let payload_len: u32 = self.parts.iter().map(|part| part.words * 4).sum();
        let mut image = vec![0u8; (FIRST_PAYLOAD + payload_len) as usize];

        put_words(&mut image, 0x98, &[IHT_OFFSET]);

        let mut iht = [0u32; 16];
        iht[0] = 0x0102_0000;
        iht[1] = self.parts.len() as u32;
        iht[2] = FIRST_HEADER / 4;
        seal(&mut iht);
        if self.corrupt_iht {
            iht[3] ^= 1;
        }
        put_words(&mut image, IHT_OFFSET as usize, &iht);

        for (n, header) in headers.iter().enumerate() {
            put_words(&mut image, FIRST_HEADER as usize + 0x40 * n, &header.to_words());
        }
        for (n, header) in headers.iter().enumerate() {
            let start = header.data_offset as usize * 4;
            let end = start + header.total_len as usize * 4;
            image[start..end].fill(n as u8 + 1);
        }
        image
    }
}

fn put_words(image: &mut [u8], offset: usize, words: &[u32]) {
    for (n, word) in words.iter().enumerate() {
        let at = offset + 4 * n;
        image[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }
}

/// Simulated board logging every register write
pub struct Board {
    pub sim: SimPlatform,
    events: EventLog,
}

impl Board {
    pub fn new(sim: SimPlatform, events: EventLog) -> Self {
        Self { sim, events }
    }
}

impl Platform for Board {
    fn read32(&self, addr: u32) -> u32 {
        self.sim.read32(addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.events.borrow_mut().push(Event::Write(addr, value));
        self.sim.write32(addr, value);
    }

    fn delay_us(&mut self, us: u32) {
        self.sim.delay_us(us);
    }

    fn cluster_id(&self) -> u64 {
        self.sim.cluster_id()
    }

    fn is_aarch64(&self) -> bool {
        self.sim.is_aarch64()
    }

    fn dcache_enable(&mut self) {
        self.sim.dcache_enable();
    }

    fn dcache_disable(&mut self) {
        self.sim.dcache_disable();
    }

    fn publish_atf_params(&mut self, params: &AtfHandoffParams) -> u32 {
        self.sim.publish_atf_params(params)
    }
}

/// Boot device over an in-memory image, logging copies instead of doing them
pub struct Flash {
    image: Vec<u8>,
    events: EventLog,
}

impl Flash {
    pub fn new(image: Vec<u8>, events: EventLog) -> Self {
        Self { image, events }
    }
}

impl ImageSource for Flash {
    fn copy(&mut self, src_offset: u32, dst: &mut [u8]) -> Result<(), IoError> {
        SliceImage::new(&self.image).copy(src_offset, dst)
    }
}

impl BootDevice for Flash {
    fn load(&mut self, src: u32, dest: u64, len: u32) -> Result<(), IoError> {
        let end = src as usize + len as usize;
        if end > self.image.len() {
            return Err(IoError::OutOfBounds {
                offset: src,
                len: len as usize,
            });
        }
        self.events.borrow_mut().push(Event::Load { src, dest, len });
        Ok(())
    }

    fn release(&mut self) -> Result<(), IoError> {
        self.events.borrow_mut().push(Event::DeviceReleased);
        Ok(())
    }
}

/// Board, device and their shared log for one image
pub fn rig(sim: SimPlatform, image: Vec<u8>) -> (Board, Flash, EventLog) {
    let events = EventLog::default();
    (
        Board::new(sim, events.clone()),
        Flash::new(image, events.clone()),
        events,
    )
}

/// Index of the first event matching `pred`
pub fn position(events: &EventLog, pred: impl Fn(&Event) -> bool) -> Option<usize> {
    events.borrow().iter().position(pred)
}
