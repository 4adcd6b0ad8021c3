// Shared fixtures (integration tests compile as separate crates, so put common code in a
// submodule to avoid it becoming its own test target).
#![allow(dead_code)]

use std::cell::{Ref, RefMut};

use pei_atapi::{AtapiBlockIoDevice, AtapiConfig, IdeRegsBaseAddr, PRIMARY_PORTS, SECONDARY_PORTS};
use pei_atapi_sim::{
    register_ide_channel, AccessCounter, AtaDisk, AtapiDrive, IdeChannel, IdeDevice, IoPortBus,
    SharedIdeChannel, SimAtaController, VirtualClock,
};

pub type SimBlockIo = AtapiBlockIoDevice<IoPortBus, VirtualClock>;

/// Port bases for up to four channels, legacy assignments first.
pub const CHANNEL_BASES: [IdeRegsBaseAddr; 4] = [
    PRIMARY_PORTS,
    SECONDARY_PORTS,
    IdeRegsBaseAddr {
        command_block_base: 0x1E8,
        control_block_base: 0x3EE,
    },
    IdeRegsBaseAddr {
        command_block_base: 0x168,
        control_block_base: 0x36E,
    },
];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

pub fn cdrom(blocks: u32) -> Option<IdeDevice> {
    Some(IdeDevice::Atapi(AtapiDrive::cdrom(Some(blocks))))
}

pub fn empty_cdrom() -> Option<IdeDevice> {
    Some(IdeDevice::Atapi(AtapiDrive::cdrom(None)))
}

pub fn ls120(blocks: u32) -> Option<IdeDevice> {
    Some(IdeDevice::Atapi(AtapiDrive::ls120(Some(blocks))))
}

pub fn atapi(drive: AtapiDrive) -> Option<IdeDevice> {
    Some(IdeDevice::Atapi(drive))
}

pub fn disk() -> Option<IdeDevice> {
    Some(IdeDevice::Ata(AtaDisk::new(0x1_0000)))
}

pub struct Rig {
    pub block_io: SimBlockIo,
    pub channels: Vec<SharedIdeChannel>,
    pub accesses: AccessCounter,
    pub clock: VirtualClock,
    pub controller: SimAtaController,
}

impl Rig {
    /// Build one channel per `[master, slave]` pair and run driver initialization over them.
    pub fn boot(layout: Vec<[Option<IdeDevice>; 2]>) -> Rig {
        Self::boot_with_config(layout, AtapiConfig::default())
    }

    pub fn boot_with_config(layout: Vec<[Option<IdeDevice>; 2]>, config: AtapiConfig) -> Rig {
        init_tracing();
        assert!(layout.len() <= CHANNEL_BASES.len());

        let clock = VirtualClock::new();
        let mut bus = IoPortBus::new();
        let mut channels = Vec::new();
        for (base, [master, slave]) in CHANNEL_BASES.iter().zip(layout) {
            let mut chan = IdeChannel::new(*base, clock.clone());
            if let Some(dev) = master {
                chan.attach(0, dev);
            }
            if let Some(dev) = slave {
                chan.attach(1, dev);
            }
            let chan = chan.into_shared();
            register_ide_channel(&mut bus, chan.clone());
            channels.push(chan);
        }

        let mut controller = SimAtaController::new(CHANNEL_BASES[..channels.len()].to_vec());
        let accesses = bus.access_counter();
        let block_io = AtapiBlockIoDevice::initialize(&mut controller, bus, clock.clone(), config)
            .expect("initialization succeeds");

        Rig {
            block_io,
            channels,
            accesses,
            clock,
            controller,
        }
    }

    pub fn drive(&self, channel: usize, slot: usize) -> Ref<'_, AtapiDrive> {
        Ref::map(self.channels[channel].borrow(), |chan| {
            chan.atapi(slot).expect("packet drive attached")
        })
    }

    pub fn drive_mut(&self, channel: usize, slot: usize) -> RefMut<'_, AtapiDrive> {
        RefMut::map(self.channels[channel].borrow_mut(), |chan| {
            chan.atapi_mut(slot).expect("packet drive attached")
        })
    }
}
