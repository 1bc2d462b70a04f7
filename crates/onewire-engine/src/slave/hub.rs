use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::commands::RomCommand;
use crate::device::EmulatedKey;
use crate::error::{decode_error, OneWireError};
use crate::rom::{RomCode, ROM_LEN};
use crate::slave::link::SlaveLink;
use crate::slave::tree::{DiscriminationTree, HUB_DEVICE_LIMIT, NO_NODE};
use crate::timing::Speed;

/// Emulates up to [`HUB_DEVICE_LIMIT`] keys on one line by polling.
///
/// Bus arbitration during Search-ROM is resolved against a
/// [`DiscriminationTree`] rebuilt on every attach and detach.
pub struct MultiDeviceHub<P, C> {
    link: SlaveLink<P, C>,
    slots: [Option<EmulatedKey>; HUB_DEVICE_LIMIT],
    tree: DiscriminationTree,
    selected: Option<u8>,
}

impl<P, C> MultiDeviceHub<P, C>
where
    P: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pin: P, clock: C) -> Self {
        Self::with_speed(pin, clock, Speed::Standard)
    }

    pub fn with_speed(pin: P, clock: C, speed: Speed) -> Self {
        Self {
            link: SlaveLink::new(pin, clock, speed),
            slots: [None; HUB_DEVICE_LIMIT],
            tree: DiscriminationTree::default(),
            selected: None,
        }
    }

    /// Attach a key, returning its slot. `None` when every slot is taken or
    /// a key with the same ROM is already attached.
    pub fn attach(&mut self, key: EmulatedKey) -> Option<u8> {
        if self.slots.iter().flatten().any(|k| k.rom() == key.rom()) {
            warn!("hub: {} already attached", key.rom());
            return None;
        }
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(key);
        self.rebuild();
        Some(slot as u8)
    }

    /// Remove the key in `slot` and hand it back.
    pub fn detach(&mut self, slot: u8) -> Option<EmulatedKey> {
        let key = self.slots.get_mut(slot as usize)?.take();
        self.rebuild();
        key
    }

    /// Remove the key answering to `rom`.
    pub fn detach_rom(&mut self, rom: &RomCode) -> bool {
        let slot = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|k| k.rom() == rom));
        match slot {
            Some(slot) => self.detach(slot as u8).is_some(),
            None => false,
        }
    }

    pub fn device_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn key(&self, slot: u8) -> Option<&EmulatedKey> {
        self.slots.get(slot as usize)?.as_ref()
    }

    /// Slot addressed by the last Search-ROM, Match-ROM or Skip-ROM.
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    pub fn tree(&self) -> &DiscriminationTree {
        &self.tree
    }

    pub fn start(&mut self) {
        self.link.start();
    }

    pub fn stop(&mut self) {
        self.link.stop();
    }

    pub fn is_active(&self) -> bool {
        self.link.is_active()
    }

    pub fn into_inner(self) -> (P, C) {
        self.link.into_inner()
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.link.error()
    }

    pub fn decode_error(&self) -> &'static str {
        decode_error(self.link.error())
    }

    fn rebuild(&mut self) {
        let mut roms = [None; HUB_DEVICE_LIMIT];
        for (rom, slot) in roms.iter_mut().zip(self.slots.iter()) {
            *rom = slot.map(|k| *k.rom());
        }
        self.tree = DiscriminationTree::build(&roms);
        self.selected = None;
    }

    /// Serve transactions until the line goes quiet.
    ///
    /// Each round waits for a reset, answers with presence and handles one
    /// command. Returns `true` if at least one transaction was served. The
    /// loop ends on a missing or malformed reset or on a protocol error;
    /// callers poll again.
    pub fn emulate(&mut self) -> bool {
        if !self.link.is_active() || self.device_count() == 0 {
            self.link.set_error(OneWireError::IncorrectSlaveUsage);
            return false;
        }

        let mut served = false;
        // Keep a pending ResetInProgress for check_reset to pick up.
        if self.link.error() != Some(OneWireError::ResetInProgress) {
            self.link.clear_error();
        }
        loop {
            if !self.link.check_reset() {
                return served;
            }
            if !self.link.show_presence() {
                return served;
            }
            self.receive_and_process_cmd();
            served = true;
            match self.link.error() {
                None | Some(OneWireError::ResetInProgress) => {}
                Some(e) => {
                    debug!("hub: transaction ended with {}", e);
                    return served;
                }
            }
        }
    }

    fn receive_and_process_cmd(&mut self) {
        let Some(cmd) = self.link.receive_byte() else {
            return;
        };
        trace!("hub: command {=u8:#x}", cmd);

        match RomCommand::try_from(cmd) {
            Ok(RomCommand::SearchRom) => self.cmd_search_rom(),
            Ok(RomCommand::ReadRom) => self.cmd_read_rom(),
            Ok(RomCommand::MatchRom) => self.cmd_match_rom(),
            Ok(RomCommand::SkipRom) => self.cmd_skip_rom(),
            // No emulated key is ever in alarm state.
            Ok(RomCommand::ConditionalSearch) => {}
            Err(_) => self.link.set_error(OneWireError::IncorrectOnewireCmd),
        }
    }

    fn device_rom(&self, slot: u8) -> Option<RomCode> {
        self.slots.get(slot as usize)?.map(|k| *k.rom())
    }

    /// Answer Search-ROM for all attached keys at once.
    pub(crate) fn cmd_search_rom(&mut self) {
        let Some(root) = self.tree.root().copied() else {
            return;
        };
        let mut node = root;
        let mut device = root.device;
        let Some(mut rom) = self.device_rom(device) else {
            return;
        };

        for position in 0..64u8 {
            if position == node.bit_position {
                // Two keys disagree here: answer with the wired-AND of both.
                if !self.link.send_bit(false) || !self.link.send_bit(false) {
                    return;
                }
                let Some(direction) = self.link.receive_bit() else {
                    return;
                };
                let next = if direction { node.on_one } else { node.on_zero };
                let Some(next_node) = self.tree.node(next).copied() else {
                    return;
                };
                node = next_node;
                device = node.device;
                match self.device_rom(device) {
                    Some(r) => rom = r,
                    None => return,
                }
            } else {
                let bit = rom.bit(position);
                if !self.link.send_bit(bit) || !self.link.send_bit(!bit) {
                    return;
                }
                let Some(direction) = self.link.receive_bit() else {
                    return;
                };
                if direction != bit {
                    // The master went for a ROM none of the keys has.
                    debug!("hub: search left at bit {}", position);
                    return;
                }
            }
        }
        debug_assert!(node.on_zero == NO_NODE && node.on_one == NO_NODE);
        self.selected = Some(device);
    }

    fn cmd_read_rom(&mut self) {
        let slot = match self.selected {
            Some(slot) => Some(slot),
            None if self.device_count() == 1 => {
                self.slots.iter().position(Option::is_some).map(|s| s as u8)
            }
            None => None,
        };
        let Some(rom) = slot.and_then(|s| self.device_rom(s)) else {
            // More than one key could answer: stay silent.
            return;
        };
        self.selected = slot;
        self.link.send(rom.as_bytes());
    }

    fn cmd_match_rom(&mut self) {
        self.selected = None;
        let mut bytes = [0u8; ROM_LEN];
        if !self.link.receive(&mut bytes) {
            return;
        }
        let target = RomCode::from_raw(bytes);
        self.selected = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|k| *k.rom() == target))
            .map(|s| s as u8);
        if self.selected.is_some() {
            self.serve_function_command();
        }
    }

    fn cmd_skip_rom(&mut self) {
        if self.device_count() != 1 {
            self.selected = None;
            return;
        }
        self.selected =
            self.slots.iter().position(Option::is_some).map(|s| s as u8);
        self.serve_function_command();
    }

    /// Hand the next byte to the addressed key. A reset instead of a byte
    /// is the usual end of a DS1990 transaction and not an error.
    fn serve_function_command(&mut self) {
        let Some(key) = self.selected.and_then(|s| self.key(s).copied())
        else {
            return;
        };
        let Some(cmd) = self.link.receive_byte() else {
            return;
        };
        if !key.handle_command(&mut self.link, cmd) {
            self.link.set_error(OneWireError::IncorrectOnewireCmd);
        }
    }
}
