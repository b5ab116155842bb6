//! Command buffer memory and two-phase command publishing.
//!
//! A command is first assembled in a [`StagedCommand`], which can never carry
//! the READY flag. [`CommandBuffer::publish`] then copies the record into the
//! firmware-visible words and writes the control word last, with release
//! ordering, so a reader that sees READY also sees every other field.
//!
//! A slot may be republished while an earlier record there still carries
//! READY. The control word is cleared before the body is rewritten, and a
//! buffer-wide sequence counter lets [`CommandBuffer::read_ready`] discard a
//! record that changed underneath it.

use std::sync::atomic::{self, AtomicU32, Ordering};

use bytemuck::Zeroable;

use crate::capture::{CaptureEvent, CaptureSink};
use crate::error::{KickError, KickResult};

use super::layout::{CommandFlags, TaCommand};

/// A validated location of one command record inside a [`CommandBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandSlot {
    offset: u32,
}

impl CommandSlot {
    /// Byte offset of the record.
    pub fn offset(self) -> u32 {
        self.offset
    }

    fn first_word(self) -> usize {
        self.offset as usize / 4
    }
}

/// A command record being assembled off-band.
#[derive(Debug)]
pub struct StagedCommand {
    command: Box<TaCommand>,
}

impl StagedCommand {
    /// Start a new, zeroed record.
    pub fn new() -> Self {
        Self {
            command: Box::new(TaCommand::zeroed()),
        }
    }

    /// The record as assembled so far.
    pub fn command(&self) -> &TaCommand {
        &self.command
    }

    /// Mutable access to the record. The READY bit is stripped on publish.
    pub fn command_mut(&mut self) -> &mut TaCommand {
        &mut self.command
    }
}

impl Default for StagedCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// A command that has been published with its READY flag set.
#[derive(Debug)]
pub struct ReadyCommand {
    slot: CommandSlot,
    command: Box<TaCommand>,
}

impl ReadyCommand {
    /// Where the command lives in the command buffer.
    pub fn slot(&self) -> CommandSlot {
        self.slot
    }

    /// The published record.
    pub fn command(&self) -> &TaCommand {
        &self.command
    }
}

/// Firmware-visible circular command buffer memory.
pub struct CommandBuffer {
    label: Option<String>,
    words: Box<[AtomicU32]>,
    /// Odd while a publish is rewriting words.
    sequence: AtomicU32,
}

impl CommandBuffer {
    /// Create a zeroed command buffer of `size` bytes (rounded down to whole
    /// words).
    pub fn new(size: u32) -> Self {
        let words = (0..size / 4).map(|_| AtomicU32::new(0)).collect();
        Self {
            label: None,
            words,
            sequence: AtomicU32::new(0),
        }
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        (self.words.len() * 4) as u32
    }

    /// Validate that a whole command record fits at `offset`.
    pub fn slot(&self, offset: u32) -> KickResult<CommandSlot> {
        if offset % 4 != 0 {
            return Err(KickError::InvalidParams(format!(
                "command offset {offset:#x} is not word aligned"
            )));
        }
        let end = offset as u64 + TaCommand::SIZE as u64;
        if end > self.size() as u64 {
            return Err(KickError::InvalidParams(format!(
                "command at offset {offset:#x} overruns command buffer of {} bytes",
                self.size()
            )));
        }
        Ok(CommandSlot { offset })
    }

    /// Copy a staged record into `slot`, writing the READY control word last.
    ///
    /// Publishes are serialized by the device kick lock.
    pub(crate) fn publish(
        &self,
        slot: CommandSlot,
        staged: StagedCommand,
        capture: &dyn CaptureSink,
    ) -> ReadyCommand {
        let mut command = staged.command;
        let ctrl = CommandFlags::from_bits_truncate(command.ctrl_flags) - CommandFlags::READY;
        command.ctrl_flags = ctrl.bits();

        let base = slot.first_word();
        let ctrl_word = base + TaCommand::CTRL_FLAGS_OFFSET / 4;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        atomic::fence(Ordering::Release);
        self.words[ctrl_word].store(0, Ordering::Relaxed);

        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&*command));
        for (index, &word) in words.iter().enumerate() {
            if base + index != ctrl_word {
                self.words[base + index].store(word, Ordering::Relaxed);
            }
        }
        let word_count = words.len();

        let ready = ctrl | CommandFlags::READY;
        self.words[ctrl_word].store(ready.bits(), Ordering::Release);
        self.sequence.store(sequence.wrapping_add(2), Ordering::Release);
        command.ctrl_flags = ready.bits();

        log::trace!(
            "CommandBuffer {:?}: published command at {:#x} ({} words)",
            self.label,
            slot.offset,
            word_count
        );
        capture.record(CaptureEvent::CommandWritten {
            offset: slot.offset,
            words: word_count,
        });

        ReadyCommand { slot, command }
    }

    /// Clear the control word of a published record so the firmware ignores
    /// it.
    pub(crate) fn retract(&self, slot: CommandSlot, capture: &dyn CaptureSink) {
        let ctrl_word = slot.first_word() + TaCommand::CTRL_FLAGS_OFFSET / 4;
        self.words[ctrl_word].store(0, Ordering::Release);
        log::trace!(
            "CommandBuffer {:?}: retracted command at {:#x}",
            self.label,
            slot.offset
        );
        capture.record(CaptureEvent::CommandRetracted {
            offset: slot.offset,
        });
    }

    /// Whether a ready command is visible at `offset`.
    pub fn is_ready(&self, offset: u32) -> bool {
        self.read_ready(offset).is_some()
    }

    /// Read the record at `offset` the way the firmware does: nothing unless
    /// the control word carries READY.
    ///
    /// Returns `None` while a publish is in flight, so the record is never a
    /// mix of two commands.
    pub fn read_ready(&self, offset: u32) -> Option<TaCommand> {
        let slot = self.slot(offset).ok()?;
        let sequence = self.sequence.load(Ordering::Acquire);
        if sequence & 1 == 1 {
            return None;
        }

        let base = slot.first_word();
        let ctrl_word = base + TaCommand::CTRL_FLAGS_OFFSET / 4;
        let ctrl = self.words[ctrl_word].load(Ordering::Acquire);
        if !CommandFlags::from_bits_truncate(ctrl).contains(CommandFlags::READY) {
            return None;
        }

        let mut command = TaCommand::zeroed();
        let words: &mut [u32] = bytemuck::cast_slice_mut(std::slice::from_mut(&mut command));
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.words[base + index].load(Ordering::Relaxed);
        }
        atomic::fence(Ordering::Acquire);
        if self.sequence.load(Ordering::Relaxed) != sequence {
            return None;
        }
        command.ctrl_flags = ctrl;
        Some(command)
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("label", &self.label)
            .field("size", &self.size())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandBuffer: Send, Sync);
