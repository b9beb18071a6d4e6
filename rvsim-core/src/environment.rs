//! The execution environment a simulated program talks to through `ecall`.
//!
//! The service number is passed in `a7`, arguments in `a0`..`a2`, and results are returned in
//! `a0`. Program input comes from a preloaded buffer and all output is captured, so simulation is
//! deterministic.

use crate::core::memory::{Memory, MemoryError};
use crate::core::trap::Trap;
use crate::core::{Exception, ExecutionResult, Outcome};
use crate::registers::{Registers, Specifier};
use crate::PrivilegeLevel;
use log::{debug, trace};
use std::borrow::Cow;

/// Environment call services.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Service {
    PrintInt = 1,
    PrintString = 4,
    ReadInt = 5,
    ReadString = 8,
    Sbrk = 9,
    Exit = 10,
    PrintChar = 11,
    ReadChar = 12,
    PrintIntHex = 34,
    PrintIntBinary = 35,
    PrintIntUnsigned = 36,
    Read = 63,
    Write = 64,
    Exit2 = 93,
}

impl Service {
    pub fn from_number(number: u32) -> Option<Self> {
        Some(match number {
            1 => Self::PrintInt,
            4 => Self::PrintString,
            5 => Self::ReadInt,
            8 => Self::ReadString,
            9 => Self::Sbrk,
            10 => Self::Exit,
            11 => Self::PrintChar,
            12 => Self::ReadChar,
            34 => Self::PrintIntHex,
            35 => Self::PrintIntBinary,
            36 => Self::PrintIntUnsigned,
            63 => Self::Read,
            64 => Self::Write,
            93 => Self::Exit2,
            _ => return None,
        })
    }
}

const STDIN: u32 = 0;
const STDOUT: u32 = 1;
const STDERR: u32 = 2;

/// Input and output streams, plus the program break, of a simulated program.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Environment {
    stdin: Vec<u8>,
    stdin_position: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    program_break: u32,
}

impl Environment {
    pub fn new(program_break: u32) -> Self {
        Self {
            program_break,
            ..Self::default()
        }
    }

    /// Replace the input stream. Reading restarts at its beginning.
    pub fn set_stdin(&mut self, stdin: impl Into<Vec<u8>>) {
        self.stdin = stdin.into();
        self.stdin_position = 0;
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    pub fn program_break(&self) -> u32 {
        self.program_break
    }

    /// Performs the environment call requested by the registers.
    ///
    /// Returns [`Outcome::Exit`] for the exit services. Any other successful call advances the `pc`.
    /// An unknown service number raises the environment-call exception of `privilege_level`.
    pub(crate) fn call(
        &mut self,
        registers: &mut Registers,
        memory: &mut Memory,
        privilege_level: PrivilegeLevel,
    ) -> ExecutionResult {
        let number = registers.x(Specifier::A7);
        let Some(service) = Service::from_number(number) else {
            return Err(Trap::new(
                Exception::environment_call(privilege_level),
                0,
                format!("invalid or unimplemented syscall service: {number}"),
            ));
        };
        trace!("Handling environment call {service:?}");

        let a0 = registers.x(Specifier::A0);
        let a1 = registers.x(Specifier::A1);
        let a2 = registers.x(Specifier::A2);
        let fail = |message: &str| {
            Trap::new(
                Exception::environment_call(privilege_level),
                0,
                format!("{message} (syscall {number})"),
            )
        };

        match service {
            Service::Exit => {
                debug!("Program exited with code 0");
                return Ok(Outcome::Exit(0));
            }
            Service::Exit2 => {
                debug!("Program exited with code {}", a0 as i32);
                return Ok(Outcome::Exit(a0 as i32));
            }
            Service::PrintInt => self.print(format!("{}", a0 as i32)),
            Service::PrintIntHex => self.print(format!("{a0:#010x}")),
            Service::PrintIntBinary => self.print(format!("{a0:032b}")),
            Service::PrintIntUnsigned => self.print(a0.to_string()),
            Service::PrintChar => self.stdout.push(a0 as u8),
            Service::PrintString => {
                let string = read_c_string(memory, a0)?;
                self.stdout.extend_from_slice(&string);
            }
            Service::ReadInt => {
                let line = self.read_line();
                let value = String::from_utf8_lossy(&line)
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| fail("invalid integer input"))?;
                registers.set_x(Specifier::A0, value as u32);
            }
            Service::ReadChar => {
                let value = match self.stdin.get(self.stdin_position) {
                    Some(&byte) => {
                        self.stdin_position += 1;
                        byte as u32
                    }
                    None => u32::MAX,
                };
                registers.set_x(Specifier::A0, value);
            }
            Service::ReadString => {
                // At most `a1 - 1` characters are read, followed by a terminating null byte
                if (a1 as i32) > 0 {
                    let mut line = self.read_line();
                    line.truncate(a1 as usize - 1);
                    line.push(0);
                    write_bytes(memory, a0, &line)?;
                }
            }
            Service::Sbrk => {
                let amount = i32::try_from(a0)
                    .ok()
                    .and_then(|amount| u32::try_from(amount).ok())
                    .ok_or_else(|| fail("invalid sbrk amount"))?;
                let new_break = amount
                    .checked_next_multiple_of(4)
                    .and_then(|amount| self.program_break.checked_add(amount))
                    .ok_or_else(|| fail("request exceeds available heap storage"))?;
                let old_break = std::mem::replace(&mut self.program_break, new_break);
                registers.set_x(Specifier::A0, old_break);
            }
            Service::Read => {
                let result = if a0 == STDIN {
                    let available = &self.stdin[self.stdin_position..];
                    let count = available.len().min(a2 as usize);
                    write_bytes(memory, a1, &available[..count])?;
                    self.stdin_position += count;
                    count as u32
                } else {
                    u32::MAX
                };
                registers.set_x(Specifier::A0, result);
            }
            Service::Write => {
                let stream = match a0 {
                    STDOUT => Some(&mut self.stdout),
                    STDERR => Some(&mut self.stderr),
                    _ => None,
                };
                let result = match stream {
                    Some(stream) => {
                        if let Some(address) = memory.first_unmapped(a1, a2) {
                            return Err(load_fault(MemoryError::AccessFault, address));
                        }
                        stream.extend_from_slice(&read_bytes(memory, a1, a2)?);
                        a2
                    }
                    None => u32::MAX,
                };
                registers.set_x(Specifier::A0, result);
            }
        }

        registers.increment_pc();
        Ok(Outcome::Continue)
    }

    fn print(&mut self, text: String) {
        self.stdout.extend_from_slice(text.as_bytes());
    }

    /// Consume input up to and including the next newline.
    fn read_line(&mut self) -> Vec<u8> {
        let available = &self.stdin[self.stdin_position..];
        let length = available
            .iter()
            .position(|&byte| byte == b'\n')
            .map_or(available.len(), |index| index + 1);
        self.stdin_position += length;
        available[..length].to_vec()
    }
}

fn read_c_string(memory: &Memory, address: u32) -> Result<Vec<u8>, Trap> {
    let mut string = Vec::new();
    let mut current = address;
    loop {
        match memory.read_byte(current).map_err(|err| load_fault(err, current))? {
            0 => return Ok(string),
            byte => string.push(byte),
        }
        current = current.wrapping_add(1);
    }
}

// Buffers are copied a byte at a time, so they need no alignment.

fn read_bytes(memory: &Memory, address: u32, length: u32) -> Result<Vec<u8>, Trap> {
    (0..length)
        .map(|offset| address.wrapping_add(offset))
        .map(|current| memory.read_byte(current).map_err(|err| load_fault(err, current)))
        .collect()
}

fn write_bytes(memory: &mut Memory, address: u32, bytes: &[u8]) -> Result<(), Trap> {
    for (offset, &byte) in bytes.iter().enumerate() {
        let current = address.wrapping_add(offset as u32);
        memory.write_byte(current, byte).map_err(|err| {
            let exception = match err {
                MemoryError::MisalignedAccess => Exception::StoreOrAmoAddressMisaligned,
                MemoryError::AccessFault | MemoryError::TextWrite => {
                    Exception::StoreOrAmoAccessFault
                }
            };
            Trap::new(exception, current, err.to_string())
        })?;
    }
    Ok(())
}

fn load_fault(err: MemoryError, address: u32) -> Trap {
    let exception = match err {
        MemoryError::MisalignedAccess => Exception::LoadAddressMisaligned,
        MemoryError::AccessFault | MemoryError::TextWrite => Exception::LoadAccessFault,
    };
    Trap::new(exception, address, err.to_string())
}
