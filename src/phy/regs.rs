use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{PhyError, SymbolRx, SymbolTx};
use crate::config::PollConfig;
use crate::symbol::{WideSymbol, WIDE_PAYLOAD_BYTES};

// Fixed physical bases of the four optical channel endpoints.
pub const STATION_WIDE_RX_BASE: usize = 0x4121_0000;
pub const STATION_NARROW_TX_BASE: usize = 0x4124_0000;
pub const AP_WIDE_TX_BASE: usize = 0x4120_0000;
pub const AP_NARROW_RX_BASE: usize = 0x4123_0000;

// Word 0 is control/status; narrow data moves through word 1 and wide
// payloads through words 4..8.
const CTRL_WORD: usize = 0;
const NARROW_DATA_WORD: usize = 1;
const WIDE_PAYLOAD_WORD: usize = 4;

pub const WIDE_RX_READY: u32 = 1 << 2;
pub const WIDE_TX_BUSY: u32 = 1 << 10;
pub const NARROW_RX_READY: u32 = 1 << 16;
pub const NARROW_TX_BUSY: u32 = 1 << 17;

// One-time mode words written at initialization.
pub const WIDE_RX_MODE: u32 = 0x2;
pub const WIDE_TX_MODE: u32 = 0x122;

/// One page of memory-mapped symbol-exchange registers.
pub trait RegisterBlock {
    fn read(&self, word: usize) -> u32;
    fn write(&self, word: usize, value: u32);
}

/// Polls the status word until `ready` holds. Zero interval spins, as
/// the hardware expects; a configured timeout bounds the wait.
fn wait_status<B: RegisterBlock>(
    regs: &B,
    poll: &PollConfig,
    stop: &AtomicBool,
    ready: impl Fn(u32) -> bool,
) -> Result<(), PhyError> {
    let started = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(PhyError::Stopped);
        }
        if ready(regs.read(CTRL_WORD)) {
            return Ok(());
        }
        if let Some(timeout) = poll.timeout {
            if started.elapsed() >= timeout {
                return Err(PhyError::Timeout);
            }
        }

        if poll.interval.is_zero() {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(poll.interval);
        }
    }
}

pub struct WideRxPort<B> {
    regs: B,
    poll: PollConfig,
}

impl<B: RegisterBlock> WideRxPort<B> {
    pub fn new(regs: B, poll: PollConfig) -> Self {
        regs.write(CTRL_WORD, WIDE_RX_MODE);
        Self { regs, poll }
    }
}

impl<B: RegisterBlock> SymbolRx for WideRxPort<B> {
    type Symbol = WideSymbol;

    fn recv(&self, stop: &AtomicBool) -> Result<WideSymbol, PhyError> {
        wait_status(&self.regs, &self.poll, stop, |status| {
            status & WIDE_RX_READY != 0
        })?;

        let mut words = [0u32; 4];
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.regs.read(WIDE_PAYLOAD_WORD + index);
        }
        Ok(WideSymbol {
            words,
            bytes: WIDE_PAYLOAD_BYTES as u16,
        })
    }
}

pub struct WideTxPort<B> {
    regs: B,
    poll: PollConfig,
}

impl<B: RegisterBlock> WideTxPort<B> {
    pub fn new(regs: B, poll: PollConfig) -> Self {
        regs.write(CTRL_WORD, WIDE_TX_MODE);
        Self { regs, poll }
    }
}

impl<B: RegisterBlock> SymbolTx for WideTxPort<B> {
    type Symbol = WideSymbol;

    fn send(&self, symbol: WideSymbol, stop: &AtomicBool) -> Result<(), PhyError> {
        for (index, word) in symbol.words.iter().enumerate() {
            self.regs.write(WIDE_PAYLOAD_WORD + index, *word);
        }

        wait_status(&self.regs, &self.poll, stop, |status| {
            status & WIDE_TX_BUSY == 0
        })
    }
}

pub struct NarrowRxPort<B> {
    regs: B,
    poll: PollConfig,
}

impl<B: RegisterBlock> NarrowRxPort<B> {
    pub fn new(regs: B, poll: PollConfig) -> Self {
        Self { regs, poll }
    }
}

impl<B: RegisterBlock> SymbolRx for NarrowRxPort<B> {
    type Symbol = u8;

    fn recv(&self, stop: &AtomicBool) -> Result<u8, PhyError> {
        wait_status(&self.regs, &self.poll, stop, |status| {
            status & NARROW_RX_READY != 0
        })?;

        Ok(self.regs.read(NARROW_DATA_WORD) as u8)
    }
}

pub struct NarrowTxPort<B> {
    regs: B,
    poll: PollConfig,
}

impl<B: RegisterBlock> NarrowTxPort<B> {
    pub fn new(regs: B, poll: PollConfig) -> Self {
        Self { regs, poll }
    }
}

impl<B: RegisterBlock> SymbolTx for NarrowTxPort<B> {
    type Symbol = u8;

    fn send(&self, symbol: u8, stop: &AtomicBool) -> Result<(), PhyError> {
        self.regs.write(NARROW_DATA_WORD, symbol.into());

        wait_status(&self.regs, &self.poll, stop, |status| {
            status & NARROW_TX_BUSY == 0
        })
    }
}

/// In-memory register page backing the unit tests.
pub struct MemRegisters {
    words: [AtomicU32; 8],
}

impl MemRegisters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            words: Default::default(),
        })
    }
}

impl RegisterBlock for Arc<MemRegisters> {
    fn read(&self, word: usize) -> u32 {
        self.words[word].load(Ordering::SeqCst)
    }

    fn write(&self, word: usize, value: u32) {
        self.words[word].store(value, Ordering::SeqCst)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// One page of `/dev/mem` mapped over a physical register base.
        pub struct DevMem {
            base: *mut u32,
            page: usize,
        }

        // The mapping is fixed for the process lifetime and every
        // access is volatile.
        unsafe impl Send for DevMem {}
        unsafe impl Sync for DevMem {}

        impl DevMem {
            pub fn map(phys_base: usize) -> crate::error::Result<Self> {
                let fd = unsafe {
                    libc::open(
                        b"/dev/mem\0".as_ptr() as *const libc::c_char,
                        libc::O_RDWR | libc::O_SYNC,
                    )
                };
                if fd < 0 {
                    return Err(std::io::Error::last_os_error().into());
                }

                let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
                let base = unsafe {
                    libc::mmap(
                        std::ptr::null_mut(),
                        page,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_SHARED,
                        fd,
                        phys_base as libc::off_t,
                    )
                };
                unsafe { libc::close(fd) };

                if base == libc::MAP_FAILED {
                    return Err(std::io::Error::last_os_error().into());
                }

                Ok(Self {
                    base: base as *mut u32,
                    page,
                })
            }
        }

        impl RegisterBlock for DevMem {
            fn read(&self, word: usize) -> u32 {
                unsafe { std::ptr::read_volatile(self.base.add(word)) }
            }

            fn write(&self, word: usize, value: u32) {
                unsafe { std::ptr::write_volatile(self.base.add(word), value) }
            }
        }

        impl Drop for DevMem {
            fn drop(&mut self) {
                unsafe {
                    libc::munmap(self.base as *mut libc::c_void, self.page);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn bounded_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_micros(10),
            timeout: Some(Duration::from_millis(20)),
        }
    }

    #[test]
    fn test_wide_rx_reads_payload_words() {
        let regs = MemRegisters::new();
        let port = WideRxPort::new(regs.clone(), bounded_poll());
        assert_eq!(regs.read(CTRL_WORD), WIDE_RX_MODE);

        regs.write(WIDE_PAYLOAD_WORD, 0x1680_8880);
        regs.write(WIDE_PAYLOAD_WORD + 2, 0xDEAD_BEEF);
        regs.write(CTRL_WORD, WIDE_RX_MODE | WIDE_RX_READY);

        let stop = AtomicBool::new(false);
        let symbol = port.recv(&stop).unwrap();
        assert_eq!(symbol.words[0], 0x1680_8880);
        assert_eq!(symbol.words[2], 0xDEAD_BEEF);
    }

    #[test]
    fn test_rx_honors_timeout_and_stop() {
        let regs = MemRegisters::new();
        let port = NarrowRxPort::new(regs, bounded_poll());

        let stop = AtomicBool::new(false);
        assert_eq!(port.recv(&stop), Err(PhyError::Timeout));

        stop.store(true, Ordering::Relaxed);
        assert_eq!(port.recv(&stop), Err(PhyError::Stopped));
    }

    #[test]
    fn test_narrow_tx_writes_data_word() {
        let regs = MemRegisters::new();
        let port = NarrowTxPort::new(regs.clone(), bounded_poll());

        let stop = AtomicBool::new(false);
        port.send(0xA5, &stop).unwrap();
        assert_eq!(regs.read(NARROW_DATA_WORD), 0xA5);
    }

    #[test]
    fn test_wide_tx_waits_for_busy_clear() {
        let regs = MemRegisters::new();
        let port = WideTxPort::new(regs.clone(), bounded_poll());
        assert_eq!(regs.read(CTRL_WORD), WIDE_TX_MODE);

        regs.write(CTRL_WORD, WIDE_TX_MODE | WIDE_TX_BUSY);
        let stop = AtomicBool::new(false);
        let symbol = WideSymbol {
            words: [1, 2, 3, 4],
            bytes: 15,
        };
        assert_eq!(port.send(symbol, &stop), Err(PhyError::Timeout));

        regs.write(CTRL_WORD, WIDE_TX_MODE);
        port.send(symbol, &stop).unwrap();
        assert_eq!(regs.read(WIDE_PAYLOAD_WORD + 3), 4);
    }
}
