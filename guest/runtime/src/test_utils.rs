//! Test doubles for the hardware, the shared memory and the log sink.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    panic::{AssertUnwindSafe, catch_unwind},
    string::String,
    sync::Once,
    vec::Vec,
};

use log::LevelFilter;

use crate::{
    hw::HardwareOps,
    logging::{self, Console},
    shared::SharedRegion,
};

/// Hardware that records what the runtime did to it.
pub struct MockHardware {
    pub cycles: Cell<u64>,
    pub fault_address: u64,
    pub masked: Cell<bool>,
    pub mask_calls: Cell<usize>,
    pub unmask_calls: Cell<usize>,
    pub fault_reads: Cell<usize>,
    pub waits: Cell<usize>,
    pub vector_base: Cell<Option<u64>>,
}

impl MockHardware {
    /// `wait_for_interrupt` panics after this many calls so that tests can
    /// leave a halted CPU.
    pub const MAX_WAITS: usize = 3;

    pub fn new() -> Self {
        Self {
            cycles: Cell::new(0),
            fault_address: 0,
            masked: Cell::new(true),
            mask_calls: Cell::new(0),
            unmask_calls: Cell::new(0),
            fault_reads: Cell::new(0),
            waits: Cell::new(0),
            vector_base: Cell::new(None),
        }
    }

    pub fn with_fault_address(fault_address: u64) -> Self {
        Self {
            fault_address,
            ..Self::new()
        }
    }
}

impl HardwareOps for MockHardware {
    fn read_cycle_counter(&self) -> u64 {
        self.cycles.get()
    }

    fn read_fault_address(&self) -> u64 {
        self.fault_reads.set(self.fault_reads.get() + 1);
        self.fault_address
    }

    fn mask_interrupts(&self) {
        self.mask_calls.set(self.mask_calls.get() + 1);
        self.masked.set(true);
    }

    fn unmask_interrupts(&self) {
        self.unmask_calls.set(self.unmask_calls.get() + 1);
        self.masked.set(false);
    }

    fn wait_for_interrupt(&self) {
        assert!(self.masked.get(), "parked with interrupts unmasked");
        let waits = self.waits.get() + 1;
        self.waits.set(waits);
        if waits == Self::MAX_WAITS {
            panic!("cpu parked");
        }
    }

    unsafe fn install_vector_base(&self, base: u64) {
        assert_eq!(self.vector_base.get(), None, "vector base installed twice");
        self.vector_base.set(Some(base));
    }
}

/// Shared memory whose content changes after a scripted number of reads,
/// standing in for a hypervisor that writes concurrently.
pub struct ScriptedRegion {
    bytes: RefCell<Vec<u8>>,
    updates: RefCell<VecDeque<(usize, Vec<u8>)>>,
    reads: Cell<usize>,
}

impl ScriptedRegion {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: RefCell::new(bytes.to_vec()),
            updates: RefCell::new(VecDeque::new()),
            reads: Cell::new(0),
        }
    }

    /// Replace the content right before load number `read` (counting from
    /// zero).
    pub fn schedule(&self, read: usize, bytes: &[u8]) {
        self.updates.borrow_mut().push_back((read, bytes.to_vec()));
    }

    pub fn set(&self, bytes: &[u8]) {
        self.bytes.replace(bytes.to_vec());
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn load<const N: usize>(&self, offset: usize) -> [u8; N] {
        let read = self.reads.get();
        self.reads.set(read + 1);

        let mut updates = self.updates.borrow_mut();
        while updates.front().is_some_and(|(at, _)| *at <= read) {
            let (_, bytes) = updates.pop_front().unwrap();
            self.bytes.replace(bytes);
        }

        self.bytes.borrow()[offset..][..N].try_into().unwrap()
    }
}

impl SharedRegion for ScriptedRegion {
    fn size(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn load_u8(&self, offset: usize) -> u8 {
        u8::from_ne_bytes(self.load(offset))
    }

    fn load_u32(&self, offset: usize) -> u32 {
        u32::from_ne_bytes(self.load(offset))
    }

    fn load_u64(&self, offset: usize) -> u64 {
        u64::from_ne_bytes(self.load(offset))
    }
}

thread_local! {
    static CAPTURED: RefCell<String> = const { RefCell::new(String::new()) };
}

struct CaptureConsole;

impl Console for CaptureConsole {
    fn write_str(&self, s: &str) {
        CAPTURED.with(|captured| captured.borrow_mut().push_str(s));
    }
}

/// Route log output of the current thread into a buffer and clear it.
pub fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| logging::init(&CaptureConsole, LevelFilter::Trace));
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

pub fn captured_logs() -> String {
    CAPTURED.with(|captured| captured.borrow().clone())
}

pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<unknown>"
    }
}

/// Run `f`, which must panic, and return the panic message.
pub fn expect_panic(f: impl FnOnce()) -> String {
    let payload = catch_unwind(AssertUnwindSafe(f)).expect_err("didn't panic");
    panic_message(&*payload).into()
}
