use core::{
    panic::PanicInfo,
    sync::atomic::{AtomicBool, Ordering},
};

use log::error;

use crate::{
    entry,
    hw::{HardwareOps, Native},
};

#[panic_handler]
fn panic_handler(info: &PanicInfo) -> ! {
    static IS_PANICKING: AtomicBool = AtomicBool::new(false);
    let is_already_panicking = IS_PANICKING.swap(true, Ordering::SeqCst);

    // Don't risk panicking again while formatting.
    if !is_already_panicking {
        error!("{info}");
    }

    if let Some(runtime) = entry::runtime() {
        runtime.halt();
    }

    // The runtime isn't up yet.
    let hw = Native::default();
    hw.mask_interrupts();
    loop {
        hw.wait_for_interrupt();
    }
}
