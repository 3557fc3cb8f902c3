//! PS/2 controller (8042) init and the bounded-retry I/O discipline every
//! port access goes through (spec.md §4.G "Controller init", "I/O
//! discipline").

use crate::arch::port::PortByte;
use crate::kinfo;

const COMMAND_PORT: u16 = 0x64;
const DATA_PORT: u16 = 0x60;

const STATUS_OUTPUT_FULL: u8 = 1 << 0;
const STATUS_INPUT_FULL: u8 = 1 << 1;

const CMD_DISABLE_PORT1: u8 = 0xAD;
const CMD_DISABLE_PORT2: u8 = 0xA7;
const CMD_ENABLE_PORT1: u8 = 0xAE;
const CMD_ENABLE_PORT2: u8 = 0xA8;
const CMD_READ_CONFIG: u8 = 0x20;
const CMD_WRITE_CONFIG: u8 = 0x60;
const CMD_SELF_TEST: u8 = 0xAA;
const CMD_TEST_PORT1: u8 = 0xAB;
const CMD_TEST_PORT2: u8 = 0xA9;

const SELF_TEST_PASS: u8 = 0x55;
const PORT_TEST_PASS: u8 = 0x00;

const CONFIG_PORT1_IRQ: u8 = 1 << 0;
const CONFIG_PORT2_IRQ: u8 = 1 << 1;
const CONFIG_PORT2_CLOCK: u8 = 1 << 5;
const CONFIG_PORT1_TRANSLATION: u8 = 1 << 6;

/// Bounded retry budget for status-register polling
/// (spec.md §4.G "a bounded retry budget (~10^7)"; timeout is fatal).
const POLL_RETRY_BUDGET: u32 = 10_000_000;

fn command_port() -> PortByte {
    PortByte::new(COMMAND_PORT)
}

fn data_port() -> PortByte {
    PortByte::new(DATA_PORT)
}

fn status() -> u8 {
    // SAFETY: the 8042 status register is always readable.
    unsafe { command_port().read() }
}

fn wait_for_input_buffer_empty() {
    for _ in 0..POLL_RETRY_BUDGET {
        if status() & STATUS_INPUT_FULL == 0 {
            return;
        }
        core::hint::spin_loop();
    }
    panic!("ps2: timed out waiting for input buffer to drain");
}

fn wait_for_output_buffer_full() {
    for _ in 0..POLL_RETRY_BUDGET {
        if status() & STATUS_OUTPUT_FULL != 0 {
            return;
        }
        core::hint::spin_loop();
    }
    panic!("ps2: timed out waiting for output buffer to fill");
}

fn write_command(cmd: u8) {
    wait_for_input_buffer_empty();
    // SAFETY: input buffer confirmed empty above; command port always
    // accepts a write.
    unsafe {
        command_port().write(cmd);
    }
}

fn write_data(byte: u8) {
    wait_for_input_buffer_empty();
    // SAFETY: see `write_command`.
    unsafe {
        data_port().write(byte);
    }
}

fn read_data() -> u8 {
    wait_for_output_buffer_full();
    // SAFETY: output buffer confirmed full above.
    unsafe { data_port().read() }
}

/// Runs the full controller bring-up sequence; any self-test failure is
/// fatal (spec.md §4.G, §7.3).
pub fn init() -> bool {
    write_command(CMD_DISABLE_PORT1);
    write_command(CMD_DISABLE_PORT2);

    // Flush any stale byte left in the output buffer.
    if status() & STATUS_OUTPUT_FULL != 0 {
        // SAFETY: output buffer confirmed full above.
        unsafe {
            let _ = data_port().read();
        }
    }

    write_command(CMD_READ_CONFIG);
    let mut config = read_data();
    let port2_present = config & CONFIG_PORT2_CLOCK != 0;

    write_command(CMD_SELF_TEST);
    let self_test = read_data();
    if self_test != SELF_TEST_PASS {
        panic!("ps2: controller self-test failed (got {:#x})", self_test);
    }

    write_command(CMD_TEST_PORT1);
    let port1_test = read_data();
    if port1_test != PORT_TEST_PASS {
        panic!("ps2: port 1 self-test failed (got {:#x})", port1_test);
    }

    if port2_present {
        write_command(CMD_TEST_PORT2);
        let port2_test = read_data();
        if port2_test != PORT_TEST_PASS {
            kinfo!("ps2: port 2 self-test failed (got {:#x}); disabling", port2_test);
        }
    }

    config |= CONFIG_PORT1_IRQ;
    config &= !CONFIG_PORT1_TRANSLATION;
    if port2_present {
        config |= CONFIG_PORT2_IRQ;
    }
    write_command(CMD_WRITE_CONFIG);
    write_data(config);

    write_command(CMD_ENABLE_PORT1);
    if port2_present {
        write_command(CMD_ENABLE_PORT2);
    }

    kinfo!("ps2: controller initialized (port2_present={})", port2_present);
    port2_present
}

/// Polls the output buffer and reads one byte (used by the keyboard ISR).
pub fn read_output() -> u8 {
    read_data()
}

pub fn output_buffer_full() -> bool {
    status() & STATUS_OUTPUT_FULL != 0
}
